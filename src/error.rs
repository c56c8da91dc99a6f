// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fact: {0}")]
    InvalidFact(String),

    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown subskill: {0}")]
    UnknownSubskill(String),

    #[error("Invalid stage: {0} (expected 1 or 2)")]
    InvalidStage(u8),

    #[error("Unknown multiplication table: {0}")]
    UnknownTable(u32),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
