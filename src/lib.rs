// src/lib.rs

pub mod classifier;
pub mod column_analysis;
pub mod config;
pub mod constants;
pub mod database;
pub mod diagnostic;
pub mod error;
pub mod generator;
pub mod insights;
pub mod mistake_types;
pub mod models;
pub mod pedagogy;
pub mod progression;
pub mod repository;
pub mod selector;
pub mod snapshot;
pub mod strategy_analysis;
pub mod streak;

pub use error::{Result, TrainerError};
