// src/config.rs

use crate::constants::*;
use crate::error::Result;
use crate::models::Operator;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "arith-trainer";
const DB_FILE: &str = "trainer.db";
const CONFIG_FILE: &str = "config.json";

/// Answers with more digits than the limit are revealed rather than evaluated.
/// `None` means no limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnswerDigitLimits {
    pub addition: Option<usize>,
    pub subtraction: Option<usize>,
    pub multiplication: Option<usize>,
    pub division: Option<usize>,
}

impl Default for AnswerDigitLimits {
    fn default() -> Self {
        let limit = |n: usize| if n == usize::MAX { None } else { Some(n) };
        AnswerDigitLimits {
            addition: limit(ADDITION_ANSWER_DIGIT_LIMIT),
            subtraction: limit(SUBTRACTION_ANSWER_DIGIT_LIMIT),
            multiplication: limit(MULTIPLICATION_ANSWER_DIGIT_LIMIT),
            division: limit(DIVISION_ANSWER_DIGIT_LIMIT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainerConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub diagnostic_max_items: usize,
    pub answer_digit_limits: AnswerDigitLimits,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            db_path: default_db_path(),
            log_level: "info".to_string(),
            diagnostic_max_items: DIAGNOSTIC_DEFAULT_ITEMS,
            answer_digit_limits: AnswerDigitLimits::default(),
        }
    }
}

impl TrainerConfig {
    pub fn answer_digit_limit(&self, operator: Operator) -> Option<usize> {
        let limits = &self.answer_digit_limits;
        match operator {
            Operator::Addition => limits.addition,
            Operator::Subtraction => limits.subtraction,
            Operator::Multiplication => limits.multiplication,
            Operator::Division => limits.division,
        }
    }

    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<TrainerConfig> {
        let contents = fs::read_to_string(path)?;
        let config: TrainerConfig = serde_json::from_str(&contents)?;
        debug!("[Config] Loaded {:?}", path);
        Ok(config)
    }

    /// Like `load`, but a file that does not exist yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<TrainerConfig> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("[Config] No config at {:?}, using defaults", path);
            Ok(TrainerConfig::default())
        }
    }

    /// Applies command-line/environment overrides on top of the file values.
    pub fn with_overrides(mut self, db_path: Option<PathBuf>, log_level: Option<String>) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}

pub fn default_db_path() -> PathBuf {
    app_dir(dirs::data_dir()).join(DB_FILE)
}

pub fn default_config_path() -> PathBuf {
    app_dir(dirs::config_dir()).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrainerConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.diagnostic_max_items, 15);
        assert_eq!(config.answer_digit_limit(Operator::Addition), Some(4));
        assert_eq!(config.answer_digit_limit(Operator::Subtraction), Some(5));
        assert_eq!(config.answer_digit_limit(Operator::Division), Some(5));
        assert_eq!(config.answer_digit_limit(Operator::Multiplication), None);
        assert!(config.db_path.ends_with("arith-trainer/trainer.db"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"diagnosticMaxItems": 8, "answerDigitLimits": {{"addition": 6}}}}"#
        )
        .unwrap();
        let config = TrainerConfig::load(file.path()).unwrap();
        assert_eq!(config.diagnostic_max_items, 8);
        assert_eq!(config.answer_digit_limit(Operator::Addition), Some(6));
        assert_eq!(config.answer_digit_limit(Operator::Subtraction), Some(5));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_missing_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig::load_or_default(&dir.path().join("absent.json"))
            .unwrap()
            .with_overrides(Some(PathBuf::from("/tmp/x.db")), Some("debug".to_string()));
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ nope").unwrap();
        assert!(TrainerConfig::load(file.path()).is_err());
    }
}
