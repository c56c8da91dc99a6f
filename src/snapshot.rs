// src/snapshot.rs
//
// JSON export/import of the whole learner state. Reading goes through `serde_json::Value`
// field by field so one bad entry never discards the rest of the document. A document
// that is not a snapshot at all is refused before anything is written.

use crate::error::{Result, TrainerError};
use crate::models::{
    AttemptRecord, Fact, FactProgress, Mistake, Operator, Stage, StageState, StreakState,
    SubskillProgress, Tally,
};
use crate::progression;
use crate::repository::{normalize_subskill_progress, StateRepository};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSnapshot {
    pub subskill_progress: SubskillProgress,
    pub fact_progress: FactProgress,
    pub mistakes: Vec<Mistake>,
    pub attempts: Vec<AttemptRecord>,
    pub stage: StageState,
    pub streak: StreakState,
    pub adaptive: bool,
    pub queue: Vec<Fact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: Option<DateTime<Utc>>,
    pub operators: BTreeMap<Operator, OperatorSnapshot>,
}

impl Snapshot {
    /// Reads every collection of every operator out of `repo`.
    pub fn capture(repo: &(impl StateRepository + ?Sized)) -> Result<Snapshot> {
        let mut operators = BTreeMap::new();
        for op in Operator::ALL {
            let section = OperatorSnapshot {
                subskill_progress: repo.load_subskill_progress(op)?,
                fact_progress: repo.load_fact_progress(op)?,
                mistakes: repo.load_mistakes(op)?,
                attempts: repo.load_attempts(op)?,
                stage: repo.load_stage(op)?,
                streak: repo.load_streak(op)?,
                adaptive: repo.load_adaptive(op)?,
                queue: repo.load_queue(op)?,
            };
            operators.insert(op, section);
        }
        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            exported_at: Some(Utc::now()),
            operators,
        })
    }

    /// Replaces everything in `repo` with this snapshot. On error `repo` is left untouched.
    pub fn restore(&self, repo: &(impl StateRepository + ?Sized)) -> Result<()> {
        repo.atomically(&mut || {
            repo.clear_all()?;
            for (&op, section) in &self.operators {
                repo.save_subskill_progress(op, &section.subskill_progress)?;
                repo.save_fact_progress(op, &section.fact_progress)?;
                for mistake in &section.mistakes {
                    repo.append_mistake(mistake)?;
                }
                for attempt in &section.attempts {
                    repo.append_attempt(attempt)?;
                }
                repo.save_stage(op, &section.stage)?;
                repo.save_streak(op, &section.streak)?;
                repo.save_adaptive(op, section.adaptive)?;
                repo.save_queue(op, &section.queue)?;
            }
            Ok(())
        })?;
        info!("[Snapshot] Restored {} operator sections", self.operators.len());
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fails when the document is not JSON or has no `operators` object. Inside a
    /// readable document, unreadable fields fall back to their defaults.
    pub fn from_json(raw: &str) -> Result<Snapshot> {
        let root = match serde_json::from_str::<Value>(raw)? {
            Value::Object(root) => root,
            _ => return Err(TrainerError::InvalidSnapshot("document is not a JSON object".into())),
        };
        let sections = match root.get("operators") {
            Some(Value::Object(sections)) => sections,
            _ => {
                return Err(TrainerError::InvalidSnapshot(
                    "missing 'operators' object".into(),
                ))
            }
        };

        let version = field::<u32>(&root, "version").unwrap_or(SNAPSHOT_VERSION);
        if version > SNAPSHOT_VERSION {
            warn!("[Snapshot] Document version {} is newer than {}", version, SNAPSHOT_VERSION);
        }

        let mut operators = BTreeMap::new();
        for (name, section) in sections {
            let op = match name.parse::<Operator>() {
                Ok(op) => op,
                Err(_) => {
                    warn!("[Snapshot] Skipping unknown operator section '{}'", name);
                    continue;
                }
            };
            match section {
                Value::Object(section) => {
                    operators.insert(op, read_section(op, section));
                }
                _ => warn!("[Snapshot] Section '{}' is not an object", name),
            }
        }

        Ok(Snapshot {
            version,
            exported_at: field(&root, "exportedAt"),
            operators,
        })
    }
}

// --- Lenient field readers ---

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, name: &str) -> Option<T> {
    let value = obj.get(name)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("[Snapshot] Ignoring unreadable '{}': {}", name, e);
            None
        }
    }
}

fn list<T: DeserializeOwned>(obj: &Map<String, Value>, name: &str) -> Vec<T> {
    match obj.get(name) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("[Snapshot] Dropping unreadable '{}' entry: {}", name, e);
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            warn!("[Snapshot] '{}' is not a list", name);
            Vec::new()
        }
    }
}

fn read_section(op: Operator, section: &Map<String, Value>) -> OperatorSnapshot {
    let subskill_progress = match section.get("subskillProgress") {
        Some(Value::Object(entries)) => normalize_subskill_progress(
            entries
                .iter()
                .filter_map(|(id, tally)| {
                    serde_json::from_value::<Tally>(tally.clone())
                        .ok()
                        .map(|t| (id.clone(), t))
                }),
        ),
        _ => SubskillProgress::new(),
    };

    let mistakes = list::<Mistake>(section, "mistakes")
        .into_iter()
        .filter(|m| m.operator == op)
        .collect();
    let attempts = list::<AttemptRecord>(section, "attempts")
        .into_iter()
        .filter(|a| a.operator == op)
        .collect();

    let streak = field::<StreakState>(section, "streak").unwrap_or_default();

    OperatorSnapshot {
        subskill_progress,
        fact_progress: field(section, "factProgress").unwrap_or_default(),
        mistakes,
        attempts,
        stage: read_stage(section),
        streak: StreakState {
            streak: streak.streak,
            best_streak: streak.best_streak.max(streak.streak),
        },
        adaptive: field(section, "adaptive").unwrap_or(false),
        queue: read_queue(op, section),
    }
}

fn read_stage(section: &Map<String, Value>) -> StageState {
    let obj = match section.get("stage") {
        Some(Value::Object(obj)) => obj,
        _ => return StageState::default(),
    };
    let stage = match obj.get("stage").and_then(Value::as_u64) {
        Some(2) => Stage::Open,
        Some(1) | None => Stage::Foundational,
        Some(other) => {
            warn!("[Snapshot] Unknown stage {}, using stage 1", other);
            Stage::Foundational
        }
    };
    progression::normalize(StageState {
        stage,
        foundation: field(obj, "foundation").unwrap_or_default(),
        tables: field(obj, "tables").unwrap_or_default(),
        table_index: field(obj, "tableIndex").unwrap_or(0),
    })
}

fn read_queue(op: Operator, section: &Map<String, Value>) -> Vec<Fact> {
    let items = match section.get("queue") {
        Some(Value::Array(items)) => items,
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|item| {
            let left = u32::try_from(item.get("left")?.as_u64()?).ok()?;
            let right = u32::try_from(item.get("right")?.as_u64()?).ok()?;
            match Fact::new(op, left, right) {
                Ok(fact) => Some(fact),
                Err(e) => {
                    warn!("[Snapshot] Dropping queued fact: {}", e);
                    None
                }
            }
        })
        .collect()
}
