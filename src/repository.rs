// src/repository.rs
//
// Storage for learner state, one logical collection per method pair. Every save replaces
// the whole collection for that operator inside one transaction, so concurrent writers
// resolve as last-writer-wins per collection.

use crate::database;
use crate::error::Result;
use crate::models::{
    AttemptRecord, Fact, FactProgress, Mistake, Operator, Stage, StageState, StreakState, Subskill,
    SubskillProgress, Tally,
};
use crate::progression;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub trait StateRepository {
    fn load_subskill_progress(&self, operator: Operator) -> Result<SubskillProgress>;
    fn save_subskill_progress(&self, operator: Operator, progress: &SubskillProgress) -> Result<()>;

    fn load_fact_progress(&self, operator: Operator) -> Result<FactProgress>;
    fn save_fact_progress(&self, operator: Operator, progress: &FactProgress) -> Result<()>;

    /// Oldest first.
    fn load_mistakes(&self, operator: Operator) -> Result<Vec<Mistake>>;
    fn append_mistake(&self, mistake: &Mistake) -> Result<()>;
    fn clear_mistakes(&self, operator: Operator) -> Result<()>;

    fn load_stage(&self, operator: Operator) -> Result<StageState>;
    fn save_stage(&self, operator: Operator, stage: &StageState) -> Result<()>;

    fn load_streak(&self, operator: Operator) -> Result<StreakState>;
    fn save_streak(&self, operator: Operator, streak: &StreakState) -> Result<()>;

    /// Oldest first.
    fn load_attempts(&self, operator: Operator) -> Result<Vec<AttemptRecord>>;
    fn append_attempt(&self, attempt: &AttemptRecord) -> Result<()>;

    fn load_adaptive(&self, operator: Operator) -> Result<bool>;
    fn save_adaptive(&self, operator: Operator, adaptive: bool) -> Result<()>;

    /// Facts queued by the learner, next one first.
    fn load_queue(&self, operator: Operator) -> Result<Vec<Fact>>;
    fn save_queue(&self, operator: Operator, queue: &[Fact]) -> Result<()>;

    /// Drops subskill and fact progress for one operator.
    fn clear_progress(&self, operator: Operator) -> Result<()>;
    fn clear_all(&self) -> Result<()>;

    /// Runs `work` so that either all of its writes land or none do.
    fn atomically(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        work()
    }
}

// --- Normalization ---

/// Builds a progress map from raw `(id, tally)` pairs: unknown ids are dropped and
/// `correct` is clamped to `attempts`.
pub fn normalize_subskill_progress<I>(entries: I) -> SubskillProgress
where
    I: IntoIterator<Item = (String, Tally)>,
{
    let mut progress = SubskillProgress::new();
    for (id, tally) in entries {
        match id.parse::<Subskill>() {
            Ok(subskill) => {
                progress.insert(subskill, tally.normalized());
            }
            Err(_) => warn!("[Repo] Dropping progress for unknown subskill '{}'", id),
        }
    }
    progress
}

/// Decodes a JSON list element by element; malformed lists and elements are dropped.
pub fn decode_list<T: DeserializeOwned>(raw: &str, what: &str) -> Vec<T> {
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(items) => {
            let total = items.len();
            let decoded: Vec<T> = items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect();
            if decoded.len() < total {
                warn!(
                    "[Repo] Dropped {} unreadable {} entries",
                    total - decoded.len(),
                    what
                );
            }
            decoded
        }
        Err(e) => {
            warn!("[Repo] Malformed {} list, using empty: {}", what, e);
            Vec::new()
        }
    }
}

/// Out-of-range integers from storage clamp into `u32`.
fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn to_stage(value: i64) -> Stage {
    u8::try_from(value)
        .ok()
        .and_then(|n| Stage::try_from(n).ok())
        .unwrap_or_else(|| {
            warn!("[Repo] Unknown stage {}, using stage 1", value);
            Stage::default()
        })
}

fn queued_fact(operator: Operator, left: u32, right: u32) -> Option<Fact> {
    match Fact::new(operator, left, right) {
        Ok(fact) => Some(fact),
        Err(e) => {
            warn!("[Repo] Dropping queued fact: {}", e);
            None
        }
    }
}

// --- SQLite ---

pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Opens (creating if needed) the database file and its schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        debug!("[Repo] Opening {:?}", path);
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        database::init_db(&conn)?;
        Ok(SqliteRepository { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Opens a transaction unless one is already running, in which case `work` joins it.
    fn in_transaction<T>(&self, work: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return work(&self.conn);
        }
        let tx = self.conn.unchecked_transaction()?;
        let out = work(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl StateRepository for SqliteRepository {
    fn load_subskill_progress(&self, operator: Operator) -> Result<SubskillProgress> {
        let mut stmt = self.conn.prepare(
            "SELECT subskill, correct, attempts FROM subskill_progress WHERE operator = ?",
        )?;
        let rows = stmt
            .query_map([operator.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Tally::new(to_u32(row.get(1)?), to_u32(row.get(2)?)),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(normalize_subskill_progress(rows))
    }

    fn save_subskill_progress(&self, operator: Operator, progress: &SubskillProgress) -> Result<()> {
        self.in_transaction(|tx| {
            tx.execute(
                "DELETE FROM subskill_progress WHERE operator = ?",
                [operator.as_str()],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO subskill_progress (operator, subskill, correct, attempts) VALUES (?, ?, ?, ?)",
                )?;
                for (subskill, tally) in progress {
                    stmt.execute(params![
                        operator.as_str(),
                        subskill.as_str(),
                        tally.correct,
                        tally.attempts
                    ])?;
                }
            }
            Ok(())
        })
    }

    fn load_fact_progress(&self, operator: Operator) -> Result<FactProgress> {
        let mut stmt = self
            .conn
            .prepare("SELECT fact_key, correct FROM fact_progress WHERE operator = ?")?;
        let rows = stmt
            .query_map([operator.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, to_u32(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<FactProgress>>()?;
        Ok(rows)
    }

    fn save_fact_progress(&self, operator: Operator, progress: &FactProgress) -> Result<()> {
        self.in_transaction(|tx| {
            tx.execute("DELETE FROM fact_progress WHERE operator = ?", [operator.as_str()])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO fact_progress (operator, fact_key, correct) VALUES (?, ?, ?)",
                )?;
                for (key, correct) in progress {
                    stmt.execute(params![operator.as_str(), key, correct])?;
                }
            }
            Ok(())
        })
    }

    fn load_mistakes(&self, operator: Operator) -> Result<Vec<Mistake>> {
        let mut stmt = self.conn.prepare(
            "SELECT left_operand, right_operand, user_answer, correct_answer, timestamp,
                    subskills, root_causes, mistake_types
             FROM mistakes
             WHERE operator = ?
             ORDER BY timestamp ASC, id ASC",
        )?;
        let mistakes = stmt
            .query_map([operator.as_str()], |row| {
                let subskills: String = row.get(5)?;
                let root_causes: String = row.get(6)?;
                let mistake_types: String = row.get(7)?;
                Ok(Mistake {
                    operator,
                    left: to_u32(row.get(0)?),
                    right: to_u32(row.get(1)?),
                    user_answer: row.get::<_, Option<i64>>(2)?.map(to_u32),
                    correct_answer: to_u32(row.get(3)?),
                    timestamp: row.get(4)?,
                    subskills: decode_list(&subskills, "subskill"),
                    root_causes: decode_list(&root_causes, "root cause"),
                    mistake_types: decode_list(&mistake_types, "mistake type"),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(mistakes)
    }

    fn append_mistake(&self, mistake: &Mistake) -> Result<()> {
        self.conn.execute(
            "INSERT INTO mistakes (operator, left_operand, right_operand, user_answer, correct_answer,
                                   timestamp, subskills, root_causes, mistake_types)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                mistake.operator.as_str(),
                mistake.left,
                mistake.right,
                mistake.user_answer,
                mistake.correct_answer,
                mistake.timestamp,
                serde_json::to_string(&mistake.subskills)?,
                serde_json::to_string(&mistake.root_causes)?,
                serde_json::to_string(&mistake.mistake_types)?,
            ],
        )?;
        Ok(())
    }

    fn clear_mistakes(&self, operator: Operator) -> Result<()> {
        self.conn
            .execute("DELETE FROM mistakes WHERE operator = ?", [operator.as_str()])?;
        Ok(())
    }

    fn load_stage(&self, operator: Operator) -> Result<StageState> {
        let row = self
            .conn
            .query_row(
                "SELECT stage, foundation_correct, foundation_attempts, table_index
                 FROM stage_state WHERE operator = ?",
                [operator.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let mut state = match row {
            Some((stage, correct, attempts, table_index)) => StageState {
                stage: to_stage(stage),
                foundation: Tally::new(to_u32(correct), to_u32(attempts)),
                tables: BTreeMap::new(),
                table_index: usize::try_from(table_index.max(0)).unwrap_or(usize::MAX),
            },
            None => StageState::default(),
        };

        let mut stmt = self.conn.prepare(
            "SELECT table_number, correct, attempts FROM table_progress WHERE operator = ?",
        )?;
        state.tables = stmt
            .query_map([operator.as_str()], |row| {
                Ok((
                    to_u32(row.get(0)?),
                    Tally::new(to_u32(row.get(1)?), to_u32(row.get(2)?)),
                ))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(progression::normalize(state))
    }

    fn save_stage(&self, operator: Operator, stage: &StageState) -> Result<()> {
        self.in_transaction(|tx| {
            tx.execute(
                "INSERT OR REPLACE INTO stage_state (operator, stage, foundation_correct, foundation_attempts, table_index)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    operator.as_str(),
                    stage.stage.number(),
                    stage.foundation.correct,
                    stage.foundation.attempts,
                    stage.table_index as i64
                ],
            )?;
            tx.execute("DELETE FROM table_progress WHERE operator = ?", [operator.as_str()])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO table_progress (operator, table_number, correct, attempts) VALUES (?, ?, ?, ?)",
                )?;
                for (table, tally) in &stage.tables {
                    stmt.execute(params![operator.as_str(), table, tally.correct, tally.attempts])?;
                }
            }
            Ok(())
        })
    }

    fn load_streak(&self, operator: Operator) -> Result<StreakState> {
        let streak = self
            .conn
            .query_row(
                "SELECT streak, best_streak FROM streaks WHERE operator = ?",
                [operator.as_str()],
                |row| {
                    let streak = to_u32(row.get(0)?);
                    let best: u32 = to_u32(row.get(1)?);
                    Ok(StreakState {
                        streak,
                        best_streak: best.max(streak),
                    })
                },
            )
            .optional()?;
        Ok(streak.unwrap_or_default())
    }

    fn save_streak(&self, operator: Operator, streak: &StreakState) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO streaks (operator, streak, best_streak) VALUES (?, ?, ?)",
            params![operator.as_str(), streak.streak, streak.best_streak],
        )?;
        Ok(())
    }

    fn load_attempts(&self, operator: Operator) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT fact_key, left_operand, right_operand, answer, user_answer, correct, timestamp, stage
             FROM attempts
             WHERE operator = ?
             ORDER BY timestamp ASC, id ASC",
        )?;
        let attempts = stmt
            .query_map([operator.as_str()], |row| {
                Ok(AttemptRecord {
                    key: row.get(0)?,
                    operator,
                    left: to_u32(row.get(1)?),
                    right: to_u32(row.get(2)?),
                    answer: to_u32(row.get(3)?),
                    user_answer: row.get::<_, Option<i64>>(4)?.map(to_u32),
                    correct: row.get::<_, Option<i64>>(5)?.map(|c| c != 0),
                    timestamp: row.get(6)?,
                    stage: to_stage(row.get(7)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attempts)
    }

    fn append_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO attempts (operator, fact_key, left_operand, right_operand, answer, user_answer,
                                   correct, timestamp, stage)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                attempt.operator.as_str(),
                attempt.key,
                attempt.left,
                attempt.right,
                attempt.answer,
                attempt.user_answer,
                attempt.correct,
                attempt.timestamp,
                attempt.stage.number()
            ],
        )?;
        Ok(())
    }

    fn load_adaptive(&self, operator: Operator) -> Result<bool> {
        let adaptive: Option<i64> = self
            .conn
            .query_row(
                "SELECT adaptive FROM settings WHERE operator = ?",
                [operator.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(adaptive.map_or(false, |a| a != 0))
    }

    fn save_adaptive(&self, operator: Operator, adaptive: bool) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (operator, adaptive) VALUES (?, ?)",
            params![operator.as_str(), adaptive],
        )?;
        Ok(())
    }

    fn load_queue(&self, operator: Operator) -> Result<Vec<Fact>> {
        let mut stmt = self.conn.prepare(
            "SELECT left_operand, right_operand FROM practice_queue WHERE operator = ? ORDER BY id ASC",
        )?;
        let pairs = stmt
            .query_map([operator.as_str()], |row| {
                Ok((to_u32(row.get(0)?), to_u32(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs
            .into_iter()
            .filter_map(|(left, right)| queued_fact(operator, left, right))
            .collect())
    }

    fn save_queue(&self, operator: Operator, queue: &[Fact]) -> Result<()> {
        self.in_transaction(|tx| {
            tx.execute("DELETE FROM practice_queue WHERE operator = ?", [operator.as_str()])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO practice_queue (operator, left_operand, right_operand) VALUES (?, ?, ?)",
                )?;
                for fact in queue {
                    stmt.execute(params![operator.as_str(), fact.left(), fact.right()])?;
                }
            }
            Ok(())
        })
    }

    fn clear_progress(&self, operator: Operator) -> Result<()> {
        self.in_transaction(|tx| {
            tx.execute(
                "DELETE FROM subskill_progress WHERE operator = ?",
                [operator.as_str()],
            )?;
            tx.execute("DELETE FROM fact_progress WHERE operator = ?", [operator.as_str()])?;
            Ok(())
        })
    }

    fn clear_all(&self) -> Result<()> {
        self.in_transaction(|tx| {
            tx.execute_batch(
                "DELETE FROM subskill_progress;
                 DELETE FROM fact_progress;
                 DELETE FROM mistakes;
                 DELETE FROM attempts;
                 DELETE FROM stage_state;
                 DELETE FROM table_progress;
                 DELETE FROM streaks;
                 DELETE FROM settings;
                 DELETE FROM practice_queue;",
            )?;
            Ok(())
        })
    }

    fn atomically(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        self.in_transaction(|_| work())
    }
}

// --- In-Memory ---

#[derive(Debug, Clone, Default)]
struct MemoryState {
    subskills: BTreeMap<Operator, SubskillProgress>,
    facts: BTreeMap<Operator, FactProgress>,
    mistakes: Vec<Mistake>,
    attempts: Vec<AttemptRecord>,
    stages: BTreeMap<Operator, StageState>,
    streaks: BTreeMap<Operator, StreakState>,
    adaptive: BTreeMap<Operator, bool>,
    queues: BTreeMap<Operator, Vec<Fact>>,
}

/// Process-local repository for ephemeral sessions and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RefCell<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateRepository for MemoryRepository {
    fn load_subskill_progress(&self, operator: Operator) -> Result<SubskillProgress> {
        Ok(self.state.borrow().subskills.get(&operator).cloned().unwrap_or_default())
    }

    fn save_subskill_progress(&self, operator: Operator, progress: &SubskillProgress) -> Result<()> {
        self.state.borrow_mut().subskills.insert(operator, progress.clone());
        Ok(())
    }

    fn load_fact_progress(&self, operator: Operator) -> Result<FactProgress> {
        Ok(self.state.borrow().facts.get(&operator).cloned().unwrap_or_default())
    }

    fn save_fact_progress(&self, operator: Operator, progress: &FactProgress) -> Result<()> {
        self.state.borrow_mut().facts.insert(operator, progress.clone());
        Ok(())
    }

    fn load_mistakes(&self, operator: Operator) -> Result<Vec<Mistake>> {
        Ok(self
            .state
            .borrow()
            .mistakes
            .iter()
            .filter(|m| m.operator == operator)
            .cloned()
            .collect())
    }

    fn append_mistake(&self, mistake: &Mistake) -> Result<()> {
        self.state.borrow_mut().mistakes.push(mistake.clone());
        Ok(())
    }

    fn clear_mistakes(&self, operator: Operator) -> Result<()> {
        self.state.borrow_mut().mistakes.retain(|m| m.operator != operator);
        Ok(())
    }

    fn load_stage(&self, operator: Operator) -> Result<StageState> {
        Ok(self.state.borrow().stages.get(&operator).cloned().unwrap_or_default())
    }

    fn save_stage(&self, operator: Operator, stage: &StageState) -> Result<()> {
        self.state.borrow_mut().stages.insert(operator, stage.clone());
        Ok(())
    }

    fn load_streak(&self, operator: Operator) -> Result<StreakState> {
        Ok(self.state.borrow().streaks.get(&operator).copied().unwrap_or_default())
    }

    fn save_streak(&self, operator: Operator, streak: &StreakState) -> Result<()> {
        self.state.borrow_mut().streaks.insert(operator, *streak);
        Ok(())
    }

    fn load_attempts(&self, operator: Operator) -> Result<Vec<AttemptRecord>> {
        Ok(self
            .state
            .borrow()
            .attempts
            .iter()
            .filter(|a| a.operator == operator)
            .cloned()
            .collect())
    }

    fn append_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        self.state.borrow_mut().attempts.push(attempt.clone());
        Ok(())
    }

    fn load_adaptive(&self, operator: Operator) -> Result<bool> {
        Ok(self.state.borrow().adaptive.get(&operator).copied().unwrap_or(false))
    }

    fn save_adaptive(&self, operator: Operator, adaptive: bool) -> Result<()> {
        self.state.borrow_mut().adaptive.insert(operator, adaptive);
        Ok(())
    }

    fn load_queue(&self, operator: Operator) -> Result<Vec<Fact>> {
        Ok(self.state.borrow().queues.get(&operator).cloned().unwrap_or_default())
    }

    fn save_queue(&self, operator: Operator, queue: &[Fact]) -> Result<()> {
        self.state.borrow_mut().queues.insert(operator, queue.to_vec());
        Ok(())
    }

    fn clear_progress(&self, operator: Operator) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.subskills.remove(&operator);
        state.facts.remove(&operator);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        *self.state.borrow_mut() = MemoryState::default();
        Ok(())
    }

    fn atomically(&self, work: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let saved = self.state.borrow().clone();
        let result = work();
        if result.is_err() {
            *self.state.borrow_mut() = saved;
        }
        result
    }
}
