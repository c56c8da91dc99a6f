// src/database.rs

use log::debug;
use rusqlite::{Connection, Result};

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("[DB] init_db: Checking database schema...");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS subskill_progress (
            operator TEXT NOT NULL,
            subskill TEXT NOT NULL,
            correct INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (operator, subskill)
        );
        CREATE TABLE IF NOT EXISTS fact_progress (
            operator TEXT NOT NULL,
            fact_key TEXT NOT NULL,
            correct INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (operator, fact_key)
        );
        CREATE TABLE IF NOT EXISTS mistakes (
            id INTEGER PRIMARY KEY,
            operator TEXT NOT NULL,
            left_operand INTEGER NOT NULL,
            right_operand INTEGER NOT NULL,
            user_answer INTEGER,
            correct_answer INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            subskills TEXT NOT NULL DEFAULT '[]',
            root_causes TEXT NOT NULL DEFAULT '[]',
            mistake_types TEXT NOT NULL DEFAULT '[]'
        );
        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY,
            operator TEXT NOT NULL,
            fact_key TEXT NOT NULL,
            left_operand INTEGER NOT NULL,
            right_operand INTEGER NOT NULL,
            answer INTEGER NOT NULL,
            user_answer INTEGER,
            correct INTEGER,
            timestamp INTEGER NOT NULL,
            stage INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS stage_state (
            operator TEXT PRIMARY KEY,
            stage INTEGER NOT NULL DEFAULT 1,
            foundation_correct INTEGER NOT NULL DEFAULT 0,
            foundation_attempts INTEGER NOT NULL DEFAULT 0,
            table_index INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS table_progress (
            operator TEXT NOT NULL,
            table_number INTEGER NOT NULL,
            correct INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (operator, table_number)
        );
        CREATE TABLE IF NOT EXISTS streaks (
            operator TEXT PRIMARY KEY,
            streak INTEGER NOT NULL DEFAULT 0,
            best_streak INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS settings (
            operator TEXT PRIMARY KEY,
            adaptive INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS practice_queue (
            id INTEGER PRIMARY KEY,
            operator TEXT NOT NULL,
            left_operand INTEGER NOT NULL,
            right_operand INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_mistakes_operator ON mistakes (operator, timestamp);
        CREATE INDEX IF NOT EXISTS idx_attempts_operator ON attempts (operator, timestamp);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 9);
    }
}
