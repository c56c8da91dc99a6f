// src/progression.rs

use crate::constants::*;
use crate::error::{Result, TrainerError};
use crate::models::{Fact, Operator, Stage, StageState, Tally};
use log::{debug, info, warn};
use serde::Serialize;

/// What a recorded attempt unlocked, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StageChange {
    TableUnlocked { table: u32 },
    StageAdvanced { stage: Stage },
}

// --- Predicates ---

/// True iff `correct >= required_correct` and accuracy (0 with no attempts) reaches `required_accuracy`.
pub fn should_advance(stats: &Tally, required_correct: u32, required_accuracy: f64) -> bool {
    stats.correct >= required_correct && stats.accuracy() >= required_accuracy
}

/// Same rule for a multiplication table; a table never attempted does not advance.
pub fn should_advance_table(entry: Option<&Tally>, required_correct: u32, required_accuracy: f64) -> bool {
    entry.map_or(false, |t| should_advance(t, required_correct, required_accuracy))
}

/// Stage-one threshold for operators that use the single foundation counter.
pub fn foundation_rule(operator: Operator) -> (u32, f64) {
    match operator {
        Operator::Addition => (ADDITION_SINGLE_DIGIT_TARGET, ADDITION_SINGLE_DIGIT_ACCURACY),
        Operator::Subtraction => (SUBTRACTION_STAGE_ONE_TARGET, STAGE_ONE_ACCURACY),
        Operator::Division => (DIVISION_STAGE_ONE_TARGET, STAGE_ONE_ACCURACY),
        Operator::Multiplication => (MULT_PER_TABLE_TARGET, MULT_PER_TABLE_ACCURACY),
    }
}

/// The table being drilled in multiplication stage one.
pub fn active_table(state: &StageState) -> Option<u32> {
    match state.stage {
        Stage::Foundational => MULT_TABLES.get(state.table_index).copied(),
        Stage::Open => None,
    }
}

// --- Transitions ---

/// Counts an evaluated stage-one attempt and applies any advancement it earns.
/// Attempts made at the open stage leave the state untouched.
pub fn record_attempt(
    operator: Operator,
    state: &StageState,
    fact: &Fact,
    correct: bool,
) -> (StageState, Option<StageChange>) {
    let mut next = state.clone();
    if next.stage == Stage::Open {
        return (next, None);
    }

    let change = match operator {
        Operator::Multiplication => record_table_attempt(&mut next, fact, correct),
        Operator::Addition | Operator::Subtraction => {
            if fact.left() < 10 && fact.right() < 10 {
                next.foundation.record(correct);
            }
            advance_foundation(operator, &mut next)
        }
        Operator::Division => {
            next.foundation.record(correct);
            advance_foundation(operator, &mut next)
        }
    };

    debug!(
        "[Stage] {} foundation {}/{} tables {:?}",
        operator, next.foundation.correct, next.foundation.attempts, next.tables
    );
    (next, change)
}

fn advance_foundation(operator: Operator, state: &mut StageState) -> Option<StageChange> {
    let (required, accuracy) = foundation_rule(operator);
    if !should_advance(&state.foundation, required, accuracy) {
        return None;
    }
    state.stage = Stage::Open;
    info!(
        "[Stage] {} advanced to stage 2 ({}/{} correct)",
        operator, state.foundation.correct, state.foundation.attempts
    );
    Some(StageChange::StageAdvanced { stage: Stage::Open })
}

fn record_table_attempt(state: &mut StageState, fact: &Fact, correct: bool) -> Option<StageChange> {
    let (a, b) = (fact.left(), fact.right());
    let active = active_table(state)?;
    let table = if a == active || b == active {
        active
    } else if MULT_TABLES.contains(&a) {
        a
    } else if MULT_TABLES.contains(&b) {
        b
    } else {
        return None;
    };
    state.tables.entry(table).or_default().record(correct);

    if !should_advance_table(state.tables.get(&active), MULT_PER_TABLE_TARGET, MULT_PER_TABLE_ACCURACY) {
        return None;
    }
    if state.table_index + 1 < MULT_TABLES.len() {
        state.table_index += 1;
        let unlocked = MULT_TABLES[state.table_index];
        info!("[Stage] Table {} mastered, moving to table {}", active, unlocked);
        Some(StageChange::TableUnlocked { table: unlocked })
    } else {
        state.stage = Stage::Open;
        info!("[Stage] All tables mastered, multiplication advanced to stage 2");
        Some(StageChange::StageAdvanced { stage: Stage::Open })
    }
}

// --- Overrides ---

/// Moves to `stage` regardless of the counters.
pub fn force_stage(state: &StageState, stage: Stage) -> StageState {
    info!("[Stage] Forced stage {} -> {}", state.stage.number(), stage.number());
    StageState {
        stage,
        ..state.clone()
    }
}

/// Clears table progress and restarts multiplication at the first table.
pub fn reset_tables(state: &StageState) -> StageState {
    info!("[Stage] Table progress reset");
    StageState {
        stage: Stage::Foundational,
        tables: Default::default(),
        table_index: 0,
        ..state.clone()
    }
}

/// Returns to stage one drilling `table`.
pub fn jump_to_table(state: &StageState, table: u32) -> Result<StageState> {
    let index = MULT_TABLES
        .iter()
        .position(|&t| t == table)
        .ok_or(TrainerError::UnknownTable(table))?;
    info!("[Stage] Jumped to table {}", table);
    Ok(StageState {
        stage: Stage::Foundational,
        table_index: index,
        ..state.clone()
    })
}

/// Repairs counters and table index read from storage.
pub fn normalize(state: StageState) -> StageState {
    let mut state = state;
    state.foundation = state.foundation.normalized();
    for tally in state.tables.values_mut() {
        *tally = tally.normalized();
    }
    if state.table_index >= MULT_TABLES.len() {
        warn!(
            "[Stage] Table index {} out of range, clamping",
            state.table_index
        );
        state.table_index = MULT_TABLES.len() - 1;
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_advance_boundaries() {
        assert!(!should_advance(&Tally::new(10, 10), 40, 0.9));
        assert!(!should_advance(&Tally::new(40, 45), 40, 0.9));
        assert!(!should_advance(&Tally::new(40, 60), 40, 0.9));
        assert!(should_advance(&Tally::new(40, 44), 40, 0.9));
        assert!(!should_advance(&Tally::default(), 0, 0.9));
    }

    #[test]
    fn test_should_advance_table() {
        assert!(!should_advance_table(None, 12, 0.9));
        assert!(!should_advance_table(Some(&Tally::new(11, 11)), 12, 0.9));
        assert!(!should_advance_table(Some(&Tally::new(12, 20)), 12, 0.9));
        assert!(should_advance_table(Some(&Tally::new(12, 13)), 12, 0.9));
    }

    #[test]
    fn test_addition_advances_on_threshold() {
        let mut state = StageState::default();
        state.foundation = Tally::new(39, 43);
        let (next, change) = record_attempt(Operator::Addition, &state, &Fact::addition(3, 4), true);
        assert_eq!(next.foundation, Tally::new(40, 44));
        assert_eq!(next.stage, Stage::Open);
        assert_eq!(change, Some(StageChange::StageAdvanced { stage: Stage::Open }));
        // caller's state untouched
        assert_eq!(state.stage, Stage::Foundational);
    }

    #[test]
    fn test_addition_ignores_multi_digit_facts() {
        let state = StageState::default();
        let (next, change) = record_attempt(Operator::Addition, &state, &Fact::addition(30, 4), true);
        assert_eq!(next.foundation, Tally::default());
        assert_eq!(change, None);
    }

    #[test]
    fn test_open_stage_is_untouched() {
        let state = force_stage(&StageState::default(), Stage::Open);
        let (next, change) = record_attempt(Operator::Division, &state, &Fact::division(3, 4), false);
        assert_eq!(next, state);
        assert_eq!(change, None);
    }

    #[test]
    fn test_table_unlocks_next_then_stage_two() {
        let mut state = StageState::default();
        state.tables.insert(2, Tally::new(11, 11));
        let (next, change) = record_attempt(
            Operator::Multiplication,
            &state,
            &Fact::multiplication(7, 2),
            true,
        );
        assert_eq!(change, Some(StageChange::TableUnlocked { table: 3 }));
        assert_eq!(active_table(&next), Some(3));

        let mut last = jump_to_table(&next, 9).unwrap();
        last.tables.insert(9, Tally::new(11, 12));
        let (done, change) = record_attempt(
            Operator::Multiplication,
            &last,
            &Fact::multiplication(9, 4),
            true,
        );
        assert_eq!(change, Some(StageChange::StageAdvanced { stage: Stage::Open }));
        assert_eq!(done.stage, Stage::Open);
        assert_eq!(active_table(&done), None);
    }

    #[test]
    fn test_off_table_fact_credits_its_own_table() {
        let state = StageState::default();
        let (next, change) = record_attempt(
            Operator::Multiplication,
            &state,
            &Fact::multiplication(5, 6),
            false,
        );
        assert_eq!(next.tables.get(&5), Some(&Tally::new(0, 1)));
        assert_eq!(change, None);
    }

    #[test]
    fn test_overrides() {
        let mut state = StageState::default();
        state.tables.insert(2, Tally::new(12, 12));
        state.table_index = 4;
        let reset = reset_tables(&force_stage(&state, Stage::Open));
        assert_eq!(reset.stage, Stage::Foundational);
        assert!(reset.tables.is_empty());
        assert_eq!(reset.table_index, 0);

        assert!(matches!(jump_to_table(&state, 12), Err(TrainerError::UnknownTable(12))));
        assert_eq!(jump_to_table(&state, 6).unwrap().table_index, 4);
    }

    #[test]
    fn test_normalize_clamps() {
        let mut state = StageState::default();
        state.foundation = Tally::new(9, 3);
        state.table_index = 99;
        let fixed = normalize(state);
        assert_eq!(fixed.foundation, Tally::new(3, 3));
        assert_eq!(fixed.table_index, MULT_TABLES.len() - 1);
    }
}
