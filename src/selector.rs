// src/selector.rs

use crate::constants::{target_for, DEFAULT_SUBSKILL_TARGET};
use crate::models::{Subskill, SubskillProgress, Tally};
use log::debug;
use std::cmp::Ordering;

struct Candidate {
    id: Subskill,
    remaining: u32,
    pct: f64,
}

/// Picks the unmastered subskill furthest from its target, breaking ties on the lowest
/// accuracy. Returns `None` when every subskill in `targets` is mastered (or `targets` is empty).
pub fn select_target(progress: &SubskillProgress, targets: &[(Subskill, u32)]) -> Option<Subskill> {
    let mut candidates: Vec<Candidate> = targets
        .iter()
        .map(|&(id, target)| {
            let stats = progress.get(&id).copied().unwrap_or_default();
            Candidate {
                id,
                remaining: target.saturating_sub(stats.correct),
                pct: ratio(&stats),
            }
        })
        .filter(|c| c.remaining > 0)
        .collect();

    candidates.sort_by(|a, b| {
        b.remaining
            .cmp(&a.remaining)
            .then_with(|| a.pct.partial_cmp(&b.pct).unwrap_or(Ordering::Equal))
    });

    let choice = candidates.first().map(|c| c.id);
    debug!(
        "[Selector] {} unmastered, chose {:?}",
        candidates.len(),
        choice.map(|c| c.as_str())
    );
    choice
}

/// `correct / max(1, attempts)`.
fn ratio(stats: &Tally) -> f64 {
    stats.correct as f64 / stats.attempts.max(1) as f64
}

/// True once the subskill's correct count reaches its target.
pub fn is_mastered(progress: &SubskillProgress, targets: &[(Subskill, u32)], id: Subskill) -> bool {
    let target = target_for(targets, id).unwrap_or(DEFAULT_SUBSKILL_TARGET);
    progress.get(&id).map_or(false, |s| s.correct >= target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ADDITION_SUBSKILL_TARGETS, MULT_SUBSKILL_TARGETS};

    #[test]
    fn test_empty_progress_picks_largest_target() {
        let progress = SubskillProgress::new();
        assert_eq!(
            select_target(&progress, ADDITION_SUBSKILL_TARGETS),
            Some(Subskill::MultiDigitFlow)
        );
        assert_eq!(
            select_target(&progress, MULT_SUBSKILL_TARGETS),
            Some(Subskill::FactsZeroToTen)
        );
    }

    #[test]
    fn test_all_mastered_returns_none() {
        let progress: SubskillProgress = ADDITION_SUBSKILL_TARGETS
            .iter()
            .map(|&(id, target)| (id, Tally::new(target, target * 3)))
            .collect();
        assert_eq!(select_target(&progress, ADDITION_SUBSKILL_TARGETS), None);
    }

    #[test]
    fn test_empty_targets_returns_none() {
        assert_eq!(select_target(&SubskillProgress::new(), &[]), None);
    }

    #[test]
    fn test_tie_breaks_on_lower_accuracy() {
        let targets = [(Subskill::CarryTrigger, 10), (Subskill::FinalCarry, 10)];
        let mut progress = SubskillProgress::new();
        progress.insert(Subskill::CarryTrigger, Tally::new(4, 5));
        progress.insert(Subskill::FinalCarry, Tally::new(4, 10));
        assert_eq!(select_target(&progress, &targets), Some(Subskill::FinalCarry));
    }

    #[test]
    fn test_ignores_progress_outside_targets() {
        let targets = [(Subskill::CarryTrigger, 2)];
        let mut progress = SubskillProgress::new();
        progress.insert(Subskill::SquareNumbers, Tally::new(0, 50));
        assert_eq!(select_target(&progress, &targets), Some(Subskill::CarryTrigger));
    }

    #[test]
    fn test_is_mastered() {
        let mut progress = SubskillProgress::new();
        progress.insert(Subskill::FinalCarry, Tally::new(6, 9));
        assert!(is_mastered(&progress, ADDITION_SUBSKILL_TARGETS, Subskill::FinalCarry));
        assert!(!is_mastered(&progress, ADDITION_SUBSKILL_TARGETS, Subskill::CarryTrigger));
    }
}
