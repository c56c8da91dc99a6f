// tests/properties.rs

use arith_trainer::classifier::{classify_addition, classify_multiplication};
use arith_trainer::column_analysis::analyze_addition;
use arith_trainer::constants::{ADDITION_SUBSKILL_TARGETS, MULT_SUBSKILL_TARGETS};
use arith_trainer::diagnostic::{build_diagnostic_set, DiagnosticInputs};
use arith_trainer::models::{
    FactProgress, Mistake, Operator, RootCauseCode, Subskill, SubskillProgress, Tally,
};
use arith_trainer::progression::should_advance;
use arith_trainer::selector::select_target;
use arith_trainer::strategy_analysis::analyze_multiplication;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

const NOW: i64 = 1_700_000_000_000;

fn codes(n1: u32, n2: u32, user: u32) -> Vec<RootCauseCode> {
    analyze_addition(n1, n2, user, n1 + n2)
        .into_iter()
        .map(|c| c.code)
        .collect()
}

proptest! {
    #[test]
    fn classifier_is_deterministic(n1 in 0u32..=9999, n2 in 0u32..=9999) {
        prop_assert_eq!(classify_addition(n1, n2), classify_addition(n1, n2));
        prop_assert_eq!(classify_multiplication(n1, n2), classify_multiplication(n1, n2));
    }

    #[test]
    fn carry_trigger_iff_ones_overflow(n1 in 0u32..=9999, n2 in 0u32..=9999) {
        let tagged = classify_addition(n1, n2).contains(&Subskill::CarryTrigger);
        prop_assert_eq!(tagged, n1 % 10 + n2 % 10 >= 10);
    }

    #[test]
    fn correct_answers_have_no_root_causes(n1 in 0u32..=9999, n2 in 0u32..=9999) {
        prop_assert!(analyze_addition(n1, n2, n1 + n2, n1 + n2).is_empty());
        prop_assert!(analyze_multiplication(n1 % 100, n2 % 100, (n1 % 100) * (n2 % 100), (n1 % 100) * (n2 % 100)).is_empty());
    }

    #[test]
    fn wrong_answers_always_get_a_cause(n1 in 0u32..=9999, n2 in 0u32..=9999, user in 0u32..=20000) {
        prop_assume!(user != n1 + n2);
        prop_assert!(!analyze_addition(n1, n2, user, n1 + n2).is_empty());
    }

    #[test]
    fn mastered_tables_select_nothing(extra in 0u32..50, attempts_pad in 0u32..100) {
        for targets in [ADDITION_SUBSKILL_TARGETS, MULT_SUBSKILL_TARGETS] {
            let progress: SubskillProgress = targets
                .iter()
                .map(|&(id, target)| (id, Tally::new(target + extra, target + extra + attempts_pad)))
                .collect();
            prop_assert_eq!(select_target(&progress, targets), None);
        }
    }

    #[test]
    fn diagnostic_set_is_bounded_and_unique(
        max in 1usize..=30,
        seed in any::<u64>(),
        misses in proptest::collection::vec((2u32..=12, 2u32..=12, 0i64..=5), 0..40),
        correct in proptest::collection::vec((2u32..=9, 2u32..=9, 0u32..=6), 0..20),
    ) {
        let mult_mistakes: Vec<Mistake> = misses
            .iter()
            .map(|&(a, b, days)| Mistake {
                operator: Operator::Multiplication,
                left: a,
                right: b,
                user_answer: Some(a * b + 1),
                correct_answer: a * b,
                timestamp: NOW - days * 86_400_000,
                subskills: Vec::new(),
                root_causes: Vec::new(),
                mistake_types: Vec::new(),
            })
            .collect();
        let mult_facts: FactProgress = correct
            .iter()
            .map(|&(a, b, n)| (format!("{}x{}", a.min(b), a.max(b)), n))
            .collect();
        let mut progress = SubskillProgress::new();
        progress.insert(Subskill::CarryTrigger, Tally::new(1, 6));
        progress.insert(Subskill::PlaceAlignment, Tally::new(2, 4));

        let inputs = DiagnosticInputs {
            addition_progress: &progress,
            mult_fact_progress: &mult_facts,
            addition_mistakes: &[],
            mult_mistakes: &mult_mistakes,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let questions = build_diagnostic_set(&inputs, max, NOW, &mut rng);

        prop_assert!(questions.len() <= max);
        let ids: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        prop_assert_eq!(ids.len(), questions.len());
        for q in &questions {
            prop_assert!(!q.rationale.is_empty());
        }
    }
}

#[test]
fn carry_trigger_examples() {
    assert!(classify_addition(7, 5).contains(&Subskill::CarryTrigger));
    assert!(!classify_addition(3, 4).contains(&Subskill::CarryTrigger));
}

#[test]
fn missed_carry_in_scenario() {
    assert!(codes(47, 38, 75).contains(&RootCauseCode::MissedCarryIn));
}

#[test]
fn dropped_final_carry_scenario() {
    assert!(codes(95, 8, 3).contains(&RootCauseCode::DroppedFinalCarry));
}

#[test]
fn selector_breaks_ties_on_accuracy() {
    let targets = [(Subskill::CarryTrigger, 10), (Subskill::FinalCarry, 10)];
    let mut progress = SubskillProgress::new();
    progress.insert(Subskill::CarryTrigger, Tally::new(4, 5));
    progress.insert(Subskill::FinalCarry, Tally::new(4, 10));
    assert_eq!(select_target(&progress, &targets), Some(Subskill::FinalCarry));
}

#[test]
fn stage_advancement_boundary() {
    assert!(!should_advance(&Tally::new(40, 45), 40, 0.9));
    assert!(should_advance(&Tally::new(40, 44), 40, 0.9));
}

#[test]
fn multiplication_tag_co_occurrence() {
    let square = classify_multiplication(7, 7);
    assert!(square.contains(&Subskill::FactsZeroToTen));
    assert!(square.contains(&Subskill::SquareNumbers));

    let mixed = classify_multiplication(9, 6);
    assert!(mixed.contains(&Subskill::FactsZeroToTen));
    assert!(mixed.contains(&Subskill::CommutativityRecognition));
    assert!(!mixed.contains(&Subskill::DistributionAnchor));
}
