// src/constants.rs

use crate::models::Subskill;

// --- Mastery Targets (correct answers required per subskill) ---

pub const ADDITION_SUBSKILL_TARGETS: &[(Subskill, u32)] = &[
    (Subskill::FactsZeroToNine, 10),
    (Subskill::CarryTrigger, 12),
    (Subskill::CarryPropagation, 12),
    (Subskill::FinalCarry, 6),
    (Subskill::PlaceAlignment, 10),
    (Subskill::ZeroIdentity, 6),
    (Subskill::MultiDigitFlow, 14),
];

pub const MULT_SUBSKILL_TARGETS: &[(Subskill, u32)] = &[
    (Subskill::FactsZeroToTen, 20),
    (Subskill::FactsElevenTwelve, 16),
    (Subskill::ZeroOneLaws, 10),
    (Subskill::SquareNumbers, 14),
    (Subskill::CommutativityRecognition, 18),
    (Subskill::DistributionAnchor, 12),
    (Subskill::MultiDigitFlowMult, 20),
];

/// Target assumed for a subskill missing from a table.
pub const DEFAULT_SUBSKILL_TARGET: u32 = 10;

// --- Stage Progression ---

pub const ADDITION_SINGLE_DIGIT_TARGET: u32 = 40;
pub const ADDITION_SINGLE_DIGIT_ACCURACY: f64 = 0.9;

pub const MULT_TABLES: [u32; 8] = [2, 3, 4, 5, 6, 7, 8, 9];
pub const MULT_PER_TABLE_TARGET: u32 = 12;
pub const MULT_PER_TABLE_ACCURACY: f64 = 0.9;

pub const SUBTRACTION_STAGE_ONE_TARGET: u32 = 30;
pub const DIVISION_STAGE_ONE_TARGET: u32 = 30;
pub const STAGE_ONE_ACCURACY: f64 = 0.9;

// --- Answer Entry ---

/// Answers longer than this are revealed instead of evaluated (learning mode).
pub const ADDITION_ANSWER_DIGIT_LIMIT: usize = 4;
pub const SUBTRACTION_ANSWER_DIGIT_LIMIT: usize = 5;
pub const DIVISION_ANSWER_DIGIT_LIMIT: usize = 5;
pub const MULTIPLICATION_ANSWER_DIGIT_LIMIT: usize = usize::MAX;

// --- Generators ---

pub const ADDITION_RANDOM_MAX: u32 = 999;
pub const MULT_RANDOM_MAX: u32 = 12;
/// Cap on rejection-sampling redraws before the last draw is accepted.
pub const GENERATOR_MAX_RETRIES: usize = 1000;

/// Ones/tens digit pairs guaranteed to carry through two columns.
pub const CARRY_CHAIN_ONES: [(u32, u32); 3] = [(8, 7), (9, 6), (9, 8)];
pub const CARRY_CHAIN_TENS: [(u32, u32); 3] = [(8, 7), (9, 6), (7, 5)];

/// Factors that sit near 10 and invite a 10 +/- k decomposition.
pub const NEAR_TEN_FACTORS: [u32; 3] = [8, 9, 11];

// --- Diagnostic Set ---

pub const DIAGNOSTIC_DEFAULT_ITEMS: usize = 15;
pub const DIAGNOSTIC_WEAK_FACT_SHARE: f64 = 0.4;
pub const DIAGNOSTIC_WEAK_SUBSKILL_SHARE: f64 = 0.3;
pub const DIAGNOSTIC_FACT_MIN: u32 = 2;
pub const DIAGNOSTIC_FACT_MAX: u32 = 9;
pub const DIAGNOSTIC_MASTERED_ACCURACY: f64 = 0.95;
pub const DIAGNOSTIC_ACCURACY_WEIGHT: f64 = 0.7;
pub const DIAGNOSTIC_RECENCY_WEIGHT: f64 = 0.3;
pub const DIAGNOSTIC_SUBSKILL_MIN_ATTEMPTS: u32 = 3;
pub const DIAGNOSTIC_SUBSKILL_ACCURACY: f64 = 0.85;
pub const DIAGNOSTIC_RECENT_PER_OPERATOR: usize = 50;

// --- Time ---

pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

// --- Streaks ---

pub const STREAK_MILESTONES: [u32; 4] = [5, 10, 20, 50];

/// Looks up the mastery target for a subskill in a target table.
pub fn target_for(targets: &[(Subskill, u32)], subskill: Subskill) -> Option<u32> {
    targets
        .iter()
        .find(|(id, _)| *id == subskill)
        .map(|(_, target)| *target)
}
