// src/strategy_analysis.rs
//
// Strategy hints for wrong multiplication answers. No column simulation: every rule
// looks only at the factors, so several hints usually apply to one mistake.

use crate::constants::NEAR_TEN_FACTORS;
use crate::models::{RootCause, RootCauseCode, Severity};
use log::debug;

/// Root causes for a wrong product, in rule order. Empty when the answer is correct.
pub fn analyze_multiplication(a: u32, b: u32, user_answer: u32, correct_answer: u32) -> Vec<RootCause> {
    if user_answer == correct_answer {
        return Vec::new();
    }

    let mut causes = Vec::new();

    if (a == 0 || b == 0) && user_answer != 0 {
        causes.push(cause(
            RootCauseCode::ZeroTimesAnything,
            "Zero law",
            format!("Any number times 0 is 0, so {a}×{b} should be 0."),
            "Do quick drills focusing only on ×0 and ×1 facts.",
            Severity::Low,
        ));
    }
    if (a == 1 || b == 1) && user_answer != if a == 1 { b } else { a } {
        causes.push(cause(
            RootCauseCode::OneTimesAnything,
            "Identity by one",
            format!("Multiplying by 1 leaves the other number unchanged: {a}×{b} = {correct_answer}."),
            "Spot the ×1 facts and answer instantly without computation.",
            Severity::Low,
        ));
    }
    if a != b && a <= 12 && b <= 12 {
        causes.push(cause(
            RootCauseCode::CommutativityLeverage,
            "Use commutativity",
            format!("{a}×{b} equals {b}×{a}. If one order is easier (e.g. 3×9), flip it mentally."),
            "Write pairs both ways to internalize symmetry (e.g. 7×8 = 8×7).",
            Severity::Medium,
        ));
    }
    if NEAR_TEN_FACTORS.contains(&a) || NEAR_TEN_FACTORS.contains(&b) {
        causes.push(cause(
            RootCauseCode::DistributiveHint,
            "Distributive strategy",
            format!("Break {a}×{b} using (10±k). Example: 9×6 = (10×6) - 6."),
            "Practice rewriting near-10 facts using 10±1 and 10±2 patterns.",
            Severity::Low,
        ));
    }
    if a == b && a > 1 && a <= 12 {
        causes.push(cause(
            RootCauseCode::SquarePattern,
            "Square pattern",
            format!("{a}×{a} is a square number ({correct_answer}). Recognizing squares speeds recall."),
            "Memorize square numbers 2²–12² as a separate list.",
            Severity::Low,
        ));
    }
    if a >= 10 || b >= 10 {
        causes.push(cause(
            RootCauseCode::MultiDigitStructure,
            "Multi-digit structure",
            format!(
                "Break large factors: e.g. {a}×{b} = ({a}×{}) + ({a}×{}).",
                b / 10 * 10,
                b % 10
            ),
            "Decompose one factor into tens + ones and multiply separately.",
            Severity::High,
        ));
    }

    if causes.is_empty() {
        causes.push(cause(
            RootCauseCode::GeneralComputation,
            "Computation slip",
            "Likely a fact recall slip; target high-frequency misses.".to_string(),
            "Use short spaced repetition sets for missed facts.",
            Severity::Medium,
        ));
    }

    debug!(
        "[Analysis] {} x {} answered {}: {:?}",
        a,
        b,
        user_answer,
        causes.iter().map(|c| c.code.as_str()).collect::<Vec<_>>()
    );
    causes
}

fn cause(
    code: RootCauseCode,
    label: &str,
    explanation: String,
    practice_tip: &str,
    severity: Severity,
) -> RootCause {
    RootCause {
        code,
        label: label.to_string(),
        explanation,
        practice_tip: practice_tip.to_string(),
        severity,
    }
}
