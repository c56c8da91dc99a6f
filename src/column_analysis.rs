// src/column_analysis.rs
//
// Column-by-column diagnosis of addition mistakes. The simulation walks from the ones
// column leftwards and always propagates the ground-truth carry, never the carry the
// learner appears to have used.

use crate::models::{
    digit_count, digits_of, DigitAnalysisRow, DigitIssue, RootCause, RootCauseCode, Severity,
};
use log::debug;

const PLACE_LABELS: [&str; 7] = [
    "ones",
    "tens",
    "hundreds",
    "thousands",
    "ten-thousands",
    "hundred-thousands",
    "millions",
];

// --- Public Interface ---

/// Ordered, de-duplicated root causes for a wrong addition answer. Empty when the answer is correct.
pub fn analyze_addition(
    num1: u32,
    num2: u32,
    user_answer: u32,
    correct_answer: u32,
) -> Vec<RootCause> {
    if user_answer == correct_answer {
        return Vec::new();
    }

    let grid = ColumnGrid::new(num1, num2, user_answer, correct_answer);
    let mut causes: Vec<RootCause> = Vec::new();

    for column in grid.simulate() {
        for issue in &column.row.issues {
            let Some(cause) = root_cause_for(*issue, &column, &grid) else {
                continue;
            };
            if !causes.iter().any(|c| c.code == cause.code) {
                causes.push(cause);
            }
        }
    }

    if causes.is_empty() {
        causes.push(general_computation());
    }

    debug!(
        "[Analysis] {} + {} answered {} (expected {}): {:?}",
        num1,
        num2,
        user_answer,
        correct_answer,
        causes.iter().map(|c| c.code.as_str()).collect::<Vec<_>>()
    );
    causes
}

/// Every column of the vertical addition, most significant first.
pub fn digit_breakdown(
    num1: u32,
    num2: u32,
    user_answer: u32,
    correct_answer: u32,
) -> Vec<DigitAnalysisRow> {
    let grid = ColumnGrid::new(num1, num2, user_answer, correct_answer);
    let mut rows: Vec<DigitAnalysisRow> = grid.simulate().into_iter().map(|c| c.row).collect();
    rows.reverse();
    rows
}

pub fn place_label(position_from_right: usize) -> String {
    PLACE_LABELS
        .get(position_from_right)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("10^{}", position_from_right))
}

// --- Column Simulation ---

/// Operands and answers left-padded with zeros to a common width.
struct ColumnGrid {
    a: Vec<u8>,
    b: Vec<u8>,
    user: Vec<Option<u8>>,
    correct: Vec<u8>,
    correct_answer: u32,
    user_len: usize,
    correct_len: usize,
    operand_len: usize,
    mismatch: bool,
}

struct Column {
    index: usize,
    row: DigitAnalysisRow,
    /// Index of another column whose correct digit the learner wrote here.
    swap_source: Option<usize>,
}

impl ColumnGrid {
    fn new(num1: u32, num2: u32, user_answer: u32, correct_answer: u32) -> Self {
        let operand_len = digit_count(num1).max(digit_count(num2));
        let user_len = digit_count(user_answer);
        let correct_len = digit_count(correct_answer);
        let width = operand_len.max(user_len).max(correct_len);

        let user_digits = digits_of(user_answer);
        let mut user = vec![None; width - user_len];
        user.extend(user_digits.into_iter().map(Some));

        ColumnGrid {
            a: pad(digits_of(num1), width),
            b: pad(digits_of(num2), width),
            user,
            correct: pad(digits_of(correct_answer), width),
            correct_answer,
            user_len,
            correct_len,
            operand_len,
            mismatch: user_answer != correct_answer,
        }
    }

    fn width(&self) -> usize {
        self.correct.len()
    }

    fn shown(&self, index: usize) -> u8 {
        self.user[index].unwrap_or(0)
    }

    /// Columns in processing order: ones first.
    fn simulate(&self) -> Vec<Column> {
        let width = self.width();
        let leftmost_operand = width - self.operand_len;
        let mut final_carry = false;
        let mut carry_in = 0u8;
        let mut columns = Vec::with_capacity(width);

        for index in (0..width).rev() {
            let (a, b) = (self.a[index], self.b[index]);
            let sum = a + b + carry_in;
            let expected_digit = sum % 10;
            let expected_carry_out = sum / 10;
            let shown = self.shown(index);
            if index == leftmost_operand {
                final_carry = expected_carry_out == 1;
            }

            let mut issues = Vec::new();
            let mut swap_source = None;
            if self.mismatch && shown != expected_digit {
                if carry_in == 1 && shown == (a + b) % 10 {
                    issues.push(DigitIssue::MissedCarryIn);
                }
                if index == 0 && final_carry && self.user_len < self.correct_len {
                    issues.push(DigitIssue::DroppedFinalCarry);
                }
                if carry_in == 0 && a + b >= 10 && shown == (a + b) % 10 {
                    issues.push(DigitIssue::MissedCarryOut);
                }
                swap_source = self.swap_source(index, shown);
                if swap_source.is_some() {
                    issues.push(DigitIssue::PlaceValueSwap);
                }
                issues.push(DigitIssue::IncorrectSum);
            }

            columns.push(Column {
                index,
                row: DigitAnalysisRow {
                    place: place_label(width - 1 - index),
                    a,
                    b,
                    carry_in,
                    sum,
                    expected_digit,
                    expected_carry_out,
                    user_digit: self.user[index],
                    issues,
                },
                swap_source,
            });

            carry_in = expected_carry_out;
        }

        columns
    }

    /// First other column whose correct digit equals `shown` while the learner got that column wrong.
    fn swap_source(&self, index: usize, shown: u8) -> Option<usize> {
        (0..self.width()).find(|&other| {
            other != index && self.correct[other] == shown && self.shown(other) != self.correct[other]
        })
    }
}

fn pad(digits: Vec<u8>, width: usize) -> Vec<u8> {
    let mut padded = vec![0; width.saturating_sub(digits.len())];
    padded.extend(digits);
    padded
}

// --- Root Cause Texts ---

fn root_cause_for(issue: DigitIssue, column: &Column, grid: &ColumnGrid) -> Option<RootCause> {
    let row = &column.row;
    let (a, b) = (row.a, row.b);
    let cause = match issue {
        DigitIssue::MissedCarryIn => RootCause {
            code: RootCauseCode::MissedCarryIn,
            label: "Missed incoming carry".to_string(),
            explanation: format!(
                "In the {} column you needed to add the carry 1: {} + {} + 1 = {} (digit {}), but you used {} + {} = {} giving digit {}.",
                row.place, a, b, row.sum, row.expected_digit, a, b, a + b, (a + b) % 10
            ),
            practice_tip: "After solving a column that makes 10 or more, say the carry out loud before moving to the next column (e.g. \"carry 1\").".to_string(),
            severity: Severity::High,
        },
        DigitIssue::DroppedFinalCarry => RootCause {
            code: RootCauseCode::DroppedFinalCarry,
            label: "Dropped final carry".to_string(),
            explanation: format!(
                "The leftmost column created a new leading digit (carry 1) making the answer {}, but your answer is missing that leading 1.",
                grid.correct_answer
            ),
            practice_tip: "When the leftmost column sum is 10 or more, write the full two-digit result or prefix the carry to the front.".to_string(),
            severity: Severity::High,
        },
        DigitIssue::MissedCarryOut => RootCause {
            code: RootCauseCode::MissedCarryOut,
            label: "Missed creating carry".to_string(),
            explanation: format!(
                "In the {} column {} + {} = {}, which is 10 or more, so you write {} and carry 1 to the next column.",
                row.place, a, b, a + b, (a + b) % 10
            ),
            practice_tip: "Circle sums of 10 or more and immediately write the carry above the next column.".to_string(),
            severity: Severity::High,
        },
        DigitIssue::PlaceValueSwap => {
            let source = column.swap_source?;
            RootCause {
                code: RootCauseCode::PlaceValueSwap,
                label: "Place value swap".to_string(),
                explanation: format!(
                    "The digit {} belongs in the {} column but appears in the {} column.",
                    grid.correct[source],
                    place_label(grid.width() - 1 - source),
                    place_label(grid.width() - 1 - column.index)
                ),
                practice_tip: "Line up numbers carefully by ones, tens and hundreds; draw vertical guide lines if needed.".to_string(),
                severity: Severity::High,
            }
        }
        DigitIssue::IncorrectSum => return None,
    };
    Some(cause)
}

fn general_computation() -> RootCause {
    RootCause {
        code: RootCauseCode::GeneralComputation,
        label: "Computation slip".to_string(),
        explanation: "The answer differs in at least one digit; likely an arithmetic slip or skipped carry.".to_string(),
        practice_tip: "Recompute each column aloud: add digits, state total, write digit, say carry.".to_string(),
        severity: Severity::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(causes: &[RootCause]) -> Vec<RootCauseCode> {
        causes.iter().map(|c| c.code).collect()
    }

    #[test]
    fn test_correct_answer_has_no_causes() {
        assert!(analyze_addition(47, 38, 85, 85).is_empty());
        assert!(analyze_addition(0, 0, 0, 0).is_empty());
    }

    #[test]
    fn test_missed_carry_in() {
        let causes = analyze_addition(47, 38, 75, 85);
        assert_eq!(codes(&causes), vec![RootCauseCode::MissedCarryIn]);
        assert_eq!(causes[0].severity, Severity::High);
    }

    #[test]
    fn test_dropped_final_carry() {
        let causes = analyze_addition(95, 8, 3, 103);
        assert!(codes(&causes).contains(&RootCauseCode::DroppedFinalCarry));
    }

    #[test]
    fn test_carry_dropped_between_columns() {
        // 18 + 5 = 23: ones right, tens written without the carry
        let causes = analyze_addition(18, 5, 13, 23);
        assert_eq!(codes(&causes), vec![RootCauseCode::MissedCarryIn]);

        // 56 + 7 = 63 answered 53
        let causes = analyze_addition(56, 7, 53, 63);
        assert_eq!(codes(&causes), vec![RootCauseCode::MissedCarryIn]);
    }

    #[test]
    fn test_missing_leading_digit() {
        let causes = analyze_addition(8, 7, 5, 15);
        assert!(codes(&causes).contains(&RootCauseCode::DroppedFinalCarry));

        let causes = analyze_addition(64, 52, 16, 116);
        assert!(codes(&causes).contains(&RootCauseCode::DroppedFinalCarry));
    }

    #[test]
    fn test_missed_carry_out_needs_a_wrong_digit() {
        // A column with no incoming carry whose digit is right never reports a missed carry-out.
        let rows = digit_breakdown(27, 15, 32, 42);
        let ones = &rows[1];
        assert_eq!(ones.user_digit, Some(2));
        assert!(ones.issues.is_empty());
    }

    #[test]
    fn test_place_value_swap() {
        // 12 + 34 = 46, learner writes 64
        let causes = analyze_addition(12, 34, 64, 46);
        assert!(codes(&causes).contains(&RootCauseCode::PlaceValueSwap));
    }

    #[test]
    fn test_general_computation_fallback() {
        let causes = analyze_addition(2, 3, 6, 5);
        assert_eq!(codes(&causes), vec![RootCauseCode::GeneralComputation]);
        assert_eq!(causes[0].severity, Severity::Medium);
    }

    #[test]
    fn test_causes_are_unique_by_code() {
        // Tens and hundreds both miss the incoming carry: 99 + 99 = 198 answered 88
        let causes = analyze_addition(99, 99, 88, 198);
        assert_eq!(
            codes(&causes),
            vec![RootCauseCode::MissedCarryIn, RootCauseCode::DroppedFinalCarry]
        );
    }

    #[test]
    fn test_breakdown_rows_most_significant_first() {
        let rows = digit_breakdown(47, 38, 75, 85);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].place, "tens");
        assert_eq!(rows[1].place, "ones");
        assert_eq!(rows[1].sum, 15);
        assert_eq!(rows[1].expected_carry_out, 1);
        assert!(rows[1].issues.is_empty());
        assert_eq!(rows[0].carry_in, 1);
        assert_eq!(rows[0].user_digit, Some(7));
        assert_eq!(
            rows[0].issues,
            vec![DigitIssue::MissedCarryIn, DigitIssue::IncorrectSum]
        );
    }

    #[test]
    fn test_breakdown_marks_absent_user_digits() {
        let rows = digit_breakdown(95, 8, 3, 103);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].place, "hundreds");
        assert_eq!(rows[0].user_digit, None);
        assert!(rows[0].issues.contains(&DigitIssue::DroppedFinalCarry));
        assert!(rows[0].issues.contains(&DigitIssue::IncorrectSum));
    }

    #[test]
    fn test_breakdown_of_correct_answer_has_no_issues() {
        let rows = digit_breakdown(999, 1, 1000, 1000);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.issues.is_empty()));
        assert_eq!(rows[0].place, "thousands");
    }

    #[test]
    fn test_place_labels() {
        assert_eq!(place_label(0), "ones");
        assert_eq!(place_label(6), "millions");
        assert_eq!(place_label(7), "10^7");
    }
}
