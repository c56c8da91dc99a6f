// src/mistake_types.rs
//
// Broad mistake categories stored on every mistake record. Coarser than the root-cause
// analyzers: these drive the skill-gap summary in the learning report.

use crate::constants::NEAR_TEN_FACTORS;
use crate::models::{digit_count, MistakeKind, Operator, Severity};

/// Categories for a wrong answer, de-duplicated in rule order. Empty when the answer is correct.
pub fn classify_mistake(
    operator: Operator,
    left: u32,
    right: u32,
    user_answer: u32,
    correct_answer: u32,
) -> Vec<MistakeKind> {
    if user_answer == correct_answer {
        return Vec::new();
    }
    let mut kinds = Vec::new();
    match operator {
        Operator::Addition => addition_kinds(left, right, user_answer, correct_answer, &mut kinds),
        Operator::Multiplication => multiplication_kinds(left, right, &mut kinds),
        Operator::Subtraction => subtraction_kinds(left, right, user_answer, correct_answer, &mut kinds),
        Operator::Division => {
            if right <= 10 {
                push_unique(&mut kinds, MistakeKind::FactsRecallError);
            }
            if digit_count(user_answer) != digit_count(correct_answer) {
                push_unique(&mut kinds, MistakeKind::PlaceValueError);
            }
        }
    }
    if kinds.is_empty() {
        kinds.push(MistakeKind::GeneralError);
    }
    kinds
}

fn addition_kinds(num1: u32, num2: u32, user: u32, correct: u32, kinds: &mut Vec<MistakeKind>) {
    if any_column_carries(num1, num2) {
        push_unique(kinds, MistakeKind::CarryingError);
        push_unique(kinds, MistakeKind::RegroupingError);
    }
    if digit_count(user) != digit_count(correct) {
        push_unique(kinds, MistakeKind::PlaceValueError);
    }
    if num1 < 10 && num2 < 10 {
        push_unique(kinds, MistakeKind::BasicFactsError);
    }
    if num1 == 0 || num2 == 0 || num1 % 10 == 0 || num2 % 10 == 0 {
        push_unique(kinds, MistakeKind::ZeroHandlingError);
    }
    if num1 >= 10 || num2 >= 10 {
        push_unique(kinds, MistakeKind::MultiDigitError);
    }
    if off_by_power_of_ten(user, correct) {
        push_unique(kinds, MistakeKind::AlignmentError);
        push_unique(kinds, MistakeKind::PlaceValueError);
    }
}

fn multiplication_kinds(a: u32, b: u32, kinds: &mut Vec<MistakeKind>) {
    if a <= 12 && b <= 12 {
        kinds.push(MistakeKind::FactsRecallError);
    }
    if a <= 1 || b <= 1 {
        kinds.push(MistakeKind::ZeroOneLawError);
    }
    if a == b && a > 1 && a <= 12 {
        kinds.push(MistakeKind::SquareRecognitionError);
    }
    if a != b && a <= 12 && b <= 12 {
        kinds.push(MistakeKind::CommutativityConfusion);
    }
    if NEAR_TEN_FACTORS.contains(&a) || NEAR_TEN_FACTORS.contains(&b) {
        kinds.push(MistakeKind::DistributionOpportunityMissed);
    }
    if a >= 10 || b >= 10 {
        kinds.push(MistakeKind::MultiDigitStructureError);
    }
}

fn subtraction_kinds(minuend: u32, subtrahend: u32, user: u32, correct: u32, kinds: &mut Vec<MistakeKind>) {
    if needs_borrow(minuend, subtrahend) {
        kinds.push(MistakeKind::BorrowNeededMissed);
    }
    if minuend < 10 && subtrahend < 10 {
        kinds.push(MistakeKind::BasicFactsError);
    }
    if digit_count(user) != digit_count(correct) {
        kinds.push(MistakeKind::PlaceValueError);
    }
}

// --- Digit Checks ---

fn any_column_carries(mut a: u32, mut b: u32) -> bool {
    while a > 0 || b > 0 {
        if a % 10 + b % 10 >= 10 {
            return true;
        }
        a /= 10;
        b /= 10;
    }
    false
}

/// Some column of the minuend is smaller than the subtrahend digit below it.
fn needs_borrow(mut minuend: u32, mut subtrahend: u32) -> bool {
    while subtrahend > 0 {
        if minuend % 10 < subtrahend % 10 {
            return true;
        }
        minuend /= 10;
        subtrahend /= 10;
    }
    false
}

/// The answers differ by a factor of exactly 10 or 100.
fn off_by_power_of_ten(user: u32, correct: u32) -> bool {
    let (user, correct) = (u64::from(user), u64::from(correct));
    if user == 0 || correct == 0 {
        return false;
    }
    [10, 100]
        .iter()
        .any(|&factor| user * factor == correct || correct * factor == user)
}

fn push_unique(kinds: &mut Vec<MistakeKind>, kind: MistakeKind) {
    if !kinds.contains(&kind) {
        kinds.push(kind);
    }
}

// --- Category Metadata ---

impl MistakeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MistakeKind::CarryingError => "carryingError",
            MistakeKind::RegroupingError => "regroupingError",
            MistakeKind::PlaceValueError => "placeValueError",
            MistakeKind::BasicFactsError => "basicFactsError",
            MistakeKind::ZeroHandlingError => "zeroHandlingError",
            MistakeKind::MultiDigitError => "multiDigitError",
            MistakeKind::AlignmentError => "alignmentError",
            MistakeKind::FactsRecallError => "factsRecallError",
            MistakeKind::ZeroOneLawError => "zeroOneLawError",
            MistakeKind::SquareRecognitionError => "squareRecognitionError",
            MistakeKind::CommutativityConfusion => "commutativityConfusion",
            MistakeKind::DistributionOpportunityMissed => "distributionOpportunityMissed",
            MistakeKind::MultiDigitStructureError => "multiDigitStructureError",
            MistakeKind::BorrowNeededMissed => "borrowNeededMissed",
            MistakeKind::GeneralError => "generalError",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MistakeKind::CarryingError => "Difficulty with carrying over when digits sum to 10 or more",
            MistakeKind::RegroupingError => "Trouble with regrouping / carrying across columns",
            MistakeKind::PlaceValueError => "Confusion about place values (ones, tens, hundreds)",
            MistakeKind::BasicFactsError => "Need practice with basic facts (0-9)",
            MistakeKind::ZeroHandlingError => "Confusion when adding with zeros",
            MistakeKind::MultiDigitError => "General difficulty with multi-digit addition",
            MistakeKind::AlignmentError => "Numbers not properly aligned by place value",
            MistakeKind::FactsRecallError => "Struggles recalling core multiplication and division facts",
            MistakeKind::ZeroOneLawError => "Misapplies zero or one multiplication laws",
            MistakeKind::SquareRecognitionError => "Missed leveraging equal factors (squares)",
            MistakeKind::CommutativityConfusion => "Does not recognize a×b equals b×a for recall leverage",
            MistakeKind::DistributionOpportunityMissed => {
                "Could simplify using distributive (e.g. 9×6 as 10×6 − 6)"
            }
            MistakeKind::MultiDigitStructureError => "Difficulty with multi-digit multiplication structure",
            MistakeKind::BorrowNeededMissed => "Did not borrow from the next column when a digit was too small",
            MistakeKind::GeneralError => "General computation difficulty",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MistakeKind::CarryingError
            | MistakeKind::RegroupingError
            | MistakeKind::PlaceValueError
            | MistakeKind::MultiDigitStructureError
            | MistakeKind::BorrowNeededMissed => Severity::High,
            MistakeKind::ZeroHandlingError
            | MistakeKind::ZeroOneLawError
            | MistakeKind::SquareRecognitionError
            | MistakeKind::DistributionOpportunityMissed => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// Practice suggestions shown in the learning report. Most categories have none.
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            MistakeKind::CarryingError => &[
                "Practice carrying with manipulatives or visual aids",
                "Start with simple carrying problems (like 9+2, 8+5)",
            ],
            MistakeKind::PlaceValueError => &[
                "Review place value concepts with base-10 blocks",
                "Practice identifying ones, tens, hundreds places",
            ],
            MistakeKind::BasicFactsError => &[
                "Memorize basic addition facts 0-9",
                "Use flashcards or math fact games",
            ],
            MistakeKind::RegroupingError => &[
                "Practice regrouping with hands-on materials",
                "Break down problems step by step",
            ],
            MistakeKind::ZeroHandlingError => &[
                "Practice addition problems with zeros",
                "Understand that adding zero keeps numbers the same",
            ],
            MistakeKind::BorrowNeededMissed => &[
                "Before subtracting a column, check whether the top digit is smaller",
            ],
            _ => &[],
        }
    }
}
