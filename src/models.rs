// src/models.rs

use crate::error::{Result, TrainerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// --- Operators ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl Operator {
    pub const ALL: [Operator; 4] = [
        Operator::Addition,
        Operator::Subtraction,
        Operator::Multiplication,
        Operator::Division,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Addition => "addition",
            Operator::Subtraction => "subtraction",
            Operator::Multiplication => "multiplication",
            Operator::Division => "division",
        }
    }

    /// Symbol used when building fact keys such as `12+45` or `7x8`.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "x",
            Operator::Division => "÷",
        }
    }
}

impl FromStr for Operator {
    type Err = TrainerError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "addition" | "add" | "+" => Ok(Operator::Addition),
            "subtraction" | "sub" | "-" => Ok(Operator::Subtraction),
            "multiplication" | "mult" | "mul" | "x" | "*" => Ok(Operator::Multiplication),
            "division" | "div" | "/" => Ok(Operator::Division),
            other => Err(TrainerError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Subskills ---

/// Fixed per-operator competency set. Ids are the persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Subskill {
    #[serde(rename = "facts-0-9")]
    FactsZeroToNine,
    #[serde(rename = "carry-trigger")]
    CarryTrigger,
    #[serde(rename = "carry-propagation")]
    CarryPropagation,
    #[serde(rename = "final-carry")]
    FinalCarry,
    #[serde(rename = "place-alignment")]
    PlaceAlignment,
    #[serde(rename = "zero-identity")]
    ZeroIdentity,
    #[serde(rename = "multi-digit-flow")]
    MultiDigitFlow,
    #[serde(rename = "facts-0-10")]
    FactsZeroToTen,
    #[serde(rename = "facts-11-12")]
    FactsElevenTwelve,
    #[serde(rename = "zero-one-laws")]
    ZeroOneLaws,
    #[serde(rename = "square-numbers")]
    SquareNumbers,
    #[serde(rename = "commutativity-recognition")]
    CommutativityRecognition,
    #[serde(rename = "distribution-anchor")]
    DistributionAnchor,
    #[serde(rename = "multi-digit-flow-mult")]
    MultiDigitFlowMult,
}

impl Subskill {
    pub const ADDITION: [Subskill; 7] = [
        Subskill::FactsZeroToNine,
        Subskill::CarryTrigger,
        Subskill::CarryPropagation,
        Subskill::FinalCarry,
        Subskill::PlaceAlignment,
        Subskill::ZeroIdentity,
        Subskill::MultiDigitFlow,
    ];

    pub const MULTIPLICATION: [Subskill; 7] = [
        Subskill::FactsZeroToTen,
        Subskill::FactsElevenTwelve,
        Subskill::ZeroOneLaws,
        Subskill::SquareNumbers,
        Subskill::CommutativityRecognition,
        Subskill::DistributionAnchor,
        Subskill::MultiDigitFlowMult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subskill::FactsZeroToNine => "facts-0-9",
            Subskill::CarryTrigger => "carry-trigger",
            Subskill::CarryPropagation => "carry-propagation",
            Subskill::FinalCarry => "final-carry",
            Subskill::PlaceAlignment => "place-alignment",
            Subskill::ZeroIdentity => "zero-identity",
            Subskill::MultiDigitFlow => "multi-digit-flow",
            Subskill::FactsZeroToTen => "facts-0-10",
            Subskill::FactsElevenTwelve => "facts-11-12",
            Subskill::ZeroOneLaws => "zero-one-laws",
            Subskill::SquareNumbers => "square-numbers",
            Subskill::CommutativityRecognition => "commutativity-recognition",
            Subskill::DistributionAnchor => "distribution-anchor",
            Subskill::MultiDigitFlowMult => "multi-digit-flow-mult",
        }
    }

    pub fn operator(&self) -> Operator {
        if Subskill::ADDITION.contains(self) {
            Operator::Addition
        } else {
            Operator::Multiplication
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Subskill::FactsZeroToNine => "Instant recall of 0-9 addition facts",
            Subskill::CarryTrigger => "Recognize when a column creates a carry",
            Subskill::CarryPropagation => "Add incoming carry correctly",
            Subskill::FinalCarry => "Write leading digit from final carry",
            Subskill::PlaceAlignment => "Align digits by place value",
            Subskill::ZeroIdentity => "Zero identity understanding",
            Subskill::MultiDigitFlow => "Systematic multi-digit addition flow",
            Subskill::FactsZeroToTen => "Multiplication facts up to 10x10",
            Subskill::FactsElevenTwelve => "Multiplication facts for 11 and 12",
            Subskill::ZeroOneLaws => "Zero and one laws",
            Subskill::SquareNumbers => "Square numbers",
            Subskill::CommutativityRecognition => "Commutativity (a x b = b x a)",
            Subskill::DistributionAnchor => "Distributive split around 10",
            Subskill::MultiDigitFlowMult => "Multi-digit multiplication",
        }
    }
}

impl FromStr for Subskill {
    type Err = TrainerError;
    fn from_str(s: &str) -> Result<Self> {
        Subskill::ADDITION
            .iter()
            .chain(Subskill::MULTIPLICATION.iter())
            .find(|sk| sk.as_str() == s)
            .copied()
            .ok_or_else(|| TrainerError::UnknownSubskill(s.to_string()))
    }
}

impl fmt::Display for Subskill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Progress Counters ---

/// `{correct, attempts}` pair used for subskills, stage counters and table progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    #[serde(default)]
    pub correct: u32,
    #[serde(default)]
    pub attempts: u32,
}

impl Tally {
    pub fn new(correct: u32, attempts: u32) -> Self {
        Tally { correct, attempts }
    }

    /// `correct / attempts`, or 0 when nothing has been attempted.
    pub fn accuracy(&self) -> f64 {
        if self.attempts > 0 {
            self.correct as f64 / self.attempts as f64
        } else {
            0.0
        }
    }

    pub fn record(&mut self, correct: bool) {
        self.attempts += 1;
        if correct {
            self.correct += 1;
        }
    }

    /// Restores `correct <= attempts` for counters read from storage.
    pub fn normalized(self) -> Self {
        Tally {
            correct: self.correct.min(self.attempts),
            attempts: self.attempts,
        }
    }
}

pub type SubskillProgress = BTreeMap<Subskill, Tally>;

/// Fact key (`7x8`, `12+45`) to correct-answer count.
pub type FactProgress = BTreeMap<String, u32>;

// --- Facts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fact {
    operator: Operator,
    left: u32,
    right: u32,
    target: Option<Subskill>,
}

impl Fact {
    /// Validating constructor for operands coming from outside the generators.
    pub fn new(operator: Operator, left: u32, right: u32) -> Result<Self> {
        match operator {
            Operator::Subtraction if left < right => Err(TrainerError::InvalidFact(format!(
                "{left} - {right} would be negative"
            ))),
            Operator::Division if right == 0 => {
                Err(TrainerError::InvalidFact(format!("{left} ÷ 0")))
            }
            Operator::Division if left % right != 0 => Err(TrainerError::InvalidFact(format!(
                "{left} ÷ {right} is not an exact division"
            ))),
            _ => Ok(Fact::raw(operator, left, right)),
        }
    }

    pub fn addition(num1: u32, num2: u32) -> Self {
        Fact::raw(Operator::Addition, num1, num2)
    }

    pub fn multiplication(a: u32, b: u32) -> Self {
        Fact::raw(Operator::Multiplication, a, b)
    }

    /// Orders the operands so the difference is never negative.
    pub fn subtraction(a: u32, b: u32) -> Self {
        Fact::raw(Operator::Subtraction, a.max(b), a.min(b))
    }

    /// Builds the exact pair `divisor * quotient ÷ divisor`.
    pub fn division(divisor: u32, quotient: u32) -> Self {
        let divisor = divisor.max(1);
        Fact::raw(Operator::Division, divisor.saturating_mul(quotient), divisor)
    }

    fn raw(operator: Operator, left: u32, right: u32) -> Self {
        Fact {
            operator,
            left,
            right,
            target: None,
        }
    }

    pub fn with_target(mut self, target: Subskill) -> Self {
        self.target = Some(target);
        self
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    /// Subskill the fact was generated for, if it came from a targeted generator.
    pub fn target(&self) -> Option<Subskill> {
        self.target
    }

    pub fn answer(&self) -> u32 {
        match self.operator {
            Operator::Addition => self.left.saturating_add(self.right),
            Operator::Subtraction => self.left.saturating_sub(self.right),
            Operator::Multiplication => self.left.saturating_mul(self.right),
            Operator::Division => self.left.checked_div(self.right).unwrap_or(0),
        }
    }

    /// Order-preserving identity, e.g. `12+45`.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.left, self.operator.symbol(), self.right)
    }

    /// Mastery bucket: commutative operators are normalised to `min op max`.
    pub fn mastery_key(&self) -> String {
        match self.operator {
            Operator::Addition | Operator::Multiplication => format!(
                "{}{}{}",
                self.left.min(self.right),
                self.operator.symbol(),
                self.left.max(self.right)
            ),
            _ => self.key(),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self.operator {
            Operator::Multiplication => "×",
            other => other.symbol(),
        };
        write!(f, "{} {} {}", self.left, symbol, self.right)
    }
}

// --- Digit helpers ---

/// Number of decimal digits; 0 counts as one digit.
pub fn digit_count(n: u32) -> usize {
    let mut count = 1;
    let mut rest = n / 10;
    while rest > 0 {
        count += 1;
        rest /= 10;
    }
    count
}

/// Decimal digits, most significant first.
pub fn digits_of(n: u32) -> Vec<u8> {
    n.to_string().bytes().map(|b| b - b'0').collect()
}

// --- Diagnosis ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RootCauseCode {
    MissedCarryIn,
    DroppedFinalCarry,
    MissedCarryOut,
    PlaceValueSwap,
    GeneralComputation,
    ZeroTimesAnything,
    OneTimesAnything,
    CommutativityLeverage,
    DistributiveHint,
    SquarePattern,
    MultiDigitStructure,
}

impl RootCauseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootCauseCode::MissedCarryIn => "missedCarryIn",
            RootCauseCode::DroppedFinalCarry => "droppedFinalCarry",
            RootCauseCode::MissedCarryOut => "missedCarryOut",
            RootCauseCode::PlaceValueSwap => "placeValueSwap",
            RootCauseCode::GeneralComputation => "generalComputation",
            RootCauseCode::ZeroTimesAnything => "zeroTimesAnything",
            RootCauseCode::OneTimesAnything => "oneTimesAnything",
            RootCauseCode::CommutativityLeverage => "commutativityLeverage",
            RootCauseCode::DistributiveHint => "distributiveHint",
            RootCauseCode::SquarePattern => "squarePattern",
            RootCauseCode::MultiDigitStructure => "multiDigitStructure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RootCause {
    pub code: RootCauseCode,
    pub label: String,
    pub explanation: String,
    pub practice_tip: String,
    pub severity: Severity,
}

/// Per-column finding in a vertical-addition breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DigitIssue {
    MissedCarryIn,
    MissedCarryOut,
    DroppedFinalCarry,
    PlaceValueSwap,
    IncorrectSum,
}

impl DigitIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigitIssue::MissedCarryIn => "missedCarryIn",
            DigitIssue::MissedCarryOut => "missedCarryOut",
            DigitIssue::DroppedFinalCarry => "droppedFinalCarry",
            DigitIssue::PlaceValueSwap => "placeValueSwap",
            DigitIssue::IncorrectSum => "incorrectSum",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DigitIssue::MissedCarryIn => "Forgot to add the incoming carry",
            DigitIssue::MissedCarryOut => "Did not create the carry for this column",
            DigitIssue::DroppedFinalCarry => "Missed the new leftmost digit created by carry",
            DigitIssue::PlaceValueSwap => "Digit belongs to a different place value",
            DigitIssue::IncorrectSum => "Incorrect addition of digits in this column",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DigitIssue::IncorrectSum => Severity::Medium,
            _ => Severity::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitAnalysisRow {
    /// ones, tens, hundreds, ...
    pub place: String,
    pub a: u8,
    pub b: u8,
    pub carry_in: u8,
    pub sum: u8,
    pub expected_digit: u8,
    pub expected_carry_out: u8,
    /// `None` where the user's answer has no digit at this place.
    pub user_digit: Option<u8>,
    pub issues: Vec<DigitIssue>,
}

/// Broad mistake category stored on each mistake record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MistakeKind {
    CarryingError,
    RegroupingError,
    PlaceValueError,
    BasicFactsError,
    ZeroHandlingError,
    MultiDigitError,
    AlignmentError,
    FactsRecallError,
    ZeroOneLawError,
    SquareRecognitionError,
    CommutativityConfusion,
    DistributionOpportunityMissed,
    MultiDigitStructureError,
    BorrowNeededMissed,
    GeneralError,
}

// --- Mistakes & Attempts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mistake {
    pub operator: Operator,
    pub left: u32,
    pub right: u32,
    /// `None` for learning-mode reveals and empty submissions.
    #[serde(default)]
    pub user_answer: Option<u32>,
    pub correct_answer: u32,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub subskills: Vec<Subskill>,
    #[serde(default)]
    pub root_causes: Vec<RootCauseCode>,
    #[serde(default)]
    pub mistake_types: Vec<MistakeKind>,
}

impl Mistake {
    pub fn key(&self) -> String {
        format!("{}{}{}", self.left, self.operator.symbol(), self.right)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub key: String,
    pub operator: Operator,
    pub left: u32,
    pub right: u32,
    pub answer: u32,
    pub user_answer: Option<u32>,
    /// `None` when the attempt was a learning-mode reveal.
    pub correct: Option<bool>,
    pub timestamp: i64,
    pub stage: Stage,
}

/// A learner's answer to a fact. `user_answer` is `None` when nothing was entered.
#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub fact: Fact,
    pub user_answer: Option<u32>,
}

// --- Stages & Streaks ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Stage {
    #[default]
    Foundational = 1,
    Open = 2,
}

impl Stage {
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for Stage {
    type Error = TrainerError;
    fn try_from(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Stage::Foundational),
            2 => Ok(Stage::Open),
            other => Err(TrainerError::InvalidStage(other)),
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        stage.number()
    }
}

/// Per-operator progression state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    #[serde(default)]
    pub stage: Stage,
    /// Stage-one counter: single-digit facts for addition/subtraction, stage-one facts for division.
    #[serde(default)]
    pub foundation: Tally,
    /// Multiplication table -> progress, only used by multiplication.
    #[serde(default)]
    pub tables: BTreeMap<u32, Tally>,
    /// Index of the active multiplication table.
    #[serde(default)]
    pub table_index: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub best_streak: u32,
}

// --- Diagnostic ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticQuestion {
    pub id: String,
    pub operator: Operator,
    pub left: u32,
    pub right: u32,
    pub answer: u32,
    /// Why the question was selected.
    pub rationale: String,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_answers() {
        assert_eq!(Fact::addition(47, 38).answer(), 85);
        assert_eq!(Fact::multiplication(7, 8).answer(), 56);
        assert_eq!(Fact::subtraction(3, 9).answer(), 6);
        assert_eq!(Fact::division(7, 6).answer(), 6);
        assert_eq!(Fact::division(7, 6).left(), 42);
    }

    #[test]
    fn test_fact_new_rejects_invalid() {
        assert!(Fact::new(Operator::Subtraction, 3, 9).is_err());
        assert!(Fact::new(Operator::Division, 10, 0).is_err());
        assert!(Fact::new(Operator::Division, 10, 3).is_err());
        assert!(Fact::new(Operator::Division, 12, 3).is_ok());
        assert!(Fact::new(Operator::Addition, 3, 9).is_ok());
    }

    #[test]
    fn test_fact_keys() {
        let f = Fact::multiplication(8, 3);
        assert_eq!(f.key(), "8x3");
        assert_eq!(f.mastery_key(), "3x8");
        assert_eq!(Fact::subtraction(9, 3).mastery_key(), "9-3");
    }

    #[test]
    fn test_subskill_round_trip_ids() {
        for sk in Subskill::ADDITION.iter().chain(Subskill::MULTIPLICATION.iter()) {
            assert_eq!(sk.as_str().parse::<Subskill>().unwrap(), *sk);
        }
        assert!("carry-everything".parse::<Subskill>().is_err());
        assert_eq!(Subskill::SquareNumbers.operator(), Operator::Multiplication);
    }

    #[test]
    fn test_subskill_serializes_as_id() {
        let json = serde_json::to_string(&Subskill::FactsZeroToNine).unwrap();
        assert_eq!(json, "\"facts-0-9\"");
    }

    #[test]
    fn test_tally_accuracy_and_normalize() {
        let mut t = Tally::default();
        assert_eq!(t.accuracy(), 0.0);
        t.record(true);
        t.record(false);
        assert_eq!(t, Tally::new(1, 2));
        assert_eq!(Tally::new(5, 3).normalized(), Tally::new(3, 3));
    }

    #[test]
    fn test_digit_helpers() {
        assert_eq!(digit_count(0), 1);
        assert_eq!(digit_count(9), 1);
        assert_eq!(digit_count(10), 2);
        assert_eq!(digit_count(1000), 4);
        assert_eq!(digits_of(103), vec![1, 0, 3]);
    }

    #[test]
    fn test_stage_numbers() {
        assert_eq!(Stage::try_from(2).unwrap(), Stage::Open);
        assert!(Stage::try_from(3).is_err());
        assert_eq!(serde_json::to_string(&Stage::Foundational).unwrap(), "1");
    }
}
