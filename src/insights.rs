// src/insights.rs
//
// Learning report over the mistake history: which categories recur, which columns go
// wrong, and which addition subskills to work on first.

use crate::column_analysis::{digit_breakdown, place_label};
use crate::mistake_types::classify_mistake;
use crate::models::{DigitIssue, Mistake, MistakeKind, Operator, Severity, Subskill};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

const MAX_GAP_EXAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGap {
    pub kind: MistakeKind,
    pub description: String,
    pub count: usize,
    pub examples: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitIssueCount {
    pub issue: DigitIssue,
    pub count: usize,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceErrorCount {
    pub place: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSubskill {
    pub subskill: Subskill,
    pub label: String,
    pub description: String,
    pub prerequisites: Vec<Subskill>,
    pub evidence: Vec<String>,
    pub severity: Severity,
    /// Higher is more urgent.
    pub weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningReport {
    pub total_mistakes: usize,
    /// Sorted by count, most frequent first.
    pub skill_gaps: Vec<SkillGap>,
    pub digit_issues: Vec<DigitIssueCount>,
    /// Ones column first.
    pub place_errors: Vec<PlaceErrorCount>,
    pub recommendations: Vec<String>,
    /// Sorted by weight, most urgent first.
    pub focus_subskills: Vec<FocusSubskill>,
    /// Focus subskills reordered so prerequisites come before the skills that need them.
    pub learning_path: Vec<Subskill>,
}

// --- Public Interface ---

pub fn build_report(mistakes: &[Mistake]) -> LearningReport {
    let skill_gaps = skill_gaps(mistakes);
    let (digit_issues, place_errors) = column_statistics(mistakes);
    let recommendations = recommendations(&skill_gaps);
    let focus_subskills = focus_subskills(&skill_gaps, &digit_issues);
    let learning_path = learning_path(&focus_subskills);

    debug!(
        "[Insights] {} mistakes -> {} gaps, {} focus subskills",
        mistakes.len(),
        skill_gaps.len(),
        focus_subskills.len()
    );

    LearningReport {
        total_mistakes: mistakes.len(),
        skill_gaps,
        digit_issues,
        place_errors,
        recommendations,
        focus_subskills,
        learning_path,
    }
}

/// Categories stored on the mistake, or recomputed for records saved without them.
pub fn mistake_kinds(mistake: &Mistake) -> Vec<MistakeKind> {
    if !mistake.mistake_types.is_empty() {
        return mistake.mistake_types.clone();
    }
    match mistake.user_answer {
        Some(user) => classify_mistake(
            mistake.operator,
            mistake.left,
            mistake.right,
            user,
            mistake.correct_answer,
        ),
        None => Vec::new(),
    }
}

// --- Aggregation ---

fn skill_gaps(mistakes: &[Mistake]) -> Vec<SkillGap> {
    let mut gaps: Vec<SkillGap> = Vec::new();
    for mistake in mistakes {
        for kind in mistake_kinds(mistake) {
            let idx = match gaps.iter().position(|g| g.kind == kind) {
                Some(idx) => idx,
                None => {
                    gaps.push(SkillGap {
                        kind,
                        description: kind.description().to_string(),
                        count: 0,
                        examples: Vec::new(),
                        severity: kind.severity(),
                    });
                    gaps.len() - 1
                }
            };
            let gap = &mut gaps[idx];
            gap.count += 1;
            if gap.examples.len() < MAX_GAP_EXAMPLES {
                gap.examples.push(example(mistake));
            }
        }
    }
    gaps.sort_by(|a, b| b.count.cmp(&a.count));
    gaps
}

fn example(mistake: &Mistake) -> String {
    let symbol = match mistake.operator {
        Operator::Multiplication => "×",
        other => other.symbol(),
    };
    let user = mistake
        .user_answer
        .map_or_else(|| "nothing".to_string(), |u| u.to_string());
    format!(
        "{} {} {} = {} (you put {})",
        mistake.left, symbol, mistake.right, mistake.correct_answer, user
    )
}

/// Digit-issue frequencies and per-place error counts over every answered addition mistake.
fn column_statistics(mistakes: &[Mistake]) -> (Vec<DigitIssueCount>, Vec<PlaceErrorCount>) {
    let mut issues: Vec<DigitIssueCount> = Vec::new();
    let mut places: BTreeMap<usize, usize> = BTreeMap::new();

    for mistake in mistakes.iter().filter(|m| m.operator == Operator::Addition) {
        let Some(user) = mistake.user_answer else {
            continue;
        };
        let rows = digit_breakdown(mistake.left, mistake.right, user, mistake.correct_answer);
        let width = rows.len();
        for (i, row) in rows.iter().enumerate() {
            if !row.issues.is_empty() {
                *places.entry(width - 1 - i).or_insert(0) += 1;
            }
            for issue in &row.issues {
                match issues.iter_mut().find(|c| c.issue == *issue) {
                    Some(entry) => entry.count += 1,
                    None => issues.push(DigitIssueCount {
                        issue: *issue,
                        count: 1,
                        severity: issue.severity(),
                    }),
                }
            }
        }
    }

    issues.sort_by(|a, b| b.count.cmp(&a.count));
    let places = places
        .into_iter()
        .map(|(position, count)| PlaceErrorCount {
            place: place_label(position),
            count,
        })
        .collect();
    (issues, places)
}

fn recommendations(gaps: &[SkillGap]) -> Vec<String> {
    let mut seen = HashSet::new();
    gaps.iter()
        .flat_map(|g| g.kind.recommendations().iter())
        .filter(|r| seen.insert(**r))
        .map(|r| r.to_string())
        .collect()
}

// --- Focus Subskills ---

fn focus_subskills(gaps: &[SkillGap], digit_issues: &[DigitIssueCount]) -> Vec<FocusSubskill> {
    let issue_count = |issue: DigitIssue| {
        digit_issues
            .iter()
            .find(|c| c.issue == issue)
            .map_or(0, |c| c.count)
    };
    let has_gap = |kind: MistakeKind| gaps.iter().any(|g| g.kind == kind);
    let first_examples = |kinds: &[MistakeKind]| -> Vec<String> {
        gaps.iter()
            .filter(|g| kinds.contains(&g.kind))
            .filter_map(|g| g.examples.first().cloned())
            .collect()
    };
    let issue_evidence = |issue: DigitIssue| -> Vec<String> {
        match issue_count(issue) {
            0 => Vec::new(),
            n => vec![format!("{} ({}x)", issue.as_str(), n)],
        }
    };

    let mut focus = Vec::new();

    if has_gap(MistakeKind::BasicFactsError) || issue_count(DigitIssue::IncorrectSum) > 2 {
        focus.push(FocusSubskill {
            subskill: Subskill::FactsZeroToNine,
            label: Subskill::FactsZeroToNine.label().to_string(),
            description: "Quickly know sums like 7+5 or 8+6 without counting fingers.".to_string(),
            prerequisites: Vec::new(),
            evidence: first_examples(&[MistakeKind::BasicFactsError]),
            severity: if has_gap(MistakeKind::BasicFactsError) {
                Severity::Medium
            } else {
                Severity::Low
            },
            weight: 60,
        });
    }
    if has_gap(MistakeKind::CarryingError) || issue_count(DigitIssue::MissedCarryOut) > 0 {
        focus.push(FocusSubskill {
            subskill: Subskill::CarryTrigger,
            label: Subskill::CarryTrigger.label().to_string(),
            description: "Immediately notice when two digits sum to 10 or more (e.g. 8+7).".to_string(),
            prerequisites: vec![Subskill::FactsZeroToNine],
            evidence: issue_evidence(DigitIssue::MissedCarryOut),
            severity: Severity::High,
            weight: 90,
        });
    }
    if issue_count(DigitIssue::MissedCarryIn) > 0 {
        focus.push(FocusSubskill {
            subskill: Subskill::CarryPropagation,
            label: Subskill::CarryPropagation.label().to_string(),
            description: "When the previous column generated a carry, add that 1 before writing the digit."
                .to_string(),
            prerequisites: vec![Subskill::CarryTrigger],
            evidence: issue_evidence(DigitIssue::MissedCarryIn),
            severity: Severity::High,
            weight: 95,
        });
    }
    if issue_count(DigitIssue::DroppedFinalCarry) > 0 {
        focus.push(FocusSubskill {
            subskill: Subskill::FinalCarry,
            label: Subskill::FinalCarry.label().to_string(),
            description: "Write a new leftmost digit when the last column produces a carry.".to_string(),
            prerequisites: vec![Subskill::CarryPropagation],
            evidence: issue_evidence(DigitIssue::DroppedFinalCarry),
            severity: Severity::High,
            weight: 85,
        });
    }
    if has_gap(MistakeKind::PlaceValueError)
        || has_gap(MistakeKind::AlignmentError)
        || issue_count(DigitIssue::PlaceValueSwap) > 0
    {
        focus.push(FocusSubskill {
            subskill: Subskill::PlaceAlignment,
            label: Subskill::PlaceAlignment.label().to_string(),
            description: "Ones under ones, tens under tens; prevents swapped digits.".to_string(),
            prerequisites: vec![Subskill::FactsZeroToNine],
            evidence: first_examples(&[MistakeKind::PlaceValueError, MistakeKind::AlignmentError]),
            severity: Severity::High,
            weight: 80,
        });
    }
    if has_gap(MistakeKind::ZeroHandlingError) {
        focus.push(FocusSubskill {
            subskill: Subskill::ZeroIdentity,
            label: Subskill::ZeroIdentity.label().to_string(),
            description: "Recognize that adding 0 keeps the number unchanged.".to_string(),
            prerequisites: Vec::new(),
            evidence: first_examples(&[MistakeKind::ZeroHandlingError]),
            severity: Severity::Low,
            weight: 30,
        });
    }
    if has_gap(MistakeKind::RegroupingError) || has_gap(MistakeKind::MultiDigitError) {
        focus.push(FocusSubskill {
            subskill: Subskill::MultiDigitFlow,
            label: Subskill::MultiDigitFlow.label().to_string(),
            description: "Process each column: add digits, record digit, carry if needed, move left."
                .to_string(),
            prerequisites: vec![
                Subskill::CarryTrigger,
                Subskill::CarryPropagation,
                Subskill::PlaceAlignment,
            ],
            evidence: first_examples(&[MistakeKind::RegroupingError, MistakeKind::MultiDigitError]),
            severity: Severity::Medium,
            weight: 70,
        });
    }

    focus.sort_by(|a, b| b.weight.cmp(&a.weight));
    focus
}

/// Depth-first, prerequisites first. Prerequisites that are not themselves focus
/// subskills are skipped; a node already on the stack ends the descent.
fn learning_path(focus: &[FocusSubskill]) -> Vec<Subskill> {
    fn visit(
        id: Subskill,
        focus: &[FocusSubskill],
        visited: &mut HashSet<Subskill>,
        in_progress: &mut HashSet<Subskill>,
        ordered: &mut Vec<Subskill>,
    ) {
        if visited.contains(&id) || !in_progress.insert(id) {
            return;
        }
        let Some(node) = focus.iter().find(|f| f.subskill == id) else {
            return;
        };
        for prereq in &node.prerequisites {
            visit(*prereq, focus, visited, in_progress, ordered);
        }
        visited.insert(id);
        ordered.push(id);
    }

    let mut visited = HashSet::new();
    let mut in_progress = HashSet::new();
    let mut ordered = Vec::new();
    for node in focus {
        visit(node.subskill, focus, &mut visited, &mut in_progress, &mut ordered);
    }
    ordered
}
