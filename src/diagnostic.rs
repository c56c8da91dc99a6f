// src/diagnostic.rs
//
// Diagnostic set: weak multiplication facts, then weak addition subskills, then recent
// misses, appended in that order and cut at `max_items`. The per-source shares bound the
// first two sources only; recent misses fill whatever room is left.

use crate::constants::*;
use crate::generator::targeted_addition;
use crate::models::{DiagnosticQuestion, Fact, FactProgress, Mistake, Operator, Subskill, SubskillProgress};
use log::debug;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Everything the builder reads. Borrowed so callers keep ownership of their state.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticInputs<'a> {
    pub addition_progress: &'a SubskillProgress,
    pub mult_fact_progress: &'a FactProgress,
    pub addition_mistakes: &'a [Mistake],
    pub mult_mistakes: &'a [Mistake],
}

#[derive(Debug, Default, Clone, Copy)]
struct FactStats {
    correct: u32,
    attempts: u32,
    /// 2 per miss inside the recency window, 1 per older miss.
    miss_weight: u32,
    recent: bool,
}

struct WeakFact {
    a: u32,
    b: u32,
    accuracy: f64,
    miss_weight: u32,
    score: f64,
}

// --- Public Interface ---

pub fn build_diagnostic_set<R: Rng + ?Sized>(
    inputs: &DiagnosticInputs<'_>,
    max_items: usize,
    now_ms: i64,
    rng: &mut R,
) -> Vec<DiagnosticQuestion> {
    let mut questions: Vec<DiagnosticQuestion> = Vec::new();

    for fact in weak_facts(inputs, now_ms, share(max_items, DIAGNOSTIC_WEAK_FACT_SHARE)) {
        let mut rationale = format!("Weak fact (accuracy {})", percent(fact.accuracy));
        if fact.miss_weight > 0 {
            rationale = format!(
                "Weak fact (accuracy {}, miss weight {})",
                percent(fact.accuracy),
                fact.miss_weight
            );
        }
        questions.push(DiagnosticQuestion {
            id: format!("mult-fact-{}-{}", fact.a, fact.b),
            operator: Operator::Multiplication,
            left: fact.a,
            right: fact.b,
            answer: fact.a * fact.b,
            rationale,
            tags: vec!["fact".to_string(), "multiplication".to_string()],
        });
    }

    for (subskill, accuracy) in weak_subskills(
        inputs.addition_progress,
        share(max_items, DIAGNOSTIC_WEAK_SUBSKILL_SHARE),
    ) {
        let fact = representative_addition(subskill, rng);
        questions.push(DiagnosticQuestion {
            id: format!("add-sub-{}-{}", subskill.as_str(), questions.len()),
            operator: Operator::Addition,
            left: fact.left(),
            right: fact.right(),
            answer: fact.answer(),
            rationale: format!("Subskill {} low accuracy {}", subskill.as_str(), percent(accuracy)),
            tags: vec!["addition".to_string(), subskill.as_str().to_string()],
        });
    }

    for mistake in recent_mistakes(inputs) {
        if questions.len() >= max_items {
            break;
        }
        let prefix = match mistake.operator {
            Operator::Multiplication => "mult",
            _ => "add",
        };
        let id = format!(
            "{}-recent-{}-{}-{}",
            prefix, mistake.left, mistake.right, mistake.timestamp
        );
        if questions.iter().any(|q| q.id == id) {
            continue;
        }
        questions.push(DiagnosticQuestion {
            id,
            operator: mistake.operator,
            left: mistake.left,
            right: mistake.right,
            answer: mistake.correct_answer,
            rationale: "Recent miss reinforcement".to_string(),
            tags: vec!["recent".to_string(), "reinforce".to_string()],
        });
    }

    questions.truncate(max_items);
    debug!("[Diagnostic] Built {} of {} questions", questions.len(), max_items);
    questions
}

// --- Sources ---

/// Multiplication facts in the 2..=9 table space that are not yet mastered, highest score first.
fn weak_facts(inputs: &DiagnosticInputs<'_>, now_ms: i64, limit: usize) -> Vec<WeakFact> {
    let in_range = |n: u32| (DIAGNOSTIC_FACT_MIN..=DIAGNOSTIC_FACT_MAX).contains(&n);
    let mut stats: BTreeMap<(u32, u32), FactStats> = BTreeMap::new();

    for (key, &count) in inputs.mult_fact_progress {
        let Some((a, b)) = parse_mult_key(key) else {
            continue;
        };
        if in_range(a) && in_range(b) {
            let entry = stats.entry((a.min(b), a.max(b))).or_default();
            entry.correct += count;
            entry.attempts += count;
        }
    }

    for mistake in inputs.mult_mistakes {
        let (a, b) = (mistake.left, mistake.right);
        if in_range(a) && in_range(b) {
            let entry = stats.entry((a.min(b), a.max(b))).or_default();
            entry.attempts += 1;
            if is_recent(now_ms, mistake.timestamp) {
                entry.miss_weight += 2;
                entry.recent = true;
            } else {
                entry.miss_weight += 1;
            }
        }
    }

    let mut weak: Vec<WeakFact> = stats
        .into_iter()
        .filter(|(_, s)| s.attempts > 0)
        .map(|((a, b), s)| {
            let accuracy = s.correct as f64 / s.attempts as f64;
            let recency = if s.recent { 1.0 } else { 0.0 };
            WeakFact {
                a,
                b,
                accuracy,
                miss_weight: s.miss_weight,
                score: DIAGNOSTIC_ACCURACY_WEIGHT * (1.0 - accuracy) + DIAGNOSTIC_RECENCY_WEIGHT * recency,
            }
        })
        .filter(|f| f.accuracy < DIAGNOSTIC_MASTERED_ACCURACY)
        .collect();

    weak.sort_by(|x, y| y.score.partial_cmp(&x.score).unwrap_or(Ordering::Equal));
    weak.truncate(limit);
    weak
}

/// Inside the last day. Future and out-of-range timestamps never count as recent.
fn is_recent(now_ms: i64, timestamp: i64) -> bool {
    now_ms
        .checked_sub(timestamp)
        .map_or(false, |age| (0..DAY_MILLIS).contains(&age))
}

/// Addition subskills with enough attempts and low accuracy, weakest first.
fn weak_subskills(progress: &SubskillProgress, limit: usize) -> Vec<(Subskill, f64)> {
    let mut weak: Vec<(Subskill, f64)> = progress
        .iter()
        .map(|(id, tally)| (*id, *tally))
        .filter(|(_, t)| t.attempts >= DIAGNOSTIC_SUBSKILL_MIN_ATTEMPTS)
        .map(|(id, t)| (id, t.accuracy()))
        .filter(|(_, acc)| *acc < DIAGNOSTIC_SUBSKILL_ACCURACY)
        .collect();
    weak.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(Ordering::Equal));
    weak.truncate(limit);
    weak
}

/// The latest addition and multiplication misses, newest first.
fn recent_mistakes<'a>(inputs: &DiagnosticInputs<'a>) -> Vec<&'a Mistake> {
    let mut recent: Vec<&Mistake> = tail(inputs.addition_mistakes, DIAGNOSTIC_RECENT_PER_OPERATOR)
        .iter()
        .chain(tail(inputs.mult_mistakes, DIAGNOSTIC_RECENT_PER_OPERATOR).iter())
        .collect();
    recent.sort_by(|x, y| y.timestamp.cmp(&x.timestamp));
    recent
}

/// One quick example per subskill. Several subskills use a fixed canonical sum.
fn representative_addition<R: Rng + ?Sized>(subskill: Subskill, rng: &mut R) -> Fact {
    match subskill {
        Subskill::FactsZeroToNine | Subskill::CarryTrigger | Subskill::MultiDigitFlow => {
            targeted_addition(subskill, rng)
        }
        Subskill::CarryPropagation => Fact::addition(87, 58),
        Subskill::FinalCarry => Fact::addition(450, 650),
        Subskill::PlaceAlignment if rng.gen_bool(0.5) => Fact::addition(7, 123),
        Subskill::PlaceAlignment => Fact::addition(123, 7),
        Subskill::ZeroIdentity => Fact::addition(30, 7),
        _ => Fact::addition(rng.gen_range(0..=99), rng.gen_range(0..=99)),
    }
}

// --- Helpers ---

fn share(max_items: usize, fraction: f64) -> usize {
    (max_items as f64 * fraction).ceil() as usize
}

fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Parses `7x8` into `(7, 8)`.
fn parse_mult_key(key: &str) -> Option<(u32, u32)> {
    let (a, b) = key.split_once('x')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}
