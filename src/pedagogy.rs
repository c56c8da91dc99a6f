// src/pedagogy.rs
//
// Use cases driven by the front end. Each one loads the collections it needs from the
// repository, runs the pure core over them and writes the results back.

use crate::classifier;
use crate::column_analysis;
use crate::diagnostic::{self, DiagnosticInputs};
use crate::error::Result;
use crate::generator;
use crate::insights::{self, LearningReport};
use crate::mistake_types;
use crate::models::{
    digit_count, AttemptRecord, DiagnosticQuestion, DigitAnalysisRow, Fact, Mistake, MistakeKind,
    Operator, RootCause, Stage, StageState, StreakState, Submission, Subskill,
};
use crate::progression::{self, StageChange};
use crate::repository::StateRepository;
use crate::strategy_analysis;
use crate::streak;
use chrono::Utc;
use log::{debug, info};
use rand::Rng;
use serde::Serialize;

/// Everything the front end shows after an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub fact: Fact,
    pub correct_answer: u32,
    /// `None` when the answer was revealed instead of evaluated.
    pub is_correct: Option<bool>,
    pub subskills: Vec<Subskill>,
    pub root_causes: Vec<RootCause>,
    /// Column breakdown, only for wrong addition answers.
    pub breakdown: Vec<DigitAnalysisRow>,
    pub mistake_types: Vec<MistakeKind>,
    pub streak: StreakState,
    pub celebration: Option<String>,
    pub stage_change: Option<StageChange>,
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// True when the correct answer is too long to be typed and gets revealed instead.
pub fn is_learning_mode(fact: &Fact, answer_digit_limit: Option<usize>) -> bool {
    answer_digit_limit.map_or(false, |limit| digit_count(fact.answer()) > limit)
}

// --- Public Interface ---

pub fn next_fact<S, R>(repo: &S, operator: Operator, rng: &mut R) -> Result<Fact>
where
    S: StateRepository + ?Sized,
    R: Rng + ?Sized,
{
    // 1. Learner's own queue
    let mut queue = repo.load_queue(operator)?;
    if !queue.is_empty() {
        let fact = queue.remove(0);
        repo.save_queue(operator, &queue)?;
        info!("[Next] Serving queued fact {} ({} left)", fact, queue.len());
        return Ok(fact);
    }

    // 2. Stage-one drills
    let stage = repo.load_stage(operator)?;
    if stage.stage == Stage::Foundational {
        let fact = match operator {
            Operator::Addition => generator::single_digit_addition(rng),
            Operator::Subtraction => generator::subtraction_fact(Stage::Foundational, rng),
            Operator::Division => generator::division_fact(Stage::Foundational, rng),
            Operator::Multiplication => match progression::active_table(&stage) {
                Some(table) => generator::table_fact(table, rng),
                None => generator::random_multiplication(rng),
            },
        };
        debug!("[Next] Stage 1 {} fact {}", operator, fact);
        return Ok(fact);
    }

    // 3. Open stage, adaptive when enabled
    let adaptive = repo.load_adaptive(operator)?;
    let progress = repo.load_subskill_progress(operator)?;
    let fact = generator::next_adaptive(operator, &progress, adaptive, rng);
    debug!(
        "[Next] Stage 2 {} fact {} (adaptive: {}, target: {:?})",
        operator,
        fact,
        adaptive,
        fact.target()
    );
    Ok(fact)
}

/// Evaluates one answer and records it: subskill and fact progress, streak, attempt
/// history, mistake record and stage counters.
pub fn process_submission<S>(
    repo: &S,
    submission: &Submission,
    answer_digit_limit: Option<usize>,
    now_ms: i64,
) -> Result<SubmissionOutcome>
where
    S: StateRepository + ?Sized,
{
    let fact = submission.fact;
    let operator = fact.operator();
    let correct_answer = fact.answer();
    let subskills = classifier::classify(&fact);
    let stage = repo.load_stage(operator)?;

    if is_learning_mode(&fact, answer_digit_limit) {
        info!("[Submit] {} revealed as {} (learning mode)", fact, correct_answer);
        record_attempt(repo, &fact, None, None, &stage, now_ms)?;
        repo.append_mistake(&Mistake {
            operator,
            left: fact.left(),
            right: fact.right(),
            user_answer: None,
            correct_answer,
            timestamp: now_ms,
            subskills: subskills.clone(),
            root_causes: Vec::new(),
            mistake_types: Vec::new(),
        })?;
        return Ok(SubmissionOutcome {
            fact,
            correct_answer,
            is_correct: None,
            subskills,
            root_causes: Vec::new(),
            breakdown: Vec::new(),
            mistake_types: Vec::new(),
            streak: repo.load_streak(operator)?,
            celebration: None,
            stage_change: None,
        });
    }

    let user_answer = submission.user_answer;
    let is_correct = user_answer == Some(correct_answer);

    // 1. Progress maps
    if !subskills.is_empty() {
        let mut progress = repo.load_subskill_progress(operator)?;
        for subskill in &subskills {
            progress.entry(*subskill).or_default().record(is_correct);
        }
        repo.save_subskill_progress(operator, &progress)?;
    }
    if is_correct {
        let mut facts = repo.load_fact_progress(operator)?;
        *facts.entry(fact.mastery_key()).or_insert(0) += 1;
        repo.save_fact_progress(operator, &facts)?;
    }

    // 2. Streak
    let previous = repo.load_streak(operator)?;
    let streak = if is_correct {
        streak::increment(previous)
    } else {
        streak::reset(previous)
    };
    repo.save_streak(operator, &streak)?;
    let celebration = if is_correct {
        streak::milestone(&streak)
    } else {
        None
    };

    // 3. Diagnosis
    let (root_causes, breakdown, mistake_types) = match user_answer {
        Some(user) if !is_correct => diagnose(&fact, user),
        _ => (Vec::new(), Vec::new(), Vec::new()),
    };
    if !is_correct {
        repo.append_mistake(&Mistake {
            operator,
            left: fact.left(),
            right: fact.right(),
            user_answer,
            correct_answer,
            timestamp: now_ms,
            subskills: subskills.clone(),
            root_causes: root_causes.iter().map(|c| c.code).collect(),
            mistake_types: mistake_types.clone(),
        })?;
    }
    record_attempt(repo, &fact, user_answer, Some(is_correct), &stage, now_ms)?;

    // 4. Stage counters
    let (next_stage, stage_change) = progression::record_attempt(operator, &stage, &fact, is_correct);
    if next_stage != stage {
        repo.save_stage(operator, &next_stage)?;
    }

    info!(
        "[Submit] {} = {} answered {:?}: {} (streak {})",
        fact,
        correct_answer,
        user_answer,
        if is_correct { "correct" } else { "incorrect" },
        streak.streak
    );

    Ok(SubmissionOutcome {
        fact,
        correct_answer,
        is_correct: Some(is_correct),
        subskills,
        root_causes,
        breakdown,
        mistake_types,
        streak,
        celebration,
        stage_change,
    })
}

pub fn diagnostic_set<S, R>(repo: &S, max_items: usize, now_ms: i64, rng: &mut R) -> Result<Vec<DiagnosticQuestion>>
where
    S: StateRepository + ?Sized,
    R: Rng + ?Sized,
{
    let addition_progress = repo.load_subskill_progress(Operator::Addition)?;
    let mult_fact_progress = repo.load_fact_progress(Operator::Multiplication)?;
    let addition_mistakes = repo.load_mistakes(Operator::Addition)?;
    let mult_mistakes = repo.load_mistakes(Operator::Multiplication)?;
    let inputs = DiagnosticInputs {
        addition_progress: &addition_progress,
        mult_fact_progress: &mult_fact_progress,
        addition_mistakes: &addition_mistakes,
        mult_mistakes: &mult_mistakes,
    };
    let questions = diagnostic::build_diagnostic_set(&inputs, max_items, now_ms, rng);
    info!("[Diagnostic] Built {} questions (max {})", questions.len(), max_items);
    Ok(questions)
}

pub fn learning_report<S>(repo: &S, operator: Operator) -> Result<LearningReport>
where
    S: StateRepository + ?Sized,
{
    let mistakes = repo.load_mistakes(operator)?;
    Ok(insights::build_report(&mistakes))
}

/// Adds a fact to the end of the learner's queue; returns the new queue length.
pub fn enqueue_practice<S>(repo: &S, fact: Fact) -> Result<usize>
where
    S: StateRepository + ?Sized,
{
    let mut queue = repo.load_queue(fact.operator())?;
    queue.push(fact);
    repo.save_queue(fact.operator(), &queue)?;
    info!("[Queue] Added {} ({} queued)", fact, queue.len());
    Ok(queue.len())
}

pub fn set_adaptive<S>(repo: &S, operator: Operator, adaptive: bool) -> Result<()>
where
    S: StateRepository + ?Sized,
{
    repo.save_adaptive(operator, adaptive)
}

// --- Stage Overrides ---

pub fn force_stage<S>(repo: &S, operator: Operator, stage: Stage) -> Result<StageState>
where
    S: StateRepository + ?Sized,
{
    let state = progression::force_stage(&repo.load_stage(operator)?, stage);
    repo.save_stage(operator, &state)?;
    Ok(state)
}

pub fn reset_tables<S>(repo: &S) -> Result<StageState>
where
    S: StateRepository + ?Sized,
{
    let state = progression::reset_tables(&repo.load_stage(Operator::Multiplication)?);
    repo.save_stage(Operator::Multiplication, &state)?;
    Ok(state)
}

pub fn jump_to_table<S>(repo: &S, table: u32) -> Result<StageState>
where
    S: StateRepository + ?Sized,
{
    let state = progression::jump_to_table(&repo.load_stage(Operator::Multiplication)?, table)?;
    repo.save_stage(Operator::Multiplication, &state)?;
    Ok(state)
}

// --- Resets ---

pub fn reset_progress<S>(repo: &S, operator: Operator) -> Result<()>
where
    S: StateRepository + ?Sized,
{
    info!("[Reset] Clearing {} progress", operator);
    repo.clear_progress(operator)
}

pub fn reset_mistakes<S>(repo: &S, operator: Operator) -> Result<()>
where
    S: StateRepository + ?Sized,
{
    info!("[Reset] Clearing {} mistakes", operator);
    repo.clear_mistakes(operator)
}

pub fn reset_all<S>(repo: &S) -> Result<()>
where
    S: StateRepository + ?Sized,
{
    info!("[Reset] Clearing all learner state");
    repo.clear_all()
}

// --- Internal Logic ---

fn diagnose(fact: &Fact, user: u32) -> (Vec<RootCause>, Vec<DigitAnalysisRow>, Vec<MistakeKind>) {
    let (a, b, correct) = (fact.left(), fact.right(), fact.answer());
    let kinds = mistake_types::classify_mistake(fact.operator(), a, b, user, correct);
    match fact.operator() {
        Operator::Addition => (
            column_analysis::analyze_addition(a, b, user, correct),
            column_analysis::digit_breakdown(a, b, user, correct),
            kinds,
        ),
        Operator::Multiplication => (
            strategy_analysis::analyze_multiplication(a, b, user, correct),
            Vec::new(),
            kinds,
        ),
        Operator::Subtraction | Operator::Division => (Vec::new(), Vec::new(), kinds),
    }
}

fn record_attempt<S>(
    repo: &S,
    fact: &Fact,
    user_answer: Option<u32>,
    correct: Option<bool>,
    stage: &StageState,
    now_ms: i64,
) -> Result<()>
where
    S: StateRepository + ?Sized,
{
    repo.append_attempt(&AttemptRecord {
        key: fact.key(),
        operator: fact.operator(),
        left: fact.left(),
        right: fact.right(),
        answer: fact.answer(),
        user_answer,
        correct,
        timestamp: now_ms,
        stage: stage.stage,
    })
}
