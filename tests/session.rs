// tests/session.rs

use arith_trainer::models::{Fact, Operator, Stage, StageState, Submission, Subskill, Tally};
use arith_trainer::pedagogy;
use arith_trainer::progression::StageChange;
use arith_trainer::repository::{SqliteRepository, StateRepository};
use arith_trainer::snapshot::Snapshot;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const NOW: i64 = 1_700_000_000_000;

fn answer(repo: &SqliteRepository, fact: Fact, user: Option<u32>) -> pedagogy::SubmissionOutcome {
    let submission = Submission { fact, user_answer: user };
    pedagogy::process_submission(repo, &submission, Some(4), NOW).unwrap()
}

#[test]
fn stage_one_addition_session_reaches_stage_two() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteRepository::open(&dir.path().join("trainer.db")).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let mut advanced = None;
    for _ in 0..40 {
        let fact = pedagogy::next_fact(&repo, Operator::Addition, &mut rng).unwrap();
        assert!(fact.left() < 10 && fact.right() < 10);
        let outcome = answer(&repo, fact, Some(fact.answer()));
        if outcome.stage_change.is_some() {
            advanced = outcome.stage_change;
        }
    }
    assert_eq!(advanced, Some(StageChange::StageAdvanced { stage: Stage::Open }));

    let stage = repo.load_stage(Operator::Addition).unwrap();
    assert_eq!(stage.stage, Stage::Open);
    assert_eq!(stage.foundation, Tally::new(40, 40));
    assert_eq!(repo.load_streak(Operator::Addition).unwrap().best_streak, 40);
    assert_eq!(repo.load_attempts(Operator::Addition).unwrap().len(), 40);
    let progress = repo.load_subskill_progress(Operator::Addition).unwrap();
    assert_eq!(progress[&Subskill::FactsZeroToNine].attempts, 40);
}

#[test]
fn multiplication_tables_unlock_in_order() {
    let repo = SqliteRepository::open_in_memory().unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut changes = Vec::new();

    for _ in 0..24 {
        let fact = pedagogy::next_fact(&repo, Operator::Multiplication, &mut rng).unwrap();
        let outcome = answer(&repo, fact, Some(fact.answer()));
        changes.extend(outcome.stage_change);
    }

    // table facts always involve the active table, so 12 correct answers unlock the next one
    assert_eq!(
        changes,
        vec![
            StageChange::TableUnlocked { table: 3 },
            StageChange::TableUnlocked { table: 4 },
        ]
    );
    let stage = repo.load_stage(Operator::Multiplication).unwrap();
    assert_eq!(stage.table_index, 2);
}

#[test]
fn state_survives_export_and_import() {
    let dir = tempfile::tempdir().unwrap();
    let source = SqliteRepository::open(&dir.path().join("a.db")).unwrap();
    answer(&source, Fact::addition(47, 38), Some(75));
    answer(&source, Fact::multiplication(7, 8), Some(56));
    pedagogy::enqueue_practice(&source, Fact::subtraction(12, 5)).unwrap();

    let path = dir.path().join("export.json");
    std::fs::write(&path, Snapshot::capture(&source).unwrap().to_json().unwrap()).unwrap();

    let target = SqliteRepository::open(&dir.path().join("b.db")).unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    Snapshot::from_json(&raw).unwrap().restore(&target).unwrap();

    assert_eq!(
        target.load_mistakes(Operator::Addition).unwrap(),
        source.load_mistakes(Operator::Addition).unwrap()
    );
    assert_eq!(target.load_fact_progress(Operator::Multiplication).unwrap()["7x8"], 1);
    assert_eq!(
        target.load_queue(Operator::Subtraction).unwrap(),
        vec![Fact::subtraction(12, 5)]
    );

    let report = pedagogy::learning_report(&target, Operator::Addition).unwrap();
    assert_eq!(report.total_mistakes, 1);
    assert!(!report.skill_gaps.is_empty());
}

#[test]
fn unreadable_import_keeps_existing_state() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SqliteRepository::open(&dir.path().join("trainer.db")).unwrap();
    answer(&repo, Fact::addition(47, 38), Some(75));

    let path = dir.path().join("garbage.json");
    std::fs::write(&path, "this is not an export").unwrap();
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(Snapshot::from_json(&raw).is_err());

    assert_eq!(repo.load_mistakes(Operator::Addition).unwrap().len(), 1);
    assert_eq!(repo.load_attempts(Operator::Addition).unwrap().len(), 1);
}

#[test]
fn learning_mode_and_overrides() {
    let repo = SqliteRepository::open_in_memory().unwrap();
    let outcome = answer(&repo, Fact::addition(9999, 1), None);
    assert_eq!(outcome.is_correct, None);
    assert_eq!(repo.load_mistakes(Operator::Addition).unwrap()[0].user_answer, None);

    pedagogy::force_stage(&repo, Operator::Subtraction, Stage::Open).unwrap();
    assert_eq!(repo.load_stage(Operator::Subtraction).unwrap().stage, Stage::Open);

    pedagogy::jump_to_table(&repo, 9).unwrap();
    pedagogy::reset_tables(&repo).unwrap();
    assert_eq!(repo.load_stage(Operator::Multiplication).unwrap(), StageState::default());
}
