// src/main.rs

use arith_trainer::column_analysis;
use arith_trainer::config::{self, TrainerConfig};
use arith_trainer::error::{Result, TrainerError};
use arith_trainer::mistake_types;
use arith_trainer::models::{Fact, Operator, Stage, Submission};
use arith_trainer::pedagogy::{self, SubmissionOutcome};
use arith_trainer::progression;
use arith_trainer::repository::{SqliteRepository, StateRepository};
use arith_trainer::snapshot::Snapshot;
use arith_trainer::strategy_analysis;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "arith-trainer", version)]
#[command(about = "Adaptive arithmetic practice with mistake diagnosis", long_about = None)]
struct Cli {
    /// SQLite database holding learner state
    #[arg(long, env = "ARITH_TRAINER_DB", global = true)]
    db: Option<PathBuf>,

    /// JSON config file
    #[arg(long, env = "ARITH_TRAINER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive practice on stdin
    Practice {
        #[arg(long)]
        op: Operator,
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// Target the weakest subskill once past stage 1
        #[arg(long)]
        adaptive: bool,
    },
    /// Diagnose a single answer without recording it
    Analyze {
        num1: u32,
        num2: u32,
        user: u32,
        #[arg(long, default_value = "addition")]
        op: Operator,
    },
    /// Build a diagnostic practice set
    Diagnostic {
        #[arg(long)]
        max: Option<usize>,
    },
    /// Learning report over recorded mistakes
    Report {
        #[arg(long)]
        op: Operator,
    },
    /// Show or override stage progression
    Stage {
        #[arg(long)]
        op: Operator,
        #[command(subcommand)]
        action: StageAction,
    },
    /// Queue a fact to be served next
    Queue {
        #[arg(long)]
        op: Operator,
        num1: u32,
        num2: u32,
    },
    /// Clear recorded state
    Reset {
        target: ResetTarget,
        /// Limit to one operator (all operators when omitted)
        #[arg(long)]
        op: Option<Operator>,
    },
    /// Write all learner state to a JSON file
    Export { file: PathBuf },
    /// Replace all learner state with a JSON file
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum StageAction {
    Show,
    /// Move to stage 2
    Advance,
    /// Back to stage 1 (multiplication also restarts at table 2)
    Reset,
    /// Drill a specific multiplication table
    Table { number: u32 },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ResetTarget {
    Progress,
    Mistakes,
    All,
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let loaded = TrainerConfig::load_or_default(&config_path);
    let (config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (TrainerConfig::default(), Some(e)),
    };
    let config = config.with_overrides(cli.db.clone(), cli.log_level.clone());

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    if let Some(e) = config_error {
        error!("Failed to read config {:?}: {}", config_path, e);
        std::process::exit(1);
    }

    info!("Starting arith-trainer...");
    info!("Database path: {:?}", config.db_path);

    if let Err(e) = run(cli.command, &config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Command, config: &TrainerConfig) -> Result<()> {
    let open = || SqliteRepository::open(&config.db_path);
    match command {
        // Pure analysis needs no storage.
        Command::Analyze { num1, num2, user, op } => analyze(op, num1, num2, user),
        Command::Practice { op, count, adaptive } => practice(&open()?, config, op, count, adaptive),
        Command::Diagnostic { max } => {
            let repo = open()?;
            let max = max.unwrap_or(config.diagnostic_max_items);
            let questions =
                pedagogy::diagnostic_set(&repo, max, pedagogy::now_ms(), &mut rand::thread_rng())?;
            if questions.is_empty() {
                println!("Nothing to diagnose yet. Practice a few facts first.");
            }
            for (i, q) in questions.iter().enumerate() {
                let fact = Fact::new(q.operator, q.left, q.right)?;
                println!("{:>2}. {} = ?   [{}]", i + 1, fact, q.rationale);
            }
            Ok(())
        }
        Command::Report { op } => {
            let report = pedagogy::learning_report(&open()?, op)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Stage { op, action } => stage(&open()?, op, action),
        Command::Queue { op, num1, num2 } => {
            let queued = pedagogy::enqueue_practice(&open()?, Fact::new(op, num1, num2)?)?;
            println!("Queued {} {} {} ({} waiting)", num1, op.symbol(), num2, queued);
            Ok(())
        }
        Command::Reset { target, op } => reset(&open()?, target, op),
        Command::Export { file } => {
            let json = Snapshot::capture(&open()?)?.to_json()?;
            fs::write(&file, json)?;
            println!("Exported to {}", file.display());
            Ok(())
        }
        Command::Import { file } => {
            let raw = fs::read_to_string(&file)?;
            // Parse before touching the store so a bad file leaves it as it was.
            let snapshot = Snapshot::from_json(&raw)?;
            snapshot.restore(&open()?)?;
            println!("Imported {}", file.display());
            Ok(())
        }
    }
}

// --- Commands ---

fn practice(
    repo: &SqliteRepository,
    config: &TrainerConfig,
    op: Operator,
    count: usize,
    adaptive: bool,
) -> Result<()> {
    if adaptive {
        pedagogy::set_adaptive(repo, op, true)?;
    }
    let mut rng = rand::thread_rng();
    let limit = config.answer_digit_limit(op);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    for round in 1..=count {
        let fact = pedagogy::next_fact(repo, op, &mut rng)?;

        let user_answer = if pedagogy::is_learning_mode(&fact, limit) {
            println!("[{}/{}] {} = {}  (watch this one)", round, count, fact, fact.answer());
            None
        } else {
            print!("[{}/{}] {} = ", round, count, fact);
            io::stdout().flush()?;
            let Some(line) = lines.next() else { break };
            let line = line?;
            let input = line.trim();
            if input.eq_ignore_ascii_case("q") {
                break;
            }
            input.parse::<u32>().ok()
        };

        let submission = Submission { fact, user_answer };
        let outcome = pedagogy::process_submission(repo, &submission, limit, pedagogy::now_ms())?;
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &SubmissionOutcome) {
    match outcome.is_correct {
        Some(true) => println!("  Correct!"),
        Some(false) => println!("  Not quite: {} = {}", outcome.fact, outcome.correct_answer),
        None => {}
    }
    for cause in &outcome.root_causes {
        println!("  - {}: {}", cause.label, cause.explanation);
        println!("    Tip: {}", cause.practice_tip);
    }
    if !outcome.breakdown.is_empty() {
        print_breakdown(&outcome.breakdown);
    }
    if let Some(tag) = &outcome.celebration {
        println!("  * {} (streak {})", tag, outcome.streak.streak);
    }
    if let Some(change) = &outcome.stage_change {
        println!("  * {:?}", change);
    }
}

fn print_breakdown(rows: &[arith_trainer::models::DigitAnalysisRow]) {
    println!("  {:<10} {:>3} {:>3} {:>5} {:>4} {:>4}  issues", "place", "a", "b", "carry", "want", "got");
    for row in rows {
        let got = row.user_digit.map_or("-".to_string(), |d| d.to_string());
        let issues: Vec<&str> = row.issues.iter().map(|i| i.as_str()).collect();
        println!(
            "  {:<10} {:>3} {:>3} {:>5} {:>4} {:>4}  {}",
            row.place,
            row.a,
            row.b,
            row.carry_in,
            row.expected_digit,
            got,
            issues.join(", ")
        );
    }
}

fn analyze(op: Operator, num1: u32, num2: u32, user: u32) -> Result<()> {
    let fact = Fact::new(op, num1, num2)?;
    let correct = fact.answer();
    let causes = match op {
        Operator::Addition => column_analysis::analyze_addition(num1, num2, user, correct),
        Operator::Multiplication => strategy_analysis::analyze_multiplication(num1, num2, user, correct),
        other => return Err(TrainerError::UnknownOperator(format!("{} has no analyzer", other))),
    };

    println!("{} = {} (answered {})", fact, correct, user);
    if causes.is_empty() {
        println!("  Correct!");
        return Ok(());
    }
    for cause in &causes {
        println!("  - [{}] {}: {}", cause.severity.as_str(), cause.label, cause.explanation);
        println!("    Tip: {}", cause.practice_tip);
    }
    if op == Operator::Addition {
        print_breakdown(&column_analysis::digit_breakdown(num1, num2, user, correct));
    }
    let kinds = mistake_types::classify_mistake(op, num1, num2, user, correct);
    let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
    println!("  Categories: {}", names.join(", "));
    Ok(())
}

fn stage(repo: &SqliteRepository, op: Operator, action: StageAction) -> Result<()> {
    let state = match action {
        StageAction::Show => repo.load_stage(op)?,
        StageAction::Advance => pedagogy::force_stage(repo, op, Stage::Open)?,
        StageAction::Reset if op == Operator::Multiplication => pedagogy::reset_tables(repo)?,
        StageAction::Reset => pedagogy::force_stage(repo, op, Stage::Foundational)?,
        StageAction::Table { number } => {
            if op != Operator::Multiplication {
                return Err(TrainerError::UnknownTable(number));
            }
            pedagogy::jump_to_table(repo, number)?
        }
    };

    println!("{}: stage {}", op, state.stage.number());
    if op == Operator::Multiplication {
        if let Some(table) = progression::active_table(&state) {
            println!("  active table: {}", table);
        }
        for (table, tally) in &state.tables {
            println!("  table {:>2}: {}/{}", table, tally.correct, tally.attempts);
        }
    } else {
        let (required, accuracy) = progression::foundation_rule(op);
        println!(
            "  foundation: {}/{} (needs {} at {:.0}%)",
            state.foundation.correct,
            state.foundation.attempts,
            required,
            accuracy * 100.0
        );
    }
    Ok(())
}

fn reset(repo: &SqliteRepository, target: ResetTarget, op: Option<Operator>) -> Result<()> {
    let operators: Vec<Operator> = match op {
        Some(op) => vec![op],
        None => Operator::ALL.to_vec(),
    };
    match target {
        ResetTarget::Progress => {
            for op in operators {
                pedagogy::reset_progress(repo, op)?;
            }
        }
        ResetTarget::Mistakes => {
            for op in operators {
                pedagogy::reset_mistakes(repo, op)?;
            }
        }
        ResetTarget::All => pedagogy::reset_all(repo)?,
    }
    println!("Reset {:?}", target);
    Ok(())
}
