//! Command handlers for pitchctl.

use crate::cli::Commands;
use crate::coalescer::{CoalescerSettings, FlushReport, WriteCoalescer};
use crate::config::PitchConfig;
use crate::display::{self, colors};
use crate::session::{
    spawn_countdown, PracticeSession, SessionInput, SessionReport, SessionRunner, SessionSetup,
};
use anyhow::{Context, Result};
use chrono::Utc;
use pitch_shared::leaderboard::{self, LeaderboardQuery};
use pitch_shared::store::{load_snapshot, validate_user_id};
use pitch_shared::{
    compute_score, GameMode, GameModeKind, HeuristicFeedback, OnboardingStep, PhraseClassifier,
    ProgressEngine, ProgressPatch, ProgressStore, Role, RoundMetrics, ScoreLog, TranscriptEvent,
    FileProgressStore, GAME_MODES,
};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Inputs buffered between the reader and the session
const INPUT_QUEUE: usize = 64;

/// Run one parsed command
pub async fn run(command: Commands, config: PitchConfig) -> Result<()> {
    match command {
        Commands::Replay { file, user, name, mode, json } => {
            let mode = mode.unwrap_or(config.session.default_mode);
            replay(&config, &file, &user, name, mode, json).await
        }
        Commands::Practice { user, name, mode } => {
            let mode = mode.unwrap_or(config.session.default_mode);
            practice(&config, &user, name, mode).await
        }
        Commands::Score { mode, level, correct, streak, streak_count, time_remaining } => {
            score(mode, level, correct, streak, streak_count, time_remaining);
            Ok(())
        }
        Commands::Status { user, json } => status(&config, &user, json),
        Commands::Achievements { user } => achievements(&config, &user),
        Commands::Leaderboard { mode, limit, best, friends, totals } => {
            leaderboard(&config, mode, limit, best, friends, totals)
        }
        Commands::Modes => {
            display::print_header("game modes");
            print!("{}", display::format_modes(GAME_MODES));
            Ok(())
        }
        Commands::Onboarding { user, complete } => onboarding(&config, &user, complete),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn open_store(config: &PitchConfig) -> Arc<dyn ProgressStore> {
    Arc::new(FileProgressStore::new(&config.store.data_dir))
}

fn new_session(
    config: &PitchConfig,
    store: &dyn ProgressStore,
    user: &str,
    name: Option<String>,
    mode: GameModeKind,
) -> Result<PracticeSession> {
    validate_user_id(user)?;
    let engine = ProgressEngine::default();
    let snapshot = load_snapshot(store, user, engine.table())
        .with_context(|| format!("Failed to load progress for {}", user))?;
    let classifier = Arc::new(PhraseClassifier::new()?);

    debug!("Loaded {} at level {} from {}", user, snapshot.level, config.store.data_dir.display());

    let setup = SessionSetup {
        user_id: user.to_string(),
        display_name: name.unwrap_or_else(|| user.to_string()),
        mode,
    };
    Ok(PracticeSession::new(setup, snapshot, engine, classifier))
}

fn runner(config: &PitchConfig, session: PracticeSession, coalescer: WriteCoalescer) -> SessionRunner {
    SessionRunner::new(session, coalescer)
        .with_score_log(ScoreLog::new(&config.store.data_dir))
        .with_feedback(Arc::new(HeuristicFeedback))
}

/// Drain the coalescer and wait for its writer; warns about dropped writes
async fn close_writes(coalescer: &WriteCoalescer, writer: JoinHandle<()>) -> Result<FlushReport> {
    let flushed = coalescer.shutdown().await?;
    writer.await.context("Write coalescer failed")?;
    if flushed.dropped > 0 {
        warn!("{} progress writes could not be saved", flushed.dropped);
    }
    Ok(flushed)
}

async fn replay(
    config: &PitchConfig,
    file: &Path,
    user: &str,
    name: Option<String>,
    mode: GameModeKind,
    json: bool,
) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut inputs = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let input: SessionInput = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: not a session input", file.display(), i + 1))?;
        inputs.push(input);
    }

    let store = open_store(config);
    let session = new_session(config, store.as_ref(), user, name, mode)?;
    let (coalescer, writer) = WriteCoalescer::spawn(store, CoalescerSettings::from(&config.persistence));

    let (tx, rx) = mpsc::channel(INPUT_QUEUE);
    let feeder = tokio::spawn(async move {
        for input in inputs {
            if tx.send(input).await.is_err() {
                break;
            }
        }
    });

    let report = runner(config, session, coalescer.clone()).run(rx).await?;
    feeder.await.context("Replay reader failed")?;

    close_writes(&coalescer, writer).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SessionReport) {
    let table = ProgressEngine::default().table().clone();
    display::print_header("session complete");
    print!("{}", display::format_session_report(report, &table));
    if let Some(feedback) = &report.feedback {
        display::print_header("feedback");
        print!("{}", display::format_feedback(feedback));
    }
}

/// Parse one typed line. `coach:` prefixes a coach line, `/stop` ends the session.
pub fn parse_practice_line(line: &str) -> Option<SessionInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "/stop" {
        return Some(SessionInput::Stop);
    }

    let (role, text) = match line.strip_prefix("coach:") {
        Some(rest) => (Role::Assistant, rest.trim()),
        None => (Role::User, line),
    };
    Some(SessionInput::Transcript(TranscriptEvent::final_text(role, text, Utc::now())))
}

async fn practice(config: &PitchConfig, user: &str, name: Option<String>, mode: GameModeKind) -> Result<()> {
    let store = open_store(config);
    let session = new_session(config, store.as_ref(), user, name, mode)?;
    let game_mode = GameMode::for_kind(mode);
    let (coalescer, writer) = WriteCoalescer::spawn(store, CoalescerSettings::from(&config.persistence));

    display::print_header(&format!("{} ({})", game_mode.name, game_mode.kind));
    println!("{}", game_mode.description);
    println!("{}type your pitch; 'coach: ...' for coach lines, /stop to finish{}", colors::DIM, colors::RESET);

    let (tx, rx) = mpsc::channel(INPUT_QUEUE);
    let countdown = game_mode
        .is_timed()
        .then(|| spawn_countdown(tx.clone(), Duration::from_secs(1)));

    // Plain thread: a blocked stdin read must not hold up runtime shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if let Some(input) = parse_practice_line(&line) {
                        if tx.blocking_send(input).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
        let _ = tx.blocking_send(SessionInput::Stop);
    });

    let report = runner(config, session, coalescer.clone()).run(rx).await?;
    if let Some(countdown) = countdown {
        countdown.abort();
    }

    close_writes(&coalescer, writer).await?;

    print_report(&report);
    Ok(())
}

fn score(mode: GameModeKind, level: u32, correct: u32, streak: u32, streak_count: u32, time_remaining: u32) {
    let metrics = RoundMetrics {
        correct_responses: correct,
        streak_count,
        time_remaining,
    };
    let score = compute_score(GameMode::for_kind(mode), level, &metrics, streak, time_remaining);
    println!("{}", score);
}

fn status(config: &PitchConfig, user: &str, json: bool) -> Result<()> {
    let store = FileProgressStore::new(&config.store.data_dir);
    let engine = ProgressEngine::default();
    let record = store
        .load(user)
        .with_context(|| format!("Failed to load progress for {}", user))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let (snapshot, onboarding) = match record {
        Some(record) => (record.to_snapshot(engine.table())?, record.onboarding),
        None => {
            println!("{}no progress yet for {}{}", colors::DIM, user, colors::RESET);
            return Ok(());
        }
    };

    display::print_header(&format!("pitchctl status v{}", env!("CARGO_PKG_VERSION")));
    print!("{}", display::format_status(user, &snapshot, engine.table(), &onboarding));
    Ok(())
}

fn achievements(config: &PitchConfig, user: &str) -> Result<()> {
    let store = FileProgressStore::new(&config.store.data_dir);
    let engine = ProgressEngine::default();
    let snapshot = load_snapshot(&store, user, engine.table())
        .with_context(|| format!("Failed to load progress for {}", user))?;

    display::print_header(&format!("achievements for {}", user));
    print!("{}", display::format_achievements(&snapshot));
    Ok(())
}

fn leaderboard(
    config: &PitchConfig,
    mode: Option<GameModeKind>,
    limit: usize,
    best: bool,
    friends: Vec<String>,
    totals: bool,
) -> Result<()> {
    let log = ScoreLog::new(&config.store.data_dir);
    let entries = log
        .read_all()
        .with_context(|| format!("Failed to read {}", log.path().display()))?;

    if totals {
        display::print_header("total score");
        print!("{}", display::format_totals(&leaderboard::totals_by_user(&entries)));
        return Ok(());
    }

    let query = LeaderboardQuery {
        mode,
        users: (!friends.is_empty()).then(|| friends.into_iter().collect()),
        best_per_user: best,
        limit,
    };
    let title = match mode {
        Some(kind) => format!("leaderboard: {}", kind),
        None => "leaderboard".to_string(),
    };
    display::print_header(&title);
    print!("{}", display::format_leaderboard(&leaderboard::rank(&entries, &query)));
    Ok(())
}

fn onboarding(config: &PitchConfig, user: &str, complete: Option<OnboardingStep>) -> Result<()> {
    let store = FileProgressStore::new(&config.store.data_dir);

    let progress = match complete {
        Some(step) => {
            let record = store
                .merge(user, &ProgressPatch::onboarding(&[step]), Utc::now())
                .with_context(|| format!("Failed to update onboarding for {}", user))?;
            println!("{}done:{} {}", colors::OK, colors::RESET, step.label());
            record.onboarding
        }
        None => store
            .load(user)
            .with_context(|| format!("Failed to load progress for {}", user))?
            .map(|r| r.onboarding)
            .unwrap_or_default(),
    };

    display::print_header(&format!("onboarding for {}", user));
    for step in OnboardingStep::ORDER {
        let mark = if progress.is_complete(step) { "x" } else { " " };
        println!("  [{}] {}", mark, step.label());
    }
    println!("\n{}% complete", progress.percent_complete());
    Ok(())
}
