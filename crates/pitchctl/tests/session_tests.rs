//! Session runner integration tests
//!
//! Drive full sessions through the runner with an in-memory store and check
//! what reaches the store, the score log and the feedback report.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use pitch_shared::achievements::{FIRST_WIN, PERFECT_PITCH, STREAK_5};
use pitch_shared::error::Result as PitchResult;
use pitch_shared::store::load_snapshot;
use pitch_shared::{
    FeedbackGenerator, FeedbackReport, FeedbackRequest, GameModeKind, HeuristicFeedback,
    MemoryProgressStore, Notification, OnboardingStep, PhraseClassifier, PitchError,
    ProgressEngine, ProgressPatch, ProgressRecord, ProgressStore, Role, ScoreLog, TranscriptEvent,
};
use pitchctl::{
    spawn_countdown, CoalescerSettings, PracticeSession, SessionInput, SessionReport, SessionRunner,
    SessionSetup, WriteCoalescer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn ts(step: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + ChronoDuration::seconds(step)
}

fn line(role: Role, text: &str, step: i64) -> SessionInput {
    SessionInput::Transcript(TranscriptEvent::final_text(role, text, ts(step)))
}

/// One user turn followed by the coach reply that judges it
fn exchange(inputs: &mut Vec<SessionInput>, user: &str, coach: &str) {
    let step = inputs.len() as i64;
    inputs.push(line(Role::User, user, step));
    inputs.push(line(Role::Assistant, coach, step + 1));
}

fn settings() -> CoalescerSettings {
    CoalescerSettings {
        flush_interval: Duration::from_secs(3600),
        max_batch: 100,
        queue_capacity: 16,
        max_retries: 3,
    }
}

fn new_session(store: &dyn ProgressStore, user: &str, mode: GameModeKind) -> PracticeSession {
    let engine = ProgressEngine::default();
    let snapshot = load_snapshot(store, user, engine.table()).unwrap();
    let setup = SessionSetup {
        user_id: user.to_string(),
        display_name: user.to_uppercase(),
        mode,
    };
    PracticeSession::new(setup, snapshot, engine, Arc::new(PhraseClassifier::new().unwrap()))
}

async fn run_session(
    store: Arc<dyn ProgressStore>,
    log: Option<ScoreLog>,
    user: &str,
    mode: GameModeKind,
    inputs: Vec<SessionInput>,
) -> SessionReport {
    let session = new_session(store.as_ref(), user, mode);
    let (coalescer, writer) = WriteCoalescer::spawn(store, settings());

    let (tx, rx) = mpsc::channel(inputs.len().max(1));
    for input in inputs {
        tx.send(input).await.unwrap();
    }
    drop(tx);

    let mut runner = SessionRunner::new(session, coalescer.clone()).with_feedback(Arc::new(HeuristicFeedback));
    if let Some(log) = log {
        runner = runner.with_score_log(log);
    }
    let report = runner.run(rx).await.unwrap();

    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();
    report
}

#[tokio::test]
async fn test_session_persists_progress_and_score() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryProgressStore::new());

    let mut inputs = vec![line(Role::Assistant, "Hi, I'm your prospect today.", 0)];
    exchange(&mut inputs, "We cut your onboarding time in half.", "Excellent response!");
    exchange(&mut inputs, "Price is fair for the value.", "Great job handling that objection.");
    exchange(&mut inputs, "Shall we start Monday?", "Strong close.");
    inputs.push(SessionInput::Stop);

    let report = run_session(
        store.clone(),
        Some(ScoreLog::new(dir.path())),
        "rep-1",
        GameModeKind::Mystery,
        inputs,
    )
    .await;

    let summary = &report.summary;
    assert_eq!(summary.metrics.correct_responses, 3);
    assert_eq!(summary.entry.score, 300);
    assert!(summary.entry.won);
    assert_eq!(summary.entry.display_name, "REP-1");

    // 50 + 30 + 40 = 120 crosses 100, the +100 bonus (220) then crosses 200
    assert_eq!(summary.snapshot.xp, 220 + 100);
    assert_eq!(summary.snapshot.level, 3);

    let record = store.load("rep-1").unwrap().unwrap();
    assert_eq!(record.xp, summary.snapshot.xp);
    assert_eq!(record.level, summary.snapshot.level);
    assert_eq!(record.total_games, 1);
    assert_eq!(record.games_won, 1);
    assert!(record.achievements.contains(PERFECT_PITCH));
    assert!(record.achievements.contains(FIRST_WIN));
    assert!(record.onboarding.is_complete(OnboardingStep::FirstSession));

    let entries = ScoreLog::new(dir.path()).read_all().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].score, 300);
    assert_eq!(entries[0].mode, GameModeKind::Mystery);

    let feedback = report.feedback.expect("feedback report");
    assert!(feedback.validate().is_ok());
}

#[tokio::test]
async fn test_notifications_arrive_in_order() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut inputs = Vec::new();
    exchange(&mut inputs, "Here's our pitch.", "Excellent response!");
    exchange(&mut inputs, "And the close.", "Excellent response!");

    let report = run_session(store, None, "rep-2", GameModeKind::Rpg, inputs).await;

    let unlocked: Vec<&str> = report
        .notifications
        .iter()
        .filter_map(|n| match n {
            Notification::AchievementUnlocked { id } => Some(id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unlocked, vec![PERFECT_PITCH, FIRST_WIN]);

    // Second turn reaches 100 XP and cascades to level 3
    let last = report.notifications.last().unwrap();
    assert_eq!(*last, Notification::LevelUp { level: 3 });
}

#[tokio::test]
async fn test_streak_milestone_paid_once_across_session() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut inputs = Vec::new();
    for _ in 0..7 {
        exchange(&mut inputs, "We handle that.", "Nicely addressed.");
    }

    let report = run_session(store, None, "rep-3", GameModeKind::Streak, inputs).await;

    let milestones: Vec<&Notification> = report
        .notifications
        .iter()
        .filter(|n| matches!(n, Notification::StreakMilestone { .. }))
        .collect();
    assert_eq!(
        milestones,
        vec![&Notification::StreakMilestone { streak: 5, bonus_xp: 50 }]
    );
    assert!(report.summary.snapshot.has_achievement(STREAK_5));
    assert_eq!(report.summary.snapshot.highest_streak, 7);
    assert!(report.summary.entry.won);
}

#[tokio::test]
async fn test_progress_carries_into_next_session() {
    let store = Arc::new(MemoryProgressStore::new());

    let mut first = Vec::new();
    exchange(&mut first, "Pitch one.", "Excellent response!");
    let report = run_session(store.clone(), None, "rep-4", GameModeKind::Rpg, first).await;
    let after_first = report.summary.snapshot.xp;

    let mut second = Vec::new();
    exchange(&mut second, "Pitch two.", "Excellent response!");
    let report = run_session(store.clone(), None, "rep-4", GameModeKind::Rpg, second).await;

    assert_eq!(report.summary.snapshot.total_games, 2);
    assert!(report.summary.snapshot.xp > after_first);
    // first_win and perfect_pitch are not announced again
    assert!(report
        .notifications
        .iter()
        .all(|n| !matches!(n, Notification::AchievementUnlocked { .. })));
    assert_eq!(store.load("rep-4").unwrap().unwrap().achievements.len(), 2);
}

#[tokio::test]
async fn test_time_attack_ends_when_clock_runs_out() {
    let store = Arc::new(MemoryProgressStore::new());
    let mut inputs = Vec::new();
    exchange(&mut inputs, "Quick pitch.", "Strong close.");
    for _ in 0..120 {
        inputs.push(SessionInput::Tick);
    }
    // Never reached
    exchange(&mut inputs, "Too late.", "Excellent response!");

    let report = run_session(store, None, "rep-5", GameModeKind::TimeAttack, inputs).await;

    assert_eq!(report.summary.metrics.time_remaining, 0);
    assert_eq!(report.summary.metrics.correct_responses, 1);
    assert_eq!(report.summary.entry.score, 30);
    assert!(!report.summary.entry.won);
}

/// Store whose writes always fail
struct UnwritableStore;

impl ProgressStore for UnwritableStore {
    fn load(&self, _user_id: &str) -> PitchResult<Option<ProgressRecord>> {
        Ok(None)
    }

    fn merge(&self, _user_id: &str, _patch: &ProgressPatch, _at: DateTime<Utc>) -> PitchResult<ProgressRecord> {
        Err(PitchError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        )))
    }
}

fn achievement_ids(report: &SessionReport) -> Vec<String> {
    report
        .summary
        .snapshot
        .achievements
        .iter()
        .map(|a| a.id.clone())
        .collect()
}

#[tokio::test]
async fn test_failed_writes_leave_session_result_intact() {
    let mut inputs = Vec::new();
    exchange(&mut inputs, "We cut your onboarding time in half.", "Excellent response!");
    exchange(&mut inputs, "Price is fair for the value.", "Great job handling that objection.");
    exchange(&mut inputs, "Shall we start Monday?", "Strong close.");
    inputs.push(SessionInput::Stop);

    let healthy = run_session(
        Arc::new(MemoryProgressStore::new()),
        None,
        "rep-7",
        GameModeKind::Rpg,
        inputs.clone(),
    )
    .await;
    let failing = run_session(Arc::new(UnwritableStore), None, "rep-7", GameModeKind::Rpg, inputs).await;

    let (want, got) = (&healthy.summary, &failing.summary);
    assert_eq!(got.snapshot.xp, want.snapshot.xp);
    assert_eq!(got.snapshot.level, want.snapshot.level);
    assert_eq!(got.snapshot.total_games, want.snapshot.total_games);
    assert_eq!(achievement_ids(&failing), achievement_ids(&healthy));
    assert_eq!(got.entry.score, want.entry.score);
    assert_eq!(got.entry.won, want.entry.won);
    assert_eq!(failing.notifications, healthy.notifications);
}

struct BrokenFeedback;

impl FeedbackGenerator for BrokenFeedback {
    fn generate(&self, _request: &FeedbackRequest<'_>) -> PitchResult<FeedbackReport> {
        Err(PitchError::InvalidReport("no strengths listed".to_string()))
    }
}

#[tokio::test]
async fn test_feedback_failure_does_not_fail_session() {
    let store = Arc::new(MemoryProgressStore::new());
    let session = new_session(store.as_ref(), "rep-6", GameModeKind::Mystery);
    let (coalescer, writer) = WriteCoalescer::spawn(store.clone(), settings());

    let (tx, rx) = mpsc::channel(4);
    tx.send(SessionInput::Stop).await.unwrap();
    drop(tx);

    let report = SessionRunner::new(session, coalescer.clone())
        .with_feedback(Arc::new(BrokenFeedback))
        .run(rx)
        .await
        .unwrap();
    coalescer.shutdown().await.unwrap();
    writer.await.unwrap();

    assert!(report.feedback.is_none());
    assert_eq!(store.load("rep-6").unwrap().unwrap().total_games, 1);
}

#[tokio::test]
async fn test_countdown_sends_ticks_until_closed() {
    let (tx, mut rx) = mpsc::channel(8);
    let countdown = spawn_countdown(tx, Duration::from_millis(5));

    for _ in 0..3 {
        let input = rx.recv().await.unwrap();
        assert_eq!(input, SessionInput::Tick);
    }

    drop(rx);
    tokio::time::timeout(Duration::from_secs(5), countdown)
        .await
        .expect("countdown stops once the session is gone")
        .unwrap();
}
