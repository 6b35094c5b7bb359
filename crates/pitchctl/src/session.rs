//! Practice Session
//!
//! `PracticeSession` is the synchronous core: it takes session inputs in
//! arrival order, pairs each final user turn with the coach reply that judges
//! it, and feeds the result through the progress engine. `SessionRunner`
//! drives it from a channel and pushes patches to the write coalescer.
//!
//! A judged turn is applied as `StreakTick { success }` followed by
//! `UserTurnScored(category)`, so a streak milestone reached by this turn is
//! paid out by this turn.

use crate::coalescer::WriteCoalescer;
use anyhow::Result;
use chrono::{DateTime, Utc};
use pitch_shared::{
    compute_score, FeedbackGenerator, FeedbackReport, FeedbackRequest, GameMode, GameModeKind,
    Notification, OnboardingStep, ProgressEngine, ProgressEvent, ProgressPatch, ProgressSnapshot,
    Role, RoundMetrics, RoundState, ScoreEntry, ScoreLog, Transcript, TranscriptEvent,
    TurnCategory, TurnClassifier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One input to a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionInput {
    /// A transcript line from the voice session
    Transcript(TranscriptEvent),
    /// One second of countdown
    Tick,
    /// End the session
    Stop,
}

/// Who is practicing what
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub user_id: String,
    pub display_name: String,
    pub mode: GameModeKind,
}

/// What one input changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    /// Category of the user turn judged by this input, if any
    pub judged: Option<TurnCategory>,
    pub notifications: Vec<Notification>,
    /// Patch to persist, if progress changed
    pub patch: Option<ProgressPatch>,
    /// The session should end now
    pub finished: bool,
}

/// Result of a finished session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub entry: ScoreEntry,
    pub metrics: RoundMetrics,
    pub round_level: u32,
    pub snapshot: ProgressSnapshot,
    /// Notifications from recording the game result
    pub notifications: Vec<Notification>,
    #[serde(skip)]
    pub patch: ProgressPatch,
}

pub struct PracticeSession {
    id: Uuid,
    setup: SessionSetup,
    mode: &'static GameMode,
    engine: ProgressEngine,
    classifier: Arc<dyn TurnClassifier>,
    snapshot: ProgressSnapshot,
    round: RoundState,
    transcript: Transcript,
    pending_user_turn: Option<String>,
    finished: bool,
}

impl PracticeSession {
    pub fn new(
        setup: SessionSetup,
        snapshot: ProgressSnapshot,
        engine: ProgressEngine,
        classifier: Arc<dyn TurnClassifier>,
    ) -> Self {
        let mode = GameMode::for_kind(setup.mode);
        Self {
            id: Uuid::new_v4(),
            setup,
            mode,
            engine,
            classifier,
            snapshot,
            round: RoundState::new(mode),
            transcript: Transcript::new(),
            pending_user_turn: None,
            finished: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    pub fn mode(&self) -> &'static GameMode {
        self.mode
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Apply one input at time `at`
    pub fn handle(&mut self, input: &SessionInput, at: DateTime<Utc>) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        if self.finished {
            outcome.finished = true;
            return outcome;
        }

        match input {
            SessionInput::Transcript(event) => self.on_transcript(event, at, &mut outcome),
            SessionInput::Tick => {
                if self.mode.is_timed() && self.round.tick() {
                    info!("Session {}: time is up", self.id);
                    self.finished = true;
                }
            }
            SessionInput::Stop => self.finished = true,
        }

        outcome.finished = self.finished;
        outcome
    }

    fn on_transcript(&mut self, event: &TranscriptEvent, at: DateTime<Utc>, outcome: &mut StepOutcome) {
        if !event.is_final {
            return;
        }
        self.transcript.push(event.clone());

        match event.role {
            Role::User => {
                self.pending_user_turn = Some(event.text.clone());
            }
            Role::Assistant => {
                // A coach line with no user turn before it (greeting) judges nothing
                if self.pending_user_turn.take().is_none() {
                    return;
                }

                let category = self.classifier.classify(&event.text);
                debug!("Session {}: turn judged {}", self.id, category);

                self.apply(ProgressEvent::StreakTick { success: category.is_correct() }, at, outcome);
                self.apply(ProgressEvent::scored(category), at, outcome);
                self.round.record_response(category.is_correct());

                outcome.judged = Some(category);
                outcome.patch = Some(ProgressPatch::progress(&self.snapshot));
            }
            Role::System => {}
        }
    }

    fn apply(&mut self, event: ProgressEvent, at: DateTime<Utc>, outcome: &mut StepOutcome) {
        let result = self.engine.apply(&self.snapshot, &event, at);
        self.snapshot = result.snapshot;
        outcome.notifications.extend(result.notifications);
    }

    /// Score the round and record the game result
    pub fn finish(&mut self, at: DateTime<Utc>) -> SessionSummary {
        self.finished = true;

        let metrics = self.round.metrics();
        let score = compute_score(
            self.mode,
            self.round.current_level,
            &metrics,
            self.round.best_streak,
            self.round.time_remaining,
        );
        let won = self.round.is_won();

        let result = self.engine.record_game_result(&self.snapshot, won, at);
        self.snapshot = result.snapshot;

        let mut patch = ProgressPatch::full(&self.snapshot);
        patch.merge(ProgressPatch::onboarding(&[
            OnboardingStep::FirstSession,
            OnboardingStep::JoinLeaderboard,
        ]));

        SessionSummary {
            session_id: self.id,
            entry: ScoreEntry {
                user_id: self.setup.user_id.clone(),
                display_name: self.setup.display_name.clone(),
                mode: self.mode.kind,
                score,
                won,
                achieved_at: at,
            },
            metrics,
            round_level: self.round.current_level,
            snapshot: self.snapshot.clone(),
            notifications: result.notifications,
            patch,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub summary: SessionSummary,
    /// Notifications raised during play, in order
    pub notifications: Vec<Notification>,
    pub feedback: Option<FeedbackReport>,
}

/// Drives a `PracticeSession` from an input channel
pub struct SessionRunner {
    session: PracticeSession,
    coalescer: WriteCoalescer,
    score_log: Option<ScoreLog>,
    feedback: Option<Arc<dyn FeedbackGenerator>>,
}

impl SessionRunner {
    pub fn new(session: PracticeSession, coalescer: WriteCoalescer) -> Self {
        Self {
            session,
            coalescer,
            score_log: None,
            feedback: None,
        }
    }

    pub fn with_score_log(mut self, score_log: ScoreLog) -> Self {
        self.score_log = Some(score_log);
        self
    }

    pub fn with_feedback(mut self, generator: Arc<dyn FeedbackGenerator>) -> Self {
        self.feedback = Some(generator);
        self
    }

    /// Process inputs in order until stop, expiry or the channel closes
    pub async fn run(mut self, mut inputs: mpsc::Receiver<SessionInput>) -> Result<SessionReport> {
        let user_id = self.session.setup().user_id.clone();
        info!(
            "Session {} started: {} playing {}",
            self.session.id(),
            user_id,
            self.session.mode().kind
        );

        let mut notifications = Vec::new();
        while let Some(input) = inputs.recv().await {
            let step = self.session.handle(&input, Utc::now());

            for n in &step.notifications {
                info!("Session {}: {}", self.session.id(), n);
            }
            notifications.extend(step.notifications);

            if let Some(patch) = step.patch {
                if let Err(e) = self.coalescer.submit(&user_id, patch).await {
                    warn!("Progress not queued for {}: {}", user_id, e);
                }
            }

            if step.finished {
                break;
            }
        }

        let summary = self.session.finish(Utc::now());
        for n in &summary.notifications {
            info!("Session {}: {}", summary.session_id, n);
        }

        if let Err(e) = self.coalescer.submit(&user_id, summary.patch.clone()).await {
            warn!("Final progress not queued for {}: {}", user_id, e);
        }

        if let Some(log) = &self.score_log {
            if let Err(e) = log.append(&summary.entry) {
                warn!("Score not recorded in {}: {}", log.path().display(), e);
            }
        }

        let feedback = self.feedback.as_ref().and_then(|generator| {
            let request = FeedbackRequest {
                transcript: self.session.transcript(),
                metrics: summary.metrics,
                mode: self.session.mode(),
                score: summary.entry.score,
            };
            match generator.generate(&request) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Feedback unavailable for session {}: {}", summary.session_id, e);
                    None
                }
            }
        });

        info!(
            "Session {} finished: score {} ({})",
            summary.session_id,
            summary.entry.score,
            if summary.entry.won { "won" } else { "not won" }
        );

        Ok(SessionReport {
            summary,
            notifications,
            feedback,
        })
    }
}

/// Send a `Tick` every `period` until the session stops listening
pub fn spawn_countdown(tx: mpsc::Sender<SessionInput>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if tx.send(SessionInput::Tick).await.is_err() {
                debug!("Countdown stopped, session closed");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pitch_shared::PhraseClassifier;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn session(mode: GameModeKind) -> PracticeSession {
        let setup = SessionSetup {
            user_id: "rep-1".to_string(),
            display_name: "Rep One".to_string(),
            mode,
        };
        let classifier = Arc::new(PhraseClassifier::new().unwrap());
        PracticeSession::new(setup, ProgressSnapshot::new(), ProgressEngine::default(), classifier)
    }

    fn line(role: Role, text: &str) -> SessionInput {
        SessionInput::Transcript(TranscriptEvent::final_text(role, text, at()))
    }

    #[test]
    fn test_greeting_judges_nothing() {
        let mut s = session(GameModeKind::Mystery);
        let step = s.handle(&line(Role::Assistant, "Excellent response! Welcome."), at());
        assert_eq!(step.judged, None);
        assert!(step.patch.is_none());
        assert_eq!(s.snapshot().xp, 0);
    }

    #[test]
    fn test_partial_events_ignored() {
        let mut s = session(GameModeKind::Mystery);
        let mut partial = TranscriptEvent::final_text(Role::User, "I think our prod", at());
        partial.is_final = false;
        s.handle(&SessionInput::Transcript(partial), at());
        let step = s.handle(&line(Role::Assistant, "Excellent response"), at());
        assert_eq!(step.judged, None);
        assert_eq!(s.transcript().len(), 1);
    }

    #[test]
    fn test_turn_judged_by_next_coach_line() {
        let mut s = session(GameModeKind::Mystery);
        s.handle(&line(Role::User, "Our tool cuts onboarding time in half."), at());
        let step = s.handle(&line(Role::Assistant, "Excellent response, very concrete."), at());

        assert_eq!(step.judged, Some(TurnCategory::Perfect));
        assert_eq!(s.snapshot().xp, 50);
        assert_eq!(s.snapshot().streak, 1);
        assert_eq!(s.round().correct_responses, 1);
        assert!(step.patch.is_some());
        assert!(step
            .notifications
            .iter()
            .any(|n| matches!(n, Notification::AchievementUnlocked { id } if id == "perfect_pitch")));

        // A second coach line without a new user turn is not scored again
        let step = s.handle(&line(Role::Assistant, "Excellent response"), at());
        assert_eq!(step.judged, None);
        assert_eq!(s.snapshot().xp, 50);
    }

    #[test]
    fn test_generic_reply_breaks_streak() {
        let mut s = session(GameModeKind::Streak);
        s.handle(&line(Role::User, "We handle that."), at());
        s.handle(&line(Role::Assistant, "Strong close!"), at());
        s.handle(&line(Role::User, "Anyway."), at());
        let step = s.handle(&line(Role::Assistant, "Tell me more."), at());

        assert_eq!(step.judged, Some(TurnCategory::Generic));
        assert_eq!(s.snapshot().streak, 0);
        assert_eq!(s.round().streak, 0);
        assert_eq!(s.round().best_streak, 1);
        assert_eq!(s.snapshot().xp, 40 + 25);
    }

    #[test]
    fn test_countdown_expires_timed_round() {
        let mut s = session(GameModeKind::TimeAttack);
        let limit = s.mode().time_limit_secs;
        for _ in 0..limit - 1 {
            assert!(!s.handle(&SessionInput::Tick, at()).finished);
        }
        assert!(s.handle(&SessionInput::Tick, at()).finished);
        assert!(s.is_finished());
    }

    #[test]
    fn test_ticks_ignored_when_untimed() {
        let mut s = session(GameModeKind::Rpg);
        for _ in 0..500 {
            assert!(!s.handle(&SessionInput::Tick, at()).finished);
        }
    }

    #[test]
    fn test_finish_records_game_result() {
        let mut s = session(GameModeKind::Mystery);
        for _ in 0..3 {
            s.handle(&line(Role::User, "Here's how we solve it."), at());
            s.handle(&line(Role::Assistant, "Great job handling that."), at());
        }
        s.handle(&SessionInput::Stop, at());

        let summary = s.finish(at());
        assert_eq!(summary.entry.score, 300);
        assert!(summary.entry.won);
        assert_eq!(summary.snapshot.total_games, 1);
        assert_eq!(summary.snapshot.games_won, 1);
        assert_eq!(summary.patch.total_games, Some(1));
        let onboarding = summary.patch.onboarding.as_ref().unwrap();
        assert!(onboarding.is_complete(OnboardingStep::FirstSession));
        assert!(onboarding.is_complete(OnboardingStep::JoinLeaderboard));
    }

    #[test]
    fn test_input_wire_format() {
        let input: SessionInput = serde_json::from_str(
            r#"{"type":"transcript","role":"user","text":"hi","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        match input {
            SessionInput::Transcript(event) => {
                assert_eq!(event.role, Role::User);
                assert!(event.is_final);
            }
            other => panic!("unexpected input {:?}", other),
        }

        let tick: SessionInput = serde_json::from_str(r#"{"type":"tick"}"#).unwrap();
        assert_eq!(tick, SessionInput::Tick);
    }
}
