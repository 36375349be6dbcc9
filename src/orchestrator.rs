//! Session lifecycle: idle → starting → countdown → active → finishing →
//! waiting-restart.
//!
//! The orchestrator never performs I/O or sleeps. Every operation returns the
//! [`Effect`]s it wants carried out: network requests and delayed wakes for
//! the runtime, and view updates for the presentation layer. Completions come
//! back tagged with the session generation they were issued for, and anything
//! tagged with an older generation is dropped.

use crate::client::{ScoreSubmission, ServerScore, SessionError, SessionStart};
use crate::engine::{InputOutcome, ScoreCounters, TypingEngine, TypingProgress};
use crate::engine::{DEFAULT_NEXT_WORD_DELAY, DEFAULT_WORDS_PER_SESSION};
use crate::metrics::Metrics;
use crate::session::{CountdownStep, SessionPhase, SessionRecord};
use crate::session::{COUNTDOWN_INTERVAL, TIMER_INTERVAL};
use crate::words::WordBank;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub words_per_session: u32,
    pub next_word_delay: Duration,
    pub countdown_interval: Duration,
    pub timer_interval: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            words_per_session: DEFAULT_WORDS_PER_SESSION,
            next_word_delay: DEFAULT_NEXT_WORD_DELAY,
            countdown_interval: COUNTDOWN_INTERVAL,
            timer_interval: TIMER_INTERVAL,
        }
    }
}

/// Delayed self-notifications the orchestrator schedules through the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    CountdownStep,
    NextWord,
    TimerTick,
}

/// Live counters plus the local estimate, for the score display
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scoreboard {
    pub elapsed: Duration,
    pub counters: ScoreCounters,
    pub metrics: Metrics,
}

/// Final outcome of a session as shown to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub category: String,
    pub counters: ScoreCounters,
    pub elapsed: Duration,
    pub metrics: Metrics,
    pub is_guest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PlayingAsGuest,
    StartFailed(String),
    NoWordsAvailable(String),
    UnknownCategory(String),
    SessionAborted,
    Submitting,
    SubmitFailed(String),
    ScoreSaved,
    ThanksForPlaying,
    ScoreDiscarded,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::PlayingAsGuest => write!(f, "playing as guest, score will not be saved"),
            Notice::StartFailed(e) => {
                write!(f, "could not reach score service ({e}), playing as guest")
            }
            Notice::NoWordsAvailable(id) => write!(f, "no words available in {id}"),
            Notice::UnknownCategory(id) => write!(f, "unknown category {id}"),
            Notice::SessionAborted => write!(f, "session aborted"),
            Notice::Submitting => write!(f, "sending results..."),
            Notice::SubmitFailed(e) => {
                write!(f, "could not send results ({e}), press enter to retry")
            }
            Notice::ScoreSaved => write!(f, "finished! score saved"),
            Notice::ThanksForPlaying => write!(f, "finished! thanks for playing"),
            Notice::ScoreDiscarded => write!(f, "results discarded"),
        }
    }
}

/// Label of the single start/stop control for the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ControlLabel {
    #[strum(serialize = "start")]
    Start,
    #[strum(serialize = "starting...")]
    Starting,
    #[strum(serialize = "get ready")]
    CountingDown,
    #[strum(serialize = "stop")]
    Stop,
    #[strum(serialize = "sending...")]
    Submitting,
    #[strum(serialize = "retry")]
    Retry,
    #[strum(serialize = "replay")]
    Replay,
}

impl ControlLabel {
    pub fn is_busy(&self) -> bool {
        matches!(self, ControlLabel::Starting | ControlLabel::Submitting)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the session client for a new session
    RequestSession { generation: u64, category: String },
    /// Send the finished session's counters
    SubmitScore {
        generation: u64,
        submission: ScoreSubmission,
    },
    /// Deliver `wake` back after `delay`
    Schedule {
        generation: u64,
        wake: Wake,
        delay: Duration,
    },
    PhaseChanged(SessionPhase),
    CategoryChanged(String),
    Countdown(CountdownStep),
    WordIssued(String),
    Keystroke(InputOutcome),
    /// The visible input buffer must show exactly this text
    SetInput(String),
    Scoreboard(Scoreboard),
    Notice(Notice),
    Finished(SessionSummary),
}

impl Effect {
    /// Effects the runtime has to carry out, as opposed to view updates
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Effect::RequestSession { .. } | Effect::SubmitScore { .. } | Effect::Schedule { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct PendingScore {
    submission: ScoreSubmission,
    in_flight: bool,
    last_error: Option<String>,
}

/// Everything that belongs to one session; rebuilt on every start.
#[derive(Debug, Clone)]
struct SessionContext {
    record: Option<SessionRecord>,
    countdown: Option<CountdownStep>,
    finished_at: Option<DateTime<Utc>>,
    pending: Option<PendingScore>,
}

impl SessionContext {
    fn new() -> Self {
        Self {
            record: None,
            countdown: None,
            finished_at: None,
            pending: None,
        }
    }
}

pub struct Orchestrator {
    settings: GameSettings,
    words: WordBank,
    category: String,
    rng: StdRng,
    phase: SessionPhase,
    generation: u64,
    engine: TypingEngine,
    ctx: SessionContext,
    summary: Option<SessionSummary>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("category", &self.category)
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("counters", &self.engine.counters())
            .finish()
    }
}

impl Orchestrator {
    /// `category` falls back to the first category of `words` when unknown.
    pub fn new(words: WordBank, category: Option<&str>, settings: GameSettings) -> Self {
        let category = words.resolve_id(category).unwrap_or_default().to_string();
        Self {
            engine: TypingEngine::new(settings.words_per_session),
            settings,
            words,
            category,
            rng: StdRng::from_entropy(),
            phase: SessionPhase::Idle,
            generation: 0,
            ctx: SessionContext::new(),
            summary: None,
        }
    }

    /// Replaces the word picker's randomness, for reproducible sessions
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn words(&self) -> &WordBank {
        &self.words
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.ctx.record.as_ref()
    }

    pub fn counters(&self) -> ScoreCounters {
        self.engine.counters()
    }

    pub fn progress(&self) -> Option<&TypingProgress> {
        self.engine.progress()
    }

    pub fn countdown(&self) -> Option<CountdownStep> {
        self.ctx.countdown
    }

    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// Payload of the finished session awaiting (re)submission
    pub fn pending_submission(&self) -> Option<&ScoreSubmission> {
        self.ctx.pending.as_ref().map(|p| &p.submission)
    }

    pub fn submission_error(&self) -> Option<&str> {
        self.ctx.pending.as_ref().and_then(|p| p.last_error.as_deref())
    }

    pub fn can_retry_submission(&self) -> bool {
        self.phase == SessionPhase::Finishing
            && self.ctx.pending.as_ref().is_some_and(|p| !p.in_flight)
    }

    pub fn control_label(&self) -> ControlLabel {
        match self.phase {
            SessionPhase::Idle => ControlLabel::Start,
            SessionPhase::Starting => ControlLabel::Starting,
            SessionPhase::CountingDown => ControlLabel::CountingDown,
            SessionPhase::Active => ControlLabel::Stop,
            SessionPhase::Finishing if self.can_retry_submission() => ControlLabel::Retry,
            SessionPhase::Finishing => ControlLabel::Submitting,
            SessionPhase::WaitingRestart => ControlLabel::Replay,
        }
    }

    /// Time since typing began in the current session
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let until = self.ctx.finished_at.unwrap_or(now);
        self.ctx
            .record
            .as_ref()
            .map(|r| r.local_elapsed(until))
            .unwrap_or_default()
    }

    pub fn scoreboard(&self, now: DateTime<Utc>) -> Scoreboard {
        let elapsed = self.elapsed(now);
        let counters = self.engine.counters();
        Scoreboard {
            elapsed,
            counters,
            metrics: Metrics::estimate(&counters, elapsed),
        }
    }

    /// The start/stop control: starts, stops early, or retries a failed submission.
    pub fn press_control(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::WaitingRestart => self.start(),
            SessionPhase::Active => {
                info!(counters = ?self.engine.counters(), "session stopped early");
                self.finish(now)
            }
            SessionPhase::Finishing => self.retry_submission(),
            SessionPhase::Starting | SessionPhase::CountingDown => {
                debug!(phase = %self.phase, "control ignored while busy");
                vec![]
            }
        }
    }

    /// The replay confirmation. Abandons a failed submission if one is pending.
    pub fn request_restart(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        match self.phase {
            SessionPhase::WaitingRestart => self.start(),
            SessionPhase::Finishing if self.can_retry_submission() => {
                let mut effects = self.abandon_submission(now);
                effects.extend(self.start());
                effects
            }
            _ => vec![],
        }
    }

    pub fn retry_submission(&mut self) -> Vec<Effect> {
        if !self.can_retry_submission() {
            return vec![];
        }
        let Some(pending) = self.ctx.pending.as_mut() else {
            return vec![];
        };
        pending.in_flight = true;
        info!(session_id = %pending.submission.session_id, "retrying score submission");
        vec![
            Effect::Notice(Notice::Submitting),
            Effect::SubmitScore {
                generation: self.generation,
                submission: pending.submission.clone(),
            },
        ]
    }

    /// Gives up on a failed submission and settles with the local estimate.
    pub fn abandon_submission(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        if !self.can_retry_submission() {
            return vec![];
        }
        warn!("abandoning unsent score");
        let summary = self.local_summary(now);
        self.ctx.pending = None;
        self.settle(summary, Notice::ScoreDiscarded)
    }

    pub fn select_category(&mut self, id: &str) -> Vec<Effect> {
        if self.words.category(id).is_none() {
            warn!(category = id, "ignoring unknown category");
            return vec![Effect::Notice(Notice::UnknownCategory(id.to_string()))];
        }
        if id == self.category {
            return vec![];
        }

        let mut effects = vec![];
        if !self.phase.is_settled() {
            info!(phase = %self.phase, "category changed mid-session, aborting");
            effects.extend(self.abort());
        }
        self.category = id.to_string();
        effects.push(Effect::CategoryChanged(self.category.clone()));
        effects
    }

    pub fn submit_input(&mut self, value: &str, now: DateTime<Utc>) -> Vec<Effect> {
        if self.phase != SessionPhase::Active {
            debug!(phase = %self.phase, "discarding input");
            if value.is_empty() {
                return vec![];
            }
            return vec![Effect::SetInput(String::new())];
        }

        let outcome = self.engine.submit_input(value);
        let mut effects = vec![Effect::Keystroke(outcome)];
        if outcome.reverts_buffer() {
            effects.push(Effect::SetInput(self.engine.typed_prefix().to_string()));
        }
        if outcome.changes_score() {
            effects.push(Effect::Scoreboard(self.scoreboard(now)));
        }

        match outcome {
            InputOutcome::WordCompleted(_) => effects.push(Effect::Schedule {
                generation: self.generation,
                wake: Wake::NextWord,
                delay: self.settings.next_word_delay,
            }),
            InputOutcome::SessionCompleted(_) => {
                info!(counters = ?self.engine.counters(), "all words completed");
                effects.extend(self.finish(now));
            }
            _ => {}
        }
        effects
    }

    pub fn on_session_started(
        &mut self,
        generation: u64,
        result: Result<SessionStart, SessionError>,
    ) -> Vec<Effect> {
        if generation != self.generation || self.phase != SessionPhase::Starting {
            debug!(generation, current = self.generation, "discarding late session start");
            return vec![];
        }

        let mut effects = vec![];
        let record = match result {
            Ok(SessionStart::Server {
                session_id,
                started_at,
            }) => SessionRecord::server(session_id, started_at),
            Ok(SessionStart::Guest) => {
                effects.push(Effect::Notice(Notice::PlayingAsGuest));
                SessionRecord::guest()
            }
            Err(e) => {
                warn!(error = %e, "session start failed, continuing as guest");
                effects.push(Effect::Notice(Notice::StartFailed(e.to_string())));
                SessionRecord::guest()
            }
        };
        self.ctx.record = Some(record);

        let step = CountdownStep::first();
        self.ctx.countdown = Some(step);
        effects.extend(self.set_phase(SessionPhase::CountingDown));
        effects.push(Effect::Countdown(step));
        effects.push(self.schedule(Wake::CountdownStep, self.settings.countdown_interval));
        effects
    }

    pub fn on_score_submitted(
        &mut self,
        generation: u64,
        result: Result<ServerScore, SessionError>,
        now: DateTime<Utc>,
    ) -> Vec<Effect> {
        if generation != self.generation || self.phase != SessionPhase::Finishing {
            debug!(generation, current = self.generation, "discarding late score response");
            return vec![];
        }

        match result {
            Ok(score) => {
                let mut summary = self.local_summary(now);
                summary.metrics = Metrics::confirmed(score.wpm, score.accuracy);
                self.ctx.pending = None;
                self.settle(summary, Notice::ScoreSaved)
            }
            Err(e) => {
                warn!(error = %e, "score submission failed");
                if let Some(pending) = self.ctx.pending.as_mut() {
                    pending.in_flight = false;
                    pending.last_error = Some(e.to_string());
                }
                vec![Effect::Notice(Notice::SubmitFailed(e.to_string()))]
            }
        }
    }

    pub fn on_wake(&mut self, generation: u64, wake: Wake, now: DateTime<Utc>) -> Vec<Effect> {
        if generation != self.generation {
            debug!(?wake, generation, current = self.generation, "discarding stale wake");
            return vec![];
        }

        match (wake, self.phase) {
            (Wake::CountdownStep, SessionPhase::CountingDown) => {
                match self.ctx.countdown.and_then(CountdownStep::next) {
                    Some(step) => {
                        self.ctx.countdown = Some(step);
                        vec![
                            Effect::Countdown(step),
                            self.schedule(Wake::CountdownStep, self.settings.countdown_interval),
                        ]
                    }
                    None => self.activate(now),
                }
            }
            (Wake::NextWord, SessionPhase::Active) => {
                let word_done = self.engine.progress().is_some_and(TypingProgress::is_complete);
                if word_done && !self.engine.is_session_complete() {
                    self.issue_next_word()
                } else {
                    vec![]
                }
            }
            (Wake::TimerTick, SessionPhase::Active) => vec![
                Effect::Scoreboard(self.scoreboard(now)),
                self.schedule(Wake::TimerTick, self.settings.timer_interval),
            ],
            _ => vec![],
        }
    }

    fn start(&mut self) -> Vec<Effect> {
        if let Err(e) = self.words.ensure_playable(&self.category) {
            warn!(error = %e, "cannot start session");
            let mut effects = self.abort_quietly();
            effects.push(Effect::Notice(Notice::NoWordsAvailable(self.category.clone())));
            return effects;
        }

        self.begin_generation();
        self.summary = None;
        info!(category = %self.category, generation = self.generation, "starting session");

        let mut effects = self.set_phase(SessionPhase::Starting);
        effects.push(Effect::SetInput(String::new()));
        effects.push(Effect::RequestSession {
            generation: self.generation,
            category: self.category.clone(),
        });
        effects
    }

    fn activate(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        self.ctx.countdown = None;
        self.engine.reset();
        if let Some(record) = self.ctx.record.as_mut() {
            record.mark_local_start(now);
        }

        let mut effects = self.set_phase(SessionPhase::Active);
        effects.extend(self.issue_next_word());
        effects.push(Effect::Scoreboard(self.scoreboard(now)));
        effects.push(self.schedule(Wake::TimerTick, self.settings.timer_interval));
        effects
    }

    fn issue_next_word(&mut self) -> Vec<Effect> {
        match self.words.pick_word(&self.category, &mut self.rng) {
            Ok(word) => {
                let word = word.to_string();
                self.engine.issue_word(&word);
                vec![Effect::WordIssued(word), Effect::SetInput(String::new())]
            }
            Err(e) => {
                warn!(error = %e, "no word to issue, aborting session");
                let mut effects = self.abort();
                effects.push(Effect::Notice(Notice::NoWordsAvailable(self.category.clone())));
                effects
            }
        }
    }

    fn finish(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        self.ctx.finished_at = Some(now);
        self.engine.abandon_word();
        let mut effects = self.set_phase(SessionPhase::Finishing);
        effects.push(Effect::SetInput(String::new()));

        let server_session = self
            .ctx
            .record
            .as_ref()
            .filter(|r| !r.is_guest())
            .and_then(|r| Some((r.session_id()?.to_string(), r.server_elapsed_ms(now)?)));

        let Some((session_id, elapsed_ms)) = server_session else {
            let summary = self.local_summary(now);
            effects.extend(self.settle(summary, Notice::ThanksForPlaying));
            return effects;
        };

        let counters = self.engine.counters();
        let submission = ScoreSubmission {
            session_id,
            total_typed: counters.correct_keystrokes,
            miss_count: counters.mistake_keystrokes,
            elapsed_ms,
        };
        info!(?submission, "submitting score");
        self.ctx.pending = Some(PendingScore {
            submission: submission.clone(),
            in_flight: true,
            last_error: None,
        });
        effects.push(Effect::Notice(Notice::Submitting));
        effects.push(Effect::SubmitScore {
            generation: self.generation,
            submission,
        });
        effects
    }

    fn settle(&mut self, summary: SessionSummary, notice: Notice) -> Vec<Effect> {
        self.summary = Some(summary.clone());
        let mut effects = self.set_phase(SessionPhase::WaitingRestart);
        effects.push(Effect::Notice(notice));
        effects.push(Effect::Finished(summary));
        effects
    }

    fn local_summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let board = self.scoreboard(now);
        SessionSummary {
            category: self.category.clone(),
            counters: board.counters,
            elapsed: board.elapsed,
            metrics: board.metrics,
            is_guest: self.ctx.record.as_ref().map_or(true, SessionRecord::is_guest),
        }
    }

    /// Drops the live session without submitting anything.
    fn abort(&mut self) -> Vec<Effect> {
        let mut effects = self.abort_quietly();
        effects.push(Effect::Notice(Notice::SessionAborted));
        effects
    }

    fn abort_quietly(&mut self) -> Vec<Effect> {
        self.begin_generation();
        let mut effects = self.set_phase(SessionPhase::Idle);
        effects.push(Effect::SetInput(String::new()));
        effects
    }

    /// Invalidates every outstanding completion and wake of the previous session.
    fn begin_generation(&mut self) {
        self.generation += 1;
        self.engine.reset();
        self.ctx = SessionContext::new();
    }

    fn set_phase(&mut self, phase: SessionPhase) -> Vec<Effect> {
        if self.phase == phase {
            return vec![];
        }
        debug!(from = %self.phase, to = %phase, generation = self.generation, "phase change");
        self.phase = phase;
        vec![Effect::PhaseChanged(phase)]
    }

    fn schedule(&self, wake: Wake, delay: Duration) -> Effect {
        Effect::Schedule {
            generation: self.generation,
            wake,
            delay,
        }
    }
}
