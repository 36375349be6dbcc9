use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::io::{self, Write};
use tracing::warn;

use crate::engine::InputOutcome;
use crate::history::{History, HistoryEntry};
use crate::orchestrator::{Effect, Notice, Orchestrator, Scoreboard, SessionSummary};
use crate::runtime::GameEvent;
use crate::session::{CountdownStep, SessionPhase};

/// Feedback played on a wrong keystroke
pub trait MistakeCue {
    fn on_mistake(&self);
}

/// Rings the terminal bell
pub struct TerminalBell;

impl MistakeCue for TerminalBell {
    fn on_mistake(&self) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

/// Presentation state fed by orchestrator effects, plus key handling.
pub struct App {
    pub orchestrator: Orchestrator,
    pub buffer: String,
    pub countdown: Option<CountdownStep>,
    pub scoreboard: Scoreboard,
    pub notice: Option<Notice>,
    pub last_outcome: Option<InputOutcome>,
    cue: Option<Box<dyn MistakeCue>>,
    cue_enabled: bool,
    history: Option<History>,
    should_quit: bool,
}

impl App {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            buffer: String::new(),
            countdown: None,
            scoreboard: Scoreboard::default(),
            notice: None,
            last_outcome: None,
            cue: None,
            cue_enabled: false,
            history: None,
            should_quit: false,
        }
    }

    pub fn with_cue(mut self, cue: Box<dyn MistakeCue>, enabled: bool) -> Self {
        self.cue = Some(cue);
        self.cue_enabled = enabled;
        self
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn has_cue(&self) -> bool {
        self.cue.is_some()
    }

    pub fn cue_enabled(&self) -> bool {
        self.cue.is_some() && self.cue_enabled
    }

    pub fn phase(&self) -> SessionPhase {
        self.orchestrator.phase()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.orchestrator.last_summary()
    }

    /// Routes one runtime event and returns the I/O effects left for the dispatcher
    pub fn on_event(&mut self, event: GameEvent, now: DateTime<Utc>) -> Vec<Effect> {
        let effects = match event {
            GameEvent::Key(key) => self.on_key(key, now),
            GameEvent::Resize | GameEvent::Tick => vec![],
            GameEvent::Wake { generation, wake } => {
                self.orchestrator.on_wake(generation, wake, now)
            }
            GameEvent::SessionStarted { generation, result } => {
                self.orchestrator.on_session_started(generation, result)
            }
            GameEvent::ScoreSubmitted { generation, result } => {
                self.orchestrator.on_score_submitted(generation, result, now)
            }
        };
        self.apply(effects)
    }

    fn on_key(&mut self, key: KeyEvent, now: DateTime<Utc>) -> Vec<Effect> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.should_quit = true;
                vec![]
            }
            KeyCode::Char('c') if ctrl => {
                self.should_quit = true;
                vec![]
            }
            KeyCode::Char('b') if ctrl => {
                self.cue_enabled = !self.cue_enabled;
                vec![]
            }
            KeyCode::Enter => self.orchestrator.press_control(now),
            KeyCode::Tab => self.cycle_category(1),
            KeyCode::BackTab => self.cycle_category(-1),
            KeyCode::Char(' ')
                if self.phase() == SessionPhase::WaitingRestart
                    || self.orchestrator.can_retry_submission() =>
            {
                self.orchestrator.request_restart(now)
            }
            KeyCode::Backspace => {
                if self.buffer.pop().is_none() {
                    return vec![];
                }
                let value = self.buffer.clone();
                self.orchestrator.submit_input(&value, now)
            }
            KeyCode::Char(c) if !ctrl => {
                self.buffer.push(c);
                let value = self.buffer.clone();
                self.orchestrator.submit_input(&value, now)
            }
            _ => vec![],
        }
    }

    fn cycle_category(&mut self, step: isize) -> Vec<Effect> {
        let current = self.orchestrator.category().to_string();
        match self.orchestrator.words().cycle_id(&current, step) {
            Some(next) => {
                let next = next.to_string();
                self.orchestrator.select_category(&next)
            }
            None => vec![],
        }
    }

    /// Applies view effects and hands back the I/O ones
    pub fn apply(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let (io, view): (Vec<Effect>, Vec<Effect>) = effects.into_iter().partition(Effect::is_io);
        for effect in view {
            match effect {
                Effect::PhaseChanged(phase) => {
                    if phase != SessionPhase::CountingDown {
                        self.countdown = None;
                    }
                    if phase == SessionPhase::Starting {
                        self.notice = None;
                        self.last_outcome = None;
                        self.scoreboard = Scoreboard::default();
                    }
                }
                Effect::CategoryChanged(_) => self.last_outcome = None,
                Effect::Countdown(step) => self.countdown = Some(step),
                Effect::WordIssued(_) => self.last_outcome = None,
                Effect::Keystroke(outcome) => {
                    if matches!(outcome, InputOutcome::Mistake(_)) && self.cue_enabled() {
                        if let Some(cue) = &self.cue {
                            cue.on_mistake();
                        }
                    }
                    self.last_outcome = Some(outcome);
                }
                Effect::SetInput(value) => self.buffer = value,
                Effect::Scoreboard(board) => self.scoreboard = board,
                Effect::Notice(notice) => self.notice = Some(notice),
                Effect::Finished(summary) => self.record(&summary),
                _ => {}
            }
        }
        io
    }

    fn record(&mut self, summary: &SessionSummary) {
        self.scoreboard = Scoreboard {
            elapsed: summary.elapsed,
            counters: summary.counters,
            metrics: summary.metrics,
        };
        if let Some(history) = &self.history {
            let entry = HistoryEntry::from_summary(summary, Local::now());
            if let Err(e) = history.append(&entry) {
                warn!(error = %e, path = %history.path().display(), "failed to record session");
            }
        }
    }
}
