use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use tracing::{debug, trace};

use crate::client::{ServerScore, SessionClient, SessionError, SessionStart};
use crate::orchestrator::{Effect, Wake};

/// Unified event type consumed by the app runner
#[derive(Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Resize,
    /// UI redraw tick, produced when no other event arrived in time
    Tick,
    Wake {
        generation: u64,
        wake: Wake,
    },
    SessionStarted {
        generation: u64,
        result: Result<SessionStart, SessionError>,
    },
    ScoreSubmitted {
        generation: u64,
        result: Result<ServerScore, SessionError>,
    },
}

/// Source of game events (keyboard, timers, network completions)
pub trait GameEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError>;
}

/// Event source backed by the channel every producer posts to
pub struct ChannelEventSource {
    rx: Receiver<GameEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<GameEvent>) -> Self {
        Self { rx }
    }
}

impl GameEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forwards terminal key presses and resizes into `tx` from a background thread
pub fn spawn_terminal_reader(tx: Sender<GameEvent>) {
    thread::spawn(move || loop {
        let forwarded = match event::read() {
            Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                tx.send(GameEvent::Key(key))
            }
            Ok(CtEvent::Resize(_, _)) => tx.send(GameEvent::Resize),
            Ok(_) => Ok(()),
            Err(_) => break,
        };
        if forwarded.is_err() {
            break;
        }
    });
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: GameEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: GameEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> GameEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => GameEvent::Tick,
        }
    }
}

/// Carries out the I/O effects of the orchestrator.
///
/// Network calls run on worker threads and scheduled wakes are delayed posts;
/// both report back through the event channel, so all state changes stay on
/// the thread that drives the [`Runner`].
#[derive(Clone)]
pub struct EffectDispatcher {
    client: Arc<dyn SessionClient>,
    tx: Sender<GameEvent>,
}

impl EffectDispatcher {
    pub fn new(client: Arc<dyn SessionClient>, tx: Sender<GameEvent>) -> Self {
        Self { client, tx }
    }

    /// Returns false for effects that are not I/O
    pub fn dispatch(&self, effect: &Effect) -> bool {
        match effect {
            Effect::RequestSession {
                generation,
                category,
            } => {
                let (client, tx) = (Arc::clone(&self.client), self.tx.clone());
                let (generation, category) = (*generation, category.clone());
                debug!(generation, category = %category, "requesting session");
                thread::spawn(move || {
                    let result = client.start_session(&category);
                    let _ = tx.send(GameEvent::SessionStarted { generation, result });
                });
            }
            Effect::SubmitScore {
                generation,
                submission,
            } => {
                let (client, tx) = (Arc::clone(&self.client), self.tx.clone());
                let (generation, submission) = (*generation, submission.clone());
                debug!(generation, "submitting score");
                thread::spawn(move || {
                    let result = client.submit_score(&submission);
                    let _ = tx.send(GameEvent::ScoreSubmitted { generation, result });
                });
            }
            Effect::Schedule {
                generation,
                wake,
                delay,
            } => {
                let tx = self.tx.clone();
                let (generation, wake, delay) = (*generation, *wake, *delay);
                trace!(generation, ?wake, ?delay, "scheduling wake");
                thread::spawn(move || {
                    thread::sleep(delay);
                    let _ = tx.send(GameEvent::Wake { generation, wake });
                });
            }
            _ => return false,
        }
        true
    }
}
