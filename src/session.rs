use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time between countdown steps
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// Elapsed-time display refresh while a session is active
pub const TIMER_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionPhase {
    Idle,
    Starting,
    CountingDown,
    Active,
    Finishing,
    WaitingRestart,
}

impl SessionPhase {
    /// Phases in which a category change does not abort anything
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionPhase::Idle | SessionPhase::WaitingRestart)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum CountdownStep {
    #[strum(serialize = "3")]
    Three,
    #[strum(serialize = "2")]
    Two,
    #[strum(serialize = "1")]
    One,
    #[strum(serialize = "Go")]
    Go,
}

impl CountdownStep {
    pub fn first() -> Self {
        CountdownStep::Three
    }

    pub fn next(self) -> Option<Self> {
        match self {
            CountdownStep::Three => Some(CountdownStep::Two),
            CountdownStep::Two => Some(CountdownStep::One),
            CountdownStep::One => Some(CountdownStep::Go),
            CountdownStep::Go => None,
        }
    }
}

/// Identity and timing of the live session.
///
/// A guest record never carries a server session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    session_id: Option<String>,
    server_started_at: Option<DateTime<Utc>>,
    local_started_at: Option<DateTime<Utc>>,
    is_guest: bool,
}

impl SessionRecord {
    pub fn server(session_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: Some(session_id),
            server_started_at: Some(started_at),
            local_started_at: None,
            is_guest: false,
        }
    }

    pub fn guest() -> Self {
        Self {
            session_id: None,
            server_started_at: None,
            local_started_at: None,
            is_guest: true,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server_started_at(&self) -> Option<DateTime<Utc>> {
        self.server_started_at
    }

    /// Set when typing begins, after the countdown, not when the session starts
    pub fn local_started_at(&self) -> Option<DateTime<Utc>> {
        self.local_started_at
    }

    pub fn is_guest(&self) -> bool {
        self.is_guest
    }

    pub fn mark_local_start(&mut self, now: DateTime<Utc>) {
        self.local_started_at = Some(now);
    }

    /// Time since typing began, zero before that
    pub fn local_elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.local_started_at
            .map(|started| clamped_since(started, now))
            .unwrap_or_default()
    }

    /// Milliseconds since the server started the session, clamped at zero
    /// when the local clock runs behind the server's.
    pub fn server_elapsed_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        self.server_started_at
            .map(|started| clamped_since(started, now).as_millis() as u64)
    }
}

fn clamped_since(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - start).to_std().unwrap_or_default()
}
