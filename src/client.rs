//! Session/score service client.
//!
//! The service exposes two endpoints:
//! - `POST {base}/api/session/start` with `{ "category": .. }`
//! - `POST {base}/api/score` with the raw counters of a finished session
//!
//! Both reply with a `{ "data": .. }` envelope and accept an optional bearer
//! token. Without a token no session is requested and the game runs as guest.

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service responded with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("score service unavailable in offline mode")]
    Offline,
}

/// Source of bearer tokens. `None` means the player is not signed in.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStart {
    Server {
        session_id: String,
        started_at: DateTime<Utc>,
    },
    Guest,
}

/// Raw counters of a finished session. Derived metrics are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub session_id: String,
    pub total_typed: u32,
    pub miss_count: u32,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ServerScore {
    pub wpm: f64,
    pub accuracy: f64,
}

pub trait SessionClient: Send + Sync {
    fn start_session(&self, category: &str) -> Result<SessionStart, SessionError>;
    fn submit_score(&self, submission: &ScoreSubmission) -> Result<ServerScore, SessionError>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Serialize)]
struct StartRequest<'a> {
    category: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartedSession {
    session_id: String,
    started_at: WireTimestamp,
}

/// `startedAt` arrives either as epoch milliseconds or as an RFC 3339 string
#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

impl WireTimestamp {
    fn into_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms),
            WireTimestamp::Text(dt) => Some(dt),
        }
    }
}

fn parse_started_session(body: &str) -> Result<SessionStart, SessionError> {
    let envelope: Envelope<StartedSession> = serde_json::from_str(body)?;
    let started = envelope.data;
    let started_at = started.started_at.into_datetime().ok_or_else(|| {
        SessionError::Decode(serde::de::Error::custom("startedAt out of range"))
    })?;
    Ok(SessionStart::Server {
        session_id: started.session_id,
        started_at,
    })
}

fn parse_server_score(body: &str) -> Result<ServerScore, SessionError> {
    let envelope: Envelope<ServerScore> = serde_json::from_str(body)?;
    Ok(envelope.data)
}

/// reqwest-backed client for the session/score service
pub struct HttpSessionClient {
    base_url: String,
    http: Client,
    tokens: Box<dyn TokenProvider>,
}

impl HttpSessionClient {
    pub fn new<T: TokenProvider + 'static>(
        base_url: impl Into<String>,
        tokens: T,
    ) -> Result<Self, SessionError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            tokens: Box::new(tokens),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<String, SessionError> {
        let url = self.endpoint(path);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = self.tokens.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status(status.as_u16()));
        }
        Ok(response.text()?)
    }
}

impl SessionClient for HttpSessionClient {
    fn start_session(&self, category: &str) -> Result<SessionStart, SessionError> {
        if self.tokens.token().is_none() {
            debug!(category, "no token available, starting guest session");
            return Ok(SessionStart::Guest);
        }

        let body = self.post("/api/session/start", &StartRequest { category })?;
        let start = parse_started_session(&body)?;
        if let SessionStart::Server { session_id, .. } = &start {
            info!(session_id = %session_id, category, "server session started");
        }
        Ok(start)
    }

    fn submit_score(&self, submission: &ScoreSubmission) -> Result<ServerScore, SessionError> {
        let body = self.post("/api/score", submission)?;
        let score = parse_server_score(&body)?;
        info!(
            session_id = %submission.session_id,
            wpm = score.wpm,
            accuracy = score.accuracy,
            "score accepted"
        );
        Ok(score)
    }
}

/// Client for `--offline` play: every session is a guest session
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSessionClient;

impl SessionClient for OfflineSessionClient {
    fn start_session(&self, _category: &str) -> Result<SessionStart, SessionError> {
        Ok(SessionStart::Guest)
    }

    fn submit_score(&self, _submission: &ScoreSubmission) -> Result<ServerScore, SessionError> {
        Err(SessionError::Offline)
    }
}
