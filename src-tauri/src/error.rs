// Error handling for the scout orchestrator and its LCU transport

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
  #[error("HTTP client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),

  #[error("WebSocket error: {0}")]
  WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

  #[error("LCU returned HTTP {status} for {endpoint}")]
  Status { endpoint: String, status: u16 },

  #[error("Backend error: {0}")]
  Backend(String),

  #[error("Timed out after {elapsed:?} waiting for {what}")]
  Timeout { what: String, elapsed: Duration },

  #[error("Action failed: {0}")]
  Action(String),

  #[error("Operation cancelled")]
  Cancelled,

  #[error("Orchestrator is not running")]
  Stopped,

  #[error("Gave up after {attempts} attempts ({elapsed:?}): {source}")]
  RetriesExhausted {
    attempts: u32,
    elapsed: Duration,
    #[source]
    source: Box<ScoutError>,
  },

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("LCU lockfile not found in {0}")]
  LockfileNotFound(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;

impl ScoutError {
  /// Network hiccups, backend 5xx/429 and timeouts are worth another attempt.
  /// Malformed payloads and client errors are not.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Http(err) => !err.is_decode() && !err.is_builder(),
      Self::Status { status, .. } => *status >= 500 || *status == 429,
      Self::Backend(_) | Self::Timeout { .. } | Self::WebSocket(_) | Self::Io(_) => true,
      Self::Json(_)
      | Self::Action(_)
      | Self::Cancelled
      | Self::Stopped
      | Self::RetriesExhausted { .. }
      | Self::Config(_)
      | Self::LockfileNotFound(_) => false,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }

  /// Number of attempts spent before this error surfaced.
  pub fn attempts(&self) -> u32 {
    match self {
      Self::RetriesExhausted { attempts, .. } => *attempts,
      _ => 1,
    }
  }
}
