// Cooperative cancellation threaded through every pipeline await

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ScoutError};

/// A cancellable scope shared by every step of one pipeline run.
///
/// Cancelling suppresses the consumption of in-flight results; it does not
/// abort an HTTP request that is already on the wire.
#[derive(Debug, Clone, Default)]
pub struct CancellationScope {
  token: CancellationToken,
}

impl CancellationScope {
  pub fn new() -> Self {
    Self {
      token: CancellationToken::new(),
    }
  }

  /// A scope that is cancelled together with this one but can also be
  /// cancelled on its own.
  pub fn child(&self) -> Self {
    Self {
      token: self.token.child_token(),
    }
  }

  pub fn cancel(&self) {
    self.token.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }

  pub async fn cancelled(&self) {
    self.token.cancelled().await
  }

  pub fn ensure_active(&self) -> Result<()> {
    if self.is_cancelled() {
      Err(ScoutError::Cancelled)
    } else {
      Ok(())
    }
  }

  /// Sleeps for `duration`. Returns `false` as soon as the scope is cancelled.
  pub async fn sleep(&self, duration: Duration) -> bool {
    if self.is_cancelled() {
      return false;
    }
    tokio::select! {
      biased;
      _ = self.token.cancelled() => false,
      _ = tokio::time::sleep(duration) => !self.is_cancelled(),
    }
  }

  /// Drives `fut` unless the scope is cancelled first.
  pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
    if self.is_cancelled() {
      return None;
    }
    let output = tokio::select! {
      biased;
      _ = self.token.cancelled() => return None,
      output = fut => output,
    };
    // A result that raced with cancellation is still stale.
    if self.is_cancelled() {
      None
    } else {
      Some(output)
    }
  }
}
