// Retry policy with jittered exponential back-off

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::cancel::CancellationScope;
use crate::error::{Result, ScoutError};

/// Controls how fetch steps are retried after a transient failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Retries after the first attempt. `3` means at most four calls.
  pub max_retries: u32,
  /// Delay before the first retry.
  pub base_delay_ms: u64,
  /// Cap applied before jitter.
  pub max_delay_ms: u64,
  /// Growth factor per attempt.
  pub multiplier: f64,
  /// Scale each delay by a uniform factor in `[0.5, 1.0]`.
  pub jitter: bool,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_retries: 3,
      base_delay_ms: 1000,
      max_delay_ms: 10_000,
      multiplier: 2.0,
      jitter: true,
    }
  }
}

impl RetryPolicy {
  /// `min(base * multiplier^attempt, max)` for a 0-indexed attempt, no jitter.
  pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let raw_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
    let capped_ms = raw_ms.min(self.max_delay_ms as f64).max(0.0);
    Duration::from_millis(capped_ms as u64)
  }

  /// The delay actually slept before retry number `attempt`.
  pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
    let base = self.base_delay_for_attempt(attempt);
    if !self.jitter {
      return base;
    }
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    base.mul_f64(factor)
  }

  /// Runs `operation` until it succeeds, fails with a non-retryable error, or
  /// the retry budget is spent. The attempt number (0-indexed) is passed in.
  ///
  /// Waits observe `scope`; a cancelled scope returns `ScoutError::Cancelled`
  /// without calling `operation` again.
  pub async fn execute<T, F, Fut, P>(
    &self,
    scope: &CancellationScope,
    is_retryable: P,
    mut operation: F,
  ) -> Result<T>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&ScoutError) -> bool,
  {
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
      scope.ensure_active()?;

      let err = match operation(attempt).await {
        Ok(value) => return Ok(value),
        Err(err) => err,
      };

      if err.is_cancelled() || scope.is_cancelled() {
        return Err(ScoutError::Cancelled);
      }

      if !is_retryable(&err) {
        tracing::debug!(target: "gameflow::retry", attempt, error = %err, "not retryable");
        return Err(err);
      }

      if attempt >= self.max_retries {
        let attempts = attempt + 1;
        let elapsed = started.elapsed();
        tracing::warn!(
          target: "gameflow::retry",
          attempts,
          elapsed_ms = elapsed.as_millis() as u64,
          error = %err,
          "retries exhausted"
        );
        return Err(ScoutError::RetriesExhausted {
          attempts,
          elapsed,
          source: Box::new(err),
        });
      }

      let delay = self.delay_for_attempt(attempt);
      tracing::info!(
        target: "gameflow::retry",
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "retrying after transient error"
      );
      if !scope.sleep(delay).await {
        return Err(ScoutError::Cancelled);
      }
      attempt += 1;
    }
  }
}
