// Batched, cached, retried lookups for both teams

use std::collections::HashSet;

use super::cache::{FetchCache, SharedFetchCache};
use super::cancel::CancellationScope;
use super::reconcile::{reconcile, Reconciled};
use super::retry::RetryPolicy;
use super::types::{PlayerQuery, TeamSide};
use crate::error::{Result, ScoutError};
use crate::lcu::SharedBackend;

/// Both sides of a fetch, each settled on its own.
#[derive(Debug)]
pub struct TeamsOutcome {
  pub my_team: Result<Reconciled>,
  pub enemy: Result<Reconciled>,
}

#[derive(Clone)]
pub struct DataFetcher {
  backend: SharedBackend,
  cache: SharedFetchCache,
  retry: RetryPolicy,
  recent_limit: usize,
}

impl DataFetcher {
  pub fn new(
    backend: SharedBackend,
    cache: SharedFetchCache,
    retry: RetryPolicy,
    recent_limit: usize,
  ) -> Self {
    Self {
      backend,
      cache,
      retry,
      recent_limit,
    }
  }

  pub fn cache(&self) -> &SharedFetchCache {
    &self.cache
  }

  /// Resolvable names in query order, without duplicates.
  fn lookup_names(queries: &[PlayerQuery]) -> Vec<String> {
    let mut seen = HashSet::new();
    queries
      .iter()
      .filter(|q| q.is_resolvable())
      .filter(|q| seen.insert(q.summoner_name.as_str()))
      .map(|q| q.summoner_name.clone())
      .collect()
  }

  /// Fetches one side and returns stats aligned with a roster of `roster_len`.
  ///
  /// A side with no resolvable players never touches the backend.
  pub async fn fetch_side(
    &self,
    side: TeamSide,
    queries: &[PlayerQuery],
    roster_len: usize,
    match_count: u32,
    scope: &CancellationScope,
  ) -> Result<Reconciled> {
    scope.ensure_active()?;
    let names = Self::lookup_names(queries);
    if names.is_empty() {
      tracing::debug!(target: "gameflow::fetcher", %side, "no resolvable players");
      return Ok(Reconciled::empty(roster_len));
    }

    let key = FetchCache::key(&names, match_count);
    let cached = self.cache.lock().get(&key);
    let results = match cached {
      Some(hit) => {
        tracing::debug!(target: "gameflow::fetcher", %side, players = names.len(), "cache hit");
        hit
      }
      None => {
        tracing::info!(
          target: "gameflow::fetcher",
          %side,
          players = names.len(),
          match_count,
          "looking up players"
        );
        let backend = &self.backend;
        let names_ref = &names;
        let fetched = self
          .retry
          .execute(scope, ScoutError::is_transient, move |_| async move {
            backend.lookup_summoners(names_ref, match_count).await
          })
          .await?;
        // A superseded pipeline must not seed the cache either.
        scope.ensure_active()?;
        self.cache.lock().insert(key, fetched.clone());
        fetched
      }
    };

    scope.ensure_active()?;
    Ok(reconcile(queries, roster_len, &results, self.recent_limit))
  }

  /// Runs both sides concurrently; a failed side does not hold back the other.
  /// `on_settled` sees each side as soon as it finishes, in completion order.
  pub async fn fetch_teams<F>(
    &self,
    my_team: (&[PlayerQuery], usize),
    enemy: (&[PlayerQuery], usize),
    match_count: u32,
    scope: &CancellationScope,
    on_settled: F,
  ) -> TeamsOutcome
  where
    F: Fn(TeamSide, &Result<Reconciled>),
  {
    let (my_team, enemy) = futures_util::future::join(
      self.settle_side(TeamSide::MyTeam, my_team, match_count, scope, &on_settled),
      self.settle_side(TeamSide::Enemy, enemy, match_count, scope, &on_settled),
    )
    .await;
    TeamsOutcome { my_team, enemy }
  }

  async fn settle_side<F>(
    &self,
    side: TeamSide,
    (queries, roster_len): (&[PlayerQuery], usize),
    match_count: u32,
    scope: &CancellationScope,
    on_settled: &F,
  ) -> Result<Reconciled>
  where
    F: Fn(TeamSide, &Result<Reconciled>),
  {
    let result = self
      .fetch_side(side, queries, roster_len, match_count, scope)
      .await;
    on_settled(side, &result);
    result
  }
}

impl TeamsOutcome {
  /// The first side error, if any; cancellation wins over other errors.
  pub fn into_result(self) -> Result<()> {
    match (self.my_team, self.enemy) {
      (Ok(_), Ok(_)) => Ok(()),
      (Err(ScoutError::Cancelled), _) | (_, Err(ScoutError::Cancelled)) => Err(ScoutError::Cancelled),
      (Err(err), _) | (_, Err(err)) => Err(err),
    }
  }
}
