// Per-phase fetch pipelines. Each run reports back to the orchestrator
// through a channel and never touches shared state itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use super::cancel::CancellationScope;
use super::fetcher::DataFetcher;
use super::reconcile::Reconciled;
use super::retry::RetryPolicy;
use super::roster::split_live_players;
use super::session::SessionSnapshot;
use super::types::{GamePhase, TeamRoster, TeamSide};
use crate::error::{Result, ScoutError};
use crate::lcu::SharedBackend;

#[derive(Debug)]
pub enum PipelineMsg {
  /// Rosters are known; stats follow per side.
  Roster {
    generation: u64,
    my_team: TeamRoster,
    enemy: TeamRoster,
  },
  Side {
    generation: u64,
    side: TeamSide,
    reconciled: Reconciled,
  },
  Finished {
    generation: u64,
    outcome: Result<()>,
  },
}

impl PipelineMsg {
  pub fn generation(&self) -> u64 {
    match self {
      Self::Roster { generation, .. }
      | Self::Side { generation, .. }
      | Self::Finished { generation, .. } => *generation,
    }
  }
}

/// Everything one pipeline run needs; cheap to clone into the task.
#[derive(Clone)]
pub struct PipelineContext {
  pub generation: u64,
  pub scope: CancellationScope,
  pub backend: SharedBackend,
  pub fetcher: DataFetcher,
  pub retry: RetryPolicy,
  pub match_count: u32,
  pub live_players_timeout: Duration,
  pub tx: mpsc::UnboundedSender<PipelineMsg>,
}

impl PipelineContext {
  /// Messages from a cancelled run are dropped here already; the orchestrator
  /// checks the generation again on receipt.
  fn send(&self, msg: PipelineMsg) {
    if self.scope.is_cancelled() {
      return;
    }
    if self.tx.send(msg).is_err() {
      tracing::debug!(target: "gameflow::pipeline", "orchestrator gone, dropping message");
    }
  }
}

/// Spawns the pipeline for `phase`. `session` is the latest champ select
/// snapshot, if one has been seen.
pub fn spawn_pipeline(
  ctx: PipelineContext,
  phase: GamePhase,
  session: Option<Arc<SessionSnapshot>>,
) -> tokio::task::JoinHandle<()> {
  let span = tracing::info_span!(
    "pipeline",
    %phase,
    generation = ctx.generation,
    run_id = %Uuid::new_v4()
  );
  tokio::spawn(
    async move {
      tracing::info!(target: "gameflow::pipeline", "pipeline started");
      let outcome = match phase {
        GamePhase::ChampSelect => champ_select(&ctx, session).await,
        GamePhase::InProgress => in_progress(&ctx).await,
        _ => Ok(()),
      };
      match &outcome {
        Ok(()) => tracing::info!(target: "gameflow::pipeline", "pipeline finished"),
        Err(ScoutError::Cancelled) => {
          tracing::debug!(target: "gameflow::pipeline", "pipeline cancelled")
        }
        Err(err) => tracing::warn!(target: "gameflow::pipeline", error = %err, "pipeline failed"),
      }
      ctx.send(PipelineMsg::Finished {
        generation: ctx.generation,
        outcome,
      });
    }
    .instrument(span),
  )
}

async fn champ_select(ctx: &PipelineContext, session: Option<Arc<SessionSnapshot>>) -> Result<()> {
  let session = match session {
    Some(session) => session,
    None => {
      let backend = &ctx.backend;
      let fetched = ctx
        .retry
        .execute(&ctx.scope, ScoutError::is_transient, move |_| async move {
          backend
            .champ_select_session()
            .await?
            .ok_or_else(|| ScoutError::Backend("champ select session not available yet".into()))
        })
        .await?;
      Arc::new(fetched)
    }
  };
  ctx.scope.ensure_active()?;

  let my_team = session.my_team_roster();
  let enemy = session.enemy_team_roster();
  fetch_rosters(ctx, my_team, enemy).await
}

async fn in_progress(ctx: &PipelineContext) -> Result<()> {
  let backend = &ctx.backend;
  let timeout = ctx.live_players_timeout;
  let players = ctx
    .retry
    .execute(&ctx.scope, ScoutError::is_transient, move |attempt| async move {
      match tokio::time::timeout(timeout, backend.live_players()).await {
        Err(_) => Err(ScoutError::Timeout {
          what: "live player list".into(),
          elapsed: timeout,
        }),
        Ok(Ok(players)) if players.is_empty() => {
          tracing::debug!(target: "gameflow::pipeline", attempt, "live player list still empty");
          Err(ScoutError::Backend("live game data not ready".into()))
        }
        Ok(result) => result,
      }
    })
    .await?;
  ctx.scope.ensure_active()?;

  // Only used to find our team; the list is still usable without it.
  let local_name = match backend.current_summoner().await {
    Ok(summoner) => Some(summoner.riot_id()),
    Err(err) => {
      tracing::debug!(target: "gameflow::pipeline", error = %err, "current summoner unavailable");
      None
    }
  };
  ctx.scope.ensure_active()?;

  let (my_team, enemy) = split_live_players(&players, local_name.as_deref());
  fetch_rosters(ctx, my_team, enemy).await
}

async fn fetch_rosters(ctx: &PipelineContext, my_team: TeamRoster, enemy: TeamRoster) -> Result<()> {
  let my_queries = my_team.queries();
  let enemy_queries = enemy.queries();
  let my_len = my_team.len();
  let enemy_len = enemy.len();

  ctx.send(PipelineMsg::Roster {
    generation: ctx.generation,
    my_team,
    enemy,
  });

  let outcome = ctx
    .fetcher
    .fetch_teams(
      (my_queries.as_slice(), my_len),
      (enemy_queries.as_slice(), enemy_len),
      ctx.match_count,
      &ctx.scope,
      |side, result| {
        if let Ok(reconciled) = result {
          ctx.send(PipelineMsg::Side {
            generation: ctx.generation,
            side,
            reconciled: reconciled.clone(),
          });
        }
      },
    )
    .await;
  outcome.into_result()
}
