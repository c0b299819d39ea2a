// Headless runner: waits for the League client, then logs the scout state

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use gameflow_scout_lib::config::{self, ScoutConfig};
use gameflow_scout_lib::gameflow::{CancellationScope, EnrichedStats, Orchestrator, ScoutState};
use gameflow_scout_lib::lcu::{read_lockfile, run_event_stream, LcuClient, LcuConnection};
use gameflow_scout_lib::{logging, Result, ScoutError};

const LOCKFILE_POLL: Duration = Duration::from_secs(3);
const EVENT_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
  if let Err(e) = run().await {
    eprintln!("gameflow-scout: {}", e);
    std::process::exit(1);
  }
}

async fn run() -> Result<()> {
  let data_dir = config::data_dir();
  let config = config::load_config(&data_dir)?;
  logging::init_logging(&config, &data_dir)?;

  let league_path = config
    .league_path
    .clone()
    .map(PathBuf::from)
    .ok_or_else(|| {
      ScoutError::Config(format!(
        "league_path is not set; add it to {} or set {}",
        config::config_path(&data_dir).display(),
        config::LEAGUE_PATH_ENV
      ))
    })?;

  let stop = CancellationScope::new();
  let ctrl_c_scope = stop.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::info!(target: "gameflow::main", "ctrl-c received, shutting down");
      ctrl_c_scope.cancel();
    }
  });

  // One client session per lockfile; the client can be restarted underneath us.
  while !stop.is_cancelled() {
    let Some(connection) = wait_for_lockfile(&league_path, &stop).await else {
      break;
    };
    if let Err(e) = run_session(connection, &config, &stop).await {
      tracing::warn!(target: "gameflow::main", error = %e, "client session ended");
    }
  }
  Ok(())
}

async fn wait_for_lockfile(league_path: &Path, stop: &CancellationScope) -> Option<LcuConnection> {
  loop {
    match read_lockfile(league_path) {
      Ok(connection) => return Some(connection),
      Err(e) => tracing::info!(target: "gameflow::main", error = %e, "waiting for the League client"),
    }
    if !stop.sleep(LOCKFILE_POLL).await {
      return None;
    }
  }
}

async fn run_session(connection: LcuConnection, config: &ScoutConfig, stop: &CancellationScope) -> Result<()> {
  tracing::info!(target: "gameflow::main", port = %connection.port, "League client found");
  let client = Arc::new(LcuClient::new(connection)?);
  let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
  let orchestrator = Orchestrator::start(client.clone(), config.clone(), events_rx);

  let mut states = orchestrator.subscribe();
  let mut notices = orchestrator.notices();
  let session_scope = stop.child();
  let reporter_scope = session_scope.clone();
  let reporter = tokio::spawn(async move {
    loop {
      tokio::select! {
        _ = reporter_scope.cancelled() => break,
        changed = states.changed() => {
          if changed.is_err() {
            break;
          }
          let state = states.borrow_and_update().clone();
          log_state(&state);
        }
        notice = notices.recv() => match notice {
          Ok(notice) => tracing::info!(target: "gameflow::main", ?notice, "notice"),
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            tracing::warn!(target: "gameflow::main", skipped, "notices lagged");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        },
      }
    }
  });

  let result = run_event_stream(client, events_tx, config.retry.clone(), session_scope.clone()).await;

  session_scope.cancel();
  orchestrator.shutdown().await;
  let _ = reporter.await;
  result
}

fn resolved(stats: &[Option<EnrichedStats>]) -> usize {
  stats.iter().filter(|s| s.is_some()).count()
}

fn log_state(state: &ScoutState) {
  tracing::info!(
    target: "gameflow::main",
    phase = %state.phase,
    loading = state.is_loading,
    my_team = state.my_team_roster.len(),
    my_team_stats = resolved(&state.my_team_stats),
    enemy = state.enemy_team_roster.len(),
    enemy_stats = resolved(&state.enemy_team_stats),
    enemy_picks = ?state.enemy_champion_picks,
    error = ?state.last_error,
    "state"
  );
}
