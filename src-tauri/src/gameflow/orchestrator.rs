// The orchestrator actor: owns the phase machine, the published state and
// the auto-action scheduler. Everything else talks to it through channels.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::auto_action::AutoActionScheduler;
use super::cache::SharedFetchCache;
use super::cancel::CancellationScope;
use super::fetcher::DataFetcher;
use super::phase::{PhaseDebouncer, PhaseStateMachine, Transition};
use super::pipeline::{spawn_pipeline, PipelineContext, PipelineMsg};
use super::session::{SessionSignature, SessionSnapshot};
use super::types::{ClientEvent, GamePhase, Notice, ScoutState, TeamSide};
use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::lcu::SharedBackend;

const NOTICE_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 8;

enum Command {
  Retry(oneshot::Sender<bool>),
}

/// Owned by whoever started the orchestrator. Dropping it stops the actor.
pub struct OrchestratorHandle {
  state: watch::Receiver<ScoutState>,
  notices: broadcast::Sender<Notice>,
  commands: mpsc::Sender<Command>,
  shutdown: CancellationScope,
  task: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
  pub fn subscribe(&self) -> watch::Receiver<ScoutState> {
    self.state.clone()
  }

  pub fn snapshot(&self) -> ScoutState {
    self.state.borrow().clone()
  }

  pub fn notices(&self) -> broadcast::Receiver<Notice> {
    self.notices.subscribe()
  }

  /// Re-runs the current phase's pipeline from scratch. Returns `false` when
  /// nothing was started (a pipeline is already loading, or the phase has none).
  pub async fn retry(&self) -> Result<bool> {
    let (tx, rx) = oneshot::channel();
    self
      .commands
      .send(Command::Retry(tx))
      .await
      .map_err(|_| ScoutError::Stopped)?;
    rx.await.map_err(|_| ScoutError::Stopped)
  }

  pub async fn shutdown(mut self) {
    self.shutdown.cancel();
    if let Some(task) = self.task.take() {
      if let Err(err) = task.await {
        tracing::warn!(target: "gameflow::orchestrator", error = %err, "orchestrator task failed");
      }
    }
  }
}

impl Drop for OrchestratorHandle {
  fn drop(&mut self) {
    self.shutdown.cancel();
  }
}

pub struct Orchestrator {
  config: ScoutConfig,
  backend: SharedBackend,
  fetcher: DataFetcher,
  machine: PhaseStateMachine,
  debouncer: PhaseDebouncer,
  scheduler: AutoActionScheduler,
  latest_session: Option<Arc<SessionSnapshot>>,
  last_signature: Option<SessionSignature>,
  state: ScoutState,
  state_tx: watch::Sender<ScoutState>,
  notices: broadcast::Sender<Notice>,
  pipeline_tx: mpsc::UnboundedSender<PipelineMsg>,
}

impl Orchestrator {
  /// Starts the actor on the current tokio runtime.
  pub fn start(
    backend: SharedBackend,
    config: ScoutConfig,
    events: mpsc::Receiver<ClientEvent>,
  ) -> OrchestratorHandle {
    let (state_tx, state_rx) = watch::channel(ScoutState::default());
    let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (pipeline_tx, pipeline_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationScope::new();

    let fetcher = DataFetcher::new(
      backend.clone(),
      SharedFetchCache::new(config.cache_ttl()),
      config.retry.clone(),
      config.recent_games,
    );
    let scheduler =
      AutoActionScheduler::new(backend.clone(), config.auto_actions.clone(), notices.clone());

    let actor = Orchestrator {
      debouncer: PhaseDebouncer::new(config.debounce()),
      config,
      backend,
      fetcher,
      machine: PhaseStateMachine::new(),
      scheduler,
      latest_session: None,
      last_signature: None,
      state: ScoutState::default(),
      state_tx,
      notices: notices.clone(),
      pipeline_tx,
    };
    let task = tokio::spawn(actor.run(events, commands_rx, pipeline_rx, shutdown.clone()));

    OrchestratorHandle {
      state: state_rx,
      notices,
      commands: commands_tx,
      shutdown,
      task: Some(task),
    }
  }

  async fn run(
    mut self,
    mut events: mpsc::Receiver<ClientEvent>,
    mut commands: mpsc::Receiver<Command>,
    mut pipeline_rx: mpsc::UnboundedReceiver<PipelineMsg>,
    shutdown: CancellationScope,
  ) {
    tracing::info!(target: "gameflow::orchestrator", "orchestrator started");
    let mut events_open = true;

    loop {
      let deadline = self.debouncer.deadline();
      tokio::select! {
        _ = shutdown.cancelled() => break,
        event = events.recv(), if events_open => match event {
          Some(event) => self.on_event(event),
          None => {
            tracing::info!(target: "gameflow::orchestrator", "client event stream closed");
            events_open = false;
          }
        },
        Some(command) = commands.recv() => self.on_command(command),
        Some(msg) = pipeline_rx.recv() => self.on_pipeline(msg),
        _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
          if let Some(phase) = self.debouncer.take_due(Instant::now()) {
            self.on_stable_phase(phase);
          }
        }
      }
    }

    self.machine.cancel_active();
    self.scheduler.cancel_pending();
    self.state.clear_team_data();
    self.publish();
    tracing::info!(target: "gameflow::orchestrator", "orchestrator stopped");
  }

  fn on_event(&mut self, event: ClientEvent) {
    match event {
      ClientEvent::Phase(phase) => {
        tracing::debug!(target: "gameflow::phase", %phase, "phase signal");
        self.debouncer.signal(phase, Instant::now());
      }
      ClientEvent::Session(session) => self.on_session(session),
    }
  }

  fn on_command(&mut self, command: Command) {
    match command {
      Command::Retry(reply) => {
        let started = match self.machine.retry() {
          Transition::Start {
            phase,
            generation,
            scope,
          } => {
            tracing::info!(target: "gameflow::orchestrator", %phase, generation, "manual retry");
            self.state.last_error = None;
            self.start_pipeline(phase, generation, scope);
            true
          }
          _ => {
            tracing::debug!(target: "gameflow::orchestrator", "retry ignored");
            false
          }
        };
        self.publish();
        let _ = reply.send(started);
      }
    }
  }

  fn on_stable_phase(&mut self, phase: GamePhase) {
    self.scheduler.on_phase(&phase);

    match self.machine.on_stable_phase(phase) {
      Transition::Start {
        phase,
        generation,
        scope,
      } => {
        tracing::info!(target: "gameflow::phase", %phase, generation, "entering phase");
        self.state.last_error = None;
        self.start_pipeline(phase, generation, scope);
      }
      Transition::Cleanup {
        from,
        session_ended,
      } => {
        tracing::info!(
          target: "gameflow::phase",
          %from,
          to = %self.machine.current(),
          session_ended,
          "cleaning up"
        );
        self.state.clear_team_data();
        self.state.last_error = None;
        self.scheduler.cancel_pending();
        if session_ended {
          self.scheduler.reset();
          self.latest_session = None;
          self.last_signature = None;
        }
      }
      Transition::Passive { from } => {
        tracing::debug!(target: "gameflow::phase", %from, to = %self.machine.current(), "phase change");
      }
      Transition::Ignored => return,
    }
    self.publish();
  }

  fn on_session(&mut self, session: Option<Arc<SessionSnapshot>>) {
    let Some(session) = session else {
      self.latest_session = None;
      self.last_signature = None;
      self.scheduler.on_session(None);
      return;
    };

    // Late session pushes after champ select must not leak picks or actions
    // into other phases.
    let in_champ_select = *self.machine.current() == GamePhase::ChampSelect
      || self.debouncer.pending() == Some(&GamePhase::ChampSelect);
    if !in_champ_select {
      tracing::debug!(
        target: "gameflow::orchestrator",
        phase = %self.machine.current(),
        "ignoring session outside champ select"
      );
      return;
    }

    let signature = session.signature();
    let previous = self.last_signature.replace(signature.clone());
    self.latest_session = Some(session.clone());
    if previous.as_ref() == Some(&signature) {
      return;
    }

    self.state.enemy_champion_picks = session.enemy_champion_picks();
    self.scheduler.on_session(Some(session.as_ref()));

    let roster_changed = previous
      .as_ref()
      .is_some_and(|prev| !prev.same_roster(&signature));
    if roster_changed && *self.machine.current() == GamePhase::ChampSelect {
      if let Transition::Start {
        phase,
        generation,
        scope,
      } = self.machine.restart()
      {
        tracing::info!(target: "gameflow::orchestrator", generation, "champ select roster changed, restarting");
        self.start_pipeline(phase, generation, scope);
      }
    }
    self.publish();
  }

  fn start_pipeline(&mut self, phase: GamePhase, generation: u64, scope: CancellationScope) {
    let ctx = PipelineContext {
      generation,
      scope,
      backend: self.backend.clone(),
      fetcher: self.fetcher.clone(),
      retry: self.config.retry.clone(),
      match_count: self.config.match_count,
      live_players_timeout: self.config.live_players_timeout(),
      tx: self.pipeline_tx.clone(),
    };
    let session = match phase {
      GamePhase::ChampSelect => self.latest_session.clone(),
      _ => None,
    };
    // Completion is reported through the channel.
    drop(spawn_pipeline(ctx, phase, session));
  }

  fn on_pipeline(&mut self, msg: PipelineMsg) {
    let generation = msg.generation();
    if !self.machine.is_current(generation) {
      tracing::debug!(
        target: "gameflow::orchestrator",
        generation,
        active = self.machine.generation(),
        "dropping result from superseded pipeline"
      );
      return;
    }

    match msg {
      PipelineMsg::Roster { my_team, enemy, .. } => {
        self.state.my_team_stats = vec![None; my_team.len()];
        self.state.enemy_team_stats = vec![None; enemy.len()];
        self.state.local_player_slot = my_team.local_player_slot;
        self.state.my_team_roster = my_team.players;
        self.state.enemy_team_roster = enemy.players;
      }
      PipelineMsg::Side {
        side, reconciled, ..
      } => {
        let roster_len = self.state.roster(side).len();
        if reconciled.stats.len() != roster_len {
          tracing::error!(
            target: "gameflow::orchestrator",
            %side,
            roster_len,
            stats_len = reconciled.stats.len(),
            "stats do not line up with roster, discarding"
          );
          return;
        }
        for (index, player) in &reconciled.unresolved {
          let _ = self.notices.send(Notice::StatsUnavailable {
            side,
            index: *index,
            player: player.clone(),
          });
        }
        tracing::info!(
          target: "gameflow::orchestrator",
          %side,
          resolved = reconciled.resolved_count(),
          roster_len,
          "team stats ready"
        );
        match side {
          TeamSide::MyTeam => self.state.my_team_stats = reconciled.stats,
          TeamSide::Enemy => self.state.enemy_team_stats = reconciled.stats,
        }
      }
      PipelineMsg::Finished { outcome, .. } => {
        let succeeded = outcome.is_ok();
        if let Err(err) = outcome {
          let phase = self.machine.current().clone();
          tracing::warn!(
            target: "gameflow::orchestrator",
            %phase,
            attempts = err.attempts(),
            error = %err,
            "pipeline gave up"
          );
          self.state.last_error = Some(err.to_string());
          let notice = match &err {
            ScoutError::RetriesExhausted { attempts, .. } => Notice::RetriesExhausted {
              phase,
              attempts: *attempts,
              message: err.to_string(),
            },
            _ => Notice::PipelineFailed {
              phase,
              message: err.to_string(),
            },
          };
          let _ = self.notices.send(notice);
        }
        self.machine.complete(generation, succeeded);
      }
    }
    self.publish();
  }

  fn publish(&mut self) {
    self.state.phase = self.machine.current().clone();
    self.state.pipeline = self.machine.status().clone();
    self.state.is_loading = self.machine.is_loading();
    self.state.last_updated = Some(Utc::now());
    self.state_tx.send_replace(self.state.clone());
  }
}
