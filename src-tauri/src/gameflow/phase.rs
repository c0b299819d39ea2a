// Debounced phase tracking and pipeline bookkeeping

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::cancel::CancellationScope;
use super::types::GamePhase;

/// What a stable phase asks the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseAction {
  EnterChampSelect,
  EnterInProgress,
  Cleanup,
  ReadyCheck,
  Passive,
}

impl GamePhase {
  pub fn action(&self) -> PhaseAction {
    match self {
      GamePhase::ChampSelect => PhaseAction::EnterChampSelect,
      GamePhase::InProgress => PhaseAction::EnterInProgress,
      GamePhase::None | GamePhase::Lobby | GamePhase::EndOfGame => PhaseAction::Cleanup,
      GamePhase::ReadyCheck => PhaseAction::ReadyCheck,
      _ => PhaseAction::Passive,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "camelCase")]
pub enum PipelineStatus {
  Idle,
  Loading(GamePhase),
  Error(GamePhase),
}

/// Collapses rapid phase notifications to the last value seen.
#[derive(Debug)]
pub struct PhaseDebouncer {
  window: Duration,
  pending: Option<(GamePhase, Instant)>,
}

impl PhaseDebouncer {
  pub fn new(window: Duration) -> Self {
    Self {
      window,
      pending: None,
    }
  }

  /// Every signal restarts the window.
  pub fn signal(&mut self, phase: GamePhase, now: Instant) {
    self.pending = Some((phase, now + self.window));
  }

  /// The phase waiting for its window to close, if any.
  pub fn pending(&self) -> Option<&GamePhase> {
    self.pending.as_ref().map(|(phase, _)| phase)
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.pending.as_ref().map(|(_, at)| *at)
  }

  pub fn take_due(&mut self, now: Instant) -> Option<GamePhase> {
    match &self.pending {
      Some((_, at)) if *at <= now => self.pending.take().map(|(phase, _)| phase),
      _ => None,
    }
  }

  pub fn clear(&mut self) {
    self.pending = None;
  }
}

/// Outcome of feeding a stable phase (or a retry) to the state machine.
#[derive(Debug)]
pub enum Transition {
  Start {
    phase: GamePhase,
    generation: u64,
    scope: CancellationScope,
  },
  Cleanup {
    from: GamePhase,
    session_ended: bool,
  },
  Passive {
    from: GamePhase,
  },
  Ignored,
}

/// Tracks the stable phase and the single pipeline allowed to run for it.
#[derive(Debug)]
pub struct PhaseStateMachine {
  current: GamePhase,
  status: PipelineStatus,
  generation: u64,
  scope: Option<CancellationScope>,
}

impl Default for PhaseStateMachine {
  fn default() -> Self {
    Self::new()
  }
}

impl PhaseStateMachine {
  pub fn new() -> Self {
    Self {
      current: GamePhase::None,
      status: PipelineStatus::Idle,
      generation: 0,
      scope: None,
    }
  }

  pub fn current(&self) -> &GamePhase {
    &self.current
  }

  pub fn status(&self) -> &PipelineStatus {
    &self.status
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.status, PipelineStatus::Loading(_))
  }

  fn is_loading_phase(&self, phase: &GamePhase) -> bool {
    matches!(&self.status, PipelineStatus::Loading(p) if p == phase)
  }

  /// A pipeline message is only applied while its generation is the active one
  /// and its scope has not been cancelled.
  pub fn is_current(&self, generation: u64) -> bool {
    generation == self.generation
      && self
        .scope
        .as_ref()
        .map(|scope| !scope.is_cancelled())
        .unwrap_or(false)
  }

  pub fn on_stable_phase(&mut self, phase: GamePhase) -> Transition {
    if phase == self.current || self.is_loading_phase(&phase) {
      return Transition::Ignored;
    }

    let from = std::mem::replace(&mut self.current, phase.clone());
    self.cancel_active();

    match phase.action() {
      PhaseAction::EnterChampSelect | PhaseAction::EnterInProgress => self.begin(),
      PhaseAction::Cleanup => {
        self.status = PipelineStatus::Idle;
        Transition::Cleanup {
          session_ended: from.is_session_phase(),
          from,
        }
      }
      PhaseAction::ReadyCheck | PhaseAction::Passive => {
        self.status = PipelineStatus::Idle;
        Transition::Passive { from }
      }
    }
  }

  /// Re-runs the current phase's pipeline unless one is already loading.
  pub fn retry(&mut self) -> Transition {
    if self.is_loading() || !self.runs_pipeline() {
      return Transition::Ignored;
    }
    self.cancel_active();
    self.begin()
  }

  /// Replaces a running pipeline; used when the roster it was built from is stale.
  pub fn restart(&mut self) -> Transition {
    if !self.runs_pipeline() {
      return Transition::Ignored;
    }
    self.cancel_active();
    self.begin()
  }

  /// Marks the pipeline `generation` finished. Stale generations are ignored.
  pub fn complete(&mut self, generation: u64, succeeded: bool) -> bool {
    if !self.is_current(generation) {
      return false;
    }
    self.status = if succeeded {
      PipelineStatus::Idle
    } else {
      PipelineStatus::Error(self.current.clone())
    };
    true
  }

  pub fn cancel_active(&mut self) {
    if let Some(scope) = self.scope.take() {
      scope.cancel();
    }
  }

  fn runs_pipeline(&self) -> bool {
    matches!(
      self.current.action(),
      PhaseAction::EnterChampSelect | PhaseAction::EnterInProgress
    )
  }

  fn begin(&mut self) -> Transition {
    self.generation += 1;
    let scope = CancellationScope::new();
    self.scope = Some(scope.clone());
    self.status = PipelineStatus::Loading(self.current.clone());
    Transition::Start {
      phase: self.current.clone(),
      generation: self.generation,
      scope,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn start_scope(t: Transition) -> (u64, CancellationScope) {
    match t {
      Transition::Start {
        generation, scope, ..
      } => (generation, scope),
      other => panic!("expected start, got {other:?}"),
    }
  }

  #[test]
  fn test_debouncer_keeps_last_signal() {
    let t0 = Instant::now();
    let mut debouncer = PhaseDebouncer::new(Duration::from_millis(100));
    debouncer.signal(GamePhase::ChampSelect, t0);
    debouncer.signal(GamePhase::InProgress, t0 + Duration::from_millis(50));

    assert_eq!(debouncer.pending(), Some(&GamePhase::InProgress));
    assert_eq!(debouncer.take_due(t0 + Duration::from_millis(120)), None);
    assert_eq!(
      debouncer.take_due(t0 + Duration::from_millis(150)),
      Some(GamePhase::InProgress)
    );
    assert_eq!(debouncer.deadline(), None);
    assert_eq!(debouncer.pending(), None);
  }

  #[test]
  fn test_phase_actions() {
    assert_eq!(GamePhase::ChampSelect.action(), PhaseAction::EnterChampSelect);
    assert_eq!(GamePhase::InProgress.action(), PhaseAction::EnterInProgress);
    assert_eq!(GamePhase::Lobby.action(), PhaseAction::Cleanup);
    assert_eq!(GamePhase::EndOfGame.action(), PhaseAction::Cleanup);
    assert_eq!(GamePhase::None.action(), PhaseAction::Cleanup);
    assert_eq!(GamePhase::ReadyCheck.action(), PhaseAction::ReadyCheck);
    assert_eq!(GamePhase::Matchmaking.action(), PhaseAction::Passive);
  }

  #[test]
  fn test_same_phase_is_ignored() {
    let mut machine = PhaseStateMachine::new();
    let (generation, _scope) = start_scope(machine.on_stable_phase(GamePhase::ChampSelect));
    assert_eq!(generation, 1);
    assert!(matches!(
      machine.on_stable_phase(GamePhase::ChampSelect),
      Transition::Ignored
    ));
    assert!(matches!(machine.retry(), Transition::Ignored));
    assert_eq!(machine.generation(), 1);
  }

  #[test]
  fn test_new_phase_cancels_previous_scope() {
    let mut machine = PhaseStateMachine::new();
    let (first, first_scope) = start_scope(machine.on_stable_phase(GamePhase::ChampSelect));
    let (second, second_scope) = start_scope(machine.on_stable_phase(GamePhase::InProgress));

    assert!(first_scope.is_cancelled());
    assert!(!second_scope.is_cancelled());
    assert!(!machine.is_current(first));
    assert!(machine.is_current(second));
    assert!(!machine.complete(first, true));
    assert_eq!(
      machine.status(),
      &PipelineStatus::Loading(GamePhase::InProgress)
    );
  }

  #[test]
  fn test_cleanup_reports_session_end() {
    let mut machine = PhaseStateMachine::new();
    machine.on_stable_phase(GamePhase::Lobby);
    match machine.on_stable_phase(GamePhase::None) {
      Transition::Cleanup { session_ended, .. } => assert!(!session_ended),
      other => panic!("unexpected {other:?}"),
    }

    let (_, scope) = start_scope(machine.on_stable_phase(GamePhase::ChampSelect));
    match machine.on_stable_phase(GamePhase::Lobby) {
      Transition::Cleanup {
        session_ended,
        from,
      } => {
        assert!(session_ended);
        assert_eq!(from, GamePhase::ChampSelect);
      }
      other => panic!("unexpected {other:?}"),
    }
    assert!(scope.is_cancelled());
    assert_eq!(machine.status(), &PipelineStatus::Idle);
  }

  #[test]
  fn test_retry_after_error_starts_fresh_generation() {
    let mut machine = PhaseStateMachine::new();
    let (generation, _) = start_scope(machine.on_stable_phase(GamePhase::InProgress));
    assert!(machine.complete(generation, false));
    assert_eq!(
      machine.status(),
      &PipelineStatus::Error(GamePhase::InProgress)
    );

    let (next, _) = start_scope(machine.retry());
    assert_eq!(next, generation + 1);
    assert!(machine.is_loading());
  }

  #[test]
  fn test_retry_outside_pipeline_phase_is_ignored() {
    let mut machine = PhaseStateMachine::new();
    machine.on_stable_phase(GamePhase::Matchmaking);
    assert!(matches!(machine.retry(), Transition::Ignored));
    assert!(matches!(machine.restart(), Transition::Ignored));
  }

  #[test]
  fn test_passive_phase_stops_loading() {
    let mut machine = PhaseStateMachine::new();
    let (generation, scope) = start_scope(machine.on_stable_phase(GamePhase::ChampSelect));
    assert!(matches!(
      machine.on_stable_phase(GamePhase::GameStart),
      Transition::Passive { .. }
    ));
    assert!(scope.is_cancelled());
    assert!(!machine.is_current(generation));
    assert!(!machine.is_loading());
  }
}
