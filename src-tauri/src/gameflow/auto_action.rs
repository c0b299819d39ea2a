// Once-per-session auto accept / ban / pick

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::cancel::CancellationScope;
use super::session::{ChampSelectAction, ChampSelectSubPhase, SessionSnapshot};
use super::types::{ActionKind, GamePhase, Notice};
use crate::config::AutoActionConfig;
use crate::lcu::SharedBackend;

/// What already fired this champ select session. These flags are the only
/// thing preventing a second ban or pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoActionRecord {
  pub ban_champion: bool,
  pub select_champion: bool,
}

pub struct AutoActionScheduler {
  backend: SharedBackend,
  config: AutoActionConfig,
  record: AutoActionRecord,
  session_present: bool,
  ready_check_accepted: bool,
  session_scope: CancellationScope,
  ready_check_scope: CancellationScope,
  notices: broadcast::Sender<Notice>,
  tasks: Vec<JoinHandle<()>>,
}

impl AutoActionScheduler {
  pub fn new(
    backend: SharedBackend,
    config: AutoActionConfig,
    notices: broadcast::Sender<Notice>,
  ) -> Self {
    Self {
      backend,
      config,
      record: AutoActionRecord::default(),
      session_present: false,
      ready_check_accepted: false,
      session_scope: CancellationScope::new(),
      ready_check_scope: CancellationScope::new(),
      notices,
      tasks: Vec::new(),
    }
  }

  pub fn record(&self) -> AutoActionRecord {
    self.record
  }

  pub fn reset(&mut self) {
    if self.record != AutoActionRecord::default() {
      tracing::debug!(target: "gameflow::auto_action", "resetting auto action record");
    }
    self.record = AutoActionRecord::default();
  }

  /// Aborts every scheduled but not yet executed action.
  pub fn cancel_pending(&mut self) {
    self.session_scope.cancel();
    self.session_scope = CancellationScope::new();
    self.ready_check_scope.cancel();
    self.ready_check_scope = CancellationScope::new();
    for task in self.tasks.drain(..) {
      task.abort();
    }
  }

  pub fn on_phase(&mut self, phase: &GamePhase) {
    if *phase != GamePhase::ReadyCheck {
      if self.ready_check_accepted {
        self.ready_check_scope.cancel();
        self.ready_check_scope = CancellationScope::new();
      }
      self.ready_check_accepted = false;
      return;
    }

    if !self.config.auto_accept || self.ready_check_accepted {
      return;
    }
    self.ready_check_accepted = true;
    tracing::info!(
      target: "gameflow::auto_action",
      delay_ms = self.config.accept_delay_ms,
      "scheduling ready check accept"
    );
    let backend = self.backend.clone();
    let notices = self.notices.clone();
    let scope = self.ready_check_scope.clone();
    let delay = Duration::from_millis(self.config.accept_delay_ms);
    self.spawn(async move {
      if !scope.sleep(delay).await {
        tracing::debug!(target: "gameflow::auto_action", "ready check accept cancelled");
        return;
      }
      let result = backend.accept_match().await;
      report(&notices, ActionKind::Accept, None, result);
    });
  }

  /// Feeds the latest champ select session, or `None` when it was deleted.
  pub fn on_session(&mut self, session: Option<&SessionSnapshot>) {
    let Some(session) = session else {
      if self.session_present {
        tracing::debug!(target: "gameflow::auto_action", "champ select session closed");
        self.session_scope.cancel();
        self.session_scope = CancellationScope::new();
      }
      self.session_present = false;
      return;
    };

    if !self.session_present {
      tracing::info!(
        target: "gameflow::auto_action",
        game_id = session.game_id,
        "new champ select session"
      );
      self.session_present = true;
      self.reset();
    }

    match session.sub_phase() {
      ChampSelectSubPhase::Finalization => {
        self.reset();
        return;
      }
      ChampSelectSubPhase::BanPick => {}
      _ => return,
    }

    for action in session.pending_local_actions() {
      if action.is_ban() {
        self.maybe_ban(session, action);
      } else if action.is_pick() {
        self.maybe_pick(session, action);
      }
    }
  }

  fn maybe_ban(&mut self, session: &SessionSnapshot, action: &ChampSelectAction) {
    if !self.config.auto_ban || self.record.ban_champion {
      return;
    }
    let mut excluded = session.unavailable_champions();
    excluded.extend(session.ally_intents());
    let Some(champion_id) = first_available(&self.config.ban_champion_ids, &excluded) else {
      tracing::debug!(target: "gameflow::auto_action", "no bannable champion in preferences");
      return;
    };

    self.record.ban_champion = true;
    tracing::info!(
      target: "gameflow::auto_action",
      action_id = action.id,
      champion_id,
      delay_ms = self.config.ban_delay_ms,
      "scheduling auto ban"
    );
    let backend = self.backend.clone();
    let notices = self.notices.clone();
    let scope = self.session_scope.clone();
    let delay = Duration::from_millis(self.config.ban_delay_ms);
    let action_id = action.id;
    self.spawn(async move {
      if !scope.sleep(delay).await {
        return;
      }
      let result = backend.champ_select_action(action_id, champion_id, true).await;
      report(&notices, ActionKind::Ban, Some(champion_id), result);
    });
  }

  fn maybe_pick(&mut self, session: &SessionSnapshot, action: &ChampSelectAction) {
    if !self.config.auto_pick || self.record.select_champion {
      return;
    }
    let excluded = session.unavailable_champions();
    let Some(champion_id) = first_available(&self.config.pick_champion_ids, &excluded) else {
      tracing::debug!(target: "gameflow::auto_action", "no pickable champion in preferences");
      return;
    };

    self.record.select_champion = true;
    tracing::info!(
      target: "gameflow::auto_action",
      action_id = action.id,
      champion_id,
      delay_ms = self.config.pick_delay_ms,
      "scheduling auto pick"
    );
    let backend = self.backend.clone();
    let notices = self.notices.clone();
    let scope = self.session_scope.clone();
    let hover_delay = Duration::from_millis(self.config.pick_delay_ms);
    let lock_in_delay = Duration::from_millis(self.config.lock_in_delay_ms);
    let action_id = action.id;
    self.spawn(async move {
      if !scope.sleep(hover_delay).await {
        return;
      }
      let hovered = backend.champ_select_action(action_id, champion_id, false).await;
      if !report(&notices, ActionKind::Hover, Some(champion_id), hovered) {
        return;
      }
      if !scope.sleep(lock_in_delay).await {
        return;
      }
      let locked = backend.champ_select_action(action_id, champion_id, true).await;
      report(&notices, ActionKind::LockIn, Some(champion_id), locked);
    });
  }

  fn spawn<F>(&mut self, task: F)
  where
    F: std::future::Future<Output = ()> + Send + 'static,
  {
    self.tasks.retain(|t| !t.is_finished());
    self.tasks.push(tokio::spawn(task));
  }
}

impl Drop for AutoActionScheduler {
  fn drop(&mut self) {
    self.cancel_pending();
  }
}

fn first_available(preferred: &[u32], excluded: &HashSet<u32>) -> Option<u32> {
  preferred
    .iter()
    .copied()
    .find(|id| *id > 0 && !excluded.contains(id))
}

/// Logs and announces the outcome of one action. Failures are not retried.
fn report(
  notices: &broadcast::Sender<Notice>,
  action: ActionKind,
  champion_id: Option<u32>,
  result: crate::error::Result<()>,
) -> bool {
  match result {
    Ok(()) => {
      tracing::info!(target: "gameflow::auto_action", %action, ?champion_id, "auto action executed");
      let _ = notices.send(Notice::ActionExecuted {
        action,
        champion_id,
      });
      true
    }
    Err(err) => {
      tracing::warn!(
        target: "gameflow::auto_action",
        %action,
        ?champion_id,
        error = %err,
        "auto action failed"
      );
      let _ = notices.send(Notice::ActionFailed {
        action,
        champion_id,
        message: err.to_string(),
      });
      false
    }
  }
}
