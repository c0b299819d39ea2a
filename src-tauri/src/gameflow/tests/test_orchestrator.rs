// End-to-end tests for the orchestrator actor against the mock backend

use super::test_helpers::*;

#[cfg(test)]
mod orchestrator_tests {
  use super::*;
  use crate::config::ScoutConfig;
  use crate::gameflow::{
    ClientEvent, GamePhase, Notice, Orchestrator, OrchestratorHandle, PipelineStatus, ScoutState,
    SessionSnapshot, TeamSide,
  };
  use std::sync::atomic::Ordering;
  use std::sync::Arc;
  use std::time::Duration;
  use tokio::sync::{broadcast, mpsc};

  const PAST_DEBOUNCE: Duration = Duration::from_millis(150);

  fn start(backend: &Arc<MockBackend>, config: ScoutConfig) -> (OrchestratorHandle, mpsc::Sender<ClientEvent>) {
    let (tx, rx) = mpsc::channel(16);
    (Orchestrator::start(backend.clone(), config, rx), tx)
  }

  async fn phase(events: &mpsc::Sender<ClientEvent>, phase: GamePhase) {
    events.send(ClientEvent::Phase(phase)).await.unwrap();
    settle().await;
  }

  async fn session(events: &mpsc::Sender<ClientEvent>, session: SessionSnapshot) {
    events
      .send(ClientEvent::Session(Some(Arc::new(session))))
      .await
      .unwrap();
    settle().await;
  }

  fn names(state: &ScoutState, side: TeamSide) -> Vec<String> {
    state
      .roster(side)
      .iter()
      .map(|p| p.display_name.clone())
      .collect()
  }

  fn drain(notices: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
      out.push(notice);
    }
    out
  }

  fn champ_select_backend() -> Arc<MockBackend> {
    let backend = MockBackend::new();
    backend.set_session(Some(champ_select_session("BAN_PICK")));
    backend
  }

  fn in_game_backend(backend: &MockBackend) {
    backend.set_local("A#EUW");
    backend.set_live_players(vec![
      live_player("A#EUW", "ORDER"),
      live_player("C#EUW", "ORDER"),
      live_player("X#EUW", "CHAOS"),
    ]);
  }

  /// Test: rapid phase changes only run the last phase's pipeline
  ///
  /// Scenario: ChampSelect, then InProgress 40ms later (inside the debounce window).
  /// Expected: the champ select pipeline never starts; the in-game one runs once.
  #[tokio::test(start_paused = true)]
  async fn test_debounce_runs_only_last_phase() {
    let backend = champ_select_backend();
    in_game_backend(&backend);
    backend.know("A#EUW", 3);
    backend.know("X#EUW", 3);
    let (handle, events) = start(&backend, test_config());

    phase(&events, GamePhase::ChampSelect).await;
    advance(Duration::from_millis(40)).await;
    phase(&events, GamePhase::InProgress).await;
    advance(Duration::from_millis(300)).await;

    assert_eq!(backend.session_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.live_calls.load(Ordering::SeqCst), 1);

    let state = handle.snapshot();
    assert_eq!(state.phase, GamePhase::InProgress);
    assert_eq!(state.pipeline, PipelineStatus::Idle);
    assert!(!state.is_loading);
    assert_eq!(names(&state, TeamSide::MyTeam), vec!["A#EUW", "C#EUW"]);
    assert_eq!(names(&state, TeamSide::Enemy), vec!["X#EUW"]);
    assert_eq!(state.local_player_slot, Some(0));
    assert!(state.my_team_stats[0].is_some());
    assert!(state.my_team_stats[1].is_none());
    assert!(state.enemy_team_stats[0].is_some());
  }

  /// Test: index alignment in published state
  ///
  /// Scenario: my team is [A, bot, B]; only A resolves. Enemy is [X, Y]; only X resolves.
  /// Expected: `[Some, None, None]` and `[Some, None]`, with a notice for
  /// each real player without data and none for the bot.
  #[tokio::test(start_paused = true)]
  async fn test_stats_stay_aligned_with_roster() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 5);
    backend.know("X#EUW", 2);
    let (handle, events) = start(&backend, test_config());
    let mut notices = handle.notices();

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;

    let state = handle.snapshot();
    assert_eq!(names(&state, TeamSide::MyTeam), vec!["A#EUW", "", "B#EUW"]);
    assert_eq!(state.my_team_stats.len(), 3);
    assert_eq!(state.my_team_stats[0].as_ref().map(|s| s.total_games), Some(5));
    assert!(state.my_team_stats[1].is_none());
    assert!(state.my_team_stats[2].is_none());
    assert_eq!(state.enemy_team_stats.len(), 2);
    assert!(state.enemy_team_stats[0].is_some());
    assert!(state.enemy_team_stats[1].is_none());
    assert_eq!(state.local_player_slot, Some(0));

    let notices = drain(&mut notices);
    assert!(notices.contains(&Notice::StatsUnavailable {
      side: TeamSide::MyTeam,
      index: 2,
      player: "B#EUW".to_string(),
    }));
    assert!(notices.contains(&Notice::StatsUnavailable {
      side: TeamSide::Enemy,
      index: 1,
      player: "Y#EUW".to_string(),
    }));
    assert!(!notices
      .iter()
      .any(|n| matches!(n, Notice::StatsUnavailable { index: 1, side: TeamSide::MyTeam, .. })));
  }

  /// Test: at most one pipeline per phase
  ///
  /// Scenario: ChampSelect is reported again while its pipeline is loading,
  /// and a manual retry is requested meanwhile.
  /// Expected: one session fetch, one lookup per side, the retry is refused.
  #[tokio::test(start_paused = true)]
  async fn test_duplicate_phase_while_loading_is_ignored() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    backend.delay_lookups(&[Duration::from_secs(1), Duration::from_secs(1)]);
    let (handle, events) = start(&backend, test_config());

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;
    assert!(handle.snapshot().is_loading);
    assert_eq!(
      handle.snapshot().pipeline,
      PipelineStatus::Loading(GamePhase::ChampSelect)
    );

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;
    assert!(!handle.retry().await.unwrap());

    advance(Duration::from_millis(1000)).await;
    assert_eq!(backend.session_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.lookup_count(), 2);
    assert!(!handle.snapshot().is_loading);
  }

  /// Test: a newer phase cancels the running pipeline
  ///
  /// Scenario: champ select lookups hang for a second; the game starts while
  /// they are in flight.
  /// Expected: the final state holds the in-game rosters and their stats; the
  /// late champ select results are discarded.
  #[tokio::test(start_paused = true)]
  async fn test_newer_phase_wins_over_stale_pipeline() {
    let backend = champ_select_backend();
    in_game_backend(&backend);
    backend.know("A#EUW", 1);
    backend.know("B#EUW", 1);
    backend.know("C#EUW", 1);
    backend.know("X#EUW", 1);
    backend.know("Y#EUW", 1);
    backend.delay_lookups(&[Duration::from_secs(1), Duration::from_secs(1)]);
    let (handle, events) = start(&backend, test_config());

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;
    assert_eq!(handle.snapshot().my_team_roster.len(), 3);

    phase(&events, GamePhase::InProgress).await;
    advance(Duration::from_millis(1500)).await;

    let state = handle.snapshot();
    assert_eq!(state.phase, GamePhase::InProgress);
    assert_eq!(names(&state, TeamSide::MyTeam), vec!["A#EUW", "C#EUW"]);
    assert_eq!(names(&state, TeamSide::Enemy), vec!["X#EUW"]);
    assert_eq!(state.my_team_stats.len(), 2);
    assert_eq!(state.enemy_team_stats.len(), 1);
    assert!(state.my_team_stats.iter().all(Option::is_some));
    assert_eq!(state.pipeline, PipelineStatus::Idle);
    // Two hung champ select lookups plus one per in-game side.
    assert_eq!(backend.lookup_count(), 4);
  }

  /// Test: exhausted retries surface as an error, and retry() recovers
  ///
  /// Scenario: every lookup fails until the budget (1s + 2s + 4s of back-off)
  /// is spent; then the backend heals and the user retries.
  /// Expected: Error status with a notice, then a clean load after retry.
  #[tokio::test(start_paused = true)]
  async fn test_retries_exhausted_then_manual_retry() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    backend.fail_lookups(100);
    let (handle, events) = start(&backend, test_config());
    let mut notices = handle.notices();

    phase(&events, GamePhase::ChampSelect).await;
    advance(Duration::from_secs(8)).await;

    let state = handle.snapshot();
    assert_eq!(state.pipeline, PipelineStatus::Error(GamePhase::ChampSelect));
    assert!(!state.is_loading);
    assert!(state.last_error.is_some());
    // Rosters are still shown without stats.
    assert_eq!(state.my_team_roster.len(), 3);
    assert!(state.my_team_stats.iter().all(Option::is_none));
    assert!(drain(&mut notices)
      .iter()
      .any(|n| matches!(n, Notice::RetriesExhausted { phase: GamePhase::ChampSelect, attempts: 4, .. })));

    backend.fail_lookups(0);
    assert!(handle.retry().await.unwrap());
    advance(Duration::from_millis(100)).await;

    let state = handle.snapshot();
    assert_eq!(state.pipeline, PipelineStatus::Idle);
    assert!(state.last_error.is_none());
    assert!(state.my_team_stats[0].is_some());
  }

  /// Test: a refused lookup fails the pipeline without retrying
  ///
  /// Scenario: the client answers one lookup with a 403.
  /// Expected: no retry, Error status and a `PipelineFailed` notice rather
  /// than `RetriesExhausted`.
  #[tokio::test(start_paused = true)]
  async fn test_non_transient_error_reports_pipeline_failed() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    backend.reject_lookups(1);
    let (handle, events) = start(&backend, test_config());
    let mut notices = handle.notices();

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;

    let state = handle.snapshot();
    assert_eq!(state.pipeline, PipelineStatus::Error(GamePhase::ChampSelect));
    assert!(state.last_error.as_deref().unwrap().contains("403"));
    assert_eq!(backend.lookup_count(), 2);

    let notices = drain(&mut notices);
    assert!(notices
      .iter()
      .any(|n| matches!(n, Notice::PipelineFailed { phase: GamePhase::ChampSelect, message } if message.contains("403"))));
    assert!(!notices
      .iter()
      .any(|n| matches!(n, Notice::RetriesExhausted { .. })));
  }

  /// Test: a hanging live game API times out on every attempt
  ///
  /// Scenario: the live player list never answers within 5s. Four attempts
  /// with 1s + 2s + 4s of back-off take about 27s.
  /// Expected: Error status, a timeout in the last error, and no lookups.
  #[tokio::test(start_paused = true)]
  async fn test_live_players_timeout_exhausts_retries() {
    let backend = MockBackend::new();
    in_game_backend(&backend);
    backend.delay_live_players(Duration::from_secs(60));
    let (handle, events) = start(&backend, test_config());
    let mut notices = handle.notices();

    phase(&events, GamePhase::InProgress).await;
    advance(Duration::from_secs(20)).await;
    assert!(handle.snapshot().is_loading, "still inside the retry budget");

    advance(Duration::from_secs(10)).await;
    let state = handle.snapshot();
    assert_eq!(state.pipeline, PipelineStatus::Error(GamePhase::InProgress));
    assert!(state.last_error.as_deref().unwrap().contains("live player list"));
    assert_eq!(backend.live_calls.load(Ordering::SeqCst), 4);
    assert_eq!(backend.lookup_count(), 0);
    assert!(drain(&mut notices)
      .iter()
      .any(|n| matches!(n, Notice::RetriesExhausted { phase: GamePhase::InProgress, attempts: 4, .. })));
  }

  /// Test: leaving the game clears team data
  #[tokio::test(start_paused = true)]
  async fn test_cleanup_phase_clears_team_data() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    let (handle, events) = start(&backend, test_config());

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;
    assert!(!handle.snapshot().my_team_roster.is_empty());

    phase(&events, GamePhase::Lobby).await;
    advance(PAST_DEBOUNCE).await;

    let state = handle.snapshot();
    assert_eq!(state.phase, GamePhase::Lobby);
    assert!(state.my_team_roster.is_empty());
    assert!(state.my_team_stats.is_empty());
    assert!(state.enemy_team_roster.is_empty());
    assert!(state.enemy_team_stats.is_empty());
    assert_eq!(state.pipeline, PipelineStatus::Idle);
    assert!(!handle.retry().await.unwrap(), "lobby has no pipeline to retry");
  }

  /// Test: session events feed enemy picks and the auto ban, once
  ///
  /// Scenario: ChampSelect is signalled and the same BAN_PICK session is
  /// pushed three times before the phase settles.
  /// Expected: enemy pick shown, exactly one ban call, and the pipeline uses the
  /// pushed session instead of fetching one.
  #[tokio::test(start_paused = true)]
  async fn test_session_events_drive_picks_and_single_ban() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    let config = ScoutConfig {
      auto_actions: auto_ban_config(vec![238]),
      ..test_config()
    };
    let (handle, events) = start(&backend, config);

    let mut pushed = champ_select_session("BAN_PICK");
    pushed.their_team[1].champion_id = 64;
    phase(&events, GamePhase::ChampSelect).await;
    for _ in 0..3 {
      session(&events, pushed.clone()).await;
    }
    advance(Duration::from_millis(700)).await;

    let state = handle.snapshot();
    assert_eq!(state.enemy_champion_picks, vec![64]);
    assert_eq!(
      backend.actions(),
      vec![ActionCall {
        action_id: 10,
        champion_id: 238,
        completed: true,
      }]
    );
    assert_eq!(backend.session_calls.load(Ordering::SeqCst), 0);
    assert_eq!(state.my_team_roster.len(), 3);
  }

  /// Test: a roster change during champ select restarts the pipeline
  ///
  /// Scenario: after loading, an enemy is swapped out in a new session event.
  /// Expected: the enemy roster and lookups follow the new member.
  #[tokio::test(start_paused = true)]
  async fn test_roster_change_restarts_champ_select_pipeline() {
    let backend = champ_select_backend();
    backend.know("Z#EUW", 2);
    let (handle, events) = start(&backend, test_config());

    phase(&events, GamePhase::ChampSelect).await;
    session(&events, champ_select_session("BAN_PICK")).await;
    advance(PAST_DEBOUNCE).await;
    assert_eq!(names(&handle.snapshot(), TeamSide::Enemy), vec!["X#EUW", "Y#EUW"]);

    let mut swapped = champ_select_session("BAN_PICK");
    swapped.their_team[1].game_name = "Z".to_string();
    session(&events, swapped).await;
    advance(Duration::from_millis(50)).await;

    let state = handle.snapshot();
    assert_eq!(names(&state, TeamSide::Enemy), vec!["X#EUW", "Z#EUW"]);
    assert!(state.enemy_team_stats[1].is_some());
    assert!(backend
      .lookups()
      .contains(&vec!["X#EUW".to_string(), "Z#EUW".to_string()]));
  }

  /// Test: session pushes after champ select are ignored
  ///
  /// Scenario: champ select ends in the lobby, then a stale BAN_PICK session
  /// with an enemy pick arrives.
  /// Expected: the lobby state shows no picks and no ban is sent.
  #[tokio::test(start_paused = true)]
  async fn test_late_session_does_not_leak_into_lobby() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    let config = ScoutConfig {
      auto_actions: auto_ban_config(vec![238]),
      ..test_config()
    };
    let (handle, events) = start(&backend, config);

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;
    phase(&events, GamePhase::Lobby).await;
    advance(PAST_DEBOUNCE).await;

    let mut stale = champ_select_session("BAN_PICK");
    stale.their_team[1].champion_id = 64;
    session(&events, stale).await;
    advance(Duration::from_millis(700)).await;

    let state = handle.snapshot();
    assert_eq!(state.phase, GamePhase::Lobby);
    assert!(state.enemy_champion_picks.is_empty());
    assert!(state.my_team_roster.is_empty());
    assert!(backend.actions().is_empty());
  }

  /// Test: the actor outlives the event stream until shut down
  #[tokio::test(start_paused = true)]
  async fn test_closed_event_stream_keeps_actor_alive() {
    let backend = MockBackend::new();
    let (handle, events) = start(&backend, test_config());
    drop(events);
    settle().await;

    assert!(!handle.retry().await.unwrap());
    assert_eq!(handle.snapshot().phase, GamePhase::None);
    handle.shutdown().await;
  }

  /// Test: shutdown clears the published team data
  #[tokio::test(start_paused = true)]
  async fn test_shutdown_clears_team_data() {
    let backend = champ_select_backend();
    backend.know("A#EUW", 1);
    let (handle, events) = start(&backend, test_config());
    let states = handle.subscribe();

    phase(&events, GamePhase::ChampSelect).await;
    advance(PAST_DEBOUNCE).await;
    assert_eq!(states.borrow().my_team_roster.len(), 3);

    handle.shutdown().await;
    let state = states.borrow().clone();
    assert!(state.my_team_roster.is_empty());
    assert!(state.my_team_stats.is_empty());
  }
}
