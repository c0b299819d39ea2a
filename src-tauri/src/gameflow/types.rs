// Types shared across the gameflow orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::phase::PipelineStatus;
use super::session::SessionSnapshot;

/// Gameflow phase as reported by `/lol-gameflow/v1/gameflow-phase`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GamePhase {
  #[default]
  None,
  Lobby,
  Matchmaking,
  CheckedIntoTournament,
  ReadyCheck,
  ChampSelect,
  GameStart,
  InProgress,
  Reconnect,
  WaitingForStats,
  PreEndOfGame,
  EndOfGame,
  Unknown(String),
}

impl GamePhase {
  /// Parses the raw phase string; surrounding JSON quotes are tolerated.
  pub fn parse(raw: &str) -> Self {
    match raw.trim().trim_matches('"') {
      "" | "None" => Self::None,
      "Lobby" => Self::Lobby,
      "Matchmaking" => Self::Matchmaking,
      "CheckedIntoTournament" => Self::CheckedIntoTournament,
      "ReadyCheck" => Self::ReadyCheck,
      "ChampSelect" => Self::ChampSelect,
      "GameStart" => Self::GameStart,
      "InProgress" => Self::InProgress,
      "Reconnect" => Self::Reconnect,
      "WaitingForStats" => Self::WaitingForStats,
      "PreEndOfGame" => Self::PreEndOfGame,
      "EndOfGame" => Self::EndOfGame,
      other => Self::Unknown(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::None => "None",
      Self::Lobby => "Lobby",
      Self::Matchmaking => "Matchmaking",
      Self::CheckedIntoTournament => "CheckedIntoTournament",
      Self::ReadyCheck => "ReadyCheck",
      Self::ChampSelect => "ChampSelect",
      Self::GameStart => "GameStart",
      Self::InProgress => "InProgress",
      Self::Reconnect => "Reconnect",
      Self::WaitingForStats => "WaitingForStats",
      Self::PreEndOfGame => "PreEndOfGame",
      Self::EndOfGame => "EndOfGame",
      Self::Unknown(raw) => raw,
    }
  }

  /// Phases that belong to a match session (champ select onwards).
  pub fn is_session_phase(&self) -> bool {
    matches!(
      self,
      Self::ChampSelect
        | Self::GameStart
        | Self::InProgress
        | Self::Reconnect
        | Self::WaitingForStats
        | Self::PreEndOfGame
        | Self::EndOfGame
    )
  }
}

impl From<String> for GamePhase {
  fn from(raw: String) -> Self {
    Self::parse(&raw)
  }
}

impl From<GamePhase> for String {
  fn from(phase: GamePhase) -> Self {
    phase.as_str().to_string()
  }
}

impl fmt::Display for GamePhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamSide {
  MyTeam,
  Enemy,
}

impl fmt::Display for TeamSide {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MyTeam => f.write_str("my team"),
      Self::Enemy => f.write_str("enemy team"),
    }
  }
}

/// One seat in a team roster. `index` never changes for the session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
  pub index: usize,
  pub display_name: String,
  pub is_bot: bool,
  pub summoner_id: Option<u64>,
  pub puuid: Option<String>,
  pub champion_id: Option<u32>,
  pub champion_name: Option<String>,
  pub position: Option<String>,
  pub spells: [u32; 2],
  pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRoster {
  pub players: Vec<PlayerSlot>,
  pub local_player_slot: Option<usize>,
}

impl TeamRoster {
  pub fn len(&self) -> usize {
    self.players.len()
  }

  pub fn is_empty(&self) -> bool {
    self.players.is_empty()
  }

  pub fn queries(&self) -> Vec<PlayerQuery> {
    self
      .players
      .iter()
      .map(|p| PlayerQuery {
        summoner_name: p.display_name.clone(),
        is_bot: p.is_bot,
        index: p.index,
      })
      .collect()
  }

  /// Display names in slot order; used to notice roster membership changes.
  pub fn membership(&self) -> Vec<String> {
    self.players.iter().map(|p| p.display_name.clone()).collect()
  }
}

/// A lookup request for one roster slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuery {
  pub summoner_name: String,
  pub is_bot: bool,
  pub index: usize,
}

impl PlayerQuery {
  /// Bots and blank names never reach the backend.
  pub fn is_resolvable(&self) -> bool {
    !self.is_bot && !self.summoner_name.trim().is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChampionUsage {
  pub champion_id: u32,
  pub games: u32,
  pub wins: u32,
  pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGame {
  pub game_id: u64,
  pub champion_id: u32,
  pub win: bool,
  pub kills: u32,
  pub deaths: u32,
  pub assists: u32,
  pub queue_id: i32,
  pub played_at: Option<DateTime<Utc>>,
}

/// Aggregated match-history stats for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedStats {
  pub display_name: String,
  pub tier: Option<String>,
  pub total_games: u32,
  pub wins: u32,
  pub losses: u32,
  /// Percentage in `[0, 100]`.
  pub win_rate: f64,
  pub avg_kills: f64,
  pub avg_deaths: f64,
  pub avg_assists: f64,
  pub avg_kda: f64,
  pub favorite_champions: Vec<ChampionUsage>,
  pub recent_games: Vec<RecentGame>,
}

/// Push notifications from the LCU, already parsed.
#[derive(Debug, Clone)]
pub enum ClientEvent {
  Phase(GamePhase),
  /// `None` when the champ select session was deleted.
  Session(Option<Arc<SessionSnapshot>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
  Accept,
  Ban,
  Hover,
  LockIn,
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Self::Accept => "accept",
      Self::Ban => "ban",
      Self::Hover => "hover",
      Self::LockIn => "lock-in",
    };
    f.write_str(label)
  }
}

/// User-facing notices: non-blocking gaps, exhausted retries, missed automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notice {
  #[serde(rename_all = "camelCase")]
  StatsUnavailable {
    side: TeamSide,
    index: usize,
    player: String,
  },
  #[serde(rename_all = "camelCase")]
  RetriesExhausted {
    phase: GamePhase,
    attempts: u32,
    message: String,
  },
  /// A pipeline step failed with an error that is not worth retrying.
  #[serde(rename_all = "camelCase")]
  PipelineFailed {
    phase: GamePhase,
    message: String,
  },
  #[serde(rename_all = "camelCase")]
  ActionFailed {
    action: ActionKind,
    champion_id: Option<u32>,
    message: String,
  },
  #[serde(rename_all = "camelCase")]
  ActionExecuted {
    action: ActionKind,
    champion_id: Option<u32>,
  },
}

/// The projection consumed by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoutState {
  pub phase: GamePhase,
  pub pipeline: PipelineStatus,
  pub is_loading: bool,
  pub my_team_roster: Vec<PlayerSlot>,
  pub my_team_stats: Vec<Option<EnrichedStats>>,
  pub enemy_team_roster: Vec<PlayerSlot>,
  pub enemy_team_stats: Vec<Option<EnrichedStats>>,
  pub enemy_champion_picks: Vec<u32>,
  pub local_player_slot: Option<usize>,
  pub last_error: Option<String>,
  pub last_updated: Option<DateTime<Utc>>,
}

impl Default for ScoutState {
  fn default() -> Self {
    Self {
      phase: GamePhase::None,
      pipeline: PipelineStatus::Idle,
      is_loading: false,
      my_team_roster: Vec::new(),
      my_team_stats: Vec::new(),
      enemy_team_roster: Vec::new(),
      enemy_team_stats: Vec::new(),
      enemy_champion_picks: Vec::new(),
      local_player_slot: None,
      last_error: None,
      last_updated: None,
    }
  }
}

impl ScoutState {
  pub fn roster(&self, side: TeamSide) -> &[PlayerSlot] {
    match side {
      TeamSide::MyTeam => &self.my_team_roster,
      TeamSide::Enemy => &self.enemy_team_roster,
    }
  }

  pub fn stats(&self, side: TeamSide) -> &[Option<EnrichedStats>] {
    match side {
      TeamSide::MyTeam => &self.my_team_stats,
      TeamSide::Enemy => &self.enemy_team_stats,
    }
  }

  /// Drops every roster and stat vector. Phase and pipeline status are kept.
  pub fn clear_team_data(&mut self) {
    self.my_team_roster = Vec::new();
    self.my_team_stats = Vec::new();
    self.enemy_team_roster = Vec::new();
    self.enemy_team_stats = Vec::new();
    self.enemy_champion_picks = Vec::new();
    self.local_player_slot = None;
  }
}
