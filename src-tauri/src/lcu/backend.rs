// The backend seam: everything the orchestrator asks of the League client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::gameflow::{GamePhase, SessionSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurrentSummoner {
  pub summoner_id: u64,
  pub puuid: String,
  pub game_name: String,
  pub tag_line: String,
  pub display_name: String,
}

impl CurrentSummoner {
  /// Same naming rule as champ select rosters: `gameName#tagLine` first.
  pub fn riot_id(&self) -> String {
    riot_id(&self.game_name, &self.tag_line, &self.display_name)
  }
}

/// One summoner resolved by a batched lookup, with their recent games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerMatchData {
  /// Name as returned by the backend; reconciliation matches on it exactly.
  pub display_name: String,
  pub summoner_id: u64,
  pub puuid: String,
  pub tier: Option<String>,
  /// Newest first.
  pub matches: Vec<MatchRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
  pub game_id: u64,
  pub champion_id: u32,
  pub win: bool,
  pub kills: u32,
  pub deaths: u32,
  pub assists: u32,
  pub queue_id: i32,
  /// Milliseconds since the UNIX epoch.
  pub game_creation: i64,
}

/// A player in the running game, as reported by the live client API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePlayer {
  pub display_name: String,
  pub champion_name: String,
  pub is_bot: bool,
  /// `ORDER` or `CHAOS`.
  pub team: String,
  pub position: String,
  pub spells: [u32; 2],
}

#[async_trait]
pub trait LcuBackend: Send + Sync {
  async fn current_summoner(&self) -> Result<CurrentSummoner>;

  async fn gameflow_phase(&self) -> Result<GamePhase>;

  /// `None` when no champ select session exists.
  async fn champ_select_session(&self) -> Result<Option<SessionSnapshot>>;

  /// Resolves every name in one batch. Names without a match are simply absent.
  async fn lookup_summoners(
    &self,
    names: &[String],
    match_count: u32,
  ) -> Result<Vec<SummonerMatchData>>;

  /// Hovers `champion_id` for the action, locking it in when `completed`.
  async fn champ_select_action(&self, action_id: i64, champion_id: u32, completed: bool)
    -> Result<()>;

  async fn accept_match(&self) -> Result<()>;

  async fn decline_match(&self) -> Result<()>;

  async fn live_players(&self) -> Result<Vec<LivePlayer>>;
}

pub type SharedBackend = Arc<dyn LcuBackend>;

pub fn riot_id(game_name: &str, tag_line: &str, fallback: &str) -> String {
  match (game_name.is_empty(), tag_line.is_empty()) {
    (false, false) => format!("{}#{}", game_name, tag_line),
    (false, true) => game_name.to_string(),
    _ => fallback.to_string(),
  }
}
