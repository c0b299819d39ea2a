// Champ select session snapshot and roster extraction

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::types::{PlayerSlot, TeamRoster};
use crate::error::Result;
use crate::lcu::riot_id;

/// Immutable view of `/lol-champ-select/v1/session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
  pub game_id: u64,
  pub local_player_cell_id: i64,
  pub actions: Vec<Vec<ChampSelectAction>>,
  pub my_team: Vec<TeamMember>,
  pub their_team: Vec<TeamMember>,
  pub timer: SessionTimer,
  pub bans: SessionBans,
  pub is_custom_game: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChampSelectAction {
  pub id: i64,
  pub actor_cell_id: i64,
  pub champion_id: u32,
  pub completed: bool,
  pub is_in_progress: bool,
  pub is_ally_action: bool,
  #[serde(rename = "type")]
  pub kind: String,
}

impl ChampSelectAction {
  pub fn is_ban(&self) -> bool {
    self.kind == "ban"
  }

  pub fn is_pick(&self) -> bool {
    self.kind == "pick"
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMember {
  pub cell_id: i64,
  pub summoner_id: u64,
  pub puuid: String,
  pub game_name: String,
  pub tag_line: String,
  /// Pre Riot ID clients only fill this one.
  pub summoner_name: String,
  pub champion_id: u32,
  pub champion_pick_intent: u32,
  pub assigned_position: String,
  pub spell1_id: u32,
  pub spell2_id: u32,
  pub team: u8,
  pub name_visibility_type: String,
}

impl TeamMember {
  /// `gameName#tagLine` when available, the legacy summoner name otherwise.
  pub fn display_name(&self) -> String {
    riot_id(&self.game_name, &self.tag_line, &self.summoner_name)
  }

  /// Bots carry neither a summoner id nor a puuid. Hidden enemies in ranked
  /// look the same, so they are excluded by their visibility flag.
  pub fn is_bot(&self) -> bool {
    self.summoner_id == 0
      && self.puuid.is_empty()
      && self.champion_id > 0
      && self.name_visibility_type != "HIDDEN"
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionTimer {
  pub phase: String,
  pub adjusted_time_left_in_phase: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionBans {
  pub my_team_bans: Vec<u32>,
  pub their_team_bans: Vec<u32>,
}

/// `timer.phase` of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChampSelectSubPhase {
  Planning,
  BanPick,
  Finalization,
  GameStarting,
  Other(String),
}

/// The fields of a session that matter to the pipeline and the auto actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionSignature {
  pub timer_phase: String,
  pub my_team: Vec<String>,
  pub their_team: Vec<String>,
  pub actions: Vec<(i64, i64, u32, bool, bool)>,
}

impl SessionSignature {
  pub fn same_roster(&self, other: &SessionSignature) -> bool {
    self.my_team == other.my_team && self.their_team == other.their_team
  }
}

impl SessionSnapshot {
  pub fn from_value(value: &serde_json::Value) -> Result<Self> {
    Ok(serde_json::from_value(value.clone())?)
  }

  pub fn sub_phase(&self) -> ChampSelectSubPhase {
    match self.timer.phase.as_str() {
      "PLANNING" => ChampSelectSubPhase::Planning,
      "BAN_PICK" => ChampSelectSubPhase::BanPick,
      "FINALIZATION" => ChampSelectSubPhase::Finalization,
      "GAME_STARTING" => ChampSelectSubPhase::GameStarting,
      other => ChampSelectSubPhase::Other(other.to_string()),
    }
  }

  pub fn all_actions(&self) -> impl Iterator<Item = &ChampSelectAction> {
    self.actions.iter().flatten()
  }

  /// The local player's actions that are open right now.
  pub fn pending_local_actions(&self) -> Vec<&ChampSelectAction> {
    self
      .all_actions()
      .filter(|a| a.actor_cell_id == self.local_player_cell_id)
      .filter(|a| a.is_in_progress && !a.completed)
      .collect()
  }

  /// Champions that can no longer be banned or picked.
  pub fn unavailable_champions(&self) -> HashSet<u32> {
    let mut taken: HashSet<u32> = self
      .all_actions()
      .filter(|a| a.completed && a.champion_id > 0)
      .map(|a| a.champion_id)
      .collect();
    taken.extend(self.bans.my_team_bans.iter().copied());
    taken.extend(self.bans.their_team_bans.iter().copied());
    taken.extend(
      self
        .my_team
        .iter()
        .chain(self.their_team.iter())
        .filter(|m| m.cell_id != self.local_player_cell_id)
        .map(|m| m.champion_id)
        .filter(|id| *id > 0),
    );
    taken.remove(&0);
    taken
  }

  /// Champions teammates intend to play; never ban these.
  pub fn ally_intents(&self) -> HashSet<u32> {
    self
      .my_team
      .iter()
      .filter(|m| m.cell_id != self.local_player_cell_id)
      .flat_map(|m| [m.champion_pick_intent, m.champion_id])
      .filter(|id| *id > 0)
      .collect()
  }

  pub fn enemy_champion_picks(&self) -> Vec<u32> {
    let mut picks: Vec<u32> = self
      .their_team
      .iter()
      .map(|m| m.champion_id)
      .filter(|id| *id > 0)
      .collect();
    for action in self.all_actions() {
      if action.is_pick()
        && action.completed
        && !action.is_ally_action
        && action.champion_id > 0
        && !picks.contains(&action.champion_id)
      {
        picks.push(action.champion_id);
      }
    }
    picks
  }

  pub fn my_team_roster(&self) -> TeamRoster {
    build_roster(&self.my_team, Some(self.local_player_cell_id))
  }

  pub fn enemy_team_roster(&self) -> TeamRoster {
    build_roster(&self.their_team, None)
  }

  /// Roster membership, ban/pick actions and the sub-phase; the rest of the
  /// payload (timers, trades, skins) is ignored.
  pub fn signature(&self) -> SessionSignature {
    SessionSignature {
      timer_phase: self.timer.phase.clone(),
      my_team: self.my_team.iter().map(TeamMember::display_name).collect(),
      their_team: self.their_team.iter().map(TeamMember::display_name).collect(),
      actions: self
        .all_actions()
        .map(|a| (a.id, a.actor_cell_id, a.champion_id, a.completed, a.is_in_progress))
        .collect(),
    }
  }
}

fn build_roster(members: &[TeamMember], local_cell_id: Option<i64>) -> TeamRoster {
  let players: Vec<PlayerSlot> = members
    .iter()
    .enumerate()
    .map(|(index, m)| PlayerSlot {
      index,
      display_name: m.display_name(),
      is_bot: m.is_bot(),
      summoner_id: (m.summoner_id > 0).then_some(m.summoner_id),
      puuid: (!m.puuid.is_empty()).then(|| m.puuid.clone()),
      champion_id: (m.champion_id > 0).then_some(m.champion_id),
      champion_name: None,
      position: (!m.assigned_position.is_empty()).then(|| m.assigned_position.clone()),
      spells: [m.spell1_id, m.spell2_id],
      tier: None,
    })
    .collect();

  let local_player_slot =
    local_cell_id.and_then(|cell| members.iter().position(|m| m.cell_id == cell));

  TeamRoster {
    players,
    local_player_slot,
  }
}
