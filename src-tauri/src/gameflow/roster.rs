// Rosters for a game in progress, built from the live client player list

use super::types::{PlayerSlot, TeamRoster};
use crate::lcu::LivePlayer;

const DEFAULT_TEAM: &str = "ORDER";

fn slot(index: usize, player: &LivePlayer) -> PlayerSlot {
  PlayerSlot {
    index,
    display_name: player.display_name.clone(),
    is_bot: player.is_bot,
    champion_name: (!player.champion_name.is_empty()).then(|| player.champion_name.clone()),
    position: (!player.position.is_empty()).then(|| player.position.clone()),
    spells: player.spells,
    ..Default::default()
  }
}

/// Splits the live player list into `(my_team, enemy)`.
///
/// The local player's team is "mine"; when they cannot be found (spectating,
/// name not known yet) `ORDER` is assumed. Slot indices follow list order
/// within each team.
pub fn split_live_players(players: &[LivePlayer], local_name: Option<&str>) -> (TeamRoster, TeamRoster) {
  let local = local_name.and_then(|name| players.iter().find(|p| p.display_name == name));
  let my_team_tag = local
    .map(|p| p.team.as_str())
    .unwrap_or(DEFAULT_TEAM);

  let mut my_team = TeamRoster::default();
  let mut enemy = TeamRoster::default();
  for player in players {
    let roster = if player.team == my_team_tag {
      &mut my_team
    } else {
      &mut enemy
    };
    let index = roster.players.len();
    if local.is_some_and(|l| std::ptr::eq(l, player)) {
      roster.local_player_slot = Some(index);
    }
    roster.players.push(slot(index, player));
  }

  tracing::debug!(
    target: "gameflow::roster",
    my_team = my_team.len(),
    enemy = enemy.len(),
    local_found = local.is_some(),
    "split live players"
  );
  (my_team, enemy)
}
