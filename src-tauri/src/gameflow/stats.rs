// Aggregation of raw match history into per-player stats

use chrono::{TimeZone, Utc};
use std::collections::HashMap;

use super::types::{ChampionUsage, EnrichedStats, RecentGame};
use crate::lcu::MatchRecord;

const FAVORITE_CHAMPIONS: usize = 3;

fn round1(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

fn percent(part: u32, total: u32) -> f64 {
  if total == 0 {
    0.0
  } else {
    round1(part as f64 * 100.0 / total as f64)
  }
}

impl EnrichedStats {
  /// Builds stats from `matches` (newest first). `recent_limit` bounds the
  /// recent game list, not the aggregation.
  pub fn from_matches(
    display_name: &str,
    tier: Option<String>,
    matches: &[MatchRecord],
    recent_limit: usize,
  ) -> Self {
    let total_games = matches.len() as u32;
    let wins = matches.iter().filter(|m| m.win).count() as u32;
    let kills: u32 = matches.iter().map(|m| m.kills).sum();
    let deaths: u32 = matches.iter().map(|m| m.deaths).sum();
    let assists: u32 = matches.iter().map(|m| m.assists).sum();

    let (avg_kills, avg_deaths, avg_assists) = if total_games == 0 {
      (0.0, 0.0, 0.0)
    } else {
      let n = total_games as f64;
      (
        round1(kills as f64 / n),
        round1(deaths as f64 / n),
        round1(assists as f64 / n),
      )
    };
    let avg_kda = if total_games == 0 {
      0.0
    } else {
      round1((kills + assists) as f64 / deaths.max(1) as f64)
    };

    Self {
      display_name: display_name.to_string(),
      tier,
      total_games,
      wins,
      losses: total_games - wins,
      win_rate: percent(wins, total_games),
      avg_kills,
      avg_deaths,
      avg_assists,
      avg_kda,
      favorite_champions: favorite_champions(matches),
      recent_games: matches
        .iter()
        .take(recent_limit)
        .map(|m| RecentGame {
          game_id: m.game_id,
          champion_id: m.champion_id,
          win: m.win,
          kills: m.kills,
          deaths: m.deaths,
          assists: m.assists,
          queue_id: m.queue_id,
          played_at: Utc.timestamp_millis_opt(m.game_creation).single(),
        })
        .collect(),
    }
  }
}

/// Most played champions; ties go to the one with more wins, then the lower id.
fn favorite_champions(matches: &[MatchRecord]) -> Vec<ChampionUsage> {
  let mut by_champion: HashMap<u32, (u32, u32)> = HashMap::new();
  for m in matches.iter().filter(|m| m.champion_id > 0) {
    let entry = by_champion.entry(m.champion_id).or_default();
    entry.0 += 1;
    if m.win {
      entry.1 += 1;
    }
  }

  let mut usage: Vec<ChampionUsage> = by_champion
    .into_iter()
    .map(|(champion_id, (games, wins))| ChampionUsage {
      champion_id,
      games,
      wins,
      win_rate: percent(wins, games),
    })
    .collect();
  usage.sort_by(|a, b| {
    b.games
      .cmp(&a.games)
      .then(b.wins.cmp(&a.wins))
      .then(a.champion_id.cmp(&b.champion_id))
  });
  usage.truncate(FAVORITE_CHAMPIONS);
  usage
}
