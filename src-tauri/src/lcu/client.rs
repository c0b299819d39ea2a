// HTTP client for the League client (LCU) REST API and the live client API

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::backend::{riot_id, CurrentSummoner, LcuBackend, LivePlayer, MatchRecord, SummonerMatchData};
use crate::error::{Result, ScoutError};
use crate::gameflow::{GamePhase, SessionSnapshot};

const LOCKFILE_NAMES: [&str; 3] = ["lockfile", "LeagueClientUx.lockfile", "LeagueClient.lockfile"];
const LIVE_CLIENT_BASE: &str = "https://127.0.0.1:2999/";

/// Shared by every client; the LCU serves a self-signed certificate.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
  reqwest::Client::builder()
    .danger_accept_invalid_certs(true)
    .timeout(Duration::from_secs(5))
    .connect_timeout(Duration::from_secs(2))
    .pool_max_idle_per_host(2)
    .build()
    .unwrap_or_else(|_| reqwest::Client::new())
});

/// Port and password read from the client's lockfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcuConnection {
  pub port: String,
  pub token: String,
  pub lockfile: PathBuf,
}

impl LcuConnection {
  /// `name:pid:port:password:protocol`
  pub fn parse(content: &str, lockfile: PathBuf) -> Option<Self> {
    let parts: Vec<&str> = content.trim().split(':').collect();
    if parts.len() < 5 || parts[2].is_empty() || parts[3].is_empty() {
      return None;
    }
    Some(Self {
      port: parts[2].to_string(),
      token: parts[3].to_string(),
      lockfile,
    })
  }

  pub fn auth_header(&self) -> String {
    format!(
      "Basic {}",
      general_purpose::STANDARD.encode(format!("riot:{}", self.token))
    )
  }

  pub fn is_alive(&self) -> bool {
    self.lockfile.exists()
  }
}

/// Looks for a usable lockfile in the League install directory.
pub fn read_lockfile(league_path: &Path) -> Result<LcuConnection> {
  for name in LOCKFILE_NAMES {
    let path = league_path.join(name);
    if let Ok(content) = std::fs::read_to_string(&path) {
      if let Some(connection) = LcuConnection::parse(&content, path) {
        return Ok(connection);
      }
    }
  }
  Err(ScoutError::LockfileNotFound(league_path.display().to_string()))
}

/// Spell display names (or Data Dragon keys) to LCU spell ids.
pub fn spell_name_to_id(name: &str) -> Option<u32> {
  match name.to_lowercase().replace(' ', "").as_str() {
    "flash" | "summonerflash" => Some(4),
    "ignite" | "summonerdot" => Some(14),
    "teleport" | "summonerteleport" | "unleashedteleport" => Some(12),
    "barrier" | "summonerbarrier" => Some(21),
    "exhaust" | "summonerexhaust" => Some(3),
    "ghost" | "summonerhaste" => Some(6),
    "heal" | "summonerheal" => Some(7),
    "cleanse" | "summonerboost" => Some(1),
    "smite" | "summonersmite" | "unleashedsmite" | "primalsmite" => Some(11),
    "clarity" | "summonermana" => Some(13),
    "mark" | "snowball" | "summonersnowball" => Some(32),
    _ => None,
  }
}

pub struct LcuClient {
  connection: LcuConnection,
  base: Url,
  live_base: Url,
  auth: String,
  http: reqwest::Client,
}

impl LcuClient {
  pub fn new(connection: LcuConnection) -> Result<Self> {
    let base = Url::parse(&format!("https://127.0.0.1:{}/", connection.port))
      .map_err(|e| ScoutError::Config(format!("invalid LCU port {}: {}", connection.port, e)))?;
    let live_base = Url::parse(LIVE_CLIENT_BASE)
      .map_err(|e| ScoutError::Config(format!("invalid live client url: {}", e)))?;
    Ok(Self {
      auth: connection.auth_header(),
      connection,
      base,
      live_base,
      http: HTTP_CLIENT.clone(),
    })
  }

  pub fn connection(&self) -> &LcuConnection {
    &self.connection
  }

  fn url(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| ScoutError::Backend(format!("bad endpoint {}: {}", path, e)))
  }

  async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<&serde_json::Value>,
  ) -> Result<reqwest::Response> {
    let mut builder = self
      .http
      .request(method, self.url(path)?)
      .header(reqwest::header::AUTHORIZATION, &self.auth);
    if let Some(body) = body {
      builder = builder.json(body);
    }
    Ok(builder.send().await?)
  }

  fn check(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
      Ok(response)
    } else {
      Err(ScoutError::Status {
        endpoint: path.to_string(),
        status: status.as_u16(),
      })
    }
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let response = Self::check(path, self.request(Method::GET, path, None).await?)?;
    Ok(response.json::<T>().await?)
  }

  /// Like `get_json`, but a 404 means "nothing there".
  async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
    let response = self.request(Method::GET, path, None).await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    let response = Self::check(path, response)?;
    Ok(Some(response.json::<T>().await?))
  }

  async fn send(&self, method: Method, path: &str, body: Option<&serde_json::Value>) -> Result<()> {
    Self::check(path, self.request(method, path, body).await?)?;
    Ok(())
  }

  async fn match_history(&self, puuid: &str, match_count: u32) -> Result<Vec<MatchRecord>> {
    let path = format!(
      "/lol-match-history/v1/products/lol/{}/matches?begIndex=0&endIndex={}",
      utf8_percent_encode(puuid, NON_ALPHANUMERIC),
      match_count
    );
    let history: MatchHistoryPayload = self.get_json(&path).await?;
    Ok(
      history
        .games
        .games
        .into_iter()
        .filter_map(MatchPayload::into_record)
        .collect(),
    )
  }

  /// Best effort; a missing rank never fails the lookup.
  async fn solo_tier(&self, puuid: &str) -> Option<String> {
    let path = format!(
      "/lol-ranked/v1/ranked-stats/{}",
      utf8_percent_encode(puuid, NON_ALPHANUMERIC)
    );
    match self.get_json::<RankedPayload>(&path).await {
      Ok(ranked) => ranked
        .queue_map
        .solo
        .map(|q| q.tier)
        .filter(|tier| !tier.is_empty() && tier != "NONE"),
      Err(err) => {
        tracing::debug!(target: "lcu::client", error = %err, "ranked stats unavailable");
        None
      }
    }
  }

  async fn resolve_one(&self, summoner: SummonerPayload, match_count: u32) -> Result<SummonerMatchData> {
    let (matches, tier) = futures_util::future::join(
      self.match_history(&summoner.puuid, match_count),
      self.solo_tier(&summoner.puuid),
    )
    .await;
    Ok(SummonerMatchData {
      display_name: riot_id(&summoner.game_name, &summoner.tag_line, &summoner.display_name),
      summoner_id: summoner.summoner_id,
      puuid: summoner.puuid,
      tier,
      matches: matches?,
    })
  }
}

#[async_trait]
impl LcuBackend for LcuClient {
  async fn current_summoner(&self) -> Result<CurrentSummoner> {
    self.get_json("/lol-summoner/v1/current-summoner").await
  }

  async fn gameflow_phase(&self) -> Result<GamePhase> {
    let raw: String = self.get_json("/lol-gameflow/v1/gameflow-phase").await?;
    Ok(GamePhase::parse(&raw))
  }

  async fn champ_select_session(&self) -> Result<Option<SessionSnapshot>> {
    self.get_optional("/lol-champ-select/v1/session").await
  }

  async fn lookup_summoners(&self, names: &[String], match_count: u32) -> Result<Vec<SummonerMatchData>> {
    if names.is_empty() {
      return Ok(Vec::new());
    }
    let path = "/lol-summoner/v2/summoners/names";
    let body = serde_json::json!(names);
    let response = Self::check(path, self.request(Method::POST, path, Some(&body)).await?)?;
    let summoners: Vec<SummonerPayload> = response.json().await?;
    tracing::debug!(
      target: "lcu::client",
      requested = names.len(),
      found = summoners.len(),
      "summoner lookup"
    );

    let resolved = futures_util::future::join_all(
      summoners
        .into_iter()
        .filter(|s| !s.puuid.is_empty())
        .map(|s| async move {
          let name = riot_id(&s.game_name, &s.tag_line, &s.display_name);
          (name, self.resolve_one(s, match_count).await)
        }),
    )
    .await;
    Ok(keep_resolved(resolved))
  }

  async fn champ_select_action(&self, action_id: i64, champion_id: u32, completed: bool) -> Result<()> {
    let path = format!("/lol-champ-select/v1/session/actions/{}", action_id);
    let body = serde_json::json!({ "championId": champion_id, "completed": completed });
    self.send(Method::PATCH, &path, Some(&body)).await.map_err(|err| match err {
      ScoutError::Status { status, endpoint } => {
        ScoutError::Action(format!("{} rejected with HTTP {}", endpoint, status))
      }
      other => other,
    })
  }

  async fn accept_match(&self) -> Result<()> {
    self
      .send(Method::POST, "/lol-matchmaking/v1/ready-check/accept", None)
      .await
  }

  async fn decline_match(&self) -> Result<()> {
    self
      .send(Method::POST, "/lol-matchmaking/v1/ready-check/decline", None)
      .await
  }

  async fn live_players(&self) -> Result<Vec<LivePlayer>> {
    let path = "liveclientdata/playerlist";
    let url = self
      .live_base
      .join(path)
      .map_err(|e| ScoutError::Backend(format!("bad endpoint {}: {}", path, e)))?;
    let response = Self::check(path, self.http.get(url).send().await?)?;
    let players: Vec<LivePlayerPayload> = response.json().await?;
    Ok(players.into_iter().map(LivePlayerPayload::into_player).collect())
  }
}

/// A player whose history cannot be read is left out, so they end up as an
/// unresolved slot instead of failing everyone else in the batch.
fn keep_resolved(results: Vec<(String, Result<SummonerMatchData>)>) -> Vec<SummonerMatchData> {
  results
    .into_iter()
    .filter_map(|(name, result)| match result {
      Ok(data) => Some(data),
      Err(err) => {
        tracing::warn!(target: "lcu::client", player = %name, error = %err, "match history unavailable");
        None
      }
    })
    .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SummonerPayload {
  summoner_id: u64,
  puuid: String,
  game_name: String,
  tag_line: String,
  display_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MatchHistoryPayload {
  games: MatchList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MatchList {
  games: Vec<MatchPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MatchPayload {
  game_id: u64,
  game_creation: i64,
  queue_id: i32,
  participants: Vec<ParticipantPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ParticipantPayload {
  champion_id: u32,
  stats: ParticipantStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParticipantStats {
  win: bool,
  kills: u32,
  deaths: u32,
  assists: u32,
}

impl MatchPayload {
  /// Match history for one player only carries that player as participant.
  fn into_record(self) -> Option<MatchRecord> {
    let participant = self.participants.into_iter().next()?;
    Some(MatchRecord {
      game_id: self.game_id,
      champion_id: participant.champion_id,
      win: participant.stats.win,
      kills: participant.stats.kills,
      deaths: participant.stats.deaths,
      assists: participant.stats.assists,
      queue_id: self.queue_id,
      game_creation: self.game_creation,
    })
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RankedPayload {
  queue_map: QueueMap,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueueMap {
  #[serde(rename = "RANKED_SOLO_5x5")]
  solo: Option<QueueStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueueStats {
  tier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LivePlayerPayload {
  riot_id_game_name: String,
  riot_id_tag_line: String,
  summoner_name: String,
  champion_name: String,
  is_bot: bool,
  team: String,
  position: String,
  summoner_spells: LiveSpells,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LiveSpells {
  summoner_spell_one: LiveSpell,
  summoner_spell_two: LiveSpell,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LiveSpell {
  display_name: String,
}

impl LivePlayerPayload {
  fn into_player(self) -> LivePlayer {
    let spell = |s: &LiveSpell| spell_name_to_id(&s.display_name).unwrap_or(0);
    LivePlayer {
      display_name: riot_id(&self.riot_id_game_name, &self.riot_id_tag_line, &self.summoner_name),
      spells: [
        spell(&self.summoner_spells.summoner_spell_one),
        spell(&self.summoner_spells.summoner_spell_two),
      ],
      champion_name: self.champion_name,
      is_bot: self.is_bot,
      team: self.team,
      position: self.position,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gameflow::{reconcile, PlayerQuery};
  use serde_json::json;

  fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gameflow-scout-lcu-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn test_parse_lockfile_content() {
    let conn = LcuConnection::parse("LeagueClient:1234:54321:s3cret:https", PathBuf::from("lockfile"))
      .unwrap();
    assert_eq!(conn.port, "54321");
    assert_eq!(conn.token, "s3cret");
    // base64("riot:s3cret")
    assert_eq!(conn.auth_header(), "Basic cmlvdDpzM2NyZXQ=");
    assert!(LcuConnection::parse("LeagueClient:1234:54321", PathBuf::new()).is_none());
  }

  #[test]
  fn test_read_lockfile_tries_known_names() {
    let dir = temp_dir();
    assert!(matches!(
      read_lockfile(&dir),
      Err(ScoutError::LockfileNotFound(_))
    ));

    std::fs::write(dir.join("LeagueClientUx.lockfile"), "LeagueClientUx:1:2999:tok:https").unwrap();
    let conn = read_lockfile(&dir).unwrap();
    assert_eq!(conn.port, "2999");
    assert!(conn.is_alive());
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn test_match_history_payload() {
    let payload: MatchHistoryPayload = serde_json::from_value(json!({
      "games": { "games": [
        { "gameId": 7, "gameCreation": 1700000000000i64, "queueId": 420,
          "participants": [{ "championId": 103,
            "stats": { "win": true, "kills": 8, "deaths": 2, "assists": 11 } }] },
        { "gameId": 8, "participants": [] }
      ] }
    }))
    .unwrap();
    let records: Vec<MatchRecord> = payload
      .games
      .games
      .into_iter()
      .filter_map(MatchPayload::into_record)
      .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].champion_id, 103);
    assert!(records[0].win);
    assert_eq!(records[0].assists, 11);
  }

  #[test]
  fn test_live_player_payload() {
    let payload: LivePlayerPayload = serde_json::from_value(json!({
      "riotIdGameName": "Faker", "riotIdTagLine": "KR1", "summonerName": "Hide on bush",
      "championName": "Ahri", "isBot": false, "team": "CHAOS", "position": "MIDDLE",
      "summonerSpells": {
        "summonerSpellOne": { "displayName": "Flash" },
        "summonerSpellTwo": { "displayName": "Ignite" }
      }
    }))
    .unwrap();
    let player = payload.into_player();
    assert_eq!(player.display_name, "Faker#KR1");
    assert_eq!(player.spells, [4, 14]);
    assert_eq!(player.team, "CHAOS");
  }

  #[test]
  fn test_failed_history_only_drops_that_player() {
    let found = SummonerMatchData {
      display_name: "A#EUW".into(),
      puuid: "p-a".into(),
      ..Default::default()
    };
    let results = vec![
      ("A#EUW".to_string(), Ok(found.clone())),
      (
        "B#EUW".to_string(),
        Err(ScoutError::Status {
          endpoint: "/lol-match-history/v1/products/lol/p-b/matches".into(),
          status: 404,
        }),
      ),
    ];
    let kept = keep_resolved(results);
    assert_eq!(kept, vec![found]);

    let queries = vec![
      PlayerQuery {
        summoner_name: "A#EUW".into(),
        is_bot: false,
        index: 0,
      },
      PlayerQuery {
        summoner_name: "B#EUW".into(),
        is_bot: false,
        index: 1,
      },
    ];
    let side = reconcile(&queries, 2, &kept, 10);
    assert!(side.stats[0].is_some());
    assert!(side.stats[1].is_none());
    assert_eq!(side.unresolved, vec![(1, "B#EUW".to_string())]);
  }

  #[test]
  fn test_spell_names() {
    assert_eq!(spell_name_to_id("Flash"), Some(4));
    assert_eq!(spell_name_to_id("SummonerSmite"), Some(11));
    assert_eq!(spell_name_to_id("Unknown"), None);
  }
}
