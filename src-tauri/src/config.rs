// Configuration loading - config/config.json under the app data directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ScoutError};
use crate::gameflow::RetryPolicy;

pub const DATA_DIR_ENV: &str = "GAMEFLOW_SCOUT_DATA_DIR";
pub const LEAGUE_PATH_ENV: &str = "GAMEFLOW_SCOUT_LEAGUE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutConfig {
  #[serde(default)]
  pub league_path: Option<String>,
  /// Games of history requested per player.
  #[serde(default = "default_match_count")]
  pub match_count: u32,
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,
  #[serde(default = "default_live_players_timeout_ms")]
  pub live_players_timeout_ms: u64,
  /// Recent games kept per player in the enriched stats.
  #[serde(default = "default_recent_games")]
  pub recent_games: usize,
  #[serde(default)]
  pub retry: RetryPolicy,
  #[serde(default)]
  pub auto_actions: AutoActionConfig,
  #[serde(default = "default_log_level")]
  pub log_level: String,
  #[serde(default)]
  pub log_to_file: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoActionConfig {
  #[serde(default)]
  pub auto_accept: bool,
  #[serde(default = "default_accept_delay_ms")]
  pub accept_delay_ms: u64,
  #[serde(default)]
  pub auto_ban: bool,
  /// Preference order; the first champion not already banned or picked wins.
  #[serde(default)]
  pub ban_champion_ids: Vec<u32>,
  #[serde(default = "default_action_delay_ms")]
  pub ban_delay_ms: u64,
  #[serde(default)]
  pub auto_pick: bool,
  #[serde(default)]
  pub pick_champion_ids: Vec<u32>,
  #[serde(default = "default_action_delay_ms")]
  pub pick_delay_ms: u64,
  /// Gap between hovering the pick and locking it in.
  #[serde(default = "default_lock_in_delay_ms")]
  pub lock_in_delay_ms: u64,
}

fn default_match_count() -> u32 {
  20
}

fn default_debounce_ms() -> u64 {
  100
}

fn default_cache_ttl_secs() -> u64 {
  5 * 60
}

fn default_live_players_timeout_ms() -> u64 {
  5000
}

fn default_recent_games() -> usize {
  10
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_accept_delay_ms() -> u64 {
  1000
}

fn default_action_delay_ms() -> u64 {
  500
}

fn default_lock_in_delay_ms() -> u64 {
  1000
}

impl Default for ScoutConfig {
  fn default() -> Self {
    Self {
      league_path: None,
      match_count: default_match_count(),
      debounce_ms: default_debounce_ms(),
      cache_ttl_secs: default_cache_ttl_secs(),
      live_players_timeout_ms: default_live_players_timeout_ms(),
      recent_games: default_recent_games(),
      retry: RetryPolicy::default(),
      auto_actions: AutoActionConfig::default(),
      log_level: default_log_level(),
      log_to_file: false,
    }
  }
}

impl Default for AutoActionConfig {
  fn default() -> Self {
    Self {
      auto_accept: false,
      accept_delay_ms: default_accept_delay_ms(),
      auto_ban: false,
      ban_champion_ids: Vec::new(),
      ban_delay_ms: default_action_delay_ms(),
      auto_pick: false,
      pick_champion_ids: Vec::new(),
      pick_delay_ms: default_action_delay_ms(),
      lock_in_delay_ms: default_lock_in_delay_ms(),
    }
  }
}

impl ScoutConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }

  pub fn cache_ttl(&self) -> Duration {
    Duration::from_secs(self.cache_ttl_secs)
  }

  pub fn live_players_timeout(&self) -> Duration {
    Duration::from_millis(self.live_players_timeout_ms)
  }

  pub fn validate(&self) -> Result<()> {
    if self.match_count == 0 || self.match_count > 100 {
      return Err(ScoutError::Config(format!(
        "match_count must be between 1 and 100, got {}",
        self.match_count
      )));
    }
    if !(self.retry.multiplier >= 1.0) {
      return Err(ScoutError::Config(format!(
        "retry.multiplier must be >= 1.0, got {}",
        self.retry.multiplier
      )));
    }
    if self.retry.base_delay_ms > self.retry.max_delay_ms {
      return Err(ScoutError::Config(
        "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
      ));
    }
    Ok(())
  }
}

/// App data directory: env override, then `%APPDATA%`, then the working dir.
pub fn data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
    return PathBuf::from(dir);
  }
  std::env::var("APPDATA")
    .map(|ap| PathBuf::from(ap).join("com.gameflow-scout.app"))
    .unwrap_or_else(|_| PathBuf::from(".").join("gameflow-scout-data"))
}

pub fn config_path(data_dir: &Path) -> PathBuf {
  data_dir.join("config").join("config.json")
}

/// Reads the config file. A missing file yields defaults; a malformed one is an error.
pub fn load_config(data_dir: &Path) -> Result<ScoutConfig> {
  let cfg_file = config_path(data_dir);
  let mut config = if cfg_file.exists() {
    let data = std::fs::read_to_string(&cfg_file)?;
    serde_json::from_str::<ScoutConfig>(&data).map_err(|e| {
      ScoutError::Config(format!("Failed to parse {}: {}", cfg_file.display(), e))
    })?
  } else {
    ScoutConfig::default()
  };

  if let Ok(path) = std::env::var(LEAGUE_PATH_ENV) {
    if !path.trim().is_empty() {
      config.league_path = Some(path);
    }
  }

  config.validate()?;
  Ok(config)
}

pub fn save_config(data_dir: &Path, config: &ScoutConfig) -> Result<()> {
  let cfg_file = config_path(data_dir);
  if let Some(parent) = cfg_file.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let json = serde_json::to_string_pretty(config)?;
  std::fs::write(&cfg_file, json)?;
  Ok(())
}
