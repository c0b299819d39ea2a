// Process-local TTL cache for batched summoner lookups

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::lcu::SummonerMatchData;

/// Entries live for five minutes unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct FetchCacheEntry {
  pub key: String,
  pub data: Vec<SummonerMatchData>,
  pub stored_at: Instant,
}

#[derive(Debug)]
pub struct FetchCache {
  ttl: Duration,
  entries: HashMap<String, FetchCacheEntry>,
}

impl Default for FetchCache {
  fn default() -> Self {
    Self::new(DEFAULT_TTL)
  }
}

impl FetchCache {
  pub fn new(ttl: Duration) -> Self {
    Self {
      ttl,
      entries: HashMap::new(),
    }
  }

  /// Order-insensitive key over the identifier set and the requested count.
  pub fn key(names: &[String], match_count: u32) -> String {
    let mut sorted = names.to_vec();
    sorted.sort();
    let combined = format!("{}|{}", sorted.join("\u{1f}"), match_count);
    format!("{:x}", md5::compute(combined))
  }

  pub fn get(&mut self, key: &str) -> Option<Vec<SummonerMatchData>> {
    let ttl = self.ttl;
    match self.entries.get(key) {
      Some(entry) if entry.stored_at.elapsed() < ttl => Some(entry.data.clone()),
      Some(_) => {
        self.entries.remove(key);
        None
      }
      None => None,
    }
  }

  pub fn insert(&mut self, key: String, data: Vec<SummonerMatchData>) {
    self.purge_expired();
    self.entries.insert(
      key.clone(),
      FetchCacheEntry {
        key,
        data,
        stored_at: Instant::now(),
      },
    );
  }

  pub fn purge_expired(&mut self) {
    let ttl = self.ttl;
    self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[derive(Debug, Clone, Default)]
pub struct SharedFetchCache(Arc<Mutex<FetchCache>>);

impl SharedFetchCache {
  pub fn new(ttl: Duration) -> Self {
    Self(Arc::new(Mutex::new(FetchCache::new(ttl))))
  }

  /// A poisoned lock still holds a usable cache.
  pub fn lock(&self) -> MutexGuard<'_, FetchCache> {
    self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}
