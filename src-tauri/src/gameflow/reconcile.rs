// Index-preserving merge of name-keyed lookup results into roster slots

use std::collections::HashMap;

use super::types::{EnrichedStats, PlayerQuery};
use crate::lcu::SummonerMatchData;

/// Stats for one side, aligned with the roster it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
  /// Always `roster_len` long; `stats[i]` belongs to the player at slot `i`.
  pub stats: Vec<Option<EnrichedStats>>,
  /// Real players the backend had no record for, as `(index, name)`.
  pub unresolved: Vec<(usize, String)>,
}

impl Reconciled {
  pub fn empty(roster_len: usize) -> Self {
    Self {
      stats: vec![None; roster_len],
      unresolved: Vec::new(),
    }
  }

  pub fn resolved_count(&self) -> usize {
    self.stats.iter().filter(|s| s.is_some()).count()
  }
}

/// Places each result at the slot of the query that asked for it.
///
/// Names are matched exactly, as returned by the backend. Bots, blank names
/// and misses stay `None`; queries pointing past the roster are dropped.
pub fn reconcile(
  queries: &[PlayerQuery],
  roster_len: usize,
  results: &[SummonerMatchData],
  recent_limit: usize,
) -> Reconciled {
  let by_name: HashMap<&str, &SummonerMatchData> = results
    .iter()
    .map(|r| (r.display_name.as_str(), r))
    .collect();

  let mut out = Reconciled::empty(roster_len);
  for query in queries.iter().filter(|q| q.is_resolvable()) {
    if query.index >= roster_len {
      tracing::warn!(
        target: "gameflow::reconcile",
        index = query.index,
        roster_len,
        "query index outside roster, skipping"
      );
      continue;
    }

    match by_name.get(query.summoner_name.as_str()) {
      Some(data) => {
        out.stats[query.index] = Some(EnrichedStats::from_matches(
          &data.display_name,
          data.tier.clone(),
          &data.matches,
          recent_limit,
        ));
      }
      None => {
        tracing::warn!(
          target: "gameflow::reconcile",
          index = query.index,
          player = %query.summoner_name,
          "no backend record for player"
        );
        out
          .unresolved
          .push((query.index, query.summoner_name.clone()));
      }
    }
  }
  out
}
