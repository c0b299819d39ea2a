// League client transport: REST backend, lockfile discovery, websocket events

pub mod backend;
pub mod client;
pub mod events;

pub use backend::{
  riot_id, CurrentSummoner, LcuBackend, LivePlayer, MatchRecord, SharedBackend, SummonerMatchData,
};
pub use client::{read_lockfile, spell_name_to_id, LcuClient, LcuConnection};
pub use events::{parse_lcu_ws_event, run_event_stream, to_client_event, LcuEvent};
