// Gameflow orchestration: phase tracking, data pipelines and auto actions

pub mod auto_action;
pub mod cache;
pub mod cancel;
pub mod fetcher;
pub mod orchestrator;
pub mod phase;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod roster;
pub mod session;
pub mod stats;
pub mod types;

#[cfg(test)]
mod tests;

pub use auto_action::{AutoActionRecord, AutoActionScheduler};
pub use cache::{FetchCache, FetchCacheEntry, SharedFetchCache};
pub use cancel::CancellationScope;
pub use fetcher::{DataFetcher, TeamsOutcome};
pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use phase::{PhaseAction, PhaseDebouncer, PhaseStateMachine, PipelineStatus, Transition};
pub use reconcile::{reconcile, Reconciled};
pub use retry::RetryPolicy;
pub use roster::split_live_players;
pub use session::{ChampSelectAction, ChampSelectSubPhase, SessionSignature, SessionSnapshot, TeamMember};
pub use types::*;
