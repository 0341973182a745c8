//! Leaderboard services: stats aggregation and scoring, leaderboard
//! assembly, and cached reference data, on top of any
//! [`StatsStore`](leaderboard_core::store::StatsStore).

pub mod aggregation;
pub mod cache;
pub mod catalyst;
pub mod config;
pub mod context;
pub mod error;
pub mod leaderboard;
pub mod memory;
pub mod reference;

pub use aggregation::AggregationService;
pub use config::EngineConfig;
pub use context::CallContext;
pub use error::{EngineError, EngineResult};
pub use reference::ReferenceDataService;
