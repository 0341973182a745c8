//! Domain types and pure logic for the orchestrator leaderboard.
//!
//! Everything in this crate is free of I/O: query validation and the
//! query descriptor builder, the scoring formulas, the percentile helper,
//! and the persistence traits that backends implement.

pub mod error;
pub mod percentile;
pub mod query;
pub mod scoring;
pub mod stats;
pub mod store;
pub mod types;
