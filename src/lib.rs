//! Rolling-window analytics over a bounded, in-memory stream of agent
//! transactions: a capped record store with live fan-out, a synthetic or
//! chain-backed indexer, windowed aggregation, and structured plus
//! free-text querying. The HTTP boundary consuming these engines lives
//! elsewhere; everything here is snapshot-in, value-out.

pub mod analytics;
pub mod chain;
pub mod config;
pub mod core;
pub mod indexer;
pub mod query;
