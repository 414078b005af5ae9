//! Pump.fun Sentinel Library
//!
//! Watches newly migrated pump.fun tokens, runs security heuristics on
//! each, records the ones that pass and alerts on the best of them.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod monitor;
pub mod notifier;
pub mod pipeline;
pub mod scorer;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
