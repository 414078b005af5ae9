//! Persistence for evaluated tokens
//!
//! Writes are insert-if-absent keyed on the mint address: the first record
//! for an address wins and later writes are silently ignored. The pipeline
//! always attempts the write and leaves dedup to the store.

pub mod json;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SecurityAssessment, StoreStats, TokenCandidate};

pub use json::JsonStore;

/// What happened to an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// A record for the address already existed; nothing was written
    Duplicate,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn upsert_token(&self, token: &TokenCandidate) -> Result<UpsertOutcome>;

    async fn upsert_assessment(&self, assessment: &SecurityAssessment) -> Result<UpsertOutcome>;
}

/// Read side used by status front ends (CLI today, chat commands later)
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn stats(&self) -> Result<StoreStats>;
}
