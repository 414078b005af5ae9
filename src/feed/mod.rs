//! Migration feed
//!
//! The monitor polls a [`CandidateFeed`] once per cycle. Implementations are
//! expected to return only tokens they have not handed out before, so a
//! restarted process simply resumes polling without a persisted cursor.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::TokenCandidate;

pub use http::HttpFeed;

/// Source of newly migrated tokens
#[async_trait]
pub trait CandidateFeed: Send + Sync {
    /// Tokens migrated since the previous call, in feed order
    async fn fetch_new_candidates(&self) -> Result<Vec<TokenCandidate>>;
}
