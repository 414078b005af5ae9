//! Contract safety scoring
//!
//! The scorer is consulted once per candidate that passes basic validation.
//! Failures are never fatal: the pipeline substitutes a score of 0.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;

pub use http::HttpSafetyScorer;

#[async_trait]
pub trait SafetyScorer: Send + Sync {
    /// Safety score in 0..=100, higher is safer
    async fn fetch_safety_score(&self, mint: &str) -> Result<u8>;
}
