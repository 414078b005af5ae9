//! HTTP polling client for the migration feed
//!
//! Accepts either a bare JSON array of tokens or an object wrapping the
//! array under `tokens`/`data`. Field names follow the usual camelCase
//! launchpad conventions with a few aliases for common variants.

use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use async_trait::async_trait;

use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::feed::CandidateFeed;
use crate::types::TokenCandidate;

/// Timestamps above this are treated as milliseconds
const MILLIS_CUTOFF: i64 = 100_000_000_000;

/// Feed client that polls an HTTP endpoint and filters already-seen mints
pub struct HttpFeed {
    client: Client,
    config: FeedConfig,
    /// mint -> first time we returned it
    seen: DashMap<String, DateTime<Utc>>,
}

impl HttpFeed {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("pumpfun-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            seen: DashMap::new(),
        })
    }

    /// Number of addresses currently remembered
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Single fetch attempt
    async fn fetch_once(&self) -> Result<Vec<FeedToken>> {
        debug!("Polling migration feed {}", self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| Error::Feed(format!("Feed request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::FeedUnavailable(response.status().as_u16()));
        }

        let body: FeedResponse = response
            .json()
            .await
            .map_err(|e| Error::Deserialization(format!("Failed to parse feed response: {}", e)))?;

        Ok(body.into_tokens())
    }

    /// Drop entries older than the retention window, then keep unseen tokens
    fn filter_unseen(&self, tokens: Vec<FeedToken>) -> Vec<TokenCandidate> {
        let now = Utc::now();
        let retention = ChronoDuration::seconds(self.config.seen_retention_secs as i64);
        self.seen.retain(|_, first_seen| now - *first_seen < retention);

        let mut fresh = Vec::with_capacity(tokens.len());
        for token in tokens {
            let candidate = token.into_candidate();

            // Without an address there is nothing to dedup on; validation rejects it
            if !candidate.address.is_empty() {
                if self.seen.contains_key(&candidate.address) {
                    continue;
                }
                self.seen.insert(candidate.address.clone(), now);
            }

            fresh.push(candidate);
        }
        fresh
    }
}

#[async_trait]
impl CandidateFeed for HttpFeed {
    async fn fetch_new_candidates(&self) -> Result<Vec<TokenCandidate>> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_millis(1000),
            max_elapsed_time: Some(Duration::from_millis(self.config.retry_max_elapsed_ms)),
            ..Default::default()
        };

        let tokens = retry(backoff, || async {
            match self.fetch_once().await {
                Ok(tokens) => Ok(tokens),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable feed error: {}", e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await?;

        let total = tokens.len();
        let fresh = self.filter_unseen(tokens);
        debug!(total, fresh = fresh.len(), "Feed poll complete");
        Ok(fresh)
    }
}

// ============ Feed Response Types ============

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedResponse {
    List(Vec<FeedToken>),
    Wrapped {
        #[serde(alias = "data", alias = "coins")]
        tokens: Vec<FeedToken>,
    },
}

impl FeedResponse {
    fn into_tokens(self) -> Vec<FeedToken> {
        match self {
            FeedResponse::List(tokens) => tokens,
            FeedResponse::Wrapped { tokens } => tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedToken {
    #[serde(alias = "address", alias = "tokenAddress")]
    mint: Option<String>,
    name: Option<String>,
    symbol: Option<String>,
    #[serde(alias = "creatorAddress")]
    creator: Option<String>,
    /// Unix seconds or milliseconds
    #[serde(alias = "migrationTimestamp", alias = "timestamp")]
    migrated_at: Option<i64>,
    #[serde(alias = "liquiditySol", alias = "liquidity")]
    initial_liquidity_sol: Option<f64>,
    #[serde(alias = "creatorFee")]
    creator_fee_pct: Option<f64>,
    #[serde(alias = "holders")]
    holder_count: Option<u32>,
}

impl FeedToken {
    fn into_candidate(self) -> TokenCandidate {
        let migrated_at = self
            .migrated_at
            .and_then(|ts| {
                if ts > MILLIS_CUTOFF {
                    DateTime::from_timestamp_millis(ts)
                } else {
                    DateTime::from_timestamp(ts, 0)
                }
            })
            .unwrap_or_else(Utc::now);

        TokenCandidate {
            address: self.mint.unwrap_or_default().trim().to_string(),
            name: self.name.unwrap_or_default(),
            symbol: self.symbol.unwrap_or_default(),
            creator: self.creator.unwrap_or_default(),
            migrated_at,
            initial_liquidity_sol: self.initial_liquidity_sol.unwrap_or(0.0),
            creator_fee_pct: self.creator_fee_pct.unwrap_or(0.0),
            holder_count: self.holder_count.unwrap_or(0),
        }
    }
}
