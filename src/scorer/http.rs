//! HTTP client for the external safety scoring service
//!
//! Expects `GET {url}/tokens/{mint}/report/summary` to return a JSON object.
//! RugCheck-style reports carry `score_normalised`, a 0-100 *risk* score,
//! which is inverted into safety. Services that already speak safety may send
//! `safetyScore` instead, which takes precedence. Any value outside 0-100 is
//! an error, never clamped.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ScorerConfig;
use crate::error::{Error, Result};
use crate::scorer::SafetyScorer;

pub struct HttpSafetyScorer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSafetyScorer {
    pub fn new(config: &ScorerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("pumpfun-sentinel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: (!config.api_key.is_empty()).then(|| config.api_key.clone()),
        })
    }

    fn report_url(&self, mint: &str) -> String {
        format!("{}/tokens/{}/report/summary", self.base_url, mint)
    }
}

#[async_trait]
impl SafetyScorer for HttpSafetyScorer {
    async fn fetch_safety_score(&self, mint: &str) -> Result<u8> {
        let url = self.report_url(mint);
        debug!(mint = %mint, "Fetching safety score");

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Scorer(format!("Scorer request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Scorer(format!("Scorer API error {}: {}", status, body)));
        }

        let report: ScoreReport = response
            .json()
            .await
            .map_err(|e| Error::Deserialization(format!("Failed to parse score report: {}", e)))?;

        let safety = report.safety()?;
        debug!(mint = %mint, safety, "Safety score fetched");
        Ok(safety)
    }
}

#[derive(Debug, Deserialize)]
struct ScoreReport {
    /// Risk, 0 (clean) to 100 (worst)
    score_normalised: Option<f64>,
    /// Safety, 0 (worst) to 100 (clean)
    #[serde(rename = "safetyScore")]
    safety_score: Option<f64>,
}

/// Round a 0-100 value, rejecting anything non-finite or out of range
fn percent(field: &str, raw: f64) -> Result<u8> {
    if !raw.is_finite() || !(0.0..=100.0).contains(&raw) {
        return Err(Error::Scorer(format!("{} out of range: {}", field, raw)));
    }
    Ok(raw.round() as u8)
}

impl ScoreReport {
    fn safety(&self) -> Result<u8> {
        if let Some(safety) = self.safety_score {
            return percent("safetyScore", safety);
        }
        match self.score_normalised {
            Some(risk) => Ok(100 - percent("score_normalised", risk)?),
            None => Err(Error::Scorer("Score report carried no score".into())),
        }
    }
}
