//! Core records passed between the feed, the pipeline and the store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores strictly above this are labelled [`Verdict::Safe`]
pub const SAFE_SCORE_THRESHOLD: u8 = 70;

/// A token freshly reported by the migration feed, not yet evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    /// Token mint address (unique key)
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    /// Creator wallet address
    #[serde(default)]
    pub creator: String,
    /// When the token migrated off the bonding curve
    pub migrated_at: DateTime<Utc>,
    /// Initial pool liquidity in SOL
    #[serde(default)]
    pub initial_liquidity_sol: f64,
    /// Creator fee in percent
    #[serde(default)]
    pub creator_fee_pct: f64,
    #[serde(default)]
    pub holder_count: u32,
}

/// Derived label for a safety score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Safe,
    Risky,
}

impl Verdict {
    pub fn from_score(score: u8) -> Self {
        if score > SAFE_SCORE_THRESHOLD {
            Verdict::Safe
        } else {
            Verdict::Risky
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Safe => write!(f, "Safe"),
            Verdict::Risky => write!(f, "Risky"),
        }
    }
}

/// Result of the security analysis for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    /// Mint address of the assessed token
    pub address: String,
    /// Safety score 0-100 (0 when the scorer was unreachable)
    pub safety_score: u8,
    pub verdict: Verdict,
    /// Largest sampled holder as a percentage of the sampled supply
    pub top_holder_pct: f64,
    /// Too few distinct holder accounts observed (or holders unavailable)
    pub bundled: bool,
    /// Liquidity held by a known timelock program
    pub liquidity_locked: bool,
    pub assessed_at: DateTime<Utc>,
}

impl SecurityAssessment {
    pub fn new(
        address: &str,
        safety_score: u8,
        top_holder_pct: f64,
        bundled: bool,
        liquidity_locked: bool,
    ) -> Self {
        Self {
            address: address.to_string(),
            safety_score,
            verdict: Verdict::from_score(safety_score),
            top_holder_pct,
            bundled,
            liquidity_locked,
            assessed_at: Utc::now(),
        }
    }
}

/// One sampled holder account and its raw token balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderBalance {
    pub holder: String,
    pub balance: u64,
}

impl HolderBalance {
    pub fn new(holder: impl Into<String>, balance: u64) -> Self {
        Self {
            holder: holder.into(),
            balance,
        }
    }
}

/// A program account returned by a size/owner filtered query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAccount {
    /// Address of the account itself
    pub pubkey: String,
    /// Authority recorded in the token account data, when decodable
    pub token_owner: Option<String>,
}

/// Aggregate counters exposed to status consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub tokens: usize,
    pub assessments: usize,
    pub safe: usize,
    pub risky: usize,
    pub locked: usize,
    pub average_score: f64,
    pub last_assessed_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Tokens tracked:   {}", self.tokens)?;
        writeln!(f, "Assessments:      {}", self.assessments)?;
        writeln!(f, "  Safe:           {}", self.safe)?;
        writeln!(f, "  Risky:          {}", self.risky)?;
        writeln!(f, "  Liquidity lock: {}", self.locked)?;
        writeln!(f, "Average score:    {:.1}", self.average_score)?;
        match self.last_assessed_at {
            Some(ts) => write!(f, "Last assessment:  {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
            None => write!(f, "Last assessment:  never"),
        }
    }
}
