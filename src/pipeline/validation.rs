//! Basic candidate validation
//!
//! Pure, local checks run before any external call so obviously
//! disqualified tokens never spend RPC or scorer budget.

use regex::Regex;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::error::{Error, Result};
use crate::types::TokenCandidate;

/// Reason why a candidate was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    MissingAddress,
    MissingSymbol,
    /// Name or symbol matches a blocked pattern
    BlockedName(String),
    LiquidityBelowMinimum { liquidity_sol: f64, minimum_sol: f64 },
    CreatorFeeAboveMaximum { fee_pct: f64, maximum_pct: f64 },
    TooFewHolders { holders: u32, minimum: u32 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingAddress => write!(f, "missing address"),
            RejectReason::MissingSymbol => write!(f, "missing symbol"),
            RejectReason::BlockedName(pattern) => {
                write!(f, "name matches blocked pattern: {}", pattern)
            }
            RejectReason::LiquidityBelowMinimum {
                liquidity_sol,
                minimum_sol,
            } => write!(
                f,
                "liquidity {} SOL below minimum {} SOL",
                liquidity_sol, minimum_sol
            ),
            RejectReason::CreatorFeeAboveMaximum {
                fee_pct,
                maximum_pct,
            } => write!(f, "creator fee {}% above maximum {}%", fee_pct, maximum_pct),
            RejectReason::TooFewHolders { holders, minimum } => {
                write!(f, "{} holders below minimum {}", holders, minimum)
            }
        }
    }
}

/// Validation result
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Pass,
    Rejected(RejectReason),
}

impl Validation {
    pub fn is_pass(&self) -> bool {
        matches!(self, Validation::Pass)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Validation::Rejected(_))
    }
}

pub struct CandidateValidator {
    config: ValidationConfig,
    blocked_patterns: Vec<Regex>,
}

impl CandidateValidator {
    pub fn new(config: ValidationConfig) -> Result<Self> {
        let blocked_patterns = config
            .blocked_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Config(format!("Invalid blocked pattern: {}", e)))?;

        Ok(Self {
            config,
            blocked_patterns,
        })
    }

    pub fn validate(&self, candidate: &TokenCandidate) -> Validation {
        if candidate.address.trim().is_empty() {
            return Validation::Rejected(RejectReason::MissingAddress);
        }
        if candidate.symbol.trim().is_empty() {
            return Validation::Rejected(RejectReason::MissingSymbol);
        }

        for pattern in &self.blocked_patterns {
            if pattern.is_match(&candidate.name) || pattern.is_match(&candidate.symbol) {
                debug!(
                    "Token {} ({}) blocked by pattern: {}",
                    candidate.name, candidate.symbol, pattern
                );
                return Validation::Rejected(RejectReason::BlockedName(pattern.to_string()));
            }
        }

        // Negated comparisons so NaN from a malformed feed row fails closed
        if !(candidate.initial_liquidity_sol >= self.config.min_liquidity_sol) {
            return Validation::Rejected(RejectReason::LiquidityBelowMinimum {
                liquidity_sol: candidate.initial_liquidity_sol,
                minimum_sol: self.config.min_liquidity_sol,
            });
        }

        if !(candidate.creator_fee_pct <= self.config.max_creator_fee_pct) {
            return Validation::Rejected(RejectReason::CreatorFeeAboveMaximum {
                fee_pct: candidate.creator_fee_pct,
                maximum_pct: self.config.max_creator_fee_pct,
            });
        }

        if candidate.holder_count < self.config.min_holder_count {
            return Validation::Rejected(RejectReason::TooFewHolders {
                holders: candidate.holder_count,
                minimum: self.config.min_holder_count,
            });
        }

        Validation::Pass
    }
}
