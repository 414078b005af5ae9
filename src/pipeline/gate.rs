//! Persistence gate and alert predicate

use crate::config::{AlertConfig, SecurityConfig};
use crate::types::SecurityAssessment;

/// Why an assessment failed the security gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateFailure {
    ScoreBelowMinimum { score: u8, minimum: u8 },
    TopHolderAboveMaximum { pct: f64, maximum: f64 },
    Bundled,
    LiquidityUnlocked,
}

impl std::fmt::Display for GateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateFailure::ScoreBelowMinimum { score, minimum } => {
                write!(f, "safety score {} below {}", score, minimum)
            }
            GateFailure::TopHolderAboveMaximum { pct, maximum } => {
                write!(f, "top holder {:.1}% above {:.1}%", pct, maximum)
            }
            GateFailure::Bundled => write!(f, "bundled"),
            GateFailure::LiquidityUnlocked => write!(f, "liquidity unlocked"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecurityGate {
    security: SecurityConfig,
    alert: AlertConfig,
}

impl SecurityGate {
    pub fn new(security: SecurityConfig, alert: AlertConfig) -> Self {
        Self { security, alert }
    }

    /// Every gate rule the assessment breaks, in rule order
    pub fn failures(&self, assessment: &SecurityAssessment) -> Vec<GateFailure> {
        let mut failures = Vec::new();

        if assessment.safety_score < self.security.min_safety_score {
            failures.push(GateFailure::ScoreBelowMinimum {
                score: assessment.safety_score,
                minimum: self.security.min_safety_score,
            });
        }
        // NaN never passes
        if !(assessment.top_holder_pct <= self.security.max_top_holder_pct) {
            failures.push(GateFailure::TopHolderAboveMaximum {
                pct: assessment.top_holder_pct,
                maximum: self.security.max_top_holder_pct,
            });
        }
        if assessment.bundled {
            failures.push(GateFailure::Bundled);
        }
        if !assessment.liquidity_locked {
            failures.push(GateFailure::LiquidityUnlocked);
        }

        failures
    }

    pub fn passes(&self, assessment: &SecurityAssessment) -> bool {
        self.failures(assessment).is_empty()
    }

    /// Stricter predicate for notifications. Anything that satisfies it
    /// also passes the gate, whatever the configured thresholds.
    pub fn is_alert_worthy(&self, assessment: &SecurityAssessment) -> bool {
        self.passes(assessment)
            && assessment.safety_score >= self.alert.min_safety_score
            && assessment.top_holder_pct <= self.alert.max_top_holder_pct
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new(SecurityConfig::default(), AlertConfig::default())
    }
}
