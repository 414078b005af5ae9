//! Evaluation pipeline
//!
//! Turns one [`TokenCandidate`] into an outcome through an ordered chain
//! where each stage can short-circuit the rest:
//!
//! 1. basic validation (local, no network)
//! 2. security analysis (holders, liquidity lock, safety score)
//! 3. security gate
//! 4. persistence (insert-if-absent, dedup left to the store)
//! 5. alert decision (stricter predicate, delivery failures swallowed)

pub mod gate;
pub mod lock;
pub mod security;
pub mod validation;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::ChainInspector;
use crate::config::Config;
use crate::error::Result;
use crate::notifier::{format_alert, Notifier};
use crate::scorer::SafetyScorer;
use crate::store::{TokenStore, UpsertOutcome};
use crate::types::{SecurityAssessment, TokenCandidate};

pub use gate::{GateFailure, SecurityGate};
pub use lock::LiquidityLockChecker;
pub use security::{HolderDistribution, SecurityAnalyzer};
pub use validation::{CandidateValidator, RejectReason, Validation};

/// What the pipeline did with a candidate
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    /// Failed basic validation; nothing was called or written
    Rejected(RejectReason),
    /// Analysed but failed the security gate; nothing was written
    GatedOut {
        assessment: SecurityAssessment,
        failures: Vec<GateFailure>,
    },
    /// Passed the gate and was handed to the store
    Persisted {
        assessment: SecurityAssessment,
        token: UpsertOutcome,
        alerted: bool,
    },
}

impl EvaluationOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, EvaluationOutcome::Persisted { .. })
    }

    pub fn alerted(&self) -> bool {
        matches!(self, EvaluationOutcome::Persisted { alerted: true, .. })
    }
}

/// Side-effect free view of a token, used by the `check` command
#[derive(Debug, Clone)]
pub struct Inspection {
    pub validation: Validation,
    /// Present only when validation passed
    pub assessment: Option<SecurityAssessment>,
    pub gate_failures: Vec<GateFailure>,
    pub alert_worthy: bool,
}

pub struct EvaluationPipeline {
    validator: CandidateValidator,
    analyzer: SecurityAnalyzer,
    gate: SecurityGate,
    store: Arc<dyn TokenStore>,
    notifier: Arc<dyn Notifier>,
}

impl EvaluationPipeline {
    pub fn new(
        config: &Config,
        chain: Arc<dyn ChainInspector>,
        scorer: Arc<dyn SafetyScorer>,
        store: Arc<dyn TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let validator = CandidateValidator::new(config.validation.clone())?;
        let lock_checker = LiquidityLockChecker::new(chain.clone(), &config.liquidity_lock);
        let analyzer = SecurityAnalyzer::new(chain, scorer, lock_checker, config.security.clone());
        let gate = SecurityGate::new(config.security.clone(), config.alert.clone());

        Ok(Self {
            validator,
            analyzer,
            gate,
            store,
            notifier,
        })
    }

    /// Run one candidate through every stage.
    ///
    /// Collaborator failures during analysis degrade to conservative
    /// values. Store failures propagate; notification failures do not.
    pub async fn evaluate(&self, candidate: &TokenCandidate) -> Result<EvaluationOutcome> {
        if let Validation::Rejected(reason) = self.validator.validate(candidate) {
            debug!(mint = %candidate.address, "Rejected: {}", reason);
            return Ok(EvaluationOutcome::Rejected(reason));
        }

        let assessment = self.analyzer.analyze(&candidate.address).await;

        let failures = self.gate.failures(&assessment);
        if !failures.is_empty() {
            let reasons: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
            info!(
                "{} ({}) failed security gate: {}",
                candidate.symbol,
                candidate.address,
                reasons.join(", ")
            );
            return Ok(EvaluationOutcome::GatedOut {
                assessment,
                failures,
            });
        }

        let token = self.store.upsert_token(candidate).await?;
        let stored = self.store.upsert_assessment(&assessment).await?;
        if token == UpsertOutcome::Duplicate || stored == UpsertOutcome::Duplicate {
            debug!(mint = %candidate.address, "Already stored, keeping first record");
        }

        info!(
            "{} ({}) passed security gate: score {}, top holder {:.1}%",
            candidate.symbol, candidate.address, assessment.safety_score, assessment.top_holder_pct
        );

        let alerted = if self.gate.is_alert_worthy(&assessment) {
            self.send_alert(candidate, &assessment).await
        } else {
            false
        };

        Ok(EvaluationOutcome::Persisted {
            assessment,
            token,
            alerted,
        })
    }

    async fn send_alert(&self, candidate: &TokenCandidate, assessment: &SecurityAssessment) -> bool {
        let message = format_alert(candidate, assessment);
        match self.notifier.send_alert(&message).await {
            Ok(()) => {
                info!("Alert sent for {} ({})", candidate.symbol, candidate.address);
                true
            }
            Err(e) => {
                warn!(mint = %candidate.address, "Alert delivery failed: {}", e);
                false
            }
        }
    }

    /// Validate, analyse and gate a candidate without writing or notifying
    pub async fn inspect(&self, candidate: &TokenCandidate) -> Inspection {
        let validation = self.validator.validate(candidate);
        if validation.is_rejected() {
            return Inspection {
                validation,
                assessment: None,
                gate_failures: Vec::new(),
                alert_worthy: false,
            };
        }

        let assessment = self.analyzer.analyze(&candidate.address).await;
        Inspection {
            validation,
            gate_failures: self.gate.failures(&assessment),
            alert_worthy: self.gate.is_alert_worthy(&assessment),
            assessment: Some(assessment),
        }
    }
}
