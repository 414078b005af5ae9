//! Security analysis
//!
//! Fans out to the three independent sub-checks (holders, liquidity lock,
//! safety score) and joins them into a [`SecurityAssessment`]. Each
//! sub-check degrades to its most conservative value on failure, so the
//! analysis itself never fails.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::ChainInspector;
use crate::config::SecurityConfig;
use crate::pipeline::lock::LiquidityLockChecker;
use crate::scorer::SafetyScorer;
use crate::types::{HolderBalance, SecurityAssessment};

/// Holder concentration reported when nothing meaningful can be computed
pub const UNKNOWN_TOP_HOLDER_PCT: f64 = 100.0;

/// Outcome of the holder fetch, keeping "fetch failed" apart from
/// "fetched but few holders"
#[derive(Debug, Clone, PartialEq)]
pub enum HolderDistribution {
    Observed(Vec<HolderBalance>),
    Unavailable,
}

impl HolderDistribution {
    /// Balance per holder id, summing repeated entries for the same holder
    fn per_holder(holders: &[HolderBalance]) -> HashMap<&str, u128> {
        let mut totals = HashMap::new();
        for h in holders {
            *totals.entry(h.holder.as_str()).or_insert(0u128) += h.balance as u128;
        }
        totals
    }

    /// Largest per-holder balance as a percentage of the sampled total.
    /// An empty sample, a zero total or a failed fetch reads as 100%.
    pub fn top_holder_pct(&self) -> f64 {
        let HolderDistribution::Observed(holders) = self else {
            return UNKNOWN_TOP_HOLDER_PCT;
        };

        let totals = Self::per_holder(holders);
        let total: u128 = totals.values().sum();
        if total == 0 {
            return UNKNOWN_TOP_HOLDER_PCT;
        }

        let largest = totals.values().copied().max().unwrap_or(0);
        largest as f64 / total as f64 * 100.0
    }

    /// Distinct holders with a non-zero combined balance
    pub fn distinct_holders(&self) -> usize {
        match self {
            HolderDistribution::Observed(holders) => Self::per_holder(holders)
                .values()
                .filter(|balance| **balance > 0)
                .count(),
            HolderDistribution::Unavailable => 0,
        }
    }

    /// Too few holders observed, or no observation at all
    pub fn is_bundled(&self, threshold: usize) -> bool {
        match self {
            HolderDistribution::Observed(_) => self.distinct_holders() < threshold,
            HolderDistribution::Unavailable => true,
        }
    }
}

pub struct SecurityAnalyzer {
    chain: Arc<dyn ChainInspector>,
    scorer: Arc<dyn SafetyScorer>,
    lock_checker: LiquidityLockChecker,
    config: SecurityConfig,
}

impl SecurityAnalyzer {
    pub fn new(
        chain: Arc<dyn ChainInspector>,
        scorer: Arc<dyn SafetyScorer>,
        lock_checker: LiquidityLockChecker,
        config: SecurityConfig,
    ) -> Self {
        Self {
            chain,
            scorer,
            lock_checker,
            config,
        }
    }

    async fn holder_distribution(&self, mint: &str) -> HolderDistribution {
        match self.chain.fetch_holder_distribution(mint).await {
            Ok(holders) => HolderDistribution::Observed(holders),
            Err(e) => {
                warn!(mint = %mint, "Holder distribution unavailable: {}", e);
                HolderDistribution::Unavailable
            }
        }
    }

    async fn liquidity_locked(&self, mint: &str) -> bool {
        match self.lock_checker.is_locked(mint).await {
            Ok(locked) => locked,
            Err(e) => {
                warn!(mint = %mint, "Liquidity lock check failed, treating as unlocked: {}", e);
                false
            }
        }
    }

    async fn safety_score(&self, mint: &str) -> u8 {
        match self.scorer.fetch_safety_score(mint).await {
            Ok(score) => score.min(100),
            Err(e) => {
                warn!(mint = %mint, "Safety score unavailable, using 0: {}", e);
                0
            }
        }
    }

    /// Run all sub-checks concurrently and build the assessment
    pub async fn analyze(&self, mint: &str) -> SecurityAssessment {
        let (distribution, locked, score) = tokio::join!(
            self.holder_distribution(mint),
            self.liquidity_locked(mint),
            self.safety_score(mint),
        );

        let top_holder_pct = distribution.top_holder_pct();
        let bundled = distribution.is_bundled(self.config.bundled_holder_threshold);

        debug!(
            mint = %mint,
            score,
            top_holder_pct,
            bundled,
            locked,
            holders = distribution.distinct_holders(),
            "Security analysis complete"
        );

        SecurityAssessment::new(mint, score, top_holder_pct, bundled, locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LiquidityLockConfig;
    use crate::testing::{holders, MockChain, MockScorer};
    use crate::types::Verdict;

    fn analyzer(chain: MockChain, scorer: MockScorer) -> SecurityAnalyzer {
        let chain: Arc<dyn ChainInspector> = Arc::new(chain);
        let lock_checker =
            LiquidityLockChecker::new(chain.clone(), &LiquidityLockConfig::default());
        SecurityAnalyzer::new(
            chain,
            Arc::new(scorer),
            lock_checker,
            SecurityConfig::default(),
        )
    }

    #[test]
    fn test_top_holder_pct() {
        let dist = HolderDistribution::Observed(vec![
            HolderBalance::new("A", 300),
            HolderBalance::new("B", 600),
            HolderBalance::new("C", 100),
        ]);
        assert!((dist.top_holder_pct() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_holder_pct_degenerate_inputs() {
        assert_eq!(
            HolderDistribution::Observed(Vec::new()).top_holder_pct(),
            UNKNOWN_TOP_HOLDER_PCT
        );
        assert_eq!(
            HolderDistribution::Observed(vec![HolderBalance::new("A", 0)]).top_holder_pct(),
            UNKNOWN_TOP_HOLDER_PCT
        );
        assert_eq!(
            HolderDistribution::Unavailable.top_holder_pct(),
            UNKNOWN_TOP_HOLDER_PCT
        );
    }

    #[test]
    fn test_top_holder_pct_does_not_overflow() {
        let dist = HolderDistribution::Observed(vec![
            HolderBalance::new("A", u64::MAX),
            HolderBalance::new("B", u64::MAX),
        ]);
        assert!((dist.top_holder_pct() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_holder_entries_are_combined() {
        // A holds 250 across two entries, more than B's 200
        let dist = HolderDistribution::Observed(vec![
            HolderBalance::new("A", 150),
            HolderBalance::new("B", 200),
            HolderBalance::new("A", 100),
            HolderBalance::new("C", 50),
        ]);
        assert!((dist.top_holder_pct() - 50.0).abs() < 1e-9);
        assert_eq!(dist.distinct_holders(), 3);
    }

    #[test]
    fn test_bundled_threshold() {
        assert!(HolderDistribution::Observed(holders(9, 20.0)).is_bundled(10));
        assert!(!HolderDistribution::Observed(holders(10, 20.0)).is_bundled(10));

        // Duplicate and empty accounts do not count as distinct holders
        let mut padded = holders(9, 20.0);
        padded.push(HolderBalance::new("Holder1", 5));
        padded.push(HolderBalance::new("Empty", 0));
        assert_eq!(HolderDistribution::Observed(padded.clone()).distinct_holders(), 9);
        assert!(HolderDistribution::Observed(padded).is_bundled(10));
    }

    #[test]
    fn test_unavailable_is_bundled() {
        assert!(HolderDistribution::Unavailable.is_bundled(10));
        assert!(HolderDistribution::Unavailable.is_bundled(0));
    }

    #[tokio::test]
    async fn test_analyze_healthy_token() {
        let assessment = analyzer(MockChain::healthy(), MockScorer::returning(85))
            .analyze("MintA")
            .await;

        assert_eq!(assessment.address, "MintA");
        assert_eq!(assessment.safety_score, 85);
        assert_eq!(assessment.verdict, Verdict::Safe);
        assert!((assessment.top_holder_pct - 10.0).abs() < 0.01);
        assert!(!assessment.bundled);
        assert!(assessment.liquidity_locked);
    }

    #[tokio::test]
    async fn test_scorer_failure_scores_zero() {
        let assessment = analyzer(MockChain::healthy(), MockScorer::failing())
            .analyze("MintA")
            .await;

        assert_eq!(assessment.safety_score, 0);
        assert_eq!(assessment.verdict, Verdict::Risky);
        // Other sub-checks are unaffected
        assert!(assessment.liquidity_locked);
    }

    #[tokio::test]
    async fn test_holder_failure_is_conservative() {
        let mut chain = MockChain::healthy();
        chain.holders = Err("rpc down".into());

        let assessment = analyzer(chain, MockScorer::returning(90))
            .analyze("MintA")
            .await;

        assert!(assessment.bundled);
        assert_eq!(assessment.top_holder_pct, UNKNOWN_TOP_HOLDER_PCT);
        assert_eq!(assessment.safety_score, 90);
    }

    #[tokio::test]
    async fn test_lock_failure_reads_unlocked() {
        let mut chain = MockChain::healthy();
        chain.accounts = Err("rpc down".into());

        let assessment = analyzer(chain, MockScorer::returning(90))
            .analyze("MintA")
            .await;

        assert!(!assessment.liquidity_locked);
    }
}
