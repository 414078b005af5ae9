//! Monitoring loop
//!
//! Polls the feed, evaluates each candidate in feed order and sleeps.
//! Nothing that happens inside a cycle stops the loop: a failed fetch, a
//! failed evaluation or a panicking collaborator only shortens the next
//! sleep to the fast-retry interval. Only the shutdown signal ends it.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::feed::CandidateFeed;
use crate::pipeline::{EvaluationOutcome, EvaluationPipeline};

/// Loop state machine: `Running` until a cycle hits a failure, then
/// `BackoffRecovering` until a clean cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Running,
    BackoffRecovering,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Running => write!(f, "running"),
            LoopState::BackoffRecovering => write!(f, "backoff-recovering"),
        }
    }
}

/// Per-cycle counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub rejected: usize,
    pub gated_out: usize,
    pub persisted: usize,
    pub alerted: usize,
    /// Candidates whose evaluation errored or panicked
    pub failed: usize,
    /// Candidates left unevaluated because a stop was requested
    pub skipped: usize,
    pub fetch_failed: bool,
}

impl CycleReport {
    pub fn had_failures(&self) -> bool {
        self.fetch_failed || self.failed > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopSnapshot {
    pub state: LoopState,
    pub cycles: u64,
    /// Candidate being evaluated right now, if any
    pub current_address: Option<String>,
    pub last_cycle: Option<CycleReport>,
}

/// Explicit loop state, shared with whoever wants to observe or stop the loop
#[derive(Debug, Default)]
pub struct LoopController {
    snapshot: RwLock<LoopSnapshot>,
    /// Counters of the cycle currently running
    progress: RwLock<CycleReport>,
    stop_requested: AtomicBool,
}

impl LoopController {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> LoopSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Ask the loop to stop after the candidate it is evaluating
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    async fn set_current(&self, address: Option<String>) {
        self.snapshot.write().await.current_address = address;
    }

    async fn set_progress(&self, report: &CycleReport) {
        *self.progress.write().await = report.clone();
    }

    /// Close out a cycle that was cut off mid-evaluation. The in-flight
    /// candidate counts as failed and everything after it as skipped.
    async fn abandon_cycle(&self) -> CycleReport {
        let mut report = std::mem::take(&mut *self.progress.write().await);
        let in_flight = self.snapshot.write().await.current_address.take();

        if in_flight.is_some() {
            report.failed += 1;
        }
        let finished = report.rejected + report.gated_out + report.persisted + report.failed;
        report.skipped = report.fetched.saturating_sub(finished);

        self.record_cycle(report.clone()).await;
        report
    }

    async fn record_cycle(&self, report: CycleReport) -> LoopState {
        let mut snapshot = self.snapshot.write().await;
        snapshot.cycles += 1;
        snapshot.state = if report.had_failures() {
            LoopState::BackoffRecovering
        } else {
            LoopState::Running
        };
        snapshot.last_cycle = Some(report);
        snapshot.state
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a fallible future, turning a panic into an error
async fn guarded<T, F>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Error::Internal(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

pub struct Monitor {
    feed: Arc<dyn CandidateFeed>,
    pipeline: Arc<EvaluationPipeline>,
    controller: Arc<LoopController>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(
        feed: Arc<dyn CandidateFeed>,
        pipeline: Arc<EvaluationPipeline>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            feed,
            pipeline,
            controller: Arc::new(LoopController::new()),
            config,
        }
    }

    pub fn controller(&self) -> Arc<LoopController> {
        self.controller.clone()
    }

    /// Fetch once and evaluate every candidate in feed order
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        self.controller.set_progress(&report).await;

        let candidates = match guarded(self.feed.fetch_new_candidates()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("Failed to fetch candidates: {}", e);
                report.fetch_failed = true;
                return report;
            }
        };
        report.fetched = candidates.len();
        self.controller.set_progress(&report).await;

        for (i, candidate) in candidates.iter().enumerate() {
            if self.controller.stop_requested() {
                report.skipped = candidates.len() - i;
                warn!("Stop requested, skipping {} remaining candidates", report.skipped);
                break;
            }

            self.controller
                .set_current(Some(candidate.address.clone()))
                .await;

            match guarded(self.pipeline.evaluate(candidate)).await {
                Ok(EvaluationOutcome::Rejected(_)) => report.rejected += 1,
                Ok(EvaluationOutcome::GatedOut { .. }) => report.gated_out += 1,
                Ok(EvaluationOutcome::Persisted { alerted, .. }) => {
                    report.persisted += 1;
                    if alerted {
                        report.alerted += 1;
                    }
                }
                Err(e) => {
                    error!(mint = %candidate.address, "Evaluation failed: {}", e);
                    report.failed += 1;
                }
            }
            self.controller.set_progress(&report).await;
        }

        self.controller.set_current(None).await;
        report
    }

    /// One full cycle plus bookkeeping; returns how long to sleep next
    pub async fn tick(&self) -> Duration {
        let report = self.run_cycle().await;
        self.finish_cycle(report).await
    }

    async fn finish_cycle(&self, report: CycleReport) -> Duration {
        if report.fetched > 0 || report.had_failures() {
            info!(
                "Cycle: {} fetched, {} rejected, {} gated out, {} persisted, {} alerted, {} failed",
                report.fetched,
                report.rejected,
                report.gated_out,
                report.persisted,
                report.alerted,
                report.failed
            );
        }

        match self.controller.record_cycle(report).await {
            LoopState::Running => Duration::from_secs(self.config.poll_interval_secs),
            LoopState::BackoffRecovering => {
                debug!("Cycle had failures, retrying in {}s", self.config.fast_retry_secs);
                Duration::from_secs(self.config.fast_retry_secs)
            }
        }
    }

    /// Run until `shutdown` fires (or its sender is dropped).
    ///
    /// A shutdown during a cycle lets the current evaluation finish within
    /// the grace period; anything still running after that is abandoned.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Monitor started (poll every {}s, fast retry {}s)",
            self.config.poll_interval_secs, self.config.fast_retry_secs
        );
        let grace = Duration::from_secs(self.config.shutdown_grace_secs);

        loop {
            let cycle = self.run_cycle();
            tokio::pin!(cycle);

            let report = tokio::select! {
                report = &mut cycle => report,
                _ = shutdown.recv() => {
                    self.controller.request_stop();
                    info!("Shutdown requested, waiting up to {}s for in-flight evaluation", grace.as_secs());
                    match tokio::time::timeout(grace, &mut cycle).await {
                        Ok(report) => {
                            self.controller.record_cycle(report).await;
                        }
                        Err(_) => {
                            let report = self.controller.abandon_cycle().await;
                            warn!(
                                "Grace period elapsed, abandoned in-flight evaluation ({} skipped)",
                                report.skipped
                            );
                        }
                    }
                    break;
                }
            };

            let delay = self.finish_cycle(report).await;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    self.controller.request_stop();
                    break;
                }
            }
        }

        info!("Monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::JsonStore;
    use crate::testing::{candidate, FailingStore, MockChain, MockFeed, MockNotifier, MockScorer};
    use crate::types::TokenCandidate;
    use tokio::time::Instant;

    type Batches = Vec<std::result::Result<Vec<TokenCandidate>, String>>;

    struct Harness {
        monitor: Arc<Monitor>,
        feed: Arc<MockFeed>,
        store: Arc<JsonStore>,
        notifier: Arc<MockNotifier>,
    }

    fn harness(batches: Batches, chain: MockChain, scorer: MockScorer) -> Harness {
        let feed = Arc::new(MockFeed::new(batches));
        let store = Arc::new(JsonStore::in_memory());
        let notifier = Arc::new(MockNotifier::default());
        let config = Config::default();
        let pipeline = EvaluationPipeline::new(
            &config,
            Arc::new(chain),
            Arc::new(scorer),
            store.clone(),
            notifier.clone(),
        )
        .unwrap();

        Harness {
            monitor: Arc::new(Monitor::new(
                feed.clone(),
                Arc::new(pipeline),
                config.monitor.clone(),
            )),
            feed,
            store,
            notifier,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_and_fast_retry_intervals() {
        let h = harness(
            vec![Err("feed down".into()), Ok(Vec::new()), Ok(Vec::new())],
            MockChain::healthy(),
            MockScorer::returning(85),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let start = Instant::now();

        let monitor = h.monitor.clone();
        let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(70)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let offsets: Vec<u64> = h
            .feed
            .call_times
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        // Failure -> 5s fast retry, clean cycle -> 60s poll
        assert_eq!(offsets, vec![0, 5, 65]);
        assert_eq!(h.feed.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_state_follows_cycle_outcome() {
        let h = harness(
            vec![Err("feed down".into()), Ok(vec![candidate("MintA")])],
            MockChain::healthy(),
            MockScorer::returning(85),
        );
        let controller = h.monitor.controller();

        assert_eq!(h.monitor.tick().await, Duration::from_secs(5));
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state, LoopState::BackoffRecovering);
        assert!(snapshot.last_cycle.unwrap().fetch_failed);

        assert_eq!(h.monitor.tick().await, Duration::from_secs(60));
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.state, LoopState::Running);
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.current_address, None);
        assert_eq!(snapshot.last_cycle.unwrap().alerted, 1);
    }

    #[tokio::test]
    async fn test_panicking_candidate_does_not_stop_the_cycle() {
        let mut scorer = MockScorer::returning(85);
        scorer.panic_on = Some("MintA".into());
        let h = harness(
            vec![Ok(vec![candidate("MintA"), candidate("MintB")])],
            MockChain::healthy(),
            scorer,
        );

        let report = h.monitor.run_cycle().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.persisted, 1);
        assert!(h.store.get_token("MintA").await.is_none());
        assert!(h.store.get_token("MintB").await.is_some());
        assert_eq!(
            h.monitor.finish_cycle(report).await,
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_store_failures_are_per_token() {
        let feed = Arc::new(MockFeed::new(vec![Ok(vec![
            candidate("MintA"),
            candidate("MintB"),
        ])]));
        let store = Arc::new(FailingStore::default());
        let pipeline = EvaluationPipeline::new(
            &Config::default(),
            Arc::new(MockChain::healthy()),
            Arc::new(MockScorer::returning(85)),
            store.clone(),
            Arc::new(MockNotifier::default()),
        )
        .unwrap();
        let monitor = Monitor::new(feed, Arc::new(pipeline), MonitorConfig::default());

        let report = monitor.run_cycle().await;

        assert_eq!(report.failed, 2);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_candidates_evaluated_in_feed_order() {
        let h = harness(
            vec![Ok(vec![
                candidate("MintC"),
                candidate("MintA"),
                candidate("MintB"),
            ])],
            MockChain::healthy(),
            MockScorer::returning(90),
        );

        h.monitor.run_cycle().await;

        let order: Vec<&str> = h
            .notifier
            .sent()
            .iter()
            .map(|m| {
                ["MintA", "MintB", "MintC"]
                    .into_iter()
                    .find(|a| m.contains(a))
                    .unwrap()
            })
            .collect();
        assert_eq!(order, vec!["MintC", "MintA", "MintB"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_evaluation_finish() {
        let mut chain = MockChain::healthy();
        chain.delay = Some(Duration::from_secs(3));
        let h = harness(
            vec![Ok(vec![candidate("MintA"), candidate("MintB")])],
            chain,
            MockScorer::returning(85),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let monitor = h.monitor.clone();
        let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // MintA was in flight and completes; MintB is never started
        assert!(h.store.get_token("MintA").await.is_some());
        assert!(h.store.get_token("MintB").await.is_none());

        let snapshot = h.monitor.controller().snapshot().await;
        assert_eq!(snapshot.last_cycle.unwrap().skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_after_grace_period() {
        let mut chain = MockChain::healthy();
        chain.delay = Some(Duration::from_secs(600));
        let mut low_liquidity = candidate("MintL");
        low_liquidity.initial_liquidity_sol = 1.0;
        let h = harness(
            vec![Ok(vec![low_liquidity, candidate("MintA"), candidate("MintB")])],
            chain,
            MockScorer::returning(85),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let start = Instant::now();

        let monitor = h.monitor.clone();
        let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        // 1s before the signal plus the 10s grace period
        assert_eq!(start.elapsed().as_secs(), 11);
        assert!(h.store.get_token("MintA").await.is_none());

        let snapshot = h.monitor.controller().snapshot().await;
        assert!(snapshot.current_address.is_none());
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.state, LoopState::BackoffRecovering);
        let report = snapshot.last_cycle.unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
