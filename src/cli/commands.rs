//! CLI command implementations

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::chain::{parse_pubkey, RpcChainInspector};
use crate::config::Config;
use crate::feed::{CandidateFeed, HttpFeed};
use crate::monitor::Monitor;
use crate::notifier::{LogNotifier, Notifier, TelegramNotifier};
use crate::pipeline::{EvaluationPipeline, Validation};
use crate::scorer::HttpSafetyScorer;
use crate::store::{JsonStore, StatsProvider};
use crate::types::TokenCandidate;

/// Pick the alert channel: Telegram when configured, the log otherwise
fn build_notifier(config: &Config, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        return Ok(Arc::new(LogNotifier));
    }
    if !config.telegram.is_usable() {
        warn!("Telegram not configured - alerts will only be logged");
        return Ok(Arc::new(LogNotifier));
    }
    Ok(Arc::new(TelegramNotifier::new(&config.telegram)?))
}

/// Start the monitoring loop and run until Ctrl+C
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - alerts are logged, not sent");
    }

    info!("Starting pump.fun sentinel...");
    info!(
        "Gate: score >= {}, top holder <= {}%; alert: score >= {}, top holder <= {}%",
        config.security.min_safety_score,
        config.security.max_top_holder_pct,
        config.alert.min_safety_score,
        config.alert.max_top_holder_pct
    );

    info!("Initializing RPC client...");
    let chain = Arc::new(RpcChainInspector::new(&config.rpc)?);
    match chain.health().await {
        Ok(slot) => info!("RPC reachable (slot {})", slot),
        Err(e) => warn!("RPC health check failed: {} (continuing, checks degrade)", e),
    }

    let scorer = Arc::new(HttpSafetyScorer::new(&config.scorer)?);
    let feed = Arc::new(HttpFeed::new(config.feed.clone())?);

    info!("Opening store...");
    let store = Arc::new(JsonStore::from_config_path(&config.store.path).await?);
    if config.store.path.is_empty() {
        warn!("No store path configured - records are kept in memory only");
    }

    let notifier = build_notifier(config, dry_run)?;
    let pipeline = Arc::new(EvaluationPipeline::new(
        config,
        chain,
        scorer,
        store.clone(),
        notifier,
    )?);
    let monitor = Monitor::new(feed, pipeline, config.monitor.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                // Keep the sender alive so the monitor keeps running
                std::future::pending::<()>().await;
            }
        }
    });

    monitor.run(shutdown_rx).await;

    let stats = store.stats().await?;
    info!(
        "Stopped with {} tokens and {} assessments stored",
        stats.tokens, stats.assessments
    );
    Ok(())
}

/// Evaluate a single mint without persisting or notifying
pub async fn check(
    config: &Config,
    address: &str,
    liquidity_sol: Option<f64>,
    creator_fee_pct: Option<f64>,
    holder_count: Option<u32>,
) -> Result<()> {
    parse_pubkey(address)?;

    // Unknown feed fields default to the validation minimums so the
    // on-chain checks still run
    let candidate = TokenCandidate {
        address: address.to_string(),
        name: address.to_string(),
        symbol: "?".to_string(),
        creator: String::new(),
        migrated_at: Utc::now(),
        initial_liquidity_sol: liquidity_sol.unwrap_or(config.validation.min_liquidity_sol),
        creator_fee_pct: creator_fee_pct.unwrap_or(0.0),
        holder_count: holder_count.unwrap_or(config.validation.min_holder_count),
    };

    let pipeline = EvaluationPipeline::new(
        config,
        Arc::new(RpcChainInspector::new(&config.rpc)?),
        Arc::new(HttpSafetyScorer::new(&config.scorer)?),
        Arc::new(JsonStore::in_memory()),
        Arc::new(LogNotifier),
    )?;

    let inspection = pipeline.inspect(&candidate).await;

    println!("\n=== SECURITY CHECK: {} ===\n", address);

    if let Validation::Rejected(reason) = &inspection.validation {
        println!("Validation: REJECTED ({})", reason);
        return Ok(());
    }
    println!("Validation: passed");

    if let Some(assessment) = &inspection.assessment {
        println!(
            "Safety score:     {}/100 ({})",
            assessment.safety_score, assessment.verdict
        );
        println!("Top holder:       {:.2}%", assessment.top_holder_pct);
        println!("Bundled:          {}", assessment.bundled);
        println!("Liquidity locked: {}", assessment.liquidity_locked);
    }

    println!();
    if inspection.gate_failures.is_empty() {
        println!("Security gate: PASSED");
    } else {
        println!("Security gate: FAILED");
        for failure in &inspection.gate_failures {
            println!("  - {}", failure);
        }
    }
    println!(
        "Alert: {}",
        if inspection.alert_worthy {
            "would be sent"
        } else {
            "no"
        }
    );

    Ok(())
}

/// Show what the store has recorded so far
pub async fn stats(config: &Config) -> Result<()> {
    if config.store.path.is_empty() {
        println!("No store path configured; nothing is persisted between runs.");
        return Ok(());
    }

    let store = JsonStore::open(&config.store.path).await?;
    let stats = store.stats().await?;

    println!("\n=== SENTINEL STATS ===\n");
    println!("Store: {}", config.store.path);
    println!("{}", stats);

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check that the external collaborators are reachable
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    print!("RPC Endpoint... ");
    match check_rpc(config).await {
        Ok((slot, latency)) => println!("OK (slot {}, {}ms)", slot, latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Token feed... ");
    match check_feed(config).await {
        Ok((count, latency)) => println!("OK ({} tokens, {}ms)", count, latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Telegram... ");
    if !config.telegram.enabled {
        println!("DISABLED");
    } else if config.telegram.is_usable() {
        println!("CONFIGURED");
    } else {
        println!("MISSING CREDENTIALS");
        all_healthy = false;
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

async fn check_rpc(config: &Config) -> Result<(u64, u64)> {
    let chain = RpcChainInspector::new(&config.rpc)?;
    let start = Instant::now();
    let slot = chain.health().await?;
    Ok((slot, start.elapsed().as_millis() as u64))
}

async fn check_feed(config: &Config) -> Result<(usize, u64)> {
    let feed = HttpFeed::new(config.feed.clone())?;
    let start = Instant::now();
    let tokens = feed.fetch_new_candidates().await?;
    Ok((tokens.len(), start.elapsed().as_millis() as u64))
}
