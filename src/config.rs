//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

/// Streamflow timelock / vesting program
pub const STREAMFLOW_PROGRAM_ID: &str = "strmRqUCoQUgGUan5YhzUZa6KqdzwX5L6FpUxfmKg5m";
/// Jupiter Lock program
pub const JUPITER_LOCK_PROGRAM_ID: &str = "LocpQgucEQHbqNABEYvBvwoxCPsSbG91A1QaQhQQqjn";
/// Bonfida token vesting program
pub const BONFIDA_VESTING_PROGRAM_ID: &str = "CChTq6PthWU82YZkbveA3WDf7s97BWhBK4Vx9bmsT743";
/// Raydium LP locker
pub const RAYDIUM_LOCKER_PROGRAM_ID: &str = "LockrWmn6K5twhz3y9w1dQERbmgSaRkfnTeTKbpofwE";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub liquidity_lock: LiquidityLockConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
            commitment: default_commitment(),
        }
    }
}

/// Migration feed (HTTP polling)
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
    /// Upper bound on retrying transient fetch failures within one cycle
    #[serde(default = "default_retry_max_elapsed_ms")]
    pub retry_max_elapsed_ms: u64,
    /// How long an address stays in the seen set
    #[serde(default = "default_seen_retention_secs")]
    pub seen_retention_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            timeout_ms: default_http_timeout_ms(),
            retry_max_elapsed_ms: default_retry_max_elapsed_ms(),
            seen_retention_secs: default_seen_retention_secs(),
        }
    }
}

/// Contract safety scoring service
#[derive(Debug, Clone, Deserialize)]
pub struct ScorerConfig {
    #[serde(default = "default_scorer_url")]
    pub url: String,
    #[serde(default = "default_scorer_api_key")]
    pub api_key: String,
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            url: default_scorer_url(),
            api_key: default_scorer_api_key(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_bot_token")]
    pub bot_token: String,
    #[serde(default = "default_telegram_chat_id")]
    pub chat_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: default_telegram_bot_token(),
            chat_id: default_telegram_chat_id(),
            enabled: true,
        }
    }
}

impl TelegramConfig {
    /// Enabled and both credentials present
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file backing the store. Empty keeps records in memory only.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Stage 1: local checks before any network call
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_liquidity_sol")]
    pub min_liquidity_sol: f64,
    #[serde(default = "default_max_creator_fee_pct")]
    pub max_creator_fee_pct: f64,
    #[serde(default = "default_min_holder_count")]
    pub min_holder_count: u32,
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_liquidity_sol: default_min_liquidity_sol(),
            max_creator_fee_pct: default_max_creator_fee_pct(),
            min_holder_count: default_min_holder_count(),
            blocked_patterns: vec![],
        }
    }
}

/// Stage 3: gate in front of persistence
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_min_safety_score")]
    pub min_safety_score: u8,
    #[serde(default = "default_max_top_holder_pct")]
    pub max_top_holder_pct: f64,
    /// Fewer distinct holder accounts than this marks the token as bundled
    #[serde(default = "default_bundled_holder_threshold")]
    pub bundled_holder_threshold: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_safety_score: default_min_safety_score(),
            max_top_holder_pct: default_max_top_holder_pct(),
            bundled_holder_threshold: default_bundled_holder_threshold(),
        }
    }
}

/// Stage 5: stricter predicate for notifications
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_alert_min_safety_score")]
    pub min_safety_score: u8,
    #[serde(default = "default_alert_max_top_holder_pct")]
    pub max_top_holder_pct: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            min_safety_score: default_alert_min_safety_score(),
            max_top_holder_pct: default_alert_max_top_holder_pct(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiquidityLockConfig {
    /// Data size of an SPL token account
    #[serde(default = "default_token_account_size")]
    pub token_account_size: u64,
    /// Hand-maintained allow-list; unknown lockers read as unlocked
    #[serde(default = "default_timelock_programs")]
    pub timelock_programs: Vec<String>,
}

impl Default for LiquidityLockConfig {
    fn default() -> Self {
        Self {
            token_account_size: default_token_account_size(),
            timelock_programs: default_timelock_programs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Sleep after a cycle that hit any failure
    #[serde(default = "default_fast_retry_secs")]
    pub fast_retry_secs: u64,
    /// How long an in-flight cycle may run after shutdown is requested
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            fast_retry_secs: default_fast_retry_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_commitment() -> String {
    "confirmed".into()
}

fn default_feed_url() -> String {
    std::env::var("FEED_URL")
        .unwrap_or_else(|_| "https://frontend-api-v3.pump.fun/coins/migrated".into())
}

fn default_http_timeout_ms() -> u64 {
    10000
}

fn default_retry_max_elapsed_ms() -> u64 {
    3000
}

fn default_seen_retention_secs() -> u64 {
    86400
}

fn default_scorer_url() -> String {
    std::env::var("SCORER_URL").unwrap_or_else(|_| "https://api.rugcheck.xyz/v1".into())
}

fn default_scorer_api_key() -> String {
    std::env::var("SCORER_API_KEY").unwrap_or_default()
}

fn default_telegram_bot_token() -> String {
    std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default()
}

fn default_telegram_chat_id() -> String {
    std::env::var("TELEGRAM_CHAT_ID").unwrap_or_default()
}

fn default_store_path() -> String {
    "data/sentinel.json".into()
}

fn default_min_liquidity_sol() -> f64 {
    5.0
}

fn default_max_creator_fee_pct() -> f64 {
    5.0
}

fn default_min_holder_count() -> u32 {
    10
}

fn default_min_safety_score() -> u8 {
    70
}

fn default_max_top_holder_pct() -> f64 {
    20.0
}

fn default_bundled_holder_threshold() -> usize {
    10
}

fn default_alert_min_safety_score() -> u8 {
    80
}

fn default_alert_max_top_holder_pct() -> f64 {
    15.0
}

fn default_token_account_size() -> u64 {
    165
}

fn default_timelock_programs() -> Vec<String> {
    vec![
        STREAMFLOW_PROGRAM_ID.into(),
        JUPITER_LOCK_PROGRAM_ID.into(),
        BONFIDA_VESTING_PROGRAM_ID.into(),
        RAYDIUM_LOCKER_PROGRAM_ID.into(),
    ]
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_fast_retry_secs() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (SENTINEL_SECTION__KEY)
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("liquidity_lock.timelock_programs")
                    .with_list_parse_key("validation.blocked_patterns")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Endpoints
        for (name, endpoint) in [
            ("rpc.endpoint", &self.rpc.endpoint),
            ("feed.url", &self.feed.url),
            ("scorer.url", &self.scorer.url),
        ] {
            url::Url::parse(endpoint)
                .with_context(|| format!("Invalid {}: {}", name, endpoint))?;
        }

        // Loop timing
        if self.monitor.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.monitor.fast_retry_secs == 0 {
            anyhow::bail!("fast_retry_secs must be positive");
        }
        if self.monitor.fast_retry_secs > self.monitor.poll_interval_secs {
            anyhow::bail!(
                "fast_retry_secs ({}) cannot exceed poll_interval_secs ({})",
                self.monitor.fast_retry_secs,
                self.monitor.poll_interval_secs
            );
        }

        // Thresholds
        if self.validation.min_liquidity_sol < 0.0 {
            anyhow::bail!("min_liquidity_sol cannot be negative");
        }
        if !(0.0..=100.0).contains(&self.validation.max_creator_fee_pct) {
            anyhow::bail!("max_creator_fee_pct must be between 0 and 100");
        }
        if self.security.min_safety_score > 100 || self.alert.min_safety_score > 100 {
            anyhow::bail!("safety score thresholds cannot exceed 100");
        }
        if !(0.0..=100.0).contains(&self.security.max_top_holder_pct)
            || !(0.0..=100.0).contains(&self.alert.max_top_holder_pct)
        {
            anyhow::bail!("max_top_holder_pct must be between 0 and 100");
        }

        // Alerts must be a subset of what the gate lets through
        if self.alert.min_safety_score < self.security.min_safety_score {
            anyhow::bail!(
                "alert.min_safety_score ({}) must be >= security.min_safety_score ({})",
                self.alert.min_safety_score,
                self.security.min_safety_score
            );
        }
        if self.alert.max_top_holder_pct > self.security.max_top_holder_pct {
            anyhow::bail!(
                "alert.max_top_holder_pct ({}) must be <= security.max_top_holder_pct ({})",
                self.alert.max_top_holder_pct,
                self.security.max_top_holder_pct
            );
        }

        // Validate filter patterns (compile regex to check)
        for pattern in &self.validation.blocked_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid blocked_pattern regex: {}", pattern))?;
        }

        // Validate timelock program ids
        for program in &self.liquidity_lock.timelock_programs {
            Pubkey::from_str(program)
                .with_context(|| format!("Invalid timelock program id: {}", program))?;
        }
        if self.liquidity_lock.timelock_programs.is_empty() {
            tracing::warn!("No timelock programs configured - every token will read as unlocked");
        }

        if !self.telegram.is_usable() {
            tracing::warn!("Telegram credentials missing - alerts will only be logged");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
    commitment: {}
  Feed:
    url: {}
    seen_retention: {}s
  Scorer:
    url: {}
    api_key: {}
  Telegram:
    enabled: {}
    bot_token: {}
    chat_id: {}
  Store:
    path: {}
  Validation:
    min_liquidity: {} SOL
    max_creator_fee: {}%
    min_holders: {}
    blocked_patterns: {:?}
  Security gate:
    min_score: {}
    max_top_holder: {}%
    bundled_below: {} holders
  Alert:
    min_score: {}
    max_top_holder: {}%
  Liquidity lock:
    timelock_programs: {}
  Monitor:
    poll_interval: {}s
    fast_retry: {}s
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.rpc.commitment,
            mask_url(&self.feed.url),
            self.feed.seen_retention_secs,
            mask_url(&self.scorer.url),
            mask_secret(&self.scorer.api_key),
            self.telegram.enabled,
            mask_secret(&self.telegram.bot_token),
            if self.telegram.chat_id.is_empty() {
                "(not set)"
            } else {
                self.telegram.chat_id.as_str()
            },
            if self.store.path.is_empty() {
                "(memory)"
            } else {
                self.store.path.as_str()
            },
            self.validation.min_liquidity_sol,
            self.validation.max_creator_fee_pct,
            self.validation.min_holder_count,
            self.validation.blocked_patterns,
            self.security.min_safety_score,
            self.security.max_top_holder_pct,
            self.security.bundled_holder_threshold,
            self.alert.min_safety_score,
            self.alert.max_top_holder_pct,
            self.liquidity_lock.timelock_programs.len(),
            self.monitor.poll_interval_secs,
            self.monitor.fast_retry_secs,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

fn mask_secret(secret: &str) -> &'static str {
    if secret.is_empty() {
        "(not set)"
    } else {
        "***"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            feed: FeedConfig::default(),
            scorer: ScorerConfig::default(),
            telegram: TelegramConfig::default(),
            store: StoreConfig::default(),
            validation: ValidationConfig::default(),
            security: SecurityConfig::default(),
            alert: AlertConfig::default(),
            liquidity_lock: LiquidityLockConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}
