//! Recording fakes for the external collaborators

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::chain::ChainInspector;
use crate::error::{Error, Result};
use crate::feed::CandidateFeed;
use crate::notifier::Notifier;
use crate::scorer::SafetyScorer;
use crate::store::{TokenStore, UpsertOutcome};
use crate::types::{HolderBalance, ProgramAccount, SecurityAssessment, TokenCandidate};

pub const LOCKER_PROGRAM: &str = "LocpQgucEQHbqNABEYvBvwoxCPsSbG91A1QaQhQQqjn";
pub const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";

/// Candidate that passes default validation
pub fn candidate(address: &str) -> TokenCandidate {
    TokenCandidate {
        address: address.into(),
        name: format!("Token {}", address),
        symbol: "TKN".into(),
        creator: "Creator1111".into(),
        migrated_at: Utc::now(),
        initial_liquidity_sol: 10.0,
        creator_fee_pct: 2.0,
        holder_count: 50,
    }
}

/// Holder list with `count` accounts where the largest holds `top_pct` percent
pub fn holders(count: usize, top_pct: f64) -> Vec<HolderBalance> {
    let total = 1_000_000u64;
    let top = (total as f64 * top_pct / 100.0) as u64;
    let rest = total - top;
    let mut out = vec![HolderBalance::new("Holder0", top)];
    let others = count.saturating_sub(1).max(1) as u64;
    for i in 1..count {
        out.push(HolderBalance::new(format!("Holder{}", i), rest / others));
    }
    out
}

// ============ HTTP ============

/// Serve `responses` (status, JSON body) in order on a local port, repeating
/// the last one. Returns the base URL and a counter of requests served.
pub async fn serve_http(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let served = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let n = served.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses[n.min(responses.len() - 1)];

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(len) => request.extend_from_slice(&buf[..len]),
                }
            }

            let response = format!(
                "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (url, hits)
}

// ============ Feed ============

pub struct MockFeed {
    batches: Mutex<VecDeque<std::result::Result<Vec<TokenCandidate>, String>>>,
    pub calls: AtomicUsize,
    pub call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl MockFeed {
    pub fn new(batches: Vec<std::result::Result<Vec<TokenCandidate>, String>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CandidateFeed for MockFeed {
    async fn fetch_new_candidates(&self) -> Result<Vec<TokenCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(tokio::time::Instant::now());
        match self.batches.lock().unwrap().pop_front() {
            Some(Ok(batch)) => Ok(batch),
            Some(Err(e)) => Err(Error::Feed(e)),
            None => Ok(Vec::new()),
        }
    }
}

// ============ Chain ============

pub struct MockChain {
    pub holders: std::result::Result<Vec<HolderBalance>, String>,
    pub accounts: std::result::Result<Vec<ProgramAccount>, String>,
    /// account -> owning program; missing entries resolve to `None`
    pub owners: HashMap<String, String>,
    /// Fail every owner lookup with this message
    pub owner_lookup_error: Option<String>,
    /// Accounts requested by each owner lookup, in call order
    pub owner_batches: Mutex<Vec<Vec<String>>>,
    pub delay: Option<Duration>,
    pub holder_calls: AtomicUsize,
    pub account_calls: AtomicUsize,
    pub owner_calls: AtomicUsize,
}

impl MockChain {
    /// Healthy token: 50 holders, top 10%, liquidity held by a known locker
    pub fn healthy() -> Self {
        let mut owners = HashMap::new();
        owners.insert("LockAuthority".to_string(), LOCKER_PROGRAM.to_string());
        Self {
            holders: Ok(holders(50, 10.0)),
            accounts: Ok(vec![ProgramAccount {
                pubkey: "PoolVault".into(),
                token_owner: Some("LockAuthority".into()),
            }]),
            owners,
            owner_lookup_error: None,
            owner_batches: Mutex::new(Vec::new()),
            delay: None,
            holder_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            owner_calls: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.holder_calls.load(Ordering::SeqCst)
            + self.account_calls.load(Ordering::SeqCst)
            + self.owner_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainInspector for MockChain {
    async fn fetch_holder_distribution(&self, _mint: &str) -> Result<Vec<HolderBalance>> {
        self.holder_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.holders.clone().map_err(Error::Rpc)
    }

    async fn fetch_program_accounts(
        &self,
        _program_id: &str,
        _mint: &str,
        _data_size: u64,
    ) -> Result<Vec<ProgramAccount>> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        self.accounts.clone().map_err(Error::Rpc)
    }

    async fn fetch_account_owners(&self, accounts: &[String]) -> Result<Vec<Option<String>>> {
        self.owner_calls.fetch_add(1, Ordering::SeqCst);
        self.owner_batches.lock().unwrap().push(accounts.to_vec());
        if let Some(ref e) = self.owner_lookup_error {
            return Err(Error::Rpc(e.clone()));
        }
        Ok(accounts
            .iter()
            .map(|account| self.owners.get(account).cloned())
            .collect())
    }
}

// ============ Scorer ============

pub struct MockScorer {
    pub score: std::result::Result<u8, String>,
    /// Panic when asked about this mint
    pub panic_on: Option<String>,
    pub calls: AtomicUsize,
}

impl MockScorer {
    pub fn returning(score: u8) -> Self {
        Self {
            score: Ok(score),
            panic_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            score: Err("scorer unreachable".into()),
            panic_on: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SafetyScorer for MockScorer {
    async fn fetch_safety_score(&self, mint: &str) -> Result<u8> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(mint) {
            panic!("scorer blew up on {}", mint);
        }
        self.score.clone().map_err(Error::Scorer)
    }
}

// ============ Notifier ============

#[derive(Default)]
pub struct MockNotifier {
    pub fail: bool,
    pub messages: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
}

impl MockNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_alert(&self, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Notify("channel down".into()));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ============ Store ============

/// Store whose writes always fail
#[derive(Default)]
pub struct FailingStore {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl TokenStore for FailingStore {
    async fn upsert_token(&self, _token: &TokenCandidate) -> Result<UpsertOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Store("database unavailable".into()))
    }

    async fn upsert_assessment(&self, _assessment: &SecurityAssessment) -> Result<UpsertOutcome> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Store("database unavailable".into()))
    }
}
