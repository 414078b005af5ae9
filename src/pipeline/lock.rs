//! Liquidity-lock check
//!
//! A token's liquidity counts as locked when one of its token accounts is
//! controlled by a program on the timelock allow-list. The allow-list is
//! hand-maintained: a locker that is not listed reads as unlocked.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::ChainInspector;
use crate::config::LiquidityLockConfig;
use crate::error::Result;

/// Authorities resolved per owner lookup
const OWNER_LOOKUP_BATCH: usize = 100;

pub struct LiquidityLockChecker {
    chain: Arc<dyn ChainInspector>,
    allow_list: HashSet<String>,
    token_program: String,
    account_size: u64,
}

impl LiquidityLockChecker {
    pub fn new(chain: Arc<dyn ChainInspector>, config: &LiquidityLockConfig) -> Self {
        Self {
            chain,
            allow_list: config.timelock_programs.iter().cloned().collect(),
            token_program: spl_token::id().to_string(),
            account_size: config.token_account_size,
        }
    }

    pub fn is_timelock_program(&self, program_id: &str) -> bool {
        self.allow_list.contains(program_id)
    }

    /// True when any token account's authority is owned by a known
    /// timelock program. Authorities are deduplicated and resolved in
    /// batches; a batch whose lookup fails is skipped. Only the account
    /// listing itself can error.
    pub async fn is_locked(&self, mint: &str) -> Result<bool> {
        let accounts = self
            .chain
            .fetch_program_accounts(&self.token_program, mint, self.account_size)
            .await?;

        if accounts.is_empty() {
            debug!(mint = %mint, "No token accounts found for lock check");
            return Ok(false);
        }

        let mut seen = HashSet::new();
        let authorities: Vec<String> = accounts
            .iter()
            .filter_map(|account| account.token_owner.clone())
            .filter(|authority| seen.insert(authority.clone()))
            .collect();

        for batch in authorities.chunks(OWNER_LOOKUP_BATCH) {
            let owners = match self.chain.fetch_account_owners(batch).await {
                Ok(owners) => owners,
                Err(e) => {
                    warn!(mint = %mint, batch = batch.len(), "Owner lookup failed: {}", e);
                    continue;
                }
            };

            let locker = batch
                .iter()
                .zip(owners)
                .find_map(|(authority, owner)| {
                    owner
                        .filter(|program| self.is_timelock_program(program))
                        .map(|program| (authority, program))
                });

            if let Some((authority, program)) = locker {
                debug!(
                    mint = %mint,
                    authority = %authority,
                    program = %program,
                    "Liquidity locked"
                );
                return Ok(true);
            }
        }

        Ok(false)
    }
}
