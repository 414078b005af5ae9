//! On-chain inspection
//!
//! Everything the security analysis needs from the chain goes through
//! [`ChainInspector`], so the pipeline can be exercised without an RPC node.

pub mod rpc;

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{HolderBalance, ProgramAccount};

pub use rpc::RpcChainInspector;

#[async_trait]
pub trait ChainInspector: Send + Sync {
    /// Sampled holder accounts of a mint with their raw balances
    async fn fetch_holder_distribution(&self, mint: &str) -> Result<Vec<HolderBalance>>;

    /// Accounts owned by `program_id` with exactly `data_size` bytes that
    /// reference `mint` (token accounts of that mint)
    async fn fetch_program_accounts(
        &self,
        program_id: &str,
        mint: &str,
        data_size: u64,
    ) -> Result<Vec<ProgramAccount>>;

    /// Owning program of each account, in input order. `None` for accounts
    /// that do not exist or are not valid addresses.
    async fn fetch_account_owners(&self, accounts: &[String]) -> Result<Vec<Option<String>>>;

    /// Program that owns a single account
    async fn fetch_account_owner(&self, account: &str) -> Result<String> {
        self.fetch_account_owners(&[account.to_string()])
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| Error::Rpc(format!("Account {} not found", account)))
    }
}

/// Parse a base58 address
pub fn parse_pubkey(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address).map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
}
