//! Solana JSON-RPC implementation of [`ChainInspector`]

use async_trait::async_trait;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::chain::{parse_pubkey, ChainInspector};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::types::{HolderBalance, ProgramAccount};

/// Offset of the mint inside an SPL token account
const TOKEN_ACCOUNT_MINT_OFFSET: usize = 0;
/// Offset of the owner (authority) inside an SPL token account
const TOKEN_ACCOUNT_OWNER_OFFSET: usize = 32;
/// `getMultipleAccounts` accepts at most this many keys per request
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

pub struct RpcChainInspector {
    client: RpcClient,
}

impl RpcChainInspector {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let commitment = CommitmentConfig::from_str(&config.commitment)
            .map_err(|e| Error::Config(format!("Invalid commitment {}: {}", config.commitment, e)))?;

        let client = RpcClient::new_with_timeout_and_commitment(
            config.endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
            commitment,
        );

        Ok(Self { client })
    }

    /// Cheap liveness probe used by the CLI
    pub async fn health(&self) -> Result<u64> {
        Ok(self.client.get_slot().await?)
    }
}

/// Read the authority recorded in raw token account data
fn decode_token_owner(data: &[u8]) -> Option<String> {
    let bytes = data.get(TOKEN_ACCOUNT_OWNER_OFFSET..TOKEN_ACCOUNT_OWNER_OFFSET + 32)?;
    Pubkey::try_from(bytes).ok().map(|pk| pk.to_string())
}

#[async_trait]
impl ChainInspector for RpcChainInspector {
    async fn fetch_holder_distribution(&self, mint: &str) -> Result<Vec<HolderBalance>> {
        let mint_pubkey = parse_pubkey(mint)?;

        debug!(mint = %mint, "Fetching largest token accounts");
        let accounts = self.client.get_token_largest_accounts(&mint_pubkey).await?;

        accounts
            .into_iter()
            .map(|account| {
                let balance = account.amount.amount.parse::<u64>().map_err(|e| {
                    Error::Deserialization(format!(
                        "Bad token amount {} for {}: {}",
                        account.amount.amount, account.address, e
                    ))
                })?;
                Ok(HolderBalance::new(account.address, balance))
            })
            .collect()
    }

    async fn fetch_program_accounts(
        &self,
        program_id: &str,
        mint: &str,
        data_size: u64,
    ) -> Result<Vec<ProgramAccount>> {
        let program = parse_pubkey(program_id)?;
        let mint_pubkey = parse_pubkey(mint)?;

        let config = RpcProgramAccountsConfig {
            filters: Some(vec![
                RpcFilterType::DataSize(data_size),
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                    TOKEN_ACCOUNT_MINT_OFFSET,
                    mint_pubkey.to_bytes().to_vec(),
                )),
            ]),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                ..Default::default()
            },
            ..Default::default()
        };

        debug!(mint = %mint, program = %program_id, data_size, "Fetching program accounts");
        let accounts = self
            .client
            .get_program_accounts_with_config(&program, config)
            .await?;

        Ok(accounts
            .into_iter()
            .map(|(pubkey, account)| ProgramAccount {
                pubkey: pubkey.to_string(),
                token_owner: decode_token_owner(&account.data),
            })
            .collect())
    }

    async fn fetch_account_owners(&self, accounts: &[String]) -> Result<Vec<Option<String>>> {
        let parsed: Vec<Option<Pubkey>> = accounts
            .iter()
            .map(|account| parse_pubkey(account).ok())
            .collect();
        let keys: Vec<Pubkey> = parsed.iter().flatten().copied().collect();

        debug!(requested = accounts.len(), valid = keys.len(), "Fetching account owners");
        let mut fetched = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_MULTIPLE_ACCOUNTS) {
            fetched.extend(self.client.get_multiple_accounts(chunk).await?);
        }

        let mut fetched = fetched.into_iter();
        Ok(parsed
            .into_iter()
            .map(|key| {
                key.and_then(|_| fetched.next().flatten())
                    .map(|account| account.owner.to_string())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token_owner() {
        let owner = Pubkey::new_unique();
        let mut data = vec![0u8; 165];
        data[TOKEN_ACCOUNT_OWNER_OFFSET..TOKEN_ACCOUNT_OWNER_OFFSET + 32]
            .copy_from_slice(&owner.to_bytes());

        assert_eq!(decode_token_owner(&data), Some(owner.to_string()));
    }

    #[test]
    fn test_decode_token_owner_short_data() {
        assert_eq!(decode_token_owner(&[0u8; 40]), None);
    }

    #[test]
    fn test_invalid_commitment_rejected() {
        let config = RpcConfig {
            commitment: "eventually".into(),
            ..RpcConfig::default()
        };
        assert!(RpcChainInspector::new(&config).is_err());
    }
}
