//! JSON-file backed token store
//!
//! Keeps everything in memory and rewrites the file after each insert.
//! With no path configured the store is memory-only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::{StatsProvider, TokenStore, UpsertOutcome};
use crate::types::{SecurityAssessment, StoreStats, TokenCandidate, Verdict};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    tokens: HashMap<String, TokenCandidate>,
    assessments: HashMap<String, SecurityAssessment>,
}

pub struct JsonStore {
    state: RwLock<StoreState>,
    persistence_path: Option<PathBuf>,
    /// Serialises file writes so the last writer always saves the latest state
    save_lock: Mutex<()>,
}

impl JsonStore {
    /// Memory-only store
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            persistence_path: None,
            save_lock: Mutex::new(()),
        }
    }

    /// Open a file-backed store, loading existing records if the file exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            state: RwLock::new(StoreState::default()),
            persistence_path: Some(path),
            save_lock: Mutex::new(()),
        };
        store.load().await?;
        Ok(store)
    }

    /// Open from a config path string; empty means memory-only
    pub async fn from_config_path(path: &str) -> Result<Self> {
        if path.is_empty() {
            Ok(Self::in_memory())
        } else {
            Self::open(path).await
        }
    }

    async fn load(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Store(format!("Failed to read {}: {}", path.display(), e)))?;

        let loaded: StoreState = serde_json::from_str(&data)
            .map_err(|e| Error::Store(format!("Corrupt store {}: {}", path.display(), e)))?;

        let mut guard = self.state.write().await;
        *guard = loaded;

        info!(
            "Loaded {} tokens and {} assessments from {}",
            guard.tokens.len(),
            guard.assessments.len(),
            path.display()
        );
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let _guard = self.save_lock.lock().await;

        let data = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)
                .map_err(|e| Error::Store(format!("Failed to serialize store: {}", e)))?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Store(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        // Write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Error::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| Error::Store(format!("Failed to replace {}: {}", path.display(), e)))?;

        debug!("Saved store to {}", path.display());
        Ok(())
    }

    pub async fn get_token(&self, address: &str) -> Option<TokenCandidate> {
        self.state.read().await.tokens.get(address).cloned()
    }

    pub async fn get_assessment(&self, address: &str) -> Option<SecurityAssessment> {
        self.state.read().await.assessments.get(address).cloned()
    }

    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }

    pub async fn assessment_count(&self) -> usize {
        self.state.read().await.assessments.len()
    }
}

#[async_trait]
impl TokenStore for JsonStore {
    async fn upsert_token(&self, token: &TokenCandidate) -> Result<UpsertOutcome> {
        {
            let mut state = self.state.write().await;
            if state.tokens.contains_key(&token.address) {
                return Ok(UpsertOutcome::Duplicate);
            }
            state.tokens.insert(token.address.clone(), token.clone());
        }

        self.save().await?;
        Ok(UpsertOutcome::Inserted)
    }

    async fn upsert_assessment(&self, assessment: &SecurityAssessment) -> Result<UpsertOutcome> {
        {
            let mut state = self.state.write().await;
            if state.assessments.contains_key(&assessment.address) {
                return Ok(UpsertOutcome::Duplicate);
            }
            state
                .assessments
                .insert(assessment.address.clone(), assessment.clone());
        }

        self.save().await?;
        Ok(UpsertOutcome::Inserted)
    }
}

#[async_trait]
impl StatsProvider for JsonStore {
    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read().await;
        let assessments = state.assessments.values();

        let mut stats = StoreStats {
            tokens: state.tokens.len(),
            assessments: state.assessments.len(),
            ..Default::default()
        };

        let mut score_sum = 0u64;
        for assessment in assessments {
            match assessment.verdict {
                Verdict::Safe => stats.safe += 1,
                Verdict::Risky => stats.risky += 1,
            }
            if assessment.liquidity_locked {
                stats.locked += 1;
            }
            score_sum += assessment.safety_score as u64;
            stats.last_assessed_at = stats.last_assessed_at.max(Some(assessment.assessed_at));
        }

        if stats.assessments > 0 {
            stats.average_score = score_sum as f64 / stats.assessments as f64;
        }

        Ok(stats)
    }
}
