//! Per-tenant job managers with explicit acquire/release.
//!
//! Each tenant (or session) key owns its own [`ParseJobManager`], so job ids
//! never leak between tenants. The manager lives as long as at least one
//! holder has acquired it and not released it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};

use super::manager::ParseJobManager;
use crate::config::JobsConfig;
use crate::db::Database;
use crate::error::SellsyncError;
use crate::extract::ItemExtractor;

type ManagerFactory = dyn Fn(&str) -> Result<ParseJobManager, SellsyncError> + Send + Sync;

struct Entry {
    manager: ParseJobManager,
    holders: usize,
}

pub struct JobManagerRegistry {
    factory: Box<ManagerFactory>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl JobManagerRegistry {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<ParseJobManager, SellsyncError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Registry building managers from `config`. With the SQLite backend all
    /// tenants share one database, namespaced by tenant key.
    pub fn from_config(
        config: &JobsConfig,
        extractor: Arc<dyn ItemExtractor>,
        db: Option<Database>,
    ) -> Self {
        let config = config.clone();
        Self::new(move |key| {
            ParseJobManager::from_config(&config, Arc::clone(&extractor), key, db.clone())
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Returns the manager for `key`, creating it on first use.
    pub fn acquire(&self, key: &str) -> Result<ParseJobManager, SellsyncError> {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.holders += 1;
            return Ok(entry.manager.clone());
        }

        let manager = (self.factory)(key)?;
        entries.insert(
            key.to_string(),
            Entry {
                manager: manager.clone(),
                holders: 1,
            },
        );
        info!("Created parse job manager for '{}'", key);
        Ok(manager)
    }

    /// Drops one hold on `key`. The last release shuts the manager down and
    /// removes it. Returns whether the manager was removed.
    pub fn release(&self, key: &str) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            debug!("Release of unknown job manager key '{}'", key);
            return false;
        };

        entry.holders = entry.holders.saturating_sub(1);
        if entry.holders > 0 {
            return false;
        }

        if let Some(entry) = entries.remove(key) {
            entry.manager.shutdown();
        }
        info!("Released parse job manager for '{}'", key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FallbackExtractor;

    fn registry() -> JobManagerRegistry {
        JobManagerRegistry::from_config(
            &JobsConfig::default(),
            Arc::new(FallbackExtractor::heuristic_only()),
            None,
        )
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let registry = registry();
        let a = registry.acquire("shop-a").unwrap();
        let b = registry.acquire("shop-b").unwrap();

        let job = a.create_job_from_text("Mug $5").await.unwrap();
        assert!(a.get_job(&job.job_id).await.unwrap().is_some());
        assert!(b.get_job(&job.job_id).await.unwrap().is_none());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_acquire_shares_and_release_counts() {
        let registry = registry();
        let first = registry.acquire("shop").unwrap();
        let second = registry.acquire("shop").unwrap();

        let job = first.create_job_from_text("Hat").await.unwrap();
        assert!(second.get_job(&job.job_id).await.unwrap().is_some());

        assert!(!registry.release("shop"));
        assert!(registry.contains("shop"));
        assert!(registry.release("shop"));
        assert!(!registry.contains("shop"));
        assert!(first.is_shut_down());
        assert!(!registry.release("shop"));
    }

    #[test]
    fn test_factory_error_is_returned() {
        let registry = JobManagerRegistry::new(|_| {
            Err(SellsyncError::Job(crate::error::JobError::Backend("down".into())))
        });
        assert!(registry.acquire("shop").is_err());
        assert!(registry.is_empty());
    }
}
