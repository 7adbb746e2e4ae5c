//! Connection pooling for storage providers.
//!
//! A run reads from one bucket and writes to another, opening several
//! providers on each (`song_data`, `log_data`, every output table). The pool
//! hands out one provider per location and one object store client per
//! bucket, so all prefixes of a bucket share the same HTTP connections.

use object_store::ObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::storage::{BackendConfig, StorageProvider, StorageProviderRef, build_store};

/// Reference-counted handle to a [`StoragePool`].
pub type StoragePoolRef = Arc<StoragePool>;

/// Pool of storage connections, shared across providers using the same bucket.
pub struct StoragePool {
    /// Options applied to every client the pool creates.
    options: HashMap<String, String>,
    /// Cached ObjectStore clients keyed by store identity.
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
    /// Cached StorageProviders keyed by canonical URL.
    providers: RwLock<HashMap<String, StorageProviderRef>>,
}

impl std::fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePool").finish_non_exhaustive()
    }
}

impl StoragePool {
    /// Create an empty pool whose clients are built with `options`.
    pub fn new(options: HashMap<String, String>) -> Self {
        Self {
            options,
            stores: RwLock::new(HashMap::new()),
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create a storage provider for the given URL.
    pub async fn get_or_create(&self, url: &str) -> Result<StorageProviderRef, StorageError> {
        let config = BackendConfig::parse_url(url)?;
        let provider_key = config.canonical_url();

        // Fast path: provider already exists
        {
            let providers = self.providers.read().await;
            if let Some(provider) = providers.get(&provider_key) {
                return Ok(provider.clone());
            }
        }

        let store_key = config.store_id();
        let cached = {
            let stores = self.stores.read().await;
            stores.get(&store_key).cloned()
        };

        let object_store = match cached {
            Some(store) => store,
            None => {
                let store = build_store(&config, &self.options)?;
                let mut stores = self.stores.write().await;
                stores.entry(store_key).or_insert(store).clone()
            }
        };

        let provider = Arc::new(StorageProvider::with_shared_store(config, object_store));

        let mut providers = self.providers.write().await;
        Ok(providers.entry(provider_key).or_insert(provider).clone())
    }

    /// Number of cached ObjectStore clients.
    pub async fn store_count(&self) -> usize {
        self.stores.read().await.len()
    }

    /// Number of cached StorageProviders.
    pub async fn provider_count(&self) -> usize {
        self.providers.read().await.len()
    }
}
