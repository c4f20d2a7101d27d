//! Pipeline caches
//!
//! Loaded table data is cached by a digest of the definition id and blob
//! name, so re-processing the same upload skips the blob read. The provider
//! index is cached under a single key and invalidated after a scope change.

use fundflow_core::domain::dataset::TableLoadResult;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::index::ProviderIndex;

const PROVIDER_INDEX_KEY: &str = "all-provider-summaries";

pub fn table_cache_key(definition_id: &str, blob_name: &str) -> String {
    hex::encode(Sha256::digest(
        format!("{}{}", definition_id, blob_name).as_bytes(),
    ))
}

#[derive(Clone)]
pub struct TableCache {
    cache: Cache<String, Arc<Vec<TableLoadResult>>>,
}

impl TableCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(
        &self,
        definition_id: &str,
        blob_name: &str,
    ) -> Option<Arc<Vec<TableLoadResult>>> {
        let hit = self
            .cache
            .get(&table_cache_key(definition_id, blob_name))
            .await;
        if hit.is_some() {
            debug!(blob_name, "Table cache hit");
        }
        hit
    }

    pub async fn insert(
        &self,
        definition_id: &str,
        blob_name: &str,
        tables: Arc<Vec<TableLoadResult>>,
    ) {
        self.cache
            .insert(table_cache_key(definition_id, blob_name), tables)
            .await;
    }
}

#[derive(Clone)]
pub struct ProviderIndexCache {
    cache: Cache<String, Arc<ProviderIndex>>,
}

impl ProviderIndexCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
        }
    }

    pub async fn get(&self) -> Option<Arc<ProviderIndex>> {
        self.cache.get(PROVIDER_INDEX_KEY).await
    }

    pub async fn insert(&self, index: Arc<ProviderIndex>) {
        self.cache.insert(PROVIDER_INDEX_KEY.to_string(), index).await;
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(PROVIDER_INDEX_KEY).await;
    }
}
