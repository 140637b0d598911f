//! Bulk media lookup
//!
//! Per-id lookups are coalesced by a [`BatchLoader`] into `MEDIA_PAGE_QUERY`
//! requests. [`MediaLookup::get`] additionally caches results by
//! `(mediaId, updatedAt)`: asking with a newer `updatedAt` than the cached one
//! goes back to the network, so a stale cache entry is never returned for a
//! fresher request.

use crate::batch::{BatchFn, BatchLoader};
use crate::client::AniListClient;
use crate::error::{ProviderError, Result};
use crate::types::RemoteMedia;
use async_trait::async_trait;
use core_library::models::MediaId;
use core_runtime::EngineConfig;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

struct BulkMediaFetcher {
    client: AniListClient,
}

#[async_trait]
impl BatchFn<MediaId, RemoteMedia> for BulkMediaFetcher {
    async fn load(&self, keys: &[MediaId]) -> Result<HashMap<MediaId, RemoteMedia>> {
        let media = self.client.fetch_media_page(keys).await?;
        Ok(media
            .into_iter()
            .map(|node| (MediaId(node.id), node))
            .collect())
    }
}

type CacheEntry = (i64, Option<RemoteMedia>);

/// Coalescing media lookup with a freshness-keyed cache
///
/// The cache holds at most one entry per media id ever asked for through
/// [`Self::get`]; a newer `updatedAt` replaces the entry instead of adding
/// one. It grows with the part of the catalog the caller touches and is
/// never evicted. [`Self::batch_lookup`] bypasses it. Call
/// [`Self::clear_cache`] to release it.
pub struct MediaLookup {
    loader: BatchLoader<MediaId, RemoteMedia>,
    cache: Mutex<HashMap<MediaId, CacheEntry>>,
}

impl MediaLookup {
    pub fn new(client: AniListClient, config: &EngineConfig) -> Self {
        Self::with_batching(client, config.batch_window, config.max_batch_size)
    }

    pub fn with_batching(client: AniListClient, window: Duration, max_batch_size: usize) -> Self {
        let fetcher: Arc<dyn BatchFn<MediaId, RemoteMedia>> =
            Arc::new(BulkMediaFetcher { client });
        Self {
            loader: BatchLoader::new(fetcher, window, max_batch_size),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<MediaId, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Media node for `id` as of at least `updated_at`
    ///
    /// # Errors
    ///
    /// `ProviderError::InvalidInput` if `updated_at` is not positive; a
    /// missing marker would let old results be served from the cache.
    pub async fn get(&self, id: MediaId, updated_at: i64) -> Result<Option<RemoteMedia>> {
        if updated_at <= 0 {
            return Err(ProviderError::InvalidInput(format!(
                "An updatedAt must be passed for media {} so old results are not returned from the cache",
                id
            )));
        }

        let cached = self
            .cache()
            .get(&id)
            .filter(|(cached_at, _)| *cached_at >= updated_at)
            .map(|(_, value)| value.clone());
        if let Some(value) = cached {
            trace!(media_id = %id, "Media cache hit");
            return Ok(value);
        }

        let value = self.loader.load(id).await?;

        let mut cache = self.cache();
        let replace = cache
            .get(&id)
            .map_or(true, |(cached_at, _)| *cached_at < updated_at);
        if replace {
            cache.insert(id, (updated_at, value.clone()));
        }
        Ok(value)
    }

    /// [`Self::get`] for many `(id, updatedAt)` pairs, position-aligned
    pub async fn get_many(&self, requests: &[(MediaId, i64)]) -> Result<Vec<Option<RemoteMedia>>> {
        try_join_all(
            requests
                .iter()
                .map(|(id, updated_at)| self.get(*id, *updated_at)),
        )
        .await
    }

    /// Uncached lookup; the result is position-aligned with `ids`
    pub async fn batch_lookup(&self, ids: &[MediaId]) -> Result<Vec<Option<RemoteMedia>>> {
        self.loader.load_many(ids).await
    }

    pub fn cached_len(&self) -> usize {
        self.cache().len()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }
}
