//! In-memory provider search cache.
//!
//! Keys are normalized [`SearchQuery`] values; entries carry the full
//! candidate set for that query. Expired entries behave as absent. Concurrent
//! lookups for the same key are collapsed into one provider call: each key
//! owns an async mutex held across the fetch, so late arrivals wait and then
//! read the freshly inserted value instead of fetching again.
//!
//! Empty candidate sets are cached like any other result (a miss on the
//! provider side is still an answer); provider errors are never cached.

use crate::config::CacheConfig;
use crate::provider::{MetadataProvider, ProviderCandidate, ProviderError, SearchQuery};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Running counters for cache effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CachedCandidates {
    candidates: Vec<ProviderCandidate>,
    inserted_at: Instant,
}

struct KeySlot {
    /// Holds the cached value; locked across a fetch to serialize fills.
    cell: Arc<Mutex<Option<CachedCandidates>>>,
    last_accessed: Instant,
}

pub struct SearchCache<P> {
    provider: Arc<P>,
    config: CacheConfig,
    entries: Mutex<HashMap<SearchQuery, KeySlot>>,
    stats: Mutex<CacheStats>,
}

impl<P: MetadataProvider> SearchCache<P> {
    pub fn new(provider: Arc<P>, config: CacheConfig) -> Self {
        Self {
            provider,
            config,
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Return cached candidates for `query`, fetching from the provider on a
    /// miss or expiry. Errors propagate to the caller and leave no entry
    /// behind, so the next lookup retries the provider.
    pub async fn get_or_fetch(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<ProviderCandidate>, ProviderError> {
        let cell = self.slot_for(query).await;
        let mut guard = cell.lock().await;

        if let Some(cached) = guard.as_ref() {
            if cached.inserted_at.elapsed() < self.config.ttl() {
                self.stats.lock().await.hits += 1;
                return Ok(cached.candidates.clone());
            }
            log::debug!("cache entry expired for '{}'", query.title);
        }

        self.stats.lock().await.misses += 1;
        let candidates = self.provider.search(query).await?;
        *guard = Some(CachedCandidates {
            candidates: candidates.clone(),
            inserted_at: Instant::now(),
        });
        Ok(candidates)
    }

    /// Look up or create the slot for `query`, bumping its access time.
    /// The map lock is released before the slot's fill lock is taken.
    async fn slot_for(&self, query: &SearchQuery) -> Arc<Mutex<Option<CachedCandidates>>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if !entries.contains_key(query) && entries.len() >= self.config.max_entries {
            self.evict_lru(&mut entries).await;
        }
        let slot = entries.entry(query.clone()).or_insert_with(|| KeySlot {
            cell: Arc::new(Mutex::new(None)),
            last_accessed: now,
        });
        slot.last_accessed = now;
        slot.cell.clone()
    }

    async fn evict_lru(&self, entries: &mut HashMap<SearchQuery, KeySlot>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_accessed)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            log::debug!("evicting least recently used cache entry '{}'", key.title);
            entries.remove(&key);
            self.stats.lock().await.evictions += 1;
        }
    }

    /// Drop all entries. In-flight fetches complete normally and refill
    /// their own slots afterwards.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        log::info!("cleared {} cached search entries", removed);
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().await.len();
        let mut stats = self.stats.lock().await.clone();
        stats.entries = entries;
        stats
    }
}
