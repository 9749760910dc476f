// Copyright 2025 Runlens Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! TTL cache for result pages.
//!
//! Keyed by run id plus pagination window, so re-opening a run within the
//! TTL reuses pages instead of re-fetching them. Owned by the client; the
//! analysis crates never see it.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use runlens_core::TestResult;

/// Cache key: one page of one run's results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub run_id: String,
    pub skip: usize,
    pub limit: usize,
}

impl PageKey {
    pub fn new(run_id: impl Into<String>, skip: usize, limit: usize) -> Self {
        Self {
            run_id: run_id.into(),
            skip,
            limit,
        }
    }
}

/// One fetched page, already normalized.
#[derive(Debug, Clone)]
pub struct ResultsPage {
    pub results: Vec<TestResult>,
    /// Server-reported total for the filtered set, when provided.
    pub total_count: Option<u64>,
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entry_count: u64,
}

/// TTL page cache with hit/miss accounting.
pub struct PageCache {
    cache: Cache<PageKey, Arc<ResultsPage>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PageCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &PageKey) -> Option<Arc<ResultsPage>> {
        match self.cache.get(key).await {
            Some(page) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(page)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, key: PageKey, page: Arc<ResultsPage>) {
        self.cache.insert(key, page).await;
    }

    /// Drop every cached page. Used after mutations that invalidate runs.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Arc<ResultsPage> {
        Arc::new(ResultsPage {
            results: vec![],
            total_count: Some(0),
        })
    }

    #[tokio::test]
    async fn get_after_insert_hits() {
        let cache = PageCache::new(100, Duration::from_secs(60));
        let key = PageKey::new("run-1", 0, 100);

        assert!(cache.get(&key).await.is_none());
        cache.insert(key.clone(), page()).await;
        assert!(cache.get(&key).await.is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[tokio::test]
    async fn distinct_windows_are_distinct_entries() {
        let cache = PageCache::new(100, Duration::from_secs(60));
        cache.insert(PageKey::new("run-1", 0, 100), page()).await;
        assert!(cache.get(&PageKey::new("run-1", 100, 100)).await.is_none());
        assert!(cache.get(&PageKey::new("run-2", 0, 100)).await.is_none());
    }
}
