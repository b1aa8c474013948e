use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::snapshot::KnowledgeSnapshot;
use super::store::KnowledgeStore;
use crate::errors::KnowledgeError;

/// Owns the snapshot currently served to the engine.
///
/// Readers clone an `Arc` to a complete snapshot, so a refresh never exposes a mix of
/// old and new maps. Loads are serialized through `load_gate`; callers that arrive while
/// a first load is in flight wait for it and reuse its result, success or failure, instead
/// of loading again.
pub struct KnowledgeCache {
    store: Arc<dyn KnowledgeStore>,
    current: RwLock<Option<Arc<KnowledgeSnapshot>>>,
    load_gate: Mutex<LoadOutcome>,
    attempts: AtomicU64,
    published: AtomicU64,
}

/// Failure of the most recent load attempt, keyed by the count of finished attempts.
#[derive(Default)]
struct LoadOutcome {
    failed: Option<(u64, KnowledgeError)>,
}

impl KnowledgeCache {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            load_gate: Mutex::new(LoadOutcome::default()),
            attempts: AtomicU64::new(0),
            published: AtomicU64::new(0),
        }
    }

    /// The published snapshot, if any, without touching the store.
    pub async fn current(&self) -> Option<Arc<KnowledgeSnapshot>> {
        self.current.read().await.clone()
    }

    pub async fn ensure_loaded(&self) -> Result<Arc<KnowledgeSnapshot>, KnowledgeError> {
        if let Some(snapshot) = self.current().await {
            return Ok(snapshot);
        }

        let seen = self.attempts.load(Ordering::SeqCst);
        let mut outcome = self.load_gate.lock().await;
        if let Some(snapshot) = self.current().await {
            return Ok(snapshot);
        }
        // A load that finished after this caller arrived already failed; share its error.
        if let Some((attempt, error)) = &outcome.failed {
            if *attempt > seen {
                return Err(error.clone());
            }
        }

        self.load_and_publish(&mut outcome, "initial_load").await
    }

    /// Reloads every artifact. On failure the previously published snapshot stays in service.
    pub async fn refresh(&self) -> Result<Arc<KnowledgeSnapshot>, KnowledgeError> {
        let mut outcome = self.load_gate.lock().await;
        self.load_and_publish(&mut outcome, "refresh").await
    }

    async fn load_and_publish(
        &self,
        outcome: &mut LoadOutcome,
        trigger: &'static str,
    ) -> Result<Arc<KnowledgeSnapshot>, KnowledgeError> {
        let result = self.store.load().await;
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let loaded = match result {
            Ok(snapshot) => {
                outcome.failed = None;
                snapshot
            }
            Err(error) => {
                outcome.failed = Some((attempt, error.clone()));
                let serving = self.current().await.map(|snapshot| snapshot.version).unwrap_or(0);
                warn!(
                    event_name = "knowledge.cache.load_failed",
                    trigger,
                    attempt,
                    serving_version = serving,
                    error = %error,
                    "knowledge load failed; keeping previously published snapshot"
                );
                return Err(error);
            }
        };

        let version = self.published.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(loaded.published(version));
        *self.current.write().await = Some(Arc::clone(&snapshot));

        info!(
            event_name = "knowledge.cache.published",
            trigger,
            version,
            associated_products = snapshot.associations.product_count(),
            popular_products = snapshot.popularity.len(),
            "knowledge snapshot published"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::KnowledgeCache;
    use crate::domain::product::ProductId;
    use crate::errors::KnowledgeError;
    use crate::knowledge::snapshot::{
        AssociationMap, KnowledgeSnapshot, PopularityMap, ProductNameIndex,
    };
    use crate::knowledge::store::{Artifact, InMemoryKnowledgeStore, KnowledgeStore};

    /// Serves a self-consistent generation per load: every map encodes the same number.
    #[derive(Default)]
    struct GenerationStore {
        generation: AtomicU64,
        loads: AtomicUsize,
        delay: Duration,
    }

    impl GenerationStore {
        fn slow(delay: Duration) -> Self {
            Self { delay, ..Self::default() }
        }

        fn snapshot_for(generation: u64) -> KnowledgeSnapshot {
            let (marker, partner) = (ProductId::new("marker"), ProductId::new("partner"));
            let mut associations = AssociationMap::new();
            for _ in 0..generation {
                associations.record_pair(&marker, &partner);
            }
            let mut popularity = PopularityMap::new();
            popularity.add(&marker, generation);
            let mut names = ProductNameIndex::new();
            names.observe(&marker, &format!("gen-{generation}"));
            KnowledgeSnapshot::new(associations, popularity, names)
        }
    }

    #[async_trait]
    impl KnowledgeStore for GenerationStore {
        async fn load(&self) -> Result<KnowledgeSnapshot, KnowledgeError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(Self::snapshot_for(generation))
        }

        async fn write_associations(&self, _: &AssociationMap) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn write_popularity(
            &self,
            _: &PopularityMap,
            _: &ProductNameIndex,
        ) -> Result<(), KnowledgeError> {
            Ok(())
        }
    }

    /// Fails every load after a delay, like an artifact directory that is unreachable.
    struct UnreachableStore {
        loads: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl KnowledgeStore for UnreachableStore {
        async fn load(&self) -> Result<KnowledgeSnapshot, KnowledgeError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Err(KnowledgeError::Io {
                artifact: "product-associations",
                reason: "mount unavailable".to_owned(),
            })
        }

        async fn write_associations(&self, _: &AssociationMap) -> Result<(), KnowledgeError> {
            Ok(())
        }

        async fn write_popularity(
            &self,
            _: &PopularityMap,
            _: &ProductNameIndex,
        ) -> Result<(), KnowledgeError> {
            Ok(())
        }
    }

    fn assert_consistent(snapshot: &KnowledgeSnapshot) {
        let marker = ProductId::new("marker");
        let generation = snapshot.popularity.get(&marker);
        assert_eq!(
            u64::from(snapshot.associations.count(&marker, &ProductId::new("partner"))),
            generation
        );
        assert_eq!(snapshot.names.get(&marker), Some(format!("gen-{generation}").as_str()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_a_single_load() {
        let store = Arc::new(GenerationStore::slow(Duration::from_millis(25)));
        let cache = Arc::new(KnowledgeCache::new(store.clone()));

        let handles = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded().await })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let snapshot = handle.await.expect("join").expect("load");
            assert_eq!(snapshot.version, 1);
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_a_failed_load() {
        let store = Arc::new(UnreachableStore {
            loads: AtomicUsize::new(0),
            delay: Duration::from_millis(40),
        });
        let cache = Arc::new(KnowledgeCache::new(store.clone()));

        let handles = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded().await })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let error = handle.await.expect("join").expect_err("store is unreachable");
            assert!(matches!(error, KnowledgeError::Io { artifact: "product-associations", .. }));
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert!(cache.current().await.is_none());

        // Later callers are not pinned to the old failure.
        assert!(cache.ensure_loaded().await.is_err());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn ensure_loaded_reuses_published_snapshot() {
        let store = Arc::new(InMemoryKnowledgeStore::with_snapshot(KnowledgeSnapshot::empty()));
        let cache = KnowledgeCache::new(store.clone());

        assert!(cache.current().await.is_none());
        let first = cache.ensure_loaded().await.expect("first load");
        let second = cache.ensure_loaded().await.expect("cached");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.loads(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot_in_service() {
        let store = Arc::new(InMemoryKnowledgeStore::with_snapshot(KnowledgeSnapshot::empty()));
        let cache = KnowledgeCache::new(store.clone());
        let loaded = cache.ensure_loaded().await.expect("initial load");

        store.remove(Artifact::Popularity).await;
        let error = cache.refresh().await.expect_err("popularity is missing");

        assert!(matches!(error, KnowledgeError::NotFound { artifact: "product-popularity", .. }));
        let serving = cache.current().await.expect("still serving");
        assert!(Arc::ptr_eq(&loaded, &serving));
        assert_eq!(serving.version, 1);
    }

    #[tokio::test]
    async fn first_load_failure_surfaces_error_and_publishes_nothing() {
        let cache = KnowledgeCache::new(Arc::new(InMemoryKnowledgeStore::default()));

        assert!(cache.ensure_loaded().await.is_err());
        assert!(cache.current().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn refresh_under_concurrent_reads_never_tears_a_snapshot() {
        let cache = Arc::new(KnowledgeCache::new(Arc::new(GenerationStore::default())));
        cache.ensure_loaded().await.expect("initial load");

        let writer = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                for _ in 0..50 {
                    cache.refresh().await.expect("refresh");
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    let mut last_version = 0;
                    for _ in 0..200 {
                        let snapshot = cache.ensure_loaded().await.expect("snapshot");
                        assert_consistent(&snapshot);
                        assert!(snapshot.version >= last_version);
                        last_version = snapshot.version;
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect::<Vec<_>>();

        writer.await.expect("writer");
        for reader in readers {
            reader.await.expect("reader");
        }
        assert_eq!(cache.current().await.expect("published").version, 51);
    }
}
