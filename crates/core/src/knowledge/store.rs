//! Durable homes for the three knowledge artifacts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::snapshot::{AssociationMap, KnowledgeSnapshot, PopularityMap, ProductNameIndex};
use crate::errors::KnowledgeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Artifact {
    Associations,
    Popularity,
    Names,
}

impl Artifact {
    pub const ALL: [Artifact; 3] = [Artifact::Associations, Artifact::Popularity, Artifact::Names];

    pub fn name(self) -> &'static str {
        match self {
            Self::Associations => "product-associations",
            Self::Popularity => "product-popularity",
            Self::Names => "product-names",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Associations => "product-associations.json",
            Self::Popularity => "product-popularity.json",
            Self::Names => "product-names.json",
        }
    }
}

/// Latest-wins storage of the knowledge artifacts. Every write replaces the artifact wholesale.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Reads all three artifacts. Fails if any one is missing or unparsable.
    async fn load(&self) -> Result<KnowledgeSnapshot, KnowledgeError>;

    async fn write_associations(&self, associations: &AssociationMap)
        -> Result<(), KnowledgeError>;

    async fn write_popularity(
        &self,
        popularity: &PopularityMap,
        names: &ProductNameIndex,
    ) -> Result<(), KnowledgeError>;
}

/// Stores artifacts as pretty-printed JSON documents in one directory.
#[derive(Clone, Debug)]
pub struct JsonFileKnowledgeStore {
    data_dir: PathBuf,
}

impl JsonFileKnowledgeStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path_for(&self, artifact: Artifact) -> PathBuf {
        self.data_dir.join(artifact.file_name())
    }

    async fn read<T: DeserializeOwned>(&self, artifact: Artifact) -> Result<T, KnowledgeError> {
        let path = self.path_for(artifact);
        let raw = tokio::fs::read(&path).await.map_err(|error| match error.kind() {
            ErrorKind::NotFound => KnowledgeError::NotFound {
                artifact: artifact.name(),
                location: path.display().to_string(),
            },
            _ => KnowledgeError::Io { artifact: artifact.name(), reason: error.to_string() },
        })?;

        serde_json::from_slice(&raw).map_err(|error| KnowledgeError::Corrupt {
            artifact: artifact.name(),
            reason: error.to_string(),
        })
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        artifact: Artifact,
        value: &T,
    ) -> Result<(), KnowledgeError> {
        let io_error = |error: std::io::Error| KnowledgeError::Io {
            artifact: artifact.name(),
            reason: error.to_string(),
        };

        let payload = serde_json::to_vec_pretty(value).map_err(|error| {
            KnowledgeError::Corrupt { artifact: artifact.name(), reason: error.to_string() }
        })?;

        tokio::fs::create_dir_all(&self.data_dir).await.map_err(io_error)?;

        // Rename keeps readers from ever seeing a half-written document.
        let path = self.path_for(artifact);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, payload).await.map_err(io_error)?;
        tokio::fs::rename(&staging, &path).await.map_err(io_error)?;

        debug!(
            event_name = "knowledge.store.artifact_written",
            artifact = artifact.name(),
            path = %path.display(),
            "knowledge artifact written"
        );
        Ok(())
    }
}

#[async_trait]
impl KnowledgeStore for JsonFileKnowledgeStore {
    async fn load(&self) -> Result<KnowledgeSnapshot, KnowledgeError> {
        let (associations, popularity, names) = tokio::join!(
            self.read::<AssociationMap>(Artifact::Associations),
            self.read::<PopularityMap>(Artifact::Popularity),
            self.read::<ProductNameIndex>(Artifact::Names),
        );

        let snapshot = KnowledgeSnapshot::new(associations?, popularity?, names?);
        info!(
            event_name = "knowledge.store.loaded",
            data_dir = %self.data_dir.display(),
            associated_products = snapshot.associations.product_count(),
            popular_products = snapshot.popularity.len(),
            "knowledge artifacts loaded"
        );
        Ok(snapshot)
    }

    async fn write_associations(
        &self,
        associations: &AssociationMap,
    ) -> Result<(), KnowledgeError> {
        self.write(Artifact::Associations, associations).await
    }

    async fn write_popularity(
        &self,
        popularity: &PopularityMap,
        names: &ProductNameIndex,
    ) -> Result<(), KnowledgeError> {
        self.write(Artifact::Popularity, popularity).await?;
        self.write(Artifact::Names, names).await
    }
}

#[derive(Default)]
struct StoredArtifacts {
    associations: Option<AssociationMap>,
    popularity: Option<PopularityMap>,
    names: Option<ProductNameIndex>,
}

/// Process-local store, mostly useful for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    artifacts: RwLock<StoredArtifacts>,
    loads: AtomicUsize,
}

impl InMemoryKnowledgeStore {
    pub fn with_snapshot(snapshot: KnowledgeSnapshot) -> Self {
        Self {
            artifacts: RwLock::new(StoredArtifacts {
                associations: Some(snapshot.associations),
                popularity: Some(snapshot.popularity),
                names: Some(snapshot.names),
            }),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of `load` calls served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub async fn remove(&self, artifact: Artifact) {
        let mut artifacts = self.artifacts.write().await;
        match artifact {
            Artifact::Associations => artifacts.associations = None,
            Artifact::Popularity => artifacts.popularity = None,
            Artifact::Names => artifacts.names = None,
        }
    }
}

fn missing(artifact: Artifact) -> KnowledgeError {
    KnowledgeError::NotFound { artifact: artifact.name(), location: "memory".to_owned() }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn load(&self) -> Result<KnowledgeSnapshot, KnowledgeError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let artifacts = self.artifacts.read().await;
        Ok(KnowledgeSnapshot::new(
            artifacts.associations.clone().ok_or_else(|| missing(Artifact::Associations))?,
            artifacts.popularity.clone().ok_or_else(|| missing(Artifact::Popularity))?,
            artifacts.names.clone().ok_or_else(|| missing(Artifact::Names))?,
        ))
    }

    async fn write_associations(
        &self,
        associations: &AssociationMap,
    ) -> Result<(), KnowledgeError> {
        self.artifacts.write().await.associations = Some(associations.clone());
        Ok(())
    }

    async fn write_popularity(
        &self,
        popularity: &PopularityMap,
        names: &ProductNameIndex,
    ) -> Result<(), KnowledgeError> {
        let mut artifacts = self.artifacts.write().await;
        artifacts.popularity = Some(popularity.clone());
        artifacts.names = Some(names.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{Artifact, InMemoryKnowledgeStore, JsonFileKnowledgeStore, KnowledgeStore};
    use crate::domain::product::ProductId;
    use crate::errors::KnowledgeError;
    use crate::knowledge::snapshot::{AssociationMap, PopularityMap, ProductNameIndex};

    fn sample_maps() -> (AssociationMap, PopularityMap, ProductNameIndex) {
        let (apple, bread) = (ProductId::new("apple"), ProductId::new("bread"));
        let mut associations = AssociationMap::new();
        associations.record_pair(&apple, &bread);
        let mut popularity = PopularityMap::new();
        popularity.add(&apple, 4);
        popularity.add(&bread, 1);
        let mut names = ProductNameIndex::new();
        names.observe(&apple, "Apple");
        names.observe(&bread, "Sourdough");
        (associations, popularity, names)
    }

    #[tokio::test]
    async fn file_store_round_trips_all_artifacts() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileKnowledgeStore::new(dir.path().join("knowledge"));
        let (associations, popularity, names) = sample_maps();

        store.write_associations(&associations).await.expect("write associations");
        store.write_popularity(&popularity, &names).await.expect("write popularity");

        let snapshot = store.load().await.expect("load");
        assert_eq!(snapshot.associations, associations);
        assert_eq!(snapshot.popularity, popularity);
        assert_eq!(snapshot.names, names);
        assert!(!store.path_for(Artifact::Popularity).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_artifact_is_reported_as_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileKnowledgeStore::new(dir.path());
        let (_, popularity, names) = sample_maps();
        store.write_popularity(&popularity, &names).await.expect("write popularity");

        let error = store.load().await.expect_err("associations are missing");
        assert!(matches!(
            error,
            KnowledgeError::NotFound { artifact: "product-associations", .. }
        ));
    }

    #[tokio::test]
    async fn unparsable_artifact_is_reported_as_corrupt() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileKnowledgeStore::new(dir.path());
        let (associations, popularity, names) = sample_maps();
        store.write_associations(&associations).await.expect("write associations");
        store.write_popularity(&popularity, &names).await.expect("write popularity");

        std::fs::write(store.path_for(Artifact::Names), "{ not json").expect("corrupt names");

        let error = store.load().await.expect_err("names are corrupt");
        assert!(matches!(error, KnowledgeError::Corrupt { artifact: "product-names", .. }));
    }

    #[tokio::test]
    async fn in_memory_store_counts_loads_and_reports_missing_artifacts() {
        let store = InMemoryKnowledgeStore::default();
        assert!(store.load().await.is_err());

        let (associations, popularity, names) = sample_maps();
        store.write_associations(&associations).await.expect("write");
        store.write_popularity(&popularity, &names).await.expect("write");
        assert!(store.load().await.is_ok());

        store.remove(Artifact::Names).await;
        assert!(store.load().await.is_err());
        assert_eq!(store.loads(), 3);
    }
}
