use super::{
    AssetId, ContentStore, EntityId, EntityMetaStore, EntityRecord, EntityStore, MetaValue,
    TaxonomyStore,
};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STATE_FILE: &str = "store.json";
const MEDIA_DIR: &str = "media";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntity {
    record: EntityRecord,
    #[serde(default)]
    meta: BTreeMap<String, MetaValue>,
    #[serde(default)]
    terms: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAsset {
    owner: EntityId,
    file: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    next_entity_id: u64,
    next_asset_id: u64,
    entities: BTreeMap<EntityId, StoredEntity>,
    assets: BTreeMap<AssetId, StoredAsset>,
}

/// Directory backed content store.
///
/// Entity records, metadata and asset records live in `store.json`; media
/// bytes live under `media/`. State is held in memory and written back by
/// [`LocalStore::save`].
pub struct LocalStore {
    root: PathBuf,
    state: StoreState,
}

impl LocalStore {
    /// Open the store at `root`, creating it if needed
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(MEDIA_DIR)).await?;

        let state_path = root.join(STATE_FILE);
        let state = if tokio::fs::try_exists(&state_path).await? {
            let contents = tokio::fs::read_to_string(&state_path).await?;
            serde_json::from_str(&contents)?
        } else {
            StoreState::default()
        };

        info!(
            "Opened store at {} ({} entities, {} assets)",
            root.display(),
            state.entities.len(),
            state.assets.len()
        );

        Ok(Self { root, state })
    }

    /// Write the current state back to disk
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.root.join(format!("{}.tmp", STATE_FILE));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.root.join(STATE_FILE)).await?;
        debug!("Saved store to {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_count(&self) -> usize {
        self.state.entities.len()
    }

    pub fn asset_count(&self) -> usize {
        self.state.assets.len()
    }

    /// Path of the stored file of an asset
    pub fn asset_path(&self, id: AssetId) -> Option<PathBuf> {
        self.state
            .assets
            .get(&id)
            .map(|a| self.root.join(MEDIA_DIR).join(&a.file))
    }

    pub fn asset_owner(&self, id: AssetId) -> Option<EntityId> {
        self.state.assets.get(&id).map(|a| a.owner)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut StoredEntity> {
        self.state.entities.get_mut(&id)
    }
}

/// Keep only characters that are safe in a file name
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}

impl EntityStore for LocalStore {
    fn find_by_meta(&self, key: &str, value: &str) -> Option<EntityId> {
        self.state
            .entities
            .iter()
            .find(|(_, e)| e.meta.get(key).and_then(MetaValue::as_text) == Some(value))
            .map(|(id, _)| *id)
    }

    fn insert(&mut self, record: EntityRecord) -> std::result::Result<EntityId, StoreError> {
        self.state.next_entity_id += 1;
        let id = EntityId(self.state.next_entity_id);
        self.state.entities.insert(
            id,
            StoredEntity {
                record,
                meta: BTreeMap::new(),
                terms: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn update(&mut self, id: EntityId, record: EntityRecord) -> std::result::Result<(), StoreError> {
        let entity = self
            .entity_mut(id)
            .ok_or_else(|| StoreError::EntityNotFound(id.to_string()))?;
        entity.record = record;
        Ok(())
    }

    fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.state.entities.get(&id).map(|e| &e.record)
    }

    fn entities_with_meta(&self, key: &str) -> Vec<(EntityId, String)> {
        self.state
            .entities
            .iter()
            .filter_map(|(id, e)| {
                e.meta
                    .get(key)
                    .and_then(MetaValue::as_text)
                    .map(|v| (*id, v.to_string()))
            })
            .collect()
    }
}

impl EntityMetaStore for LocalStore {
    fn get_meta(&self, entity: EntityId, key: &str) -> Option<MetaValue> {
        self.state
            .entities
            .get(&entity)
            .and_then(|e| e.meta.get(key))
            .cloned()
    }

    fn set_meta(&mut self, entity: EntityId, key: &str, value: MetaValue) {
        if let Some(e) = self.entity_mut(entity) {
            e.meta.insert(key.to_string(), value);
        }
    }

    fn meta_snapshot(&self, entity: EntityId) -> BTreeMap<String, MetaValue> {
        self.state
            .entities
            .get(&entity)
            .map(|e| e.meta.clone())
            .unwrap_or_default()
    }
}

impl TaxonomyStore for LocalStore {
    fn clear_terms(&mut self, entity: EntityId, taxonomy: &str) {
        if let Some(e) = self.entity_mut(entity) {
            e.terms.insert(taxonomy.to_string(), Vec::new());
        }
    }

    fn set_terms(&mut self, entity: EntityId, taxonomy: &str, terms: Vec<String>) {
        if let Some(e) = self.entity_mut(entity) {
            e.terms.insert(taxonomy.to_string(), terms);
        }
    }

    fn terms_snapshot(&self, entity: EntityId) -> BTreeMap<String, Vec<String>> {
        self.state
            .entities
            .get(&entity)
            .map(|e| e.terms.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn store(
        &mut self,
        bytes: &[u8],
        filename: &str,
        owner: EntityId,
        metadata: Vec<(String, String)>,
    ) -> std::result::Result<AssetId, StoreError> {
        if !self.state.entities.contains_key(&owner) {
            return Err(StoreError::EntityNotFound(owner.to_string()));
        }

        let id = AssetId(self.state.next_asset_id + 1);
        let file = format!("{}-{}", id, sanitize_filename(filename));
        tokio::fs::write(self.root.join(MEDIA_DIR).join(&file), bytes).await?;

        self.state.next_asset_id = id.0;
        self.state.assets.insert(
            id,
            StoredAsset {
                owner,
                file,
                metadata: metadata.into_iter().collect(),
            },
        );
        debug!("Stored asset {} ({} bytes) for entity {}", id, bytes.len(), owner);
        Ok(id)
    }

    async fn delete(&mut self, id: AssetId) -> std::result::Result<(), StoreError> {
        let asset = self
            .state
            .assets
            .remove(&id)
            .ok_or(StoreError::AssetNotFound(id))?;

        match tokio::fs::remove_file(self.root.join(MEDIA_DIR).join(&asset.file)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                // Keep the record so the deletion can be retried later
                self.state.assets.insert(id, asset);
                return Err(e.into());
            }
        }
        debug!("Deleted asset {}", id);
        Ok(())
    }

    fn get_metadata(&self, id: AssetId, key: &str) -> Option<String> {
        self.state
            .assets
            .get(&id)
            .and_then(|a| a.metadata.get(key))
            .cloned()
    }

    fn set_metadata(&mut self, id: AssetId, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let asset = self
            .state
            .assets
            .get_mut(&id)
            .ok_or(StoreError::AssetNotFound(id))?;
        asset.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStatus;

    fn record(title: &str) -> EntityRecord {
        EntityRecord {
            title: title.to_string(),
            excerpt: String::new(),
            status: EntityStatus::Publish,
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo 1.jpg"), "photo_1.jpg");
        assert_eq!(sanitize_filename(""), "asset");
        assert_eq!(sanitize_filename(".."), "asset");
    }

    #[tokio::test]
    async fn test_store_and_delete_asset() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).await.unwrap();
        let entity = store.insert(record("1 High Street")).unwrap();

        let id = store
            .store(b"jpeg", "a.jpg", entity, vec![("_imported_url".into(), "http://x/a.jpg".into())])
            .await
            .unwrap();

        let path = store.asset_path(id).unwrap();
        assert!(path.exists());
        assert_eq!(store.get_metadata(id, "_imported_url").as_deref(), Some("http://x/a.jpg"));

        store.delete(id).await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.delete(id).await, Err(StoreError::AssetNotFound(id)));
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let entity = {
            let mut store = LocalStore::open(dir.path()).await.unwrap();
            let entity = store.insert(record("2 Mill Lane")).unwrap();
            store.set_meta(entity, "_imported_ref", "ABC1".into());
            store.set_terms(entity, "availability", vec!["7".into()]);
            store.save().await.unwrap();
            entity
        };

        let store = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(store.find_by_meta("_imported_ref", "ABC1"), Some(entity));
        assert_eq!(store.record(entity).unwrap().title, "2 Mill Lane");
        assert_eq!(store.terms_snapshot(entity)["availability"], vec!["7".to_string()]);
    }

    #[tokio::test]
    async fn test_add_meta_keeps_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path()).await.unwrap();
        let entity = store.insert(record("3 Church Road")).unwrap();

        store.add_meta(entity, "_negotiator_id", "4".into());
        store.add_meta(entity, "_negotiator_id", "9".into());
        assert_eq!(store.meta_text(entity, "_negotiator_id"), "4");
    }
}
