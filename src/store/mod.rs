//! Persistence seams the importer writes through.
//!
//! The importer never reaches into storage directly. Entities, their
//! metadata, taxonomy terms and stored media assets are all accessed via the
//! traits below so the same import logic runs against the on-disk
//! [`LocalStore`] or any other backend.

pub mod local;

pub use local::LocalStore;

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an imported entity (a property listing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored media asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A metadata value attached to an entity or asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaValue {
    Text(String),
    Assets(Vec<AssetId>),
    Urls(Vec<String>),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_assets(&self) -> Option<&[AssetId]> {
        match self {
            MetaValue::Assets(ids) => Some(ids),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Text(s) => write!(f, "{}", s),
            MetaValue::Assets(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "{}", ids.join(", "))
            }
            MetaValue::Urls(urls) => write!(f, "{}", urls.join(", ")),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Text(s)
    }
}

/// Publication state of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Publish,
    Draft,
}

/// Core fields of an entity, excluding metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub title: String,
    pub excerpt: String,
    pub status: EntityStatus,
}

/// Entities and their lookup by metadata
pub trait EntityStore {
    /// First entity whose `key` metadata equals `value`
    fn find_by_meta(&self, key: &str, value: &str) -> Option<EntityId>;

    fn insert(&mut self, record: EntityRecord) -> Result<EntityId, StoreError>;

    fn update(&mut self, id: EntityId, record: EntityRecord) -> Result<(), StoreError>;

    fn record(&self, id: EntityId) -> Option<&EntityRecord>;

    /// All entities carrying `key`, with its value
    fn entities_with_meta(&self, key: &str) -> Vec<(EntityId, String)>;
}

/// Per-entity metadata
pub trait EntityMetaStore {
    fn get_meta(&self, entity: EntityId, key: &str) -> Option<MetaValue>;

    fn set_meta(&mut self, entity: EntityId, key: &str, value: MetaValue);

    /// Sets `key` only when the entity does not carry it yet
    fn add_meta(&mut self, entity: EntityId, key: &str, value: MetaValue) {
        if self.get_meta(entity, key).is_none() {
            self.set_meta(entity, key, value);
        }
    }

    /// Convenience for text values; absent or non-text reads as empty
    fn meta_text(&self, entity: EntityId, key: &str) -> String {
        self.get_meta(entity, key)
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default()
    }

    /// All metadata of the entity
    fn meta_snapshot(&self, entity: EntityId) -> BTreeMap<String, MetaValue>;
}

/// Taxonomy term relationships of entities
pub trait TaxonomyStore {
    fn clear_terms(&mut self, entity: EntityId, taxonomy: &str);

    fn set_terms(&mut self, entity: EntityId, taxonomy: &str, terms: Vec<String>);

    /// Term ids per taxonomy the entity has relationships in
    fn terms_snapshot(&self, entity: EntityId) -> BTreeMap<String, Vec<String>>;
}

/// Stored media assets
#[async_trait]
pub trait ContentStore: Send {
    /// Persist fetched bytes as a new asset owned by `owner`
    async fn store(
        &mut self,
        bytes: &[u8],
        filename: &str,
        owner: EntityId,
        metadata: Vec<(String, String)>,
    ) -> Result<AssetId, StoreError>;

    /// Remove the asset and its stored file
    async fn delete(&mut self, id: AssetId) -> Result<(), StoreError>;

    fn get_metadata(&self, id: AssetId, key: &str) -> Option<String>;

    fn set_metadata(&mut self, id: AssetId, key: &str, value: &str) -> Result<(), StoreError>;
}
