use super::category::{MediaCategory, StorageMode};
use super::fetch::MediaFetcher;
use super::url::{basename, fetchable, normalize_urls};
use crate::error::MediaError;
use crate::store::{AssetId, ContentStore, EntityId, EntityMetaStore, MetaValue};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Asset metadata key recording the URL an asset was downloaded from
pub const ORIGIN_URL_KEY: &str = "_imported_url";

/// Counters of one reconciliation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaStats {
    pub new: usize,
    pub existing: usize,
    pub deleted: usize,
}

/// Asset set persisted for an entity and category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AssetSet {
    Assets(Vec<AssetId>),
    Urls(Vec<String>),
}

impl AssetSet {
    pub fn len(&self) -> usize {
        match self {
            AssetSet::Assets(ids) => ids.len(),
            AssetSet::Urls(urls) => urls.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of reconciling one category of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub assets: AssetSet,
    pub stats: MediaStats,
    pub errors: Vec<MediaError>,
}

/// The entity a reconciliation runs for
#[derive(Debug, Clone, Copy)]
pub struct MediaOwner<'a> {
    pub id: EntityId,
    /// Feed reference, used to tag errors
    pub reference: &'a str,
}

/// Brings an entity's stored media in line with the feed's URL list.
///
/// Previously downloaded assets are matched by their recorded origin URL and
/// reused; only unseen URLs are fetched; assets whose URL left the list are
/// deleted. Every per-item failure is collected and the call always
/// completes.
pub struct MediaReconciler<'a> {
    fetcher: &'a dyn MediaFetcher,
    timeout: Duration,
}

impl<'a> MediaReconciler<'a> {
    pub fn new(fetcher: &'a dyn MediaFetcher, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    pub async fn reconcile<S>(
        &self,
        store: &mut S,
        owner: MediaOwner<'_>,
        category: MediaCategory,
        mode: StorageMode,
        desired: &[String],
    ) -> ReconcileOutcome
    where
        S: ContentStore + EntityMetaStore,
    {
        let urls = normalize_urls(desired);

        if mode == StorageMode::UrlReference {
            store.set_meta(owner.id, category.urls_key(), MetaValue::Urls(urls.clone()));
            return ReconcileOutcome {
                assets: AssetSet::Urls(urls),
                stats: MediaStats::default(),
                errors: Vec::new(),
            };
        }

        let previous: Vec<AssetId> = store
            .get_meta(owner.id, category.assets_key())
            .and_then(|v| v.as_assets().map(<[AssetId]>::to_vec))
            .unwrap_or_default();

        let mut stats = MediaStats::default();
        let mut errors = Vec::new();
        let mut result: Vec<AssetId> = Vec::with_capacity(urls.len());
        let mut seen: HashSet<&str> = HashSet::new();

        for url in &urls {
            if !seen.insert(url.as_str()) {
                continue;
            }

            let imported = previous
                .iter()
                .copied()
                .find(|id| store.get_metadata(*id, ORIGIN_URL_KEY).as_deref() == Some(url.as_str()));

            if let Some(id) = imported {
                result.push(id);
                stats.existing += 1;
                continue;
            }

            match self.download(store, owner, url).await {
                Ok(id) => {
                    result.push(id);
                    stats.new += 1;
                }
                Err(err) => {
                    warn!("AGENT_REF: {} - {}", owner.reference, err);
                    errors.push(err);
                }
            }
        }

        let kept: HashSet<AssetId> = result.iter().copied().collect();
        let mut attempted: HashSet<AssetId> = HashSet::new();
        for id in previous {
            if kept.contains(&id) || !attempted.insert(id) {
                continue;
            }
            match store.delete(id).await {
                Ok(()) => stats.deleted += 1,
                Err(source) => {
                    let err = MediaError::DeleteFailure {
                        entity_ref: owner.reference.to_string(),
                        key: category.assets_key(),
                        asset: id,
                        source,
                    };
                    warn!("AGENT_REF: {} - {}", owner.reference, err);
                    errors.push(err);
                }
            }
        }

        store.set_meta(owner.id, category.assets_key(), MetaValue::Assets(result.clone()));

        debug!(
            "Reconciled {} for entity {}: {:?}",
            category.plural(),
            owner.id,
            stats
        );

        ReconcileOutcome {
            assets: AssetSet::Assets(result),
            stats,
            errors,
        }
    }

    async fn download<S>(
        &self,
        store: &mut S,
        owner: MediaOwner<'_>,
        url: &str,
    ) -> Result<AssetId, MediaError>
    where
        S: ContentStore + EntityMetaStore,
    {
        let bytes = self
            .fetcher
            .fetch(&fetchable(url), self.timeout)
            .await
            .map_err(|source| MediaError::FetchFailure {
                entity_ref: owner.reference.to_string(),
                url: url.to_string(),
                source,
            })?;

        let store_failure = |source| MediaError::StoreFailure {
            entity_ref: owner.reference.to_string(),
            url: url.to_string(),
            source,
        };

        let filename = basename(url);
        let id = store
            .store(&bytes, filename, owner.id, vec![("title".to_string(), filename.to_string())])
            .await
            .map_err(store_failure)?;

        if let Err(source) = store.set_metadata(id, ORIGIN_URL_KEY, url) {
            // An asset without an origin can never be matched again
            if let Err(e) = store.delete(id).await {
                warn!(
                    "AGENT_REF: {} - Failed to remove asset {} with no recorded origin: {}",
                    owner.reference, id, e
                );
            }
            return Err(store_failure(source));
        }

        Ok(id)
    }
}
