use super::importer::{ImportStore, Importer};
use crate::config::RemoveAction;
use crate::error::MediaError;
use crate::hooks::ImportEvent;
use crate::media::MediaCategory;
use crate::store::{EntityId, MetaValue};
use std::collections::HashSet;

impl<'a, S: ImportStore> Importer<'a, S> {
    /// Take listings that left the feed off the market.
    ///
    /// Only entities carrying this import's reference key and still on the
    /// market are considered, so manually added listings are never touched.
    /// Returns the number of listings taken off the market.
    pub async fn remove_old_properties(&mut self) -> usize {
        let ref_key = self.config.imported_ref_key();
        let current: HashSet<String> = self.properties.iter().map(|p| p.id.clone()).collect();

        let stale: Vec<(EntityId, String)> = self
            .store
            .entities_with_meta(&ref_key)
            .into_iter()
            .filter(|(_, reference)| !current.contains(reference))
            .filter(|(entity, _)| self.store.meta_text(*entity, "_on_market") == "yes")
            .collect();

        let mut removed = 0;
        for (entity, reference) in stale {
            if self.config.removes_stale() {
                self.store.set_meta(entity, "_on_market", MetaValue::from(""));
                self.log.log(
                    format!("Property {} marked as not on market", entity),
                    Some(reference.as_str()),
                );
                removed += 1;

                let except_first = match self.config.remove_action {
                    RemoveAction::None => None,
                    RemoveAction::RemoveAllMedia => Some(false),
                    RemoveAction::RemoveAllMediaExceptFirstImage => Some(true),
                };
                if let Some(except_first) = except_first {
                    self.delete_media(entity, &reference, MediaCategory::Epc, false).await;
                    self.delete_media(entity, &reference, MediaCategory::Brochure, false).await;
                    self.delete_media(entity, &reference, MediaCategory::Floorplan, false).await;
                    self.delete_media(entity, &reference, MediaCategory::Photo, except_first).await;
                    self.log.log("Deleted property media", Some(reference.as_str()));
                }
            }

            self.emit(ImportEvent::PropertyRemoved { entity, reference });
        }

        removed
    }

    /// Delete the downloaded media of one category, optionally keeping the
    /// first asset. Assets that fail to delete stay attached.
    async fn delete_media(
        &mut self,
        entity: EntityId,
        reference: &str,
        category: MediaCategory,
        except_first: bool,
    ) {
        let key = category.assets_key();
        let Some(ids) = self
            .store
            .get_meta(entity, key)
            .and_then(|v| v.as_assets().map(<[_]>::to_vec))
        else {
            return;
        };

        let mut remaining = Vec::with_capacity(ids.len());
        for (i, id) in ids.into_iter().enumerate() {
            if except_first && i == 0 {
                remaining.push(id);
                continue;
            }
            if let Err(source) = self.store.delete(id).await {
                let err = MediaError::DeleteFailure {
                    entity_ref: reference.to_string(),
                    key,
                    asset: id,
                    source,
                };
                self.log.error(err.to_string(), Some(reference));
                remaining.push(id);
            }
        }

        self.store.set_meta(entity, key, MetaValue::Assets(remaining));
    }
}
