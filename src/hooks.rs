//! Events raised while importing, and the subscribers that react to them

use crate::import::ImportLog;
use crate::media::MediaCategory;
use crate::store::{EntityId, MetaValue};
use std::collections::BTreeMap;

/// Something that happened to an entity during an import run
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    PropertyImported {
        entity: EntityId,
        reference: String,
        inserted: bool,
    },
    MetadataChanged {
        entity: EntityId,
        reference: String,
        key: String,
        before: Option<MetaValue>,
        after: MetaValue,
    },
    TermsChanged {
        entity: EntityId,
        reference: String,
        taxonomy: String,
        before: Option<Vec<String>>,
        after: Vec<String>,
    },
    PropertyRemoved {
        entity: EntityId,
        reference: String,
    },
}

/// Subscriber to import events
pub trait ImportHook {
    fn on_event(&mut self, event: &ImportEvent, log: &mut ImportLog);
}

/// Writes metadata and term changes of updated listings to the import log
#[derive(Debug, Default)]
pub struct ChangeLogHook;

impl ImportHook for ChangeLogHook {
    fn on_event(&mut self, event: &ImportEvent, log: &mut ImportLog) {
        match event {
            ImportEvent::MetadataChanged {
                reference,
                key,
                before,
                after,
                ..
            } => {
                let name = key.trim_matches('_');
                let message = match before {
                    None => format!("New meta data for {}: {}", name, after),
                    Some(before) => {
                        format!("Updated {}. Before: {}, After: {}", name, before, after)
                    }
                };
                log.log(message, Some(reference.as_str()));
            }
            ImportEvent::TermsChanged {
                reference,
                taxonomy,
                before,
                after,
                ..
            } => {
                let message = match before {
                    None => format!("New taxonomy data for {}: {}", taxonomy, after.join(", ")),
                    Some(before) => format!(
                        "Updated {}. Before: {}, After: {}",
                        taxonomy,
                        before.join(", "),
                        after.join(", ")
                    ),
                };
                log.log(message, Some(reference.as_str()));
            }
            _ => {}
        }
    }
}

/// Metadata keys whose changes are reported by the media log lines instead
fn is_media_key(key: &str) -> bool {
    key == "_virtual_tours"
        || MediaCategory::ALL
            .iter()
            .any(|c| c.assets_key() == key || c.urls_key() == key)
}

/// Events for every metadata key that is new or changed, media excluded
pub fn metadata_changes(
    entity: EntityId,
    reference: &str,
    before: &BTreeMap<String, MetaValue>,
    after: &BTreeMap<String, MetaValue>,
) -> Vec<ImportEvent> {
    after
        .iter()
        .filter(|(key, _)| !is_media_key(key))
        .filter(|(key, value)| before.get(*key) != Some(*value))
        .map(|(key, value)| ImportEvent::MetadataChanged {
            entity,
            reference: reference.to_string(),
            key: key.clone(),
            before: before.get(key).cloned(),
            after: value.clone(),
        })
        .collect()
}

/// Events for every taxonomy whose term set is new or changed
pub fn term_changes(
    entity: EntityId,
    reference: &str,
    before: &BTreeMap<String, Vec<String>>,
    after: &BTreeMap<String, Vec<String>>,
) -> Vec<ImportEvent> {
    after
        .iter()
        .filter(|(taxonomy, terms)| before.get(*taxonomy) != Some(*terms))
        .map(|(taxonomy, terms)| ImportEvent::TermsChanged {
            entity,
            reference: reference.to_string(),
            taxonomy: taxonomy.clone(),
            before: before.get(taxonomy).cloned(),
            after: terms.clone(),
        })
        .collect()
}
