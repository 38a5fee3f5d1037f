use super::fields::{poa_flag, price_digits, rounded_price, single_line, strip_tags, Department};
use super::log::ImportLog;
use super::mapping::{pre_test, PreTest};
use crate::config::Config;
use crate::error::{Error, GeocodeError, Result};
use crate::geocode::Geocoder;
use crate::hooks::{metadata_changes, term_changes, ImportEvent, ImportHook};
use crate::media::{MediaCategory, MediaFetcher, MediaOwner, MediaReconciler, MediaStats, StorageMode};
use crate::models::{text, FeedDocument, FeedProperty};
use crate::store::{
    ContentStore, EntityId, EntityMetaStore, EntityRecord, EntityStatus, EntityStore, MetaValue,
    TaxonomyStore,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Everything an import needs from its store
pub trait ImportStore: EntityStore + EntityMetaStore + TaxonomyStore + ContentStore {}

impl<T> ImportStore for T where T: EntityStore + EntityMetaStore + TaxonomyStore + ContentStore {}

/// Totals of one import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub removed: usize,
    pub media: MediaStats,
    pub errors: usize,
}

/// Imports SSPC listings into a store.
///
/// Listings are processed one at a time, in feed order. Within a listing,
/// failures (geocoding, single media items) are logged and the import moves
/// on; only a failure to create or update the entity itself skips the
/// listing.
pub struct Importer<'a, S: ImportStore> {
    pub(super) config: &'a Config,
    pub(super) store: &'a mut S,
    fetcher: &'a dyn MediaFetcher,
    geocoder: Option<Geocoder>,
    hooks: Vec<Box<dyn ImportHook + 'a>>,
    pub(super) log: ImportLog,
    pub(super) properties: Vec<FeedProperty>,
}

impl<'a, S: ImportStore> Importer<'a, S> {
    pub fn new(config: &'a Config, store: &'a mut S, fetcher: &'a dyn MediaFetcher) -> Result<Self> {
        let geocoder = match config.google_maps_api_key.as_deref() {
            Some(key) if !key.is_empty() => Some(
                Geocoder::new(config.geocode.base_url.clone(), key)
                    .map_err(|e| Error::Config(format!("failed to set up geocoder: {}", e)))?,
            ),
            _ => None,
        };

        Ok(Self {
            config,
            store,
            fetcher,
            geocoder,
            hooks: Vec::new(),
            log: ImportLog::new(),
            properties: Vec::new(),
        })
    }

    /// Subscribe a hook to import events
    pub fn add_hook(&mut self, hook: Box<dyn ImportHook + 'a>) {
        self.hooks.push(hook);
    }

    /// Take the listings of a parsed feed document
    pub fn load(&mut self, document: FeedDocument) {
        self.log.log("Parsing properties", None);
        self.properties = document.property;
    }

    pub fn properties(&self) -> &[FeedProperty] {
        &self.properties
    }

    pub fn pre_test(&self) -> PreTest {
        pre_test(&self.properties)
    }

    pub fn log(&self) -> &ImportLog {
        &self.log
    }

    pub fn into_log(self) -> ImportLog {
        self.log
    }

    pub(super) fn emit(&mut self, event: ImportEvent) {
        for hook in self.hooks.iter_mut() {
            hook.on_event(&event, &mut self.log);
        }
    }

    fn set(&mut self, entity: EntityId, key: &str, value: impl Into<MetaValue>) {
        self.store.set_meta(entity, key, value.into());
    }

    /// Import every loaded listing
    pub async fn import(&mut self) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let properties = std::mem::take(&mut self.properties);

        self.log.log("Starting import", None);
        self.log.log(
            format!("Beginning to loop through {} properties", properties.len()),
            None,
        );

        for (index, property) in properties.iter().enumerate() {
            let row = index + 1;
            self.log.log(
                format!("Importing property {} with reference {}", row, property.id),
                Some(property.id.as_str()),
            );

            summary.processed += 1;
            match self.import_property(property).await {
                Some((inserted, media)) => {
                    if inserted {
                        summary.inserted += 1;
                    } else {
                        summary.updated += 1;
                    }
                    summary.media.new += media.new;
                    summary.media.existing += media.existing;
                    summary.media.deleted += media.deleted;
                }
                None => summary.failed += 1,
            }

            if let Some(pause) = self.config.chunk_pause(row) {
                self.log.log(format!("Pausing for {} seconds", pause.as_secs()), None);
                tokio::time::sleep(pause).await;
            }
        }

        self.properties = properties;
        self.log.log("Finished import", None);
        summary.errors = self.log.error_count();
        summary
    }

    /// Import one listing. Returns whether it was inserted, and its media
    /// totals, or `None` when the entity could not be written.
    async fn import_property(&mut self, property: &FeedProperty) -> Option<(bool, MediaStats)> {
        let reference = property.id.as_str();
        let ref_key = self.config.imported_ref_key();

        let record = EntityRecord {
            title: strip_tags(text(&property.address)),
            excerpt: text(&property.summary).to_string(),
            status: EntityStatus::Publish,
        };

        let (entity, inserted) = match self.store.find_by_meta(&ref_key, reference) {
            Some(id) => {
                self.log.log(
                    "This property has been imported before. Updating it",
                    Some(reference),
                );
                if let Err(e) = self.store.update(id, record) {
                    self.log.error(
                        format!("Failed to update post. The error was as follows: {}", e),
                        Some(reference),
                    );
                    return None;
                }
                (id, false)
            }
            None => {
                self.log.log(
                    "This property hasn't been imported before. Inserting it",
                    Some(reference),
                );
                match self.store.insert(record) {
                    Ok(id) => (id, true),
                    Err(e) => {
                        self.log.error(
                            format!("Failed to insert post. The error was as follows: {}", e),
                            Some(reference),
                        );
                        return None;
                    }
                }
            }
        };

        let before = (!inserted).then(|| {
            (
                self.store.meta_snapshot(entity),
                self.store.terms_snapshot(entity),
            )
        });

        self.log.log(
            format!(
                "Successfully {} post. The post ID is {}",
                if inserted { "inserted" } else { "updated" },
                entity
            ),
            Some(reference),
        );

        self.set(entity, &ref_key, reference);
        self.apply_address(entity, property);
        self.apply_coordinates(entity, property).await;
        self.apply_record_details(entity, property);

        let department = Department::from_feed(
            text(&property.property_category),
            text(&property.transaction_type),
        );
        self.set(entity, "_department", department.as_str());

        if department.is_residential() {
            self.apply_residential(entity, property);
        }
        match department {
            Department::ResidentialSales => self.apply_sales(entity, property),
            Department::ResidentialLettings => self.apply_lettings(entity, property),
            Department::Commercial => self.apply_commercial(entity, property),
        }

        self.apply_marketing(entity, property);
        self.apply_features(entity, property);
        self.apply_rooms(entity, property);

        let media = self.apply_media(entity, property).await;

        self.emit(ImportEvent::PropertyImported {
            entity,
            reference: reference.to_string(),
            inserted,
        });

        if let Some((meta_before, terms_before)) = before {
            let meta_after = self.store.meta_snapshot(entity);
            let terms_after = self.store.terms_snapshot(entity);
            let changes = metadata_changes(entity, reference, &meta_before, &meta_after)
                .into_iter()
                .chain(term_changes(entity, reference, &terms_before, &terms_after));
            for event in changes {
                self.emit(event);
            }
        }

        Some((inserted, media))
    }

    fn apply_address(&mut self, entity: EntityId, property: &FeedProperty) {
        self.set(entity, "_reference_number", property.id.as_str());
        self.set(entity, "_address_name_number", "");
        self.set(entity, "_address_street", text(&property.address));
        self.set(entity, "_address_two", "");
        self.set(entity, "_address_three", "");
        self.set(entity, "_address_four", "");
        self.set(entity, "_address_postcode", text(&property.postcode));
        self.set(entity, "_address_country", "GB");
    }

    async fn apply_coordinates(&mut self, entity: EntityId, property: &FeedProperty) {
        let reference = Some(property.id.as_str());
        let (lat, lng) = (text(&property.latitude), text(&property.longitude));

        if !lat.is_empty() && !lng.is_empty() {
            self.set(entity, "_latitude", lat);
            self.set(entity, "_longitude", lng);
            return;
        }

        let stored_lat = self.store.meta_text(entity, "_latitude");
        let stored_lng = self.store.meta_text(entity, "_longitude");
        if !stored_lat.is_empty() && !stored_lng.is_empty() {
            return;
        }

        let Some(geocoder) = &self.geocoder else {
            self.log.log(
                "Not performing Google Geocoding request as no API key present in settings",
                reference,
            );
            return;
        };

        let result = geocoder
            .geocode(&[text(&property.address), text(&property.postcode)])
            .await;

        match result {
            Ok(coords) => {
                self.set(entity, "_latitude", coords.latitude);
                self.set(entity, "_longitude", coords.longitude);
            }
            Err(err @ GeocodeError::Status(_)) => {
                self.log.error(err.to_string(), reference);
                tokio::time::sleep(Duration::from_secs(self.config.geocode.error_pause_secs)).await;
            }
            Err(err) => self.log.error(err.to_string(), reference),
        }
    }

    fn apply_record_details(&mut self, entity: EntityId, property: &FeedProperty) {
        self.store.add_meta(entity, "_owner_contact_id", "".into());
        let negotiator = self.config.negotiator_id.clone().unwrap_or_default();
        self.store.add_meta(entity, "_negotiator_id", negotiator.into());

        let office = property
            .branch_id
            .as_ref()
            .and_then(|branch| self.config.offices.get(branch))
            .or(self.config.primary_office_id.as_ref())
            .cloned()
            .unwrap_or_default();
        self.set(entity, "_office_id", office);
    }

    /// Replace the entity's terms in `taxonomy` with the mapped term of
    /// `value`. Returns whether a mapping was found.
    fn apply_mapping(
        &mut self,
        entity: EntityId,
        taxonomy: &str,
        mapping: &BTreeMap<String, String>,
        value: Option<&str>,
    ) -> bool {
        self.store.clear_terms(entity, taxonomy);
        match value.and_then(|v| mapping.get(v)) {
            Some(term) => {
                self.store.set_terms(entity, taxonomy, vec![term.clone()]);
                true
            }
            None => false,
        }
    }

    fn apply_residential(&mut self, entity: EntityId, property: &FeedProperty) {
        self.set(entity, "_bedrooms", text(&property.bedrooms));
        self.set(entity, "_bathrooms", "");
        self.set(entity, "_reception_rooms", "");

        let config = self.config;
        let mapping = &config.mappings.property_type;
        let property_type = property.property_type.as_deref();
        if !self.apply_mapping(entity, "property_type", mapping, property_type) {
            if let Some(value) = property_type {
                self.log.log(
                    format!("Property received with a type ({}) that is not mapped", value),
                    Some(property.id.as_str()),
                );
            }
        }
    }

    fn apply_sales(&mut self, entity: EntityId, property: &FeedProperty) {
        let price = rounded_price(text(&property.price));
        self.set(entity, "_price", price.clone());
        self.set(entity, "_price_actual", price);
        self.set(entity, "_poa", poa_flag(text(&property.pricetype)));

        let config = self.config;
        let mapping = &config.mappings.price_qualifier;
        self.apply_mapping(entity, "price_qualifier", mapping, property.pricetype.as_deref());
    }

    fn apply_lettings(&mut self, entity: EntityId, property: &FeedProperty) {
        let price = rounded_price(text(&property.price));
        self.set(entity, "_rent", price.clone());
        self.set(entity, "_rent_frequency", "pcm");
        self.set(entity, "_price_actual", price);
        self.set(entity, "_poa", poa_flag(text(&property.pricetype)));
        self.set(entity, "_deposit", "");
        self.set(entity, "_available_date", "");
    }

    fn apply_commercial(&mut self, entity: EntityId, property: &FeedProperty) {
        let price = price_digits(text(&property.price));
        let poa = poa_flag(text(&property.pricetype));

        self.set(entity, "_for_sale", "");
        self.set(entity, "_to_rent", "");

        match text(&property.transaction_type) {
            "1" => {
                self.set(entity, "_for_sale", "yes");
                self.set(entity, "_commercial_price_currency", "GBP");
                self.set(entity, "_price_from", price.clone());
                self.set(entity, "_price_to", price.clone());
                self.set(entity, "_price_units", "");
                self.set(entity, "_price_poa", poa);
            }
            "2" => {
                self.set(entity, "_to_rent", "yes");
                self.set(entity, "_commercial_rent_currency", "GBP");
                self.set(entity, "_rent_from", price.clone());
                self.set(entity, "_rent_to", price.clone());
                self.set(entity, "_rent_units", "pcm");
                self.set(entity, "_rent_poa", poa);
            }
            _ => {}
        }

        // Prices are always GBP, so the sortable price is the price itself
        self.set(entity, "_price_actual", price);

        for key in [
            "_floor_area_from",
            "_floor_area_from_sqft",
            "_floor_area_to",
            "_floor_area_to_sqft",
            "_site_area_from",
            "_site_area_from_sqft",
            "_site_area_to",
            "_site_area_to_sqft",
        ] {
            self.set(entity, key, "");
        }
        self.set(entity, "_floor_area_units", "sqft");
        self.set(entity, "_site_area_units", "sqft");
    }

    fn apply_marketing(&mut self, entity: EntityId, property: &FeedProperty) {
        self.set(entity, "_on_market", "yes");
        self.set(entity, "_featured", "");

        let config = self.config;
        let mapping = &config.mappings.availability;
        self.apply_mapping(entity, "availability", mapping, property.status_name.as_deref());
    }

    fn apply_features(&mut self, entity: EntityId, property: &FeedProperty) {
        let features = property.features();
        self.set(entity, "_features", features.len().to_string());
        for (i, feature) in features.into_iter().enumerate() {
            self.set(entity, &format!("_feature_{}", i), feature);
        }
    }

    fn apply_rooms(&mut self, entity: EntityId, property: &FeedProperty) {
        self.set(entity, "_rooms", "1");
        self.set(entity, "_room_name_0", "");
        self.set(entity, "_room_dimensions_0", "");
        self.set(
            entity,
            "_room_description_0",
            single_line(text(&property.description)),
        );
    }

    async fn apply_media(&mut self, entity: EntityId, property: &FeedProperty) -> MediaStats {
        let reconciler = MediaReconciler::new(self.fetcher, self.config.media.timeout());
        let owner = MediaOwner {
            id: entity,
            reference: &property.id,
        };
        let mut totals = MediaStats::default();

        for category in MediaCategory::ALL {
            let desired = match self.config.asset_type(category) {
                None => property.photo_urls(),
                Some(type_id) => property.asset_urls(type_id),
            };
            let mode = self.config.media.mode(category);

            let outcome = reconciler
                .reconcile(&mut *self.store, owner, category, mode, &desired)
                .await;

            for err in &outcome.errors {
                self.log.error(err.to_string(), Some(property.id.as_str()));
            }

            let line = match mode {
                StorageMode::UrlReference => format!(
                    "Imported {} {} URLs",
                    outcome.assets.len(),
                    category.singular()
                ),
                StorageMode::Download => format!(
                    "Imported {} {} ({} new, {} existing, {} deleted)",
                    outcome.assets.len(),
                    category.plural(),
                    outcome.stats.new,
                    outcome.stats.existing,
                    outcome.stats.deleted
                ),
            };
            self.log.log(line, Some(property.id.as_str()));

            totals.new += outcome.stats.new;
            totals.existing += outcome.stats.existing;
            totals.deleted += outcome.stats.deleted;
        }

        info!(
            "Media for {}: {} new, {} existing, {} deleted",
            property.id, totals.new, totals.existing, totals.deleted
        );
        totals
    }
}
