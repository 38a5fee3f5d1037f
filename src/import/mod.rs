//! Mapping of feed listings onto stored entities

pub mod fields;
pub mod importer;
pub mod log;
pub mod mapping;
mod removal;

pub use importer::{ImportStore, ImportSummary, Importer};
pub use log::{ImportLog, LogEntry, Severity};
pub use mapping::{mapping_values, pre_test, PreTest};

use crate::feeds::FeedSource;

/// Fetch a feed and run a full import against it: import every listing,
/// then retire the ones that left the feed.
///
/// A feed that cannot be fetched or parsed aborts before anything is
/// written.
pub async fn run<S: ImportStore>(
    importer: &mut Importer<'_, S>,
    source: &dyn FeedSource,
) -> crate::error::Result<ImportSummary> {
    let document = source.fetch().await?;
    importer.load(document);

    let mut summary = importer.import().await;
    summary.removed = importer.remove_old_properties().await;
    summary.errors = importer.log().error_count();
    Ok(summary)
}
