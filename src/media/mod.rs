//! Media import: photos, floorplans, brochures and EPCs

pub mod category;
pub mod fetch;
pub mod reconcile;
pub mod url;

pub use category::{MediaCategory, StorageMode};
pub use fetch::{HttpFetcher, MediaFetcher};
pub use reconcile::{AssetSet, MediaOwner, MediaReconciler, MediaStats, ReconcileOutcome, ORIGIN_URL_KEY};
