//! Import configuration loaded from TOML

use crate::error::{Error, Result};
use crate::media::{MediaCategory, StorageMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What happens to the media of listings that left the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveAction {
    /// Only take the listing off the market
    #[default]
    #[serde(alias = "")]
    None,
    RemoveAllMedia,
    RemoveAllMediaExceptFirstImage,
}

/// Feed asset `type_id` values per media category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTypes {
    pub floorplan: String,
    pub brochure: String,
    pub epc: String,
}

impl Default for AssetTypes {
    fn default() -> Self {
        Self {
            floorplan: "2".to_string(),
            brochure: "4".to_string(),
            epc: "5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
    pub asset_types: AssetTypes,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 120,
            asset_types: AssetTypes::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub timeout_secs: u64,
    pub photos: StorageMode,
    pub floorplans: StorageMode,
    pub brochures: StorageMode,
    pub epcs: StorageMode,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            photos: StorageMode::Download,
            floorplans: StorageMode::Download,
            brochures: StorageMode::Download,
            epcs: StorageMode::Download,
        }
    }
}

impl MediaConfig {
    pub fn mode(&self, category: MediaCategory) -> StorageMode {
        match category {
            MediaCategory::Photo => self.photos,
            MediaCategory::Floorplan => self.floorplans,
            MediaCategory::Brochure => self.brochures,
            MediaCategory::Epc => self.epcs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sspc_store"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    pub base_url: String,
    /// Pause after the service answers with a non-OK status
    pub error_pause_secs: u64,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            error_pause_secs: 3,
        }
    }
}

/// Feed value to term id maps, one per taxonomy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mappings {
    pub property_type: BTreeMap<String, String>,
    pub price_qualifier: BTreeMap<String, String>,
    pub availability: BTreeMap<String, String>,
}

/// Full configuration of one import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Distinguishes the reference key when several imports share a store
    pub import_id: Option<String>,
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub media: MediaConfig,
    /// Pause after every `chunk_qty` properties
    pub chunk_qty: Option<usize>,
    /// Length of that pause, in seconds
    pub chunk_delay: Option<u64>,
    pub dont_remove: bool,
    pub remove_action: RemoveAction,
    pub mappings: Mappings,
    /// Feed branch id to office id
    pub offices: BTreeMap<String, String>,
    pub primary_office_id: Option<String>,
    pub negotiator_id: Option<String>,
    pub google_maps_api_key: Option<String>,
    pub geocode: GeocodeConfig,
    /// Where to write the run's import log as JSON
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_qty == Some(0) {
            return Err(Error::Config("chunk_qty must be greater than zero".to_string()));
        }
        if let Some(url) = &self.feed.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!("feed.url is not an http(s) URL: {}", url)));
            }
        }
        Ok(())
    }

    /// Entity metadata key holding the feed reference
    pub fn imported_ref_key(&self) -> String {
        match self.import_id.as_deref() {
            Some(id) if !id.is_empty() => format!("_imported_ref_{}", id),
            _ => "_imported_ref".to_string(),
        }
    }

    /// Feed asset type of a non-photo media category
    pub fn asset_type(&self, category: MediaCategory) -> Option<&str> {
        let types = &self.feed.asset_types;
        match category {
            MediaCategory::Photo => None,
            MediaCategory::Floorplan => Some(types.floorplan.as_str()),
            MediaCategory::Brochure => Some(types.brochure.as_str()),
            MediaCategory::Epc => Some(types.epc.as_str()),
        }
    }

    /// Pause to apply after the given 1-based property row, if any
    pub fn chunk_pause(&self, row: usize) -> Option<Duration> {
        match (self.chunk_qty, self.chunk_delay) {
            (Some(qty), Some(delay)) if qty > 0 && row % qty == 0 => {
                Some(Duration::from_secs(delay))
            }
            _ => None,
        }
    }

    /// Whether stale listings are taken off the market
    pub fn removes_stale(&self) -> bool {
        !self.dont_remove
    }
}
