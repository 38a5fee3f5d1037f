use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media attached to a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Photo,
    Floorplan,
    Brochure,
    Epc,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 4] = [
        MediaCategory::Photo,
        MediaCategory::Floorplan,
        MediaCategory::Brochure,
        MediaCategory::Epc,
    ];

    /// Entity metadata key holding downloaded asset ids
    pub fn assets_key(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "_photos",
            MediaCategory::Floorplan => "_floorplans",
            MediaCategory::Brochure => "_brochures",
            MediaCategory::Epc => "_epcs",
        }
    }

    /// Entity metadata key holding bare URLs in URL reference mode
    pub fn urls_key(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "_photo_urls",
            MediaCategory::Floorplan => "_floorplan_urls",
            MediaCategory::Brochure => "_brochure_urls",
            MediaCategory::Epc => "_epc_urls",
        }
    }

    /// Plural label used in import log lines
    pub fn plural(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "photos",
            MediaCategory::Floorplan => "floorplans",
            MediaCategory::Brochure => "brochures",
            MediaCategory::Epc => "EPCs",
        }
    }

    /// Singular label used in import log lines
    pub fn singular(&self) -> &'static str {
        match self {
            MediaCategory::Photo => "photo",
            MediaCategory::Floorplan => "floorplan",
            MediaCategory::Brochure => "brochure",
            MediaCategory::Epc => "EPC",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.singular())
    }
}

/// How assets of a category are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Download each asset into the content store
    #[default]
    Download,
    /// Keep the remote URLs only
    UrlReference,
}
