pub mod de;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Number of free-form `feature_N` fields a listing can carry
pub const MAX_FEATURES: usize = 10;

/// Top level SSPC feed document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedDocument {
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub property: Vec<FeedProperty>,
}

/// One photo entry of a listing gallery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryItem {
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub gallery_photo: Option<String>,
}

/// One document entry of a listing (floorplan, brochure, EPC, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedAsset {
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub type_id: Option<String>,
}

/// A listing as published in the SSPC feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedProperty {
    /// Feed assigned reference, stable across imports
    #[serde(deserialize_with = "de::required_string")]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub postcode: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub longitude: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub property_category: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub transaction_type: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub bedrooms: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub property_type: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub pricetype: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub status_name: Option<String>,
    #[serde(rename = "branchID", default, deserialize_with = "de::lenient_string")]
    pub branch_id: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_empty")]
    pub gallery: Vec<GalleryItem>,
    #[serde(default, deserialize_with = "de::asset_items")]
    pub assets: Vec<FeedAsset>,
    /// Everything else, including `feature_1`..`feature_10`
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Read an optional feed field as text, absent meaning empty
pub fn text(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("")
}

impl FeedProperty {
    /// Gallery photo URLs in feed order
    pub fn photo_urls(&self) -> Vec<String> {
        self.gallery
            .iter()
            .filter_map(|g| g.gallery_photo.clone())
            .collect()
    }

    /// Non-blank asset URLs of the given asset type, in item order
    pub fn asset_urls(&self, type_id: &str) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| a.type_id.as_deref() == Some(type_id))
            .filter_map(|a| a.url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Non-blank `feature_N` values, trimmed
    pub fn features(&self) -> Vec<String> {
        (1..=MAX_FEATURES)
            .filter_map(|i| match self.extra.get(&format!("feature_{}", i)) {
                Some(Value::String(s)) => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// Latitude and longitude as stored on a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: String,
    pub longitude: String,
}
