//! Lenient deserializers for feed scalars.
//!
//! The feed mixes JSON strings and numbers for the same field across
//! listings, so scalar fields are read into strings whatever their JSON type.

use super::FeedAsset;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Highest `itemN` key read from an `assets` object
pub const MAX_ASSET_ITEMS: usize = 50;

fn scalar_to_string<E: de::Error>(value: Value) -> Result<Option<String>, E> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(true) => Ok(Some("1".to_string())),
        Value::Bool(false) => Ok(Some(String::new())),
        other => Err(E::custom(format!("expected a scalar, found {}", other))),
    }
}

pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_string(Value::deserialize(deserializer)?)
}

pub fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_string(Value::deserialize(deserializer)?)?
        .ok_or_else(|| de::Error::custom("missing value"))
}

/// `null` or absent reads as an empty list
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Asset items keyed `item1`..`item50`, returned in key order.
/// A plain array is accepted too.
pub fn asset_items<'de, D>(deserializer: D) -> Result<Vec<FeedAsset>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<Value> = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().take(MAX_ASSET_ITEMS).collect(),
        Value::Object(map) => {
            let mut numbered: Vec<(usize, Value)> = map
                .into_iter()
                .filter_map(|(key, value)| {
                    let n = key.strip_prefix("item")?.parse::<usize>().ok()?;
                    (1..=MAX_ASSET_ITEMS).contains(&n).then_some((n, value))
                })
                .collect();
            numbered.sort_by_key(|(n, _)| *n);
            numbered.into_iter().map(|(_, v)| v).collect()
        }
        other => return Err(de::Error::custom(format!("unexpected assets value: {}", other))),
    };

    items
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(de::Error::custom))
        .collect()
}
