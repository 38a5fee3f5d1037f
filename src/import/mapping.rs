//! Discovery of the feed values that need a term mapping

use crate::models::FeedProperty;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of a pre-import pass over the feed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreTest {
    pub passed: usize,
    pub failed: usize,
    /// Field name to the distinct feed values seen for it
    pub mappings: BTreeMap<&'static str, BTreeSet<String>>,
}

/// Count importable listings and collect the values each mapped field takes
pub fn pre_test(properties: &[FeedProperty]) -> PreTest {
    let mut result = PreTest::default();

    for property in properties {
        // Anything that made it through parsing is importable
        result.passed += 1;

        let fields = [
            ("availability", &property.status_name),
            ("property_type", &property.property_type),
            ("price_qualifier", &property.pricetype),
            ("office", &property.branch_id),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                result
                    .mappings
                    .entry(name)
                    .or_default()
                    .insert(value.clone());
            }
        }
    }

    result
}

/// Fixed options offered for a mapped field, keyed by feed value
pub fn mapping_values(field: &str) -> Option<BTreeMap<&'static str, &'static str>> {
    let values: &[&'static str] = match field {
        "property_type" => &["Flat", "House", "Bungalow", "Plot"],
        "price_qualifier" => &["Fixed Price", "Guide Price", "Offers Over", "Around"],
        _ => return None,
    };
    Some(values.iter().map(|v| (*v, *v)).collect())
}
