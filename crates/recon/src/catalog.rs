use std::collections::BTreeMap;

use tracing::warn;

use crate::model::{AmbiguousMapping, ExpandedCatalogRow, ProductCatalogEntry};
use crate::normalize::normalize_key;

pub const SKU_DELIMITER: char = '|';

/// Business-unit literal remapped to the casework division before use.
const DIVISION_LITERAL: &str = "Division";
const DIVISION_CODE: &str = "D200";

/// Replace any business-unit code or name equal to `Division` with `D200`.
pub fn apply_division_remap(entries: &mut [ProductCatalogEntry]) {
    for entry in entries.iter_mut() {
        for field in [&mut entry.business_unit_code, &mut entry.business_unit_name] {
            if field.as_deref() == Some(DIVISION_LITERAL) {
                *field = Some(DIVISION_CODE.to_string());
            }
        }
    }
}

/// One output row per pipe-separated SKU token, trimmed.
///
/// An absent list yields a single row with an empty SKU so row counts stay
/// comparable with the input.
pub fn expand_catalog(entries: &[ProductCatalogEntry]) -> Vec<ExpandedCatalogRow> {
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let bu_key = normalize_key(entry.business_unit_code.as_deref());
        let list = entry.sku_list.as_deref().unwrap_or("");
        for token in list.split(SKU_DELIMITER) {
            let sku = token.trim().to_string();
            rows.push(ExpandedCatalogRow {
                entry: entry.clone(),
                product_key: normalize_key(Some(&sku)),
                bu_key: bu_key.clone(),
                sku,
            });
        }
    }
    rows
}

/// Every (SKU, BU) pair mapped by more than one catalog entry, sorted by key.
pub fn find_ambiguous_mappings(expanded: &[ExpandedCatalogRow]) -> Vec<AmbiguousMapping> {
    let mut by_key: BTreeMap<(&str, &str), Vec<Option<String>>> = BTreeMap::new();
    for row in expanded {
        by_key
            .entry((row.product_key.as_str(), row.bu_key.as_str()))
            .or_default()
            .push(row.entry.group_key.clone());
    }

    let ambiguous: Vec<AmbiguousMapping> = by_key
        .into_iter()
        .filter(|(_, groups)| groups.len() > 1)
        .map(|((product_key, bu_key), group_keys)| AmbiguousMapping {
            product_key: product_key.to_string(),
            bu_key: bu_key.to_string(),
            group_keys,
        })
        .collect();

    if !ambiguous.is_empty() {
        warn!(count = ambiguous.len(), "catalog maps some (sku, bu) pairs to multiple families");
    }
    ambiguous
}
