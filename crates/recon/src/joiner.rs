use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::CaseworkRule;
use crate::model::{
    ExpandedCatalogRow, JoinOutput, MappedMarketingRow, MarketingForecastRow, SkippedRecord,
    UnitType, SKIP_REASON_NOT_IN_CATALOG,
};
use crate::month::Month;
use crate::normalize::{finite_or_zero, normalize_key};

/// Marketing rows for `month` whose geography matches `geography`.
pub fn filter_marketing<'a>(
    marketing: &'a [MarketingForecastRow],
    month: Month,
    geography: &str,
) -> Vec<&'a MarketingForecastRow> {
    let wanted = normalize_key(Some(geography));
    marketing
        .iter()
        .filter(|r| r.date.map(|d| month.contains(d)).unwrap_or(false))
        .filter(|r| normalize_key(r.geography.as_deref()) == wanted)
        .collect()
}

/// Join one month of marketing rows to the expanded catalog.
///
/// Inner join on (product key, BU key). The casework rule then narrows matches
/// for the sentinel product by location. Rows with no catalog key at all are
/// returned as skipped, sorted by BU then product.
pub fn join_marketing(
    marketing: &[MarketingForecastRow],
    expanded: &[ExpandedCatalogRow],
    month: Month,
    geography: &str,
    casework: &CaseworkRule,
) -> JoinOutput {
    let filtered = filter_marketing(marketing, month, geography);

    let mut index: HashMap<(&str, &str), Vec<&ExpandedCatalogRow>> = HashMap::new();
    for row in expanded {
        index
            .entry((row.product_key.as_str(), row.bu_key.as_str()))
            .or_default()
            .push(row);
    }

    let casework_bu = normalize_key(Some(&casework.division));
    let casework_product = normalize_key(Some(&casework.sentinel));
    let casework_locations: HashMap<String, String> = casework
        .locations
        .iter()
        .map(|(loc, family)| (normalize_key(Some(loc)), normalize_key(Some(family))))
        .collect();

    let mut mapped = Vec::new();
    let mut skipped = Vec::new();
    let mut casework_dropped = 0usize;

    for row in filtered {
        let product_key = normalize_key(row.product.as_deref());
        let bu_key = normalize_key(row.bu.as_deref());

        let Some(matches) = index.get(&(product_key.as_str(), bu_key.as_str())) else {
            skipped.push(SkippedRecord {
                bu: row.bu.clone(),
                product: row.product.clone(),
                date: row.date,
                reason: SKIP_REASON_NOT_IN_CATALOG.to_string(),
            });
            continue;
        };

        let casework_family = if bu_key == casework_bu && product_key == casework_product {
            casework_locations.get(&normalize_key(row.location.as_deref()))
        } else {
            None
        };

        for catalog in matches {
            if let Some(family) = casework_family {
                if normalize_key(catalog.entry.group_key.as_deref()) != *family {
                    casework_dropped += 1;
                    continue;
                }
            }
            mapped.push(map_row(row, catalog));
        }
    }

    skipped.sort_by(|a, b| {
        cmp_nulls_last(&a.bu, &b.bu).then_with(|| cmp_nulls_last(&a.product, &b.product))
    });

    info!(
        month = %month,
        mapped = mapped.len(),
        skipped = skipped.len(),
        casework_dropped,
        "joined marketing to catalog"
    );
    if !skipped.is_empty() {
        warn!(count = skipped.len(), "marketing rows not in product catalog master");
    }

    JoinOutput { mapped, skipped }
}

fn map_row(row: &MarketingForecastRow, catalog: &ExpandedCatalogRow) -> MappedMarketingRow {
    let entry = &catalog.entry;
    let units = UnitType::from_feature_mode(entry.salesforce_feature_mode.as_deref());
    let value = match units {
        UnitType::Quantity => row.forecast_quantity,
        _ => row.forecast_dollars,
    };
    MappedMarketingRow {
        bu: row.bu.clone(),
        location: row.location.clone(),
        product: row.product.clone(),
        date: row.date,
        group_key: entry.group_key.clone(),
        business_unit_code: entry.business_unit_code.clone(),
        business_unit_name: entry.business_unit_name.clone(),
        product_family: entry.product_family.clone(),
        marketing_manager: entry.marketing_manager.clone(),
        units,
        marketing_fcast: finite_or_zero(value),
    }
}

/// Missing values sort after every present value.
pub(crate) fn cmp_nulls_last(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::catalog::expand_catalog;
    use crate::model::ProductCatalogEntry;

    fn march() -> Month {
        Month::new(2024, 3).unwrap()
    }

    fn mkt(bu: &str, location: &str, product: &str, qty: f64, dollars: f64) -> MarketingForecastRow {
        MarketingForecastRow {
            bu: Some(bu.into()),
            location: Some(location.into()),
            geography: Some("Americas".into()),
            product: Some(product.into()),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            forecast_quantity: qty,
            forecast_dollars: dollars,
            ..Default::default()
        }
    }

    fn cat(group: &str, bu: &str, skus: &str, mode: &str) -> ProductCatalogEntry {
        ProductCatalogEntry {
            group_key: Some(group.into()),
            business_unit_code: Some(bu.into()),
            business_unit_name: Some(format!("{bu} Unit")),
            sku_list: Some(skus.into()),
            product_family: Some(format!("{group} family")),
            marketing_manager: Some("Pat".into()),
            salesforce_feature_mode: Some(mode.into()),
        }
    }

    #[test]
    fn joins_on_normalized_keys_and_picks_unit_column() {
        let expanded = expand_catalog(&[
            cat("FAM1", "D100", "WIDGET-A", "Quantity"),
            cat("FAM2", "D100", "GADGET-B", "dollars"),
        ]);
        let marketing = vec![
            mkt(" d100", "LOC1", "widget-a ", 100.0, 5000.0),
            mkt("D100", "LOC1", "GADGET-B", 7.0, 900.0),
        ];
        let out = join_marketing(&marketing, &expanded, march(), "AMERICAS", &CaseworkRule::default());
        assert_eq!(out.mapped.len(), 2);
        assert!(out.skipped.is_empty());
        assert_eq!(out.mapped[0].units, UnitType::Quantity);
        assert_eq!(out.mapped[0].marketing_fcast, 100.0);
        assert_eq!(out.mapped[1].units, UnitType::Dollars);
        assert_eq!(out.mapped[1].marketing_fcast, 900.0);
    }

    #[test]
    fn filters_month_and_geography() {
        let expanded = expand_catalog(&[cat("FAM1", "D100", "WIDGET-A", "Quantity")]);
        let mut other_month = mkt("D100", "LOC1", "WIDGET-A", 1.0, 0.0);
        other_month.date = NaiveDate::from_ymd_opt(2024, 4, 1);
        let mut emea = mkt("D100", "LOC1", "WIDGET-A", 1.0, 0.0);
        emea.geography = Some("EMEA".into());
        let mut no_geo = mkt("D100", "LOC1", "WIDGET-A", 1.0, 0.0);
        no_geo.geography = None;
        let marketing = vec![other_month, emea, no_geo, mkt("D100", "LOC1", "WIDGET-A", 3.0, 0.0)];

        let out = join_marketing(&marketing, &expanded, march(), "AMERICAS", &CaseworkRule::default());
        assert_eq!(out.mapped.len(), 1);
        assert_eq!(out.mapped[0].marketing_fcast, 3.0);
    }

    #[test]
    fn unmatched_rows_are_skipped_and_sorted() {
        let expanded = expand_catalog(&[cat("FAM1", "D100", "WIDGET-A", "Quantity")]);
        let marketing = vec![
            mkt("D300", "LOC1", "ZED", 1.0, 0.0),
            mkt("D100", "LOC1", "WIDGET-A", 1.0, 0.0),
            mkt("D200", "LOC1", "BETA", 1.0, 0.0),
            mkt("D200", "LOC1", "ALPHA", 1.0, 0.0),
        ];
        let out = join_marketing(&marketing, &expanded, march(), "AMERICAS", &CaseworkRule::default());
        let skipped: Vec<_> = out
            .skipped
            .iter()
            .map(|s| (s.bu.as_deref().unwrap(), s.product.as_deref().unwrap()))
            .collect();
        assert_eq!(skipped, vec![("D200", "ALPHA"), ("D200", "BETA"), ("D300", "ZED")]);
        assert!(out.skipped.iter().all(|s| s.reason == SKIP_REASON_NOT_IN_CATALOG));
    }

    #[test]
    fn casework_location_selects_one_family() {
        let expanded = expand_catalog(&[
            cat("ARTISAN CASEWORK", "D200", "TOTAL CASEWORK", "dollars"),
            cat("Synthesis Casework", "D200", "TOTAL CASEWORK", "dollars"),
            cat("OTHER", "D200", "OTHER-SKU", "dollars"),
        ]);
        let marketing = vec![
            mkt("D200", "LOC1020", "Total Casework", 0.0, 10.0),
            mkt("D200", "loc1080", "TOTAL CASEWORK", 0.0, 20.0),
        ];
        let out = join_marketing(&marketing, &expanded, march(), "AMERICAS", &CaseworkRule::default());
        assert_eq!(out.mapped.len(), 2);
        assert_eq!(out.mapped[0].group_key.as_deref(), Some("ARTISAN CASEWORK"));
        assert_eq!(out.mapped[0].marketing_fcast, 10.0);
        assert_eq!(out.mapped[1].group_key.as_deref(), Some("Synthesis Casework"));
        assert_eq!(out.mapped[1].marketing_fcast, 20.0);
    }

    #[test]
    fn casework_rule_ignores_other_locations() {
        let expanded = expand_catalog(&[
            cat("ARTISAN CASEWORK", "D200", "TOTAL CASEWORK", "dollars"),
            cat("SYNTHESIS CASEWORK", "D200", "TOTAL CASEWORK", "dollars"),
        ]);
        let marketing = vec![mkt("D200", "LOC5555", "TOTAL CASEWORK", 0.0, 10.0)];
        let out = join_marketing(&marketing, &expanded, march(), "AMERICAS", &CaseworkRule::default());
        // Outside the rule the sentinel fans out to every family sharing the key.
        assert_eq!(out.mapped.len(), 2);
    }
}
