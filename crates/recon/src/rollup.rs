use std::collections::{BTreeMap, HashMap};

use tracing::info;

use crate::model::{
    ActualsRollupRow, ActualsRow, MappedMarketingRow, MarketingRollupRow, ReconciledRecord,
    StatsModelForecastRow, StatsRollupRow, UnitType,
};
use crate::month::Month;
use crate::normalize::{finite_or_zero, normalize_key};

/// Model type label of the preferred statistical forecast.
pub const BLEND_MODEL: &str = "BLEND";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MarketingGroup {
    group_key: Option<String>,
    business_unit_code: Option<String>,
    business_unit_name: Option<String>,
    product_family: Option<String>,
    marketing_manager: Option<String>,
    units: UnitType,
}

/// Sum mapped marketing forecasts per (family, BU, BU name, family label, manager, units).
///
/// Missing grouping values form their own group rather than being dropped.
pub fn rollup_marketing(mapped: &[MappedMarketingRow]) -> Vec<MarketingRollupRow> {
    let mut groups: BTreeMap<MarketingGroup, f64> = BTreeMap::new();
    for row in mapped {
        let key = MarketingGroup {
            group_key: row.group_key.clone(),
            business_unit_code: row.business_unit_code.clone(),
            business_unit_name: row.business_unit_name.clone(),
            product_family: row.product_family.clone(),
            marketing_manager: row.marketing_manager.clone(),
            units: row.units.clone(),
        };
        *groups.entry(key).or_insert(0.0) += row.marketing_fcast;
    }

    groups
        .into_iter()
        .map(|(key, marketing_fcast)| MarketingRollupRow {
            product_key: normalize_key(key.group_key.as_deref()),
            bu_key: normalize_key(key.business_unit_code.as_deref()),
            group_key: key.group_key,
            business_unit_code: key.business_unit_code,
            business_unit_name: key.business_unit_name,
            product_family: key.product_family,
            marketing_manager: key.marketing_manager,
            units: key.units,
            marketing_fcast: finite_or_zero(marketing_fcast),
        })
        .collect()
}

/// Sum actuals for `month` per normalized (product, division).
pub fn rollup_actuals(actuals: &[ActualsRow], month: Month) -> Vec<ActualsRollupRow> {
    let mut groups: BTreeMap<(String, String), f64> = BTreeMap::new();
    for row in actuals {
        if !row.month.map(|d| month.contains(d)).unwrap_or(false) {
            continue;
        }
        let key = (
            normalize_key(row.product.as_deref()),
            normalize_key(row.division.as_deref()),
        );
        *groups.entry(key).or_insert(0.0) += row.actuals;
    }

    groups
        .into_iter()
        .map(|((product_key, bu_key), actuals)| ActualsRollupRow {
            product_key,
            bu_key,
            actuals: finite_or_zero(actuals),
        })
        .collect()
}

/// Statistical forecast for `month` per normalized (product, BU).
///
/// Blend rows and recommended rows are summed separately. A key with any blend
/// row takes the blend sum; otherwise it takes the recommended sum. A row can
/// count towards both subsets, but the two sums are never added together.
pub fn rollup_stats(stats: &[StatsModelForecastRow], month: Month) -> Vec<StatsRollupRow> {
    let mut groups: BTreeMap<(String, String), (Option<f64>, Option<f64>)> = BTreeMap::new();
    for row in stats {
        if !row.forecast_month.map(|d| month.contains(d)).unwrap_or(false) {
            continue;
        }
        let is_blend = normalize_key(row.model_type.as_deref()) == BLEND_MODEL;
        if !is_blend && !row.recommended_model {
            continue;
        }
        let key = (
            normalize_key(row.product_id.as_deref()),
            normalize_key(row.bu_id.as_deref()),
        );
        let (blend, fallback) = groups.entry(key).or_insert((None, None));
        if is_blend {
            *blend = Some(blend.unwrap_or(0.0) + row.forecast_value);
        }
        if row.recommended_model {
            *fallback = Some(fallback.unwrap_or(0.0) + row.forecast_value);
        }
    }

    groups
        .into_iter()
        .map(|((product_key, bu_key), (blend, fallback))| StatsRollupRow {
            product_key,
            bu_key,
            forecast_value: finite_or_zero(blend.or(fallback).unwrap_or(0.0)),
            blend,
            fallback,
        })
        .collect()
}

/// Left-join actuals and stats onto the marketing rollup.
///
/// A marketing key with no actuals or stats row gets 0 for that side, so its
/// absolute error is computed against 0 and its ratios see a zero denominator.
pub fn join_rollups(
    month: Month,
    marketing: &[MarketingRollupRow],
    actuals: &[ActualsRollupRow],
    stats: &[StatsRollupRow],
) -> Vec<ReconciledRecord> {
    let actuals_by_key: HashMap<(&str, &str), f64> = actuals
        .iter()
        .map(|r| ((r.product_key.as_str(), r.bu_key.as_str()), r.actuals))
        .collect();
    let stats_by_key: HashMap<(&str, &str), f64> = stats
        .iter()
        .map(|r| ((r.product_key.as_str(), r.bu_key.as_str()), r.forecast_value))
        .collect();

    let mut unmatched_actuals = 0usize;
    let records: Vec<ReconciledRecord> = marketing
        .iter()
        .map(|m| {
            let key = (m.product_key.as_str(), m.bu_key.as_str());
            let actual = match actuals_by_key.get(&key) {
                Some(v) => *v,
                None => {
                    unmatched_actuals += 1;
                    0.0
                }
            };
            let stats_fcast = stats_by_key.get(&key).copied().unwrap_or(0.0);
            ReconciledRecord {
                product: m.group_key.clone(),
                division: m.business_unit_code.clone(),
                month,
                prod_fam: m.product_family.clone(),
                units: m.units.clone(),
                actuals: actual,
                stats_fcast,
                marketing_fcast: m.marketing_fcast,
                stats_abs_error: (actual - stats_fcast).abs(),
                marketing_abs_error: (actual - m.marketing_fcast).abs(),
                bu_name: m.business_unit_name.clone(),
                marketing_manager: m.marketing_manager.clone(),
            }
        })
        .collect();

    info!(
        month = %month,
        records = records.len(),
        unmatched_actuals,
        "reconciled rollups"
    );
    records
}
