//! Rolling multi-month accuracy trend.
//!
//! The per-month pipeline runs once per month of the window, oldest first.
//! Each month contributes long rows (one per grain, unit type and side) which
//! are then pivoted to one column per side.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ForecastConfig;
use crate::engine::reconcile_month;
use crate::error::ReconError;
use crate::metrics::{group_records, safe_ratio, Grain, GrainGroup, Side};
use crate::model::{MonthRowCounts, ReconciledRecord, UnitType};
use crate::month::Month;
use crate::source::SourceLoader;

pub const TREND_METRIC: &str = "midmark_fcast_acc";

/// Grains reported in the trend, in this order.
pub const TREND_GRAINS: [Grain; 4] = [
    Grain::Total,
    Grain::BusinessUnit,
    Grain::ProductFamily,
    Grain::Product,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub month_start: Month,
    pub units: UnitType,
    pub view_level: Grain,
    pub bu_code: String,
    pub bu_name: String,
    pub prod_fam: String,
    pub product: String,
    pub marketing_manager: String,
    pub metric_name: &'static str,
    pub actuals_sum: f64,
    pub model_side: Side,
    /// forecast_sum / actuals_sum; `None` when actuals sum to zero.
    pub metric_value: Option<f64>,
    pub forecast_sum: f64,
    pub abs_error_sum: f64,
}

impl TrendRow {
    /// Columns that must be unique across the long table.
    pub fn grain_key(&self) -> (Month, UnitType, Grain, &str, &str, &str, &str, &str, Side) {
        (
            self.month_start,
            self.units.clone(),
            self.view_level,
            &self.bu_code,
            &self.bu_name,
            &self.prod_fam,
            &self.product,
            &self.marketing_manager,
            self.model_side,
        )
    }
}

/// One pivoted row: both sides of one grain for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendWideRow {
    pub month_start: Month,
    pub units: UnitType,
    pub bu_code: String,
    pub bu_name: String,
    pub prod_fam: String,
    pub product: String,
    pub marketing_manager: String,
    /// Only carried at product grain.
    pub actuals_sum: Option<f64>,
    pub stats_model_acc: Option<f64>,
    pub marketing_acc: Option<f64>,
    pub delta_stats_minus_marketing: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedProduct {
    pub units: UnitType,
    pub product: String,
    pub actuals_sum: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub anchor: Month,
    pub months: Vec<Month>,
    pub source_counts: Vec<MonthRowCounts>,
    pub rows: Vec<TrendRow>,
    pub totals: Vec<TrendWideRow>,
    pub business_units: Vec<TrendWideRow>,
    pub prod_fams: Vec<TrendWideRow>,
    pub top_products: Vec<TrendWideRow>,
    pub ranking: Vec<RankedProduct>,
}

impl TrendReport {
    pub fn window_start(&self) -> Month {
        self.months.first().copied().unwrap_or(self.anchor)
    }

    /// Months that produced at least one trend row.
    pub fn available_months(&self) -> Vec<Month> {
        let mut months: Vec<Month> = self.rows.iter().map(|r| r.month_start).collect();
        months.sort();
        months.dedup();
        months
    }
}

// ---------------------------------------------------------------------------
// Long rows
// ---------------------------------------------------------------------------

/// Long trend rows for one month of reconciled records.
pub fn month_trend_rows(records: &[ReconciledRecord], month: Month) -> Vec<TrendRow> {
    let mut rows = Vec::new();
    for grain in TREND_GRAINS {
        for group in group_records(records, grain) {
            rows.extend(rows_for_group(&group, month));
        }
    }
    rows
}

fn rows_for_group(group: &GrainGroup, month: Month) -> impl Iterator<Item = TrendRow> + '_ {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let key = &group.key;
    let prod_fam = match group.grain {
        Grain::ProductFamily => text(&key.prod_fam),
        Grain::Product => text(&group.first_prod_fam),
        _ => String::new(),
    };
    let (bu_code, bu_name, product, manager) = (
        text(&key.bu_code),
        text(&key.bu_name),
        text(&key.product),
        text(&key.manager),
    );
    Side::ALL.into_iter().map(move |side| TrendRow {
        month_start: month,
        units: group.units.clone(),
        view_level: group.grain,
        bu_code: bu_code.clone(),
        bu_name: bu_name.clone(),
        prod_fam: prod_fam.clone(),
        product: product.clone(),
        marketing_manager: manager.clone(),
        metric_name: TREND_METRIC,
        actuals_sum: group.sums.actuals,
        model_side: side,
        metric_value: safe_ratio(group.sums.forecast(side), group.sums.actuals),
        forecast_sum: group.sums.forecast(side),
        abs_error_sum: group.sums.abs_error(side),
    })
}

// ---------------------------------------------------------------------------
// Pivot
// ---------------------------------------------------------------------------

/// Pivot key; the product-grain actuals sum is held as bits so the key hashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WideKey {
    month_start: Month,
    units: UnitType,
    bu_code: String,
    bu_name: String,
    prod_fam: String,
    product: String,
    marketing_manager: String,
    actuals_bits: Option<u64>,
}

/// Pivot long rows of `grain` to one row per key with both sides as columns.
///
/// The first value per side wins; keys with no value on either side are dropped.
pub fn pivot(rows: &[TrendRow], grain: Grain) -> Vec<TrendWideRow> {
    let mut order: Vec<WideKey> = Vec::new();
    let mut index: HashMap<WideKey, usize> = HashMap::new();
    let mut values: Vec<(Option<f64>, Option<f64>)> = Vec::new();

    for row in rows.iter().filter(|r| r.view_level == grain) {
        let key = WideKey {
            month_start: row.month_start,
            units: row.units.clone(),
            bu_code: row.bu_code.clone(),
            bu_name: row.bu_name.clone(),
            prod_fam: row.prod_fam.clone(),
            product: row.product.clone(),
            marketing_manager: row.marketing_manager.clone(),
            actuals_bits: (grain == Grain::Product).then_some(row.actuals_sum.to_bits()),
        };
        let idx = match index.get(&key) {
            Some(&i) => i,
            None => {
                index.insert(key.clone(), order.len());
                order.push(key);
                values.push((None, None));
                order.len() - 1
            }
        };
        let slot = match row.model_side {
            Side::StatsModel => &mut values[idx].0,
            Side::Marketing => &mut values[idx].1,
        };
        if slot.is_none() {
            *slot = row.metric_value;
        }
    }

    let mut wide: Vec<TrendWideRow> = order
        .into_iter()
        .zip(values)
        .filter(|(_, (s, m))| s.is_some() || m.is_some())
        .map(|(k, (stats, marketing))| TrendWideRow {
            month_start: k.month_start,
            units: k.units,
            bu_code: k.bu_code,
            bu_name: k.bu_name,
            prod_fam: k.prod_fam,
            product: k.product,
            marketing_manager: k.marketing_manager,
            actuals_sum: k.actuals_bits.map(f64::from_bits),
            stats_model_acc: stats,
            marketing_acc: marketing,
            delta_stats_minus_marketing: stats.zip(marketing).map(|(s, m)| s - m),
        })
        .collect();

    wide.sort_by(|a, b| {
        a.month_start
            .cmp(&b.month_start)
            .then_with(|| a.units.cmp(&b.units))
            .then_with(|| a.bu_code.cmp(&b.bu_code))
            .then_with(|| a.bu_name.cmp(&b.bu_name))
            .then_with(|| a.prod_fam.cmp(&b.prod_fam))
            .then_with(|| a.product.cmp(&b.product))
            .then_with(|| a.marketing_manager.cmp(&b.marketing_manager))
    });
    wide
}

// ---------------------------------------------------------------------------
// Top-N
// ---------------------------------------------------------------------------

/// Rank anchor-month products by actuals within each unit type.
///
/// Higher actuals rank first; equal actuals fall back to product text order.
/// Only ranks `1..=top_n` are returned.
pub fn rank_top_products(rows: &[TrendRow], anchor: Month, top_n: usize) -> Vec<RankedProduct> {
    let mut candidates: Vec<(UnitType, String, f64)> = Vec::new();
    for row in rows
        .iter()
        .filter(|r| r.view_level == Grain::Product && r.month_start == anchor)
    {
        let candidate = (row.units.clone(), row.product.clone(), row.actuals_sum);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| b.2.total_cmp(&a.2))
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut ranked = Vec::new();
    let mut per_units: BTreeMap<UnitType, usize> = BTreeMap::new();
    for (units, product, actuals_sum) in candidates {
        let rank = per_units.entry(units.clone()).or_insert(0);
        *rank += 1;
        if *rank <= top_n {
            ranked.push(RankedProduct { units, product, actuals_sum, rank: *rank });
        }
    }
    ranked
}

/// Product-grain wide rows restricted to the anchor month's top products, for every month.
pub fn top_product_rows(rows: &[TrendRow], ranking: &[RankedProduct]) -> Vec<TrendWideRow> {
    let keep: HashSet<(&UnitType, &str)> =
        ranking.iter().map(|r| (&r.units, r.product.as_str())).collect();
    let product_rows: Vec<TrendRow> = rows
        .iter()
        .filter(|r| r.view_level == Grain::Product)
        .filter(|r| keep.contains(&(&r.units, r.product.as_str())))
        .cloned()
        .collect();
    pivot(&product_rows, Grain::Product)
}

// ---------------------------------------------------------------------------
// Window driver
// ---------------------------------------------------------------------------

/// Run the pipeline for every month of the window ending at `anchor`.
///
/// Months missing marketing, stats or actuals rows, or producing no reconciled
/// records, contribute nothing. An entirely empty window is an error.
pub fn run_trend(
    loader: &dyn SourceLoader,
    config: &ForecastConfig,
    anchor: Month,
) -> Result<TrendReport, ReconError> {
    let months = Month::window(anchor, config.trend.window_months)?;
    let mut source_counts = Vec::with_capacity(months.len());
    let mut rows = Vec::new();

    for &month in &months {
        let tables = loader.load(month)?;
        let counts = tables.month_row_counts(month);
        let incomplete =
            counts.marketing_rows == 0 || counts.stats_rows == 0 || counts.actuals_rows == 0;
        source_counts.push(counts);
        if incomplete {
            warn!(month = %month, "skipping month with missing source rows");
            continue;
        }

        let reconciliation = reconcile_month(&tables, month, config);
        if reconciliation.records.is_empty() {
            warn!(month = %month, "skipping month with no reconciled records");
            continue;
        }
        rows.extend(month_trend_rows(&reconciliation.records, month));
    }

    let window_start = months.first().copied().unwrap_or(anchor);
    if rows.is_empty() {
        return Err(ReconError::NoTrendData {
            window_start: window_start.to_string(),
            window_end: anchor.to_string(),
        });
    }

    rows.sort_by(|a, b| {
        a.month_start
            .cmp(&b.month_start)
            .then_with(|| a.units.cmp(&b.units))
            .then_with(|| a.view_level.cmp(&b.view_level))
            .then_with(|| a.bu_code.cmp(&b.bu_code))
            .then_with(|| a.prod_fam.cmp(&b.prod_fam))
            .then_with(|| a.product.cmp(&b.product))
            .then_with(|| a.model_side.cmp(&b.model_side))
    });

    let ranking = rank_top_products(&rows, anchor, config.trend.top_n_products);
    let report = TrendReport {
        anchor,
        totals: pivot(&rows, Grain::Total),
        business_units: pivot(&rows, Grain::BusinessUnit),
        prod_fams: pivot(&rows, Grain::ProductFamily),
        top_products: top_product_rows(&rows, &ranking),
        ranking,
        months,
        source_counts,
        rows,
    };

    info!(
        anchor = %anchor,
        months = report.months.len(),
        available = report.available_months().len(),
        rows = report.rows.len(),
        "built trend report"
    );
    Ok(report)
}
