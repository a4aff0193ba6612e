use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::{DashboardRow, Dashboards, Grain, GrainKey, MetricKind, Side};
use crate::model::UnitType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Both,
    SourceOnly,
    BaselineOnly,
}

/// One dashboard row present in either or both runs.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub units: UnitType,
    pub grain: Grain,
    pub key: GrainKey,
    pub metric: MetricKind,
    pub source_stats: Option<f64>,
    pub source_marketing: Option<f64>,
    pub baseline_stats: Option<f64>,
    pub baseline_marketing: Option<f64>,
    pub stats_delta: Option<f64>,
    pub marketing_delta: Option<f64>,
    pub presence: Presence,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSheet {
    pub name: &'static str,
    pub rows: Vec<ComparisonRow>,
}

type RowKey = (UnitType, Grain, GrainKey, MetricKind);

fn row_key(r: &DashboardRow) -> RowKey {
    (r.units.clone(), r.grain, r.key.clone(), r.metric)
}

/// Outer-join two runs' dashboards view by view on their key columns.
///
/// Deltas are source minus baseline and only exist where both values do.
pub fn compare_dashboards(source: &Dashboards, baseline: &Dashboards) -> Vec<ComparisonSheet> {
    source
        .views()
        .into_iter()
        .zip(baseline.views())
        .map(|((name, left), (_, right))| ComparisonSheet {
            name,
            rows: compare_rows(left, right),
        })
        .collect()
}

fn compare_rows(source: &[DashboardRow], baseline: &[DashboardRow]) -> Vec<ComparisonRow> {
    let mut joined: BTreeMap<RowKey, (Option<&DashboardRow>, Option<&DashboardRow>)> =
        BTreeMap::new();
    for r in source {
        let slot = joined.entry(row_key(r)).or_default();
        if slot.0.is_none() {
            slot.0 = Some(r);
        }
    }
    for r in baseline {
        let slot = joined.entry(row_key(r)).or_default();
        if slot.1.is_none() {
            slot.1 = Some(r);
        }
    }

    joined
        .into_iter()
        .map(|((units, grain, key, metric), (left, right))| {
            let value = |row: Option<&DashboardRow>, side: Side| row.and_then(|r| r.value(side));
            let delta = |side: Side| {
                value(left, side)
                    .zip(value(right, side))
                    .map(|(a, b)| a - b)
            };
            let presence = match (left.is_some(), right.is_some()) {
                (true, false) => Presence::SourceOnly,
                (false, true) => Presence::BaselineOnly,
                _ => Presence::Both,
            };
            ComparisonRow {
                units,
                grain,
                key,
                metric,
                source_stats: value(left, Side::StatsModel),
                source_marketing: value(left, Side::Marketing),
                baseline_stats: value(right, Side::StatsModel),
                baseline_marketing: value(right, Side::Marketing),
                stats_delta: delta(Side::StatsModel),
                marketing_delta: delta(Side::Marketing),
                presence,
            }
        })
        .collect()
}
