//! Accuracy-ratio and WAPE dashboards over reconciled records.
//!
//! Five views, one per grain: totals (per BU plus an all-BU total), product
//! family (accuracy and WAPE as separate views), marketing manager and
//! product. Only the `quantity` and `dollars` unit types are reported.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{ReconciledRecord, UnitType};

pub const TOTAL_BU_CODE: &str = "ALL";
pub const TOTAL_BU_NAME: &str = "Total";

/// BU codes listed first on every dashboard, in this order.
const PREFERRED_BU_ORDER: [&str; 3] = ["D100", "D200", "D300"];

/// `numerator / denominator`, or `None` when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

// ---------------------------------------------------------------------------
// Metric kinds, sides, winners
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricKind {
    /// forecast / actuals; best when closest to 1.
    Accuracy,
    /// abs error / actuals; lower is better.
    Wape,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Accuracy => "Midmark Fcast Acc.",
            Self::Wape => "WAPE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Side {
    StatsModel,
    Marketing,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::StatsModel, Side::Marketing];

    pub fn label(self) -> &'static str {
        match self {
            Self::StatsModel => "Stats Model",
            Self::Marketing => "Marketing",
        }
    }

    /// Machine-readable name used in trend data.
    pub fn key(self) -> &'static str {
        match self {
            Self::StatsModel => "stats_model",
            Self::Marketing => "marketing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Winner {
    StatsModel,
    Marketing,
    /// Both values present and exactly equal (or equally distant from 1).
    Tie,
    /// At least one value missing or NaN.
    Undetermined,
}

impl Winner {
    pub fn label(self) -> &'static str {
        match self {
            Self::StatsModel => Side::StatsModel.label(),
            Self::Marketing => Side::Marketing.label(),
            Self::Tie => "Tie",
            Self::Undetermined => "",
        }
    }

    /// Sort rank on the dashboards: stats wins first, then marketing, then the rest.
    pub fn rank(self) -> u8 {
        match self {
            Self::StatsModel => 0,
            Self::Marketing => 1,
            Self::Tie | Self::Undetermined => 2,
        }
    }

    /// Side whose cell gets highlighted, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Self::StatsModel => Some(Side::StatsModel),
            Self::Marketing => Some(Side::Marketing),
            Self::Tie | Self::Undetermined => None,
        }
    }
}

/// Compare the two sides of one metric. Equality is exact, with no tolerance.
pub fn pick_winner(kind: MetricKind, stats: Option<f64>, marketing: Option<f64>) -> Winner {
    let (Some(stats), Some(marketing)) = (stats, marketing) else {
        return Winner::Undetermined;
    };
    if stats.is_nan() || marketing.is_nan() {
        return Winner::Undetermined;
    }
    if stats == marketing {
        return Winner::Tie;
    }
    match kind {
        MetricKind::Wape => {
            if stats < marketing {
                Winner::StatsModel
            } else {
                Winner::Marketing
            }
        }
        MetricKind::Accuracy => {
            let stats_diff = (stats - 1.0).abs();
            let marketing_diff = (marketing - 1.0).abs();
            if stats_diff == marketing_diff {
                Winner::Tie
            } else if stats_diff < marketing_diff {
                Winner::StatsModel
            } else {
                Winner::Marketing
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Grain grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Grain {
    Total,
    BusinessUnit,
    ProductFamily,
    Manager,
    Product,
}

impl Grain {
    /// `view_level` text in trend data.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total",
            Self::BusinessUnit => "bu",
            Self::ProductFamily => "prod_fam",
            Self::Manager => "manager",
            Self::Product => "product",
        }
    }
}

/// Grouping values of one grain; fields outside the grain stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GrainKey {
    pub bu_code: Option<String>,
    pub bu_name: Option<String>,
    pub prod_fam: Option<String>,
    pub product: Option<String>,
    pub manager: Option<String>,
}

impl GrainKey {
    fn of(grain: Grain, r: &ReconciledRecord) -> Self {
        let bu = || (r.division.clone(), r.bu_name.clone());
        match grain {
            Grain::Total => Self {
                bu_code: Some(TOTAL_BU_CODE.into()),
                bu_name: Some(TOTAL_BU_NAME.into()),
                ..Self::default()
            },
            Grain::BusinessUnit => {
                let (bu_code, bu_name) = bu();
                Self { bu_code, bu_name, ..Self::default() }
            }
            Grain::ProductFamily => {
                let (bu_code, bu_name) = bu();
                Self { bu_code, bu_name, prod_fam: r.prod_fam.clone(), ..Self::default() }
            }
            Grain::Manager => {
                let (bu_code, bu_name) = bu();
                Self { bu_code, bu_name, manager: r.marketing_manager.clone(), ..Self::default() }
            }
            Grain::Product => {
                let (bu_code, bu_name) = bu();
                Self {
                    bu_code,
                    bu_name,
                    product: r.product.clone(),
                    manager: r.marketing_manager.clone(),
                    ..Self::default()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GrainSums {
    pub actuals: f64,
    pub stats_fcast: f64,
    pub marketing_fcast: f64,
    pub stats_abs_error: f64,
    pub marketing_abs_error: f64,
}

impl GrainSums {
    fn add(&mut self, r: &ReconciledRecord) {
        self.actuals += r.actuals;
        self.stats_fcast += r.stats_fcast;
        self.marketing_fcast += r.marketing_fcast;
        self.stats_abs_error += r.stats_abs_error;
        self.marketing_abs_error += r.marketing_abs_error;
    }

    pub fn forecast(&self, side: Side) -> f64 {
        match side {
            Side::StatsModel => self.stats_fcast,
            Side::Marketing => self.marketing_fcast,
        }
    }

    pub fn abs_error(&self, side: Side) -> f64 {
        match side {
            Side::StatsModel => self.stats_abs_error,
            Side::Marketing => self.marketing_abs_error,
        }
    }

    pub fn metric(&self, kind: MetricKind, side: Side) -> Option<f64> {
        match kind {
            MetricKind::Accuracy => safe_ratio(self.forecast(side), self.actuals),
            MetricKind::Wape => safe_ratio(self.abs_error(side), self.actuals),
        }
    }

    /// Winner of `kind` for these sums.
    ///
    /// Accuracy compares `|F - A|` on the sums: it orders the sides the same
    /// way as `|F / A - 1|` for any nonzero `A`, and equal distances stay equal.
    pub fn winner(&self, kind: MetricKind) -> Winner {
        let stats = self.metric(kind, Side::StatsModel);
        let marketing = self.metric(kind, Side::Marketing);
        if kind == MetricKind::Wape {
            return pick_winner(kind, stats, marketing);
        }
        match (stats, marketing) {
            (Some(s), Some(m)) if !s.is_nan() && !m.is_nan() => {}
            _ => return Winner::Undetermined,
        }
        let stats_dist = (self.stats_fcast - self.actuals).abs();
        let marketing_dist = (self.marketing_fcast - self.actuals).abs();
        if stats_dist == marketing_dist {
            Winner::Tie
        } else if stats_dist < marketing_dist {
            Winner::StatsModel
        } else {
            Winner::Marketing
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GrainGroup {
    pub units: UnitType,
    pub grain: Grain,
    pub key: GrainKey,
    pub sums: GrainSums,
    /// Family of the first record in the group; informative at product grain.
    pub first_prod_fam: Option<String>,
}

/// Sum records per grain key, separately for each reported unit type.
pub fn group_records(records: &[ReconciledRecord], grain: Grain) -> Vec<GrainGroup> {
    let mut out = Vec::new();
    for units in UnitType::REPORTED {
        let mut groups: BTreeMap<GrainKey, (GrainSums, Option<String>)> = BTreeMap::new();
        for r in records.iter().filter(|r| r.units == units) {
            let (sums, _) = groups
                .entry(GrainKey::of(grain, r))
                .or_insert_with(|| (GrainSums::default(), r.prod_fam.clone()));
            sums.add(r);
        }
        out.extend(groups.into_iter().map(|(key, (sums, first_prod_fam))| GrainGroup {
            units: units.clone(),
            grain,
            key,
            sums,
            first_prod_fam,
        }));
    }
    out
}

// ---------------------------------------------------------------------------
// Dashboards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub units: UnitType,
    pub grain: Grain,
    pub key: GrainKey,
    pub metric: MetricKind,
    pub stats_model: Option<f64>,
    pub marketing: Option<f64>,
    #[serde(skip)]
    winner: Winner,
}

impl DashboardRow {
    fn from_group(group: &GrainGroup, metric: MetricKind) -> Self {
        Self {
            units: group.units.clone(),
            grain: group.grain,
            key: group.key.clone(),
            metric,
            stats_model: group.sums.metric(metric, Side::StatsModel),
            marketing: group.sums.metric(metric, Side::Marketing),
            winner: group.sums.winner(metric),
        }
    }

    pub fn value(&self, side: Side) -> Option<f64> {
        match side {
            Side::StatsModel => self.stats_model,
            Side::Marketing => self.marketing,
        }
    }

    pub fn winner(&self) -> Winner {
        self.winner
    }

    /// Product rows that are listed but hidden and never highlighted.
    pub fn is_suppressed(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").is_empty();
        match (self.stats_model, self.marketing) {
            (Some(s), Some(m)) => {
                blank(&self.key.product)
                    || blank(&self.key.manager)
                    || s.is_nan()
                    || m.is_nan()
                    || (s == 0.0 && m == 0.0)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboards {
    pub totals: Vec<DashboardRow>,
    pub prod_fam: Vec<DashboardRow>,
    pub prod_fam_wape: Vec<DashboardRow>,
    pub manager: Vec<DashboardRow>,
    pub product: Vec<DashboardRow>,
}

impl Dashboards {
    /// Views in sheet order with their short names.
    pub fn views(&self) -> [(&'static str, &[DashboardRow]); 5] {
        [
            ("Totals", self.totals.as_slice()),
            ("Prod Fam", self.prod_fam.as_slice()),
            ("Prod Fam WAPE", self.prod_fam_wape.as_slice()),
            ("Mkt Mgr", self.manager.as_slice()),
            ("Product", self.product.as_slice()),
        ]
    }
}

pub fn build_dashboards(records: &[ReconciledRecord]) -> Dashboards {
    let both = [MetricKind::Accuracy, MetricKind::Wape];
    let rows = |groups: &[GrainGroup], kinds: &[MetricKind]| -> Vec<DashboardRow> {
        groups
            .iter()
            .flat_map(|g| kinds.iter().map(move |k| DashboardRow::from_group(g, *k)))
            .collect()
    };

    let bu = group_records(records, Grain::BusinessUnit);
    let total = group_records(records, Grain::Total);
    let mut totals = Vec::new();
    for units in UnitType::REPORTED {
        let bu_units: Vec<GrainGroup> = bu.iter().filter(|g| g.units == units).cloned().collect();
        let total_units: Vec<GrainGroup> =
            total.iter().filter(|g| g.units == units).cloned().collect();
        totals.extend(rows(&bu_units, &both));
        totals.extend(rows(&total_units, &both));
    }

    let families = group_records(records, Grain::ProductFamily);
    Dashboards {
        totals,
        prod_fam: rows(&families, &[MetricKind::Accuracy]),
        prod_fam_wape: rows(&families, &[MetricKind::Wape]),
        manager: rows(&group_records(records, Grain::Manager), &both),
        product: rows(&group_records(records, Grain::Product), &[MetricKind::Accuracy]),
    }
}

// ---------------------------------------------------------------------------
// Display order
// ---------------------------------------------------------------------------

/// Distinct (code, name) BU pairs, preferred codes first, then by code.
pub fn ordered_business_units<'a>(
    rows: impl IntoIterator<Item = &'a DashboardRow>,
) -> Vec<(Option<String>, Option<String>)> {
    let mut pairs: Vec<(Option<String>, Option<String>)> = Vec::new();
    for r in rows {
        let pair = (r.key.bu_code.clone(), r.key.bu_name.clone());
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }
    pairs.sort_by(|a, b| {
        bu_rank(a.0.as_deref())
            .cmp(&bu_rank(b.0.as_deref()))
            .then_with(|| a.0.cmp(&b.0))
    });
    pairs
}

fn bu_rank(code: Option<&str>) -> usize {
    code.and_then(|c| PREFERRED_BU_ORDER.iter().position(|p| *p == c))
        .unwrap_or(99)
}

/// Rows of one dashboard section in listing order.
///
/// Rows whose grain label (family, manager or product) is missing are not
/// listed. Winner rank sorts first, then the grain label.
pub fn display_order(rows: Vec<&DashboardRow>) -> Vec<&DashboardRow> {
    let label = |r: &DashboardRow| -> Option<String> {
        match r.grain {
            Grain::ProductFamily => r.key.prod_fam.clone(),
            Grain::Manager => r.key.manager.clone(),
            Grain::Product => r.key.product.clone(),
            Grain::Total | Grain::BusinessUnit => r.key.bu_code.clone(),
        }
    };
    let mut listed: Vec<&DashboardRow> = rows.into_iter().filter(|r| label(r).is_some()).collect();
    listed.sort_by(|a, b| {
        let rank = a.winner().rank().cmp(&b.winner().rank());
        rank.then_with(|| secondary_key(a).cmp(&secondary_key(b)))
    });
    listed
}

fn secondary_key(r: &DashboardRow) -> (String, String) {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let or_last = |v: &Option<String>| {
        let s = v.as_deref().map(str::trim).unwrap_or("");
        if s.is_empty() {
            "ZZZZZZ".to_string()
        } else {
            s.to_string()
        }
    };
    match (r.grain, r.metric) {
        (Grain::ProductFamily, MetricKind::Accuracy) => {
            (text(&r.key.prod_fam).trim().to_lowercase(), String::new())
        }
        (Grain::ProductFamily, MetricKind::Wape) => (text(&r.key.prod_fam), String::new()),
        (Grain::Manager, _) => (text(&r.key.manager), String::new()),
        (Grain::Product, _) => (or_last(&r.key.manager), or_last(&r.key.product)),
        (Grain::Total | Grain::BusinessUnit, _) => (text(&r.key.bu_code), String::new()),
    }
}
