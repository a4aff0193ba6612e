//! Data-quality checks and the enforcement gate.
//!
//! Checks never mutate data. Each yields a pass/fail flag with JSON details;
//! only the gate decides whether a failed critical check stops the run.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::Hash;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::config::{DqMode, SourceKind};
use crate::error::ReconError;
use crate::model::{AmbiguousMapping, SourceTables};
use crate::month::Month;
use crate::normalize::normalize_key;
use crate::trend::TrendReport;

/// Sample rows carried in check details.
pub const SAMPLE_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityCheck {
    pub name: String,
    pub severity: Severity,
    pub passed: bool,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub checks_total: usize,
    pub checks_failed: usize,
    pub critical_failed: usize,
    pub warning_failed: usize,
    pub checks: Vec<QualityCheck>,
    /// Run metadata (month, source, window) written alongside the checks.
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl QualityReport {
    pub fn from_checks(checks: Vec<QualityCheck>) -> Self {
        let failed = |severity: Option<Severity>| {
            checks
                .iter()
                .filter(|c| !c.passed && severity.map_or(true, |s| c.severity == s))
                .count()
        };
        Self {
            checks_total: checks.len(),
            checks_failed: failed(None),
            critical_failed: failed(Some(Severity::Critical)),
            warning_failed: failed(Some(Severity::Warning)),
            checks,
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Serialize) -> Self {
        self.context
            .insert(key.to_string(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    pub fn failed(&self) -> impl Iterator<Item = &QualityCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Log every failed check unless `mode` is off.
    pub fn log_failures(&self, mode: DqMode) {
        if mode == DqMode::Off {
            return;
        }
        for check in self.failed() {
            match check.severity {
                Severity::Critical => error!(check = %check.name, details = %check.details, "critical check failed"),
                Severity::Warning => warn!(check = %check.name, details = %check.details, "warning check failed"),
            }
        }
    }

    /// Abort when `mode` is fail and any critical check failed.
    pub fn enforce(&self, mode: DqMode) -> Result<(), ReconError> {
        if mode == DqMode::Fail && self.critical_failed > 0 {
            return Err(ReconError::QualityGate {
                critical_failed: self.critical_failed,
            });
        }
        Ok(())
    }
}

struct Checks(Vec<QualityCheck>);

impl Checks {
    fn add(&mut self, name: &str, severity: Severity, passed: bool, details: Value) {
        self.0.push(QualityCheck {
            name: name.to_string(),
            severity,
            passed,
            details,
        });
    }
}

fn sample<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Value {
    Value::Array(
        rows.into_iter()
            .take(SAMPLE_LIMIT)
            .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
            .collect(),
    )
}

/// Rows whose key repeats an earlier row's key.
fn duplicate_count<K: Hash + Eq>(keys: impl IntoIterator<Item = K>) -> usize {
    let mut seen = HashSet::new();
    let mut dupes = 0;
    for key in keys {
        if !seen.insert(key) {
            dupes += 1;
        }
    }
    dupes
}

// ---------------------------------------------------------------------------
// Single-month source checks
// ---------------------------------------------------------------------------

/// Checks against the loaded tables, restricted to `month` where dated.
///
/// The 12-month completeness check for the alternate layout looks at every
/// marketing row, since that layout always carries a full year.
pub fn run_source_checks(
    tables: &SourceTables,
    month: Month,
    kind: SourceKind,
    geography: &str,
    ambiguous: &[AmbiguousMapping],
) -> QualityReport {
    let in_month = |d: &Option<chrono::NaiveDate>| d.map(|d| month.contains(d)).unwrap_or(false);
    let marketing: Vec<_> = tables.marketing.iter().filter(|r| in_month(&r.date)).collect();
    let stats: Vec<_> = tables.stats.iter().filter(|r| in_month(&r.forecast_month)).collect();
    let actuals: Vec<_> = tables.actuals.iter().filter(|r| in_month(&r.month)).collect();
    let catalog = &tables.catalog;

    let mut checks = Checks(Vec::new());
    let month_text = month.to_string();

    checks.add(
        "marketing_rows_present",
        Severity::Critical,
        !marketing.is_empty(),
        json!({ "row_count": marketing.len() }),
    );
    checks.add(
        "catalog_rows_present",
        Severity::Critical,
        !catalog.is_empty(),
        json!({ "row_count": catalog.len() }),
    );
    checks.add(
        "stats_rows_present_for_month",
        Severity::Critical,
        !stats.is_empty(),
        json!({ "row_count": stats.len(), "month": month_text }),
    );
    checks.add(
        "actuals_rows_present_for_month",
        Severity::Critical,
        !actuals.is_empty(),
        json!({ "row_count": actuals.len(), "month": month_text }),
    );

    if !marketing.is_empty() {
        let nulls = marketing
            .iter()
            .filter(|r| r.bu.is_none() || r.location.is_none() || r.product.is_none() || r.date.is_none())
            .count();
        checks.add(
            "marketing_key_nulls",
            Severity::Critical,
            nulls == 0,
            json!({ "null_key_rows": nulls }),
        );

        let dupes = duplicate_count(
            marketing
                .iter()
                .map(|r| (&r.bu, &r.location, &r.geography, &r.product, r.date)),
        );
        checks.add(
            "marketing_duplicate_keys",
            Severity::Warning,
            dupes == 0,
            json!({ "duplicate_rows": dupes }),
        );

        let wanted = normalize_key(Some(geography));
        let outside: Vec<_> = marketing
            .iter()
            .filter(|r| normalize_key(r.geography.as_deref()) != wanted)
            .collect();
        checks.add(
            "marketing_geography_filter_behavior",
            Severity::Warning,
            outside.is_empty(),
            json!({
                "geography": geography,
                "non_matching_rows": outside.len(),
                "sample": sample(outside.iter().map(|r| json!({
                    "BU": r.bu, "Location": r.location, "Geography": r.geography,
                    "Product": r.product, "Date": r.date,
                }))),
            }),
        );
    }

    if !actuals.is_empty() {
        let nulls = actuals
            .iter()
            .filter(|r| r.product.is_none() || r.division.is_none() || r.month.is_none())
            .count();
        checks.add(
            "actuals_key_nulls",
            Severity::Critical,
            nulls == 0,
            json!({ "null_key_rows": nulls }),
        );
        let dupes = duplicate_count(actuals.iter().map(|r| (&r.product, &r.division, r.month)));
        checks.add(
            "actuals_duplicate_keys",
            Severity::Warning,
            dupes == 0,
            json!({ "duplicate_rows": dupes }),
        );
    }

    if !stats.is_empty() {
        let nulls = stats
            .iter()
            .filter(|r| {
                r.product_id.is_none()
                    || r.bu_id.is_none()
                    || r.forecast_month.is_none()
                    || r.model_type.is_none()
            })
            .count();
        checks.add(
            "stats_key_nulls",
            Severity::Critical,
            nulls == 0,
            json!({ "null_key_rows": nulls }),
        );
        let dupes = duplicate_count(stats.iter().map(|r| {
            (&r.product_id, &r.bu_id, r.forecast_month, &r.model_type, &r.run_id)
        }));
        checks.add(
            "stats_duplicate_keys",
            Severity::Warning,
            dupes == 0,
            json!({ "duplicate_rows": dupes }),
        );
    }

    if !catalog.is_empty() {
        let nulls = catalog
            .iter()
            .filter(|r| r.group_key.is_none() || r.business_unit_code.is_none() || r.sku_list.is_none())
            .count();
        checks.add(
            "catalog_key_nulls",
            Severity::Critical,
            nulls == 0,
            json!({ "null_key_rows": nulls }),
        );
        checks.add(
            "catalog_ambiguous_sku_mapping",
            Severity::Warning,
            ambiguous.is_empty(),
            json!({ "ambiguous_pairs": ambiguous.len(), "sample": sample(ambiguous) }),
        );
    }

    if kind == SourceKind::Alternate {
        let mut months_per_key: BTreeMap<_, BTreeSet<u32>> = BTreeMap::new();
        for r in &tables.marketing {
            let months = months_per_key
                .entry((&r.bu, &r.location, &r.geography, &r.product))
                .or_default();
            if let Some(d) = r.date {
                months.insert(Month::of(d).number());
            }
        }
        let incomplete: Vec<_> = months_per_key
            .iter()
            .filter(|(_, months)| months.len() != 12)
            .collect();
        checks.add(
            "marketing_12_month_completeness_per_key",
            Severity::Warning,
            incomplete.is_empty(),
            json!({
                "incomplete_key_count": incomplete.len(),
                "sample": sample(incomplete.iter().map(|((bu, loc, geo, product), months)| json!({
                    "BU": bu, "Location": loc, "Geography": geo, "Product": product,
                    "month_count": months.len(),
                }))),
            }),
        );
    }

    QualityReport::from_checks(checks.0)
        .with_context("report_month", month)
        .with_context("source", kind)
}

// ---------------------------------------------------------------------------
// Trend checks
// ---------------------------------------------------------------------------

pub fn run_trend_checks(report: &TrendReport, top_n: usize) -> QualityReport {
    let mut checks = Checks(Vec::new());

    let available = report.available_months();
    let missing: Vec<Month> = report
        .months
        .iter()
        .copied()
        .filter(|m| !available.contains(m))
        .collect();
    checks.add(
        "rolling_window_completeness",
        Severity::Warning,
        missing.is_empty(),
        json!({
            "expected_months": report.months,
            "available_months": available,
            "missing_months": missing,
            "expected_count": report.months.len(),
            "available_count": available.len(),
        }),
    );

    let coverage_issues: Vec<_> = report
        .source_counts
        .iter()
        .filter(|c| c.marketing_rows == 0 || c.stats_rows == 0 || c.actuals_rows == 0)
        .collect();
    checks.add(
        "source_coverage_by_month",
        Severity::Critical,
        coverage_issues.is_empty(),
        json!({
            "issues": sample(coverage_issues.iter()),
            "issue_count": coverage_issues.len(),
        }),
    );

    let dupes = duplicate_count(report.rows.iter().map(|r| r.grain_key()));
    checks.add(
        "trend_grain_uniqueness",
        Severity::Critical,
        dupes == 0,
        json!({ "duplicate_count": dupes }),
    );

    let invalid: Vec<_> = report
        .rows
        .iter()
        .filter(|r| r.actuals_sum <= 0.0 && r.metric_value.is_some())
        .collect();
    checks.add(
        "denominator_validity",
        Severity::Critical,
        invalid.is_empty(),
        json!({ "invalid_count": invalid.len(), "examples": sample(invalid.iter()) }),
    );

    let mut per_units: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for row in &report.top_products {
        per_units
            .entry(row.units.to_string())
            .or_default()
            .insert(row.product.as_str());
    }
    let counts: Vec<Value> = per_units
        .iter()
        .map(|(units, products)| json!({ "units": units, "topn_count": products.len() }))
        .collect();
    let over_limit: Vec<&Value> = counts
        .iter()
        .filter(|c| c["topn_count"].as_u64().unwrap_or(0) as usize > top_n)
        .collect();
    checks.add(
        "topn_rank_integrity",
        Severity::Critical,
        over_limit.is_empty(),
        json!({ "top_n_products": top_n, "counts": counts, "over_limit": over_limit }),
    );

    QualityReport::from_checks(checks.0)
        .with_context("anchor_month", report.anchor)
        .with_context("window_start", report.window_start())
        .with_context("window_end", report.anchor)
        .with_context("window_months", report.months.len())
        .with_context("top_n_products", top_n)
        .with_context("source_counts", &report.source_counts)
}
