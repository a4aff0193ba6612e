use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::month::Month;

// ---------------------------------------------------------------------------
// Source tables
// ---------------------------------------------------------------------------

/// One marketing forecast submission line.
///
/// Text fields stay `None` when the source cell was blank so the data-quality
/// layer can count null keys. Numeric fields are coerced at ingestion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketingForecastRow {
    pub bu: Option<String>,
    pub location: Option<String>,
    pub geography: Option<String>,
    pub product: Option<String>,
    pub date: Option<NaiveDate>,
    pub forecast_dollars: f64,
    pub forecast_quantity: f64,
    pub budget_dollars: f64,
    pub budget_quantity: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductCatalogEntry {
    pub group_key: Option<String>,
    pub business_unit_code: Option<String>,
    pub business_unit_name: Option<String>,
    /// Pipe-delimited raw product codes belonging to this family.
    pub sku_list: Option<String>,
    pub product_family: Option<String>,
    pub marketing_manager: Option<String>,
    /// `quantity` or `dollars`; selects the marketing value column.
    pub salesforce_feature_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsModelForecastRow {
    pub product_id: Option<String>,
    pub bu_id: Option<String>,
    pub forecast_month: Option<NaiveDate>,
    pub model_type: Option<String>,
    pub forecast_value: f64,
    pub recommended_model: bool,
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActualsRow {
    pub product: Option<String>,
    pub division: Option<String>,
    pub month: Option<NaiveDate>,
    pub actuals: f64,
    pub bookings: f64,
}

/// The four canonical tables every source loader produces.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub marketing: Vec<MarketingForecastRow>,
    pub catalog: Vec<ProductCatalogEntry>,
    pub stats: Vec<StatsModelForecastRow>,
    pub actuals: Vec<ActualsRow>,
}

/// Row counts of each table restricted to one month (catalog is undated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthRowCounts {
    pub month_start: Month,
    pub marketing_rows: usize,
    pub catalog_rows: usize,
    pub stats_rows: usize,
    pub actuals_rows: usize,
}

impl SourceTables {
    pub fn month_row_counts(&self, month: Month) -> MonthRowCounts {
        let in_month = |d: &Option<NaiveDate>| d.map(|d| month.contains(d)).unwrap_or(false);
        MonthRowCounts {
            month_start: month,
            marketing_rows: self.marketing.iter().filter(|r| in_month(&r.date)).count(),
            catalog_rows: self.catalog.len(),
            stats_rows: self.stats.iter().filter(|r| in_month(&r.forecast_month)).count(),
            actuals_rows: self.actuals.iter().filter(|r| in_month(&r.month)).count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit type
// ---------------------------------------------------------------------------

/// Which marketing value column a catalog family reconciles against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitType {
    Quantity,
    Dollars,
    /// Any other selector text, lowercased and trimmed. Carried through the raw
    /// records but excluded from dashboards.
    Other(String),
}

impl UnitType {
    /// Unit types that get dashboards, in display order.
    pub const REPORTED: [UnitType; 2] = [UnitType::Quantity, UnitType::Dollars];

    pub fn from_feature_mode(mode: Option<&str>) -> Self {
        let text = mode.unwrap_or("nan").trim().to_lowercase();
        match text.as_str() {
            "quantity" => Self::Quantity,
            "dollars" => Self::Dollars,
            _ => Self::Other(text),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Quantity => "quantity",
            Self::Dollars => "dollars",
            Self::Other(s) => s,
        }
    }

    /// `Quantity`, `Dollars`: section titles in the dashboards.
    pub fn title(&self) -> String {
        let s = self.as_str();
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UnitType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Catalog expansion + join
// ---------------------------------------------------------------------------

/// One (catalog entry, SKU) pair after exploding `sku_list`.
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedCatalogRow {
    pub entry: ProductCatalogEntry,
    pub sku: String,
    pub product_key: String,
    pub bu_key: String,
}

/// A catalog (SKU, BU) pair claimed by more than one entry.
#[derive(Debug, Clone, Serialize)]
pub struct AmbiguousMapping {
    pub product_key: String,
    pub bu_key: String,
    pub group_keys: Vec<Option<String>>,
}

/// A marketing row joined to one catalog row.
#[derive(Debug, Clone, Serialize)]
pub struct MappedMarketingRow {
    pub bu: Option<String>,
    pub location: Option<String>,
    pub product: Option<String>,
    pub date: Option<NaiveDate>,
    pub group_key: Option<String>,
    pub business_unit_code: Option<String>,
    pub business_unit_name: Option<String>,
    pub product_family: Option<String>,
    pub marketing_manager: Option<String>,
    pub units: UnitType,
    pub marketing_fcast: f64,
}

pub const SKIP_REASON_NOT_IN_CATALOG: &str = "Not in product catalog master";

/// A marketing row excluded from reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub bu: Option<String>,
    pub product: Option<String>,
    pub date: Option<NaiveDate>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub mapped: Vec<MappedMarketingRow>,
    pub skipped: Vec<SkippedRecord>,
}

// ---------------------------------------------------------------------------
// Rollups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MarketingRollupRow {
    pub group_key: Option<String>,
    pub business_unit_code: Option<String>,
    pub business_unit_name: Option<String>,
    pub product_family: Option<String>,
    pub marketing_manager: Option<String>,
    pub units: UnitType,
    pub marketing_fcast: f64,
    pub product_key: String,
    pub bu_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActualsRollupRow {
    pub product_key: String,
    pub bu_key: String,
    pub actuals: f64,
}

/// Statistical forecast per key: blend sum preferred, recommended-flag sum otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRollupRow {
    pub product_key: String,
    pub bu_key: String,
    pub blend: Option<f64>,
    pub fallback: Option<f64>,
    pub forecast_value: f64,
}

// ---------------------------------------------------------------------------
// Reconciled output
// ---------------------------------------------------------------------------

/// One product family × business unit × unit type for a month.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledRecord {
    pub product: Option<String>,
    pub division: Option<String>,
    pub month: Month,
    pub prod_fam: Option<String>,
    pub units: UnitType,
    pub actuals: f64,
    pub stats_fcast: f64,
    pub marketing_fcast: f64,
    pub stats_abs_error: f64,
    pub marketing_abs_error: f64,
    pub bu_name: Option<String>,
    pub marketing_manager: Option<String>,
}

/// Everything derived for one reporting month, kept for the validation workbook.
#[derive(Debug, Clone)]
pub struct MonthReconciliation {
    pub month: Month,
    pub records: Vec<ReconciledRecord>,
    pub skipped: Vec<SkippedRecord>,
    pub mapped: Vec<MappedMarketingRow>,
    pub marketing_rollup: Vec<MarketingRollupRow>,
    pub actuals_rollup: Vec<ActualsRollupRow>,
    pub stats_rollup: Vec<StatsRollupRow>,
    pub ambiguous: Vec<AmbiguousMapping>,
}
