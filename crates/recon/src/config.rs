use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::month::Month;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub casework: CaseworkRule,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub trend: TrendConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "Forecast Accuracy".into()
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Four workbook (or CSV) files in the Tableau-pull layout.
    Legacy,
    /// Header-less "2026 Data" marketing sheet plus the legacy catalog, stats and actuals files.
    Alternate,
    /// Relational views and fact tables in a SQLite database.
    Sqlite,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Alternate => write!(f, "alternate"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "alternate" => Ok(Self::Alternate),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ReconError::ConfigValidation(format!(
                "unknown source kind \"{other}\" (expected legacy, alternate or sqlite)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub marketing_file: Option<String>,
    #[serde(default = "default_marketing_sheet")]
    pub marketing_sheet: String,
    #[serde(default)]
    pub catalog_file: Option<String>,
    #[serde(default)]
    pub catalog_sheet: Option<String>,
    /// File name template; `{year}`, `{mon}` (`Jan`..`Dec`) and `{mm}` expand per month.
    #[serde(default)]
    pub stats_file: Option<String>,
    #[serde(default = "default_stats_sheet")]
    pub stats_sheet: String,
    #[serde(default)]
    pub actuals_file: Option<String>,
    #[serde(default)]
    pub actuals_sheet: Option<String>,
    #[serde(default)]
    pub alternate_file: Option<String>,
    #[serde(default = "default_alternate_sheet")]
    pub alternate_sheet: String,
    /// 1-based first data row of the alternate sheet.
    #[serde(default = "default_alternate_start_row")]
    pub alternate_start_row: usize,
    #[serde(default)]
    pub database: Option<String>,
}

fn default_marketing_sheet() -> String {
    "Tableau Data Pull".into()
}

fn default_stats_sheet() -> String {
    "Forecast_Library".into()
}

fn default_alternate_sheet() -> String {
    "2026 Data".into()
}

fn default_alternate_start_row() -> usize {
    6
}

impl SourceConfig {
    /// Stats-model file name for `month`, expanded from the template.
    pub fn stats_file_for(&self, month: Month) -> Option<String> {
        self.stats_file.as_ref().map(|template| {
            template
                .replace("{year}", &month.year().to_string())
                .replace("{mon}", month.label())
                .replace("{mm}", &format!("{:02}", month.number()))
        })
    }

    /// Check that every path `kind` needs is configured.
    pub fn require_paths(&self, kind: SourceKind) -> Result<(), ReconError> {
        let missing = |field: &str| {
            ReconError::ConfigValidation(format!("source kind '{kind}' requires source.{field}"))
        };
        match kind {
            SourceKind::Sqlite => {
                if self.database.is_none() {
                    return Err(missing("database"));
                }
            }
            SourceKind::Legacy | SourceKind::Alternate => {
                if kind == SourceKind::Legacy && self.marketing_file.is_none() {
                    return Err(missing("marketing_file"));
                }
                if kind == SourceKind::Alternate && self.alternate_file.is_none() {
                    return Err(missing("alternate_file"));
                }
                if self.catalog_file.is_none() {
                    return Err(missing("catalog_file"));
                }
                if self.stats_file.is_none() {
                    return Err(missing("stats_file"));
                }
                if self.actuals_file.is_none() {
                    return Err(missing("actuals_file"));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter + casework rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_geography")]
    pub geography: String,
}

fn default_geography() -> String {
    "AMERICAS".into()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { geography: default_geography() }
    }
}

/// Location override for the casework division's aggregate sentinel product.
///
/// Marketing rows for `division` + `sentinel` at one of `locations` only join
/// to the catalog family that location maps to.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseworkRule {
    #[serde(default = "default_casework_division")]
    pub division: String,
    #[serde(default = "default_casework_sentinel")]
    pub sentinel: String,
    #[serde(default = "default_casework_locations")]
    pub locations: BTreeMap<String, String>,
}

fn default_casework_division() -> String {
    "D200".into()
}

fn default_casework_sentinel() -> String {
    "TOTAL CASEWORK".into()
}

fn default_casework_locations() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("LOC1020".to_string(), "ARTISAN CASEWORK".to_string()),
        ("LOC1080".to_string(), "SYNTHESIS CASEWORK".to_string()),
    ])
}

impl Default for CaseworkRule {
    fn default() -> Self {
        Self {
            division: default_casework_division(),
            sentinel: default_casework_sentinel(),
            locations: default_casework_locations(),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality, trend, output
// ---------------------------------------------------------------------------

/// Data-quality enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DqMode {
    /// Checks are still computed and logged to file, never printed or enforced.
    Off,
    /// Failed checks are logged.
    Warn,
    /// Failed checks are logged; any failed critical check aborts the run.
    #[default]
    Fail,
}

impl std::fmt::Display for DqMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for DqMode {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(ReconError::ConfigValidation(format!(
                "unknown dq mode \"{other}\" (expected off, warn or fail)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub mode: DqMode,
    /// JSON log path; defaults to a file next to the report.
    #[serde(default)]
    pub log: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendConfig {
    #[serde(default = "default_window_months")]
    pub window_months: u32,
    #[serde(default = "default_top_n")]
    pub top_n_products: usize,
}

fn default_window_months() -> u32 {
    12
}

fn default_top_n() -> usize {
    10
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_months: default_window_months(),
            top_n_products: default_top_n(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "outputs".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir() }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ForecastConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config = Self::parse(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating, for callers that apply overrides first.
    pub fn parse(input: &str) -> Result<Self, ReconError> {
        toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        self.source.require_paths(self.source.kind)?;

        if self.source.alternate_start_row == 0 {
            return Err(ReconError::ConfigValidation(
                "source.alternate_start_row is 1-based and must be >= 1".into(),
            ));
        }

        if self.trend.window_months == 0 {
            return Err(ReconError::ConfigValidation(
                "trend.window_months must be >= 1".into(),
            ));
        }

        if self.trend.top_n_products == 0 {
            return Err(ReconError::ConfigValidation(
                "trend.top_n_products must be >= 1".into(),
            ));
        }

        if self.casework.division.trim().is_empty() || self.casework.sentinel.trim().is_empty() {
            return Err(ReconError::ConfigValidation(
                "casework.division and casework.sentinel must not be empty".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_LEGACY: &str = r#"
name = "March Close"

[source]
kind = "legacy"
marketing_file = "Marketing Forecast Data.xlsx"
catalog_file = "product_catalog_master.xlsx"
stats_file = "stats_model_forecasts_{year}-{mon}.xlsx"
actuals_file = "all_products_actuals_and_bookings.xlsx"
"#;

    #[test]
    fn parse_valid_legacy_with_defaults() {
        let config = ForecastConfig::from_toml(VALID_LEGACY).unwrap();
        assert_eq!(config.name, "March Close");
        assert_eq!(config.source.kind, SourceKind::Legacy);
        assert_eq!(config.source.marketing_sheet, "Tableau Data Pull");
        assert_eq!(config.source.stats_sheet, "Forecast_Library");
        assert_eq!(config.source.alternate_start_row, 6);
        assert_eq!(config.filter.geography, "AMERICAS");
        assert_eq!(config.casework.division, "D200");
        assert_eq!(config.casework.locations["LOC1080"], "SYNTHESIS CASEWORK");
        assert_eq!(config.quality.mode, DqMode::Fail);
        assert_eq!(config.trend.window_months, 12);
        assert_eq!(config.trend.top_n_products, 10);
    }

    #[test]
    fn stats_template_expands_per_month() {
        let config = ForecastConfig::from_toml(VALID_LEGACY).unwrap();
        let month = Month::new(2024, 3).unwrap();
        assert_eq!(
            config.source.stats_file_for(month).unwrap(),
            "stats_model_forecasts_2024-Mar.xlsx"
        );
    }

    #[test]
    fn parse_overrides() {
        let input = format!(
            r#"{VALID_LEGACY}
[quality]
mode = "warn"

[trend]
window_months = 3
top_n_products = 5

[casework]
locations = {{ LOC9 = "OTHER CASEWORK" }}
"#
        );
        let config = ForecastConfig::from_toml(&input).unwrap();
        assert_eq!(config.quality.mode, DqMode::Warn);
        assert_eq!(config.trend.window_months, 3);
        assert_eq!(config.trend.top_n_products, 5);
        assert_eq!(config.casework.locations.len(), 1);
        assert_eq!(config.casework.sentinel, "TOTAL CASEWORK");
    }

    #[test]
    fn reject_unknown_kind() {
        let input = r#"
[source]
kind = "essbase"
"#;
        let err = ForecastConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn reject_sqlite_without_database() {
        let input = r#"
[source]
kind = "sqlite"
"#;
        let err = ForecastConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("source.database"));
    }

    #[test]
    fn reject_alternate_without_copy_file() {
        let input = VALID_LEGACY.replace("kind = \"legacy\"", "kind = \"alternate\"");
        let err = ForecastConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("alternate_file"));
    }

    #[test]
    fn reject_zero_window() {
        let input = format!("{VALID_LEGACY}\n[trend]\nwindow_months = 0\n");
        let err = ForecastConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("window_months must be >= 1"));
    }

    #[test]
    fn kind_and_mode_from_str() {
        assert_eq!("SQLite".parse::<SourceKind>().unwrap(), SourceKind::Sqlite);
        assert!("db".parse::<SourceKind>().is_err());
        assert_eq!("off".parse::<DqMode>().unwrap(), DqMode::Off);
        assert!("strict".parse::<DqMode>().is_err());
    }
}
