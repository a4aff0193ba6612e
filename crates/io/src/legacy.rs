//! Legacy four-file layout: marketing pull, catalog master, per-month stats
//! library, and the actuals export.

use std::path::{Path, PathBuf};

use tracing::debug;

use facc_recon::catalog::apply_division_remap;
use facc_recon::config::{SourceConfig, SourceKind};
use facc_recon::model::{
    ActualsRow, MarketingForecastRow, ProductCatalogEntry, SourceTables, StatsModelForecastRow,
};
use facc_recon::{Month, ReconError, SourceLoader};

use crate::table::{read_table, Table};

// ---------------------------------------------------------------------------
// Table readers
// ---------------------------------------------------------------------------

pub fn marketing_rows(table: &Table) -> Result<Vec<MarketingForecastRow>, ReconError> {
    let bu = table.column("BU")?;
    let location = table.column("Location")?;
    let geography = table.column("Geography")?;
    let product = table.column("Product")?;
    let date = table.column("Date")?;
    let dollars = table.column("Forecast (Dollars)")?;
    let quantity = table.column("Forecast (Quantity)")?;
    let budget_dollars = table.optional_column("Budget (Dollars)");
    let budget_quantity = table.optional_column("Budget (Quantity)");

    Ok(table
        .rows
        .iter()
        .map(|row| MarketingForecastRow {
            bu: Table::cell(row, Some(bu)).text(),
            location: Table::cell(row, Some(location)).text(),
            geography: Table::cell(row, Some(geography)).text(),
            product: Table::cell(row, Some(product)).text(),
            date: Table::cell(row, Some(date)).date(),
            forecast_dollars: Table::cell(row, Some(dollars)).number(),
            forecast_quantity: Table::cell(row, Some(quantity)).number(),
            budget_dollars: Table::cell(row, budget_dollars).number(),
            budget_quantity: Table::cell(row, budget_quantity).number(),
        })
        .collect())
}

/// Catalog entries with the division remap applied.
pub fn catalog_entries(table: &Table) -> Result<Vec<ProductCatalogEntry>, ReconError> {
    let group_key = table.column("group_key")?;
    let bu_code = table.column("business_unit_code")?;
    let bu_name = table.column("business_unit_name")?;
    let sku_list = table.column("sku_list")?;
    let family = table.column("product_family")?;
    let manager = table.column("marketing_manager")?;
    let mode = table.column("salesforce_feature_mode")?;

    let mut entries: Vec<ProductCatalogEntry> = table
        .rows
        .iter()
        .map(|row| ProductCatalogEntry {
            group_key: Table::cell(row, Some(group_key)).text(),
            business_unit_code: Table::cell(row, Some(bu_code)).text(),
            business_unit_name: Table::cell(row, Some(bu_name)).text(),
            sku_list: Table::cell(row, Some(sku_list)).text(),
            product_family: Table::cell(row, Some(family)).text(),
            marketing_manager: Table::cell(row, Some(manager)).text(),
            salesforce_feature_mode: Table::cell(row, Some(mode)).text(),
        })
        .collect();
    apply_division_remap(&mut entries);
    Ok(entries)
}

pub fn stats_rows(table: &Table) -> Result<Vec<StatsModelForecastRow>, ReconError> {
    let product = table.column("product_id")?;
    let bu = table.column("bu_id")?;
    let month = table.column("forecast_month")?;
    let model = table.column("model_type")?;
    let value = table.column("forecast_value")?;
    let recommended = table.column("recommended_model")?;
    let run_id = table.optional_column("run_id");

    Ok(table
        .rows
        .iter()
        .map(|row| StatsModelForecastRow {
            product_id: Table::cell(row, Some(product)).text(),
            bu_id: Table::cell(row, Some(bu)).text(),
            forecast_month: Table::cell(row, Some(month)).date(),
            model_type: Table::cell(row, Some(model)).text(),
            forecast_value: Table::cell(row, Some(value)).number(),
            recommended_model: Table::cell(row, Some(recommended)).flag(),
            run_id: Table::cell(row, run_id).text(),
        })
        .collect())
}

pub fn actuals_rows(table: &Table) -> Result<Vec<ActualsRow>, ReconError> {
    let product = table.column("Product")?;
    let division = table.column("Division")?;
    let month = table.column("Month")?;
    let actuals = table.column("Actuals")?;
    let bookings = table.optional_column("Bookings");

    Ok(table
        .rows
        .iter()
        .map(|row| ActualsRow {
            product: Table::cell(row, Some(product)).text(),
            division: Table::cell(row, Some(division)).text(),
            month: Table::cell(row, Some(month)).date(),
            actuals: Table::cell(row, Some(actuals)).number(),
            bookings: Table::cell(row, bookings).number(),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Shared file set
// ---------------------------------------------------------------------------

/// Catalog, stats and actuals files shared by both file layouts.
#[derive(Debug, Clone)]
pub struct FileSources {
    pub base_dir: PathBuf,
    pub source: SourceConfig,
}

impl FileSources {
    pub fn new(base_dir: impl Into<PathBuf>, source: SourceConfig) -> Self {
        Self { base_dir: base_dir.into(), source }
    }

    pub fn resolve(&self, configured: Option<&str>, field: &str) -> Result<PathBuf, ReconError> {
        let name = configured.ok_or_else(|| {
            ReconError::ConfigValidation(format!("source.{field} is not configured"))
        })?;
        Ok(self.base_dir.join(name))
    }

    pub fn stats_path(&self, month: Month) -> Result<PathBuf, ReconError> {
        let name = self.source.stats_file_for(month);
        self.resolve(name.as_deref(), "stats_file")
    }

    /// Catalog, stats and actuals for `month`; marketing is left empty.
    pub fn load_shared(&self, month: Month) -> Result<SourceTables, ReconError> {
        let catalog_path = self.resolve(self.source.catalog_file.as_deref(), "catalog_file")?;
        let actuals_path = self.resolve(self.source.actuals_file.as_deref(), "actuals_file")?;
        let stats_path = self.stats_path(month)?;
        if !stats_path.exists() {
            return Err(ReconError::MissingSource(format!(
                "stats model file {}",
                stats_path.display()
            )));
        }

        let catalog = catalog_entries(&read_table(
            &catalog_path,
            self.source.catalog_sheet.as_deref(),
            "catalog",
        )?)?;
        let stats = stats_rows(&read_table(
            &stats_path,
            Some(&self.source.stats_sheet),
            "stats",
        )?)?;
        let actuals = actuals_rows(&read_table(
            &actuals_path,
            self.source.actuals_sheet.as_deref(),
            "actuals",
        )?)?;
        debug!(
            catalog = catalog.len(),
            stats = stats.len(),
            actuals = actuals.len(),
            stats_file = %stats_path.display(),
            "read shared source files"
        );
        Ok(SourceTables { marketing: Vec::new(), catalog, stats, actuals })
    }
}

pub fn marketing_from_file(path: &Path, sheet: &str) -> Result<Vec<MarketingForecastRow>, ReconError> {
    marketing_rows(&read_table(path, Some(sheet), "marketing")?)
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Loads the Tableau-pull marketing sheet plus the shared files.
#[derive(Debug, Clone)]
pub struct LegacyLoader {
    files: FileSources,
}

impl LegacyLoader {
    pub fn new(base_dir: impl Into<PathBuf>, source: SourceConfig) -> Self {
        Self { files: FileSources::new(base_dir, source) }
    }
}

impl SourceLoader for LegacyLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Legacy
    }

    fn load(&self, month: Month) -> Result<SourceTables, ReconError> {
        let source = &self.files.source;
        let marketing_path = self
            .files
            .resolve(source.marketing_file.as_deref(), "marketing_file")?;
        let mut tables = self.files.load_shared(month)?;
        tables.marketing = marketing_from_file(&marketing_path, &source.marketing_sheet)?;
        Ok(tables)
    }
}
