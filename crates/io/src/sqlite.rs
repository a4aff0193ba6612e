//! Relational source backed by a SQLite database.
//!
//! Marketing, stats and actuals are read per month from their views and fact
//! tables; the catalog comes from the BU-grain reporting view when present.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use tracing::{debug, warn};

use facc_recon::catalog::apply_division_remap;
use facc_recon::config::SourceKind;
use facc_recon::model::{
    ActualsRow, MarketingForecastRow, ProductCatalogEntry, SourceTables, StatsModelForecastRow,
};
use facc_recon::{Month, ReconError, SourceLoader};

use crate::table::Cell;

const MARKETING_QUERY: &str = "
    SELECT bu_code, location_code, geography, product_code_raw, forecast_month,
           forecast_dollars, forecast_quantity
    FROM vw_marketing_forecast_monthly
    WHERE forecast_month >= ?1 AND forecast_month < ?2";

const CATALOG_VIEW_QUERY: &str = "
    SELECT group_key, business_unit_code, business_unit_name, sku_list,
           product_family, marketing_manager, salesforce_feature_mode
    FROM vw_product_catalog_bu_reporting";

const CATALOG_TABLE_QUERY: &str = "
    SELECT p.product_code AS group_key,
           p.business_unit_code,
           COALESCE(b.bu_name, p.business_unit_code) AS business_unit_name,
           p.sku_list,
           p.product_family,
           p.marketing_manager,
           p.salesforce_feature_mode
    FROM dim_product p
    LEFT JOIN dim_business_unit b ON b.bu_code = p.business_unit_code";

const STATS_QUERY: &str = "
    SELECT product_code, bu_code, forecast_month, model_type, forecast_value,
           recommended_model, run_id
    FROM fact_forecast_monthly
    WHERE forecast_month >= ?1 AND forecast_month < ?2";

const ACTUALS_QUERY: &str = "
    SELECT product_code, bu_code, month_start, actuals, bookings
    FROM fact_actuals_monthly
    WHERE month_start >= ?1 AND month_start < ?2";

fn db_err(e: rusqlite::Error) -> ReconError {
    ReconError::Database(e.to_string())
}

fn cell(row: &Row<'_>, idx: usize) -> rusqlite::Result<Cell> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Cell::Empty,
        ValueRef::Integer(n) => Cell::Number(n as f64),
        ValueRef::Real(n) => Cell::Number(n),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(_) => Cell::Empty,
    })
}

fn query_cells(
    conn: &Connection,
    sql: &str,
    width: usize,
    bounds: Option<(&str, &str)>,
) -> rusqlite::Result<Vec<Vec<Cell>>> {
    let mut stmt = conn.prepare(sql)?;
    let map = |row: &Row<'_>| (0..width).map(|i| cell(row, i)).collect::<rusqlite::Result<Vec<Cell>>>();
    let rows = match bounds {
        Some((start, end)) => stmt.query_map(params![start, end], map)?,
        None => stmt.query_map([], map)?,
    };
    rows.collect()
}

/// Reads one month of every table from a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteLoader {
    path: PathBuf,
}

impl SqliteLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, ReconError> {
        if !self.path.exists() {
            return Err(ReconError::MissingSource(format!(
                "database {}",
                self.path.display()
            )));
        }
        Connection::open(&self.path).map_err(db_err)
    }

    fn catalog(conn: &Connection) -> Result<Vec<ProductCatalogEntry>, ReconError> {
        let rows = match query_cells(conn, CATALOG_VIEW_QUERY, 7, None) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "catalog view unavailable, reading dim_product");
                query_cells(conn, CATALOG_TABLE_QUERY, 7, None).map_err(db_err)?
            }
        };
        let mut entries: Vec<ProductCatalogEntry> = rows
            .iter()
            .map(|r| ProductCatalogEntry {
                group_key: r[0].text(),
                business_unit_code: r[1].text(),
                business_unit_name: r[2].text(),
                sku_list: r[3].text(),
                product_family: r[4].text(),
                marketing_manager: r[5].text(),
                salesforce_feature_mode: r[6].text(),
            })
            .collect();
        apply_division_remap(&mut entries);
        Ok(entries)
    }
}

impl SourceLoader for SqliteLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Sqlite
    }

    fn load(&self, month: Month) -> Result<SourceTables, ReconError> {
        let conn = self.open()?;
        let start = month.first_day().format("%Y-%m-%d").to_string();
        let end = month.next().first_day().format("%Y-%m-%d").to_string();
        let bounds = Some((start.as_str(), end.as_str()));

        let marketing = query_cells(&conn, MARKETING_QUERY, 7, bounds)
            .map_err(db_err)?
            .iter()
            .map(|r| MarketingForecastRow {
                bu: r[0].text(),
                location: r[1].text(),
                geography: r[2].text(),
                product: r[3].text(),
                date: r[4].date(),
                forecast_dollars: r[5].number(),
                forecast_quantity: r[6].number(),
                ..Default::default()
            })
            .collect();

        let catalog = Self::catalog(&conn)?;

        let stats = query_cells(&conn, STATS_QUERY, 7, bounds)
            .map_err(db_err)?
            .iter()
            .map(|r| StatsModelForecastRow {
                product_id: r[0].text(),
                bu_id: r[1].text(),
                forecast_month: r[2].date(),
                model_type: r[3].text(),
                forecast_value: r[4].number(),
                recommended_model: r[5].flag(),
                run_id: r[6].text(),
            })
            .collect();

        let actuals = query_cells(&conn, ACTUALS_QUERY, 5, bounds)
            .map_err(db_err)?
            .iter()
            .map(|r| ActualsRow {
                product: r[0].text(),
                division: r[1].text(),
                month: r[2].date(),
                actuals: r[3].number(),
                bookings: r[4].number(),
            })
            .collect();

        let tables = SourceTables { marketing, catalog, stats, actuals };
        debug!(
            month = %month,
            marketing = tables.marketing.len(),
            stats = tables.stats.len(),
            actuals = tables.actuals.len(),
            "queried database"
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed(conn: &Connection, with_view: bool) {
        conn.execute_batch(
            "CREATE TABLE vw_marketing_forecast_monthly (
                 bu_code TEXT, location_code TEXT, geography TEXT, product_code_raw TEXT,
                 forecast_month TEXT, forecast_dollars REAL, forecast_quantity REAL);
             CREATE TABLE dim_product (
                 product_code TEXT, business_unit_code TEXT, sku_list TEXT,
                 product_family TEXT, marketing_manager TEXT, salesforce_feature_mode TEXT);
             CREATE TABLE dim_business_unit (bu_code TEXT, bu_name TEXT);
             CREATE TABLE fact_forecast_monthly (
                 product_code TEXT, bu_code TEXT, forecast_month TEXT, model_type TEXT,
                 forecast_value REAL, recommended_model INTEGER, run_id TEXT);
             CREATE TABLE fact_actuals_monthly (
                 product_code TEXT, bu_code TEXT, month_start TEXT, actuals REAL, bookings REAL);

             INSERT INTO vw_marketing_forecast_monthly VALUES
                 ('D100', 'LOC1', 'AMERICAS', 'SKU1', '2024-03-01', 1000.0, 10.0),
                 ('D100', 'LOC1', 'AMERICAS', 'SKU1', '2024-04-01', 2000.0, 20.0);
             INSERT INTO dim_product VALUES
                 ('FAM1', 'D100', 'SKU1', 'Family 1', 'Pat', 'quantity'),
                 ('FAM2', 'Division', 'SKU2', 'Family 2', 'Lee', 'dollars');
             INSERT INTO dim_business_unit VALUES ('D100', 'Clinical');
             INSERT INTO fact_forecast_monthly VALUES
                 ('FAM1', 'D100', '2024-03-01', 'BLEND', 9.0, 0, 'r1'),
                 ('FAM1', 'D100', '2024-03-01', 'ARIMA', 8.0, 1, 'r1');
             INSERT INTO fact_actuals_monthly VALUES
                 ('FAM1', 'D100', '2024-03-01', 12.0, 11.0),
                 ('FAM1', 'D100', '2024-02-01', 99.0, 0.0);",
        )
        .unwrap();
        if with_view {
            conn.execute_batch(
                "CREATE VIEW vw_product_catalog_bu_reporting AS
                 SELECT product_code AS group_key, business_unit_code,
                        'From View' AS business_unit_name, sku_list, product_family,
                        marketing_manager, salesforce_feature_mode
                 FROM dim_product;",
            )
            .unwrap();
        }
    }

    fn loader(with_view: bool) -> (tempfile::TempDir, SqliteLoader) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.db");
        let conn = Connection::open(&path).unwrap();
        seed(&conn, with_view);
        (dir, SqliteLoader::new(path))
    }

    #[test]
    fn loads_one_month() {
        let (_dir, loader) = loader(true);
        let tables = loader.load(Month::new(2024, 3).unwrap()).unwrap();
        assert_eq!(tables.marketing.len(), 1);
        assert_eq!(tables.marketing[0].forecast_quantity, 10.0);
        assert_eq!(tables.stats.len(), 2);
        assert!(tables.stats.iter().any(|s| s.recommended_model));
        assert_eq!(tables.actuals.len(), 1);
        assert_eq!(tables.actuals[0].bookings, 11.0);
        assert_eq!(tables.catalog[0].business_unit_name.as_deref(), Some("From View"));
    }

    #[test]
    fn catalog_falls_back_to_dimension_tables() {
        let (_dir, loader) = loader(false);
        let tables = loader.load(Month::new(2024, 3).unwrap()).unwrap();
        let fam1 = &tables.catalog[0];
        assert_eq!(fam1.group_key.as_deref(), Some("FAM1"));
        assert_eq!(fam1.business_unit_name.as_deref(), Some("Clinical"));
        // No dim_business_unit row: the name falls back to the code, then the remap applies.
        let fam2 = &tables.catalog[1];
        assert_eq!(fam2.business_unit_code.as_deref(), Some("D200"));
        assert_eq!(fam2.business_unit_name.as_deref(), Some("D200"));
    }

    #[test]
    fn missing_database_is_missing_source() {
        let dir = tempdir().unwrap();
        let err = SqliteLoader::new(dir.path().join("none.db"))
            .load(Month::new(2024, 3).unwrap())
            .unwrap_err();
        assert!(matches!(err, ReconError::MissingSource(_)));
    }
}
