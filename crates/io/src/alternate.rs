//! Alternate marketing layout: a header-less yearly sheet ("2026 Data").
//!
//! Columns from the start row: fiscal year, BU, Location, Geography, Product,
//! Period, Budget $, Forecast $, (blank), Budget Qty, Forecast Qty.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::info;

use facc_recon::config::{SourceConfig, SourceKind};
use facc_recon::model::{MarketingForecastRow, SourceTables};
use facc_recon::{Month, ReconError, SourceLoader};

use crate::legacy::FileSources;
use crate::table::{read_raw_sheet, Cell, Table};

const COLUMN_COUNT: usize = 11;
const DEFAULT_FISCAL_YEAR: i32 = 26;

fn fiscal_year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"FY(\d{2})").expect("literal pattern"))
}

/// `FY26` → 2026; anything without two FY digits falls back to 2026.
pub fn fiscal_year(text: &str) -> i32 {
    let upper = text.trim().to_ascii_uppercase();
    let short = fiscal_year_pattern()
        .captures(&upper)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(DEFAULT_FISCAL_YEAR);
    2000 + short
}

/// Text of a cell, trimmed. Blank cells stay `None`.
fn trimmed(cell: &Cell) -> Option<String> {
    cell.text().map(|s| s.trim().to_string())
}

/// Parse grid rows from the 1-based `start_row` into marketing rows.
pub fn parse_rows(
    grid: &[Vec<Cell>],
    sheet: &str,
    start_row: usize,
) -> Result<Vec<MarketingForecastRow>, ReconError> {
    let start = start_row.saturating_sub(1);
    let layout = |message: String| ReconError::SourceLayout { table: sheet.to_string(), message };
    if grid.len() <= start {
        return Err(layout(format!("no data at row {start_row}")));
    }
    let data = &grid[start..];
    let widest = data.iter().map(Vec::len).max().unwrap_or(0);
    if widest < COLUMN_COUNT {
        return Err(layout(format!(
            "expected at least {COLUMN_COUNT} columns from row {start_row}"
        )));
    }

    let mut rows = Vec::new();
    for row in data {
        let col = |i: usize| Table::cell(row, Some(i));
        let period = trimmed(col(5)).unwrap_or_default();
        let Some(month) = Month::number_from_abbrev(&period) else {
            continue;
        };
        let year = fiscal_year(&trimmed(col(0)).unwrap_or_default());
        let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) else {
            continue;
        };
        rows.push(MarketingForecastRow {
            bu: trimmed(col(1)),
            location: trimmed(col(2)),
            geography: trimmed(col(3)),
            product: trimmed(col(4)),
            date: Some(date),
            budget_dollars: col(6).number(),
            forecast_dollars: col(7).number(),
            budget_quantity: col(9).number(),
            forecast_quantity: col(10).number(),
        });
    }

    if rows.is_empty() {
        return Err(layout("no month rows found after parsing".into()));
    }
    Ok(rows)
}

/// The parsed sheet must cover every calendar month exactly once overall.
pub fn validate_months(rows: &[MarketingForecastRow], sheet: &str) -> Result<(), ReconError> {
    let months: BTreeSet<u32> = rows
        .iter()
        .filter_map(|r| r.date)
        .map(|d| Month::of(d).number())
        .collect();
    if months.len() != 12 {
        return Err(ReconError::SourceLayout {
            table: sheet.to_string(),
            message: format!("expected 12 months in parsed marketing data, found {}", months.len()),
        });
    }
    Ok(())
}

pub fn read_alternate_marketing(
    path: &Path,
    sheet: &str,
    start_row: usize,
) -> Result<Vec<MarketingForecastRow>, ReconError> {
    let grid = read_raw_sheet(path, sheet)?;
    let rows = parse_rows(&grid, sheet, start_row)?;
    validate_months(&rows, sheet)?;
    info!(rows = rows.len(), sheet, "parsed alternate marketing sheet");
    Ok(rows)
}

/// Loads the yearly marketing sheet plus the shared files.
#[derive(Debug, Clone)]
pub struct AlternateLoader {
    files: FileSources,
}

impl AlternateLoader {
    pub fn new(base_dir: impl Into<PathBuf>, source: SourceConfig) -> Self {
        Self { files: FileSources::new(base_dir, source) }
    }
}

impl SourceLoader for AlternateLoader {
    fn kind(&self) -> SourceKind {
        SourceKind::Alternate
    }

    fn load(&self, month: Month) -> Result<SourceTables, ReconError> {
        let source = &self.files.source;
        let path = self
            .files
            .resolve(source.alternate_file.as_deref(), "alternate_file")?;
        let marketing =
            read_alternate_marketing(&path, &source.alternate_sheet, source.alternate_start_row)?;
        let mut tables = self.files.load_shared(month)?;
        tables.marketing = marketing;
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn data_row(fy: &str, period: &str, forecast_qty: f64) -> Vec<Cell> {
        vec![
            text(fy),
            text(" D100 "),
            text("LOC1"),
            text("AMERICAS"),
            text("P1"),
            text(period),
            Cell::Number(10.0),
            Cell::Number(20.0),
            Cell::Empty,
            Cell::Number(30.0),
            Cell::Number(forecast_qty),
        ]
    }

    fn header_rows() -> Vec<Vec<Cell>> {
        vec![vec![text("title")], Vec::new()]
    }

    #[test]
    fn fiscal_year_parsing() {
        assert_eq!(fiscal_year("FY25"), 2025);
        assert_eq!(fiscal_year("fy27 plan"), 2027);
        assert_eq!(fiscal_year("2026"), 2026);
    }

    #[test]
    fn keeps_only_month_rows() {
        let mut grid = header_rows();
        grid.push(data_row("FY25", "Jan", 5.0));
        grid.push(data_row("FY25", "Q1", 99.0));
        grid.push(data_row("FY25", "Total", 99.0));
        grid.push(data_row("FY25", "feb", 6.0));

        let rows = parse_rows(&grid, "2026 Data", 3).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(rows[0].bu.as_deref(), Some("D100"));
        assert_eq!(rows[0].forecast_dollars, 20.0);
        assert_eq!(rows[0].budget_quantity, 30.0);
        assert_eq!(rows[1].forecast_quantity, 6.0);
    }

    #[test]
    fn start_row_past_end_is_layout_error() {
        let err = parse_rows(&header_rows(), "2026 Data", 6).unwrap_err();
        assert!(matches!(err, ReconError::SourceLayout { .. }));
    }

    #[test]
    fn narrow_sheet_is_layout_error() {
        let grid = vec![vec![text("FY26"), text("D100"), text("Jan")]];
        let err = parse_rows(&grid, "2026 Data", 1).unwrap_err();
        assert!(err.to_string().contains("11 columns"));
    }

    #[test]
    fn requires_twelve_months() {
        let labels = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
        let grid: Vec<Vec<Cell>> = labels.iter().map(|m| data_row("FY26", m, 1.0)).collect();
        let rows = parse_rows(&grid, "2026 Data", 1).unwrap();
        validate_months(&rows, "2026 Data").unwrap();

        let err = validate_months(&rows[..11], "2026 Data").unwrap_err();
        assert!(err.to_string().contains("found 11"));
    }
}
