//! Tabular reading for workbook and CSV sources.
//!
//! Every source file is read into a [`Table`] of loosely typed [`Cell`]s; the
//! loaders then pull typed columns out by header name.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use facc_recon::normalize::{coerce_or_zero, finite_or_zero};
use facc_recon::ReconError;

/// One cell as read from a workbook, CSV file or database row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

/// Day zero of the 1900 date system as Excel counts it (with the leap-year bug).
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    let date = excel_epoch()?.checked_add_signed(Duration::days(days as i64))?;
    date.and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::seconds(seconds))
}

impl Cell {
    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Empty,
            Data::String(s) => Self::Text(s.clone()),
            Data::Float(n) => Self::Number(*n),
            Data::Int(n) => Self::Number(*n as f64),
            Data::Bool(b) => Self::Bool(*b),
            // Assumes the 1900 date system.
            Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
                .map(Self::DateTime)
                .unwrap_or(Self::Number(dt.as_f64())),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Self::Text(s.clone()),
            Data::Error(_) => Self::Empty,
        }
    }

    /// Text value; `None` for a blank cell.
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }),
            Self::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Self::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Numeric value, coerced to 0 when missing or unparseable.
    pub fn number(&self) -> f64 {
        match self {
            Self::Number(n) => finite_or_zero(*n),
            Self::Text(s) => coerce_or_zero(s),
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Empty | Self::DateTime(_) => 0.0,
        }
    }

    /// Date value: Excel serials, `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS`.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::DateTime(dt) => Some(dt.date()),
            Self::Number(n) => serial_to_datetime(*n).map(|dt| dt.date()),
            Self::Text(s) => parse_date_text(s),
            Self::Empty | Self::Bool(_) => None,
        }
    }

    /// Boolean flag: `TRUE`, `true`, `1`.
    pub fn flag(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n == 1.0,
            Self::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "1.0"),
            Self::Empty | Self::DateTime(_) => false,
        }
    }
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// A sheet with a header row.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

const EMPTY: Cell = Cell::Empty;

impl Table {
    pub fn from_grid(name: &str, mut grid: Vec<Vec<Cell>>) -> Self {
        if grid.is_empty() {
            return Self { name: name.to_string(), headers: Vec::new(), rows: Vec::new() };
        }
        let header_row = grid.remove(0);
        let headers = header_row
            .iter()
            .map(|c| c.text().map(|s| s.trim().to_string()).unwrap_or_default())
            .collect();
        Self { name: name.to_string(), headers, rows: grid }
    }

    pub fn optional_column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    pub fn column(&self, header: &str) -> Result<usize, ReconError> {
        self.optional_column(header).ok_or_else(|| ReconError::MissingColumn {
            table: self.name.clone(),
            column: header.to_string(),
        })
    }

    /// Cell at `col` in `row`, blank when the row is short or `col` is absent.
    pub fn cell<'a>(row: &'a [Cell], col: Option<usize>) -> &'a Cell {
        col.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv") || e.eq_ignore_ascii_case("tsv"))
        .unwrap_or(false)
}

/// Read a header-first table. `sheet = None` reads the first sheet; CSV files
/// ignore `sheet`.
pub fn read_table(path: &Path, sheet: Option<&str>, name: &str) -> Result<Table, ReconError> {
    if is_csv(path) {
        read_csv(path, name)
    } else {
        Ok(Table::from_grid(name, read_sheet_grid(path, sheet, false)?))
    }
}

/// Every row of a sheet, positioned from cell A1.
pub fn read_raw_sheet(path: &Path, sheet: &str) -> Result<Vec<Vec<Cell>>, ReconError> {
    if is_csv(path) {
        let content = read_file_as_utf8(path)?;
        return csv_records(&content, sniff_delimiter(&content));
    }
    read_sheet_grid(path, Some(sheet), true)
}

fn read_sheet_grid(
    path: &Path,
    sheet: Option<&str>,
    from_origin: bool,
) -> Result<Vec<Vec<Cell>>, ReconError> {
    if !path.exists() {
        return Err(ReconError::MissingSource(path.display().to_string()));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| ReconError::SourceLayout {
        table: path.display().to_string(),
        message: format!("cannot open workbook: {e}"),
    })?;

    let sheet_name = match sheet {
        Some(s) => s.to_string(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| {
            ReconError::SourceLayout {
                table: path.display().to_string(),
                message: "workbook has no sheets".into(),
            }
        })?,
    };
    if !workbook.sheet_names().iter().any(|s| *s == sheet_name) {
        return Err(ReconError::SourceLayout {
            table: path.display().to_string(),
            message: format!("sheet '{sheet_name}' not found"),
        });
    }
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ReconError::SourceLayout {
            table: path.display().to_string(),
            message: format!("cannot read sheet '{sheet_name}': {e}"),
        })?;
    Ok(range_to_grid(&range, from_origin))
}

fn range_to_grid(range: &Range<Data>, from_origin: bool) -> Vec<Vec<Cell>> {
    let (start_row, start_col) = match (from_origin, range.start()) {
        (true, Some((r, c))) => (r as usize, c as usize),
        _ => (0, 0),
    };
    let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col];
        cells.extend(row.iter().map(Cell::from_data));
        grid.push(cells);
    }
    grid
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn read_csv(path: &Path, name: &str) -> Result<Table, ReconError> {
    let content = read_file_as_utf8(path)?;
    let grid = csv_records(&content, sniff_delimiter(&content))?;
    Ok(Table::from_grid(name, grid))
}

fn csv_records(content: &str, delimiter: u8) -> Result<Vec<Vec<Cell>>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReconError::SourceLayout {
            table: "csv".into(),
            message: e.to_string(),
        })?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(grid)
}

/// Pick the delimiter (tab, semicolon, comma, pipe) giving the most consistent
/// field count over the first lines.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();
    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;
    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

/// Read a text file as UTF-8, falling back to Windows-1252.
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReconError> {
    let mut file = std::fs::File::open(path)
        .map_err(|_| ReconError::MissingSource(path.display().to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cell_coercions() {
        assert_eq!(Cell::Text(" 12.5 ".into()).number(), 12.5);
        assert_eq!(Cell::Text("n/a".into()).number(), 0.0);
        assert_eq!(Cell::Number(f64::NAN).number(), 0.0);
        assert_eq!(Cell::Number(42.0).text().as_deref(), Some("42"));
        assert_eq!(Cell::Empty.text(), None);
        assert!(Cell::Bool(true).flag());
        assert!(Cell::Number(1.0).flag());
        assert!(!Cell::Text("False".into()).flag());
    }

    #[test]
    fn dates_from_serials_and_text() {
        let mar = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(Cell::Number(45352.0).date(), mar);
        assert_eq!(Cell::Text("2024-03-01".into()).date(), mar);
        assert_eq!(Cell::Text("2024-03-01 00:00:00".into()).date(), mar);
        assert_eq!(Cell::Text("March".into()).date(), None);
    }

    #[test]
    fn csv_with_semicolons_and_latin1() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("actuals.csv");
        let mut bytes = b"Product;Division;Note\nP1;D100;caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\nP2;D200;\n");
        fs::write(&path, bytes).unwrap();

        let table = read_table(&path, None, "actuals").unwrap();
        assert_eq!(table.headers, vec!["Product", "Division", "Note"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2], Cell::Text("café".into()));
        assert_eq!(Table::cell(&table.rows[1], Some(2)), &Cell::Empty);
        assert!(matches!(
            table.column("Month"),
            Err(ReconError::MissingColumn { .. })
        ));
    }

    #[test]
    fn missing_file_is_missing_source() {
        let dir = tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.xlsx"), None, "catalog").unwrap_err();
        assert!(matches!(err, ReconError::MissingSource(_)));
    }

    #[test]
    fn workbook_round_trip_keeps_positions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.xlsx");
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet().set_name("Data").unwrap();
        ws.write_string(2, 1, "FY26").unwrap();
        ws.write_number(2, 2, 7.0).unwrap();
        wb.save(&path).unwrap();

        let grid = read_raw_sheet(&path, "Data").unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[2][1], Cell::Text("FY26".into()));
        assert_eq!(grid[2][2], Cell::Number(7.0));

        let err = read_raw_sheet(&path, "Other").unwrap_err();
        assert!(matches!(err, ReconError::SourceLayout { .. }));
    }
}
