//! Plain data sheets: one header row, one row per record.

use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};

use facc_recon::metrics::{DashboardRow, Grain, GrainKey, MetricKind};
use facc_recon::model::{
    ActualsRollupRow, MappedMarketingRow, MarketingRollupRow, ProductCatalogEntry,
    ReconciledRecord, SkippedRecord, StatsRollupRow, UnitType,
};
use facc_recon::{Month, ReconError};

use crate::xlsx_styles;

/// Excel allows at most 31 characters in a sheet name.
pub const MAX_SHEET_NAME: usize = 31;

pub fn xlsx_err(context: &str) -> impl Fn(XlsxError) -> ReconError + '_ {
    move |e| ReconError::Io(format!("{context}: {e}"))
}

/// One typed cell of a data sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Blank,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for Field {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<&Option<String>> for Field {
    fn from(s: &Option<String>) -> Self {
        s.as_ref().map_or(Self::Blank, |s| Self::Text(s.clone()))
    }
}

impl From<f64> for Field {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<Option<f64>> for Field {
    fn from(n: Option<f64>) -> Self {
        n.map_or(Self::Blank, Self::Number)
    }
}

impl From<usize> for Field {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Field {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Option<NaiveDate>> for Field {
    fn from(d: Option<NaiveDate>) -> Self {
        d.map_or(Self::Blank, Self::Date)
    }
}

impl From<Month> for Field {
    fn from(m: Month) -> Self {
        Self::Date(m.first_day())
    }
}

fn excel_date(d: NaiveDate) -> Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_ymd(d.year() as u16, d.month() as u8, d.day() as u8)
}

pub fn write_field(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    field: &Field,
    date_format: &Format,
) -> Result<(), XlsxError> {
    match field {
        Field::Blank => {}
        Field::Text(s) => {
            ws.write_string(row, col, s)?;
        }
        Field::Number(n) => {
            if n.is_finite() {
                ws.write_number(row, col, *n)?;
            }
        }
        Field::Bool(b) => {
            ws.write_boolean(row, col, *b)?;
        }
        Field::Date(d) => {
            ws.write_datetime_with_format(row, col, &excel_date(*d)?, date_format)?;
        }
    }
    Ok(())
}

/// A named sheet of records ready to write.
#[derive(Debug, Clone)]
pub struct DataSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Field>>,
}

impl DataSheet {
    pub fn new(name: impl Into<String>, headers: &[impl AsRef<str>]) -> Self {
        let name: String = name.into().chars().take(MAX_SHEET_NAME).collect();
        let headers = headers.iter().map(|h| h.as_ref().to_string()).collect();
        Self { name, headers, rows: Vec::new() }
    }

    pub fn push(&mut self, row: Vec<Field>) {
        self.rows.push(row);
    }

    /// Add the sheet to `workbook`; returns it for further formatting.
    pub fn write<'a>(
        &self,
        workbook: &'a mut Workbook,
        header_format: &Format,
    ) -> Result<&'a mut Worksheet, ReconError> {
        self.write_at(workbook, header_format, 0)
    }

    /// Like [`DataSheet::write`], with the header on `header_row`.
    pub fn write_at<'a>(
        &self,
        workbook: &'a mut Workbook,
        header_format: &Format,
        header_row: u32,
    ) -> Result<&'a mut Worksheet, ReconError> {
        let ws = workbook
            .add_worksheet()
            .set_name(&self.name)
            .map_err(xlsx_err(&self.name))?;
        let date_format = xlsx_styles::date();
        for (col, header) in self.headers.iter().enumerate() {
            ws.write_string_with_format(header_row, col as u16, header, header_format)
                .map_err(xlsx_err(&self.name))?;
        }
        for (i, row) in self.rows.iter().enumerate() {
            for (col, field) in row.iter().enumerate() {
                write_field(ws, header_row + 1 + i as u32, col as u16, field, &date_format)
                    .map_err(xlsx_err(&self.name))?;
            }
        }
        for col in 0..self.headers.len() {
            ws.set_column_width(col as u16, 16).map_err(xlsx_err(&self.name))?;
        }
        Ok(ws)
    }
}

// ---------------------------------------------------------------------------
// Record tables
// ---------------------------------------------------------------------------

pub fn raw_data_sheet(name: &str, records: &[ReconciledRecord]) -> DataSheet {
    let mut sheet = DataSheet::new(
        name,
        &[
            "Product", "Division", "Month", "sku", "Prod Fam", "Units", "Actuals",
            "Stats Model Fcast", "Marketing Fcast", "Stats Abs Error", "Marketing Abs Error",
            "BU Name", "Marketing Manager",
        ],
    );
    for r in records {
        sheet.push(vec![
            (&r.product).into(),
            (&r.division).into(),
            r.month.into(),
            "".into(),
            (&r.prod_fam).into(),
            r.units.as_str().into(),
            r.actuals.into(),
            r.stats_fcast.into(),
            r.marketing_fcast.into(),
            r.stats_abs_error.into(),
            r.marketing_abs_error.into(),
            (&r.bu_name).into(),
            (&r.marketing_manager).into(),
        ]);
    }
    sheet
}

pub fn skipped_sheet(skipped: &[SkippedRecord]) -> DataSheet {
    let mut sheet = DataSheet::new("Skipped Products", &["BU", "Product", "Date", "Reason"]);
    for s in skipped {
        sheet.push(vec![(&s.bu).into(), (&s.product).into(), s.date.into(), (&s.reason).into()]);
    }
    sheet
}

pub fn lookup_sheet(catalog: &[ProductCatalogEntry]) -> DataSheet {
    let mut sheet = DataSheet::new(
        "Lookup",
        &[
            "group_key", "business_unit_code", "business_unit_name", "sku_list",
            "product_family", "marketing_manager", "salesforce_feature_mode",
        ],
    );
    for c in catalog {
        sheet.push(vec![
            (&c.group_key).into(),
            (&c.business_unit_code).into(),
            (&c.business_unit_name).into(),
            (&c.sku_list).into(),
            (&c.product_family).into(),
            (&c.marketing_manager).into(),
            (&c.salesforce_feature_mode).into(),
        ]);
    }
    sheet
}

pub fn mapped_sheet(mapped: &[MappedMarketingRow]) -> DataSheet {
    let mut sheet = DataSheet::new(
        "Marketing Mapped",
        &[
            "BU", "Location", "Product", "Date", "group_key", "business_unit_code",
            "business_unit_name", "product_family", "marketing_manager", "Units",
            "Marketing Fcast",
        ],
    );
    for m in mapped {
        sheet.push(vec![
            (&m.bu).into(),
            (&m.location).into(),
            (&m.product).into(),
            m.date.into(),
            (&m.group_key).into(),
            (&m.business_unit_code).into(),
            (&m.business_unit_name).into(),
            (&m.product_family).into(),
            (&m.marketing_manager).into(),
            m.units.as_str().into(),
            m.marketing_fcast.into(),
        ]);
    }
    sheet
}

pub fn marketing_rollup_sheet(rows: &[MarketingRollupRow]) -> DataSheet {
    let mut sheet = DataSheet::new(
        "Marketing Rollup",
        &[
            "group_key", "business_unit_code", "business_unit_name", "product_family",
            "marketing_manager", "Units", "Marketing_Fcast", "_product_key", "_bu_key",
        ],
    );
    for r in rows {
        sheet.push(vec![
            (&r.group_key).into(),
            (&r.business_unit_code).into(),
            (&r.business_unit_name).into(),
            (&r.product_family).into(),
            (&r.marketing_manager).into(),
            r.units.as_str().into(),
            r.marketing_fcast.into(),
            (&r.product_key).into(),
            (&r.bu_key).into(),
        ]);
    }
    sheet
}

pub fn actuals_rollup_sheet(rows: &[ActualsRollupRow]) -> DataSheet {
    let mut sheet = DataSheet::new("Actuals Rollup", &["_product_key", "_bu_key", "Actuals"]);
    for r in rows {
        sheet.push(vec![(&r.product_key).into(), (&r.bu_key).into(), r.actuals.into()]);
    }
    sheet
}

pub fn stats_rollup_sheet(rows: &[StatsRollupRow]) -> DataSheet {
    let mut sheet = DataSheet::new(
        "Stats Rollup (BLEND)",
        &["_product_key", "_bu_key", "forecast_value_blend", "forecast_value_fallback", "forecast_value"],
    );
    for r in rows {
        sheet.push(vec![
            (&r.product_key).into(),
            (&r.bu_key).into(),
            r.blend.into(),
            r.fallback.into(),
            r.forecast_value.into(),
        ]);
    }
    sheet
}

/// Key columns of a dashboard view, by grain.
pub fn key_headers(grain: Grain) -> &'static [&'static str] {
    match grain {
        Grain::Total | Grain::BusinessUnit => &["Units", "Scope", "BU Code", "BU Name"],
        Grain::ProductFamily => &["Units", "BU Code", "BU Name", "Prod Fam"],
        Grain::Manager => &["Units", "BU Code", "BU Name", "Marketing Manager"],
        Grain::Product => &["Units", "BU Code", "BU Name", "Product", "Marketing Manager"],
    }
}

/// Key column values followed by the metric label.
pub fn key_fields(units: &UnitType, grain: Grain, k: &GrainKey, metric: MetricKind) -> Vec<Field> {
    let mut fields: Vec<Field> = vec![units.as_str().into()];
    match grain {
        Grain::Total => fields.push("Total".into()),
        Grain::BusinessUnit => fields.push("BU".into()),
        _ => {}
    }
    fields.push((&k.bu_code).into());
    fields.push((&k.bu_name).into());
    match grain {
        Grain::ProductFamily => fields.push((&k.prod_fam).into()),
        Grain::Manager => fields.push((&k.manager).into()),
        Grain::Product => {
            fields.push((&k.product).into());
            fields.push((&k.manager).into());
        }
        Grain::Total | Grain::BusinessUnit => {}
    }
    fields.push(metric.label().into());
    fields
}

/// Grain whose key columns a dashboard view's sheets carry.
pub fn view_grain(view: &str) -> Grain {
    match view {
        "Totals" => Grain::Total,
        "Mkt Mgr" => Grain::Manager,
        "Product" => Grain::Product,
        _ => Grain::ProductFamily,
    }
}

/// Dashboard metric rows as a flat table; `grain` picks the key columns.
pub fn dashboard_data_sheet(name: &str, grain: Grain, rows: &[DashboardRow]) -> DataSheet {
    let mut headers = key_headers(grain).to_vec();
    headers.extend(["Metric", "Stats Model", "Marketing"]);
    let mut sheet = DataSheet::new(name, &headers);
    for r in rows {
        let mut fields = key_fields(&r.units, r.grain, &r.key, r.metric);
        fields.push(r.stats_model.into());
        fields.push(r.marketing.into());
        sheet.push(fields);
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use facc_recon::metrics::build_dashboards;

    fn record() -> ReconciledRecord {
        ReconciledRecord {
            product: Some("FAM1".into()),
            division: Some("D100".into()),
            month: Month::new(2024, 3).unwrap(),
            prod_fam: Some("Family".into()),
            units: UnitType::Quantity,
            actuals: 120.0,
            stats_fcast: 0.0,
            marketing_fcast: 100.0,
            stats_abs_error: 120.0,
            marketing_abs_error: 20.0,
            bu_name: None,
            marketing_manager: Some("Pat".into()),
        }
    }

    #[test]
    fn raw_rows_keep_blanks() {
        let sheet = raw_data_sheet("Raw Data", &[record()]);
        assert_eq!(sheet.headers.len(), sheet.rows[0].len());
        assert_eq!(sheet.rows[0][2], Field::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert_eq!(sheet.rows[0][11], Field::Blank);
    }

    #[test]
    fn totals_data_has_scope_column() {
        let dashboards = build_dashboards(&[record()]);
        let sheet = dashboard_data_sheet("Totals Data", Grain::Total, &dashboards.totals);
        assert_eq!(
            sheet.headers,
            vec!["Units", "Scope", "BU Code", "BU Name", "Metric", "Stats Model", "Marketing"]
        );
        for row in &sheet.rows {
            assert_eq!(row.len(), sheet.headers.len());
        }
        let scopes: Vec<&Field> = sheet.rows.iter().map(|r| &r[1]).collect();
        assert!(scopes.contains(&&Field::Text("BU".into())));
        assert!(scopes.contains(&&Field::Text("Total".into())));
    }

    #[test]
    fn product_data_columns_line_up() {
        let dashboards = build_dashboards(&[record()]);
        let sheet = dashboard_data_sheet("Product Data", Grain::Product, &dashboards.product);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].len(), sheet.headers.len());
        assert_eq!(sheet.rows[0][3], Field::Text("FAM1".into()));
    }

    #[test]
    fn long_names_are_truncated() {
        let sheet = DataSheet::new("Dashboard - Prod Fam WAPE Data Extra", &["a"]);
        assert_eq!(sheet.name.len(), MAX_SHEET_NAME);
    }
}
