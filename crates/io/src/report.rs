//! Primary report and validation workbooks for one month.
//!
//! The primary workbook opens with five formatted dashboards followed by the
//! hidden data sheets they were drawn from. The validation workbook carries the
//! intermediate join and rollup tables for manual checking.

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Workbook, Worksheet};
use tracing::info;

use facc_recon::metrics::{
    display_order, ordered_business_units, DashboardRow, Dashboards, Grain, MetricKind, Side,
};
use facc_recon::{Month, MonthlyReport, ReconError, UnitType};

use crate::xlsx::{
    actuals_rollup_sheet, dashboard_data_sheet, lookup_sheet, mapped_sheet,
    marketing_rollup_sheet, raw_data_sheet, skipped_sheet, stats_rollup_sheet, view_grain, xlsx_err, DataSheet,
};
use crate::xlsx_styles::{self, DashboardStyles};

const ROW_HEIGHT: f64 = 18.0;

pub fn report_file_name(month: Month) -> String {
    format!("{} Forecast Accuracy Report.xlsx", month.label())
}

pub fn validation_file_name(month: Month) -> String {
    format!("{} Forecast Accuracy Validation.xlsx", month.label())
}

// ---------------------------------------------------------------------------
// Dashboard painter
// ---------------------------------------------------------------------------

/// Writes dashboard blocks top to bottom, tracking the next free row.
struct Painter<'a> {
    ws: &'a mut Worksheet,
    styles: &'a DashboardStyles,
    sheet: String,
    row: u32,
}

impl<'a> Painter<'a> {
    fn new(
        workbook: &'a mut Workbook,
        styles: &'a DashboardStyles,
        name: &str,
        widths: &[f64],
    ) -> Result<Self, ReconError> {
        let ws = workbook.add_worksheet().set_name(name).map_err(xlsx_err(name))?;
        ws.set_screen_gridlines(false);
        for (col, width) in widths.iter().enumerate() {
            ws.set_column_width(col as u16, *width).map_err(xlsx_err(name))?;
        }
        Ok(Self { ws, styles, sheet: name.to_string(), row: 0 })
    }

    fn skip(&mut self, rows: u32) {
        self.row += rows;
    }

    fn title(&mut self, text: &str) -> Result<(), ReconError> {
        self.ws
            .write_string_with_format(self.row, 0, text, &self.styles.title)
            .map_err(xlsx_err(&self.sheet))?;
        self.skip(2);
        Ok(())
    }

    /// Merged banner over the first `span` columns.
    fn section(&mut self, text: &str, span: u16) -> Result<(), ReconError> {
        self.ws
            .merge_range(self.row, 0, self.row, span - 1, text, &self.styles.section)
            .map_err(xlsx_err(&self.sheet))?;
        self.skip(2);
        Ok(())
    }

    fn label(&mut self, text: &str) -> Result<(), ReconError> {
        self.ws
            .write_string_with_format(self.row, 0, text, &self.styles.label)
            .map_err(xlsx_err(&self.sheet))?;
        self.skip(1);
        Ok(())
    }

    fn header(&mut self, headers: &[&str]) -> Result<(), ReconError> {
        for (col, h) in headers.iter().enumerate() {
            self.ws
                .write_string_with_format(self.row, col as u16, *h, &self.styles.header)
                .map_err(xlsx_err(&self.sheet))?;
        }
        self.skip(1);
        Ok(())
    }

    /// Leading text cells, then the stats and marketing values as percents.
    fn metric_row(
        &mut self,
        labels: &[&str],
        row: &DashboardRow,
        highlight: Option<Side>,
        hidden: bool,
    ) -> Result<(), ReconError> {
        let err = xlsx_err(&self.sheet);
        for (col, text) in labels.iter().enumerate() {
            self.ws
                .write_string_with_format(self.row, col as u16, *text, &self.styles.cell)
                .map_err(&err)?;
        }
        for (offset, side) in Side::ALL.into_iter().enumerate() {
            let col = (labels.len() + offset) as u16;
            let format = if highlight == Some(side) {
                &self.styles.percent_winner
            } else {
                &self.styles.percent
            };
            match row.value(side).filter(|v| v.is_finite()) {
                Some(v) => self.ws.write_number_with_format(self.row, col, v, format),
                None => self.ws.write_blank(self.row, col, format),
            }
            .map_err(&err)?;
        }
        if hidden {
            self.ws.set_row_hidden(self.row).map_err(&err)?;
        }
        drop(err);
        self.skip(1);
        Ok(())
    }

    fn finish(self) -> Result<(), ReconError> {
        for r in 0..self.row {
            self.ws
                .set_row_height(r, ROW_HEIGHT)
                .map_err(xlsx_err(&self.sheet))?;
        }
        Ok(())
    }
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn bu_title(code: &str, name: &str) -> String {
    format!("{name} ({code})")
}

/// BU pairs with both code and name present, in display order.
fn business_units(rows: &[&DashboardRow]) -> Vec<(String, String)> {
    ordered_business_units(rows.iter().copied())
        .into_iter()
        .filter_map(|(code, name)| Some((code?, name?)))
        .collect()
}

fn in_bu<'r>(rows: &[&'r DashboardRow], code: &str, name: &str) -> Vec<&'r DashboardRow> {
    rows.iter()
        .copied()
        .filter(|r| r.key.bu_code.as_deref() == Some(code) && r.key.bu_name.as_deref() == Some(name))
        .collect()
}

fn of_units<'r>(rows: &[&'r DashboardRow], units: &UnitType) -> Vec<&'r DashboardRow> {
    rows.iter().copied().filter(|r| &r.units == units).collect()
}

// ---------------------------------------------------------------------------
// Dashboards
// ---------------------------------------------------------------------------

fn paint_totals(painter: &mut Painter<'_>, rows: &[DashboardRow]) -> Result<(), ReconError> {
    painter.title("Forecast Accuracy Dashboard - Totals")?;

    for (scope, grain) in [("Totals", Grain::Total), ("By Business Unit", Grain::BusinessUnit)] {
        let scoped: Vec<&DashboardRow> = rows.iter().filter(|r| r.grain == grain).collect();
        if scoped.is_empty() {
            continue;
        }
        painter.section(scope, 3)?;

        for (code, name) in business_units(&scoped) {
            let bu_rows = in_bu(&scoped, &code, &name);
            if bu_rows.is_empty() {
                continue;
            }
            painter.label(&bu_title(&code, &name))?;
            for units in UnitType::REPORTED {
                let unit_rows = of_units(&bu_rows, &units);
                if unit_rows.is_empty() {
                    continue;
                }
                painter.label(&units.title())?;
                painter.header(&["Metric", "Stats Model", "Marketing"])?;
                for metric in [MetricKind::Accuracy, MetricKind::Wape] {
                    let Some(row) = unit_rows.iter().find(|r| r.metric == metric) else {
                        continue;
                    };
                    let hidden = metric == MetricKind::Wape;
                    painter.metric_row(&[metric.label()], row, row.winner().side(), hidden)?;
                }
                painter.skip(1);
            }
            painter.skip(1);
        }
    }
    Ok(())
}

/// Layout shared by the family, family WAPE and manager dashboards.
struct GroupedView {
    title: &'static str,
    first_header: &'static str,
    metric: MetricKind,
}

fn paint_grouped(
    painter: &mut Painter<'_>,
    view: &GroupedView,
    rows: &[DashboardRow],
) -> Result<(), ReconError> {
    painter.title(view.title)?;
    let all: Vec<&DashboardRow> = rows.iter().collect();

    for (code, name) in business_units(&all) {
        let bu_rows = in_bu(&all, &code, &name);
        if bu_rows.is_empty() {
            continue;
        }
        painter.section(&bu_title(&code, &name), 4)?;
        for units in UnitType::REPORTED {
            let unit_rows = of_units(&bu_rows, &units);
            if unit_rows.is_empty() {
                continue;
            }
            painter.label(&units.title())?;
            painter.header(&[view.first_header, "Metric", "Stats Model", "Marketing"])?;
            let listed = unit_rows.into_iter().filter(|r| r.metric == view.metric).collect();
            for row in display_order(listed) {
                let group = match row.grain {
                    Grain::Manager => text(&row.key.manager),
                    _ => text(&row.key.prod_fam),
                };
                painter.metric_row(&[group, row.metric.label()], row, row.winner().side(), false)?;
            }
            painter.skip(1);
        }
        painter.skip(1);
    }
    Ok(())
}

fn paint_product(painter: &mut Painter<'_>, rows: &[DashboardRow]) -> Result<(), ReconError> {
    painter.title("Forecast Accuracy Dashboard - Product")?;
    let all: Vec<&DashboardRow> = rows.iter().collect();

    for (code, name) in business_units(&all) {
        let bu_rows = in_bu(&all, &code, &name);
        if bu_rows.is_empty() {
            continue;
        }
        painter.section(&bu_title(&code, &name), 4)?;
        for units in UnitType::REPORTED {
            let unit_rows = of_units(&bu_rows, &units);
            if unit_rows.is_empty() {
                continue;
            }
            painter.label(&units.title())?;
            painter.header(&["Product", "Marketing Manager", "Stats Model", "Marketing"])?;
            let listed = unit_rows
                .into_iter()
                .filter(|r| r.metric == MetricKind::Accuracy)
                .collect();
            for row in display_order(listed) {
                let suppressed = row.is_suppressed();
                let highlight = if suppressed { None } else { row.winner().side() };
                painter.metric_row(
                    &[text(&row.key.product), text(&row.key.manager)],
                    row,
                    highlight,
                    suppressed,
                )?;
            }
            painter.skip(1);
        }
        painter.skip(1);
    }
    Ok(())
}

fn write_dashboards(workbook: &mut Workbook, dashboards: &Dashboards) -> Result<(), ReconError> {
    let styles = DashboardStyles::new();

    let mut painter = Painter::new(workbook, &styles, "Dashboard - Totals", &[24.0, 20.0, 18.0, 18.0])?;
    paint_totals(&mut painter, &dashboards.totals)?;
    painter.finish()?;

    let family_widths = [28.0, 22.0, 20.0, 18.0, 18.0];
    let mut painter = Painter::new(workbook, &styles, "Dashboard - Prod Fam", &family_widths)?;
    painter.ws.set_column_hidden(1).map_err(xlsx_err("Dashboard - Prod Fam"))?;
    let view = GroupedView {
        title: "Forecast Accuracy Dashboard - Product Family",
        first_header: "Prod Fam",
        metric: MetricKind::Accuracy,
    };
    paint_grouped(&mut painter, &view, &dashboards.prod_fam)?;
    painter.finish()?;

    let mut painter = Painter::new(workbook, &styles, "Dashboard - Prod Fam WAPE", &family_widths)?;
    painter.ws.set_hidden(true);
    let view = GroupedView {
        title: "Forecast Accuracy Dashboard - Product Family (WAPE)",
        first_header: "Prod Fam",
        metric: MetricKind::Wape,
    };
    paint_grouped(&mut painter, &view, &dashboards.prod_fam_wape)?;
    painter.finish()?;

    let mut painter = Painter::new(workbook, &styles, "Dashboard - Mkt Mgr", &[30.0, 22.0, 18.0, 18.0])?;
    painter.ws.set_hidden(true);
    let view = GroupedView {
        title: "Forecast Accuracy Dashboard - Marketing Manager",
        first_header: "Marketing Manager",
        metric: MetricKind::Accuracy,
    };
    paint_grouped(&mut painter, &view, &dashboards.manager)?;
    painter.finish()?;

    let mut painter = Painter::new(workbook, &styles, "Dashboard - Product", &[34.0, 28.0, 18.0, 18.0])?;
    paint_product(&mut painter, &dashboards.product)?;
    painter.finish()
}

fn save(workbook: &mut Workbook, path: &Path) -> Result<(), ReconError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    workbook
        .save(path)
        .map_err(|e| ReconError::Io(format!("Failed to save {}: {}", path.display(), e)))
}

// ---------------------------------------------------------------------------
// Workbooks
// ---------------------------------------------------------------------------

/// Write the primary workbook into `dir`; returns its path.
pub fn write_report(report: &MonthlyReport, dir: &Path) -> Result<PathBuf, ReconError> {
    let recon = &report.reconciliation;
    let path = dir.join(report_file_name(recon.month));
    let mut workbook = Workbook::new();

    write_dashboards(&mut workbook, &report.dashboards)?;

    let header = xlsx_styles::table_header();
    let mut sheets: Vec<DataSheet> = report
        .dashboards
        .views()
        .into_iter()
        .map(|(view, rows)| dashboard_data_sheet(&format!("Dashboard - {view} Data"), view_grain(view), rows))
        .collect();
    sheets.push(raw_data_sheet("Raw Data", &recon.records));
    sheets.push(skipped_sheet(&recon.skipped));
    sheets.push(lookup_sheet(&report.tables.catalog));
    for sheet in &sheets {
        sheet.write(&mut workbook, &header)?.set_hidden(true);
    }

    save(&mut workbook, &path)?;
    info!(
        path = %path.display(),
        records = recon.records.len(),
        skipped = recon.skipped.len(),
        "wrote report workbook"
    );
    Ok(path)
}

/// Write the validation workbook into `dir`; returns its path.
pub fn write_validation(report: &MonthlyReport, dir: &Path) -> Result<PathBuf, ReconError> {
    let recon = &report.reconciliation;
    let dashboards = &report.dashboards;
    let path = dir.join(validation_file_name(recon.month));
    let mut workbook = Workbook::new();
    let header = xlsx_styles::table_header();

    let sheets = [
        mapped_sheet(&recon.mapped),
        marketing_rollup_sheet(&recon.marketing_rollup),
        actuals_rollup_sheet(&recon.actuals_rollup),
        stats_rollup_sheet(&recon.stats_rollup),
        raw_data_sheet("Raw Data", &recon.records),
        dashboard_data_sheet("Totals Data", Grain::Total, &dashboards.totals),
        dashboard_data_sheet("Prod Fam Data", Grain::ProductFamily, &dashboards.prod_fam),
        dashboard_data_sheet("Prod Fam WAPE Data", Grain::ProductFamily, &dashboards.prod_fam_wape),
        dashboard_data_sheet("Product Data", Grain::Product, &dashboards.product),
    ];
    for sheet in &sheets {
        sheet.write(&mut workbook, &header)?;
    }

    save(&mut workbook, &path)?;
    info!(path = %path.display(), "wrote validation workbook");
    Ok(path)
}
