//! Rolling-window trend workbook.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Chart, ChartType, Workbook};
use tracing::info;

use facc_recon::quality::{QualityReport, Severity};
use facc_recon::trend::{TrendReport, TrendRow, TrendWideRow};
use facc_recon::{Month, ReconError, UnitType};

use crate::xlsx::{xlsx_err, DataSheet, Field};
use crate::xlsx_styles;

const EXECUTIVE: &str = "Trend - Executive";
const EXECUTIVE_TITLE: &str = "Forecast Accuracy Trend - Executive View";
/// Executive data starts below the title banner and the header row.
const EXECUTIVE_FIRST_DATA_ROW: u32 = 2;

pub fn trend_file_name(anchor: Month) -> String {
    format!("{} Forecast Accuracy Trend Report.xlsx", anchor.label())
}

/// Key columns carried by one wide trend sheet.
#[derive(Clone, Copy)]
enum WideLayout {
    Totals,
    BusinessUnit,
    ProductFamily,
    TopProducts,
}

impl WideLayout {
    fn key_headers(self) -> &'static [&'static str] {
        match self {
            Self::Totals => &["month_start", "units"],
            Self::BusinessUnit => &["month_start", "units", "bu_code", "bu_name"],
            Self::ProductFamily => &["month_start", "units", "bu_code", "bu_name", "prod_fam"],
            Self::TopProducts => &[
                "month_start", "units", "bu_code", "bu_name", "prod_fam", "product",
                "marketing_manager", "actuals_sum",
            ],
        }
    }

    fn key_fields(self, r: &TrendWideRow) -> Vec<Field> {
        let mut fields: Vec<Field> = vec![r.month_start.into(), r.units.as_str().into()];
        if matches!(self, Self::Totals) {
            return fields;
        }
        fields.push((&r.bu_code).into());
        fields.push((&r.bu_name).into());
        match self {
            Self::ProductFamily => fields.push((&r.prod_fam).into()),
            Self::TopProducts => {
                fields.push((&r.prod_fam).into());
                fields.push((&r.product).into());
                fields.push((&r.marketing_manager).into());
                fields.push(r.actuals_sum.into());
            }
            Self::Totals | Self::BusinessUnit => {}
        }
        fields
    }
}

fn wide_sheet(name: &str, layout: WideLayout, rows: &[&TrendWideRow]) -> DataSheet {
    let mut headers = layout.key_headers().to_vec();
    headers.extend(["stats_model_acc", "marketing_acc", "delta_stats_minus_marketing"]);
    let mut sheet = DataSheet::new(name, &headers);
    for r in rows {
        let mut fields = layout.key_fields(r);
        fields.extend([
            Field::from(r.stats_model_acc),
            r.marketing_acc.into(),
            r.delta_stats_minus_marketing.into(),
        ]);
        sheet.push(fields);
    }
    sheet
}

fn data_sheet(rows: &[TrendRow]) -> DataSheet {
    let mut sheet = DataSheet::new(
        "Trend - Data",
        &[
            "month_start", "units", "view_level", "bu_code", "bu_name", "prod_fam", "product",
            "marketing_manager", "metric_name", "actuals_sum", "model_side", "metric_value",
            "forecast_sum", "abs_error_sum",
        ],
    );
    for r in rows {
        sheet.push(vec![
            r.month_start.into(),
            r.units.as_str().into(),
            r.view_level.as_str().into(),
            (&r.bu_code).into(),
            (&r.bu_name).into(),
            (&r.prod_fam).into(),
            (&r.product).into(),
            (&r.marketing_manager).into(),
            r.metric_name.into(),
            r.actuals_sum.into(),
            r.model_side.key().into(),
            r.metric_value.into(),
            r.forecast_sum.into(),
            r.abs_error_sum.into(),
        ]);
    }
    sheet
}

fn qa_sheet(quality: &QualityReport) -> DataSheet {
    let mut sheet = DataSheet::new("Trend - QA", &["check_name", "severity", "passed", "details"]);
    for check in &quality.checks {
        let severity = match check.severity {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        };
        sheet.push(vec![
            (&check.name).into(),
            severity.into(),
            check.passed.into(),
            check.details.to_string().into(),
        ]);
    }
    sheet
}

/// Executive rows grouped by unit type, each group in month order.
fn executive_rows(totals: &[TrendWideRow]) -> Vec<&TrendWideRow> {
    let mut rows: Vec<&TrendWideRow> = totals.iter().collect();
    rows.sort_by(|a, b| a.units.cmp(&b.units).then_with(|| a.month_start.cmp(&b.month_start)));
    rows
}

/// Sheet rows (first, last) holding `units` on the executive sheet.
fn unit_block(rows: &[&TrendWideRow], units: &UnitType) -> Option<(u32, u32)> {
    let first = rows.iter().position(|r| &r.units == units)?;
    let last = rows.iter().rposition(|r| &r.units == units)?;
    Some((
        EXECUTIVE_FIRST_DATA_ROW + first as u32,
        EXECUTIVE_FIRST_DATA_ROW + last as u32,
    ))
}

fn trend_chart(title: &str, first: u32, last: u32) -> Chart {
    let mut chart = Chart::new(ChartType::Line);
    chart.title().set_name(title);
    chart.x_axis().set_name("Month");
    chart.y_axis().set_name("Accuracy");
    chart.set_style(2);
    chart.set_width(378).set_height(227);
    for (col, name) in [(2u16, "Stats Model"), (3u16, "Marketing")] {
        chart
            .add_series()
            .set_categories((EXECUTIVE, first, 0, last, 0))
            .set_values((EXECUTIVE, first, col, last, col))
            .set_name(name);
    }
    chart
}

fn write_executive(workbook: &mut Workbook, totals: &[TrendWideRow]) -> Result<(), ReconError> {
    let rows = executive_rows(totals);
    let sheet = wide_sheet(EXECUTIVE, WideLayout::Totals, &rows);
    let err = xlsx_err(EXECUTIVE);

    let ws = sheet.write_at(workbook, &xlsx_styles::trend_header(), 1)?;
    let last_col = sheet.headers.len().min(8).saturating_sub(1) as u16;
    ws.merge_range(0, 0, 0, last_col, EXECUTIVE_TITLE, &xlsx_styles::trend_title())
        .map_err(&err)?;
    ws.set_freeze_panes(EXECUTIVE_FIRST_DATA_ROW, 0).map_err(&err)?;

    let charts = [
        (UnitType::Quantity, 2, "Quantity Trend: Stats vs Marketing"),
        (UnitType::Dollars, 19, "Dollars Trend: Stats vs Marketing"),
    ];
    for (units, anchor_row, title) in charts {
        let Some((first, last)) = unit_block(&rows, &units) else {
            continue;
        };
        ws.insert_chart(anchor_row, 7, &trend_chart(title, first, last))
            .map_err(&err)?;
    }
    Ok(())
}

/// Write the trend workbook to `path`, creating parent directories.
pub fn write_trend_report(
    report: &TrendReport,
    quality: &QualityReport,
    path: &Path,
) -> Result<PathBuf, ReconError> {
    let mut workbook = Workbook::new();
    let header = xlsx_styles::trend_header();

    write_executive(&mut workbook, &report.totals)?;

    let sheets = [
        wide_sheet("Trend - BU", WideLayout::BusinessUnit, &report.business_units.iter().collect::<Vec<_>>()),
        wide_sheet("Trend - Prod Fam", WideLayout::ProductFamily, &report.prod_fams.iter().collect::<Vec<_>>()),
        wide_sheet("Trend - Product Top10", WideLayout::TopProducts, &report.top_products.iter().collect::<Vec<_>>()),
        data_sheet(&report.rows),
        qa_sheet(quality),
    ];
    for sheet in &sheets {
        let ws = sheet.write(&mut workbook, &header)?;
        ws.set_freeze_panes(1, 0).map_err(xlsx_err(&sheet.name))?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    workbook.save(path).map_err(xlsx_err("trend workbook"))?;
    info!(
        path = %path.display(),
        rows = report.rows.len(),
        top_products = report.ranking.len(),
        "wrote trend workbook"
    );
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use facc_recon::quality::run_trend_checks;
    use facc_recon::trend::{month_trend_rows, pivot, rank_top_products, top_product_rows};
    use facc_recon::metrics::Grain;
    use facc_recon::model::ReconciledRecord;
    use tempfile::tempdir;

    fn record(month: Month, units: UnitType, actuals: f64, stats: f64, marketing: f64) -> ReconciledRecord {
        ReconciledRecord {
            product: Some("P1".into()),
            division: Some("D100".into()),
            month,
            prod_fam: Some("Family".into()),
            units,
            actuals,
            stats_fcast: stats,
            marketing_fcast: marketing,
            stats_abs_error: (actuals - stats).abs(),
            marketing_abs_error: (actuals - marketing).abs(),
            bu_name: Some("Clinical".into()),
            marketing_manager: Some("Pat".into()),
        }
    }

    fn report() -> TrendReport {
        let feb = Month::new(2024, 2).unwrap();
        let mar = Month::new(2024, 3).unwrap();
        let mut rows = Vec::new();
        for month in [feb, mar] {
            let records = [
                record(month, UnitType::Quantity, 100.0, 90.0, 110.0),
                record(month, UnitType::Dollars, 200.0, 220.0, 150.0),
            ];
            rows.extend(month_trend_rows(&records, month));
        }
        let ranking = rank_top_products(&rows, mar, 10);
        TrendReport {
            anchor: mar,
            months: vec![feb, mar],
            source_counts: Vec::new(),
            totals: pivot(&rows, Grain::Total),
            business_units: pivot(&rows, Grain::BusinessUnit),
            prod_fams: pivot(&rows, Grain::ProductFamily),
            top_products: top_product_rows(&rows, &ranking),
            ranking,
            rows,
        }
    }

    #[test]
    fn executive_rows_are_grouped_by_units() {
        let report = report();
        let rows = executive_rows(&report.totals);
        let units: Vec<&str> = rows.iter().map(|r| r.units.as_str()).collect();
        assert_eq!(units, vec!["quantity", "quantity", "dollars", "dollars"]);
        assert_eq!(unit_block(&rows, &UnitType::Quantity), Some((2, 3)));
        assert_eq!(unit_block(&rows, &UnitType::Dollars), Some((4, 5)));
    }

    #[test]
    fn writes_all_trend_sheets() {
        let report = report();
        let quality = run_trend_checks(&report, 10);
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join(trend_file_name(report.anchor));
        write_trend_report(&report, &quality, &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![
                "Trend - Executive",
                "Trend - BU",
                "Trend - Prod Fam",
                "Trend - Product Top10",
                "Trend - Data",
                "Trend - QA",
            ]
        );

        let exec = workbook.worksheet_range(EXECUTIVE).unwrap();
        assert_eq!(exec.get_value((0, 0)), Some(&Data::String(EXECUTIVE_TITLE.into())));
        assert_eq!(exec.get_value((1, 2)), Some(&Data::String("stats_model_acc".into())));
        assert_eq!(exec.get_value((2, 1)), Some(&Data::String("quantity".into())));
        assert_eq!(exec.get_value((2, 2)), Some(&Data::Float(0.9)));

        let qa = workbook.worksheet_range("Trend - QA").unwrap();
        assert_eq!(qa.get_value((0, 0)), Some(&Data::String("check_name".into())));
        assert_eq!(qa.height(), 1 + quality.checks.len());
    }
}
