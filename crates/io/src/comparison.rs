//! Side-by-side workbook of two sources' dashboards for the same month.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tracing::info;

use facc_recon::compare::{ComparisonSheet, Presence};
use facc_recon::{Month, ReconError, SourceKind};

use crate::xlsx::{key_fields, key_headers, view_grain, xlsx_err, DataSheet, Field};
use crate::xlsx_styles;

pub fn comparison_file_name(month: Month, source: SourceKind, baseline: SourceKind) -> String {
    format!(
        "{} Forecast Accuracy Comparison ({source} vs {baseline}).xlsx",
        month.label()
    )
}

fn presence_label(presence: Presence) -> &'static str {
    match presence {
        Presence::Both => "both",
        Presence::SourceOnly => "source_only",
        Presence::BaselineOnly => "baseline_only",
    }
}

fn comparison_data_sheet(sheet: &ComparisonSheet, source: SourceKind, baseline: SourceKind) -> DataSheet {
    let grain = view_grain(sheet.name);
    let mut headers: Vec<String> = key_headers(grain).iter().map(|h| h.to_string()).collect();
    headers.push("Metric".into());
    for label in [source, baseline] {
        headers.push(format!("Stats Model ({label})"));
        headers.push(format!("Marketing ({label})"));
    }
    headers.extend(["Presence", "Stats Delta", "Marketing Delta"].map(String::from));

    let mut out = DataSheet::new(sheet.name, &headers);
    for r in &sheet.rows {
        let mut fields = key_fields(&r.units, r.grain, &r.key, r.metric);
        fields.extend([
            Field::from(r.source_stats),
            r.source_marketing.into(),
            r.baseline_stats.into(),
            r.baseline_marketing.into(),
            presence_label(r.presence).into(),
            r.stats_delta.into(),
            r.marketing_delta.into(),
        ]);
        out.push(fields);
    }
    out
}

/// Write the comparison workbook into `dir`; returns its path.
pub fn write_comparison(
    month: Month,
    source: SourceKind,
    baseline: SourceKind,
    sheets: &[ComparisonSheet],
    dir: &Path,
) -> Result<PathBuf, ReconError> {
    let path = dir.join(comparison_file_name(month, source, baseline));
    let mut workbook = Workbook::new();
    let header = xlsx_styles::table_header();

    let mut summary = DataSheet::new("Summary", &["report_month", "source", "baseline"]);
    summary.push(vec![month.into(), source.to_string().into(), baseline.to_string().into()]);
    summary.write(&mut workbook, &header)?;

    for sheet in sheets {
        comparison_data_sheet(sheet, source, baseline).write(&mut workbook, &header)?;
    }

    std::fs::create_dir_all(dir)?;
    workbook.save(&path).map_err(xlsx_err("comparison workbook"))?;
    info!(path = %path.display(), %source, %baseline, "wrote comparison workbook");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use facc_recon::compare::compare_dashboards;
    use facc_recon::metrics::build_dashboards;
    use facc_recon::model::ReconciledRecord;
    use facc_recon::UnitType;
    use tempfile::tempdir;

    fn record(product: &str, marketing: f64) -> ReconciledRecord {
        ReconciledRecord {
            product: Some(product.into()),
            division: Some("D100".into()),
            month: Month::new(2024, 3).unwrap(),
            prod_fam: Some("Family".into()),
            units: UnitType::Quantity,
            actuals: 100.0,
            stats_fcast: 90.0,
            marketing_fcast: marketing,
            stats_abs_error: 10.0,
            marketing_abs_error: (100.0 - marketing).abs(),
            bu_name: Some("Clinical".into()),
            marketing_manager: Some("Pat".into()),
        }
    }

    #[test]
    fn writes_summary_and_view_sheets() {
        let month = Month::new(2024, 3).unwrap();
        let source = build_dashboards(&[record("P1", 110.0), record("P2", 95.0)]);
        let baseline = build_dashboards(&[record("P1", 120.0)]);
        let sheets = compare_dashboards(&source, &baseline);

        let dir = tempdir().unwrap();
        let path = write_comparison(month, SourceKind::Sqlite, SourceKind::Legacy, &sheets, dir.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "Mar Forecast Accuracy Comparison (sqlite vs legacy).xlsx"
        );

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["Summary", "Totals", "Prod Fam", "Prod Fam WAPE", "Mkt Mgr", "Product"]
        );
        let summary = workbook.worksheet_range("Summary").unwrap();
        assert_eq!(summary.get_value((1, 1)), Some(&Data::String("sqlite".into())));

        let product = workbook.worksheet_range("Product").unwrap();
        assert_eq!(product.get_value((0, 6)), Some(&Data::String("Stats Model (sqlite)".into())));
        let presences: Vec<String> = (1..product.height() as u32)
            .filter_map(|r| product.get_value((r, 10)))
            .map(|d| d.to_string())
            .collect();
        assert!(presences.contains(&"both".to_string()));
        assert!(presences.contains(&"source_only".to_string()));
    }
}
