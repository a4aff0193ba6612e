use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tempfile::tempdir;

use facc_io::json::{dq_log_name, write_quality_log};
use facc_io::loader_for;
use facc_io::report::{write_report, write_validation};
use facc_recon::metrics::{Grain, MetricKind, Winner};
use facc_recon::{run_month, ForecastConfig, Month, ReconError, SourceKind};

const CONFIG: &str = r#"
name = "Legacy CSV"

[source]
kind = "legacy"
marketing_file = "marketing.csv"
catalog_file = "catalog.csv"
stats_file = "stats_{year}-{mon}.csv"
actuals_file = "actuals.csv"
"#;

fn write_fixtures(dir: &Path) {
    fs::write(
        dir.join("marketing.csv"),
        "BU,Location,Geography,Product,Date,Forecast (Dollars),Forecast (Quantity)\n\
         D100,LOC1,AMERICAS,SKU1,2024-03-01,5000,100\n\
         D100,LOC1,EMEA,SKU1,2024-03-01,9999,999\n\
         D100,LOC1,AMERICAS,SKU9,2024-03-01,10,1\n\
         D100,LOC1,AMERICAS,SKU1,2024-04-01,7000,300\n",
    )
    .unwrap();
    fs::write(
        dir.join("catalog.csv"),
        "group_key,business_unit_code,business_unit_name,sku_list,product_family,marketing_manager,salesforce_feature_mode\n\
         FAM1,D100,Clinical,SKU1|SKU2,Family One,Pat,quantity\n",
    )
    .unwrap();
    fs::write(
        dir.join("stats_2024-Mar.csv"),
        "product_id,bu_id,forecast_month,model_type,forecast_value,recommended_model\n\
         FAM1,D100,2024-03-01,BLEND,110,0\n\
         FAM1,D100,2024-03-01,ARIMA,80,1\n",
    )
    .unwrap();
    fs::write(
        dir.join("actuals.csv"),
        "Product,Division,Month,Actuals\n\
         FAM1,D100,2024-03-01,120\n\
         FAM1,D100,2024-02-01,50\n",
    )
    .unwrap();
}

fn march() -> Month {
    Month::new(2024, 3).unwrap()
}

#[test]
fn legacy_csv_month_end_to_end() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    let config = ForecastConfig::from_toml(CONFIG).unwrap();
    let loader = loader_for(SourceKind::Legacy, dir.path(), &config.source).unwrap();

    let report = run_month(loader.as_ref(), &config, march()).unwrap();
    let recon = &report.reconciliation;
    assert_eq!(recon.records.len(), 1);
    let record = &recon.records[0];
    assert_eq!(record.actuals, 120.0);
    assert_eq!(record.stats_fcast, 110.0);
    assert_eq!(record.marketing_fcast, 100.0);
    assert_eq!(recon.skipped.len(), 1);
    assert_eq!(recon.skipped[0].product.as_deref(), Some("SKU9"));

    let total_accuracy = report
        .dashboards
        .totals
        .iter()
        .find(|r| r.grain == Grain::Total && r.metric == MetricKind::Accuracy)
        .unwrap();
    assert_eq!(total_accuracy.winner(), Winner::StatsModel);

    let out = dir.path().join("outputs");
    let primary = write_report(&report, &out).unwrap();
    let validation = write_validation(&report, &out).unwrap();
    assert!(primary.exists());
    assert!(validation.exists());

    let mut workbook = open_workbook_auto(&primary).unwrap();
    let skipped = workbook.worksheet_range("Skipped Products").unwrap();
    assert_eq!(skipped.get_value((1, 1)), Some(&Data::String("SKU9".into())));
    assert_eq!(
        skipped.get_value((1, 3)),
        Some(&Data::String("Not in product catalog master".into()))
    );

    let log = out.join(dq_log_name(march(), SourceKind::Legacy));
    write_quality_log(&log, &report.quality).unwrap();
    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("marketing_rows_present"));
}

#[test]
fn missing_stats_file_for_month_is_missing_source() {
    let dir = tempdir().unwrap();
    write_fixtures(dir.path());
    let config = ForecastConfig::from_toml(CONFIG).unwrap();
    let loader = loader_for(SourceKind::Legacy, dir.path(), &config.source).unwrap();

    let err = run_month(loader.as_ref(), &config, Month::new(2024, 4).unwrap()).unwrap_err();
    assert!(matches!(err, ReconError::MissingSource(_)));
}

#[test]
fn loader_requires_configured_paths() {
    let dir = tempdir().unwrap();
    let config = ForecastConfig::from_toml(CONFIG).unwrap();
    let err = loader_for(SourceKind::Sqlite, dir.path(), &config.source).err().unwrap();
    assert!(matches!(err, ReconError::ConfigValidation(_)));
}
