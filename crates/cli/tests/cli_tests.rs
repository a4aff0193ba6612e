// Integration tests for `facc report`, `facc trend` and `facc validate` exit codes and outputs.
// Run with: cargo test -p facc-cli --test cli_tests -- --nocapture

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::{tempdir, TempDir};

const CONFIG: &str = r#"
name = "CLI fixture"

[source]
kind = "legacy"
marketing_file = "marketing.csv"
catalog_file = "catalog.csv"
stats_file = "stats_{year}-{mon}.csv"
actuals_file = "actuals.csv"
"#;

/// A config plus CSV sources covering March 2024, with an empty February stats file.
fn fixture() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(
        root.join("marketing.csv"),
        "BU,Location,Geography,Product,Date,Forecast (Dollars),Forecast (Quantity)\n\
         D100,LOC1,AMERICAS,SKU1,2024-03-01,5000,100\n\
         D100,LOC1,AMERICAS,SKU9,2024-03-01,10,1\n",
    )
    .unwrap();
    fs::write(
        root.join("catalog.csv"),
        "group_key,business_unit_code,business_unit_name,sku_list,product_family,marketing_manager,salesforce_feature_mode\n\
         FAM1,D100,Clinical,SKU1,Family One,Pat,quantity\n",
    )
    .unwrap();
    fs::write(
        root.join("stats_2024-Mar.csv"),
        "product_id,bu_id,forecast_month,model_type,forecast_value,recommended_model\n\
         FAM1,D100,2024-03-01,BLEND,110,1\n",
    )
    .unwrap();
    fs::write(
        root.join("stats_2024-Feb.csv"),
        "product_id,bu_id,forecast_month,model_type,forecast_value,recommended_model\n",
    )
    .unwrap();
    fs::write(
        root.join("actuals.csv"),
        "Product,Division,Month,Actuals\n\
         FAM1,D100,2024-03-01,120\n\
         FAM1,D100,2024-02-01,50\n",
    )
    .unwrap();
    let config = root.join("facc.toml");
    fs::write(&config, CONFIG).unwrap();
    (dir, config)
}

fn facc(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_facc"))
        .args(args)
        .arg("--config")
        .arg(config)
        .env_remove("FACC_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("run facc")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_accepts_fixture_config() {
    let (_dir, config) = fixture();
    let output = facc(&config, &["validate"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("valid: 'CLI fixture' with legacy source"));
}

#[test]
fn validate_rejects_bad_month() {
    let (_dir, config) = fixture();
    let output = facc(&config, &["validate", "--month", "2024-3x"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("error:"));
}

#[test]
fn validate_rejects_zero_window() {
    let (_dir, config) = fixture();
    let output = facc(&config, &["validate", "--window-months", "0"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let output = facc(&dir.path().join("absent.toml"), &["validate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("hint:"));
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

#[test]
fn report_writes_workbooks_and_log() {
    let (dir, config) = fixture();
    let output = facc(&config, &["report", "--month", "2024-03", "--dq-mode", "warn"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = dir.path().join("outputs");
    assert!(out.join("Mar Forecast Accuracy Report.xlsx").exists());
    assert!(out.join("Mar Forecast Accuracy Validation.xlsx").exists());

    let log = out.join("Mar Forecast Accuracy DQ (legacy).json");
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(log).unwrap()).unwrap();
    assert_eq!(value["source"], "legacy");
    assert_eq!(value["report_month"], "2024-03-01");
    assert!(stderr(&output).contains("1 reconciled row(s), 1 skipped product(s)"));
}

#[test]
fn report_honours_output_and_log_flags() {
    let (dir, config) = fixture();
    let out = dir.path().join("elsewhere");
    let log = dir.path().join("logs").join("dq.json");
    let output = facc(
        &config,
        &[
            "report", "--month", "2024-03", "--dq-mode", "off",
            "--output", out.to_str().unwrap(),
            "--dq-log", log.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out.join("Mar Forecast Accuracy Report.xlsx").exists());
    assert!(log.exists());
    assert!(!dir.path().join("outputs").exists());
}

#[test]
fn quality_gate_blocks_report_in_fail_mode() {
    let (dir, config) = fixture();
    let output = facc(&config, &["report", "--month", "2024-02", "--dq-mode", "fail"]);
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));

    let out = dir.path().join("outputs");
    assert!(out.join("Feb Forecast Accuracy DQ (legacy).json").exists());
    assert!(!out.join("Feb Forecast Accuracy Report.xlsx").exists());
    assert!(stderr(&output).contains("--dq-mode warn"));
}

#[test]
fn missing_stats_file_exits_with_source_code() {
    let (_dir, config) = fixture();
    let output = facc(&config, &["report", "--month", "2024-04"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn baseline_without_paths_fails_before_writing() {
    let (dir, config) = fixture();
    let output = facc(
        &config,
        &["report", "--month", "2024-03", "--dq-mode", "warn", "--compare-baseline", "sqlite"],
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(!dir.path().join("outputs").exists());
}

#[test]
fn unreadable_baseline_fails_before_writing() {
    let (dir, config) = fixture();
    let with_database = format!("{CONFIG}database = \"missing.db\"\n");
    fs::write(&config, with_database).unwrap();
    let output = facc(
        &config,
        &["report", "--month", "2024-03", "--dq-mode", "warn", "--compare-baseline", "sqlite"],
    );
    assert_eq!(output.status.code(), Some(3), "stderr: {}", stderr(&output));

    let out = dir.path().join("outputs");
    assert!(out.join("Mar Forecast Accuracy DQ (legacy).json").exists());
    assert!(!out.join("Mar Forecast Accuracy Report.xlsx").exists());
    assert!(!out.join("Mar Forecast Accuracy Validation.xlsx").exists());
}

#[test]
fn unknown_source_is_a_usage_error() {
    let (_dir, config) = fixture();
    let output = facc(&config, &["report", "--source", "oracle"]);
    assert_eq!(output.status.code(), Some(2));
}

// ---------------------------------------------------------------------------
// trend
// ---------------------------------------------------------------------------

#[test]
fn trend_writes_workbook_for_single_month_window() {
    let (dir, config) = fixture();
    let output = facc(
        &config,
        &["trend", "--month", "2024-03", "--window-months", "1", "--dq-mode", "warn"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = dir.path().join("outputs");
    assert!(out.join("Mar Forecast Accuracy Trend Report.xlsx").exists());
    let log = out.join("Mar Forecast Accuracy Trend DQ (legacy).json");
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(log).unwrap()).unwrap();
    assert_eq!(value["anchor_month"], "2024-03-01");
    assert_eq!(value["window_months"], 1);
}

#[test]
fn quality_gate_blocks_trend_workbook_in_fail_mode() {
    // February has no marketing or stats rows, which fails source coverage.
    let (dir, config) = fixture();
    let output = facc(
        &config,
        &["trend", "--month", "2024-03", "--window-months", "2", "--dq-mode", "fail"],
    );
    assert_eq!(output.status.code(), Some(4), "stderr: {}", stderr(&output));

    let out = dir.path().join("outputs");
    let log = out.join("Mar Forecast Accuracy Trend DQ (legacy).json");
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(log).unwrap()).unwrap();
    assert_eq!(value["window_months"], 2);
    assert!(!out.join("Mar Forecast Accuracy Trend Report.xlsx").exists());
}

#[test]
fn empty_trend_window_exits_with_no_data_code() {
    let (_dir, config) = fixture();
    let output = facc(&config, &["trend", "--month", "2024-02", "--window-months", "1"]);
    assert_eq!(output.status.code(), Some(5), "stderr: {}", stderr(&output));
}
