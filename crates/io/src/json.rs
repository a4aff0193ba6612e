// Data-quality log export

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use facc_recon::{Month, QualityReport, ReconError, SourceKind};

/// `"{Mon} Forecast Accuracy DQ ({source}).json"`
pub fn dq_log_name(month: Month, source: SourceKind) -> String {
    format!("{} Forecast Accuracy DQ ({source}).json", month.label())
}

/// `"{Mon} Forecast Accuracy Trend DQ ({source}).json"`
pub fn trend_dq_log_name(anchor: Month, source: SourceKind) -> String {
    format!("{} Forecast Accuracy Trend DQ ({source}).json", anchor.label())
}

/// Write the quality report as pretty JSON, creating parent directories.
pub fn write_quality_log(path: &Path, report: &QualityReport) -> Result<(), ReconError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)
        .map_err(|e| ReconError::Io(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .map_err(|e| ReconError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facc_recon::quality::{QualityCheck, Severity};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[test]
    fn test_quality_log_round_trip() {
        let dir = tempdir().unwrap();
        let month = Month::new(2024, 3).unwrap();
        let path = dir.path().join("logs").join(dq_log_name(month, SourceKind::Sqlite));

        let report = QualityReport::from_checks(vec![
            QualityCheck {
                name: "marketing_rows_present".into(),
                severity: Severity::Critical,
                passed: false,
                details: json!({ "row_count": 0 }),
            },
            QualityCheck {
                name: "marketing_duplicate_keys".into(),
                severity: Severity::Warning,
                passed: true,
                details: json!({ "duplicate_count": 0 }),
            },
        ])
        .with_context("report_month", month)
        .with_context("source", SourceKind::Sqlite);
        write_quality_log(&path, &report).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["checks_total"], 2);
        assert_eq!(value["critical_failed"], 1);
        assert_eq!(value["warning_failed"], 0);
        assert_eq!(value["source"], "sqlite");
        assert_eq!(value["checks"][0]["severity"], "critical");
        assert_eq!(value["checks"][0]["details"]["row_count"], 0);
    }

    #[test]
    fn test_log_names() {
        let month = Month::new(2024, 11).unwrap();
        assert_eq!(dq_log_name(month, SourceKind::Legacy), "Nov Forecast Accuracy DQ (legacy).json");
        assert_eq!(
            trend_dq_log_name(month, SourceKind::Sqlite),
            "Nov Forecast Accuracy Trend DQ (sqlite).json"
        );
    }
}
