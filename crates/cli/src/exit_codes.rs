//! CLI Exit Code Registry
//!
//! Single source of truth for `facc` exit codes. Scripts that schedule the
//! monthly run rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 2    | Usage or configuration error (bad flag, month, config)    |
//! | 3    | Source error (missing file, column, layout, database)     |
//! | 4    | Data-quality gate failed in `fail` mode                   |
//! | 5    | Trend window produced no rows                             |
//! | 6    | Writing a report or log failed                            |
//!
//! clap reports its own usage errors with code 2.

use facc_recon::ReconError;

// =============================================================================
// Universal (0, 2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Configuration error - unreadable or invalid config, bad `--month`.
pub const EXIT_CONFIG: u8 = 2;

// =============================================================================
// Pipeline (3-6)
// =============================================================================

/// A source file, sheet, column or table is missing or malformed.
pub const EXIT_SOURCE: u8 = 3;

/// Critical data-quality checks failed and the mode is `fail`.
pub const EXIT_QUALITY_GATE: u8 = 4;

/// No trend row was produced for any month of the window.
pub const EXIT_NO_TREND_DATA: u8 = 5;

/// A workbook or the JSON log could not be written.
pub const EXIT_WRITE: u8 = 6;

/// Map a pipeline error to its exit code.
pub fn exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) | ReconError::MonthParse(_) => {
            EXIT_CONFIG
        }
        ReconError::MissingSource(_)
        | ReconError::MissingColumn { .. }
        | ReconError::SourceLayout { .. }
        | ReconError::Database(_) => EXIT_SOURCE,
        ReconError::QualityGate { .. } => EXIT_QUALITY_GATE,
        ReconError::NoTrendData { .. } => EXIT_NO_TREND_DATA,
        ReconError::Io(_) => EXIT_WRITE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_CONFIG,
            EXIT_SOURCE,
            EXIT_QUALITY_GATE,
            EXIT_NO_TREND_DATA,
            EXIT_WRITE,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn errors_map_to_their_domain() {
        assert_eq!(exit_code(&ReconError::MonthParse("2024-13".into())), EXIT_CONFIG);
        assert_eq!(
            exit_code(&ReconError::MissingColumn { table: "stats".into(), column: "bu_id".into() }),
            EXIT_SOURCE
        );
        assert_eq!(exit_code(&ReconError::QualityGate { critical_failed: 2 }), EXIT_QUALITY_GATE);
        assert_eq!(
            exit_code(&ReconError::NoTrendData {
                window_start: "2023-04-01".into(),
                window_end: "2024-03-01".into(),
            }),
            EXIT_NO_TREND_DATA
        );
        assert_eq!(exit_code(&ReconError::Io("disk full".into())), EXIT_WRITE);
    }
}
