// facc - monthly forecast accuracy reconciliation and trend reporting

mod commands;
mod exit_codes;
mod settings;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use facc_recon::{ReconError, SourceKind};

use exit_codes::{exit_code, EXIT_SUCCESS};
use settings::{RunArgs, TrendArgs};

#[derive(Parser)]
#[command(name = "facc")]
#[command(about = "Stats-model vs marketing forecast accuracy reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one month and write the accuracy and validation workbooks
    #[command(after_help = "\
Examples:
  facc report --month 2024-03
  facc report -c facc.toml --source sqlite --dq-mode warn
  facc report --month 2024-03 --source sqlite --compare-baseline legacy")]
    Report {
        #[command(flatten)]
        run: RunArgs,

        /// Also reconcile this source and write a side-by-side comparison workbook
        #[arg(long)]
        compare_baseline: Option<SourceKind>,
    },

    /// Build the rolling-window trend workbook ending at --month
    #[command(after_help = "\
Examples:
  facc trend --month 2024-03
  facc trend --window-months 6 --top-n-products 5")]
    Trend {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        trend: TrendArgs,
    },

    /// Check the config file and overrides without loading any data
    Validate {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        trend: TrendArgs,
    },
}

pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("run `facc validate -c <config>` to check the file")
            }
            ReconError::MonthParse(_) => Some("pass --month as YYYY-MM, e.g. 2024-03"),
            ReconError::MissingSource(_) => Some("check the [source] paths in the config"),
            ReconError::QualityGate { .. } => {
                Some("see the DQ log for failed checks, or rerun with --dq-mode warn")
            }
            ReconError::NoTrendData { .. } => {
                Some("check that source data covers the window, or widen --window-months")
            }
            _ => None,
        };
        let cli = Self { code: exit_code(&err), message: err.to_string(), hint: None };
        match hint {
            Some(hint) => cli.with_hint(hint),
            None => cli,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result: Result<(), CliError> = match cli.command {
        Commands::Report { run, compare_baseline } => {
            commands::cmd_report(&run, compare_baseline).map_err(CliError::from)
        }
        Commands::Trend { run, trend } => commands::cmd_trend(&run, &trend).map_err(CliError::from),
        Commands::Validate { run, trend } => {
            commands::cmd_validate(&run, &trend).map_err(CliError::from)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: {}", e.message);
            if let Some(hint) = e.hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(e.code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_flags_parse() {
        let cli = Cli::try_parse_from([
            "facc", "report", "--month", "2024-03", "--source", "sqlite", "--dq-mode", "warn",
            "--compare-baseline", "legacy",
        ])
        .unwrap();
        let Commands::Report { run, compare_baseline } = cli.command else {
            panic!("expected report");
        };
        assert_eq!(run.month.as_deref(), Some("2024-03"));
        assert_eq!(run.source, Some(SourceKind::Sqlite));
        assert_eq!(run.dq_mode, Some(facc_recon::DqMode::Warn));
        assert_eq!(compare_baseline, Some(SourceKind::Legacy));
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!(Cli::try_parse_from(["facc", "report", "--source", "oracle"]).is_err());
    }

    #[test]
    fn quality_gate_error_carries_hint() {
        let err = CliError::from(ReconError::QualityGate { critical_failed: 1 });
        assert_eq!(err.code, exit_codes::EXIT_QUALITY_GATE);
        assert!(err.hint.unwrap().contains("--dq-mode warn"));
    }
}
