//! Config file loading with command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;

use facc_io::loader_for;
use facc_recon::{DqMode, ForecastConfig, ReconError, SourceKind, SourceLoader};

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the TOML config; relative source paths resolve against its directory
    #[arg(long, short = 'c', default_value = "facc.toml", env = "FACC_CONFIG")]
    pub config: PathBuf,

    /// Reporting (or trend anchor) month as YYYY-MM; defaults to last month
    #[arg(long)]
    pub month: Option<String>,

    /// Source layout: legacy, alternate or sqlite
    #[arg(long)]
    pub source: Option<SourceKind>,

    /// Data-quality enforcement: off, warn or fail
    #[arg(long)]
    pub dq_mode: Option<DqMode>,

    /// Write the JSON quality log here instead of next to the report
    #[arg(long)]
    pub dq_log: Option<PathBuf>,

    /// Output directory for workbooks
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Overrides for the `[trend]` table.
#[derive(Args, Debug, Clone, Default)]
pub struct TrendArgs {
    /// Months in the rolling window, anchor included
    #[arg(long)]
    pub window_months: Option<u32>,

    /// Products kept in the top-N trend sheet
    #[arg(long)]
    pub top_n_products: Option<usize>,
}

/// Validated config plus resolved filesystem locations.
#[derive(Debug)]
pub struct Settings {
    pub config: ForecastConfig,
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
    dq_log: Option<PathBuf>,
}

fn resolve(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

impl Settings {
    pub fn load(args: &RunArgs, trend: Option<&TrendArgs>) -> Result<Self, ReconError> {
        let text = fs::read_to_string(&args.config).map_err(|e| {
            ReconError::ConfigParse(format!("cannot read {}: {e}", args.config.display()))
        })?;
        let mut config = ForecastConfig::parse(&text)?;

        if let Some(kind) = args.source {
            config.source.kind = kind;
        }
        if let Some(mode) = args.dq_mode {
            config.quality.mode = mode;
        }
        if let Some(trend) = trend {
            if let Some(months) = trend.window_months {
                config.trend.window_months = months;
            }
            if let Some(top_n) = trend.top_n_products {
                config.trend.top_n_products = top_n;
            }
        }
        config.validate()?;

        let base_dir = match args.config.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let output_dir = match &args.output {
            Some(dir) => dir.clone(),
            None => resolve(&base_dir, &config.output.dir),
        };
        let dq_log = match (&args.dq_log, &config.quality.log) {
            (Some(path), _) => Some(path.clone()),
            (None, Some(path)) => Some(resolve(&base_dir, path)),
            (None, None) => None,
        };

        debug!(
            config = %args.config.display(),
            base_dir = %base_dir.display(),
            output_dir = %output_dir.display(),
            "settings resolved"
        );
        Ok(Self { config, base_dir, output_dir, dq_log })
    }

    pub fn kind(&self) -> SourceKind {
        self.config.source.kind
    }

    pub fn mode(&self) -> DqMode {
        self.config.quality.mode
    }

    /// Explicit log path, else `default_name` inside the output directory.
    pub fn dq_log_path(&self, default_name: &str) -> PathBuf {
        self.dq_log
            .clone()
            .unwrap_or_else(|| self.output_dir.join(default_name))
    }

    pub fn loader(&self, kind: SourceKind) -> Result<Box<dyn SourceLoader>, ReconError> {
        loader_for(kind, &self.base_dir, &self.config.source)
    }
}
