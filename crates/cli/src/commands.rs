//! `facc report`, `facc trend` and `facc validate`.

use facc_io::comparison::write_comparison;
use facc_io::json::{dq_log_name, trend_dq_log_name, write_quality_log};
use facc_io::report::{write_report, write_validation};
use facc_io::trend_report::{trend_file_name, write_trend_report};
use facc_recon::compare::compare_dashboards;
use facc_recon::quality::run_trend_checks;
use facc_recon::{run_month, run_trend, Month, QualityReport, ReconError, SourceKind};
use tracing::{info, warn};

use crate::settings::{RunArgs, Settings, TrendArgs};

fn summarize_quality(quality: &QualityReport) {
    info!(
        checks = quality.checks_total,
        failed = quality.checks_failed,
        critical_failed = quality.critical_failed,
        warning_failed = quality.warning_failed,
        "data-quality checks complete"
    );
}

/// Monthly reconciliation: quality gate, primary and validation workbooks,
/// and an optional comparison against a baseline source.
///
/// Every source, the baseline included, is loaded before the first workbook
/// is written.
pub fn cmd_report(args: &RunArgs, baseline: Option<SourceKind>) -> Result<(), ReconError> {
    let settings = Settings::load(args, None)?;
    let month = Month::resolve(args.month.as_deref())?;
    let kind = settings.kind();
    let mode = settings.mode();
    info!(%month, source = %kind, dq_mode = %mode, "starting monthly report");
    if let Some(baseline) = baseline {
        settings.config.source.require_paths(baseline)?;
    }

    let loader = settings.loader(kind)?;
    let report = run_month(loader.as_ref(), &settings.config, month)?;

    let log = settings.dq_log_path(&dq_log_name(month, kind));
    write_quality_log(&log, &report.quality)?;
    summarize_quality(&report.quality);
    report.quality.log_failures(mode);
    report.quality.enforce(mode)?;

    let baseline_report = match baseline {
        Some(baseline) if baseline == kind => {
            warn!(source = %kind, "baseline is the report source, comparison skipped");
            None
        }
        Some(baseline) => {
            let baseline_loader = settings.loader(baseline)?;
            let baseline_report = run_month(baseline_loader.as_ref(), &settings.config, month)?;
            Some((baseline, baseline_report))
        }
        None => None,
    };

    let primary = write_report(&report, &settings.output_dir)?;
    let validation = write_validation(&report, &settings.output_dir)?;
    let comparison = match baseline_report {
        Some((baseline, baseline_report)) => {
            let sheets = compare_dashboards(&report.dashboards, &baseline_report.dashboards);
            Some(write_comparison(month, kind, baseline, &sheets, &settings.output_dir)?)
        }
        None => None,
    };

    let recon = &report.reconciliation;
    eprintln!(
        "{}: {} reconciled row(s), {} skipped product(s), {}/{} check(s) failed",
        month,
        recon.records.len(),
        recon.skipped.len(),
        report.quality.checks_failed,
        report.quality.checks_total,
    );
    eprintln!("report:      {}", primary.display());
    eprintln!("validation:  {}", validation.display());
    if let Some(path) = comparison {
        eprintln!("comparison:  {}", path.display());
    }
    eprintln!("dq log:      {}", log.display());
    Ok(())
}

/// Rolling-window trend workbook anchored at `--month`.
pub fn cmd_trend(args: &RunArgs, trend: &TrendArgs) -> Result<(), ReconError> {
    let settings = Settings::load(args, Some(trend))?;
    let anchor = Month::resolve(args.month.as_deref())?;
    let kind = settings.kind();
    let mode = settings.mode();
    let top_n = settings.config.trend.top_n_products;
    info!(
        %anchor,
        source = %kind,
        window_months = settings.config.trend.window_months,
        top_n,
        "starting trend report"
    );

    let loader = settings.loader(kind)?;
    let report = run_trend(loader.as_ref(), &settings.config, anchor)?;

    let path = settings.output_dir.join(trend_file_name(anchor));
    let quality = run_trend_checks(&report, top_n)
        .with_context("source", kind)
        .with_context("output", path.display().to_string());

    let log = settings.dq_log_path(&trend_dq_log_name(anchor, kind));
    write_quality_log(&log, &quality)?;
    summarize_quality(&quality);
    quality.log_failures(mode);
    quality.enforce(mode)?;
    write_trend_report(&report, &quality, &path)?;

    let available = report.available_months();
    eprintln!(
        "{}..{}: {} of {} month(s) with data, {} trend row(s), {}/{} check(s) failed",
        report.window_start(),
        anchor,
        available.len(),
        report.months.len(),
        report.rows.len(),
        quality.checks_failed,
        quality.checks_total,
    );
    eprintln!("trend:   {}", path.display());
    eprintln!("dq log:  {}", log.display());
    Ok(())
}

/// Parse and validate the config (and `--month`, when given) without loading data.
pub fn cmd_validate(args: &RunArgs, trend: &TrendArgs) -> Result<(), ReconError> {
    let settings = Settings::load(args, Some(trend))?;
    if let Some(month) = args.month.as_deref() {
        Month::parse(month)?;
    }
    let config = &settings.config;
    eprintln!(
        "valid: '{}' with {} source, dq mode {}, {}-month trend window, output {}",
        config.name,
        settings.kind(),
        settings.mode(),
        config.trend.window_months,
        settings.output_dir.display(),
    );
    Ok(())
}
