use tracing::info;

use crate::catalog::{expand_catalog, find_ambiguous_mappings};
use crate::config::ForecastConfig;
use crate::error::ReconError;
use crate::joiner::join_marketing;
use crate::metrics::{build_dashboards, Dashboards};
use crate::model::{MonthReconciliation, SourceTables};
use crate::month::Month;
use crate::quality::{run_source_checks, QualityReport};
use crate::rollup::{join_rollups, rollup_actuals, rollup_marketing, rollup_stats};
use crate::source::SourceLoader;

/// Everything one monthly report needs, computed from a single load.
#[derive(Debug, Clone)]
pub struct MonthlyReport {
    pub tables: SourceTables,
    pub reconciliation: MonthReconciliation,
    pub dashboards: Dashboards,
    pub quality: QualityReport,
}

/// Run the per-month pipeline over already-loaded tables.
pub fn reconcile_month(
    tables: &SourceTables,
    month: Month,
    config: &ForecastConfig,
) -> MonthReconciliation {
    let expanded = expand_catalog(&tables.catalog);
    let ambiguous = find_ambiguous_mappings(&expanded);

    let joined = join_marketing(
        &tables.marketing,
        &expanded,
        month,
        &config.filter.geography,
        &config.casework,
    );

    let marketing_rollup = rollup_marketing(&joined.mapped);
    let actuals_rollup = rollup_actuals(&tables.actuals, month);
    let stats_rollup = rollup_stats(&tables.stats, month);
    let records = join_rollups(month, &marketing_rollup, &actuals_rollup, &stats_rollup);

    MonthReconciliation {
        month,
        records,
        skipped: joined.skipped,
        mapped: joined.mapped,
        marketing_rollup,
        actuals_rollup,
        stats_rollup,
        ambiguous,
    }
}

/// Load, check, reconcile and build dashboards for one month.
///
/// Quality checks are computed but not enforced here; the caller decides
/// whether to abort after persisting the quality log.
pub fn run_month(
    loader: &dyn SourceLoader,
    config: &ForecastConfig,
    month: Month,
) -> Result<MonthlyReport, ReconError> {
    let tables = loader.load(month)?;
    info!(
        source = %loader.kind(),
        marketing = tables.marketing.len(),
        catalog = tables.catalog.len(),
        stats = tables.stats.len(),
        actuals = tables.actuals.len(),
        "loaded source tables"
    );

    let reconciliation = reconcile_month(&tables, month, config);
    let quality = run_source_checks(
        &tables,
        month,
        loader.kind(),
        &config.filter.geography,
        &reconciliation.ambiguous,
    );
    let dashboards = build_dashboards(&reconciliation.records);

    Ok(MonthlyReport {
        tables,
        reconciliation,
        dashboards,
        quality,
    })
}
