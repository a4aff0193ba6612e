// Source loaders and report writers

pub mod alternate;
pub mod comparison;
pub mod json;
pub mod legacy;
pub mod report;
pub mod sqlite;
pub mod table;
pub mod trend_report;
pub mod xlsx;
pub mod xlsx_styles;

use std::path::Path;

use facc_recon::config::SourceConfig;
use facc_recon::{ReconError, SourceKind, SourceLoader};

pub use alternate::AlternateLoader;
pub use legacy::LegacyLoader;
pub use sqlite::SqliteLoader;

/// Build the loader for `kind`. Relative paths resolve against `base_dir`.
pub fn loader_for(
    kind: SourceKind,
    base_dir: &Path,
    source: &SourceConfig,
) -> Result<Box<dyn SourceLoader>, ReconError> {
    source.require_paths(kind)?;
    Ok(match kind {
        SourceKind::Legacy => Box::new(LegacyLoader::new(base_dir, source.clone())),
        SourceKind::Alternate => Box::new(AlternateLoader::new(base_dir, source.clone())),
        SourceKind::Sqlite => {
            let database = source.database.as_deref().unwrap_or_default();
            Box::new(SqliteLoader::new(base_dir.join(database)))
        }
    })
}
