use crate::config::SourceKind;
use crate::error::ReconError;
use crate::model::SourceTables;
use crate::month::Month;

/// Anything that can produce the four canonical tables for a month.
///
/// File-based loaders may return rows outside `month`; the pipeline filters
/// every table by month itself. Loaders apply the catalog division remap and
/// coerce numeric cells before returning.
pub trait SourceLoader {
    fn kind(&self) -> SourceKind;

    fn load(&self, month: Month) -> Result<SourceTables, ReconError>;
}
