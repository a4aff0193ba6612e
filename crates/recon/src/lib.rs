//! `facc-recon`: forecast reconciliation and accuracy engine.
//!
//! Pure engine crate: receives loaded source tables, returns reconciled
//! records, dashboards, trend tables and data-quality results.
//! No file, database or CLI dependencies.

pub mod catalog;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod joiner;
pub mod metrics;
pub mod model;
pub mod month;
pub mod normalize;
pub mod quality;
pub mod rollup;
pub mod source;
pub mod trend;

pub use config::{DqMode, ForecastConfig, SourceKind};
pub use engine::{reconcile_month, run_month, MonthlyReport};
pub use error::ReconError;
pub use model::{MonthReconciliation, ReconciledRecord, SourceTables, UnitType};
pub use month::Month;
pub use quality::QualityReport;
pub use source::SourceLoader;
pub use trend::{run_trend, TrendReport};
