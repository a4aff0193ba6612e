use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad window, missing path, etc.).
    ConfigValidation(String),
    /// Month argument not in `YYYY-MM` form.
    MonthParse(String),
    /// A required source file or table does not exist.
    MissingSource(String),
    /// Missing required column in a loaded table.
    MissingColumn { table: String, column: String },
    /// Source data present but not in the expected layout.
    SourceLayout { table: String, message: String },
    /// Relational source query failed.
    Database(String),
    /// IO error (file read, report write, etc.).
    Io(String),
    /// Every month in a trend window was empty.
    NoTrendData { window_start: String, window_end: String },
    /// Critical data-quality checks failed with enforcement mode `fail`.
    QualityGate { critical_failed: usize },
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MonthParse(value) => {
                write!(f, "month must be in YYYY-MM format, got '{value}'")
            }
            Self::MissingSource(what) => write!(f, "source not found: {what}"),
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::SourceLayout { table, message } => {
                write!(f, "table '{table}': {message}")
            }
            Self::Database(msg) => write!(f, "database error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::NoTrendData { window_start, window_end } => write!(
                f,
                "no trend data rows were generated for {window_start}..{window_end}"
            ),
            Self::QualityGate { critical_failed } => write!(
                f,
                "{critical_failed} critical data-quality check(s) failed, report generation aborted"
            ),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
