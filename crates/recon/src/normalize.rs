//! Join-key canonicalization and best-effort numeric coercion.
//!
//! Every join key on every table passes through [`normalize_key`] before any
//! comparison, and every numeric cell passes through [`coerce_or_zero`] (or
//! [`finite_or_zero`] for already-typed numbers) at ingestion.

/// Placeholder every missing key normalizes to.
///
/// Two missing keys therefore compare equal and can join to each other.
pub const NULL_KEY: &str = "NAN";

/// Trim, then ASCII-uppercase. Missing input becomes [`NULL_KEY`].
pub fn normalize_key(raw: Option<&str>) -> String {
    match raw {
        Some(s) => s.trim().to_ascii_uppercase(),
        None => NULL_KEY.to_string(),
    }
}

/// Parse a numeric cell; anything unparseable or non-finite becomes 0.
pub fn coerce_or_zero(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(finite_or_zero).unwrap_or(0.0)
}

/// NaN and infinities become 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
