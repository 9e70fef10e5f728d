//! The four aggregation functions, ported verbatim from
//! `internal/aggregator/functions.go`: empty input always yields 0.

/// Arithmetic mean; empty slice -> 0.
pub fn avg(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Maximum value; empty slice -> 0.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(m) if v > m => Some(v),
        Some(m) => Some(m),
    }).unwrap_or(0.0)
}

/// Minimum value; empty slice -> 0.
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(None, |acc, v| match acc {
        None => Some(v),
        Some(m) if v < m => Some(v),
        Some(m) => Some(m),
    }).unwrap_or(0.0)
}

/// Value of the chronologically most recent sample, i.e. the last element
/// of the insertion-ordered slice; empty slice -> 0.
pub fn last(values: &[f64]) -> f64 {
    values.last().copied().unwrap_or(0.0)
}

/// Looks up an aggregation function by its configured name. Unknown names
/// are the caller's cue to skip silently, per spec.md §4.1.
pub fn lookup(name: &str) -> Option<fn(&[f64]) -> f64> {
    match name {
        "avg" => Some(avg),
        "max" => Some(max),
        "min" => Some(min),
        "last" => Some(last),
        _ => None,
    }
}
