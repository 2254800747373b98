//! Unified error type for transformation-path runs
//!
//! Every failure raised while building bounds, rolling stocks or blending
//! parameters is a [`PathwayError`]. Each variant maps onto one
//! [`ErrorKind`], which is also the category used by
//! [`Diagnostics`](crate::diagnostics::Diagnostics) for recoverable issues.
//!
//! # Example
//!
//! ```
//! use tpa_core::{ErrorKind, PathwayError, PathwayResult};
//!
//! fn check(min: f64, max: f64) -> PathwayResult<()> {
//!     if min > max {
//!         return Err(PathwayError::bound("wind", format!("{min} > {max}")));
//!     }
//!     Ok(())
//! }
//!
//! let err = check(2.0, 1.0).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::BoundViolation);
//! ```

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of everything that can go wrong in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The optimizer could not find a feasible (or bounded) solution.
    Infeasible,
    /// A capacity bound is inconsistent (min > max, outside a curve, ...).
    BoundViolation,
    /// Scenario configuration or input data contradict each other.
    ConfigInconsistency,
    /// A value became negative, undefined, or left its valid range.
    NumericAnomaly,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Infeasible => "infeasible",
            ErrorKind::BoundViolation => "bound-violation",
            ErrorKind::ConfigInconsistency => "config-inconsistency",
            ErrorKind::NumericAnomaly => "numeric-anomaly",
        };
        f.write_str(label)
    }
}

/// Error type for all pathway operations.
#[derive(Error, Debug)]
pub enum PathwayError {
    /// Optimizer terminated without an optimal solution
    #[error("optimization of year {year} terminated with status '{status}'")]
    Infeasible { year: i32, status: String },

    /// Bound construction produced an inconsistent capacity window
    #[error("bound violation for '{technology}': {detail}")]
    BoundViolation { technology: String, detail: String },

    /// Configuration or input data inconsistency
    #[error("configuration error: {0}")]
    ConfigInconsistency(String),

    /// Negative, undefined, or out-of-range numeric value
    #[error("numeric anomaly for '{technology}': {detail}")]
    NumericAnomaly { technology: String, detail: String },

    /// I/O errors while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be deserialized
    #[error("parse error: {0}")]
    Parse(String),
}

/// Convenience alias used throughout the workspace.
pub type PathwayResult<T> = Result<T, PathwayError>;

impl PathwayError {
    pub fn bound(technology: impl Into<String>, detail: impl Into<String>) -> Self {
        PathwayError::BoundViolation {
            technology: technology.into(),
            detail: detail.into(),
        }
    }

    pub fn numeric(technology: impl Into<String>, detail: impl Into<String>) -> Self {
        PathwayError::NumericAnomaly {
            technology: technology.into(),
            detail: detail.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        PathwayError::ConfigInconsistency(message.into())
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PathwayError::Infeasible { .. } => ErrorKind::Infeasible,
            PathwayError::BoundViolation { .. } => ErrorKind::BoundViolation,
            PathwayError::NumericAnomaly { .. } => ErrorKind::NumericAnomaly,
            PathwayError::ConfigInconsistency(_) | PathwayError::Io(_) | PathwayError::Parse(_) => {
                ErrorKind::ConfigInconsistency
            }
        }
    }
}

impl From<anyhow::Error> for PathwayError {
    fn from(err: anyhow::Error) -> Self {
        PathwayError::ConfigInconsistency(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for PathwayError {
    fn from(err: serde_json::Error) -> Self {
        PathwayError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for PathwayError {
    fn from(err: serde_yaml::Error) -> Self {
        PathwayError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for PathwayError {
    fn from(err: toml::de::Error) -> Self {
        PathwayError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PathwayError::Infeasible {
            year: 2030,
            status: "infeasible".into(),
        };
        assert!(err.to_string().contains("2030"));
        assert!(err.to_string().contains("infeasible"));
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(PathwayError::bound("a", "b").kind(), ErrorKind::BoundViolation);
        assert_eq!(PathwayError::numeric("a", "b").kind(), ErrorKind::NumericAnomaly);
        assert_eq!(PathwayError::config("x").kind(), ErrorKind::ConfigInconsistency);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(PathwayError::from(io).kind(), ErrorKind::ConfigInconsistency);
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> PathwayResult<()> {
            Err(PathwayError::numeric("stock", "negative"))
        }

        fn outer() -> PathwayResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(PathwayError::NumericAnomaly { .. })));
    }
}
