//! Capacity representation handed to the optimizer.
//!
//! A technology's capacity is either fixed to a single value or bounded by a
//! `[min, max]` window. Both variants are validated on construction: values
//! are non-negative and finite, and a range never has `min > max`.

use crate::error::{PathwayError, PathwayResult};
use serde::{Deserialize, Serialize};

/// Values below this threshold count as "nothing installed".
pub const CAPACITY_EPSILON: f64 = 0.01;

/// Decimal places kept after every capacity mutation.
pub const ROUNDING_DIGITS: i32 = 4;

/// Round to [`ROUNDING_DIGITS`] decimal places.
///
/// Suppresses the floating noise that solvers leave in optimal values so
/// that successive periods do not drift. Negative zero is normalized to `0.0`.
pub fn round4(value: f64) -> f64 {
    let scale = 10f64.powi(ROUNDING_DIGITS);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Capacity {
    Fixed { value: f64 },
    Range { min: f64, max: f64 },
}

impl Capacity {
    /// Fixed capacity; rejects negative or non-finite values.
    pub fn fixed(value: f64) -> PathwayResult<Self> {
        check_value("fixed capacity", value)?;
        Ok(Capacity::Fixed { value })
    }

    /// Capacity window; rejects `min > max` and negative bounds.
    pub fn range(min: f64, max: f64) -> PathwayResult<Self> {
        check_value("capacity minimum", min)?;
        check_value("capacity maximum", max)?;
        if min > max {
            return Err(PathwayError::bound(
                "<capacity>",
                format!("lower bound {min} greater than upper bound {max}"),
            ));
        }
        Ok(Capacity::Range { min, max })
    }

    /// `Fixed` when both bounds coincide, `Range` otherwise.
    pub fn from_bounds(min: f64, max: f64) -> PathwayResult<Self> {
        if min == max {
            Self::fixed(min)
        } else {
            Self::range(min, max)
        }
    }

    pub fn zero() -> Self {
        Capacity::Fixed { value: 0.0 }
    }

    pub fn lower(&self) -> f64 {
        match *self {
            Capacity::Fixed { value } => value,
            Capacity::Range { min, .. } => min,
        }
    }

    pub fn upper(&self) -> f64 {
        match *self {
            Capacity::Fixed { value } => value,
            Capacity::Range { max, .. } => max,
        }
    }

    pub fn fixed_value(&self) -> Option<f64> {
        match *self {
            Capacity::Fixed { value } => Some(value),
            Capacity::Range { .. } => None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Capacity::Fixed { .. })
    }

    /// Round every bound to four decimals.
    pub fn rounded(&self) -> Self {
        match *self {
            Capacity::Fixed { value } => Capacity::Fixed {
                value: round4(value),
            },
            Capacity::Range { min, max } => Capacity::Range {
                min: round4(min),
                max: round4(max),
            },
        }
    }

    /// Re-check the invariants, attributing failures to `technology`.
    pub fn validate(&self, technology: &str) -> PathwayResult<()> {
        match *self {
            Capacity::Fixed { value } => {
                if value.is_nan() || value < 0.0 {
                    return Err(PathwayError::numeric(
                        technology,
                        format!("negative fix capacity: {value}"),
                    ));
                }
            }
            Capacity::Range { min, max } => {
                if min.is_nan() || min < 0.0 {
                    return Err(PathwayError::numeric(
                        technology,
                        format!("negative lower bound: {min}"),
                    ));
                }
                if max.is_nan() || max < 0.0 {
                    return Err(PathwayError::numeric(
                        technology,
                        format!("negative upper bound: {max}"),
                    ));
                }
                if min > max {
                    return Err(PathwayError::bound(
                        technology,
                        format!("lower bound '{min}' greater than upper bound '{max}'"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::zero()
    }
}

impl std::fmt::Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capacity::Fixed { value } => write!(f, "fixed({value})"),
            Capacity::Range { min, max } => write!(f, "range({min}, {max})"),
        }
    }
}

fn check_value(what: &str, value: f64) -> PathwayResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PathwayError::numeric(
            "<capacity>",
            format!("{what} must be finite and non-negative, got {value}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round4(-0.000_01), 0.0);
        assert!(round4(-0.000_01).is_sign_positive());
        assert_eq!(round4(12.0), 12.0);
    }

    #[test]
    fn test_round4_idempotent() {
        for v in [0.0, 0.123_456_7, 5.55555, 1234.000_049_9, 3.141_592_65, 99.99995] {
            let once = round4(v);
            assert_eq!(round4(once), once, "rounding {v} twice changed the value");
        }
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert!(Capacity::range(2.0, 1.0).is_err());
        assert!(Capacity::range(-1.0, 1.0).is_err());
        assert!(Capacity::fixed(f64::NAN).is_err());
        assert!(Capacity::range(1.0, 1.0).is_ok());
    }

    #[test]
    fn test_from_bounds_collapses() {
        assert_eq!(Capacity::from_bounds(3.0, 3.0).unwrap(), Capacity::Fixed { value: 3.0 });
        assert_eq!(
            Capacity::from_bounds(1.0, 3.0).unwrap(),
            Capacity::Range { min: 1.0, max: 3.0 }
        );
    }

    #[test]
    fn test_validate_reports_technology() {
        let cap = Capacity::Range { min: 5.0, max: 4.0 };
        let err = cap.validate("gas").unwrap_err();
        assert!(err.to_string().contains("gas"));
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Capacity::Range { min: 0.0, max: 2.5 }).unwrap();
        assert_eq!(json, r#"{"type":"range","min":0.0,"max":2.5}"#);
        let back: Capacity = serde_json::from_str(r#"{"type":"fixed","value":1.0}"#).unwrap();
        assert_eq!(back, Capacity::Fixed { value: 1.0 });
    }
}
