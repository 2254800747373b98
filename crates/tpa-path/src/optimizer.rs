//! Seam between the pathway driver and the single-period optimizer.
//!
//! The driver never builds or solves an optimization model itself. For each
//! period it hands a [`PeriodModel`] (technologies with their capacity
//! representation and parameters, plus the emission ceiling) to a
//! [`CapacityOptimizer`] and reads back a [`PeriodResult`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tpa_core::{round4, PathwayResult, TechnologyCatalog};

/// Termination condition reported by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationStatus {
    Optimal,
    Infeasible,
    InfeasibleOrUnbounded,
    Other(String),
}

impl TerminationStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, TerminationStatus::Optimal)
    }
}

impl std::fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationStatus::Optimal => f.write_str("optimal"),
            TerminationStatus::Infeasible => f.write_str("infeasible"),
            TerminationStatus::InfeasibleOrUnbounded => f.write_str("infeasibleOrUnbounded"),
            TerminationStatus::Other(status) => f.write_str(status),
        }
    }
}

/// Everything the optimizer needs for one period.
#[derive(Debug, Clone, Copy)]
pub struct PeriodModel<'a> {
    pub year: i32,
    /// Initial full-flexibility solve of the target year
    pub target_solve: bool,
    pub technologies: &'a TechnologyCatalog,
    pub emission_ceiling: Option<f64>,
}

/// Optimal capacities and operations of one period. Read-only for the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodResult {
    pub status: TerminationStatus,
    #[serde(default)]
    pub capacities: BTreeMap<String, f64>,
    #[serde(default)]
    pub operations: BTreeMap<String, f64>,
    #[serde(default)]
    pub objective: Option<f64>,
}

impl PeriodResult {
    pub fn optimal(capacities: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            status: TerminationStatus::Optimal,
            capacities: capacities.into_iter().collect(),
            operations: BTreeMap::new(),
            objective: None,
        }
    }

    pub fn with_status(status: TerminationStatus) -> Self {
        Self {
            status,
            capacities: BTreeMap::new(),
            operations: BTreeMap::new(),
            objective: None,
        }
    }

    /// Optimal capacity of a technology; missing entries count as zero.
    pub fn capacity(&self, technology: &str) -> f64 {
        self.capacities.get(technology).copied().unwrap_or(0.0)
    }

    pub fn operation(&self, technology: &str) -> f64 {
        self.operations.get(technology).copied().unwrap_or(0.0)
    }

    /// Round capacities and operations to 4 decimals to drop solver noise.
    pub fn rounded(mut self) -> Self {
        for value in self.capacities.values_mut().chain(self.operations.values_mut()) {
            *value = round4(*value);
        }
        self
    }
}

/// Single-period capacity-expansion optimizer.
///
/// Implementations build and solve the LP/QP for the given period. A
/// non-optimal termination is reported through [`PeriodResult::status`];
/// `Err` is reserved for failures to run the optimizer at all.
pub trait CapacityOptimizer {
    /// Unique identifier (e.g., "highs", "gurobi", "scripted")
    fn id(&self) -> &str;

    fn solve(&mut self, model: &PeriodModel<'_>) -> PathwayResult<PeriodResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the trait is object-safe (can be used with dyn).
    #[test]
    fn test_trait_is_object_safe() {
        fn _accepts_optimizer(_o: &mut dyn CapacityOptimizer) {}
    }

    #[test]
    fn test_missing_capacity_is_zero() {
        let result = PeriodResult::optimal([("pv".to_string(), 3.5)]);
        assert_eq!(result.capacity("pv"), 3.5);
        assert_eq!(result.capacity("wind"), 0.0);
        assert!(result.status.is_optimal());
    }

    #[test]
    fn test_rounded_drops_solver_noise() {
        let mut result = PeriodResult::optimal([
            ("pv".to_string(), 4.999999999),
            ("coal".to_string(), -1e-9),
        ]);
        result.operations.insert("pv".to_string(), 12.345678);
        let result = result.rounded();
        assert_eq!(result.capacity("pv"), 5.0);
        assert_eq!(result.capacity("coal"), 0.0);
        assert_eq!(result.operation("pv"), 12.3457);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TerminationStatus::InfeasibleOrUnbounded.to_string(), "infeasibleOrUnbounded");
        assert_eq!(TerminationStatus::Other("time_limit".into()).to_string(), "time_limit");
        assert!(!TerminationStatus::Infeasible.is_optimal());
    }
}
