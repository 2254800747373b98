//! Run report handed to exporters.

use crate::ledger::CommissioningLedger;
use crate::optimizer::{PeriodResult, TerminationStatus};
use crate::scurve::SCurveTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tpa_core::{Capacity, Diagnostics, PathwayResult, PathwayYears, TechnologyCatalog};

/// One technology as it entered and left one period.
#[derive(Debug, Clone, Serialize)]
pub struct TechnologySnapshot {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_of: Option<String>,
    /// Bounds handed to the optimizer
    pub bounds: Capacity,
    /// Optimal capacity
    pub capacity: f64,
    pub operation: f64,
    pub invest_per_capacity: f64,
    pub opex_per_capacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2_factor: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodSnapshot {
    pub year: i32,
    pub target_solve: bool,
    pub status: TerminationStatus,
    /// Version of the run state the period was prepared from
    pub state_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    pub technologies: Vec<TechnologySnapshot>,
}

impl PeriodSnapshot {
    pub fn capture(
        year: i32,
        target_solve: bool,
        state_version: u64,
        catalog: &TechnologyCatalog,
        result: &PeriodResult,
    ) -> Self {
        let technologies = catalog
            .iter()
            .map(|tech| TechnologySnapshot {
                name: tech.name.clone(),
                stock_of: tech.stock_of.clone(),
                bounds: tech.capacity,
                capacity: result.capacity(&tech.name),
                operation: result.operation(&tech.name),
                invest_per_capacity: tech.costs.invest_per_capacity,
                opex_per_capacity: tech.costs.opex_per_capacity,
                co2_factor: tech.conversion().and_then(|p| p.co2_factor()),
            })
            .collect();
        Self {
            year,
            target_solve,
            status: result.status.clone(),
            state_version,
            objective: result.objective,
            technologies,
        }
    }

    pub fn technology(&self, name: &str) -> Option<&TechnologySnapshot> {
        self.technologies.iter().find(|t| t.name == name)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PathwayReport {
    pub generated_at: DateTime<Utc>,
    pub years: PathwayYears,
    pub periods: Vec<PeriodSnapshot>,
    pub ledger: CommissioningLedger,
    pub curves: SCurveTable,
    pub diagnostics: Diagnostics,
    pub state_version: u64,
}

impl PathwayReport {
    /// The pathway period of `year`; the target-year solve is skipped.
    pub fn period(&self, year: i32) -> Option<&PeriodSnapshot> {
        self.periods.iter().find(|p| p.year == year && !p.target_solve)
    }

    pub fn target_solve(&self) -> Option<&PeriodSnapshot> {
        self.periods.iter().find(|p| p.target_solve)
    }

    pub fn to_json(&self) -> PathwayResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> PathwayResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
