//! Exogenous data consumed by a pathway run.
//!
//! Loaders hand over series at whatever years the source data covers
//! (typically 2020/2030/2040/2050). [`PathwayInputs::densify`] fills every
//! calendar year the run touches so that lookups during the run never miss.

use crate::config::PathwayYears;
use crate::table::YearTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathwayInputs {
    /// Installed capacity before and during the pathway
    #[serde(default)]
    pub historical: YearTable,
    /// Exogenously fixed remaining capacity (replaces lifetime-based decommissioning)
    #[serde(default)]
    pub forced_decommissioning: YearTable,
    #[serde(default)]
    pub demand: YearTable,
    /// Investment cost per unit capacity
    #[serde(default)]
    pub capex: YearTable,
    /// Relative width of the cost-scaling band
    #[serde(default)]
    pub cost_scale: YearTable,
    /// Fixed operating cost as a share of investment cost
    #[serde(default)]
    pub opex_share: BTreeMap<String, f64>,
    #[serde(default)]
    pub fuel_prices: YearTable,
    /// CO2 intensity per unit of operation
    #[serde(default)]
    pub emission_intensity: YearTable,
    /// Per-technology table of commodity × year conversion factors
    #[serde(default)]
    pub conversion_factors: BTreeMap<String, YearTable>,
    /// Emission ceiling per year
    #[serde(default)]
    pub emission_limits: BTreeMap<i32, f64>,
}

impl PathwayInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill every year from one interval before the reference year through
    /// the target year by linear interpolation.
    pub fn densify(&mut self, years: &PathwayYears) {
        let span = (years.reference - years.interval)..=years.target;
        for table in [
            &mut self.historical,
            &mut self.forced_decommissioning,
            &mut self.demand,
            &mut self.capex,
            &mut self.cost_scale,
            &mut self.fuel_prices,
            &mut self.emission_intensity,
        ] {
            table.interpolate_years(span.clone());
        }
        for table in self.conversion_factors.values_mut() {
            table.interpolate_years(span.clone());
        }
        if !self.emission_limits.is_empty() {
            let mut limits = YearTable::from_row("limit", self.emission_limits.clone());
            limits.interpolate_years(span);
            if let Some(row) = limits.row("limit") {
                self.emission_limits = row.clone();
            }
        }
    }

    pub fn has_history(&self, technology: &str) -> bool {
        self.historical.contains(technology)
    }

    pub fn has_forced_decommissioning(&self, technology: &str) -> bool {
        self.forced_decommissioning.contains(technology)
    }

    pub fn emission_ceiling(&self, year: i32) -> Option<f64> {
        self.emission_limits.get(&year).copied()
    }

    /// Conversion factor of one commodity in one year, if the series exists.
    pub fn conversion_factor(&self, technology: &str, commodity: &str, year: i32) -> Option<f64> {
        self.conversion_factors
            .get(technology)
            .and_then(|table| table.try_get(commodity, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_densify_fills_every_year() {
        let years = PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2040,
            interval: 5,
        };
        let mut inputs = PathwayInputs::new();
        inputs.historical.insert_row("coal", [(2020, 40.0), (2040, 0.0)]);
        inputs.emission_limits.insert(2020, 100.0);
        inputs.emission_limits.insert(2040, 0.0);
        inputs
            .conversion_factors
            .insert("boiler".into(), YearTable::from_row("heat", [(2020, 0.8), (2040, 1.0)]));

        inputs.densify(&years);

        assert_eq!(inputs.historical.get("coal", 2015), 40.0);
        assert_eq!(inputs.historical.get("coal", 2030), 20.0);
        assert_eq!(inputs.emission_ceiling(2025), Some(75.0));
        let heat = inputs.conversion_factor("boiler", "heat", 2030).unwrap();
        assert!((heat - 0.9).abs() < 1e-12);
        assert!(inputs.has_history("coal"));
        assert!(!inputs.has_forced_decommissioning("coal"));
    }
}
