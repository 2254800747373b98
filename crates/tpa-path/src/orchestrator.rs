//! Sequencing of a myopic transformation-path run.
//!
//! ```text
//! TargetYearSolve ──▶ S-curves ──▶ reference ──▶ start ──▶ … ──▶ target ──▶ report
//!                                  └────────── one solve per model year ──────────┘
//! ```
//!
//! Every period of the pathway runs the same steps:
//!
//! ```text
//! 1. roll stocks forward from the previous result
//! 2. expansion bounds from S-curves and funnels   (not in the reference year)
//! 3. stock parameters: reference costs or vintage blend
//! 4. technology parameters, demand and emission ceiling of the year
//! 5. shared expansion caps                         (when enabled)
//! 6. invariant check, solve, status check
//! ```
//!
//! Any error aborts the run; nothing is retried.

use crate::blend::blend_stock_parameters;
use crate::bounds::{apply_expansion_bounds, fix_numerical_instabilities};
use crate::ledger::CommissioningLedger;
use crate::optimizer::{CapacityOptimizer, PeriodModel, PeriodResult};
use crate::params::{apply_demand, apply_reference_stock_parameters, refresh_technology_parameters};
use crate::report::{PathwayReport, PeriodSnapshot};
use crate::scurve::build_scurves;
use crate::shared::{apply_group_caps, compute_minimum_schedule, record_target_results};
use crate::state::{PathwayState, Period};
use crate::stock::{create_new_stocks, roll_forward};
use chrono::Utc;
use tpa_core::{Diagnostics, PathwayConfig, PathwayError, PathwayInputs, PathwayResult, TechnologyCatalog};

/// Owner of all run state. Drives the optimizer once per period.
#[derive(Debug)]
pub struct TransformationPath {
    config: PathwayConfig,
    inputs: PathwayInputs,
    catalog: TechnologyCatalog,
    state: PathwayState,
    diagnostics: Diagnostics,
    periods: Vec<PeriodSnapshot>,
}

impl TransformationPath {
    /// Validate the scenario, densify the inputs onto the model years and
    /// seed the stocks from historical capacity.
    pub fn new(
        config: PathwayConfig,
        mut catalog: TechnologyCatalog,
        mut inputs: PathwayInputs,
    ) -> PathwayResult<Self> {
        config.validate()?;
        catalog.validate()?;
        for group in &config.shared_expansion.groups {
            for member in &group.members {
                if !catalog.contains(member) {
                    return Err(PathwayError::config(format!(
                        "shared group '{}' lists unknown technology '{member}'",
                        group.id
                    )));
                }
            }
        }
        for coupling in &config.coupled_storage {
            for name in [&coupling.vehicle, &coupling.storage] {
                if !catalog.contains(name) {
                    return Err(PathwayError::config(format!(
                        "storage coupling references unknown technology '{name}'"
                    )));
                }
            }
        }

        inputs.densify(&config.years);
        let ledger = CommissioningLedger::seed(&mut catalog, &inputs, &config.years)?;
        tracing::info!(
            technologies = catalog.len(),
            reference = config.years.reference,
            target = config.years.target,
            "transformation path initialized"
        );

        Ok(Self {
            config,
            inputs,
            catalog,
            state: PathwayState::new(ledger),
            diagnostics: Diagnostics::new(),
            periods: Vec::new(),
        })
    }

    pub fn config(&self) -> &PathwayConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TechnologyCatalog {
        &self.catalog
    }

    pub fn state(&self) -> &PathwayState {
        &self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Target-year solve followed by every model year in order.
    pub fn run(mut self, optimizer: &mut dyn CapacityOptimizer) -> PathwayResult<PathwayReport> {
        tracing::info!(optimizer = optimizer.id(), "starting transformation path");
        self.solve_target_year(optimizer)?;
        for year in self.config.years.model_years() {
            self.solve_period(year, optimizer)?;
        }
        tracing::info!(
            periods = self.periods.len(),
            diagnostics = %self.diagnostics.summary(),
            "transformation path finished"
        );
        Ok(self.into_report())
    }

    /// Solve the target year with full flexibility and build the S-curves
    /// from its result.
    pub fn solve_target_year(&mut self, optimizer: &mut dyn CapacityOptimizer) -> PathwayResult<PeriodResult> {
        let period = Period::target(&self.config.years);
        tracing::info!(year = period.year, "target-year solve");

        self.round_state();
        roll_forward(
            &mut self.catalog,
            &mut self.state.ledger,
            &self.inputs,
            &self.config.years,
            period,
            None,
        )?;
        apply_reference_stock_parameters(&mut self.catalog, &self.inputs, &self.config.years);
        self.apply_period_inputs(period)?;

        let result = self.solve(period, optimizer)?;

        self.state.curves = build_scurves(
            &self.catalog,
            &result,
            &self.inputs,
            &self.config,
            &mut self.diagnostics,
        )?;
        if self.config.shared_expansion.enabled {
            let groups = &self.config.shared_expansion.groups;
            record_target_results(&mut self.state.groups, groups, &result);
            for group in groups {
                compute_minimum_schedule(&mut self.state.groups, group, &self.state.ledger, &self.config.years)?;
            }
        }
        self.state.target_result = Some(result.clone());
        self.state.bump();
        Ok(result)
    }

    /// Prepare and solve one pathway year.
    pub fn solve_period(&mut self, year: i32, optimizer: &mut dyn CapacityOptimizer) -> PathwayResult<PeriodResult> {
        let years = self.config.years;
        let period = Period::pathway(year);
        if self.state.target_result.is_none() {
            return Err(PathwayError::config(format!(
                "period {year} solved before the target year"
            )));
        }
        tracing::info!(year, version = self.state.version(), "preparing period");

        // ====================================================================
        // STEP 1: ROLL STOCKS FORWARD
        // ====================================================================
        //
        // The previous result becomes commissioned capacity one interval
        // back. The reference year starts from history alone.

        self.round_state();
        let previous = if year == years.reference {
            None
        } else {
            self.state.last_result.clone()
        };
        if let Some(result) = &previous {
            let created = create_new_stocks(&mut self.catalog, &years, period, result)?;
            if !created.is_empty() {
                tracing::debug!(year, ?created, "new stocks");
            }
        }
        roll_forward(
            &mut self.catalog,
            &mut self.state.ledger,
            &self.inputs,
            &years,
            period,
            previous.as_ref(),
        )?;

        // ====================================================================
        // STEP 2: EXPANSION BOUNDS
        // ====================================================================

        if period.builds_bounds(&years) {
            let previous = previous.as_ref().ok_or_else(|| {
                PathwayError::config(format!("no result of the period before {year}"))
            })?;
            apply_expansion_bounds(
                &mut self.catalog,
                &self.state.ledger,
                &self.state.curves,
                &self.inputs,
                &self.config,
                year,
                previous,
                &mut self.diagnostics,
            )?;
        }

        // ====================================================================
        // STEP 3: STOCK PARAMETERS
        // ====================================================================
        //
        // Before the start year stocks hold only historical capacity and
        // carry reference-year costs.

        match &previous {
            Some(previous) if year >= years.start => blend_stock_parameters(
                &mut self.catalog,
                &self.state.ledger,
                &self.inputs,
                &self.config,
                year,
                previous,
                &self.state.modelyear_ub,
                &mut self.state.installed_capex,
            )?,
            _ => apply_reference_stock_parameters(&mut self.catalog, &self.inputs, &years),
        }

        // ====================================================================
        // STEP 4-5: PERIOD INPUTS AND SHARED CAPS
        // ====================================================================

        self.apply_period_inputs(period)?;

        // ====================================================================
        // STEP 6: SOLVE
        // ====================================================================

        let result = self.solve(period, optimizer)?;
        self.state.last_result = Some(result.clone());
        self.state.bump();
        Ok(result)
    }

    /// Year parameters, demand and shared caps.
    fn apply_period_inputs(&mut self, period: Period) -> PathwayResult<()> {
        refresh_technology_parameters(
            &mut self.catalog,
            &self.inputs,
            &self.config,
            period.year,
            &mut self.state.modelyear_ub,
        );
        apply_demand(&mut self.catalog, &self.inputs, period.year)?;

        if self.config.shared_expansion.enabled {
            for group in &self.config.shared_expansion.groups {
                if let Some(caps) = apply_group_caps(
                    &mut self.catalog,
                    group,
                    &mut self.state.groups,
                    &self.state.ledger,
                    &mut self.state.modelyear_ub,
                    &self.config.years,
                    period,
                )? {
                    tracing::debug!(group = %group.id, year = period.year, min = ?caps.min, max = caps.max, "shared caps");
                }
            }
        }
        Ok(())
    }

    fn solve(&mut self, period: Period, optimizer: &mut dyn CapacityOptimizer) -> PathwayResult<PeriodResult> {
        fix_numerical_instabilities(&mut self.catalog)?;

        let model = PeriodModel {
            year: period.year,
            target_solve: period.target_solve,
            technologies: &self.catalog,
            emission_ceiling: self.inputs.emission_ceiling(period.year),
        };
        let result = optimizer.solve(&model)?.rounded();
        if !result.status.is_optimal() {
            return Err(PathwayError::Infeasible {
                year: period.year,
                status: result.status.to_string(),
            });
        }
        tracing::info!(year = period.year, status = %result.status, objective = ?result.objective, "period solved");

        self.periods.push(PeriodSnapshot::capture(
            period.year,
            period.target_solve,
            self.state.version(),
            &self.catalog,
            &result,
        ));
        Ok(result)
    }

    fn round_state(&mut self) {
        self.state.ledger.round_all();
        for tech in self.catalog.iter_mut() {
            tech.capacity = tech.capacity.rounded();
        }
    }

    pub fn into_report(self) -> PathwayReport {
        PathwayReport {
            generated_at: Utc::now(),
            years: self.config.years,
            periods: self.periods,
            ledger: self.state.ledger.clone(),
            curves: self.state.curves.clone(),
            diagnostics: self.diagnostics,
            state_version: self.state.version(),
        }
    }
}
