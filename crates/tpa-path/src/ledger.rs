//! Commissioning ledger of vintage stocks.
//!
//! Four technology × year tables kept for the duration of one run:
//!
//! ```text
//! installed       capacity still in operation, by calendar year
//! commissioned    capacity built in the interval ending at a model year
//! decommissioned  capacity leaving operation (lifetime expiry or schedule)
//! compensation    replacement capacity pre-allocated ahead of a retirement
//! ```
//!
//! `installed` covers one interval before the reference year (for the
//! historical growth rate); the other tables cover reference through target.

use serde::Serialize;
use tpa_core::{
    round4, PathwayError, PathwayInputs, PathwayResult, PathwayYears, TechnologyCatalog, YearTable,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommissioningLedger {
    pub installed: YearTable,
    pub commissioned: YearTable,
    pub decommissioned: YearTable,
    pub compensation: YearTable,
}

impl CommissioningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the ledger from historical capacity or, where given, the
    /// forced-decommissioning schedule, and create the stock twins of every
    /// technology that has such a series.
    pub fn seed(
        catalog: &mut TechnologyCatalog,
        inputs: &PathwayInputs,
        years: &PathwayYears,
    ) -> PathwayResult<Self> {
        let mut ledger = Self::new();
        let mut twins = Vec::new();

        for tech in catalog.iter() {
            if tech.is_stock() || tech.is_virtual() || tech.is_demand() {
                continue;
            }
            let series = if inputs.has_forced_decommissioning(&tech.name) {
                &inputs.forced_decommissioning
            } else if inputs.has_history(&tech.name) {
                &inputs.historical
            } else {
                continue;
            };

            for year in (years.reference - years.interval)..=years.target {
                ledger
                    .installed
                    .set(&tech.name, year, series.get(&tech.name, year));
            }
            ledger.commissioned.add(
                &tech.name,
                years.reference,
                inputs.historical.get(&tech.name, years.reference),
            );
            for year in years.reference..=years.target {
                let removed = if year < years.target {
                    (series.get(&tech.name, year) - series.get(&tech.name, year + 1)).abs()
                } else {
                    0.0
                };
                ledger.decommissioned.set(&tech.name, year, removed);
            }
            ledger.compensation.ensure_row(&tech.name);

            if catalog.stock_of(&tech.name).is_none() {
                twins.push(tech.stock_twin());
            }
        }

        for twin in twins {
            tracing::debug!(stock = %twin.name, "seeding stock from historical capacity");
            catalog.insert(twin)?;
        }
        ledger.round_all();
        Ok(ledger)
    }

    /// Record capacity commissioned in `year` and keep it installed for
    /// `technical_lifetime` years.
    pub fn commission(&mut self, technology: &str, year: i32, capacity: f64, technical_lifetime: u32) {
        self.commissioned.set(technology, year, capacity);
        let last = year + technical_lifetime as i32 - 1;
        for y in year..=last {
            self.installed.add(technology, y, capacity);
        }
    }

    /// Schedule the retirement of `capacity` in `year` and spread
    /// replacement capacity over the preceding interval.
    ///
    /// A retirement cell that turns negative is fatal.
    pub fn schedule_decommissioning(
        &mut self,
        technology: &str,
        year: i32,
        capacity: f64,
        interval: i32,
        technical_lifetime: u32,
    ) -> PathwayResult<()> {
        self.decommissioned.add(technology, year, capacity);
        let retired = round4(self.decommissioned.get(technology, year));
        if retired < 0.0 {
            return Err(PathwayError::numeric(
                tpa_core::stock_name(technology),
                format!("negative decommissioning in {year}: {retired}"),
            ));
        }
        self.compensate(technology, year, interval, technical_lifetime);
        Ok(())
    }

    /// Back-distribute compensation for a retirement in `decommission_year`.
    ///
    /// The year before the retirement receives twice the retired capacity
    /// divided by `lifetime - 2`; every earlier year of the interval receives
    /// the following year's share scaled by `(lifetime - 2 - t) / (lifetime - 2)`.
    pub fn compensate(
        &mut self,
        technology: &str,
        decommission_year: i32,
        interval: i32,
        technical_lifetime: u32,
    ) {
        let span = technical_lifetime as f64 - 2.0;
        if span <= 0.0 {
            return;
        }
        let last = decommission_year - interval + 1;
        for (t, year) in (last..decommission_year).rev().enumerate() {
            let t = (t + 1) as f64;
            if self.compensation.get(technology, year) < 0.0 {
                continue;
            }
            let share = if year == decommission_year - 1 {
                self.decommissioned.get(technology, year + 1) / span * 2.0
            } else {
                self.compensation.get(technology, year + 1) * ((span - t) / span)
            };
            self.compensation.add(technology, year, share);
        }
    }

    /// Combined decommissioning of `technologies` in one year.
    pub fn decommissioning_of<'a>(
        &self,
        technologies: impl IntoIterator<Item = &'a str>,
        year: i32,
    ) -> f64 {
        self.decommissioned.sum_technologies(technologies, year)
    }

    /// Combined installed capacity of `technologies` in one year.
    pub fn installed_of<'a>(&self, technologies: impl IntoIterator<Item = &'a str>, year: i32) -> f64 {
        self.installed.sum_technologies(technologies, year)
    }

    pub fn round_all(&mut self) {
        self.installed.round_all();
        self.commissioned.round_all();
        self.decommissioned.round_all();
        self.compensation.round_all();
    }
}
