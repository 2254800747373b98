//! Vintage stock management.
//!
//! Capacity built in earlier periods lives in a stock twin (`<name>_stock`)
//! whose capacity is always `Fixed`. Each period the previous result is
//! written into the [`CommissioningLedger`] and the twin is set to the
//! capacity still installed in the current year.
//!
//! ```text
//! reference year   stocks = history, every bounded technology fixed to 0
//! start year       stocks = history
//! later years      commission previous result at year - interval,
//!                  stocks = installed(year), schedule lifetime expiry
//! target solve     stocks = history(target), technologies get the rest
//!                  of their raw ceiling
//! ```

use crate::ledger::CommissioningLedger;
use crate::optimizer::PeriodResult;
use crate::state::Period;
use tpa_core::{
    round4, Capacity, PathwayError, PathwayInputs, PathwayResult, PathwayYears,
    TechnologyCatalog, CAPACITY_EPSILON,
};

/// Create the stock twin of `technology` the first time it builds capacity.
///
/// Returns `true` when a twin was added. Stocks, exempt technologies and
/// technologies that already own a twin are left alone.
pub fn create_stock_if_needed(
    catalog: &mut TechnologyCatalog,
    technology: &str,
    result: &PeriodResult,
) -> PathwayResult<bool> {
    let tech = catalog.require(technology)?;
    if tech.is_stock() || tech.is_exempt() || catalog.stock_of(technology).is_some() {
        return Ok(false);
    }
    if result.capacity(technology) <= CAPACITY_EPSILON {
        return Ok(false);
    }
    let twin = tech.stock_twin();
    tracing::debug!(stock = %twin.name, capacity = result.capacity(technology), "creating stock");
    catalog.insert(twin)?;
    Ok(true)
}

/// Create twins for every technology that built capacity in the previous
/// period. Only runs after the start year.
pub fn create_new_stocks(
    catalog: &mut TechnologyCatalog,
    years: &PathwayYears,
    period: Period,
    previous: &PeriodResult,
) -> PathwayResult<Vec<String>> {
    let mut created = Vec::new();
    if period.year <= period.start(years) {
        return Ok(created);
    }
    for name in catalog.names() {
        if create_stock_if_needed(catalog, &name, previous)? {
            created.push(name);
        }
    }
    Ok(created)
}

/// Roll every stock forward to `period.year`.
pub fn roll_forward(
    catalog: &mut TechnologyCatalog,
    ledger: &mut CommissioningLedger,
    inputs: &PathwayInputs,
    years: &PathwayYears,
    period: Period,
    previous: Option<&PeriodResult>,
) -> PathwayResult<()> {
    let year = period.year;
    let start = period.start(years);
    let parents: Vec<(String, u32)> = catalog
        .iter()
        .filter(|t| !t.is_stock() && catalog.stock_of(&t.name).is_some())
        .map(|t| (t.name.clone(), t.technical_lifetime))
        .collect();

    if year != years.reference && year != start {
        if let Some(result) = previous {
            for (name, lifetime) in &parents {
                ledger.commission(name, year - years.interval, result.capacity(name), *lifetime);
            }
        }
    }

    if period.target_solve || year <= start {
        for (name, _) in &parents {
            if !inputs.has_history(name) && !inputs.has_forced_decommissioning(name) {
                continue;
            }
            let remaining = round4(ledger.installed.get(name, year));
            set_stock(catalog, name, remaining)?;
            if period.target_solve {
                release_remaining_potential(catalog, inputs, name, year, remaining)?;
            }
        }
        if !period.target_solve {
            for tech in catalog.iter_mut() {
                if !tech.is_stock() && !tech.is_exempt() {
                    tech.capacity = Capacity::zero();
                }
            }
        }
    } else {
        for (name, lifetime) in &parents {
            let installed = round4(ledger.installed.get(name, year));
            if installed < 0.0 {
                return Err(PathwayError::numeric(
                    tpa_core::stock_name(name),
                    format!("negative capacity for stock in {year}: {installed}"),
                ));
            }
            set_stock(catalog, name, installed)?;

            let retirement = year - years.interval + *lifetime as i32;
            if retirement <= years.target {
                let built = previous.map(|r| r.capacity(name)).unwrap_or(0.0);
                ledger.schedule_decommissioning(name, retirement, built, years.interval, *lifetime)?;
            }
        }
    }

    ledger.round_all();
    for tech in catalog.iter_mut() {
        tech.capacity = tech.capacity.rounded();
    }
    Ok(())
}

fn set_stock(catalog: &mut TechnologyCatalog, parent: &str, value: f64) -> PathwayResult<()> {
    let stock_name = tpa_core::stock_name(parent);
    let stock = catalog.require_mut(&stock_name)?;
    stock.capacity = Capacity::fixed(value).map_err(|_| {
        PathwayError::numeric(stock_name.clone(), format!("negative capacity for stock: {value}"))
    })?;
    Ok(())
}

/// Target-year solve: the technology may only add what its raw ceiling
/// leaves after the remaining historical stock.
fn release_remaining_potential(
    catalog: &mut TechnologyCatalog,
    inputs: &PathwayInputs,
    name: &str,
    year: i32,
    remaining: f64,
) -> PathwayResult<()> {
    let tech = catalog.require_mut(name)?;
    if inputs.has_forced_decommissioning(name) {
        let scheduled = inputs.forced_decommissioning.get(name, year);
        tech.capacity = Capacity::fixed(round4(scheduled - remaining).max(0.0))?;
        return Ok(());
    }
    if tech.capacity.upper() < remaining {
        return Err(PathwayError::bound(
            name,
            format!(
                "historical rest capacity of {remaining} in target year exceeds the upper bound {}",
                tech.capacity.upper()
            ),
        ));
    }
    let new_max = round4(tech.raw_ceiling() - remaining);
    tech.capacity = match tech.capacity {
        Capacity::Fixed { .. } => Capacity::fixed(new_max)?,
        Capacity::Range { min, .. } => Capacity::range(min, new_max).map_err(|_| {
            PathwayError::bound(
                name,
                format!("lower bound '{min}' greater than upper bound '{new_max}'"),
            )
        })?,
    };
    Ok(())
}
