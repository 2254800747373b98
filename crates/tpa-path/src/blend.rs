//! Vintage-weighted parameters of stock twins.
//!
//! A stock holds capacity commissioned in several earlier intervals. Its
//! investment cost, efficiency and emission factor are the averages of the
//! still-active vintages weighted by capacity:
//!
//! ```text
//! installed(Y) = 70      commissioned: 2020 → 40   2025 → 20   2030 → 30
//!
//! apportion backward from Y:   2030: 30   2025: 20   2020: 20 (of 40)
//! invest = Σ active(y) · capex(y) / Σ active(y)   (only y within economic lifetime)
//! ```
//!
//! Capacity built in cost-scaling mode was bought along a linear marginal
//! cost curve; its average cost is the midpoint between the low end and the
//! cost at the installed share of that year's ceiling.

use crate::ledger::CommissioningLedger;
use crate::optimizer::PeriodResult;
use std::collections::BTreeMap;
use tpa_core::{
    round4, stock_name, PathwayConfig, PathwayError, PathwayInputs, PathwayResult, Technology,
    TechnologyCatalog, TechnologyKind, YearTable, CAPACITY_EPSILON, CO2_COMMODITY,
};

/// Capacity of each commissioning year still installed in `year`, most
/// recent first.
pub fn active_vintages(
    ledger: &CommissioningLedger,
    technology: &str,
    year: i32,
    reference: i32,
    interval: i32,
) -> PathwayResult<BTreeMap<i32, f64>> {
    let mut remaining = ledger.installed.get(technology, year);
    let mut active = BTreeMap::new();
    let mut vintage = year;
    while vintage >= reference {
        let share = ledger.commissioned.get(technology, vintage).min(remaining).max(0.0);
        remaining -= share;
        active.insert(vintage, share);
        vintage -= interval;
    }
    if active.get(&year).copied().unwrap_or(0.0) != 0.0 {
        return Err(PathwayError::numeric(
            technology,
            format!("capacity commissioned in {year} before the period was solved"),
        ));
    }
    Ok(active)
}

/// Average investment cost of capacity bought in cost-scaling mode.
///
/// `capacity` is what was built in `year`, `ceiling` that year's capacity
/// upper bound and `scale` the relative cost spread.
pub fn scaled_installed_cost(
    technology: &str,
    base: f64,
    scale: f64,
    capacity: f64,
    ceiling: f64,
) -> PathwayResult<f64> {
    if capacity < 0.0 || round4(capacity) > round4(ceiling) {
        return Err(PathwayError::bound(
            technology,
            format!("installed capacity {capacity} outside the valid range [0, {ceiling}]"),
        ));
    }
    let low = base * (1.0 - scale);
    let high = base * (1.0 + scale);
    let marginal = if ceiling > 0.0 {
        low + (high - low) * capacity / ceiling
    } else {
        low
    };
    if marginal < 0.0 {
        return Err(PathwayError::numeric(
            technology,
            format!("negative marginal investment cost {marginal}"),
        ));
    }
    let installed = low + (marginal - low) / 2.0;
    if round4(installed) > round4(base) {
        return Err(PathwayError::bound(
            technology,
            format!("blended investment cost {installed} exceeds the base cost {base}"),
        ));
    }
    Ok(installed)
}

fn weighted_average(active: &BTreeMap<i32, f64>, total: f64, value: impl Fn(i32) -> f64) -> f64 {
    active.iter().map(|(&y, &cap)| cap * value(y)).sum::<f64>() / total
}

/// Factor of one commodity for capacity commissioned in `year`.
fn vintage_factor(tech: &Technology, inputs: &PathwayInputs, commodity: &str, year: i32) -> f64 {
    if commodity == CO2_COMMODITY && inputs.emission_intensity.contains(&tech.name) {
        let intensity = inputs.emission_intensity.get(&tech.name, year);
        if intensity != 0.0 {
            return intensity;
        }
    }
    inputs
        .conversion_factor(&tech.name, commodity, year)
        .or_else(|| tech.conversion().and_then(|p| p.factors.get(commodity).copied()))
        .unwrap_or(0.0)
}

/// Blend cost, efficiency and emission parameters of every stock twin for `year`.
#[allow(clippy::too_many_arguments)]
pub fn blend_stock_parameters(
    catalog: &mut TechnologyCatalog,
    ledger: &CommissioningLedger,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
    year: i32,
    previous: &PeriodResult,
    modelyear_ub: &YearTable,
    installed_capex: &mut YearTable,
) -> PathwayResult<()> {
    let years = &config.years;
    let parents: Vec<String> = catalog
        .iter()
        .filter(|t| !t.is_stock() && catalog.stock_of(&t.name).is_some())
        .map(|t| t.name.clone())
        .collect();

    for name in parents {
        if previous.capacity(&name) < CAPACITY_EPSILON {
            continue;
        }
        let parent = catalog.require(&name)?.clone();
        let active = active_vintages(ledger, &name, year, years.reference, years.interval)?;
        let total: f64 = active.values().sum();
        if total == 0.0 {
            continue;
        }

        let mut factors = BTreeMap::new();
        if let Some(params) = parent.conversion().filter(|p| !p.static_factors) {
            let emissions: f64 = active
                .keys()
                .map(|&y| vintage_factor(&parent, inputs, CO2_COMMODITY, y))
                .sum();
            if emissions > 0.0 {
                let co2 = weighted_average(&active, total, |y| {
                    vintage_factor(&parent, inputs, CO2_COMMODITY, y)
                });
                if co2 != 0.0 {
                    factors.insert(CO2_COMMODITY.to_string(), round4(co2));
                }
            }
            for commodity in params.factors.keys().filter(|c| c.as_str() != CO2_COMMODITY) {
                let efficiency =
                    weighted_average(&active, total, |y| vintage_factor(&parent, inputs, commodity, y));
                factors.insert(commodity.clone(), efficiency);
            }
        }

        let twin = stock_name(&name);
        let own_reference_capex = inputs.capex.contains(&twin);
        let mut invest = 0.0;
        for (&vintage, &capacity) in &active {
            if vintage >= year || capacity <= 0.0 {
                continue;
            }
            if year - vintage >= parent.economic_lifetime as i32 {
                continue;
            }
            let capex = if vintage == years.reference {
                if own_reference_capex {
                    inputs.capex.get(&twin, vintage)
                } else {
                    inputs.capex.get(&name, vintage)
                }
            } else if vintage == year - years.interval
                && config.cost_scaling
                && inputs.cost_scale.get(&name, vintage) != 0.0
            {
                let installed = scaled_installed_cost(
                    &name,
                    inputs.capex.get(&name, vintage),
                    inputs.cost_scale.get(&name, vintage),
                    previous.capacity(&name),
                    modelyear_ub.get(&name, vintage),
                )?;
                installed_capex.set(&name, vintage, installed);
                installed
            } else {
                installed_capex
                    .try_get(&name, vintage)
                    .unwrap_or_else(|| inputs.capex.get(&name, vintage))
            };
            invest += capacity * capex;
        }
        let invest = round4(invest / total);
        let share = inputs.opex_share.get(&name).copied().unwrap_or(0.0);

        let stock = catalog.require_mut(&twin)?;
        stock.costs.invest_per_capacity = invest;
        stock.costs.opex_per_capacity = invest * share;
        if config.cost_scaling && !matches!(stock.kind, TechnologyKind::Storage(_)) {
            stock.costs.cost_scale = Some(0.0);
        }
        if inputs.fuel_prices.contains(&name) {
            stock.costs.opex_per_operation = inputs.fuel_prices.get(&name, year);
        }
        if let Some(params) = stock.conversion_mut() {
            params.factors.extend(factors);
        }
        tracing::debug!(stock = %twin, year, invest, vintages = active.len(), "blended stock parameters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpa_core::{Capacity, ConversionParams, PathwayYears};

    fn config() -> PathwayConfig {
        PathwayConfig::new(PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2050,
            interval: 5,
        })
    }

    fn ledger() -> CommissioningLedger {
        let mut ledger = CommissioningLedger::new();
        ledger.commissioned.set("chp", 2020, 40.0);
        ledger.commissioned.set("chp", 2025, 20.0);
        ledger.commissioned.set("chp", 2030, 30.0);
        ledger.installed.set("chp", 2035, 70.0);
        ledger
    }

    fn catalog() -> TechnologyCatalog {
        let chp = Technology::new(
            "chp",
            TechnologyKind::Conversion(ConversionParams::new([
                ("heat".to_string(), 0.5),
                (CO2_COMMODITY.to_string(), 0.3),
            ])),
            Capacity::range(0.0, 200.0).unwrap(),
        )
        .with_lifetimes(30, 30);
        let mut catalog = TechnologyCatalog::new();
        catalog.insert(chp.stock_twin()).unwrap();
        catalog.insert(chp).unwrap();
        catalog
    }

    #[test]
    fn test_apportion_most_recent_first() {
        let active = active_vintages(&ledger(), "chp", 2035, 2020, 5).unwrap();
        assert_eq!(active[&2035], 0.0);
        assert_eq!(active[&2030], 30.0);
        assert_eq!(active[&2025], 20.0);
        assert_eq!(active[&2020], 20.0);
    }

    #[test]
    fn test_commissioned_in_current_year_is_fatal() {
        let mut ledger = ledger();
        ledger.commissioned.set("chp", 2035, 5.0);
        let err = active_vintages(&ledger, "chp", 2035, 2020, 5).unwrap_err();
        assert_eq!(err.kind(), tpa_core::ErrorKind::NumericAnomaly);
    }

    #[test]
    fn test_blended_cost_and_efficiency() {
        let mut catalog = catalog();
        let mut inputs = PathwayInputs::new();
        inputs.capex.insert_row("chp", [(2020, 1000.0), (2025, 900.0), (2030, 600.0)]);
        let mut factors = YearTable::new();
        factors.insert_row("heat", [(2020, 0.4), (2025, 0.5), (2030, 0.6)]);
        inputs.conversion_factors.insert("chp".into(), factors);
        let previous = PeriodResult::optimal([("chp".to_string(), 30.0)]);

        blend_stock_parameters(
            &mut catalog,
            &ledger(),
            &inputs,
            &config(),
            2035,
            &previous,
            &YearTable::new(),
            &mut YearTable::new(),
        )
        .unwrap();

        let stock = catalog.stock_of("chp").unwrap();
        // (20·1000 + 20·900 + 30·600) / 70
        assert!((stock.costs.invest_per_capacity - round4(56000.0 / 70.0)).abs() < 1e-9);
        let heat = stock.conversion().unwrap().factors["heat"];
        assert!((heat - (20.0 * 0.4 + 20.0 * 0.5 + 30.0 * 0.6) / 70.0).abs() < 1e-9);
        assert_eq!(stock.conversion().unwrap().co2_factor(), Some(0.3));
    }

    #[test]
    fn test_scaled_cost_midpoint() {
        // half of the ceiling built: marginal cost at base, average halfway from the low end
        let cost = scaled_installed_cost("pv", 1000.0, 0.2, 50.0, 100.0).unwrap();
        assert!((cost - 900.0).abs() < 1e-9);
        let full = scaled_installed_cost("pv", 1000.0, 0.2, 100.0, 100.0).unwrap();
        assert!((full - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_scaled_cost_outside_range() {
        let err = scaled_installed_cost("pv", 1000.0, 0.2, 120.0, 100.0).unwrap_err();
        assert_eq!(err.kind(), tpa_core::ErrorKind::BoundViolation);
    }

    #[test]
    fn test_small_previous_result_skips_blending() {
        let mut catalog = catalog();
        let mut inputs = PathwayInputs::new();
        inputs.capex.insert_row("chp", [(2020, 1000.0)]);
        blend_stock_parameters(
            &mut catalog,
            &ledger(),
            &inputs,
            &config(),
            2035,
            &PeriodResult::optimal([]),
            &YearTable::new(),
            &mut YearTable::new(),
        )
        .unwrap();
        assert_eq!(catalog.stock_of("chp").unwrap().costs.invest_per_capacity, 0.0);
    }
}
