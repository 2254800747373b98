//! S-curves: per-technology capacity corridors from reference to target year.
//!
//! Built once after the target-year solve. The lower bound grows
//! logistically from the historical capacity at the reference year to the
//! capacity found optimal in the target year:
//!
//! ```text
//!              A · (end − start)
//! lb(y) = ─────────────────────────── + start
//!          1 + A · C · e^(−B·(y−ref))
//! ```
//!
//! The upper bound is the raw potential ceiling, except where historical
//! capacity still exceeds it. Every year later consults the curve through
//! [`SCurveTable::bounds`].

use crate::optimizer::PeriodResult;
use serde::Serialize;
use tpa_core::{
    round4, BuildingClass, Capacity, Diagnostics, ErrorKind, PathwayConfig, PathwayError,
    PathwayInputs, PathwayResult, SCurveShape, Technology, TechnologyCatalog, YearTable,
    CAPACITY_EPSILON,
};

/// Tolerance for the target-year upper bound against the raw ceiling.
pub const CEILING_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SCurveTable {
    pub lower: YearTable,
    pub upper: YearTable,
}

impl SCurveTable {
    /// `(lower, upper)` of a technology in one year.
    pub fn bounds(&self, technology: &str, year: i32) -> (f64, f64) {
        (
            self.lower.get(technology, year),
            self.upper.get(technology, year),
        )
    }

    pub fn contains(&self, technology: &str) -> bool {
        self.lower.contains(technology) && self.upper.contains(technology)
    }
}

/// Logistic lower bound `elapsed` years after the reference year.
pub fn logistic_lower_bound(shape: &SCurveShape, start: f64, end: f64, elapsed: i32) -> f64 {
    let delta = end - start;
    let c = shape.c / delta;
    shape.a * delta / (1.0 + shape.a * c * delta * (-shape.b * elapsed as f64).exp()) + start
}

/// Lower-bound curve for every year from `reference` to `target`, including
/// the shift that keeps interior years at or below `end`.
pub fn lower_bound_curve(
    shape: &SCurveShape,
    start: f64,
    end: f64,
    reference: i32,
    target: i32,
) -> Vec<(i32, f64)> {
    let mut values = vec![(reference, start)];
    let base = if start >= end { 0.0 } else { start };
    let interior: Vec<f64> = ((reference + 1)..target)
        .map(|y| logistic_lower_bound(shape, base, end, y - reference))
        .collect();
    let shifted = shift_overshoot(interior, end, base);
    values.extend(((reference + 1)..target).zip(shifted));
    values.push((target, end));
    values
}

/// Move the interior later by the number of values above `end`, padding
/// the head with `pad`.
fn shift_overshoot(interior: Vec<f64>, end: f64, pad: f64) -> Vec<f64> {
    let shift = interior.iter().filter(|v| **v > end).count();
    if shift == 0 {
        return interior;
    }
    let mut shifted = vec![pad; shift.min(interior.len())];
    shifted.extend(interior.iter().take(interior.len().saturating_sub(shift)));
    shifted
}

/// Build the curves of every bounded technology from the target-year result.
pub fn build_scurves(
    catalog: &TechnologyCatalog,
    target_result: &PeriodResult,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
    diagnostics: &mut Diagnostics,
) -> PathwayResult<SCurveTable> {
    let years = &config.years;
    let mut curves = SCurveTable::default();

    for tech in catalog.iter() {
        if tech.is_stock() || tech.is_virtual() || tech.is_demand() {
            continue;
        }
        let name = tech.name.as_str();

        if tech.unrestricted {
            let stock = catalog.stock_capacity(name);
            for year in years.reference..=years.target {
                curves.lower.set(name, year, tech.capacity.lower() + stock);
                curves.upper.set(name, year, tech.capacity.upper() + stock);
            }
        } else if inputs.has_forced_decommissioning(name) {
            for year in years.reference..=years.target {
                curves
                    .upper
                    .set(name, year, inputs.forced_decommissioning.get(name, year));
                curves.lower.set(name, year, 0.0);
            }
        } else {
            let lower = restricted_lower_bound(tech, catalog, target_result, inputs, config);
            curves.lower.insert_row(name, lower);
            curves.upper.insert_row(name, restricted_upper_bound(tech, inputs, config));
        }
    }

    curves.lower.round_all();
    curves.upper.round_all();
    check_curves(catalog, &curves, config, diagnostics)?;
    tracing::info!(technologies = curves.lower.technologies().count(), "S-curves built");
    Ok(curves)
}

fn restricted_lower_bound(
    tech: &Technology,
    catalog: &TechnologyCatalog,
    target_result: &PeriodResult,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
) -> Vec<(i32, f64)> {
    let years = &config.years;
    let name = tech.name.as_str();

    let mut stock = catalog.stock_capacity(name);
    if stock < CAPACITY_EPSILON {
        stock = 0.0;
    }
    let built = target_result
        .capacities
        .get(name)
        .copied()
        .or_else(|| tech.capacity.fixed_value())
        .unwrap_or(0.0);
    let end = stock + built;

    if end < CAPACITY_EPSILON {
        return (years.reference..=years.target).map(|y| (y, 0.0)).collect();
    }

    let start = if inputs.has_history(name) {
        inputs.historical.get(name, years.reference)
    } else {
        0.0
    };

    let profile = tech.role.building();
    let mut lower = match profile {
        Some(p) if !matches!(p.class, BuildingClass::Helper) => {
            building_lower_bound(p.net_renovation_rate, &p.class, start, end, years.reference, years.target)
        }
        _ => lower_bound_curve(&config.s_curve, start, end, years.reference, years.target),
    };

    if matches!(profile.map(|p| &p.class), Some(BuildingClass::Reference)) {
        for (_, value) in lower.iter_mut() {
            *value = 0.0;
        }
    }
    lower
}

/// Linear renovation minimum for building technologies.
fn building_lower_bound(
    rate: f64,
    class: &BuildingClass,
    start: f64,
    end: f64,
    reference: i32,
    target: i32,
) -> Vec<(i32, f64)> {
    let first_package = matches!(
        class,
        BuildingClass::Refurbishment {
            first_package: true,
            ..
        }
    );
    let base = if start >= end { 0.0 } else { start };
    let mut end_value = end;
    let mut interior = Vec::new();
    for year in (reference + 1)..target {
        let mut value = rate * (year - reference) as f64;
        if value > end && first_package {
            value = 0.0;
            end_value = 0.0;
        }
        interior.push(value);
    }
    let shifted = shift_overshoot(interior, end, base);

    let mut values = vec![(reference, start)];
    values.extend(((reference + 1)..target).zip(shifted));
    values.push((target, end_value));
    values
}

fn restricted_upper_bound(
    tech: &Technology,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
) -> Vec<(i32, f64)> {
    let years = &config.years;
    let name = tech.name.as_str();
    let ceiling = tech.raw_ceiling();
    let history = inputs.has_history(name);
    let above_ceiling = history && inputs.historical.get(name, years.reference) > ceiling;

    (years.reference..=years.target)
        .map(|year| {
            let hist = inputs.historical.get(name, year);
            let value = if year == years.reference {
                if history {
                    hist
                } else {
                    0.0
                }
            } else if above_ceiling && hist > ceiling {
                hist
            } else {
                ceiling
            };
            (year, value)
        })
        .collect()
}

fn check_curves(
    catalog: &TechnologyCatalog,
    curves: &SCurveTable,
    config: &PathwayConfig,
    diagnostics: &mut Diagnostics,
) -> PathwayResult<()> {
    let years = &config.years;

    for (tech, year) in curves
        .lower
        .undefined_cells()
        .into_iter()
        .chain(curves.upper.undefined_cells())
    {
        diagnostics.warn(
            ErrorKind::NumericAnomaly,
            "S-curve contains an undefined value",
            &tech,
            year,
        );
    }

    for name in curves.lower.technologies() {
        let tech = catalog.require(name)?;
        let ceiling = round4(tech.raw_ceiling());

        for year in years.reference..=years.target {
            let (lower, upper) = curves.bounds(name, year);
            if lower < 0.0 {
                return Err(PathwayError::numeric(
                    name,
                    format!("S-curve lower bound {lower} below zero in {year}; revise the curve parameters"),
                ));
            }
            if lower > ceiling && !tech.unrestricted {
                return Err(PathwayError::bound(
                    name,
                    format!("S-curve lower bound {lower} exceeds the ceiling {ceiling} in {year}"),
                ));
            }
            if upper < lower {
                return Err(PathwayError::bound(
                    name,
                    format!("S-curve lower bound {lower} exceeds upper bound {upper} in {year}"),
                ));
            }
        }

        let upper_target = round4(curves.upper.get(name, years.target));
        if upper_target > ceiling + CEILING_TOLERANCE {
            return Err(PathwayError::bound(
                name,
                format!("S-curve upper bound {upper_target} exceeds the ceiling {ceiling} in the target year"),
            ));
        }
    }
    Ok(())
}

/// Upper limit handed to the optimizer plus the stock, for comparison
/// against the curve.
pub fn total_upper(capacity: &Capacity, stock: f64) -> f64 {
    capacity.upper() + stock
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpa_core::{BuildingProfile, PathwayYears, TechnologyKind, TechnologyRole};

    fn config() -> PathwayConfig {
        PathwayConfig::new(PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2050,
            interval: 5,
        })
    }

    fn pv() -> Technology {
        Technology::new("pv", TechnologyKind::Source, Capacity::range(0.0, 100.0).unwrap())
    }

    #[test]
    fn test_logistic_endpoints() {
        let shape = SCurveShape::default();
        let early = logistic_lower_bound(&shape, 0.0, 100.0, 1);
        let late = logistic_lower_bound(&shape, 0.0, 100.0, 29);
        assert!(early > 0.0 && early < 5.0);
        assert!(late > early && late < 100.0);
    }

    #[test]
    fn test_curve_never_exceeds_end_after_shift() {
        let curve = lower_bound_curve(&SCurveShape::default(), 0.0, 50.0, 2020, 2060);
        let end = 50.0;
        for (year, value) in &curve {
            assert!(*value <= end + 1e-9, "{year}: {value} above end");
        }
        assert_eq!(curve.first(), Some(&(2020, 0.0)));
        assert_eq!(curve.last(), Some(&(2060, 50.0)));
    }

    #[test]
    fn test_shift_pads_head() {
        let shifted = shift_overshoot(vec![1.0, 2.0, 6.0, 7.0], 5.0, 0.5);
        assert_eq!(shifted, vec![0.5, 0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_new_technology_starts_at_zero() {
        let mut catalog = TechnologyCatalog::new();
        catalog.insert(pv()).unwrap();
        let result = PeriodResult::optimal([("pv".to_string(), 60.0)]);
        let mut diag = Diagnostics::new();

        let curves = build_scurves(&catalog, &result, &PathwayInputs::new(), &config(), &mut diag).unwrap();

        assert_eq!(curves.bounds("pv", 2020), (0.0, 0.0));
        assert_eq!(curves.bounds("pv", 2050), (60.0, 100.0));
        for year in 2020..=2050 {
            let (lower, upper) = curves.bounds("pv", year);
            assert!(0.0 <= lower && lower <= upper, "{year}: {lower} / {upper}");
        }
        assert!(!diag.has_issues());
    }

    #[test]
    fn test_unbuilt_technology_has_zero_lower_bound() {
        let mut catalog = TechnologyCatalog::new();
        catalog.insert(pv()).unwrap();
        let result = PeriodResult::optimal([("pv".to_string(), 0.001)]);
        let curves =
            build_scurves(&catalog, &result, &PathwayInputs::new(), &config(), &mut Diagnostics::new())
                .unwrap();
        assert_eq!(curves.lower.row_sum("pv"), 0.0);
        assert_eq!(curves.upper.get("pv", 2035), 100.0);
    }

    #[test]
    fn test_history_above_ceiling_raises_upper_bound() {
        let mut catalog = TechnologyCatalog::new();
        catalog
            .insert(Technology::new("lignite", TechnologyKind::Source, Capacity::range(0.0, 10.0).unwrap()))
            .unwrap();
        let mut inputs = PathwayInputs::new();
        inputs
            .historical
            .insert_row("lignite", [(2020, 12.0), (2030, 14.0), (2040, 6.0), (2050, 0.0)]);
        inputs.densify(&config().years);
        let result = PeriodResult::optimal([("lignite".to_string(), 0.0)]);

        let curves = build_scurves(&catalog, &result, &inputs, &config(), &mut Diagnostics::new()).unwrap();

        assert_eq!(curves.upper.get("lignite", 2020), 12.0);
        assert_eq!(curves.upper.get("lignite", 2030), 14.0);
        assert_eq!(curves.upper.get("lignite", 2040), 10.0);
        assert_eq!(curves.upper.get("lignite", 2050), 10.0);
    }

    #[test]
    fn test_forced_schedule_overrides_bounds() {
        let mut catalog = TechnologyCatalog::new();
        catalog.insert(pv()).unwrap();
        let mut inputs = PathwayInputs::new();
        inputs.forced_decommissioning.insert_row("pv", [(2020, 30.0), (2050, 0.0)]);
        inputs.densify(&config().years);
        let result = PeriodResult::optimal([("pv".to_string(), 0.0)]);
        let curves = build_scurves(&catalog, &result, &inputs, &config(), &mut Diagnostics::new()).unwrap();
        assert_eq!(curves.bounds("pv", 2035), (0.0, 15.0));
    }

    #[test]
    fn test_reference_buildings_have_no_minimum() {
        let mut catalog = TechnologyCatalog::new();
        catalog
            .insert(pv().with_role(TechnologyRole::Building(BuildingProfile {
                class: BuildingClass::Reference,
                net_renovation_rate: 1.0,
            })))
            .unwrap();
        let result = PeriodResult::optimal([("pv".to_string(), 40.0)]);
        let curves =
            build_scurves(&catalog, &result, &PathwayInputs::new(), &config(), &mut Diagnostics::new())
                .unwrap();
        assert_eq!(curves.lower.row_sum("pv"), 0.0);
    }

    #[test]
    fn test_first_package_zeroed_when_rate_overshoots() {
        let class = BuildingClass::Refurbishment {
            reference: "sfh".into(),
            first_package: true,
        };
        let curve = building_lower_bound(3.0, &class, 0.0, 20.0, 2020, 2030);
        assert_eq!(curve.last(), Some(&(2030, 0.0)));
        assert_eq!(curve[1], (2021, 3.0));
        assert!(curve.iter().all(|(_, v)| *v <= 20.0));
    }
}
