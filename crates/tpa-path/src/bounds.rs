//! Per-period capacity bounds: expansion funnels clamped to the S-curve.
//!
//! For every bounded technology the next solve may add capacity within a
//! funnel derived from its recent growth:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  max = Σ_{a=1..I} rate · (1 + max_expansion)^a                      │
//! │  min = Σ_{a=1..I} rate · (1 − max_decommissioning)^a   (growing)    │
//! │      = 0                                               (decaying)   │
//! │                                                                     │
//! │  stock + [min, max]  ∩  [S-curve lower, S-curve upper]              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compensation for future retirements and building renovation rules may
//! widen the result afterwards, never beyond the raw ceiling.

use crate::ledger::CommissioningLedger;
use crate::optimizer::PeriodResult;
use crate::scurve::{total_upper, SCurveTable};
use tpa_core::{
    round4, BuildingClass, Capacity, Diagnostics, ErrorKind, FunnelConfig, PathwayConfig,
    PathwayError, PathwayInputs, PathwayResult, PathwayYears, Technology, TechnologyCatalog,
};

/// Coupled storage only follows its vehicle once the vehicle builds more than this.
const COUPLING_THRESHOLD: f64 = 0.1;

/// Range of new capacity allowed in one interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Funnel {
    pub min: f64,
    pub max: f64,
}

impl Funnel {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn rounded(self) -> Self {
        Self::new(round4(self.min), round4(self.max))
    }

    pub fn to_capacity(self, technology: &str) -> PathwayResult<Capacity> {
        Capacity::from_bounds(self.min, self.max).map_err(|err| match err {
            PathwayError::BoundViolation { detail, .. } => PathwayError::bound(technology, detail),
            PathwayError::NumericAnomaly { detail, .. } => PathwayError::numeric(technology, detail),
            other => other,
        })
    }
}

/// Growth funnel of `tech` for the interval ending at `year`.
pub fn expansion_funnel(
    tech: &Technology,
    years: &PathwayYears,
    year: i32,
    inputs: &PathwayInputs,
    previous: &PeriodResult,
    funnel: &FunnelConfig,
) -> PathwayResult<Funnel> {
    let ceiling = tech.raw_ceiling();
    if year == years.reference || ceiling == 0.0 {
        return Ok(Funnel::new(0.0, 0.0));
    }
    let name = tech.name.as_str();
    let interval = years.interval as f64;

    let (rate, growing) = if year == years.start && inputs.has_history(name) {
        let reference = inputs.historical.get(name, years.reference);
        let before = inputs.historical.get(name, years.reference - years.interval);
        if round4(reference) > round4(before) {
            ((reference - before) / interval, true)
        } else {
            (
                inputs.historical.get(name, year) / tech.technical_lifetime as f64,
                false,
            )
        }
    } else {
        let rate = previous.capacity(name) / interval;
        let diffusion = funnel.start_diffusion * ceiling;
        if rate < diffusion {
            (diffusion, false)
        } else {
            (rate, true)
        }
    };

    if rate.is_nan() || rate < 0.0 {
        return Err(PathwayError::numeric(
            name,
            format!("negative yearly expansion rate of the previous interval: {rate}"),
        ));
    }

    let mut min = 0.0;
    let mut max = 0.0;
    for a in 1..=years.interval {
        max += rate * (1.0 + funnel.max_expansion).powi(a);
        if growing {
            min += rate * (1.0 - funnel.max_decommissioning).powi(a);
        }
    }
    Ok(Funnel::new(min, max).rounded())
}

/// Intersect `stock + funnel` with the S-curve corridor `[lower, upper]`.
///
/// A minimum raised onto the lower bound is reported as a warning. When a
/// clamp inverts the funnel, the other bound is moved onto the corridor and
/// the correction is recorded.
#[allow(clippy::too_many_arguments)]
pub fn clamp_to_scurve(
    technology: &str,
    year: i32,
    funnel: Funnel,
    lower: f64,
    upper: f64,
    stock: f64,
    diagnostics: &mut Diagnostics,
) -> PathwayResult<Funnel> {
    let Funnel { mut min, mut max } = funnel;

    if stock + min < lower {
        min = lower - stock;
        diagnostics.warn(
            ErrorKind::BoundViolation,
            &format!("expansion minimum raised to the S-curve lower bound ({min})"),
            technology,
            year,
        );
        if max < min {
            max = upper - stock;
            diagnostics.correct(
                ErrorKind::BoundViolation,
                &format!("expansion maximum below the S-curve lower bound; lifted to {max}"),
                technology,
                year,
            );
        }
    }

    if stock + max > upper {
        max = upper - stock;
        if max < min {
            min = (lower - stock).max(0.0).min(max.max(0.0));
            diagnostics.correct(
                ErrorKind::BoundViolation,
                &format!("expansion minimum above the S-curve upper bound; lowered to {min}"),
                technology,
                year,
            );
        }
    }

    if min < 0.0 {
        diagnostics.warn(
            ErrorKind::NumericAnomaly,
            &format!("negative expansion minimum {min} clamped to 0 (stock {stock}, S-curve lower {lower})"),
            technology,
            year,
        );
        min = 0.0;
    }
    if max < 0.0 {
        diagnostics.warn(
            ErrorKind::NumericAnomaly,
            &format!("negative expansion maximum {max} clamped to 0 (stock {stock}, S-curve upper {upper})"),
            technology,
            year,
        );
        max = 0.0;
    }

    let clamped = Funnel::new(min, max).rounded();
    if clamped.min > clamped.max {
        return Err(PathwayError::bound(
            technology,
            format!(
                "lower bound '{}' greater than upper bound '{}' in {year}",
                clamped.min, clamped.max
            ),
        ));
    }
    Ok(clamped)
}

/// Widen the funnel by compensation pre-allocated for upcoming retirements.
pub fn compensate_future_removal(
    tech: &Technology,
    funnel: Funnel,
    curves: &SCurveTable,
    ledger: &CommissioningLedger,
    years: &PathwayYears,
    year: i32,
) -> Funnel {
    let name = tech.name.as_str();
    if !ledger.compensation.contains(name) || ledger.compensation.get(name, year) <= 0.0 {
        return funnel;
    }
    let ceiling = tech.raw_ceiling();
    let extra = ledger
        .compensation
        .sum_over(name, (year - years.interval)..=year);
    let Funnel { mut min, mut max } = funnel;

    if curves.lower.get(name, years.target) > curves.lower.get(name, years.reference) {
        min = (min + extra).min(ceiling);
    }
    max = (max + extra).min(ceiling);
    Funnel::new(min, max)
}

/// Renovation rules for building technologies.
///
/// Reference buildings may only shrink by their historical decline;
/// refurbishment packages may grow by the yearly refurbishment rate applied
/// to the remaining reference stock.
pub fn building_funnel(
    tech: &Technology,
    funnel: Funnel,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
    year: i32,
    diagnostics: &mut Diagnostics,
) -> Funnel {
    let years = &config.years;
    let Some(profile) = tech.role.building() else {
        return funnel;
    };
    if year == years.reference {
        return funnel;
    }
    let name = tech.name.as_str();
    match &profile.class {
        BuildingClass::Reference => {
            let decline = inputs.historical.get(name, year - years.interval)
                - inputs.historical.get(name, year);
            if decline < 0.0 {
                diagnostics.warn(
                    ErrorKind::NumericAnomaly,
                    &format!("reference building stock grows by {}; no expansion allowed", -decline),
                    name,
                    year,
                );
            }
            Funnel::new(0.0, decline.max(0.0))
        }
        BuildingClass::Refurbishment { reference, .. } => {
            let share = config.buildings.max_refurbishment_rate / 100.0;
            let mut added = 0.0;
            for y in (year - years.interval + 1)..=year {
                let value = (inputs.historical.get(reference, y) - added) * share;
                if value > 0.0 {
                    added += value;
                }
            }
            Funnel::new(0.0, added)
        }
        BuildingClass::NewStandard | BuildingClass::Helper | BuildingClass::Excluded => funnel,
    }
}

/// Corridor of a technology exempt from the growth funnel: whatever the
/// stock leaves between the S-curve bounds.
pub fn unrestricted_funnel(
    technology: &str,
    year: i32,
    lower: f64,
    upper: f64,
    stock: f64,
    diagnostics: &mut Diagnostics,
) -> Funnel {
    let min = if stock < lower { lower - stock } else { 0.0 };
    let max = upper - stock;
    if round4(max) < 0.0 {
        diagnostics.warn(
            ErrorKind::BoundViolation,
            &format!("stock {stock} exceeds the S-curve upper bound {upper}, maximum set to 0"),
            technology,
            year,
        );
        return Funnel::new(0.0, 0.0);
    }
    Funnel::new(min, max)
}

/// Assign the capacity bounds of every technology for `year`.
#[allow(clippy::too_many_arguments)]
pub fn apply_expansion_bounds(
    catalog: &mut TechnologyCatalog,
    ledger: &CommissioningLedger,
    curves: &SCurveTable,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
    year: i32,
    previous: &PeriodResult,
    diagnostics: &mut Diagnostics,
) -> PathwayResult<()> {
    let years = &config.years;

    for name in catalog.names() {
        let stock = catalog.stock_capacity(&name);
        let tech = catalog.require(&name)?;
        if tech.is_stock() || tech.is_virtual() || tech.is_demand() {
            continue;
        }
        let (lower, upper) = curves.bounds(&name, year);

        let capacity = if tech.unrestricted {
            unrestricted_funnel(&name, year, lower, upper, stock, diagnostics).to_capacity(&name)?
        } else {
            let funnel = expansion_funnel(tech, years, year, inputs, previous, &config.funnel)?;
            let funnel = clamp_to_scurve(&name, year, funnel, lower, upper, stock, diagnostics)?;
            let funnel = compensate_future_removal(tech, funnel, curves, ledger, years, year);
            let funnel = building_funnel(tech, funnel, inputs, config, year, diagnostics);
            tracing::debug!(technology = %name, year, min = funnel.min, max = funnel.max, "expansion bounds");
            funnel.to_capacity(&name)?
        };
        catalog.require_mut(&name)?.capacity = capacity;
    }

    apply_storage_couplings(catalog, config, year, previous)?;
    fix_numerical_instabilities(catalog)?;

    for tech in catalog.iter() {
        if !curves.contains(&tech.name) {
            continue;
        }
        let total = total_upper(&tech.capacity, catalog.stock_capacity(&tech.name));
        let curve_upper = curves.upper.get(&tech.name, year);
        if round4(total) > round4(curve_upper) {
            diagnostics.warn(
                ErrorKind::BoundViolation,
                &format!("S-curve upper bound {curve_upper} but upper bound for the year {}", round4(total)),
                &tech.name,
                year,
            );
        }
    }
    Ok(())
}

/// Fix coupled storage to the stock of its vehicle technology.
pub fn apply_storage_couplings(
    catalog: &mut TechnologyCatalog,
    config: &PathwayConfig,
    year: i32,
    previous: &PeriodResult,
) -> PathwayResult<()> {
    let years = &config.years;
    if year < years.start || year >= years.target {
        return Ok(());
    }
    for coupling in &config.coupled_storage {
        catalog.require(&coupling.vehicle)?;
        if previous.capacity(&coupling.vehicle) <= COUPLING_THRESHOLD {
            continue;
        }
        let value = round4(catalog.stock_capacity(&coupling.vehicle) * coupling.factor);
        catalog.require_mut(&coupling.storage)?.capacity = Capacity::fixed(value)?;
    }
    Ok(())
}

/// Round every capacity and reject negative or inverted bounds.
pub fn fix_numerical_instabilities(catalog: &mut TechnologyCatalog) -> PathwayResult<()> {
    for tech in catalog.iter_mut() {
        tech.capacity = tech.capacity.rounded();
        tech.capacity.validate(&tech.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpa_core::{BuildingProfile, StorageCoupling, TechnologyKind, TechnologyRole};

    fn years() -> PathwayYears {
        PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2050,
            interval: 5,
        }
    }

    fn wind() -> Technology {
        Technology::new("wind", TechnologyKind::Source, Capacity::range(0.0, 200.0).unwrap())
            .with_lifetimes(20, 25)
    }

    #[test]
    fn test_clamp_raises_minimum_onto_scurve() {
        let mut diag = Diagnostics::new();
        let clamped =
            clamp_to_scurve("wind", 2030, Funnel::new(10.0, 50.0), 60.0, 80.0, 0.0, &mut diag).unwrap();
        assert_eq!(clamped, Funnel::new(60.0, 80.0));
        assert_eq!(diag.warning_count(), 1);
        assert!(diag.issues[0].message.contains("raised"));
        assert_eq!(diag.correction_count(), 1);
    }

    #[test]
    fn test_clamp_lowers_maximum_with_stock() {
        let mut diag = Diagnostics::new();
        let clamped =
            clamp_to_scurve("wind", 2030, Funnel::new(5.0, 50.0), 20.0, 80.0, 40.0, &mut diag).unwrap();
        assert_eq!(clamped, Funnel::new(5.0, 40.0));
        assert!(!diag.has_issues());
    }

    #[test]
    fn test_clamp_inverted_by_upper_bound() {
        let mut diag = Diagnostics::new();
        let clamped =
            clamp_to_scurve("wind", 2030, Funnel::new(30.0, 50.0), 0.0, 60.0, 40.0, &mut diag).unwrap();
        assert_eq!(clamped, Funnel::new(0.0, 20.0));
        assert_eq!(diag.correction_count(), 1);
    }

    #[test]
    fn test_clamp_negative_maximum_warns() {
        let mut diag = Diagnostics::new();
        let clamped =
            clamp_to_scurve("coal", 2030, Funnel::new(0.0, 5.0), 0.0, 30.0, 35.0, &mut diag).unwrap();
        assert_eq!(clamped, Funnel::new(0.0, 0.0));
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn test_unrestricted_stock_above_upper_warns() {
        let mut diag = Diagnostics::new();
        let funnel = unrestricted_funnel("gas", 2030, 10.0, 30.0, 35.0, &mut diag);
        assert_eq!(funnel, Funnel::new(0.0, 0.0));
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(funnel.to_capacity("gas").unwrap(), Capacity::zero());

        let mut diag = Diagnostics::new();
        let funnel = unrestricted_funnel("gas", 2030, 10.0, 30.0, 4.0, &mut diag);
        assert_eq!(funnel, Funnel::new(6.0, 26.0));
        assert!(!diag.has_issues());
    }

    #[test]
    fn test_funnel_from_previous_growth() {
        let previous = PeriodResult::optimal([("wind".to_string(), 10.0)]);
        let funnel = expansion_funnel(
            &wind(),
            &years(),
            2030,
            &PathwayInputs::new(),
            &previous,
            &FunnelConfig::default(),
        )
        .unwrap();
        // rate 2/yr, five compounded years
        let expected_max: f64 = (1..=5).map(|a| 2.0 * 1.2f64.powi(a)).sum();
        let expected_min: f64 = (1..=5).map(|a| 2.0 * 0.8f64.powi(a)).sum();
        assert!((funnel.max - round4(expected_max)).abs() < 1e-9);
        assert!((funnel.min - round4(expected_min)).abs() < 1e-9);
    }

    #[test]
    fn test_new_technology_uses_start_diffusion() {
        let previous = PeriodResult::optimal([]);
        let funnel = expansion_funnel(
            &wind(),
            &years(),
            2030,
            &PathwayInputs::new(),
            &previous,
            &FunnelConfig::default(),
        )
        .unwrap();
        assert_eq!(funnel.min, 0.0);
        assert!(funnel.max > 0.0);
    }

    #[test]
    fn test_declining_history_has_no_minimum() {
        let mut inputs = PathwayInputs::new();
        inputs.historical.insert_row("wind", [(2015, 50.0), (2020, 40.0), (2025, 30.0)]);
        let funnel = expansion_funnel(
            &wind(),
            &years(),
            2025,
            &inputs,
            &PeriodResult::optimal([]),
            &FunnelConfig::default(),
        )
        .unwrap();
        assert_eq!(funnel.min, 0.0);
        assert!(funnel.max > 0.0);
    }

    #[test]
    fn test_zero_ceiling_has_closed_funnel() {
        let tech = Technology::new("old", TechnologyKind::Source, Capacity::zero());
        let funnel = expansion_funnel(
            &tech,
            &years(),
            2030,
            &PathwayInputs::new(),
            &PeriodResult::optimal([("old".to_string(), 3.0)]),
            &FunnelConfig::default(),
        )
        .unwrap();
        assert_eq!(funnel, Funnel::new(0.0, 0.0));
    }

    #[test]
    fn test_compensation_widens_funnel() {
        let mut ledger = CommissioningLedger::new();
        ledger.compensation.set("wind", 2030, 4.0);
        ledger.compensation.set("wind", 2028, 1.0);
        let mut curves = SCurveTable::default();
        curves.lower.set("wind", 2020, 0.0);
        curves.lower.set("wind", 2050, 100.0);

        let funnel = compensate_future_removal(&wind(), Funnel::new(2.0, 10.0), &curves, &ledger, &years(), 2030);
        assert_eq!(funnel, Funnel::new(7.0, 15.0));
    }

    #[test]
    fn test_refurbishment_funnel_follows_reference_stock() {
        let tech = wind().with_role(TechnologyRole::Building(BuildingProfile {
            class: BuildingClass::Refurbishment {
                reference: "sfh".into(),
                first_package: false,
            },
            net_renovation_rate: 0.0,
        }));
        let mut inputs = PathwayInputs::new();
        inputs.historical.insert_row("sfh", (2026..=2030).map(|y| (y, 100.0)));
        let config = PathwayConfig::new(years());

        let funnel = building_funnel(&tech, Funnel::new(3.0, 9.0), &inputs, &config, 2030, &mut Diagnostics::new());

        let mut expected = 0.0;
        for _ in 0..5 {
            expected += (100.0 - expected) * 0.025;
        }
        assert_eq!(funnel.min, 0.0);
        assert!((funnel.max - expected).abs() < 1e-12);
    }

    #[test]
    fn test_storage_coupling_follows_vehicle_stock() {
        let mut catalog = TechnologyCatalog::new();
        let vehicle = wind();
        catalog.insert(vehicle.stock_twin()).unwrap();
        catalog.insert(vehicle).unwrap();
        catalog
            .insert(Technology::new(
                "car_battery",
                TechnologyKind::Storage(Default::default()),
                Capacity::range(0.0, 500.0).unwrap(),
            ))
            .unwrap();
        catalog.require_mut("wind_stock").unwrap().capacity = Capacity::fixed(10.0).unwrap();
        let mut config = PathwayConfig::new(years());
        config.coupled_storage.push(StorageCoupling {
            vehicle: "wind".into(),
            storage: "car_battery".into(),
            factor: 0.5,
        });
        let previous = PeriodResult::optimal([("wind".to_string(), 2.0)]);

        apply_storage_couplings(&mut catalog, &config, 2030, &previous).unwrap();
        assert_eq!(catalog.require("car_battery").unwrap().capacity, Capacity::Fixed { value: 5.0 });
    }
}
