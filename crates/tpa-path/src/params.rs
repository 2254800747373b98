//! Per-period technology parameters and exogenous inputs.

use tpa_core::{
    round4, Capacity, PathwayConfig, PathwayInputs, PathwayResult, PathwayYears, TechnologyCatalog,
    TechnologyKind, YearTable, CO2_COMMODITY,
};

/// Load the year's cost, fuel and conversion parameters into every bounded
/// technology and record its capacity ceiling for the year.
pub fn refresh_technology_parameters(
    catalog: &mut TechnologyCatalog,
    inputs: &PathwayInputs,
    config: &PathwayConfig,
    year: i32,
    modelyear_ub: &mut YearTable,
) {
    for tech in catalog.iter_mut() {
        if tech.is_stock() || tech.is_virtual() {
            continue;
        }
        if tech.unrestricted && tech.kind.is_source_or_sink() {
            continue;
        }
        let name = tech.name.clone();
        modelyear_ub.set(&name, year, tech.capacity.upper());

        if inputs.capex.contains(&name) {
            tech.costs.invest_per_capacity = inputs.capex.get(&name, year);
        }
        if let Some(share) = inputs.opex_share.get(&name) {
            tech.costs.opex_per_capacity = tech.costs.invest_per_capacity * share;
        }

        let scale = inputs.cost_scale.get(&name, year);
        match &mut tech.kind {
            TechnologyKind::Source | TechnologyKind::Sink => {
                tech.costs.cost_scale = config.cost_scaling.then_some(scale);
                if inputs.fuel_prices.contains(&name) {
                    tech.costs.opex_per_operation = inputs.fuel_prices.get(&name, year);
                }
            }
            TechnologyKind::Conversion(params) => {
                tech.costs.cost_scale = Some(if config.cost_scaling { scale } else { 0.0 });
                if params.static_factors {
                    continue;
                }
                if let Some(table) = inputs.conversion_factors.get(&name) {
                    let commodities: Vec<String> = table.technologies().map(str::to_string).collect();
                    for commodity in commodities {
                        params.factors.insert(commodity.clone(), table.get(&commodity, year));
                    }
                }
                let intensity = inputs.emission_intensity.get(&name, year);
                if intensity != 0.0 {
                    params.factors.insert(CO2_COMMODITY.to_string(), intensity);
                }
            }
            TechnologyKind::Storage(_) => {}
        }
    }
}

/// Give stock twins the reference-year costs, used in the target and
/// reference solves where no vintage mix exists yet.
pub fn apply_reference_stock_parameters(
    catalog: &mut TechnologyCatalog,
    inputs: &PathwayInputs,
    years: &PathwayYears,
) {
    for tech in catalog.iter_mut() {
        let Some(parent) = tech.stock_of.clone() else {
            continue;
        };
        let capex = if inputs.capex.contains(&tech.name) {
            inputs.capex.get(&tech.name, years.reference)
        } else {
            inputs.capex.get(&parent, years.reference)
        };
        tech.costs.invest_per_capacity = capex;
        let share = inputs
            .opex_share
            .get(&tech.name)
            .or_else(|| inputs.opex_share.get(&parent))
            .copied()
            .unwrap_or(0.0);
        tech.costs.opex_per_capacity = capex * share;
    }
}

/// Fix demand technologies to the year's demand times their scale.
pub fn apply_demand(
    catalog: &mut TechnologyCatalog,
    inputs: &PathwayInputs,
    year: i32,
) -> PathwayResult<()> {
    for tech in catalog.iter_mut() {
        let tpa_core::TechnologyRole::Demand { scale } = tech.role else {
            continue;
        };
        if !inputs.demand.contains(&tech.name) {
            continue;
        }
        let value = round4(inputs.demand.get(&tech.name, year) * scale);
        tech.capacity = Capacity::fixed(value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tpa_core::{ConversionParams, Technology, TechnologyRole};

    fn years() -> PathwayYears {
        PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2050,
            interval: 5,
        }
    }

    #[test]
    fn test_refresh_conversion_parameters() {
        let mut catalog = TechnologyCatalog::new();
        catalog
            .insert(Technology::new(
                "gas_plant",
                TechnologyKind::Conversion(ConversionParams::new([
                    ("electricity".to_string(), 0.5),
                    (CO2_COMMODITY.to_string(), 0.2),
                ])),
                Capacity::range(0.0, 40.0).unwrap(),
            ))
            .unwrap();
        let mut inputs = PathwayInputs::new();
        inputs.capex.insert_row("gas_plant", [(2030, 800.0)]);
        inputs.opex_share.insert("gas_plant".into(), 0.03);
        inputs.emission_intensity.insert_row("gas_plant", [(2030, 0.18)]);
        let mut factors = YearTable::new();
        factors.insert_row("electricity", [(2030, 0.55)]);
        inputs.conversion_factors.insert("gas_plant".into(), factors);
        let config = PathwayConfig::new(years());
        let mut ub = YearTable::new();

        refresh_technology_parameters(&mut catalog, &inputs, &config, 2030, &mut ub);

        let tech = catalog.require("gas_plant").unwrap();
        assert_eq!(tech.costs.invest_per_capacity, 800.0);
        assert!((tech.costs.opex_per_capacity - 24.0).abs() < 1e-9);
        assert_eq!(tech.costs.cost_scale, Some(0.0));
        let params = tech.conversion().unwrap();
        assert_eq!(params.factors["electricity"], 0.55);
        assert_eq!(params.co2_factor(), Some(0.18));
        assert_eq!(ub.get("gas_plant", 2030), 40.0);
    }

    #[test]
    fn test_cost_scale_only_in_cost_scaling_mode() {
        let mut catalog = TechnologyCatalog::new();
        catalog
            .insert(Technology::new("pv", TechnologyKind::Source, Capacity::range(0.0, 10.0).unwrap()))
            .unwrap();
        let mut inputs = PathwayInputs::new();
        inputs.cost_scale.insert_row("pv", [(2030, 0.1)]);
        inputs.fuel_prices.insert_row("pv", [(2030, 3.0)]);

        let mut config = PathwayConfig::new(years());
        refresh_technology_parameters(&mut catalog, &inputs, &config, 2030, &mut YearTable::new());
        assert_eq!(catalog.require("pv").unwrap().costs.cost_scale, None);
        assert_eq!(catalog.require("pv").unwrap().costs.opex_per_operation, 3.0);

        config.cost_scaling = true;
        refresh_technology_parameters(&mut catalog, &inputs, &config, 2030, &mut YearTable::new());
        assert_eq!(catalog.require("pv").unwrap().costs.cost_scale, Some(0.1));
    }

    #[test]
    fn test_stock_gets_parent_reference_cost() {
        let mut catalog = TechnologyCatalog::new();
        let pv = Technology::new("pv", TechnologyKind::Source, Capacity::range(0.0, 10.0).unwrap());
        catalog.insert(pv.stock_twin()).unwrap();
        catalog.insert(pv).unwrap();
        let mut inputs = PathwayInputs::new();
        inputs.capex.insert_row("pv", [(2020, 1000.0), (2030, 700.0)]);
        inputs.opex_share.insert("pv".into(), 0.02);

        apply_reference_stock_parameters(&mut catalog, &inputs, &years());

        let stock = catalog.stock_of("pv").unwrap();
        assert_eq!(stock.costs.invest_per_capacity, 1000.0);
        assert_eq!(stock.costs.opex_per_capacity, 20.0);
    }

    #[test]
    fn test_demand_fixed_from_series() {
        let mut catalog = TechnologyCatalog::new();
        catalog
            .insert(
                Technology::new("heat_demand", TechnologyKind::Sink, Capacity::zero())
                    .with_role(TechnologyRole::Demand { scale: 1.5 }),
            )
            .unwrap();
        let mut inputs = PathwayInputs::new();
        inputs.demand.insert_row("heat_demand", [(2030, 10.0)]);

        apply_demand(&mut catalog, &inputs, 2030).unwrap();
        assert_eq!(catalog.require("heat_demand").unwrap().capacity, Capacity::Fixed { value: 15.0 });
    }
}
