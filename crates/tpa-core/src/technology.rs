//! Technologies and the catalog that holds them.
//!
//! A [`Technology`] is any capacity-holding entity of the energy system.
//! Kind-specific parameters live inside [`TechnologyKind`], so a stock twin
//! created from a conversion technology automatically carries the same
//! conversion factors. Behaviour that used to be inferred from naming
//! conventions (stock, virtual, building category) is an explicit field.

use crate::capacity::Capacity;
use crate::error::{PathwayError, PathwayResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Commodity whose conversion factor is the emission intensity.
pub const CO2_COMMODITY: &str = "CO2";

/// Suffix appended to a technology's name to name its stock twin.
pub const STOCK_SUFFIX: &str = "_stock";

pub fn stock_name(technology: &str) -> String {
    format!("{technology}{STOCK_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Signed conversion factor per commodity (inputs negative, outputs positive)
    pub factors: BTreeMap<String, f64>,
    /// Factors are taken as given and never re-derived per year
    #[serde(default)]
    pub static_factors: bool,
}

impl ConversionParams {
    pub fn new(factors: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            factors: factors.into_iter().collect(),
            static_factors: false,
        }
    }

    pub fn co2_factor(&self) -> Option<f64> {
        self.factors.get(CO2_COMMODITY).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageParams {
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub self_discharge: f64,
}

impl Default for StorageParams {
    fn default() -> Self {
        Self {
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            self_discharge: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TechnologyKind {
    Source,
    Sink,
    Conversion(ConversionParams),
    Storage(StorageParams),
}

impl TechnologyKind {
    pub fn is_source_or_sink(&self) -> bool {
        matches!(self, TechnologyKind::Source | TechnologyKind::Sink)
    }
}

/// How a building technology participates in bound construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum BuildingClass {
    /// Existing (unrefurbished) building stock with a historical series
    Reference,
    /// Refurbishment package applied to the named reference building
    Refurbishment {
        reference: String,
        #[serde(default)]
        first_package: bool,
    },
    /// New-build efficiency standard
    NewStandard,
    /// Auxiliary component of the building model; follows the logistic curve
    Helper,
    /// Building component exempt from building-specific overrides
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingProfile {
    #[serde(flatten)]
    pub class: BuildingClass,
    /// Net renovation rate used for the linear S-curve minimum (capacity/year)
    #[serde(default)]
    pub net_renovation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TechnologyRole {
    #[default]
    Standard,
    /// Emission accounting or other bookkeeping entity without bounds
    Virtual,
    /// Demand sink whose capacity follows the demand series
    Demand { scale: f64 },
    Building(BuildingProfile),
}

impl TechnologyRole {
    pub fn building(&self) -> Option<&BuildingProfile> {
        match self {
            TechnologyRole::Building(profile) => Some(profile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostParams {
    pub invest_per_capacity: f64,
    pub opex_per_capacity: f64,
    #[serde(default)]
    pub opex_per_operation: f64,
    /// Relative width of the cost-scaling band (cost-scaling mode only)
    #[serde(default)]
    pub cost_scale: Option<f64>,
}

/// Shared expansion fields assigned by the group limiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedExpansion {
    pub group_id: String,
    pub min: Option<f64>,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    #[serde(flatten)]
    pub kind: TechnologyKind,
    #[serde(default)]
    pub role: TechnologyRole,
    /// Exempt from funnel tightening; bounded by its own S-curve only
    #[serde(default)]
    pub unrestricted: bool,
    /// Parent technology when this is a stock twin
    #[serde(default)]
    pub stock_of: Option<String>,
    /// Capacity currently handed to the optimizer
    pub capacity: Capacity,
    /// Capacity as loaded; its upper value is the raw potential ceiling
    pub raw_capacity: Capacity,
    pub economic_lifetime: u32,
    pub technical_lifetime: u32,
    #[serde(default)]
    pub interest_rate: f64,
    #[serde(default)]
    pub costs: CostParams,
    #[serde(default)]
    pub shared: Option<SharedExpansion>,
}

impl Technology {
    pub fn new(name: impl Into<String>, kind: TechnologyKind, capacity: Capacity) -> Self {
        Self {
            name: name.into(),
            kind,
            role: TechnologyRole::Standard,
            unrestricted: false,
            stock_of: None,
            capacity,
            raw_capacity: capacity,
            economic_lifetime: 20,
            technical_lifetime: 20,
            interest_rate: 0.0,
            costs: CostParams::default(),
            shared: None,
        }
    }

    pub fn with_role(mut self, role: TechnologyRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_lifetimes(mut self, economic: u32, technical: u32) -> Self {
        self.economic_lifetime = economic;
        self.technical_lifetime = technical;
        self
    }

    pub fn unrestricted(mut self) -> Self {
        self.unrestricted = true;
        self
    }

    pub fn is_stock(&self) -> bool {
        self.stock_of.is_some()
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.role, TechnologyRole::Virtual)
    }

    /// Raw, time-invariant potential ceiling.
    pub fn raw_ceiling(&self) -> f64 {
        self.raw_capacity.upper()
    }

    pub fn is_demand(&self) -> bool {
        matches!(self.role, TechnologyRole::Demand { .. })
    }

    /// Whether stock bookkeeping and bound tightening apply at all.
    ///
    /// Demand sinks are fixed from the demand series every period and never
    /// accumulate stock.
    pub fn is_exempt(&self) -> bool {
        self.unrestricted || self.is_virtual() || self.is_demand()
    }

    /// Check capacities and lifetimes as loaded.
    pub fn validate(&self) -> PathwayResult<()> {
        self.capacity.validate(&self.name)?;
        self.raw_capacity.validate(&self.name)?;
        if self.technical_lifetime == 0 || self.economic_lifetime == 0 {
            return Err(PathwayError::config(format!(
                "technology '{}' needs positive lifetimes",
                self.name
            )));
        }
        if let TechnologyRole::Building(profile) = &self.role {
            if let BuildingClass::Refurbishment { reference, .. } = &profile.class {
                if reference.trim().is_empty() {
                    return Err(PathwayError::config(format!(
                        "refurbishment package '{}' has no reference building",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn conversion(&self) -> Option<&ConversionParams> {
        match &self.kind {
            TechnologyKind::Conversion(params) => Some(params),
            _ => None,
        }
    }

    pub fn conversion_mut(&mut self) -> Option<&mut ConversionParams> {
        match &mut self.kind {
            TechnologyKind::Conversion(params) => Some(params),
            _ => None,
        }
    }

    /// Build the stock twin: same kind parameters and lifetimes, capacity
    /// seeded at zero, no shared expansion membership and no cost scaling.
    pub fn stock_twin(&self) -> Technology {
        let mut costs = self.costs.clone();
        costs.cost_scale = None;
        Technology {
            name: stock_name(&self.name),
            kind: self.kind.clone(),
            role: TechnologyRole::Standard,
            unrestricted: false,
            stock_of: Some(self.name.clone()),
            capacity: Capacity::zero(),
            raw_capacity: Capacity::zero(),
            economic_lifetime: self.economic_lifetime,
            technical_lifetime: self.technical_lifetime,
            interest_rate: self.interest_rate,
            costs,
            shared: None,
        }
    }
}

/// Insertion-ordered technology collection with lookup by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Technology>", into = "Vec<Technology>")]
pub struct TechnologyCatalog {
    technologies: Vec<Technology>,
    index: HashMap<String, usize>,
}

impl TechnologyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a technology; names must be unique.
    pub fn insert(&mut self, technology: Technology) -> PathwayResult<()> {
        if self.index.contains_key(&technology.name) {
            return Err(PathwayError::config(format!(
                "duplicate technology '{}'",
                technology.name
            )));
        }
        self.index
            .insert(technology.name.clone(), self.technologies.len());
        self.technologies.push(technology);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Technology> {
        self.index.get(name).map(|&i| &self.technologies[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Technology> {
        self.index.get(name).map(|&i| &mut self.technologies[i])
    }

    /// Lookup that turns a missing technology into a configuration error.
    pub fn require(&self, name: &str) -> PathwayResult<&Technology> {
        self.get(name)
            .ok_or_else(|| PathwayError::config(format!("unknown technology '{name}'")))
    }

    pub fn require_mut(&mut self, name: &str) -> PathwayResult<&mut Technology> {
        self.get_mut(name)
            .ok_or_else(|| PathwayError::config(format!("unknown technology '{name}'")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn validate(&self) -> PathwayResult<()> {
        self.technologies.iter().try_for_each(Technology::validate)
    }

    /// Stock twin of `name`, if one was created.
    pub fn stock_of(&self, name: &str) -> Option<&Technology> {
        self.get(&stock_name(name)).filter(|t| t.is_stock())
    }

    /// Current fixed capacity of the stock twin (0 without a twin).
    pub fn stock_capacity(&self, name: &str) -> f64 {
        self.stock_of(name).map(|s| s.capacity.upper()).unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Technology> {
        self.technologies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Technology> {
        self.technologies.iter_mut()
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.technologies.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.technologies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.technologies.is_empty()
    }
}

impl From<Vec<Technology>> for TechnologyCatalog {
    fn from(technologies: Vec<Technology>) -> Self {
        let index = technologies
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self {
            technologies,
            index,
        }
    }
}

impl From<TechnologyCatalog> for Vec<Technology> {
    fn from(catalog: TechnologyCatalog) -> Self {
        catalog.technologies
    }
}
