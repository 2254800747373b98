//! Scenario configuration for a transformation-path run.
//!
//! Loaded from YAML, JSON or TOML. Every field except `years` has a default,
//! so a minimal file only declares the pathway years:
//!
//! ```yaml
//! years: { reference: 2020, start: 2025, target: 2050, interval: 5 }
//! shared_expansion:
//!   enabled: true
//!   groups:
//!     - id: renewables
//!       members: [pv, wind]
//!       yearly_expansion_cap: 10.0
//! ```

use crate::error::{PathwayError, PathwayResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayYears {
    pub reference: i32,
    pub start: i32,
    pub target: i32,
    pub interval: i32,
}

impl PathwayYears {
    /// Reference year through target year in steps of `interval`.
    pub fn model_years(&self) -> Vec<i32> {
        if self.interval <= 0 {
            return Vec::new();
        }
        (self.reference..=self.target)
            .step_by(self.interval as usize)
            .collect()
    }

    /// Whether `year` lies on the reference + k·interval grid.
    pub fn on_grid(&self, year: i32) -> bool {
        self.interval > 0 && year >= self.reference && (year - self.reference) % self.interval == 0
    }
}

/// Logistic shape parameters of the S-curve lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SCurveShape {
    #[serde(default = "default_a")]
    pub a: f64,
    #[serde(default = "default_b")]
    pub b: f64,
    #[serde(default = "default_c")]
    pub c: f64,
}

fn default_a() -> f64 {
    1.1
}

fn default_b() -> f64 {
    0.22
}

fn default_c() -> f64 {
    129.2961
}

impl Default for SCurveShape {
    fn default() -> Self {
        Self {
            a: default_a(),
            b: default_b(),
            c: default_c(),
        }
    }
}

/// Growth and decay fractions of the expansion funnel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FunnelConfig {
    #[serde(default = "default_rate")]
    pub max_expansion: f64,
    #[serde(default = "default_rate")]
    pub max_decommissioning: f64,
    /// Fraction of the raw ceiling that seeds technologies new to the market
    #[serde(default = "default_start_diffusion")]
    pub start_diffusion: f64,
}

fn default_rate() -> f64 {
    0.2
}

fn default_start_diffusion() -> f64 {
    0.005
}

impl Default for FunnelConfig {
    fn default() -> Self {
        Self {
            max_expansion: default_rate(),
            max_decommissioning: default_rate(),
            start_diffusion: default_start_diffusion(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildingConfig {
    /// Yearly refurbishment rate in percent of the reference stock
    #[serde(default = "default_refurbishment_rate")]
    pub max_refurbishment_rate: f64,
}

fn default_refurbishment_rate() -> f64 {
    2.5
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            max_refurbishment_rate: default_refurbishment_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedGroupConfig {
    pub id: String,
    pub members: Vec<String>,
    /// Maximum combined new capacity per year
    pub yearly_expansion_cap: f64,
    /// Maximum combined net decommissioning per year
    #[serde(default)]
    pub yearly_decommissioning_cap: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedExpansionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub groups: Vec<SharedGroupConfig>,
}

impl SharedExpansionConfig {
    pub fn group(&self, id: &str) -> Option<&SharedGroupConfig> {
        self.groups.iter().find(|g| g.id == id)
    }
}

/// Storage capacity that follows the stock of a coupled technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCoupling {
    pub vehicle: String,
    pub storage: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayConfig {
    pub years: PathwayYears,
    #[serde(default)]
    pub s_curve: SCurveShape,
    #[serde(default)]
    pub funnel: FunnelConfig,
    /// Optimizer runs with piecewise-linear ("QP") investment costs
    #[serde(default)]
    pub cost_scaling: bool,
    #[serde(default)]
    pub buildings: BuildingConfig,
    #[serde(default)]
    pub shared_expansion: SharedExpansionConfig,
    #[serde(default)]
    pub coupled_storage: Vec<StorageCoupling>,
}

impl PathwayConfig {
    pub fn new(years: PathwayYears) -> Self {
        Self {
            years,
            s_curve: SCurveShape::default(),
            funnel: FunnelConfig::default(),
            cost_scaling: false,
            buildings: BuildingConfig::default(),
            shared_expansion: SharedExpansionConfig::default(),
            coupled_storage: Vec::new(),
        }
    }

    pub fn with_shared_group(mut self, group: SharedGroupConfig) -> Self {
        self.shared_expansion.enabled = true;
        self.shared_expansion.groups.push(group);
        self
    }

    /// Check year layout, group definitions and numeric parameters.
    pub fn validate(&self) -> PathwayResult<()> {
        let y = &self.years;
        if y.interval <= 0 {
            return Err(PathwayError::config(format!(
                "interval must be positive, got {}",
                y.interval
            )));
        }
        if y.start <= y.reference {
            return Err(PathwayError::config(format!(
                "start year {} must follow reference year {}",
                y.start, y.reference
            )));
        }
        if y.target < y.start {
            return Err(PathwayError::config(format!(
                "target year {} precedes start year {}",
                y.target, y.start
            )));
        }
        for (label, year) in [("start", y.start), ("target", y.target)] {
            if !y.on_grid(year) {
                return Err(PathwayError::config(format!(
                    "{label} year {year} is not reference year {} plus a multiple of {}",
                    y.reference, y.interval
                )));
            }
        }

        let f = &self.funnel;
        for (label, value) in [
            ("max_expansion", f.max_expansion),
            ("max_decommissioning", f.max_decommissioning),
            ("start_diffusion", f.start_diffusion),
            ("max_refurbishment_rate", self.buildings.max_refurbishment_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PathwayError::config(format!(
                    "{label} must be a non-negative number, got {value}"
                )));
            }
        }

        let mut seen = HashSet::new();
        for group in &self.shared_expansion.groups {
            if group.id.trim().is_empty() {
                return Err(PathwayError::config("shared expansion group id cannot be empty"));
            }
            if !seen.insert(group.id.as_str()) {
                return Err(PathwayError::config(format!(
                    "duplicate shared expansion group '{}'",
                    group.id
                )));
            }
            if group.members.is_empty() {
                return Err(PathwayError::config(format!(
                    "shared expansion group '{}' has no members",
                    group.id
                )));
            }
            if group.yearly_expansion_cap < 0.0
                || group.yearly_decommissioning_cap.is_some_and(|c| c < 0.0)
            {
                return Err(PathwayError::config(format!(
                    "shared expansion group '{}' has a negative cap",
                    group.id
                )));
            }
        }

        for coupling in &self.coupled_storage {
            if coupling.factor <= 0.0 {
                return Err(PathwayError::config(format!(
                    "coupling factor of '{}' to '{}' must be positive",
                    coupling.storage, coupling.vehicle
                )));
            }
        }
        Ok(())
    }
}

/// Read a configuration, choosing the format by file extension.
pub fn load_config_from_path(path: &Path) -> Result<PathwayConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading pathway config '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing pathway config yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing pathway config json")
        }
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(&data).context("parsing pathway config toml")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing pathway config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn years() -> PathwayYears {
        PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2050,
            interval: 5,
        }
    }

    #[test]
    fn test_model_years() {
        assert_eq!(
            years().model_years(),
            vec![2020, 2025, 2030, 2035, 2040, 2045, 2050]
        );
        assert!(years().on_grid(2035));
        assert!(!years().on_grid(2033));
    }

    #[test]
    fn test_validate_rejects_bad_years() {
        let mut config = PathwayConfig::new(years());
        assert!(config.validate().is_ok());

        config.years.start = 2020;
        assert!(config.validate().is_err());

        config.years.start = 2027;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("2027"));

        config.years.start = 2025;
        config.years.interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_groups() {
        let group = SharedGroupConfig {
            id: "res".into(),
            members: vec!["pv".into()],
            yearly_expansion_cap: 1.0,
            yearly_decommissioning_cap: None,
        };
        let config = PathwayConfig::new(years())
            .with_shared_group(group.clone())
            .with_shared_group(group);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "years: {{ reference: 2020, start: 2025, target: 2040, interval: 5 }}\ncost_scaling: true"
        )
        .unwrap();
        let config = load_config_from_path(file.path()).unwrap();
        assert!(config.cost_scaling);
        assert_eq!(config.s_curve, SCurveShape::default());
        assert_eq!(config.funnel.start_diffusion, 0.005);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[years]\nreference = 2020\nstart = 2030\ntarget = 2050\ninterval = 10\n\n[funnel]\nmax_expansion = 0.3"
        )
        .unwrap();
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.years.start, 2030);
        assert_eq!(config.funnel.max_expansion, 0.3);
        assert_eq!(config.funnel.max_decommissioning, 0.2);
    }
}
