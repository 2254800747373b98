//! # tpa-core: Transformation-Path Data Model
//!
//! Provides the data structures shared by every stage of a myopic
//! transformation-path run.
//!
//! ## Design Philosophy
//!
//! A run solves one single-period optimization per model year and carries
//! state between periods. The types here keep that state explicit:
//! - **Capacity** is a tagged union (`Fixed` or `Range`), validated on construction
//! - **Technologies** carry their role (stock twin, virtual, demand, building)
//!   as explicit fields instead of naming conventions
//! - **Year tables** are ordered technology × year grids with a default value
//! - **Errors** share one enum with a coarse [`ErrorKind`]
//!
//! ## Quick Start
//!
//! ```rust
//! use tpa_core::*;
//!
//! let mut catalog = TechnologyCatalog::new();
//! catalog
//!     .insert(Technology::new("pv", TechnologyKind::Source, Capacity::range(0.0, 80.0).unwrap()))
//!     .unwrap();
//!
//! let years = PathwayYears { reference: 2020, start: 2025, target: 2050, interval: 5 };
//! let config = PathwayConfig::new(years);
//! config.validate().unwrap();
//!
//! assert_eq!(config.years.model_years().len(), 7);
//! assert_eq!(catalog.require("pv").unwrap().raw_ceiling(), 80.0);
//! ```

pub mod capacity;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod inputs;
pub mod table;
pub mod technology;

pub use capacity::{round4, Capacity, CAPACITY_EPSILON, ROUNDING_DIGITS};
pub use config::{
    load_config_from_path, BuildingConfig, FunnelConfig, PathwayConfig, PathwayYears,
    SCurveShape, SharedExpansionConfig, SharedGroupConfig, StorageCoupling,
};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ErrorKind, PathwayError, PathwayResult};
pub use inputs::PathwayInputs;
pub use table::YearTable;
pub use technology::{
    stock_name, BuildingClass, BuildingProfile, ConversionParams, CostParams, SharedExpansion,
    StorageParams, Technology, TechnologyCatalog, TechnologyKind, TechnologyRole, CO2_COMMODITY,
    STOCK_SUFFIX,
};
