//! # tpa-path: Myopic Transformation-Path Driver
//!
//! Approximates a multi-period capacity-expansion optimization by solving
//! one single-period model per year and carrying state between periods.
//!
//! ## Components
//!
//! | Stage | Module | Role |
//! |-------|--------|------|
//! | Vintage stocks | [`stock`], [`ledger`] | Stock twins, commissioning and retirement ledgers |
//! | Expansion bounds | [`scurve`], [`bounds`] | S-curve corridors and per-interval growth funnels |
//! | Shared limits | [`shared`] | Group expansion caps and the switch-year schedule |
//! | Parameter blending | [`blend`], [`params`] | Vintage-weighted costs, efficiencies and emissions |
//! | Orchestration | [`orchestrator`] | Period sequencing around a [`CapacityOptimizer`] |
//!
//! ### Architecture
//!
//! The optimizer is a black box behind the [`CapacityOptimizer`] trait. The
//! [`TransformationPath`] owns all run state ([`PathwayState`]) and hands
//! each stage only the tables it works on.
//!
//! ## Example
//!
//! ```ignore
//! use tpa_core::{load_config_from_path, PathwayInputs, TechnologyCatalog};
//! use tpa_path::TransformationPath;
//!
//! let config = load_config_from_path("scenario.yaml".as_ref())?;
//! let path = TransformationPath::new(config, catalog, inputs)?;
//! let report = path.run(&mut my_optimizer)?;
//! println!("{}", report.to_json()?);
//! ```

pub mod blend;
pub mod bounds;
pub mod ledger;
pub mod optimizer;
pub mod orchestrator;
pub mod params;
pub mod report;
pub mod scurve;
pub mod shared;
pub mod state;
pub mod stock;

pub use bounds::{clamp_to_scurve, expansion_funnel, unrestricted_funnel, Funnel};
pub use ledger::CommissioningLedger;
pub use optimizer::{CapacityOptimizer, PeriodModel, PeriodResult, TerminationStatus};
pub use orchestrator::TransformationPath;
pub use report::{PathwayReport, PeriodSnapshot, TechnologySnapshot};
pub use scurve::{build_scurves, lower_bound_curve, SCurveTable};
pub use shared::{apply_group_caps, minimum_schedule, GroupCaps, MinimumSchedule, SharedGroupState};
pub use state::{PathwayState, Period};
pub use stock::{create_stock_if_needed, roll_forward};
