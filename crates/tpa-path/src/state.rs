//! Run state owned by the orchestrator.

use crate::ledger::CommissioningLedger;
use crate::optimizer::PeriodResult;
use crate::scurve::SCurveTable;
use crate::shared::SharedGroupState;
use serde::Serialize;
use tpa_core::{PathwayYears, YearTable};

/// The year being prepared and whether it is the initial target-year solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub year: i32,
    pub target_solve: bool,
}

impl Period {
    pub fn target(years: &PathwayYears) -> Self {
        Self {
            year: years.target,
            target_solve: true,
        }
    }

    pub fn pathway(year: i32) -> Self {
        Self {
            year,
            target_solve: false,
        }
    }

    /// First optimized year. The target-year solve has no lead-in, so its
    /// start coincides with the target year.
    pub fn start(&self, years: &PathwayYears) -> i32 {
        if self.target_solve {
            years.target
        } else {
            years.start
        }
    }

    pub fn is_reference(&self, years: &PathwayYears) -> bool {
        !self.target_solve && self.year == years.reference
    }

    /// Bounds come from S-curves and funnels in every pathway year except
    /// the reference year.
    pub fn builds_bounds(&self, years: &PathwayYears) -> bool {
        !self.target_solve && self.year != years.reference
    }
}

/// Bookkeeping carried from one period to the next.
///
/// Every mutation step bumps [`version`](Self::version), so snapshots and
/// logs can tell which state a period was prepared from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathwayState {
    version: u64,
    pub ledger: CommissioningLedger,
    pub curves: SCurveTable,
    pub groups: SharedGroupState,
    /// Capacity ceiling of each technology in each model year
    pub modelyear_ub: YearTable,
    /// Average investment cost of capacity installed in a given year
    pub installed_capex: YearTable,
    pub target_result: Option<PeriodResult>,
    pub last_result: Option<PeriodResult>,
}

impl PathwayState {
    pub fn new(ledger: CommissioningLedger) -> Self {
        Self {
            ledger,
            ..Self::default()
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn bump(&mut self) -> u64 {
        self.version += 1;
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_start() {
        let years = PathwayYears {
            reference: 2020,
            start: 2025,
            target: 2050,
            interval: 5,
        };
        assert_eq!(Period::target(&years).start(&years), 2050);
        assert_eq!(Period::pathway(2030).start(&years), 2025);
        assert!(Period::pathway(2020).is_reference(&years));
        assert!(!Period::pathway(2020).builds_bounds(&years));
        assert!(Period::pathway(2025).builds_bounds(&years));
        assert!(!Period::target(&years).builds_bounds(&years));
    }

    #[test]
    fn test_version_bumps() {
        let mut state = PathwayState::default();
        assert_eq!(state.version(), 0);
        state.bump();
        assert_eq!(state.bump(), 2);
    }
}
