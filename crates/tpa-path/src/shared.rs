//! Shared expansion limits across technology groups.
//!
//! Members of a group share one yearly expansion cap. Working backward from
//! the group's target-year requirement, the minimum schedule finds the
//! *switch year* from which the group has to expand at the full cap to
//! still reach the target:
//!
//! ```text
//!   required
//!      ▲                                   ●  target result
//!      │                              ●
//!      │                         ●          slope = yearly cap
//!      │      stock ─────────●
//!      │                     ▲
//!      │                switch year
//!      └────────────────────────────────────────▶ year
//! ```
//!
//! Before the switch year no minimum applies; from it onward every year
//! requires one cap of new capacity.

use crate::ledger::CommissioningLedger;
use crate::optimizer::PeriodResult;
use crate::state::Period;
use serde::Serialize;
use std::collections::BTreeMap;
use tpa_core::{
    round4, stock_name, Capacity, PathwayError, PathwayResult, PathwayYears, SharedExpansion,
    SharedGroupConfig, TechnologyCatalog, YearTable,
};

/// Backward-solved minimum trajectory of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinimumSchedule {
    pub switch_year: i32,
    /// New capacity required in each year after the reference year
    pub yearly_min: BTreeMap<i32, f64>,
    /// Running minimum installed capacity from the backward pass
    pub required: BTreeMap<i32, f64>,
}

/// Shared bounds handed to the optimizer for one group and period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupCaps {
    pub min: Option<f64>,
    pub max: f64,
}

/// Per-group bookkeeping across the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SharedGroupState {
    /// Combined target-year result of each group, stocks included
    pub target_results: BTreeMap<String, f64>,
    pub schedules: BTreeMap<String, MinimumSchedule>,
    pub caps: BTreeMap<String, BTreeMap<i32, GroupCaps>>,
}

impl SharedGroupState {
    pub fn caps_of(&self, group: &str, year: i32) -> Option<GroupCaps> {
        self.caps.get(group).and_then(|years| years.get(&year)).copied()
    }
}

/// Solve the minimum schedule backward from the target year.
///
/// `decommissioning` and `stock` give the group's combined retirements and
/// installed capacity per year.
pub fn minimum_schedule(
    years: &PathwayYears,
    yearly_cap: f64,
    target_result: f64,
    decommissioning: impl Fn(i32) -> f64,
    stock: impl Fn(i32) -> f64,
) -> PathwayResult<MinimumSchedule> {
    let mut required = BTreeMap::new();
    let mut running = (target_result - yearly_cap + decommissioning(years.target)).max(0.0);
    required.insert(years.target, running);

    let mut switch_year = None;
    for year in (years.reference..years.target).rev() {
        running = (running - yearly_cap + decommissioning(year)).max(0.0);
        required.insert(year, running);
        if running <= stock(year) {
            switch_year = Some(year);
            break;
        }
    }

    let switch_year = match switch_year {
        Some(year) => year,
        None => {
            let next = required
                .get(&(years.reference + 1))
                .copied()
                .unwrap_or(running);
            if next - yearly_cap > stock(years.reference) {
                return Err(PathwayError::config(format!(
                    "shared expansion minimum of {} in {} is not reachable from the reference stock {}",
                    round4(next),
                    years.reference + 1,
                    round4(stock(years.reference))
                )));
            }
            years.reference
        }
    };

    let yearly_min = ((years.reference + 1)..=years.target)
        .map(|year| (year, if year >= switch_year { yearly_cap } else { 0.0 }))
        .collect();

    Ok(MinimumSchedule {
        switch_year,
        yearly_min,
        required,
    })
}

/// Store the combined target-year result of every group.
pub fn record_target_results(
    state: &mut SharedGroupState,
    groups: &[SharedGroupConfig],
    target_result: &PeriodResult,
) {
    for group in groups {
        let total: f64 = group
            .members
            .iter()
            .map(|m| target_result.capacity(m) + target_result.capacity(&stock_name(m)))
            .sum();
        state.target_results.insert(group.id.clone(), round4(total));
    }
}

/// Recompute and store the minimum schedule of `group` from the current ledger.
pub fn compute_minimum_schedule(
    state: &mut SharedGroupState,
    group: &SharedGroupConfig,
    ledger: &CommissioningLedger,
    years: &PathwayYears,
) -> PathwayResult<MinimumSchedule> {
    let target_result = state
        .target_results
        .get(&group.id)
        .copied()
        .ok_or_else(|| {
            PathwayError::config(format!("no target-year result for shared group '{}'", group.id))
        })?;
    let members = || group.members.iter().map(String::as_str);
    let schedule = minimum_schedule(
        years,
        group.yearly_expansion_cap,
        target_result,
        |year| ledger.decommissioning_of(members(), year),
        |year| ledger.installed_of(members(), year),
    )?;
    tracing::debug!(group = %group.id, switch_year = schedule.switch_year, "shared expansion schedule");
    state.schedules.insert(group.id.clone(), schedule.clone());
    Ok(schedule)
}

/// Assign the shared bounds of `group` for `period` to its members.
///
/// Returns `None` in the reference year, where membership is removed.
/// Fails before any solve when the members' own bounds cannot satisfy the
/// shared bounds.
#[allow(clippy::too_many_arguments)]
pub fn apply_group_caps(
    catalog: &mut TechnologyCatalog,
    group: &SharedGroupConfig,
    state: &mut SharedGroupState,
    ledger: &CommissioningLedger,
    modelyear_ub: &mut YearTable,
    years: &PathwayYears,
    period: Period,
) -> PathwayResult<Option<GroupCaps>> {
    let year = period.year;
    if period.is_reference(years) {
        for member in &group.members {
            catalog.require_mut(member)?.shared = None;
        }
        return Ok(None);
    }

    let members = || group.members.iter().map(String::as_str);
    let cap = group.yearly_expansion_cap;

    let caps = if period.target_solve {
        let retiring: f64 = (years.reference..=years.target)
            .map(|y| ledger.decommissioning_of(members(), y))
            .sum();
        GroupCaps {
            min: None,
            max: round4(((years.target - years.reference) as f64 * cap - retiring).max(0.0)),
        }
    } else {
        let schedule = compute_minimum_schedule(state, group, ledger, years)?;
        let window = (year - years.interval + 1)..=year;
        let mut min: f64 = window
            .clone()
            .map(|y| schedule.yearly_min.get(&y).copied().unwrap_or(0.0))
            .sum();
        if let Some(decommissioning_cap) = group.yearly_decommissioning_cap {
            let retiring: f64 = window.map(|y| ledger.decommissioning_of(members(), y)).sum();
            min = min.max(retiring - years.interval as f64 * decommissioning_cap);
        }
        let max = round4(years.interval as f64 * cap);

        for member in &group.members {
            let stock = catalog.stock_capacity(member);
            let tech = catalog.require_mut(member)?;
            let headroom = round4((tech.raw_ceiling() - stock).max(0.0));
            tech.capacity = Capacity::range(0.0, headroom)?;
            modelyear_ub.set(member, year, max);
        }

        let min = round4(min);
        GroupCaps {
            min: (min > 0.0).then_some(min),
            max,
        }
    };

    for member in &group.members {
        catalog.require_mut(member)?.shared = Some(SharedExpansion {
            group_id: group.id.clone(),
            min: caps.min,
            max: caps.max,
        });
    }
    check_group_feasibility(catalog, group, year, caps)?;

    state
        .caps
        .entry(group.id.clone())
        .or_default()
        .insert(year, caps);
    Ok(Some(caps))
}

/// Reject shared bounds that no combination of member capacities can meet.
pub fn check_group_feasibility(
    catalog: &TechnologyCatalog,
    group: &SharedGroupConfig,
    year: i32,
    caps: GroupCaps,
) -> PathwayResult<()> {
    let mut member_min = 0.0;
    let mut member_max = 0.0;
    for member in &group.members {
        let tech = catalog.require(member)?;
        member_min += tech.capacity.lower();
        member_max += tech.capacity.upper();
    }
    let (member_min, member_max) = (round4(member_min), round4(member_max));
    let shared_min = caps.min.unwrap_or(0.0);

    if shared_min > caps.max {
        return Err(PathwayError::config(format!(
            "infeasible shared expansion for group '{}' in {year}: minimum {shared_min} exceeds maximum {}",
            group.id, caps.max
        )));
    }
    if member_max < shared_min {
        return Err(PathwayError::config(format!(
            "infeasible shared expansion for group '{}' in {year}: members allow at most {member_max} but {shared_min} is required",
            group.id
        )));
    }
    if member_min > caps.max {
        return Err(PathwayError::config(format!(
            "infeasible shared expansion for group '{}' in {year}: members require at least {member_min} but only {} is allowed",
            group.id, caps.max
        )));
    }
    Ok(())
}
