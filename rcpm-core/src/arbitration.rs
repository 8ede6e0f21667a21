//! The organ arbitration protocol
//!
//! Every organ negotiates for dry matter and nitrogen through the same fixed
//! per-resource call order, driven once per simulated day by the external
//! whole-plant arbitrator:
//!
//! 1. `calculate_*_supply`: what the organ can provide, by source
//! 2. `calculate_*_demand`: what the organ wants, by destination sub-pool
//! 3. `set_dry_matter_potential_allocation`: a tentative structural and
//!    metabolic allocation, recorded so later demand calls can project the
//!    organ's theoretical storage capacity (dry matter only)
//! 4. `set_*_allocation`: the actual mass transfer into live tissue
//!
//! Splitting supply/demand computation from allocation lets the arbitrator
//! solve a global allocation problem without any organ knowing about its
//! siblings. Supply and demand calls MUST NOT mutate live state; allocation
//! calls must conserve mass within [`FLOW_TOLERANCE`]. A daily step either
//! completes for all organs or aborts on the first error; partial-day state
//! is never valid.

use crate::biomass::{BiomassAllocation, BiomassPoolValue, BiomassSupply};
use crate::context::{ResidueSink, SimulationContext, SowingParameters};
use crate::errors::{RcpmError, RcpmResult};
use crate::removal::RemovalFractions;
use crate::FloatValue;
use is_close::is_close;

/// Tolerance for mass-balance accounting checks.
pub const FLOW_TOLERANCE: FloatValue = 1e-9;

/// Tolerance below which a demand is treated as zero.
pub const DEMAND_TOLERANCE: FloatValue = 1e-12;

/// True when two accounting totals agree within [`FLOW_TOLERANCE`].
///
/// Repeated proportional division leaves rounding drift in distributed sums;
/// comparisons against requested totals always go through this helper rather
/// than exact equality.
pub fn totals_match(a: FloatValue, b: FloatValue) -> bool {
    is_close!(a, b, abs_tol = FLOW_TOLERANCE)
}

/// Fail with `InvalidAllocation` when a non-zero `amount` is offered while
/// the corresponding `demand` is numerically zero.
pub fn check_allocation_with_demand(
    organ: &str,
    resource: &'static str,
    amount: FloatValue,
    demand: FloatValue,
) -> RcpmResult<()> {
    if amount > DEMAND_TOLERANCE && demand <= DEMAND_TOLERANCE {
        return Err(RcpmError::InvalidAllocation {
            organ: organ.to_string(),
            resource,
            amount,
        });
    }
    Ok(())
}

/// Fail with `AllocationOverflow` when `amount` exceeds the organ's declared
/// `supply` beyond tolerance.
pub fn check_allocation_within_supply(
    organ: &str,
    flow: &'static str,
    amount: FloatValue,
    supply: FloatValue,
) -> RcpmResult<()> {
    if amount > supply + FLOW_TOLERANCE {
        return Err(RcpmError::AllocationOverflow {
            organ: organ.to_string(),
            flow,
            amount,
            supply,
        });
    }
    Ok(())
}

/// Fail with `NegativeFlow` when a computed quantity is negative beyond
/// tolerance (a sign-convention violation, never a valid model state).
pub fn check_non_negative_flow(
    organ: &str,
    quantity: &'static str,
    value: FloatValue,
) -> RcpmResult<()> {
    if value < -FLOW_TOLERANCE {
        return Err(RcpmError::NegativeFlow {
            organ: organ.to_string(),
            quantity,
            value,
        });
    }
    Ok(())
}

/// A plant organ participating in daily resource arbitration.
///
/// The trait is object safe and serializable so the arbitrator can hold and
/// checkpoint a homogeneous `Vec<Box<dyn Organ>>`. Lifecycle hooks replace
/// the event subscriptions of older implementations; the sequencer invokes
/// them directly since each hook has exactly one listener here.
#[typetag::serde(tag = "organ")]
pub trait Organ {
    fn name(&self) -> &str;

    /// Total live dry weight (g/m²).
    fn live_wt(&self) -> FloatValue;

    /// Total live nitrogen (g/m²).
    fn live_n(&self) -> FloatValue;

    // ----- lifecycle -----

    fn on_sow(&mut self, ctx: &SimulationContext, sowing: &SowingParameters) -> RcpmResult<()>;

    /// Reset the day's transient pools. Called before any protocol step.
    fn on_day_start(&mut self, ctx: &SimulationContext) -> RcpmResult<()>;

    /// Pre-arbitration growth: root-front advance, senescence splitting and
    /// anything else that must happen before supplies are computed.
    fn do_potential_growth(&mut self, ctx: &SimulationContext) -> RcpmResult<()>;

    /// Post-arbitration settlement: today's senescing matter (less whatever
    /// was reallocated) joins the dead pools, detachment runs and detached
    /// matter is deposited with the residue sink. Ends by verifying that no
    /// pool went negative.
    fn on_day_end(
        &mut self,
        ctx: &SimulationContext,
        residue: &mut dyn ResidueSink,
    ) -> RcpmResult<()>;

    /// Transfer all remaining live and dead matter to the residue sink.
    fn on_plant_end(
        &mut self,
        ctx: &SimulationContext,
        residue: &mut dyn ResidueSink,
    ) -> RcpmResult<()>;

    // ----- dry matter -----

    fn calculate_dry_matter_supply(&mut self, ctx: &SimulationContext)
        -> RcpmResult<BiomassSupply>;

    fn calculate_dry_matter_demand(
        &mut self,
        ctx: &SimulationContext,
    ) -> RcpmResult<BiomassPoolValue>;

    /// Record a tentative allocation. Fails with `InvalidAllocation` if a
    /// non-zero amount is offered while the corresponding demand is zero
    /// beyond [`DEMAND_TOLERANCE`].
    fn set_dry_matter_potential_allocation(
        &mut self,
        ctx: &SimulationContext,
        potential: &BiomassPoolValue,
    ) -> RcpmResult<()>;

    /// Apply the final dry-matter allocation, scaled by the organ's
    /// conversion efficiency, updating growth respiration.
    fn set_dry_matter_allocation(
        &mut self,
        ctx: &SimulationContext,
        allocation: &BiomassAllocation,
    ) -> RcpmResult<()>;

    // ----- nitrogen -----

    fn calculate_nitrogen_supply(&mut self, ctx: &SimulationContext) -> RcpmResult<BiomassSupply>;

    fn calculate_nitrogen_demand(
        &mut self,
        ctx: &SimulationContext,
    ) -> RcpmResult<BiomassPoolValue>;

    /// Apply the final nitrogen allocation (unscaled).
    fn set_nitrogen_allocation(
        &mut self,
        ctx: &SimulationContext,
        allocation: &BiomassAllocation,
    ) -> RcpmResult<()>;

    // ----- removal -----

    /// Fractional removal of live/dead matter on harvest, graze or cut
    /// events. Detached fractions go to the residue sink; removed fractions
    /// leave the system entirely.
    fn remove_biomass(
        &mut self,
        fractions: &RemovalFractions,
        residue: &mut dyn ResidueSink,
    ) -> RcpmResult<()>;
}
