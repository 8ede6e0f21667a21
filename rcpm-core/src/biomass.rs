//! Biomass pool value types
//!
//! Dry matter and nitrogen are tracked in three sub-pools with different
//! remobilisation rules: structural (permanent tissue), metabolic
//! (intermediate) and storage (reversible reserve). [`BiomassPool`] holds the
//! six amounts for one organ compartment; the remaining types are the pools
//! exchanged through the arbitration protocol each day:
//!
//! - [`BiomassPoolValue`]: a demand or tentative (potential) allocation
//! - [`BiomassSupply`]: what an organ can provide, by source
//! - [`BiomassAllocation`]: the arbitrator's final decision for one resource

use crate::arbitration::FLOW_TOLERANCE;
use crate::errors::{RcpmError, RcpmResult};
use crate::maths::divide;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// Dry matter and nitrogen amounts for one organ compartment (g/m²).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomassPool {
    pub structural_wt: FloatValue,
    pub metabolic_wt: FloatValue,
    pub storage_wt: FloatValue,
    pub structural_n: FloatValue,
    pub metabolic_n: FloatValue,
    pub storage_n: FloatValue,
}

impl BiomassPool {
    /// Total dry weight (g/m²).
    pub fn wt(&self) -> FloatValue {
        self.structural_wt + self.metabolic_wt + self.storage_wt
    }

    /// Total nitrogen (g/m²).
    pub fn n(&self) -> FloatValue {
        self.structural_n + self.metabolic_n + self.storage_n
    }

    /// Nitrogen concentration (g N / g DM); zero for an empty pool.
    pub fn n_conc(&self) -> FloatValue {
        divide(self.n(), self.wt(), 0.0)
    }

    /// Reset every amount to zero.
    ///
    /// Transient pools (Allocated, Senesced, Detached, Removed) are cleared
    /// at the start of each simulated day; persistent pools only at plant
    /// end or harvest.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// A copy with every amount multiplied by `fraction`.
    pub fn scaled(&self, fraction: FloatValue) -> Self {
        Self {
            structural_wt: self.structural_wt * fraction,
            metabolic_wt: self.metabolic_wt * fraction,
            storage_wt: self.storage_wt * fraction,
            structural_n: self.structural_n * fraction,
            metabolic_n: self.metabolic_n * fraction,
            storage_n: self.storage_n * fraction,
        }
    }

    /// Fail with [`RcpmError::NegativeFlow`] if any amount is negative
    /// beyond tolerance.
    pub fn check_non_negative(&self, organ: &str) -> RcpmResult<()> {
        let amounts = [
            ("structural weight", self.structural_wt),
            ("metabolic weight", self.metabolic_wt),
            ("storage weight", self.storage_wt),
            ("structural nitrogen", self.structural_n),
            ("metabolic nitrogen", self.metabolic_n),
            ("storage nitrogen", self.storage_n),
        ];
        for (quantity, value) in amounts {
            if value < -FLOW_TOLERANCE {
                return Err(RcpmError::NegativeFlow {
                    organ: organ.to_string(),
                    quantity,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Add for BiomassPool {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            structural_wt: self.structural_wt + other.structural_wt,
            metabolic_wt: self.metabolic_wt + other.metabolic_wt,
            storage_wt: self.storage_wt + other.storage_wt,
            structural_n: self.structural_n + other.structural_n,
            metabolic_n: self.metabolic_n + other.metabolic_n,
            storage_n: self.storage_n + other.storage_n,
        }
    }
}

impl AddAssign for BiomassPool {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Mul<FloatValue> for BiomassPool {
    type Output = Self;

    fn mul(self, fraction: FloatValue) -> Self {
        self.scaled(fraction)
    }
}

impl Sum for BiomassPool {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, pool| acc + pool)
    }
}

/// A demand or potential allocation, split by destination sub-pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomassPoolValue {
    pub structural: FloatValue,
    pub metabolic: FloatValue,
    pub storage: FloatValue,
}

impl BiomassPoolValue {
    pub fn total(&self) -> FloatValue {
        self.structural + self.metabolic + self.storage
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What an organ can provide for one resource, by source.
///
/// All components are non-negative; supply computation must not mutate the
/// organ's live state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomassSupply {
    /// Newly fixed matter (photosynthesis for DM, biological fixation for N).
    pub fixation: FloatValue,
    /// Reserves freed by today's senescing tissue.
    pub reallocation: FloatValue,
    /// Storage reserves remobilised from live tissue.
    pub retranslocation: FloatValue,
    /// Extraction from the soil.
    pub uptake: FloatValue,
}

impl BiomassSupply {
    pub fn total(&self) -> FloatValue {
        self.fixation + self.reallocation + self.retranslocation + self.uptake
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The arbitrator's final allocation decision for one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BiomassAllocation {
    pub structural: FloatValue,
    pub metabolic: FloatValue,
    pub storage: FloatValue,
    /// Amount the organ must surrender from live storage.
    pub retranslocation: FloatValue,
    /// Amount the organ must surrender from today's senescing material.
    pub reallocation: FloatValue,
}

impl BiomassAllocation {
    /// Total new growth entering the organ (g/m²).
    pub fn total_growth(&self) -> FloatValue {
        self.structural + self.metabolic + self.storage
    }

    /// True when every component is zero within tolerance, in which case
    /// applying the allocation must leave the organ unchanged.
    pub fn is_zero(&self) -> bool {
        self.total_growth().abs() < FLOW_TOLERANCE
            && self.retranslocation.abs() < FLOW_TOLERANCE
            && self.reallocation.abs() < FLOW_TOLERANCE
    }
}
