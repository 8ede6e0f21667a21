//! Fractional biomass removal
//!
//! Harvest, graze and cut events remove fractions of an organ's live and
//! dead matter. Removed fractions leave the system entirely; residue
//! fractions detach to the external surface-residue sink. Senescence and
//! detachment reuse the same arithmetic with a single non-zero fraction.

use crate::biomass::BiomassPool;
use crate::FloatValue;
use log::trace;
use serde::{Deserialize, Serialize};

/// Fractions of live and dead matter to take in one removal event.
///
/// Each fraction lies in [0, 1] and the live pair (and dead pair) must sum
/// to at most 1; honouring that is the caller's contract and is not
/// re-validated on every event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RemovalFractions {
    /// Fraction of live matter exported from the system (e.g. grain, bales)
    pub fraction_live_to_remove: FloatValue,
    /// Fraction of dead matter exported from the system
    pub fraction_dead_to_remove: FloatValue,
    /// Fraction of live matter detached to surface residue
    pub fraction_live_to_residue: FloatValue,
    /// Fraction of dead matter detached to surface residue
    pub fraction_dead_to_residue: FloatValue,
}

impl RemovalFractions {
    /// True when the event takes nothing; applying it is a no-op.
    pub fn is_zero(&self) -> bool {
        self.fraction_live_to_remove == 0.0
            && self.fraction_dead_to_remove == 0.0
            && self.fraction_live_to_residue == 0.0
            && self.fraction_dead_to_residue == 0.0
    }
}

/// What one removal event produced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RemovalResult {
    /// Matter exported from the system
    pub removed: BiomassPool,
    /// Matter detached to the surface-residue sink
    pub detached: BiomassPool,
}

/// Apply `fractions` to a live/dead pool pair in place.
///
/// Mass balance holds within rounding:
/// `live + dead == live' + dead' + removed + detached`.
pub fn remove_biomass(
    live: &mut BiomassPool,
    dead: &mut BiomassPool,
    fractions: &RemovalFractions,
) -> RemovalResult {
    if fractions.is_zero() {
        return RemovalResult::default();
    }

    let removed = live.scaled(fractions.fraction_live_to_remove)
        + dead.scaled(fractions.fraction_dead_to_remove);
    let detached = live.scaled(fractions.fraction_live_to_residue)
        + dead.scaled(fractions.fraction_dead_to_residue);
    trace!(
        "biomass removal: {:.4} g/m² removed, {:.4} g/m² detached",
        removed.wt(),
        detached.wt()
    );

    *live = live.scaled(1.0 - fractions.fraction_live_to_remove - fractions.fraction_live_to_residue);
    *dead = dead.scaled(1.0 - fractions.fraction_dead_to_remove - fractions.fraction_dead_to_residue);

    RemovalResult { removed, detached }
}
