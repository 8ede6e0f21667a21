//! Explicit per-call simulation context
//!
//! The source of the daily triggers (the phenology/clock sequencer) and the
//! owners of soil state are external collaborators. Instead of ambient
//! singletons, every daily-step call receives a [`SimulationContext`] naming
//! the current time and the soil zones visible to the plant.

use crate::errors::RcpmResult;
use crate::soil::{find_zone, SoilZone};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Simulation time in days since the start of the run.
pub type Time = FloatValue;

/// Everything an organ may read during one daily-step call.
#[derive(Debug, Clone)]
pub struct SimulationContext<'a> {
    pub time: Time,
    zones: &'a [SoilZone],
}

impl<'a> SimulationContext<'a> {
    pub fn new(time: Time, zones: &'a [SoilZone]) -> Self {
        Self { time, zones }
    }

    pub fn zones(&self) -> &'a [SoilZone] {
        self.zones
    }

    /// Look up a zone by name.
    pub fn zone(&self, name: &str) -> RcpmResult<&'a SoilZone> {
        find_zone(self.zones, name)
    }

    /// The zone the plant itself stands in (by convention the first).
    pub fn home_zone(&self) -> RcpmResult<&'a SoilZone> {
        self.zones.first().ok_or_else(|| {
            crate::errors::RcpmError::Configuration("no soil zones supplied".to_string())
        })
    }
}

/// Parameters of a sowing event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SowingParameters {
    /// Sowing depth (mm)
    pub depth: FloatValue,
}

/// The surface-residue collaborator.
///
/// Detached biomass leaves the plant through a single deposit call carrying
/// the crop identifier, the organ name and the detached mass and nitrogen.
pub trait ResidueSink {
    fn deposit(&mut self, crop: &str, organ: &str, wt: FloatValue, n: FloatValue);
}
