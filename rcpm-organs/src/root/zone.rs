//! Per-zone root state
//!
//! A plant keeps one [`RootZone`] per spatial zone it roots into: the home
//! zone it stands in plus any additional zones named in the configuration.
//! The zone tracks the growth front, per-layer live/dead biomass and the
//! day's per-layer demands and recorded uptakes, and carries the layer-level
//! algorithms: growth-front advance, return-on-investment activity weights,
//! proportional mass partitioning and the water/mineral-N extraction
//! potentials.

use crate::parameters::RootParameters;
use log::debug;
use rcpm_core::arbitration::{check_non_negative_flow, FLOW_TOLERANCE};
use rcpm_core::biomass::BiomassPool;
use rcpm_core::errors::{RcpmError, RcpmResult};
use rcpm_core::functions::ScalarFunction;
use rcpm_core::maths::{bound, divide};
use rcpm_core::removal::{remove_biomass, RemovalFractions, RemovalResult};
use rcpm_core::soil::{SoilLayerProfile, KG_HA_TO_G_M2};
use rcpm_core::FloatValue;
use serde::{Deserialize, Serialize};

/// Seed activity weight for explored layers without live root yet, so newly
/// reached depth can be colonised.
pub const MIN_ROOT_ACTIVITY: FloatValue = 1e-10;

/// Per-layer nitrate and ammonium extraction potentials for one zone
/// (kg/ha).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NitrogenUptakeSupply {
    pub no3: Vec<FloatValue>,
    pub nh4: Vec<FloatValue>,
}

impl NitrogenUptakeSupply {
    pub fn total(&self) -> FloatValue {
        self.no3.iter().sum::<FloatValue>() + self.nh4.iter().sum::<FloatValue>()
    }
}

/// Mutable root state for one spatial zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootZone {
    /// Name of the soil zone this state belongs to
    pub zone_name: String,
    /// Current depth of the root front (mm)
    pub depth: FloatValue,
    /// Deepest the front may reach in this zone (mm)
    pub maximum_root_depth: FloatValue,
    /// Live biomass by soil layer
    pub live: Vec<BiomassPool>,
    /// Dead biomass by soil layer
    pub dead: Vec<BiomassPool>,
    /// Today's senescing matter, split out of live until it settles into
    /// dead at day end (less whatever was reallocated)
    pub senescing: Vec<BiomassPool>,
    /// Today's structural N demand by layer (g/m²)
    pub structural_n_demand: Vec<FloatValue>,
    /// Today's storage N demand by layer (g/m²)
    pub storage_n_demand: Vec<FloatValue>,
    /// Today's recorded potential DM allocation by layer (g/m²)
    pub potential_dm_allocation: Vec<FloatValue>,
    /// Today's computed NO3 extraction potential by layer (kg/ha)
    pub no3_supply: Vec<FloatValue>,
    /// Today's computed NH4 extraction potential by layer (kg/ha)
    pub nh4_supply: Vec<FloatValue>,
    /// Recorded actual water extraction by layer (mm)
    pub water_uptake: Vec<FloatValue>,
    /// Recorded actual NO3 extraction by layer (kg/ha)
    pub no3_uptake: Vec<FloatValue>,
    /// Recorded actual NH4 extraction by layer (kg/ha)
    pub nh4_uptake: Vec<FloatValue>,
}

impl RootZone {
    pub fn new(
        zone_name: impl Into<String>,
        num_layers: usize,
        maximum_root_depth: FloatValue,
    ) -> Self {
        Self {
            zone_name: zone_name.into(),
            depth: 0.0,
            maximum_root_depth,
            live: vec![BiomassPool::default(); num_layers],
            dead: vec![BiomassPool::default(); num_layers],
            senescing: vec![BiomassPool::default(); num_layers],
            structural_n_demand: vec![0.0; num_layers],
            storage_n_demand: vec![0.0; num_layers],
            potential_dm_allocation: vec![0.0; num_layers],
            no3_supply: vec![0.0; num_layers],
            nh4_supply: vec![0.0; num_layers],
            water_uptake: vec![0.0; num_layers],
            no3_uptake: vec![0.0; num_layers],
            nh4_uptake: vec![0.0; num_layers],
        }
    }

    /// Place the initial biomass at `initial_depth` and clip the maximum
    /// depth to the bottom of this zone's profile.
    pub fn initialise(
        &mut self,
        profile: &SoilLayerProfile,
        initial_depth: FloatValue,
        initial_dm: FloatValue,
        initial_n_conc: FloatValue,
    ) {
        self.maximum_root_depth = self.maximum_root_depth.min(profile.bottom_depth());
        self.depth = bound(initial_depth, 0.0, self.maximum_root_depth);
        let layer = profile.layer_index_of(self.depth);
        self.live[layer].structural_wt = initial_dm;
        self.live[layer].structural_n = initial_dm * initial_n_conc;
    }

    /// Zero the per-day working arrays. Live, dead and senescing pools are
    /// untouched.
    pub fn reset_daily(&mut self) {
        for values in [
            &mut self.structural_n_demand,
            &mut self.storage_n_demand,
            &mut self.potential_dm_allocation,
            &mut self.no3_supply,
            &mut self.nh4_supply,
            &mut self.water_uptake,
            &mut self.no3_uptake,
            &mut self.nh4_uptake,
        ] {
            values.iter_mut().for_each(|v| *v = 0.0);
        }
    }

    /// Empty the zone entirely (plant end).
    pub fn clear(&mut self) {
        let n = self.live.len();
        self.depth = 0.0;
        self.live = vec![BiomassPool::default(); n];
        self.dead = vec![BiomassPool::default(); n];
        self.senescing = vec![BiomassPool::default(); n];
        self.reset_daily();
    }

    pub fn num_layers(&self) -> usize {
        self.live.len()
    }

    pub fn live_total(&self) -> BiomassPool {
        self.live.iter().copied().sum()
    }

    pub fn dead_total(&self) -> BiomassPool {
        self.dead.iter().copied().sum()
    }

    pub fn senescing_total(&self) -> BiomassPool {
        self.senescing.iter().copied().sum()
    }

    /// Index of the deepest layer the root front has reached.
    pub fn deepest_layer(&self, profile: &SoilLayerProfile) -> usize {
        profile.layer_index_of(self.depth)
    }

    // ----- growth front -----

    /// Advance the root front by today's velocity scaled by the exploration
    /// factor of the layer the front currently occupies. The front never
    /// regresses and never passes the zone's maximum depth or the bottom of
    /// the profile.
    pub fn grow_root_depth(
        &mut self,
        profile: &SoilLayerProfile,
        parameters: &RootParameters,
    ) -> RcpmResult<()> {
        let velocity = parameters.root_front_velocity.value();
        check_non_negative_flow(&self.zone_name, "root front velocity", velocity)?;

        let layer = self.deepest_layer(profile);
        let advance = velocity * parameters.xf.value_at(layer);
        let ceiling = self.maximum_root_depth.min(profile.bottom_depth());
        self.depth = bound(self.depth + advance, self.depth, ceiling);
        Ok(())
    }

    // ----- uptake potentials -----

    /// Potential water extraction by layer (mm):
    /// `KL × KLModifier × (water − LL15) × proportionOfLayerWithinRootDepth`,
    /// evaluated only for layers at or above the root front.
    pub fn water_uptake_supply(
        &self,
        profile: &SoilLayerProfile,
        parameters: &RootParameters,
    ) -> Vec<FloatValue> {
        let mut supply = vec![0.0; profile.num_layers()];
        if self.depth <= 0.0 {
            return supply;
        }
        let kl_modifier = parameters.kl_modifier.value();
        for layer in 0..=self.deepest_layer(profile) {
            supply[layer] = (parameters.kl.value_at(layer)
                * kl_modifier
                * profile.plant_available_water(layer)
                * profile.proportion_in_root_zone(layer, self.depth))
            .max(0.0);
        }
        supply
    }

    /// Potential mineral-N extraction by layer (kg/ha).
    ///
    /// Only layers holding live root contribute. Each layer's chemical
    /// availability is scaled by soil-water status and by the fraction of
    /// the layer the front has explored, then drawn against the remaining
    /// whole-plant daily cap in layer-index order; once the cap is spent,
    /// deeper layers receive nothing even if chemically available.
    ///
    /// The rate functions are evaluated fresh on every call; nothing is
    /// cached between days.
    pub fn nitrogen_uptake_supply(
        &self,
        profile: &SoilLayerProfile,
        kno3: &ScalarFunction,
        knh4: &ScalarFunction,
        max_daily_n_uptake: FloatValue,
    ) -> NitrogenUptakeSupply {
        let num_layers = profile.num_layers();
        let mut supply = NitrogenUptakeSupply {
            no3: vec![0.0; num_layers],
            nh4: vec![0.0; num_layers],
        };
        if self.depth <= 0.0 {
            return supply;
        }

        let mut remaining = max_daily_n_uptake.max(0.0);
        for layer in 0..=self.deepest_layer(profile) {
            if self.live[layer].wt() <= 0.0 {
                continue;
            }
            let factor_root_depth = profile.proportion_in_root_zone(layer, self.depth);
            let sw_factor = profile.relative_water_content(layer);

            let no3_potential = profile.no3(layer)
                * kno3.value_at(layer)
                * profile.no3_ppm(layer)
                * sw_factor
                * factor_root_depth;
            let no3 = no3_potential.max(0.0).min(remaining);
            remaining -= no3;
            supply.no3[layer] = no3;

            let nh4_potential = profile.nh4(layer)
                * knh4.value_at(layer)
                * profile.nh4_ppm(layer)
                * sw_factor
                * factor_root_depth;
            let nh4 = nh4_potential.max(0.0).min(remaining);
            remaining -= nh4;
            supply.nh4[layer] = nh4;

            if remaining <= 0.0 {
                debug!(
                    "{}: daily N uptake cap of {} kg/ha reached at layer {}",
                    self.zone_name, max_daily_n_uptake, layer
                );
                break;
            }
        }
        supply
    }

    // ----- partitioning -----

    /// Return-on-investment weight by layer, used to steer new root mass
    /// toward layers with better uptake return per unit of root already
    /// there. Explored layers without live root get a minimum seed weight;
    /// layers beyond the front get zero.
    pub fn root_activity_values(
        &self,
        profile: &SoilLayerProfile,
        parameters: &RootParameters,
    ) -> Vec<FloatValue> {
        let mut weights = vec![0.0; profile.num_layers()];
        if self.depth <= 0.0 {
            return weights;
        }
        let water = self.water_uptake_supply(profile, parameters);
        let nitrogen = self.nitrogen_uptake_supply(
            profile,
            &parameters.kno3,
            &parameters.knh4,
            parameters.max_daily_n_uptake,
        );
        for layer in 0..=self.deepest_layer(profile) {
            let uptake_return = water[layer]
                + (nitrogen.no3[layer] + nitrogen.nh4[layer]) * KG_HA_TO_G_M2;
            let live_wt = self.live[layer].wt();
            let weight = if live_wt > 0.0 {
                divide(uptake_return, live_wt, 0.0)
            } else {
                MIN_ROOT_ACTIVITY
            };
            weights[layer] = weight.max(MIN_ROOT_ACTIVITY);
        }
        weights
    }

    // ----- senescence, detachment, removal -----

    /// Split today's senescing fraction out of every live layer.
    pub fn do_senescence(&mut self, rate: FloatValue) {
        if rate <= 0.0 {
            return;
        }
        for layer in 0..self.num_layers() {
            let senescing = self.live[layer].scaled(rate);
            self.live[layer] = self.live[layer].scaled(1.0 - rate);
            self.senescing[layer] += senescing;
        }
    }

    /// Move the remainder of today's senescing matter into the dead pools.
    ///
    /// `storage_wt_scale` and `n_scale` are the fractions of senescing
    /// storage weight / total nitrogen that were NOT claimed by reallocation.
    pub fn settle_senescence(&mut self, storage_wt_scale: FloatValue, n_scale: FloatValue) {
        for layer in 0..self.num_layers() {
            let mut pool = self.senescing[layer];
            pool.storage_wt *= storage_wt_scale;
            pool.structural_n *= n_scale;
            pool.metabolic_n *= n_scale;
            pool.storage_n *= n_scale;
            self.dead[layer] += pool;
            self.senescing[layer].clear();
        }
    }

    /// Detach a fraction of dead matter to surface residue; returns the
    /// detached total.
    pub fn detach(&mut self, rate: FloatValue) -> BiomassPool {
        let fractions = RemovalFractions {
            fraction_dead_to_residue: rate,
            ..Default::default()
        };
        let mut detached = BiomassPool::default();
        for layer in 0..self.num_layers() {
            let result = remove_biomass(&mut self.live[layer], &mut self.dead[layer], &fractions);
            detached += result.detached;
        }
        detached
    }

    /// Apply a removal event to every layer; returns the aggregated removed
    /// and detached matter.
    pub fn remove(&mut self, fractions: &RemovalFractions) -> RemovalResult {
        let mut total = RemovalResult::default();
        for layer in 0..self.num_layers() {
            let result = remove_biomass(&mut self.live[layer], &mut self.dead[layer], fractions);
            total.removed += result.removed;
            total.detached += result.detached;
        }
        total
    }
}

/// Split `amount` across layers proportionally to `weights`.
///
/// Fails with [`RcpmError::Partition`] when the weights sum to zero while a
/// positive amount needs distributing: there is no valid target, which is a
/// caller error, never retried.
pub fn partition_by_weight(
    organ: &str,
    weights: &[FloatValue],
    amount: FloatValue,
) -> RcpmResult<Vec<FloatValue>> {
    let total_weight: FloatValue = weights.iter().sum();
    if total_weight <= 0.0 {
        if amount > FLOW_TOLERANCE {
            return Err(RcpmError::Partition {
                organ: organ.to_string(),
                amount,
            });
        }
        return Ok(vec![0.0; weights.len()]);
    }
    Ok(weights
        .iter()
        .map(|w| amount * w / total_weight)
        .collect())
}
