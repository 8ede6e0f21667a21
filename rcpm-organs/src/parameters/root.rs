//! Root Organ Parameters
//!
//! Parameters for the root organ: growth-front advance, per-layer water and
//! mineral-nitrogen extraction, dry-matter and nitrogen demand targets, and
//! the remobilisation flows.

use rcpm_core::errors::{RcpmError, RcpmResult};
use rcpm_core::functions::ScalarFunction;
use rcpm_core::FloatValue;
use serde::{Deserialize, Serialize};

/// Parameters for the root organ.
///
/// Rate and coefficient values are [`ScalarFunction`]s evaluated once per
/// day, optionally per soil layer. Remobilisation factors are optional; an
/// absent factor disables the corresponding flow entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootParameters {
    /// Maximum rooting depth
    /// unit: mm
    /// default: 1000.0
    pub maximum_root_depth: FloatValue,

    /// Root front velocity, the daily advance of the deepest root extent
    /// unit: mm/day
    /// default: 20.0
    pub root_front_velocity: ScalarFunction,

    /// Root exploration factor by layer (0 blocks the front, 1 is
    /// unimpeded); multiplies the front velocity in the layer the front
    /// currently occupies
    /// unit: dimensionless
    /// default: 1.0
    pub xf: ScalarFunction,

    /// Water extraction rate constant by layer (fraction of plant-available
    /// water extractable per day)
    /// unit: /day
    /// default: 0.06
    pub kl: ScalarFunction,

    /// Daily modifier on KL (e.g. for water-logging stress)
    /// unit: dimensionless
    /// default: 1.0
    pub kl_modifier: ScalarFunction,

    /// Nitrate uptake rate coefficient by layer
    /// unit: /day/ppm
    /// default: 0.02
    pub kno3: ScalarFunction,

    /// Ammonium uptake rate coefficient by layer
    /// unit: /day/ppm
    /// default: 0.01
    pub knh4: ScalarFunction,

    /// Whole-plant transporter-capacity ceiling on daily mineral N uptake
    /// per zone; once reached, deeper layers receive nothing even if
    /// chemically available
    /// unit: kg/ha/day
    /// default: 6.0
    pub max_daily_n_uptake: FloatValue,

    /// Minimum (structural) nitrogen concentration of new root tissue
    /// unit: g N / g DM
    /// default: 0.01
    pub minimum_n_conc: FloatValue,

    /// Maximum nitrogen concentration root tissue can be topped up to
    /// unit: g N / g DM
    /// default: 0.02
    pub maximum_n_conc: FloatValue,

    /// Nitrogen demand switch (0 disables N demand, 1 enables it); usually
    /// a phenology-driven gate
    /// unit: dimensionless
    /// default: 1.0
    pub nitrogen_demand_switch: ScalarFunction,

    /// Daily dry-matter demand of the organ
    /// unit: g/m²/day
    /// default: 0.5
    pub dm_demand_function: ScalarFunction,

    /// Fraction of new tissue that is structural; the remainder defines the
    /// storage capacity of the theoretical-maximum construction
    /// unit: g/g
    /// default: 0.85
    pub structural_fraction: FloatValue,

    /// Efficiency of converting allocated dry matter into tissue; the
    /// shortfall is released as growth respiration
    /// unit: g/g
    /// default: 0.7
    pub dm_conversion_efficiency: FloatValue,

    /// Carbon concentration of root tissue
    /// unit: g C / g DM
    /// default: 0.4
    pub carbon_concentration: FloatValue,

    /// Fraction of live storage dry matter available for retranslocation
    /// each day; absent means the flow is disabled
    /// unit: /day
    /// default: disabled
    pub dm_retranslocation_factor: Option<ScalarFunction>,

    /// Fraction of senescing storage dry matter available for reallocation
    /// each day; absent means the flow is disabled
    /// unit: /day
    /// default: disabled
    pub dm_reallocation_factor: Option<ScalarFunction>,

    /// Fraction of live storage nitrogen available for retranslocation each
    /// day; absent means the flow is disabled
    /// unit: /day
    /// default: disabled
    pub n_retranslocation_factor: Option<ScalarFunction>,

    /// Fraction of senescing nitrogen available for reallocation each day;
    /// absent means the flow is disabled
    /// unit: /day
    /// default: disabled
    pub n_reallocation_factor: Option<ScalarFunction>,

    /// Fraction of live root matter senescing each day
    /// unit: /day
    /// default: 0.005
    pub senescence_rate: ScalarFunction,

    /// Fraction of dead root matter detaching to soil residue each day
    /// unit: /day
    /// default: 0.0
    pub detachment_rate: ScalarFunction,

    /// Seed biomass placed at sowing depth in the home zone
    /// unit: g/m²
    /// default: 0.1
    pub initial_dm: FloatValue,

    /// Nitrogen concentration of the seed biomass
    /// unit: g N / g DM
    /// default: 0.01
    pub initial_n_conc: FloatValue,

    /// Additional zones to grow roots into (the home zone is implicit);
    /// parallel with `zone_root_depths` and `zone_initial_dm`
    /// default: none
    pub zone_names_to_grow_roots_in: Vec<String>,

    /// Initial root depth in each additional zone
    /// unit: mm
    pub zone_root_depths: Vec<FloatValue>,

    /// Initial root biomass in each additional zone
    /// unit: g/m²
    pub zone_initial_dm: Vec<FloatValue>,
}

impl Default for RootParameters {
    fn default() -> Self {
        Self {
            maximum_root_depth: 1000.0,
            root_front_velocity: ScalarFunction::Constant(20.0),
            xf: ScalarFunction::Constant(1.0),
            kl: ScalarFunction::Constant(0.06),
            kl_modifier: ScalarFunction::Constant(1.0),
            kno3: ScalarFunction::Constant(0.02),
            knh4: ScalarFunction::Constant(0.01),
            max_daily_n_uptake: 6.0,
            minimum_n_conc: 0.01,
            maximum_n_conc: 0.02,
            nitrogen_demand_switch: ScalarFunction::Constant(1.0),
            dm_demand_function: ScalarFunction::Constant(0.5),
            structural_fraction: 0.85,
            dm_conversion_efficiency: 0.7,
            carbon_concentration: 0.4,
            dm_retranslocation_factor: None,
            dm_reallocation_factor: None,
            n_retranslocation_factor: None,
            n_reallocation_factor: None,
            senescence_rate: ScalarFunction::Constant(0.005),
            detachment_rate: ScalarFunction::Constant(0.0),
            initial_dm: 0.1,
            initial_n_conc: 0.01,
            zone_names_to_grow_roots_in: Vec::new(),
            zone_root_depths: Vec::new(),
            zone_initial_dm: Vec::new(),
        }
    }
}

impl RootParameters {
    /// Load parameters from a TOML string; unspecified fields keep their
    /// defaults.
    pub fn from_toml_str(source: &str) -> RcpmResult<Self> {
        toml::from_str(source)
            .map_err(|e| RcpmError::Configuration(format!("invalid root parameters: {e}")))
    }

    /// CO₂ released per gram of dry matter allocated, from the conversion
    /// shortfall: `(1/efficiency × 12/30 − carbonConc) × 44/12`.
    pub fn growth_respiration_factor(&self) -> FloatValue {
        (1.0 / self.dm_conversion_efficiency * 12.0 / 30.0 - self.carbon_concentration) * 44.0
            / 12.0
    }

    /// Check the parallel multi-zone lists agree in length.
    pub fn validate_zone_lists(&self) -> RcpmResult<()> {
        let names = self.zone_names_to_grow_roots_in.len();
        if self.zone_root_depths.len() != names || self.zone_initial_dm.len() != names {
            return Err(RcpmError::Configuration(format!(
                "multi-zone root configuration is inconsistent: {} zone names, {} depths, {} initial masses",
                names,
                self.zone_root_depths.len(),
                self.zone_initial_dm.len()
            )));
        }
        Ok(())
    }
}
