//! Generic Organ Parameters
//!
//! Parameters for a single-compartment above-ground organ (stem-like). The
//! demand, supply and remobilisation settings mirror the root's but without
//! any spatial (zone/layer) configuration.

use rcpm_core::errors::{RcpmError, RcpmResult};
use rcpm_core::functions::ScalarFunction;
use rcpm_core::FloatValue;
use serde::{Deserialize, Serialize};

/// Parameters for a generic organ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericOrganParameters {
    /// Daily dry-matter demand of the organ
    /// unit: g/m²/day
    /// default: 1.0
    pub dm_demand_function: ScalarFunction,

    /// Fraction of new tissue that is structural
    /// unit: g/g
    /// default: 0.75
    pub structural_fraction: FloatValue,

    /// Efficiency of converting allocated dry matter into tissue
    /// unit: g/g
    /// default: 0.7
    pub dm_conversion_efficiency: FloatValue,

    /// Carbon concentration of the tissue
    /// unit: g C / g DM
    /// default: 0.4
    pub carbon_concentration: FloatValue,

    /// Minimum (structural) nitrogen concentration of new tissue
    /// unit: g N / g DM
    /// default: 0.01
    pub minimum_n_conc: FloatValue,

    /// Maximum nitrogen concentration tissue can be topped up to
    /// unit: g N / g DM
    /// default: 0.03
    pub maximum_n_conc: FloatValue,

    /// Nitrogen demand switch (0 disables N demand, 1 enables it)
    /// unit: dimensionless
    /// default: 1.0
    pub nitrogen_demand_switch: ScalarFunction,

    /// Fraction of live storage dry matter available for retranslocation
    /// each day; absent disables the flow
    /// unit: /day
    /// default: disabled
    pub dm_retranslocation_factor: Option<ScalarFunction>,

    /// Fraction of senescing storage dry matter available for reallocation
    /// each day; absent disables the flow
    /// unit: /day
    /// default: disabled
    pub dm_reallocation_factor: Option<ScalarFunction>,

    /// Fraction of live storage nitrogen available for retranslocation each
    /// day; absent disables the flow
    /// unit: /day
    /// default: disabled
    pub n_retranslocation_factor: Option<ScalarFunction>,

    /// Fraction of senescing nitrogen available for reallocation each day;
    /// absent disables the flow
    /// unit: /day
    /// default: disabled
    pub n_reallocation_factor: Option<ScalarFunction>,

    /// Fraction of live matter senescing each day
    /// unit: /day
    /// default: 0.01
    pub senescence_rate: ScalarFunction,

    /// Fraction of dead matter detaching to surface residue each day
    /// unit: /day
    /// default: 0.0
    pub detachment_rate: ScalarFunction,

    /// Biomass present when the organ starts growing
    /// unit: g/m²
    /// default: 0.05
    pub initial_wt: FloatValue,

    /// Nitrogen concentration of the initial biomass
    /// unit: g N / g DM
    /// default: 0.01
    pub initial_n_conc: FloatValue,
}

impl Default for GenericOrganParameters {
    fn default() -> Self {
        Self {
            dm_demand_function: ScalarFunction::Constant(1.0),
            structural_fraction: 0.75,
            dm_conversion_efficiency: 0.7,
            carbon_concentration: 0.4,
            minimum_n_conc: 0.01,
            maximum_n_conc: 0.03,
            nitrogen_demand_switch: ScalarFunction::Constant(1.0),
            dm_retranslocation_factor: None,
            dm_reallocation_factor: None,
            n_retranslocation_factor: None,
            n_reallocation_factor: None,
            senescence_rate: ScalarFunction::Constant(0.01),
            detachment_rate: ScalarFunction::Constant(0.0),
            initial_wt: 0.05,
            initial_n_conc: 0.01,
        }
    }
}

impl GenericOrganParameters {
    /// Load parameters from a TOML string; unspecified fields keep their
    /// defaults.
    pub fn from_toml_str(source: &str) -> RcpmResult<Self> {
        toml::from_str(source)
            .map_err(|e| RcpmError::Configuration(format!("invalid organ parameters: {e}")))
    }

    /// CO₂ released per gram of dry matter allocated.
    pub fn growth_respiration_factor(&self) -> FloatValue {
        (1.0 / self.dm_conversion_efficiency * 12.0 / 30.0 - self.carbon_concentration) * 44.0
            / 12.0
    }
}
