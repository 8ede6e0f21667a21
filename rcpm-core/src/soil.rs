//! Read-only views into the external soil state
//!
//! The soil water and nitrogen balances are owned by external collaborators;
//! organs only ever read per-layer state through [`SoilLayerProfile`]. Layer
//! count is fixed for the lifetime of a simulation and index 0 is the surface
//! layer.
//!
//! # Units
//!
//! Depths and water amounts are mm, bulk density g/cm³. Mineral nitrogen
//! crosses the soil boundary in kg/ha (the convention of the soil models this
//! core consumes from) and is converted with [`KG_HA_TO_G_M2`] when it enters
//! g/m² biomass pools.

use crate::errors::{RcpmError, RcpmResult};
use crate::maths::{bound, divide};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Conversion from kg/ha (soil convention) to g/m² (biomass convention).
pub const KG_HA_TO_G_M2: FloatValue = 0.1;

/// A layered soil profile, read-only to the plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayerProfile {
    /// Layer thickness (mm)
    thickness: Vec<FloatValue>,
    /// Volumetric water content (mm)
    water: Vec<FloatValue>,
    /// Lower limit of plant-extractable water (mm)
    ll15: Vec<FloatValue>,
    /// Drained upper limit (mm)
    dul: Vec<FloatValue>,
    /// Bulk density (g/cm³)
    bd: Vec<FloatValue>,
    /// Nitrate nitrogen (kg/ha)
    no3: Vec<FloatValue>,
    /// Ammonium nitrogen (kg/ha)
    nh4: Vec<FloatValue>,
}

impl SoilLayerProfile {
    /// Build a profile view, validating that every array covers the same
    /// layers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        thickness: Vec<FloatValue>,
        water: Vec<FloatValue>,
        ll15: Vec<FloatValue>,
        dul: Vec<FloatValue>,
        bd: Vec<FloatValue>,
        no3: Vec<FloatValue>,
        nh4: Vec<FloatValue>,
    ) -> RcpmResult<Self> {
        let n = thickness.len();
        if n == 0 {
            return Err(RcpmError::Configuration(
                "soil profile must have at least one layer".to_string(),
            ));
        }
        for (name, values) in [
            ("water", &water),
            ("ll15", &ll15),
            ("dul", &dul),
            ("bd", &bd),
            ("no3", &no3),
            ("nh4", &nh4),
        ] {
            if values.len() != n {
                return Err(RcpmError::Configuration(format!(
                    "soil profile array '{}' has {} layers, expected {}",
                    name,
                    values.len(),
                    n
                )));
            }
        }
        Ok(Self {
            thickness,
            water,
            ll15,
            dul,
            bd,
            no3,
            nh4,
        })
    }

    pub fn num_layers(&self) -> usize {
        self.thickness.len()
    }

    pub fn thickness(&self, layer: usize) -> FloatValue {
        self.thickness[layer]
    }

    pub fn water(&self, layer: usize) -> FloatValue {
        self.water[layer]
    }

    pub fn ll15(&self, layer: usize) -> FloatValue {
        self.ll15[layer]
    }

    pub fn dul(&self, layer: usize) -> FloatValue {
        self.dul[layer]
    }

    pub fn bd(&self, layer: usize) -> FloatValue {
        self.bd[layer]
    }

    pub fn no3(&self, layer: usize) -> FloatValue {
        self.no3[layer]
    }

    pub fn nh4(&self, layer: usize) -> FloatValue {
        self.nh4[layer]
    }

    /// Depth of the bottom of the profile (mm).
    pub fn bottom_depth(&self) -> FloatValue {
        self.thickness.iter().sum()
    }

    /// Cumulative depth to the bottom of `layer` (mm).
    pub fn depth_to_bottom_of(&self, layer: usize) -> FloatValue {
        self.thickness[..=layer].iter().sum()
    }

    /// Cumulative depth to the top of `layer` (mm).
    pub fn depth_to_top_of(&self, layer: usize) -> FloatValue {
        self.thickness[..layer].iter().sum()
    }

    /// Index of the layer containing `depth`.
    ///
    /// Depths at or below the bottom of the profile resolve to the deepest
    /// layer; a layer boundary belongs to the layer above it.
    pub fn layer_index_of(&self, depth: FloatValue) -> usize {
        let mut bottom = 0.0;
        for (index, thickness) in self.thickness.iter().enumerate() {
            bottom += thickness;
            if depth <= bottom {
                return index;
            }
        }
        self.num_layers() - 1
    }

    /// Fraction of `layer` lying above `depth`, in [0, 1].
    pub fn proportion_through_layer(&self, layer: usize, depth: FloatValue) -> FloatValue {
        let top = self.depth_to_top_of(layer);
        bound(
            divide(depth - top, self.thickness[layer], 0.0),
            0.0,
            1.0,
        )
    }

    /// Fraction of `layer` within the root zone, in [0, 1].
    ///
    /// `1 - (depthToBottom - rootDepth) / thickness`, clamped: 1 for layers
    /// fully explored, 0 for layers entirely below the root front.
    pub fn proportion_in_root_zone(&self, layer: usize, root_depth: FloatValue) -> FloatValue {
        let bottom = self.depth_to_bottom_of(layer);
        bound(
            1.0 - divide(bottom - root_depth, self.thickness[layer], 0.0),
            0.0,
            1.0,
        )
    }

    /// Relative water content of `layer`: `(water - LL15) / (DUL - LL15)`,
    /// clamped to [0, 1].
    pub fn relative_water_content(&self, layer: usize) -> FloatValue {
        bound(
            divide(
                self.water[layer] - self.ll15[layer],
                self.dul[layer] - self.ll15[layer],
                0.0,
            ),
            0.0,
            1.0,
        )
    }

    /// Water held above the lower limit in `layer` (mm), never negative.
    pub fn plant_available_water(&self, layer: usize) -> FloatValue {
        (self.water[layer] - self.ll15[layer]).max(0.0)
    }

    /// Nitrate concentration of `layer` in ppm.
    pub fn no3_ppm(&self, layer: usize) -> FloatValue {
        self.mineral_n_ppm(self.no3[layer], layer)
    }

    /// Ammonium concentration of `layer` in ppm.
    pub fn nh4_ppm(&self, layer: usize) -> FloatValue {
        self.mineral_n_ppm(self.nh4[layer], layer)
    }

    // ppm = kg/ha * 100 / (bd [g/cm3] * thickness [mm])
    fn mineral_n_ppm(&self, kg_ha: FloatValue, layer: usize) -> FloatValue {
        divide(kg_ha * 100.0, self.bd[layer] * self.thickness[layer], 0.0)
    }
}

/// A named spatial zone a plant may grow roots into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilZone {
    pub name: String,
    pub profile: SoilLayerProfile,
}

impl SoilZone {
    pub fn new(name: impl Into<String>, profile: SoilLayerProfile) -> Self {
        Self {
            name: name.into(),
            profile,
        }
    }
}

/// Look up a zone by name.
pub fn find_zone<'a>(zones: &'a [SoilZone], name: &str) -> RcpmResult<&'a SoilZone> {
    zones
        .iter()
        .find(|zone| zone.name == name)
        .ok_or_else(|| RcpmError::Configuration(format!("soil zone '{}' not found", name)))
}
