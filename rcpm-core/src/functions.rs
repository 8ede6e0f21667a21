//! Configured per-day scalar functions
//!
//! Rate and coefficient values (root front velocity, extraction constants,
//! conversion efficiency, ...) are supplied by the model configuration and
//! evaluated once per day, optionally indexed by soil layer. The evaluator is
//! deliberately opaque to the organs: they only ever ask for today's value.
//!
//! The serde representation is untagged so a TOML configuration can write a
//! bare number for a uniform value or an array for a per-layer one:
//!
//! ```toml
//! kl = 0.06
//! xf = [1.0, 1.0, 0.8, 0.4]
//! ```

use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// A configured scalar value, uniform or resolved by soil layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarFunction {
    Constant(FloatValue),
    PerLayer(Vec<FloatValue>),
}

impl ScalarFunction {
    /// Today's value, aggregated to a single scalar.
    ///
    /// Per-layer functions are averaged; use [`value_at`](Self::value_at)
    /// when the layer is known.
    pub fn value(&self) -> FloatValue {
        match self {
            ScalarFunction::Constant(v) => *v,
            ScalarFunction::PerLayer(values) => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<FloatValue>() / values.len() as FloatValue
                }
            }
        }
    }

    /// Today's value for the given soil layer.
    ///
    /// A per-layer function shorter than the profile extends its last value
    /// downwards; an empty one evaluates to zero.
    pub fn value_at(&self, layer: usize) -> FloatValue {
        match self {
            ScalarFunction::Constant(v) => *v,
            ScalarFunction::PerLayer(values) => values
                .get(layer)
                .or_else(|| values.last())
                .copied()
                .unwrap_or(0.0),
        }
    }
}

/// Evaluate an optional function; an absent function means the flow it
/// controls is disabled and contributes exactly 0.0.
pub fn optional_value(function: Option<&ScalarFunction>) -> FloatValue {
    function.map(ScalarFunction::value).unwrap_or(0.0)
}

/// Layer-resolved variant of [`optional_value`].
pub fn optional_value_at(function: Option<&ScalarFunction>, layer: usize) -> FloatValue {
    function.map(|f| f.value_at(layer)).unwrap_or(0.0)
}
