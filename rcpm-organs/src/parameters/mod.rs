//! Organ parameter structs
//!
//! Each organ has an associated parameters struct with per-field units and
//! defaults, serde support and TOML loading. Values that the model evaluates
//! once per day are [`ScalarFunction`](rcpm_core::functions::ScalarFunction)s
//! so a configuration can supply either a uniform number or a per-layer
//! array.

mod generic;
mod root;

pub use generic::GenericOrganParameters;
pub use root::RootParameters;
