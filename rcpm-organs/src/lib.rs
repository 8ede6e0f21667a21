//! Organ implementations for RCPM
//!
//! This crate provides concrete plant organs implementing the arbitration
//! protocol defined in `rcpm-core`: the Root organ with its spatial
//! zone/layer uptake model, and a Generic above-ground organ reusing the
//! same demand/supply/allocation pattern.
//!
//! # Module Organisation
//!
//! - `root`: the root organ, its per-zone state and the per-layer water and
//!   nitrogen uptake model
//! - `generic`: a single-compartment organ (stem-like) exercising the same
//!   protocol without spatial state
//!
//! # Parameters
//!
//! Each organ has an associated parameters struct in the `parameters` module
//! with sensible defaults and TOML loading.

pub mod generic;
pub mod parameters;
pub mod root;
