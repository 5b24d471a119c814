//! Verification of mirrored-repeat sampling kernels
//!
//! This crate runs a mirrored-repeat sampling kernel on a compute backend and
//! checks its output, element by element, against the host reference
//! evaluator from `mirror-sampler`.

pub mod compare;
pub mod harness;
pub mod report;
pub mod wgpu_backend;
mod wgpu_helpers;
