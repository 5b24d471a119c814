//! Host-side model of mirrored-repeat texture addressing
//!
//! This crate provides the scalar image type shared by every backend, the
//! reference evaluator that computes what a mirrored-repeat sampling kernel
//! must produce, and the capability trait through which a compute backend is
//! asked to run the same mapping.

pub mod address;
pub mod backend;
pub mod image;
pub mod reference;

pub use address::{mirrored_repeat_index, mirrored_source_coords};
pub use backend::{ComputeBackend, CpuBackend};
pub use image::{ImageError, Offset, ScalarImage};
pub use reference::reference_mirrored_repeat;
