//! CubeCL backend.
//!
//! Runs the same two-pass reduction on a real device: pass 1 writes one
//! partial per cube after a seed slot, pass 2 folds seed and partials with a
//! single cube. Launch shapes come from [`LaunchPlanner`](crate::LaunchPlanner).

pub mod kernels;
pub mod memory;
pub mod ops;
pub mod runtime;

pub use memory::{allocate, to_cpu, to_device};
pub use ops::{max_execute, min_execute, sum_execute};
pub use runtime::{CubeclContext, CubeclRuntime, GpuBuffer};

#[cfg(feature = "cuda")]
pub use runtime::init_cuda_runtime;

#[cfg(feature = "wgpu")]
pub use runtime::init_wgpu_runtime;
