//! Two-pass parallel reduction on a grid of cooperating groups.
//!
//! A reduction of `n` elements runs as two kernel launches on a command
//! stream:
//!
//! 1. A partial-sum pass where each group folds a grid-strided share of the
//!    input and tree-reduces it in shared memory into one partial
//! 2. A combine pass where a single group folds the seed and all partials
//!
//! Group size and group count come from an occupancy advisor that models the
//! device's warp, register and shared-memory limits.
//!
//! # Feature Flags
//!
//! - `gpu`: CubeCL backend in [`gpu`]
//! - `cuda`: CUDA runtime for the CubeCL backend
//! - `wgpu`: WGPU runtime (Vulkan/Metal/DirectX12) for the CubeCL backend
//!
//! # Examples
//!
//! ```rust
//! use grid_reduce::{reduce, RuntimeContext};
//!
//! let runtime = RuntimeContext::host()?;
//! let data: Vec<u32> = (1..=1000).collect();
//! let total = reduce(&data, data.len(), 0u64, |a, b| a + b, &runtime)?;
//! assert_eq!(total, 500_500);
//! # Ok::<(), grid_reduce::ReduceError>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod config;
pub mod device;
pub mod error;
pub mod grid;
pub mod kernels;
pub mod launch;
pub mod memory;
pub mod occupancy;
pub mod ops;
pub mod runtime;
pub mod sequence;

#[cfg(feature = "gpu")]
pub mod gpu;

// Re-exports
pub use allocator::GpuAllocator;
pub use config::{ExecutionStrategy, RuntimeConfig};
pub use device::{DeviceProperties, GpuDevice};
pub use error::{ReduceError, Result};
pub use grid::{Group, GroupKernel, SharedMemory};
pub use kernels::{reduce_shared, ReduceNKernel};
pub use launch::{LaunchConfig, LaunchPlanner};
pub use memory::{to_cpu, to_device, DeviceBuffer};
pub use occupancy::{
    FixedOccupancy, HardwareOccupancy, KernelFootprint, OccupancyAdvisor, OccupancyLimits,
};
pub use ops::*;
pub use runtime::{RuntimeContext, Stream};
pub use sequence::{Indexed, InputSequence, Mapped};
