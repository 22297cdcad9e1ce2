//! Error types for grid reductions.

use thiserror::Error;

/// Result type for grid reduction operations.
pub type Result<T> = std::result::Result<T, ReduceError>;

/// Error types that can occur while planning or executing a reduction.
#[derive(Error, Debug)]
pub enum ReduceError {
    /// The device cannot host any group size for the kernel's resource footprint.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Out of device memory.
    #[error("Out of device memory: requested {requested} bytes, {available} bytes available")]
    OutOfMemory {
        /// Bytes requested by the allocation
        requested: usize,
        /// Bytes still available on the allocator
        available: usize,
    },

    /// Invalid buffer size or element count.
    #[error("Invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size
        expected: usize,
        /// Actual buffer size
        actual: usize,
    },

    /// Buffer slot outside of the buffer.
    #[error("Index {index} out of bounds for buffer of length {len}")]
    IndexOutOfBounds {
        /// Requested slot
        index: usize,
        /// Buffer length
        len: usize,
    },

    /// Launch configuration rejected before execution.
    #[error("Invalid launch configuration: {0}")]
    InvalidLaunch(String),

    /// Kernel launch aborted during execution.
    #[error("Kernel launch failed: {0}")]
    KernelLaunchFailed(String),

    /// Worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// CubeCL runtime error.
    #[cfg(feature = "gpu")]
    #[error("CubeCL error: {0}")]
    CubeCL(String),
}
