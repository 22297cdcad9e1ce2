//! Device descriptions and hardware limits.

use std::num::NonZeroUsize;

/// Hardware limits of a compute device.
///
/// These are the quantities the occupancy advisor needs to decide how many
/// units fit in a group and how many groups can be resident at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Architecture name (e.g. "sm_80", "host").
    pub name: String,
    /// Max units (threads) in a single group.
    pub max_units_per_group: usize,
    /// Max units resident on one multiprocessor.
    pub max_units_per_multiprocessor: usize,
    /// Max groups resident on one multiprocessor.
    pub max_groups_per_multiprocessor: usize,
    /// Units scheduled together; group sizes are multiples of this.
    pub warp_size: usize,
    /// Registers available on one multiprocessor.
    pub registers_per_multiprocessor: usize,
    /// Registers are allocated per warp in chunks of this size.
    pub register_alloc_granularity: usize,
    /// Shared memory available on one multiprocessor (bytes).
    pub shared_memory_per_multiprocessor: usize,
    /// Shared memory a single group may use (bytes).
    pub shared_memory_per_group: usize,
    /// Shared memory is allocated per group in chunks of this size (bytes).
    pub shared_memory_alloc_granularity: usize,
    /// Number of multiprocessors on the device.
    pub multiprocessor_count: usize,
    /// Max groups in one launch.
    pub max_group_count: usize,
    /// Global memory (bytes).
    pub global_memory_bytes: usize,
}

impl DeviceProperties {
    /// NVIDIA Ampere (SM 8.0), A100.
    pub fn ampere() -> Self {
        Self {
            name: "sm_80".into(),
            max_units_per_group: 1024,
            max_units_per_multiprocessor: 2048,
            max_groups_per_multiprocessor: 32,
            warp_size: 32,
            registers_per_multiprocessor: 65536,
            register_alloc_granularity: 256,
            shared_memory_per_multiprocessor: 164 * 1024,
            shared_memory_per_group: 48 * 1024,
            shared_memory_alloc_granularity: 128,
            multiprocessor_count: 108,
            max_group_count: 65535,
            global_memory_bytes: 40 << 30,
        }
    }

    /// NVIDIA Ada Lovelace (SM 8.9), RTX 4090.
    pub fn ada_lovelace() -> Self {
        Self {
            name: "sm_89".into(),
            max_units_per_group: 1024,
            max_units_per_multiprocessor: 1536,
            max_groups_per_multiprocessor: 24,
            warp_size: 32,
            registers_per_multiprocessor: 65536,
            register_alloc_granularity: 256,
            shared_memory_per_multiprocessor: 100 * 1024,
            shared_memory_per_group: 48 * 1024,
            shared_memory_alloc_granularity: 256,
            multiprocessor_count: 128,
            max_group_count: 65535,
            global_memory_bytes: 24 << 30,
        }
    }

    /// Conservative limits for WebGPU-class devices.
    pub fn generic() -> Self {
        Self {
            name: "generic".into(),
            max_units_per_group: 256,
            max_units_per_multiprocessor: 1024,
            max_groups_per_multiprocessor: 16,
            warp_size: 32,
            registers_per_multiprocessor: 32768,
            register_alloc_granularity: 256,
            shared_memory_per_multiprocessor: 48 * 1024,
            shared_memory_per_group: 16 * 1024,
            shared_memory_alloc_granularity: 256,
            multiprocessor_count: 8,
            max_group_count: 65535,
            global_memory_bytes: 1 << 30,
        }
    }

    /// Limits for the host grid, one multiprocessor per available core.
    pub fn host() -> Self {
        let cores = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            name: "host".into(),
            max_units_per_group: 256,
            max_units_per_multiprocessor: 1024,
            max_groups_per_multiprocessor: 4,
            warp_size: 32,
            registers_per_multiprocessor: 65536,
            register_alloc_granularity: 256,
            shared_memory_per_multiprocessor: 256 * 1024,
            shared_memory_per_group: 64 * 1024,
            shared_memory_alloc_granularity: 64,
            multiprocessor_count: cores,
            max_group_count: 1 << 16,
            global_memory_bytes: 4 << 30,
        }
    }
}

/// Compute device handle.
///
/// Identifies one device and carries the hardware limits used for launch
/// planning.
#[derive(Debug, Clone)]
pub struct GpuDevice {
    device_id: usize,
    name: String,
    properties: DeviceProperties,
}

impl GpuDevice {
    /// Create a handle for the host grid with the specified device ID.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use grid_reduce::GpuDevice;
    ///
    /// let device = GpuDevice::new(0);
    /// assert_eq!(device.device_id(), 0);
    /// ```
    pub fn new(device_id: usize) -> Self {
        Self::with_properties(device_id, DeviceProperties::host())
    }

    /// Create a device handle with explicit hardware limits.
    pub fn with_properties(device_id: usize, properties: DeviceProperties) -> Self {
        Self {
            device_id,
            name: format!("{} device {}", properties.name, device_id),
            properties,
        }
    }

    /// Get the device ID.
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the hardware limits.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }
}
