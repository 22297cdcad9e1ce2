//! Host runtime for executing group kernels.
//!
//! The runtime bundles a device, its allocator, the occupancy advisor used
//! for launch planning and the command stream kernels are launched on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::allocator::GpuAllocator;
use crate::config::{ExecutionStrategy, RuntimeConfig};
use crate::device::{DeviceProperties, GpuDevice};
use crate::error::{ReduceError, Result};
use crate::grid::{Group, GroupKernel};
use crate::launch::LaunchConfig;
use crate::occupancy::{HardwareOccupancy, OccupancyAdvisor};

/// Sequential command stream.
///
/// [`Stream::launch`] returns only after every group of the launch has
/// finished, so anything launched afterwards observes all of its writes.
pub struct Stream {
    properties: DeviceProperties,
    strategy: ExecutionStrategy,
    pool: Option<rayon::ThreadPool>,
    launches: AtomicU64,
}

impl Stream {
    fn new(
        properties: DeviceProperties,
        strategy: ExecutionStrategy,
        pool: Option<rayon::ThreadPool>,
    ) -> Self {
        Self {
            properties,
            strategy,
            pool,
            launches: AtomicU64::new(0),
        }
    }

    /// Scheduling strategy of this stream.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Number of launches that ran to completion.
    pub fn launches_completed(&self) -> u64 {
        self.launches.load(Ordering::Acquire)
    }

    /// Launch `kernel` over `config.num_groups` groups and wait for it.
    ///
    /// Returns each group's output, indexed by group position.
    ///
    /// # Errors
    ///
    /// - [`ReduceError::InvalidLaunch`] if the configuration exceeds the
    ///   device limits; nothing runs in that case.
    /// - [`ReduceError::KernelLaunchFailed`] if a group aborts.
    pub fn launch<K: GroupKernel>(
        &self,
        kernel: &K,
        config: LaunchConfig,
    ) -> Result<Vec<K::Output>> {
        self.validate(kernel, &config)?;

        let run_group = |pos: usize| {
            let mut group = Group::new(pos, config);
            kernel.run(&mut group)
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match self.strategy {
            ExecutionStrategy::Serial => (0..config.num_groups).map(run_group).collect::<Vec<_>>(),
            ExecutionStrategy::Parallel => self.install(|| {
                (0..config.num_groups)
                    .into_par_iter()
                    .map(run_group)
                    .collect::<Vec<_>>()
            }),
        }));

        match outcome {
            Ok(outputs) => {
                let completed = self.launches.fetch_add(1, Ordering::AcqRel) + 1;
                log::trace!(
                    "launch #{} done: {} groups x {} units",
                    completed,
                    config.num_groups,
                    config.group_size
                );
                Ok(outputs)
            }
            Err(payload) => Err(ReduceError::KernelLaunchFailed(format!(
                "group aborted: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    fn validate<K: GroupKernel>(&self, kernel: &K, config: &LaunchConfig) -> Result<()> {
        let props = &self.properties;
        if config.group_size == 0 || config.group_size > props.max_units_per_group {
            return Err(ReduceError::InvalidLaunch(format!(
                "group size {} outside 1..={}",
                config.group_size, props.max_units_per_group
            )));
        }
        if config.num_groups == 0 || config.num_groups > props.max_group_count {
            return Err(ReduceError::InvalidLaunch(format!(
                "group count {} outside 1..={}",
                config.num_groups, props.max_group_count
            )));
        }
        let shared = kernel.shared_bytes_per_unit() * config.group_size;
        if shared > props.shared_memory_per_group {
            return Err(ReduceError::InvalidLaunch(format!(
                "{} bytes of shared memory per group, device allows {}",
                shared, props.shared_memory_per_group
            )));
        }
        Ok(())
    }

    fn install<OP, T>(&self, op: OP) -> T
    where
        OP: FnOnce() -> T + Send,
        T: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

/// Runtime context for reductions on the host grid.
pub struct RuntimeContext {
    device: GpuDevice,
    allocator: GpuAllocator,
    advisor: Arc<dyn OccupancyAdvisor>,
    stream: Stream,
}

impl RuntimeContext {
    /// Create a runtime from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dedicated worker pool cannot be built.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let properties = config
            .properties()
            .cloned()
            .unwrap_or_else(DeviceProperties::host);
        let device = GpuDevice::with_properties(config.device_id(), properties.clone());

        let allocator = match config.memory_capacity() {
            Some(bytes) => GpuAllocator::with_capacity(&device, bytes),
            None => GpuAllocator::new(&device),
        };

        let pool = match config.worker_threads() {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("grid-worker-{}", i))
                    .build()?,
            ),
            None => None,
        };

        log::info!(
            "runtime on {}: {} multiprocessors, {:?} scheduling, {} bytes of memory",
            device.name(),
            properties.multiprocessor_count,
            config.strategy(),
            allocator.capacity()
        );

        Ok(Self {
            advisor: Arc::new(HardwareOccupancy::new(properties.clone())),
            stream: Stream::new(properties, config.strategy(), pool),
            device,
            allocator,
        })
    }

    /// Create a runtime with the default host configuration.
    pub fn host() -> Result<Self> {
        Self::new(RuntimeConfig::default())
    }

    /// Replace the occupancy advisor used for launch planning.
    pub fn with_advisor(mut self, advisor: Arc<dyn OccupancyAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    /// Get the backend name.
    pub fn backend_name(&self) -> &'static str {
        "host"
    }

    /// Get the device.
    pub fn device(&self) -> &GpuDevice {
        &self.device
    }

    /// Get the allocator.
    pub fn allocator(&self) -> &GpuAllocator {
        &self.allocator
    }

    /// Get the occupancy advisor.
    pub fn advisor(&self) -> &dyn OccupancyAdvisor {
        self.advisor.as_ref()
    }

    /// Get the command stream.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
