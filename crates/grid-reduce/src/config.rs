//! Runtime configuration.

use crate::device::DeviceProperties;

/// How the groups of a launch are scheduled on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Groups run one after another on the calling thread.
    Serial,
    /// Groups run concurrently on the worker pool.
    #[default]
    Parallel,
}

/// Settings for a [`RuntimeContext`](crate::runtime::RuntimeContext).
///
/// # Examples
///
/// ```rust
/// use grid_reduce::{ExecutionStrategy, RuntimeConfig, RuntimeContext};
///
/// let config = RuntimeConfig::builder()
///     .with_worker_threads(2)
///     .with_memory_capacity(1 << 20)
///     .with_strategy(ExecutionStrategy::Parallel);
/// let runtime = RuntimeContext::new(config).unwrap();
/// assert_eq!(runtime.allocator().capacity(), 1 << 20);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    device_id: usize,
    properties: Option<DeviceProperties>,
    worker_threads: Option<usize>,
    memory_capacity: Option<usize>,
    strategy: ExecutionStrategy,
}

impl RuntimeConfig {
    /// Start from the defaults: device 0, host limits, global rayon pool.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Select the device ID.
    pub fn with_device_id(mut self, device_id: usize) -> Self {
        self.device_id = device_id;
        self
    }

    /// Plan launches against these hardware limits instead of the host's.
    pub fn with_properties(mut self, properties: DeviceProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Run groups on a dedicated pool of `threads` workers.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Cap device memory at `bytes`.
    pub fn with_memory_capacity(mut self, bytes: usize) -> Self {
        self.memory_capacity = Some(bytes);
        self
    }

    /// Choose how groups are scheduled.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Configured device ID.
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    /// Configured hardware limits, if overridden.
    pub fn properties(&self) -> Option<&DeviceProperties> {
        self.properties.as_ref()
    }

    /// Configured worker count, if a dedicated pool is requested.
    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    /// Configured memory cap, if any.
    pub fn memory_capacity(&self) -> Option<usize> {
        self.memory_capacity
    }

    /// Configured scheduling strategy.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.device_id(), 0);
        assert!(config.properties().is_none());
        assert!(config.worker_threads().is_none());
        assert!(config.memory_capacity().is_none());
        assert_eq!(config.strategy(), ExecutionStrategy::Parallel);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::builder()
            .with_device_id(3)
            .with_properties(DeviceProperties::generic())
            .with_worker_threads(4)
            .with_memory_capacity(4096)
            .with_strategy(ExecutionStrategy::Serial);
        assert_eq!(config.device_id(), 3);
        assert_eq!(config.properties().map(|p| p.name.as_str()), Some("generic"));
        assert_eq!(config.worker_threads(), Some(4));
        assert_eq!(config.memory_capacity(), Some(4096));
        assert_eq!(config.strategy(), ExecutionStrategy::Serial);
    }
}
