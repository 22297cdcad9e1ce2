//! CubeCL client wrapper.

use std::marker::PhantomData;

use cubecl::prelude::*;
use cubecl::server::Handle;

use crate::device::DeviceProperties;
use crate::occupancy::{HardwareOccupancy, OccupancyAdvisor};

pub use cubecl::Runtime as CubeclRuntime;

/// CubeCL compute client plus the limits used to plan launches on it.
pub struct CubeclContext<R: Runtime> {
    client: ComputeClient<R::Server, R::Channel>,
    advisor: HardwareOccupancy,
    _phantom: PhantomData<R>,
}

impl<R: Runtime> CubeclContext<R> {
    /// Create a context on `device`, planning launches against `properties`.
    pub fn new(device: R::Device, properties: DeviceProperties) -> Self {
        log::info!("cubecl runtime {} ({})", R::name(), properties.name);
        Self {
            client: R::client(&device),
            advisor: HardwareOccupancy::new(properties),
            _phantom: PhantomData,
        }
    }

    /// Get a reference to the compute client.
    pub fn client(&self) -> &ComputeClient<R::Server, R::Channel> {
        &self.client
    }

    /// Get the occupancy advisor for this device.
    pub fn advisor(&self) -> &dyn OccupancyAdvisor {
        &self.advisor
    }

    /// Hardware limits launches are planned against.
    pub fn properties(&self) -> &DeviceProperties {
        self.advisor.properties()
    }

    /// Get the backend name (e.g. "cuda", "wgpu<wgsl>").
    pub fn backend_name(&self) -> &'static str {
        R::name()
    }

    /// Block until every enqueued kernel has finished.
    pub fn sync(&self) {
        // A blocking read flushes the queue.
        let handle = self.client.empty(1);
        let _ = self.client.read(handle.binding());
    }
}

/// Device buffer of `len` elements.
pub struct GpuBuffer<R: Runtime> {
    handle: Handle,
    len: usize,
    _phantom: PhantomData<R>,
}

impl<R: Runtime> GpuBuffer<R> {
    /// Wrap a handle holding `len` elements.
    pub fn from_handle(handle: Handle, len: usize) -> Self {
        Self {
            handle,
            len,
            _phantom: PhantomData,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get a reference to the underlying handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Initialize the CUDA runtime on device 0.
#[cfg(feature = "cuda")]
pub fn init_cuda_runtime() -> crate::Result<CubeclContext<cubecl_cuda::CudaRuntime>> {
    use cubecl_cuda::CudaDevice;

    Ok(CubeclContext::new(CudaDevice::new(0), DeviceProperties::ampere()))
}

/// Initialize the WGPU runtime on the best available adapter.
#[cfg(feature = "wgpu")]
pub fn init_wgpu_runtime() -> crate::Result<CubeclContext<cubecl_wgpu::WgpuRuntime>> {
    use cubecl_wgpu::WgpuDevice;

    Ok(CubeclContext::new(WgpuDevice::BestAvailable, DeviceProperties::generic()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "wgpu")]
    fn test_wgpu_runtime_init() {
        if let Ok(runtime) = init_wgpu_runtime() {
            assert!(!runtime.backend_name().is_empty());
            assert_eq!(runtime.properties().name, "generic");
            runtime.sync();
        }
    }

    #[test]
    #[cfg(feature = "cuda")]
    fn test_cuda_runtime_init() {
        if let Ok(runtime) = init_cuda_runtime() {
            let footprint = crate::occupancy::KernelFootprint::for_accumulator::<f32>();
            let limits = runtime.advisor().limits(&footprint).unwrap();
            assert_eq!(limits.max_group_size % 32, 0);
            runtime.sync();
        }
    }
}
