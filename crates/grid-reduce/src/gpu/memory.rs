//! Transfers between host memory and CubeCL buffers.

use cubecl::prelude::*;

use crate::error::Result;
use crate::gpu::runtime::{CubeclContext, GpuBuffer};

/// Copy `data` to the device.
///
/// # Example
///
/// ```ignore
/// let buffer = to_device(&[1.0f32, 2.0, 3.0], &runtime)?;
/// ```
pub fn to_device<R: Runtime, T: bytemuck::Pod>(
    data: &[T],
    runtime: &CubeclContext<R>,
) -> Result<GpuBuffer<R>> {
    let handle = runtime.client().create(bytemuck::cast_slice(data));
    Ok(GpuBuffer::from_handle(handle, data.len()))
}

/// Copy a device buffer back to the host.
pub fn to_cpu<R: Runtime, T: bytemuck::Pod>(
    buffer: &GpuBuffer<R>,
    runtime: &CubeclContext<R>,
) -> Result<Vec<T>> {
    let bytes = runtime.client().read(buffer.handle().clone().binding());
    Ok(bytemuck::cast_slice(&bytes).to_vec())
}

/// Allocate an uninitialized device buffer of `len` elements.
pub fn allocate<R: Runtime, T>(len: usize, runtime: &CubeclContext<R>) -> Result<GpuBuffer<R>> {
    let handle = runtime.client().empty(len * std::mem::size_of::<T>());
    Ok(GpuBuffer::from_handle(handle, len))
}
