//! Device memory allocator handle.
//!
//! `GpuAllocator` is a lightweight, clonable handle to a device's memory
//! budget. Every [`DeviceBuffer`](crate::memory::DeviceBuffer) holds a
//! reservation on the allocator it came from and returns its bytes when it is
//! dropped, so temporary buffers are released on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::device::GpuDevice;
use crate::error::{ReduceError, Result};
use crate::memory::DeviceBuffer;

#[derive(Debug)]
struct MemoryPool {
    capacity: usize,
    in_use: AtomicUsize,
}

/// Device memory allocator handle.
///
/// # Examples
///
/// ```rust
/// use grid_reduce::{GpuAllocator, GpuDevice};
///
/// let device = GpuDevice::new(0);
/// let allocator = GpuAllocator::with_capacity(&device, 1024);
/// let buffer = allocator.allocate(16, 0u32).unwrap();
/// assert_eq!(allocator.bytes_in_use(), 64);
/// drop(buffer);
/// assert_eq!(allocator.bytes_in_use(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct GpuAllocator {
    device_id: usize,
    pool: Arc<MemoryPool>,
}

impl GpuAllocator {
    /// Create an allocator over the device's whole global memory.
    pub fn new(device: &GpuDevice) -> Self {
        Self::with_capacity(device, device.properties().global_memory_bytes)
    }

    /// Create an allocator limited to `capacity` bytes.
    pub fn with_capacity(device: &GpuDevice, capacity: usize) -> Self {
        Self {
            device_id: device.device_id(),
            pool: Arc::new(MemoryPool {
                capacity,
                in_use: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the device ID for this allocator.
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    /// Total bytes this allocator may hand out.
    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }

    /// Bytes currently held by live buffers.
    pub fn bytes_in_use(&self) -> usize {
        self.pool.in_use.load(Ordering::Acquire)
    }

    /// Allocate a buffer of `len` elements, each set to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::OutOfMemory`] if the allocation does not fit.
    pub fn allocate<T: Clone>(&self, len: usize, value: T) -> Result<DeviceBuffer<T>> {
        let reservation = self.reserve(byte_len::<T>(len)?)?;
        Ok(DeviceBuffer::from_parts(vec![value; len], reservation))
    }

    /// Copy host data into a new device buffer.
    pub fn to_device<T: Clone>(&self, data: &[T]) -> Result<DeviceBuffer<T>> {
        let reservation = self.reserve(byte_len::<T>(data.len())?)?;
        Ok(DeviceBuffer::from_parts(data.to_vec(), reservation))
    }

    fn reserve(&self, bytes: usize) -> Result<Reservation> {
        let pool = &self.pool;
        let mut current = pool.in_use.load(Ordering::Relaxed);
        loop {
            let available = pool.capacity.saturating_sub(current);
            if bytes > available {
                log::warn!(
                    "device {}: allocation of {} bytes refused ({} available)",
                    self.device_id,
                    bytes,
                    available
                );
                return Err(ReduceError::OutOfMemory {
                    requested: bytes,
                    available,
                });
            }
            match pool.in_use.compare_exchange_weak(
                current,
                current + bytes,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        Ok(Reservation {
            pool: Arc::clone(pool),
            bytes,
        })
    }
}

/// Bytes held on behalf of one buffer; returned to the pool on drop.
#[derive(Debug)]
pub(crate) struct Reservation {
    pool: Arc<MemoryPool>,
    bytes: usize,
}

impl Reservation {
    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

fn byte_len<T>(len: usize) -> Result<usize> {
    len.checked_mul(std::mem::size_of::<T>())
        .ok_or(ReduceError::OutOfMemory {
            requested: usize::MAX,
            available: 0,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_creation() {
        let device = GpuDevice::new(0);
        let allocator = GpuAllocator::new(&device);
        assert_eq!(allocator.device_id(), 0);
        assert_eq!(allocator.capacity(), device.properties().global_memory_bytes);
        assert_eq!(allocator.bytes_in_use(), 0);
    }

    #[test]
    fn test_allocation_is_released_on_drop() {
        let device = GpuDevice::new(0);
        let allocator = GpuAllocator::with_capacity(&device, 256);
        {
            let _a = allocator.allocate(8, 0u64).unwrap();
            let _b = allocator.to_device(&[1u32, 2, 3, 4]).unwrap();
            assert_eq!(allocator.bytes_in_use(), 80);
        }
        assert_eq!(allocator.bytes_in_use(), 0);
    }

    #[test]
    fn test_out_of_memory() {
        let device = GpuDevice::new(0);
        let allocator = GpuAllocator::with_capacity(&device, 16);
        let _held = allocator.allocate(3, 0u32).unwrap();
        match allocator.allocate(2, 0u32) {
            Err(ReduceError::OutOfMemory {
                requested,
                available,
            }) => {
                assert_eq!(requested, 8);
                assert_eq!(available, 4);
            }
            other => panic!("expected OutOfMemory, got {:?}", other.map(|b| b.len())),
        }
        assert_eq!(allocator.bytes_in_use(), 12);
    }

    #[test]
    fn test_clones_share_the_pool() {
        let device = GpuDevice::new(0);
        let allocator = GpuAllocator::with_capacity(&device, 64);
        let other = allocator.clone();
        let _buffer = other.allocate(4, 0u32).unwrap();
        assert_eq!(allocator.bytes_in_use(), 16);
    }
}
