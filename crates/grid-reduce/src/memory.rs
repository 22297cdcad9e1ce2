//! Device buffers and host transfers.

use crate::allocator::{GpuAllocator, Reservation};
use crate::error::{ReduceError, Result};

/// Buffer of `T` living in device memory.
///
/// The buffer owns its reservation on the allocator; dropping it returns the
/// memory.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    data: Vec<T>,
    reservation: Reservation,
}

impl<T> DeviceBuffer<T> {
    pub(crate) fn from_parts(data: Vec<T>, reservation: Reservation) -> Self {
        Self { data, reservation }
    }

    /// Get the number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes reserved for this buffer.
    pub fn size_in_bytes(&self) -> usize {
        self.reservation.bytes()
    }

    /// View the elements.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Overwrite the element at `index`.
    pub fn write(&mut self, index: usize, value: T) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or(ReduceError::IndexOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Overwrite consecutive elements starting at `offset`.
    pub fn write_from<I>(&mut self, offset: usize, values: I) -> Result<()>
    where
        I: ExactSizeIterator<Item = T>,
    {
        let len = self.data.len();
        let end = offset + values.len();
        if end > len {
            return Err(ReduceError::IndexOutOfBounds { index: end - 1, len });
        }
        for (slot, value) in self.data[offset..end].iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }
}

impl<T: Clone> DeviceBuffer<T> {
    /// Read the element at `index` back to the host.
    pub fn read(&self, index: usize) -> Result<T> {
        self.data
            .get(index)
            .cloned()
            .ok_or(ReduceError::IndexOutOfBounds {
                index,
                len: self.data.len(),
            })
    }

    /// Copy the whole buffer back to the host.
    pub fn to_cpu(&self) -> Vec<T> {
        self.data.clone()
    }
}

/// Transfer data from host to device.
///
/// # Example
///
/// ```rust
/// use grid_reduce::{to_device, GpuAllocator, GpuDevice};
///
/// let allocator = GpuAllocator::new(&GpuDevice::new(0));
/// let buffer = to_device(&[1.0f32, 2.0, 3.0], &allocator).unwrap();
/// assert_eq!(buffer.len(), 3);
/// ```
pub fn to_device<T: Clone>(data: &[T], allocator: &GpuAllocator) -> Result<DeviceBuffer<T>> {
    allocator.to_device(data)
}

/// Transfer data from device to host.
pub fn to_cpu<T: Clone>(buffer: &DeviceBuffer<T>) -> Vec<T> {
    buffer.to_cpu()
}
