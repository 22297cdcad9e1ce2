//! Occupancy advisor.
//!
//! Decides the largest group size that reaches the highest occupancy for a
//! kernel, and how many such groups the device keeps resident at once.
//! Occupancy is bounded by four resources per multiprocessor:
//!
//! 1. Units (warp granularity)
//! 2. Registers per unit
//! 3. Shared memory per group
//! 4. Max resident groups
//!
//! The advisor is a trait so that launch planning can be driven by a fixed,
//! injected limit instead of real hardware.

use crate::device::DeviceProperties;
use crate::error::{ReduceError, Result};

/// Registers a reduction unit is assumed to use when no better figure is known.
pub const DEFAULT_REGISTERS_PER_UNIT: usize = 32;

/// Static resource usage of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelFootprint {
    /// Shared memory each unit needs (bytes).
    pub shared_bytes_per_unit: usize,
    /// Registers each unit needs.
    pub registers_per_unit: usize,
}

impl KernelFootprint {
    /// Create a footprint from explicit figures.
    pub fn new(shared_bytes_per_unit: usize, registers_per_unit: usize) -> Self {
        Self {
            shared_bytes_per_unit,
            registers_per_unit,
        }
    }

    /// Footprint of a reduction whose scratch slots hold one `R` per unit.
    pub fn for_accumulator<R>() -> Self {
        Self::new(std::mem::size_of::<R>(), DEFAULT_REGISTERS_PER_UNIT)
    }

    /// Shared memory a group of `group_size` units needs (bytes).
    pub fn shared_bytes_per_group(&self, group_size: usize) -> usize {
        self.shared_bytes_per_unit * group_size
    }
}

/// Limits reported by an [`OccupancyAdvisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyLimits {
    /// Largest group size reaching the highest occupancy.
    pub max_group_size: usize,
    /// Groups of `max_group_size` that can be resident at once.
    pub max_resident_groups: usize,
}

/// Source of launch limits for a kernel footprint.
pub trait OccupancyAdvisor: Send + Sync {
    /// Compute the limits for `footprint`.
    ///
    /// # Errors
    ///
    /// Returns [`ReduceError::InvalidConfiguration`] when no group size of at
    /// least one unit fits the footprint.
    fn limits(&self, footprint: &KernelFootprint) -> Result<OccupancyLimits>;
}

/// Advisor backed by a device's hardware limits.
#[derive(Debug, Clone)]
pub struct HardwareOccupancy {
    properties: DeviceProperties,
}

impl HardwareOccupancy {
    /// Create an advisor for the given device limits.
    pub fn new(properties: DeviceProperties) -> Self {
        Self { properties }
    }

    /// Hardware limits this advisor works from.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Groups of `group_size` units resident on one multiprocessor.
    ///
    /// Returns 0 when a single group does not fit.
    pub fn active_groups_per_multiprocessor(
        &self,
        group_size: usize,
        footprint: &KernelFootprint,
    ) -> usize {
        let props = &self.properties;
        if group_size == 0 || group_size > props.max_units_per_group {
            return 0;
        }

        let shared_per_group = footprint.shared_bytes_per_group(group_size);
        if shared_per_group > props.shared_memory_per_group {
            return 0;
        }

        let warp_size = props.warp_size.max(1);
        let warps_per_group = group_size.div_ceil(warp_size);
        let max_warps = props.max_units_per_multiprocessor / warp_size;

        let by_units = max_warps / warps_per_group;

        let regs_per_warp = round_up(
            footprint.registers_per_unit * warp_size,
            props.register_alloc_granularity,
        );
        let regs_per_group = regs_per_warp * warps_per_group;
        let by_registers = if regs_per_group > 0 {
            props.registers_per_multiprocessor / regs_per_group
        } else {
            props.max_groups_per_multiprocessor
        };

        let shared_aligned = round_up(shared_per_group, props.shared_memory_alloc_granularity);
        let by_shared = if shared_aligned > 0 {
            props.shared_memory_per_multiprocessor / shared_aligned
        } else {
            props.max_groups_per_multiprocessor
        };

        by_units
            .min(by_registers)
            .min(by_shared)
            .min(props.max_groups_per_multiprocessor)
    }

    /// Fraction of a multiprocessor's warps kept busy by `group_size` groups.
    pub fn occupancy(&self, group_size: usize, footprint: &KernelFootprint) -> f64 {
        let warp_size = self.properties.warp_size.max(1);
        let max_warps = self.properties.max_units_per_multiprocessor / warp_size;
        if max_warps == 0 {
            return 0.0;
        }
        let active = self.active_groups_per_multiprocessor(group_size, footprint);
        (active * group_size.div_ceil(warp_size)) as f64 / max_warps as f64
    }

    /// Largest group size with the highest occupancy, if any size fits.
    pub fn max_group_size_with_highest_occupancy(
        &self,
        footprint: &KernelFootprint,
    ) -> Option<usize> {
        let warp_size = self.properties.warp_size.max(1);
        let mut best: Option<(usize, f64)> = None;

        let mut group_size = self.properties.max_units_per_group / warp_size * warp_size;
        while group_size > 0 {
            let occupancy = self.occupancy(group_size, footprint);
            if occupancy > 0.0 && best.map_or(true, |(_, o)| occupancy > o) {
                best = Some((group_size, occupancy));
            }
            group_size -= warp_size;
        }

        best.map(|(size, _)| size)
    }
}

impl OccupancyAdvisor for HardwareOccupancy {
    fn limits(&self, footprint: &KernelFootprint) -> Result<OccupancyLimits> {
        let max_group_size = self
            .max_group_size_with_highest_occupancy(footprint)
            .ok_or_else(|| {
                ReduceError::InvalidConfiguration(format!(
                    "no group size fits {} shared bytes and {} registers per unit on {}",
                    footprint.shared_bytes_per_unit,
                    footprint.registers_per_unit,
                    self.properties.name
                ))
            })?;

        let per_mp = self.active_groups_per_multiprocessor(max_group_size, footprint);
        let max_resident_groups = (per_mp * self.properties.multiprocessor_count)
            .min(self.properties.max_group_count)
            .max(1);

        Ok(OccupancyLimits {
            max_group_size,
            max_resident_groups,
        })
    }
}

/// Advisor returning fixed limits, independent of the footprint.
#[derive(Debug, Clone, Copy)]
pub struct FixedOccupancy {
    limits: OccupancyLimits,
}

impl FixedOccupancy {
    /// Create an advisor that always reports the given limits.
    pub fn new(max_group_size: usize, max_resident_groups: usize) -> Self {
        Self {
            limits: OccupancyLimits {
                max_group_size,
                max_resident_groups,
            },
        }
    }
}

impl OccupancyAdvisor for FixedOccupancy {
    fn limits(&self, _footprint: &KernelFootprint) -> Result<OccupancyLimits> {
        if self.limits.max_group_size == 0 || self.limits.max_resident_groups == 0 {
            return Err(ReduceError::InvalidConfiguration(format!(
                "fixed limits must be non-zero: {:?}",
                self.limits
            )));
        }
        Ok(self.limits)
    }
}

fn round_up(value: usize, granularity: usize) -> usize {
    if granularity == 0 {
        return value;
    }
    value.div_ceil(granularity) * granularity
}
