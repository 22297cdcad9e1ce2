//! Launch planning for the two reduction passes.

use crate::error::Result;
use crate::occupancy::{KernelFootprint, OccupancyAdvisor, OccupancyLimits};

/// Shape of one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Units per group.
    pub group_size: usize,
    /// Groups in the launch.
    pub num_groups: usize,
}

impl LaunchConfig {
    /// Create a launch configuration.
    pub fn new(group_size: usize, num_groups: usize) -> Self {
        Self {
            group_size,
            num_groups,
        }
    }

    /// Units across all groups, i.e. the grid stride.
    pub fn total_units(&self) -> usize {
        self.group_size * self.num_groups
    }

    /// Shared memory one group of this launch needs (bytes).
    pub fn shared_memory_bytes(&self, footprint: &KernelFootprint) -> usize {
        footprint.shared_bytes_per_group(self.group_size)
    }
}

/// Chooses group size and group count for each reduction pass.
#[derive(Debug, Clone, Copy)]
pub struct LaunchPlanner {
    limits: OccupancyLimits,
}

impl LaunchPlanner {
    /// Create a planner from precomputed limits.
    pub fn new(limits: OccupancyLimits) -> Self {
        Self { limits }
    }

    /// Ask `advisor` for the limits of `footprint` and plan with them.
    pub fn from_advisor(advisor: &dyn OccupancyAdvisor, footprint: &KernelFootprint) -> Result<Self> {
        Ok(Self::new(advisor.limits(footprint)?))
    }

    /// Limits the planner works with.
    pub fn limits(&self) -> OccupancyLimits {
        self.limits
    }

    /// Configuration for the pass over `n` input elements.
    ///
    /// Never launches more groups than there are group-sized chunks of data.
    /// Returns `None` when there is nothing to reduce.
    pub fn partial_pass(&self, n: usize) -> Option<LaunchConfig> {
        if n == 0 {
            return None;
        }
        let group_size = self.limits.max_group_size.max(1);
        let num_groups = self
            .limits
            .max_resident_groups
            .min(n.div_ceil(group_size))
            .max(1);
        Some(LaunchConfig::new(group_size, num_groups))
    }

    /// Configuration for the pass combining the per-group partials.
    pub fn combine_pass(&self) -> LaunchConfig {
        LaunchConfig::new(self.limits.max_group_size.max(1), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::FixedOccupancy;

    fn planner(group_size: usize, max_groups: usize) -> LaunchPlanner {
        LaunchPlanner::new(OccupancyLimits {
            max_group_size: group_size,
            max_resident_groups: max_groups,
        })
    }

    #[test]
    fn test_empty_input_has_no_launch() {
        assert_eq!(planner(256, 8).partial_pass(0), None);
    }

    #[test]
    fn test_groups_bounded_by_data() {
        let p = planner(256, 64);
        assert_eq!(p.partial_pass(1), Some(LaunchConfig::new(256, 1)));
        assert_eq!(p.partial_pass(256), Some(LaunchConfig::new(256, 1)));
        assert_eq!(p.partial_pass(257), Some(LaunchConfig::new(256, 2)));
        assert_eq!(p.partial_pass(1000), Some(LaunchConfig::new(256, 4)));
    }

    #[test]
    fn test_groups_bounded_by_occupancy() {
        let p = planner(128, 6);
        let config = p.partial_pass(1_000_000).unwrap();
        assert_eq!(config, LaunchConfig::new(128, 6));
        assert_eq!(config.total_units(), 768);
    }

    #[test]
    fn test_combine_pass_is_single_group() {
        let p = planner(64, 10);
        assert_eq!(p.combine_pass(), LaunchConfig::new(64, 1));
    }

    #[test]
    fn test_from_advisor() {
        let footprint = KernelFootprint::for_accumulator::<u32>();
        let p = LaunchPlanner::from_advisor(&FixedOccupancy::new(32, 2), &footprint).unwrap();
        assert_eq!(p.partial_pass(100), Some(LaunchConfig::new(32, 2)));
        assert_eq!(LaunchConfig::new(32, 2).shared_memory_bytes(&footprint), 128);
    }
}
