//! Groups of cooperating units.
//!
//! A kernel runs once per group. Inside a group, units execute in phases:
//! [`Group::phase`] runs a closure for every participating unit and returns
//! only after all of them have finished, which is the group-wide barrier.
//! Each group owns a [`SharedMemory`] scratch array; it is never visible to
//! other groups and lives only for the group's execution.

use crate::launch::LaunchConfig;

/// Group-local scratch memory, one slot per unit.
#[derive(Debug)]
pub struct SharedMemory<S> {
    slots: Vec<Option<S>>,
}

impl<S> SharedMemory<S> {
    /// Allocate `len` empty slots.
    pub fn new(len: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(len).collect(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Store `value` in slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range, like an out-of-bounds shared store
    /// would fault the group.
    pub fn store(&mut self, index: usize, value: S) {
        self.slots[index] = Some(value);
    }

    /// Borrow the value in slot `index`, if one was stored.
    pub fn load(&self, index: usize) -> Option<&S> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Move the value out of slot `index`, leaving it empty.
    pub fn take(&mut self, index: usize) -> Option<S> {
        self.slots.get_mut(index).and_then(Option::take)
    }
}

/// Execution context of one group.
#[derive(Debug)]
pub struct Group<S> {
    pos: usize,
    config: LaunchConfig,
    shared: SharedMemory<S>,
}

impl<S> Group<S> {
    pub(crate) fn new(pos: usize, config: LaunchConfig) -> Self {
        Self {
            pos,
            config,
            shared: SharedMemory::new(config.group_size),
        }
    }

    /// Index of this group in the launch.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Units in this group.
    pub fn dim(&self) -> usize {
        self.config.group_size
    }

    /// Groups in the launch.
    pub fn count(&self) -> usize {
        self.config.num_groups
    }

    /// Global index of unit `unit_pos` of this group.
    pub fn absolute_pos(&self, unit_pos: usize) -> usize {
        self.pos * self.config.group_size + unit_pos
    }

    /// Units across the whole launch.
    pub fn grid_size(&self) -> usize {
        self.config.total_units()
    }

    /// Run one barrier-delimited phase for units `0..active`.
    ///
    /// `f` receives the unit position and the group's shared memory. When
    /// this returns, every unit has completed the phase.
    pub fn phase<F>(&mut self, active: usize, mut f: F)
    where
        F: FnMut(usize, &mut SharedMemory<S>),
    {
        for unit_pos in 0..active.min(self.config.group_size) {
            f(unit_pos, &mut self.shared);
        }
    }

    /// Shared memory of this group.
    pub fn shared(&self) -> &SharedMemory<S> {
        &self.shared
    }
}

/// A kernel executed once per group of a launch.
pub trait GroupKernel: Sync {
    /// Element stored in shared memory, one per unit.
    type Shared: Send;
    /// Value a group emits to its output slot.
    type Output: Send;

    /// Shared memory each unit uses (bytes).
    fn shared_bytes_per_unit(&self) -> usize {
        std::mem::size_of::<Self::Shared>()
    }

    /// Execute the kernel for one group.
    fn run(&self, group: &mut Group<Self::Shared>) -> Self::Output;
}
