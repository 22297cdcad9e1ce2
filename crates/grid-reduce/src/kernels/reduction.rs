//! Partial-sum reduction kernel.
//!
//! One launch of [`ReduceNKernel`] reduces an input sequence to one partial
//! result per group:
//!
//! 1. Each unit folds a grid-strided subset of the input into a private value
//! 2. The private values are published to the group's shared memory
//! 3. A tree reduction in shared memory collapses them into slot 0
//! 4. Unit 0 emits slot 0 as the group's partial
//!
//! Launching it again over the partials with a single group finishes the
//! reduction.

use crate::grid::{Group, GroupKernel};
use crate::sequence::InputSequence;

/// Grid-stride reduction of the first `n` elements of `input`.
pub struct ReduceNKernel<'a, S: ?Sized, F> {
    input: &'a S,
    n: usize,
    op: &'a F,
}

impl<'a, S: ?Sized, F> ReduceNKernel<'a, S, F> {
    /// Reduce `input[0..n)` with `op`.
    pub fn new(input: &'a S, n: usize, op: &'a F) -> Self {
        Self { input, n, op }
    }
}

impl<S, R, F> GroupKernel for ReduceNKernel<'_, S, F>
where
    S: InputSequence<Item = R> + ?Sized,
    R: Send,
    F: Fn(R, R) -> R + Sync,
{
    type Shared = R;
    type Output = Option<R>;

    fn run(&self, group: &mut Group<R>) -> Option<R> {
        let (input, n, op) = (self.input, self.n, self.op);
        let grid_size = group.grid_size();
        let base = group.absolute_pos(0);

        // Units whose first index is past the end hold no value.
        let active = n.saturating_sub(base).min(group.dim());
        if active == 0 {
            return None;
        }

        group.phase(active, |unit, shared| {
            let mut i = base + unit;
            let mut sum = input.get(i);
            i += grid_size;
            while i < n {
                sum = op(sum, input.get(i));
                i += grid_size;
            }
            shared.store(unit, sum);
        });

        reduce_shared(group, active, op);

        let mut partial = None;
        group.phase(1, |_, shared| partial = shared.take(0));
        partial
    }
}

/// Tree reduction of shared slots `0..active` into slot 0.
///
/// Each round pairs slot `t` with slot `t + ceil(active / 2)` for every
/// `t < active / 2`, so `active` need not be a power of two.
pub fn reduce_shared<R, F>(group: &mut Group<R>, active: usize, op: &F)
where
    F: Fn(R, R) -> R,
{
    let mut active = active.min(group.dim());
    while active > 1 {
        let half = active / 2;
        let upper = active - half;
        group.phase(half, |unit, shared| {
            match (shared.take(unit), shared.take(unit + upper)) {
                (Some(left), Some(right)) => shared.store(unit, op(left, right)),
                (Some(value), None) | (None, Some(value)) => shared.store(unit, value),
                (None, None) => {}
            }
        });
        active = upper;
    }
}
