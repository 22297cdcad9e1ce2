//! Executable reductions.
//!
//! [`reduce`] and [`reduce_sequence`] run the two-pass reduction on a
//! [`RuntimeContext`]:
//!
//! 1. Plan pass 1 from the occupancy limits and the input length
//! 2. Allocate `num_groups + 1` partial slots, slot 0 holding `init`
//! 3. Reduce the input into slots `1..=num_groups`
//! 4. Reduce all slots with a single group into slot 0
//!
//! The remaining functions are thin aggregates built on top of them.

use std::ops::Add;

use num_traits::Zero;

use crate::error::{ReduceError, Result};
use crate::kernels::reduction::ReduceNKernel;
use crate::launch::LaunchPlanner;
use crate::memory::DeviceBuffer;
use crate::occupancy::KernelFootprint;
use crate::runtime::RuntimeContext;
use crate::sequence::{Indexed, InputSequence, Mapped};

/// Reduce `input[0..count)` together with `init` using `op`.
///
/// `op` must be associative; the pairing order is unspecified, so it should
/// also be commutative for results to be independent of the launch shape.
///
/// # Errors
///
/// - [`ReduceError::InvalidBufferSize`] if `count > input.len()`
/// - [`ReduceError::InvalidConfiguration`] if no launch fits the device
/// - [`ReduceError::OutOfMemory`] if the partials buffer cannot be allocated
/// - [`ReduceError::KernelLaunchFailed`] if a launch aborts
///
/// # Example
///
/// ```rust
/// use grid_reduce::{reduce, RuntimeContext};
///
/// let runtime = RuntimeContext::host().unwrap();
/// let total = reduce(&[1u32, 2, 3, 4, 5], 5, 0u64, |a, b| a + b, &runtime).unwrap();
/// assert_eq!(total, 15);
/// ```
pub fn reduce<T, R, F>(
    input: &[T],
    count: usize,
    init: R,
    op: F,
    runtime: &RuntimeContext,
) -> Result<R>
where
    T: Clone + Into<R> + Sync,
    R: Clone + Send + Sync,
    F: Fn(R, R) -> R + Sync,
{
    if count > input.len() {
        return Err(ReduceError::InvalidBufferSize {
            expected: count,
            actual: input.len(),
        });
    }
    let view = Mapped::new(&input[..count], |x: &T| x.clone().into());
    reduce_sequence(&view, init, op, runtime)
}

/// Reduce every element of `input` together with `init` using `op`.
///
/// An empty input returns `init` without allocating or launching anything.
pub fn reduce_sequence<S, R, F>(input: &S, init: R, op: F, runtime: &RuntimeContext) -> Result<R>
where
    S: InputSequence<Item = R> + ?Sized,
    R: Clone + Send + Sync,
    F: Fn(R, R) -> R + Sync,
{
    if input.is_empty() {
        return Ok(init);
    }

    let planner = planner_for::<R>(runtime)?;
    let mut partials = partial_pass(input, init, &op, &planner, runtime)?;

    let config = planner.combine_pass();
    log::debug!(
        "reduce pass 2: {} partials, 1 group x {} units",
        partials.len(),
        config.group_size
    );
    let kernel = ReduceNKernel::new(partials.as_slice(), partials.len(), &op);
    let result = runtime
        .stream()
        .launch(&kernel, config)?
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| ReduceError::InvalidLaunch("combine pass emitted no result".into()))?;

    partials.write(0, result)?;
    partials.read(0)
}

/// Run only the first pass and return the partials buffer.
///
/// Slot 0 holds `init` untouched; slots `1..` hold one partial per group.
/// An empty input yields a single-slot buffer holding `init`.
pub fn reduce_partials<S, R, F>(
    input: &S,
    init: R,
    op: F,
    runtime: &RuntimeContext,
) -> Result<DeviceBuffer<R>>
where
    S: InputSequence<Item = R> + ?Sized,
    R: Clone + Send + Sync,
    F: Fn(R, R) -> R + Sync,
{
    let planner = planner_for::<R>(runtime)?;
    partial_pass(input, init, &op, &planner, runtime)
}

/// Map each element with `map`, then reduce with `op` starting from `init`.
pub fn transform_reduce<T, R, M, F>(
    input: &[T],
    map: M,
    init: R,
    op: F,
    runtime: &RuntimeContext,
) -> Result<R>
where
    T: Sync,
    R: Clone + Send + Sync,
    M: Fn(&T) -> R + Sync,
    F: Fn(R, R) -> R + Sync,
{
    reduce_sequence(&Mapped::new(input, map), init, op, runtime)
}

/// Fused `init + sum(mul(a[i], b[i]))` over the length of `a`.
///
/// # Errors
///
/// Returns [`ReduceError::InvalidBufferSize`] if `b` is shorter than `a`.
pub fn inner_product<A, B, R, F, G>(
    a: &[A],
    b: &[B],
    init: R,
    add: F,
    mul: G,
    runtime: &RuntimeContext,
) -> Result<R>
where
    A: Clone + Sync,
    B: Clone + Sync,
    R: Clone + Send + Sync,
    F: Fn(R, R) -> R + Sync,
    G: Fn(A, B) -> R + Sync,
{
    if b.len() < a.len() {
        return Err(ReduceError::InvalidBufferSize {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let products = Indexed::new(a.len(), |i: usize| mul(a[i].clone(), b[i].clone()));
    reduce_sequence(&products, init, add, runtime)
}

/// Sum of all elements.
///
/// # Example
///
/// ```rust
/// use grid_reduce::{sum, RuntimeContext};
///
/// let runtime = RuntimeContext::host().unwrap();
/// assert_eq!(sum(&[1.0f64, 2.0, 3.0, 4.0], &runtime).unwrap(), 10.0);
/// ```
pub fn sum<T>(input: &[T], runtime: &RuntimeContext) -> Result<T>
where
    T: Clone + Zero + Add<Output = T> + Send + Sync,
{
    reduce(input, input.len(), T::zero(), |a, b| a + b, runtime)
}

/// Smallest element, or `None` for an empty input.
pub fn reduce_min<T>(input: &[T], runtime: &RuntimeContext) -> Result<Option<T>>
where
    T: Clone + PartialOrd + Send + Sync,
{
    let Some((first, rest)) = input.split_first() else {
        return Ok(None);
    };
    let min = reduce(rest, rest.len(), first.clone(), |a, b| if b < a { b } else { a }, runtime)?;
    Ok(Some(min))
}

/// Largest element, or `None` for an empty input.
pub fn reduce_max<T>(input: &[T], runtime: &RuntimeContext) -> Result<Option<T>>
where
    T: Clone + PartialOrd + Send + Sync,
{
    let Some((first, rest)) = input.split_first() else {
        return Ok(None);
    };
    let max = reduce(rest, rest.len(), first.clone(), |a, b| if b > a { b } else { a }, runtime)?;
    Ok(Some(max))
}

/// Number of elements satisfying `pred`.
pub fn count_if<T, P>(input: &[T], pred: P, runtime: &RuntimeContext) -> Result<usize>
where
    T: Sync,
    P: Fn(&T) -> bool + Sync,
{
    transform_reduce(input, |x| usize::from(pred(x)), 0, |a, b| a + b, runtime)
}

fn planner_for<R>(runtime: &RuntimeContext) -> Result<LaunchPlanner> {
    LaunchPlanner::from_advisor(runtime.advisor(), &KernelFootprint::for_accumulator::<R>())
}

fn partial_pass<S, R, F>(
    input: &S,
    init: R,
    op: &F,
    planner: &LaunchPlanner,
    runtime: &RuntimeContext,
) -> Result<DeviceBuffer<R>>
where
    S: InputSequence<Item = R> + ?Sized,
    R: Clone + Send + Sync,
    F: Fn(R, R) -> R + Sync,
{
    let n = input.len();
    let Some(config) = planner.partial_pass(n) else {
        return runtime.allocator().allocate(1, init);
    };

    // Every slot starts as the seed; pass 1 overwrites slots 1.. only.
    let mut partials = runtime.allocator().allocate(config.num_groups + 1, init)?;

    log::debug!(
        "reduce pass 1: n={}, {} groups x {} units",
        n,
        config.num_groups,
        config.group_size
    );
    let kernel = ReduceNKernel::new(input, n, op);
    let outputs = runtime
        .stream()
        .launch(&kernel, config)?
        .into_iter()
        .enumerate()
        .map(|(pos, partial)| {
            partial.ok_or_else(|| {
                ReduceError::InvalidLaunch(format!("group {} received no elements", pos))
            })
        })
        .collect::<Result<Vec<R>>>()?;

    partials.write_from(1, outputs.into_iter())?;
    Ok(partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::occupancy::FixedOccupancy;
    use std::sync::Arc;

    fn runtime(group_size: usize, max_groups: usize) -> RuntimeContext {
        RuntimeContext::new(RuntimeConfig::builder().with_worker_threads(2))
            .unwrap()
            .with_advisor(Arc::new(FixedOccupancy::new(group_size, max_groups)))
    }

    #[test]
    fn test_reduce_literal_inputs() {
        let rt = RuntimeContext::host().unwrap();
        assert_eq!(reduce(&[1i32, 2, 3, 4, 5], 5, 0i32, |a, b| a + b, &rt).unwrap(), 15);
        assert_eq!(reduce::<i32, i32, _>(&[], 0, 7, |a, b| a + b, &rt).unwrap(), 7);
        assert_eq!(reduce(&[42i32], 1, 0i32, |a, b| a + b, &rt).unwrap(), 42);
    }

    #[test]
    fn test_reduce_count_larger_than_input() {
        let rt = RuntimeContext::host().unwrap();
        let err = reduce(&[1i32, 2], 3, 0i32, |a, b| a + b, &rt).unwrap_err();
        assert!(matches!(
            err,
            ReduceError::InvalidBufferSize {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_reduce_widens_elements() {
        let rt = runtime(32, 4);
        let data = vec![u8::MAX; 1000];
        let total: u64 = reduce(&data, data.len(), 0u64, |a, b| a + b, &rt).unwrap();
        assert_eq!(total, 255_000);
    }

    #[test]
    fn test_partials_keep_seed_in_slot_zero() {
        let rt = runtime(16, 3);
        let data: Vec<i64> = (1..=100).collect();
        let partials = reduce_partials(data.as_slice(), -999, |a, b| a + b, &rt).unwrap();

        assert_eq!(partials.len(), 4);
        assert_eq!(partials.read(0).unwrap(), -999);
        let groups: i64 = partials.as_slice()[1..].iter().sum();
        assert_eq!(groups, 5050);
    }

    #[test]
    fn test_partials_of_empty_input() {
        let rt = runtime(16, 3);
        let partials = reduce_partials(&[] as &[i32], 5, |a, b| a + b, &rt).unwrap();
        assert_eq!(partials.to_cpu(), vec![5]);
        assert_eq!(rt.stream().launches_completed(), 0);
    }

    #[test]
    fn test_two_launches_per_reduction() {
        let rt = runtime(8, 4);
        let data: Vec<u32> = (0..100).collect();
        sum(&data, &rt).unwrap();
        assert_eq!(rt.stream().launches_completed(), 2);
        assert_eq!(rt.allocator().bytes_in_use(), 0);
    }

    #[test]
    fn test_aggregates() {
        let rt = runtime(4, 3);
        let data = [3.5f32, -1.0, 8.25, 0.0, 2.0];
        assert_eq!(sum(&data, &rt).unwrap(), 12.75);
        assert_eq!(reduce_min(&data, &rt).unwrap(), Some(-1.0));
        assert_eq!(reduce_max(&data, &rt).unwrap(), Some(8.25));
        assert_eq!(reduce_min::<f32>(&[], &rt).unwrap(), None);
        assert_eq!(count_if(&data, |x| *x > 1.0, &rt).unwrap(), 3);
    }

    #[test]
    fn test_transform_reduce_and_inner_product() {
        let rt = runtime(8, 2);
        let a: Vec<i32> = (1..=50).collect();
        let b: Vec<i32> = vec![2; 50];

        let squares =
            transform_reduce(&a, |x| i64::from(*x) * i64::from(*x), 0i64, |x, y| x + y, &rt)
                .unwrap();
        assert_eq!(squares, 42_925);

        let dot = inner_product(&a, &b, 10i64, |x, y| x + y, |x, y| i64::from(x * y), &rt).unwrap();
        assert_eq!(dot, 10 + 2 * 1275);

        let short = inner_product(&a, &b[..10], 0i64, |x, y| x + y, |x, y| i64::from(x * y), &rt);
        assert!(matches!(
            short,
            Err(ReduceError::InvalidBufferSize {
                expected: 50,
                actual: 10
            })
        ));
    }
}
