//! End-to-end tests for the two-pass reduction.

use std::sync::Arc;

use grid_reduce::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * b.abs().max(1.0)
}

fn fixed_runtime(group_size: usize, max_groups: usize) -> RuntimeContext {
    RuntimeContext::new(RuntimeConfig::builder().with_worker_threads(4))
        .unwrap()
        .with_advisor(Arc::new(FixedOccupancy::new(group_size, max_groups)))
}

fn add(a: u64, b: u64) -> u64 {
    a + b
}

#[test]
fn test_empty_input_returns_init_without_work() {
    let runtime =
        RuntimeContext::new(RuntimeConfig::builder().with_memory_capacity(0)).unwrap();

    let result = reduce::<u32, u64, _>(&[], 0, 7, add, &runtime).unwrap();
    assert_eq!(result, 7);

    let data = [1u32, 2, 3];
    let result = reduce(&data, 0, 11u64, add, &runtime).unwrap();
    assert_eq!(result, 11);

    assert_eq!(runtime.stream().launches_completed(), 0);
    assert_eq!(runtime.allocator().bytes_in_use(), 0);
}

#[test]
fn test_small_literal_inputs() {
    let runtime = RuntimeContext::host().unwrap();
    assert_eq!(reduce(&[1u32, 2, 3, 4, 5], 5, 0u64, add, &runtime).unwrap(), 15);
    assert_eq!(reduce(&[42u32], 1, 0u64, add, &runtime).unwrap(), 42);
    assert_eq!(reduce(&[42u32], 1, 100u64, add, &runtime).unwrap(), 142);
}

#[test]
fn test_count_limits_the_reduced_prefix() {
    let runtime = RuntimeContext::host().unwrap();
    let data = [1u32, 2, 3, 1000, 1000];
    assert_eq!(reduce(&data, 3, 0u64, add, &runtime).unwrap(), 6);

    let err = reduce(&data, 6, 0u64, add, &runtime).unwrap_err();
    assert!(matches!(
        err,
        ReduceError::InvalidBufferSize {
            expected: 6,
            actual: 5
        }
    ));
}

#[test]
fn test_result_independent_of_launch_shape() {
    let data: Vec<u32> = (0..10_007).map(|i| (i * 7919) % 1013).collect();
    let expected: u64 = data.iter().map(|&x| u64::from(x)).sum::<u64>() + 3;

    for (group_size, max_groups) in [(1, 1), (7, 3), (32, 4), (64, 1000), (256, 64)] {
        let runtime = fixed_runtime(group_size, max_groups);
        let result = reduce(&data, data.len(), 3u64, add, &runtime).unwrap();
        assert_eq!(result, expected, "group_size={group_size}, max_groups={max_groups}");
    }
}

#[test]
fn test_single_group_matches_many_groups() {
    let data: Vec<i64> = (-5000..5000).collect();
    let single = reduce(&data, data.len(), 0i64, |a, b| a + b, &fixed_runtime(256, 1)).unwrap();
    let many = reduce(&data, data.len(), 0i64, |a, b| a + b, &fixed_runtime(64, 40)).unwrap();
    assert_eq!(single, -5000);
    assert_eq!(single, many);
}

#[test]
fn test_serial_and_parallel_strategies_agree() {
    let data: Vec<u32> = (1..=4096).collect();
    let mut results = Vec::new();
    for strategy in [ExecutionStrategy::Serial, ExecutionStrategy::Parallel] {
        let runtime = RuntimeContext::new(RuntimeConfig::builder().with_strategy(strategy))
            .unwrap()
            .with_advisor(Arc::new(FixedOccupancy::new(32, 16)));
        results.push(reduce(&data, data.len(), 0u64, add, &runtime).unwrap());
    }
    assert_eq!(results, vec![8_390_656, 8_390_656]);
}

#[test]
fn test_float_sum_within_tolerance() {
    let data: Vec<f64> = (0..100_000).map(|i| 0.1 + (i % 10) as f64 * 1e-3).collect();
    let expected: f64 = data.iter().sum();
    let runtime = RuntimeContext::host().unwrap();
    let result = sum(&data, &runtime).unwrap();
    assert!(approx_eq(result, expected), "{result} vs {expected}");
}

#[test]
fn test_min_max_reductions() {
    let data: Vec<i32> = (0..3000).map(|i| (i * 37) % 2999 - 1500).collect();
    let runtime = fixed_runtime(32, 8);
    assert_eq!(reduce_min(&data, &runtime).unwrap(), data.iter().copied().min());
    assert_eq!(reduce_max(&data, &runtime).unwrap(), data.iter().copied().max());
}

#[test]
fn test_seed_slot_survives_partial_pass() {
    let runtime = fixed_runtime(16, 5);
    let data: Vec<u64> = vec![1; 1000];
    let sentinel = u64::MAX - 1;

    let partials = reduce_partials(data.as_slice(), sentinel, add, &runtime).unwrap();
    assert_eq!(partials.len(), 6);
    assert_eq!(partials.read(0).unwrap(), sentinel);
    assert_eq!(partials.as_slice()[1..].iter().sum::<u64>(), 1000);
    assert_eq!(runtime.stream().launches_completed(), 1);
}

#[test]
fn test_partials_buffer_sized_by_group_count() {
    // 100 elements in groups of 32 -> 4 groups even though 64 are allowed.
    let runtime = fixed_runtime(32, 64);
    let data: Vec<u64> = (0..100).collect();
    let partials = reduce_partials(data.as_slice(), 0, add, &runtime).unwrap();
    assert_eq!(partials.len(), 5);
}

#[test]
fn test_allocation_failure_is_reported() {
    // Five u64 slots are needed, only one fits.
    let runtime = RuntimeContext::new(RuntimeConfig::builder().with_memory_capacity(8))
        .unwrap()
        .with_advisor(Arc::new(FixedOccupancy::new(32, 4)));
    let data: Vec<u64> = (0..10_000).collect();

    let err = reduce(&data, data.len(), 0u64, add, &runtime).unwrap_err();
    assert!(matches!(
        err,
        ReduceError::OutOfMemory {
            requested: 40,
            available: 8
        }
    ));
    assert_eq!(runtime.stream().launches_completed(), 0);
}

#[test]
fn test_buffer_released_when_operator_panics() {
    let runtime = fixed_runtime(32, 4);
    let data: Vec<u64> = (0..1000).collect();

    let err = reduce(
        &data,
        data.len(),
        0u64,
        |a, b| {
            if b == 500 {
                panic!("operator rejected 500");
            }
            a + b
        },
        &runtime,
    )
    .unwrap_err();

    assert!(matches!(err, ReduceError::KernelLaunchFailed(_)));
    assert_eq!(runtime.allocator().bytes_in_use(), 0);

    // The runtime stays usable.
    assert_eq!(reduce(&data, data.len(), 0u64, add, &runtime).unwrap(), 499_500);
}

#[test]
fn test_unplaceable_footprint_is_a_configuration_error() {
    let properties = DeviceProperties {
        shared_memory_per_group: 4,
        ..DeviceProperties::host()
    };
    let runtime = RuntimeContext::new(RuntimeConfig::builder().with_properties(properties)).unwrap();
    let data: Vec<u64> = (0..100).collect();

    let err = reduce(&data, data.len(), 0u64, add, &runtime).unwrap_err();
    assert!(matches!(err, ReduceError::InvalidConfiguration(_)));
    assert_eq!(runtime.allocator().bytes_in_use(), 0);
    assert_eq!(runtime.stream().launches_completed(), 0);
}

#[test]
fn test_hardware_presets_reduce_correctly() {
    let data: Vec<u32> = (1..=20_000).collect();
    for properties in [
        DeviceProperties::ampere(),
        DeviceProperties::ada_lovelace(),
        DeviceProperties::generic(),
    ] {
        let name = properties.name.clone();
        let runtime =
            RuntimeContext::new(RuntimeConfig::builder().with_properties(properties)).unwrap();
        let result = reduce(&data, data.len(), 0u64, add, &runtime).unwrap();
        assert_eq!(result, 200_010_000, "device {name}");
    }
}

#[test]
fn test_struct_accumulator() {
    #[derive(Clone, Debug, PartialEq)]
    struct Stats {
        count: usize,
        min: i32,
        max: i32,
    }

    let data: Vec<i32> = (0..777).map(|i| (i * 13) % 401 - 200).collect();
    let runtime = fixed_runtime(64, 6);
    let stats = transform_reduce(
        &data,
        |&x| Stats {
            count: 1,
            min: x,
            max: x,
        },
        Stats {
            count: 0,
            min: i32::MAX,
            max: i32::MIN,
        },
        |a, b| Stats {
            count: a.count + b.count,
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        },
        &runtime,
    )
    .unwrap();

    assert_eq!(stats.count, 777);
    assert_eq!(Some(stats.min), data.iter().copied().min());
    assert_eq!(Some(stats.max), data.iter().copied().max());
}

#[test]
fn test_count_if_and_inner_product() {
    let runtime = fixed_runtime(32, 8);
    let data: Vec<u32> = (0..1000).collect();
    assert_eq!(count_if(&data, |x| x % 3 == 0, &runtime).unwrap(), 334);

    let a: Vec<f64> = (0..500).map(|i| i as f64).collect();
    let b: Vec<f64> = vec![0.5; 500];
    let dot = inner_product(&a, &b, 1.0, |x, y| x + y, |x, y| x * y, &runtime).unwrap();
    assert!(approx_eq(dot, 1.0 + 0.5 * 124_750.0));
}
