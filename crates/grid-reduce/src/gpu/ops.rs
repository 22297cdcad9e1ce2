//! Two-pass reductions over CubeCL buffers.

use cubecl::prelude::*;

use crate::error::{ReduceError, Result};
use crate::gpu::kernels::{reduce_max_kernel, reduce_min_kernel, reduce_sum_kernel};
use crate::gpu::memory::{allocate, to_cpu, to_device};
use crate::gpu::runtime::{CubeclContext, GpuBuffer};
use crate::launch::{LaunchConfig, LaunchPlanner};
use crate::occupancy::KernelFootprint;

#[derive(Debug, Clone, Copy)]
enum Combine {
    Sum,
    Min,
    Max,
}

/// Sum of all elements of `input` plus `init`.
///
/// # Example
///
/// ```ignore
/// let data = to_device(&[1.0f32, 2.0, 3.0, 4.0], &runtime)?;
/// let sum = sum_execute(&data, 0.0f32, &runtime)?; // 10.0
/// ```
pub fn sum_execute<R: Runtime, F: Float + CubeElement + bytemuck::Pod>(
    input: &GpuBuffer<R>,
    init: F,
    runtime: &CubeclContext<R>,
) -> Result<F> {
    two_pass(Combine::Sum, input, Some(init), runtime)
}

/// Smallest element of `input`, or `None` if it is empty.
pub fn min_execute<R: Runtime, F: Float + CubeElement + bytemuck::Pod>(
    input: &GpuBuffer<R>,
    runtime: &CubeclContext<R>,
) -> Result<Option<F>> {
    if input.is_empty() {
        return Ok(None);
    }
    two_pass(Combine::Min, input, None, runtime).map(Some)
}

/// Largest element of `input`, or `None` if it is empty.
pub fn max_execute<R: Runtime, F: Float + CubeElement + bytemuck::Pod>(
    input: &GpuBuffer<R>,
    runtime: &CubeclContext<R>,
) -> Result<Option<F>> {
    if input.is_empty() {
        return Ok(None);
    }
    two_pass(Combine::Max, input, None, runtime).map(Some)
}

/// Reduce `input` in two launches.
///
/// With a seed, slot 0 of the partials holds it and pass 1 fills slots
/// `1..=num_groups`. Without one, the partials are exactly the group results.
fn two_pass<R: Runtime, F: Float + CubeElement + bytemuck::Pod>(
    combine: Combine,
    input: &GpuBuffer<R>,
    seed: Option<F>,
    runtime: &CubeclContext<R>,
) -> Result<F> {
    let planner =
        LaunchPlanner::from_advisor(runtime.advisor(), &KernelFootprint::for_accumulator::<F>())?;
    let Some(config) = planner.partial_pass(input.len()) else {
        return seed.ok_or_else(|| ReduceError::InvalidBufferSize {
            expected: 1,
            actual: 0,
        });
    };

    let (partials, offset) = match seed {
        Some(seed) => {
            let slots = vec![seed; config.num_groups + 1];
            (to_device(&slots, runtime)?, 1)
        }
        None => (allocate::<R, F>(config.num_groups, runtime)?, 0),
    };
    log::debug!(
        "{:?} pass 1 on {}: n={}, {} cubes x {} units",
        combine,
        runtime.backend_name(),
        input.len(),
        config.num_groups,
        config.group_size
    );
    launch::<R, F>(combine, input, &partials, offset, config, runtime)?;

    // Pass 2 writes to its own buffer so input and output never alias.
    let result = allocate::<R, F>(1, runtime)?;
    launch::<R, F>(combine, &partials, &result, 0, planner.combine_pass(), runtime)?;

    let values: Vec<F> = to_cpu(&result, runtime)?;
    values
        .first()
        .copied()
        .ok_or_else(|| ReduceError::CubeCL("empty result buffer".into()))
}

fn launch<R: Runtime, F: Float + CubeElement>(
    combine: Combine,
    input: &GpuBuffer<R>,
    output: &GpuBuffer<R>,
    offset: usize,
    config: LaunchConfig,
    runtime: &CubeclContext<R>,
) -> Result<()> {
    let to_u32 = |value: usize| {
        u32::try_from(value)
            .map_err(|_| ReduceError::CubeCL(format!("{} does not fit a u32 launch argument", value)))
    };
    let n = to_u32(input.len())?;
    let offset = to_u32(offset)?;
    let group_size = to_u32(config.group_size)?;

    let cube_count = CubeCount::Static(to_u32(config.num_groups)?, 1, 1);
    let cube_dim = CubeDim::new(group_size, 1, 1);
    let client = runtime.client();
    let input = ArrayArg::from_raw_parts(input.handle(), input.len(), 1);
    let output = ArrayArg::from_raw_parts(output.handle(), output.len(), 1);

    unsafe {
        match combine {
            Combine::Sum => reduce_sum_kernel::launch_unchecked::<F, R>(
                client,
                cube_count,
                cube_dim,
                input,
                output,
                ScalarArg::new(n),
                ScalarArg::new(offset),
                group_size,
            ),
            Combine::Min => reduce_min_kernel::launch_unchecked::<F, R>(
                client,
                cube_count,
                cube_dim,
                input,
                output,
                ScalarArg::new(n),
                ScalarArg::new(offset),
                group_size,
            ),
            Combine::Max => reduce_max_kernel::launch_unchecked::<F, R>(
                client,
                cube_count,
                cube_dim,
                input,
                output,
                ScalarArg::new(n),
                ScalarArg::new(offset),
                group_size,
            ),
        }
    }

    Ok(())
}
