//! CubeCL reduction kernels.
//!
//! Each kernel folds a grid-strided slice of `input[0..n)` per unit, reduces
//! the cube's active units in shared memory, and has unit 0 write
//! `output[offset + CUBE_POS]`. A unit is active when its first index is
//! below `n`; idle units never touch shared memory, so no identity value is
//! needed. The shared-memory tree pairs slot `t` with `t + ceil(active / 2)`,
//! so any cube size works.

// CubeCL's #[cube] macro generates code without docs
#![allow(missing_docs)]

use cubecl::prelude::*;

/// Units of this cube whose first grid-stride index is below `n`.
#[cube]
fn active_units(n: u32) -> u32 {
    let base = CUBE_POS * CUBE_DIM_X;
    let mut active: u32 = 0;
    if base < n {
        active = n - base;
        if active > CUBE_DIM_X {
            active = CUBE_DIM_X;
        }
    }
    active
}

#[cube(launch_unchecked)]
pub fn reduce_sum_kernel<F: Float>(
    input: &Array<F>,
    output: &mut Array<F>,
    n: u32,
    offset: u32,
    #[comptime] group_size: u32,
) {
    let mut shared = SharedMemory::<F>::new(group_size);
    let active = active_units(n);

    if UNIT_POS < active {
        let stride = CUBE_DIM_X * CUBE_COUNT_X;
        let mut i = CUBE_POS * CUBE_DIM_X + UNIT_POS;
        let mut acc = input[i];
        i += stride;
        while i < n {
            acc += input[i];
            i += stride;
        }
        shared[UNIT_POS] = acc;
    }
    sync_units();

    let mut remaining = active;
    while remaining > 1 {
        let half = remaining / 2;
        let upper = remaining - half;
        if UNIT_POS < half {
            shared[UNIT_POS] = shared[UNIT_POS] + shared[UNIT_POS + upper];
        }
        sync_units();
        remaining = upper;
    }

    if UNIT_POS == 0 {
        if active > 0 {
            output[offset + CUBE_POS] = shared[0];
        }
    }
}

#[cube(launch_unchecked)]
pub fn reduce_min_kernel<F: Float>(
    input: &Array<F>,
    output: &mut Array<F>,
    n: u32,
    offset: u32,
    #[comptime] group_size: u32,
) {
    let mut shared = SharedMemory::<F>::new(group_size);
    let active = active_units(n);

    if UNIT_POS < active {
        let stride = CUBE_DIM_X * CUBE_COUNT_X;
        let mut i = CUBE_POS * CUBE_DIM_X + UNIT_POS;
        let mut acc = input[i];
        i += stride;
        while i < n {
            let value = input[i];
            if value < acc {
                acc = value;
            }
            i += stride;
        }
        shared[UNIT_POS] = acc;
    }
    sync_units();

    let mut remaining = active;
    while remaining > 1 {
        let half = remaining / 2;
        let upper = remaining - half;
        if UNIT_POS < half {
            let other = shared[UNIT_POS + upper];
            if other < shared[UNIT_POS] {
                shared[UNIT_POS] = other;
            }
        }
        sync_units();
        remaining = upper;
    }

    if UNIT_POS == 0 {
        if active > 0 {
            output[offset + CUBE_POS] = shared[0];
        }
    }
}

#[cube(launch_unchecked)]
pub fn reduce_max_kernel<F: Float>(
    input: &Array<F>,
    output: &mut Array<F>,
    n: u32,
    offset: u32,
    #[comptime] group_size: u32,
) {
    let mut shared = SharedMemory::<F>::new(group_size);
    let active = active_units(n);

    if UNIT_POS < active {
        let stride = CUBE_DIM_X * CUBE_COUNT_X;
        let mut i = CUBE_POS * CUBE_DIM_X + UNIT_POS;
        let mut acc = input[i];
        i += stride;
        while i < n {
            let value = input[i];
            if value > acc {
                acc = value;
            }
            i += stride;
        }
        shared[UNIT_POS] = acc;
    }
    sync_units();

    let mut remaining = active;
    while remaining > 1 {
        let half = remaining / 2;
        let upper = remaining - half;
        if UNIT_POS < half {
            let other = shared[UNIT_POS + upper];
            if other > shared[UNIT_POS] {
                shared[UNIT_POS] = other;
            }
        }
        sync_units();
        remaining = upper;
    }

    if UNIT_POS == 0 {
        if active > 0 {
            output[offset + CUBE_POS] = shared[0];
        }
    }
}
