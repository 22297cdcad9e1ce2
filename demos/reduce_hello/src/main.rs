use std::sync::Arc;
use std::time::Instant;

use grid_reduce::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Two-Pass Grid Reduction ===\n");

    let runtime = RuntimeContext::host()?;
    print_device_info(&runtime)?;
    run_reductions(&runtime)?;
    run_forced_shapes()?;

    #[cfg(feature = "cuda")]
    {
        println!("\nInitializing CUDA runtime...");
        match gpu::init_cuda_runtime() {
            Ok(runtime) => run_gpu(&runtime)?,
            Err(e) => println!("CUDA not available: {:?}", e),
        }
    }

    #[cfg(all(feature = "wgpu", not(feature = "cuda")))]
    {
        println!("\nInitializing WGPU runtime...");
        match gpu::init_wgpu_runtime() {
            Ok(runtime) => run_gpu(&runtime)?,
            Err(e) => println!("WGPU not available: {:?}", e),
        }
    }

    Ok(())
}

/// Print the device limits and the launch shape the advisor picks.
fn print_device_info(runtime: &RuntimeContext) -> Result<()> {
    let props = runtime.device().properties();
    println!("  Backend:           {}", runtime.backend_name());
    println!("  Device:            {} (id {})", runtime.device().name(), runtime.device().device_id());
    println!("  Multiprocessors:   {}", props.multiprocessor_count);
    println!("  Max group size:    {}", props.max_units_per_group);
    println!("  Memory:            {:.0} MB", runtime.allocator().capacity() as f64 / 1_048_576.0);

    let planner =
        LaunchPlanner::from_advisor(runtime.advisor(), &KernelFootprint::for_accumulator::<f64>())?;
    let limits = planner.limits();
    println!(
        "  f64 reductions:    {} units per group, {} resident groups",
        limits.max_group_size, limits.max_resident_groups
    );
    println!();
    Ok(())
}

fn run_reductions(runtime: &RuntimeContext) -> Result<()> {
    let data: Vec<u32> = (1..=100).collect();
    let total = reduce(&data, data.len(), 0u64, |a, b| a + b, runtime)?;
    println!("Step 1: sum(1..=100) = {}", total);

    let empty: [u32; 0] = [];
    let seeded = reduce(&empty, 0, 7u64, |a, b| a + b, runtime)?;
    println!("Step 2: empty input with init 7 = {}", seeded);

    let floats: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.37).sin()).collect();
    println!(
        "Step 3: min = {:?}, max = {:?}",
        reduce_min(&floats, runtime)?,
        reduce_max(&floats, runtime)?
    );

    let big_n = 10_000_000usize;
    let big: Vec<f64> = (0..big_n).map(|i| (i % 1000) as f64).collect();
    let t0 = Instant::now();
    let big_sum = sum(&big, runtime)?;
    println!(
        "Step 4: sum of {} elements = {:.1} in {:.2?} ({} launches so far)",
        big_n,
        big_sum,
        t0.elapsed(),
        runtime.stream().launches_completed()
    );
    log::info!("{} bytes still reserved", runtime.allocator().bytes_in_use());
    Ok(())
}

/// The same reduction under several forced launch shapes.
fn run_forced_shapes() -> Result<()> {
    println!("\nStep 5: forced launch shapes");
    let data: Vec<u64> = (0..100_000).collect();
    for (group_size, max_groups) in [(1, 1), (32, 8), (256, 1024)] {
        let runtime = RuntimeContext::host()?
            .with_advisor(Arc::new(FixedOccupancy::new(group_size, max_groups)));
        let partials = reduce_partials(data.as_slice(), 0, |a, b| a + b, &runtime)?;
        let total = reduce(&data, data.len(), 0u64, |a, b| a + b, &runtime)?;
        println!(
            "  {:>3} units x {:>4} groups: {} partials, total {}",
            group_size,
            max_groups,
            partials.len() - 1,
            total
        );
    }
    Ok(())
}

#[cfg(any(feature = "cuda", feature = "wgpu"))]
fn run_gpu<R: gpu::CubeclRuntime>(runtime: &gpu::CubeclContext<R>) -> Result<()> {
    println!("  Backend: {}", runtime.backend_name());
    let data: Vec<f32> = (1..=1_000_000).map(|i| (i % 100) as f32).collect();
    let buffer = gpu::to_device(&data, runtime)?;

    let t0 = Instant::now();
    let total: f32 = gpu::sum_execute(&buffer, 0.0, runtime)?;
    runtime.sync();
    println!("  sum = {:.1} in {:.2?}", total, t0.elapsed());
    println!("  min = {:?}", gpu::min_execute::<_, f32>(&buffer, runtime)?);
    println!("  max = {:?}", gpu::max_execute::<_, f32>(&buffer, runtime)?);
    Ok(())
}
