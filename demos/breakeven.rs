//! Find the vector length at which each adapter first beats a serial
//! CPU loop.
//!
//! Only kernel time is compared, so the result is the breakeven for
//! data that already lives on the device.

use wgpu_compute_bench::{Config, Harness, VectorAdd};

fn main() {
    env_logger::init();
    let sizes = (10..=24).map(|p| 1usize << p);
    let config = Config::builder()
        .sizes(sizes)
        .build()
        .expect("invalid configuration");
    let mut harness = Harness::from_env(config, &["vector_add"]).expect("failed to set up harness");
    let report = harness.run(VectorAdd::new);

    println!("{:>10}  {:<40} {:>12} {:>9}", "size", "implementation", "time (ms)", "speedup");
    for r in &report.results {
        let Some(elapsed) = r.elapsed else { continue };
        println!(
            "{:>10}  {:<40} {:>12.4} {:>9}",
            r.size,
            r.implementation.to_string(),
            elapsed.as_secs_f64() * 1e3,
            r.speedup.map_or("-".to_string(), |s| format!("{s:.2}x"))
        );
    }
    println!();
    for b in &report.breakeven {
        match b.size {
            Some(size) => println!("{} breaks even at {size} elements", b.device_name),
            None => println!("{}: not reached (slower for all tested sizes)", b.device_name),
        }
    }
}
