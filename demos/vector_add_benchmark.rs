//! Vector addition of ten million elements: serial, rayon, thread pool
//! and every adapter, each verified against the serial result.

use wgpu_compute_bench::{Config, Harness, VectorAdd};

fn main() {
    env_logger::init();
    let n = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000_000);
    let config = Config::builder()
        .sizes([n])
        .build()
        .expect("invalid configuration");
    let mut harness = Harness::from_env(config, &["vector_add"]).expect("failed to set up harness");
    println!(
        "Vector addition, {n} elements, {} accelerator(s)\n",
        harness.accelerator_count()
    );
    let report = harness.run(VectorAdd::new);
    println!("{report}");
}
