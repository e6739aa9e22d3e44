//! Square matrix multiplication: naive and shared-memory tiled kernels
//! against the CPU strategies.

use wgpu_compute_bench::{Config, Harness, MatMul};

fn main() {
    env_logger::init();
    let tile = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(16);
    let config = Config::builder()
        .sizes([128, 256, 512, 1024])
        .iterations(3)
        .tile_size(tile)
        .build()
        .expect("invalid configuration");
    let mut harness =
        Harness::from_env(config, &["matrix_multiply"]).expect("failed to set up harness");
    let report = harness.run(MatMul::new);
    println!("{report}");
}
