//! All-pairs gravitational forces for growing body counts, naive and
//! tiled kernels against the CPU strategies.

use wgpu_compute_bench::{Config, Harness, NBody};

fn main() {
    env_logger::init();
    let config = Config::builder()
        .sizes([128, 256, 512, 1024, 2048, 4096])
        .build()
        .expect("invalid configuration");
    let mut harness = Harness::from_env(config, &["nbody"]).expect("failed to set up harness");
    let report = harness.run(NBody::new);
    println!("{report}");
}
