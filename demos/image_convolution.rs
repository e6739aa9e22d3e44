//! Gaussian blur of a synthetic image with direct, shared-memory and
//! separable kernels, for several filter sizes.

use wgpu_compute_bench::{Config, Convolution, Harness};

fn main() {
    env_logger::init();
    let config = Config::builder()
        .sizes([512, 1024, 2048])
        .iterations(3)
        .build()
        .expect("invalid configuration");
    let mut harness =
        Harness::from_env(config, &["convolution"]).expect("failed to set up harness");
    for ksize in [3, 5, 7, 11, 15] {
        let report = harness.run(|size| Convolution::new(size, ksize));
        println!("kernel {ksize}x{ksize}");
        println!("{report}");
    }
}
