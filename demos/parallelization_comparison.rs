//! Matrix-vector multiply with every strategy the crate has: serial,
//! rayon parallel iterator, fixed thread pool and each adapter.

use wgpu_compute_bench::{Config, Harness, MatVec};

fn main() {
    env_logger::init();
    let config = Config::builder()
        .sizes([512, 1024, 2048, 4096])
        .build()
        .expect("invalid configuration");
    let mut harness = Harness::from_env(config, &["matvec"]).expect("failed to set up harness");
    println!(
        "Worker threads: {}, accelerators: {}\n",
        harness.config().worker_threads(),
        harness.accelerator_count()
    );
    let report = harness.run(MatVec::new);
    println!("{report}");
}
