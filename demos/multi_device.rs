//! Split one vector addition across every adapter, launch all parts
//! before waiting on any, and show whether they ran at the same time.

use wgpu_compute_bench::{
    run_partitioned, verify, workloads::reference, Config, DeviceCatalog, DeviceSlot, VectorAdd,
};

fn main() {
    env_logger::init();
    let config = Config::default();
    let n = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(1 << 24);
    let catalog = DeviceCatalog::enumerate(config.backends).expect("no compute adapter found");

    let mut slots = Vec::new();
    for device in catalog.list_devices() {
        match DeviceSlot::open(device, &["vector_add"], config.tile_size) {
            Ok(slot) => slots.push(slot),
            Err(e) => eprintln!("skipping {device}: {e}"),
        }
    }
    if slots.is_empty() {
        eprintln!("no usable device");
        std::process::exit(1);
    }

    let workload = VectorAdd::new(n);
    println!("Vector addition of {n} elements across {} device(s)\n", slots.len());
    let run = run_partitioned(&slots, &workload).expect("multi-device run failed");
    println!("{}\n", run.timeline);

    let expected = reference(&workload);
    println!("Result: {:?}", verify(&workload, &expected, &run.output));
}
