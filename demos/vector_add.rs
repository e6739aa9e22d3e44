//! Hello world: add two 1024-element vectors on the first adapter.
//!
//! `a[i] = i` and `b[i] = 2i`, so every result must be exactly `3i`.

use wgpu_compute_bench::{
    dispatch, CompiledProgram, DeviceCatalog, GpuContext, VectorAdd, Workload,
};

const N: usize = 1024;

fn main() {
    env_logger::init();
    let catalog = DeviceCatalog::from_env().expect("no compute adapter found");
    let device = &catalog.list_devices()[0];
    println!("Using {device}");

    let context = GpuContext::open(device).expect("failed to open GPU context");
    let workload = VectorAdd::ramp(N);
    let source = workload.source(16).expect("built-in program");
    let program = CompiledProgram::compile(&context, &source).expect("program failed to build");
    let descriptor = workload.bind("vector_add", 16).expect("bind");
    let out = dispatch(&context, &program, &descriptor).expect("dispatch failed");
    let result = &out.outputs[0];

    println!("First 10 results:");
    for i in 0..10 {
        println!("  {} + {} = {}", workload.a[i], workload.b[i], result[i]);
    }
    let wrong = result
        .iter()
        .enumerate()
        .filter(|(i, v)| **v != (3 * i) as f32)
        .count();
    if wrong == 0 {
        println!("All {N} results correct ({:?} on the {:?} clock)", out.timing.elapsed(), out.timing.clock);
    } else {
        println!("{wrong} of {N} results wrong");
        std::process::exit(1);
    }
}
