//! Criterion benchmarks comparing the CPU strategies and the first
//! available adapter on vector addition and matrix multiplication.
//!
//! To run the benchmarks use `cargo bench`.  Criterion will execute
//! each function multiple times and report statistics such as the
//! median and standard deviation of the run times.  The GPU bench
//! includes upload and download, which makes it representative of the
//! latency a caller sees; the harness itself only times the kernel.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use wgpu_compute_bench::{
    dispatch, BaselineRunner, CompiledProgram, Config, DeviceCatalog, GpuContext, MatMul,
    VectorAdd, Workload,
};

fn cpu_benchmarks(c: &mut Criterion) {
    let config = Config::builder().iterations(1).build().expect("valid config");
    let runner = BaselineRunner::new(&config).expect("thread pool");
    let mut group = c.benchmark_group("cpu");
    let workloads: Vec<Box<dyn Workload>> = vec![
        Box::new(VectorAdd::new(1 << 22)),
        Box::new(MatMul::new(256)),
    ];
    for w in &workloads {
        group.bench_with_input(BenchmarkId::new("serial", w.name()), w, |b, w| {
            b.iter(|| runner.run_serial(w.as_ref()))
        });
        group.bench_with_input(BenchmarkId::new("rayon", w.name()), w, |b, w| {
            b.iter(|| runner.run_data_parallel(w.as_ref()))
        });
        group.bench_with_input(BenchmarkId::new("thread_pool", w.name()), w, |b, w| {
            b.iter(|| runner.run_thread_pool(w.as_ref()))
        });
    }
    group.finish();
}

fn gpu_benchmarks(c: &mut Criterion) {
    // Skip quietly on machines without an adapter.
    let Ok(catalog) = DeviceCatalog::from_env() else {
        return;
    };
    let Some(device) = catalog.list_devices().first() else {
        return;
    };
    let context = GpuContext::open(device).expect("failed to open GPU context");
    let mut group = c.benchmark_group(format!("gpu {}", device.name));

    let add = VectorAdd::new(1 << 22);
    let mul = MatMul::new(256);
    let workloads: [&dyn Workload; 2] = [&add, &mul];
    for w in workloads {
        let source = w.source(16).expect("built-in program");
        let program = CompiledProgram::compile(&context, &source).expect("program builds");
        for variant in w.variants() {
            let descriptor = w.bind(variant, 16).expect("bind");
            group.bench_function(BenchmarkId::new(*variant, w.size()), |b| {
                b.iter(|| dispatch(&context, &program, &descriptor).expect("dispatch"))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, cpu_benchmarks, gpu_benchmarks);
criterion_main!(benches);
