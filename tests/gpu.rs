//! End-to-end checks on a real adapter.  Every test returns early when
//! the machine has none.

use wgpu_compute_bench::workloads::{reference, Body};
use wgpu_compute_bench::{
    dispatch, dispatch_concurrent, run_partitioned, verify, CompilePolicy, CompiledProgram,
    Concurrency, Config, Convolution, Device, DeviceCatalog, DeviceSlot, Error, GpuContext,
    Harness, Job, KernelSource, MatMul, MatVec, NBody, Outcome, Partition, Timeline, VectorAdd,
    Workload,
};

const BROKEN_WGSL: &str = "@compute @workgroup_size(1) fn main( {";

fn first_device() -> Option<Device> {
    let _ = env_logger::builder().is_test(true).try_init();
    let catalog = DeviceCatalog::from_env().ok()?;
    catalog
        .list_devices()
        .iter()
        .find(|d| d.supports_compute())
        .cloned()
}

fn context() -> Option<GpuContext> {
    GpuContext::open(&first_device()?).ok()
}

fn run(context: &GpuContext, workload: &dyn Workload, variant: &str, tile: u32) -> Vec<f32> {
    let source = workload.source(tile).unwrap();
    let program = CompiledProgram::compile(context, &source).unwrap();
    let descriptor = workload.bind(variant, tile).unwrap();
    let mut out = dispatch(context, &program, &descriptor).unwrap();
    out.outputs.remove(0)
}

fn assert_verified(workload: &dyn Workload, actual: &[f32]) {
    let expected = reference(workload);
    assert_eq!(verify(workload, &expected, actual), Outcome::Verified);
}

#[test]
fn vector_add_ramp_is_exact() {
    let Some(ctx) = context() else { return };
    let w = VectorAdd::ramp(1024);
    let out = run(&ctx, &w, "vector_add", 16);
    for (i, v) in out.iter().enumerate() {
        assert_eq!(*v, (3 * i) as f32);
    }
}

#[test]
fn two_by_two_matmul_every_variant() {
    let Some(ctx) = context() else { return };
    let w = MatMul::from_matrices(2, 2, 2, vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]);
    for tile in [2, 4, 16] {
        for variant in w.variants() {
            let out = run(&ctx, &w, variant, tile);
            let expected = [19.0, 22.0, 43.0, 50.0];
            for (a, e) in out.iter().zip(expected) {
                assert!((a - e).abs() <= 0.01, "{variant} tile {tile}: {out:?}");
            }
        }
    }
}

#[test]
fn tiled_variants_match_untiled() {
    let Some(ctx) = context() else { return };
    let mm = MatMul::new(37);
    let conv = Convolution::new(45, 7);
    let bodies = NBody::new(100);
    for tile in [4, 8, 16] {
        let naive = run(&ctx, &mm, "matrix_multiply", tile);
        let tiled = run(&ctx, &mm, "matrix_multiply_tiled", tile);
        assert_eq!(verify(&mm, &naive, &tiled), Outcome::Verified);
        assert_verified(&mm, &tiled);

        let direct = run(&ctx, &conv, "convolve_2d", tile);
        let local = run(&ctx, &conv, "convolve_2d_local", tile);
        assert_eq!(verify(&conv, &direct, &local), Outcome::Verified);
        assert_verified(&conv, &local);

        let plain = run(&ctx, &bodies, "compute_forces", tile);
        let tiled = run(&ctx, &bodies, "compute_forces_tiled", tile);
        assert_eq!(verify(&bodies, &plain, &tiled), Outcome::Verified);
        assert_verified(&bodies, &tiled);
    }
}

#[test]
fn separable_matches_direct_convolution() {
    let Some(ctx) = context() else { return };
    let conv = Convolution::new(64, 5);
    let out = run(&ctx, &conv, "separable", 16);
    assert_verified(&conv, &out);
}

#[test]
fn matvec_matches_serial() {
    let Some(ctx) = context() else { return };
    let w = MatVec::with_shape(300, 129);
    assert_verified(&w, &run(&ctx, &w, "matvec_multiply", 16));
}

#[test]
fn broken_source_reports_a_compile_log() {
    let Some(ctx) = context() else { return };
    let source = KernelSource::from_text("broken", BROKEN_WGSL);
    match CompiledProgram::compile(&ctx, &source) {
        Err(Error::Compile { program, log, .. }) => {
            assert_eq!(program, "broken");
            assert!(!log.is_empty());
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn missing_entry_point() {
    let Some(ctx) = context() else { return };
    let program = CompiledProgram::compile(&ctx, &KernelSource::load("vector_add").unwrap()).unwrap();
    assert!(program.lookup_entry_point("vector_add").is_ok());
    assert!(matches!(
        program.lookup_entry_point("vector_sub"),
        Err(Error::SymbolNotFound { .. })
    ));

    // Helpers are not dispatchable.
    let source = KernelSource::from_text(
        "helpers",
        "fn pixel(i: u32) -> u32 { return i; }\n\
         @compute @workgroup_size(1) fn touch() { _ = pixel(1u); }\n",
    );
    let program = CompiledProgram::compile(&ctx, &source).unwrap();
    assert!(program.lookup_entry_point("touch").is_ok());
    assert!(matches!(
        program.lookup_entry_point("pixel"),
        Err(Error::SymbolNotFound { .. })
    ));
}

#[test]
fn symmetric_pair_on_the_device() {
    let Some(ctx) = context() else { return };
    let w = NBody::from_bodies(
        vec![Body::new(-1.5, 0.5, 2.0, 3.0), Body::new(1.5, -0.5, -2.0, 3.0)],
        0.1,
    );
    for variant in w.variants() {
        for tile in [4, 16] {
            let out = run(&ctx, &w, variant, tile);
            for axis in 0..3 {
                assert!(
                    (out[axis] + out[4 + axis]).abs() <= 1e-5,
                    "{variant} tile {tile}: {out:?}"
                );
            }
            assert!(out[0] > 0.0 && out[4] < 0.0, "{variant} tile {tile}: {out:?}");
            assert_verified(&w, &out);
        }
    }
}

#[test]
fn concurrent_jobs_return_in_order() {
    let Some(device) = first_device() else { return };
    let (Ok(a), Ok(b)) = (GpuContext::open(&device), GpuContext::open(&device)) else {
        return;
    };
    let source = KernelSource::load("vector_add").unwrap();
    let pa = CompiledProgram::compile(&a, &source).unwrap();
    let pb = CompiledProgram::compile(&b, &source).unwrap();
    let w = VectorAdd::ramp(4096);
    let jobs = vec![
        Job {
            context: &a,
            program: &pa,
            descriptor: w.bind_rows(0..1000).unwrap(),
        },
        Job {
            context: &b,
            program: &pb,
            descriptor: w.bind_rows(1000..4096).unwrap(),
        },
    ];
    let results = dispatch_concurrent(&jobs);
    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first.outputs[0].len(), 1000);
    assert_eq!(second.outputs[0][0], 3000.0);
    assert!(first.host.elapsed() > std::time::Duration::ZERO);
}

#[test]
fn staggered_jobs_are_sequential() {
    let Some(device) = first_device() else { return };
    let (Ok(a), Ok(b)) = (GpuContext::open(&device), GpuContext::open(&device)) else {
        return;
    };
    let large_len = 1usize << 24;
    let limit = u64::from(b.device.limits().max_storage_buffer_binding_size);
    if (large_len * std::mem::size_of::<f32>()) as u64 > limit {
        return;
    }
    let source = KernelSource::load("vector_add").unwrap();
    let pa = CompiledProgram::compile(&a, &source).unwrap();
    let pb = CompiledProgram::compile(&b, &source).unwrap();

    // The tiny job finishes while the large one is still uploading.
    let small = VectorAdd::ramp(64);
    let large = VectorAdd::ramp(large_len);
    let jobs = vec![
        Job {
            context: &a,
            program: &pa,
            descriptor: small.bind("vector_add", 16).unwrap(),
        },
        Job {
            context: &b,
            program: &pb,
            descriptor: large.bind("vector_add", 16).unwrap(),
        },
    ];
    let results = dispatch_concurrent(&jobs);
    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first.outputs[0][63], 189.0);
    assert!(
        first.host.end_ns < second.host.start_ns,
        "small {:?} large {:?}",
        first.host,
        second.host
    );
    let timeline = Timeline::new(vec![
        ("small".to_string(), first.host),
        ("large".to_string(), second.host),
    ]);
    assert_eq!(timeline.pairs(), vec![(0, 1, Concurrency::Sequential)]);
}

#[test]
fn partitioned_run_reassembles_the_output() {
    let Some(device) = first_device() else { return };
    let slots: Vec<DeviceSlot> = (0..3)
        .filter_map(|_| DeviceSlot::open(&device, &["vector_add", "matvec"], 16).ok())
        .collect();
    if slots.is_empty() {
        return;
    }
    let add = VectorAdd::new(10_001);
    let run = run_partitioned(&slots, &add).unwrap();
    assert_verified(&add, &run.output);
    assert_eq!(run.timeline.entries.len(), slots.len());

    let mv = MatVec::with_shape(257, 64);
    let run = run_partitioned(&slots, &mv).unwrap();
    assert_verified(&mv, &run.output);
}

#[test]
fn harness_on_real_devices() {
    let Ok(catalog) = DeviceCatalog::from_env() else { return };
    let config = Config::builder()
        .sizes([64, 256])
        .iterations(1)
        .tile_size(8)
        .build()
        .unwrap();
    let mut harness = Harness::with_devices(config, &catalog, &["matrix_multiply"]).unwrap();
    let report = harness.run(MatMul::new);
    assert!(report.all_verified(), "{report}");
}

fn sources_with_a_broken_program() -> Vec<KernelSource> {
    vec![
        KernelSource::load("vector_add").unwrap(),
        KernelSource::from_text("broken", BROKEN_WGSL),
    ]
}

#[test]
fn build_failure_skips_the_device() {
    if context().is_none() {
        return;
    }
    let Ok(catalog) = DeviceCatalog::from_env() else { return };
    let config = Config::builder().sizes([256]).iterations(1).build().unwrap();
    let mut harness = Harness::with_sources(config, &catalog, &sources_with_a_broken_program()).unwrap();
    assert_eq!(harness.accelerator_count(), 0);
    assert!(harness
        .skipped()
        .iter()
        .any(|(_, e)| matches!(e, Error::Compile { program, .. } if program == "broken")));

    // The CPU implementations still run and verify.
    let report = harness.run(VectorAdd::new);
    assert_eq!(report.for_size(256).count(), 3);
    assert!(report.all_verified(), "{report}");
    assert!(report.skipped.iter().any(|(_, reason)| reason.contains("broken")));
}

#[test]
fn build_failure_aborts_under_abort_policy() {
    if context().is_none() {
        return;
    }
    let Ok(catalog) = DeviceCatalog::from_env() else { return };
    let config = Config::builder()
        .sizes([256])
        .iterations(1)
        .compile_policy(CompilePolicy::Abort)
        .build()
        .unwrap();
    match Harness::with_sources(config, &catalog, &sources_with_a_broken_program()) {
        Err(Error::Compile { program, .. }) => assert_eq!(program, "broken"),
        Err(e) => panic!("expected a compile error, got {e}"),
        Ok(_) => panic!("a build failure must abort the run"),
    }
}
