//! Benchmark WGSL compute kernels on every available adapter against
//! serial and multi-threaded CPU baselines, using
//! [wgpu](https://github.com/gfx-rs/wgpu).
//!
//! The pieces, leaves first:
//!
//! * [`DeviceCatalog`] enumerates adapters across backends.
//! * [`KernelSource`] / [`CompiledProgram`] build a WGSL module for one
//!   device and resolve its entry points.
//! * [`engine`] uploads inputs, dispatches, waits and downloads, timing
//!   only the kernel itself.  It can also launch on several devices at
//!   once and report whether their runs overlapped.
//! * [`BaselineRunner`] computes the same workloads on the CPU serially,
//!   with rayon and with a fixed thread pool.
//! * [`Harness`] drives all of the above over a list of problem sizes,
//!   checks every accelerated output against the serial one and finds
//!   the size at which each device starts winning.
//!
//! Every call blocks until the device has finished.  For asynchronous
//! usage you can extract the `wgpu::Device` and `wgpu::Queue` from a
//! [`GpuContext`] and drive them from your own event loop.

pub mod baseline;
pub mod buffer;
pub mod config;
pub mod context;
pub mod device;
pub mod engine;
pub mod error;
pub mod harness;
pub mod kernels;
pub mod program;
pub mod report;
pub mod workloads;

// Re-export the most common types at the crate root so that users can
// simply `use wgpu_compute_bench::*;`.
pub use baseline::BaselineRunner;
pub use buffer::{AccessMode, GpuBuffer};
pub use config::{CompilePolicy, Config, ConfigBuilder};
pub use context::GpuContext;
pub use device::{Device, DeviceCatalog, DeviceId, DeviceType};
pub use engine::{
    dispatch, dispatch_concurrent, partition, Clock, Concurrency, DispatchDescriptor,
    DispatchOutput, Job, KernelArg, PassSpec, Timeline, TimingSample, WorkShape,
};
pub use error::{Error, Result};
pub use harness::{
    run_partitioned, verify, Accelerator, BenchmarkResult, BreakevenTracker, DeviceSlot,
    Harness, Implementation, Outcome, PartitionedRun, Phase,
};
pub use kernels::KernelSource;
pub use program::{CompiledProgram, Kernel};
pub use report::{BenchmarkReport, Breakeven};
pub use workloads::{Convolution, MatMul, MatVec, NBody, Partition, VectorAdd, Workload};
