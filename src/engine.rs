//! Dispatching kernels and timing them.
//!
//! A dispatch goes through three stages:
//!
//! 1. [`prepare`] allocates device buffers, uploads the inputs, waits
//!    for the upload, and builds the bind group and one pipeline per pass.
//! 2. [`PreparedDispatch::launch`] records the compute passes and submits
//!    them without waiting.
//! 3. [`InFlight::wait`] blocks until the queue drains, resolves timing
//!    and downloads every output buffer.
//!
//! Only stage 2 to 3 is timed, so transfers never count as compute time.
//! [`dispatch`] runs all three back to back.  [`dispatch_concurrent`]
//! launches every job before waiting on any, which lets devices with
//! independent queues run at the same time.
//!
//! All device resources are owned wgpu handles and are released when
//! the stage holding them is dropped, including on error paths.

use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use log::debug;

use crate::buffer::{uniform_buffer, AccessMode, GpuBuffer};
use crate::context::GpuContext;
use crate::error::{Error, Result};
use crate::program::CompiledProgram;

/// Global iteration space of one pass, in invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkShape {
    Linear(u32),
    /// Width (x) then height (y).
    Grid(u32, u32),
}

/// One compute pass: an entry point run over a shape with a given
/// work-group size.  `workgroup` must match the `@workgroup_size` the
/// entry point declares; `workgroup[1]` is ignored for linear shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSpec {
    pub entry_point: &'static str,
    pub shape: WorkShape,
    pub workgroup: [u32; 2],
}

impl PassSpec {
    /// `len` invocations in one dimension, `workgroup` per group.
    ///
    /// ```
    /// use wgpu_compute_bench::PassSpec;
    ///
    /// let pass = PassSpec::linear("vector_add", 1000, 64);
    /// assert_eq!(pass.workgroups(65535).unwrap(), (16, 1));
    /// ```
    pub fn linear(entry_point: &'static str, len: u32, workgroup: u32) -> Self {
        Self {
            entry_point,
            shape: WorkShape::Linear(len),
            workgroup: [workgroup, 1],
        }
    }

    /// A `width` x `height` grid of invocations in `tile`-sized groups.
    pub fn grid(entry_point: &'static str, width: u32, height: u32, tile: [u32; 2]) -> Self {
        Self {
            entry_point,
            shape: WorkShape::Grid(width, height),
            workgroup: tile,
        }
    }

    /// Number of work-groups to launch in x and y.
    ///
    /// The global shape is rounded up to whole work-groups; kernels
    /// discard the excess invocations themselves.  Linear shapes whose
    /// group count exceeds `limit` are folded into a 2-D grid.
    pub fn workgroups(&self, limit: u32) -> Result<(u32, u32)> {
        if self.workgroup.contains(&0) {
            return Err(Error::dispatch("size dispatch", "work-group size must be > 0"));
        }
        let groups = match self.shape {
            WorkShape::Linear(n) => split_workgroups(round_up(n, self.workgroup[0]) / self.workgroup[0], limit),
            WorkShape::Grid(w, h) => (
                round_up(w, self.workgroup[0]) / self.workgroup[0],
                round_up(h, self.workgroup[1]) / self.workgroup[1],
            ),
        };
        if groups.0 > limit || groups.1 > limit {
            return Err(Error::dispatch(
                "size dispatch",
                format!(
                    "{:?} needs {}x{} work-groups, device allows {limit} per dimension",
                    self.shape, groups.0, groups.1
                ),
            ));
        }
        Ok(groups)
    }

    fn invocations_per_group(&self) -> u32 {
        match self.shape {
            WorkShape::Linear(_) => self.workgroup[0],
            WorkShape::Grid(..) => self.workgroup[0] * self.workgroup[1],
        }
    }
}

/// One kernel argument.  Arguments bind to consecutive binding indices
/// in the order they are listed.
#[derive(Debug, Clone)]
pub enum KernelArg<'a> {
    /// Read-only storage buffer uploaded from the host.
    Input(&'a [f32]),
    /// Storage buffer of this many `f32`s, downloaded after the dispatch.
    Output(usize),
    /// Device-only read/write storage shared between passes.
    Scratch(usize),
    /// Uniform parameter block.
    Uniform(Vec<u8>),
}

/// Everything needed to dispatch a program: its arguments and the
/// passes to run, in order, on one queue submission.
#[derive(Debug, Clone)]
pub struct DispatchDescriptor<'a> {
    pub args: Vec<KernelArg<'a>>,
    pub passes: Vec<PassSpec>,
}

impl<'a> DispatchDescriptor<'a> {
    pub fn new(args: Vec<KernelArg<'a>>, passes: Vec<PassSpec>) -> Self {
        Self { args, passes }
    }

    pub fn output_count(&self) -> usize {
        self.args
            .iter()
            .filter(|a| matches!(a, KernelArg::Output(_)))
            .count()
    }
}

/// Which clock a [`TimingSample`] was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// GPU timestamp queries.  Not comparable between devices.
    Device,
    /// Host monotonic clock, relative to a process-wide epoch.
    Host,
}

/// Start and end of one dispatch, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub start_ns: u64,
    pub end_ns: u64,
    pub clock: Clock,
}

impl TimingSample {
    pub fn new(start_ns: u64, end_ns: u64, clock: Clock) -> Self {
        Self {
            start_ns,
            end_ns,
            clock,
        }
    }

    /// Host sample spanning `start..end`.
    pub fn host(start: Instant, end: Instant) -> Self {
        Self::new(since_epoch(start), since_epoch(end), Clock::Host)
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.end_ns.saturating_sub(self.start_ns))
    }

    /// Whether the two intervals share at least one instant.
    pub fn overlaps(&self, other: &TimingSample) -> bool {
        !(self.end_ns < other.start_ns || other.end_ns < self.start_ns)
    }
}

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Current host time, with the epoch guaranteed to precede it.
fn host_now() -> Instant {
    epoch();
    Instant::now()
}

fn since_epoch(t: Instant) -> u64 {
    t.saturating_duration_since(epoch()).as_nanos() as u64
}

/// Round `global` up to the next multiple of `tile`.
pub fn round_up(global: u32, tile: u32) -> u32 {
    if tile == 0 {
        return global;
    }
    global.div_ceil(tile) * tile
}

/// Calculate an (x, y) workgroup grid that covers `total_groups`
/// workgroups without exceeding the per-dimension limit.
fn split_workgroups(total_groups: u32, limit: u32) -> (u32, u32) {
    if total_groups <= limit {
        (total_groups, 1)
    } else {
        (limit, total_groups.div_ceil(limit))
    }
}

/// Split `0..len` into `parts` contiguous ranges of `len / parts`
/// elements; the last range also takes the remainder.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let chunk = len / parts;
    (0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == parts { len } else { start + chunk };
            start..end
        })
        .collect()
}

enum Slot {
    Storage(GpuBuffer<f32>),
    Uniform(wgpu::Buffer),
}

impl Slot {
    fn binding_type(&self) -> wgpu::BindingType {
        let ty = match self {
            Slot::Storage(buffer) => buffer.access.binding_type(),
            Slot::Uniform(_) => wgpu::BufferBindingType::Uniform,
        };
        wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        }
    }

    fn buffer(&self) -> &wgpu::Buffer {
        match self {
            Slot::Storage(buffer) => &buffer.buffer,
            Slot::Uniform(buffer) => buffer,
        }
    }
}

struct Timer {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: GpuBuffer<u64>,
}

impl Timer {
    fn new(context: &GpuContext) -> Self {
        let query_set = context.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("dispatch_timestamps"),
            ty: wgpu::QueryType::Timestamp,
            count: 2,
        });
        let resolve = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dispatch_timestamps_resolve"),
            size: 2 * std::mem::size_of::<u64>() as u64,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Self {
            query_set,
            resolve,
            readback: GpuBuffer::new_download(context, 2),
        }
    }
}

/// Buffers uploaded and pipelines built; nothing submitted yet.
pub struct PreparedDispatch<'c> {
    context: &'c GpuContext,
    program: String,
    slots: Vec<Slot>,
    bind_group: wgpu::BindGroup,
    passes: Vec<(wgpu::ComputePipeline, (u32, u32))>,
    downloads: Vec<(usize, GpuBuffer<f32>)>,
    timer: Option<Timer>,
}

/// Compute passes submitted; results not yet collected.
pub struct InFlight<'c> {
    prepared: PreparedDispatch<'c>,
    started: Instant,
}

/// Result of one completed dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutput {
    /// One vector per [`KernelArg::Output`], in argument order.
    pub outputs: Vec<Vec<f32>>,
    /// Kernel time: device clock when available, host clock otherwise.
    pub timing: TimingSample,
    /// Host clock sample of the same interval, comparable across devices.
    pub host: TimingSample,
}

/// Allocate, upload and build everything `descriptor` needs on `context`.
pub fn prepare<'c>(
    context: &'c GpuContext,
    program: &CompiledProgram,
    descriptor: &DispatchDescriptor<'_>,
) -> Result<PreparedDispatch<'c>> {
    if program.device_id() != context.device_id() {
        return Err(Error::dispatch(
            "bind program",
            format!(
                "`{}` was compiled for device {}, not {} ({})",
                program.name(),
                program.device_id(),
                context.device_id(),
                context.name()
            ),
        ));
    }
    if descriptor.passes.is_empty() {
        return Err(Error::dispatch("enqueue kernel", "no passes to run"));
    }

    let limits = context.device.limits();
    let max_binding = u64::from(limits.max_storage_buffer_binding_size);
    for (binding, arg) in descriptor.args.iter().enumerate() {
        let len = match arg {
            KernelArg::Input(data) => data.len(),
            KernelArg::Output(len) | KernelArg::Scratch(len) => *len,
            KernelArg::Uniform(bytes) => bytes.len(),
        };
        if len == 0 {
            return Err(Error::transfer(
                "allocate buffer",
                format!("binding {binding} is empty"),
            ));
        }
        let bytes = (len * std::mem::size_of::<f32>()) as u64;
        if !matches!(arg, KernelArg::Uniform(_)) && bytes > max_binding {
            return Err(Error::transfer(
                "allocate buffer",
                format!("binding {binding} needs {bytes} bytes, device allows {max_binding}"),
            ));
        }
    }

    let mut groups = Vec::with_capacity(descriptor.passes.len());
    for pass in &descriptor.passes {
        if pass.invocations_per_group() > limits.max_compute_invocations_per_workgroup {
            return Err(Error::dispatch(
                "size dispatch",
                format!(
                    "`{}` work-group of {} invocations exceeds the device limit of {}",
                    pass.entry_point,
                    pass.invocations_per_group(),
                    limits.max_compute_invocations_per_workgroup
                ),
            ));
        }
        groups.push(pass.workgroups(limits.max_compute_workgroups_per_dimension)?);
    }

    let (slots, downloads) = context.scoped(
        || {
            let mut slots = Vec::with_capacity(descriptor.args.len());
            let mut downloads = Vec::new();
            for arg in &descriptor.args {
                let slot = match arg {
                    KernelArg::Input(data) => Slot::Storage(GpuBuffer::from_slice(context, data)),
                    KernelArg::Output(len) => {
                        downloads.push((slots.len(), GpuBuffer::new_download(context, *len)));
                        Slot::Storage(GpuBuffer::new_storage(context, *len, AccessMode::WriteOnly))
                    }
                    KernelArg::Scratch(len) => {
                        Slot::Storage(GpuBuffer::new_storage(context, *len, AccessMode::ReadWrite))
                    }
                    KernelArg::Uniform(bytes) => Slot::Uniform(uniform_buffer(context, bytes)),
                };
                slots.push(slot);
            }
            context.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
            (slots, downloads)
        },
        |e| Error::transfer("upload buffers", e.to_string()),
    )?;
    context
        .device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| Error::transfer("upload buffers", e.to_string()))?;

    let mut kernels = Vec::with_capacity(descriptor.passes.len());
    for pass in &descriptor.passes {
        kernels.push(program.lookup_entry_point(pass.entry_point)?);
    }

    let (bind_group, pipeline_layout) = context.scoped(
        || {
            let entries: Vec<_> = slots
                .iter()
                .enumerate()
                .map(|(i, slot)| wgpu::BindGroupLayoutEntry {
                    binding: i as u32,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: slot.binding_type(),
                    count: None,
                })
                .collect();
            let layout = context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("dispatch_bind_group_layout"),
                    entries: &entries,
                });
            let bindings: Vec<_> = slots
                .iter()
                .enumerate()
                .map(|(i, slot)| wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource: slot.buffer().as_entire_binding(),
                })
                .collect();
            let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("dispatch_bind_group"),
                layout: &layout,
                entries: &bindings,
            });
            let pipeline_layout =
                context
                    .device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("dispatch_pipeline_layout"),
                        bind_group_layouts: &[&layout],
                        push_constant_ranges: &[],
                    });
            (bind_group, pipeline_layout)
        },
        |e| Error::dispatch("bind arguments", e.to_string()),
    )?;

    // An entry point that does not validate against this layout is a
    // build failure of the program on this device.
    let pipelines = context.scoped(
        || {
            kernels
                .iter()
                .map(|kernel| {
                    context
                        .device
                        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(&kernel.entry_point),
                            layout: Some(&pipeline_layout),
                            module: &kernel.module,
                            entry_point: Some(&kernel.entry_point),
                            compilation_options: wgpu::PipelineCompilationOptions::default(),
                            cache: None,
                        })
                })
                .collect::<Vec<_>>()
        },
        |e| program.build_error(e.to_string()),
    )?;

    for (pass, (x, y)) in descriptor.passes.iter().zip(&groups) {
        debug!(
            "{}::{} on {}: {:?} as {}x{} groups of {:?}",
            program.name(),
            pass.entry_point,
            context.name(),
            pass.shape,
            x,
            y,
            pass.workgroup
        );
    }

    Ok(PreparedDispatch {
        context,
        program: program.name().to_string(),
        slots,
        bind_group,
        passes: pipelines.into_iter().zip(groups).collect(),
        downloads,
        timer: context.has_timestamps().then(|| Timer::new(context)),
    })
}

impl<'c> PreparedDispatch<'c> {
    /// Record and submit the compute passes.  Returns as soon as the
    /// work is queued.
    pub fn launch(self) -> Result<InFlight<'c>> {
        let context = self.context;
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("dispatch_encoder"),
            });
        let last = self.passes.len() - 1;
        for (i, (pipeline, (x, y))) in self.passes.iter().enumerate() {
            let timestamp_writes =
                self.timer
                    .as_ref()
                    .map(|timer| wgpu::ComputePassTimestampWrites {
                        query_set: &timer.query_set,
                        beginning_of_pass_write_index: (i == 0).then_some(0),
                        end_of_pass_write_index: (i == last).then_some(1),
                    });
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("dispatch_pass"),
                timestamp_writes,
            });
            cpass.set_pipeline(pipeline);
            cpass.set_bind_group(0, &self.bind_group, &[]);
            cpass.dispatch_workgroups(*x, *y, 1);
        }
        if let Some(timer) = &self.timer {
            encoder.resolve_query_set(&timer.query_set, 0..2, &timer.resolve, 0);
            encoder.copy_buffer_to_buffer(
                &timer.resolve,
                0,
                &timer.readback.buffer,
                0,
                timer.readback.size_bytes(),
            );
        }

        let started = host_now();
        context.scoped(
            || {
                context.queue.submit([encoder.finish()]);
            },
            |e| Error::dispatch("enqueue kernel", e.to_string()),
        )?;
        Ok(InFlight {
            prepared: self,
            started,
        })
    }
}

impl InFlight<'_> {
    /// Block until the passes finish, then download the outputs.
    pub fn wait(self) -> Result<DispatchOutput> {
        let prepared = self.prepared;
        let context = prepared.context;
        context.wait_idle("wait for kernel")?;
        let host = TimingSample::host(self.started, Instant::now());

        let timing = match &prepared.timer {
            Some(timer) => {
                let ticks = timer.readback.read_to_vec(context)?;
                device_sample(&ticks, context.timestamp_period()).unwrap_or_else(|| {
                    debug!(
                        "{} on {}: timestamps unusable, using host clock",
                        prepared.program,
                        context.name()
                    );
                    host
                })
            }
            None => host,
        };

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("download_encoder"),
            });
        for (slot, download) in &prepared.downloads {
            encoder.copy_buffer_to_buffer(
                prepared.slots[*slot].buffer(),
                0,
                &download.buffer,
                0,
                download.size_bytes(),
            );
        }
        context.scoped(
            || {
                context.queue.submit([encoder.finish()]);
            },
            |e| Error::transfer("download buffers", e.to_string()),
        )?;
        let outputs = prepared
            .downloads
            .iter()
            .map(|(_, download)| download.read_to_vec(context))
            .collect::<Result<Vec<_>>>()?;

        Ok(DispatchOutput {
            outputs,
            timing,
            host,
        })
    }
}

fn device_sample(ticks: &[u64], period: f64) -> Option<TimingSample> {
    match ticks {
        [start, end] if end > start => Some(TimingSample::new(
            (*start as f64 * period) as u64,
            (*end as f64 * period) as u64,
            Clock::Device,
        )),
        _ => None,
    }
}

/// Prepare, launch and wait for one dispatch.
pub fn dispatch(
    context: &GpuContext,
    program: &CompiledProgram,
    descriptor: &DispatchDescriptor<'_>,
) -> Result<DispatchOutput> {
    prepare(context, program, descriptor)?.launch()?.wait()
}

/// One entry of a multi-device run.
pub struct Job<'a> {
    pub context: &'a GpuContext,
    pub program: &'a CompiledProgram,
    pub descriptor: DispatchDescriptor<'a>,
}

/// Launch every job and wait for all of them.
///
/// Jobs are prepared and submitted one after another.  Each job gets its
/// own scoped waiter thread as soon as it is submitted, so its host
/// sample ends when that device went idle rather than when the last job
/// was launched.  Results are returned in job order; a job that fails
/// does not affect the others.
pub fn dispatch_concurrent(jobs: &[Job<'_>]) -> Vec<Result<DispatchOutput>> {
    std::thread::scope(|scope| {
        let waiters: Vec<_> = jobs
            .iter()
            .map(|job| {
                let in_flight = prepare(job.context, job.program, &job.descriptor)
                    .and_then(PreparedDispatch::launch);
                scope.spawn(move || in_flight.and_then(InFlight::wait))
            })
            .collect();
        waiters
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::dispatch("wait for kernel", "waiter thread panicked")))
            })
            .collect()
    })
}

/// Observed relation between two dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    Concurrent,
    Sequential,
}

impl Concurrency {
    pub fn classify(a: &TimingSample, b: &TimingSample) -> Self {
        if a.overlaps(b) {
            Concurrency::Concurrent
        } else {
            Concurrency::Sequential
        }
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Concurrency::Concurrent => "CONCURRENT EXECUTION",
            Concurrency::Sequential => "Sequential",
        })
    }
}

/// Labelled samples from one multi-device run.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub entries: Vec<(String, TimingSample)>,
}

impl Timeline {
    pub fn new(entries: Vec<(String, TimingSample)>) -> Self {
        Self { entries }
    }

    pub fn earliest_start(&self) -> Option<u64> {
        self.entries.iter().map(|(_, s)| s.start_ns).min()
    }

    pub fn latest_end(&self) -> Option<u64> {
        self.entries.iter().map(|(_, s)| s.end_ns).max()
    }

    /// Time from the first start to the last end.
    pub fn span(&self) -> Duration {
        match (self.earliest_start(), self.latest_end()) {
            (Some(start), Some(end)) => Duration::from_nanos(end.saturating_sub(start)),
            _ => Duration::ZERO,
        }
    }

    /// Every unordered pair of entries with its classification.
    pub fn pairs(&self) -> Vec<(usize, usize, Concurrency)> {
        let mut pairs = Vec::new();
        for i in 0..self.entries.len() {
            for j in i + 1..self.entries.len() {
                let c = Concurrency::classify(&self.entries[i].1, &self.entries[j].1);
                pairs.push((i, j, c));
            }
        }
        pairs
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = self.earliest_start().unwrap_or(0);
        for (label, sample) in &self.entries {
            writeln!(
                f,
                "{label:<32} start {:>10.3} ms  end {:>10.3} ms  ({:.3} ms)",
                (sample.start_ns - origin) as f64 / 1e6,
                (sample.end_ns - origin) as f64 / 1e6,
                sample.elapsed().as_secs_f64() * 1e3
            )?;
        }
        for (i, j, c) in self.pairs() {
            writeln!(f, "{} / {}: {c}", self.entries[i].0, self.entries[j].0)?;
        }
        write!(f, "total span {:.3} ms", self.span().as_secs_f64() * 1e3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_up(1000, 16), 1008);
        assert_eq!(round_up(1024, 16), 1024);
        assert_eq!(round_up(1, 64), 64);
        assert_eq!(round_up(7, 0), 7);
    }

    #[test]
    fn split_respects_the_limit() {
        assert_eq!(split_workgroups(100, 65535), (100, 1));
        assert_eq!(split_workgroups(70000, 65535), (65535, 2));
        assert_eq!(split_workgroups(131071, 65535), (65535, 3));
    }

    #[test]
    fn pass_workgroups() {
        let pass = PassSpec::linear("vector_add", 1000, 64);
        assert_eq!(pass.workgroups(65535).unwrap(), (16, 1));

        let pass = PassSpec::grid("matrix_multiply", 33, 17, [16, 16]);
        assert_eq!(pass.workgroups(65535).unwrap(), (3, 2));

        let pass = PassSpec::grid("matrix_multiply", 1 << 20, 1, [1, 1]);
        assert!(pass.workgroups(65535).is_err());

        let pass = PassSpec::linear("vector_add", 10, 0);
        assert!(pass.workgroups(65535).is_err());
    }

    #[test]
    fn partition_gives_remainder_to_last() {
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(8, 2), vec![0..4, 4..8]);
        assert_eq!(partition(2, 4), vec![0..0, 0..0, 0..0, 0..2]);
        assert!(partition(5, 0).is_empty());
        let parts = partition(1001, 4);
        assert_eq!(parts.iter().map(|r| r.len()).sum::<usize>(), 1001);
    }

    #[test]
    fn disjoint_intervals_are_sequential() {
        let a = TimingSample::new(0, 100, Clock::Host);
        let b = TimingSample::new(150, 300, Clock::Host);
        assert_eq!(Concurrency::classify(&a, &b), Concurrency::Sequential);
        assert_eq!(Concurrency::classify(&b, &a), Concurrency::Sequential);
        assert_eq!(Concurrency::Sequential.to_string(), "Sequential");
    }

    #[test]
    fn overlapping_intervals_are_concurrent() {
        let a = TimingSample::new(0, 200, Clock::Host);
        let b = TimingSample::new(150, 300, Clock::Host);
        assert_eq!(Concurrency::classify(&a, &b), Concurrency::Concurrent);
        // Touching endpoints count as overlap.
        let c = TimingSample::new(300, 400, Clock::Host);
        assert_eq!(Concurrency::classify(&b, &c), Concurrency::Concurrent);
        assert_eq!(Concurrency::Concurrent.to_string(), "CONCURRENT EXECUTION");
    }

    #[test]
    fn timeline_span() {
        let timeline = Timeline::new(vec![
            ("gpu0".into(), TimingSample::new(1_000, 5_000, Clock::Host)),
            ("gpu1".into(), TimingSample::new(2_000, 9_000, Clock::Host)),
            ("gpu2".into(), TimingSample::new(9_500, 9_900, Clock::Host)),
        ]);
        assert_eq!(timeline.earliest_start(), Some(1_000));
        assert_eq!(timeline.latest_end(), Some(9_900));
        assert_eq!(timeline.span(), Duration::from_nanos(8_900));
        assert_eq!(
            timeline.pairs(),
            vec![
                (0, 1, Concurrency::Concurrent),
                (0, 2, Concurrency::Sequential),
                (1, 2, Concurrency::Sequential),
            ]
        );
        assert!(timeline.to_string().contains("CONCURRENT EXECUTION"));
        assert_eq!(Timeline::default().span(), Duration::ZERO);
    }

    #[test]
    fn host_samples_are_ordered() {
        let start = host_now();
        let end = start + Duration::from_millis(3);
        let sample = TimingSample::host(start, end);
        assert_eq!(sample.clock, Clock::Host);
        assert!(sample.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn device_ticks() {
        let sample = device_sample(&[100, 300], 2.0).unwrap();
        assert_eq!(sample.elapsed(), Duration::from_nanos(400));
        assert_eq!(sample.clock, Clock::Device);
        assert!(device_sample(&[0, 0], 1.0).is_none());
        assert!(device_sample(&[5], 1.0).is_none());
    }
}
