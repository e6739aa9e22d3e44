//! Benchmark orchestration.
//!
//! For every configured problem size the harness walks the [`Phase`]
//! state machine: time the CPU baselines, time every accelerated variant
//! on every device, verify each output against the serial one, then
//! record results and breakeven points.  Nothing but an invalid
//! configuration stops a run; per-device failures become failed results.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::time::Duration;

use log::{debug, info, warn};

use crate::baseline::BaselineRunner;
use crate::config::Config;
use crate::context::GpuContext;
use crate::device::{Device, DeviceCatalog, DeviceId};
use crate::engine::{self, dispatch_concurrent, partition, Job, Timeline, TimingSample};
use crate::error::{Error, Result};
use crate::kernels::KernelSource;
use crate::program::CompiledProgram;
use crate::report::{BenchmarkReport, Breakeven};
use crate::workloads::{Partition, Workload};

/// Where the harness is within one problem size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    RunBaseline,
    /// Timing the accelerator with this index.
    RunAccelerated(usize),
    Verify,
    Report,
    Done,
}

impl Phase {
    /// Transition out of `self`.  `Report` leads back to `Init` while
    /// sizes remain and to `Done` after the last one.
    pub fn next(self, accelerators: usize, more_sizes: bool) -> Phase {
        match self {
            Phase::Init => Phase::RunBaseline,
            Phase::RunBaseline if accelerators > 0 => Phase::RunAccelerated(0),
            Phase::RunBaseline => Phase::Verify,
            Phase::RunAccelerated(i) if i + 1 < accelerators => Phase::RunAccelerated(i + 1),
            Phase::RunAccelerated(_) => Phase::Verify,
            Phase::Verify => Phase::Report,
            Phase::Report if more_sizes => Phase::Init,
            Phase::Report | Phase::Done => Phase::Done,
        }
    }
}

/// Anything that can run a workload variant and time it.
pub trait Accelerator {
    fn id(&self) -> DeviceId;

    fn name(&self) -> &str;

    /// Run `variant` of `workload` once, returning the primary output and
    /// the kernel timing.
    fn execute(&self, workload: &dyn Workload, variant: &str) -> Result<(Vec<f32>, TimingSample)>;
}

/// A device opened for benchmarking: its context plus one compiled
/// program per workload program name.
pub struct DeviceSlot {
    pub device: Device,
    pub context: GpuContext,
    programs: HashMap<String, CompiledProgram>,
    tile: u32,
}

impl DeviceSlot {
    /// Open `device` and compile every built-in program in `programs`,
    /// each specialised for `tile`.
    pub fn open(device: &Device, programs: &[&str], tile: u32) -> Result<Self> {
        let sources = load_all(programs)?;
        Self::with_sources(device, &sources, tile)
    }

    /// Like [`Self::open`] with caller-supplied sources.  Programs are
    /// keyed by [`KernelSource::name`].
    pub fn with_sources(device: &Device, sources: &[KernelSource], tile: u32) -> Result<Self> {
        let context = GpuContext::open(device)?;
        let mut compiled = HashMap::with_capacity(sources.len());
        for source in sources {
            let source = source.clone().with_constant("TILE", tile);
            let program = CompiledProgram::compile(&context, &source)?;
            compiled.insert(source.name, program);
        }
        Ok(Self {
            device: device.clone(),
            context,
            programs: compiled,
            tile,
        })
    }

    pub fn tile(&self) -> u32 {
        self.tile
    }

    pub fn program(&self, name: &str) -> Result<&CompiledProgram> {
        self.programs.get(name).ok_or_else(|| {
            Error::dispatch(
                "bind program",
                format!("program `{name}` was not compiled for {}", self.device.name),
            )
        })
    }
}

impl Accelerator for DeviceSlot {
    fn id(&self) -> DeviceId {
        self.device.id()
    }

    fn name(&self) -> &str {
        &self.device.name
    }

    fn execute(&self, workload: &dyn Workload, variant: &str) -> Result<(Vec<f32>, TimingSample)> {
        let program = self.program(workload.program())?;
        let descriptor = workload.bind(variant, self.tile)?;
        let out = engine::dispatch(&self.context, program, &descriptor)?;
        let output = out
            .outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::transfer("read buffer", "dispatch produced no output"))?;
        Ok((output, out.timing))
    }
}

impl fmt::Debug for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSlot")
            .field("device", &self.device.name)
            .field("programs", &self.programs.keys().collect::<Vec<_>>())
            .field("tile", &self.tile)
            .finish()
    }
}

fn load_all(programs: &[&str]) -> Result<Vec<KernelSource>> {
    programs.iter().map(|name| KernelSource::load(name)).collect()
}

/// Which code path produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Implementation {
    Serial,
    DataParallel,
    ThreadPool { threads: usize },
    Accelerated {
        device: DeviceId,
        device_name: String,
        variant: String,
    },
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Serial => f.write_str("serial"),
            Implementation::DataParallel => f.write_str("rayon par_iter"),
            Implementation::ThreadPool { threads } => write!(f, "thread pool ({threads})"),
            Implementation::Accelerated {
                device_name,
                variant,
                ..
            } => write!(f, "{device_name} [{variant}]"),
        }
    }
}

/// Verification status of one result.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Verified,
    Mismatch { index: usize, max_error: f32 },
    Failed(String),
}

impl Outcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Outcome::Verified)
    }
}

/// Compare `actual` against the serial `expected` output element by
/// element using the workload's tolerance.
pub fn verify(workload: &dyn Workload, expected: &[f32], actual: &[f32]) -> Outcome {
    if expected.len() != actual.len() {
        return Outcome::Mismatch {
            index: expected.len().min(actual.len()),
            max_error: f32::INFINITY,
        };
    }
    let mut first_bad = None;
    let mut max_error = 0.0f32;
    for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
        let err = (e - a).abs();
        // NaN never compares within tolerance.
        if !(err <= workload.tolerance(*e)) {
            first_bad.get_or_insert(i);
            max_error = if err.is_nan() { f32::INFINITY } else { max_error.max(err) };
        }
    }
    match first_bad {
        None => Outcome::Verified,
        Some(index) => Outcome::Mismatch { index, max_error },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub size: usize,
    pub implementation: Implementation,
    pub outcome: Outcome,
    /// Best time over all iterations, when at least one ran.
    pub elapsed: Option<Duration>,
    /// Set only for verified outcomes.
    pub gflops: Option<f64>,
    /// Serial time divided by this time.  Set only for verified outcomes.
    pub speedup: Option<f64>,
}

impl BenchmarkResult {
    fn new(
        size: usize,
        implementation: Implementation,
        outcome: Outcome,
        elapsed: Option<Duration>,
        flops: f64,
        serial: Duration,
    ) -> Self {
        let timed = elapsed.filter(|e| outcome.is_verified() && !e.is_zero());
        Self {
            size,
            implementation,
            gflops: timed.map(|e| flops / e.as_secs_f64() / 1e9),
            speedup: timed.map(|e| serial.as_secs_f64() / e.as_secs_f64()),
            outcome,
            elapsed,
        }
    }
}

/// First size at which each (device, variant) beat the serial baseline.
/// Entries are latched: later sizes never change them.
#[derive(Debug, Clone, Default)]
pub struct BreakevenTracker {
    latched: BTreeMap<(DeviceId, String), usize>,
}

impl BreakevenTracker {
    /// Record a verified measurement.  Returns true when this call
    /// latched a new breakeven point.
    pub fn observe(
        &mut self,
        device: DeviceId,
        variant: &str,
        size: usize,
        elapsed: Duration,
        serial: Duration,
    ) -> bool {
        let key = (device, variant.to_string());
        if self.latched.contains_key(&key) || elapsed >= serial {
            return false;
        }
        self.latched.insert(key, size);
        true
    }

    pub fn get(&self, device: DeviceId, variant: &str) -> Option<usize> {
        self.latched.get(&(device, variant.to_string())).copied()
    }
}

pub struct Harness {
    config: Config,
    baseline: BaselineRunner,
    accelerators: Vec<Box<dyn Accelerator>>,
    skipped: Vec<(String, Error)>,
    breakeven: BreakevenTracker,
}

impl Harness {
    /// CPU-only harness.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_accelerators(config, Vec::new())
    }

    pub fn with_accelerators(config: Config, accelerators: Vec<Box<dyn Accelerator>>) -> Result<Self> {
        config.validate()?;
        let baseline = BaselineRunner::new(&config)?;
        Ok(Self {
            config,
            baseline,
            accelerators,
            skipped: Vec::new(),
            breakeven: BreakevenTracker::default(),
        })
    }

    /// Open every catalog device matching the configured type filter and
    /// compile the built-in `programs` on it.
    pub fn with_devices(config: Config, catalog: &DeviceCatalog, programs: &[&str]) -> Result<Self> {
        let sources = load_all(programs)?;
        Self::with_sources(config, catalog, &sources)
    }

    /// Like [`Self::with_devices`] with caller-supplied sources.
    ///
    /// A device that cannot be opened is always skipped.  A device whose
    /// programs fail to build is skipped under
    /// [`crate::CompilePolicy::SkipDevice`] and fails the whole call under
    /// [`crate::CompilePolicy::Abort`].
    pub fn with_sources(config: Config, catalog: &DeviceCatalog, sources: &[KernelSource]) -> Result<Self> {
        let mut harness = Self::new(config)?;
        let tile = harness.config.tile_size;
        let policy = harness.config.compile_policy;
        for device in catalog.filter(harness.config.device_types) {
            match DeviceSlot::with_sources(device, sources, tile) {
                Ok(slot) => harness.accelerators.push(Box::new(slot)),
                Err(e) if policy.aborts_on(&e) => return Err(e),
                Err(e) => {
                    warn!("skipping {device}: {e}");
                    harness.skipped.push((device.name.clone(), e));
                }
            }
        }
        Ok(harness)
    }

    /// Like [`Self::with_devices`], enumerating the configured backends.
    /// When no adapter exists the harness still runs the CPU baselines.
    pub fn from_env(config: Config, programs: &[&str]) -> Result<Self> {
        match DeviceCatalog::enumerate(config.backends) {
            Ok(catalog) => Self::with_devices(config, &catalog, programs),
            Err(e @ Error::Enumeration(_)) => {
                warn!("{e}; running CPU baselines only");
                Self::new(config)
            }
            Err(e) => Err(e),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn accelerator_count(&self) -> usize {
        self.accelerators.len()
    }

    /// Devices dropped while opening, with the reason.
    pub fn skipped(&self) -> &[(String, Error)] {
        &self.skipped
    }

    pub fn breakeven(&self) -> &BreakevenTracker {
        &self.breakeven
    }

    /// Benchmark the workload built by `make` at every configured size.
    /// Breakeven points are tracked per call.
    pub fn run<W, F>(&mut self, mut make: F) -> BenchmarkReport
    where
        W: Workload,
        F: FnMut(usize) -> W,
    {
        let sizes = self.config.sizes.clone();
        self.breakeven = BreakevenTracker::default();
        let mut report = BenchmarkReport::default();
        report.skipped = self
            .skipped
            .iter()
            .map(|(name, e)| (name.clone(), e.to_string()))
            .collect();

        for (index, &size) in sizes.iter().enumerate() {
            let workload = make(size);
            if report.workload.is_empty() {
                report.workload = workload.name().to_string();
            }
            let more_sizes = index + 1 < sizes.len();
            let mut serial: Option<(Vec<f32>, Duration)> = None;
            let mut pending: Vec<(Implementation, Result<(Vec<f32>, Duration)>)> = Vec::new();
            let mut results = Vec::new();
            let mut phase = Phase::Init;

            loop {
                debug!("{} size {size}: {phase:?}", workload.name());
                match phase {
                    Phase::Init => {}
                    Phase::RunBaseline => {
                        let (out, elapsed) = self.baseline.run_serial(&workload);
                        serial = Some((out, elapsed));
                        let (out, elapsed) = self.baseline.run_data_parallel(&workload);
                        pending.push((Implementation::DataParallel, Ok((out, elapsed))));
                        let (out, elapsed) = self.baseline.run_thread_pool(&workload);
                        pending.push((
                            Implementation::ThreadPool {
                                threads: self.baseline.threads(),
                            },
                            Ok((out, elapsed)),
                        ));
                    }
                    Phase::RunAccelerated(i) => {
                        let accelerator = self.accelerators[i].as_ref();
                        for variant in workload.variants() {
                            let implementation = Implementation::Accelerated {
                                device: accelerator.id(),
                                device_name: accelerator.name().to_string(),
                                variant: variant.to_string(),
                            };
                            let timed = time_accelerator(accelerator, &workload, variant, self.config.iterations);
                            if let Err(e) = &timed {
                                warn!("{implementation} at size {size}: {e}");
                            }
                            pending.push((implementation, timed));
                        }
                    }
                    Phase::Verify => {
                        let Some((expected, serial_time)) = &serial else {
                            break;
                        };
                        results.push(BenchmarkResult::new(
                            size,
                            Implementation::Serial,
                            Outcome::Verified,
                            Some(*serial_time),
                            workload.flops(),
                            *serial_time,
                        ));
                        for (implementation, timed) in pending.drain(..) {
                            let (outcome, elapsed) = match timed {
                                Ok((out, elapsed)) => (verify(&workload, expected, &out), Some(elapsed)),
                                Err(e) => (Outcome::Failed(e.to_string()), None),
                            };
                            if let Outcome::Mismatch { index, max_error } = &outcome {
                                warn!("{implementation} at size {size}: mismatch at {index} (max error {max_error})");
                            }
                            results.push(BenchmarkResult::new(
                                size,
                                implementation,
                                outcome,
                                elapsed,
                                workload.flops(),
                                *serial_time,
                            ));
                        }
                    }
                    Phase::Report => {
                        let serial_time = serial.as_ref().map(|(_, t)| *t).unwrap_or_default();
                        for result in &results {
                            info!(
                                "{} size {size}: {} {:?} speedup {:?}",
                                workload.name(),
                                result.implementation,
                                result.elapsed,
                                result.speedup
                            );
                            if let (
                                Implementation::Accelerated {
                                    device, variant, ..
                                },
                                Outcome::Verified,
                                Some(elapsed),
                            ) = (&result.implementation, &result.outcome, result.elapsed)
                            {
                                if self.breakeven.observe(*device, variant, size, elapsed, serial_time) {
                                    info!("{} [{variant}] breaks even at size {size}", result.implementation);
                                }
                            }
                        }
                        report.results.append(&mut results);
                    }
                    Phase::Done => break,
                }
                phase = phase.next(self.accelerators.len(), more_sizes);
                if phase == Phase::Init {
                    break;
                }
            }
        }

        for accelerator in &self.accelerators {
            let variants = report
                .results
                .iter()
                .filter_map(|r| match &r.implementation {
                    Implementation::Accelerated { device, variant, .. } if *device == accelerator.id() => {
                        Some(variant.clone())
                    }
                    _ => None,
                })
                .fold(Vec::<String>::new(), |mut seen, v| {
                    if !seen.contains(&v) {
                        seen.push(v);
                    }
                    seen
                });
            for variant in variants {
                report.breakeven.push(Breakeven {
                    device: accelerator.id(),
                    device_name: accelerator.name().to_string(),
                    size: self.breakeven.get(accelerator.id(), &variant),
                    variant,
                });
            }
        }
        report
    }
}

/// Best of `iterations` runs.  The output of the last run is returned;
/// the first failure ends the measurement.
fn time_accelerator(
    accelerator: &dyn Accelerator,
    workload: &dyn Workload,
    variant: &str,
    iterations: usize,
) -> Result<(Vec<f32>, Duration)> {
    let mut best = Duration::MAX;
    let mut output = Vec::new();
    for _ in 0..iterations.max(1) {
        let (out, timing) = accelerator.execute(workload, variant)?;
        best = best.min(timing.elapsed());
        output = out;
    }
    Ok((output, best))
}

/// Output and timeline of a workload split across several devices.
#[derive(Debug, Clone)]
pub struct PartitionedRun {
    pub output: Vec<f32>,
    pub timeline: Timeline,
}

/// Split `workload` into equal row blocks, one per slot, launch them all
/// and wait for all.  The last slot takes the remainder rows.  Timeline
/// entries use the host clock so intervals on different devices compare.
pub fn run_partitioned(slots: &[DeviceSlot], workload: &dyn Partition) -> Result<PartitionedRun> {
    let ranges: Vec<Range<usize>> = partition(workload.rows(), slots.len());
    let mut jobs = Vec::with_capacity(slots.len());
    let mut labels = Vec::with_capacity(slots.len());
    for (slot, range) in slots.iter().zip(&ranges) {
        if range.is_empty() {
            continue;
        }
        jobs.push(Job {
            context: &slot.context,
            program: slot.program(workload.program())?,
            descriptor: workload.bind_rows(range.clone())?,
        });
        labels.push(format!("{} rows {}..{}", slot.device.name, range.start, range.end));
    }

    let mut output = Vec::with_capacity(workload.output_len());
    let mut entries = Vec::with_capacity(jobs.len());
    for (label, result) in labels.into_iter().zip(dispatch_concurrent(&jobs)) {
        let out = result?;
        if let Some(part) = out.outputs.into_iter().next() {
            output.extend(part);
        }
        entries.push((label, out.host));
    }
    Ok(PartitionedRun {
        output,
        timeline: Timeline::new(entries),
    })
}
