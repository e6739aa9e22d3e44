//! Per-device GPU context.
//!
//! A [`GpuContext`] wraps the logical `wgpu::Device` and `Queue` opened
//! on one catalog [`Device`].  Every device gets its own context and
//! therefore its own queue; nothing in a context is shared with another
//! device.  The `open` constructor hides the asynchronous nature of
//! requesting a device by blocking on it with [`pollster`].

use log::{debug, error};

use crate::device::{Device, DeviceId};
use crate::error::{Error, Result};

pub struct GpuContext {
    /// The catalog entry this context was opened on.
    pub info: Device,
    /// Logical device used to create resources and command encoders.
    pub device: wgpu::Device,
    /// Command submission queue.  Work submitted here executes in
    /// submission order and independently of other contexts' queues.
    pub queue: wgpu::Queue,
    timestamps: bool,
}

impl GpuContext {
    /// Open a context on `device`, blocking until the adapter answers.
    pub fn open(device: &Device) -> Result<Self> {
        pollster::block_on(Self::open_async(device))
    }

    /// Asynchronous variant of [`Self::open`].
    pub async fn open_async(device: &Device) -> Result<Self> {
        if !device.supports_compute() {
            return Err(Error::DeviceOpen {
                device: device.name.clone(),
                message: "adapter does not support compute shaders".into(),
            });
        }
        let adapter = &device.adapter;
        // Timestamp queries are optional; without them dispatches fall
        // back to host timing.
        let mut features = wgpu::Features::empty();
        if adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            features |= wgpu::Features::TIMESTAMP_QUERY;
        }
        let (wgpu_device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("bench_device"),
                required_features: features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| Error::DeviceOpen {
                device: device.name.clone(),
                message: e.to_string(),
            })?;

        let name = device.name.clone();
        wgpu_device.on_uncaptured_error(Box::new(move |e| {
            error!("uncaptured wgpu error on {name}: {e}");
        }));
        debug!(
            "opened {} (timestamps: {})",
            device,
            features.contains(wgpu::Features::TIMESTAMP_QUERY)
        );

        Ok(Self {
            info: device.clone(),
            device: wgpu_device,
            queue,
            timestamps: features.contains(wgpu::Features::TIMESTAMP_QUERY),
        })
    }

    pub fn device_id(&self) -> DeviceId {
        self.info.id()
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Whether kernel time is measured on the device clock.
    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    /// Nanoseconds per timestamp tick.
    pub fn timestamp_period(&self) -> f64 {
        f64::from(self.queue.get_timestamp_period())
    }

    /// Block until all submitted work on this context's queue completes.
    pub(crate) fn wait_idle(&self, operation: &'static str) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| Error::dispatch(operation, e.to_string()))
    }

    /// Run `f` inside validation and out-of-memory error scopes and
    /// report the first captured error through `map`.
    pub(crate) fn scoped<T>(
        &self,
        f: impl FnOnce() -> T,
        map: impl FnOnce(wgpu::Error) -> Error,
    ) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(e) => Err(map(e)),
            None => Ok(value),
        }
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("device", &self.info.name)
            .field("timestamps", &self.timestamps)
            .finish()
    }
}
