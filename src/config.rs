//! Run configuration.
//!
//! A [`Config`] is built with [`ConfigBuilder`] and validated once, before
//! any device is opened or any thread pool is started.  Every field has a
//! default that works on a machine with no adapter at all.

use crate::device::DeviceType;
use crate::error::{Error, Result};

/// What to do when a kernel program fails to build for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilePolicy {
    /// Log the diagnostics, drop the device and keep benchmarking the rest.
    #[default]
    SkipDevice,
    /// Treat any build failure as fatal to the whole run.
    Abort,
}

impl CompilePolicy {
    /// Whether a failure to open a device and build its programs stops
    /// the whole run.
    ///
    /// Errors that are not local to the device always do.  Of the
    /// device-local ones only [`Error::Compile`] under
    /// [`CompilePolicy::Abort`] does; an adapter that cannot be opened is
    /// skipped under either policy.
    pub fn aborts_on(self, error: &Error) -> bool {
        if !error.is_device_local() {
            return true;
        }
        self == CompilePolicy::Abort && matches!(error, Error::Compile { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Problem sizes, processed in order.  Their meaning is workload
    /// specific (elements, matrix edge, image edge, body count).
    pub sizes: Vec<usize>,
    /// Every implementation is timed this many times and the best run kept.
    pub iterations: usize,
    /// Edge of the local work-group used by tiled kernel variants.
    pub tile_size: u32,
    /// Workers in the fixed CPU pool.  `None` means one per logical core.
    pub num_threads: Option<usize>,
    /// Pool workers are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
    /// Stack size of each pool worker, in bytes.
    pub stack_size: Option<usize>,
    /// Backends searched for adapters.  Defaults to `WGPU_BACKEND` when
    /// set, otherwise every backend.
    pub backends: wgpu::Backends,
    pub compile_policy: CompilePolicy,
    /// Restrict accelerated runs to these device types.
    pub device_types: DeviceType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sizes: vec![1 << 10, 1 << 14, 1 << 18, 1 << 20],
            iterations: 5,
            tile_size: 16,
            num_threads: None,
            thread_name_prefix: "bench-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            backends: wgpu::Backends::from_env().unwrap_or(wgpu::Backends::all()),
            compile_policy: CompilePolicy::default(),
            device_types: DeviceType::ALL,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.sizes.is_empty() {
            return Err(Error::config("at least one problem size is required"));
        }
        if self.sizes.contains(&0) {
            return Err(Error::config("problem sizes must be > 0"));
        }
        if self.iterations == 0 {
            return Err(Error::config("iterations must be > 0"));
        }
        // 16x16 is the invocation ceiling of downlevel adapters.
        if !self.tile_size.is_power_of_two() || self.tile_size > 16 {
            return Err(Error::config("tile_size must be a power of two <= 16"));
        }
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }
        if self.backends.is_empty() {
            return Err(Error::config("no backends selected"));
        }
        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn sizes<I: IntoIterator<Item = usize>>(mut self, sizes: I) -> Self {
        self.config.sizes = sizes.into_iter().collect();
        self
    }

    pub fn iterations(mut self, n: usize) -> Self {
        self.config.iterations = n;
        self
    }

    pub fn tile_size(mut self, tile: u32) -> Self {
        self.config.tile_size = tile;
        self
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.config.backends = backends;
        self
    }

    pub fn compile_policy(mut self, policy: CompilePolicy) -> Self {
        self.config.compile_policy = policy;
        self
    }

    pub fn device_types(mut self, types: DeviceType) -> Self {
        self.config.device_types = types;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.iterations, 5);
        assert_eq!(config.compile_policy, CompilePolicy::SkipDevice);
        assert!(config.worker_threads() > 0);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(Config::builder().sizes(Vec::new()).build().is_err());
        assert!(Config::builder().sizes([16, 0]).build().is_err());
        assert!(Config::builder().iterations(0).build().is_err());
        assert!(Config::builder().tile_size(12).build().is_err());
        assert!(Config::builder().tile_size(32).build().is_err());
        assert!(Config::builder().num_threads(0).build().is_err());
        assert!(Config::builder()
            .backends(wgpu::Backends::empty())
            .build()
            .is_err());
    }

    #[test]
    fn only_build_failures_abort() {
        let compile = Error::Compile {
            program: "broken".into(),
            device: "gpu".into(),
            log: "error: expected `)`".into(),
        };
        let open = Error::DeviceOpen {
            device: "gpu".into(),
            message: "compute shaders unsupported".into(),
        };
        assert!(CompilePolicy::Abort.aborts_on(&compile));
        assert!(!CompilePolicy::SkipDevice.aborts_on(&compile));
        assert!(!CompilePolicy::Abort.aborts_on(&open));
        assert!(!CompilePolicy::SkipDevice.aborts_on(&open));
        let unknown = Error::config("unknown kernel program `scan`");
        assert!(CompilePolicy::SkipDevice.aborts_on(&unknown));
    }

    #[test]
    fn builder_sets_fields() {
        let config = Config::builder()
            .sizes([8, 64])
            .iterations(2)
            .tile_size(8)
            .num_threads(3)
            .thread_name_prefix("pool")
            .compile_policy(CompilePolicy::Abort)
            .device_types(DeviceType::GPU)
            .build()
            .unwrap();
        assert_eq!(config.sizes, vec![8, 64]);
        assert_eq!(config.iterations, 2);
        assert_eq!(config.tile_size, 8);
        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.thread_name_prefix, "pool");
        assert_eq!(config.compile_policy, CompilePolicy::Abort);
        assert_eq!(config.device_types, DeviceType::GPU);
    }
}
