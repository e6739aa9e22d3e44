//! Device discovery.
//!
//! A [`DeviceCatalog`] asks every selected wgpu backend for its adapters
//! and flattens them into one ordered list: backends in a fixed order,
//! adapters in the order each backend reports them.  The catalog owns
//! the `wgpu::Instance` so the adapters stay valid for as long as the
//! catalog lives.

use std::fmt;
use std::ops::BitOr;

use log::{debug, info};

use crate::error::{Error, Result};

/// Backends in the order they are enumerated.
const BACKEND_ORDER: [wgpu::Backends; 5] = [
    wgpu::Backends::VULKAN,
    wgpu::Backends::METAL,
    wgpu::Backends::DX12,
    wgpu::Backends::GL,
    wgpu::Backends::BROWSER_WEBGPU,
];

/// Opaque handle to a catalog entry.  Stable for the lifetime of the
/// catalog that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(usize);

impl DeviceId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Device type bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceType(u8);

impl DeviceType {
    pub const CPU: Self = Self(1);
    pub const GPU: Self = Self(1 << 1);
    pub const ACCELERATOR: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    fn from_wgpu(ty: wgpu::DeviceType) -> Self {
        match ty {
            wgpu::DeviceType::Cpu => Self::CPU,
            wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::VirtualGpu => Self::GPU,
            wgpu::DeviceType::Other => Self::ACCELERATOR,
        }
    }
}

impl BitOr for DeviceType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Self::CPU) {
            parts.push("CPU");
        }
        if self.contains(Self::GPU) {
            parts.push("GPU");
        }
        if self.contains(Self::ACCELERATOR) {
            parts.push("ACCELERATOR");
        }
        if parts.is_empty() {
            parts.push("NONE");
        }
        f.write_str(&parts.join(" | "))
    }
}

/// One enumerated adapter plus the metadata benchmarks report.
#[derive(Debug, Clone)]
pub struct Device {
    id: DeviceId,
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: DeviceType,
    pub driver: String,
    /// Largest buffer the adapter will allocate.  wgpu does not report
    /// total device memory, this is the closest figure it exposes.
    pub max_buffer_size: u64,
    /// Invocations one work-group may contain.
    pub max_workgroup_invocations: u32,
    pub(crate) adapter: wgpu::Adapter,
}

impl Device {
    fn from_adapter(id: DeviceId, adapter: wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let limits = adapter.limits();
        let driver = if info.driver_info.is_empty() {
            info.driver.clone()
        } else {
            format!("{} {}", info.driver, info.driver_info)
        };
        Self {
            id,
            name: info.name,
            backend: info.backend,
            device_type: DeviceType::from_wgpu(info.device_type),
            driver,
            max_buffer_size: limits.max_buffer_size,
            max_workgroup_invocations: limits.max_compute_invocations_per_workgroup,
            adapter,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Whether the adapter can run compute shaders at all.
    pub fn supports_compute(&self) -> bool {
        self.adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {})", self.name, self.backend, self.device_type)
    }
}

pub struct DeviceCatalog {
    instance: wgpu::Instance,
    devices: Vec<Device>,
}

impl DeviceCatalog {
    /// Enumerate the adapters of every backend in `backends`.
    ///
    /// Fails with [`Error::Enumeration`] when no backend reports an
    /// adapter.  Callers that only need CPU baselines may ignore that
    /// error.
    pub fn enumerate(backends: wgpu::Backends) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let mut devices = Vec::new();
        for backend in BACKEND_ORDER.iter().copied().filter(|b| backends.contains(*b)) {
            let adapters = instance.enumerate_adapters(backend);
            debug!("backend {:?}: {} adapter(s)", backend, adapters.len());
            for adapter in adapters {
                let device = Device::from_adapter(DeviceId(devices.len()), adapter);
                info!(
                    "found device {}: {} [{} MB max buffer, {} invocations/workgroup]",
                    device.id,
                    device,
                    device.max_buffer_size / (1024 * 1024),
                    device.max_workgroup_invocations
                );
                devices.push(device);
            }
        }
        if devices.is_empty() {
            return Err(Error::enumeration(format!(
                "no adapters found for backends {backends:?}"
            )));
        }
        Ok(Self { instance, devices })
    }

    /// Enumerate using `WGPU_BACKEND` from the environment, or every
    /// backend when it is unset.
    pub fn from_env() -> Result<Self> {
        Self::enumerate(wgpu::Backends::from_env().unwrap_or(wgpu::Backends::all()))
    }

    /// Every device found, in enumeration order.  A device's
    /// [`DeviceId`] is its index in this slice.
    pub fn list_devices(&self) -> &[Device] {
        &self.devices
    }

    /// Look up a device by the id it was given at enumeration.
    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    /// Devices whose type intersects `types`, in catalog order.
    pub fn filter(&self, types: DeviceType) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(move |d| d.device_type.intersects(types))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }
}

impl fmt::Debug for DeviceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCatalog")
            .field("devices", &self.devices)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mask_ops() {
        let mask = DeviceType::CPU | DeviceType::GPU;
        assert!(mask.contains(DeviceType::CPU));
        assert!(mask.contains(DeviceType::GPU));
        assert!(!mask.contains(DeviceType::ACCELERATOR));
        assert!(mask.intersects(DeviceType::GPU | DeviceType::ACCELERATOR));
        assert!(!DeviceType::CPU.intersects(DeviceType::GPU));
        assert!(DeviceType::ALL.contains(mask));
        assert_eq!(mask.bits(), 0b011);
    }

    #[test]
    fn type_from_wgpu() {
        assert_eq!(DeviceType::from_wgpu(wgpu::DeviceType::Cpu), DeviceType::CPU);
        assert_eq!(
            DeviceType::from_wgpu(wgpu::DeviceType::DiscreteGpu),
            DeviceType::GPU
        );
        assert_eq!(
            DeviceType::from_wgpu(wgpu::DeviceType::IntegratedGpu),
            DeviceType::GPU
        );
        assert_eq!(
            DeviceType::from_wgpu(wgpu::DeviceType::Other),
            DeviceType::ACCELERATOR
        );
    }

    #[test]
    fn type_display() {
        assert_eq!(DeviceType::GPU.to_string(), "GPU");
        assert_eq!((DeviceType::CPU | DeviceType::GPU).to_string(), "CPU | GPU");
        assert_eq!(DeviceType::default().to_string(), "NONE");
    }

    #[test]
    fn enumeration_is_stable() {
        // Needs at least one adapter; skipped on machines without one.
        let Ok(first) = DeviceCatalog::from_env() else {
            return;
        };
        let second = DeviceCatalog::from_env().unwrap();
        let describe = |c: &DeviceCatalog| {
            c.list_devices()
                .iter()
                .map(|d| (d.id(), d.name.clone(), d.device_type, d.backend))
                .collect::<Vec<_>>()
        };
        assert_eq!(describe(&first), describe(&second));
        for (index, device) in first.list_devices().iter().enumerate() {
            assert_eq!(device.id().index(), index);
        }
    }
}
