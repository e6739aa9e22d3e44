//! List every adapter wgpu can see, grouped by backend.
//!
//! Set `WGPU_BACKEND` (e.g. `vulkan`, `gl`) to restrict the search.

use wgpu_compute_bench::{DeviceCatalog, DeviceType, GpuContext};

fn main() {
    env_logger::init();
    let catalog = match DeviceCatalog::from_env() {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    println!("{} device(s) found\n", catalog.len());
    let mut backend = None;
    for device in catalog.list_devices() {
        if backend != Some(device.backend) {
            backend = Some(device.backend);
            println!("Backend: {:?}", device.backend);
        }
        println!("  Device {}: {}", device.id(), device.name);
        println!("    Type:               {}", device.device_type);
        println!("    Driver:             {}", device.driver);
        println!(
            "    Max buffer size:    {} MB",
            device.max_buffer_size / (1024 * 1024)
        );
        println!("    Invocations/group:  {}", device.max_workgroup_invocations);
        println!("    Compute shaders:    {}", device.supports_compute());
        match GpuContext::open(device) {
            Ok(context) => println!("    Timestamp queries:  {}", context.has_timestamps()),
            Err(e) => println!("    Cannot open: {e}"),
        }
    }

    let gpus = catalog.filter(DeviceType::GPU).count();
    let cpus = catalog.filter(DeviceType::CPU).count();
    println!("\n{gpus} GPU(s), {cpus} software/CPU adapter(s)");
}
