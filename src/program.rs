//! Kernel programs compiled for one device.
//!
//! A [`CompiledProgram`] is a WGSL module built by one [`GpuContext`].
//! It remembers the device it was built for so the engine can refuse to
//! dispatch it anywhere else.

use log::{debug, warn};
use wgpu::{ShaderModuleDescriptor, ShaderSource};

use crate::context::GpuContext;
use crate::device::DeviceId;
use crate::error::{Error, Result};
use crate::kernels::KernelSource;

pub struct CompiledProgram {
    source: KernelSource,
    device_id: DeviceId,
    device_name: String,
    module: wgpu::ShaderModule,
}

impl CompiledProgram {
    /// Build `source` for the device behind `context`.
    ///
    /// Parse and validation failures are returned as [`Error::Compile`]
    /// with the diagnostics the backend produced.
    pub fn compile(context: &GpuContext, source: &KernelSource) -> Result<Self> {
        let compile_error = |log: String| Error::Compile {
            program: source.name.clone(),
            device: context.name().to_string(),
            log,
        };
        let module = context.scoped(
            || {
                context.device.create_shader_module(ShaderModuleDescriptor {
                    label: Some(&source.name),
                    source: ShaderSource::Wgsl(source.text.clone()),
                })
            },
            |e| compile_error(e.to_string()),
        )?;

        let info = pollster::block_on(module.get_compilation_info());
        let mut errors = Vec::new();
        for message in &info.messages {
            let text = match &message.location {
                Some(loc) => format!(
                    "{}:{}: {}",
                    loc.line_number, loc.line_position, message.message
                ),
                None => message.message.clone(),
            };
            match message.message_type {
                wgpu::CompilationMessageType::Error => errors.push(text),
                _ => warn!("{} on {}: {text}", source.name, context.name()),
            }
        }
        if !errors.is_empty() {
            return Err(compile_error(errors.join("\n")));
        }

        debug!("compiled `{}` for {}", source.name, context.name());
        Ok(Self {
            source: source.clone(),
            device_id: context.device_id(),
            device_name: context.name().to_string(),
            module,
        })
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Resolve the compute entry point `name`.
    ///
    /// Fails with [`Error::SymbolNotFound`] when the module has no
    /// `@compute` function of that name.  The pipeline itself is built by
    /// the engine once the argument layout is known.
    pub fn lookup_entry_point(&self, name: &str) -> Result<Kernel> {
        if !self.source.declares(name) {
            return Err(Error::SymbolNotFound {
                program: self.source.name.clone(),
                entry_point: name.to_string(),
            });
        }
        Ok(Kernel {
            program: self.source.name.clone(),
            entry_point: name.to_string(),
            device_id: self.device_id,
            module: self.module.clone(),
        })
    }

    /// Error for a pipeline of this program that failed validation.
    pub(crate) fn build_error(&self, log: String) -> Error {
        Error::Compile {
            program: self.source.name.clone(),
            device: self.device_name.clone(),
            log,
        }
    }
}

impl std::fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("program", &self.source.name)
            .field("device", &self.device_name)
            .finish()
    }
}

/// One compute entry point of a compiled program.
#[derive(Debug, Clone)]
pub struct Kernel {
    pub program: String,
    pub entry_point: String,
    device_id: DeviceId,
    pub(crate) module: wgpu::ShaderModule,
}

impl Kernel {
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }
}
