//! Typed GPU buffers and host readback.
//!
//! [`GpuBuffer`] wraps a `wgpu::Buffer` together with its element count
//! and [`AccessMode`].  Buffers are transient: the engine creates them
//! right before a dispatch and drops them once results are read back,
//! which releases the device memory.

use std::marker::PhantomData;
use std::sync::mpsc;

use bytemuck::{cast_slice, Pod};
use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferDescriptor, BufferUsages};

use crate::context::GpuContext;
use crate::error::{Error, Result};

/// How a kernel may touch a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Uploaded from the host, never written by the kernel.
    ReadOnly,
    /// Written by the kernel and downloaded afterwards.
    WriteOnly,
    /// Device-side scratch read and written by successive passes.
    ReadWrite,
}

impl AccessMode {
    pub(crate) fn binding_type(self) -> wgpu::BufferBindingType {
        wgpu::BufferBindingType::Storage {
            read_only: self == AccessMode::ReadOnly,
        }
    }
}

pub struct GpuBuffer<T: Pod> {
    pub buffer: Buffer,
    pub len: usize,
    pub access: AccessMode,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuBuffer<T> {
    /// Create a read-only storage buffer holding a copy of `data`.
    ///
    /// The copy is staged through the queue and lands on the device with
    /// the next submission.
    pub fn from_slice(context: &GpuContext, data: &[T]) -> Self {
        let bytes = cast_slice(data);
        let buffer = context.device.create_buffer(&BufferDescriptor {
            label: Some("gpu_buffer_input"),
            size: bytes.len() as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        context.queue.write_buffer(&buffer, 0, bytes);
        Self {
            buffer,
            len: data.len(),
            access: AccessMode::ReadOnly,
            _marker: PhantomData,
        }
    }

    /// Create an uninitialised storage buffer of `len` elements.
    ///
    /// `WriteOnly` buffers also get `COPY_SRC` so they can be copied into
    /// a download buffer.
    pub fn new_storage(context: &GpuContext, len: usize, access: AccessMode) -> Self {
        let mut usage = BufferUsages::STORAGE;
        if access == AccessMode::WriteOnly {
            usage |= BufferUsages::COPY_SRC;
        }
        let buffer = context.device.create_buffer(&BufferDescriptor {
            label: Some(match access {
                AccessMode::WriteOnly => "gpu_buffer_output",
                _ => "gpu_buffer_scratch",
            }),
            size: byte_len::<T>(len),
            usage,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            len,
            access,
            _marker: PhantomData,
        }
    }

    /// Create a host-mappable buffer sized to hold `len` elements.  It
    /// cannot be bound to a shader.
    pub fn new_download(context: &GpuContext, len: usize) -> Self {
        let buffer = context.device.create_buffer(&BufferDescriptor {
            label: Some("gpu_buffer_download"),
            size: byte_len::<T>(len),
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            len,
            access: AccessMode::WriteOnly,
            _marker: PhantomData,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        byte_len::<T>(self.len)
    }

    /// Read the contents of a download buffer back to the host.
    ///
    /// Blocks until the device has finished every submitted command and
    /// the mapping is ready.  The buffer is unmapped before returning.
    pub fn read_to_vec(&self, context: &GpuContext) -> Result<Vec<T>> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |status| {
            let _ = tx.send(status);
        });
        context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| Error::transfer("read buffer", e.to_string()))?;
        rx.recv()
            .map_err(|e| Error::transfer("read buffer", e.to_string()))?
            .map_err(|e| Error::transfer("read buffer", e.to_string()))?;

        let data = slice.get_mapped_range();
        let result: Vec<T> = cast_slice(&data).to_vec();
        drop(data);
        self.buffer.unmap();
        Ok(result)
    }
}

/// Create a uniform buffer holding a `#[repr(C)]` parameter block.
pub fn uniform_buffer(context: &GpuContext, bytes: &[u8]) -> Buffer {
    context
        .device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gpu_buffer_params"),
            contents: bytes,
            usage: BufferUsages::UNIFORM,
        })
}

fn byte_len<T>(len: usize) -> u64 {
    (len * std::mem::size_of::<T>()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_binding_types() {
        assert_eq!(
            AccessMode::ReadOnly.binding_type(),
            wgpu::BufferBindingType::Storage { read_only: true }
        );
        assert_eq!(
            AccessMode::WriteOnly.binding_type(),
            wgpu::BufferBindingType::Storage { read_only: false }
        );
        assert_eq!(
            AccessMode::ReadWrite.binding_type(),
            wgpu::BufferBindingType::Storage { read_only: false }
        );
    }

    #[test]
    fn byte_lengths() {
        assert_eq!(byte_len::<f32>(10), 40);
        assert_eq!(byte_len::<u64>(3), 24);
    }
}
