//! Benchmark workloads.
//!
//! A workload owns its host data and knows how to compute the reference
//! result on the CPU and how to bind itself to each accelerated variant.
//! Output is organised as `rows()` rows of `row_len()` values so the CPU
//! baselines can hand out whole rows to worker threads.

use std::ops::Range;

use bytemuck::Pod;

use crate::engine::DispatchDescriptor;
use crate::error::{Error, Result};
use crate::kernels::KernelSource;

mod convolution;
mod matmul;
mod matvec;
mod nbody;
mod vector_add;

pub use convolution::{gaussian_kernel_1d, gaussian_kernel_2d, Convolution};
pub use matmul::MatMul;
pub use matvec::MatVec;
pub use nbody::{Body, NBody};
pub use vector_add::VectorAdd;

pub trait Workload: Sync {
    fn name(&self) -> &str;

    /// The problem size this instance was built for.
    fn size(&self) -> usize;

    fn rows(&self) -> usize;

    fn row_len(&self) -> usize;

    fn output_len(&self) -> usize {
        self.rows() * self.row_len()
    }

    /// Serial reference for the rows starting at `first_row`.  `out`
    /// holds a whole number of rows.
    fn compute_rows(&self, first_row: usize, out: &mut [f32]);

    /// Floating point operations in one full run.
    fn flops(&self) -> f64;

    /// Largest accepted absolute difference from the serial result.
    fn epsilon(&self) -> f32;

    /// Accepted difference for one element whose serial value is
    /// `expected`.
    fn tolerance(&self, _expected: f32) -> f32 {
        self.epsilon()
    }

    /// Name of the built-in program holding the accelerated variants.
    fn program(&self) -> &'static str;

    /// Accelerated variants, fastest-to-write first.
    fn variants(&self) -> &'static [&'static str];

    /// Program source specialised for `tile`.
    fn source(&self, tile: u32) -> Result<KernelSource> {
        Ok(KernelSource::load(self.program())?.with_constant("TILE", tile))
    }

    /// Arguments and passes for `variant`.  `tile` must match the value
    /// the program was specialised with.
    fn bind(&self, variant: &str, tile: u32) -> Result<DispatchDescriptor<'_>>;
}

/// Workloads whose rows can be computed independently on different
/// devices.  Concatenating the outputs of `bind_rows` over a partition
/// of `0..rows()` gives the full output.
pub trait Partition: Workload {
    fn bind_rows(&self, rows: Range<usize>) -> Result<DispatchDescriptor<'_>>;
}

pub(crate) fn dim(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::dispatch("bind arguments", format!("{what} {value} does not fit in u32")))
}

pub(crate) fn params<P: Pod>(p: P) -> Vec<u8> {
    bytemuck::bytes_of(&p).to_vec()
}

pub(crate) fn unknown_variant(workload: &str, variant: &str) -> Error {
    Error::SymbolNotFound {
        program: workload.to_string(),
        entry_point: variant.to_string(),
    }
}

/// Serial reference output of a whole workload.
pub fn reference(workload: &dyn Workload) -> Vec<f32> {
    let mut out = vec![0.0; workload.output_len()];
    workload.compute_rows(0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_rejects_overflow() {
        assert_eq!(dim(1024, "n").unwrap(), 1024);
        assert!(dim(usize::MAX, "n").is_err());
    }

    #[test]
    fn params_are_padded() {
        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        struct P {
            n: u32,
            pad: [u32; 3],
        }
        assert_eq!(params(P { n: 7, pad: [0; 3] }).len(), 16);
    }

    #[test]
    fn every_workload_names_a_program() {
        let workloads: Vec<Box<dyn Workload>> = vec![
            Box::new(VectorAdd::new(16)),
            Box::new(MatVec::new(8)),
            Box::new(MatMul::new(4)),
            Box::new(Convolution::new(8, 3)),
            Box::new(NBody::new(8)),
        ];
        for w in &workloads {
            let source = w.source(8).unwrap();
            for variant in w.variants() {
                let desc = w.bind(variant, 8).unwrap();
                for pass in &desc.passes {
                    assert!(source.declares(pass.entry_point), "{}", pass.entry_point);
                }
                assert_eq!(desc.output_count(), 1);
            }
            assert!(w.bind("nope", 8).is_err());
            assert_eq!(reference(w.as_ref()).len(), w.output_len());
        }
    }
}
