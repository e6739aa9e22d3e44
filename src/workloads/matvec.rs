//! Matrix-vector product, one invocation per output row.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use super::{dim, params, unknown_variant, Partition, Workload};
use crate::engine::{DispatchDescriptor, KernelArg, PassSpec};
use crate::error::Result;

const WORKGROUP: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    rows: u32,
    cols: u32,
    pad: [u32; 2],
}

/// Dense row-major matrix times a vector.
#[derive(Debug, Clone)]
pub struct MatVec {
    pub rows: usize,
    pub cols: usize,
    pub matrix: Vec<f32>,
    pub vector: Vec<f32>,
}

impl MatVec {
    /// Square `n x n` problem with `m[i] = (i % 100) / 100` and
    /// `v[j] = (j % 50) / 50`.
    pub fn new(n: usize) -> Self {
        Self::with_shape(n, n)
    }

    pub fn with_shape(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            matrix: (0..rows * cols).map(|i| (i % 100) as f32 / 100.0).collect(),
            vector: (0..cols).map(|j| (j % 50) as f32 / 50.0).collect(),
        }
    }

    fn descriptor(&self, rows: Range<usize>) -> Result<DispatchDescriptor<'_>> {
        let n = dim(rows.len(), "rows")?;
        let cols = dim(self.cols, "cols")?;
        Ok(DispatchDescriptor::new(
            vec![
                KernelArg::Input(&self.matrix[rows.start * self.cols..rows.end * self.cols]),
                KernelArg::Input(&self.vector),
                KernelArg::Output(rows.len()),
                KernelArg::Uniform(params(Params {
                    rows: n,
                    cols,
                    pad: [0; 2],
                })),
            ],
            vec![PassSpec::linear("matvec_multiply", n, WORKGROUP)],
        ))
    }
}

impl Workload for MatVec {
    fn name(&self) -> &str {
        "matvec"
    }

    fn size(&self) -> usize {
        self.rows
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn row_len(&self) -> usize {
        1
    }

    fn compute_rows(&self, first_row: usize, out: &mut [f32]) {
        for (offset, r) in out.iter_mut().enumerate() {
            let row = &self.matrix[(first_row + offset) * self.cols..][..self.cols];
            *r = row.iter().zip(&self.vector).map(|(m, v)| m * v).sum();
        }
    }

    fn flops(&self) -> f64 {
        2.0 * self.rows as f64 * self.cols as f64
    }

    fn epsilon(&self) -> f32 {
        0.01
    }

    fn program(&self) -> &'static str {
        "matvec"
    }

    fn variants(&self) -> &'static [&'static str] {
        &["matvec_multiply"]
    }

    fn bind(&self, variant: &str, _tile: u32) -> Result<DispatchDescriptor<'_>> {
        match variant {
            "matvec_multiply" => self.descriptor(0..self.rows),
            other => Err(unknown_variant(self.name(), other)),
        }
    }
}

impl Partition for MatVec {
    fn bind_rows(&self, rows: Range<usize>) -> Result<DispatchDescriptor<'_>> {
        self.descriptor(rows)
    }
}
