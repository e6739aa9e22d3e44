//! Dense single-precision matrix multiplication, naive and tiled.

use bytemuck::{Pod, Zeroable};

use super::{dim, params, unknown_variant, Workload};
use crate::engine::{DispatchDescriptor, KernelArg, PassSpec};
use crate::error::Result;

/// Work-group edge of the untiled kernel (`WG2` in the shader).
const NAIVE_EDGE: u32 = 16;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    m: u32,
    n: u32,
    k: u32,
    pad: u32,
}

/// `C (m x n) = A (m x k) * B (k x n)`, all row-major.
#[derive(Debug, Clone)]
pub struct MatMul {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

impl MatMul {
    /// Square problem of edge `size` filled with `(i % 100) / 100`.
    pub fn new(size: usize) -> Self {
        let fill = |len: usize| (0..len).map(|i| (i % 100) as f32 / 100.0).collect();
        Self::from_matrices(size, size, size, fill(size * size), fill(size * size))
    }

    /// Rows of `C` are the unit of work, so `n` must be non-zero.
    pub fn from_matrices(m: usize, n: usize, k: usize, a: Vec<f32>, b: Vec<f32>) -> Self {
        assert!(n > 0, "C must have at least one column");
        assert_eq!(a.len(), m * k, "A must be m x k");
        assert_eq!(b.len(), k * n, "B must be k x n");
        Self { m, n, k, a, b }
    }
}

impl Workload for MatMul {
    fn name(&self) -> &str {
        "matrix_multiply"
    }

    fn size(&self) -> usize {
        self.m
    }

    fn rows(&self) -> usize {
        self.m
    }

    fn row_len(&self) -> usize {
        self.n
    }

    fn compute_rows(&self, first_row: usize, out: &mut [f32]) {
        for (r, c_row) in out.chunks_mut(self.n).enumerate() {
            let a_row = &self.a[(first_row + r) * self.k..][..self.k];
            for (j, c) in c_row.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (p, a) in a_row.iter().enumerate() {
                    sum += a * self.b[p * self.n + j];
                }
                *c = sum;
            }
        }
    }

    fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64
    }

    fn epsilon(&self) -> f32 {
        0.01
    }

    fn program(&self) -> &'static str {
        "matrix_multiply"
    }

    fn variants(&self) -> &'static [&'static str] {
        &["matrix_multiply", "matrix_multiply_tiled"]
    }

    fn bind(&self, variant: &str, tile: u32) -> Result<DispatchDescriptor<'_>> {
        let (m, n, k) = (dim(self.m, "m")?, dim(self.n, "n")?, dim(self.k, "k")?);
        let pass = match variant {
            "matrix_multiply" => PassSpec::grid("matrix_multiply", n, m, [NAIVE_EDGE; 2]),
            "matrix_multiply_tiled" => PassSpec::grid("matrix_multiply_tiled", n, m, [tile; 2]),
            other => return Err(unknown_variant(self.name(), other)),
        };
        Ok(DispatchDescriptor::new(
            vec![
                KernelArg::Input(&self.a),
                KernelArg::Input(&self.b),
                KernelArg::Output(self.m * self.n),
                KernelArg::Uniform(params(Params { m, n, k, pad: 0 })),
            ],
            vec![pass],
        ))
    }
}
