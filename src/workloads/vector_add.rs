//! Element-wise `c = a + b`.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use super::{dim, params, unknown_variant, Partition, Workload};
use crate::engine::{DispatchDescriptor, KernelArg, PassSpec};
use crate::error::Result;

const WORKGROUP: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    n: u32,
    pad: [u32; 3],
}

/// `result[i] = a[i] + b[i]`.
#[derive(Debug, Clone)]
pub struct VectorAdd {
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

impl VectorAdd {
    /// `a[i] = i % 1000`, `b[i] = 2i % 1000`.
    pub fn new(n: usize) -> Self {
        Self {
            a: (0..n).map(|i| (i % 1000) as f32).collect(),
            b: (0..n).map(|i| ((2 * i) % 1000) as f32).collect(),
        }
    }

    /// `a[i] = i`, `b[i] = 2i`; every sum is exactly representable while
    /// `3n` stays below 2^24.
    pub fn ramp(n: usize) -> Self {
        Self {
            a: (0..n).map(|i| i as f32).collect(),
            b: (0..n).map(|i| (2 * i) as f32).collect(),
        }
    }

    pub fn from_vecs(a: Vec<f32>, b: Vec<f32>) -> Self {
        assert_eq!(a.len(), b.len(), "input vectors must have equal length");
        Self { a, b }
    }

    fn descriptor(&self, range: Range<usize>) -> Result<DispatchDescriptor<'_>> {
        let n = dim(range.len(), "vector length")?;
        Ok(DispatchDescriptor::new(
            vec![
                KernelArg::Input(&self.a[range.clone()]),
                KernelArg::Input(&self.b[range.clone()]),
                KernelArg::Output(range.len()),
                KernelArg::Uniform(params(Params { n, pad: [0; 3] })),
            ],
            vec![PassSpec::linear("vector_add", n, WORKGROUP)],
        ))
    }
}

impl Workload for VectorAdd {
    fn name(&self) -> &str {
        "vector_add"
    }

    fn size(&self) -> usize {
        self.a.len()
    }

    fn rows(&self) -> usize {
        self.a.len()
    }

    fn row_len(&self) -> usize {
        1
    }

    fn compute_rows(&self, first_row: usize, out: &mut [f32]) {
        let a = &self.a[first_row..first_row + out.len()];
        let b = &self.b[first_row..first_row + out.len()];
        for ((r, x), y) in out.iter_mut().zip(a).zip(b) {
            *r = x + y;
        }
    }

    fn flops(&self) -> f64 {
        self.a.len() as f64
    }

    fn epsilon(&self) -> f32 {
        0.001
    }

    fn program(&self) -> &'static str {
        "vector_add"
    }

    fn variants(&self) -> &'static [&'static str] {
        &["vector_add"]
    }

    fn bind(&self, variant: &str, _tile: u32) -> Result<DispatchDescriptor<'_>> {
        match variant {
            "vector_add" => self.descriptor(0..self.a.len()),
            other => Err(unknown_variant(self.name(), other)),
        }
    }
}

impl Partition for VectorAdd {
    fn bind_rows(&self, rows: Range<usize>) -> Result<DispatchDescriptor<'_>> {
        self.descriptor(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workloads::reference;

    #[test]
    fn ramp_sums_exactly() {
        let w = VectorAdd::ramp(1024);
        let out = reference(&w);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, (3 * i) as f32);
        }
    }

    #[test]
    fn rows_from_an_offset() {
        let w = VectorAdd::new(2000);
        let mut out = vec![0.0; 4];
        w.compute_rows(998, &mut out);
        // a = 998, 999, 0, 1 and b = 996, 998, 0, 2
        assert_eq!(out, vec![1994.0, 1997.0, 0.0, 3.0]);
    }

    #[test]
    fn partial_binding() {
        let w = VectorAdd::new(100);
        let desc = w.bind_rows(40..100).unwrap();
        match &desc.args[0] {
            KernelArg::Input(a) => assert_eq!(a.len(), 60),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(desc.args[2], KernelArg::Output(60)));
    }
}
