//! All-pairs gravitational N-body step.
//!
//! Only the accelerations are computed; positions are never integrated.
//! The tiled variant stages blocks of bodies in workgroup memory.

use bytemuck::{Pod, Zeroable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{dim, params, unknown_variant, Workload};
use crate::engine::{DispatchDescriptor, KernelArg, PassSpec};
use crate::error::Result;

const WORKGROUP: u32 = 64;
pub const DEFAULT_SOFTENING: f32 = 0.1;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    n: u32,
    softening: f32,
    pad: [u32; 2],
}

/// Position and mass of one body.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub mass: f32,
}

impl Body {
    pub fn new(x: f32, y: f32, z: f32, mass: f32) -> Self {
        Self { x, y, z, mass }
    }
}

/// Softened gravitational acceleration on every body.  Each output row
/// is `(ax, ay, az, 0)`.
#[derive(Debug, Clone)]
pub struct NBody {
    pub bodies: Vec<Body>,
    pub softening: f32,
}

impl NBody {
    /// `n` random bodies: positions in +-100, masses in 1..10.
    pub fn new(n: usize) -> Self {
        Self::random(n, 42)
    }

    pub fn random(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bodies = (0..n)
            .map(|_| {
                Body::new(
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(-100.0..100.0),
                    rng.gen_range(1.0..10.0),
                )
            })
            .collect();
        Self {
            bodies,
            softening: DEFAULT_SOFTENING,
        }
    }

    pub fn from_bodies(bodies: Vec<Body>, softening: f32) -> Self {
        Self { bodies, softening }
    }

    fn acceleration(&self, i: usize) -> [f32; 3] {
        let p = self.bodies[i];
        let soft_sq = self.softening * self.softening;
        let mut acc = [0.0f32; 3];
        for (j, other) in self.bodies.iter().enumerate() {
            if j == i {
                continue;
            }
            let d = [other.x - p.x, other.y - p.y, other.z - p.z];
            let dist_sq = d[0] * d[0] + d[1] * d[1] + d[2] * d[2] + soft_sq;
            let inv = other.mass / (dist_sq * dist_sq.sqrt());
            for (a, d) in acc.iter_mut().zip(d) {
                *a += d * inv;
            }
        }
        acc
    }
}

impl Workload for NBody {
    fn name(&self) -> &str {
        "nbody"
    }

    fn size(&self) -> usize {
        self.bodies.len()
    }

    fn rows(&self) -> usize {
        self.bodies.len()
    }

    fn row_len(&self) -> usize {
        4
    }

    fn compute_rows(&self, first_row: usize, out: &mut [f32]) {
        for (r, row) in out.chunks_mut(4).enumerate() {
            let [ax, ay, az] = self.acceleration(first_row + r);
            row.copy_from_slice(&[ax, ay, az, 0.0]);
        }
    }

    fn flops(&self) -> f64 {
        let n = self.bodies.len() as f64;
        20.0 * n * (n - 1.0).max(0.0)
    }

    fn epsilon(&self) -> f32 {
        0.01
    }

    /// Relative for accelerations larger than one.
    fn tolerance(&self, expected: f32) -> f32 {
        self.epsilon() * expected.abs().max(1.0)
    }

    fn program(&self) -> &'static str {
        "nbody"
    }

    fn variants(&self) -> &'static [&'static str] {
        &["compute_forces", "compute_forces_tiled"]
    }

    fn bind(&self, variant: &str, tile: u32) -> Result<DispatchDescriptor<'_>> {
        let n = dim(self.bodies.len(), "body count")?;
        let pass = match variant {
            "compute_forces" => PassSpec::linear("compute_forces", n, WORKGROUP),
            "compute_forces_tiled" => PassSpec::linear("compute_forces_tiled", n, tile),
            other => return Err(unknown_variant(self.name(), other)),
        };
        Ok(DispatchDescriptor::new(
            vec![
                KernelArg::Input(bytemuck::cast_slice(&self.bodies)),
                KernelArg::Output(self.bodies.len() * 4),
                KernelArg::Uniform(params(Params {
                    n,
                    softening: self.softening,
                    pad: [0; 2],
                })),
            ],
            vec![pass],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workloads::reference;

    #[test]
    fn symmetric_pair_is_equal_and_opposite() {
        for softening in [0.0, 0.1, 2.5] {
            let w = NBody::from_bodies(
                vec![Body::new(-1.5, 0.5, 2.0, 3.0), Body::new(1.5, -0.5, -2.0, 3.0)],
                softening,
            );
            let out = reference(&w);
            for axis in 0..3 {
                assert!((out[axis] + out[4 + axis]).abs() <= 1e-6, "{out:?}");
            }
            assert!(out[0] > 0.0 && out[4] < 0.0);
            assert_eq!(out[3], 0.0);
        }
    }

    #[test]
    fn random_bodies_are_reproducible() {
        let a = NBody::random(32, 7);
        let b = NBody::random(32, 7);
        assert_eq!(a.bodies, b.bodies);
        for body in &a.bodies {
            assert!((-100.0..100.0).contains(&body.x));
            assert!((1.0..10.0).contains(&body.mass));
        }
    }

    #[test]
    fn single_body_feels_nothing() {
        let w = NBody::from_bodies(vec![Body::new(1.0, 2.0, 3.0, 5.0)], 0.1);
        assert_eq!(reference(&w), vec![0.0; 4]);
        assert_eq!(w.flops(), 0.0);
    }

    #[test]
    fn bodies_upload_as_vec4() {
        let w = NBody::new(5);
        let desc = w.bind("compute_forces_tiled", 16).unwrap();
        match &desc.args[0] {
            KernelArg::Input(data) => assert_eq!(data.len(), 20),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(desc.passes[0].workgroup, [16, 1]);
    }
}
