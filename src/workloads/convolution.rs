//! Gaussian blur of a single-channel image.
//!
//! Edges are clamped.  Three GPU variants: a direct 2-D kernel, the same
//! kernel staging its input tile in workgroup memory, and a separable
//! horizontal-then-vertical pair that goes through a scratch buffer.

use bytemuck::{Pod, Zeroable};

use super::{dim, params, unknown_variant, Workload};
use crate::engine::{DispatchDescriptor, KernelArg, PassSpec};
use crate::error::{Error, Result};

/// Work-group edge of the untiled kernels (`WG2` in the shader).
const NAIVE_EDGE: u32 = 16;
/// Largest filter the shared-memory kernel can stage (`2 * MAX_RADIUS + 1`).
pub const MAX_LOCAL_KERNEL: usize = 15;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Params {
    width: u32,
    height: u32,
    ksize: u32,
    pad: u32,
}

/// Normalised 1-D Gaussian of odd length `size`.
pub fn gaussian_kernel_1d(size: usize, sigma: f32) -> Vec<f32> {
    let half = (size / 2) as f32;
    let mut weights: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - half;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Normalised `size x size` Gaussian, the outer product of the 1-D one.
pub fn gaussian_kernel_2d(size: usize, sigma: f32) -> Vec<f32> {
    let row = gaussian_kernel_1d(size, sigma);
    row.iter()
        .flat_map(|y| row.iter().map(move |x| x * y))
        .collect()
}

/// Single-channel image filtered with a square kernel, clamping reads
/// to the nearest edge pixel.
#[derive(Debug, Clone)]
pub struct Convolution {
    pub width: usize,
    pub height: usize,
    pub ksize: usize,
    pub image: Vec<f32>,
    /// `ksize * ksize` weights, row-major.
    pub weights: Vec<f32>,
    /// Separable form of `weights`.
    pub weights_1d: Vec<f32>,
}

impl Convolution {
    /// Square `size x size` image of `(i % 256) / 255` filtered by a
    /// Gaussian with `sigma = ksize / 6`.
    pub fn new(size: usize, ksize: usize) -> Self {
        let image = (0..size * size).map(|i| (i % 256) as f32 / 255.0).collect();
        Self::with_image(size, size, image, ksize)
    }

    pub fn with_image(width: usize, height: usize, image: Vec<f32>, ksize: usize) -> Self {
        assert!(width > 0, "image must have at least one column");
        assert_eq!(image.len(), width * height, "image must be width x height");
        assert!(ksize % 2 == 1, "kernel size must be odd");
        let sigma = ksize as f32 / 6.0;
        Self {
            width,
            height,
            ksize,
            image,
            weights: gaussian_kernel_2d(ksize, sigma),
            weights_1d: gaussian_kernel_1d(ksize, sigma),
        }
    }

    fn pixel(&self, x: isize, y: isize) -> f32 {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.image[cy * self.width + cx]
    }
}

impl Workload for Convolution {
    fn name(&self) -> &str {
        "convolution"
    }

    fn size(&self) -> usize {
        self.width
    }

    fn rows(&self) -> usize {
        self.height
    }

    fn row_len(&self) -> usize {
        self.width
    }

    fn compute_rows(&self, first_row: usize, out: &mut [f32]) {
        let half = (self.ksize / 2) as isize;
        for (r, row) in out.chunks_mut(self.width).enumerate() {
            let y = (first_row + r) as isize;
            for (x, value) in row.iter_mut().enumerate() {
                let mut sum = 0.0;
                for ky in -half..=half {
                    for kx in -half..=half {
                        let w = self.weights[(ky + half) as usize * self.ksize + (kx + half) as usize];
                        sum += self.pixel(x as isize + kx, y + ky) * w;
                    }
                }
                *value = sum;
            }
        }
    }

    fn flops(&self) -> f64 {
        2.0 * self.width as f64 * self.height as f64 * (self.ksize * self.ksize) as f64
    }

    fn epsilon(&self) -> f32 {
        0.01
    }

    fn program(&self) -> &'static str {
        "convolution"
    }

    fn variants(&self) -> &'static [&'static str] {
        &["convolve_2d", "convolve_2d_local", "separable"]
    }

    fn bind(&self, variant: &str, tile: u32) -> Result<DispatchDescriptor<'_>> {
        let (w, h) = (dim(self.width, "width")?, dim(self.height, "height")?);
        let uniform = KernelArg::Uniform(params(Params {
            width: w,
            height: h,
            ksize: dim(self.ksize, "kernel size")?,
            pad: 0,
        }));
        let image = KernelArg::Input(&self.image);
        let output = KernelArg::Output(self.width * self.height);
        let desc = match variant {
            "convolve_2d" => DispatchDescriptor::new(
                vec![image, output, KernelArg::Input(&self.weights), uniform],
                vec![PassSpec::grid("convolve_2d", w, h, [NAIVE_EDGE; 2])],
            ),
            "convolve_2d_local" => {
                if self.ksize > MAX_LOCAL_KERNEL {
                    return Err(Error::dispatch(
                        "bind arguments",
                        format!(
                            "convolve_2d_local supports kernels up to {MAX_LOCAL_KERNEL}, got {}",
                            self.ksize
                        ),
                    ));
                }
                DispatchDescriptor::new(
                    vec![image, output, KernelArg::Input(&self.weights), uniform],
                    vec![PassSpec::grid("convolve_2d_local", w, h, [tile; 2])],
                )
            }
            "separable" => DispatchDescriptor::new(
                vec![
                    image,
                    output,
                    KernelArg::Input(&self.weights_1d),
                    uniform,
                    KernelArg::Scratch(self.width * self.height),
                ],
                vec![
                    PassSpec::grid("convolve_h", w, h, [NAIVE_EDGE; 2]),
                    PassSpec::grid("convolve_v", w, h, [NAIVE_EDGE; 2]),
                ],
            ),
            other => return Err(unknown_variant(self.name(), other)),
        };
        Ok(desc)
    }
}
