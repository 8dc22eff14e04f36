use gftt_core::{BorderType, Depth, DeviceMat, MatData, MatType};
use rayon::prelude::*;

use crate::device::{ensure_size_is_enough, Stream};
use crate::error::{GfttError, GfttResult};

/// 1-D Sobel kernel of `ksize` taps for derivative `order`.
///
/// Built as binomial smoothing `(1 + z)^(ksize - 1 - order)` times the
/// difference `(z - 1)^order`, which reproduces `[1, 2, 1]`, `[-1, 0, 1]`,
/// `[-1, -2, 0, 2, 1]` and so on.
pub fn sobel_kernel(ksize: usize, order: usize) -> Vec<f32> {
    let mut k = vec![1.0f32];
    for _ in 0..ksize.saturating_sub(1 + order) {
        k = convolve(&k, &[1.0, 1.0]);
    }
    for _ in 0..order {
        k = convolve(&k, &[-1.0, 1.0]);
    }
    k
}

fn convolve(a: &[f32], b: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Separable first-order derivative filter (Sobel or Scharr).
///
/// Output is always single-channel `F32`, same size as the source.
#[derive(Debug, Clone)]
pub struct DerivativeFilter {
    src_type: MatType,
    row_kernel: Vec<f32>,
    col_kernel: Vec<f32>,
    scale: f32,
    border: BorderType,
}

impl DerivativeFilter {
    /// Sobel filter with aperture `ksize` in {1, 3, 5, 7}
    pub fn sobel(src_type: MatType, dx: usize, dy: usize, ksize: i32, scale: f64, border: BorderType) -> GfttResult<Self> {
        Self::check_source(src_type)?;
        if !matches!(ksize, 1 | 3 | 5 | 7) {
            return Err(GfttError::InvalidApertureSize(ksize));
        }
        let ksize = ksize as usize;
        // A derivative needs at least three taps.
        let kx = if ksize == 1 && dx > 0 { 3 } else { ksize };
        let ky = if ksize == 1 && dy > 0 { 3 } else { ksize };
        Ok(Self {
            src_type,
            row_kernel: sobel_kernel(kx, dx),
            col_kernel: sobel_kernel(ky, dy),
            scale: scale as f32,
            border,
        })
    }

    /// 3x3 Scharr filter; exactly one of `dx`, `dy` must be 1
    pub fn scharr(src_type: MatType, dx: usize, dy: usize, scale: f64, border: BorderType) -> GfttResult<Self> {
        Self::check_source(src_type)?;
        if dx + dy != 1 {
            return Err(GfttError::InvalidApertureSize(-1));
        }
        let deriv = vec![-1.0, 0.0, 1.0];
        let smooth = vec![3.0, 10.0, 3.0];
        let (row_kernel, col_kernel) = if dx == 1 { (deriv, smooth) } else { (smooth, deriv) };
        Ok(Self {
            src_type,
            row_kernel,
            col_kernel,
            scale: scale as f32,
            border,
        })
    }

    fn check_source(src_type: MatType) -> GfttResult<()> {
        if src_type.channels != 1 {
            return Err(GfttError::InvalidChannels { channels: src_type.channels });
        }
        match src_type.depth {
            Depth::U8 | Depth::F32 => Ok(()),
            _ => Err(GfttError::UnsupportedFormat(src_type)),
        }
    }

    pub fn src_type(&self) -> MatType {
        self.src_type
    }

    /// Filter `src` into `dst`, reusing `dst` storage when possible
    pub fn apply(&self, src: &DeviceMat, dst: &mut DeviceMat, stream: &Stream) -> GfttResult<()> {
        if src.mat_type != self.src_type {
            return Err(GfttError::SourceTypeMismatch {
                expected: self.src_type,
                actual: src.mat_type,
            });
        }
        if src.data.len() != src.expected_len() {
            return Err(GfttError::InvalidImageData {
                expected_len: src.expected_len(),
                actual_len: src.data.len(),
            });
        }

        let (rows, cols) = (src.rows, src.cols);
        ensure_size_is_enough(dst, rows, cols, MatType::F32C1)?;
        if rows == 0 || cols == 0 {
            return Ok(());
        }

        let mut tmp: Vec<f32> = Vec::new();
        tmp.try_reserve_exact(rows * cols)?;
        tmp.resize(rows * cols, 0.0);

        stream.run(|| match &src.data {
            MatData::U8(v) => self.row_pass(v, cols, &mut tmp, |p| p as f32),
            MatData::F32(v) => self.row_pass(v, cols, &mut tmp, |p| p),
            // check_source admits no other depth
            _ => {}
        });

        let out = dst.as_f32_mut().unwrap_or(&mut []);
        stream.run(|| self.col_pass(&tmp, rows, cols, out));
        Ok(())
    }

    fn row_pass<T, F>(&self, src: &[T], cols: usize, tmp: &mut [f32], to_f32: F)
    where
        T: Copy + Sync,
        F: Fn(T) -> f32 + Sync,
    {
        let anchor = (self.row_kernel.len() / 2) as isize;
        tmp.par_chunks_mut(cols)
            .zip(src.par_chunks(cols))
            .for_each(|(out_row, src_row)| {
                for (x, out) in out_row.iter_mut().enumerate() {
                    let mut acc = 0.0f32;
                    for (i, &k) in self.row_kernel.iter().enumerate() {
                        if k == 0.0 {
                            continue;
                        }
                        let sx = x as isize + i as isize - anchor;
                        if let Some(sx) = self.border.interpolate(sx, cols) {
                            acc += k * to_f32(src_row[sx]);
                        }
                    }
                    *out = acc;
                }
            });
    }

    fn col_pass(&self, tmp: &[f32], rows: usize, cols: usize, dst: &mut [f32]) {
        let anchor = (self.col_kernel.len() / 2) as isize;
        dst.par_chunks_mut(cols).enumerate().for_each(|(y, out_row)| {
            out_row.iter_mut().for_each(|v| *v = 0.0);
            for (j, &k) in self.col_kernel.iter().enumerate() {
                if k == 0.0 {
                    continue;
                }
                let sy = y as isize + j as isize - anchor;
                if let Some(sy) = self.border.interpolate(sy, rows) {
                    let src_row = &tmp[sy * cols..(sy + 1) * cols];
                    for (out, &s) in out_row.iter_mut().zip(src_row) {
                        *out += k * s;
                    }
                }
            }
            for v in out_row.iter_mut() {
                *v *= self.scale;
            }
        });
    }
}
