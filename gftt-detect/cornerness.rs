use gftt_core::{BorderType, Depth, DeviceMat, MatType};
use rayon::prelude::*;

use crate::device::{ensure_size_is_enough, Stream};
use crate::error::{GfttError, GfttResult};
use crate::filter::DerivativeFilter;

/// Per-pixel cornerness scoring of a single-channel image
pub trait CornernessCriteria: Send {
    /// Score every pixel of `src` into `dst` (`F32C1`, same size)
    fn compute(&mut self, src: &DeviceMat, dst: &mut DeviceMat, stream: &Stream) -> GfttResult<()>;

    /// Source type this criterion was built for
    fn src_type(&self) -> MatType;
}

/// Score derived from the block covariance `[[a, b], [b, c]]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseKind {
    /// `det - k * trace^2`
    Harris { k: f32 },
    /// Smaller eigenvalue
    MinEigenVal,
}

impl ResponseKind {
    #[inline]
    pub fn score(self, a: f32, b: f32, c: f32) -> f32 {
        match self {
            ResponseKind::Harris { k } => a * c - b * b - k * (a + c) * (a + c),
            ResponseKind::MinEigenVal => {
                let a = a * 0.5;
                let c = c * 0.5;
                (a + c) - ((a - c) * (a - c) + b * b).sqrt()
            }
        }
    }
}

/// Gradient normalisation shared by both criteria.
///
/// Keeps 8-bit and float sources in comparable ranges.
pub fn gradient_scale(src_type: MatType, block_size: i32, ksize: i32) -> f64 {
    let taps = if ksize > 0 { ksize } else { 3 };
    let mut scale = (1u32 << (taps - 1)) as f64 * block_size as f64;
    if ksize < 0 {
        scale *= 2.0;
    }
    if src_type.depth == Depth::U8 {
        scale *= 255.0;
    }
    1.0 / scale
}

/// Gradient preamble: owns the derivative filters and the Dx/Dy buffers
#[derive(Debug, Clone)]
struct CornerBase {
    src_type: MatType,
    block_size: usize,
    border: BorderType,
    filter_dx: DerivativeFilter,
    filter_dy: DerivativeFilter,
    dx: DeviceMat,
    dy: DeviceMat,
}

impl CornerBase {
    fn new(src_type: MatType, block_size: i32, ksize: i32, border: BorderType) -> GfttResult<Self> {
        if !matches!(border, BorderType::Reflect101 | BorderType::Replicate | BorderType::Reflect) {
            return Err(GfttError::InvalidBorderType(border));
        }
        if src_type.channels != 1 {
            return Err(GfttError::InvalidChannels { channels: src_type.channels });
        }
        if block_size < 1 {
            return Err(GfttError::InvalidBlockSize(block_size));
        }
        if !matches!(ksize, -1 | 0 | 1 | 3 | 5 | 7) {
            return Err(GfttError::InvalidApertureSize(ksize));
        }

        let scale = gradient_scale(src_type, block_size, ksize);
        let (filter_dx, filter_dy) = if ksize > 0 {
            (
                DerivativeFilter::sobel(src_type, 1, 0, ksize, scale, border)?,
                DerivativeFilter::sobel(src_type, 0, 1, ksize, scale, border)?,
            )
        } else {
            (
                DerivativeFilter::scharr(src_type, 1, 0, scale, border)?,
                DerivativeFilter::scharr(src_type, 0, 1, scale, border)?,
            )
        };

        Ok(Self {
            src_type,
            block_size: block_size as usize,
            border,
            filter_dx,
            filter_dy,
            dx: DeviceMat::empty(MatType::F32C1),
            dy: DeviceMat::empty(MatType::F32C1),
        })
    }

    fn extract_cov_data(&mut self, src: &DeviceMat, stream: &Stream) -> GfttResult<()> {
        if src.mat_type != self.src_type {
            return Err(GfttError::SourceTypeMismatch {
                expected: self.src_type,
                actual: src.mat_type,
            });
        }
        self.filter_dx.apply(src, &mut self.dx, stream)?;
        self.filter_dy.apply(src, &mut self.dy, stream)?;
        Ok(())
    }
}

/// Harris or minimum-eigenvalue cornerness criterion
#[derive(Debug, Clone)]
pub struct CornerCriterion {
    base: CornerBase,
    response: ResponseKind,
}

impl CornerCriterion {
    pub fn new(src_type: MatType, block_size: i32, ksize: i32, response: ResponseKind, border: BorderType) -> GfttResult<Self> {
        Ok(Self {
            base: CornerBase::new(src_type, block_size, ksize, border)?,
            response,
        })
    }

    pub fn response(&self) -> ResponseKind {
        self.response
    }

    pub fn block_size(&self) -> usize {
        self.base.block_size
    }

    /// Derivative buffers from the last `compute` call
    pub fn gradients(&self) -> (&DeviceMat, &DeviceMat) {
        (&self.base.dx, &self.base.dy)
    }

    fn score_kernel(&self, dst: &mut [f32], rows: usize, cols: usize) {
        let dx = self.base.dx.as_f32().unwrap_or(&[]);
        let dy = self.base.dy.as_f32().unwrap_or(&[]);
        let block = self.base.block_size as isize;
        let half = block / 2;
        let border = self.base.border;
        let response = self.response;

        dst.par_chunks_mut(cols).enumerate().for_each(|(y, out_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let (mut a, mut b, mut c) = (0.0f32, 0.0f32, 0.0f32);
                let ibegin = y as isize - half;
                let jbegin = x as isize - half;
                for i in ibegin..ibegin + block {
                    let Some(yy) = border.interpolate(i, rows) else { continue };
                    for j in jbegin..jbegin + block {
                        let Some(xx) = border.interpolate(j, cols) else { continue };
                        let gx = dx[yy * cols + xx];
                        let gy = dy[yy * cols + xx];
                        a += gx * gx;
                        b += gx * gy;
                        c += gy * gy;
                    }
                }
                *out = response.score(a, b, c);
            }
        });
    }
}

impl CornernessCriteria for CornerCriterion {
    fn compute(&mut self, src: &DeviceMat, dst: &mut DeviceMat, stream: &Stream) -> GfttResult<()> {
        self.base.extract_cov_data(src, stream)?;

        let (rows, cols) = (src.rows, src.cols);
        ensure_size_is_enough(dst, rows, cols, MatType::F32C1)?;
        if rows == 0 || cols == 0 {
            return Ok(());
        }

        let out = dst.as_f32_mut().unwrap_or(&mut []);
        stream.run(|| self.score_kernel(out, rows, cols));
        log::trace!("scored {}x{} with {:?}", cols, rows, self.response);
        Ok(())
    }

    fn src_type(&self) -> MatType {
        self.base.src_type
    }
}

/// Harris criterion with sensitivity `k`
pub fn create_harris_corner(src_type: MatType, block_size: i32, ksize: i32, k: f64, border: BorderType) -> GfttResult<Box<dyn CornernessCriteria>> {
    let c = CornerCriterion::new(src_type, block_size, ksize, ResponseKind::Harris { k: k as f32 }, border)?;
    Ok(Box::new(c))
}

/// Minimum-eigenvalue criterion
pub fn create_min_eigen_val_corner(src_type: MatType, block_size: i32, ksize: i32, border: BorderType) -> GfttResult<Box<dyn CornernessCriteria>> {
    let c = CornerCriterion::new(src_type, block_size, ksize, ResponseKind::MinEigenVal, border)?;
    Ok(Box::new(c))
}

/// Harris when `sensitivity` is given, minimum eigenvalue otherwise
pub fn create_cornerness_criterion(
    src_type: MatType,
    block_size: i32,
    aperture_size: i32,
    sensitivity: Option<f64>,
    border: BorderType,
) -> GfttResult<Box<dyn CornernessCriteria>> {
    match sensitivity {
        Some(k) => create_harris_corner(src_type, block_size, aperture_size, k, border),
        None => create_min_eigen_val_corner(src_type, block_size, aperture_size, border),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot_image(w: usize, h: usize, cx: usize, cy: usize) -> DeviceMat {
        let mut px = vec![0u8; w * h];
        px[cy * w + cx] = 255;
        DeviceMat::from_u8(h, w, px)
    }

    fn square_image(w: usize, h: usize) -> DeviceMat {
        let mut px = vec![0.0f32; w * h];
        for y in h / 4..3 * h / 4 {
            for x in w / 4..3 * w / 4 {
                px[y * w + x] = 1.0;
            }
        }
        DeviceMat::from_f32(h, w, px)
    }

    #[test]
    fn test_gradient_scale() {
        assert_eq!(gradient_scale(MatType::F32C1, 3, 3), 1.0 / 12.0);
        assert_eq!(gradient_scale(MatType::F32C1, 1, -1), 1.0 / 8.0);
        assert_eq!(gradient_scale(MatType::F32C1, 1, 0), 1.0 / 4.0);
        assert_eq!(gradient_scale(MatType::F32C1, 2, 5), 1.0 / 32.0);
        assert_eq!(gradient_scale(MatType::U8C1, 1, 3), 1.0 / (4.0 * 255.0));
    }

    #[test]
    fn test_min_eigen_of_isotropic_block() {
        // a = c, b = 0: degenerate, both eigenvalues equal
        assert_eq!(ResponseKind::MinEigenVal.score(12.0, 0.0, 12.0), 12.0);
        // pure edge: c = 0, b = 0 -> min eigenvalue 0
        assert_eq!(ResponseKind::MinEigenVal.score(10.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_harris_formula() {
        let r = ResponseKind::Harris { k: 0.04 }.score(4.0, 1.0, 2.0);
        assert!((r - (8.0 - 1.0 - 0.04 * 36.0)).abs() < 1e-6);
    }

    #[test]
    fn test_dot_peaks_at_center() {
        let img = dot_image(10, 10, 5, 5);
        let mut crit = create_min_eigen_val_corner(MatType::U8C1, 3, 3, BorderType::Reflect101).unwrap();
        let mut eig = DeviceMat::default();
        crit.compute(&img, &mut eig, &Stream::null()).unwrap();

        assert_eq!(eig.size(), (10, 10));
        let center = eig.at_f32(5, 5).unwrap();
        assert!(center > 0.0);
        for y in 0..10 {
            for x in 0..10 {
                assert!(eig.at_f32(x, y).unwrap() <= center);
            }
        }
    }

    #[test]
    fn test_harris_square_corners_beat_edges() {
        let img = square_image(32, 32);
        let mut crit = create_harris_corner(MatType::F32C1, 3, 3, 0.04, BorderType::Reflect101).unwrap();
        let mut r = DeviceMat::default();
        crit.compute(&img, &mut r, &Stream::null()).unwrap();

        let corner = r.at_f32(8, 8).unwrap();
        let edge = r.at_f32(16, 8).unwrap();
        let flat = r.at_f32(16, 16).unwrap();
        assert!(corner > 0.0);
        assert!(edge < corner);
        assert!(edge <= 0.0);
        assert_eq!(flat, 0.0);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let img = square_image(24, 20);
        let mut crit = create_cornerness_criterion(MatType::F32C1, 5, -1, None, BorderType::Replicate).unwrap();
        let mut a = DeviceMat::default();
        let mut b = DeviceMat::default();
        crit.compute(&img, &mut a, &Stream::null()).unwrap();
        crit.compute(&img, &mut b, &Stream::with_threads(3).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_apertures_and_borders_run() {
        let img = dot_image(16, 12, 7, 6);
        for ksize in [-1, 0, 1, 3, 5, 7] {
            for border in [BorderType::Reflect101, BorderType::Replicate, BorderType::Reflect] {
                let mut crit = create_cornerness_criterion(MatType::U8C1, 3, ksize, Some(0.05), border).unwrap();
                let mut out = DeviceMat::default();
                crit.compute(&img, &mut out, &Stream::null()).unwrap();
                assert!(out.as_f32().unwrap().iter().all(|v| v.is_finite()));
            }
        }
    }

    #[test]
    fn test_rejects_invalid_construction() {
        assert!(matches!(
            create_min_eigen_val_corner(MatType::U8C1, 3, 3, BorderType::Constant),
            Err(GfttError::InvalidBorderType(BorderType::Constant))
        ));
        assert!(matches!(
            create_min_eigen_val_corner(MatType::U8C3, 3, 3, BorderType::Reflect101),
            Err(GfttError::InvalidChannels { channels: 3 })
        ));
        assert!(matches!(
            create_min_eigen_val_corner(MatType::U16C1, 3, 3, BorderType::Reflect101),
            Err(GfttError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            create_harris_corner(MatType::U8C1, 0, 3, 0.04, BorderType::Reflect101),
            Err(GfttError::InvalidBlockSize(0))
        ));
        assert!(matches!(
            create_harris_corner(MatType::U8C1, 3, 9, 0.04, BorderType::Reflect101),
            Err(GfttError::InvalidApertureSize(9))
        ));
    }

    #[test]
    fn test_compute_rejects_wrong_source_type() {
        let mut crit = create_min_eigen_val_corner(MatType::U8C1, 3, 3, BorderType::Reflect101).unwrap();
        let img = square_image(8, 8);
        let mut out = DeviceMat::default();
        assert!(matches!(
            crit.compute(&img, &mut out, &Stream::null()),
            Err(GfttError::SourceTypeMismatch { .. })
        ));
    }
}
