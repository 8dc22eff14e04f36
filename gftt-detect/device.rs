//! Device execution, memory and reduction services.
//!
//! Kernels are rayon parallel iterators; device memory is host memory that is
//! only ever touched through these helpers, so the download/upload points of
//! the pipeline stay explicit.

use std::ops::Deref;
use std::sync::Arc;

use gftt_core::{DeviceMat, MatData, MatType};
use rayon::prelude::*;

use crate::error::{GfttError, GfttResult};

/// Ordered execution queue for device kernels.
///
/// Work submitted through [`Stream::run`] executes in issue order. A stream
/// built with [`Stream::with_threads`] owns a private worker pool; the null
/// stream uses the global rayon pool.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Stream {
    /// The default stream, backed by the global pool
    pub fn null() -> Self {
        Self { pool: None }
    }

    /// A stream with its own pool of `n_threads` workers
    pub fn with_threads(n_threads: usize) -> GfttResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads.max(1))
            .build()?;
        Ok(Self { pool: Some(Arc::new(pool)) })
    }

    /// Execute a kernel on this stream
    pub fn run<R, F>(&self, kernel: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(kernel),
            None => kernel(),
        }
    }

    /// Block until every kernel issued on this stream has finished.
    ///
    /// Kernels complete before `run` returns, so reaching this call in
    /// program order already satisfies it.
    pub fn wait_for_completion(&self) {
        log::trace!("stream sync ({} workers)", self.num_threads());
    }

    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

fn grow<T: Clone>(v: &mut Vec<T>, n: usize, fill: T) -> GfttResult<()> {
    if v.capacity() < n {
        log::trace!("device realloc: {} -> {} elements", v.capacity(), n);
        v.clear();
        v.try_reserve_exact(n)?;
    }
    v.resize(n, fill);
    Ok(())
}

/// Make `mat` a `rows x cols` matrix of `mat_type`.
///
/// Storage is reused when its capacity suffices; contents are unspecified
/// afterwards.
pub fn ensure_size_is_enough(mat: &mut DeviceMat, rows: usize, cols: usize, mat_type: MatType) -> GfttResult<()> {
    if mat.data.depth() != mat_type.depth {
        mat.data = MatData::empty(mat_type.depth);
    }
    let n = rows * cols * mat_type.channels;
    match &mut mat.data {
        MatData::U8(v) => grow(v, n, 0)?,
        MatData::U16(v) => grow(v, n, 0)?,
        MatData::S16(v) => grow(v, n, 0)?,
        MatData::F32(v) => grow(v, n, 0.0)?,
        MatData::F64(v) => grow(v, n, 0.0)?,
    }
    mat.rows = rows;
    mat.cols = cols;
    mat.mat_type = mat_type;
    Ok(())
}

/// Global minimum and maximum over a single-channel matrix.
///
/// Pixels where `mask` is zero are skipped. Returns `(0.0, 0.0)` when no pixel
/// is selected.
pub fn min_max(src: &DeviceMat, mask: Option<&DeviceMat>, stream: &Stream) -> GfttResult<(f64, f64)> {
    if src.mat_type.channels != 1 {
        return Err(GfttError::InvalidChannels { channels: src.mat_type.channels });
    }
    let mask = match mask {
        Some(m) => {
            if m.mat_type != MatType::U8C1 || m.size() != src.size() {
                return Err(GfttError::MaskMismatch {
                    expected: src.size(),
                    actual: m.size(),
                    mask_type: m.mat_type,
                });
            }
            m.as_u8()
        }
        None => None,
    };

    let identity = (f64::INFINITY, f64::NEG_INFINITY);
    let (lo, hi) = stream.run(|| match &src.data {
        MatData::F32(v) => reduce(v, mask, |x| *x as f64),
        MatData::U8(v) => reduce(v, mask, |x| *x as f64),
        MatData::U16(v) => reduce(v, mask, |x| *x as f64),
        MatData::S16(v) => reduce(v, mask, |x| *x as f64),
        MatData::F64(v) => reduce(v, mask, |x| *x),
    });

    if (lo, hi) == identity {
        Ok((0.0, 0.0))
    } else {
        Ok((lo, hi))
    }
}

fn reduce<T, F>(data: &[T], mask: Option<&[u8]>, to_f64: F) -> (f64, f64)
where
    T: Sync,
    F: Fn(&T) -> f64 + Sync,
{
    let identity = || (f64::INFINITY, f64::NEG_INFINITY);
    let merge = |a: (f64, f64), b: (f64, f64)| (a.0.min(b.0), a.1.max(b.1));
    match mask {
        Some(m) => data
            .par_iter()
            .zip(m.par_iter())
            .filter(|(_, &keep)| keep != 0)
            .map(|(v, _)| {
                let v = to_f64(v);
                (v, v)
            })
            .reduce(identity, merge),
        None => data
            .par_iter()
            .map(|v| {
                let v = to_f64(v);
                (v, v)
            })
            .reduce(identity, merge),
    }
}

/// Read-only, clamp-addressed view over a single-channel float matrix
#[derive(Debug, Clone, Copy)]
pub struct TextureView<'a> {
    data: &'a [f32],
    rows: usize,
    cols: usize,
}

impl<'a> TextureView<'a> {
    pub fn new(mat: &'a DeviceMat) -> GfttResult<Self> {
        if mat.mat_type != MatType::F32C1 {
            return Err(GfttError::SourceTypeMismatch {
                expected: MatType::F32C1,
                actual: mat.mat_type,
            });
        }
        let data = mat.as_f32().unwrap_or(&[]);
        if data.len() != mat.area() {
            return Err(GfttError::InvalidImageData {
                expected_len: mat.area(),
                actual_len: data.len(),
            });
        }
        Ok(Self { data, rows: mat.rows, cols: mat.cols })
    }

    /// Element at `(x, y)`, coordinates clamped to the edge
    #[inline]
    pub fn fetch(&self, x: isize, y: isize) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let x = x.clamp(0, self.cols as isize - 1) as usize;
        let y = y.clamp(0, self.rows as isize - 1) as usize;
        self.data[y * self.cols + x]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// One-dimensional buffer in device memory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceVec<T> {
    data: Vec<T>,
}

impl<T: Copy> DeviceVec<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Copy a host slice into a fresh device buffer
    pub fn upload(host: &[T], stream: &Stream) -> GfttResult<Self>
    where
        T: Send + Sync,
    {
        let mut data = Vec::new();
        data.try_reserve_exact(host.len())?;
        stream.run(|| data.extend_from_slice(host));
        Ok(Self { data })
    }

    /// Copy the buffer back to host memory
    pub fn download(&self, stream: &Stream) -> Vec<T> {
        stream.wait_for_completion();
        self.data.clone()
    }

    /// Device-to-device copy of the first `n` elements
    pub fn copy_prefix(&self, n: usize, stream: &Stream) -> GfttResult<Self>
    where
        T: Send + Sync,
    {
        Self::upload(&self.data[..n.min(self.data.len())], stream)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub(crate) fn as_vec_mut(&mut self) -> &mut Vec<T> {
        &mut self.data
    }

    pub fn into_inner(self) -> Vec<T> {
        self.data
    }
}

impl<T> Deref for DeviceVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_size_reuses_capacity() {
        let mut m = DeviceMat::empty(MatType::F32C1);
        ensure_size_is_enough(&mut m, 20, 20, MatType::F32C1).unwrap();
        let cap = m.data.capacity();
        let ptr = m.as_f32().unwrap().as_ptr();

        ensure_size_is_enough(&mut m, 10, 10, MatType::F32C1).unwrap();
        assert_eq!(m.data.len(), 100);
        assert_eq!(m.data.capacity(), cap);
        assert_eq!(m.as_f32().unwrap().as_ptr(), ptr);
        assert_eq!(m.size(), (10, 10));
    }

    #[test]
    fn test_ensure_size_changes_depth() {
        let mut m = DeviceMat::zeros(2, 2, MatType::U8C1);
        ensure_size_is_enough(&mut m, 3, 3, MatType::F32C1).unwrap();
        assert_eq!(m.mat_type, MatType::F32C1);
        assert_eq!(m.as_f32().unwrap().len(), 9);
    }

    #[test]
    fn test_min_max_plain_and_masked() {
        let m = DeviceMat::from_f32(2, 3, vec![1.0, -4.0, 2.5, 9.0, 0.0, 3.0]);
        let (lo, hi) = min_max(&m, None, &Stream::null()).unwrap();
        assert_eq!((lo, hi), (-4.0, 9.0));

        let mask = DeviceMat::from_u8(2, 3, vec![1, 0, 1, 0, 1, 1]);
        let (lo, hi) = min_max(&m, Some(&mask), &Stream::null()).unwrap();
        assert_eq!((lo, hi), (0.0, 3.0));
    }

    #[test]
    fn test_min_max_empty_selection() {
        let m = DeviceMat::from_f32(1, 2, vec![5.0, 6.0]);
        let mask = DeviceMat::from_u8(1, 2, vec![0, 0]);
        assert_eq!(min_max(&m, Some(&mask), &Stream::null()).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn test_min_max_rejects_bad_mask() {
        let m = DeviceMat::from_f32(1, 2, vec![5.0, 6.0]);
        let mask = DeviceMat::from_u8(2, 2, vec![1; 4]);
        assert!(matches!(
            min_max(&m, Some(&mask), &Stream::null()),
            Err(GfttError::MaskMismatch { .. })
        ));
    }

    #[test]
    fn test_texture_clamps() {
        let m = DeviceMat::from_f32(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let tex = TextureView::new(&m).unwrap();
        assert_eq!(tex.fetch(-1, -1), 1.0);
        assert_eq!(tex.fetch(5, 0), 2.0);
        assert_eq!(tex.fetch(1, 9), 4.0);
    }

    #[test]
    fn test_private_stream_runs_kernels() {
        let stream = Stream::with_threads(2).unwrap();
        assert_eq!(stream.num_threads(), 2);
        let sum: u64 = stream.run(|| (0..1000u64).into_par_iter().sum());
        assert_eq!(sum, 499_500);
    }

    #[test]
    fn test_upload_download() {
        let stream = Stream::null();
        let buf = DeviceVec::upload(&[1u32, 2, 3], &stream).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.download(&stream), vec![1, 2, 3]);
        assert_eq!(buf.copy_prefix(2, &stream).unwrap().as_slice(), &[1, 2]);
        assert_eq!(buf.copy_prefix(9, &stream).unwrap().len(), 3);
    }
}
