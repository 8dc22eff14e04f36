use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use gftt_core::Point2f;
use rayon::prelude::*;

use crate::device::{Stream, TextureView};
use crate::error::{GfttError, GfttResult};

/// Smallest candidate buffer handed to the extractor
pub const MIN_CANDIDATE_CAPACITY: usize = 1000;

/// Candidate buffer size for an image of `area` pixels: 5% of the area, at
/// least [`MIN_CANDIDATE_CAPACITY`]
pub fn candidate_capacity(area: usize) -> usize {
    MIN_CANDIDATE_CAPACITY.max((area as f64 * 0.05) as usize)
}

#[inline]
fn pack(p: Point2f) -> u64 {
    ((p.x.to_bits() as u64) << 32) | p.y.to_bits() as u64
}

#[inline]
fn unpack(v: u64) -> Point2f {
    Point2f::new(f32::from_bits((v >> 32) as u32), f32::from_bits(v as u32))
}

/// Bounded device list filled concurrently through an atomic counter.
///
/// Each slot holds one packed point, so writers to distinct slots never
/// contend. The counter may run past the capacity; only the first
/// `capacity` increments get a slot.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    slots: Vec<AtomicU64>,
    capacity: usize,
    counter: AtomicUsize,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the usable capacity, growing storage only when needed
    pub fn ensure_capacity(&mut self, capacity: usize) -> GfttResult<()> {
        if self.slots.len() < capacity {
            log::trace!("candidate buffer realloc: {} -> {}", self.slots.len(), capacity);
            self.slots.try_reserve_exact(capacity - self.slots.len())?;
            self.slots.resize_with(capacity, || AtomicU64::new(0));
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Zero the counter before a new extraction
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }

    /// Append `p` if a slot is left. Returns whether it was stored.
    #[inline]
    pub fn push(&self, p: Point2f) -> bool {
        let idx = self.counter.fetch_add(1, Ordering::Relaxed);
        if idx < self.capacity {
            self.slots[idx].store(pack(p), Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Raw counter value, including appends that found the buffer full
    pub fn attempted(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    /// Number of stored candidates
    pub fn len(&self) -> usize {
        self.attempted().min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the stored candidates into `out`
    pub fn read_into(&self, out: &mut Vec<Point2f>) -> GfttResult<()> {
        let n = self.len();
        out.clear();
        out.try_reserve(n)?;
        out.extend(self.slots[..n].iter().map(|s| unpack(s.load(Ordering::Relaxed))));
        Ok(())
    }
}

/// Thresholded candidate extraction over a cornerness map
pub struct CandidateExtractor;

impl CandidateExtractor {
    /// Collect interior pixels scoring above `threshold` that are the maximum
    /// of their 3x3 neighbourhood and not masked out.
    ///
    /// Returns the number of stored candidates, clamped to the buffer capacity.
    /// A mask must hold one byte per map pixel.
    pub fn find_corners(
        eig: &TextureView<'_>,
        threshold: f32,
        mask: Option<&[u8]>,
        buffer: &CandidateBuffer,
        stream: &Stream,
    ) -> GfttResult<usize> {
        let rows = eig.rows();
        let cols = eig.cols();
        if let Some(m) = mask {
            if m.len() != rows * cols {
                return Err(GfttError::InvalidImageData {
                    expected_len: rows * cols,
                    actual_len: m.len(),
                });
            }
        }
        buffer.reset();

        if rows < 3 || cols < 3 {
            return Ok(0);
        }

        stream.run(|| {
            (1..rows - 1).into_par_iter().for_each(|y| {
                for x in 1..cols - 1 {
                    if let Some(m) = mask {
                        if m[y * cols + x] == 0 {
                            continue;
                        }
                    }
                    let (xi, yi) = (x as isize, y as isize);
                    let val = eig.fetch(xi, yi);
                    if val <= threshold {
                        continue;
                    }
                    if Self::is_local_max(eig, xi, yi, val) {
                        buffer.push(Point2f::new(x as f32, y as f32));
                    }
                }
            });
        });

        let attempted = buffer.attempted();
        if attempted > buffer.capacity() {
            log::warn!(
                "candidate buffer full: {} candidates, {} kept",
                attempted,
                buffer.capacity()
            );
        }
        Ok(buffer.len())
    }

    #[inline]
    fn is_local_max(eig: &TextureView<'_>, x: isize, y: isize, val: f32) -> bool {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) != (0, 0) && eig.fetch(x + dx, y + dy) > val {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gftt_core::DeviceMat;
    use proptest::prelude::*;

    fn peaks_map(w: usize, h: usize, peaks: &[(usize, usize, f32)]) -> DeviceMat {
        let mut v = vec![0.0f32; w * h];
        for &(x, y, s) in peaks {
            v[y * w + x] = s;
        }
        DeviceMat::from_f32(h, w, v)
    }

    fn extract(map: &DeviceMat, threshold: f32, mask: Option<&[u8]>, capacity: usize) -> Vec<Point2f> {
        let mut buf = CandidateBuffer::new();
        buf.ensure_capacity(capacity).unwrap();
        let tex = TextureView::new(map).unwrap();
        let n = CandidateExtractor::find_corners(&tex, threshold, mask, &buf, &Stream::null()).unwrap();
        let mut out = Vec::new();
        buf.read_into(&mut out).unwrap();
        assert_eq!(out.len(), n);
        out
    }

    #[test]
    fn test_capacity_floor() {
        assert_eq!(candidate_capacity(100), 1000);
        assert_eq!(candidate_capacity(640 * 480), 15360);
    }

    #[test]
    fn test_threshold_is_strict() {
        let map = peaks_map(10, 10, &[(3, 3, 1.0), (6, 6, 2.0)]);
        let pts = extract(&map, 1.0, None, 16);
        assert_eq!(pts, vec![Point2f::new(6.0, 6.0)]);
    }

    #[test]
    fn test_border_pixels_are_skipped() {
        let map = peaks_map(8, 8, &[(0, 4, 5.0), (7, 2, 5.0), (4, 0, 5.0), (3, 7, 5.0), (4, 4, 5.0)]);
        let pts = extract(&map, 0.5, None, 16);
        assert_eq!(pts, vec![Point2f::new(4.0, 4.0)]);
    }

    #[test]
    fn test_non_maximum_neighbours_are_dropped() {
        let map = peaks_map(10, 10, &[(4, 4, 3.0), (5, 4, 2.0), (7, 7, 1.0)]);
        let mut pts = extract(&map, 0.1, None, 16);
        pts.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(pts, vec![Point2f::new(4.0, 4.0), Point2f::new(7.0, 7.0)]);
    }

    #[test]
    fn test_mask_excludes_pixels() {
        let map = peaks_map(10, 10, &[(2, 2, 3.0), (7, 7, 3.0)]);
        let mut mask = vec![255u8; 100];
        mask[7 * 10 + 7] = 0;
        let pts = extract(&map, 0.1, Some(&mask), 16);
        assert_eq!(pts, vec![Point2f::new(2.0, 2.0)]);
    }

    #[test]
    fn test_mask_length_is_checked() {
        let map = peaks_map(10, 10, &[(4, 4, 3.0)]);
        let mut buf = CandidateBuffer::new();
        buf.ensure_capacity(16).unwrap();
        let tex = TextureView::new(&map).unwrap();
        let short = vec![255u8; 50];
        assert!(matches!(
            CandidateExtractor::find_corners(&tex, 0.1, Some(&short), &buf, &Stream::null()),
            Err(GfttError::InvalidImageData { expected_len: 100, actual_len: 50 })
        ));
        let long = vec![255u8; 101];
        assert!(CandidateExtractor::find_corners(&tex, 0.1, Some(&long), &buf, &Stream::null()).is_err());
    }

    #[test]
    fn test_overflow_is_clamped() {
        // checkerboard of isolated maxima
        let w = 40;
        let mut peaks = Vec::new();
        for y in (1..w - 1).step_by(2) {
            for x in (1..w - 1).step_by(2) {
                peaks.push((x, y, 1.0));
            }
        }
        let map = peaks_map(w, w, &peaks);

        let mut buf = CandidateBuffer::new();
        buf.ensure_capacity(25).unwrap();
        let tex = TextureView::new(&map).unwrap();
        let n = CandidateExtractor::find_corners(&tex, 0.5, None, &buf, &Stream::null()).unwrap();
        assert_eq!(n, 25);
        assert_eq!(buf.attempted(), peaks.len());

        let mut out = Vec::new();
        buf.read_into(&mut out).unwrap();
        assert_eq!(out.len(), 25);
        for p in out {
            assert_eq!(p.x as usize % 2, 1);
            assert_eq!(p.y as usize % 2, 1);
        }
    }

    #[test]
    fn test_capacity_shrinks_without_realloc() {
        let mut buf = CandidateBuffer::new();
        buf.ensure_capacity(50).unwrap();
        buf.ensure_capacity(10).unwrap();
        assert_eq!(buf.capacity(), 10);
        for i in 0..20 {
            buf.push(Point2f::new(i as f32, 0.0));
        }
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.attempted(), 20);
    }

    proptest! {
        #[test]
        fn prop_candidates_pass_threshold_and_mask(
            scores in prop::collection::vec(0.0f32..10.0, 144),
            mask in prop::collection::vec(0u8..2, 144),
            threshold in 0.0f32..9.0,
        ) {
            let map = DeviceMat::from_f32(12, 12, scores.clone());
            let pts = extract(&map, threshold, Some(&mask), 1000);
            for p in pts {
                let idx = p.y as usize * 12 + p.x as usize;
                prop_assert!(scores[idx] > threshold);
                prop_assert!(mask[idx] != 0);
            }
        }
    }
}
