use std::cmp::Ordering;

use gftt_core::Point2f;
use rayon::prelude::*;

use crate::device::{Stream, TextureView};

/// Below this many candidates a sequential sort is used
pub const PARALLEL_SORT_THRESHOLD: usize = 256;

/// Orders candidates by descending cornerness.
///
/// Scores are looked up in the cornerness map rather than stored alongside
/// the points. Equal scores end up in unspecified order.
pub struct CandidateRanker;

impl CandidateRanker {
    pub fn sort_corners(eig: &TextureView<'_>, corners: &mut [Point2f], stream: &Stream) {
        let score = |p: &Point2f| eig.fetch(p.x as isize, p.y as isize);
        let by_score_desc = |a: &Point2f, b: &Point2f| -> Ordering { score(b).total_cmp(&score(a)) };

        if corners.len() < PARALLEL_SORT_THRESHOLD {
            corners.sort_unstable_by(by_score_desc);
        } else {
            stream.run(|| corners.par_sort_unstable_by(by_score_desc));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gftt_core::DeviceMat;

    fn ramp(w: usize, h: usize) -> DeviceMat {
        let v = (0..w * h).map(|i| ((i * 7919) % 1009) as f32).collect();
        DeviceMat::from_f32(h, w, v)
    }

    fn assert_descending(map: &DeviceMat, pts: &[Point2f]) {
        for pair in pts.windows(2) {
            let a = map.at_f32(pair[0].x as usize, pair[0].y as usize).unwrap();
            let b = map.at_f32(pair[1].x as usize, pair[1].y as usize).unwrap();
            assert!(a >= b, "{} before {}", a, b);
        }
    }

    #[test]
    fn test_small_sort() {
        let map = DeviceMat::from_f32(1, 4, vec![0.5, 3.0, 1.0, 2.0]);
        let tex = TextureView::new(&map).unwrap();
        let mut pts: Vec<Point2f> = (0..4).map(|x| Point2f::new(x as f32, 0.0)).collect();
        CandidateRanker::sort_corners(&tex, &mut pts, &Stream::null());
        let xs: Vec<f32> = pts.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![1.0, 3.0, 2.0, 0.0]);
    }

    #[test]
    fn test_large_parallel_sort() {
        let (w, h) = (64, 64);
        let map = ramp(w, h);
        let tex = TextureView::new(&map).unwrap();
        let mut pts: Vec<Point2f> = (0..w * h)
            .map(|i| Point2f::new((i % w) as f32, (i / w) as f32))
            .collect();
        assert!(pts.len() >= PARALLEL_SORT_THRESHOLD);
        CandidateRanker::sort_corners(&tex, &mut pts, &Stream::with_threads(4).unwrap());
        assert_eq!(pts.len(), w * h);
        assert_descending(&map, &pts);
    }

    #[test]
    fn test_empty_sort() {
        let map = ramp(4, 4);
        let tex = TextureView::new(&map).unwrap();
        let mut pts: Vec<Point2f> = Vec::new();
        CandidateRanker::sort_corners(&tex, &mut pts, &Stream::null());
        assert!(pts.is_empty());
    }
}
