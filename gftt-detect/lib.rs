//! Good-features-to-track corner detection.
//!
//! The pipeline scores every pixel (`cornerness`), keeps thresholded local
//! maxima in a bounded buffer (`extract`), orders them by score (`rank`) and
//! enforces a minimum spacing (`suppression`). `detector` ties the stages
//! together over the execution services in `device`.

pub mod builder;
pub mod config;
pub mod cornerness;
pub mod detector;
pub mod device;
pub mod error;
pub mod extract;
pub mod filter;
pub mod rank;
pub mod suppression;
pub mod types;

pub use builder::DetectorBuilder;
pub use config::DetectorConfig;
pub use cornerness::{
    create_cornerness_criterion, create_harris_corner, create_min_eigen_val_corner, CornerCriterion,
    CornernessCriteria, ResponseKind,
};
pub use detector::{CornersDetector, GoodFeaturesToTrackDetector};
pub use device::{ensure_size_is_enough, min_max, DeviceVec, Stream, TextureView};
pub use error::{ErrorKind, GfttError, GfttResult};
pub use extract::{CandidateBuffer, CandidateExtractor};
pub use filter::DerivativeFilter;
pub use rank::CandidateRanker;
pub use suppression::{suppress, SpatialGrid};
pub use types::{DetectStage, DetectStats};

use gftt_core::MatType;

/// Create a good-features-to-track detector for `src_type` images.
///
/// `use_harris` selects the Harris response with sensitivity `harris_k`,
/// otherwise the minimum eigenvalue is used. Derivatives use a 3x3 Sobel
/// aperture and reflect-101 borders.
pub fn create_good_features_to_track_detector(
    src_type: MatType,
    max_corners: i32,
    quality_level: f64,
    min_distance: f64,
    block_size: i32,
    use_harris: bool,
    harris_k: f64,
) -> GfttResult<GoodFeaturesToTrackDetector> {
    GoodFeaturesToTrackDetector::new(
        src_type,
        max_corners,
        quality_level,
        min_distance,
        block_size,
        use_harris,
        harris_k,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gftt_core::{DeviceMat, Point2f};

    #[test]
    fn test_factory_returns_trait_object() {
        let det = create_good_features_to_track_detector(MatType::U8C1, 10, 0.01, 0.0, 3, false, 0.04).unwrap();
        let mut boxed: Box<dyn CornersDetector> = Box::new(det);

        let mut px = vec![0u8; 100];
        px[5 * 10 + 5] = 255;
        let img = DeviceMat::from_u8(10, 10, px);
        let pts = boxed.detect(&img, None, &Stream::null()).unwrap();
        assert_eq!(pts.download(&Stream::null()), vec![Point2f::new(5.0, 5.0)]);
    }

    #[test]
    fn test_factory_rejects_bad_block_size() {
        let err = create_good_features_to_track_detector(MatType::U8C1, 10, 0.01, 0.0, 0, false, 0.04);
        assert!(matches!(err, Err(GfttError::InvalidBlockSize(0))));
        assert_eq!(err.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_detectors_run_concurrently() {
        let mut px = vec![0u8; 32 * 32];
        px[16 * 32 + 16] = 255;
        let img = DeviceMat::from_u8(32, 32, px);

        std::thread::scope(|s| {
            for _ in 0..4 {
                let img = &img;
                s.spawn(move || {
                    let mut det = create_good_features_to_track_detector(MatType::U8C1, 5, 0.01, 2.0, 3, false, 0.04).unwrap();
                    let stream = Stream::with_threads(2).unwrap();
                    let pts = det.detect(img, None, &stream).unwrap();
                    assert_eq!(pts.as_slice(), &[Point2f::new(16.0, 16.0)]);
                });
            }
        });
    }
}
