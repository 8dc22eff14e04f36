use gftt_core::{BorderType, DeviceMat, GfttConfig, MatType, Point2f};

use crate::cornerness::{create_cornerness_criterion, CornernessCriteria};
use crate::device::{min_max, DeviceVec, Stream, TextureView};
use crate::error::{GfttError, GfttResult};
use crate::extract::{candidate_capacity, CandidateBuffer, CandidateExtractor};
use crate::rank::CandidateRanker;
use crate::suppression::suppress;
use crate::types::{DetectStage, DetectStats};

/// Corner detection over a device image
pub trait CornersDetector: Send {
    /// Detect corners in `image`, optionally restricted to nonzero `mask`
    /// pixels. Points come back in descending score order.
    fn detect(&mut self, image: &DeviceMat, mask: Option<&DeviceMat>, stream: &Stream) -> GfttResult<DeviceVec<Point2f>>;
}

/// Shi-Tomasi / Harris "good features to track" detector.
///
/// Owns every intermediate buffer and reuses them between calls. `detect`
/// takes `&mut self`; run separate instances for concurrent detection.
pub struct GoodFeaturesToTrackDetector {
    max_corners: i32,
    quality_level: f64,
    min_distance: f64,
    criterion: Box<dyn CornernessCriteria>,
    eig: DeviceMat,
    candidates: CandidateBuffer,
    sorted: DeviceVec<Point2f>,
    last_stats: DetectStats,
}

impl GoodFeaturesToTrackDetector {
    /// Derivative aperture used for the cornerness map
    pub const APERTURE_SIZE: i32 = 3;

    /// Creates a new detector with validation
    pub fn new(
        src_type: MatType,
        max_corners: i32,
        quality_level: f64,
        min_distance: f64,
        block_size: i32,
        use_harris: bool,
        harris_k: f64,
    ) -> GfttResult<Self> {
        if !(quality_level > 0.0) {
            return Err(GfttError::InvalidQualityLevel(quality_level));
        }
        if !(min_distance >= 0.0) {
            return Err(GfttError::InvalidMinDistance(min_distance));
        }
        if max_corners < 0 {
            return Err(GfttError::InvalidMaxCorners(max_corners));
        }

        let sensitivity = if use_harris { Some(harris_k) } else { None };
        let criterion = create_cornerness_criterion(
            src_type,
            block_size,
            Self::APERTURE_SIZE,
            sensitivity,
            BorderType::Reflect101,
        )?;

        Ok(Self {
            max_corners,
            quality_level,
            min_distance,
            criterion,
            eig: DeviceMat::empty(MatType::F32C1),
            candidates: CandidateBuffer::new(),
            sorted: DeviceVec::new(),
            last_stats: DetectStats::default(),
        })
    }

    pub fn from_config(cfg: &GfttConfig, src_type: MatType) -> GfttResult<Self> {
        Self::new(
            src_type,
            cfg.max_corners,
            cfg.quality_level,
            cfg.min_distance,
            cfg.block_size,
            cfg.use_harris,
            cfg.harris_k,
        )
    }

    /// Validates image and mask before any device work
    fn validate_inputs(&self, image: &DeviceMat, mask: Option<&DeviceMat>) -> GfttResult<()> {
        let src_type = self.criterion.src_type();
        if image.mat_type != src_type {
            return Err(GfttError::SourceTypeMismatch {
                expected: src_type,
                actual: image.mat_type,
            });
        }
        if image.data.len() != image.expected_len() {
            return Err(GfttError::InvalidImageData {
                expected_len: image.expected_len(),
                actual_len: image.data.len(),
            });
        }
        if let Some(m) = mask {
            if m.mat_type != MatType::U8C1 || m.size() != image.size() || m.data.len() != m.expected_len() {
                return Err(GfttError::MaskMismatch {
                    expected: image.size(),
                    actual: m.size(),
                    mask_type: m.mat_type,
                });
            }
        }
        Ok(())
    }

    /// Detect corners and report per-stage diagnostics
    pub fn detect_with_stats(
        &mut self,
        image: &DeviceMat,
        mask: Option<&DeviceMat>,
        stream: &Stream,
    ) -> GfttResult<(DeviceVec<Point2f>, DetectStats)> {
        self.validate_inputs(image, mask)?;

        let mut stats = DetectStats { stage: DetectStage::Scoring, ..Default::default() };
        self.last_stats = stats;
        self.criterion.compute(image, &mut self.eig, stream)?;

        // Reduced over the whole map, mask or not.
        advance(&mut stats, &mut self.last_stats, DetectStage::Reducing);
        let (_, max_score) = min_max(&self.eig, None, stream)?;
        stats.max_score = max_score;
        stats.threshold = max_score * self.quality_level;

        advance(&mut stats, &mut self.last_stats, DetectStage::Extracting);
        stats.capacity = candidate_capacity(image.area());
        self.candidates.ensure_capacity(stats.capacity)?;
        let eig = TextureView::new(&self.eig)?;
        let mask_data = mask.and_then(|m| m.as_u8());
        let total = CandidateExtractor::find_corners(&eig, stats.threshold as f32, mask_data, &self.candidates, stream)?;
        stats.candidates = total;
        stats.overflowed = self.candidates.attempted() > stats.capacity;
        log::debug!(
            "gftt {}x{}: max={:.6e} threshold={:.6e} candidates={}/{}",
            image.cols,
            image.rows,
            stats.max_score,
            stats.threshold,
            total,
            stats.capacity
        );

        if total == 0 {
            advance(&mut stats, &mut self.last_stats, DetectStage::EmptyExit);
            return Ok((DeviceVec::new(), stats));
        }

        advance(&mut stats, &mut self.last_stats, DetectStage::Sorting);
        self.candidates.read_into(self.sorted.as_vec_mut())?;
        CandidateRanker::sort_corners(&eig, self.sorted.as_mut_slice(), stream);

        advance(&mut stats, &mut self.last_stats, DetectStage::Suppressing);
        let max_corners = self.max_corners as usize;
        let corners = if self.min_distance < 1.0 {
            let n = if max_corners > 0 { max_corners.min(total) } else { total };
            self.sorted.copy_prefix(n, stream)?
        } else {
            let host = self.sorted.download(stream);
            let kept = suppress(&host, self.min_distance, max_corners, image.cols, image.rows);
            DeviceVec::upload(&kept, stream)?
        };

        stats.corners = corners.len();
        advance(&mut stats, &mut self.last_stats, DetectStage::Done);
        log::debug!("gftt: {} corners", stats.corners);
        Ok((corners, stats))
    }

    /// Cornerness map from the last call
    pub fn score_map(&self) -> &DeviceMat {
        &self.eig
    }

    /// Diagnostics of the last call
    pub fn last_stats(&self) -> &DetectStats {
        &self.last_stats
    }

    pub fn src_type(&self) -> MatType {
        self.criterion.src_type()
    }

    pub fn max_corners(&self) -> i32 {
        self.max_corners
    }

    pub fn quality_level(&self) -> f64 {
        self.quality_level
    }

    pub fn min_distance(&self) -> f64 {
        self.min_distance
    }
}

/// Move to `stage` and publish the progress so far
fn advance(stats: &mut DetectStats, last: &mut DetectStats, stage: DetectStage) {
    stats.stage = stage;
    *last = *stats;
}

impl CornersDetector for GoodFeaturesToTrackDetector {
    fn detect(&mut self, image: &DeviceMat, mask: Option<&DeviceMat>, stream: &Stream) -> GfttResult<DeviceVec<Point2f>> {
        self.detect_with_stats(image, mask, stream).map(|(corners, _)| corners)
    }
}
