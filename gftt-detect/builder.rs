use gftt_core::{GfttConfig, MatType};

use crate::config::DetectorConfig;
use crate::detector::GoodFeaturesToTrackDetector;
use crate::error::GfttResult;

/// Builder for creating a `GoodFeaturesToTrackDetector`
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    config: GfttConfig,
    src_type: MatType,
}

impl DetectorBuilder {
    /// Create a new builder with default settings
    pub fn new(src_type: MatType) -> Self {
        Self {
            config: GfttConfig::default(),
            src_type,
        }
    }

    /// Upper bound on returned corners, 0 for no bound
    pub fn max_corners(mut self, max_corners: i32) -> Self {
        self.config.max_corners = max_corners;
        self
    }

    /// Fraction of the best score a corner must exceed
    pub fn quality_level(mut self, quality_level: f64) -> Self {
        self.config.quality_level = quality_level;
        self
    }

    /// Minimum distance between returned corners
    pub fn min_distance(mut self, min_distance: f64) -> Self {
        self.config.min_distance = min_distance;
        self
    }

    /// Covariance window size
    pub fn block_size(mut self, block_size: i32) -> Self {
        self.config.block_size = block_size;
        self
    }

    /// Use the Harris response with sensitivity `k`
    pub fn harris(mut self, k: f64) -> Self {
        self.config.use_harris = true;
        self.config.harris_k = k;
        self
    }

    /// Use the minimum-eigenvalue response
    pub fn min_eigen_val(mut self) -> Self {
        self.config.use_harris = false;
        self
    }

    /// Set the number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Apply the fast preset
    pub fn preset_fast(mut self) -> Self {
        self.config = DetectorConfig::fast_preset(self.src_type).core;
        self
    }

    /// Apply the quality preset
    pub fn preset_quality(mut self) -> Self {
        self.config = DetectorConfig::quality_preset(self.src_type).core;
        self
    }

    /// Apply the dense preset
    pub fn preset_dense(mut self) -> Self {
        self.config = DetectorConfig::dense_preset(self.src_type).core;
        self
    }

    /// Build the detector
    pub fn build(self) -> GfttResult<GoodFeaturesToTrackDetector> {
        self.to_config().build_detector()
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.clone().to_config().summary()
    }

    /// Create a builder from an existing `DetectorConfig`
    pub fn from_config(config: DetectorConfig) -> Self {
        Self {
            config: config.core,
            src_type: config.src_type,
        }
    }

    /// Convert the builder into a `DetectorConfig`
    pub fn to_config(self) -> DetectorConfig {
        DetectorConfig {
            src_type: self.src_type,
            core: self.config,
            name: None,
            description: None,
            version: None,
        }
    }

    pub fn src_type(&self) -> MatType {
        self.src_type
    }

    pub fn n_threads(&self) -> usize {
        self.config.n_threads
    }
}
