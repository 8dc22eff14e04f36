use gftt_core::{DeviceMat, MatType, Point2f};
use gftt_detect::{CornersDetector, DetectStats, DetectorConfig, GfttError, GoodFeaturesToTrackDetector, Stream};
use image::GrayImage;
use serde::Serialize;

pub use gftt_core::{self, init_thread_pool, GfttConfig as Config};
pub use gftt_detect;

#[derive(Debug)]
pub enum AppError {
    Gftt(GfttError),
    ThreadPool(rayon::ThreadPoolBuildError),
    Image(image::ImageError),
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Gftt(e) => write!(f, "Detection error: {}", e),
            AppError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
            AppError::Image(e) => write!(f, "Image error: {}", e),
            AppError::Io(e) => write!(f, "I/O error: {}", e),
            AppError::Json(e) => write!(f, "JSON error: {}", e),
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<GfttError> for AppError {
    fn from(err: GfttError) -> Self {
        AppError::Gftt(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for AppError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        AppError::ThreadPool(err)
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Image(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Wrap an 8-bit grayscale image as a single-channel device matrix
pub fn gray_to_device(img: &GrayImage) -> DeviceMat {
    let (w, h) = img.dimensions();
    DeviceMat::from_u8(h as usize, w as usize, img.as_raw().clone())
}

/// High-level corner detector over `image` grayscale buffers
pub struct GoodFeatures {
    detector: GoodFeaturesToTrackDetector,
    config: DetectorConfig,
    stream: Stream,
}

impl GoodFeatures {
    /// Create a detector running on the global pool
    pub fn new(core: Config) -> AppResult<Self> {
        Self::from_config(DetectorConfig { core, ..DetectorConfig::new(MatType::U8C1) }, Stream::null())
    }

    /// Create a detector running on a private pool of `config.core.n_threads` workers
    pub fn with_threads(config: DetectorConfig) -> AppResult<Self> {
        let stream = Stream::with_threads(config.core.n_threads)?;
        Self::from_config(config, stream)
    }

    pub fn from_config(config: DetectorConfig, stream: Stream) -> AppResult<Self> {
        if config.src_type != MatType::U8C1 {
            return Err(GfttError::UnsupportedFormat(config.src_type).into());
        }
        let detector = config.build_detector()?;
        log::info!("{}", config.summary());
        Ok(Self { detector, config, stream })
    }

    /// Detect corners, strongest first
    pub fn detect(&mut self, img: &GrayImage, mask: Option<&GrayImage>) -> AppResult<Vec<Point2f>> {
        Ok(self.detect_with_stats(img, mask)?.0)
    }

    /// Detect corners and report pipeline diagnostics
    pub fn detect_with_stats(&mut self, img: &GrayImage, mask: Option<&GrayImage>) -> AppResult<(Vec<Point2f>, DetectStats)> {
        let src = gray_to_device(img);
        let mask = mask.map(gray_to_device);
        let (corners, stats) = self.detector.detect_with_stats(&src, mask.as_ref(), &self.stream)?;
        Ok((corners.download(&self.stream), stats))
    }

    /// Underlying detector as a trait object
    pub fn detector_mut(&mut self) -> &mut dyn CornersDetector {
        &mut self.detector
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }
}

/// JSON dump of one detection run
#[derive(Debug, Serialize)]
pub struct DetectionReport {
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub config: DetectorConfig,
    pub stats: DetectStats,
    pub elapsed_ms: f64,
    pub corners: Vec<Point2f>,
}

impl DetectionReport {
    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> AppResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
