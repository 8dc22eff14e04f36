use gftt_core::{BorderType, MatType};

/// Coarse classification of [`GfttError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    UnsupportedFormat,
    DeviceExecution,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GfttError {
    InvalidBorderType(BorderType),
    InvalidChannels { channels: usize },
    InvalidBlockSize(i32),
    InvalidApertureSize(i32),
    InvalidQualityLevel(f64),
    InvalidMinDistance(f64),
    InvalidMaxCorners(i32),
    SourceTypeMismatch { expected: MatType, actual: MatType },
    MaskMismatch { expected: (usize, usize), actual: (usize, usize), mask_type: MatType },
    InvalidImageData { expected_len: usize, actual_len: usize },
    UnsupportedFormat(MatType),
    DeviceExecution(String),
}

impl GfttError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GfttError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            GfttError::DeviceExecution(_) => ErrorKind::DeviceExecution,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

impl std::fmt::Display for GfttError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GfttError::InvalidBorderType(b) => {
                write!(f, "Invalid border type: {:?} (must be Reflect101, Replicate or Reflect)", b)
            }
            GfttError::InvalidChannels { channels } => {
                write!(f, "Invalid channel count: {} (source must be single-channel)", channels)
            }
            GfttError::InvalidBlockSize(b) => {
                write!(f, "Invalid block size: {} (must be >= 1)", b)
            }
            GfttError::InvalidApertureSize(k) => {
                write!(f, "Invalid aperture size: {} (must be -1, 0, 1, 3, 5 or 7)", k)
            }
            GfttError::InvalidQualityLevel(q) => {
                write!(f, "Invalid quality level: {} (must be > 0)", q)
            }
            GfttError::InvalidMinDistance(d) => {
                write!(f, "Invalid minimum distance: {} (must be >= 0)", d)
            }
            GfttError::InvalidMaxCorners(n) => {
                write!(f, "Invalid max corners: {} (must be >= 0)", n)
            }
            GfttError::SourceTypeMismatch { expected, actual } => {
                write!(f, "Source type mismatch: expected {}, got {}", expected, actual)
            }
            GfttError::MaskMismatch { expected, actual, mask_type } => {
                write!(
                    f,
                    "Mask must be 8UC1 {}x{}, got {} {}x{}",
                    expected.0, expected.1, mask_type, actual.0, actual.1
                )
            }
            GfttError::InvalidImageData { expected_len, actual_len } => {
                write!(f, "Image data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            GfttError::UnsupportedFormat(t) => {
                write!(f, "Unsupported source format: {}", t)
            }
            GfttError::DeviceExecution(msg) => {
                write!(f, "Device execution failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for GfttError {}

impl From<std::collections::TryReserveError> for GfttError {
    fn from(err: std::collections::TryReserveError) -> Self {
        GfttError::DeviceExecution(format!("allocation failed: {}", err))
    }
}

impl From<rayon::ThreadPoolBuildError> for GfttError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        GfttError::DeviceExecution(format!("worker pool: {}", err))
    }
}

pub type GfttResult<T> = Result<T, GfttError>;
