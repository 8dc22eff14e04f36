#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Element depth of a matrix channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Depth {
    U8,
    U16,
    S16,
    F32,
    F64,
}

impl Depth {
    /// Size of one channel element in bytes
    pub fn size_of(self) -> usize {
        match self {
            Depth::U8 => 1,
            Depth::U16 | Depth::S16 => 2,
            Depth::F32 => 4,
            Depth::F64 => 8,
        }
    }
}

/// Depth + channel count, the equivalent of a `CV_8UC1`-style type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatType {
    pub depth: Depth,
    pub channels: usize,
}

impl MatType {
    pub const U8C1: MatType = MatType { depth: Depth::U8, channels: 1 };
    pub const U8C3: MatType = MatType { depth: Depth::U8, channels: 3 };
    pub const U16C1: MatType = MatType { depth: Depth::U16, channels: 1 };
    pub const F32C1: MatType = MatType { depth: Depth::F32, channels: 1 };
    pub const F32C2: MatType = MatType { depth: Depth::F32, channels: 2 };

    pub const fn new(depth: Depth, channels: usize) -> Self {
        Self { depth, channels }
    }
}

impl std::fmt::Display for MatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = match self.depth {
            Depth::U8 => "8U",
            Depth::U16 => "16U",
            Depth::S16 => "16S",
            Depth::F32 => "32F",
            Depth::F64 => "64F",
        };
        write!(f, "{}C{}", depth, self.channels)
    }
}

/// Pixel extrapolation policy used by the filters and the covariance window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BorderType {
    /// `iiiiii|abcdefgh|iiiiiii`
    Constant,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
    /// `fedcba|abcdefgh|hgfedcb`
    Reflect,
    /// `cdefgh|abcdefgh|abcdefg`
    Wrap,
    /// `gfedcb|abcdefgh|gfedcba`
    #[default]
    Reflect101,
}

impl BorderType {
    /// Map an out-of-range coordinate back into `0..len`.
    ///
    /// `Constant` has no source pixel to map to and returns `None`.
    pub fn interpolate(self, p: isize, len: usize) -> Option<usize> {
        let n = len as isize;
        if (0..n).contains(&p) {
            return Some(p as usize);
        }
        match self {
            BorderType::Constant => None,
            BorderType::Replicate => Some(p.clamp(0, n - 1) as usize),
            BorderType::Wrap => Some(p.rem_euclid(n) as usize),
            BorderType::Reflect | BorderType::Reflect101 => {
                if n == 1 {
                    return Some(0);
                }
                let delta = if self == BorderType::Reflect101 { 1 } else { 0 };
                let mut p = p;
                while !(0..n).contains(&p) {
                    if p < 0 {
                        p = -p - 1 + delta;
                    } else {
                        p = n - 1 - (p - n) - delta;
                    }
                }
                Some(p as usize)
            }
        }
    }
}

/// 2-D point with float coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

impl Point2f {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Point2f) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Typed storage behind a [`DeviceMat`]
#[derive(Debug, Clone, PartialEq)]
pub enum MatData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    S16(Vec<i16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl MatData {
    pub fn depth(&self) -> Depth {
        match self {
            MatData::U8(_) => Depth::U8,
            MatData::U16(_) => Depth::U16,
            MatData::S16(_) => Depth::S16,
            MatData::F32(_) => Depth::F32,
            MatData::F64(_) => Depth::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MatData::U8(v) => v.len(),
            MatData::U16(v) => v.len(),
            MatData::S16(v) => v.len(),
            MatData::F32(v) => v.len(),
            MatData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements the storage can hold without reallocating
    pub fn capacity(&self) -> usize {
        match self {
            MatData::U8(v) => v.capacity(),
            MatData::U16(v) => v.capacity(),
            MatData::S16(v) => v.capacity(),
            MatData::F32(v) => v.capacity(),
            MatData::F64(v) => v.capacity(),
        }
    }

    /// Empty storage of the given depth
    pub fn empty(depth: Depth) -> Self {
        match depth {
            Depth::U8 => MatData::U8(Vec::new()),
            Depth::U16 => MatData::U16(Vec::new()),
            Depth::S16 => MatData::S16(Vec::new()),
            Depth::F32 => MatData::F32(Vec::new()),
            Depth::F64 => MatData::F64(Vec::new()),
        }
    }
}

/// Row-major matrix living in device memory.
///
/// Channels are interleaved, rows are tightly packed (no pitch).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMat {
    pub rows: usize,
    pub cols: usize,
    pub mat_type: MatType,
    pub data: MatData,
}

impl Default for DeviceMat {
    fn default() -> Self {
        Self::empty(MatType::F32C1)
    }
}

impl DeviceMat {
    /// Empty matrix of the given type
    pub fn empty(mat_type: MatType) -> Self {
        Self {
            rows: 0,
            cols: 0,
            mat_type,
            data: MatData::empty(mat_type.depth),
        }
    }

    /// Zero-filled matrix
    pub fn zeros(rows: usize, cols: usize, mat_type: MatType) -> Self {
        let n = rows * cols * mat_type.channels;
        let data = match mat_type.depth {
            Depth::U8 => MatData::U8(vec![0; n]),
            Depth::U16 => MatData::U16(vec![0; n]),
            Depth::S16 => MatData::S16(vec![0; n]),
            Depth::F32 => MatData::F32(vec![0.0; n]),
            Depth::F64 => MatData::F64(vec![0.0; n]),
        };
        Self { rows, cols, mat_type, data }
    }

    /// Wrap single-channel 8-bit pixels. Length is checked by the consumer.
    pub fn from_u8(rows: usize, cols: usize, data: Vec<u8>) -> Self {
        Self {
            rows,
            cols,
            mat_type: MatType::U8C1,
            data: MatData::U8(data),
        }
    }

    /// Wrap single-channel float pixels. Length is checked by the consumer.
    pub fn from_f32(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        Self {
            rows,
            cols,
            mat_type: MatType::F32C1,
            data: MatData::F32(data),
        }
    }

    /// Wrap arbitrary storage with an explicit channel count
    pub fn from_data(rows: usize, cols: usize, channels: usize, data: MatData) -> Self {
        let mat_type = MatType::new(data.depth(), channels);
        Self { rows, cols, mat_type, data }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Area in pixels
    pub fn area(&self) -> usize {
        self.rows * self.cols
    }

    /// `(width, height)`
    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Element count implied by shape and type
    pub fn expected_len(&self) -> usize {
        self.rows * self.cols * self.mat_type.channels
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            MatData::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            MatData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            MatData::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Read a single-channel float element; `None` for other types or out of range
    pub fn at_f32(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.cols || y >= self.rows {
            return None;
        }
        self.as_f32().and_then(|d| d.get(y * self.cols + x).copied())
    }
}

/// Parameters of the good-features-to-track detector.
///
/// Integer fields stay signed so that negative values coming from
/// configuration files can be rejected with a meaningful error.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GfttConfig {
    /// Upper bound on returned corners, 0 = unbounded
    pub max_corners: i32,
    /// Fraction of the best score a pixel must exceed
    pub quality_level: f64,
    /// Minimum Euclidean distance between returned corners
    pub min_distance: f64,
    /// Covariance window size
    pub block_size: i32,
    pub use_harris: bool,
    /// Harris sensitivity `k`
    pub harris_k: f64,
    pub n_threads: usize,
}

impl Default for GfttConfig {
    fn default() -> Self {
        Self {
            max_corners: 1000,
            quality_level: 0.01,
            min_distance: 0.0,
            block_size: 3,
            use_harris: false,
            harris_k: 0.04,
            n_threads: num_cpus::get().max(1),
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
