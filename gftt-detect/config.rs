use gftt_core::{GfttConfig, MatType};

use crate::builder::DetectorBuilder;
use crate::detector::GoodFeaturesToTrackDetector;
use crate::error::{GfttError, GfttResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete detector configuration with all settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// Source image type the detector is built for
    pub src_type: MatType,
    /// Core detection parameters
    pub core: GfttConfig,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub description: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub version: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new(MatType::U8C1)
    }
}

impl DetectorConfig {
    /// Create new configuration with default settings
    pub fn new(src_type: MatType) -> Self {
        Self {
            src_type,
            core: GfttConfig::default(),
            name: None,
            description: None,
            version: None,
        }
    }

    /// Few well separated corners, cheap suppression
    pub fn fast_preset(src_type: MatType) -> Self {
        Self {
            src_type,
            core: GfttConfig {
                max_corners: 300,
                quality_level: 0.05,
                min_distance: 10.0,
                block_size: 3,
                ..GfttConfig::default()
            },
            name: Some("Fast".to_string()),
            description: Some("Few strong corners for quick tracking".to_string()),
            version: Some("1.0".to_string()),
        }
    }

    /// Larger window and Harris response for stable corners
    pub fn quality_preset(src_type: MatType) -> Self {
        Self {
            src_type,
            core: GfttConfig {
                max_corners: 2000,
                quality_level: 0.01,
                min_distance: 5.0,
                block_size: 5,
                use_harris: true,
                harris_k: 0.04,
                ..GfttConfig::default()
            },
            name: Some("Quality".to_string()),
            description: Some("Harris response over a 5x5 window".to_string()),
            version: Some("1.0".to_string()),
        }
    }

    /// Every candidate above a low threshold, no suppression
    pub fn dense_preset(src_type: MatType) -> Self {
        Self {
            src_type,
            core: GfttConfig {
                max_corners: 0,
                quality_level: 0.001,
                min_distance: 0.0,
                block_size: 3,
                ..GfttConfig::default()
            },
            name: Some("Dense".to_string()),
            description: Some("All local maxima above a low threshold".to_string()),
            version: Some("1.0".to_string()),
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self.version = Some("1.0".to_string());
        self
    }

    /// Convert to DetectorBuilder for further customization
    pub fn to_builder(self) -> DetectorBuilder {
        DetectorBuilder::from_config(self)
    }

    /// Build a detector from this configuration
    pub fn build_detector(&self) -> GfttResult<GoodFeaturesToTrackDetector> {
        self.validate()?;
        GoodFeaturesToTrackDetector::from_config(&self.core, self.src_type)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "DetectorConfig: {}, max_corners={}, quality_level={}, min_distance={}, block_size={}, response={}, threads={}",
            self.src_type,
            self.core.max_corners,
            self.core.quality_level,
            self.core.min_distance,
            self.core.block_size,
            if self.core.use_harris { format!("Harris(k={})", self.core.harris_k) } else { "MinEigenVal".to_string() },
            self.core.n_threads
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> GfttResult<()> {
        if self.src_type.channels != 1 {
            return Err(GfttError::InvalidChannels { channels: self.src_type.channels });
        }
        if !(self.core.quality_level > 0.0) {
            return Err(GfttError::InvalidQualityLevel(self.core.quality_level));
        }
        if !(self.core.min_distance >= 0.0) {
            return Err(GfttError::InvalidMinDistance(self.core.min_distance));
        }
        if self.core.max_corners < 0 {
            return Err(GfttError::InvalidMaxCorners(self.core.max_corners));
        }
        if self.core.block_size < 1 {
            return Err(GfttError::InvalidBlockSize(self.core.block_size));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from a file, picking the format from its extension
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::load_toml(path),
            _ => Self::load_json(path),
        }
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}
