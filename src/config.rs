use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::WireFormat;
use crate::constants::{DEFAULT_BRIGHTNESS, DEFAULT_INTERVAL_SECS, MIN_INTERVAL_SECS};
use crate::error::{FrameError, Result};
use crate::panel::Orientation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowConfig {
    /// Seconds between photo changes.
    pub interval: u64,
    pub show_time: bool,
    pub show_counter: bool,
    pub shuffle: bool,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_SECS,
            show_time: true,
            show_counter: false,
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotosConfig {
    pub portrait_folder: PathBuf,
    pub landscape_folder: PathBuf,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub port: String,
    pub brightness: u8,
    pub inverse: bool,
    pub format: WireFormat,
    pub maintain_aspect_ratio: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            brightness: DEFAULT_BRIGHTNESS,
            inverse: false,
            format: WireFormat::default(),
            maintain_aspect_ratio: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self { enabled: true, level: "info".into() }
    }
}

/// On-disk YAML configuration. Consumed read-only by the slideshow; only
/// the external settings editor ever writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub slideshow: SlideshowConfig,
    pub photos: PhotosConfig,
    pub display: DisplayConfig,
    pub debug: DebugConfig,
}

impl FrameConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            FrameError::Config(format!("unable to read config file {}: {err}", path_ref.display()))
        })?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|err| {
            FrameError::Config(format!("failed to parse config file {}: {err}", path_ref.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration, falling back to defaults on any failure so
    /// a broken file never takes the slideshow down.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("{err}; using default configuration");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.slideshow.interval < MIN_INTERVAL_SECS {
            return Err(FrameError::Config(format!(
                "slideshow.interval must be at least {MIN_INTERVAL_SECS} second"
            )));
        }
        if self.display.brightness > 100 {
            return Err(FrameError::Config(
                "display.brightness must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }

    /// The image folder for the active orientation.
    pub fn active_folder(&self) -> &Path {
        match self.photos.orientation {
            Orientation::Portrait => &self.photos.portrait_folder,
            Orientation::Landscape => &self.photos.landscape_folder,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.slideshow.interval.max(MIN_INTERVAL_SECS))
    }
}
