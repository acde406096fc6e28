use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = FrameError> = std::result::Result<T, E>;

/// Unified error type covering the failure scenarios of the pipeline.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("panel error: {0}")]
    Panel(String),
    #[error("slideshow error: {0}")]
    Slideshow(String),
}
