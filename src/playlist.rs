use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::{error, info};

use crate::constants::SUPPORTED_EXTENSIONS;

/// Ordered image files for one orientation's folder, with the current
/// position wrapping modulo the playlist length.
#[derive(Debug, Default)]
pub struct Playlist {
    entries: Vec<PathBuf>,
    index: usize,
}

impl Playlist {
    pub fn from_folder(folder: &Path, shuffle: bool) -> Self {
        Self { entries: scan_folder(folder, shuffle), index: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Path> {
        self.entries.get(self.index).map(PathBuf::as_path)
    }

    /// One-based position for the photo counter overlay.
    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.entries.len())
    }

    pub fn advance(&mut self) {
        if !self.entries.is_empty() {
            self.index = (self.index + 1) % self.entries.len();
        }
    }

    pub fn retreat(&mut self) {
        if !self.entries.is_empty() {
            self.index = (self.index + self.entries.len() - 1) % self.entries.len();
        }
    }
}

fn scan_folder(folder: &Path, shuffle: bool) -> Vec<PathBuf> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) => {
            error!("failed to read image folder {}: {err}", folder.display());
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_supported_extension(path))
        .collect();

    if shuffle {
        paths.shuffle(&mut rand::rng());
    } else {
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    }

    info!("loaded {} images from {}", paths.len(), folder.display());
    paths
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
