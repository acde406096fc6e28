use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::{self, WireFormat};
use crate::constants::{PANEL_HEIGHT, PANEL_WIDTH};
use crate::error::{FrameError, Result};

/// Logical frame orientation, independent of the panel's fixed wiring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    #[serde(alias = "portrait")]
    Portrait,
    #[serde(alias = "landscape")]
    Landscape,
}

/// Target geometry for one display cycle.
///
/// `width`/`height` are the logical dimensions and swap between the two
/// orientations; the canvas the panel actually consumes stays
/// portrait-native.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub inverse: bool,
}

impl PanelGeometry {
    pub fn new(native_width: u32, native_height: u32, orientation: Orientation, inverse: bool) -> Self {
        let (width, height) = match orientation {
            Orientation::Portrait => (native_width, native_height),
            Orientation::Landscape => (native_height, native_width),
        };
        Self { width, height, orientation, inverse }
    }

    /// The portrait-shaped surface transmitted to the panel, regardless of
    /// the logical orientation.
    pub fn canvas(&self) -> (u32, u32) {
        match self.orientation {
            Orientation::Portrait => (self.width, self.height),
            Orientation::Landscape => (self.height, self.width),
        }
    }
}

/// A display sink accepting finished full-frame bitmaps.
pub trait Panel: Send {
    fn initialize(&mut self) -> Result<()>;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel_format(&self) -> WireFormat;
    /// Transmits a wire-encoded full frame. `buffer` must hold exactly
    /// `width * height * bytes_per_pixel` bytes.
    fn display_bitmap(&mut self, buffer: &[u8], width: u32, height: u32) -> Result<()>;
    /// File-based fallback transmit for sinks where the direct path failed.
    fn display_file(&mut self, path: &Path) -> Result<()>;
    fn set_brightness(&mut self, percent: u8) -> Result<()>;
    fn close(&mut self);
}

fn check_buffer_len(buffer: &[u8], width: u32, height: u32, format: WireFormat) -> Result<()> {
    let expected = width as usize * height as usize * format.bytes_per_pixel();
    if buffer.len() != expected {
        return Err(FrameError::Panel(format!(
            "frame buffer is {} bytes, expected {} for {}x{}",
            buffer.len(),
            expected,
            width,
            height
        )));
    }
    Ok(())
}

/// Writes wire-encoded frames straight to the panel's character device.
///
/// The vendor handshake is not part of this transport; the device is
/// expected to accept raw full-frame buffers once opened.
pub struct SerialPanel {
    port_path: PathBuf,
    format: WireFormat,
    port: Option<File>,
}

impl SerialPanel {
    pub fn new(port_path: PathBuf, format: WireFormat) -> Self {
        Self { port_path, format, port: None }
    }
}

impl Panel for SerialPanel {
    fn initialize(&mut self) -> Result<()> {
        let port = File::options()
            .write(true)
            .open(&self.port_path)
            .map_err(|err| FrameError::Panel(format!("failed to open {}: {err}", self.port_path.display())))?;
        self.port = Some(port);
        info!("panel connected on {}", self.port_path.display());
        Ok(())
    }

    fn width(&self) -> u32 {
        PANEL_WIDTH
    }

    fn height(&self) -> u32 {
        PANEL_HEIGHT
    }

    fn pixel_format(&self) -> WireFormat {
        self.format
    }

    fn display_bitmap(&mut self, buffer: &[u8], width: u32, height: u32) -> Result<()> {
        check_buffer_len(buffer, width, height, self.format)?;
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| FrameError::Panel("panel not initialized".into()))?;
        port.write_all(buffer)
            .and_then(|_| port.flush())
            .map_err(|err| FrameError::Panel(format!("serial write failed: {err}")))
    }

    fn display_file(&mut self, path: &Path) -> Result<()> {
        let image = image::open(path)
            .map_err(|err| FrameError::Panel(format!("failed to load bitmap {}: {err}", path.display())))?;
        let (width, height) = (image.width(), image.height());
        let buffer = codec::encode(&image, self.format);
        self.display_bitmap(&buffer, width, height)
    }

    fn set_brightness(&mut self, percent: u8) -> Result<()> {
        if percent > 100 {
            return Err(FrameError::Panel(format!("brightness {percent} out of range 0..=100")));
        }
        // The backlight command belongs to the vendor handshake, which this
        // raw transport does not speak.
        debug!("brightness {percent} requested");
        Ok(())
    }

    fn close(&mut self) {
        if self.port.is_some() {
            // Blank the panel so it doesn't keep showing the last photo.
            let black = DynamicImage::ImageRgb8(RgbImage::new(self.width(), self.height()));
            let buffer = codec::encode(&black, self.format);
            if let Err(err) = self.display_bitmap(&buffer, PANEL_WIDTH, PANEL_HEIGHT) {
                debug!("could not blank panel on close: {err}");
            }
            self.port = None;
            info!("panel connection closed");
        }
    }
}

/// Renders frames as numbered PNG files, for running without hardware.
pub struct PreviewPanel {
    dir: PathBuf,
    frame_index: u64,
}

impl PreviewPanel {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, frame_index: 0 }
    }
}

impl Panel for PreviewPanel {
    fn initialize(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| FrameError::Panel(format!("failed to create {}: {err}", self.dir.display())))?;
        info!("preview frames will be written to {}", self.dir.display());
        Ok(())
    }

    fn width(&self) -> u32 {
        PANEL_WIDTH
    }

    fn height(&self) -> u32 {
        PANEL_HEIGHT
    }

    fn pixel_format(&self) -> WireFormat {
        WireFormat::Bgra
    }

    fn display_bitmap(&mut self, buffer: &[u8], width: u32, height: u32) -> Result<()> {
        check_buffer_len(buffer, width, height, self.pixel_format())?;
        let mut rgba = RgbaImage::new(width, height);
        for (pixel, chunk) in rgba.pixels_mut().zip(buffer.chunks_exact(4)) {
            pixel.0 = [chunk[2], chunk[1], chunk[0], chunk[3]];
        }
        let path = self.dir.join(format!("frame_{:05}.png", self.frame_index));
        self.frame_index += 1;
        rgba.save(&path)
            .map_err(|err| FrameError::Panel(format!("failed to write {}: {err}", path.display())))?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    fn display_file(&mut self, path: &Path) -> Result<()> {
        let target = self.dir.join(format!("frame_{:05}.png", self.frame_index));
        self.frame_index += 1;
        std::fs::copy(path, &target)
            .map_err(|err| FrameError::Panel(format!("failed to copy bitmap to {}: {err}", target.display())))?;
        Ok(())
    }

    fn set_brightness(&mut self, _percent: u8) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn geometry_swaps_dimensions_between_orientations() {
        let portrait = PanelGeometry::new(320, 480, Orientation::Portrait, false);
        assert_eq!((portrait.width, portrait.height), (320, 480));
        let landscape = PanelGeometry::new(320, 480, Orientation::Landscape, false);
        assert_eq!((landscape.width, landscape.height), (480, 320));
    }

    #[test]
    fn canvas_is_portrait_shaped_in_both_orientations() {
        for orientation in [Orientation::Portrait, Orientation::Landscape] {
            let geometry = PanelGeometry::new(320, 480, orientation, false);
            assert_eq!(geometry.canvas(), (320, 480));
        }
    }

    #[test]
    fn serial_panel_rejects_frames_before_initialize() {
        let mut panel = SerialPanel::new("/nonexistent/port".into(), WireFormat::Rgb565Be);
        let buffer = vec![0u8; 2];
        assert!(panel.display_bitmap(&buffer, 1, 1).is_err());
    }

    #[test]
    fn serial_panel_rejects_short_buffers() {
        let path = std::env::temp_dir().join("photoframe-serial-short.bin");
        let mut panel = SerialPanel::new(path.clone(), WireFormat::Rgb565Be);
        std::fs::write(&path, b"").expect("create port file");
        panel.initialize().expect("open port");
        assert!(panel.display_bitmap(&[0u8; 3], 1, 1).is_err());
        std::fs::remove_file(&path).expect("cleanup port file");
    }

    #[test]
    fn serial_panel_writes_wire_bytes_verbatim() {
        let path = std::env::temp_dir().join("photoframe-serial-write.bin");
        let mut panel = SerialPanel::new(path.clone(), WireFormat::Rgb565Be);
        std::fs::write(&path, b"").expect("create port file");
        panel.initialize().expect("open port");
        let buffer = vec![0xAB, 0xCD];
        panel.display_bitmap(&buffer, 1, 1).expect("send frame");
        assert_eq!(std::fs::read(&path).expect("read port file"), buffer);
        std::fs::remove_file(&path).expect("cleanup port file");
    }

    #[test]
    fn preview_panel_round_trips_bgra_frames() {
        let dir = std::env::temp_dir().join("photoframe-preview-roundtrip");
        let mut panel = PreviewPanel::new(dir.clone());
        panel.initialize().expect("create preview dir");

        let source = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 2, Rgb([10, 20, 30])));
        let buffer = codec::encode(&source, panel.pixel_format());
        panel.display_bitmap(&buffer, 2, 2).expect("write frame");

        let written = image::open(dir.join("frame_00000.png")).expect("read frame back");
        assert_eq!(written.to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
        std::fs::remove_dir_all(&dir).expect("cleanup preview dir");
    }
}
