use std::fs;
use std::io::Cursor;
use std::path::Path;

use exif::{In, Reader, Tag, Value};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, Rgba, RgbaImage};
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::panel::{Orientation, PanelGeometry};

/// Loads a photo and composes it onto the panel canvas.
///
/// A decode failure is the only hard error; once decoded, the frame that
/// comes back always has exactly the canvas dimensions.
pub fn compose(path: &Path, geometry: &PanelGeometry, maintain_aspect: bool) -> Result<RgbImage> {
    let bytes = fs::read(path).map_err(|source| FrameError::Io { path: path.into(), source })?;
    let orientation_tag = exif_orientation(&bytes);
    let image = image::load_from_memory(&bytes)
        .map_err(|source| FrameError::Decode { path: path.into(), source })?;
    Ok(compose_decoded(image, orientation_tag, geometry, maintain_aspect))
}

/// Reads the EXIF orientation tag, defaulting to 1 (no rotation) when the
/// container has no EXIF data or it cannot be parsed.
fn exif_orientation(bytes: &[u8]) -> u16 {
    match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => {
            if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
                if let Value::Short(values) = &field.value {
                    if let Some(&value) = values.first() {
                        return value;
                    }
                }
            }
            1
        }
        Err(_) => 1,
    }
}

pub fn compose_decoded(
    image: DynamicImage,
    exif_tag: u16,
    geometry: &PanelGeometry,
    maintain_aspect: bool,
) -> RgbImage {
    let (canvas_w, canvas_h) = geometry.canvas();

    let image = exif_rotate(image, exif_tag);

    // Panel rotation: portrait frames stand wide sources upright; landscape
    // frames always rotate to match the fixed physical wiring.
    let image = match geometry.orientation {
        Orientation::Portrait if image.width() > image.height() => image.rotate270(),
        Orientation::Landscape => image.rotate90(),
        _ => image,
    };

    let composed = match geometry.orientation {
        // The rotation above already reoriented the content, so landscape
        // stretches straight onto the portrait-shaped canvas the panel
        // consumes. Not a bug: the landscape target dimensions never reach
        // the wire.
        Orientation::Landscape => image.resize_exact(canvas_w, canvas_h, FilterType::Lanczos3),
        Orientation::Portrait if maintain_aspect => {
            DynamicImage::ImageRgba8(letterbox(&image, canvas_w, canvas_h))
        }
        Orientation::Portrait => image.resize_exact(canvas_w, canvas_h, FilterType::Lanczos3),
    };

    let composed = if geometry.inverse { composed.rotate180() } else { composed };

    flatten_over_black(&composed)
}

/// EXIF corrective rotation, unrelated to the panel orientation.
/// Tags with mirrored variants are left alone.
fn exif_rotate(image: DynamicImage, tag: u16) -> DynamicImage {
    match tag {
        3 => image.rotate180(),
        6 => image.rotate90(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Scales by `min(target_w/src_w, target_h/src_h)` and centers the result
/// on a black canvas of exactly the target size.
fn letterbox(image: &DynamicImage, target_w: u32, target_h: u32) -> RgbaImage {
    let src_w = image.width().max(1);
    let src_h = image.height().max(1);
    let scale = (target_w as f32 / src_w as f32).min(target_h as f32 / src_h as f32);
    let new_w = ((src_w as f32 * scale) as u32).clamp(1, target_w);
    let new_h = ((src_h as f32 * scale) as u32).clamp(1, target_h);
    debug!("letterboxing {src_w}x{src_h} to {new_w}x{new_h} on a {target_w}x{target_h} canvas");

    let scaled = image.resize_exact(new_w, new_h, FilterType::Lanczos3).to_rgba8();
    let mut canvas = RgbaImage::from_pixel(target_w, target_h, Rgba([0, 0, 0, 255]));
    let offset_x = (target_w - new_w) / 2;
    let offset_y = (target_h - new_h) / 2;
    imageops::overlay(&mut canvas, &scaled, offset_x as i64, offset_y as i64);
    canvas
}

/// Flattens any alpha channel over a black background.
fn flatten_over_black(image: &DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => {
            let rgba = other.to_rgba8();
            let mut rgb = RgbImage::new(rgba.width(), rgba.height());
            for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
                let [r, g, b, a] = src.0;
                let a = a as u16;
                dst.0 = [
                    ((r as u16 * a) / 255) as u8,
                    ((g as u16 * a) / 255) as u8,
                    ((b as u16 * a) / 255) as u8,
                ];
            }
            rgb
        }
    }
}
