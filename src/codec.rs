use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Wire pixel encodings understood by the panel firmware.
///
/// Selected by sink capability; every encoder is a pure per-pixel transform
/// producing the full frame in one buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireFormat {
    #[default]
    Rgb565Be,
    Rgb565Le,
    Bgr,
    Bgra,
    CompressedBgra,
}

impl WireFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            WireFormat::Rgb565Be | WireFormat::Rgb565Le => 2,
            WireFormat::Bgr | WireFormat::CompressedBgra => 3,
            WireFormat::Bgra => 4,
        }
    }
}

/// Encodes a bitmap into the requested wire format.
///
/// Source color modes that don't match the encoding are converted first,
/// never rejected.
pub fn encode(image: &DynamicImage, format: WireFormat) -> Vec<u8> {
    match format {
        WireFormat::Rgb565Be => rgb565(image, true),
        WireFormat::Rgb565Le => rgb565(image, false),
        WireFormat::Bgr => bgr(image),
        WireFormat::Bgra => bgra(image),
        WireFormat::CompressedBgra => compressed_bgra(image),
    }
}

/// 5/6/5 quantization is `channel * max / 255` with integer truncation,
/// packed as `R<<11 | G<<5 | B`.
fn rgb565(image: &DynamicImage, big_endian: bool) -> Vec<u8> {
    let rgb = image.to_rgb8();
    let mut out = Vec::with_capacity(rgb.width() as usize * rgb.height() as usize * 2);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        let r5 = (r as u16 * 31) / 255;
        let g6 = (g as u16 * 63) / 255;
        let b5 = (b as u16 * 31) / 255;
        let value = (r5 << 11) | (g6 << 5) | b5;
        if big_endian {
            out.extend_from_slice(&value.to_be_bytes());
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
    out
}

fn bgr(image: &DynamicImage) -> Vec<u8> {
    let rgb = image.to_rgb8();
    let mut out = Vec::with_capacity(rgb.width() as usize * rgb.height() as usize * 3);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        out.extend_from_slice(&[b, g, r]);
    }
    out
}

fn bgra(image: &DynamicImage) -> Vec<u8> {
    let rgba = image.to_rgba8();
    let mut out = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 4);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        out.extend_from_slice(&[b, g, r, a]);
    }
    out
}

/// Lossy 3-byte packing that folds the 4 high alpha bits into the low bits
/// of B and G. The `a4 & 2` mask is what the receiving firmware expects;
/// the output must stay bit-exact.
fn compressed_bgra(image: &DynamicImage) -> Vec<u8> {
    let rgba = image.to_rgba8();
    let mut out = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let a4 = a >> 4;
        out.push((b & 0xFC) | (a4 >> 2));
        out.push((g & 0xFC) | (a4 & 2));
        out.push(r);
    }
    out
}
