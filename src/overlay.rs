use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle, RoundedRectangle};
use image::imageops;
use image::{DynamicImage, RgbImage, Rgba, RgbaImage};
use u8g2_fonts::types::{FontColor, VerticalPosition};
use u8g2_fonts::{FontRenderer, fonts};

use crate::constants::{
    FONT_SIZE_BONUS, FONT_SIZE_MULTIPLIER, MARGIN_MULTIPLIER, MIN_FONT_SIZE, MIN_OVERLAY_MARGIN,
    OVERLAY_BACKGROUND_ALPHA, OVERLAY_NUDGE, OVERLAY_PADDING_MIN, SHADOW_OFFSET_MULTIPLIER,
};
use crate::panel::{Orientation, PanelGeometry};

// Bold faces from smallest to largest; the computed size picks the largest
// face that still fits, so a font lookup can never fail at runtime.
const FONT_SMALL: FontRenderer = FontRenderer::new::<fonts::u8g2_font_helvB12_tf>();
const FONT_MEDIUM: FontRenderer = FontRenderer::new::<fonts::u8g2_font_helvB14_tf>();
const FONT_LARGE: FontRenderer = FontRenderer::new::<fonts::u8g2_font_helvB18_tf>();
const FONT_XLARGE: FontRenderer = FontRenderer::new::<fonts::u8g2_font_helvB24_tf>();

fn font_for(size: u32) -> &'static FontRenderer {
    if size >= 24 {
        &FONT_XLARGE
    } else if size >= 18 {
        &FONT_LARGE
    } else if size >= 14 {
        &FONT_MEDIUM
    } else {
        &FONT_SMALL
    }
}

/// Layout values derived from the frame size.
struct OverlayMetrics {
    font: &'static FontRenderer,
    margin: i32,
    spacing: i32,
    padding: i32,
    corner_radius: u32,
    shadow_offset: i32,
}

impl OverlayMetrics {
    fn for_frame(width: u32, height: u32) -> Self {
        let min_side = width.min(height);
        let font_size =
            MIN_FONT_SIZE.max((min_side as f32 * FONT_SIZE_MULTIPLIER) as u32) + FONT_SIZE_BONUS;
        let margin = MIN_OVERLAY_MARGIN.max((min_side as f32 * MARGIN_MULTIPLIER) as i32);
        let padding = OVERLAY_PADDING_MIN.max(font_size as i32 / 3) + 6;
        Self {
            font: font_for(font_size),
            margin,
            spacing: margin / 2,
            padding,
            corner_radius: padding.min(12) as u32,
            shadow_offset: 1.max((font_size as f32 * SHADOW_OFFSET_MULTIPLIER) as i32),
        }
    }
}

/// Adapter that lets embedded-graphics primitives and glyphs paint onto an
/// RGBA layer with a chosen alpha.
struct OverlayCanvas<'a> {
    image: &'a mut RgbaImage,
    alpha: u8,
}

impl OriginDimensions for OverlayCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl DrawTarget for OverlayCanvas<'_> {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let width = self.image.width() as i32;
        let height = self.image.height() as i32;
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 && point.x < width && point.y < height {
                self.image.put_pixel(
                    point.x as u32,
                    point.y as u32,
                    Rgba([color.r(), color.g(), color.b(), self.alpha]),
                );
            }
        }
        Ok(())
    }
}

fn measure(font: &FontRenderer, text: &str) -> (i32, i32) {
    match font.get_rendered_dimensions(text, Point::zero(), VerticalPosition::Top) {
        Ok(dimensions) => match dimensions.bounding_box {
            Some(bounding_box) => (bounding_box.size.width as i32, bounding_box.size.height as i32),
            None => (0, 0),
        },
        Err(_) => (0, 0),
    }
}

fn fill_rounded_rect(layer: &mut RgbaImage, origin: Point, size: Size, radius: u32, alpha: u8) {
    let mut canvas = OverlayCanvas { image: layer, alpha };
    let _ = RoundedRectangle::with_equal_corners(
        Rectangle::new(origin, size),
        Size::new(radius, radius),
    )
    .into_styled(PrimitiveStyle::with_fill(Rgb888::BLACK))
    .draw(&mut canvas);
}

/// Draws one text line with its drop shadow, top-left anchored at `position`.
fn draw_line(layer: &mut RgbaImage, metrics: &OverlayMetrics, text: &str, position: Point) {
    let mut canvas = OverlayCanvas { image: layer, alpha: OVERLAY_BACKGROUND_ALPHA };
    let shadow = Point::new(metrics.shadow_offset, metrics.shadow_offset);
    let _ = metrics.font.render(
        text,
        position + shadow,
        VerticalPosition::Top,
        FontColor::Transparent(Rgb888::BLACK),
        &mut canvas,
    );
    canvas.alpha = 255;
    let _ = metrics.font.render(
        text,
        position,
        VerticalPosition::Top,
        FontColor::Transparent(Rgb888::WHITE),
        &mut canvas,
    );
}

/// Composites the text label onto the frame.
///
/// Lines are ordered bottom-most first. With no lines the frame comes back
/// untouched; nothing in here can fail.
pub fn render(frame: RgbImage, lines: &[String], geometry: &PanelGeometry) -> RgbImage {
    if lines.is_empty() {
        return frame;
    }

    let (frame_w, frame_h) = frame.dimensions();
    let metrics = OverlayMetrics::for_frame(frame_w, frame_h);

    let measured: Vec<(&str, i32, i32)> = lines
        .iter()
        .map(|line| {
            let (w, h) = measure(metrics.font, line);
            (line.as_str(), w, h)
        })
        .collect();
    let max_w = measured.iter().map(|&(_, w, _)| w).max().unwrap_or(0);
    let total_h: i32 = measured.iter().map(|&(_, _, h)| h).sum::<i32>()
        + metrics.spacing * (measured.len() as i32 - 1);

    let mut layer = RgbaImage::new(frame_w, frame_h);

    match geometry.orientation {
        Orientation::Portrait => {
            // Label hugs the bottom-right corner, nudged up off the edge.
            let rect_right = frame_w as i32 - metrics.margin + metrics.padding;
            let rect_left = frame_w as i32 - metrics.margin - max_w - metrics.padding;
            let rect_bottom = frame_h as i32 - metrics.margin + metrics.padding - OVERLAY_NUDGE;
            let rect_top = rect_bottom - total_h - metrics.padding;
            fill_rounded_rect(
                &mut layer,
                Point::new(rect_left, rect_top),
                Size::new((rect_right - rect_left) as u32, (rect_bottom - rect_top) as u32),
                metrics.corner_radius,
                OVERLAY_BACKGROUND_ALPHA,
            );

            let mut y = rect_bottom - metrics.padding;
            for &(text, text_w, text_h) in &measured {
                let x = frame_w as i32 - metrics.margin - text_w;
                draw_line(&mut layer, &metrics, text, Point::new(x, y - text_h));
                y -= text_h + metrics.spacing;
            }
        }
        Orientation::Landscape => {
            // Build a standalone box, rotate it a quarter turn, and anchor it
            // to the bottom-left corner so the text reads horizontally once
            // the panel itself is mounted sideways.
            let box_w = (max_w + metrics.padding * 2).max(1) as u32;
            let box_h = (total_h + metrics.padding * 2).max(1) as u32;
            let mut label = RgbaImage::new(box_w, box_h);
            fill_rounded_rect(
                &mut label,
                Point::zero(),
                Size::new(box_w, box_h),
                metrics.corner_radius,
                OVERLAY_BACKGROUND_ALPHA,
            );

            let mut y = box_h as i32 - metrics.padding;
            for &(text, text_w, text_h) in &measured {
                let x = (box_w as i32 - text_w) / 2;
                draw_line(&mut label, &metrics, text, Point::new(x, y - text_h));
                y -= text_h + metrics.spacing;
            }

            let rotated = imageops::rotate90(&label);
            let paste_y = (frame_h as i32 - rotated.height() as i32 - OVERLAY_NUDGE).max(0);
            imageops::overlay(&mut layer, &rotated, 0, paste_y as i64);
        }
    }

    let mut base = DynamicImage::ImageRgb8(frame).to_rgba8();
    imageops::overlay(&mut base, &layer, 0, 0);
    DynamicImage::ImageRgba8(base).to_rgb8()
}
