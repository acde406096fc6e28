pub const PANEL_WIDTH: u32 = 320;             // Portrait-native panel width (pixels)
pub const PANEL_HEIGHT: u32 = 480;            // Portrait-native panel height (pixels)

pub const MIN_INTERVAL_SECS: u64 = 1;         // Slideshow never ticks faster than this
pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BRIGHTNESS: u8 = 80;
pub const STOP_TIMEOUT_MS: u64 = 1000;        // Bounded join when stopping the worker

pub const MIN_FONT_SIZE: u32 = 16;
pub const FONT_SIZE_MULTIPLIER: f32 = 0.04;   // Fraction of the short frame side
pub const FONT_SIZE_BONUS: u32 = 11;

pub const MIN_OVERLAY_MARGIN: i32 = 8;
pub const MARGIN_MULTIPLIER: f32 = 0.02;
pub const OVERLAY_PADDING_MIN: i32 = 6;
pub const OVERLAY_NUDGE: i32 = 1;             // Keeps the label off the very edge
pub const SHADOW_OFFSET_MULTIPLIER: f32 = 0.08;
pub const OVERLAY_BACKGROUND_ALPHA: u8 = 200;

pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff"];
