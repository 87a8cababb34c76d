//! Conversion configuration.
//!
//! One [`ConvertConfig`] is built up front and shared by reference with the
//! renderer session, the slide extractor, the image optimizer, and the
//! presentation builder.

use crate::error::{Error, Result};
use crate::style::Rgb;
use std::str::FromStr;
use std::time::Duration;

/// EMUs per inch in OOXML.
pub const EMU_PER_INCH: f64 = 914_400.0;

/// Points per CSS pixel at 96 DPI.
pub const PT_PER_PX: f64 = 0.75;

/// Supported slide viewports, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewportPreset {
    /// 1200 x 675.
    #[default]
    Standard,
    /// 1280 x 720.
    Hd,
}

impl ViewportPreset {
    /// Viewport width in pixels.
    pub fn width(self) -> u32 {
        match self {
            Self::Standard => 1200,
            Self::Hd => 1280,
        }
    }

    /// Viewport height in pixels.
    pub fn height(self) -> u32 {
        match self {
            Self::Standard => 675,
            Self::Hd => 720,
        }
    }
}

impl FromStr for ViewportPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "1200x675" => Ok(Self::Standard),
            "hd" | "1280x720" => Ok(Self::Hd),
            other => Err(Error::ConfigError(format!(
                "unknown viewport '{}' (expected 1200x675 or 1280x720)",
                other
            ))),
        }
    }
}

/// Font stack keyword to presentation font name, checked in order.
const FONT_TABLE: &[(&str, &str)] = &[
    ("helvetica", "Helvetica"),
    ("arial", "Arial"),
    ("inter", "Inter"),
    ("roboto", "Roboto"),
    ("open sans", "Open Sans"),
    ("lato", "Lato"),
    ("montserrat", "Montserrat"),
    ("poppins", "Poppins"),
    ("source sans", "Source Sans Pro"),
    ("noto sans", "Noto Sans"),
    ("segoe ui", "Segoe UI"),
    ("calibri", "Calibri"),
    ("verdana", "Verdana"),
    ("tahoma", "Tahoma"),
    ("georgia", "Georgia"),
    ("times", "Times New Roman"),
    ("garamond", "Garamond"),
    ("courier", "Courier New"),
    ("consolas", "Consolas"),
    ("monospace", "Consolas"),
];

/// Selectors whose elements are captured as pictures, in capture order.
const IMAGE_SELECTORS: &[&str] = &[
    ".viz-box",
    ".dashboard-placeholder",
    ".chart",
    ".chart-container",
    ".image-placeholder",
    ".media-placeholder",
    ".figure",
    ".logo",
    ".icon",
    ".corner-icon",
    ".bi",
    ".fa",
    ".material-icons",
    "img",
    "svg",
    "canvas",
    "video",
];

/// Image selectors for elements that never hold text children.
const CHILDLESS_IMAGE_SELECTORS: &[&str] = &["img", "canvas", "video"];

/// Text-bearing selectors scanned before the catch-all pass.
const TEXT_SELECTORS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "p",
    "li",
    "blockquote",
    "figcaption",
    "td",
    "th",
    "label",
    "a",
    ".title",
    ".subtitle",
    ".label",
    ".caption",
    ".stat",
    ".metric",
    "span",
];

/// Immutable settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub viewport: ViewportPreset,

    /// CSS pixels per inch.
    pub pixels_per_inch: f64,

    /// Largest raster dimensions kept after optimization.
    pub max_image_width: u32,
    pub max_image_height: u32,

    /// Re-encode captured rasters before embedding.
    pub optimize_images: bool,

    /// Budget for the post-navigation settle wait.
    pub settle_timeout: Duration,

    /// Per-call timeout for other browser operations.
    pub browser_timeout: Duration,

    /// Class marking the slide elements.
    pub slide_selector: String,

    /// Class whose shapes always get `accent_fill`.
    pub accent_class: String,

    /// Class marking structural section boxes.
    pub section_class: String,

    pub accent_fill: Rgb,

    /// Glyph prefixed to list-item text.
    pub bullet: char,

    /// Floor applied to text box size, in pixels.
    pub min_text_box_width: f64,
    pub min_text_box_height: f64,

    /// Text box inset on every side, in pixels.
    pub text_box_inset: f64,

    /// Attach anchor targets to text runs.
    pub hyperlinks: bool,

    pub font_table: Vec<(String, String)>,
    pub fallback_font: String,

    pub image_selectors: Vec<String>,
    pub text_exclusion_selectors: Vec<String>,
    pub text_selectors: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportPreset::default(),
            pixels_per_inch: 96.0,
            max_image_width: 1920,
            max_image_height: 1080,
            optimize_images: true,
            settle_timeout: Duration::from_secs(5),
            browser_timeout: Duration::from_secs(30),
            slide_selector: ".slide".to_string(),
            accent_class: "accent-bar".to_string(),
            section_class: "slide-section".to_string(),
            accent_fill: Rgb::new(243, 244, 246),
            bullet: '■',
            min_text_box_width: 20.0,
            min_text_box_height: 12.0,
            text_box_inset: 2.0,
            hyperlinks: true,
            font_table: FONT_TABLE
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fallback_font: "Segoe UI".to_string(),
            image_selectors: to_strings(IMAGE_SELECTORS),
            text_exclusion_selectors: text_exclusions(IMAGE_SELECTORS),
            text_selectors: to_strings(TEXT_SELECTORS),
        }
    }
}

impl ConvertConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different viewport preset.
    pub fn with_viewport(mut self, viewport: ViewportPreset) -> Self {
        self.viewport = viewport;
        self
    }

    /// Slide width in pixels.
    pub fn slide_width_px(&self) -> u32 {
        self.viewport.width()
    }

    /// Slide height in pixels.
    pub fn slide_height_px(&self) -> u32 {
        self.viewport.height()
    }

    /// EMUs per CSS pixel.
    pub fn emu_per_px(&self) -> f64 {
        EMU_PER_INCH / self.pixels_per_inch
    }

    /// Convert a pixel length to EMUs.
    pub fn px_to_emu(&self, px: f64) -> i64 {
        (px * self.emu_per_px()).round() as i64
    }

    /// Slide width in EMUs.
    pub fn slide_width_emu(&self) -> i64 {
        self.px_to_emu(f64::from(self.slide_width_px()))
    }

    /// Slide height in EMUs.
    pub fn slide_height_emu(&self) -> i64 {
        self.px_to_emu(f64::from(self.slide_height_px()))
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Text under a captured picture is already in the raster, so every image
/// selector that can contain text is an exclusion.
fn text_exclusions(image_selectors: &[&str]) -> Vec<String> {
    image_selectors
        .iter()
        .filter(|s| !CHILDLESS_IMAGE_SELECTORS.contains(*s))
        .map(|s| s.to_string())
        .collect()
}
