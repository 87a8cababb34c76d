//! Records produced by slide extraction and consumed by the presentation builder.
//!
//! All coordinates are CSS pixels relative to the top-left corner of the
//! slide that produced them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A bounding box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    #[serde(alias = "width")]
    pub w: f64,
    #[serde(alias = "height")]
    pub h: f64,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Translate this rectangle so that `origin` becomes (0, 0).
    pub fn relative_to(&self, origin: &Rect) -> Self {
        Self {
            x: self.x - origin.x,
            y: self.y - origin.y,
            w: self.w,
            h: self.h,
        }
    }

    /// Whether the point lies inside this rectangle (edges included).
    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }
}

/// A background or border-bearing element, emitted as one rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRecord {
    #[serde(flatten)]
    pub rect: Rect,

    /// Computed `background-color`.
    #[serde(default)]
    pub background: String,

    /// Computed left border color.
    #[serde(default)]
    pub border_color: String,

    /// Computed left border width in pixels.
    #[serde(default)]
    pub border_width: f64,

    /// Element carries the accent marker class.
    #[serde(default)]
    pub accent: bool,
}

/// An element whose pixels are captured and embedded as a picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegion {
    #[serde(flatten)]
    pub rect: Rect,

    /// Selector that resolves to exactly this element inside its slide.
    pub marker: String,
}

/// An element owning direct text, emitted as one text box.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextRun {
    /// Visible text, nested formatting flattened.
    pub text: String,

    /// Upper-case tag name, e.g. `LI`.
    pub tag_name: String,

    #[serde(flatten)]
    pub rect: Rect,

    pub color: String,
    pub font_size: String,
    pub font_family: String,
    pub font_weight: String,
    pub font_style: String,
    pub text_align: String,
    pub text_transform: String,
    pub text_decoration: String,

    /// Target of the enclosing anchor, if any.
    pub href: Option<String>,
}

impl TextRun {
    /// Whether this run came from a list item.
    pub fn is_list_item(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("li")
    }
}

/// An image region whose capture has been written to disk.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub region: ImageRegion,

    /// Temporary raster file; deleted once embedded.
    pub path: PathBuf,
}

/// Everything extracted from one slide in editable mode.
///
/// Layers are consumed back to front: shapes, then images, then text.
#[derive(Debug, Clone, Default)]
pub struct SlideContent {
    /// 0-based slide index in document order.
    pub index: usize,
    pub shapes: Vec<ShapeRecord>,
    pub images: Vec<CapturedImage>,
    pub texts: Vec<TextRun>,
}

impl SlideContent {
    /// Create an empty content batch for the given slide.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Whether nothing was extracted.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty() && self.images.is_empty() && self.texts.is_empty()
    }
}
