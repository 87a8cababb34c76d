//! Core records, conversion configuration, and CSS style translation
//! for HTML-to-PPTX conversion.

pub mod config;
pub mod error;
pub mod style;
pub mod types;

pub use config::{ConvertConfig, ViewportPreset};
pub use error::{Error, Result};
pub use style::{Alignment, Rgb};
pub use types::{CapturedImage, ImageRegion, Rect, ShapeRecord, SlideContent, TextRun};
