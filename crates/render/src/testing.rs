//! In-memory [`PageSession`] for tests that should not need a browser.

use crate::scripts;
use crate::session::PageSession;
use deck_core::{Error, ImageRegion, Rect, Result, ShapeRecord, TextRun};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Cursor;

/// Canned extraction results for one slide.
#[derive(Debug, Clone, Default)]
pub struct FakeSlide {
    pub bounds: Option<Rect>,
    pub shapes: Vec<ShapeRecord>,
    pub images: Vec<ImageRegion>,
    pub priority_texts: Vec<TextRun>,
    pub catch_all_texts: Vec<TextRun>,
}

impl FakeSlide {
    /// An empty slide at the given viewport size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            bounds: Some(Rect::new(0.0, 0.0, width, height)),
            ..Self::default()
        }
    }

    pub fn with_shape(mut self, shape: ShapeRecord) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn with_image(mut self, region: ImageRegion) -> Self {
        self.images.push(region);
        self
    }

    pub fn with_text(mut self, run: TextRun) -> Self {
        self.priority_texts.push(run);
        self
    }

    pub fn with_catch_all_text(mut self, run: TextRun) -> Self {
        self.catch_all_texts.push(run);
        self
    }
}

/// A page that answers the extraction scripts from [`FakeSlide`]s and
/// renders solid-color PNGs for captures.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    slides: Vec<FakeSlide>,
    failing_selectors: HashSet<String>,
    failing_slides: HashSet<usize>,
}

impl FakePage {
    pub fn new(slides: Vec<FakeSlide>) -> Self {
        Self {
            slides,
            ..Self::default()
        }
    }

    /// Make captures of the element matching `selector` fail.
    pub fn fail_capture(mut self, selector: &str) -> Self {
        self.failing_selectors.insert(selector.to_string());
        self
    }

    /// Make every call against slide `index` fail.
    pub fn fail_slide(mut self, index: usize) -> Self {
        self.failing_slides.insert(index);
        self
    }

    fn slide(&self, index: usize) -> Result<&FakeSlide> {
        if self.failing_slides.contains(&index) {
            return Err(Error::BrowserError(format!("Slide {} detached", index + 1)));
        }
        self.slides
            .get(index)
            .ok_or_else(|| Error::BrowserError(format!("Slide {} not found", index + 1)))
    }

    fn region(&self, selector: &str) -> Option<&ImageRegion> {
        self.slides
            .iter()
            .flat_map(|slide| slide.images.iter())
            .find(|region| region.marker == selector)
    }
}

impl PageSession for FakePage {
    fn slide_count(&self) -> Result<usize> {
        Ok(self.slides.len())
    }

    fn slide_bounds(&self, index: usize) -> Result<Option<Rect>> {
        Ok(self.slide(index)?.bounds)
    }

    fn capture_slide(&self, index: usize) -> Result<Vec<u8>> {
        let rect = self
            .slide(index)?
            .bounds
            .ok_or_else(|| Error::BrowserError("Slide has no layout box".to_string()))?;
        solid_png(rect.w as u32, rect.h as u32, [30, 60, 90])
    }

    fn evaluate_on_slide(&self, index: usize, function: &str, _args: Vec<Value>) -> Result<String> {
        let slide = self.slide(index)?;
        let value = if function == scripts::ELEMENT_BOUNDS {
            json!(slide.bounds)
        } else if function == scripts::SLIDE_SHAPES {
            json!(slide.shapes)
        } else if function == scripts::SLIDE_IMAGES {
            json!(slide.images)
        } else if function == scripts::SLIDE_TEXT {
            json!({ "priority": slide.priority_texts, "catchAll": slide.catch_all_texts })
        } else {
            return Err(Error::ScriptError("Unknown script".to_string()));
        };
        Ok(value.to_string())
    }

    fn capture_element(&self, selector: &str) -> Result<Vec<u8>> {
        if self.failing_selectors.contains(selector) {
            return Err(Error::BrowserError(format!("Failed to capture {}", selector)));
        }
        let region = self
            .region(selector)
            .ok_or_else(|| Error::BrowserError(format!("No element matches {}", selector)))?;
        solid_png(region.rect.w as u32, region.rect.h as u32, [200, 40, 40])
    }
}

/// Encode a solid-color PNG.
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Result<Vec<u8>> {
    let img = RgbImage::from_pixel(width.max(1), height.max(1), Rgb(color));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::ImageError(format!("Failed to encode fixture: {}", e)))?;
    Ok(buf.into_inner())
}
