//! Slide extraction over a [`PageSession`].
//!
//! Screenshot mode captures each slide whole. Editable mode runs three
//! passes per slide (shapes, images, text), each yielding one batch in
//! document order. Every failure inside a pass is logged and degrades to an
//! empty or shorter batch; nothing propagates to the caller.

use crate::optimize::ImageOptimizer;
use crate::scripts;
use crate::session::PageSession;
use deck_core::{CapturedImage, ConvertConfig, Error, ImageRegion, Result, ShapeRecord, SlideContent, TextRun};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Text runs as returned by the in-page scan.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TextBatches {
    priority: Vec<TextRun>,
    catch_all: Vec<TextRun>,
}

/// Pulls slide content out of a loaded page.
///
/// Captured rasters are written to `scratch`, named by slide and element
/// index, and optimized in place when the configuration asks for it.
pub struct SlideExtractor<'a, S: PageSession> {
    session: &'a S,
    config: &'a ConvertConfig,
    optimizer: ImageOptimizer,
    scratch: &'a Path,
}

impl<'a, S: PageSession> SlideExtractor<'a, S> {
    pub fn new(session: &'a S, config: &'a ConvertConfig, scratch: &'a Path) -> Self {
        Self {
            session,
            config,
            optimizer: ImageOptimizer::from_config(config),
            scratch,
        }
    }

    /// Number of slide markers; 0 when the page cannot be queried.
    pub fn slide_count(&self) -> usize {
        self.session.slide_count().unwrap_or_else(|e| {
            log::warn!("Could not count slides: {}", e);
            0
        })
    }

    /// Capture one slide whole, returning the raster file.
    pub fn capture_slide(&self, index: usize) -> Option<PathBuf> {
        let bytes = match self.session.capture_slide(index) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Could not capture slide {}: {}", index + 1, e);
                return None;
            }
        };

        let path = self.scratch.join(format!("slide_{}.png", index));
        self.store(&path, &bytes).then_some(path)
    }

    /// Run the three editable-mode passes over one slide.
    pub fn extract_slide(&self, index: usize) -> SlideContent {
        let mut content = SlideContent::new(index);

        match self.session.slide_bounds(index) {
            Ok(Some(bounds)) => log::debug!("Slide {} at {:?}", index + 1, bounds),
            Ok(None) => {
                log::debug!("Slide {} has no layout box", index + 1);
                return content;
            }
            Err(e) => {
                log::warn!("Could not locate slide {}: {}", index + 1, e);
                return content;
            }
        }

        content.shapes = self.extract_shapes(index);
        content.images = self.extract_images(index);
        content.texts = self.extract_texts(index);
        content
    }

    pub fn extract_shapes(&self, index: usize) -> Vec<ShapeRecord> {
        let args = vec![
            json!(self.config.slide_selector),
            json!(self.config.accent_class),
            json!(self.config.section_class),
        ];
        self.evaluate(index, scripts::SLIDE_SHAPES, args).unwrap_or_else(|e| {
            log::warn!("Shape pass failed on slide {}: {}", index + 1, e);
            Vec::new()
        })
    }

    /// Capture every image region; regions whose capture fails are omitted.
    pub fn extract_images(&self, index: usize) -> Vec<CapturedImage> {
        let args = vec![json!(self.config.image_selectors), json!(index)];
        let regions: Vec<ImageRegion> = match self.evaluate(index, scripts::SLIDE_IMAGES, args) {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Image pass failed on slide {}: {}", index + 1, e);
                return Vec::new();
            }
        };

        let mut captured = Vec::with_capacity(regions.len());
        for (k, region) in regions.into_iter().enumerate() {
            let bytes = match self.session.capture_element(&region.marker) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Skipping image {} on slide {}: {}", k + 1, index + 1, e);
                    continue;
                }
            };

            let path = self.scratch.join(format!("img_{}_{}.png", index, k));
            if self.store(&path, &bytes) {
                captured.push(CapturedImage { region, path });
            }
        }
        captured
    }

    /// Prioritized text runs first, then catch-all runs that do not land on
    /// an already recorded box.
    pub fn extract_texts(&self, index: usize) -> Vec<TextRun> {
        let args = vec![
            json!(self.config.text_selectors),
            json!(self.config.text_exclusion_selectors),
        ];
        match self.evaluate::<TextBatches>(index, scripts::SLIDE_TEXT, args) {
            Ok(batches) => dedupe_catch_all(laid_out(batches.priority), laid_out(batches.catch_all)),
            Err(e) => {
                log::warn!("Text pass failed on slide {}: {}", index + 1, e);
                Vec::new()
            }
        }
    }

    fn evaluate<T: DeserializeOwned>(&self, index: usize, function: &str, args: Vec<Value>) -> Result<T> {
        let json = self.session.evaluate_on_slide(index, function, args)?;
        serde_json::from_str(&json).map_err(|e| Error::ScriptError(format!("Failed to decode script result: {}", e)))
    }

    /// Write a capture to disk and optimize it. Returns whether the file exists.
    fn store(&self, path: &Path, bytes: &[u8]) -> bool {
        if let Err(e) = fs::write(path, bytes) {
            log::warn!("Could not write {}: {}", path.display(), e);
            return false;
        }
        if self.config.optimize_images {
            self.optimizer.optimize(path);
        }
        true
    }
}

/// Drop runs without a layout box, such as text under a hidden ancestor.
fn laid_out(runs: Vec<TextRun>) -> Vec<TextRun> {
    runs.into_iter()
        .filter(|run| run.rect.w > 0.0 && run.rect.h > 0.0)
        .collect()
}

/// Merge catch-all runs into the recorded ones.
///
/// A candidate is dropped when its center falls inside a box that is already
/// recorded. This approximates "same element already captured" and can miss
/// duplicates or drop text that merely overlaps.
pub fn dedupe_catch_all(mut recorded: Vec<TextRun>, candidates: Vec<TextRun>) -> Vec<TextRun> {
    for candidate in candidates {
        let cx = candidate.rect.x + candidate.rect.w / 2.0;
        let cy = candidate.rect.y + candidate.rect.h / 2.0;
        if recorded.iter().any(|run| run.rect.contains_point(cx, cy)) {
            log::debug!("Dropping overlapping text {:?}", candidate.text);
            continue;
        }
        recorded.push(candidate);
    }
    recorded
}
