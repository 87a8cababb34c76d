//! The two generation passes.
//!
//! Both run against an already opened page and write exactly one deck. Per
//! slide and per element problems are absorbed by the extractor and builder;
//! only scratch-space and save failures come back as errors.

use anyhow::{Context, Result};
use deck_core::ConvertConfig;
use deck_pptx::PresentationBuilder;
use deck_render::{PageSession, SlideExtractor};
use std::path::Path;
use tempfile::TempDir;

fn scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("html2pptx-")
        .tempdir()
        .context("Failed to create scratch directory")
}

/// One full-bleed picture per slide. Returns the number of slides written.
pub fn generate_screenshot_deck<S: PageSession>(session: &S, config: &ConvertConfig, output: &Path) -> Result<usize> {
    let scratch = scratch_dir()?;
    let extractor = SlideExtractor::new(session, config, scratch.path());
    let mut builder = PresentationBuilder::new(config);

    let count = extractor.slide_count();
    println!("Found {} slides.", count);

    for index in 0..count {
        log::debug!("Capturing slide {}/{}", index + 1, count);
        let capture = extractor.capture_slide(index);
        builder.add_screenshot_slide(capture.as_deref());
    }

    builder
        .save(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("Saved {}", output.display());
    Ok(builder.slide_count())
}

/// Shapes, pictures, and text boxes per slide. Returns the number of slides written.
pub fn generate_editable_deck<S: PageSession>(session: &S, config: &ConvertConfig, output: &Path) -> Result<usize> {
    let scratch = scratch_dir()?;
    let extractor = SlideExtractor::new(session, config, scratch.path());
    let mut builder = PresentationBuilder::new(config);

    let count = extractor.slide_count();
    println!("Found {} slides.", count);

    for index in 0..count {
        log::debug!("Extracting slide {}/{}", index + 1, count);
        let content = extractor.extract_slide(index);
        builder.add_editable_slide(&content);
    }

    builder
        .save(output)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    println!("Saved {}", output.display());
    Ok(builder.slide_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::{ImageRegion, Rect, ShapeRecord, TextRun};
    use deck_pptx::{DeckSummary, PptxReader, ShapeKind};
    use deck_render::testing::{FakePage, FakeSlide};

    fn slide() -> FakeSlide {
        FakeSlide::new(1200.0, 675.0)
    }

    fn read(path: &Path) -> DeckSummary {
        PptxReader::new().open(path).unwrap()
    }

    fn red_box() -> ShapeRecord {
        ShapeRecord {
            rect: Rect::new(0.0, 0.0, 1200.0, 100.0),
            background: "rgb(255, 0, 0)".to_string(),
            border_color: "rgb(0, 0, 0)".to_string(),
            border_width: 0.0,
            accent: false,
        }
    }

    fn list_item(content: &str) -> TextRun {
        TextRun {
            text: content.to_string(),
            tag_name: "LI".to_string(),
            rect: Rect::new(40.0, 200.0, 400.0, 24.0),
            font_size: "18px".to_string(),
            ..TextRun::default()
        }
    }

    #[test]
    fn test_screenshot_deck_has_one_picture_per_slide() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let page = FakePage::new(vec![slide(), slide(), slide()]);
        let out = dir.path().join("deck.pptx");

        assert_eq!(generate_screenshot_deck(&page, &config, &out).unwrap(), 3);

        let deck = read(&out);
        assert_eq!(deck.slides.len(), 3);
        for s in &deck.slides {
            assert_eq!(s.shapes.len(), 1);
            let picture = &s.shapes[0];
            assert_eq!(picture.kind, ShapeKind::Picture);
            assert_eq!((picture.x, picture.y), (0, 0));
            assert_eq!((picture.cx, picture.cy), (deck.slide_width, deck.slide_height));
        }
        assert_eq!(deck.slide_width, 1200 * 9525);
    }

    #[test]
    fn test_zero_slides_still_writes_both_decks() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let page = FakePage::new(Vec::new());
        let shots = dir.path().join("empty.pptx");
        let editable = dir.path().join("empty_editable.pptx");

        assert_eq!(generate_screenshot_deck(&page, &config, &shots).unwrap(), 0);
        assert_eq!(generate_editable_deck(&page, &config, &editable).unwrap(), 0);
        assert!(read(&shots).slides.is_empty());
        assert!(read(&editable).slides.is_empty());
    }

    #[test]
    fn test_red_background_is_one_filled_rectangle() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let page = FakePage::new(vec![slide().with_shape(red_box())]);
        let out = dir.path().join("deck_editable.pptx");

        generate_editable_deck(&page, &config, &out).unwrap();

        let deck = read(&out);
        assert_eq!(deck.slides[0].shapes.len(), 1);
        let rect = &deck.slides[0].shapes[0];
        assert_eq!(rect.kind, ShapeKind::Rectangle);
        assert_eq!(rect.fill.as_deref(), Some("FF0000"));
        assert_eq!(rect.outline, None);
    }

    #[test]
    fn test_list_item_text_gets_bullet() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let page = FakePage::new(vec![slide().with_text(list_item("Item"))]);
        let out = dir.path().join("deck_editable.pptx");

        generate_editable_deck(&page, &config, &out).unwrap();

        let deck = read(&out);
        let boxes = deck.slides[0].shapes_of(ShapeKind::TextBox);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].text, "■ Item");
    }

    #[test]
    fn test_failed_image_capture_keeps_other_layers() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let broken = ImageRegion {
            rect: Rect::new(600.0, 200.0, 300.0, 200.0),
            marker: "[data-deck-image=\"0-0\"]".to_string(),
        };
        let logo = ImageRegion {
            rect: Rect::new(1100.0, 20.0, 64.0, 64.0),
            marker: "[data-deck-image=\"0-1\"]".to_string(),
        };
        let page = FakePage::new(vec![slide()
            .with_shape(red_box())
            .with_image(broken.clone())
            .with_image(logo)
            .with_text(list_item("Item"))])
        .fail_capture(&broken.marker);
        let out = dir.path().join("deck_editable.pptx");

        generate_editable_deck(&page, &config, &out).unwrap();

        let deck = read(&out);
        let shapes = &deck.slides[0].shapes;
        let kinds: Vec<ShapeKind> = shapes.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ShapeKind::Rectangle, ShapeKind::Picture, ShapeKind::TextBox]);
        assert_eq!(shapes[1].x, 1100 * 9525);
    }

    #[test]
    fn test_unreadable_slide_still_counts() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let page = FakePage::new(vec![slide(), slide().with_shape(red_box())]).fail_slide(0);
        let shots = dir.path().join("deck.pptx");
        let editable = dir.path().join("deck_editable.pptx");

        assert_eq!(generate_screenshot_deck(&page, &config, &shots).unwrap(), 2);
        assert_eq!(generate_editable_deck(&page, &config, &editable).unwrap(), 2);

        let deck = read(&shots);
        assert!(deck.slides[0].shapes.is_empty());
        assert_eq!(deck.slides[1].shapes_of(ShapeKind::Picture).len(), 1);

        let deck = read(&editable);
        assert!(deck.slides[0].shapes.is_empty());
        assert_eq!(deck.slides[1].shapes.len(), 1);
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let page = FakePage::new(vec![slide()]);
        let out = dir.path().join("missing").join("deck.pptx");

        let err = generate_screenshot_deck(&page, &config, &out).unwrap_err();
        assert!(err.to_string().contains("Failed to save"));
    }
}
