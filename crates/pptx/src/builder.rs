//! Populates a presentation from extracted slide records.
//!
//! The builder is the only component that mutates the [`Presentation`]. Every
//! per-element failure is logged and skipped; only [`PresentationBuilder::save`]
//! reports errors to the caller.

use crate::writer::{Frame, ImageData, Outline, Presentation, RunStyle, Slide, TextBox};
use deck_core::style::{self, Rgb};
use deck_core::{ConvertConfig, Rect, Result, ShapeRecord, SlideContent, TextRun};
use std::fs;
use std::path::Path;

/// Builds one output deck, slide by slide.
pub struct PresentationBuilder<'a> {
    config: &'a ConvertConfig,
    presentation: Presentation,
}

impl<'a> PresentationBuilder<'a> {
    /// Start an empty deck sized to the configured viewport.
    pub fn new(config: &'a ConvertConfig) -> Self {
        Self {
            config,
            presentation: Presentation::new(config.slide_width_emu(), config.slide_height_emu()),
        }
    }

    pub fn slide_count(&self) -> usize {
        self.presentation.slide_count()
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Append a blank slide.
    pub fn add_blank_slide(&mut self) {
        self.presentation.add_slide();
    }

    /// Append a slide holding one full-bleed picture.
    ///
    /// `None`, or a capture that cannot be read, still appends a blank slide
    /// so the deck keeps one slide per source slide.
    pub fn add_screenshot_slide(&mut self, capture: Option<&Path>) {
        let frame = Frame::new(0, 0, self.presentation.slide_width(), self.presentation.slide_height());
        let slide = self.presentation.add_slide();
        if let Some(path) = capture {
            embed_picture(slide, frame, path);
        }
    }

    /// Append a slide rebuilt from editable-mode records.
    ///
    /// Layers are drawn back to front: shapes, then pictures, then text.
    pub fn add_editable_slide(&mut self, content: &SlideContent) {
        let config = self.config;
        let slide = self.presentation.add_slide();

        for shape in &content.shapes {
            add_shape(slide, config, shape);
        }
        for image in &content.images {
            embed_picture(slide, frame_for(config, &image.region.rect), &image.path);
        }
        for run in &content.texts {
            add_text(slide, config, run);
        }

        log::debug!(
            "Slide {}: {} shapes, {} images, {} text runs",
            content.index + 1,
            content.shapes.len(),
            content.images.len(),
            content.texts.len()
        );
    }

    /// Write the deck. This is the only point where anything reaches disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.presentation.save(path)
    }

    /// Consume the builder, returning the document.
    pub fn into_presentation(self) -> Presentation {
        self.presentation
    }
}

fn frame_for(config: &ConvertConfig, rect: &Rect) -> Frame {
    Frame::new(
        config.px_to_emu(rect.x),
        config.px_to_emu(rect.y),
        config.px_to_emu(rect.w),
        config.px_to_emu(rect.h),
    )
}

fn add_shape(slide: &mut Slide, config: &ConvertConfig, shape: &ShapeRecord) {
    let fill = resolve_fill(config, shape);
    let outline = if shape.border_width > 0.0 {
        style::color_from_css(&shape.border_color).map(|color| Outline {
            color,
            width: config.px_to_emu(shape.border_width),
        })
    } else {
        None
    };

    slide.add_rectangle(frame_for(config, &shape.rect), fill, outline);
}

/// Embed a captured raster, then remove the temporary file.
fn embed_picture(slide: &mut Slide, frame: Frame, path: &Path) {
    match fs::read(path).map_err(deck_core::Error::from).and_then(ImageData::from_bytes) {
        Ok(image) => slide.add_picture(frame, image),
        Err(e) => log::warn!("Skipping image {}: {}", path.display(), e),
    }

    if let Err(e) = fs::remove_file(path) {
        log::debug!("Could not remove {}: {}", path.display(), e);
    }
}

fn add_text(slide: &mut Slide, config: &ConvertConfig, run: &TextRun) {
    let content = run.text.trim();
    if content.is_empty() {
        return;
    }

    let mut text = content.to_string();
    if run.is_list_item() && !text.starts_with(config.bullet) {
        text = format!("{} {}", config.bullet, text);
    }
    if style::is_uppercase(&run.text_transform) {
        text = text.to_uppercase();
    }

    let rect = Rect {
        w: run.rect.w.max(config.min_text_box_width),
        h: run.rect.h.max(config.min_text_box_height),
        ..run.rect
    };

    let mut text_box = TextBox::new(frame_for(config, &rect), text);
    text_box.inset = config.px_to_emu(config.text_box_inset);
    text_box.alignment = style::alignment_from_css(&run.text_align);
    text_box.style = run_style(config, run);

    let text_box = slide.add_text_box(text_box);
    if config.hyperlinks {
        if let Some(href) = run.href.as_deref().filter(|h| !h.is_empty()) {
            if let Err(e) = text_box.set_hyperlink(href) {
                log::debug!("Ignoring hyperlink: {}", e);
            }
        }
    }
}

fn run_style(config: &ConvertConfig, run: &TextRun) -> RunStyle {
    RunStyle {
        color: style::color_from_css(&run.color),
        size_pt: style::font_size_pt(&run.font_size),
        font: Some(
            style::font_name_from_css(&run.font_family, &config.font_table, &config.fallback_font)
                .to_string(),
        ),
        bold: style::is_bold(&run.font_weight),
        italic: style::is_italic(&run.font_style),
        underline: style::is_underline(&run.text_decoration),
        strike: style::is_strike(&run.text_decoration),
    }
}

/// Accent shapes ignore their computed background.
fn resolve_fill(config: &ConvertConfig, shape: &ShapeRecord) -> Option<Rgb> {
    if shape.accent {
        Some(config.accent_fill)
    } else {
        style::color_from_css(&shape.background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PptxReader, ShapeKind};
    use deck_core::{CapturedImage, ImageRegion};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn shape(background: &str) -> ShapeRecord {
        ShapeRecord {
            rect: Rect::new(10.0, 20.0, 100.0, 50.0),
            background: background.to_string(),
            border_color: "rgb(0, 0, 0)".to_string(),
            border_width: 0.0,
            accent: false,
        }
    }

    fn text(tag: &str, content: &str) -> TextRun {
        TextRun {
            text: content.to_string(),
            tag_name: tag.to_string(),
            rect: Rect::new(5.0, 5.0, 200.0, 30.0),
            color: "rgb(17, 24, 39)".to_string(),
            font_size: "24px".to_string(),
            font_family: "Arial, sans-serif".to_string(),
            font_weight: "700".to_string(),
            text_align: "center".to_string(),
            text_transform: "none".to_string(),
            text_decoration: "none solid rgb(17, 24, 39)".to_string(),
            ..TextRun::default()
        }
    }

    fn write_png(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, PNG_MAGIC).unwrap();
        path
    }

    fn round_trip(builder: &PresentationBuilder, dir: &TempDir) -> crate::parser::DeckSummary {
        let out = dir.path().join("out.pptx");
        builder.save(&out).unwrap();
        PptxReader::new().open(&out).unwrap()
    }

    #[test]
    fn test_red_background_becomes_filled_rectangle() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let mut content = SlideContent::new(0);
        content.shapes.push(shape("rgb(255, 0, 0)"));
        builder.add_editable_slide(&content);

        let deck = round_trip(&builder, &dir);
        assert_eq!(deck.slides.len(), 1);
        let rects = deck.slides[0].shapes_of(ShapeKind::Rectangle);
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].fill.as_deref(), Some("FF0000"));
        assert_eq!(rects[0].outline, None);
        assert_eq!((rects[0].x, rects[0].y), (10 * 9525, 20 * 9525));
        assert_eq!((rects[0].cx, rects[0].cy), (100 * 9525, 50 * 9525));
    }

    #[test]
    fn test_accent_and_border_resolution() {
        let config = ConvertConfig::new();

        let mut accent = shape("rgb(255, 0, 0)");
        accent.accent = true;
        assert_eq!(resolve_fill(&config, &accent), Some(Rgb::new(243, 244, 246)));
        assert_eq!(resolve_fill(&config, &shape("rgba(0, 0, 0, 0)")), None);

        let mut bordered = shape("transparent");
        bordered.border_width = 2.0;
        bordered.border_color = "rgb(0, 0, 255)".to_string();

        let mut builder = PresentationBuilder::new(&config);
        let mut content = SlideContent::new(0);
        content.shapes.push(bordered);
        builder.add_editable_slide(&content);

        let dir = TempDir::new().unwrap();
        let deck = round_trip(&builder, &dir);
        let rect = &deck.slides[0].shapes[0];
        assert_eq!(rect.fill, None);
        assert_eq!(rect.outline.as_deref(), Some("0000FF"));
        assert_eq!(rect.outline_width, Some(2 * 9525));
    }

    #[test]
    fn test_list_item_gets_bullet() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let mut content = SlideContent::new(0);
        content.texts.push(text("LI", "Item"));
        content.texts.push(text("LI", "■ Already"));
        builder.add_editable_slide(&content);

        let deck = round_trip(&builder, &dir);
        let boxes = deck.slides[0].shapes_of(ShapeKind::TextBox);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].text, "■ Item");
        assert_eq!(boxes[1].text, "■ Already");
    }

    #[test]
    fn test_text_style_mapping() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let mut heading = text("H2", "  Quarterly results  ");
        heading.text_transform = "uppercase".to_string();

        let mut content = SlideContent::new(0);
        content.texts.push(heading);
        builder.add_editable_slide(&content);

        let deck = round_trip(&builder, &dir);
        let tb = &deck.slides[0].shapes[0];
        assert_eq!(tb.kind, ShapeKind::TextBox);
        assert_eq!(tb.text, "QUARTERLY RESULTS");
        assert_eq!(tb.alignment.as_deref(), Some("ctr"));
        assert_eq!(tb.font_size, Some(1800));
        assert_eq!(tb.font.as_deref(), Some("Arial"));
        assert!(tb.bold);
        assert_eq!(tb.text_color.as_deref(), Some("111827"));
    }

    #[test]
    fn test_blank_text_skipped_and_tiny_boxes_floored() {
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let mut tiny = text("SPAN", "x");
        tiny.rect = Rect::new(0.0, 0.0, 1.0, 1.0);

        let mut content = SlideContent::new(0);
        content.texts.push(text("P", "   \n  "));
        content.texts.push(tiny);
        builder.add_editable_slide(&content);

        let slide = &builder.presentation().slides()[0];
        assert_eq!(slide.shape_count(), 1);
        match &slide.shapes()[0] {
            crate::writer::Shape::TextBox { text_box, .. } => {
                assert_eq!(text_box.frame.cx, config.px_to_emu(config.min_text_box_width));
                assert_eq!(text_box.frame.cy, config.px_to_emu(config.min_text_box_height));
                assert!(text_box.word_wrap);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_hyperlinks() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let mut good = text("A", "Docs");
        good.href = Some("https://example.com/docs".to_string());
        let mut bad = text("A", "Broken");
        bad.href = Some("javascript:void(0)".to_string());

        let mut content = SlideContent::new(0);
        content.texts.push(good);
        content.texts.push(bad);
        builder.add_editable_slide(&content);

        let deck = round_trip(&builder, &dir);
        let boxes = deck.slides[0].shapes_of(ShapeKind::TextBox);
        assert_eq!(boxes.len(), 2);
        assert!(boxes[0].has_hyperlink);
        assert!(!boxes[1].has_hyperlink);
        assert_eq!(boxes[1].text, "Broken");
    }

    #[test]
    fn test_screenshot_slides_are_full_bleed() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let first = write_png(&dir, "slide_0.png");
        let second = write_png(&dir, "slide_1.png");
        builder.add_screenshot_slide(Some(&first));
        builder.add_screenshot_slide(Some(&second));
        assert!(!first.exists());
        assert!(!second.exists());

        let deck = round_trip(&builder, &dir);
        assert_eq!(deck.slides.len(), 2);
        for slide in &deck.slides {
            assert_eq!(slide.shapes.len(), 1);
            let pic = &slide.shapes[0];
            assert_eq!(pic.kind, ShapeKind::Picture);
            assert_eq!((pic.x, pic.y), (0, 0));
            assert_eq!((pic.cx, pic.cy), (deck.slide_width, deck.slide_height));
        }
    }

    #[test]
    fn test_failed_capture_keeps_slide_count() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        builder.add_screenshot_slide(None);
        builder.add_screenshot_slide(Some(&dir.path().join("missing.png")));

        let deck = round_trip(&builder, &dir);
        assert_eq!(deck.slides.len(), 2);
        assert!(deck.slides.iter().all(|s| s.shapes.is_empty()));
    }

    #[test]
    fn test_missing_image_does_not_drop_other_layers() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new();
        let mut builder = PresentationBuilder::new(&config);

        let good = write_png(&dir, "img_0_0.png");
        let region = |marker: &str| ImageRegion {
            rect: Rect::new(50.0, 50.0, 32.0, 32.0),
            marker: marker.to_string(),
        };

        let mut content = SlideContent::new(0);
        content.shapes.push(shape("rgb(0, 128, 0)"));
        content.images.push(CapturedImage {
            region: region("a"),
            path: dir.path().join("img_0_missing.png"),
        });
        content.images.push(CapturedImage {
            region: region("b"),
            path: good,
        });
        content.texts.push(text("P", "Caption"));
        builder.add_editable_slide(&content);

        let deck = round_trip(&builder, &dir);
        let kinds: Vec<ShapeKind> = deck.slides[0].shapes.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ShapeKind::Rectangle, ShapeKind::Picture, ShapeKind::TextBox]);
    }

    #[test]
    fn test_empty_deck_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = ConvertConfig::new().with_viewport(deck_core::ViewportPreset::Hd);
        let builder = PresentationBuilder::new(&config);

        let deck = round_trip(&builder, &dir);
        assert!(deck.slides.is_empty());
        assert_eq!(deck.slide_width, 12_192_000);
        assert_eq!(deck.slide_height, 6_858_000);
    }
}
