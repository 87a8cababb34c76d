//! PPTX reader used to inspect generated decks.
//!
//! Reads slide order, slide size, and a flat summary of every shape, which is
//! enough to check what the builder actually wrote.

use deck_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// Kind of a shape found on a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeKind {
    #[default]
    Rectangle,
    TextBox,
    Picture,
}

/// What the reader saw of one shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeSummary {
    pub kind: ShapeKind,
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
    /// Solid fill as upper-case hex.
    pub fill: Option<String>,
    /// Outline color as upper-case hex, when the outline is drawn.
    pub outline: Option<String>,
    pub outline_width: Option<i64>,
    /// Paragraph text, line breaks as `\n`.
    pub text: String,
    pub alignment: Option<String>,
    /// Style of the first run.
    pub font_size: Option<u32>,
    pub font: Option<String>,
    pub bold: bool,
    pub text_color: Option<String>,
    pub has_hyperlink: bool,
    /// Relationship id of the embedded image.
    pub image_rel: Option<String>,
}

/// One slide in presentation order.
#[derive(Debug, Clone, Default)]
pub struct SlideSummary {
    /// 1-based slide number.
    pub number: usize,
    pub shapes: Vec<ShapeSummary>,
}

impl SlideSummary {
    /// Shapes of the given kind.
    pub fn shapes_of(&self, kind: ShapeKind) -> Vec<&ShapeSummary> {
        self.shapes.iter().filter(|s| s.kind == kind).collect()
    }
}

/// Summary of a whole deck.
#[derive(Debug, Clone, Default)]
pub struct DeckSummary {
    pub slide_width: i64,
    pub slide_height: i64,
    pub slides: Vec<SlideSummary>,
}

/// Reader for PPTX (Office Open XML) files.
pub struct PptxReader;

impl PptxReader {
    /// Create a new PPTX reader.
    pub fn new() -> Self {
        Self
    }

    /// Read a deck from disk.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<DeckSummary> {
        let file = File::open(path.as_ref())?;
        self.read(BufReader::new(file))
    }

    /// Read a deck from any seekable reader.
    pub fn read<R: Read + Seek>(&self, reader: R) -> Result<DeckSummary> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut deck = DeckSummary::default();
        let presentation = self.read_file_from_archive(&mut archive, "ppt/presentation.xml")?;
        (deck.slide_width, deck.slide_height) = self.read_slide_size(&presentation)?;

        let slide_order = self.slide_order(&mut archive, &presentation)?;
        for (idx, slide_path) in slide_order.iter().enumerate() {
            let content = self.read_file_from_archive(&mut archive, slide_path)?;
            deck.slides.push(SlideSummary {
                number: idx + 1,
                shapes: self.extract_shapes_from_xml(&content)?,
            });
        }

        Ok(deck)
    }

    fn read_slide_size(&self, xml: &str) -> Result<(i64, i64)> {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"sldSz" =>
                {
                    let cx = attr_value(e, b"cx").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let cy = attr_value(e, b"cy").and_then(|v| v.parse().ok()).unwrap_or(0);
                    return Ok((cx, cy));
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlError(format!("Error parsing presentation: {}", e))),
                _ => {}
            }
        }
        Err(Error::XmlError("presentation has no slide size".to_string()))
    }

    /// Slide part paths in presentation order.
    ///
    /// Order comes from `p:sldIdLst`; each entry's `r:id` is resolved through
    /// the presentation relationships.
    fn slide_order<R: Read + Seek>(&self, archive: &mut ZipArchive<R>, presentation: &str) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, "ppt/_rels/presentation.xml.rels")?;
        let mut targets = HashMap::new();

        let mut reader = Reader::from_str(&rels_content);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"Relationship" => {
                    let is_slide = attr_value(e, b"Type").is_some_and(|t| t.ends_with("/slide"));
                    if let (true, Some(id), Some(target)) = (is_slide, attr_value(e, b"Id"), attr_value(e, b"Target")) {
                        targets.insert(id, part_path(&target));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlError(format!("Error parsing relationships: {}", e))),
                _ => {}
            }
        }

        let mut order = Vec::new();
        let mut reader = Reader::from_str(presentation);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"sldId" => {
                    let id = rel_id(e).ok_or_else(|| Error::XmlError("slide entry without r:id".to_string()))?;
                    let path = targets
                        .get(&id)
                        .ok_or_else(|| Error::XmlError(format!("slide relationship {} not found", id)))?;
                    order.push(path.clone());
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::XmlError(format!("Error parsing presentation: {}", e))),
                _ => {}
            }
        }

        Ok(order)
    }

    /// Extract shape summaries from slide XML, in drawing order.
    fn extract_shapes_from_xml(&self, xml_content: &str) -> Result<Vec<ShapeSummary>> {
        let mut shapes = Vec::new();
        let mut reader = Reader::from_str(xml_content);

        let mut current: Option<ShapeSummary> = None;
        let mut state = ShapeState::default();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    match local_name(e.name().as_ref()) {
                        b"sp" => {
                            current = Some(ShapeSummary::default());
                            state = ShapeState::default();
                        }
                        b"pic" => {
                            current = Some(ShapeSummary {
                                kind: ShapeKind::Picture,
                                ..ShapeSummary::default()
                            });
                            state = ShapeState::default();
                        }
                        b"spPr" => state.in_sp_pr = true,
                        b"ln" => {
                            state.in_ln = true;
                            if let Some(ref mut shape) = current {
                                shape.outline_width = attr_value(e, b"w").and_then(|v| v.parse().ok());
                            }
                        }
                        b"solidFill" => state.in_solid_fill = true,
                        b"rPr" => {
                            state.in_rpr = true;
                            if let Some(ref mut shape) = current {
                                read_run_properties(shape, e, &mut state);
                            }
                        }
                        b"t" => state.in_t = true,
                        b"br" => {
                            if let Some(ref mut shape) = current {
                                shape.text.push('\n');
                            }
                        }
                        b"p" => {
                            if let Some(ref mut shape) = current {
                                if !shape.text.is_empty() {
                                    shape.text.push('\n');
                                }
                            }
                        }
                        _ => {}
                    }
                    if let Some(ref mut shape) = current {
                        apply_empty_or_start(shape, e, &mut state);
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    if let Some(ref mut shape) = current {
                        if local_name(e.name().as_ref()) == b"rPr" {
                            read_run_properties(shape, e, &mut state);
                        }
                        apply_empty_or_start(shape, e, &mut state);
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if state.in_t {
                        if let Some(ref mut shape) = current {
                            let text = e.unescape().unwrap_or_default();
                            shape.text.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                    b"sp" | b"pic" => {
                        if let Some(shape) = current.take() {
                            shapes.push(shape);
                        }
                    }
                    b"spPr" => state.in_sp_pr = false,
                    b"ln" => state.in_ln = false,
                    b"solidFill" => state.in_solid_fill = false,
                    b"rPr" => state.in_rpr = false,
                    b"t" => state.in_t = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    log::warn!("XML parsing error (continuing): {}", e);
                }
                _ => {}
            }
        }

        Ok(shapes)
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the streaming reader currently is inside a shape.
#[derive(Debug, Default)]
struct ShapeState {
    in_sp_pr: bool,
    in_ln: bool,
    in_solid_fill: bool,
    in_rpr: bool,
    in_t: bool,
    seen_run: bool,
}

fn read_run_properties(shape: &mut ShapeSummary, e: &BytesStart, state: &mut ShapeState) {
    if state.seen_run {
        return;
    }
    state.seen_run = true;
    shape.font_size = attr_value(e, b"sz").and_then(|v| v.parse().ok());
    shape.bold = attr_value(e, b"b").is_some_and(|v| v == "1" || v == "true");
}

/// Handle elements that carry their data in attributes.
fn apply_empty_or_start(shape: &mut ShapeSummary, e: &BytesStart, state: &mut ShapeState) {
    match local_name(e.name().as_ref()) {
        b"cNvSpPr" => {
            if attr_value(e, b"txBox").is_some_and(|v| v == "1") {
                shape.kind = ShapeKind::TextBox;
            }
        }
        b"off" if state.in_sp_pr => {
            shape.x = attr_value(e, b"x").and_then(|v| v.parse().ok()).unwrap_or(0);
            shape.y = attr_value(e, b"y").and_then(|v| v.parse().ok()).unwrap_or(0);
        }
        b"ext" if state.in_sp_pr => {
            shape.cx = attr_value(e, b"cx").and_then(|v| v.parse().ok()).unwrap_or(0);
            shape.cy = attr_value(e, b"cy").and_then(|v| v.parse().ok()).unwrap_or(0);
        }
        b"srgbClr" if state.in_solid_fill => {
            let hex = attr_value(e, b"val");
            if state.in_ln {
                shape.outline = hex;
            } else if state.in_rpr {
                if shape.text_color.is_none() {
                    shape.text_color = hex;
                }
            } else if state.in_sp_pr {
                shape.fill = hex;
            }
        }
        b"pPr" => {
            if shape.alignment.is_none() {
                shape.alignment = attr_value(e, b"algn");
            }
        }
        b"latin" if state.in_rpr => {
            if shape.font.is_none() {
                shape.font = attr_value(e, b"typeface");
            }
        }
        b"hlinkClick" => shape.has_hyperlink = true,
        b"blip" => shape.image_rel = attr_value(e, b"embed"),
        _ => {}
    }
}

/// Value of an attribute, matched by local name.
fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// The relationship id of an `sldId` entry (`r:id`, not the numeric `id`).
fn rel_id(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref().ends_with(b":id"))
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// Package path of a relationship target relative to `ppt/`.
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path() {
        assert_eq!(part_path("slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(part_path("/ppt/slides/slide12.xml"), "ppt/slides/slide12.xml");
    }

    #[test]
    fn test_rel_id_ignores_numeric_id() {
        let xml = r#"<p:sldId xmlns:p="p" xmlns:r="r" id="256" r:id="rId7"/>"#;
        let mut reader = Reader::from_str(xml);
        match reader.read_event().unwrap() {
            Event::Empty(e) => assert_eq!(rel_id(&e).as_deref(), Some("rId7")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"r:embed"), b"embed");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_extract_shapes() {
        let xml = concat!(
            r#"<p:sld xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:spTree>"#,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="R"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></a:xfrm>"#,
            r#"<a:solidFill><a:srgbClr val="FF0000"/></a:solidFill><a:ln><a:noFill/></a:ln></p:spPr></p:sp>"#,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="T"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            r#"<p:spPr><a:xfrm><a:off x="1" y="2"/><a:ext cx="3" cy="4"/></a:xfrm></p:spPr>"#,
            r#"<p:txBody><a:bodyPr/><a:p><a:pPr algn="r"/><a:r><a:rPr sz="1200" b="1">"#,
            r#"<a:solidFill><a:srgbClr val="00FF00"/></a:solidFill></a:rPr><a:t>One</a:t></a:r>"#,
            r#"<a:br><a:rPr/></a:br><a:r><a:rPr/><a:t>Two</a:t></a:r></a:p></p:txBody></p:sp>"#,
            r#"</p:spTree></p:cSld></p:sld>"#
        );

        let shapes = PptxReader::new().extract_shapes_from_xml(xml).unwrap();
        assert_eq!(shapes.len(), 2);

        assert_eq!(shapes[0].kind, ShapeKind::Rectangle);
        assert_eq!((shapes[0].x, shapes[0].y, shapes[0].cx, shapes[0].cy), (10, 20, 30, 40));
        assert_eq!(shapes[0].fill.as_deref(), Some("FF0000"));
        assert_eq!(shapes[0].outline, None);

        assert_eq!(shapes[1].kind, ShapeKind::TextBox);
        assert_eq!(shapes[1].text, "One\nTwo");
        assert_eq!(shapes[1].alignment.as_deref(), Some("r"));
        assert_eq!(shapes[1].font_size, Some(1200));
        assert!(shapes[1].bold);
        assert_eq!(shapes[1].text_color.as_deref(), Some("00FF00"));
        assert_eq!(shapes[1].fill, None);
    }
}
