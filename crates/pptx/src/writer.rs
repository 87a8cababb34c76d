//! In-memory presentation document and its OOXML serialization.
//!
//! Positions and sizes are EMUs (914400 per inch). The document is only ever
//! appended to; [`Presentation::save`] writes the whole package in one go.

use crate::template::{self, XML_DECL};
use deck_core::{Alignment, Error, Result, Rgb};
use quick_xml::escape::escape;
use std::fmt::{self, Write as FmtWrite};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

fn xml_err(e: fmt::Error) -> Error {
    Error::XmlError(e.to_string())
}

/// Position and size of a shape, in EMUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl Frame {
    pub fn new(x: i64, y: i64, cx: i64, cy: i64) -> Self {
        Self { x, y, cx, cy }
    }

    fn write_xfrm(&self, xml: &mut String) -> Result<()> {
        write!(
            xml,
            r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            self.x,
            self.y,
            self.cx.max(0),
            self.cy.max(0)
        )
        .map_err(xml_err)
    }
}

/// Shape outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outline {
    pub color: Rgb,
    /// Line width in EMUs.
    pub width: i64,
}

/// Raster formats we can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Detect the format from magic bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Encoded raster bytes ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageData {
    /// Wrap encoded bytes, rejecting formats we cannot embed.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = ImageFormat::from_bytes(&bytes)
            .ok_or_else(|| Error::ImageError("unsupported raster format".to_string()))?;
        Ok(Self { bytes, format })
    }
}

/// Character formatting shared by every run of a paragraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunStyle {
    pub color: Option<Rgb>,
    pub size_pt: Option<f64>,
    pub font: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
}

/// A word-wrapped text box holding a single paragraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBox {
    pub frame: Frame,
    pub text: String,
    pub alignment: Alignment,
    pub style: RunStyle,
    pub word_wrap: bool,
    /// Inset on every side, in EMUs.
    pub inset: i64,
    hyperlink: Option<String>,
}

impl TextBox {
    /// Create a word-wrapped text box with no inset.
    pub fn new(frame: Frame, text: impl Into<String>) -> Self {
        Self {
            frame,
            text: text.into(),
            word_wrap: true,
            ..Self::default()
        }
    }

    /// Attach an external hyperlink to every run.
    pub fn set_hyperlink(&mut self, target: &str) -> Result<()> {
        let target = target.trim();
        if target.is_empty()
            || target.chars().any(|c| c.is_whitespace() || c.is_control())
            || target.to_ascii_lowercase().starts_with("javascript:")
        {
            return Err(Error::InvalidHyperlink(target.to_string()));
        }
        self.hyperlink = Some(target.to_string());
        Ok(())
    }

    pub fn hyperlink(&self) -> Option<&str> {
        self.hyperlink.as_deref()
    }
}

/// A shape placed on a slide.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Rectangle {
        id: u32,
        frame: Frame,
        /// `None` leaves the rectangle unfilled.
        fill: Option<Rgb>,
        outline: Option<Outline>,
    },
    Picture {
        id: u32,
        frame: Frame,
        image: ImageData,
    },
    TextBox {
        id: u32,
        text_box: TextBox,
    },
}

/// One slide, drawn back to front in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Slide {
    shapes: Vec<Shape>,
}

impl Slide {
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    fn next_id(&self) -> u32 {
        // id 1 belongs to the shape tree itself
        self.shapes.len() as u32 + 2
    }

    /// Add a rectangle.
    pub fn add_rectangle(&mut self, frame: Frame, fill: Option<Rgb>, outline: Option<Outline>) {
        let id = self.next_id();
        self.shapes.push(Shape::Rectangle {
            id,
            frame,
            fill,
            outline,
        });
    }

    /// Add a picture stretched to the frame.
    pub fn add_picture(&mut self, frame: Frame, image: ImageData) {
        let id = self.next_id();
        self.shapes.push(Shape::Picture { id, frame, image });
    }

    /// Add a text box and return it for further styling.
    pub fn add_text_box(&mut self, text_box: TextBox) -> &mut TextBox {
        let id = self.next_id();
        self.shapes.push(Shape::TextBox { id, text_box });
        match self.shapes.last_mut() {
            Some(Shape::TextBox { text_box, .. }) => text_box,
            _ => unreachable!("text box was just pushed"),
        }
    }

    /// Serialize the slide, allocating relationship targets as we go.
    fn to_xml(&self, rels: &mut SlideRels) -> Result<String> {
        let mut xml = String::with_capacity(4096);
        xml.push_str(XML_DECL);
        write!(
            xml,
            r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
            template::NS_A,
            template::NS_R,
            template::NS_P
        )
        .map_err(xml_err)?;
        xml.push_str("<p:cSld><p:spTree>");
        xml.push_str(template::SP_TREE_HEADER);

        for shape in &self.shapes {
            match shape {
                Shape::Rectangle {
                    id,
                    frame,
                    fill,
                    outline,
                } => write_rectangle(&mut xml, *id, frame, *fill, outline.as_ref())?,
                Shape::Picture { id, frame, image } => {
                    let rel_id = rels.add_image(image);
                    write_picture(&mut xml, *id, frame, &rel_id)?;
                }
                Shape::TextBox { id, text_box } => {
                    let rel_id = text_box.hyperlink().map(|target| rels.add_hyperlink(target));
                    write_text_box(&mut xml, *id, text_box, rel_id.as_deref())?;
                }
            }
        }

        xml.push_str("</p:spTree></p:cSld>");
        xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
        xml.push_str("</p:sld>");
        Ok(xml)
    }
}

fn write_solid_fill(xml: &mut String, color: Rgb) -> Result<()> {
    write!(xml, r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, color.to_hex()).map_err(xml_err)
}

fn write_rectangle(
    xml: &mut String,
    id: u32,
    frame: &Frame,
    fill: Option<Rgb>,
    outline: Option<&Outline>,
) -> Result<()> {
    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{}" name="Rectangle {}"/>"#, id, id - 1).map_err(xml_err)?;
    xml.push_str("<p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>");
    frame.write_xfrm(xml)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);

    match fill {
        Some(color) => write_solid_fill(xml, color)?,
        None => xml.push_str("<a:noFill/>"),
    }

    match outline {
        Some(line) => {
            write!(xml, r#"<a:ln w="{}">"#, line.width).map_err(xml_err)?;
            write_solid_fill(xml, line.color)?;
            xml.push_str("</a:ln>");
        }
        None => xml.push_str("<a:ln><a:noFill/></a:ln>"),
    }

    xml.push_str("</p:spPr></p:sp>");
    Ok(())
}

fn write_picture(xml: &mut String, id: u32, frame: &Frame, rel_id: &str) -> Result<()> {
    xml.push_str("<p:pic><p:nvPicPr>");
    write!(xml, r#"<p:cNvPr id="{}" name="Picture {}"/>"#, id, id - 1).map_err(xml_err)?;
    xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#);
    write!(
        xml,
        r#"<p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
        rel_id
    )
    .map_err(xml_err)?;
    xml.push_str("<p:spPr>");
    frame.write_xfrm(xml)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#);
    Ok(())
}

fn alignment_value(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "l",
        Alignment::Center => "ctr",
        Alignment::Right => "r",
        Alignment::Justify => "just",
    }
}

fn write_run_properties(xml: &mut String, style: &RunStyle, link_rel: Option<&str>) -> Result<()> {
    xml.push_str(r#"<a:rPr lang="en-US""#);
    if let Some(size) = style.size_pt {
        // hundredths of a point, valid range 1..=4000 pt
        let sz = (size * 100.0).round().clamp(100.0, 400_000.0) as u32;
        write!(xml, r#" sz="{}""#, sz).map_err(xml_err)?;
    }
    if style.bold {
        xml.push_str(r#" b="1""#);
    }
    if style.italic {
        xml.push_str(r#" i="1""#);
    }
    if style.underline {
        xml.push_str(r#" u="sng""#);
    }
    if style.strike {
        xml.push_str(r#" strike="sngStrike""#);
    }
    xml.push_str(r#" dirty="0">"#);

    if let Some(color) = style.color {
        write_solid_fill(xml, color)?;
    }
    if let Some(font) = &style.font {
        write!(xml, r#"<a:latin typeface="{}"/>"#, escape(font.as_str())).map_err(xml_err)?;
    }
    if let Some(rel_id) = link_rel {
        write!(xml, r#"<a:hlinkClick r:id="{}"/>"#, rel_id).map_err(xml_err)?;
    }
    xml.push_str("</a:rPr>");
    Ok(())
}

/// Drop characters XML 1.0 cannot carry.
fn xml_safe(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\t' || c == '\n' || !c.is_control())
        .collect()
}

fn write_text_box(xml: &mut String, id: u32, text_box: &TextBox, link_rel: Option<&str>) -> Result<()> {
    xml.push_str("<p:sp><p:nvSpPr>");
    write!(xml, r#"<p:cNvPr id="{}" name="TextBox {}"/>"#, id, id - 1).map_err(xml_err)?;
    xml.push_str(r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>"#);
    text_box.frame.write_xfrm(xml)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);

    let inset = text_box.inset.max(0);
    write!(
        xml,
        r#"<p:txBody><a:bodyPr wrap="{}" lIns="{inset}" tIns="{inset}" rIns="{inset}" bIns="{inset}" rtlCol="0"><a:noAutofit/></a:bodyPr>"#,
        if text_box.word_wrap { "square" } else { "none" },
    )
    .map_err(xml_err)?;
    xml.push_str("<a:lstStyle/><a:p>");
    write!(xml, r#"<a:pPr algn="{}"/>"#, alignment_value(text_box.alignment)).map_err(xml_err)?;

    let text = xml_safe(&text_box.text.replace("\r\n", "\n"));
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            xml.push_str("<a:br>");
            write_run_properties(xml, &text_box.style, link_rel)?;
            xml.push_str("</a:br>");
        }
        if line.is_empty() {
            continue;
        }
        xml.push_str("<a:r>");
        write_run_properties(xml, &text_box.style, link_rel)?;
        write!(xml, "<a:t>{}</a:t>", escape(line)).map_err(xml_err)?;
        xml.push_str("</a:r>");
    }

    xml.push_str("</a:p></p:txBody></p:sp>");
    Ok(())
}

/// Relationships of one slide, plus the media parts they point at.
struct SlideRels {
    entries: Vec<(String, &'static str, String, bool)>,
    media: Vec<(String, Vec<u8>)>,
    media_counter: usize,
}

impl SlideRels {
    fn new(media_counter: usize) -> Self {
        let mut rels = Self {
            entries: Vec::new(),
            media: Vec::new(),
            media_counter,
        };
        rels.push(
            template::REL_SLIDE_LAYOUT,
            "../slideLayouts/slideLayout1.xml".to_string(),
            false,
        );
        rels
    }

    fn push(&mut self, rel_type: &'static str, target: String, external: bool) -> String {
        let id = format!("rId{}", self.entries.len() + 1);
        self.entries.push((id.clone(), rel_type, target, external));
        id
    }

    fn add_image(&mut self, image: &ImageData) -> String {
        self.media_counter += 1;
        let name = format!("image{}.{}", self.media_counter, image.format.extension());
        self.media.push((format!("ppt/media/{}", name), image.bytes.clone()));
        self.push(template::REL_IMAGE, format!("../media/{}", name), false)
    }

    fn add_hyperlink(&mut self, target: &str) -> String {
        self.push(template::REL_HYPERLINK, target.to_string(), true)
    }

    fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(512);
        xml.push_str(XML_DECL);
        write!(xml, r#"<Relationships xmlns="{}">"#, template::NS_PKG_RELS).map_err(xml_err)?;
        for (id, rel_type, target, external) in &self.entries {
            write!(
                xml,
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                id,
                rel_type,
                escape(target.as_str()),
                if *external { r#" TargetMode="External""# } else { "" }
            )
            .map_err(xml_err)?;
        }
        xml.push_str("</Relationships>");
        Ok(xml)
    }
}

/// A presentation document under construction.
#[derive(Debug, Clone)]
pub struct Presentation {
    slide_width: i64,
    slide_height: i64,
    slides: Vec<Slide>,
}

impl Presentation {
    /// Create an empty presentation with a fixed slide size in EMUs.
    pub fn new(slide_width: i64, slide_height: i64) -> Self {
        Self {
            slide_width,
            slide_height,
            slides: Vec::new(),
        }
    }

    /// Append a blank slide and return it.
    pub fn add_slide(&mut self) -> &mut Slide {
        self.slides.push(Slide::default());
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slide_width(&self) -> i64 {
        self.slide_width
    }

    pub fn slide_height(&self) -> i64 {
        self.slide_height
    }

    /// Write the package to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))?;
        log::debug!("Wrote {} slides to {}", self.slides.len(), path.display());
        Ok(())
    }

    /// Write the package to any seekable writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut parts: Vec<(String, String)> = Vec::new();
        let mut media: Vec<(String, Vec<u8>)> = Vec::new();
        let mut media_counter = 0;

        for (idx, slide) in self.slides.iter().enumerate() {
            let number = idx + 1;
            let mut rels = SlideRels::new(media_counter);
            let slide_xml = slide.to_xml(&mut rels)?;
            parts.push((format!("ppt/slides/slide{}.xml", number), slide_xml));
            parts.push((format!("ppt/slides/_rels/slide{}.xml.rels", number), rels.to_xml()?));
            media_counter = rels.media_counter;
            media.append(&mut rels.media);
        }

        let fixed = [
            ("[Content_Types].xml".to_string(), self.content_types_xml(&media)?),
            ("_rels/.rels".to_string(), template::package_rels_xml()),
            ("ppt/presentation.xml".to_string(), self.presentation_xml()?),
            ("ppt/_rels/presentation.xml.rels".to_string(), self.presentation_rels_xml()?),
            ("ppt/slideMasters/slideMaster1.xml".to_string(), template::slide_master_xml()),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
                template::slide_master_rels_xml(),
            ),
            ("ppt/slideLayouts/slideLayout1.xml".to_string(), template::blank_layout_xml()),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
                template::blank_layout_rels_xml(),
            ),
            ("ppt/theme/theme1.xml".to_string(), template::theme_xml()),
        ];

        for (name, content) in fixed.iter().chain(parts.iter()) {
            zip.start_file(name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", name, e)))?;
            zip.write_all(content.as_bytes())?;
        }

        // already-compressed rasters
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, bytes) in &media {
            zip.start_file(name.as_str(), stored)
                .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", name, e)))?;
            zip.write_all(bytes)?;
        }

        let mut inner = zip
            .finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
        inner.flush()?;
        Ok(())
    }

    fn content_types_xml(&self, media: &[(String, Vec<u8>)]) -> Result<String> {
        let mut xml = String::with_capacity(2048);
        xml.push_str(XML_DECL);
        xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
        write!(xml, r#"<Default Extension="rels" ContentType="{}"/>"#, template::CT_RELS).map_err(xml_err)?;
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let ext = format.extension();
            if media.iter().any(|(name, _)| name.ends_with(ext)) {
                write!(
                    xml,
                    r#"<Default Extension="{}" ContentType="{}"/>"#,
                    ext,
                    format.content_type()
                )
                .map_err(xml_err)?;
            }
        }

        let overrides = [
            ("/ppt/presentation.xml", template::CT_PRESENTATION),
            ("/ppt/slideMasters/slideMaster1.xml", template::CT_SLIDE_MASTER),
            ("/ppt/slideLayouts/slideLayout1.xml", template::CT_SLIDE_LAYOUT),
            ("/ppt/theme/theme1.xml", template::CT_THEME),
        ];
        for (part, content_type) in overrides {
            write!(xml, r#"<Override PartName="{}" ContentType="{}"/>"#, part, content_type)
                .map_err(xml_err)?;
        }
        for number in 1..=self.slides.len() {
            write!(
                xml,
                r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="{}"/>"#,
                number,
                template::CT_SLIDE
            )
            .map_err(xml_err)?;
        }
        xml.push_str("</Types>");
        Ok(xml)
    }

    fn presentation_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(1024);
        xml.push_str(XML_DECL);
        write!(
            xml,
            r#"<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
            template::NS_A,
            template::NS_R,
            template::NS_P
        )
        .map_err(xml_err)?;
        xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);

        if !self.slides.is_empty() {
            xml.push_str("<p:sldIdLst>");
            for idx in 0..self.slides.len() {
                write!(xml, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + idx, idx + 3).map_err(xml_err)?;
            }
            xml.push_str("</p:sldIdLst>");
        }

        write!(
            xml,
            r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/>"#,
            self.slide_width, self.slide_height
        )
        .map_err(xml_err)?;
        xml.push_str("</p:presentation>");
        Ok(xml)
    }

    fn presentation_rels_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(1024);
        xml.push_str(XML_DECL);
        write!(xml, r#"<Relationships xmlns="{}">"#, template::NS_PKG_RELS).map_err(xml_err)?;
        write!(
            xml,
            r#"<Relationship Id="rId1" Type="{}" Target="slideMasters/slideMaster1.xml"/>"#,
            template::REL_SLIDE_MASTER
        )
        .map_err(xml_err)?;
        write!(
            xml,
            r#"<Relationship Id="rId2" Type="{}" Target="theme/theme1.xml"/>"#,
            template::REL_THEME
        )
        .map_err(xml_err)?;
        for idx in 0..self.slides.len() {
            write!(
                xml,
                r#"<Relationship Id="rId{}" Type="{}" Target="slides/slide{}.xml"/>"#,
                idx + 3,
                template::REL_SLIDE,
                idx + 1
            )
            .map_err(xml_err)?;
        }
        xml.push_str("</Relationships>");
        Ok(xml)
    }
}
