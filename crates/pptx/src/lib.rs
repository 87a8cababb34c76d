//! PPTX (OOXML) backend for HTML-to-PPTX conversion.
//!
//! Writes .pptx packages from extracted slide records, and reads them back
//! for inspection.

pub mod builder;
pub mod parser;
pub mod template;
pub mod writer;

pub use builder::PresentationBuilder;
pub use parser::{DeckSummary, PptxReader, ShapeKind, ShapeSummary, SlideSummary};
pub use writer::{Frame, ImageData, ImageFormat, Outline, Presentation, RunStyle, Shape, Slide, TextBox};
