//! Error types for HTML-to-PPTX conversion.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, extracting, or writing a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input document does not exist.
    #[error("File {} not found.", .0.display())]
    InputNotFound(PathBuf),

    /// The headless browser failed to launch or a browser call failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// An in-page script failed or returned data we could not decode.
    #[error("Script error: {0}")]
    ScriptError(String),

    /// Failed to decode, resize, or encode a raster image.
    #[error("Image error: {0}")]
    ImageError(String),

    /// XML generation or parsing error (for PPTX).
    #[error("XML error: {0}")]
    XmlError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// A hyperlink target that cannot be attached to a text run.
    #[error("Invalid hyperlink target: {0}")]
    InvalidHyperlink(String),

    /// An unrecognized configuration value.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
