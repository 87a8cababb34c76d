//! Browser side of HTML-to-PPTX conversion: the headless Chrome session,
//! in-page extraction scripts, slide extraction, and capture optimization.

pub mod extract;
pub mod optimize;
pub mod scripts;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use extract::SlideExtractor;
pub use optimize::ImageOptimizer;
pub use session::{ChromeSession, PageSession};
