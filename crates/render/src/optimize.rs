//! Post-processing of captured rasters before they are embedded.
//!
//! Oversized captures are scaled down to fit the configured bound and every
//! capture is re-encoded in place. Failures leave the original file alone.

use deck_core::{ConvertConfig, Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs;
use std::path::Path;

/// JPEG quality used when re-encoding.
const JPEG_QUALITY: u8 = 85;

/// Downscales and recompresses captured images.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptimizer {
    max_width: u32,
    max_height: u32,
}

impl ImageOptimizer {
    /// Create an optimizer with explicit bounds.
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width: max_width.max(1),
            max_height: max_height.max(1),
        }
    }

    /// Create an optimizer using the configured bounds.
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::new(config.max_image_width, config.max_image_height)
    }

    /// Optimize the file at `path` in place.
    ///
    /// Returns `false` and keeps the original file when anything fails.
    pub fn optimize(&self, path: &Path) -> bool {
        match self.try_optimize(path) {
            Ok((w, h)) => {
                log::debug!("Optimized {} ({}x{})", path.display(), w, h);
                true
            }
            Err(e) => {
                log::warn!("Could not optimize {}: {}", path.display(), e);
                false
            }
        }
    }

    fn try_optimize(&self, path: &Path) -> Result<(u32, u32)> {
        let format = ImageFormat::from_path(path)
            .map_err(|e| Error::ImageError(format!("Unknown format: {}", e)))?;
        let img = image::open(path).map_err(|e| Error::ImageError(format!("Failed to open: {}", e)))?;

        let (width, height) = img.dimensions();
        let (target_w, target_h) = fit_within(width, height, self.max_width, self.max_height);
        let img = if (target_w, target_h) != (width, height) {
            log::debug!("Resizing {}x{} to {}x{}", width, height, target_w, target_h);
            img.resize_exact(target_w, target_h, FilterType::Lanczos3)
        } else {
            img
        };

        let bytes = encode(&img, format)?;
        // encode fully before touching the original
        fs::write(path, bytes)?;
        Ok(img.dimensions())
    }
}

/// Re-encode an image in its original container format.
fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let encoded = match format {
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(encoder)
        }
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        other => {
            return Err(Error::ImageError(format!("Unsupported format {:?}", other)));
        }
    };
    encoded.map_err(|e| Error::ImageError(format!("Failed to encode: {}", e)))?;
    Ok(buf)
}

/// Largest size with the same aspect ratio that fits the bound.
///
/// Never upscales; images already inside the bound are returned unchanged.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let w = (f64::from(width) * scale).round().clamp(1.0, f64::from(max_width)) as u32;
    let h = (f64::from(height) * scale).round().clamp(1.0, f64::from(max_height)) as u32;
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_image(dir: &TempDir, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_fit_within_keeps_small_images() {
        assert_eq!(fit_within(800, 600, 1920, 1080), (800, 600));
        assert_eq!(fit_within(1920, 1080, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        let cases = [
            (3840, 2160),
            (2400, 1350),
            (4000, 1000),
            (1000, 4000),
            (1921, 1081),
            (2560, 1600),
            (7001, 13),
        ];
        for (w, h) in cases {
            let (nw, nh) = fit_within(w, h, 1920, 1080);
            assert!(nw <= w && nh <= h, "{}x{} grew to {}x{}", w, h, nw, nh);
            assert!(nw <= 1920 && nh <= 1080);
            // the derived side is within a pixel of the exact proportion
            let exact_h = h as f64 * nw as f64 / w as f64;
            let exact_w = w as f64 * nh as f64 / h as f64;
            assert!(
                (nh as f64 - exact_h).abs() <= 1.0 || (nw as f64 - exact_w).abs() <= 1.0,
                "{}x{} -> {}x{}",
                w,
                h,
                nw,
                nh
            );
        }
        assert_eq!(fit_within(3840, 2160, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_optimize_downscales_large_png() {
        let dir = TempDir::new().unwrap();
        let path = write_image(&dir, "big.png", 3000, 600);

        let optimizer = ImageOptimizer::from_config(&ConvertConfig::new());
        assert!(optimizer.optimize(&path));

        let img = image::open(&path).unwrap();
        assert_eq!(img.dimensions(), (1920, 384));
    }

    #[test]
    fn test_optimize_never_upscales() {
        let dir = TempDir::new().unwrap();
        let path = write_image(&dir, "small.png", 120, 80);

        assert!(ImageOptimizer::new(1920, 1080).optimize(&path));
        assert_eq!(image::open(&path).unwrap().dimensions(), (120, 80));
    }

    #[test]
    fn test_optimize_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = write_image(&dir, "photo.jpg", 400, 300);

        assert!(ImageOptimizer::new(200, 200).optimize(&path));
        assert_eq!(image::open(&path).unwrap().dimensions(), (200, 150));
    }

    #[test]
    fn test_optimize_failure_keeps_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"not a png").unwrap();

        assert!(!ImageOptimizer::new(10, 10).optimize(&path));
        assert_eq!(fs::read(&path).unwrap(), b"not a png");

        assert!(!ImageOptimizer::new(10, 10).optimize(&dir.path().join("missing.png")));
    }
}
