//! Translation of computed CSS values into presentation styling primitives.
//!
//! Inputs are the strings returned by `getComputedStyle`, so keywords are
//! already lower-case and colors are already in `rgb()`/`rgba()` form.

use crate::config::PT_PER_PX;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Regex to pull numeric channels out of `rgb(...)` / `rgba(...)`.
static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?|\.\d+").unwrap());

/// Regex for pixel font sizes like `18px` or `13.333px`.
static PX_SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([\d.]+)px").unwrap());

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Upper-case hex without `#`, as used by `a:srgbClr`.
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Parse a computed CSS color.
///
/// Returns `None` for empty, `transparent`, and zero-alpha colors. Anything
/// else with fewer than three numeric channels falls back to black.
pub fn color_from_css(css: &str) -> Option<Rgb> {
    let css = css.trim();
    if css.is_empty() || css.contains("transparent") || css.contains("rgba(0, 0, 0, 0)") {
        return None;
    }

    let nums: Vec<f64> = NUMBER_REGEX
        .find_iter(css)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    if nums.len() < 3 {
        return Some(Rgb::BLACK);
    }

    if css.starts_with("rgba") && nums.get(3).is_some_and(|a| *a == 0.0) {
        return None;
    }

    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    Some(Rgb::new(channel(nums[0]), channel(nums[1]), channel(nums[2])))
}

/// Map a computed `text-align` to a paragraph alignment.
pub fn alignment_from_css(css: &str) -> Alignment {
    if css.contains("center") {
        Alignment::Center
    } else if css.contains("right") {
        Alignment::Right
    } else if css.contains("justify") {
        Alignment::Justify
    } else {
        Alignment::Left
    }
}

/// Pick a presentation font for a CSS font stack.
///
/// Table entries are checked in order against the lower-cased stack; the
/// first keyword found wins.
pub fn font_name_from_css<'a>(
    font_family: &str,
    table: &'a [(String, String)],
    fallback: &'a str,
) -> &'a str {
    let family = font_family.to_lowercase();
    table
        .iter()
        .find(|(keyword, _)| family.contains(keyword.as_str()))
        .map(|(_, name)| name.as_str())
        .unwrap_or(fallback)
}

/// Whether a computed `font-weight` renders bold.
pub fn is_bold(font_weight: &str) -> bool {
    let weight = font_weight.trim();
    if weight.contains("bold") {
        return true;
    }
    weight.parse::<u32>().is_ok_and(|w| w >= 600)
}

/// Whether a computed `font-style` renders italic.
pub fn is_italic(font_style: &str) -> bool {
    font_style.contains("italic") || font_style.contains("oblique")
}

/// Whether a computed `text-decoration` includes an underline.
pub fn is_underline(decoration: &str) -> bool {
    decoration.contains("underline")
}

/// Whether a computed `text-decoration` includes a strike-through.
pub fn is_strike(decoration: &str) -> bool {
    decoration.contains("line-through")
}

/// Whether a computed `text-transform` upper-cases text.
pub fn is_uppercase(transform: &str) -> bool {
    transform.trim() == "uppercase"
}

/// Convert a pixel size to points.
pub fn px_to_pt(px: f64) -> f64 {
    px * PT_PER_PX
}

/// Parse a computed `font-size` like `24px` into points.
pub fn font_size_pt(font_size: &str) -> Option<f64> {
    PX_SIZE_REGEX
        .captures(font_size)
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .map(px_to_pt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;

    #[test]
    fn test_color_rgb_and_rgba() {
        assert_eq!(color_from_css("rgb(255, 0, 0)"), Some(Rgb::new(255, 0, 0)));
        assert_eq!(color_from_css("rgb(1,2,3)"), Some(Rgb::new(1, 2, 3)));
        assert_eq!(color_from_css("rgba(10, 20, 30, 0.5)"), Some(Rgb::new(10, 20, 30)));
        assert_eq!(color_from_css("rgba(10, 20, 30, 1)"), Some(Rgb::new(10, 20, 30)));
    }

    #[test]
    fn test_color_transparent() {
        assert_eq!(color_from_css("rgba(0, 0, 0, 0)"), None);
        assert_eq!(color_from_css("rgba(255, 255, 255, 0)"), None);
        assert_eq!(color_from_css("transparent"), None);
        assert_eq!(color_from_css(""), None);
    }

    #[test]
    fn test_color_fallback_black() {
        assert_eq!(color_from_css("currentcolor"), Some(Rgb::BLACK));
        assert_eq!(color_from_css("rgb(12)"), Some(Rgb::BLACK));
    }

    #[test]
    fn test_color_all_channels() {
        for r in (0..=255u8).step_by(51) {
            for g in (0..=255u8).step_by(85) {
                let b = 255 - r;
                let css = format!("rgb({}, {}, {})", r, g, b);
                assert_eq!(color_from_css(&css), Some(Rgb::new(r, g, b)));
            }
        }
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::new(255, 0, 16).to_hex(), "FF0010");
        assert_eq!(Rgb::new(243, 244, 246).to_string(), "#F3F4F6");
    }

    #[test]
    fn test_alignment() {
        assert_eq!(alignment_from_css("center"), Alignment::Center);
        assert_eq!(alignment_from_css("-webkit-center"), Alignment::Center);
        assert_eq!(alignment_from_css("right"), Alignment::Right);
        assert_eq!(alignment_from_css("justify"), Alignment::Justify);
        assert_eq!(alignment_from_css("start"), Alignment::Left);
        assert_eq!(alignment_from_css(""), Alignment::Left);
    }

    #[test]
    fn test_font_name() {
        let config = ConvertConfig::new();
        let font = |s| font_name_from_css(s, &config.font_table, &config.fallback_font);

        assert_eq!(font("\"Helvetica Neue\", Arial, sans-serif"), "Helvetica");
        assert_eq!(font("Arial, sans-serif"), "Arial");
        assert_eq!(font("Roboto"), "Roboto");
        assert_eq!(font("\"Fira Code\", monospace"), "Consolas");
        assert_eq!(font("-apple-system, sans-serif"), "Segoe UI");
        assert_eq!(font(""), "Segoe UI");
    }

    #[test]
    fn test_bold() {
        assert!(is_bold("bold"));
        assert!(is_bold("bolder"));
        assert!(is_bold("600"));
        assert!(is_bold("900"));
        assert!(!is_bold("500"));
        assert!(!is_bold("normal"));
        assert!(!is_bold(""));
    }

    #[test]
    fn test_decoration() {
        assert!(is_underline("underline solid rgb(0, 0, 0)"));
        assert!(!is_underline("none solid rgb(0, 0, 0)"));
        assert!(is_strike("line-through"));
        assert!(is_underline("underline line-through"));
        assert!(is_strike("underline line-through"));
        assert!(is_italic("italic"));
        assert!(!is_italic("normal"));
    }

    #[test]
    fn test_uppercase() {
        assert!(is_uppercase("uppercase"));
        assert!(!is_uppercase("capitalize"));
        assert!(!is_uppercase("none"));
    }

    #[test]
    fn test_font_size_is_linear() {
        assert_eq!(font_size_pt("16px"), Some(12.0));
        assert_eq!(font_size_pt("0px"), Some(0.0));
        assert_eq!(font_size_pt("13.5px"), Some(13.5 * 0.75));
        assert_eq!(font_size_pt("1.2em"), None);

        for px in 0..200 {
            let px = px as f64 * 0.5;
            assert_eq!(px_to_pt(px), px * 0.75);
        }
    }
}
