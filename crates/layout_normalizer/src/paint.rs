//! Property classification and value repainting.

use crate::syntax::components;
use csscolorparser::Color as CssColor;
use cssparser::Token;

/// Colour every background-family value is forced to.
pub const BACKGROUND_PAINT: &str = "#ffffff";
/// Colour every foreground, border and shadow value is forced to.
pub const FOREGROUND_PAINT: &str = "#000000";

/// Keywords that parse as colours (or sit where colours go) but carry no paint
/// of their own.
const NON_PAINT_KEYWORDS: [&str; 8] = [
    "transparent",
    "currentcolor",
    "inherit",
    "initial",
    "unset",
    "revert",
    "revert-layer",
    "none",
];

const COLOR_FUNCTIONS: [&str; 10] = [
    "rgb(", "rgba(", "hsl(", "hsla(", "hwb(", "lab(", "lch(", "oklab(", "oklch(", "color(",
];

const IMAGE_FUNCTIONS: [&str; 4] = ["url(", "gradient(", "image-set(", "image("];

/// How a declaration is treated by the layout rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintFamily {
    /// Repainted to [`BACKGROUND_PAINT`]; images are removed.
    Background,
    /// Repainted to [`FOREGROUND_PAINT`].
    Foreground,
    PassThrough,
}

/// Classifies a lowercase property name.
pub fn classify(property: &str) -> PaintFamily {
    if property.starts_with("--") {
        return PaintFamily::PassThrough;
    }
    if property.starts_with("background") {
        return PaintFamily::Background;
    }
    let foreground = property == "color"
        || property.ends_with("-color")
        || property.starts_with("border")
        || property.starts_with("outline")
        || property.starts_with("column-rule")
        || property.starts_with("text-decoration")
        || property.starts_with("text-emphasis")
        || matches!(property, "box-shadow" | "text-shadow" | "fill" | "stroke");
    if foreground {
        PaintFamily::Foreground
    } else {
        PaintFamily::PassThrough
    }
}

/// `true` for properties whose whole value is a single colour.
fn is_pure_color_property(property: &str) -> bool {
    property == "color" || property.ends_with("-color") || matches!(property, "fill" | "stroke")
}

fn is_non_paint(token: &str) -> bool {
    NON_PAINT_KEYWORDS
        .iter()
        .any(|keyword| token.eq_ignore_ascii_case(keyword))
}

/// `true` when `token` is a literal colour: a hex value, a colour function or a
/// named colour.
pub fn is_color_token(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    if is_non_paint(&lower) {
        return false;
    }
    let shaped = lower.starts_with('#')
        || COLOR_FUNCTIONS.iter().any(|prefix| lower.starts_with(prefix))
        || lower.chars().all(|character| character.is_ascii_alphabetic());
    shaped && lower.parse::<CssColor>().is_ok()
}

fn is_image_token(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    IMAGE_FUNCTIONS.iter().any(|function| lower.contains(function))
}

/// Splits a value into tokens at top-level whitespace and commas, keeping the
/// separators as their own slices so the value can be reassembled verbatim.
fn tokens(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for component in components(value) {
        if matches!(component.token, Token::WhiteSpace(_) | Token::Comma) {
            if start < component.start {
                out.push(&value[start..component.start]);
            }
            out.push(component.text);
            start = component.end();
        }
    }
    if start < value.len() {
        out.push(&value[start..]);
    }
    out
}

/// Rewrites one declaration value (without `!important`) for the layout rendering.
pub fn repaint(property: &str, value: &str) -> Option<String> {
    let family = classify(property);
    let paint = match family {
        PaintFamily::Background => BACKGROUND_PAINT,
        PaintFamily::Foreground => FOREGROUND_PAINT,
        PaintFamily::PassThrough => return None,
    };

    if is_pure_color_property(property) {
        let trimmed = value.trim();
        if is_non_paint(trimmed) || trimmed.starts_with("var(") {
            return None;
        }
        return Some(paint.to_owned());
    }

    let mut changed = false;
    let rewritten: String = tokens(value)
        .into_iter()
        .map(|token| {
            if family == PaintFamily::Background && is_image_token(token) {
                changed = true;
                "none"
            } else if is_color_token(token) {
                changed = true;
                paint
            } else {
                token
            }
        })
        .collect();
    changed.then_some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_fall_into_families() {
        assert_eq!(classify("background-color"), PaintFamily::Background);
        assert_eq!(classify("background"), PaintFamily::Background);
        assert_eq!(classify("color"), PaintFamily::Foreground);
        assert_eq!(classify("border-left"), PaintFamily::Foreground);
        assert_eq!(classify("box-shadow"), PaintFamily::Foreground);
        assert_eq!(classify("outline-color"), PaintFamily::Foreground);
        assert_eq!(classify("border-radius"), PaintFamily::Foreground);
        assert_eq!(classify("width"), PaintFamily::PassThrough);
        assert_eq!(classify("--brand"), PaintFamily::PassThrough);
    }

    #[test]
    fn colour_tokens_are_recognized() {
        assert!(is_color_token("#f0f"));
        assert!(is_color_token("rgba(0, 0, 0, 0.5)"));
        assert!(is_color_token("RebeccaPurple"));
        assert!(!is_color_token("solid"));
        assert!(!is_color_token("transparent"));
        assert!(!is_color_token("2px"));
    }

    #[test]
    fn shorthand_keeps_geometry() {
        assert_eq!(
            repaint("border", "2px solid rgb(10, 20, 30)").as_deref(),
            Some("2px solid #000000")
        );
        assert_eq!(
            repaint("box-shadow", "0 1px 2px red, inset 0 0 1px #333").as_deref(),
            Some("0 1px 2px #000000, inset 0 0 1px #000000")
        );
        assert_eq!(repaint("border-radius", "4px"), None);
    }

    #[test]
    fn background_images_are_removed() {
        assert_eq!(
            repaint("background", "#123 url(\"a b.png\") no-repeat").as_deref(),
            Some("#ffffff none no-repeat")
        );
        assert_eq!(
            repaint("background-image", "linear-gradient(red, blue)").as_deref(),
            Some("none")
        );
    }

    #[test]
    fn values_split_at_top_level_separators_only() {
        assert_eq!(
            tokens("1px solid rgb(1, 2, 3),  url(\"a b.png\")"),
            vec!["1px", " ", "solid", " ", "rgb(1, 2, 3)", ",", "  ", "url(\"a b.png\")"]
        );
    }

    #[test]
    fn non_paint_values_are_left_alone() {
        assert_eq!(repaint("border-color", "transparent"), None);
        assert_eq!(repaint("color", "inherit"), None);
        assert_eq!(repaint("color", "var(--fg)"), None);
    }
}
