//! Structure-only rewrite of a submission.
//!
//! [`normalize`] repaints a stylesheet so that backgrounds are white and
//! everything drawn on top of them (text, borders, outlines, shadows) is black.
//! [`normalize_html`] applies the same repaint to inline `style` attributes and
//! `<style>` elements, and swaps images for black blocks of the same footprint.
//! Rendering the result leaves a black-on-white silhouette of the page's layout.
//!
//! Stylesheets are walked with cssparser's tokenizer and rewritten in place:
//! only declaration values change, everything else is copied from the source.
//! Markup is parsed and serialized with html5ever.

#![forbid(unsafe_code)]

mod declarations;
mod html;
mod paint;
mod stylesheet;
mod syntax;

pub use declarations::normalize_declarations;
pub use html::{DEFAULT_IMAGE_SIZE, normalize_html, normalize_inline_styles, replace_images_for_layout};
pub use paint::{BACKGROUND_PAINT, FOREGROUND_PAINT, PaintFamily, classify};
pub use stylesheet::normalize;
