//! Markup rewrites for the layout rendering: image placeholders, inline
//! styles and `<style>` elements.
//!
//! Markup goes through html5ever, so the output is always a full serialized
//! document, with `<html>`, `<head>` and `<body>` filled in for fragments.

use crate::declarations::normalize_declarations;
use crate::paint::FOREGROUND_PAINT;
use crate::stylesheet::normalize;
use core::cell::RefCell;
use html5ever::serialize::{SerializeOpts, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink as _};
use html5ever::{Attribute, LocalName, Namespace, ParseOpts, QualName, parse_document};
use log::{debug, warn};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::rc::Rc;

/// Placeholder size used when an image carries no usable width or height.
pub const DEFAULT_IMAGE_SIZE: u32 = 100;

fn parse(html: &str) -> RcDom {
    parse_document(RcDom::default(), ParseOpts::default()).one(html)
}

fn to_html(dom: &RcDom) -> String {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..SerializeOpts::default()
    };
    if let Err(err) = serialize(&mut bytes, &SerializableHandle::from(Rc::clone(&dom.document)), opts) {
        warn!("failed to serialize normalized markup: {err}");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn attribute<'node>(attrs: &'node [Attribute], name: &str) -> Option<&'node str> {
    attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| &*attr.value)
}

fn new_attribute(name: &str, value: impl Into<String>) -> Attribute {
    Attribute {
        name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
        value: StrTendril::from(value.into()),
    }
}

fn pixel_size(value: Option<&str>) -> u32 {
    value
        .map(|raw| raw.trim().trim_end_matches("px").trim())
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|size| size.is_finite() && *size > 0.0)
        .map_or(DEFAULT_IMAGE_SIZE, |size| size.round() as u32)
}

/// A `<div>` with the image's footprint, in the image's namespace.
fn placeholder_for(image: &QualName, attrs: &[Attribute]) -> Handle {
    let width = pixel_size(attribute(attrs, "width"));
    let height = pixel_size(attribute(attrs, "height"));
    let mut block = Vec::with_capacity(6);
    for name in ["id", "class"] {
        if let Some(value) = attribute(attrs, name) {
            block.push(new_attribute(name, value));
        }
    }
    block.push(new_attribute("data-original-width", width.to_string()));
    block.push(new_attribute("data-original-height", height.to_string()));
    if let Some(src) = attribute(attrs, "src") {
        block.push(new_attribute("data-original-src", src));
    }
    block.push(new_attribute(
        "style",
        format!("display:inline-block;width:{width}px;height:{height}px;background:{FOREGROUND_PAINT}"),
    ));
    Node::new(NodeData::Element {
        name: QualName::new(None, image.ns.clone(), LocalName::from("div")),
        attrs: RefCell::new(block),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

/// Swaps every `<img>` below `node` for its placeholder.
fn replace_images(node: &Handle) -> usize {
    let mut replaced = 0;
    let mut children = node.children.borrow_mut();
    for child in children.iter_mut() {
        let placeholder = match &child.data {
            NodeData::Element { name, attrs, .. } if &*name.local == "img" => {
                placeholder_for(name, &attrs.borrow())
            }
            _ => {
                replaced += replace_images(child);
                continue;
            }
        };
        placeholder.parent.set(Some(Rc::downgrade(node)));
        *child = placeholder;
        replaced += 1;
    }
    replaced
}

/// Repaints `style` attributes and `<style>` element bodies below `node`.
fn repaint_styles(node: &Handle) -> usize {
    let mut changed = 0;
    if let NodeData::Element { name, attrs, .. } = &node.data {
        for attr in attrs.borrow_mut().iter_mut() {
            if &*attr.name.local != "style" {
                continue;
            }
            let (rewritten, count) = normalize_declarations(&attr.value);
            if count > 0 {
                attr.value = StrTendril::from(rewritten);
                changed += count;
            }
        }
        if &*name.local == "style" {
            for child in node.children.borrow().iter() {
                if let NodeData::Text { contents } = &child.data {
                    let rewritten = normalize(&contents.borrow());
                    *contents.borrow_mut() = StrTendril::from(rewritten);
                    changed += 1;
                }
            }
        }
    }
    for child in node.children.borrow().iter() {
        changed += repaint_styles(child);
    }
    changed
}

/// Replaces every `<img>` with a black block of the image's declared size.
///
/// The block keeps the image's `id` and `class` so selector-based layout rules
/// still apply, and records the original size (and source) as `data-original-*`
/// attributes. Images without a numeric `width`/`height` get
/// [`DEFAULT_IMAGE_SIZE`] pixels in that dimension.
pub fn replace_images_for_layout(html: &str) -> String {
    let dom = parse(html);
    let replaced = replace_images(&dom.document);
    debug!("replaced {replaced} images with layout placeholders");
    to_html(&dom)
}

/// Applies the stylesheet colour rewrite to every `style="..."` attribute
/// and every `<style>` element.
pub fn normalize_inline_styles(html: &str) -> String {
    let dom = parse(html);
    let changed = repaint_styles(&dom.document);
    debug!("repainted {changed} inline style declarations and style elements");
    to_html(&dom)
}

/// Full markup rewrite for the layout rendering: styles are repainted first,
/// then images become placeholders.
pub fn normalize_html(html: &str) -> String {
    let dom = parse(html);
    let changed = repaint_styles(&dom.document);
    let replaced = replace_images(&dom.document);
    debug!("layout markup: {changed} style rewrites, {replaced} image placeholders");
    to_html(&dom)
}
