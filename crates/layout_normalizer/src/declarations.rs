//! Declaration-list rewriting shared by stylesheet blocks and `style` attributes.

use crate::paint::repaint;
use crate::syntax::{components, split_semicolons};
use cssparser::Token;

/// Splits a value into its body and a trailing `!important` (with the bang).
fn split_important(value: &str) -> (&str, &str) {
    let mut bang = None;
    let mut important = false;
    for component in components(value) {
        match &component.token {
            Token::Delim('!') => {
                bang = Some(component.start);
                important = false;
            }
            Token::WhiteSpace(_) | Token::Comment(_) => {}
            Token::Ident(name) if bang.is_some() && !important && name.eq_ignore_ascii_case("important") => {
                important = true;
            }
            _ => bang = None,
        }
    }
    match bang {
        Some(offset) if important => value.split_at(offset),
        _ => (value, ""),
    }
}

/// Rewrites one `property: value` item, preserving surrounding whitespace.
fn rewrite_item(item: &str) -> Option<String> {
    let colon = components(item)
        .into_iter()
        .find(|component| component.token == Token::Colon)?;
    let raw_property = &item[..colon.start];
    let property = raw_property.trim().to_ascii_lowercase();
    if property.is_empty() {
        return None;
    }
    let (body, important) = split_important(&item[colon.end()..]);
    let core = body.trim();
    if core.is_empty() {
        return None;
    }
    let lead = &body[..body.len() - body.trim_start().len()];
    let trail = &body[body.trim_end().len()..];
    let repainted = repaint(&property, core)?;
    Some(format!("{raw_property}:{lead}{repainted}{trail}{important}"))
}

/// Rewrites a `;`-separated declaration list.
///
/// Returns the rewritten list and how many declarations changed. Items without
/// a colon, with an empty value, or with a pass-through property are kept
/// byte-for-byte.
pub fn normalize_declarations(block: &str) -> (String, usize) {
    let mut changed = 0;
    let items: Vec<String> = split_semicolons(block)
        .into_iter()
        .map(|item| {
            rewrite_item(item).map_or_else(
                || item.to_owned(),
                |rewritten| {
                    changed += 1;
                    rewritten
                },
            )
        })
        .collect();
    (items.join(";"), changed)
}
