use crate::declarations::normalize_declarations;
use crate::syntax::components;
use cssparser::Token;
use log::debug;

/// Rewrites a stylesheet so every colour-bearing declaration paints either
/// white (backgrounds) or black (text, borders, outlines, shadows).
///
/// Rule preludes, property names and all other declarations are returned
/// unchanged. Block at-rules such as `@media` are descended into; an
/// unterminated final block is treated as running to the end of the input.
pub fn normalize(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let changed = normalize_rules(css, &mut out);
    debug!("layout normalization repainted {changed} declarations");
    out
}

fn has_rule_blocks(body: &str) -> bool {
    components(body)
        .iter()
        .any(|component| component.token == Token::CurlyBracketBlock)
}

fn normalize_rules(input: &str, out: &mut String) -> usize {
    let mut changed = 0;
    for component in components(input) {
        let (Token::CurlyBracketBlock, Some(body)) = (&component.token, component.inner) else {
            out.push_str(component.text);
            continue;
        };
        out.push('{');
        if has_rule_blocks(body) {
            changed += normalize_rules(body, out);
        } else {
            let (rewritten, count) = normalize_declarations(body);
            out.push_str(&rewritten);
            changed += count;
        }
        out.push_str(component.closing());
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_queries_are_descended_into() {
        let css = "@media (max-width: 600px) { .nav { background: #eee; border: 1px solid #ccc; } }";
        assert_eq!(
            normalize(css),
            "@media (max-width: 600px) { .nav { background: #ffffff; border: 1px solid #000000; } }"
        );
    }

    #[test]
    fn braces_in_strings_do_not_open_blocks() {
        let css = ".q::before { content: \"{\"; color: teal }";
        assert_eq!(normalize(css), ".q::before { content: \"{\"; color: #000000 }");
    }

    #[test]
    fn comments_and_at_rule_preludes_pass_through() {
        let css = "/* { */ @supports (display: grid) { .g { color: #abc } } @import url(\"a{b}.css\");";
        assert_eq!(
            normalize(css),
            "/* { */ @supports (display: grid) { .g { color: #000000 } } @import url(\"a{b}.css\");"
        );
    }

    #[test]
    fn unterminated_block_is_kept() {
        assert_eq!(normalize(".x { color: red"), ".x { color: #000000");
    }
}
