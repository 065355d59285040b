//! Top-level component values over cssparser's tokenizer.
//!
//! Strings, comments and bracketed blocks are single components, so a `;`,
//! `:` or `{` inside any of them never splits the source.

use cssparser::{ParseError, Parser, ParserInput, Token};

#[derive(Debug, Clone)]
pub struct Component<'src> {
    pub token: Token<'src>,
    /// Byte offset of the component in the source.
    pub start: usize,
    /// Source text, through the closing bracket for a block.
    pub text: &'src str,
    /// Text between the brackets when the component opens a block.
    pub inner: Option<&'src str>,
}

impl Component<'_> {
    pub const fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// The closing bracket of a block, empty when the input ended first.
    pub fn closing(&self) -> &str {
        self.inner
            .and_then(|inner| self.text.get(1..)?.strip_prefix(inner))
            .unwrap_or_default()
    }
}

const fn opens_block(token: &Token<'_>) -> bool {
    matches!(
        token,
        Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock
    )
}

fn block_contents<'src>(parser: &mut Parser<'src, '_>) -> &'src str {
    parser
        .parse_nested_block(|nested| {
            let start = nested.position();
            while nested.next_including_whitespace_and_comments().is_ok() {}
            Ok::<_, ParseError<'src, ()>>(nested.slice_from(start))
        })
        .unwrap_or_default()
}

/// Every top-level component of `source`, whitespace and comments included.
/// Concatenating the texts reproduces the source.
pub fn components(source: &str) -> Vec<Component<'_>> {
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);
    let mut out = Vec::new();
    loop {
        let start = parser.position();
        let Ok(token) = parser.next_including_whitespace_and_comments().cloned() else {
            break;
        };
        let inner = opens_block(&token).then(|| block_contents(&mut parser));
        out.push(Component {
            token,
            start: start.byte_index(),
            text: parser.slice_from(start),
            inner,
        });
    }
    out
}

/// Splits `source` at every top-level `;`.
pub fn split_semicolons(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for component in components(source) {
        if component.token == Token::Semicolon {
            parts.push(&source[start..component.start]);
            start = component.end();
        }
    }
    parts.push(&source[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_cover_the_source() {
        let source = r#"a"{"/*}*/b'\''c url(x;y) rgb(1, 2)"#;
        let text: String = components(source).iter().map(|component| component.text).collect();
        assert_eq!(text, source);
    }

    #[test]
    fn blocks_report_their_inner_text() {
        let parts = components("x { a { b } c }");
        let block = parts
            .iter()
            .find(|component| component.token == Token::CurlyBracketBlock);
        assert_eq!(block.and_then(|component| component.inner), Some(" a { b } c "));
        assert_eq!(block.map(Component::closing), Some("}"));

        let open = components("x { a");
        assert_eq!(open.last().map(Component::closing), Some(""));
    }

    #[test]
    fn split_ignores_separators_inside_functions_and_strings() {
        assert_eq!(
            split_semicolons("color: rgb(1, 2, 3); content: ';'"),
            vec!["color: rgb(1, 2, 3)", " content: ';'"]
        );
    }
}
