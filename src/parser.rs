use crate::error::{ParamError, ParserError};
use crate::lexer::{Lexer, Token, TokenKind, DEFAULT_MAX_TOKEN_LEN};
use crate::source::{CharSource, BUFFER_SOURCE_NAME};
use crate::tree::{Element, Tree};
use crate::utils::get_line_and_column;
use std::borrow::Cow;
use std::path::Path;

/// Settings shared by every parse entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Name shown in diagnostics.
    pub source_name: String,
    /// Tokens reaching this many bytes are rejected.
    pub max_token_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            source_name: BUFFER_SOURCE_NAME.to_string(),
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

/// A recursive descent parser for the param format.
///
/// ```text
/// container_body ::= { statement } end_marker
/// statement      ::= IDENT "=" rhs ";" | IDENT "{" container_body("}")
/// rhs            ::= [ CAST ] ( IDENT | STRING | array )
/// array          ::= "[" [ value { "," value } [ "," ] ] "]"
/// value          ::= IDENT | STRING
/// ```
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    max_token_len: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source_text: &'a str) -> Self {
        Self::with_options(source_text, &ParseOptions::default())
    }

    pub fn with_options(source_text: &'a str, options: &ParseOptions) -> Self {
        let source = CharSource::with_name(source_text, options.source_name.clone());
        Self {
            lexer: Lexer::from_source(source),
            max_token_len: options.max_token_len,
        }
    }

    /// Parses the whole input into a tree. Nothing is returned on failure.
    pub fn parse_tree(&mut self) -> Result<Tree, ParamError> {
        let mut root = Element::new_root();
        self.parse_container(&mut root, TokenKind::Eof)?;
        Ok(Tree::from_root(root))
    }

    /// container_body ::= { statement } end_marker
    ///
    /// A child is attached to `container` only once it has been fully parsed.
    fn parse_container(&mut self, container: &mut Element, end: TokenKind) -> Result<(), ParamError> {
        let mut pending_name: Option<String> = None;
        loop {
            let token = self.next_token()?;
            match (pending_name.take(), token.kind) {
                (None, TokenKind::Identifier) => pending_name = Some(token.text),
                (Some(name), TokenKind::Assign) => {
                    let mut child = Element::array(name);
                    self.parse_right_side(&mut child)?;
                    container.push_child(child);
                }
                (Some(name), TokenKind::LBrace) => {
                    let mut child = Element::container(name);
                    self.parse_container(&mut child, TokenKind::RBrace)?;
                    container.push_child(child);
                }
                (None, kind) if kind == end => return Ok(()),
                (Some(_), _) => return self.err_unexpected(&token, "'=' or '{' after a key"),
                (None, _) if end == TokenKind::Eof => {
                    return self.err_unexpected(&token, "a key or end of input")
                }
                (None, _) => return self.err_unexpected(&token, "a key or '}'"),
            }
        }
    }

    /// rhs ::= [ CAST ] ( IDENT | STRING | array ) ";"
    fn parse_right_side(&mut self, element: &mut Element) -> Result<(), ParamError> {
        let mut token = self.next_token()?;

        // Casts are accepted ahead of a value but not interpreted yet.
        if token.kind == TokenKind::Cast {
            token = self.next_token()?;
        }

        match token.kind {
            TokenKind::Identifier | TokenKind::String => element.push_value(token.text),
            TokenKind::LBracket => self.parse_array(element)?,
            _ => return self.err_unexpected(&token, "a value or '['"),
        }

        let token = self.next_token()?;
        if token.kind != TokenKind::EndStatement {
            return self.err_unexpected(&token, "';'");
        }
        Ok(())
    }

    /// array ::= "[" [ value { "," value } [ "," ] ] "]"
    fn parse_array(&mut self, element: &mut Element) -> Result<(), ParamError> {
        loop {
            let token = self.next_token()?;
            match token.kind {
                TokenKind::Identifier | TokenKind::String => element.push_value(token.text),
                TokenKind::RBracket => return Ok(()),
                _ => return self.err_unexpected(&token, "a value or ']'"),
            }

            let token = self.next_token()?;
            match token.kind {
                TokenKind::Comma => {}
                TokenKind::RBracket => return Ok(()),
                _ => return self.err_unexpected(&token, "',' or ']'"),
            }
        }
    }

    // === Tokenizer Helper Methods ===

    fn next_token(&mut self) -> Result<Token, ParamError> {
        Ok(self.lexer.next_token(self.max_token_len)?)
    }

    fn err_unexpected<T>(&self, token: &Token, expected: &str) -> Result<T, ParamError> {
        let source = self.lexer.source();
        if token.kind == TokenKind::Eof {
            return Err(ParserError::UnexpectedEof {
                src: source.named_source(),
                span: (token.pos_start, 0).into(),
                expected: expected.to_string(),
            }
            .into());
        }
        let (line, column) = get_line_and_column(source.text(), token.pos_start);
        Err(ParserError::UnexpectedToken {
            src: source.named_source(),
            span: (token.pos_start, token.pos_end - token.pos_start).into(),
            expected: expected.to_string(),
            found: token.text.clone(),
            line,
            column,
        }
        .into())
    }
}

/// Parses in-memory text with default options.
pub fn parse_str(text: &str) -> Result<Tree, ParamError> {
    Parser::new(text).parse_tree()
}

/// Parses exactly the given bytes; no terminator is looked for.
///
/// Invalid UTF-8 sequences are replaced before tokenizing.
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Tree, ParamError> {
    let text: Cow<'_, str> = String::from_utf8_lossy(bytes);
    Parser::with_options(&text, options).parse_tree()
}

/// Reads and parses a param file. Failing to read it is reported as `ParamError::Io`.
pub fn parse_file(path: impl AsRef<Path>, max_token_len: usize) -> Result<Tree, ParamError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| {
        log::warn!("could not open param file: {}", path.display());
        ParamError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let options = ParseOptions {
        source_name: path.display().to_string(),
        max_token_len,
    };
    parse_bytes(&bytes, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LexError;
    use crate::tree::ElementKind;
    use miette::Report;

    fn parse_ok(source: &str) -> Tree {
        match parse_str(source) {
            Ok(tree) => tree,
            Err(err) => {
                let report = Report::new(err);
                panic!("{:?}", report);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ok("").is_empty());
        assert!(parse_ok("  # nothing here\n").is_empty());
    }

    #[test]
    fn test_simple_assignment() {
        let tree = parse_ok("key = value;");
        let key = tree.find("key", false).unwrap();
        assert_eq!(key.kind(), ElementKind::Array);
        assert_eq!(key.values(), ["value"]);
    }

    #[test]
    fn test_scalar_is_single_element_array() {
        assert_eq!(parse_ok("a = 1;"), parse_ok("a = [1];"));
    }

    #[test]
    fn test_nested_containers() {
        let tree = parse_ok("a { b { c = \"x\"; } d = 2; }");
        let a = tree.find("a", false).unwrap();
        assert_eq!(a.kind(), ElementKind::Container);
        assert_eq!(a.children().len(), 2);
        assert_eq!(tree.find("a.b.c", false).unwrap().values(), ["x"]);
    }

    #[test]
    fn test_cast_is_ignored() {
        assert_eq!(parse_ok("a = (int) 5;"), parse_ok("a = 5;"));
        assert_eq!(
            parse_ok("v = (double) [1, 2];"),
            parse_ok("v = [1, 2];")
        );
    }

    #[test]
    fn test_empty_array() {
        let tree = parse_ok("e = [];");
        let e = tree.find("e", false).unwrap();
        assert_eq!(e.kind(), ElementKind::Array);
        assert!(e.values().is_empty());
    }

    #[test]
    fn test_trailing_comma_in_array() {
        assert_eq!(
            parse_ok("v = [\"a\", \"b\", ];").find("v", false).unwrap().values(),
            ["a", "b"]
        );
    }

    #[test]
    fn test_empty_container() {
        let tree = parse_ok("c { }");
        assert!(tree.find("c", false).unwrap().children().is_empty());
    }

    #[test]
    fn test_missing_closing_bracket() {
        let err = parse_str("a = [1, 2;").unwrap_err();
        match err {
            ParamError::Syntax(ParserError::UnexpectedToken { found, .. }) => assert_eq!(found, ";"),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_str("a = 1 b = 2;").unwrap_err();
        assert!(matches!(
            err,
            ParamError::Syntax(ParserError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_unclosed_container_is_unexpected_eof() {
        let err = parse_str("a { b = 1;").unwrap_err();
        assert!(matches!(
            err,
            ParamError::Syntax(ParserError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_stray_close_brace_at_top_level() {
        assert!(parse_str("a = 1; }").is_err());
    }

    #[test]
    fn test_lex_errors_propagate() {
        let err = parse_str("a = 1;\nb = $;").unwrap_err();
        assert!(matches!(
            err,
            ParamError::Lex(LexError::UnexpectedCharacter { line: 2, .. })
        ));
    }

    #[test]
    fn test_token_limit_from_options() {
        let options = ParseOptions {
            max_token_len: 8,
            ..ParseOptions::default()
        };
        assert!(parse_bytes(b"short = ok;", &options).is_ok());
        let err = parse_bytes(b"k = \"a much longer value\";", &options).unwrap_err();
        assert!(matches!(
            err,
            ParamError::Lex(LexError::TokenTooLarge { limit: 8, .. })
        ));
    }

    #[test]
    fn test_parse_bytes_uses_given_length() {
        let buffer = b"a = 1; b = 2;garbage";
        let tree = parse_bytes(&buffer[..13], &ParseOptions::default()).unwrap();
        assert_eq!(tree.subkeys("").unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file("/definitely/not/here.cfg", DEFAULT_MAX_TOKEN_LEN).unwrap_err();
        assert!(matches!(err, ParamError::Io { .. }));
    }

    #[test]
    fn test_diagnostic_names_source() {
        let options = ParseOptions {
            source_name: "robot.cfg".to_string(),
            ..ParseOptions::default()
        };
        let err = parse_bytes(b"a = ;", &options).unwrap_err();
        let rendered = format!("{:?}", Report::new(err));
        assert!(rendered.contains("robot.cfg"), "{rendered}");
    }
}
