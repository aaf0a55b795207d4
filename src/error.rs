use crate::tree::ElementKind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ParamError {
    #[error("could not open param file {}", path.display())]
    #[diagnostic(code(param::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] ParserError),

    #[error("could not find key {key}")]
    #[diagnostic(code(param::key_not_found))]
    KeyNotFound { key: String },

    #[error("key {key} is not {expected}")]
    #[diagnostic(code(param::type_mismatch))]
    TypeMismatch { key: String, expected: ElementKind },

    #[error("key \"{key}\" (\"{value}\") did not cast properly to {target}")]
    #[diagnostic(code(param::cast))]
    Cast {
        key: String,
        value: String,
        target: &'static str,
    },

    #[error("got params from server {got} while bound to server {expected}")]
    #[diagnostic(code(param::foreign_server))]
    ForeignServer { expected: i64, got: i64 },

    #[error("update {received} is not newer than {current}")]
    #[diagnostic(code(param::stale_update))]
    StaleUpdate { received: i64, current: i64 },

    #[error("no parameters received from the param server after {attempts} requests")]
    #[diagnostic(
        code(param::bootstrap_timeout),
        help("Is a param server running and publishing on the update channel?")
    )]
    BootstrapTimeout { attempts: u32 },

    #[error("transport failure: {message}")]
    #[diagnostic(code(param::transport))]
    Transport { message: String },
}

impl ParamError {
    pub(crate) fn key_not_found(key: &str) -> Self {
        ParamError::KeyNotFound {
            key: key.to_string(),
        }
    }

    pub(crate) fn type_mismatch(key: &str, expected: ElementKind) -> Self {
        ParamError::TypeMismatch {
            key: key.to_string(),
            expected,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum LexError {
    #[error("non-printable character 0x{codepoint:02x} at line {line}, column {column}")]
    #[diagnostic(
        code(lexer::non_printable_character),
        help("Only printable characters and whitespace may appear outside of comments.")
    )]
    NonPrintableCharacter {
        #[source_code]
        src: NamedSource<String>,
        #[label("this character")]
        span: SourceSpan,
        codepoint: u32,
        line: usize,
        column: usize,
    },

    #[error("unexpected character '{found}' at line {line}, column {column}")]
    #[diagnostic(
        code(lexer::unexpected_character),
        help("A token starts with a letter, digit, '_', '-', '.', '\"', '(' or one of ; = [ ] {{ }} ,")
    )]
    UnexpectedCharacter {
        #[source_code]
        src: NamedSource<String>,
        #[label("no token starts with this character")]
        span: SourceSpan,
        found: char,
        line: usize,
        column: usize,
    },

    #[error("token is too large for buffer ({limit} bytes) at line {line}")]
    #[diagnostic(code(lexer::token_too_large))]
    TokenTooLarge {
        #[source_code]
        src: NamedSource<String>,
        #[label("token starts here")]
        span: SourceSpan,
        limit: usize,
        line: usize,
    },

    #[error("expected '{expected}' but got end of input")]
    #[diagnostic(
        code(lexer::unterminated_token),
        help("Quoted strings and casts must be closed before the input ends.")
    )]
    UnterminatedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("this token is never closed")]
        span: SourceSpan,
        expected: char,
        line: usize,
    },
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParserError {
    #[error("unexpected token \"{found}\" at line {line}, column {column}, expected {expected}")]
    #[diagnostic(
        code(parser::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("unexpected end of input, expected {expected}")]
    #[diagnostic(
        code(parser::unexpected_eof),
        help("The input ended unexpectedly. The parser expected more tokens.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("Input ended here")]
        span: SourceSpan,
        expected: String,
    },
}
