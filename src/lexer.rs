use crate::error::LexError;
use crate::source::CharSource;
use crate::utils::get_line_and_column;

/// Largest token, in bytes, the parser accepts unless told otherwise.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 256;

/// Represents the different kinds of tokens that the lexer can produce.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    /// Represents the end of the input.
    Eof,
    /// A bare word made of ASCII letters, digits, `_`, `-` and `.`.
    /// Used for keys and for unquoted values. Examples: `port`, `-1.5e3`, `a.b`.
    Identifier,
    /// A string literal, enclosed in double quotes.
    /// A backslash keeps the following quote from closing the string and is
    /// itself kept in the token text.
    String,
    /// A parenthesized cast such as `(int)`. The text is kept but has no meaning yet.
    Cast,
    /// Semicolon: `;`
    EndStatement,
    /// Equals: `=`
    Assign,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Left Brace: `{`
    LBrace,
    /// Right Brace: `}`
    RBrace,
    /// Comma: `,`
    Comma,
}

/// A token with its kind, text and position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: String, pos_start: usize, pos_end: usize) -> Token {
        Token {
            kind,
            text,
            pos_start,
            pos_end,
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

pub struct Lexer<'a> {
    source: CharSource<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            source: CharSource::new(input),
        }
    }

    pub fn from_source(source: CharSource<'a>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &CharSource<'a> {
        &self.source
    }

    /// Tokenizes the whole input with the default token limit, `Eof` included.
    pub fn lex(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(DEFAULT_MAX_TOKEN_LEN)?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    /// Reads the next token. Tokens whose text would reach `limit` bytes are rejected.
    pub fn next_token(&mut self, limit: usize) -> Result<Token, LexError> {
        let first = loop {
            match self.source.next()? {
                Some(' ') => continue,
                other => break other,
            }
        };

        let start = self.source.position();
        let Some(first) = first else {
            return Ok(Token::new(TokenKind::Eof, "EOF".to_string(), start, start));
        };

        let structural = match first {
            ';' => Some(TokenKind::EndStatement),
            '=' => Some(TokenKind::Assign),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = structural {
            return Ok(Token::new(
                kind,
                first.to_string(),
                start,
                start + first.len_utf8(),
            ));
        }

        let (kind, terminator, escape) = match first {
            '"' => (TokenKind::String, Some('"'), Some('\\')),
            '(' => (TokenKind::Cast, Some(')'), None),
            c if is_identifier_char(c) => (TokenKind::Identifier, None, None),
            c => {
                let (line, column) = get_line_and_column(self.source.text(), start);
                return Err(LexError::UnexpectedCharacter {
                    src: self.source.named_source(),
                    span: (start, c.len_utf8()).into(),
                    found: c,
                    line,
                    column,
                });
            }
        };

        let mut text = String::new();
        if kind == TokenKind::Identifier {
            text.push(first);
        }
        let mut end = start + first.len_utf8();
        let mut prev: Option<char> = None;

        loop {
            let next = self.source.next()?;
            match (kind, next) {
                (TokenKind::Identifier, Some(c)) if !is_identifier_char(c) => {
                    self.source.unget(c);
                    break;
                }
                (TokenKind::Identifier, None) => break,
                (_, None) => {
                    let (line, _) = get_line_and_column(self.source.text(), start);
                    return Err(LexError::UnterminatedToken {
                        src: self.source.named_source(),
                        span: (start, end - start).into(),
                        expected: terminator.unwrap_or(' '),
                        line,
                    });
                }
                (_, Some(c)) => {
                    end = self.source.position() + c.len_utf8();
                    let escaped = escape.is_some() && prev == escape;
                    if Some(c) == terminator && !escaped {
                        break;
                    }
                    prev = Some(c);
                    text.push(c);
                    if text.len() >= limit {
                        let (line, _) = get_line_and_column(self.source.text(), start);
                        return Err(LexError::TokenTooLarge {
                            src: self.source.named_source(),
                            span: (start, end - start).into(),
                            limit,
                            line,
                        });
                    }
                }
            }
        }

        Ok(Token::new(kind, text, start, end))
    }
}
