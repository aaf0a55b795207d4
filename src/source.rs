//! Normalized character stream over a param file or an in-memory buffer.
//!
//! Every line terminator and every other whitespace character comes out as a
//! single `' '`, and `#` starts a comment that runs to the end of the line.

use crate::error::LexError;
use crate::utils::{get_line_and_column, named_source};
use miette::NamedSource;
use std::str::CharIndices;

/// Name reported in diagnostics for input that did not come from a file.
pub const BUFFER_SOURCE_NAME: &str = "<buffer>";

pub struct CharSource<'a> {
    name: String,
    text: &'a str,
    chars: CharIndices<'a>,
    pushback: Option<(usize, char)>,
    in_comment: bool,
    offset: usize,
}

impl<'a> CharSource<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::with_name(text, BUFFER_SOURCE_NAME)
    }

    pub fn with_name(text: &'a str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text,
            chars: text.char_indices(),
            pushback: None,
            in_comment: false,
            offset: 0,
        }
    }

    /// Returns the next normalized character, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<char>, LexError> {
        if let Some((offset, ch)) = self.pushback.take() {
            self.offset = offset;
            return Ok(Some(ch));
        }

        while let Some((offset, ch)) = self.chars.next() {
            if ch == '\n' {
                self.in_comment = false;
                self.offset = offset;
                return Ok(Some(' '));
            }
            if ch == '#' {
                self.in_comment = true;
            }
            if self.in_comment {
                continue;
            }

            self.offset = offset;
            if ch.is_whitespace() {
                return Ok(Some(' '));
            }
            if ch.is_control() {
                let (line, column) = get_line_and_column(self.text, offset);
                return Err(LexError::NonPrintableCharacter {
                    src: self.named_source(),
                    span: (offset, ch.len_utf8()).into(),
                    codepoint: ch as u32,
                    line,
                    column,
                });
            }
            return Ok(Some(ch));
        }
        self.offset = self.text.len();
        Ok(None)
    }

    /// Puts `ch` back so the following `next` returns it again.
    ///
    /// Only one character can be held; a second call before `next` replaces it.
    pub fn unget(&mut self, ch: char) {
        self.pushback = Some((self.offset, ch));
    }

    /// Byte offset of the character most recently returned by `next`.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn named_source(&self) -> NamedSource<String> {
        named_source(&self.name, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(text: &str) -> String {
        let mut source = CharSource::new(text);
        let mut out = String::new();
        while let Some(ch) = source.next().unwrap() {
            out.push(ch);
        }
        out
    }

    #[test]
    fn test_whitespace_becomes_spaces() {
        assert_eq!(drain("a\tb\r\nc"), "a b  c");
    }

    #[test]
    fn test_comments_are_stripped_to_end_of_line() {
        assert_eq!(drain("a = 1; # trailing\nb"), "a = 1;  b");
        assert_eq!(drain("# whole line\n# another\nx"), "  x");
    }

    #[test]
    fn test_control_characters_inside_comments_are_ignored() {
        assert_eq!(drain("# \u{7}bell\nok"), " ok");
    }

    #[test]
    fn test_non_printable_character_is_an_error() {
        let mut source = CharSource::new("ab\ncd\u{1}");
        for _ in 0..5 {
            source.next().unwrap();
        }
        match source.next() {
            Err(LexError::NonPrintableCharacter {
                codepoint, line, ..
            }) => {
                assert_eq!(codepoint, 1);
                assert_eq!(line, 2);
            }
            other => panic!("expected NonPrintableCharacter, got {other:?}"),
        }
    }

    #[test]
    fn test_unget_returns_character_again() {
        let mut source = CharSource::new("xy");
        assert_eq!(source.next().unwrap(), Some('x'));
        source.unget('x');
        assert_eq!(source.next().unwrap(), Some('x'));
        assert_eq!(source.next().unwrap(), Some('y'));
        assert_eq!(source.next().unwrap(), None);
    }

    #[test]
    fn test_non_ascii_text_passes_through() {
        assert_eq!(drain("\"größe\""), "\"größe\"");
    }
}
