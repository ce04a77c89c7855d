// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tokenizer for LVM2's text metadata.
//!
//! Produces reserved one-byte punctuation, quoted strings (quotes
//! stripped, no escape processing), and identifier runs. Whitespace
//! and `#` comments are consumed silently. Numbers are identifiers at
//! this level; the layout builder converts them when a key calls for
//! an integer.

/// Reserved punctuation and scalar tokens. Slices borrow from the
/// input buffer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token<'a> {
    /// `{`
    CurlyOpen,
    /// `}`
    CurlyClose,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// `=`
    Equals,
    /// `,`
    Comma,
    /// A quoted string, like `"foo"`.
    Str(&'a [u8]),
    /// Any other non-reserved run of bytes.
    Ident(&'a [u8]),
}

impl Token<'_> {
    /// Short rendering for syntax-error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::CurlyOpen => "'{'".to_string(),
            Token::CurlyClose => "'}'".to_string(),
            Token::BracketOpen => "'['".to_string(),
            Token::BracketClose => "']'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Comma => "','".to_string(),
            Token::Str(s) => format!("\"{}\"", String::from_utf8_lossy(s)),
            Token::Ident(s) => format!("\"{}\"", String::from_utf8_lossy(s)),
        }
    }
}

/// A token plus the byte offset it starts at.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub at: usize,
}

// NUL counts as whitespace: the on-disk text blob is NUL-terminated
// and the terminator falls inside raw_locn.size.
fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | b'\0')
}

fn is_reserved(c: u8) -> bool {
    matches!(c, b'{' | b'}' | b'[' | b']' | b'=' | b'#' | b',')
}

pub struct Lexer<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(buf: &'a [u8]) -> Lexer<'a> {
        Lexer { buf, cursor: 0 }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Spanned<'a>;

    fn next(&mut self) -> Option<Spanned<'a>> {
        loop {
            let c = *self.buf.get(self.cursor)?;

            if is_space(c) {
                self.cursor += 1;
                continue;
            }

            if c == b'#' {
                while self
                    .buf
                    .get(self.cursor)
                    .is_some_and(|&b| b != b'\r' && b != b'\n')
                {
                    self.cursor += 1;
                }
                continue;
            }

            let at = self.cursor;

            if c == b'"' {
                let start = at + 1;
                let mut end = start;
                while self.buf.get(end).is_some_and(|&b| b != b'"') {
                    end += 1;
                }
                if end >= self.buf.len() {
                    // Unterminated string: behave like end of input.
                    self.cursor = end;
                    return None;
                }
                self.cursor = end + 1;
                return Some(Spanned {
                    token: Token::Str(&self.buf[start..end]),
                    at,
                });
            }

            if is_reserved(c) {
                self.cursor += 1;
                let token = match c {
                    b'{' => Token::CurlyOpen,
                    b'}' => Token::CurlyClose,
                    b'[' => Token::BracketOpen,
                    b']' => Token::BracketClose,
                    b'=' => Token::Equals,
                    _ => Token::Comma,
                };
                return Some(Spanned { token, at });
            }

            let mut end = at + 1;
            while self
                .buf
                .get(end)
                .is_some_and(|&b| !is_space(b) && !is_reserved(b) && b != b'"')
            {
                end += 1;
            }
            self.cursor = end;
            return Some(Spanned {
                token: Token::Ident(&self.buf[at..end]),
                at,
            });
        }
    }
}
