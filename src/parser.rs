// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recursive-descent parser for LVM2's text metadata.
//!
//! The grammar is small:
//!
//! ```text
//! document := entry*
//! entry    := IDENT ( '{' document '}' | '=' rvalue )
//! rvalue   := IDENT | STRING | '[' (scalar (',' scalar)*)? ']'
//! ```
//!
//! Parsing produces a DOM of three node kinds. Children keep their
//! source order, and duplicate names are admitted here; the layout
//! builder rejects them when it maps the DOM onto typed records.

use crate::error::ParseError;
use crate::lexer::{Lexer, Spanned, Token};

/// Maximum section nesting, counting the synthetic root.
pub const MAX_SECTION_DEPTH: u32 = 5;

/// One node of the parsed document.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DomNode {
    /// `name = "scalar"` or `name = 123`
    Value { name: String, value: String },
    /// `name = [scalar, ...]`
    Array { name: String, elements: Vec<String> },
    /// `name { ... }`
    Section(DomSection),
}

impl DomNode {
    pub fn name(&self) -> &str {
        match self {
            DomNode::Value { name, .. } => name,
            DomNode::Array { name, .. } => name,
            DomNode::Section(s) => &s.name,
        }
    }
}

/// A named, ordered list of child nodes. The document root is a
/// section with an empty name.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct DomSection {
    pub name: String,
    pub children: Vec<DomNode>,
}

impl DomSection {
    /// Child section by name, if present exactly as named.
    pub fn section(&self, name: &str) -> Option<&DomSection> {
        self.children.iter().find_map(|c| match c {
            DomNode::Section(s) if s.name == name => Some(s),
            _ => None,
        })
    }

    /// Render the canonical text form: one entry per line, all scalars
    /// quoted. Parsing the result yields an equal DOM.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_children(&self.children, &mut out);
        out
    }
}

fn write_children(children: &[DomNode], out: &mut Vec<u8>) {
    for child in children {
        match child {
            DomNode::Value { name, value } => {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b" = \"");
                out.extend_from_slice(value.as_bytes());
                out.extend_from_slice(b"\"\n");
            }
            DomNode::Array { name, elements } => {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b" = [");
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        out.extend_from_slice(b", ");
                    }
                    out.push(b'"');
                    out.extend_from_slice(e.as_bytes());
                    out.push(b'"');
                }
                out.extend_from_slice(b"]\n");
            }
            DomNode::Section(s) => {
                out.extend_from_slice(s.name.as_bytes());
                out.extend_from_slice(b" {\n");
                write_children(&s.children, out);
                out.extend_from_slice(b"}\n");
            }
        }
    }
}

/// Parse a text-metadata buffer into its DOM.
pub fn parse_text(buf: &[u8]) -> Result<DomSection, ParseError> {
    let tokens: Vec<Spanned<'_>> = Lexer::new(buf).collect();
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: buf.len(),
    };

    let children = parser.entries(0, true)?;
    Ok(DomSection {
        name: String::new(),
        children,
    })
}

struct Parser<'a> {
    tokens: Vec<Spanned<'a>>,
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    // Tokens hold borrowed slices, so handing out copies is cheap and
    // keeps the borrow checker out of the recursive calls below.
    fn next(&mut self) -> Option<Spanned<'a>> {
        let sp = self.tokens.get(self.pos).cloned();
        if sp.is_some() {
            self.pos += 1;
        }
        sp
    }

    fn syntax(at: usize, message: String) -> ParseError {
        ParseError::Syntax { at, message }
    }

    // Parse the body of a section at the given nesting depth; the root
    // body is depth 0 and ends at end-of-input instead of '}'.
    fn entries(&mut self, depth: u32, is_root: bool) -> Result<Vec<DomNode>, ParseError> {
        let mut children = Vec::new();

        loop {
            let Some(sp) = self.next() else {
                if is_root {
                    return Ok(children);
                }
                return Err(Self::syntax(
                    self.end,
                    "unexpected end of input inside a section".to_string(),
                ));
            };
            let at = sp.at;

            let name = match &sp.token {
                Token::CurlyClose if !is_root => return Ok(children),
                Token::Ident(name) => String::from_utf8_lossy(name).into_owned(),
                other => {
                    let msg = format!("expected identifier, found {}", other.describe());
                    return Err(Self::syntax(at, msg));
                }
            };

            let Some(sp) = self.next() else {
                return Err(Self::syntax(
                    self.end,
                    format!("expected '{{' or '=' after \"{name}\""),
                ));
            };
            match &sp.token {
                Token::CurlyOpen => {
                    if depth + 1 >= MAX_SECTION_DEPTH {
                        return Err(ParseError::DepthExceeded);
                    }
                    let body = self.entries(depth + 1, false)?;
                    children.push(DomNode::Section(DomSection {
                        name,
                        children: body,
                    }));
                }
                Token::Equals => {
                    children.push(self.rvalue(name)?);
                }
                other => {
                    let msg = format!(
                        "expected '{{' or '=' after \"{name}\", found {}",
                        other.describe()
                    );
                    return Err(Self::syntax(sp.at, msg));
                }
            }
        }
    }

    fn rvalue(&mut self, name: String) -> Result<DomNode, ParseError> {
        let Some(sp) = self.next() else {
            return Err(Self::syntax(
                self.end,
                format!("expected value after \"{name} =\""),
            ));
        };
        match &sp.token {
            Token::Ident(v) | Token::Str(v) => Ok(DomNode::Value {
                name,
                value: String::from_utf8_lossy(v).into_owned(),
            }),
            Token::BracketOpen => {
                let elements = self.array_elements()?;
                Ok(DomNode::Array { name, elements })
            }
            other => Err(Self::syntax(
                sp.at,
                format!("expected value, found {}", other.describe()),
            )),
        }
    }

    // Arrays contain only scalars; no trailing comma.
    fn array_elements(&mut self) -> Result<Vec<String>, ParseError> {
        let mut elements = Vec::new();

        loop {
            let Some(sp) = self.next() else {
                return Err(Self::syntax(
                    self.end,
                    "unexpected end of input inside an array".to_string(),
                ));
            };
            match &sp.token {
                Token::BracketClose if elements.is_empty() => return Ok(elements),
                Token::Ident(v) | Token::Str(v) => {
                    elements.push(String::from_utf8_lossy(v).into_owned());
                }
                other => {
                    return Err(Self::syntax(
                        sp.at,
                        format!("expected array element, found {}", other.describe()),
                    ));
                }
            }

            let Some(sp) = self.next() else {
                return Err(Self::syntax(
                    self.end,
                    "unexpected end of input inside an array".to_string(),
                ));
            };
            match &sp.token {
                Token::BracketClose => return Ok(elements),
                Token::Comma => {}
                other => {
                    return Err(Self::syntax(
                        sp.at,
                        format!("expected ',' or ']', found {}", other.describe()),
                    ));
                }
            }
        }
    }
}
