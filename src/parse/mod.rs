// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Tokenizer for the brace-delimited map text format.

pub mod error;
pub mod map;

use std::borrow::Cow;

use cgmath::Vector3;
use nom::{
    character::complete::{space0, space1},
    combinator::all_consuming,
    number::complete::{double, recognize_float},
    sequence::{delimited, preceded, tuple},
    IResult,
};

pub use self::{
    error::{ParseError, ParseErrorKind, Position},
    map::{MapParser, RawBrush, RawEntity},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Quoted,
    Word,
    Number,
    Eof,
}

impl TokenKind {
    fn punctuation(c: char) -> Option<TokenKind> {
        match c {
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '[' => Some(TokenKind::OpenBracket),
            ']' => Some(TokenKind::CloseBracket),
            _ => None,
        }
    }
}

/// A lexical token. `text` holds the unquoted, unescaped contents of quoted strings and the raw
/// source text of everything else.
#[derive(Clone, Debug, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: Cow<'a, str>,
    pub position: Position,
}

impl<'a> Token<'a> {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Converts a `Number` token to its value.
    ///
    /// Literals that overflow to infinity are rejected with `InvalidNumber`.
    pub fn to_f64(&self) -> Result<f64, ParseError> {
        match self.text.parse::<f64>() {
            Ok(v) if self.kind == TokenKind::Number && v.is_finite() => Ok(v),
            _ => Err(ParseErrorKind::InvalidNumber {
                position: self.position,
                literal: self.text.to_string(),
            }
            .into()),
        }
    }

    /// A short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_owned(),
            TokenKind::Quoted => format!("quoted string \"{}\"", self.text),
            TokenKind::Word => format!("word '{}'", self.text),
            TokenKind::Number => format!("number '{}'", self.text),
            _ => format!("'{}'", self.text),
        }
    }
}

/// Returns true if `src` is entirely a number literal: optional sign, digits, optional decimal
/// point and optional exponent.
pub fn is_number(src: &str) -> bool {
    let res: IResult<&str, &str> = all_consuming(recognize_float)(src);
    res.is_ok()
}

/// Splits map source text into tokens on demand.
pub struct Tokenizer<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    peeked: Option<Token<'a>>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            src,
            offset: 0,
            line: 1,
            column: 1,
            peeked: None,
        }
    }

    /// Returns the current cursor position.
    pub fn position(&self) -> Position {
        match self.peeked {
            Some(ref t) => t.position,
            None => Position::new(self.line, self.column),
        }
    }

    /// Returns the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<&Token<'a>, ParseError> {
        let token = match self.peeked.take() {
            Some(t) => t,
            None => self.lex()?,
        };

        Ok(self.peeked.get_or_insert(token))
    }

    /// Consumes and returns the next token. At the end of the input this keeps returning `Eof`.
    pub fn next_token(&mut self) -> Result<Token<'a>, ParseError> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lex(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.offset..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }

                // line comment
                Some('/') if self.rest().starts_with("//") => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }

                _ => break,
            }
        }
    }

    fn lex(&mut self) -> Result<Token<'a>, ParseError> {
        self.skip_whitespace();

        let position = Position::new(self.line, self.column);
        let start = self.offset;

        let c = match self.peek_char() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    text: Cow::Borrowed(""),
                    position,
                })
            }
        };

        if let Some(kind) = TokenKind::punctuation(c) {
            self.bump();
            return Ok(Token {
                kind,
                text: Cow::Borrowed(&self.src[start..self.offset]),
                position,
            });
        }

        if c == '"' {
            return self.lex_quoted(position);
        }

        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == '"' || TokenKind::punctuation(c).is_some() {
                break;
            }
            self.bump();
        }

        let text = &self.src[start..self.offset];
        let kind = if is_number(text) {
            TokenKind::Number
        } else {
            TokenKind::Word
        };

        Ok(Token {
            kind,
            text: Cow::Borrowed(text),
            position,
        })
    }

    fn lex_quoted(&mut self, position: Position) -> Result<Token<'a>, ParseError> {
        // opening quote
        self.bump();

        let start = self.offset;
        let mut escaped = false;

        loop {
            match self.bump() {
                None => return Err(ParseErrorKind::UnterminatedString { position }.into()),
                Some('\\') if self.peek_char() == Some('"') => {
                    self.bump();
                    escaped = true;
                }
                Some('"') => break,
                Some(_) => (),
            }
        }

        // exclude the closing quote
        let contents = &self.src[start..self.offset - 1];
        let text = if escaped {
            Cow::Owned(contents.replace("\\\"", "\""))
        } else {
            Cow::Borrowed(contents)
        };

        Ok(Token {
            kind: TokenKind::Quoted,
            text,
            position,
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    /// Yields tokens up to, but not including, `Eof`. A lexical error ends the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(ref t) if t.is(TokenKind::Eof) => None,
            Ok(t) => Some(Ok(t)),
            Err(e) => {
                // skip to the end so the error is reported once
                self.offset = self.src.len();
                Some(Err(e))
            }
        }
    }
}

/// Parses a vector property value of the form `"x y z"`, e.g. an entity's `origin`.
pub fn vector3<S>(src: S) -> Option<Vector3<f64>>
where
    S: AsRef<str>,
{
    let parsed: IResult<&str, (f64, f64, f64)> = all_consuming(delimited(
        space0,
        tuple((double, preceded(space1, double), preceded(space1, double))),
        space0,
    ))(src.as_ref());

    parsed.ok().map(|(_, (x, y, z))| Vector3::new(x, y, z))
}
