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

use failure::{Backtrace, Context, Fail};
use std::{
    convert::From,
    fmt::{self, Display},
};

/// A location in map source text. Lines and columns start at 1; columns count characters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Position {
        Position { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A fatal error which aborts parsing of the whole map.
#[derive(Debug)]
pub struct ParseError {
    inner: Context<ParseErrorKind>,
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        self.inner.get_context().clone()
    }

    pub fn position(&self) -> Position {
        self.inner.get_context().position()
    }

    pub fn is_lexical(&self) -> bool {
        self.inner.get_context().is_lexical()
    }

    pub fn is_structural(&self) -> bool {
        !self.is_lexical()
    }
}

impl From<ParseErrorKind> for ParseError {
    fn from(kind: ParseErrorKind) -> Self {
        ParseError {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ParseErrorKind>> for ParseError {
    fn from(inner: Context<ParseErrorKind>) -> Self {
        ParseError { inner }
    }
}

impl Fail for ParseError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ParseErrorKind {
    #[fail(display = "{}: unterminated quoted string", position)]
    UnterminatedString { position: Position },
    #[fail(display = "{}: invalid number literal '{}'", position, literal)]
    InvalidNumber { position: Position, literal: String },
    #[fail(display = "{}: {}", position, message)]
    Structural { position: Position, message: String },
}

impl ParseErrorKind {
    pub fn structural<S>(position: Position, message: S) -> ParseErrorKind
    where
        S: Into<String>,
    {
        ParseErrorKind::Structural {
            position,
            message: message.into(),
        }
    }

    pub fn position(&self) -> Position {
        match *self {
            ParseErrorKind::UnterminatedString { position } => position,
            ParseErrorKind::InvalidNumber { position, .. } => position,
            ParseErrorKind::Structural { position, .. } => position,
        }
    }

    /// Returns true for errors raised while splitting the text into tokens.
    pub fn is_lexical(&self) -> bool {
        match *self {
            ParseErrorKind::UnterminatedString { .. } | ParseErrorKind::InvalidNumber { .. } => {
                true
            }
            ParseErrorKind::Structural { .. } => false,
        }
    }
}
