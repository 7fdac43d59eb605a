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

//! Recursive-descent parser turning map text into entity records.
//!
//! Structural and lexical errors abort the whole document. A malformed or degenerate face only
//! aborts the brush it belongs to: the rest of that brush is skipped and parsing resumes with
//! the next record of the entity.

use std::collections::HashMap;

use crate::{
    brush::{BrushError, Face, SurfaceExtras, TexAlignment},
    map::MapConfig,
    math::Hyperplane,
    parse::{ParseError, ParseErrorKind, Position, Token, TokenKind, Tokenizer},
};

use cgmath::{Vector2, Vector3};

/// A brush as written in the source, before any geometry is derived.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBrush {
    pub position: Position,

    /// Faces in declaration order. If `error` is set, only the faces before the bad record.
    pub faces: Vec<Face>,

    pub error: Option<BrushError>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawEntity {
    pub position: Position,
    pub properties: HashMap<String, String>,
    pub brushes: Vec<RawBrush>,
}

enum FaceError {
    Fatal(ParseError),
    Brush(BrushError),
}

impl From<ParseError> for FaceError {
    fn from(e: ParseError) -> Self {
        FaceError::Fatal(e)
    }
}

pub struct MapParser<'a> {
    tokens: Tokenizer<'a>,
    degenerate_epsilon: f64,
}

impl<'a> MapParser<'a> {
    pub fn new(src: &'a str, config: &MapConfig) -> MapParser<'a> {
        MapParser {
            tokens: Tokenizer::new(src),
            degenerate_epsilon: config.degenerate_epsilon,
        }
    }

    /// Parses every entity in the source, in declaration order.
    pub fn parse_entities(mut self) -> Result<Vec<RawEntity>, ParseError> {
        let mut entities = Vec::new();

        loop {
            let token = self.tokens.next_token()?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::OpenBrace => {
                    let entity = self.parse_entity(token.position)?;
                    entities.push(entity);
                }
                TokenKind::OpenParen => {
                    return Err(ParseErrorKind::structural(
                        token.position,
                        "brush face outside of any entity",
                    )
                    .into())
                }
                _ => {
                    return Err(ParseErrorKind::structural(
                        token.position,
                        format!("expected '{{', found {}", token.describe()),
                    )
                    .into())
                }
            }
        }

        debug!("Parsed {} entities", entities.len());
        Ok(entities)
    }

    fn parse_entity(&mut self, position: Position) -> Result<RawEntity, ParseError> {
        let mut properties = HashMap::new();
        let mut brushes = Vec::new();

        loop {
            let token = self.tokens.next_token()?;
            match token.kind {
                TokenKind::Quoted => {
                    let value = self.tokens.next_token()?;
                    if !value.is(TokenKind::Quoted) {
                        return Err(ParseErrorKind::structural(
                            value.position,
                            format!(
                                "expected value for key \"{}\", found {}",
                                token.text,
                                value.describe()
                            ),
                        )
                        .into());
                    }

                    let key = token.text.into_owned();
                    if let Some(old) = properties.insert(key.clone(), value.text.into_owned()) {
                        debug!(
                            "{}: duplicate key \"{}\" replaces value \"{}\"",
                            token.position, key, old
                        );
                    }
                }

                TokenKind::OpenBrace => {
                    let brush = self.parse_brush(token.position)?;
                    brushes.push(brush);
                }

                TokenKind::CloseBrace => break,

                _ => {
                    return Err(ParseErrorKind::structural(
                        token.position,
                        format!(
                            "expected property, brush or '}}', found {}",
                            token.describe()
                        ),
                    )
                    .into())
                }
            }
        }

        Ok(RawEntity {
            position,
            properties,
            brushes,
        })
    }

    fn parse_brush(&mut self, position: Position) -> Result<RawBrush, ParseError> {
        let mut faces = Vec::new();

        let error = loop {
            let token = self.tokens.next_token()?;
            let result = match token.kind {
                TokenKind::CloseBrace => break None,

                TokenKind::OpenParen => self.parse_face(token.position, faces.len()),

                TokenKind::OpenBrace | TokenKind::Eof => {
                    return Err(unexpected(&token, "brush").into());
                }

                _ => Err(FaceError::Brush(BrushError::MalformedFace {
                    face: faces.len(),
                    message: format!("expected '(' or '}}', found {}", token.describe()),
                    position: token.position,
                })),
            };

            match result {
                Ok(face) => faces.push(face),
                Err(FaceError::Fatal(e)) => return Err(e),
                Err(FaceError::Brush(e)) => {
                    debug!(
                        "Skipping rest of brush at {} after face {}: {}",
                        position,
                        e.face(),
                        e
                    );
                    self.skip_brush()?;
                    break Some(e);
                }
            }
        };

        Ok(RawBrush {
            position,
            faces,
            error,
        })
    }

    /// Consumes tokens through the closing brace of the current brush.
    fn skip_brush(&mut self) -> Result<(), ParseError> {
        loop {
            let token = self.tokens.next_token()?;
            match token.kind {
                TokenKind::CloseBrace => return Ok(()),
                TokenKind::OpenBrace | TokenKind::Eof => {
                    return Err(unexpected(&token, "brush").into())
                }
                _ => (),
            }
        }
    }

    /// Parses a face record. The opening parenthesis of the first point has been consumed.
    fn parse_face(&mut self, position: Position, index: usize) -> Result<Face, FaceError> {
        let p0 = self.point_body(index)?;
        self.expect(TokenKind::OpenParen, index, "'('")?;
        let p1 = self.point_body(index)?;
        self.expect(TokenKind::OpenParen, index, "'('")?;
        let p2 = self.point_body(index)?;

        let texture = self.texture_name(index)?;

        let alignment = if self.tokens.peek_token()?.is(TokenKind::OpenBracket) {
            let (u_axis, u_offset) = self.texture_axis(index)?;
            let (v_axis, v_offset) = self.texture_axis(index)?;
            TexAlignment::Valve {
                u_axis,
                u_offset,
                v_axis,
                v_offset,
            }
        } else {
            let x = self.number(index)?;
            let y = self.number(index)?;
            TexAlignment::Standard {
                offset: Vector2::new(x, y),
            }
        };

        let rotation = self.number(index)?;
        let scale_x = self.number(index)?;
        let scale_y = self.number(index)?;

        // Quake 2 surface trailer
        let extras = if self.tokens.peek_token()?.is(TokenKind::Number) {
            Some(SurfaceExtras {
                contents: self.integer(index)?,
                flags: self.integer(index)?,
                value: self.integer(index)?,
            })
        } else {
            None
        };

        let plane = Hyperplane::from_points(p0, p1, p2, self.degenerate_epsilon).map_err(|_| {
            FaceError::Brush(BrushError::DegenerateFace {
                face: index,
                position,
            })
        })?;

        trace!("{}: face {} on {:?}", position, index, plane);

        Ok(Face {
            points: [p0, p1, p2],
            plane,
            texture,
            alignment,
            rotation,
            scale: Vector2::new(scale_x, scale_y),
            extras,
            position,
        })
    }

    /// Parses `x y z )`.
    fn point_body(&mut self, index: usize) -> Result<Vector3<f64>, FaceError> {
        let x = self.number(index)?;
        let y = self.number(index)?;
        let z = self.number(index)?;
        self.expect(TokenKind::CloseParen, index, "')'")?;
        Ok(Vector3::new(x, y, z))
    }

    /// Parses a Valve 220 texture axis, `[ x y z offset ]`.
    fn texture_axis(&mut self, index: usize) -> Result<(Vector3<f64>, f64), FaceError> {
        self.expect(TokenKind::OpenBracket, index, "'['")?;
        let x = self.number(index)?;
        let y = self.number(index)?;
        let z = self.number(index)?;
        let offset = self.number(index)?;
        self.expect(TokenKind::CloseBracket, index, "']'")?;
        Ok((Vector3::new(x, y, z), offset))
    }

    fn texture_name(&mut self, index: usize) -> Result<String, FaceError> {
        let token = self.tokens.peek_token()?.clone();
        match token.kind {
            TokenKind::Word | TokenKind::Number | TokenKind::Quoted => {
                self.tokens.next_token()?;
                Ok(token.text.into_owned())
            }
            _ => Err(self.mismatch(token, index, "texture name")),
        }
    }

    fn number(&mut self, index: usize) -> Result<f64, FaceError> {
        let token = self.expect(TokenKind::Number, index, "number")?;
        Ok(token.to_f64()?)
    }

    fn integer(&mut self, index: usize) -> Result<i32, FaceError> {
        let token = self.expect(TokenKind::Number, index, "integer")?;
        let value = token.to_f64()?;

        if value.fract() != 0.0 || value < i32::min_value() as f64 || value > i32::max_value() as f64
        {
            return Err(FaceError::Brush(BrushError::MalformedFace {
                face: index,
                message: format!("expected integer, found {}", token.describe()),
                position: token.position,
            }));
        }

        Ok(value as i32)
    }

    /// Consumes the next token if it is of kind `kind`. Otherwise the token is left in place for
    /// `skip_brush`.
    fn expect(
        &mut self,
        kind: TokenKind,
        index: usize,
        what: &str,
    ) -> Result<Token<'a>, FaceError> {
        if self.tokens.peek_token()?.is(kind) {
            return Ok(self.tokens.next_token()?);
        }

        let token = self.tokens.peek_token()?.clone();
        Err(self.mismatch(token, index, what))
    }

    fn mismatch(&self, token: Token, index: usize, what: &str) -> FaceError {
        match token.kind {
            // the brush itself is broken, there is nothing to resync on
            TokenKind::OpenBrace | TokenKind::Eof => {
                FaceError::Fatal(unexpected(&token, "face").into())
            }
            _ => FaceError::Brush(BrushError::MalformedFace {
                face: index,
                message: format!("expected {}, found {}", what, token.describe()),
                position: token.position,
            }),
        }
    }
}

fn unexpected(token: &Token, context: &str) -> ParseErrorKind {
    match token.kind {
        TokenKind::Eof => ParseErrorKind::structural(
            token.position,
            format!("unexpected end of input inside {}", context),
        ),
        _ => ParseErrorKind::structural(
            token.position,
            format!("unexpected {} inside {}", token.describe(), context),
        ),
    }
}
