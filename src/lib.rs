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

//! Parsing of brace-delimited id-style map files and reconstruction of their brush geometry.
//!
//! ```no_run
//! use brushwork::{parse_map, MapConfig};
//!
//! # fn main() -> Result<(), brushwork::ParseError> {
//! let map = parse_map("{ \"classname\" \"worldspawn\" }", &MapConfig::default())?;
//! for (entity, brush, diagnostic) in map.diagnostics() {
//!     println!("entity {} brush {}: {}", entity, brush, diagnostic);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unused_must_use)]

extern crate byteorder;
extern crate cgmath;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
extern crate nom;
#[macro_use]
extern crate num_derive;
extern crate num_traits;
extern crate rayon;

#[cfg(test)]
extern crate rand;

pub mod brush;
pub mod map;
pub mod math;
pub mod parse;
pub mod util;
pub mod wad;

pub use crate::{
    brush::{build_brush, BuiltBrush, Diagnostic, Face, TextureInfo, TextureLookup},
    map::{parse_map, parse_map_with_textures, Brush, Entity, Map, MapConfig, MapFormat},
    math::{Bounds, Hyperplane, PointSide},
    parse::{ParseError, ParseErrorKind, Position},
    wad::Wad,
};
