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

//! Brush faces and convex solid construction.

pub mod build;
pub mod texture;

use cgmath::{Vector2, Vector3};

use crate::{
    math::{DegeneratePlane, Hyperplane},
    parse::Position,
};

pub use self::{
    build::{build_brush, BuiltBrush, BuiltFace, Diagnostic},
    texture::{NoTextures, TexAlignment, TextureInfo, TextureLookup},
};

/// Optional trailing surface attributes written by Quake 2 style editors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SurfaceExtras {
    pub contents: i32,
    pub flags: i32,
    pub value: i32,
}

/// A single bounding plane of a brush together with its texture attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// The three defining points, in the order they appear in the source.
    pub points: [Vector3<f64>; 3],

    /// The plane through `points`, normal facing out of the brush.
    pub plane: Hyperplane,

    pub texture: String,
    pub alignment: TexAlignment,

    /// Texture rotation in degrees.
    pub rotation: f64,
    pub scale: Vector2<f64>,
    pub extras: Option<SurfaceExtras>,

    /// Where the face record starts in the source.
    pub position: Position,
}

impl Face {
    /// Creates a face with default texture alignment from three points in map winding order.
    pub fn from_points<S>(
        points: [Vector3<f64>; 3],
        texture: S,
        epsilon: f64,
    ) -> Result<Face, DegeneratePlane>
    where
        S: Into<String>,
    {
        let plane = Hyperplane::from_points(points[0], points[1], points[2], epsilon)?;
        Ok(Face::with_plane(points, plane, texture.into()))
    }

    /// Creates a face with default texture alignment lying in `plane`.
    pub fn from_plane<S>(plane: Hyperplane, texture: S) -> Face
    where
        S: Into<String>,
    {
        Face::with_plane(plane.points(), plane, texture.into())
    }

    fn with_plane(points: [Vector3<f64>; 3], plane: Hyperplane, texture: String) -> Face {
        Face {
            points,
            plane,
            texture,
            alignment: TexAlignment::Standard {
                offset: Vector2::new(0.0, 0.0),
            },
            rotation: 0.0,
            scale: Vector2::new(1.0, 1.0),
            extras: None,
            position: Position::default(),
        }
    }

    /// Computes texture coordinates, in texels, for a point on this face.
    pub fn texel_coords(&self, point: Vector3<f64>) -> Vector2<f64> {
        self.alignment
            .project(point, self.plane.normal(), self.rotation, self.scale)
    }
}

/// A problem with a single brush record that aborted parsing of its remaining faces.
#[derive(Clone, Debug, PartialEq, Fail)]
pub enum BrushError {
    #[fail(
        display = "{}: face {} has collinear or coincident points",
        position, face
    )]
    DegenerateFace { face: usize, position: Position },
    #[fail(display = "{}: malformed face {}: {}", position, face, message)]
    MalformedFace {
        face: usize,
        message: String,
        position: Position,
    },
}

impl BrushError {
    pub fn position(&self) -> Position {
        match *self {
            BrushError::DegenerateFace { position, .. } => position,
            BrushError::MalformedFace { position, .. } => position,
        }
    }

    /// Index of the face record that failed.
    pub fn face(&self) -> usize {
        match *self {
            BrushError::DegenerateFace { face, .. } => face,
            BrushError::MalformedFace { face, .. } => face,
        }
    }
}
