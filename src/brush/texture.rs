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

use std::collections::HashMap;

use cgmath::{InnerSpace, Vector2, Vector3};

lazy_static! {
    /// Texture base axes for standard alignment: face normal, s axis, t axis.
    static ref BASE_AXES: [[Vector3<f64>; 3]; 6] = [
        [Vector3::unit_z(), Vector3::unit_x(), -Vector3::unit_y()], // floor
        [-Vector3::unit_z(), Vector3::unit_x(), -Vector3::unit_y()], // ceiling
        [Vector3::unit_x(), Vector3::unit_y(), -Vector3::unit_z()], // west wall
        [-Vector3::unit_x(), Vector3::unit_y(), -Vector3::unit_z()], // east wall
        [Vector3::unit_y(), Vector3::unit_x(), -Vector3::unit_z()], // south wall
        [-Vector3::unit_y(), Vector3::unit_x(), -Vector3::unit_z()], // north wall
    ];
}

/// How a face maps texture space onto its plane.
///
/// The variant is picked per face from the shape of its texture specification.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TexAlignment {
    /// Texture axes are derived from the face normal; only offsets are stored.
    Standard { offset: Vector2<f64> },

    /// Explicit texture axes (Valve 220 format).
    Valve {
        u_axis: Vector3<f64>,
        u_offset: f64,
        v_axis: Vector3<f64>,
        v_offset: f64,
    },
}

impl TexAlignment {
    pub fn is_valve(&self) -> bool {
        match *self {
            TexAlignment::Valve { .. } => true,
            TexAlignment::Standard { .. } => false,
        }
    }

    /// Projects `point` into texture space, in texels.
    pub fn project(
        &self,
        point: Vector3<f64>,
        normal: Vector3<f64>,
        rotation: f64,
        scale: Vector2<f64>,
    ) -> Vector2<f64> {
        let scale = Vector2::new(nonzero_scale(scale.x), nonzero_scale(scale.y));

        match *self {
            TexAlignment::Standard { offset } => {
                let (s, t) = rotated_axes(normal, rotation);
                Vector2::new(
                    point.dot(s) / scale.x + offset.x,
                    point.dot(t) / scale.y + offset.y,
                )
            }

            TexAlignment::Valve {
                u_axis,
                u_offset,
                v_axis,
                v_offset,
            } => Vector2::new(
                point.dot(u_axis) / scale.x + u_offset,
                point.dot(v_axis) / scale.y + v_offset,
            ),
        }
    }
}

fn nonzero_scale(s: f64) -> f64 {
    if s == 0.0 {
        1.0
    } else {
        s
    }
}

/// Picks the base texture axes for a face normal.
///
/// The first table entry with the greatest positive dot product wins, so floors and ceilings win
/// ties against walls.
pub fn texture_axes(normal: Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let mut best = 0.0;
    let mut best_axis = 0;

    for (i, axes) in BASE_AXES.iter().enumerate() {
        let dot = normal.dot(axes[0]);
        if dot > best {
            best = dot;
            best_axis = i;
        }
    }

    (BASE_AXES[best_axis][1], BASE_AXES[best_axis][2])
}

/// The base texture axes for `normal` rotated by `rotation` degrees in the axes' own plane.
pub fn rotated_axes(normal: Vector3<f64>, rotation: f64) -> (Vector3<f64>, Vector3<f64>) {
    let (s, t) = texture_axes(normal);

    // exact values for the common right angles
    let (sin, cos) = match rotation.rem_euclid(360.0) {
        r if r == 0.0 => (0.0, 1.0),
        r if r == 90.0 => (1.0, 0.0),
        r if r == 180.0 => (0.0, -1.0),
        r if r == 270.0 => (-1.0, 0.0),
        r => r.to_radians().sin_cos(),
    };

    let sv = first_nonzero(s);
    let tv = first_nonzero(t);

    let rotate = |mut axis: Vector3<f64>| {
        let ns = cos * axis[sv] - sin * axis[tv];
        let nt = sin * axis[sv] + cos * axis[tv];
        axis[sv] = ns;
        axis[tv] = nt;
        axis
    };

    (rotate(s), rotate(t))
}

fn first_nonzero(v: Vector3<f64>) -> usize {
    if v.x != 0.0 {
        0
    } else if v.y != 0.0 {
        1
    } else {
        2
    }
}

/// Texture metadata known to an archive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
}

/// Resolves texture names to metadata. Implemented by texture archives.
///
/// Lookups are shared between brush builders running in parallel.
pub trait TextureLookup: Sync {
    fn texture_info(&self, name: &str) -> Option<TextureInfo>;
}

/// A lookup that knows no textures.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTextures;

impl TextureLookup for NoTextures {
    fn texture_info(&self, _name: &str) -> Option<TextureInfo> {
        None
    }
}

impl TextureLookup for HashMap<String, TextureInfo> {
    fn texture_info(&self, name: &str) -> Option<TextureInfo> {
        self.get(name).copied()
    }
}

/// Searches each lookup in turn; the first one to know the texture wins.
impl<'a> TextureLookup for Vec<&'a dyn TextureLookup> {
    fn texture_info(&self, name: &str) -> Option<TextureInfo> {
        self.iter().find_map(|lookup| lookup.texture_info(name))
    }
}
