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

//! Convex polyhedron reconstruction from a brush's bounding planes.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
};

use cgmath::{InnerSpace, Vector2, Vector3};

use crate::{
    brush::{BrushError, Face, TextureLookup},
    map::MapConfig,
    math::{self, Bounds, Hyperplane, PointSide},
};

/// A problem found while building a brush.
#[derive(Clone, Debug, PartialEq, Fail)]
pub enum Diagnostic {
    #[fail(display = "brush parsing was aborted: {}", error)]
    ParseAborted { error: BrushError },
    #[fail(display = "brush has {} faces, at least 4 are needed", faces)]
    TooFewFaces { faces: usize },
    #[fail(display = "face {} coincides with face {}", face, other)]
    CoincidentFace { face: usize, other: usize },
    #[fail(display = "face {} does not bound the brush", face)]
    RedundantFace { face: usize },
    #[fail(display = "vertex {:?} lies outside the world bounds", point)]
    VertexOutOfBounds { point: [f64; 3] },
    #[fail(display = "no vertices")]
    NoVertices,
    #[fail(display = "face {} has only {} vertices", face, vertices)]
    DegenerateLoop { face: usize, vertices: usize },
    #[fail(display = "degenerate volume {}", volume)]
    DegenerateVolume { volume: f64 },
}

impl Diagnostic {
    /// Returns true if this diagnostic makes the brush invalid.
    pub fn is_fatal(&self) -> bool {
        match *self {
            Diagnostic::CoincidentFace { .. } | Diagnostic::RedundantFace { .. } => false,
            _ => true,
        }
    }
}

/// The polygon contributed by one input face.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltFace {
    /// Indices into `BuiltBrush::vertices`, counter-clockwise when seen from outside.
    pub vertices: Vec<usize>,

    /// Texture coordinates for each loop vertex. Normalized when the texture size is known,
    /// in texels otherwise.
    pub uvs: Vec<Vector2<f64>>,

    /// The face contributes no polygon to the solid and is excluded from it.
    pub redundant: bool,
}

impl BuiltFace {
    fn empty() -> BuiltFace {
        BuiltFace {
            vertices: Vec::new(),
            uvs: Vec::new(),
            redundant: false,
        }
    }

    pub fn is_polygon(&self) -> bool {
        !self.redundant && self.vertices.len() >= 3
    }

    /// Returns three loop vertices in map winding order, from which `Hyperplane::from_points`
    /// re-derives this face's plane. `None` unless the face is a polygon.
    pub fn plane_points(&self, vertices: &[Vector3<f64>]) -> Option<[Vector3<f64>; 3]> {
        if !self.is_polygon() {
            return None;
        }

        let v0 = vertices[self.vertices[0]];
        let v1 = vertices[self.vertices[1]];

        // the loop vertex spanning the largest triangle with the first edge
        let v2 = self.vertices[2..]
            .iter()
            .map(|&i| vertices[i])
            .max_by(|a, b| {
                let area_a = (v1 - v0).cross(a - v0).magnitude2();
                let area_b = (v1 - v0).cross(b - v0).magnitude2();
                area_a.partial_cmp(&area_b).unwrap_or(Ordering::Equal)
            })?;

        Some([v0, v2, v1])
    }
}

/// The convex solid bounded by a brush's faces.
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltBrush {
    /// Deduplicated vertices.
    pub vertices: Vec<Vector3<f64>>,

    /// One entry per input face, in input order.
    pub faces: Vec<BuiltFace>,

    /// Unique edges as ordered vertex index pairs.
    pub edges: Vec<(usize, usize)>,

    pub volume: f64,
    pub bounds: Option<Bounds>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuiltBrush {
    fn empty(face_count: usize) -> BuiltBrush {
        BuiltBrush {
            vertices: Vec::new(),
            faces: vec![BuiltFace::empty(); face_count],
            edges: Vec::new(),
            volume: 0.0,
            bounds: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_fatal)
    }

    /// The first diagnostic that made this brush invalid.
    pub fn invalid_reason(&self) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.is_fatal())
    }

    /// Returns the positions of a face's loop vertices.
    pub fn face_polygon(&self, face: usize) -> Vec<Vector3<f64>> {
        match self.faces.get(face) {
            Some(f) => f.vertices.iter().map(|&i| self.vertices[i]).collect(),
            None => Vec::new(),
        }
    }

    /// Fan-triangulates every polygon face. Triangles keep the outward winding.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let mut tris = Vec::new();
        for face in self.faces.iter().filter(|f| f.is_polygon()) {
            for i in 1..face.vertices.len() - 1 {
                tris.push([face.vertices[0], face.vertices[i], face.vertices[i + 1]]);
            }
        }

        tris
    }
}

/// Builds the convex solid bounded by `faces`.
///
/// `error` is the parse error that cut the brush short, if any; such brushes are not built.
/// The result is always returned: problems are recorded as diagnostics and invalid brushes keep
/// whatever geometry could be derived.
///
/// A face whose plane misses the solid, or only touches it along an edge or at a vertex, bounds
/// nothing and is marked redundant. Touching faces are only redundant while the remaining
/// polygons close the surface; otherwise they are reported as `DegenerateLoop`.
pub fn build_brush(
    faces: &[Face],
    error: Option<&BrushError>,
    config: &MapConfig,
    textures: &dyn TextureLookup,
) -> BuiltBrush {
    let mut built = BuiltBrush::empty(faces.len());

    if let Some(e) = error {
        built.diagnostics.push(Diagnostic::ParseAborted { error: e.clone() });
        return built;
    }

    if faces.len() < 4 {
        built.diagnostics.push(Diagnostic::TooFewFaces { faces: faces.len() });
        return built;
    }

    // a face repeating an earlier plane adds nothing
    let mut active: Vec<usize> = Vec::with_capacity(faces.len());
    for (i, face) in faces.iter().enumerate() {
        let duplicate = active.iter().copied().find(|&j| {
            face.plane
                .approx_eq(&faces[j].plane, config.normal_epsilon, config.point_epsilon)
        });

        match duplicate {
            Some(other) => {
                built.faces[i].redundant = true;
                built
                    .diagnostics
                    .push(Diagnostic::CoincidentFace { face: i, other });
            }
            None => active.push(i),
        }
    }

    let planes: Vec<Hyperplane> = active.iter().map(|&i| faces[i].plane).collect();
    built.vertices = find_vertices(&planes, config, &mut built.diagnostics);

    if built.vertices.is_empty() {
        built.diagnostics.push(Diagnostic::NoVertices);
        return built;
    }

    let mut texture_sizes = HashMap::new();
    let mut touching = Vec::new();

    for (&face_idx, plane) in active.iter().zip(planes.iter()) {
        let members: Vec<usize> = built
            .vertices
            .iter()
            .enumerate()
            .filter(|(_, &v)| plane.classify(v, config.point_epsilon) == PointSide::On)
            .map(|(i, _)| i)
            .collect();

        let face = &faces[face_idx];
        let built_face = &mut built.faces[face_idx];
        match members.len() {
            0 => {
                built_face.redundant = true;
                built
                    .diagnostics
                    .push(Diagnostic::RedundantFace { face: face_idx });
            }

            n if n < 3 => {
                built_face.vertices = members;
                touching.push(face_idx);
            }

            _ => {
                let size = *texture_sizes
                    .entry(face.texture.as_str())
                    .or_insert_with(|| texture_size(&face.texture, textures));
                built_face.vertices = sort_loop(members, &built.vertices, plane.normal());
                built_face.uvs = face_uvs(face, built_face, &built.vertices, size);
            }
        }
    }

    let closed = is_closed(&built.faces);
    for face_idx in touching {
        let built_face = &mut built.faces[face_idx];
        if closed {
            built_face.vertices.clear();
            built_face.redundant = true;
            built
                .diagnostics
                .push(Diagnostic::RedundantFace { face: face_idx });
        } else {
            built.diagnostics.push(Diagnostic::DegenerateLoop {
                face: face_idx,
                vertices: built_face.vertices.len(),
            });
        }
    }

    built.edges = collect_edges(&built.faces);
    built.bounds = Bounds::from_points(&built.vertices);
    built.volume = volume(&built);

    if !(built.volume > config.volume_epsilon) {
        built.diagnostics.push(Diagnostic::DegenerateVolume {
            volume: built.volume,
        });
    }

    trace!(
        "built brush: {} faces, {} vertices, {} edges, volume {}",
        faces.len(),
        built.vertices.len(),
        built.edges.len(),
        built.volume
    );

    built
}

/// Intersects every unordered triple of planes once and keeps the points that lie in all
/// half-spaces and inside the world bounds, merged within `vertex_epsilon`.
fn find_vertices(
    planes: &[Hyperplane],
    config: &MapConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Vector3<f64>> {
    let merge_dist2 = config.vertex_epsilon * config.vertex_epsilon;
    let mut vertices: Vec<Vector3<f64>> = Vec::new();
    let mut out_of_bounds = false;

    let n = planes.len();
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                let point = match math::intersect_planes(
                    &planes[a],
                    &planes[b],
                    &planes[c],
                    config.determinant_epsilon,
                ) {
                    Some(p) => p,
                    None => continue,
                };

                let inside = planes
                    .iter()
                    .all(|p| p.classify(point, config.point_epsilon).in_half_space());
                if !inside {
                    continue;
                }

                if !config.bounds.contains(point, config.point_epsilon) {
                    if !out_of_bounds {
                        diagnostics.push(Diagnostic::VertexOutOfBounds {
                            point: [point.x, point.y, point.z],
                        });
                        out_of_bounds = true;
                    }
                    continue;
                }

                if vertices
                    .iter()
                    .any(|v| (v - point).magnitude2() <= merge_dist2)
                {
                    continue;
                }

                vertices.push(point);
            }
        }
    }

    vertices
}

/// Orders a face's vertices counter-clockwise around `normal`.
fn sort_loop(
    members: Vec<usize>,
    vertices: &[Vector3<f64>],
    normal: Vector3<f64>,
) -> Vec<usize> {
    let center = math::centroid(members.iter().map(|&i| &vertices[i]));

    // u × v == normal
    let reference = if normal.x.abs() < 0.5 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let u = normal.cross(reference).normalize();
    let v = normal.cross(u);

    let mut keyed: Vec<(f64, usize)> = members
        .into_iter()
        .map(|i| {
            let d = vertices[i] - center;
            (d.dot(v).atan2(d.dot(u)), i)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    keyed.into_iter().map(|(_, i)| i).collect()
}

/// Texture dimensions used to normalize texel coordinates, `1×1` when unknown.
fn texture_size(name: &str, textures: &dyn TextureLookup) -> Vector2<f64> {
    match textures.texture_info(name) {
        Some(info) if info.width > 0 && info.height > 0 => {
            Vector2::new(info.width as f64, info.height as f64)
        }
        _ => {
            debug!("No size for texture {}, using texel coordinates", name);
            Vector2::new(1.0, 1.0)
        }
    }
}

fn face_uvs(
    face: &Face,
    built_face: &BuiltFace,
    vertices: &[Vector3<f64>],
    size: Vector2<f64>,
) -> Vec<Vector2<f64>> {
    built_face
        .vertices
        .iter()
        .map(|&i| {
            let texels = face.texel_coords(vertices[i]);
            Vector2::new(texels.x / size.x, texels.y / size.y)
        })
        .collect()
}

/// Returns true if the polygon faces share every edge pairwise.
fn is_closed(faces: &[BuiltFace]) -> bool {
    let mut uses: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for face in faces.iter().filter(|f| f.is_polygon()) {
        let count = face.vertices.len();
        for i in 0..count {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % count];
            *uses.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
    }

    !uses.is_empty() && uses.values().all(|&n| n == 2)
}

fn collect_edges(faces: &[BuiltFace]) -> Vec<(usize, usize)> {
    let mut edges = BTreeSet::new();
    for face in faces.iter().filter(|f| f.is_polygon()) {
        let count = face.vertices.len();
        for i in 0..count {
            let a = face.vertices[i];
            let b = face.vertices[(i + 1) % count];
            edges.insert((a.min(b), a.max(b)));
        }
    }

    edges.into_iter().collect()
}

/// Sums the signed volumes of the tetrahedra spanned by each loop triangle and the vertex
/// centroid. Outward winding makes the sum positive.
fn volume(built: &BuiltBrush) -> f64 {
    let reference = math::centroid(&built.vertices);

    built
        .triangles()
        .iter()
        .map(|&[a, b, c]| {
            let a = built.vertices[a] - reference;
            let b = built.vertices[b] - reference;
            let c = built.vertices[c] - reference;
            a.dot(b.cross(c)) / 6.0
        })
        .sum()
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::brush::texture::{NoTextures, TextureInfo};
    use crate::math::Bounds;
    use crate::parse::Position;

    use cgmath::{Matrix3, Rad};
    use rand::{Rng, SeedableRng, XorShiftRng};
    use std::{
        collections::HashMap,
        f64::consts::PI,
        sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
    };

    fn config() -> MapConfig {
        MapConfig {
            parallel: false,
            ..MapConfig::default()
        }
    }

    fn build(faces: &[Face]) -> BuiltBrush {
        build_brush(faces, None, &config(), &NoTextures)
    }

    /// An axis-aligned box as an editor writes it.
    fn box_faces(min: [f64; 3], max: [f64; 3]) -> Vec<Face> {
        let (x0, y0, z0) = (min[0], min[1], min[2]);
        let (x1, y1, z1) = (max[0], max[1], max[2]);
        let points = [
            [[x0, y0, z0], [x0, y0 + 1.0, z0], [x0, y0, z0 + 1.0]],
            [[x0, y0, z0], [x0, y0, z0 + 1.0], [x0 + 1.0, y0, z0]],
            [[x0, y0, z0], [x0 + 1.0, y0, z0], [x0, y0 + 1.0, z0]],
            [[x1, y1, z1], [x1, y1 + 1.0, z1], [x1 + 1.0, y1, z1]],
            [[x1, y1, z1], [x1 + 1.0, y1, z1], [x1, y1, z1 + 1.0]],
            [[x1, y1, z1], [x1, y1, z1 + 1.0], [x1, y1 + 1.0, z1]],
        ];

        points
            .iter()
            .map(|p| {
                Face::from_points([p[0].into(), p[1].into(), p[2].into()], "wall", 1e-6).unwrap()
            })
            .collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-6 * expected.abs().max(1.0),
            "{} != {}",
            actual,
            expected
        );
    }

    #[test]
    fn test_box() {
        let built = build(&box_faces([-64.0, -64.0, -16.0], [64.0, 64.0, 16.0]));

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert!(built.diagnostics.is_empty());
        assert_eq!(built.vertices.len(), 8);
        assert_eq!(built.edges.len(), 12);
        assert_eq!(built.triangles().len(), 12);
        assert_close(built.volume, 128.0 * 128.0 * 32.0);

        let bounds = built.bounds.unwrap();
        assert_eq!(bounds.min, Vector3::new(-64.0, -64.0, -16.0));
        assert_eq!(bounds.max, Vector3::new(64.0, 64.0, 16.0));

        for face in built.faces.iter() {
            assert_eq!(face.vertices.len(), 4);
            assert_eq!(face.uvs.len(), 4);
        }
    }

    #[test]
    fn test_loops_wound_outward() {
        let faces = box_faces([0.0, 0.0, 0.0], [32.0, 48.0, 64.0]);
        let built = build(&faces);

        for (i, face) in faces.iter().enumerate() {
            let polygon = built.face_polygon(i);
            assert_eq!(polygon.len(), 4);

            // Newell normal of the loop
            let mut normal = Vector3::new(0.0, 0.0, 0.0);
            for j in 0..polygon.len() {
                normal += polygon[j].cross(polygon[(j + 1) % polygon.len()]);
            }

            assert!(normal.normalize().dot(face.plane.normal()) > 0.999);
            for v in polygon {
                assert_eq!(face.plane.classify(v, 1e-6), PointSide::On);
            }
        }
    }

    #[test]
    fn test_tetrahedron() {
        let faces = vec![
            Face::from_plane(-Hyperplane::axis_x(0.0), "a"),
            Face::from_plane(-Hyperplane::axis_y(0.0), "b"),
            Face::from_plane(-Hyperplane::axis_z(0.0), "c"),
            Face::from_plane(
                Hyperplane::from_normal(Vector3::new(1.0, 1.0, 1.0), 64.0 / 3f64.sqrt()),
                "d",
            ),
        ];
        let built = build(&faces);

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(built.vertices.len(), 4);
        assert_eq!(built.edges.len(), 6);
        assert_close(built.volume, 64.0 * 64.0 * 64.0 / 6.0);
    }

    #[test]
    fn test_cut_corner() {
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces.push(Face::from_plane(
            Hyperplane::from_normal(Vector3::new(1.0, 1.0, 1.0), 160.0 / 3f64.sqrt()),
            "cut",
        ));
        let built = build(&faces);

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(built.vertices.len(), 10);
        assert_eq!(built.faces[6].vertices.len(), 3);
        assert_close(built.volume, 64.0f64.powi(3) - 32.0f64.powi(3) / 6.0);
    }

    #[test]
    fn test_parallel_outer_plane_is_redundant() {
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces.push(Face::from_plane(Hyperplane::axis_z(100.0), "outer"));
        let built = build(&faces);

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(built.vertices.len(), 8);
        assert!(built.faces[6].redundant);
        assert!(built.faces[6].vertices.is_empty());
        assert_eq!(
            built.diagnostics,
            vec![Diagnostic::RedundantFace { face: 6 }]
        );
        assert_close(built.volume, 64.0f64.powi(3));
    }

    #[test]
    fn test_parallel_inner_plane_truncates() {
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces.push(Face::from_plane(Hyperplane::axis_z(32.0), "inner"));
        let built = build(&faces);

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(built.vertices.len(), 8);

        // the original top face is now the redundant one
        assert!(built.faces[3].redundant);
        assert_eq!(built.faces[6].vertices.len(), 4);
        assert_close(built.volume, 64.0 * 64.0 * 32.0);
    }

    #[test]
    fn test_coincident_face_epsilon_boundary() {
        let mut config = config();
        config.point_epsilon = 0.0625;

        // exactly epsilon away: same plane
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces.push(Face::from_plane(Hyperplane::axis_z(64.0625), "dup"));
        let built = build_brush(&faces, None, &config, &NoTextures);
        assert!(built.is_valid());
        assert_eq!(
            built.diagnostics,
            vec![Diagnostic::CoincidentFace { face: 6, other: 3 }]
        );

        // twice epsilon away: a distinct plane that misses the solid
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces.push(Face::from_plane(Hyperplane::axis_z(64.125), "outer"));
        let built = build_brush(&faces, None, &config, &NoTextures);
        assert!(built.is_valid());
        assert_eq!(
            built.diagnostics,
            vec![Diagnostic::RedundantFace { face: 6 }]
        );
    }

    #[test]
    fn test_too_few_faces() {
        let faces = box_faces([0.0, 0.0, 0.0], [8.0, 8.0, 8.0]);
        let built = build(&faces[..3]);
        assert!(!built.is_valid());
        assert_eq!(
            built.invalid_reason(),
            Some(&Diagnostic::TooFewFaces { faces: 3 })
        );

        let empty = build(&[]);
        assert!(!empty.is_valid());
        assert!(empty.faces.is_empty());
    }

    #[test]
    fn test_unbounded() {
        let faces = box_faces([0.0, 0.0, 0.0], [8.0, 8.0, 8.0]);
        // -x, -y, -z, +x: open towards +y and +z
        let open = vec![
            faces[0].clone(),
            faces[1].clone(),
            faces[2].clone(),
            faces[5].clone(),
        ];
        let built = build(&open);

        assert!(!built.is_valid());
        assert!(built
            .diagnostics
            .iter()
            .any(|d| match d {
                Diagnostic::DegenerateLoop { .. } => true,
                _ => false,
            }));
    }

    #[test]
    fn test_zero_thickness() {
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        // bottom and top both at z = 0
        faces[3] = Face::from_plane(Hyperplane::axis_z(0.0), "top");
        let built = build(&faces);

        assert!(!built.is_valid());
        assert!(built
            .diagnostics
            .iter()
            .any(|d| match d {
                Diagnostic::DegenerateVolume { .. } => true,
                _ => false,
            }));
    }

    #[test]
    fn test_out_of_world_bounds() {
        let mut config = config();
        config.bounds = Bounds::cube(32.0);

        let built = build_brush(
            &box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]),
            None,
            &config,
            &NoTextures,
        );
        assert!(!built.is_valid());
        match built.invalid_reason() {
            Some(Diagnostic::VertexOutOfBounds { .. }) => (),
            other => panic!("unexpected reason {:?}", other),
        }
        assert!(built
            .vertices
            .iter()
            .all(|&v| config.bounds.contains(v, 0.0)));
    }

    #[test]
    fn test_parse_aborted() {
        let error = BrushError::DegenerateFace {
            face: 2,
            position: Position::new(4, 1),
        };
        let faces = box_faces([0.0, 0.0, 0.0], [8.0, 8.0, 8.0]);
        let built = build_brush(&faces[..2], Some(&error), &config(), &NoTextures);

        assert!(!built.is_valid());
        assert_eq!(
            built.invalid_reason(),
            Some(&Diagnostic::ParseAborted { error })
        );
    }

    #[test]
    fn test_rebuild_from_loops() {
        let mut faces = box_faces([-32.0, -16.0, 0.0], [32.0, 16.0, 48.0]);
        faces.push(Face::from_plane(
            Hyperplane::from_normal(Vector3::new(0.0, 1.0, 2.0), 40.0),
            "slope",
        ));
        let built = build(&faces);
        assert!(built.is_valid(), "{:?}", built.diagnostics);

        let derived: Vec<Face> = built
            .faces
            .iter()
            .filter_map(|f| f.plane_points(&built.vertices))
            .map(|points| Face::from_points(points, "derived", 1e-6).unwrap())
            .collect();
        assert_eq!(derived.len(), faces.len());

        let rebuilt = build(&derived);
        assert!(rebuilt.is_valid());
        assert_eq!(rebuilt.vertices.len(), built.vertices.len());

        for (face, built_face) in derived.iter().zip(built.faces.iter()) {
            for &i in built_face.vertices.iter() {
                assert_eq!(
                    face.plane.classify(built.vertices[i], config().point_epsilon),
                    PointSide::On
                );
            }
        }
        assert_close(rebuilt.volume, built.volume);
    }

    #[test]
    fn test_random_rotated_boxes() {
        let mut rng = XorShiftRng::from_seed([0x1234_5678, 0x9abc_def0, 0x0fed_cba9, 0x8765_4321]);

        for _ in 0..64 {
            let axis: Vector3<f64> = Vector3::new(
                rng.gen_range(-1.0, 1.0),
                rng.gen_range(-1.0, 1.0),
                rng.gen_range(-1.0, 1.0),
            );
            if axis.magnitude() < 0.1 {
                continue;
            }
            let angle: f64 = rng.gen_range(0.0, 6.28);
            let rotation = Matrix3::from_axis_angle(axis.normalize(), Rad(angle));
            let half: Vector3<f64> = Vector3::new(
                rng.gen_range(1.0, 256.0),
                rng.gen_range(1.0, 256.0),
                rng.gen_range(1.0, 256.0),
            );
            let center: Vector3<f64> = Vector3::new(
                rng.gen_range(-1024.0, 1024.0),
                rng.gen_range(-1024.0, 1024.0),
                rng.gen_range(-1024.0, 1024.0),
            );

            let mut faces = Vec::new();
            for axis in 0..3 {
                for &sign in [1.0, -1.0].iter() {
                    let mut local: Vector3<f64> = Vector3::new(0.0, 0.0, 0.0);
                    local[axis] = sign;
                    let normal = rotation * local;
                    let dist = half[axis] + normal.dot(center);
                    faces.push(Face::from_plane(Hyperplane::from_normal(normal, dist), "r"));
                }
            }

            let built = build(&faces);
            assert!(built.is_valid(), "{:?}", built.diagnostics);
            assert_eq!(built.vertices.len(), 8);
            assert_eq!(built.edges.len(), 12);

            let expected = 8.0 * half.x * half.y * half.z;
            assert!(
                (built.volume - expected).abs() <= 1e-6 * expected,
                "{} != {}",
                built.volume,
                expected
            );
        }
    }

    #[test]
    fn test_uvs_normalized_by_texture_size() {
        let mut textures = HashMap::new();
        textures.insert(
            "wall".to_owned(),
            TextureInfo {
                width: 64,
                height: 32,
            },
        );

        let faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        let built = build_brush(&faces, None, &config(), &textures);

        // top face: s = +x, t = -y
        let top = &built.faces[3];
        for (&i, uv) in top.vertices.iter().zip(top.uvs.iter()) {
            let v = built.vertices[i];
            assert_close(uv.x, v.x / 64.0);
            assert_close(uv.y, -v.y / 32.0);
        }
    }

    /// Unit vector at angle `2πk/n` in the xy plane.
    fn side_direction(k: usize, n: usize) -> Vector3<f64> {
        let theta = 2.0 * PI * k as f64 / n as f64;
        Vector3::new(theta.cos(), theta.sin(), 0.0)
    }

    /// Area of a regular `n`-gon with the given apothem.
    fn ngon_area(n: usize, apothem: f64) -> f64 {
        n as f64 * apothem * apothem * (PI / n as f64).tan()
    }

    #[test]
    fn test_pyramids() {
        let (apothem, height) = (64.0, 64.0);

        for &n in [3, 4, 5, 8, 16].iter() {
            let mut faces = vec![Face::from_plane(-Hyperplane::axis_z(0.0), "base")];
            for k in 0..n {
                // d·p / apothem + z / height <= 1
                let normal = side_direction(k, n) / apothem + Vector3::new(0.0, 0.0, 1.0 / height);
                faces.push(Face::from_plane(
                    Hyperplane::from_normal(normal, 1.0 / normal.magnitude()),
                    "side",
                ));
            }

            let built = build(&faces);
            assert!(built.is_valid(), "{}: {:?}", n, built.diagnostics);
            assert_eq!(built.vertices.len(), n + 1);
            assert_eq!(built.edges.len(), 2 * n);
            assert_eq!(built.faces[0].vertices.len(), n);

            let apex = Vector3::new(0.0, 0.0, height);
            for face in built.faces[1..].iter() {
                assert_eq!(face.vertices.len(), 3);
                assert!(face
                    .vertices
                    .iter()
                    .any(|&i| (built.vertices[i] - apex).magnitude() < 1e-6));
            }

            assert_close(built.volume, ngon_area(n, apothem) * height / 3.0);
        }
    }

    #[test]
    fn test_prisms() {
        let (apothem, height) = (128.0, 1024.0);

        for &n in [5, 12, 62].iter() {
            let mut faces = vec![
                Face::from_plane(-Hyperplane::axis_z(0.0), "bottom"),
                Face::from_plane(Hyperplane::axis_z(height), "top"),
            ];
            for k in 0..n {
                faces.push(Face::from_plane(
                    Hyperplane::from_normal(side_direction(k, n), apothem),
                    "side",
                ));
            }

            let built = build(&faces);
            assert!(built.is_valid(), "{}: {:?}", n, built.diagnostics);
            assert_eq!(built.vertices.len(), 2 * n);
            assert_eq!(built.edges.len(), 3 * n);
            assert_eq!(built.faces[0].vertices.len(), n);
            assert_eq!(built.faces[1].vertices.len(), n);
            assert_close(built.volume, ngon_area(n, apothem) * height);
        }
    }

    /// Volume of the convex hull of `points`, from the supporting planes of every point triple.
    fn hull_volume(points: &[Vector3<f64>]) -> f64 {
        let tolerance = 1e-3;
        let interior = math::centroid(points);
        let mut seen: Vec<Vec<usize>> = Vec::new();
        let mut total = 0.0;

        for i in 0..points.len() {
            for j in i + 1..points.len() {
                for k in j + 1..points.len() {
                    let e1 = points[j] - points[i];
                    let e2 = points[k] - points[i];
                    let cross = e1.cross(e2);
                    if e1.magnitude() < 0.1
                        || e2.magnitude() < 0.1
                        || cross.magnitude() < 1e-2 * e1.magnitude() * e2.magnitude()
                    {
                        continue;
                    }

                    let mut normal = cross.normalize();
                    let mut dist = normal.dot(points[i]);
                    if normal.dot(interior) > dist {
                        normal = -normal;
                        dist = -dist;
                    }

                    if points.iter().any(|p| normal.dot(*p) > dist + tolerance) {
                        continue;
                    }

                    let members: Vec<usize> = (0..points.len())
                        .filter(|&m| (normal.dot(points[m]) - dist).abs() <= tolerance)
                        .collect();
                    if seen.contains(&members) {
                        continue;
                    }

                    let center = math::centroid(members.iter().map(|&m| &points[m]));
                    let u = (points[members[0]] - center).normalize();
                    let v = normal.cross(u);
                    let mut ring: Vec<Vector3<f64>> =
                        members.iter().map(|&m| points[m] - center).collect();
                    ring.sort_by(|a, b| {
                        let angle_a = a.dot(v).atan2(a.dot(u));
                        let angle_b = b.dot(v).atan2(b.dot(u));
                        angle_a.partial_cmp(&angle_b).unwrap()
                    });

                    let area = (0..ring.len())
                        .map(|r| normal.dot(ring[r].cross(ring[(r + 1) % ring.len()])))
                        .sum::<f64>()
                        .abs()
                        / 2.0;

                    total += area * (dist - normal.dot(interior)) / 3.0;
                    seen.push(members);
                }
            }
        }

        total
    }

    #[test]
    fn test_random_polytopes() {
        let mut rng = XorShiftRng::from_seed([0x2545_f491, 0x4f6c_dd1d, 0x9e37_79b9, 0x7f4a_7c15]);
        let radius = 128.0;
        let half = 100.0;

        for _ in 0..32 {
            let center: Vector3<f64> = Vector3::new(
                rng.gen_range(-512.0, 512.0),
                rng.gen_range(-512.0, 512.0),
                rng.gen_range(-512.0, 512.0),
            );
            let mut faces = box_faces(
                [center.x - half, center.y - half, center.z - half],
                [center.x + half, center.y + half, center.z + half],
            );

            // tangent planes of a sphere that pokes out of the box corners
            let count = rng.gen_range(8, 13);
            while faces.len() < 6 + count {
                let candidate: Vector3<f64> = Vector3::new(
                    rng.gen_range(-1.0, 1.0),
                    rng.gen_range(-1.0, 1.0),
                    rng.gen_range(-1.0, 1.0),
                );
                let length = candidate.magnitude();
                if length < 0.1 || length > 1.0 {
                    continue;
                }

                let normal = candidate / length;
                if faces
                    .iter()
                    .any(|f| f.plane.normal().dot(normal) > 0.99)
                {
                    continue;
                }

                faces.push(Face::from_plane(
                    Hyperplane::from_normal(normal, normal.dot(center) + radius),
                    "tangent",
                ));
            }

            let built = build(&faces);
            assert!(built.is_valid(), "{:?}", built.diagnostics);

            let polygons = built.faces.iter().filter(|f| f.is_polygon()).count();
            assert_eq!(
                built.vertices.len() + polygons,
                built.edges.len() + 2,
                "Euler characteristic"
            );

            let expected = hull_volume(&built.vertices);
            assert!(
                (built.volume - expected).abs() <= 1e-6 * expected,
                "{} != {}",
                built.volume,
                expected
            );
        }
    }

    #[test]
    fn test_vertex_merge_epsilon_boundary() {
        let mut config = config();
        config.vertex_epsilon = 0.0625;
        config.point_epsilon = 1.0 / 1024.0;

        // exactly epsilon thick: both sides collapse onto one quad
        let faces = box_faces([0.0, 0.0, 0.0], [0.0625, 64.0, 64.0]);
        let built = build_brush(&faces, None, &config, &NoTextures);
        assert_eq!(built.vertices.len(), 4);
        assert!(!built.is_valid());

        // slightly thicker: a thin but valid slab
        let thickness = 0.0625 + 1.0 / 1024.0;
        let faces = box_faces([0.0, 0.0, 0.0], [thickness, 64.0, 64.0]);
        let built = build_brush(&faces, None, &config, &NoTextures);
        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(built.vertices.len(), 8);
        assert_close(built.volume, thickness * 64.0 * 64.0);
    }

    #[test]
    fn test_plane_touching_edge_is_redundant() {
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        // x + y <= 128 meets the cube only along its x = y = 64 edge
        faces.push(Face::from_plane(
            Hyperplane::from_normal(Vector3::new(1.0, 1.0, 0.0), 128.0 / 2f64.sqrt()),
            "edge",
        ));
        let built = build(&faces);

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(
            built.diagnostics,
            vec![Diagnostic::RedundantFace { face: 6 }]
        );
        assert!(built.faces[6].redundant);
        assert!(built.faces[6].vertices.is_empty());
        assert_eq!(built.vertices.len(), 8);
        assert_eq!(built.edges.len(), 12);
        assert_close(built.volume, 64.0f64.powi(3));
    }

    #[test]
    fn test_plane_touching_corner_is_redundant() {
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces.push(Face::from_plane(
            Hyperplane::from_normal(Vector3::new(1.0, 1.0, 1.0), 192.0 / 3f64.sqrt()),
            "corner",
        ));
        let built = build(&faces);

        assert!(built.is_valid(), "{:?}", built.diagnostics);
        assert_eq!(
            built.diagnostics,
            vec![Diagnostic::RedundantFace { face: 6 }]
        );
        assert_eq!(built.vertices.len(), 8);
    }

    struct CountingLookup(AtomicUsize);

    impl TextureLookup for CountingLookup {
        fn texture_info(&self, _name: &str) -> Option<TextureInfo> {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
            None
        }
    }

    #[test]
    fn test_texture_lookup_once_per_brush() {
        let lookup = CountingLookup(AtomicUsize::new(0));
        let mut faces = box_faces([0.0, 0.0, 0.0], [64.0, 64.0, 64.0]);
        faces[3].texture = "floor".to_owned();

        let built = build_brush(&faces, None, &config(), &lookup);
        assert!(built.is_valid());
        assert_eq!(lookup.0.load(AtomicOrdering::SeqCst), 2);

        // unknown textures leave coordinates in texels
        let top = &built.faces[3];
        for (&i, uv) in top.vertices.iter().zip(top.uvs.iter()) {
            assert_close(uv.x, built.vertices[i].x);
        }
    }
}
