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

//! Assembly of parsed entities and built brush geometry into a `Map`.

use std::collections::HashMap;

use crate::{
    brush::{build_brush, BrushError, BuiltBrush, Diagnostic, Face, NoTextures, TextureLookup},
    math::{Bounds, DEFAULT_WORLD_EXTENT},
    parse::{self, MapParser, ParseError, Position, RawBrush, RawEntity},
};

use cgmath::Vector3;
use rayon::prelude::*;

/// Tolerances and limits used while parsing and building a map.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapConfig {
    /// The world bounding volume. Vertices outside it invalidate their brush.
    pub bounds: Bounds,

    /// Distance within which a point is considered to lie on a plane.
    pub point_epsilon: f64,

    /// Distance within which two vertices are merged.
    pub vertex_epsilon: f64,

    /// Minimum cross product magnitude of a face's three points.
    pub degenerate_epsilon: f64,

    /// Maximum `1 - cos` between the normals of coincident planes.
    pub normal_epsilon: f64,

    /// Minimum determinant magnitude for a plane triple to have an intersection.
    pub determinant_epsilon: f64,

    /// Minimum volume of a valid brush.
    pub volume_epsilon: f64,

    /// Build brushes on the rayon thread pool.
    pub parallel: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            bounds: Bounds::cube(DEFAULT_WORLD_EXTENT),
            point_epsilon: 1e-3,
            vertex_epsilon: 1e-3,
            degenerate_epsilon: 1e-6,
            normal_epsilon: 1e-6,
            determinant_epsilon: 1e-6,
            volume_epsilon: 1e-6,
            parallel: true,
        }
    }
}

/// The face dialects found in a map.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MapFormat {
    Standard,
    Valve,
    Mixed,
}

#[derive(Clone, Debug)]
pub struct Brush {
    /// Index within the owning entity.
    pub index: usize,
    pub position: Position,
    pub faces: Vec<Face>,

    /// Set if face parsing was cut short.
    pub error: Option<BrushError>,

    pub geometry: BuiltBrush,
}

impl Brush {
    pub fn is_valid(&self) -> bool {
        self.geometry.is_valid()
    }
}

#[derive(Clone, Debug)]
pub struct Entity {
    /// Index within the map, in declaration order.
    pub index: usize,
    pub position: Position,
    pub properties: HashMap<String, String>,
    pub brushes: Vec<Brush>,
}

impl Entity {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn classname(&self) -> Option<&str> {
        self.property("classname")
    }

    pub fn is_worldspawn(&self) -> bool {
        self.classname() == Some("worldspawn")
    }

    /// Parses the `origin` property, if present and well-formed.
    pub fn origin(&self) -> Option<Vector3<f64>> {
        self.property("origin").and_then(parse::vector3)
    }
}

#[derive(Clone, Debug)]
pub struct Map {
    pub entities: Vec<Entity>,
    pub bounds: Bounds,
    pub format: MapFormat,
}

impl Map {
    pub fn worldspawn(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.is_worldspawn())
    }

    pub fn brush_count(&self) -> usize {
        self.entities.iter().map(|e| e.brushes.len()).sum()
    }

    /// Iterates over every brush diagnostic as `(entity index, brush index, diagnostic)`.
    pub fn diagnostics(&self) -> impl Iterator<Item = (usize, usize, &Diagnostic)> {
        self.entities.iter().flat_map(|entity| {
            entity.brushes.iter().flat_map(move |brush| {
                brush
                    .geometry
                    .diagnostics
                    .iter()
                    .map(move |d| (entity.index, brush.index, d))
            })
        })
    }

    /// Iterates over the brushes that failed to build.
    pub fn invalid_brushes(&self) -> impl Iterator<Item = (&Entity, &Brush)> {
        self.entities.iter().flat_map(|entity| {
            entity
                .brushes
                .iter()
                .filter(|b| !b.is_valid())
                .map(move |b| (entity, b))
        })
    }
}

/// Parses map text and builds the geometry of every brush.
pub fn parse_map(src: &str, config: &MapConfig) -> Result<Map, ParseError> {
    parse_map_with_textures(src, config, &NoTextures)
}

/// Like `parse_map`, normalizing texture coordinates by the sizes `textures` knows about.
pub fn parse_map_with_textures(
    src: &str,
    config: &MapConfig,
    textures: &dyn TextureLookup,
) -> Result<Map, ParseError> {
    let raw = MapParser::new(src, config).parse_entities()?;
    let format = detect_format(&raw);

    let entities: Vec<Entity> = if config.parallel {
        raw.into_par_iter()
            .enumerate()
            .map(|(i, e)| assemble_entity(i, e, config, textures))
            .collect()
    } else {
        raw.into_iter()
            .enumerate()
            .map(|(i, e)| assemble_entity(i, e, config, textures))
            .collect()
    };

    let map = Map {
        entities,
        bounds: config.bounds,
        format,
    };

    let invalid = map.invalid_brushes().count();
    if invalid > 0 {
        warn!("{} of {} brushes are invalid", invalid, map.brush_count());
    }
    debug!(
        "Assembled {} entities with {} brushes ({:?} format)",
        map.entities.len(),
        map.brush_count(),
        map.format
    );

    Ok(map)
}

fn assemble_entity(
    index: usize,
    raw: RawEntity,
    config: &MapConfig,
    textures: &dyn TextureLookup,
) -> Entity {
    let build = |(i, b): (usize, RawBrush)| {
        let geometry = build_brush(&b.faces, b.error.as_ref(), config, textures);
        if let Some(reason) = geometry.invalid_reason() {
            debug!(
                "{}: entity {} brush {} is invalid: {}",
                b.position, index, i, reason
            );
        }

        Brush {
            index: i,
            position: b.position,
            faces: b.faces,
            error: b.error,
            geometry,
        }
    };

    let brushes = if config.parallel {
        raw.brushes.into_par_iter().enumerate().map(build).collect()
    } else {
        raw.brushes.into_iter().enumerate().map(build).collect()
    };

    Entity {
        index,
        position: raw.position,
        properties: raw.properties,
        brushes,
    }
}

fn detect_format(entities: &[RawEntity]) -> MapFormat {
    let mut standard = false;
    let mut valve = false;

    let faces = entities
        .iter()
        .flat_map(|e| e.brushes.iter())
        .flat_map(|b| b.faces.iter());
    for face in faces {
        if face.alignment.is_valve() {
            valve = true;
        } else {
            standard = true;
        }
    }

    match (standard, valve) {
        (_, false) => MapFormat::Standard,
        (false, true) => MapFormat::Valve,
        (true, true) => MapFormat::Mixed,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const WORLD: &str = r#"
// Game: Quake
{
"classname" "worldspawn"
"wad" "gfx/base.wad"
{
( -64 -64 -16 ) ( -64 -63 -16 ) ( -64 -64 -15 ) floor 0 0 0 1 1
( -64 -64 -16 ) ( -64 -64 -15 ) ( -63 -64 -16 ) floor 0 0 0 1 1
( -64 -64 -16 ) ( -63 -64 -16 ) ( -64 -63 -16 ) floor 0 0 0 1 1
( 64 64 16 ) ( 64 65 16 ) ( 65 64 16 ) floor 0 0 0 1 1
( 64 64 16 ) ( 65 64 16 ) ( 64 64 17 ) floor 0 0 0 1 1
( 64 64 16 ) ( 64 64 17 ) ( 64 65 16 ) floor 0 0 0 1 1
}
{
}
}
{
"classname" "info_player_start"
"origin" "32 -16 24"
}
"#;

    #[test]
    fn test_assemble() {
        for &parallel in [false, true].iter() {
            let config = MapConfig {
                parallel,
                ..MapConfig::default()
            };
            let map = parse_map(WORLD, &config).unwrap();

            assert_eq!(map.entities.len(), 2);
            assert_eq!(map.format, MapFormat::Standard);
            assert_eq!(map.bounds, Bounds::cube(8192.0));

            let world = map.worldspawn().unwrap();
            assert_eq!(world.index, 0);
            assert_eq!(world.property("wad"), Some("gfx/base.wad"));
            assert_eq!(world.brushes.len(), 2);
            assert!(world.brushes[0].is_valid());
            assert_eq!(world.brushes[0].geometry.vertices.len(), 8);
            assert!(!world.brushes[1].is_valid());

            let player = &map.entities[1];
            assert!(!player.is_worldspawn());
            assert_eq!(player.origin(), Some(Vector3::new(32.0, -16.0, 24.0)));
            assert!(player.brushes.is_empty());

            let diagnostics: Vec<_> = map.diagnostics().collect();
            assert_eq!(
                diagnostics,
                vec![(0, 1, &Diagnostic::TooFewFaces { faces: 0 })]
            );
        }
    }

    #[test]
    fn test_order_preserved() {
        let src: String = (0..64)
            .map(|i| format!("{{ \"classname\" \"info_null\" \"n\" \"{}\" }}\n", i))
            .collect();
        let map = parse_map(&src, &MapConfig::default()).unwrap();

        for (i, entity) in map.entities.iter().enumerate() {
            assert_eq!(entity.index, i);
            assert_eq!(entity.property("n"), Some(i.to_string().as_str()));
        }
    }

    #[test]
    fn test_no_synthesized_entity() {
        let map = parse_map("{ \"message\" \"hello\" }", &MapConfig::default()).unwrap();
        assert_eq!(map.entities.len(), 1);
        assert_eq!(map.entities[0].classname(), None);
        assert!(map.worldspawn().is_none());
    }

    #[test]
    fn test_format_detection() {
        let valve = "{ { ( 0 0 0 ) ( 0 1 0 ) ( 1 0 0 ) a [ 1 0 0 0 ] [ 0 -1 0 0 ] 0 1 1 } }";
        let standard = "{ { ( 0 0 0 ) ( 0 1 0 ) ( 1 0 0 ) a 0 0 0 1 1 } }";

        let config = MapConfig::default();
        assert_eq!(parse_map(valve, &config).unwrap().format, MapFormat::Valve);
        assert_eq!(
            parse_map(standard, &config).unwrap().format,
            MapFormat::Standard
        );
        assert_eq!(
            parse_map(&format!("{}\n{}", valve, standard), &config)
                .unwrap()
                .format,
            MapFormat::Mixed
        );
        assert_eq!(parse_map("", &config).unwrap().format, MapFormat::Standard);
    }

    #[test]
    fn test_parse_error_returns_no_map() {
        let result = parse_map(&format!("{}\n{{", WORLD), &MapConfig::default());
        assert!(result.is_err());
    }
}
