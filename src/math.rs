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

//! Planes, half-spaces and the world bounding volume.

use std::ops::Neg;

use cgmath::{InnerSpace, Vector3, Zero};

/// Half the edge length of the default world bounding cube.
pub const DEFAULT_WORLD_EXTENT: f64 = 8192.0;

/// The position of a point relative to a plane.
///
/// Points whose signed distance lies within `±epsilon` of the plane are `On` it. A plane's
/// half-space is the set of points that are `Inside` or `On`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointSide {
    Inside,
    On,
    Outside,
}

impl PointSide {
    pub fn from_dist(dist: f64, epsilon: f64) -> PointSide {
        if dist > epsilon {
            PointSide::Outside
        } else if dist < -epsilon {
            PointSide::Inside
        } else {
            PointSide::On
        }
    }

    /// Returns true if the point belongs to the closed half-space.
    pub fn in_half_space(self) -> bool {
        self != PointSide::Outside
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Alignment {
    Axis(Axis),
    Normal(Vector3<f64>),
}

#[derive(Debug, Fail)]
#[fail(display = "plane points are collinear or coincident")]
pub struct DegeneratePlane;

/// An oriented plane. The normal points out of the half-space the plane bounds.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hyperplane {
    alignment: Alignment,
    dist: f64,
}

impl Neg for Hyperplane {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Hyperplane::new(-self.normal(), -self.dist)
    }
}

impl Hyperplane {
    /// Creates a new hyperplane aligned along the given normal, `dist` units away from the origin.
    ///
    /// If the given normal is equivalent to one of the axis normals, the hyperplane will be optimized
    /// to only consider that axis when performing point comparisons.
    pub fn new(normal: Vector3<f64>, dist: f64) -> Hyperplane {
        match normal {
            n if n == Vector3::unit_x() => Self::axis_x(dist),
            n if n == Vector3::unit_y() => Self::axis_y(dist),
            n if n == Vector3::unit_z() => Self::axis_z(dist),
            _ => Self::from_normal(normal, dist),
        }
    }

    pub fn axis_x(dist: f64) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(Axis::X),
            dist,
        }
    }

    pub fn axis_y(dist: f64) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(Axis::Y),
            dist,
        }
    }

    pub fn axis_z(dist: f64) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Axis(Axis::Z),
            dist,
        }
    }

    /// Creates a new hyperplane aligned along the given normal, `dist` units away from the origin.
    ///
    /// This function will force the hyperplane alignment to be represented as a normal even if it
    /// is aligned along an axis.
    pub fn from_normal(normal: Vector3<f64>, dist: f64) -> Hyperplane {
        Hyperplane {
            alignment: Alignment::Normal(normal.normalize()),
            dist,
        }
    }

    /// Derives a plane from three points as written in a map file.
    ///
    /// Map files list face points clockwise when seen from outside the brush, so the outward
    /// normal is `(p2 - p0) × (p1 - p0)`. Fails if the cross product is shorter than `epsilon`.
    pub fn from_points(
        p0: Vector3<f64>,
        p1: Vector3<f64>,
        p2: Vector3<f64>,
        epsilon: f64,
    ) -> Result<Hyperplane, DegeneratePlane> {
        let cross = (p2 - p0).cross(p1 - p0);
        let magnitude = cross.magnitude();

        // also rejects NaN
        if !(magnitude >= epsilon) {
            return Err(DegeneratePlane);
        }

        let normal = cross / magnitude;
        Ok(Hyperplane::new(normal, normal.dot(p0)))
    }

    /// Returns the surface normal of this plane.
    pub fn normal(&self) -> Vector3<f64> {
        match self.alignment {
            Alignment::Axis(ax) => match ax {
                Axis::X => Vector3::unit_x(),
                Axis::Y => Vector3::unit_y(),
                Axis::Z => Vector3::unit_z(),
            },
            Alignment::Normal(normal) => normal,
        }
    }

    /// Returns the signed distance of this plane from the origin along its normal.
    pub fn dist(&self) -> f64 {
        self.dist
    }

    /// Calculates the signed distance between this hyperplane and the given point.
    pub fn point_dist(&self, point: Vector3<f64>) -> f64 {
        match self.alignment {
            Alignment::Axis(a) => point[a as usize] - self.dist,
            Alignment::Normal(n) => point.dot(n) - self.dist,
        }
    }

    /// Classifies the given point as inside, on or outside this plane.
    pub fn classify(&self, point: Vector3<f64>, epsilon: f64) -> PointSide {
        PointSide::from_dist(self.point_dist(point), epsilon)
    }

    /// Returns true if both planes face the same way and lie at the same distance.
    ///
    /// `normal_epsilon` bounds `1 - cos θ` between the normals.
    pub fn approx_eq(&self, other: &Hyperplane, normal_epsilon: f64, dist_epsilon: f64) -> bool {
        self.normal().dot(other.normal()) >= 1.0 - normal_epsilon
            && (self.dist - other.dist).abs() <= dist_epsilon
    }

    /// Returns three points on this plane in map winding order, so that `from_points` recovers
    /// the same plane.
    pub fn points(&self) -> [Vector3<f64>; 3] {
        let n = self.normal();
        let reference = if n.x.abs() < 0.5 {
            Vector3::unit_x()
        } else if n.y.abs() < 0.5 {
            Vector3::unit_y()
        } else {
            Vector3::unit_z()
        };

        // u × v == n
        let u = n.cross(reference).normalize();
        let v = n.cross(u);
        let p0 = n * self.dist;

        [p0, p0 + v * 64.0, p0 + u * 64.0]
    }
}

/// Finds the single point shared by three planes.
///
/// Returns `None` if the system is singular, i.e. the magnitude of the determinant of the three
/// normals is below `det_epsilon` (two or more planes are parallel or the three share a line).
pub fn intersect_planes(
    a: &Hyperplane,
    b: &Hyperplane,
    c: &Hyperplane,
    det_epsilon: f64,
) -> Option<Vector3<f64>> {
    let (n1, n2, n3) = (a.normal(), b.normal(), c.normal());

    let n2_x_n3 = n2.cross(n3);
    let det = n1.dot(n2_x_n3);
    if !(det.abs() >= det_epsilon) {
        return None;
    }

    let point = (n2_x_n3 * a.dist() + n3.cross(n1) * b.dist() + n1.cross(n2) * c.dist()) / det;

    if point.x.is_finite() && point.y.is_finite() && point.z.is_finite() {
        Some(point)
    } else {
        None
    }
}

/// An axis-aligned bounding volume.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::cube(DEFAULT_WORLD_EXTENT)
    }
}

impl Bounds {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Bounds {
        Bounds { min, max }
    }

    /// A cube centered on the origin reaching `extent` units along each axis.
    pub fn cube(extent: f64) -> Bounds {
        let e = extent.abs();
        Bounds {
            min: Vector3::new(-e, -e, -e),
            max: Vector3::new(e, e, e),
        }
    }

    /// Calculates the tightest bounds around the given points.
    ///
    /// Returns `None` if `points` is empty.
    pub fn from_points<'a, I>(points: I) -> Option<Bounds>
    where
        I: IntoIterator<Item = &'a Vector3<f64>>,
    {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut bounds = Bounds {
            min: first,
            max: first,
        };

        for p in points {
            for c in 0..3 {
                bounds.min[c] = p[c].min(bounds.min[c]);
                bounds.max[c] = p[c].max(bounds.max[c]);
            }
        }

        Some(bounds)
    }

    /// Returns true if `point` lies within these bounds, allowing `epsilon` of slack on each side.
    pub fn contains(&self, point: Vector3<f64>, epsilon: f64) -> bool {
        (0..3).all(|c| point[c] >= self.min[c] - epsilon && point[c] <= self.max[c] + epsilon)
    }
}

/// Returns the average of the given points, or the origin if there are none.
pub fn centroid<'a, I>(points: I) -> Vector3<f64>
where
    I: IntoIterator<Item = &'a Vector3<f64>>,
{
    let mut sum = Vector3::zero();
    let mut count = 0;
    for p in points {
        sum += *p;
        count += 1;
    }

    match count {
        0 => sum,
        n => sum / n as f64,
    }
}
