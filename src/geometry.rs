//! Geometry handed from the loader to the renderer.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Output of a [`FileLoader`](crate::loader::FileLoader): points, optional
/// per-point colours and optional polygon connectivity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeometry {
    pub points: Vec<Point3<f32>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub faces: Option<Vec<Vec<u32>>>,
}

impl RawGeometry {
    pub fn from_points(points: Vec<Point3<f32>>) -> Self {
        Self { points, ..Self::default() }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }
}

/// How a renderable is drawn. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Points,
    Wireframe,
    #[default]
    Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Style {
    pub line_width: Option<f32>,
    pub point_size: Option<f32>,
    pub color: Option<[f32; 3]>,
}

/// Connectivity of the points of a [`RenderObject`].
#[derive(Debug, Clone, PartialEq)]
pub enum Topology {
    /// Polygons as read from the file.
    Polygons(Vec<Vec<u32>>),
    /// One open polyline through the listed points.
    Polyline(Vec<u32>),
    /// Unconnected vertices.
    Vertices(Vec<u32>),
    /// No connectivity at all; the renderer falls back to drawing points.
    None,
}

/// A creation request for the scene renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderObject {
    pub name: String,
    pub points: Vec<Point3<f32>>,
    pub colors: Option<Vec<[u8; 3]>>,
    pub topology: Topology,
    pub representation: Representation,
    pub style: Style,
}

impl RenderObject {
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    pub fn from_points(points: &[Point3<f32>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut b = Bounds { min: *first, max: *first };
        for p in rest {
            b.min = b.min.inf(p);
            b.max = b.max.sup(p);
        }
        Some(b)
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds { min: self.min.inf(&other.min), max: self.max.sup(&other.max) }
    }

    pub fn center(&self) -> Point3<f32> {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    pub fn radius(&self) -> f32 {
        (self.max - self.min).norm() * 0.5
    }
}

/// The two halves of a trajectory asset: a polyline in file order and the
/// same points as a vertex cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryGeometry {
    pub polyline: Vec<u32>,
    pub vertices: Vec<u32>,
}

/// Connects every point in file order. With fewer than two points the
/// polyline degenerates to a single index (or none) instead of failing.
pub fn trajectory(points: &[Point3<f32>]) -> TrajectoryGeometry {
    let indices: Vec<u32> = (0..points.len() as u32).collect();
    TrajectoryGeometry { polyline: indices.clone(), vertices: indices }
}
