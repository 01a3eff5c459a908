//! Axis-aligned half-space clipping planes shared by every renderable.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Stable identifier of a plane within its [`ClipPlaneSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaneId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vector3<f32> {
        match self {
            Axis::X => Vector3::x(),
            Axis::Y => Vector3::y(),
            Axis::Z => Vector3::z(),
        }
    }
}

/// One half-space. Points with `dot(normal, p - origin) >= 0` survive.
///
/// The normal is fixed at creation; only the offset along the plane's axis
/// moves, and it is never range-checked here.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipPlane {
    label: String,
    axis: Axis,
    normal: Vector3<f32>,
    offset: f32,
}

impl ClipPlane {
    /// `facing_positive` selects `+axis` or `-axis` as the kept side.
    pub fn new(label: impl Into<String>, axis: Axis, facing_positive: bool, offset: f32) -> Self {
        let normal = if facing_positive { axis.unit() } else { -axis.unit() };
        Self { label: label.into(), axis, normal, offset }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn normal(&self) -> Vector3<f32> {
        self.normal
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Origin on the plane's axis, e.g. `(offset, 0, 0)` for an X plane.
    pub fn origin(&self) -> Point3<f32> {
        Point3::from(self.axis.unit() * self.offset)
    }

    pub fn contains(&self, p: &Point3<f32>) -> bool {
        self.normal.dot(&(p - self.origin())) >= 0.0
    }

    /// `[nx, ny, nz, d]` such that a point is kept iff `n·p + d >= 0`.
    pub fn equation(&self) -> [f32; 4] {
        let d = -self.normal.dot(&self.origin().coords);
        [self.normal.x, self.normal.y, self.normal.z, d]
    }
}

/// Variable-size set of clip planes, addressed by [`PlaneId`].
///
/// Planes are only ever appended, so ids stay valid for the whole session.
#[derive(Debug, Clone, Default)]
pub struct ClipPlaneSet {
    planes: Vec<ClipPlane>,
}

impl ClipPlaneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, plane: ClipPlane) -> PlaneId {
        self.planes.push(plane);
        PlaneId(self.planes.len() - 1)
    }

    pub fn get(&self, id: PlaneId) -> Option<&ClipPlane> {
        self.planes.get(id.0)
    }

    /// Moves exactly one plane. Out-of-range values pass through unchanged.
    pub fn set_offset(&mut self, id: PlaneId, value: f32) -> Result<()> {
        let plane = self.planes.get_mut(id.0).ok_or(ViewerError::UnknownPlane(id))?;
        plane.offset = value;
        Ok(())
    }

    pub fn ids(&self) -> impl Iterator<Item = PlaneId> + '_ {
        (0..self.planes.len()).map(PlaneId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaneId, &ClipPlane)> {
        self.planes.iter().enumerate().map(|(i, p)| (PlaneId(i), p))
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    /// True if any plane rejects `p`.
    pub fn clips(&self, p: &Point3<f32>) -> bool {
        self.planes.iter().any(|plane| !plane.contains(p))
    }

    /// Plane equations for the given subset, skipping ids that do not exist.
    pub fn equations(&self, ids: &[PlaneId]) -> Vec<[f32; 4]> {
        ids.iter().filter_map(|id| self.get(*id)).map(ClipPlane::equation).collect()
    }
}
