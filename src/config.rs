//! Page-level configuration: which assets to load, their controls and the
//! clip-plane sliders.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clip::{Axis, ClipPlane, ClipPlaneSet, PlaneId};
use crate::controls::ControlId;
use crate::geometry::Representation;
use crate::ingest::{SurfaceAsset, TrajectoryAsset};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("control id '{0}' is used more than once")]
    DuplicateControl(ControlId),
    #[error("clip slider '{slider}' has an empty range: min {min} >= max {max}")]
    EmptyRange { slider: ControlId, min: f32, max: f32 },
}

/// One clip-plane slider and the plane it moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPlaneDecl {
    pub label: String,
    pub slider: ControlId,
    pub axis: Axis,
    /// Kept side is `+axis` when true, `-axis` otherwise.
    pub facing_positive: bool,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    /// Starting offset; usually the end of the range the plane faces away from.
    pub initial: f32,
}

impl ClipPlaneDecl {
    fn new(label: &str, slider: &str, axis: Axis, facing_positive: bool, range: (f32, f32), step: f32) -> Self {
        let (min, max) = range;
        Self {
            label: label.into(),
            slider: slider.into(),
            axis,
            facing_positive,
            min,
            max,
            step,
            initial: if facing_positive { min } else { max },
        }
    }

    pub fn plane(&self) -> ClipPlane {
        ClipPlane::new(self.label.clone(), self.axis, self.facing_positive, self.initial)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Deployment prefix; assets live under `{base_path}models/`.
    pub base_path: String,
    pub background: [f32; 3],
    pub layers: Vec<SurfaceAsset>,
    pub trajectory: Option<TrajectoryAsset>,
    pub clip_planes: Vec<ClipPlaneDecl>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let layer = |name: &str,
                     label: &str,
                     toggle: &str,
                     slider: &str,
                     opacity: f32,
                     representation: Representation,
                     visible: bool,
                     legend: &str| SurfaceAsset {
            name: name.into(),
            label: label.into(),
            opacity,
            toggle: toggle.into(),
            slider: slider.into(),
            representation,
            line_width: 1.0,
            point_size: (representation == Representation::Points).then_some(2.0),
            visible,
            legend: Some(legend.into()),
        };
        use Representation::*;
        Self {
            base_path: "/".into(),
            background: [0.2, 0.2, 0.2],
            layers: vec![
                layer("pointcloud.ply", "Point Cloud", "togglePointCloud", "opacity-slider-pointcloud", 1.0, Points, true, "circular-box pointcloud-color"),
                layer("mesh.ply", "Boundary voxels", "toggleMesh", "opacity-slider-mesh-voxels", 0.1, Wireframe, false, "legend-box mesh-color"),
                layer("Scanned.ply", "Occupied voxels", "toggleScanned", "opacity-slider-scanned", 0.9, Surface, false, "quadrant-box scanned-color"),
                layer("Seen.ply", "Void voxels", "toggleVoidVoxels", "opacity-slider-void-voxels", 0.4, Surface, false, "legend-box voidvoxels-color"),
                layer("Unknown.ply", "Unseen voxels", "toggleUnknownVoxels", "opacity-slider-unknown-voxels", 0.4, Surface, false, "legend-box unknownvoxels-color"),
                layer("BuildingHull.ply", "Building hull", "toggleHull", "opacity-slider-building-hull", 0.4, Wireframe, false, "legend-box buildinghull-color"),
            ],
            trajectory: Some(TrajectoryAsset::default()),
            clip_planes: vec![
                ClipPlaneDecl::new("Vertical Clip (L->R)", "vertical-clip-slider", Axis::X, true, (-13.0, 7.5), 0.01),
                ClipPlaneDecl::new("Vertical Clip (R->L)", "vertical-clip-slider-2", Axis::X, false, (-13.0, 7.5), 0.01),
                ClipPlaneDecl::new("Horizontal Clip (B->T)", "horizontal-clip-slider", Axis::Y, true, (-2.0, 7.0), 0.01),
                ClipPlaneDecl::new("Horizontal Clip (T->B)", "horizontal-clip-slider-2", Axis::Y, false, (-2.0, 7.0), 0.01),
                ClipPlaneDecl::new("Depth clip (N->F)", "z-axis-clip-slider", Axis::Z, false, (-1.7, 7.0), 0.1),
                ClipPlaneDecl::new("Depth clip (F->N)", "z-axis-clip-slider-2", Axis::Z, true, (-1.7, 7.0), 0.01),
            ],
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Every control id must be unique across layers, the trajectory and
    /// the clip sliders; slider ranges must not be empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let ids = self
            .layers
            .iter()
            .flat_map(|l| [&l.toggle, &l.slider])
            .chain(self.trajectory.iter().flat_map(|t| [&t.toggle, &t.slider]))
            .chain(self.clip_planes.iter().map(|c| &c.slider));
        for id in ids {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateControl(id.clone()));
            }
        }
        for c in &self.clip_planes {
            if c.min >= c.max {
                return Err(ConfigError::EmptyRange { slider: c.slider.clone(), min: c.min, max: c.max });
            }
        }
        Ok(())
    }

    /// Builds the plane set and pairs each slider with its plane.
    pub fn clip_plane_set(&self) -> (ClipPlaneSet, Vec<(ControlId, PlaneId)>) {
        let mut set = ClipPlaneSet::new();
        let sliders = self
            .clip_planes
            .iter()
            .map(|decl| (decl.slider.clone(), set.push(decl.plane())))
            .collect();
        (set, sliders)
    }
}
