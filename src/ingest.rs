//! Asset ingestion: fetch → decode → construct → register → bind.
//!
//! Failures stop here. The public loaders return `Option`, log the cause and
//! leave a persistent message on the loading screen; the scene only ever sees
//! layers that loaded.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::controls::{ControlId, Legend, RowHandle};
use crate::error::{LoadError, Result};
use crate::geometry::{self, RawGeometry, RenderObject, Representation, Style, Topology};
use crate::layers::{LayerHandle, RenderableId};
use crate::loader::FileLoader;
use crate::loading::LoadingCoordinator;
use crate::scene::{Scene, SharedScene};

fn one() -> f32 {
    1.0
}

fn yes() -> bool {
    true
}

/// A mesh or point-cloud layer whose controls are declared in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceAsset {
    /// File name under `{base_path}models/`.
    pub name: String,
    pub label: String,
    #[serde(default = "one")]
    pub opacity: f32,
    pub toggle: ControlId,
    pub slider: ControlId,
    #[serde(default)]
    pub representation: Representation,
    /// Only applied to wireframes.
    #[serde(default = "one")]
    pub line_width: f32,
    #[serde(default)]
    pub point_size: Option<f32>,
    #[serde(default = "yes")]
    pub visible: bool,
    /// CSS classes of the legend swatch in the layers panel, shape and
    /// colour (`circular-box pointcloud-color`). Defaults to `legend-box`.
    #[serde(default)]
    pub legend: Option<String>,
}

/// A camera path: drawn as a polyline plus its points, controlled by one
/// synthesized row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryAsset {
    pub name: String,
    pub label: String,
    pub toggle: ControlId,
    pub slider: ControlId,
    pub line_width: f32,
    pub line_color: [f32; 3],
    pub point_size: f32,
    pub point_color: [f32; 3],
    pub visible: bool,
}

impl Default for TrajectoryAsset {
    fn default() -> Self {
        Self {
            name: "trajectory.ply".into(),
            label: "Camera trajectory".into(),
            toggle: "toggleLinePoints".into(),
            slider: "opacity-slider-linepoints".into(),
            line_width: 2.0,
            line_color: [1.0, 1.0, 1.0],
            point_size: 5.0,
            point_color: [1.0, 0.0, 0.0],
            visible: true,
        }
    }
}

/// Result of a trajectory load.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryLayer {
    pub layer: LayerHandle,
    pub row: RowHandle,
    pub line: RenderableId,
    pub points: RenderableId,
}

/// Builds the single renderable of a surface asset.
pub fn surface_object(asset: &SurfaceAsset, raw: RawGeometry) -> RenderObject {
    let topology = match raw.faces {
        Some(faces) => Topology::Polygons(faces),
        None => Topology::None,
    };
    let line_width = (asset.representation == Representation::Wireframe).then_some(asset.line_width);
    RenderObject {
        name: asset.name.clone(),
        points: raw.points,
        colors: raw.colors,
        topology,
        representation: asset.representation,
        style: Style { line_width, point_size: asset.point_size, color: None },
    }
}

/// Builds the polyline and the vertex cloud of a trajectory asset.
pub fn trajectory_objects(asset: &TrajectoryAsset, raw: RawGeometry) -> [RenderObject; 2] {
    let t = geometry::trajectory(&raw.points);
    let line = RenderObject {
        name: format!("{} (line)", asset.name),
        points: raw.points.clone(),
        colors: None,
        topology: Topology::Polyline(t.polyline),
        representation: Representation::Surface,
        style: Style { line_width: Some(asset.line_width), point_size: None, color: Some(asset.line_color) },
    };
    let points = RenderObject {
        name: format!("{} (points)", asset.name),
        points: raw.points,
        colors: None,
        topology: Topology::Vertices(t.vertices),
        representation: Representation::Points,
        style: Style { line_width: None, point_size: Some(asset.point_size), color: Some(asset.point_color) },
    };
    [line, points]
}

pub struct AssetIngestor<L> {
    loader: Rc<L>,
    scene: Weak<RefCell<Scene>>,
    loading: Rc<LoadingCoordinator>,
    base_path: String,
}

impl<L: FileLoader> AssetIngestor<L> {
    pub fn new(
        loader: Rc<L>,
        scene: &SharedScene,
        loading: Rc<LoadingCoordinator>,
        base_path: &str,
    ) -> Self {
        let mut base_path = base_path.to_owned();
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        Self { loader, scene: Rc::downgrade(scene), loading, base_path }
    }

    pub fn loading(&self) -> &Rc<LoadingCoordinator> {
        &self.loading
    }

    pub fn asset_path(&self, name: &str) -> String {
        format!("{}models/{}", self.base_path, name)
    }

    async fn fetch(&self, name: &str) -> Result<RawGeometry, LoadError> {
        let path = self.asset_path(name);
        let raw = self.loader.load(&path).await?;
        match raw.bounds() {
            Some(b) => log::info!("model extents for {name}: {:?} .. {:?}", b.min, b.max),
            None => log::warn!("{name} has no points"),
        }
        Ok(raw)
    }

    /// Loads one mesh or point cloud into a declared layer.
    pub async fn load_surface_asset(&self, asset: &SurfaceAsset) -> Option<LayerHandle> {
        let ticket = self.loading.begin();
        match self.try_load_surface(asset).await {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("error loading {}: {e}", asset.name);
                ticket.fail();
                None
            }
        }
    }

    async fn try_load_surface(&self, asset: &SurfaceAsset) -> Result<Option<LayerHandle>> {
        let raw = self.fetch(&asset.name).await?;
        let object = surface_object(asset, raw);

        let Some(scene) = self.scene.upgrade() else {
            log::debug!("scene dropped before {} finished loading", asset.name);
            return Ok(None);
        };
        let mut scene = scene.borrow_mut();
        let renderable = scene.add_renderable(&object, asset.visible, asset.opacity)?;
        let handle = scene.register_layer(
            &asset.label,
            vec![renderable],
            asset.toggle.clone(),
            asset.slider.clone(),
        )?;
        scene.reset_camera();
        scene.request_redraw();
        log::info!("loaded '{}' from {}", asset.label, asset.name);
        Ok(Some(handle))
    }

    /// Loads a trajectory as a line and a point cloud grouped under one
    /// synthesized row.
    pub async fn load_trajectory_asset(&self, asset: &TrajectoryAsset) -> Option<TrajectoryLayer> {
        let ticket = self.loading.begin();
        match self.try_load_trajectory(asset).await {
            Ok(layer) => layer,
            Err(e) => {
                log::error!("error loading {}: {e}", asset.name);
                ticket.fail();
                None
            }
        }
    }

    async fn try_load_trajectory(&self, asset: &TrajectoryAsset) -> Result<Option<TrajectoryLayer>> {
        let raw = self.fetch(&asset.name).await?;
        let [line, points] = trajectory_objects(asset, raw);

        let Some(scene) = self.scene.upgrade() else {
            log::debug!("scene dropped before {} finished loading", asset.name);
            return Ok(None);
        };
        let mut scene = scene.borrow_mut();
        let line = scene.add_renderable(&line, asset.visible, 1.0)?;
        let points = scene.add_renderable(&points, asset.visible, 1.0)?;
        let (line_id, points_id) = (line.id, points.id);
        let (layer, row) = scene.append_dynamic_layer(
            &asset.label,
            vec![line, points],
            asset.toggle.clone(),
            asset.slider.clone(),
            Legend { color: asset.line_color },
        )?;
        scene.reset_camera();
        scene.request_redraw();
        log::info!("loaded '{}' from {}", asset.label, asset.name);
        Ok(Some(TrajectoryLayer { layer, row, line: line_id, points: points_id }))
    }
}
