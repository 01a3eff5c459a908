//! Layers: named groups of renderables that share one visibility toggle and
//! one opacity slider.

use crate::clip::PlaneId;
use crate::controls::ControlId;
use crate::error::{Result, ViewerError};
use crate::geometry::{Representation, Style};

/// Opaque handle issued by the [`SceneRenderer`](crate::renderer::SceneRenderer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderableId(pub u32);

/// Renderer-side object plus the state the controls drive.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub id: RenderableId,
    pub representation: Representation,
    pub style: Style,
    pub visible: bool,
    pub opacity: f32,
    pub clip_planes: Vec<PlaneId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerOrigin {
    /// Controls live in markup declared up front.
    Declared,
    /// Controls were synthesized when the layer was appended.
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct Layer {
    label: String,
    renderables: Vec<Renderable>,
    toggle: ControlId,
    slider: ControlId,
    visible: bool,
    opacity: f32,
    origin: LayerOrigin,
}

impl Layer {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn renderables(&self) -> &[Renderable] {
        &self.renderables
    }

    pub fn toggle(&self) -> &ControlId {
        &self.toggle
    }

    pub fn slider(&self) -> &ControlId {
        &self.slider
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn origin(&self) -> LayerOrigin {
        self.origin
    }
}

/// Owns every layer of the scene. Layers are never removed, so handles
/// stay valid until the registry itself is dropped.
#[derive(Debug, Default)]
pub struct LayerRegistry {
    layers: Vec<Layer>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a layer whose controls already exist in the page.
    ///
    /// The first renderable's visibility and opacity become the layer state
    /// and are applied to every member.
    pub fn register_layer(
        &mut self,
        label: &str,
        renderables: Vec<Renderable>,
        toggle: ControlId,
        slider: ControlId,
    ) -> Result<LayerHandle> {
        self.insert(label, renderables, toggle, slider, LayerOrigin::Declared)
    }

    /// Registers a layer whose controls are synthesized by the caller.
    pub fn register_dynamic_layer(
        &mut self,
        label: &str,
        renderables: Vec<Renderable>,
        toggle: ControlId,
        slider: ControlId,
    ) -> Result<LayerHandle> {
        self.insert(label, renderables, toggle, slider, LayerOrigin::Dynamic)
    }

    fn insert(
        &mut self,
        label: &str,
        mut renderables: Vec<Renderable>,
        toggle: ControlId,
        slider: ControlId,
        origin: LayerOrigin,
    ) -> Result<LayerHandle> {
        let Some(first) = renderables.first() else {
            return Err(ViewerError::EmptyLayer { label: label.to_owned() });
        };
        let visible = first.visible;
        let opacity = first.opacity.clamp(0.0, 1.0);
        for r in &mut renderables {
            r.visible = visible;
            r.opacity = opacity;
        }
        self.layers.push(Layer {
            label: label.to_owned(),
            renderables,
            toggle,
            slider,
            visible,
            opacity,
            origin,
        });
        Ok(LayerHandle(self.layers.len() - 1))
    }

    pub fn layer(&self, handle: LayerHandle) -> Option<&Layer> {
        self.layers.get(handle.0)
    }

    fn layer_mut(&mut self, handle: LayerHandle) -> Result<&mut Layer> {
        self.layers.get_mut(handle.0).ok_or(ViewerError::UnknownLayer(handle))
    }

    pub fn set_visibility(&mut self, handle: LayerHandle, visible: bool) -> Result<()> {
        let layer = self.layer_mut(handle)?;
        layer.visible = visible;
        for r in &mut layer.renderables {
            r.visible = visible;
        }
        Ok(())
    }

    /// Clamps into `[0, 1]` and applies to every member; returns the value
    /// actually applied. NaN leaves the layer unchanged.
    pub fn set_opacity(&mut self, handle: LayerHandle, opacity: f32) -> Result<f32> {
        let layer = self.layer_mut(handle)?;
        if opacity.is_nan() {
            log::warn!("ignoring NaN opacity for layer '{}'", layer.label);
            return Ok(layer.opacity);
        }
        let opacity = opacity.clamp(0.0, 1.0);
        layer.opacity = opacity;
        for r in &mut layer.renderables {
            r.opacity = opacity;
        }
        Ok(opacity)
    }

    pub fn find_by_label(&self, label: &str) -> Option<LayerHandle> {
        self.layers.iter().position(|l| l.label == label).map(LayerHandle)
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerHandle, &Layer)> {
        self.layers.iter().enumerate().map(|(i, l)| (LayerHandle(i), l))
    }

    pub fn renderables(&self) -> impl Iterator<Item = &Renderable> {
        self.layers.iter().flat_map(|l| l.renderables.iter())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderable(id: u32, visible: bool, opacity: f32) -> Renderable {
        Renderable {
            id: RenderableId(id),
            representation: Representation::Surface,
            style: Style::default(),
            visible,
            opacity,
            clip_planes: vec![PlaneId(0), PlaneId(1)],
        }
    }

    fn pair(reg: &mut LayerRegistry) -> LayerHandle {
        reg.register_layer(
            "Camera trajectory",
            vec![renderable(1, true, 1.0), renderable(2, false, 0.3)],
            ControlId::from("toggleLinePoints"),
            ControlId::from("opacity-slider-linepoints"),
        )
        .unwrap()
    }

    fn assert_consistent(layer: &Layer) {
        for r in layer.renderables() {
            assert_eq!(r.visible, layer.visible());
            assert_eq!(r.opacity, layer.opacity());
        }
    }

    #[test]
    fn empty_layers_are_rejected() {
        let mut reg = LayerRegistry::new();
        let err = reg
            .register_layer("Mesh", vec![], ControlId::from("toggleMesh"), ControlId::from("s"))
            .unwrap_err();
        assert!(matches!(err, ViewerError::EmptyLayer { ref label } if label == "Mesh"));
        assert!(reg.is_empty());
    }

    #[test]
    fn registration_unifies_member_state() {
        let mut reg = LayerRegistry::new();
        let h = pair(&mut reg);
        let layer = reg.layer(h).unwrap();
        assert!(layer.visible());
        assert_eq!(layer.opacity(), 1.0);
        assert_consistent(layer);
    }

    #[test]
    fn every_member_follows_any_sequence_of_changes() {
        let mut reg = LayerRegistry::new();
        let h = pair(&mut reg);
        let steps: [(Option<bool>, Option<f32>); 6] = [
            (Some(false), None),
            (None, Some(0.25)),
            (Some(true), Some(0.9)),
            (None, Some(-3.0)),
            (Some(false), None),
            (None, Some(0.6)),
        ];
        for (vis, op) in steps {
            if let Some(v) = vis {
                reg.set_visibility(h, v).unwrap();
            }
            if let Some(o) = op {
                reg.set_opacity(h, o).unwrap();
            }
            assert_consistent(reg.layer(h).unwrap());
        }
        let layer = reg.layer(h).unwrap();
        assert!(!layer.visible());
        assert_eq!(layer.opacity(), 0.6);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut reg = LayerRegistry::new();
        let h = pair(&mut reg);
        assert_eq!(reg.set_opacity(h, 1.7).unwrap(), 1.0);
        assert_eq!(reg.set_opacity(h, -0.2).unwrap(), 0.0);
        assert_eq!(reg.set_opacity(h, f32::INFINITY).unwrap(), 1.0);
        assert_eq!(reg.set_opacity(h, 0.4).unwrap(), 0.4);
        assert_eq!(reg.set_opacity(h, f32::NAN).unwrap(), 0.4);
        assert_consistent(reg.layer(h).unwrap());
    }

    #[test]
    fn unknown_handles_fail() {
        let mut reg = LayerRegistry::new();
        assert!(matches!(
            reg.set_visibility(LayerHandle(3), true),
            Err(ViewerError::UnknownLayer(LayerHandle(3)))
        ));
        assert!(reg.set_opacity(LayerHandle(0), 0.5).is_err());
    }

    #[test]
    fn lookup_by_label_and_origin() {
        let mut reg = LayerRegistry::new();
        let declared = pair(&mut reg);
        let dynamic = reg
            .register_dynamic_layer(
                "Extra",
                vec![renderable(5, true, 0.5)],
                ControlId::from("t"),
                ControlId::from("s"),
            )
            .unwrap();
        assert_eq!(reg.find_by_label("Camera trajectory"), Some(declared));
        assert_eq!(reg.layer(dynamic).unwrap().origin(), LayerOrigin::Dynamic);
        assert_eq!(reg.layer(declared).unwrap().origin(), LayerOrigin::Declared);
        assert_eq!(reg.renderables().count(), 3);
    }
}
