//! The scene: registry, clip planes and control bindings behind one
//! `RefCell`, plus the dispatch of control events into them.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::clip::{ClipPlaneSet, PlaneId};
use crate::controls::{
    BindingTarget, ControlBindings, ControlEvent, ControlHost, ControlId, ControlKind, EventSink,
    LayerRow, Legend, RowHandle,
};
use crate::error::{Result, ViewerError};
use crate::geometry::RenderObject;
use crate::layers::{LayerHandle, LayerRegistry, Renderable};
use crate::renderer::{Frame, FrameObject, SceneRenderer};

pub type SharedScene = Rc<RefCell<Scene>>;

pub struct Scene {
    registry: LayerRegistry,
    clip: ClipPlaneSet,
    bindings: ControlBindings,
    renderer: Box<dyn SceneRenderer>,
    host: Rc<dyn ControlHost>,
    this: Weak<RefCell<Scene>>,
    redraws: u64,
}

impl Scene {
    pub fn new(
        renderer: Box<dyn SceneRenderer>,
        host: Rc<dyn ControlHost>,
        clip: ClipPlaneSet,
    ) -> SharedScene {
        Rc::new_cyclic(|this| {
            RefCell::new(Scene {
                registry: LayerRegistry::new(),
                clip,
                bindings: ControlBindings::new(),
                renderer,
                host,
                this: this.clone(),
                redraws: 0,
            })
        })
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn clip_planes(&self) -> &ClipPlaneSet {
        &self.clip
    }

    pub fn bindings(&self) -> &ControlBindings {
        &self.bindings
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Hands `object` to the renderer and attaches every clip plane to it.
    pub fn add_renderable(
        &mut self,
        object: &RenderObject,
        visible: bool,
        opacity: f32,
    ) -> Result<Renderable> {
        let id = self.renderer.add_object(object)?;
        Ok(Renderable {
            id,
            representation: object.representation,
            style: object.style,
            visible,
            opacity: opacity.clamp(0.0, 1.0),
            clip_planes: self.clip.ids().collect(),
        })
    }

    /// Registers a layer and binds its toggle and slider if the page has
    /// them. A missing control is skipped; the layer still renders.
    pub fn register_layer(
        &mut self,
        label: &str,
        renderables: Vec<Renderable>,
        toggle: ControlId,
        slider: ControlId,
    ) -> Result<LayerHandle> {
        self.ensure_unbound(&[&toggle, &slider])?;
        let handle = self.registry.register_layer(label, renderables, toggle, slider)?;
        self.bind_layer_controls(handle)?;
        Ok(handle)
    }

    /// Registers a layer whose row and controls do not exist yet: the host
    /// synthesizes them, then they are bound like declared ones.
    pub fn append_dynamic_layer(
        &mut self,
        label: &str,
        renderables: Vec<Renderable>,
        toggle: ControlId,
        slider: ControlId,
        legend: Legend,
    ) -> Result<(LayerHandle, RowHandle)> {
        self.ensure_unbound(&[&toggle, &slider])?;
        let handle =
            self.registry.register_dynamic_layer(label, renderables, toggle.clone(), slider.clone())?;
        let layer = self.registry.layer(handle).ok_or(ViewerError::UnknownLayer(handle))?;
        let row = self.host.append_layer_row(&LayerRow {
            label: label.to_owned(),
            toggle,
            slider,
            checked: layer.visible(),
            opacity: layer.opacity(),
            legend,
        })?;
        self.bind_layer_controls(handle)?;
        Ok((handle, row))
    }

    /// Binds a clip-plane slider. Returns `false` if the page has no such
    /// control.
    pub fn bind_clip_slider(&mut self, control: ControlId, plane: PlaneId) -> Result<bool> {
        let offset = self.clip.get(plane).ok_or(ViewerError::UnknownPlane(plane))?.offset();
        if self.host.lookup(&control).is_none() {
            log::debug!("no clip slider '{control}' in page, plane {plane:?} stays fixed");
            return Ok(false);
        }
        self.bindings.bind(control.clone(), BindingTarget::ClipOffset(plane))?;
        self.host.listen(&control, ControlKind::Slider, self.sink())?;
        self.host.set_value(&control, offset as f64);
        Ok(true)
    }

    fn ensure_unbound(&self, ids: &[&ControlId]) -> Result<()> {
        match ids.iter().find(|id| self.bindings.is_bound(id)) {
            Some(id) => Err(ViewerError::DuplicateBinding((*id).clone())),
            None => Ok(()),
        }
    }

    fn bind_layer_controls(&mut self, handle: LayerHandle) -> Result<()> {
        let layer = self.registry.layer(handle).ok_or(ViewerError::UnknownLayer(handle))?;
        let (toggle, slider) = (layer.toggle().clone(), layer.slider().clone());
        let (visible, opacity) = (layer.visible(), layer.opacity());

        if self.bind_control(&toggle, ControlKind::Toggle, BindingTarget::Visibility(handle))? {
            self.host.set_checked(&toggle, visible);
        }
        if self.bind_control(&slider, ControlKind::Slider, BindingTarget::Opacity(handle))? {
            self.host.set_value(&slider, opacity as f64);
        }
        Ok(())
    }

    fn bind_control(&mut self, id: &ControlId, kind: ControlKind, target: BindingTarget) -> Result<bool> {
        match self.host.lookup(id) {
            None => {
                log::debug!("control '{id}' not found, skipping {target:?}");
                Ok(false)
            }
            Some(found) if found != kind => {
                log::warn!("control '{id}' is a {found:?}, expected {kind:?}; not bound");
                Ok(false)
            }
            Some(_) => {
                self.bindings.bind(id.clone(), target)?;
                self.host.listen(id, kind, self.sink())?;
                Ok(true)
            }
        }
    }

    fn sink(&self) -> EventSink {
        let scene = self.this.clone();
        Rc::new(move |event: ControlEvent| dispatch(&scene, event))
    }

    /// Applies one control event and redraws. Returns whether anything
    /// changed; events for unbound controls are ignored.
    pub fn dispatch(&mut self, event: &ControlEvent) -> bool {
        let Some(target) = self.bindings.target(event.id()) else {
            log::debug!("ignoring event for unbound control '{}'", event.id());
            return false;
        };
        let applied = match (event, target) {
            (ControlEvent::Toggled { checked, .. }, BindingTarget::Visibility(layer)) => {
                self.registry.set_visibility(layer, *checked)
            }
            (ControlEvent::Input { value, .. }, BindingTarget::Opacity(layer)) => {
                self.registry.set_opacity(layer, *value as f32).map(drop)
            }
            (ControlEvent::Input { value, .. }, BindingTarget::ClipOffset(plane)) => {
                self.clip.set_offset(plane, *value as f32)
            }
            (event, target) => {
                log::warn!("event {event:?} does not fit binding {target:?}");
                return false;
            }
        };
        match applied {
            Ok(()) => {
                self.request_redraw();
                true
            }
            Err(e) => {
                log::warn!("control '{}': {e}", event.id());
                false
            }
        }
    }

    /// Snapshot of every registered renderable with its clip equations.
    pub fn frame(&self) -> Frame {
        let objects = self
            .registry
            .renderables()
            .map(|r| FrameObject {
                id: r.id,
                visible: r.visible,
                opacity: r.opacity,
                style: r.style,
                clip_planes: self.clip.equations(&r.clip_planes),
            })
            .collect();
        Frame { objects }
    }

    pub fn request_redraw(&mut self) {
        let frame = self.frame();
        self.renderer.render(&frame);
        self.redraws += 1;
    }

    pub fn reset_camera(&mut self) {
        self.renderer.reset_camera();
    }

    /// New drawing-buffer size: refits the camera and redraws.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.set_viewport(width, height);
        self.renderer.reset_camera();
        self.request_redraw();
    }
}

/// Routes an event to a scene that may already be gone. A dropped scene
/// makes this a no-op, and so does an event arriving while the scene is
/// borrowed.
pub fn dispatch(scene: &Weak<RefCell<Scene>>, event: ControlEvent) {
    let Some(scene) = scene.upgrade() else {
        log::debug!("scene dropped, ignoring {event:?}");
        return;
    };
    match scene.try_borrow_mut() {
        Ok(mut scene) => {
            scene.dispatch(&event);
        }
        Err(_) => log::warn!("scene busy, dropping {event:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Axis, ClipPlane};
    use crate::geometry::{Representation, Style, Topology};
    use crate::testing::{FakeHost, RecordingRenderer};
    use nalgebra::Point3;

    fn clip_set() -> ClipPlaneSet {
        let mut set = ClipPlaneSet::new();
        set.push(ClipPlane::new("Vertical Clip (L->R)", Axis::X, true, -13.0));
        set.push(ClipPlane::new("Vertical Clip (R->L)", Axis::X, false, 7.5));
        set
    }

    fn object(name: &str) -> RenderObject {
        RenderObject {
            name: name.into(),
            points: vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)],
            colors: None,
            topology: Topology::None,
            representation: Representation::Surface,
            style: Style::default(),
        }
    }

    fn setup(host: &Rc<FakeHost>) -> (SharedScene, RecordingRenderer) {
        let renderer = RecordingRenderer::default();
        let scene = Scene::new(Box::new(renderer.clone()), host.clone(), clip_set());
        (scene, renderer)
    }

    fn mesh_layer(scene: &SharedScene) -> LayerHandle {
        let mut s = scene.borrow_mut();
        let r = s.add_renderable(&object("mesh.ply"), false, 0.1).unwrap();
        s.register_layer("Mesh", vec![r], "toggleMesh".into(), "opacity-slider-mesh".into())
            .unwrap()
    }

    #[test]
    fn renderables_get_every_clip_plane() {
        let host = Rc::new(FakeHost::default());
        let (scene, _) = setup(&host);
        let r = scene.borrow_mut().add_renderable(&object("a"), true, 3.0).unwrap();
        assert_eq!(r.clip_planes, vec![PlaneId(0), PlaneId(1)]);
        assert_eq!(r.opacity, 1.0);
    }

    #[test]
    fn declared_controls_reflect_initial_state_and_drive_the_layer() {
        let host = Rc::new(FakeHost::default().with_toggle("toggleMesh", true).with_slider("opacity-slider-mesh", 1.0));
        let (scene, renderer) = setup(&host);
        let h = mesh_layer(&scene);

        assert_eq!(host.checked("toggleMesh"), Some(false));
        assert_eq!(host.value("opacity-slider-mesh"), Some(0.1));

        let before = scene.borrow().redraw_count();
        host.fire_toggle("toggleMesh", true);
        assert!(scene.borrow().registry().layer(h).unwrap().visible());
        assert_eq!(scene.borrow().redraw_count(), before + 1);
        let frame = renderer.last_frame().unwrap();
        assert!(frame.objects[0].visible);

        host.fire_input("opacity-slider-mesh", 0.7);
        let layer_opacity = scene.borrow().registry().layer(h).unwrap().opacity();
        assert!((layer_opacity - 0.7).abs() < 1e-6);
    }

    #[test]
    fn missing_controls_are_tolerated() {
        let host = Rc::new(FakeHost::default().with_toggle("toggleMesh", true));
        let (scene, _) = setup(&host);
        let h = mesh_layer(&scene);
        let s = scene.borrow();
        assert!(s.bindings().is_bound(&"toggleMesh".into()));
        assert!(!s.bindings().is_bound(&"opacity-slider-mesh".into()));
        assert!(s.registry().layer(h).is_some());
    }

    #[test]
    fn a_control_cannot_drive_two_layers() {
        let host = Rc::new(
            FakeHost::default()
                .with_toggle("toggleVoidVoxels", false)
                .with_slider("opacity-slider-void-voxels", 0.4),
        );
        let (scene, _) = setup(&host);
        let mut s = scene.borrow_mut();
        let a = s.add_renderable(&object("Seen.ply"), false, 0.4).unwrap();
        s.register_layer("Void voxels", vec![a], "toggleVoidVoxels".into(), "opacity-slider-void-voxels".into())
            .unwrap();
        let b = s.add_renderable(&object("Unknown.ply"), false, 0.4).unwrap();
        let err = s
            .register_layer("Unseen voxels", vec![b], "toggleUnknownVoxels".into(), "opacity-slider-void-voxels".into())
            .unwrap_err();
        assert!(matches!(err, ViewerError::DuplicateBinding(_)));
        assert_eq!(s.registry().len(), 1);
        assert_eq!(host.listener_count("opacity-slider-void-voxels"), 1);
    }

    #[test]
    fn clip_slider_moves_only_its_plane() {
        let host = Rc::new(
            FakeHost::default()
                .with_slider("vertical-clip-slider", 0.0)
                .with_slider("vertical-clip-slider-2", 0.0),
        );
        let (scene, renderer) = setup(&host);
        mesh_layer(&scene);
        {
            let mut s = scene.borrow_mut();
            assert!(s.bind_clip_slider("vertical-clip-slider".into(), PlaneId(0)).unwrap());
            assert!(s.bind_clip_slider("vertical-clip-slider-2".into(), PlaneId(1)).unwrap());
            assert!(!s.bind_clip_slider("z-axis-clip-slider".into(), PlaneId(1)).unwrap());
        }
        assert_eq!(host.value("vertical-clip-slider"), Some(-13.0));

        host.fire_input("vertical-clip-slider", 0.0);

        let s = scene.borrow();
        assert_eq!(s.clip_planes().get(PlaneId(0)).unwrap().origin(), Point3::origin());
        assert_eq!(s.clip_planes().get(PlaneId(1)).unwrap().origin(), Point3::new(7.5, 0.0, 0.0));
        let frame = renderer.last_frame().unwrap();
        assert_eq!(frame.objects[0].clip_planes[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn binding_an_unknown_plane_fails() {
        let host = Rc::new(FakeHost::default().with_slider("s", 0.0));
        let (scene, _) = setup(&host);
        assert!(matches!(
            scene.borrow_mut().bind_clip_slider("s".into(), PlaneId(7)),
            Err(ViewerError::UnknownPlane(PlaneId(7)))
        ));
    }

    #[test]
    fn dynamic_layers_synthesize_their_row() {
        let host = Rc::new(FakeHost::default());
        let (scene, _) = setup(&host);
        let mut s = scene.borrow_mut();
        let line = s.add_renderable(&object("line"), true, 1.0).unwrap();
        let pts = s.add_renderable(&object("points"), true, 1.0).unwrap();
        let (h, row) = s
            .append_dynamic_layer(
                "Camera trajectory",
                vec![line, pts],
                "toggleLinePoints".into(),
                "opacity-slider-linepoints".into(),
                Legend { color: [1.0, 1.0, 1.0] },
            )
            .unwrap();
        drop(s);

        assert_eq!(host.rows().len(), 1);
        assert_eq!(row.element_id, "toggleLinePoints-row");
        assert_eq!(host.checked("toggleLinePoints"), Some(true));

        host.fire_input("opacity-slider-linepoints", 0.5);
        let s = scene.borrow();
        for r in s.registry().layer(h).unwrap().renderables() {
            assert_eq!(r.opacity, 0.5);
        }
    }

    #[test]
    fn events_after_teardown_are_ignored() {
        let host = Rc::new(FakeHost::default().with_toggle("toggleMesh", true).with_slider("opacity-slider-mesh", 1.0));
        let (scene, renderer) = setup(&host);
        mesh_layer(&scene);
        let frames = renderer.frame_count();
        drop(scene);

        host.fire_toggle("toggleMesh", true);
        host.fire_input("opacity-slider-mesh", 0.3);
        assert_eq!(renderer.frame_count(), frames);
    }

    #[test]
    fn resize_refits_and_redraws() {
        let host = Rc::new(FakeHost::default());
        let (scene, renderer) = setup(&host);
        mesh_layer(&scene);
        scene.borrow_mut().resize(1280, 720);

        let log = renderer.log.borrow();
        assert_eq!(log.viewport, Some((1280, 720)));
        assert_eq!(log.camera_resets, 1);
        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.frames[0].objects.len(), 1);
    }

    #[test]
    fn mismatched_and_unbound_events_do_nothing() {
        let host = Rc::new(FakeHost::default().with_toggle("toggleMesh", true));
        let (scene, _) = setup(&host);
        mesh_layer(&scene);
        let mut s = scene.borrow_mut();
        assert!(!s.dispatch(&ControlEvent::Input { id: "toggleMesh".into(), value: 0.5 }));
        assert!(!s.dispatch(&ControlEvent::Toggled { id: "nowhere".into(), checked: true }));
        assert_eq!(s.redraw_count(), 0);
    }
}
