//! In-memory stand-ins for the page, the GPU and the network.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;

use crate::controls::{ControlEvent, ControlHost, ControlId, ControlKind, EventSink, LayerRow, RowHandle};
use crate::error::{LoadError, Result, ViewerError};
use crate::geometry::{RawGeometry, RenderObject};
use crate::layers::RenderableId;
use crate::loader::FileLoader;
use crate::loading::BusyIndicator;
use crate::renderer::{Frame, SceneRenderer};

#[derive(Default)]
pub struct RendererLog {
    pub objects: Vec<RenderObject>,
    pub frames: Vec<Frame>,
    pub camera_resets: usize,
    pub viewport: Option<(u32, u32)>,
}

#[derive(Clone, Default)]
pub struct RecordingRenderer {
    pub log: Rc<RefCell<RendererLog>>,
}

impl RecordingRenderer {
    pub fn last_frame(&self) -> Option<Frame> {
        self.log.borrow().frames.last().cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.log.borrow().frames.len()
    }

    pub fn object(&self, id: RenderableId) -> Option<RenderObject> {
        self.log.borrow().objects.get(id.0 as usize).cloned()
    }
}

impl SceneRenderer for RecordingRenderer {
    fn add_object(&mut self, object: &RenderObject) -> Result<RenderableId> {
        let mut log = self.log.borrow_mut();
        log.objects.push(object.clone());
        Ok(RenderableId(log.objects.len() as u32 - 1))
    }

    fn render(&mut self, frame: &Frame) {
        self.log.borrow_mut().frames.push(frame.clone());
    }

    fn reset_camera(&mut self) {
        self.log.borrow_mut().camera_resets += 1;
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().viewport = Some((width, height));
    }
}

struct FakeControl {
    kind: ControlKind,
    checked: bool,
    value: f64,
    listeners: Vec<EventSink>,
}

#[derive(Default)]
pub struct FakeHost {
    controls: RefCell<HashMap<ControlId, FakeControl>>,
    rows: RefCell<Vec<LayerRow>>,
}

impl FakeHost {
    pub fn with_toggle(self, id: &str, checked: bool) -> Self {
        self.insert(id, ControlKind::Toggle, checked, 0.0);
        self
    }

    pub fn with_slider(self, id: &str, value: f64) -> Self {
        self.insert(id, ControlKind::Slider, false, value);
        self
    }

    fn insert(&self, id: &str, kind: ControlKind, checked: bool, value: f64) {
        self.controls
            .borrow_mut()
            .insert(id.into(), FakeControl { kind, checked, value, listeners: Vec::new() });
    }

    pub fn checked(&self, id: &str) -> Option<bool> {
        self.controls.borrow().get(&ControlId::from(id)).map(|c| c.checked)
    }

    pub fn value(&self, id: &str) -> Option<f64> {
        self.controls.borrow().get(&ControlId::from(id)).map(|c| c.value)
    }

    pub fn listener_count(&self, id: &str) -> usize {
        self.controls.borrow().get(&ControlId::from(id)).map_or(0, |c| c.listeners.len())
    }

    pub fn rows(&self) -> Vec<LayerRow> {
        self.rows.borrow().clone()
    }

    /// Simulates the user clicking a checkbox.
    pub fn fire_toggle(&self, id: &str, checked: bool) {
        let listeners = {
            let mut controls = self.controls.borrow_mut();
            let Some(c) = controls.get_mut(&ControlId::from(id)) else { return };
            c.checked = checked;
            c.listeners.clone()
        };
        for sink in listeners {
            sink(ControlEvent::Toggled { id: id.into(), checked });
        }
    }

    /// Simulates the user dragging a slider.
    pub fn fire_input(&self, id: &str, value: f64) {
        let listeners = {
            let mut controls = self.controls.borrow_mut();
            let Some(c) = controls.get_mut(&ControlId::from(id)) else { return };
            c.value = value;
            c.listeners.clone()
        };
        for sink in listeners {
            sink(ControlEvent::Input { id: id.into(), value });
        }
    }
}

impl ControlHost for FakeHost {
    fn lookup(&self, id: &ControlId) -> Option<ControlKind> {
        self.controls.borrow().get(id).map(|c| c.kind)
    }

    fn set_checked(&self, id: &ControlId, checked: bool) {
        if let Some(c) = self.controls.borrow_mut().get_mut(id) {
            c.checked = checked;
        }
    }

    fn set_value(&self, id: &ControlId, value: f64) {
        if let Some(c) = self.controls.borrow_mut().get_mut(id) {
            c.value = value;
        }
    }

    fn listen(&self, id: &ControlId, kind: ControlKind, sink: EventSink) -> Result<()> {
        let mut controls = self.controls.borrow_mut();
        let c = controls
            .get_mut(id)
            .filter(|c| c.kind == kind)
            .ok_or_else(|| ViewerError::Host(format!("no {kind:?} '{id}'")))?;
        c.listeners.push(sink);
        Ok(())
    }

    fn append_layer_row(&self, row: &LayerRow) -> Result<RowHandle> {
        self.insert(row.toggle.as_str(), ControlKind::Toggle, row.checked, 0.0);
        self.insert(row.slider.as_str(), ControlKind::Slider, false, row.opacity as f64);
        self.rows.borrow_mut().push(row.clone());
        Ok(RowHandle { element_id: format!("{}-row", row.toggle) })
    }
}

#[derive(Default)]
pub struct IndicatorLog {
    pub busy: bool,
    pub transitions: Vec<bool>,
    pub error: Option<String>,
}

#[derive(Clone, Default)]
pub struct RecordingIndicator {
    pub log: Rc<RefCell<IndicatorLog>>,
}

impl RecordingIndicator {
    pub fn busy(&self) -> bool {
        self.log.borrow().busy
    }

    pub fn transitions(&self) -> Vec<bool> {
        self.log.borrow().transitions.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.log.borrow().error.clone()
    }
}

impl BusyIndicator for RecordingIndicator {
    fn set_busy(&self, busy: bool) {
        let mut log = self.log.borrow_mut();
        log.busy = busy;
        log.transitions.push(busy);
    }

    fn show_error(&self, message: &str) {
        self.log.borrow_mut().error = Some(message.to_owned());
    }
}

/// Serves geometry from a map; anything else is a 404.
#[derive(Default)]
pub struct MemoryLoader {
    assets: HashMap<String, RawGeometry>,
    pub requests: RefCell<Vec<String>>,
}

impl MemoryLoader {
    pub fn with(mut self, path: &str, geometry: RawGeometry) -> Self {
        self.assets.insert(path.to_owned(), geometry);
        self
    }
}

impl FileLoader for MemoryLoader {
    async fn load(&self, path: &str) -> Result<RawGeometry, LoadError> {
        self.requests.borrow_mut().push(path.to_owned());
        self.assets
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::Status { path: path.to_owned(), status: 404 })
    }
}

/// Each load waits until the test completes it, so completion order is
/// under the test's control.
#[derive(Default)]
pub struct GatedLoader {
    gates: RefCell<HashMap<String, oneshot::Receiver<Result<RawGeometry, LoadError>>>>,
    pub started: Cell<usize>,
}

impl GatedLoader {
    pub fn gate(&self, path: &str) -> oneshot::Sender<Result<RawGeometry, LoadError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(path.to_owned(), rx);
        tx
    }
}

impl FileLoader for GatedLoader {
    async fn load(&self, path: &str) -> Result<RawGeometry, LoadError> {
        self.started.set(self.started.get() + 1);
        let gate = self.gates.borrow_mut().remove(path);
        let Some(rx) = gate else {
            return Err(LoadError::Status { path: path.to_owned(), status: 404 });
        };
        rx.await.unwrap_or_else(|_| {
            Err(LoadError::Network { path: path.to_owned(), reason: "cancelled".into() })
        })
    }
}
