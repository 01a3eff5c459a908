//! Control identifiers, the binding map and the host abstraction over the
//! page's widgets.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::clip::PlaneId;
use crate::error::{Result, ViewerError};
use crate::layers::LayerHandle;

/// Identifier of a checkbox or slider in the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

impl ControlId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ControlId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ControlId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Checkbox; reports `change`.
    Toggle,
    /// Range input; reports `input`.
    Slider,
}

/// What the user did to a control.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Toggled { id: ControlId, checked: bool },
    Input { id: ControlId, value: f64 },
}

impl ControlEvent {
    pub fn id(&self) -> &ControlId {
        match self {
            ControlEvent::Toggled { id, .. } | ControlEvent::Input { id, .. } => id,
        }
    }
}

/// The piece of scene state a control drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    Visibility(LayerHandle),
    Opacity(LayerHandle),
    ClipOffset(PlaneId),
}

/// Map from control id to its target, filled once at setup.
#[derive(Debug, Default)]
pub struct ControlBindings {
    map: HashMap<ControlId, BindingTarget>,
}

impl ControlBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// A control can be bound once per session; a second bind would make
    /// every event fire twice.
    pub fn bind(&mut self, id: ControlId, target: BindingTarget) -> Result<()> {
        if self.map.contains_key(&id) {
            return Err(ViewerError::DuplicateBinding(id));
        }
        log::debug!("bound control '{id}' to {target:?}");
        self.map.insert(id, target);
        Ok(())
    }

    pub fn target(&self, id: &ControlId) -> Option<BindingTarget> {
        self.map.get(id).copied()
    }

    pub fn is_bound(&self, id: &ControlId) -> bool {
        self.map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Callback a host invokes when a listened control changes.
pub type EventSink = Rc<dyn Fn(ControlEvent)>;

/// Legend drawn in front of a synthesized layer row: a short line with
/// three dots, in the given colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Legend {
    pub color: [f32; 3],
}

impl Legend {
    /// `rgb(r,g,b)` with channels scaled to 0..=255.
    pub fn css_color(&self) -> String {
        let [r, g, b] = self.color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        format!("rgb({r},{g},{b})")
    }
}

/// Description of a row to synthesize for a dynamically appended layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRow {
    pub label: String,
    pub toggle: ControlId,
    pub slider: ControlId,
    pub checked: bool,
    pub opacity: f32,
    pub legend: Legend,
}

/// Reference to a row a host created, returned instead of being located
/// later by walking the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowHandle {
    pub element_id: String,
}

/// The page's widgets as seen by the scene.
pub trait ControlHost {
    /// Resolves an id to a control, or `None` if the page has none.
    fn lookup(&self, id: &ControlId) -> Option<ControlKind>;

    fn set_checked(&self, id: &ControlId, checked: bool);

    fn set_value(&self, id: &ControlId, value: f64);

    /// Attaches `sink` to the control's `change` (toggle) or `input`
    /// (slider) event.
    fn listen(&self, id: &ControlId, kind: ControlKind, sink: EventSink) -> Result<()>;

    /// Creates a new row holding a legend, a checkbox and a slider.
    fn append_layer_row(&self, row: &LayerRow) -> Result<RowHandle>;
}
