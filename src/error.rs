//! Error types shared by the viewer core.

use thiserror::Error;

use crate::clip::PlaneId;
use crate::controls::ControlId;
use crate::layers::LayerHandle;

/// Failure while turning a named asset into geometry.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The request never produced a response.
    #[error("network error fetching {path}: {reason}")]
    Network { path: String, reason: String },
    /// The server answered with a non-success status.
    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },
    /// The payload is not a readable PLY file.
    #[error("could not parse {path}: {reason}")]
    Parse { path: String, reason: String },
    /// The file parsed but has no `vertex` element.
    #[error("{path} has no vertex element")]
    MissingVertices { path: String },
}

/// Errors raised by the layer/clip-plane control model.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("layer '{label}' has no renderables")]
    EmptyLayer { label: String },
    #[error("unknown layer {0:?}")]
    UnknownLayer(LayerHandle),
    #[error("unknown clip plane {0:?}")]
    UnknownPlane(PlaneId),
    #[error("control '{0}' is already bound")]
    DuplicateBinding(ControlId),
    #[error("renderer: {0}")]
    Render(String),
    #[error("control host: {0}")]
    Host(String),
    #[error(transparent)]
    Load(#[from] LoadError),
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
