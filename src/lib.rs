//! Layered PLY viewer for the browser.
//!
//! Assets are loaded into layers that share one visibility toggle and one
//! opacity slider each; a set of axis-aligned clip planes filters every
//! layer at once. The control model ([`scene`], [`layers`], [`clip`],
//! [`ingest`], [`loading`]) is independent of the browser and is driven
//! through the [`renderer::SceneRenderer`], [`loader::FileLoader`],
//! [`controls::ControlHost`] and [`loading::BusyIndicator`] traits.

pub mod clip;
pub mod config;
pub mod controls;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod layers;
pub mod loader;
pub mod loading;
pub mod renderer;
pub mod scene;

#[cfg(target_arch = "wasm32")]
mod app;
#[cfg(target_arch = "wasm32")]
pub mod dom;

#[cfg(test)]
mod testing;

pub use clip::{Axis, ClipPlane, ClipPlaneSet, PlaneId};
pub use config::ViewerConfig;
pub use error::{LoadError, ViewerError};
pub use layers::{LayerHandle, LayerRegistry};
pub use scene::{Scene, SharedScene};

// ── Web entry‑point ──
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
pub use app::Viewer;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    // Redirect `log` macros & panic messages to the browser console
    console_log::init_with_level(log::Level::Debug).ok();
    console_error_panic_hook::set_once();
}

/// Mounts the viewer: builds the panels, binds the controls and starts
/// loading every configured asset. `config_json` overrides the page's
/// `#plyscope-config` block.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn mount(config_json: Option<String>) -> Result<Viewer, JsValue> {
    app::mount(config_json).await.map_err(|e| {
        log::error!("could not mount viewer: {e:#}");
        JsValue::from_str(&format!("{e:#}"))
    })
}
