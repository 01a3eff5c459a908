//! Wiring for the browser: canvas, panels, scene and the initial loads.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use anyhow::{Context as _, anyhow};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Event, HtmlCanvasElement, WebGl2RenderingContext, Window};

use crate::config::ViewerConfig;
use crate::dom::{self, DomControlHost, DomLoadingScreen};
use crate::ingest::AssetIngestor;
use crate::loader::HttpLoader;
use crate::loading::LoadingCoordinator;
use crate::renderer::GlSceneRenderer;
use crate::scene::{Scene, SharedScene};

pub const CANVAS_ID: &str = "plyscope-canvas";
pub const CONFIG_ID: &str = "plyscope-config";

/// A mounted viewer. Dropping it (`free()` from JavaScript) tears the scene
/// down; loads still in flight then finish as no-ops.
#[wasm_bindgen]
pub struct Viewer {
    scene: SharedScene,
    ingestor: Rc<AssetIngestor<HttpLoader>>,
}

#[wasm_bindgen]
impl Viewer {
    pub fn redraw(&self) {
        self.scene.borrow_mut().request_redraw();
    }

    pub fn reset_camera(&self) {
        let mut scene = self.scene.borrow_mut();
        scene.reset_camera();
        scene.request_redraw();
    }

    /// Number of asset loads still pending.
    pub fn pending_loads(&self) -> usize {
        self.ingestor.loading().pending()
    }

    pub fn layer_count(&self) -> usize {
        self.scene.borrow().registry().len()
    }
}

/// Config from the page's `<script type="application/json">` block, or the
/// built-in default.
fn page_config(document: &Document) -> anyhow::Result<ViewerConfig> {
    match document.get_element_by_id(CONFIG_ID).and_then(|e| e.text_content()) {
        Some(json) => ViewerConfig::from_json(&json).context("invalid viewer config"),
        None => Ok(ViewerConfig::default()),
    }
}

fn canvas(document: &Document) -> anyhow::Result<HtmlCanvasElement> {
    if let Some(el) = document.get_element_by_id(CANVAS_ID) {
        return el.dyn_into::<HtmlCanvasElement>().map_err(|_| anyhow!("#{CANVAS_ID} is not a canvas"));
    }
    let canvas = document
        .create_element("canvas")
        .map_err(|e| anyhow!("{e:?}"))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| anyhow!("created element is not a canvas"))?;
    canvas.set_id(CANVAS_ID);
    let parent: web_sys::Element = match document.get_element_by_id("viewer-container") {
        Some(container) => container,
        None => document.body().context("nowhere to put the canvas")?.into(),
    };
    parent.append_child(&canvas).map_err(|e| anyhow!("{e:?}"))?;
    Ok(canvas)
}

fn window_size(window: &Window) -> (u32, u32) {
    let width = window.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(800.0);
    let height = window.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(600.0);
    (width as u32, height as u32)
}

/// Keeps the canvas filling the window.
fn follow_window_size(window: &Window, canvas: HtmlCanvasElement, scene: Weak<RefCell<Scene>>) -> anyhow::Result<()> {
    let win = window.clone();
    let handler = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
        let Some(scene) = scene.upgrade() else {
            return;
        };
        let (width, height) = window_size(&win);
        canvas.set_width(width);
        canvas.set_height(height);
        match scene.try_borrow_mut() {
            Ok(mut scene) => scene.resize(width, height),
            Err(_) => log::warn!("scene busy, skipping resize to {width}x{height}"),
        };
    });
    window
        .add_event_listener_with_callback("resize", handler.as_ref().unchecked_ref())
        .map_err(|e| anyhow!("{e:?}"))?;
    handler.forget();
    Ok(())
}

pub async fn mount(config_json: Option<String>) -> anyhow::Result<Viewer> {
    let window = web_sys::window().context("no window")?;
    let document = window.document().context("no document")?;
    let config = match config_json {
        Some(json) => ViewerConfig::from_json(&json).context("invalid viewer config")?,
        None => page_config(&document)?,
    };
    config.validate()?;

    let canvas = canvas(&document)?;
    let (width, height) = window_size(&window);
    canvas.set_width(width);
    canvas.set_height(height);
    let webgl = canvas
        .get_context("webgl2")
        .map_err(|e| anyhow!("{e:?}"))?
        .context("WebGL2 is not available")?
        .dyn_into::<WebGl2RenderingContext>()
        .map_err(|_| anyhow!("unexpected WebGL2 context type"))?;
    let gl = glow::Context::from_webgl2_context(webgl);
    let renderer = GlSceneRenderer::new(gl, (width as i32, height as i32), config.background)?;

    let table = dom::build_layers_panel(&document, &config.layers)?;
    dom::build_clip_panel(&document, &config.clip_planes)?;
    let host = Rc::new(DomControlHost::new(document.clone(), table));

    let (clip, sliders) = config.clip_plane_set();
    let scene = Scene::new(Box::new(renderer), host, clip);
    {
        let mut scene = scene.borrow_mut();
        for (control, plane) in sliders {
            scene.bind_clip_slider(control, plane)?;
        }
        scene.reset_camera();
        scene.request_redraw();
    }

    follow_window_size(&window, canvas, Rc::downgrade(&scene))?;

    let loading = LoadingCoordinator::new(Box::new(DomLoadingScreen::find(&document)?));
    let ingestor = Rc::new(AssetIngestor::new(Rc::new(HttpLoader), &scene, loading, &config.base_path));

    for asset in config.layers {
        let ingestor = Rc::clone(&ingestor);
        wasm_bindgen_futures::spawn_local(async move {
            ingestor.load_surface_asset(&asset).await;
        });
    }
    if let Some(trajectory) = config.trajectory {
        let ingestor = Rc::clone(&ingestor);
        wasm_bindgen_futures::spawn_local(async move {
            ingestor.load_trajectory_asset(&trajectory).await;
        });
    }
    log::info!("viewer mounted on #{CANVAS_ID} ({width}x{height})");

    Ok(Viewer { scene, ingestor })
}
