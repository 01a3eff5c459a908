//! Browser side of the controls: the layers panel, the clip-plane panel and
//! the loading screen, built and driven through `web-sys`.

#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::f64::consts::TAU;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, Element, Event, HtmlCanvasElement, HtmlElement, HtmlInputElement};

use crate::config::ClipPlaneDecl;
use crate::controls::{
    ControlEvent, ControlHost, ControlId, ControlKind, EventSink, LayerRow, Legend, RowHandle,
};
use crate::error::{Result, ViewerError};
use crate::ingest::SurfaceAsset;
use crate::loading::BusyIndicator;

const LAYERS_PANEL_STYLE: &str = "position: fixed; top: 10%; left: 0px; \
    background: rgba(92, 92, 92, 0.29); padding: 1%; border-radius: 0 2% 2% 0; \
    box-shadow: 4px 4px 12px rgba(0, 0, 0, 0.5); z-index: 900; width: 16%; \
    max-width: 300px; color: white; font-size: 90%;";

const DEFAULT_LEGEND_CLASS: &str = "legend-box";

fn js_err(e: JsValue) -> ViewerError {
    ViewerError::Host(format!("{e:?}"))
}

fn create<T: JsCast>(document: &Document, tag: &str) -> Result<T> {
    document
        .create_element(tag)
        .map_err(js_err)?
        .dyn_into::<T>()
        .map_err(|_| ViewerError::Host(format!("<{tag}> has an unexpected type")))
}

fn checkbox(document: &Document, id: &ControlId, checked: bool) -> Result<HtmlInputElement> {
    let input: HtmlInputElement = create(document, "input")?;
    input.set_type("checkbox");
    input.set_id(id.as_str());
    input.set_checked(checked);
    Ok(input)
}

fn range(document: &Document, id: &ControlId, min: f32, max: f32, step: f32, value: f32) -> Result<HtmlInputElement> {
    let input: HtmlInputElement = create(document, "input")?;
    input.set_type("range");
    input.set_id(id.as_str());
    input.set_min(&min.to_string());
    input.set_max(&max.to_string());
    input.set_step(&step.to_string());
    input.set_value(&value.to_string());
    Ok(input)
}

fn cell(document: &Document, child: &Element) -> Result<Element> {
    let td = document.create_element("td").map_err(js_err)?;
    td.append_child(child).map_err(js_err)?;
    Ok(td)
}

fn labelled(document: &Document, input: &HtmlInputElement, text: &str) -> Result<Element> {
    let label = document.create_element("label").map_err(js_err)?;
    label.append_with_node_1(input).map_err(js_err)?;
    label.append_with_str_1(&format!(" {text}")).map_err(js_err)?;
    Ok(label)
}

/// Builds the layers table for the declared assets and attaches it to the
/// page. Returns the table so later rows can be appended to it directly.
pub fn build_layers_panel(document: &Document, layers: &[SurfaceAsset]) -> Result<Element> {
    let body = document.body().ok_or_else(|| ViewerError::Host("document has no body".into()))?;
    let panel = document.create_element("div").map_err(js_err)?;
    panel.set_id("layers-panel");
    panel.set_class_name("control-panel");
    panel.set_attribute("style", LAYERS_PANEL_STYLE).map_err(js_err)?;

    let table = document.create_element("table").map_err(js_err)?;
    let header = document.create_element("tr").map_err(js_err)?;
    for title in ["", "Toggle layers", "Set opacity"] {
        let td = document.create_element("td").map_err(js_err)?;
        td.set_inner_html(&format!("<b>{title}</b>"));
        header.append_child(&td).map_err(js_err)?;
    }
    table.append_child(&header).map_err(js_err)?;

    for layer in layers {
        let tr = document.create_element("tr").map_err(js_err)?;
        let swatch = document.create_element("div").map_err(js_err)?;
        swatch.set_class_name(layer.legend.as_deref().unwrap_or(DEFAULT_LEGEND_CLASS));
        let toggle = checkbox(document, &layer.toggle, layer.visible)?;
        let slider = range(document, &layer.slider, 0.0, 1.0, 0.1, layer.opacity)?;
        tr.append_child(&cell(document, &swatch)?).map_err(js_err)?;
        tr.append_child(&cell(document, &labelled(document, &toggle, &layer.label)?)?).map_err(js_err)?;
        tr.append_child(&cell(document, &slider)?).map_err(js_err)?;
        table.append_child(&tr).map_err(js_err)?;
    }

    panel.append_child(&table).map_err(js_err)?;
    body.append_child(&panel).map_err(js_err)?;
    Ok(table)
}

/// Builds one labelled range input per clip plane.
pub fn build_clip_panel(document: &Document, planes: &[ClipPlaneDecl]) -> Result<Element> {
    let body = document.body().ok_or_else(|| ViewerError::Host("document has no body".into()))?;
    let panel = document.create_element("div").map_err(js_err)?;
    panel.set_id("clip-plane-panel");
    panel.set_class_name("clip-plane-panel");
    panel.set_inner_html("<b>Clipping Planes</b><br><br>");
    for decl in planes {
        let label = document.create_element("label").map_err(js_err)?;
        label.set_text_content(Some(&format!("{}:", decl.label)));
        let slider = range(document, &decl.slider, decl.min, decl.max, decl.step, decl.initial)?;
        panel.append_child(&label).map_err(js_err)?;
        panel.append_child(&slider).map_err(js_err)?;
        panel.append_child(&document.create_element("br").map_err(js_err)?).map_err(js_err)?;
    }
    body.append_child(&panel).map_err(js_err)?;
    Ok(panel)
}

/// Short line with three dots, like the trajectory it stands for.
fn draw_legend_line(canvas: &HtmlCanvasElement, legend: &Legend) -> Result<()> {
    let ctx = canvas
        .get_context("2d")
        .map_err(js_err)?
        .ok_or_else(|| ViewerError::Host("no 2d context".into()))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| ViewerError::Host("unexpected 2d context type".into()))?;
    let css = legend.css_color();
    let (w, h) = (canvas.width() as f64, canvas.height() as f64);

    ctx.clear_rect(0.0, 0.0, w, h);
    ctx.set_stroke_style_str(&css);
    ctx.set_line_width(2.0);
    ctx.begin_path();
    ctx.move_to(5.0, h / 2.0);
    ctx.line_to(w - 5.0, h / 2.0);
    ctx.stroke();

    ctx.set_fill_style_str(&css);
    for x in [5.0, 20.0, 35.0] {
        ctx.begin_path();
        ctx.arc(x, h / 2.0, 2.0, 0.0, TAU).map_err(js_err)?;
        ctx.fill();
    }
    Ok(())
}

/// [`ControlHost`] over the live document.
pub struct DomControlHost {
    document: Document,
    layers_table: Element,
}

impl DomControlHost {
    pub fn new(document: Document, layers_table: Element) -> Self {
        Self { document, layers_table }
    }

    fn input(&self, id: &ControlId) -> Option<HtmlInputElement> {
        self.document.get_element_by_id(id.as_str())?.dyn_into::<HtmlInputElement>().ok()
    }

    fn legend(&self, legend: &Legend) -> Result<Element> {
        let canvas: HtmlCanvasElement = create(&self.document, "canvas")?;
        canvas.set_width(40);
        canvas.set_height(10);
        canvas.class_list().add_1("legend-line").map_err(js_err)?;
        draw_legend_line(&canvas, legend)?;
        Ok(canvas.into())
    }
}

impl ControlHost for DomControlHost {
    fn lookup(&self, id: &ControlId) -> Option<ControlKind> {
        let input = self.input(id)?;
        match input.type_().as_str() {
            "checkbox" => Some(ControlKind::Toggle),
            "range" => Some(ControlKind::Slider),
            other => {
                log::warn!("input '{id}' has unsupported type '{other}'");
                None
            }
        }
    }

    fn set_checked(&self, id: &ControlId, checked: bool) {
        if let Some(input) = self.input(id) {
            input.set_checked(checked);
        }
    }

    fn set_value(&self, id: &ControlId, value: f64) {
        if let Some(input) = self.input(id) {
            input.set_value(&value.to_string());
        }
    }

    fn listen(&self, id: &ControlId, kind: ControlKind, sink: EventSink) -> Result<()> {
        let input = self.input(id).ok_or_else(|| ViewerError::Host(format!("no input '{id}'")))?;
        let el = input.clone();
        let id = id.clone();
        let (event, handler) = match kind {
            ControlKind::Toggle => (
                "change",
                Closure::<dyn FnMut(Event)>::new(move |_: Event| {
                    sink(ControlEvent::Toggled { id: id.clone(), checked: el.checked() })
                }),
            ),
            ControlKind::Slider => (
                "input",
                Closure::<dyn FnMut(Event)>::new(move |_: Event| match el.value().parse::<f64>() {
                    Ok(value) => sink(ControlEvent::Input { id: id.clone(), value }),
                    Err(e) => log::warn!("slider '{id}' has non-numeric value: {e}"),
                }),
            ),
        };
        input
            .add_event_listener_with_callback(event, handler.as_ref().unchecked_ref())
            .map_err(js_err)?;
        // listeners stay for the lifetime of the page
        handler.forget();
        Ok(())
    }

    fn append_layer_row(&self, row: &LayerRow) -> Result<RowHandle> {
        let document = &self.document;
        let tr = document.create_element("tr").map_err(js_err)?;
        let element_id = format!("{}-row", row.toggle);
        tr.set_id(&element_id);

        let toggle = checkbox(document, &row.toggle, row.checked)?;
        let slider = range(document, &row.slider, 0.0, 1.0, 0.1, row.opacity)?;
        tr.append_child(&cell(document, &self.legend(&row.legend)?)?).map_err(js_err)?;
        tr.append_child(&cell(document, &labelled(document, &toggle, &row.label)?)?).map_err(js_err)?;
        tr.append_child(&cell(document, &slider)?).map_err(js_err)?;
        self.layers_table.append_child(&tr).map_err(js_err)?;
        Ok(RowHandle { element_id })
    }
}

/// The `#loading-screen` element. Once an error is shown it stays.
pub struct DomLoadingScreen {
    element: HtmlElement,
    errored: Cell<bool>,
}

impl DomLoadingScreen {
    pub fn find(document: &Document) -> Result<Self> {
        let element = document
            .get_element_by_id("loading-screen")
            .ok_or_else(|| ViewerError::Host("no #loading-screen element".into()))?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ViewerError::Host("#loading-screen is not an HTML element".into()))?;
        Ok(Self { element, errored: Cell::new(false) })
    }

    fn display(&self, value: &str) {
        if let Err(e) = self.element.style().set_property("display", value) {
            log::warn!("could not set loading screen display: {e:?}");
        }
    }
}

impl BusyIndicator for DomLoadingScreen {
    fn set_busy(&self, busy: bool) {
        if self.errored.get() {
            return;
        }
        self.display(if busy { "flex" } else { "none" });
    }

    fn show_error(&self, message: &str) {
        self.errored.set(true);
        self.element.set_inner_html(&format!("<p>{message}</p>"));
        self.display("flex");
    }
}
