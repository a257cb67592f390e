//! Canvas rendering backend.
//!
//! [`CanvasSurface`] draws resolved [`Scene`]s onto an HTML canvas.
//! Drawing uses passes for correct z-ordering:
//! 1. Background (screen space)
//! 2. Edge lines, arrow heads and visible edge labels (world space)
//! 3. Nodes back to front, each with thumbnail, border, pin ring and label

use std::cell::Cell;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::rc::Rc;

use log::{debug, warn};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlAnchorElement, HtmlCanvasElement, HtmlImageElement};

use crate::error::{GraphError, Result};

use super::surface::{ExportRequest, Scene, SceneEdge, SceneNode, Surface};
use super::theme::ThemeTokens;

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
	canvas.get_context("2d").ok()??.dyn_into().ok()
}

fn js_error(e: JsValue) -> GraphError {
	GraphError::Export(format!("{e:?}"))
}

/// Thumbnails keyed by URL. Loads are started on first use; a finished load
/// raises `loaded` so the owner can request a redraw.
#[derive(Default)]
struct ImageCache {
	images: HashMap<String, HtmlImageElement>,
	loaded: Rc<Cell<bool>>,
}

impl ImageCache {
	fn get(&mut self, url: &str) -> Option<&HtmlImageElement> {
		if !self.images.contains_key(url) {
			let image = HtmlImageElement::new().ok()?;
			let loaded = Rc::clone(&self.loaded);
			let onload = Closure::<dyn FnMut()>::new(move || loaded.set(true));
			image.set_onload(Some(onload.as_ref().unchecked_ref()));
			onload.forget();
			image.set_src(url);
			self.images.insert(url.to_string(), image);
		}
		self.images
			.get(url)
			.filter(|image| image.complete() && image.natural_width() > 0)
	}
}

/// [`Surface`] backed by a 2D canvas sized to its parent element.
pub struct CanvasSurface {
	canvas: Option<HtmlCanvasElement>,
	ctx: Option<CanvasRenderingContext2d>,
	images: ImageCache,
}

impl CanvasSurface {
	pub fn new(canvas: HtmlCanvasElement) -> Self {
		let ctx = context_2d(&canvas);
		if ctx.is_none() {
			warn!("story-graph: canvas has no 2d context");
		}
		Self {
			canvas: Some(canvas),
			ctx,
			images: ImageCache::default(),
		}
	}

	/// Raised whenever a thumbnail finishes loading; the owner clears it and
	/// requests a redraw.
	pub fn redraw_flag(&self) -> Rc<Cell<bool>> {
		Rc::clone(&self.images.loaded)
	}

	/// Size the backing store to the CSS size times the device pixel ratio and
	/// map drawing units back to CSS pixels.
	fn prepare(&self, width: f64, height: f64) -> Option<&CanvasRenderingContext2d> {
		let (canvas, ctx) = (self.canvas.as_ref()?, self.ctx.as_ref()?);
		let ratio = web_sys::window().map_or(1.0, |w| w.device_pixel_ratio());
		let (bw, bh) = ((width * ratio).round() as u32, (height * ratio).round() as u32);
		if canvas.width() != bw || canvas.height() != bh {
			canvas.set_width(bw);
			canvas.set_height(bh);
			let style = canvas.style();
			let _ = style.set_property("width", &format!("{width}px"));
			let _ = style.set_property("height", &format!("{height}px"));
		}
		let _ = ctx.set_transform(ratio, 0.0, 0.0, ratio, 0.0, 0.0);
		Some(ctx)
	}
}

impl Surface for CanvasSurface {
	fn size(&self) -> Option<(f64, f64)> {
		let parent = self.canvas.as_ref()?.parent_element()?;
		Some((parent.client_width() as f64, parent.client_height() as f64))
	}

	fn draw(&mut self, scene: &Scene) {
		let Some(ctx) = self.prepare(scene.width, scene.height).cloned() else {
			return;
		};
		draw_scene(&ctx, scene, &mut self.images);
	}

	fn draw_empty(&mut self, tokens: &ThemeTokens, message: &str) {
		let Some((width, height)) = self.size() else {
			return;
		};
		let Some(ctx) = self.prepare(width, height) else {
			return;
		};
		ctx.set_fill_style_str(&tokens.background.to_css());
		ctx.fill_rect(0.0, 0.0, width, height);
		ctx.set_fill_style_str(&tokens.muted_text.to_css());
		ctx.set_font(&format!("14px {}", tokens.font_family));
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		let _ = ctx.fill_text(message, width / 2.0, height / 2.0);
	}

	fn export(&mut self, scene: &Scene, request: &ExportRequest) -> Result<()> {
		let document = web_sys::window()
			.and_then(|w| w.document())
			.ok_or_else(|| GraphError::Export("no document".into()))?;
		let canvas: HtmlCanvasElement = document
			.create_element("canvas")
			.map_err(js_error)?
			.dyn_into()
			.map_err(|_| GraphError::Export("could not create canvas".into()))?;
		canvas.set_width((scene.width * request.scale).round() as u32);
		canvas.set_height((scene.height * request.scale).round() as u32);
		let ctx = context_2d(&canvas)
			.ok_or_else(|| GraphError::Export("canvas has no 2d context".into()))?;
		ctx.scale(request.scale, request.scale).map_err(js_error)?;

		let mut scene = scene.clone();
		scene.tokens.background = request.background;
		draw_scene(&ctx, &scene, &mut self.images);

		// Remote thumbnails without CORS taint the canvas and fail here.
		let url = canvas
			.to_data_url_with_type(request.format.mime_type())
			.map_err(js_error)?;
		let anchor: HtmlAnchorElement = document
			.create_element("a")
			.map_err(js_error)?
			.dyn_into()
			.map_err(|_| GraphError::Export("could not create link".into()))?;
		anchor.set_href(&url);
		anchor.set_download(&request.filename);
		anchor.click();
		Ok(())
	}

	fn release(&mut self) {
		if let (Some(canvas), Some(ctx)) = (&self.canvas, &self.ctx) {
			ctx.clear_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
		}
		self.ctx = None;
		self.canvas = None;
		self.images.images.clear();
		debug!("story-graph: canvas surface released");
	}
}

/// Draws the complete scene; `ctx` must map units to CSS pixels.
fn draw_scene(ctx: &CanvasRenderingContext2d, scene: &Scene, images: &mut ImageCache) {
	ctx.set_fill_style_str(&scene.tokens.background.to_css());
	ctx.fill_rect(0.0, 0.0, scene.width, scene.height);

	ctx.save();
	let t = scene.transform;
	let _ = ctx.translate(t.x, t.y);
	let _ = ctx.scale(t.k, t.k);

	for edge in &scene.edges {
		draw_edge(ctx, scene, edge);
	}
	let _ = ctx.set_line_dash(&js_sys::Array::new());
	for edge in &scene.edges {
		if let Some(label) = &edge.label {
			draw_edge_label(ctx, scene, edge, label);
		}
	}
	for node in &scene.nodes {
		draw_node(ctx, scene, node, images);
	}

	ctx.restore();
}

fn draw_edge(ctx: &CanvasRenderingContext2d, scene: &Scene, edge: &SceneEdge) {
	let ((x1, y1), (x2, y2)) = (edge.from, edge.to);
	let (dx, dy) = (x2 - x1, y2 - y1);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return;
	}
	let k = scene.transform.k;
	let arrow = scene.scale.arrow_size;
	let (ux, uy) = (dx / dist, dy / dist);
	let color = edge.style.color.with_alpha(edge.style.color.a * edge.style.opacity);

	ctx.set_stroke_style_str(&color.to_css());
	ctx.set_line_width(edge.style.width / k);
	if edge.style.dashed {
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(6.0 / k),
			&JsValue::from_f64(4.0 / k),
		));
	} else {
		let _ = ctx.set_line_dash(&js_sys::Array::new());
	}

	let stop = edge.target_radius + arrow;
	ctx.begin_path();
	ctx.move_to(x1, y1);
	ctx.line_to(x2 - ux * stop, y2 - uy * stop);
	ctx.stroke();

	let (tip_x, tip_y) = (x2 - ux * edge.target_radius, y2 - uy * edge.target_radius);
	let (back_x, back_y) = (tip_x - ux * arrow, tip_y - uy * arrow);
	let (px, py) = (-uy * arrow * 0.5, ux * arrow * 0.5);
	ctx.set_fill_style_str(&color.to_css());
	ctx.begin_path();
	ctx.move_to(tip_x, tip_y);
	ctx.line_to(back_x + px, back_y + py);
	ctx.line_to(back_x - px, back_y - py);
	ctx.close_path();
	ctx.fill();
}

fn draw_edge_label(ctx: &CanvasRenderingContext2d, scene: &Scene, edge: &SceneEdge, label: &str) {
	let (mx, my) = (
		(edge.from.0 + edge.to.0) / 2.0,
		(edge.from.1 + edge.to.1) / 2.0,
	);
	let font = scene.scale.edge_label_font;
	ctx.set_font(&format!("{font}px {}", scene.tokens.font_family));
	ctx.set_text_align("center");
	ctx.set_text_baseline("middle");
	// Halo keeps labels readable over crossing edges.
	ctx.set_line_width(font / 3.0);
	ctx.set_stroke_style_str(&scene.tokens.background.with_alpha(0.85).to_css());
	let _ = ctx.stroke_text(label, mx, my);
	ctx.set_fill_style_str(
		&scene
			.tokens
			.muted_text
			.with_alpha(edge.style.opacity.max(0.4))
			.to_css(),
	);
	let _ = ctx.fill_text(label, mx, my);
}

fn draw_node(
	ctx: &CanvasRenderingContext2d,
	scene: &Scene,
	node: &SceneNode,
	images: &mut ImageCache,
) {
	let (x, y, r) = (node.x, node.y, node.radius);
	let k = scene.transform.k;
	let style = &node.style;

	ctx.set_global_alpha(style.opacity);

	ctx.begin_path();
	let _ = ctx.arc(x, y, r, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(&style.fill.to_css());
	ctx.fill();

	if let Some(image) = node.image_url.as_deref().and_then(|url| images.get(url)) {
		ctx.save();
		ctx.begin_path();
		let _ = ctx.arc(x, y, r, 0.0, 2.0 * PI);
		ctx.clip();
		let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
			image,
			x - r,
			y - r,
			r * 2.0,
			r * 2.0,
		);
		ctx.restore();
	}

	ctx.begin_path();
	let _ = ctx.arc(x, y, r, 0.0, 2.0 * PI);
	ctx.set_stroke_style_str(&style.border.to_css());
	ctx.set_line_width(style.border_width / k);
	ctx.stroke();

	if style.pinned {
		ctx.begin_path();
		let _ = ctx.arc(x, y, r + scene.scale.pin_ring_offset, 0.0, 2.0 * PI);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(3.0 / k),
			&JsValue::from_f64(3.0 / k),
		));
		ctx.set_stroke_style_str(&scene.tokens.accent.to_css());
		ctx.set_line_width(1.5 / k);
		ctx.stroke();
		let _ = ctx.set_line_dash(&js_sys::Array::new());
	}

	let font = scene.scale.label_font(style.font_size);
	ctx.set_font(&format!("{font}px {}", scene.tokens.font_family));
	ctx.set_text_align("center");
	ctx.set_text_baseline("top");
	ctx.set_fill_style_str(&style.label_color.to_css());
	let _ = ctx.fill_text(&node.label, x, y + r + 3.0 / k);

	ctx.set_global_alpha(1.0);
}
