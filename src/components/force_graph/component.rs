//! Leptos component wrapping one engine and its canvas.
//!
//! The component creates the canvas, builds a [`GraphEngine`] over a
//! [`CanvasSurface`] once the canvas is mounted, and wires mouse/wheel
//! handlers to the engine's pointer operations. An animation loop runs via
//! `requestAnimationFrame`, advancing deferred tasks, forwarding engine
//! events and redrawing when something changed. Teardown destroys the engine
//! exactly once.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::ev;
use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{error, warn};
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, Window};

use crate::builder::GraphFilters;
use crate::config::GraphConfig;
use crate::error::GraphError;
use crate::store::{EntityStore, ResourceResolver, SettingsStore, collect_story};

use super::engine::{GraphEngine, GraphEvent};
use super::render::CanvasSurface;
use super::theme::{CssThemeProvider, Theme};

/// Collaborators an engine reads from.
#[derive(Clone)]
pub struct GraphSources {
	pub store: Rc<dyn EntityStore>,
	pub settings: Rc<dyn SettingsStore>,
	pub resolver: Rc<dyn ResourceResolver>,
}

/// Shared access to a mounted view's engine.
///
/// Empty until the canvas mounts and again after teardown; every accessor
/// then does nothing. Borrows never span an `.await`.
#[derive(Clone, Default)]
pub struct EngineHandle(Rc<RefCell<Option<GraphEngine>>>);

impl EngineHandle {
	/// Run `f` against the engine, if one is attached and not already borrowed.
	pub fn with<R>(&self, f: impl FnOnce(&mut GraphEngine) -> R) -> Option<R> {
		let mut slot = self.0.try_borrow_mut().ok()?;
		slot.as_mut().map(f)
	}

	pub fn is_attached(&self) -> bool {
		self.0.try_borrow().is_ok_and(|slot| slot.is_some())
	}

	fn attach(&self, engine: GraphEngine) {
		*self.0.borrow_mut() = Some(engine);
	}

	/// Detach and destroy the engine. Later calls find nothing to destroy.
	pub fn destroy(&self) {
		let engine = self.0.try_borrow_mut().ok().and_then(|mut slot| slot.take());
		if let Some(mut engine) = engine {
			engine.destroy();
		}
	}

	pub async fn initialize(&self) -> Result<(), GraphError> {
		let (ticket, store) = self
			.with(|e| e.begin_initialize().map(|t| (t, e.store())))
			.ok_or(GraphError::Destroyed)??;
		let story = collect_story(store.as_ref()).await;
		self.with(|e| e.finish_refresh(ticket, story))
			.unwrap_or(Ok(false))
			.map(|_| ())
	}

	pub async fn refresh(&self) -> Result<bool, GraphError> {
		let (ticket, store) = self
			.with(|e| e.begin_refresh().map(|t| (t, e.store())))
			.ok_or(GraphError::Destroyed)??;
		let story = collect_story(store.as_ref()).await;
		self.with(|e| e.finish_refresh(ticket, story))
			.unwrap_or(Ok(false))
	}

	pub async fn apply_filters(&self, filters: GraphFilters) -> Result<bool, GraphError> {
		let (ticket, store) = self
			.with(|e| e.set_filters(filters).map(|t| (t, e.store())))
			.ok_or(GraphError::Destroyed)??;
		let story = collect_story(store.as_ref()).await;
		self.with(|e| e.finish_refresh(ticket, story))
			.unwrap_or(Ok(false))
	}
}

fn pointer(canvas: NodeRef<leptos::html::Canvas>, ev: &ev::MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

/// Renders an interactive relationship graph filling its parent element.
///
/// The parent must have a measurable size when the canvas mounts, otherwise
/// initialization fails and `on_error` receives the message. Engine events are
/// forwarded to `on_event` once per frame.
#[component]
pub fn GraphCanvas(
	handle: EngineHandle,
	sources: GraphSources,
	#[prop(optional)] config: GraphConfig,
	#[prop(optional)] filters: GraphFilters,
	#[prop(optional)] theme: Option<Theme>,
	#[prop(into)] on_event: Callback<GraphEvent>,
	#[prop(into, optional)] on_error: Option<Callback<String>>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let stored = StoredValue::new_local(handle.clone());
	let alive = Rc::new(Cell::new(true));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let stored_alive = StoredValue::new_local(Rc::clone(&alive));
	let stored_resize = StoredValue::new_local(Rc::clone(&resize_cb));
	let setup = RefCell::new(Some((sources, config, filters, theme)));

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let Some((sources, config, filters, theme)) = setup.borrow_mut().take() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let surface = CanvasSurface::new(canvas);
		let redraw = surface.redraw_flag();
		let engine = GraphEngine::new(
			config,
			Box::new(surface),
			Box::new(CssThemeProvider {
				fallback: theme.unwrap_or_default(),
			}),
			sources.store,
			sources.settings,
			sources.resolver,
		)
		.with_filters(filters);
		handle.attach(engine);

		let init_handle = handle.clone();
		spawn_local(async move {
			if let Err(e) = init_handle.initialize().await {
				error!("story-graph: {e}");
				if let Some(on_error) = on_error {
					on_error.run(e.to_string());
				}
			}
		});

		let resize_handle = handle.clone();
		*resize_cb.borrow_mut() = Some(Closure::new(move || {
			resize_handle.with(GraphEngine::resize);
		}));
		if let Some(cb) = resize_cb.borrow().as_ref() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (frame_handle, frame_alive, animate_inner) =
			(handle.clone(), Rc::clone(&alive), Rc::clone(&animate));
		let last = Cell::new(None::<f64>);
		*animate.borrow_mut() = Some(Closure::new(move |now: f64| {
			if !frame_alive.get() {
				return;
			}
			let dt = last.replace(Some(now)).map_or(0.0, |prev| ((now - prev) / 1000.0).clamp(0.0, 0.1));
			let events = frame_handle
				.with(|engine| {
					engine.tick(dt);
					if redraw.replace(false) {
						engine.invalidate();
					}
					engine.render();
					engine.drain_events()
				})
				.unwrap_or_default();
			for event in events {
				on_event.run(event);
			}
			if let Some(cb) = animate_inner.borrow().as_ref() {
				let _ = web_sys::window()
					.map(|w: Window| w.request_animation_frame(cb.as_ref().unchecked_ref()));
			}
		}));
		if let Some(cb) = animate.borrow().as_ref() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	on_cleanup(move || {
		stored_alive.try_with_value(|alive| alive.set(false));
		stored_resize.try_with_value(|resize_cb| {
			if let (Some(window), Some(cb)) = (web_sys::window(), resize_cb.borrow_mut().take()) {
				let _ = window
					.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		});
		stored.try_with_value(EngineHandle::destroy);
	});

	let on_mousedown = move |ev: ev::MouseEvent| {
		if ev.button() != 0 {
			return;
		}
		if let Some((x, y)) = pointer(canvas_ref, &ev) {
			stored.with_value(|h| h.with(|e| e.pointer_down(x, y)));
		}
	};

	let on_mousemove = move |ev: ev::MouseEvent| {
		if let Some((x, y)) = pointer(canvas_ref, &ev) {
			stored.with_value(|h| h.with(|e| e.pointer_move(x, y)));
		}
	};

	let on_mouseup = move |_: ev::MouseEvent| {
		stored.with_value(|h| h.with(GraphEngine::pointer_up));
	};

	let on_mouseleave = move |_: ev::MouseEvent| {
		stored.with_value(|h| h.with(GraphEngine::pointer_leave));
	};

	let on_contextmenu = move |ev: ev::MouseEvent| {
		ev.prevent_default();
		if let Some((x, y)) = pointer(canvas_ref, &ev) {
			stored.with_value(|h| h.with(|e| e.context_click(x, y)));
		}
	};

	let on_wheel = move |ev: ev::WheelEvent| {
		ev.prevent_default();
		let canvas: Option<HtmlCanvasElement> = canvas_ref.get().map(Into::into);
		let Some(canvas) = canvas else {
			warn!("story-graph: wheel event without canvas");
			return;
		};
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);
		let delta = ev.delta_y();
		stored.with_value(|h| h.with(|e| e.wheel(x, y, delta)));
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="story-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:contextmenu=on_contextmenu
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
