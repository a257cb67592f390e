//! The render/interaction engine behind one graph view.
//!
//! A [`GraphEngine`] owns the element state, filters, pinned set, emphasis
//! layers and every deferred task of one open view. It is platform-agnostic:
//! drawing goes through a [`Surface`], entity data through an
//! [`EntityStore`], persistence through a [`SettingsStore`]. Shells drive it
//! with operations and pointer events, feed it `dt` from their animation loop
//! via [`GraphEngine::tick`] and drain [`GraphEvent`]s to update their chrome.
//!
//! # Lifecycle
//!
//! `Uninitialized` → [`initialize`](GraphEngine::initialize) → `Ready` →
//! [`destroy`](GraphEngine::destroy) → `Destroyed`. Initialization fails with a
//! [`GraphError`] when the surface is detached or has no area. `destroy` is
//! idempotent.
//!
//! # Refresh
//!
//! Rebuilds are single-flight by generation: [`begin_refresh`] hands out a
//! ticket, data is collected without holding the engine, and
//! [`finish_refresh`] commits only if no newer refresh started in between.
//! Stale results are dropped whole, so a view never shows a mix of two
//! builds.
//!
//! [`begin_refresh`]: GraphEngine::begin_refresh
//! [`finish_refresh`]: GraphEngine::finish_refresh

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::builder::{self, GraphData, GraphFilters, GraphNode, build_graph_data};
use crate::config::GraphConfig;
use crate::entities::{EntityKind, StoryData};
use crate::error::{GraphError, Result};
use crate::store::{
	EntityStore, Pan, ResourceResolver, SettingsStore, Viewport, collect_story, resolve_image,
};

use super::layout::LayoutName;
use super::scale::{ScaleConfig, ScaledValues};
use super::scheduler::{Scheduler, Task, TaskSlot};
use super::state::{ForceGraphState, ViewTransform};
use super::style::{self, EdgeLabelMode, ImportanceTier, Mark};
use super::surface::{ExportFormat, ExportRequest, Scene, SceneEdge, SceneNode, Surface, export_filename};
use super::theme::ThemeProvider;

/// Message drawn when no entity survives the filters.
pub const EMPTY_MESSAGE: &str = "No entities to display. Create characters, locations, events or items, or relax the filters.";

/// Engine lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
	Uninitialized,
	Ready,
	Destroyed,
}

/// What a detail panel shows for a hovered node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDetails {
	pub id: String,
	pub label: String,
	pub kind: EntityKind,
	pub degree: usize,
	pub tier: ImportanceTier,
	pub description: Option<String>,
	pub groups: Vec<String>,
	pub file_path: Option<String>,
	/// Labels of directly connected nodes, sorted.
	pub neighbors: Vec<String>,
	pub pinned: bool,
}

/// Notifications for the owning shell.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
	/// A build was committed.
	Rebuilt { nodes: usize, edges: usize },
	/// A build was committed with nothing to show.
	Empty,
	/// Hover details to show, or `None` when hover emphasis cleared.
	HoverDetails(Option<NodeDetails>),
	PinToggled { id: String, pinned: bool },
	ViewportSaved(Viewport),
	/// Transient user-facing message.
	Notice(String),
	NoticeCleared,
}

/// Proof that a refresh was started; see [`GraphEngine::finish_refresh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct RefreshTicket {
	generation: u64,
}

/// Interactive graph engine for one open view.
pub struct GraphEngine {
	config: GraphConfig,
	scale: ScaleConfig,
	surface: Box<dyn Surface>,
	theme: Box<dyn ThemeProvider>,
	store: Rc<dyn EntityStore>,
	settings: Rc<dyn SettingsStore>,
	resolver: Rc<dyn ResourceResolver>,
	lifecycle: Lifecycle,
	state: Option<ForceGraphState>,
	filters: GraphFilters,
	layout: LayoutName,
	edge_labels: EdgeLabelMode,
	pinned: HashSet<String>,
	/// Last known position of every pinned node, including pinned nodes the
	/// current filters hide.
	pin_positions: HashMap<String, (f64, f64)>,
	search_term: Option<String>,
	/// Node under the pointer, as last reported by pointer movement.
	pointer_over: Option<String>,
	hover_held: bool,
	scheduler: Scheduler,
	events: VecDeque<GraphEvent>,
	generation: u64,
	dirty: bool,
}

impl GraphEngine {
	pub fn new(
		config: GraphConfig,
		surface: Box<dyn Surface>,
		theme: Box<dyn ThemeProvider>,
		store: Rc<dyn EntityStore>,
		settings: Rc<dyn SettingsStore>,
		resolver: Rc<dyn ResourceResolver>,
	) -> Self {
		let config = match config.validate() {
			Ok(()) => config,
			Err(e) => {
				warn!("story-graph: {e}; using the default config");
				GraphConfig::default()
			}
		};
		let layout = config.default_layout;
		Self {
			config,
			scale: ScaleConfig::default(),
			surface,
			theme,
			store,
			settings,
			resolver,
			lifecycle: Lifecycle::Uninitialized,
			state: None,
			filters: GraphFilters::default(),
			layout,
			edge_labels: EdgeLabelMode::default(),
			pinned: HashSet::new(),
			pin_positions: HashMap::new(),
			search_term: None,
			pointer_over: None,
			hover_held: false,
			scheduler: Scheduler::default(),
			events: VecDeque::new(),
			generation: 0,
			dirty: true,
		}
	}

	pub fn with_filters(mut self, filters: GraphFilters) -> Self {
		self.filters = filters;
		self
	}

	pub fn with_scale(mut self, scale: ScaleConfig) -> Self {
		self.scale = scale;
		self
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.lifecycle
	}

	pub fn is_ready(&self) -> bool {
		self.lifecycle == Lifecycle::Ready
	}

	pub fn config(&self) -> &GraphConfig {
		&self.config
	}

	pub fn filters(&self) -> &GraphFilters {
		&self.filters
	}

	pub fn layout(&self) -> LayoutName {
		self.layout
	}

	pub fn edge_labels(&self) -> EdgeLabelMode {
		self.edge_labels
	}

	pub fn search_term(&self) -> Option<&str> {
		self.search_term.as_deref()
	}

	pub fn is_pinned(&self, id: &str) -> bool {
		self.pinned.contains(id)
	}

	pub fn pinned(&self) -> &HashSet<String> {
		&self.pinned
	}

	/// Entity store handle, for callers driving a split refresh.
	pub fn store(&self) -> Rc<dyn EntityStore> {
		Rc::clone(&self.store)
	}

	pub fn state(&self) -> Option<&ForceGraphState> {
		self.state.as_ref()
	}

	fn measure(&self) -> Result<(f64, f64)> {
		let (width, height) = self.surface.size().ok_or(GraphError::ContainerDetached)?;
		if !(width > 0.0 && height > 0.0) {
			return Err(GraphError::ContainerEmpty { width, height });
		}
		Ok((width, height))
	}

	fn next_ticket(&mut self) -> RefreshTicket {
		self.generation += 1;
		RefreshTicket {
			generation: self.generation,
		}
	}

	// --- lifecycle ---

	/// Validate the surface and start the initial build.
	pub fn begin_initialize(&mut self) -> Result<RefreshTicket> {
		match self.lifecycle {
			Lifecycle::Ready => return Err(GraphError::AlreadyInitialized),
			Lifecycle::Destroyed => return Err(GraphError::Destroyed),
			Lifecycle::Uninitialized => {}
		}
		self.measure()?;
		Ok(self.next_ticket())
	}

	/// Build, lay out and show the graph, restoring the saved viewport.
	pub async fn initialize(&mut self) -> Result<()> {
		let ticket = self.begin_initialize()?;
		let store = self.store();
		let story = collect_story(store.as_ref()).await;
		self.finish_refresh(ticket, story)?;
		Ok(())
	}

	/// Start a refresh. Any refresh started earlier becomes stale.
	pub fn begin_refresh(&mut self) -> Result<RefreshTicket> {
		if self.lifecycle == Lifecycle::Destroyed {
			return Err(GraphError::Destroyed);
		}
		Ok(self.next_ticket())
	}

	/// Commit collected data. Returns whether it was applied: results of a
	/// stale ticket, or arriving after `destroy`, are dropped.
	pub fn finish_refresh(&mut self, ticket: RefreshTicket, story: StoryData) -> Result<bool> {
		if self.lifecycle == Lifecycle::Destroyed {
			debug!("story-graph: dropping refresh result, engine destroyed");
			return Ok(false);
		}
		if ticket.generation != self.generation {
			debug!(
				"story-graph: dropping stale refresh {} (current {})",
				ticket.generation, self.generation
			);
			return Ok(false);
		}
		let (width, height) = self.measure()?;
		let data = build_graph_data(&story, &self.filters);
		let initial = self.lifecycle == Lifecycle::Uninitialized;
		self.rebuild(data, width, height, initial);
		if initial {
			self.lifecycle = Lifecycle::Ready;
			self.restore_viewport();
			info!(
				"story-graph: initialized with {} nodes, {} edges",
				self.get_node_count(),
				self.get_edge_count()
			);
		}
		Ok(true)
	}

	/// Re-fetch entities and rebuild with the current filters.
	pub async fn refresh(&mut self) -> Result<bool> {
		let ticket = self.begin_refresh()?;
		let store = self.store();
		let story = collect_story(store.as_ref()).await;
		self.finish_refresh(ticket, story)
	}

	/// Replace the filters and start the rebuild they require.
	pub fn set_filters(&mut self, filters: GraphFilters) -> Result<RefreshTicket> {
		let ticket = self.begin_refresh()?;
		self.filters = filters;
		Ok(ticket)
	}

	/// Replace the filters, then refresh fully.
	pub async fn apply_filters(&mut self, filters: GraphFilters) -> Result<bool> {
		let ticket = self.set_filters(filters)?;
		let store = self.store();
		let story = collect_story(store.as_ref()).await;
		self.finish_refresh(ticket, story)
	}

	/// Release the surface and cancel everything pending. Safe to call twice.
	pub fn destroy(&mut self) {
		if self.lifecycle == Lifecycle::Destroyed {
			debug!("story-graph: destroy called on destroyed engine");
			return;
		}
		let cancelled = self.scheduler.cancel_all();
		self.generation += 1;
		self.pinned.clear();
		self.pin_positions.clear();
		self.state = None;
		self.events.clear();
		self.pointer_over = None;
		self.hover_held = false;
		self.surface.release();
		self.lifecycle = Lifecycle::Destroyed;
		info!("story-graph: engine destroyed ({cancelled} pending tasks cancelled)");
	}

	/// Re-measure the surface after the container changed size.
	pub fn resize(&mut self) {
		let Ok((width, height)) = self.measure() else {
			return;
		};
		if let Some(state) = self.state.as_mut() {
			state.resize(width, height);
			self.dirty = true;
		}
	}

	fn rebuild(&mut self, data: GraphData, width: f64, height: f64, initial: bool) {
		let previous = self.state.take();
		let mut seed = HashMap::new();
		let mut signatures = HashMap::new();
		let mut transform = None;
		if let Some(old) = &previous {
			seed = old.positions();
			for element in &old.nodes {
				signatures.insert(element.node.id.clone(), old.signature(&element.node.id));
			}
			transform = Some(old.transform);
			for id in &self.pinned {
				if let Some(&pos) = seed.get(id) {
					self.pin_positions.insert(id.clone(), pos);
				}
			}
		}
		for (id, pos) in &self.pin_positions {
			seed.insert(id.clone(), *pos);
		}

		let allow_remote = self.settings.allow_remote_images();
		let resolver = Rc::clone(&self.resolver);
		let image_url = |node: &GraphNode| {
			node.image_ref
				.as_deref()
				.and_then(|r| resolve_image(r, allow_remote, resolver.as_ref()))
		};
		let mut state =
			ForceGraphState::new(data, image_url, &seed, &self.config.force, width, height);
		if let Some(transform) = transform {
			state.transform = transform;
		}

		let changed: Vec<&str> = state
			.nodes
			.iter()
			.map(|e| e.node.id.as_str())
			.filter(|id| signatures.get(*id) != Some(&state.signature(id)))
			.collect();
		let structural = initial || !changed.is_empty() || signatures.len() != state.node_count();
		let pinned_here: HashSet<String> = self
			.pinned
			.iter()
			.filter(|id| state.contains(id))
			.cloned()
			.collect();

		if structural {
			let mut locked = pinned_here.clone();
			if !initial && self.layout == LayoutName::Force {
				// Settled nodes stay put; only new or rewired nodes move.
				let changed: HashSet<&str> = changed.into_iter().collect();
				locked.extend(
					state
						.nodes
						.iter()
						.filter(|e| !changed.contains(e.node.id.as_str()))
						.map(|e| e.node.id.clone()),
				);
			}
			state.run_layout(self.layout, &self.config.force, &locked);
		}
		let ids: Vec<String> = state.nodes.iter().map(|e| e.node.id.clone()).collect();
		for id in ids {
			state.set_anchor(&id, pinned_here.contains(&id));
		}

		if let Some(term) = &self.search_term {
			state.mark_search(term);
		}
		self.pointer_over = None;
		if previous.as_ref().is_some_and(|old| old.emphasis.hovered.is_some()) {
			self.scheduler.cancel(TaskSlot::HoverDetails);
			self.scheduler.cancel(TaskSlot::HoverClear);
			self.events.push_back(GraphEvent::HoverDetails(None));
		}

		let (nodes, edges) = (state.node_count(), state.edge_count());
		self.state = Some(state);
		self.dirty = true;
		if nodes == 0 {
			info!("story-graph: nothing to display");
			self.events.push_back(GraphEvent::Empty);
		} else {
			debug!("story-graph: rebuilt with {nodes} nodes, {edges} edges (structural: {structural})");
			self.events.push_back(GraphEvent::Rebuilt { nodes, edges });
		}
	}

	// --- viewport ---

	fn restore_viewport(&mut self) {
		let saved = self.settings.viewport();
		let Some(state) = self.state.as_mut() else {
			return;
		};
		if let Some(viewport) = saved {
			state.transform = ViewTransform {
				x: viewport.pan.x,
				y: viewport.pan.y,
				k: self.config.clamp_zoom(viewport.zoom),
			};
			debug!("story-graph: restored viewport {viewport:?}");
			return;
		}
		if state.node_count() == 0 {
			return;
		}
		let margin = self.scale.node_radius * 2.0;
		let mut fit = state.fit_transform(
			self.config.fit_padding,
			margin,
			self.config.min_zoom,
			self.config.max_zoom,
		);
		if fit.k < self.config.small_fit_zoom {
			let k = self.config.clamp_zoom(fit.k * self.config.small_fit_correction);
			fit = recentered(state, k);
			debug!("story-graph: small fit corrected to zoom {k:.3}");
		}
		state.transform = fit;
		self.persist_viewport();
	}

	fn persist_viewport(&mut self) {
		let viewport = self.viewport();
		match self.settings.store_viewport(viewport) {
			Ok(()) => self.events.push_back(GraphEvent::ViewportSaved(viewport)),
			Err(e) => warn!("story-graph: failed to save viewport: {e}"),
		}
	}

	fn schedule_viewport_save(&mut self) {
		self.dirty = true;
		self.scheduler
			.schedule(Task::SaveViewport, self.config.viewport_save_delay);
	}

	/// Current zoom and pan.
	pub fn viewport(&self) -> Viewport {
		let t = self.state.as_ref().map(|s| s.transform).unwrap_or_default();
		Viewport {
			zoom: t.k,
			pan: Pan { x: t.x, y: t.y },
		}
	}

	pub fn set_viewport(&mut self, viewport: Viewport) {
		let k = self.config.clamp_zoom(viewport.zoom);
		let Some(state) = self.state.as_mut() else {
			return;
		};
		state.transform = ViewTransform {
			x: viewport.pan.x,
			y: viewport.pan.y,
			k,
		};
		self.schedule_viewport_save();
	}

	fn zoom_by(&mut self, factor: f64) {
		let (min, max) = (self.config.min_zoom, self.config.max_zoom);
		let Some(state) = self.state.as_mut() else {
			return;
		};
		let (cx, cy) = (state.width / 2.0, state.height / 2.0);
		state.zoom_at(factor, cx, cy, min, max);
		self.schedule_viewport_save();
	}

	pub fn zoom_in(&mut self) {
		self.zoom_by(self.config.zoom_step);
	}

	pub fn zoom_out(&mut self) {
		self.zoom_by(1.0 / self.config.zoom_step);
	}

	pub fn fit_to_view(&mut self) {
		let margin = self.scale.node_radius * 2.0;
		let Some(state) = self.state.as_mut() else {
			return;
		};
		state.transform = state.fit_transform(
			self.config.fit_padding,
			margin,
			self.config.min_zoom,
			self.config.max_zoom,
		);
		self.schedule_viewport_save();
	}

	// --- search ---

	/// Highlight nodes whose label contains `term`, case-insensitively, and
	/// dim the rest.
	///
	/// An empty or blank term does nothing at all, leaving any earlier
	/// highlighting in place: callers clearing the search box must call
	/// [`clear_search`](Self::clear_search) themselves.
	/// [`schedule_search`](Self::schedule_search) does that automatically.
	pub fn search_and_highlight(&mut self, term: &str) {
		let term = term.trim();
		if term.is_empty() {
			return;
		}
		self.scheduler.cancel(TaskSlot::Search);
		let Some(state) = self.state.as_mut() else {
			return;
		};
		state.mark_search(term);
		self.search_term = Some(term.to_string());
		self.dirty = true;
	}

	/// Drop the search emphasis along with any debounced search still pending.
	pub fn clear_search(&mut self) {
		self.scheduler.cancel(TaskSlot::Search);
		self.search_term = None;
		if let Some(state) = self.state.as_mut() {
			state.emphasis.search.clear();
		}
		self.dirty = true;
	}

	/// Debounced search; an empty term clears the search once it settles.
	pub fn schedule_search(&mut self, term: &str) {
		self.scheduler
			.schedule(Task::Search(term.to_string()), self.config.search_debounce);
	}

	// --- hover ---

	/// Pointer entered node `id`.
	pub fn hover_node(&mut self, id: &str) {
		self.scheduler.cancel(TaskSlot::HoverClear);
		let Some(state) = self.state.as_mut() else {
			return;
		};
		if !state.contains(id) || state.emphasis.hovered.as_deref() == Some(id) {
			return;
		}
		state.mark_hover(id);
		self.dirty = true;
		self.scheduler.schedule(
			Task::HoverDetails(id.to_string()),
			self.config.hover_details_delay,
		);
	}

	/// Pointer left the hovered node. Emphasis clears after a grace period
	/// unless the pointer comes back or a detail panel holds it.
	pub fn unhover_node(&mut self) {
		if self.hover_held {
			return;
		}
		self.scheduler
			.schedule(Task::ClearHover, self.config.hover_clear_delay);
	}

	/// Keep hover emphasis while the pointer is inside a detail panel.
	pub fn hold_hover(&mut self) {
		self.hover_held = true;
		self.scheduler.cancel(TaskSlot::HoverClear);
	}

	pub fn release_hover(&mut self) {
		self.hover_held = false;
		if self.pointer_over.is_none() {
			self.unhover_node();
		}
	}

	pub fn hovered(&self) -> Option<&str> {
		self.state.as_ref()?.emphasis.hovered.as_deref()
	}

	fn clear_hover(&mut self) {
		self.scheduler.cancel(TaskSlot::HoverDetails);
		let Some(state) = self.state.as_mut() else {
			return;
		};
		if state.emphasis.hovered.is_none() && state.emphasis.hover.is_empty() {
			return;
		}
		state.emphasis.clear_hover();
		self.dirty = true;
		self.events.push_back(GraphEvent::HoverDetails(None));
	}

	/// Details of node `id` as shown by a detail panel.
	pub fn node_details(&self, id: &str) -> Option<NodeDetails> {
		let state = self.state.as_ref()?;
		let node = &state.element(id)?.node;
		let common = node.entity.common();
		let mut neighbors: Vec<String> = state
			.neighbors(id)
			.into_iter()
			.filter_map(|n| state.element(n).map(|e| e.node.label.clone()))
			.collect();
		neighbors.sort();
		Some(NodeDetails {
			id: node.id.clone(),
			label: node.label.clone(),
			kind: node.kind,
			degree: node.degree,
			tier: ImportanceTier::from_degree(node.degree),
			description: common.description.clone().filter(|d| !d.is_empty()),
			groups: common.groups.clone(),
			file_path: common.file_path.clone(),
			neighbors,
			pinned: self.pinned.contains(id),
		})
	}

	// --- pins, layout, labels ---

	/// Pin or unpin node `id`. Returns the new pinned state, or `None` when the
	/// node is not displayed.
	pub fn toggle_node_pin(&mut self, id: &str) -> Option<bool> {
		let state = self.state.as_mut()?;
		if !state.contains(id) {
			return None;
		}
		let pinned = if self.pinned.remove(id) {
			self.pin_positions.remove(id);
			false
		} else {
			if let Some(pos) = state.position(id) {
				self.pin_positions.insert(id.to_string(), pos);
			}
			self.pinned.insert(id.to_string());
			true
		};
		state.set_anchor(id, pinned);
		self.dirty = true;
		debug!("story-graph: {id} pinned: {pinned}");
		self.events.push_back(GraphEvent::PinToggled {
			id: id.to_string(),
			pinned,
		});
		Some(pinned)
	}

	/// Switch layouts by name. Unknown names leave the layout unchanged.
	pub fn change_layout(&mut self, name: &str) -> bool {
		match name.parse::<LayoutName>() {
			Ok(layout) => {
				self.set_layout(layout);
				true
			}
			Err(e) => {
				warn!("story-graph: {e}");
				false
			}
		}
	}

	/// Run `layout` to completion, pinned nodes locked, then fit.
	pub fn set_layout(&mut self, layout: LayoutName) {
		self.layout = layout;
		let Some(state) = self.state.as_mut() else {
			return;
		};
		let locked: HashSet<String> = self
			.pinned
			.iter()
			.filter(|id| state.contains(id))
			.cloned()
			.collect();
		state.run_layout(layout, &self.config.force, &locked);
		info!("story-graph: layout {layout}");
		self.fit_to_view();
	}

	pub fn toggle_edge_labels(&mut self) -> EdgeLabelMode {
		self.edge_labels = self.edge_labels.toggled();
		self.dirty = true;
		self.edge_labels
	}

	// --- pointer input (screen coordinates relative to the surface) ---

	pub fn pointer_down(&mut self, sx: f64, sy: f64) {
		let Some(state) = self.state.as_mut() else {
			return;
		};
		match state.node_at_position(sx, sy, &self.scale) {
			Some(id) if self.pinned.contains(&id) => {}
			Some(id) => {
				let (nx, ny) = state.position(&id).unwrap_or_default();
				state.drag.active = true;
				state.drag.node = Some(id);
				state.drag.start_x = sx;
				state.drag.start_y = sy;
				state.drag.node_start_x = nx;
				state.drag.node_start_y = ny;
			}
			None => {
				state.pan.active = true;
				state.pan.moved = false;
				state.pan.start_x = sx;
				state.pan.start_y = sy;
				state.pan.transform_start_x = state.transform.x;
				state.pan.transform_start_y = state.transform.y;
			}
		}
	}

	pub fn pointer_move(&mut self, sx: f64, sy: f64) {
		let Some(state) = self.state.as_mut() else {
			return;
		};
		if state.drag.active {
			if let Some(id) = state.drag.node.clone() {
				let k = state.transform.k;
				let nx = state.drag.node_start_x + (sx - state.drag.start_x) / k;
				let ny = state.drag.node_start_y + (sy - state.drag.start_y) / k;
				state.set_position(&id, nx, ny);
				self.dirty = true;
			}
			return;
		}
		if state.pan.active {
			state.transform.x = state.pan.transform_start_x + (sx - state.pan.start_x);
			state.transform.y = state.pan.transform_start_y + (sy - state.pan.start_y);
			state.pan.moved = true;
			self.dirty = true;
			return;
		}

		let over = state.node_at_position(sx, sy, &self.scale);
		if over == self.pointer_over {
			return;
		}
		self.pointer_over = over.clone();
		match over {
			Some(id) => self.hover_node(&id),
			None => self.unhover_node(),
		}
	}

	pub fn pointer_up(&mut self) {
		let Some(state) = self.state.as_mut() else {
			return;
		};
		let panned = state.pan.active && state.pan.moved;
		state.drag = Default::default();
		state.pan = Default::default();
		if panned {
			self.schedule_viewport_save();
		}
	}

	/// Pointer left the surface entirely.
	pub fn pointer_leave(&mut self) {
		self.pointer_up();
		if self.pointer_over.take().is_some() {
			self.unhover_node();
		}
	}

	/// Secondary click: toggles the pin of the node under the pointer.
	pub fn context_click(&mut self, sx: f64, sy: f64) -> Option<bool> {
		let id = self
			.state
			.as_ref()?
			.node_at_position(sx, sy, &self.scale)?;
		self.toggle_node_pin(&id)
	}

	/// Wheel zoom anchored at the pointer.
	pub fn wheel(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y < 0.0 {
			self.config.zoom_step
		} else {
			1.0 / self.config.zoom_step
		};
		let (min, max) = (self.config.min_zoom, self.config.max_zoom);
		let Some(state) = self.state.as_mut() else {
			return;
		};
		state.zoom_at(factor, sx, sy, min, max);
		self.schedule_viewport_save();
	}

	// --- frame loop ---

	/// Advance deferred tasks by `dt` seconds. No-op once destroyed.
	pub fn tick(&mut self, dt: f64) {
		if self.lifecycle == Lifecycle::Destroyed {
			return;
		}
		for task in self.scheduler.advance(dt) {
			self.run_task(task);
		}
	}

	fn run_task(&mut self, task: Task) {
		match task {
			Task::SaveViewport => self.persist_viewport(),
			Task::HoverDetails(id) => {
				if self.hovered() == Some(id.as_str()) {
					let details = self.node_details(&id);
					self.events.push_back(GraphEvent::HoverDetails(details));
				}
			}
			Task::ClearHover => self.clear_hover(),
			Task::Search(term) => {
				if term.trim().is_empty() {
					self.clear_search();
				} else {
					self.search_and_highlight(&term);
				}
			}
			Task::DismissNotice => self.events.push_back(GraphEvent::NoticeCleared),
		}
	}

	/// Queue a transient notice that clears itself.
	pub fn notice(&mut self, message: impl Into<String>) {
		self.events.push_back(GraphEvent::Notice(message.into()));
		self.scheduler
			.schedule(Task::DismissNotice, self.config.notice_duration);
	}

	pub fn drain_events(&mut self) -> Vec<GraphEvent> {
		self.events.drain(..).collect()
	}

	pub fn has_pending(&self, slot: TaskSlot) -> bool {
		self.scheduler.is_pending(slot)
	}

	/// Draw if anything changed since the last frame. Returns whether a
	/// frame was drawn.
	pub fn render(&mut self) -> bool {
		if !self.dirty || self.lifecycle != Lifecycle::Ready {
			return false;
		}
		self.dirty = false;
		match self.scene() {
			Some(scene) => self.surface.draw(&scene),
			None => {
				let tokens = self.theme.tokens();
				self.surface.draw_empty(&tokens, EMPTY_MESSAGE);
			}
		}
		true
	}

	/// Request a redraw on the next frame, e.g. after a theme change.
	pub fn invalidate(&mut self) {
		self.dirty = true;
	}

	/// Resolve the current frame. `None` when there is nothing to draw.
	pub fn scene(&self) -> Option<Scene> {
		let state = self.state.as_ref()?;
		if state.node_count() == 0 {
			return None;
		}
		let tokens = self.theme.tokens();
		let scale = ScaledValues::new(&self.scale, state.transform.k);
		let positions = state.positions();

		let mut nodes: Vec<(u8, SceneNode)> = state
			.nodes
			.iter()
			.filter_map(|element| {
				let id = &element.node.id;
				let &(x, y) = positions.get(id)?;
				let mark = state.emphasis.node(id);
				let style = style::node_style(
					&tokens,
					element.node.kind,
					element.node.degree,
					mark,
					self.pinned.contains(id),
				);
				let layer = match mark {
					Some(Mark::Dimmed) => 0,
					None => 1,
					Some(Mark::Highlighted) => 2,
				};
				Some((
					layer,
					SceneNode {
						id: id.clone(),
						label: element.node.label.clone(),
						x,
						y,
						radius: scale.radius(style.size),
						style,
						image_url: element.image_url.clone(),
					},
				))
			})
			.collect();
		nodes.sort_by_key(|(layer, _)| *layer);
		let radii: HashMap<&str, f64> = nodes
			.iter()
			.map(|(_, n)| (n.id.as_str(), n.radius))
			.collect();

		let edges = state
			.edges
			.iter()
			.enumerate()
			.filter_map(|(i, element)| {
				let edge = &element.edge;
				let from = *positions.get(&edge.source)?;
				let to = *positions.get(&edge.target)?;
				let style = style::edge_style(&tokens, edge, state.emphasis.edge(i), self.edge_labels);
				let label = style
					.show_label
					.then(|| style::edge_label_text(edge).to_string());
				Some(SceneEdge {
					from,
					to,
					target_radius: radii.get(edge.target.as_str()).copied().unwrap_or(0.0),
					style,
					label,
				})
			})
			.collect();

		Some(Scene {
			width: state.width,
			height: state.height,
			transform: state.transform,
			tokens,
			scale,
			edges,
			nodes: nodes.into_iter().map(|(_, n)| n).collect(),
		})
	}

	// --- export and counts ---

	/// Rasterize the current view at the configured scale and offer it as a
	/// timestamped download. Failures also raise a notice.
	pub fn export_as_image(&mut self, format: ExportFormat) -> Result<String> {
		let result = self.try_export(format);
		if let Err(e) = &result {
			warn!("story-graph: {e}");
			self.notice(format!("Export failed: {e}"));
		}
		result
	}

	fn try_export(&mut self, format: ExportFormat) -> Result<String> {
		if self.lifecycle != Lifecycle::Ready {
			return Err(GraphError::Export("graph is not ready".into()));
		}
		let scene = self
			.scene()
			.ok_or_else(|| GraphError::Export("nothing to export".into()))?;
		let request = ExportRequest {
			format,
			scale: self.config.export_scale,
			background: scene.tokens.background,
			filename: export_filename(format, chrono::Utc::now()),
		};
		self.surface.export(&scene, &request)?;
		info!("story-graph: exported {}", request.filename);
		Ok(request.filename)
	}

	/// Live node count.
	pub fn get_node_count(&self) -> usize {
		self.state.as_ref().map_or(0, ForceGraphState::node_count)
	}

	/// Live edge count.
	pub fn get_edge_count(&self) -> usize {
		self.state.as_ref().map_or(0, ForceGraphState::edge_count)
	}

	fn displayed(&self) -> impl Iterator<Item = &GraphNode> {
		self.state.iter().flat_map(|state| state.nodes.iter().map(|e| &e.node))
	}

	/// Node counts per kind for legends.
	pub fn kind_counts(&self) -> HashMap<EntityKind, usize> {
		builder::kind_counts(self.displayed()).into_iter().collect()
	}

	/// The `limit` most connected displayed nodes as (label, degree).
	pub fn most_connected(&self, limit: usize) -> Vec<(String, usize)> {
		builder::most_connected(self.displayed(), limit)
			.into_iter()
			.map(|n| (n.label.clone(), n.degree))
			.collect()
	}

	/// Every group carried by a displayed node, sorted.
	pub fn groups(&self) -> Vec<String> {
		builder::groups(self.displayed()).into_iter().collect()
	}
}

impl Drop for GraphEngine {
	fn drop(&mut self) {
		self.destroy();
	}
}

/// Transform at zoom `k` centered on the content bounds.
fn recentered(state: &ForceGraphState, k: f64) -> ViewTransform {
	let (cx, cy) = state
		.bounds()
		.map(|(x0, y0, x1, y1)| ((x0 + x1) / 2.0, (y0 + y1) / 2.0))
		.unwrap_or_default();
	ViewTransform {
		x: state.width / 2.0 - cx * k,
		y: state.height / 2.0 - cy * k,
		k,
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use super::*;
	use crate::builder::GraphFilters;
	use crate::entities::{
		Character, EntityCommon, Location, RelationshipType, TypedConnection,
	};
	use crate::store::{BaseUrlResolver, MemorySettings, MemoryStore, PluginSettings};
	use crate::components::force_graph::theme::{Theme, ThemeTokens};

	#[derive(Debug, Default)]
	struct SurfaceLog {
		draws: usize,
		empty: Vec<String>,
		exports: Vec<ExportRequest>,
		released: usize,
		last_scene: Option<Scene>,
	}

	struct FakeSurface {
		size: Option<(f64, f64)>,
		fail_export: bool,
		log: Rc<RefCell<SurfaceLog>>,
	}

	impl Surface for FakeSurface {
		fn size(&self) -> Option<(f64, f64)> {
			self.size
		}

		fn draw(&mut self, scene: &Scene) {
			let mut log = self.log.borrow_mut();
			log.draws += 1;
			log.last_scene = Some(scene.clone());
		}

		fn draw_empty(&mut self, _tokens: &ThemeTokens, message: &str) {
			self.log.borrow_mut().empty.push(message.to_string());
		}

		fn export(&mut self, _scene: &Scene, request: &ExportRequest) -> Result<()> {
			if self.fail_export {
				return Err(GraphError::Export("canvas tainted".into()));
			}
			self.log.borrow_mut().exports.push(request.clone());
			Ok(())
		}

		fn release(&mut self) {
			self.log.borrow_mut().released += 1;
		}
	}

	struct Harness {
		store: Rc<MemoryStore>,
		settings: Rc<MemorySettings>,
		log: Rc<RefCell<SurfaceLog>>,
	}

	impl Harness {
		fn new(story: StoryData) -> Self {
			Self {
				store: Rc::new(MemoryStore::new(story)),
				settings: Rc::new(MemorySettings::default()),
				log: Rc::default(),
			}
		}

		fn engine_sized(&self, size: Option<(f64, f64)>) -> GraphEngine {
			self.engine_with(GraphConfig::default(), size, false)
		}

		fn engine_with(
			&self,
			config: GraphConfig,
			size: Option<(f64, f64)>,
			fail_export: bool,
		) -> GraphEngine {
			let surface = FakeSurface {
				size,
				fail_export,
				log: Rc::clone(&self.log),
			};
			GraphEngine::new(
				config,
				Box::new(surface),
				Box::new(Theme::default()),
				self.store.clone(),
				self.settings.clone(),
				Rc::new(BaseUrlResolver::default()),
			)
		}

		fn engine(&self) -> GraphEngine {
			self.engine_sized(Some((800.0, 600.0)))
		}
	}

	fn person(name: &str, links: &[(&str, RelationshipType)]) -> Character {
		Character {
			common: EntityCommon {
				name: name.into(),
				connections: links
					.iter()
					.map(|(t, kind)| TypedConnection::new(*t, *kind))
					.collect(),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn story() -> StoryData {
		StoryData {
			characters: vec![
				person(
					"Queen Elara",
					&[("Bram", RelationshipType::Mentor), ("Cora", RelationshipType::Enemy)],
				),
				person("Bram", &[("Dax", RelationshipType::Mentor)]),
				person("Cora", &[]),
				person("Dax", &[]),
			],
			locations: vec![Location {
				common: EntityCommon {
					name: "Castle".into(),
					..Default::default()
				},
				..Default::default()
			}],
			..Default::default()
		}
	}

	#[tokio::test]
	async fn initialize_builds_and_draws() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		assert!(engine.is_ready());
		assert_eq!(engine.get_node_count(), 5);
		assert_eq!(engine.get_edge_count(), 3);
		assert!(engine.render());
		assert!(!engine.render(), "nothing changed since the last frame");
		assert_eq!(h.log.borrow().draws, 1);
		assert!(
			engine
				.drain_events()
				.contains(&GraphEvent::Rebuilt { nodes: 5, edges: 3 })
		);
	}

	#[tokio::test]
	async fn initialization_errors_are_catchable() {
		let h = Harness::new(story());

		let mut detached = h.engine_sized(None);
		assert!(matches!(
			detached.initialize().await,
			Err(GraphError::ContainerDetached)
		));
		assert_eq!(detached.lifecycle(), Lifecycle::Uninitialized);
		assert_eq!(detached.get_node_count(), 0);

		let mut collapsed = h.engine_sized(Some((0.0, 400.0)));
		assert!(matches!(
			collapsed.initialize().await,
			Err(GraphError::ContainerEmpty { .. })
		));

		let mut twice = h.engine();
		twice.initialize().await.unwrap();
		assert!(matches!(
			twice.initialize().await,
			Err(GraphError::AlreadyInitialized)
		));
	}

	#[tokio::test]
	async fn unusable_config_falls_back_to_defaults() {
		let h = Harness::new(story());
		let config = GraphConfig {
			min_zoom: 2.0,
			max_zoom: 1.0,
			..GraphConfig::default()
		};
		let mut engine = h.engine_with(config, Some((800.0, 600.0)), false);
		assert_eq!(engine.config().min_zoom, GraphConfig::default().min_zoom);
		engine.initialize().await.unwrap();
		engine.zoom_in();
		assert!(engine.is_ready());
	}

	#[tokio::test]
	async fn empty_story_renders_empty_state() {
		let h = Harness::new(StoryData::default());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		assert_eq!(engine.get_node_count(), 0);
		assert!(engine.scene().is_none());
		assert!(engine.render());
		assert_eq!(h.log.borrow().empty, vec![EMPTY_MESSAGE.to_string()]);
		assert_eq!(h.log.borrow().draws, 0);
		assert!(engine.drain_events().contains(&GraphEvent::Empty));
	}

	#[tokio::test]
	async fn pin_survives_refresh() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		assert_eq!(engine.toggle_node_pin("Bram"), Some(true));
		let before = engine.state().unwrap().position("Bram");
		assert!(before.is_some());

		assert!(engine.refresh().await.unwrap());
		assert!(engine.is_pinned("Bram"));
		assert_eq!(engine.state().unwrap().position("Bram"), before);
		let scene = engine.scene().unwrap();
		assert!(scene.nodes.iter().find(|n| n.id == "Bram").unwrap().style.pinned);

		// Structural change: a new node wired to Bram forces a layout pass.
		h.store.update(|s| {
			s.characters
				.push(person("Eda", &[("Bram", RelationshipType::Ally)]));
		});
		engine.refresh().await.unwrap();
		assert_eq!(engine.get_node_count(), 6);
		assert_eq!(engine.state().unwrap().position("Bram"), before);
		let scene = engine.scene().unwrap();
		assert!(scene.nodes.iter().find(|n| n.id == "Bram").unwrap().style.pinned);
		assert!(!scene.nodes.iter().find(|n| n.id == "Eda").unwrap().style.pinned);

		assert_eq!(engine.toggle_node_pin("Bram"), Some(false));
		assert!(!engine.is_pinned("Bram"));
		assert_eq!(engine.toggle_node_pin("Nobody"), None);
	}

	#[tokio::test]
	async fn unchanged_refresh_preserves_dragged_positions() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		let (sx, sy) = {
			let state = engine.state().unwrap();
			let (x, y) = state.position("Cora").unwrap();
			state.graph_to_screen(x, y)
		};
		engine.pointer_down(sx, sy);
		engine.pointer_move(sx + 40.0, sy + 10.0);
		engine.pointer_up();
		let moved = engine.state().unwrap().position("Cora");

		engine.refresh().await.unwrap();
		assert_eq!(engine.state().unwrap().position("Cora"), moved);
	}

	#[tokio::test]
	async fn search_highlights_matches_and_requires_explicit_clear() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		engine.search_and_highlight("elara");
		let state = engine.state().unwrap();
		assert_eq!(state.emphasis.node("Queen Elara"), Some(Mark::Highlighted));
		for id in ["Bram", "Cora", "Dax", "Castle"] {
			assert_eq!(state.emphasis.node(id), Some(Mark::Dimmed), "{id}");
		}
		assert!((0..state.edge_count()).all(|i| state.emphasis.edge(i) == Some(Mark::Dimmed)));

		engine.search_and_highlight("   ");
		assert_eq!(engine.search_term(), Some("elara"));

		engine.clear_search();
		let state = engine.state().unwrap();
		assert!(state.emphasis.search.is_empty());
		assert_eq!(state.emphasis.node("Queen Elara"), None);
	}

	#[tokio::test]
	async fn scheduled_search_debounces_and_clears_on_empty() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		engine.schedule_search("br");
		engine.tick(0.1);
		engine.schedule_search("bram");
		engine.tick(0.2);
		assert_eq!(engine.search_term(), None);
		engine.tick(0.1);
		assert_eq!(engine.search_term(), Some("bram"));

		engine.schedule_search("");
		engine.tick(1.0);
		assert_eq!(engine.search_term(), None);
		assert!(engine.state().unwrap().emphasis.search.is_empty());
	}

	#[tokio::test]
	async fn clearing_drops_a_pending_search() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		engine.schedule_search("br");
		engine.clear_search();
		assert!(!engine.has_pending(TaskSlot::Search));
		engine.tick(0.3);
		assert_eq!(engine.search_term(), None);
		assert!(engine.state().unwrap().emphasis.search.is_empty());

		// An explicit search wins over a debounced one still in flight.
		engine.schedule_search("cora");
		engine.search_and_highlight("dax");
		engine.tick(0.3);
		assert_eq!(engine.search_term(), Some("dax"));
	}

	#[tokio::test]
	async fn search_is_reapplied_after_refresh() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		engine.search_and_highlight("dax");

		engine.refresh().await.unwrap();
		assert_eq!(
			engine.state().unwrap().emphasis.node("Dax"),
			Some(Mark::Highlighted)
		);
	}

	#[tokio::test]
	async fn hover_publishes_details_then_clears_after_grace() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		engine.drain_events();

		engine.hover_node("Bram");
		assert_eq!(engine.hovered(), Some("Bram"));
		assert!(engine.drain_events().is_empty());

		engine.tick(0.06);
		let events = engine.drain_events();
		let Some(GraphEvent::HoverDetails(Some(details))) = events.first() else {
			panic!("expected hover details, got {events:?}");
		};
		assert_eq!(details.neighbors, vec!["Dax".to_string(), "Queen Elara".to_string()]);

		engine.unhover_node();
		engine.tick(0.2);
		assert_eq!(engine.hovered(), Some("Bram"));
		engine.hover_node("Bram");
		engine.tick(1.0);
		assert_eq!(engine.hovered(), Some("Bram"), "re-entry cancels the clear");

		engine.unhover_node();
		engine.tick(0.4);
		assert_eq!(engine.hovered(), None);
		assert_eq!(engine.drain_events(), vec![GraphEvent::HoverDetails(None)]);
	}

	#[tokio::test]
	async fn fast_pointer_movement_skips_stale_details() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		engine.drain_events();

		engine.hover_node("Bram");
		engine.tick(0.01);
		engine.hover_node("Cora");
		engine.tick(0.06);
		let events = engine.drain_events();
		assert_eq!(events.len(), 1);
		assert!(matches!(&events[0], GraphEvent::HoverDetails(Some(d)) if d.id == "Cora"));
	}

	#[tokio::test]
	async fn held_hover_survives_pointer_leave() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		engine.hover_node("Dax");
		engine.unhover_node();
		engine.hold_hover();
		engine.tick(2.0);
		assert_eq!(engine.hovered(), Some("Dax"));

		engine.release_hover();
		engine.tick(0.4);
		assert_eq!(engine.hovered(), None);
	}

	#[tokio::test]
	async fn viewport_round_trips_through_settings() {
		let h = Harness::new(story());
		let mut first = h.engine();
		first.initialize().await.unwrap();

		first.set_viewport(Viewport {
			zoom: 1.5,
			pan: Pan { x: 100.0, y: 50.0 },
		});
		first.tick(0.1);
		assert_eq!(h.settings.load().network_graph_zoom.map(|z| z == 1.5), Some(false));
		first.tick(0.3);
		assert_eq!(h.settings.load().network_graph_zoom, Some(1.5));
		first.destroy();

		let mut second = h.engine();
		second.initialize().await.unwrap();
		assert_eq!(
			second.viewport(),
			Viewport {
				zoom: 1.5,
				pan: Pan { x: 100.0, y: 50.0 },
			}
		);
	}

	#[tokio::test]
	async fn continuous_zooming_writes_once() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		let baseline = h.settings.write_count();

		for _ in 0..5 {
			engine.zoom_in();
			engine.tick(0.1);
		}
		engine.zoom_out();
		engine.fit_to_view();
		assert_eq!(h.settings.write_count(), baseline);
		engine.tick(0.35);
		assert_eq!(h.settings.write_count(), baseline + 1);
	}

	#[tokio::test]
	async fn first_fit_is_persisted_as_baseline() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		assert_eq!(h.settings.write_count(), 1);
		assert_eq!(h.settings.viewport(), Some(engine.viewport()));
	}

	#[tokio::test]
	async fn small_fits_are_corrected_upwards() {
		let crowd: Vec<Character> = (0..60)
			.map(|i| person(&format!("Extra {i}"), &[]))
			.collect();
		let h = Harness::new(StoryData {
			characters: crowd,
			..Default::default()
		});
		let config = GraphConfig {
			default_layout: LayoutName::Circle,
			..Default::default()
		};
		let mut engine = h.engine_with(config, Some((200.0, 150.0)), false);
		engine.initialize().await.unwrap();

		let state = engine.state().unwrap();
		let raw = state.fit_transform(50.0, 28.0, 0.1, 10.0);
		assert!(raw.k < 0.7);
		let expected = (raw.k * 1.2).clamp(0.1, 10.0);
		assert!((engine.viewport().zoom - expected).abs() < 1e-9);

		// Corrected fit stays centered on the content.
		let (x0, y0, x1, y1) = state.bounds().unwrap();
		let (sx, sy) = state.graph_to_screen((x0 + x1) / 2.0, (y0 + y1) / 2.0);
		assert!((sx - 100.0).abs() < 1e-6 && (sy - 75.0).abs() < 1e-6);
	}

	#[tokio::test]
	async fn overlapping_refreshes_keep_the_latest() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		let first = engine.begin_refresh().unwrap();
		let second = engine.begin_refresh().unwrap();
		let small = StoryData {
			characters: vec![person("Solo", &[])],
			..Default::default()
		};
		assert!(engine.finish_refresh(second, small).unwrap());
		assert!(!engine.finish_refresh(first, story()).unwrap());
		assert_eq!(engine.get_node_count(), 1);
	}

	#[tokio::test]
	async fn filters_apply_through_a_full_refresh() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		engine
			.apply_filters(GraphFilters::characters_only())
			.await
			.unwrap();
		assert_eq!(engine.get_node_count(), 4);
		let state = engine.state().unwrap();
		assert!(state.nodes.iter().all(|e| e.node.kind == EntityKind::Character));

		engine.apply_filters(GraphFilters::default()).await.unwrap();
		assert_eq!(engine.get_node_count(), 5);
	}

	#[tokio::test]
	async fn failing_collections_are_skipped() {
		let h = Harness::new(story());
		h.store.set_failing(EntityKind::Location, true);
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		assert_eq!(engine.get_node_count(), 4);
	}

	#[tokio::test]
	async fn destroy_is_idempotent_and_cancels_tasks() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		engine.toggle_node_pin("Dax");
		engine.zoom_in();
		engine.hover_node("Cora");
		let writes = h.settings.write_count();

		engine.destroy();
		engine.destroy();
		assert_eq!(engine.lifecycle(), Lifecycle::Destroyed);
		assert_eq!(h.log.borrow().released, 1);
		assert!(engine.pinned().is_empty());
		assert!(!engine.has_pending(TaskSlot::Viewport));

		engine.tick(5.0);
		assert_eq!(h.settings.write_count(), writes);
		assert!(engine.drain_events().is_empty());
		assert!(!engine.render());
		assert!(matches!(engine.refresh().await, Err(GraphError::Destroyed)));
	}

	#[tokio::test]
	async fn refresh_completing_after_destroy_is_dropped() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		let ticket = engine.begin_refresh().unwrap();
		engine.destroy();
		assert!(!engine.finish_refresh(ticket, story()).unwrap());
		assert_eq!(engine.get_node_count(), 0);
	}

	#[tokio::test]
	async fn layouts_change_by_name() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		engine.toggle_node_pin("Castle");
		let castle = engine.state().unwrap().position("Castle");

		assert!(engine.change_layout("Grid"));
		assert_eq!(engine.layout(), LayoutName::Grid);
		assert_eq!(engine.state().unwrap().position("Castle"), castle);
		assert!(!engine.change_layout("spiral"));
		assert_eq!(engine.layout(), LayoutName::Grid);
	}

	#[tokio::test]
	async fn edge_labels_toggle_without_touching_data() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();

		let before = engine.scene().unwrap();
		assert!(before.edges.iter().all(|e| e.label.is_none()));
		assert_eq!(engine.toggle_edge_labels(), EdgeLabelMode::Always);
		let after = engine.scene().unwrap();
		assert!(after.edges.iter().all(|e| e.label.is_some()));
		assert_eq!(engine.get_edge_count(), 3);
		assert_eq!(engine.toggle_edge_labels(), EdgeLabelMode::HighlightedOnly);
	}

	#[tokio::test]
	async fn context_click_toggles_pins() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		engine.set_layout(LayoutName::Grid);

		let (sx, sy) = {
			let state = engine.state().unwrap();
			let (x, y) = state.position("Dax").unwrap();
			state.graph_to_screen(x, y)
		};
		assert_eq!(engine.context_click(sx, sy), Some(true));
		assert!(engine.is_pinned("Dax"));

		// Pinned nodes cannot be dragged.
		let before = engine.state().unwrap().position("Dax");
		engine.pointer_down(sx, sy);
		engine.pointer_move(sx + 50.0, sy);
		engine.pointer_up();
		assert_eq!(engine.state().unwrap().position("Dax"), before);
	}

	#[tokio::test]
	async fn export_names_file_and_reports_failures() {
		let h = Harness::new(story());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		let name = engine.export_as_image(ExportFormat::Png).unwrap();
		assert!(name.starts_with("story-graph-") && name.ends_with(".png"));
		let log = h.log.borrow();
		assert_eq!(log.exports[0].scale, 2.0);
		assert_eq!(log.exports[0].background, Theme::default().tokens.background);
		drop(log);

		let failing = Harness::new(story());
		let mut engine = failing.engine_with(GraphConfig::default(), Some((800.0, 600.0)), true);
		engine.initialize().await.unwrap();
		engine.drain_events();
		assert!(engine.export_as_image(ExportFormat::Jpeg).is_err());
		assert!(matches!(
			engine.drain_events().as_slice(),
			[GraphEvent::Notice(_)]
		));
		engine.tick(5.0);
		assert_eq!(engine.drain_events(), vec![GraphEvent::NoticeCleared]);
		assert_eq!(engine.get_node_count(), 5);
	}

	#[tokio::test]
	async fn remote_images_follow_policy() {
		let mut with_image = story();
		with_image.characters[0].common.profile_image_path = Some("https://example.com/q.png".into());
		with_image.characters[1].common.profile_image_path = Some("art/bram.png".into());

		let h = Harness::new(with_image.clone());
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		let state = engine.state().unwrap();
		assert_eq!(state.element("Queen Elara").unwrap().image_url, None);
		assert_eq!(
			state.element("Bram").unwrap().image_url.as_deref(),
			Some("art/bram.png")
		);

		let h = Harness::new(with_image);
		h.settings
			.save(&PluginSettings {
				allow_remote_images: true,
				..Default::default()
			})
			.unwrap();
		let mut engine = h.engine();
		engine.initialize().await.unwrap();
		assert!(engine.state().unwrap().element("Queen Elara").unwrap().image_url.is_some());
	}
}
