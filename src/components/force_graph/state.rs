//! Live element state of one rendered graph.
//!
//! Wraps the `force_graph` simulation with per-node element data, the view
//! transform for pan/zoom, drag/pan tracking and the two emphasis layers
//! (search and hover). Everything here is synchronous; the engine owns the
//! lifecycle around it.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData};

use crate::builder::{GraphData, GraphNode};
use crate::config::ForceLayoutConfig;
use crate::extract::GraphEdge;

use super::layout::{self, LayoutName};
use super::scale::{ScaleConfig, ScaledValues};
use super::style::{ImportanceTier, Mark};

/// Per-node data attached to each simulation node.
#[derive(Clone, Debug, Default)]
pub struct NodeInfo {
	pub id: String,
}

/// Pan and zoom transform applied to the entire graph view.
///
/// Screen position = world position * `k` + (`x`, `y`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	/// Zoom factor (1.0 = 100%).
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self { x: 0.0, y: 0.0, k: 1.0 }
	}
}

/// Tracks an in-progress node drag operation.
#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node: Option<String>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f64,
	pub node_start_y: f64,
}

/// Tracks an in-progress canvas pan operation.
#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// One emphasis layer: marks per node id and per edge position.
#[derive(Clone, Debug, Default)]
pub struct MarkLayer {
	nodes: HashMap<String, Mark>,
	edges: HashMap<usize, Mark>,
}

impl MarkLayer {
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}

	pub fn clear(&mut self) {
		self.nodes.clear();
		self.edges.clear();
	}

	pub fn node(&self, id: &str) -> Option<Mark> {
		self.nodes.get(id).copied()
	}

	pub fn edge(&self, index: usize) -> Option<Mark> {
		self.edges.get(&index).copied()
	}

	pub fn highlighted_nodes(&self) -> impl Iterator<Item = &str> {
		self.nodes
			.iter()
			.filter(|(_, m)| **m == Mark::Highlighted)
			.map(|(id, _)| id.as_str())
	}
}

/// Search and hover emphasis, kept apart so hovering never erases a search.
/// Hover takes precedence while active.
#[derive(Clone, Debug, Default)]
pub struct Emphasis {
	pub search: MarkLayer,
	pub hover: MarkLayer,
	/// Node the hover layer is centered on.
	pub hovered: Option<String>,
}

impl Emphasis {
	fn active(&self) -> &MarkLayer {
		if self.hover.is_empty() {
			&self.search
		} else {
			&self.hover
		}
	}

	pub fn node(&self, id: &str) -> Option<Mark> {
		self.active().node(id)
	}

	pub fn edge(&self, index: usize) -> Option<Mark> {
		self.active().edge(index)
	}

	pub fn clear_hover(&mut self) {
		self.hover.clear();
		self.hovered = None;
	}
}

/// A node element: graph data plus its simulation handle.
#[derive(Clone, Debug)]
pub struct NodeElement {
	pub node: GraphNode,
	pub idx: DefaultNodeIdx,
	/// Resolved thumbnail URL, when one is displayable.
	pub image_url: Option<String>,
}

/// An edge element; both endpoints are present nodes.
#[derive(Clone, Debug)]
pub struct EdgeElement {
	pub edge: GraphEdge,
	pub source: DefaultNodeIdx,
	pub target: DefaultNodeIdx,
}

/// Core graph state combining the simulation with interaction tracking.
///
/// Rebuilt from scratch on every refresh; the engine carries positions and
/// pins across rebuilds.
pub struct ForceGraphState {
	pub graph: ForceGraph<NodeInfo, ()>,
	pub nodes: Vec<NodeElement>,
	pub edges: Vec<EdgeElement>,
	index: HashMap<String, usize>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub emphasis: Emphasis,
	pub width: f64,
	pub height: f64,
}

impl ForceGraphState {
	/// Build elements for `data`, seeding positions from `seed` where known and
	/// on a circle otherwise.
	pub fn new(
		data: GraphData,
		image_url: impl Fn(&GraphNode) -> Option<String>,
		seed: &HashMap<String, (f64, f64)>,
		force: &ForceLayoutConfig,
		width: f64,
		height: f64,
	) -> Self {
		let mut graph = ForceGraph::new(layout::force_parameters(force));
		let GraphData { nodes, edges } = data;
		let count = nodes.len().max(1) as f64;
		let ring = (count * force.ideal_edge_length as f64 / (2.0 * PI)).max(100.0);

		let mut elements = Vec::with_capacity(nodes.len());
		let mut index = HashMap::with_capacity(nodes.len());
		for (i, node) in nodes.into_iter().enumerate() {
			let (x, y) = seed.get(&node.id).copied().unwrap_or_else(|| {
				let angle = (i as f64) * 2.0 * PI / count;
				(ring * angle.cos(), ring * angle.sin())
			});
			let idx = graph.add_node(NodeData {
				x: x as f32,
				y: y as f32,
				mass: 10.0,
				is_anchor: false,
				user_data: NodeInfo {
					id: node.id.clone(),
				},
			});
			index.insert(node.id.clone(), elements.len());
			elements.push(NodeElement {
				image_url: image_url(&node),
				node,
				idx,
			});
		}

		let mut edge_elements = Vec::with_capacity(edges.len());
		for edge in edges {
			let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
				continue;
			};
			let (source, target) = (elements[s].idx, elements[t].idx);
			graph.add_edge(source, target, EdgeData::default());
			edge_elements.push(EdgeElement {
				edge,
				source,
				target,
			});
		}

		Self {
			graph,
			nodes: elements,
			edges: edge_elements,
			index,
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			emphasis: Emphasis::default(),
			width,
			height,
		}
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	pub fn element(&self, id: &str) -> Option<&NodeElement> {
		self.index.get(id).map(|&i| &self.nodes[i])
	}

	pub fn contains(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	pub fn position(&self, id: &str) -> Option<(f64, f64)> {
		let idx = self.element(id)?.idx;
		let mut found = None;
		self.graph.visit_nodes(|node| {
			if node.index() == idx {
				found = Some((node.x() as f64, node.y() as f64));
			}
		});
		found
	}

	pub fn positions(&self) -> HashMap<String, (f64, f64)> {
		let mut positions = HashMap::with_capacity(self.nodes.len());
		self.graph.visit_nodes(|node| {
			positions.insert(
				node.data.user_data.id.clone(),
				(node.x() as f64, node.y() as f64),
			);
		});
		positions
	}

	pub fn set_position(&mut self, id: &str, x: f64, y: f64) {
		let Some(idx) = self.element(id).map(|e| e.idx) else {
			return;
		};
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.x = x as f32;
				node.data.y = y as f32;
			}
		});
	}

	/// Lock or release a node against the simulation.
	pub fn set_anchor(&mut self, id: &str, anchored: bool) {
		let Some(idx) = self.element(id).map(|e| e.idx) else {
			return;
		};
		self.graph.visit_nodes_mut(|node| {
			if node.index() == idx {
				node.data.is_anchor = anchored;
			}
		});
	}

	/// Sorted identities of a node's incident edges. Two builds with equal
	/// signatures for a node left that node structurally unchanged.
	pub fn signature(&self, id: &str) -> Vec<String> {
		let mut signature: Vec<String> = self
			.edges
			.iter()
			.filter(|e| e.edge.touches(id))
			.map(|e| e.edge.element_id())
			.collect();
		signature.sort();
		signature
	}

	/// Ids directly connected to `id`.
	pub fn neighbors(&self, id: &str) -> HashSet<&str> {
		self.edges
			.iter()
			.filter_map(|e| {
				if e.edge.source == id {
					Some(e.edge.target.as_str())
				} else if e.edge.target == id {
					Some(e.edge.source.as_str())
				} else {
					None
				}
			})
			.collect()
	}

	/// Run `layout`, leaving nodes in `locked` where they are.
	pub fn run_layout(
		&mut self,
		layout: LayoutName,
		force: &ForceLayoutConfig,
		locked: &HashSet<String>,
	) {
		match layout {
			LayoutName::Force => self.run_force(force, locked),
			LayoutName::Circle | LayoutName::Grid | LayoutName::Concentric => {
				let free: Vec<usize> = (0..self.nodes.len())
					.filter(|&i| !locked.contains(&self.nodes[i].node.id))
					.collect();
				let placed = match layout {
					LayoutName::Circle => layout::circle(free.len()),
					LayoutName::Grid => layout::grid(free.len()),
					_ => {
						let degrees: Vec<usize> =
							free.iter().map(|&i| self.nodes[i].node.degree).collect();
						layout::concentric(&degrees)
					}
				};
				let targets: HashMap<DefaultNodeIdx, (f64, f64)> = free
					.iter()
					.zip(placed)
					.map(|(&i, p)| (self.nodes[i].idx, p))
					.collect();
				self.graph.visit_nodes_mut(|node| {
					if let Some(&(x, y)) = targets.get(&node.index()) {
						node.data.x = x as f32;
						node.data.y = y as f32;
					}
				});
			}
		}
	}

	fn run_force(&mut self, force: &ForceLayoutConfig, locked: &HashSet<String>) {
		self.graph.visit_nodes_mut(|node| {
			node.data.is_anchor = locked.contains(&node.data.user_data.id);
		});
		let gravity = (force.gravity * force.step).clamp(0.0, 1.0);
		for _ in 0..force.iterations {
			self.graph.update(force.step);
			if gravity > 0.0 {
				self.graph.visit_nodes_mut(|node| {
					if !node.data.is_anchor {
						node.data.x -= node.data.x * gravity;
						node.data.y -= node.data.y * gravity;
					}
				});
			}
		}
	}

	/// World-space bounding box of all nodes: (min_x, min_y, max_x, max_y).
	pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
		let mut bounds: Option<(f64, f64, f64, f64)> = None;
		self.graph.visit_nodes(|node| {
			let (x, y) = (node.x() as f64, node.y() as f64);
			bounds = Some(match bounds {
				None => (x, y, x, y),
				Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
			});
		});
		bounds
	}

	/// Transform that fits all content inside the view with `padding` pixels on
	/// every side. `node_margin` is world-space room for node radii.
	pub fn fit_transform(
		&self,
		padding: f64,
		node_margin: f64,
		min_zoom: f64,
		max_zoom: f64,
	) -> ViewTransform {
		let Some((x0, y0, x1, y1)) = self.bounds() else {
			return ViewTransform {
				x: self.width / 2.0,
				y: self.height / 2.0,
				k: 1.0,
			};
		};
		let (bw, bh) = (x1 - x0 + 2.0 * node_margin, y1 - y0 + 2.0 * node_margin);
		let (aw, ah) = (
			(self.width - 2.0 * padding).max(1.0),
			(self.height - 2.0 * padding).max(1.0),
		);
		let k = (aw / bw).min(ah / bh).clamp(min_zoom, max_zoom);
		let (cx, cy) = ((x0 + x1) / 2.0, (y0 + y1) / 2.0);
		ViewTransform {
			x: self.width / 2.0 - cx * k,
			y: self.height / 2.0 - cy * k,
			k,
		}
	}

	/// Zoom by `factor` around the screen point (`sx`, `sy`).
	pub fn zoom_at(&mut self, factor: f64, sx: f64, sy: f64, min_zoom: f64, max_zoom: f64) {
		let new_k = (self.transform.k * factor).clamp(min_zoom, max_zoom);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn graph_to_screen(&self, gx: f64, gy: f64) -> (f64, f64) {
		(
			gx * self.transform.k + self.transform.x,
			gy * self.transform.k + self.transform.y,
		)
	}

	/// Topmost node under a screen position.
	pub fn node_at_position(&self, sx: f64, sy: f64, config: &ScaleConfig) -> Option<String> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let scale = ScaledValues::new(config, self.transform.k);
		let sizes: HashMap<DefaultNodeIdx, f64> = self
			.nodes
			.iter()
			.map(|e| (e.idx, ImportanceTier::from_degree(e.node.degree).style().size))
			.collect();
		let mut found = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			let size = sizes.get(&node.index()).copied().unwrap_or(1.0);
			let hit_radius = scale.radius(size) + scale.hit_slop;
			if (dx * dx + dy * dy).sqrt() < hit_radius {
				found = Some(node.data.user_data.id.clone());
			}
		});
		found
	}

	/// Classify every node and edge for a search term. Matching is a
	/// case-insensitive substring test on the label; an edge is highlighted
	/// only when both endpoints are.
	pub fn mark_search(&mut self, term: &str) {
		let needle = term.to_lowercase();
		let layer = &mut self.emphasis.search;
		layer.clear();
		for element in &self.nodes {
			let mark = if element.node.label.to_lowercase().contains(&needle) {
				Mark::Highlighted
			} else {
				Mark::Dimmed
			};
			layer.nodes.insert(element.node.id.clone(), mark);
		}
		for (i, element) in self.edges.iter().enumerate() {
			let lit = layer.nodes.get(&element.edge.source) == Some(&Mark::Highlighted)
				&& layer.nodes.get(&element.edge.target) == Some(&Mark::Highlighted);
			layer
				.edges
				.insert(i, if lit { Mark::Highlighted } else { Mark::Dimmed });
		}
	}

	/// Hover emphasis around `id`: the node highlighted, neighbors unmarked,
	/// everything else dimmed; incident edges highlighted, the rest dimmed.
	pub fn mark_hover(&mut self, id: &str) {
		let neighbors: HashSet<String> =
			self.neighbors(id).into_iter().map(str::to_string).collect();
		let layer = &mut self.emphasis.hover;
		layer.clear();
		for element in &self.nodes {
			let node_id = &element.node.id;
			if node_id == id {
				layer.nodes.insert(node_id.clone(), Mark::Highlighted);
			} else if !neighbors.contains(node_id) {
				layer.nodes.insert(node_id.clone(), Mark::Dimmed);
			}
		}
		for (i, element) in self.edges.iter().enumerate() {
			let mark = if element.edge.touches(id) {
				Mark::Highlighted
			} else {
				Mark::Dimmed
			};
			layer.edges.insert(i, mark);
		}
		self.emphasis.hovered = Some(id.to_string());
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}
