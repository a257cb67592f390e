//! Status bar, legend and notice state, folded from engine events.

use std::collections::{BTreeSet, HashMap};

use leptos::prelude::*;

use crate::components::force_graph::{
	GraphEngine, GraphEvent, ImportanceTier, NodeDetails, Theme,
};
use crate::entities::EntityKind;

/// Aggregates read from the engine right after a build was committed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphSummary {
	pub kind_counts: HashMap<EntityKind, usize>,
	pub most_connected: Vec<(String, usize)>,
	pub groups: Vec<String>,
	pub zoom: f64,
}

impl GraphSummary {
	/// Number of entries the status bar lists as most connected.
	pub const TOP: usize = 3;

	pub fn of(engine: &GraphEngine) -> Self {
		Self {
			kind_counts: engine.kind_counts(),
			most_connected: engine.most_connected(Self::TOP),
			groups: engine.groups(),
			zoom: engine.viewport().zoom,
		}
	}
}

/// Everything a shell displays around the canvas.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShellStatus {
	pub nodes: usize,
	pub edges: usize,
	/// The last build had nothing to show.
	pub empty: bool,
	pub kind_counts: HashMap<EntityKind, usize>,
	pub most_connected: Vec<(String, usize)>,
	/// Every group seen since the shell opened. Never shrinks, so filtering
	/// by a group does not hide the other choices.
	pub known_groups: BTreeSet<String>,
	pub zoom: Option<f64>,
	pub details: Option<NodeDetails>,
	pub notice: Option<String>,
	/// Initialization failure; the canvas is unusable once set.
	pub error: Option<String>,
}

impl ShellStatus {
	pub fn apply(&mut self, event: GraphEvent, summary: Option<GraphSummary>) {
		match event {
			GraphEvent::Rebuilt { nodes, edges } => {
				self.nodes = nodes;
				self.edges = edges;
				self.empty = false;
				self.error = None;
				if let Some(summary) = summary {
					self.absorb(summary);
				}
			}
			GraphEvent::Empty => {
				self.nodes = 0;
				self.edges = 0;
				self.empty = true;
				self.kind_counts.clear();
				self.most_connected.clear();
				self.details = None;
			}
			GraphEvent::HoverDetails(details) => self.details = details,
			GraphEvent::PinToggled { id, pinned } => {
				if let Some(details) = self.details.as_mut().filter(|d| d.id == id) {
					details.pinned = pinned;
				}
			}
			GraphEvent::ViewportSaved(viewport) => self.zoom = Some(viewport.zoom),
			GraphEvent::Notice(message) => self.notice = Some(message),
			GraphEvent::NoticeCleared => self.notice = None,
		}
	}

	fn absorb(&mut self, summary: GraphSummary) {
		self.kind_counts = summary.kind_counts;
		self.most_connected = summary.most_connected;
		self.known_groups.extend(summary.groups);
		self.zoom = Some(summary.zoom);
	}

	pub fn fail(&mut self, message: String) {
		self.error = Some(message);
	}

	pub fn count(&self, kind: EntityKind) -> usize {
		self.kind_counts.get(&kind).copied().unwrap_or(0)
	}

	/// One-line counts for the status bar.
	pub fn counts_line(&self) -> String {
		let plural = |n: usize, one: &str, many: &str| {
			format!("{n} {}", if n == 1 { one } else { many })
		};
		format!(
			"{} · {}",
			plural(self.nodes, "entity", "entities"),
			plural(self.edges, "relationship", "relationships")
		)
	}
}

/// Bottom strip with live counts, zoom and the best-connected entities.
#[component]
pub fn StatusBar(status: RwSignal<ShellStatus>, filters_active: Signal<bool>) -> impl IntoView {
	view! {
		<div class="story-graph-status">
			<span class="story-graph-counts">{move || status.with(ShellStatus::counts_line)}</span>
			{move || filters_active.get().then(|| view! {
				<span class="story-graph-filtered">"filtered"</span>
			})}
			{move || status.with(|s| s.zoom).map(|zoom| view! {
				<span class="story-graph-zoom">{format!("{:.0}%", zoom * 100.0)}</span>
			})}
			{move || {
				let top = status.with(|s| s.most_connected.clone());
				(!top.is_empty()).then(|| {
					let names = top
						.into_iter()
						.map(|(label, degree)| format!("{label} ({degree})"))
						.collect::<Vec<_>>()
						.join(", ");
					view! { <span class="story-graph-top">"Most connected: " {names}</span> }
				})
			}}
		</div>
	}
}

/// Color key for entity kinds and the size key for importance tiers.
#[component]
pub fn Legend(status: RwSignal<ShellStatus>, theme: Theme) -> impl IntoView {
	let kinds = EntityKind::ALL
		.into_iter()
		.map(|kind| {
			let color = theme.tokens.kind_color(kind).to_css();
			view! {
				<li class="story-graph-legend-kind">
					<span
						class="story-graph-swatch"
						style=format!("display: inline-block; width: 10px; height: 10px; border-radius: 50%; background: {color};")
					/>
					{kind.plural_label()}
					<span class="story-graph-legend-count">{move || status.with(|s| s.count(kind))}</span>
				</li>
			}
		})
		.collect_view();

	let tiers = ImportanceTier::ALL
		.into_iter()
		.map(|tier| {
			let diameter = 8.0 * tier.style().size;
			view! {
				<li class="story-graph-legend-tier">
					<span
						class="story-graph-swatch"
						style=format!("display: inline-block; width: {diameter:.0}px; height: {diameter:.0}px; border-radius: 50%; border: 1px solid currentColor;")
					/>
					{tier.label()}
				</li>
			}
		})
		.collect_view();

	view! {
		<div class="story-graph-legend" style="position: absolute; left: 12px; bottom: 12px; pointer-events: none;">
			<ul class="story-graph-legend-kinds">{kinds}</ul>
			<ul class="story-graph-legend-tiers">{tiers}</ul>
		</div>
	}
}

/// Transient notice, plus the initialization error when there is one.
#[component]
pub fn NoticeBanner(status: RwSignal<ShellStatus>) -> impl IntoView {
	view! {
		{move || status.with(|s| s.error.clone()).map(|error| view! {
			<div class="story-graph-error" role="alert">
				"The graph could not be opened: " {error}
			</div>
		})}
		{move || status.with(|s| s.notice.clone()).map(|notice| view! {
			<div class="story-graph-notice" role="status">{notice}</div>
		})}
	}
}
