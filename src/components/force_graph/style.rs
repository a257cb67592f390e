//! Style resolution: degree tiers, emphasis marks and edge label visibility.
//!
//! Everything here is a pure function of element data plus resolved theme
//! tokens. Toggling a mode or mark never touches graph data.

use crate::entities::EntityKind;
use crate::extract::{EdgeOrigin, GraphEdge};

use super::theme::{Color, ThemeTokens};

/// Discrete importance derived from node degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportanceTier {
	/// No connections.
	Isolated,
	/// 1-2 connections.
	Minor,
	/// 3-5 connections.
	Moderate,
	/// 6-10 connections.
	Major,
	/// 11 or more connections.
	Hub,
}

/// Visual weight of one tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierStyle {
	pub border_width: f64,
	pub opacity: f64,
	pub font_size: f64,
	/// Radius multiplier.
	pub size: f64,
}

impl ImportanceTier {
	pub const ALL: [ImportanceTier; 5] = [
		ImportanceTier::Isolated,
		ImportanceTier::Minor,
		ImportanceTier::Moderate,
		ImportanceTier::Major,
		ImportanceTier::Hub,
	];

	pub fn from_degree(degree: usize) -> Self {
		match degree {
			0 => ImportanceTier::Isolated,
			1..=2 => ImportanceTier::Minor,
			3..=5 => ImportanceTier::Moderate,
			6..=10 => ImportanceTier::Major,
			_ => ImportanceTier::Hub,
		}
	}

	pub fn style(self) -> TierStyle {
		match self {
			ImportanceTier::Isolated => TierStyle {
				border_width: 1.0,
				opacity: 0.55,
				font_size: 10.0,
				size: 0.8,
			},
			ImportanceTier::Minor => TierStyle {
				border_width: 1.5,
				opacity: 0.8,
				font_size: 11.0,
				size: 1.0,
			},
			ImportanceTier::Moderate => TierStyle {
				border_width: 2.5,
				opacity: 0.9,
				font_size: 12.0,
				size: 1.2,
			},
			ImportanceTier::Major => TierStyle {
				border_width: 3.5,
				opacity: 1.0,
				font_size: 14.0,
				size: 1.45,
			},
			ImportanceTier::Hub => TierStyle {
				border_width: 5.0,
				opacity: 1.0,
				font_size: 16.0,
				size: 1.75,
			},
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			ImportanceTier::Isolated => "isolated",
			ImportanceTier::Minor => "minor",
			ImportanceTier::Moderate => "moderate",
			ImportanceTier::Major => "major",
			ImportanceTier::Hub => "hub",
		}
	}
}

/// Emphasis class applied by search or hover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mark {
	Highlighted,
	Dimmed,
}

/// Global edge label policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeLabelMode {
	/// Labels only on highlighted edges.
	#[default]
	HighlightedOnly,
	/// Labels on every edge.
	Always,
}

impl EdgeLabelMode {
	pub fn toggled(self) -> Self {
		match self {
			EdgeLabelMode::HighlightedOnly => EdgeLabelMode::Always,
			EdgeLabelMode::Always => EdgeLabelMode::HighlightedOnly,
		}
	}
}

/// Resolved drawing style of one node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeStyle {
	pub fill: Color,
	pub border: Color,
	pub border_width: f64,
	pub opacity: f64,
	pub font_size: f64,
	pub size: f64,
	pub label_color: Color,
	pub pinned: bool,
	pub tier: ImportanceTier,
}

/// Resolved drawing style of one edge.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeStyle {
	pub color: Color,
	pub width: f64,
	pub opacity: f64,
	pub dashed: bool,
	pub show_label: bool,
}

const DIMMED_OPACITY: f64 = 0.15;

pub fn node_style(
	tokens: &ThemeTokens,
	kind: EntityKind,
	degree: usize,
	mark: Option<Mark>,
	pinned: bool,
) -> NodeStyle {
	let tier = ImportanceTier::from_degree(degree);
	let base = tier.style();
	let fill = tokens.kind_color(kind);
	let mut style = NodeStyle {
		fill,
		border: fill.darken(0.35),
		border_width: base.border_width,
		opacity: base.opacity,
		font_size: base.font_size,
		size: base.size,
		label_color: tokens.text,
		pinned,
		tier,
	};

	if pinned {
		style.border = tokens.accent;
	}
	match mark {
		Some(Mark::Highlighted) => {
			style.border = tokens.accent.lighten(0.2);
			style.border_width += 1.5;
			style.opacity = 1.0;
		}
		Some(Mark::Dimmed) => {
			style.opacity = DIMMED_OPACITY;
			style.label_color = tokens.muted_text;
		}
		None => {}
	}
	style
}

pub fn edge_style(
	tokens: &ThemeTokens,
	edge: &GraphEdge,
	mark: Option<Mark>,
	labels: EdgeLabelMode,
) -> EdgeStyle {
	let highlighted = mark == Some(Mark::Highlighted);
	EdgeStyle {
		color: tokens.relationship_color(edge.relationship),
		width: if highlighted { 2.5 } else { 1.5 },
		opacity: match mark {
			Some(Mark::Highlighted) => 1.0,
			Some(Mark::Dimmed) => DIMMED_OPACITY,
			None => 0.7,
		},
		dashed: edge.origin == EdgeOrigin::Implicit,
		show_label: match labels {
			EdgeLabelMode::Always => true,
			EdgeLabelMode::HighlightedOnly => highlighted,
		},
	}
}

/// Text drawn on an edge: its label, else its relationship type.
pub fn edge_label_text(edge: &GraphEdge) -> &str {
	edge.label
		.as_deref()
		.filter(|l| !l.is_empty())
		.unwrap_or(edge.relationship.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::force_graph::theme::Theme;
	use crate::entities::RelationshipType;

	fn edge(origin: EdgeOrigin) -> GraphEdge {
		GraphEdge {
			source: "A".into(),
			target: "B".into(),
			relationship: RelationshipType::Ally,
			label: None,
			origin,
		}
	}

	#[test]
	fn tiers_follow_degree_bands() {
		let tiers: Vec<_> = [0, 1, 2, 3, 5, 6, 10, 11, 40]
			.into_iter()
			.map(ImportanceTier::from_degree)
			.collect();
		assert_eq!(
			tiers,
			vec![
				ImportanceTier::Isolated,
				ImportanceTier::Minor,
				ImportanceTier::Minor,
				ImportanceTier::Moderate,
				ImportanceTier::Moderate,
				ImportanceTier::Major,
				ImportanceTier::Major,
				ImportanceTier::Hub,
				ImportanceTier::Hub,
			]
		);
	}

	#[test]
	fn higher_tiers_are_visually_heavier() {
		for pair in ImportanceTier::ALL.windows(2) {
			let (lower, higher) = (pair[0].style(), pair[1].style());
			assert!(higher.border_width > lower.border_width);
			assert!(higher.font_size > lower.font_size);
			assert!(higher.opacity >= lower.opacity);
		}
	}

	#[test]
	fn dimmed_nodes_fade_and_highlighted_nodes_stand_out() {
		let tokens = Theme::default().tokens;
		let plain = node_style(&tokens, EntityKind::Character, 3, None, false);
		let dimmed = node_style(&tokens, EntityKind::Character, 3, Some(Mark::Dimmed), false);
		let lit = node_style(&tokens, EntityKind::Character, 3, Some(Mark::Highlighted), false);

		assert!(dimmed.opacity < plain.opacity);
		assert!(lit.border_width > plain.border_width);
		assert_eq!(lit.opacity, 1.0);
	}

	#[test]
	fn edge_labels_follow_mode() {
		let tokens = Theme::default().tokens;
		let e = edge(EdgeOrigin::Explicit);

		let hidden = edge_style(&tokens, &e, None, EdgeLabelMode::HighlightedOnly);
		let lit = edge_style(&tokens, &e, Some(Mark::Highlighted), EdgeLabelMode::HighlightedOnly);
		let always = edge_style(&tokens, &e, Some(Mark::Dimmed), EdgeLabelMode::Always);
		assert!(!hidden.show_label);
		assert!(lit.show_label);
		assert!(always.show_label);

		assert_eq!(EdgeLabelMode::default().toggled().toggled(), EdgeLabelMode::default());
	}

	#[test]
	fn implicit_edges_are_dashed() {
		let tokens = Theme::default().tokens;
		let mode = EdgeLabelMode::default();
		assert!(edge_style(&tokens, &edge(EdgeOrigin::Implicit), None, mode).dashed);
		assert!(!edge_style(&tokens, &edge(EdgeOrigin::Mirrored), None, mode).dashed);
		assert_eq!(edge_label_text(&edge(EdgeOrigin::Explicit)), "ally");
	}
}
