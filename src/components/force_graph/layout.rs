//! Layout algorithms.
//!
//! `force` runs the physics simulation to a fixed step budget (see
//! [`ForceGraphState::run_layout`](super::state::ForceGraphState::run_layout)).
//! The others are deterministic placements computed here in world space,
//! centered on the origin.

use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;

use force_graph::SimulationParameters;
use serde::Deserialize;

use crate::config::ForceLayoutConfig;

use super::style::ImportanceTier;

/// Selectable layout algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutName {
	#[default]
	Force,
	Circle,
	Grid,
	/// Rings by importance tier, hubs in the middle.
	Concentric,
}

impl LayoutName {
	pub const ALL: [LayoutName; 4] = [
		LayoutName::Force,
		LayoutName::Circle,
		LayoutName::Grid,
		LayoutName::Concentric,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			LayoutName::Force => "force",
			LayoutName::Circle => "circle",
			LayoutName::Grid => "grid",
			LayoutName::Concentric => "concentric",
		}
	}

	pub fn title(self) -> &'static str {
		match self {
			LayoutName::Force => "Force-directed",
			LayoutName::Circle => "Circle",
			LayoutName::Grid => "Grid",
			LayoutName::Concentric => "Concentric",
		}
	}
}

impl fmt::Display for LayoutName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LayoutName {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"force" | "cose" | "fcose" => Ok(LayoutName::Force),
			"circle" => Ok(LayoutName::Circle),
			"grid" => Ok(LayoutName::Grid),
			"concentric" => Ok(LayoutName::Concentric),
			other => Err(format!("unknown layout `{other}`")),
		}
	}
}

/// Edge length the configured spring stiffness is tuned for.
const REFERENCE_EDGE_LENGTH: f32 = 120.0;

/// Simulation parameters for the force layout. Springs soften in proportion
/// to how far the ideal edge length exceeds the reference, so longer ideal
/// edges settle further apart.
pub fn force_parameters(config: &ForceLayoutConfig) -> SimulationParameters {
	SimulationParameters {
		force_charge: config.repulsion,
		force_spring: config.spring * (REFERENCE_EDGE_LENGTH / config.ideal_edge_length),
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	}
}

const CIRCLE_SPACING: f64 = 80.0;
const GRID_SPACING: f64 = 120.0;
const RING_SPACING: f64 = 110.0;

/// Evenly spaced on one circle, in input order.
pub fn circle(count: usize) -> Vec<(f64, f64)> {
	if count == 0 {
		return Vec::new();
	}
	if count == 1 {
		return vec![(0.0, 0.0)];
	}
	let radius = (count as f64 * CIRCLE_SPACING / TAU).max(100.0);
	(0..count)
		.map(|i| {
			let angle = i as f64 * TAU / count as f64;
			(radius * angle.cos(), radius * angle.sin())
		})
		.collect()
}

/// Row-major square-ish grid, in input order.
pub fn grid(count: usize) -> Vec<(f64, f64)> {
	if count == 0 {
		return Vec::new();
	}
	let cols = (count as f64).sqrt().ceil() as usize;
	let rows = count.div_ceil(cols);
	let (x0, y0) = (
		-((cols - 1) as f64) * GRID_SPACING / 2.0,
		-((rows - 1) as f64) * GRID_SPACING / 2.0,
	);
	(0..count)
		.map(|i| {
			let (col, row) = (i % cols, i / cols);
			(x0 + col as f64 * GRID_SPACING, y0 + row as f64 * GRID_SPACING)
		})
		.collect()
}

/// Concentric rings by importance tier: the highest populated tier sits in
/// the innermost ring. Output order matches `degrees`.
pub fn concentric(degrees: &[usize]) -> Vec<(f64, f64)> {
	let mut positions = vec![(0.0, 0.0); degrees.len()];
	let mut rings: Vec<Vec<usize>> = ImportanceTier::ALL
		.iter()
		.rev()
		.map(|tier| {
			let mut members: Vec<usize> = degrees
				.iter()
				.enumerate()
				.filter(|(_, d)| ImportanceTier::from_degree(**d) == *tier)
				.map(|(i, _)| i)
				.collect();
			members.sort_by(|a, b| degrees[*b].cmp(&degrees[*a]));
			members
		})
		.collect();
	rings.retain(|members| !members.is_empty());

	let mut radius = 0.0;
	for (ring_index, members) in rings.iter().enumerate() {
		if ring_index > 0 || members.len() > 1 {
			// Ring must be wide enough to space its members.
			let needed = members.len() as f64 * CIRCLE_SPACING / TAU;
			radius = (radius + RING_SPACING).max(needed);
		}
		for (slot, &node) in members.iter().enumerate() {
			let angle = slot as f64 * TAU / members.len() as f64;
			positions[node] = (radius * angle.cos(), radius * angle.sin());
		}
	}
	positions
}
