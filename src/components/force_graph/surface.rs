//! Rendering backend seam.
//!
//! The engine resolves everything it wants drawn into a [`Scene`] and hands it
//! to a [`Surface`]. Extraction, filtering, degree and style logic never touch
//! a drawing API, so another backend only has to implement this trait.

use chrono::{DateTime, Utc};

use crate::error::Result;

use super::scale::ScaledValues;
use super::state::ViewTransform;
use super::style::{EdgeStyle, NodeStyle};
use super::theme::{Color, ThemeTokens};

/// A node ready to draw, in world coordinates.
#[derive(Clone, Debug)]
pub struct SceneNode {
	pub id: String,
	pub label: String,
	pub x: f64,
	pub y: f64,
	/// World-space radius.
	pub radius: f64,
	pub style: NodeStyle,
	pub image_url: Option<String>,
}

/// An edge ready to draw, in world coordinates.
#[derive(Clone, Debug)]
pub struct SceneEdge {
	pub from: (f64, f64),
	pub to: (f64, f64),
	/// Radius of the target node, so the arrow head stops at its border.
	pub target_radius: f64,
	pub style: EdgeStyle,
	/// Present only when the label is visible.
	pub label: Option<String>,
}

/// One frame's worth of resolved drawing data.
#[derive(Clone, Debug)]
pub struct Scene {
	pub width: f64,
	pub height: f64,
	pub transform: ViewTransform,
	pub tokens: ThemeTokens,
	pub scale: ScaledValues,
	pub edges: Vec<SceneEdge>,
	/// Back to front.
	pub nodes: Vec<SceneNode>,
}

/// Raster format of an exported image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
	#[default]
	Png,
	Jpeg,
}

impl ExportFormat {
	pub fn mime_type(self) -> &'static str {
		match self {
			ExportFormat::Png => "image/png",
			ExportFormat::Jpeg => "image/jpeg",
		}
	}

	pub fn extension(self) -> &'static str {
		match self {
			ExportFormat::Png => "png",
			ExportFormat::Jpeg => "jpg",
		}
	}
}

/// Parameters of one export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRequest {
	pub format: ExportFormat,
	/// Resolution multiplier over the on-screen size.
	pub scale: f64,
	pub background: Color,
	pub filename: String,
}

/// Timestamped download name, e.g. `story-graph-20240131-154502.png`.
pub fn export_filename(format: ExportFormat, at: DateTime<Utc>) -> String {
	format!(
		"story-graph-{}.{}",
		at.format("%Y%m%d-%H%M%S"),
		format.extension()
	)
}

/// A drawing context owned by one engine.
pub trait Surface {
	/// Measured size in CSS pixels; `None` while the container is detached.
	fn size(&self) -> Option<(f64, f64)>;

	fn draw(&mut self, scene: &Scene);

	/// Draw the explicit "nothing to show" state.
	fn draw_empty(&mut self, tokens: &ThemeTokens, message: &str);

	/// Rasterize `scene` and offer it as a download.
	fn export(&mut self, scene: &Scene, request: &ExportRequest) -> Result<()>;

	/// Drop the context and any chrome attached to the container.
	fn release(&mut self);
}
