//! Zoom-dependent scaling configuration for graph visuals.
//!
//! # Coordinate Spaces
//!
//! - **World-space**: layout coordinates. Values in world-space scale with zoom.
//! - **Screen-space**: canvas pixels. Values in screen-space stay constant
//!   regardless of zoom level.
//!
//! Node radii and hit areas live in world-space but are clamped so a node never
//! shrinks below a usable screen size when zoomed far out. Label fonts are
//! specified in screen pixels and divided by zoom before drawing.

/// Defines how a visual property scales with zoom level.
#[derive(Clone, Debug)]
pub enum ScaleBehavior {
	/// Constant world-space size. Appears larger when zoomed in.
	World,
	/// Constant screen-space size (pixels). Unaffected by zoom.
	Screen,
	/// World-space scaling, clamped to min/max screen-space bounds.
	Clamped { min_screen: f64, max_screen: f64 },
}

impl ScaleBehavior {
	/// Compute the world-space value for a given base value and zoom level.
	pub fn apply(&self, base: f64, k: f64) -> f64 {
		match self {
			ScaleBehavior::World => base,
			ScaleBehavior::Screen => base / k,
			ScaleBehavior::Clamped {
				min_screen,
				max_screen,
			} => base.clamp(min_screen / k, max_screen / k),
		}
	}
}

/// Complete scale configuration for graph elements.
#[derive(Clone, Debug)]
pub struct ScaleConfig {
	/// Base node radius in world units, before the tier size multiplier.
	pub node_radius: f64,
	pub node_behavior: ScaleBehavior,
	/// Extra hit slop around a node, in world units.
	pub hit_slop: f64,
	/// Zoom below which label fonts stop shrinking.
	pub label_min_k: f64,
	/// Edge line width in screen pixels.
	pub edge_width: f64,
	/// Edge label font size in screen pixels.
	pub edge_label_size: f64,
	/// Arrow head length in world units.
	pub arrow_size: f64,
	/// Pin marker ring offset in screen pixels.
	pub pin_ring_offset: f64,
}

impl Default for ScaleConfig {
	fn default() -> Self {
		Self {
			node_radius: 14.0,
			node_behavior: ScaleBehavior::Clamped {
				min_screen: 4.0,
				max_screen: f64::INFINITY,
			},
			hit_slop: 4.0,
			label_min_k: 0.5,
			edge_width: 1.5,
			edge_label_size: 10.0,
			arrow_size: 7.0,
			pin_ring_offset: 3.0,
		}
	}
}

/// Pre-computed scale values for a specific zoom level.
///
/// Create this once per frame. All sizes are in world-space.
#[derive(Clone, Debug)]
pub struct ScaledValues {
	pub k: f64,
	pub node_radius: f64,
	pub hit_slop: f64,
	label_k: f64,
	pub edge_width: f64,
	pub edge_label_font: f64,
	pub arrow_size: f64,
	pub pin_ring_offset: f64,
}

impl ScaledValues {
	pub fn new(config: &ScaleConfig, k: f64) -> Self {
		let label_k = k.max(config.label_min_k);
		Self {
			k,
			node_radius: config.node_behavior.apply(config.node_radius, k),
			hit_slop: config.hit_slop,
			label_k,
			edge_width: config.edge_width / k,
			edge_label_font: config.edge_label_size / label_k,
			arrow_size: config.arrow_size,
			pin_ring_offset: config.pin_ring_offset / k,
		}
	}

	/// World-space font size for a label specified in screen pixels.
	pub fn label_font(&self, screen_px: f64) -> f64 {
		screen_px / self.label_k
	}

	/// Radius of a node with the given tier size multiplier.
	pub fn radius(&self, size: f64) -> f64 {
		self.node_radius * size
	}
}
