//! Tunable engine parameters.
//!
//! Durations are in seconds, matching the `dt` the animation loop feeds into
//! [`GraphEngine::tick`](crate::GraphEngine::tick).

use serde::Deserialize;

use crate::components::force_graph::layout::LayoutName;
use crate::error::ConfigError;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
	ConfigError::Invalid {
		field,
		reason: reason.into(),
	}
}

fn finite(field: &'static str, value: f64) -> Result<f64, ConfigError> {
	if value.is_finite() {
		Ok(value)
	} else {
		Err(invalid(field, format!("{value} is not a finite number")))
	}
}

fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
	if finite(field, value)? > 0.0 {
		Ok(value)
	} else {
		Err(invalid(field, format!("{value} must be greater than zero")))
	}
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
	if finite(field, value)? >= 0.0 {
		Ok(value)
	} else {
		Err(invalid(field, format!("{value} must not be negative")))
	}
}

/// Force-directed layout parameters, tuned for story graphs of tens to a few
/// hundred entities.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ForceLayoutConfig {
	/// Node-node repulsion strength.
	pub repulsion: f32,
	/// Spring stiffness along edges.
	pub spring: f32,
	/// Edge length the springs aim for, in world units. Also spaces the
	/// seed ring new nodes start on.
	pub ideal_edge_length: f32,
	/// Pull towards the layout center per second of simulated time (0 disables).
	pub gravity: f32,
	/// Simulation steps run before the layout counts as settled.
	pub iterations: usize,
	/// Step length fed to the simulation.
	pub step: f32,
}

impl ForceLayoutConfig {
	fn validate(&self) -> Result<(), ConfigError> {
		non_negative("force.repulsion", self.repulsion.into())?;
		positive("force.spring", self.spring.into())?;
		positive("force.ideal_edge_length", self.ideal_edge_length.into())?;
		non_negative("force.gravity", self.gravity.into())?;
		positive("force.step", self.step.into())?;
		Ok(())
	}
}

impl Default for ForceLayoutConfig {
	fn default() -> Self {
		Self {
			repulsion: 400.0,
			spring: 0.08,
			ideal_edge_length: 120.0,
			gravity: 0.1,
			iterations: 300,
			step: 0.016,
		}
	}
}

/// Complete engine configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
	pub default_layout: LayoutName,
	/// Multiplicative factor for one zoom-in/zoom-out step.
	pub zoom_step: f64,
	pub min_zoom: f64,
	pub max_zoom: f64,
	/// Screen padding kept around content on fit.
	pub fit_padding: f64,
	/// A first fit below this zoom gets corrected upwards.
	pub small_fit_zoom: f64,
	pub small_fit_correction: f64,
	/// Quiet time before a viewport change is written to settings.
	pub viewport_save_delay: f64,
	/// Delay before hover details are published.
	pub hover_details_delay: f64,
	/// Grace period after pointer-leave before hover emphasis clears.
	pub hover_clear_delay: f64,
	pub search_debounce: f64,
	/// How long transient notices stay up.
	pub notice_duration: f64,
	/// Resolution multiplier for image export.
	pub export_scale: f64,
	pub force: ForceLayoutConfig,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			default_layout: LayoutName::Force,
			zoom_step: 1.2,
			min_zoom: 0.1,
			max_zoom: 10.0,
			fit_padding: 50.0,
			small_fit_zoom: 0.7,
			small_fit_correction: 1.2,
			viewport_save_delay: 0.3,
			hover_details_delay: 0.05,
			hover_clear_delay: 0.35,
			search_debounce: 0.25,
			notice_duration: 4.0,
			export_scale: 2.0,
			force: ForceLayoutConfig::default(),
		}
	}
}

impl GraphConfig {
	/// Parse a partial JSON config; missing fields keep their defaults.
	/// Values the engine cannot work with are rejected, see [`validate`](Self::validate).
	pub fn from_json(json: &str) -> Result<Self, ConfigError> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Check every numeric parameter: zoom bounds positive with
	/// `min_zoom <= max_zoom`, steps and corrections above 1, durations and
	/// padding non-negative, nothing NaN or infinite.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let min = positive("min_zoom", self.min_zoom)?;
		let max = positive("max_zoom", self.max_zoom)?;
		if min > max {
			return Err(invalid("min_zoom", format!("{min} exceeds max_zoom {max}")));
		}
		if finite("zoom_step", self.zoom_step)? <= 1.0 {
			return Err(invalid("zoom_step", "must be greater than 1"));
		}
		if finite("small_fit_correction", self.small_fit_correction)? < 1.0 {
			return Err(invalid("small_fit_correction", "must be at least 1"));
		}
		positive("export_scale", self.export_scale)?;
		for (field, value) in [
			("fit_padding", self.fit_padding),
			("small_fit_zoom", self.small_fit_zoom),
			("viewport_save_delay", self.viewport_save_delay),
			("hover_details_delay", self.hover_details_delay),
			("hover_clear_delay", self.hover_clear_delay),
			("search_debounce", self.search_debounce),
			("notice_duration", self.notice_duration),
		] {
			non_negative(field, value)?;
		}
		self.force.validate()
	}

	pub fn clamp_zoom(&self, zoom: f64) -> f64 {
		zoom.clamp(self.min_zoom, self.max_zoom)
	}
}
