//! Visual theming for the relationship graph.
//!
//! Styling code never reads theme variable names; it consumes resolved
//! [`ThemeTokens`] from a [`ThemeProvider`]. [`Theme`] supplies fixed presets,
//! [`CssThemeProvider`] resolves the host application's live CSS variables.

use crate::entities::{EntityKind, RelationshipType};

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: f64,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	pub fn with_alpha(self, a: f64) -> Self {
		Self { a, ..self }
	}

	/// Lighten the color by a factor (0.0 = unchanged, 1.0 = white)
	pub fn lighten(self, factor: f64) -> Self {
		let f = factor.clamp(0.0, 1.0);
		Self {
			r: (self.r as f64 + (255.0 - self.r as f64) * f) as u8,
			g: (self.g as f64 + (255.0 - self.g as f64) * f) as u8,
			b: (self.b as f64 + (255.0 - self.b as f64) * f) as u8,
			a: self.a,
		}
	}

	/// Darken the color by a factor (0.0 = unchanged, 1.0 = black)
	pub fn darken(self, factor: f64) -> Self {
		let f = 1.0 - factor.clamp(0.0, 1.0);
		Self {
			r: (self.r as f64 * f) as u8,
			g: (self.g as f64 * f) as u8,
			b: (self.b as f64 * f) as u8,
			a: self.a,
		}
	}

	/// Linear interpolation between two colors
	pub fn lerp(self, other: Color, t: f64) -> Self {
		let t = t.clamp(0.0, 1.0);
		Self {
			r: (self.r as f64 * (1.0 - t) + other.r as f64 * t) as u8,
			g: (self.g as f64 * (1.0 - t) + other.g as f64 * t) as u8,
			b: (self.b as f64 * (1.0 - t) + other.b as f64 * t) as u8,
			a: self.a * (1.0 - t) + other.a * t,
		}
	}

	/// Relative luminance, 0.0 (black) to 1.0 (white).
	pub fn luminance(self) -> f64 {
		(0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64) / 255.0
	}

	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}

	/// Parses a CSS color string.
	/// Supports hex (`#RGB`, `#RRGGBB`) and `rgb()`/`rgba()` functional notation.
	pub fn parse(color_str: &str) -> Option<Color> {
		let s = color_str.trim();
		if let Some(hex) = s.strip_prefix('#').filter(|h| h.is_ascii()) {
			return match hex.len() {
				6 => Some(Color::rgb(
					u8::from_str_radix(&hex[0..2], 16).ok()?,
					u8::from_str_radix(&hex[2..4], 16).ok()?,
					u8::from_str_radix(&hex[4..6], 16).ok()?,
				)),
				3 => {
					let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
					Some(Color::rgb(digit(0)?, digit(1)?, digit(2)?))
				}
				_ => None,
			};
		}
		if s.starts_with("rgb") {
			let nums: Vec<&str> = s
				.trim_start_matches("rgba(")
				.trim_start_matches("rgb(")
				.trim_end_matches(')')
				.split(',')
				.collect();
			let channel = |i: usize| nums.get(i).and_then(|v| v.trim().parse::<u8>().ok());
			let a = nums
				.get(3)
				.and_then(|v| v.trim().parse::<f64>().ok())
				.unwrap_or(1.0);
			return Some(Color::rgba(channel(0)?, channel(1)?, channel(2)?, a));
		}
		None
	}
}

/// Resolved color and font tokens, ready for styling.
#[derive(Clone, Debug, PartialEq)]
pub struct ThemeTokens {
	pub background: Color,
	pub text: Color,
	pub muted_text: Color,
	pub accent: Color,
	pub border: Color,
	pub edge: Color,
	pub font_family: String,
	pub character: Color,
	pub location: Color,
	pub event: Color,
	pub item: Color,
}

impl ThemeTokens {
	pub fn kind_color(&self, kind: EntityKind) -> Color {
		match kind {
			EntityKind::Character => self.character,
			EntityKind::Location => self.location,
			EntityKind::Event => self.event,
			EntityKind::Item => self.item,
		}
	}

	/// Edge color for a relationship type. Neutral and custom edges use the
	/// theme's edge color so they recede behind categorized relationships.
	pub fn relationship_color(&self, relationship: RelationshipType) -> Color {
		match relationship {
			RelationshipType::Ally => Color::rgb(76, 175, 80),
			RelationshipType::Enemy => Color::rgb(229, 57, 53),
			RelationshipType::Family => Color::rgb(255, 179, 0),
			RelationshipType::Rival => Color::rgb(251, 140, 0),
			RelationshipType::Romantic => Color::rgb(236, 64, 122),
			RelationshipType::Mentor => Color::rgb(126, 87, 194),
			RelationshipType::Acquaintance => Color::rgb(38, 166, 154),
			RelationshipType::Neutral => self.edge,
			RelationshipType::Custom => self.edge.lerp(self.accent, 0.5),
		}
	}

	/// Whether the background is dark enough to need light labels.
	pub fn is_dark(&self) -> bool {
		self.background.luminance() < 0.5
	}
}

/// Supplies resolved tokens at render time.
pub trait ThemeProvider {
	fn tokens(&self) -> ThemeTokens;
}

/// Fixed theme presets.
#[derive(Clone, Debug)]
pub struct Theme {
	pub name: &'static str,
	pub tokens: ThemeTokens,
}

impl Theme {
	/// Clean dark theme (default)
	pub fn default_theme() -> Self {
		Self {
			name: "default",
			tokens: ThemeTokens {
				background: Color::rgb(22, 27, 34),
				text: Color::rgb(220, 225, 232),
				muted_text: Color::rgb(140, 150, 165),
				accent: Color::rgb(129, 161, 193),
				border: Color::rgb(48, 54, 61),
				edge: Color::rgba(140, 160, 180, 0.6),
				font_family: "sans-serif".into(),
				character: Color::rgb(94, 129, 172),
				location: Color::rgb(100, 160, 120),
				event: Color::rgb(200, 150, 90),
				item: Color::rgb(170, 120, 170),
			},
		}
	}

	/// Light theme for bright host themes
	pub fn light() -> Self {
		Self {
			name: "light",
			tokens: ThemeTokens {
				background: Color::rgb(250, 250, 250),
				text: Color::rgb(34, 34, 34),
				muted_text: Color::rgb(110, 110, 110),
				accent: Color::rgb(72, 101, 181),
				border: Color::rgb(220, 220, 220),
				edge: Color::rgba(110, 120, 135, 0.6),
				font_family: "sans-serif".into(),
				character: Color::rgb(58, 102, 160),
				location: Color::rgb(56, 132, 82),
				event: Color::rgb(190, 120, 40),
				item: Color::rgb(150, 80, 150),
			},
		}
	}

	/// Elegant dark theme with cooler tones
	pub fn midnight() -> Self {
		Self {
			name: "midnight",
			tokens: ThemeTokens {
				background: Color::rgb(18, 20, 28),
				text: Color::rgb(210, 215, 230),
				muted_text: Color::rgb(120, 130, 150),
				accent: Color::rgb(130, 120, 150),
				border: Color::rgb(40, 44, 58),
				edge: Color::rgba(100, 120, 150, 0.55),
				font_family: "sans-serif".into(),
				character: Color::rgb(115, 135, 155),
				location: Color::rgb(100, 145, 135),
				event: Color::rgb(130, 120, 150),
				item: Color::rgb(120, 130, 160),
			},
		}
	}

	pub fn by_name(name: &str) -> Option<Self> {
		match name {
			"default" => Some(Self::default_theme()),
			"light" => Some(Self::light()),
			"midnight" => Some(Self::midnight()),
			_ => None,
		}
	}
}

impl Default for Theme {
	fn default() -> Self {
		Self::default_theme()
	}
}

impl ThemeProvider for Theme {
	fn tokens(&self) -> ThemeTokens {
		self.tokens.clone()
	}
}

/// Reads the host application's CSS variables from the document body on
/// every call, so theme switches apply on the next render.
#[derive(Clone, Debug, Default)]
pub struct CssThemeProvider {
	/// Used for any variable the host does not define.
	pub fallback: Theme,
}

impl CssThemeProvider {
	fn read_variables(&self) -> Option<impl Fn(&str) -> Option<String>> {
		let window = web_sys::window()?;
		let body = window.document()?.body()?;
		let style = window.get_computed_style(&body).ok()??;
		Some(move |name: &str| {
			style
				.get_property_value(name)
				.ok()
				.map(|v| v.trim().to_string())
				.filter(|v| !v.is_empty())
		})
	}
}

impl ThemeProvider for CssThemeProvider {
	fn tokens(&self) -> ThemeTokens {
		let mut tokens = self.fallback.tokens.clone();
		let Some(var) = self.read_variables() else {
			return tokens;
		};
		let color = |name: &str, fallback: Color| {
			var(name).and_then(|v| Color::parse(&v)).unwrap_or(fallback)
		};
		tokens.background = color("--background-primary", tokens.background);
		tokens.text = color("--text-normal", tokens.text);
		tokens.muted_text = color("--text-muted", tokens.muted_text);
		tokens.accent = color("--text-accent", tokens.accent);
		tokens.border = color("--background-modifier-border", tokens.border);
		tokens.edge = tokens.muted_text.with_alpha(0.6);
		if let Some(font) = var("--font-interface") {
			tokens.font_family = font;
		}
		tokens
	}
}
