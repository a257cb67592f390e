//! Error types for graph construction, collaborator access and the render engine.

use thiserror::Error;

use crate::entities::EntityKind;

/// Errors raised by the render/interaction engine.
#[derive(Debug, Error)]
pub enum GraphError {
	/// The drawing surface has no container in the document.
	#[error("graph container is not attached to the document")]
	ContainerDetached,

	/// The drawing surface exists but has no measurable area.
	#[error("graph container has zero size ({width}x{height})")]
	ContainerEmpty { width: f64, height: f64 },

	/// `initialize` was called on an engine that already left the uninitialized state.
	#[error("graph engine is already initialized")]
	AlreadyInitialized,

	/// The engine was destroyed and can no longer be used.
	#[error("graph engine has been destroyed")]
	Destroyed,

	/// Rasterizing or offering the image failed.
	#[error("image export failed: {0}")]
	Export(String),
}

/// Errors reported by the persistence and settings collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
	/// A whole collection could not be listed.
	#[error("failed to list {kind} entities: {reason}")]
	Collection { kind: EntityKind, reason: String },

	/// A single entity's backing record could not be read.
	#[error("failed to read {kind} `{key}`: {reason}")]
	Entity {
		kind: EntityKind,
		key: String,
		reason: String,
	},

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	/// The settings store rejected a read or write.
	#[error("settings store error: {0}")]
	Settings(String),
}

/// Errors rejecting a user-supplied [`GraphConfig`](crate::GraphConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error(transparent)]
	Json(#[from] serde_json::Error),

	/// A field parsed but holds a value the engine cannot work with.
	#[error("invalid config `{field}`: {reason}")]
	Invalid { field: &'static str, reason: String },
}

/// Result alias defaulting to [`GraphError`].
pub type Result<T, E = GraphError> = std::result::Result<T, E>;
