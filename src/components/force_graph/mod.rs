//! Interactive relationship graph engine.
//!
//! Renders a story's entity graph on an HTML canvas with:
//! - Force, circle, grid and concentric layouts over a physics simulation
//! - Pan, zoom, node dragging and pinning
//! - Search and hover emphasis with debounced detail publishing
//! - Viewport persistence and image export
//!
//! [`GraphEngine`] holds all of the behavior and draws through the
//! [`Surface`] trait, so it runs headless in tests. [`GraphCanvas`] mounts one
//! engine on a canvas inside a leptos view.
//!
//! # Example
//!
//! ```ignore
//! use story_graph::{EngineHandle, GraphCanvas, GraphSources};
//!
//! let handle = EngineHandle::default();
//! view! {
//!     <GraphCanvas handle=handle.clone() sources=sources on_event=move |ev| log::debug!("{ev:?}") />
//! }
//! ```

mod component;
mod engine;
pub mod layout;
mod render;
pub mod scale;
pub mod scheduler;
pub mod state;
pub mod style;
pub mod surface;
pub mod theme;

pub use component::{EngineHandle, GraphCanvas, GraphSources};
pub use engine::{EMPTY_MESSAGE, GraphEngine, GraphEvent, Lifecycle, NodeDetails, RefreshTicket};
pub use layout::LayoutName;
pub use style::{EdgeLabelMode, ImportanceTier};
pub use surface::{ExportFormat, Scene, Surface};
pub use theme::{CssThemeProvider, Theme, ThemeProvider, ThemeTokens};
