//! story-graph: Interactive relationship graph for story entities.
//!
//! Characters, locations, events and plot items are turned into a graph of
//! typed relationships ([`extract`]), filtered and measured ([`builder`]), and
//! shown by an interactive canvas engine hosted in a modal or panel shell
//! ([`components`]).

use std::rc::Rc;

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, info, warn};
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

pub mod builder;
pub mod components;
pub mod config;
pub mod entities;
pub mod error;
pub mod extract;
pub mod store;

pub use builder::{GraphData, GraphFilters, GraphNode, build_graph_data};
pub use components::force_graph::{
	EngineHandle, ExportFormat, GraphCanvas, GraphEngine, GraphEvent, GraphSources, LayoutName,
	NodeDetails, Surface, Theme,
};
pub use components::shell::{GraphShell, ShellKind};
pub use config::GraphConfig;
pub use entities::{EntityKind, RelationshipType, StoryData};
pub use error::{ConfigError, GraphError, StoreError};
pub use extract::{GraphEdge, extract_edges};
pub use store::{
	BaseUrlResolver, EntityStore, JsonEntityStore, LocalStorageSettings, MemorySettings,
	MemoryStore, ResourceResolver, SettingsStore,
};

/// `localStorage` key the standalone app keeps plugin settings under.
pub const SETTINGS_KEY: &str = "story-graph-settings";

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("story-graph: logging initialized");
}

fn script_element(id: &str) -> Option<HtmlScriptElement> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	document.get_element_by_id(id)?.dyn_into().ok()
}

/// Load the story from a script element with id="story-data".
/// Expected format: JSON with { characters, locations, events, plotItems }.
/// A `data-base-url` attribute sets where image paths resolve against.
fn load_story() -> (JsonEntityStore, BaseUrlResolver) {
	let Some(script) = script_element("story-data") else {
		warn!("story-graph: no story-data element, showing an empty story");
		return (JsonEntityStore::default(), BaseUrlResolver::default());
	};
	let resolver = BaseUrlResolver {
		base_url: script.get_attribute("data-base-url").unwrap_or_default(),
	};
	let json = script.text().unwrap_or_default();
	match JsonEntityStore::from_json(&json) {
		Ok(store) => {
			info!("story-graph: story data loaded");
			(store, resolver)
		}
		Err(e) => {
			warn!("story-graph: failed to parse story data: {e}");
			(JsonEntityStore::default(), resolver)
		}
	}
}

/// Load optional overrides from a script element with id="graph-config".
fn load_config() -> GraphConfig {
	let Some(json) = script_element("graph-config").and_then(|s| s.text().ok()) else {
		return GraphConfig::default();
	};
	GraphConfig::from_json(&json).unwrap_or_else(|e| {
		warn!("story-graph: ignoring invalid graph config: {e}");
		GraphConfig::default()
	})
}

/// Main application component.
/// Shows the story graph in a panel, with the same graph available as a modal
/// overlay. Both views share the saved viewport.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let (store, resolver) = load_story();
	let sources = StoredValue::new_local(GraphSources {
		store: Rc::new(store),
		settings: Rc::new(LocalStorageSettings::new(SETTINGS_KEY)),
		resolver: Rc::new(resolver),
	});
	let config = StoredValue::new(load_config());
	let modal_open = RwSignal::new(false);

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />
		<Title text="Story Graph" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<div class="story-graph-app" style="display: flex; flex-direction: column; height: 100vh;">
			<header class="story-graph-header">
				<h1>"Story Graph"</h1>
				<p class="subtitle">"Hover to inspect. Drag to move. Right-click to pin. Scroll to zoom."</p>
				<button on:click=move |_| modal_open.set(true)>"Open as overlay"</button>
			</header>
			<div style="flex: 1; min-height: 0;">
				<Show when=move || !modal_open.get()>
					<GraphShell
						kind=ShellKind::Panel
						sources=sources.get_value()
						config=config.get_value()
					/>
				</Show>
			</div>
			<Show when=move || modal_open.get()>
				<GraphShell
					kind=ShellKind::Modal
					sources=sources.get_value()
					config=config.get_value()
					title="Relationships"
					on_close=move |()| modal_open.set(false)
				/>
			</Show>
		</div>
	}
}
