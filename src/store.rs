//! Collaborators the graph consumes: entity persistence, plugin settings and
//! image resource resolution.
//!
//! The engine always re-fetches from the [`EntityStore`] on refresh. Listing a
//! collection can fail as a whole or per entity; [`collect_story`] logs and
//! skips both kinds of failure so one unreadable note never blanks the graph.

use std::cell::RefCell;
use std::collections::HashSet;

use futures::future::{FutureExt, LocalBoxFuture};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entities::{Character, EntityKind, Event, Location, PlotItem, StoryData};
use crate::error::StoreError;

/// One listed collection: each entry is either a parsed entity or the reason
/// its backing record could not be read.
pub type Loaded<T> = Vec<Result<T, StoreError>>;

/// Persistence collaborator listing the active story's entities.
pub trait EntityStore {
	fn list_characters(&self) -> LocalBoxFuture<'_, Result<Loaded<Character>, StoreError>>;
	fn list_locations(&self) -> LocalBoxFuture<'_, Result<Loaded<Location>, StoreError>>;
	fn list_events(&self) -> LocalBoxFuture<'_, Result<Loaded<Event>, StoreError>>;
	fn list_plot_items(&self) -> LocalBoxFuture<'_, Result<Loaded<PlotItem>, StoreError>>;
}

fn keep_readable<T>(kind: EntityKind, listed: Result<Loaded<T>, StoreError>) -> Vec<T> {
	match listed {
		Ok(entries) => entries
			.into_iter()
			.filter_map(|entry| match entry {
				Ok(entity) => Some(entity),
				Err(e) => {
					warn!("story-graph: skipping unreadable {kind}: {e}");
					None
				}
			})
			.collect(),
		Err(e) => {
			warn!("story-graph: {e}; continuing without {kind} entities");
			Vec::new()
		}
	}
}

/// Fetch all four collections, skipping anything unreadable.
pub async fn collect_story(store: &dyn EntityStore) -> StoryData {
	let characters = keep_readable(EntityKind::Character, store.list_characters().await);
	let locations = keep_readable(EntityKind::Location, store.list_locations().await);
	let events = keep_readable(EntityKind::Event, store.list_events().await);
	let items = keep_readable(EntityKind::Item, store.list_plot_items().await);
	let data = StoryData {
		characters,
		locations,
		events,
		items,
	};
	debug!("story-graph: collected {} entities", data.len());
	data
}

/// In-memory store over already-parsed entities.
///
/// Collections can be marked failing to exercise the skip-and-continue path.
#[derive(Debug, Default)]
pub struct MemoryStore {
	data: RefCell<StoryData>,
	failing: RefCell<HashSet<EntityKind>>,
}

impl MemoryStore {
	pub fn new(data: StoryData) -> Self {
		Self {
			data: RefCell::new(data),
			failing: RefCell::default(),
		}
	}

	/// Replace the stored story, as if notes changed on disk.
	pub fn set_data(&self, data: StoryData) {
		*self.data.borrow_mut() = data;
	}

	/// Apply an in-place edit to the stored story.
	pub fn update(&self, f: impl FnOnce(&mut StoryData)) {
		f(&mut self.data.borrow_mut());
	}

	/// Make listing `kind` fail until cleared.
	pub fn set_failing(&self, kind: EntityKind, failing: bool) {
		let mut set = self.failing.borrow_mut();
		if failing {
			set.insert(kind);
		} else {
			set.remove(&kind);
		}
	}

	fn listed<T: Clone>(
		&self,
		kind: EntityKind,
		select: impl FnOnce(&StoryData) -> &Vec<T>,
	) -> Result<Loaded<T>, StoreError> {
		if self.failing.borrow().contains(&kind) {
			return Err(StoreError::Collection {
				kind,
				reason: "collection unavailable".into(),
			});
		}
		Ok(select(&self.data.borrow()).iter().cloned().map(Ok).collect())
	}
}

impl EntityStore for MemoryStore {
	fn list_characters(&self) -> LocalBoxFuture<'_, Result<Loaded<Character>, StoreError>> {
		let listed = self.listed(EntityKind::Character, |d| &d.characters);
		async move { listed }.boxed_local()
	}

	fn list_locations(&self) -> LocalBoxFuture<'_, Result<Loaded<Location>, StoreError>> {
		let listed = self.listed(EntityKind::Location, |d| &d.locations);
		async move { listed }.boxed_local()
	}

	fn list_events(&self) -> LocalBoxFuture<'_, Result<Loaded<Event>, StoreError>> {
		let listed = self.listed(EntityKind::Event, |d| &d.events);
		async move { listed }.boxed_local()
	}

	fn list_plot_items(&self) -> LocalBoxFuture<'_, Result<Loaded<PlotItem>, StoreError>> {
		let listed = self.listed(EntityKind::Item, |d| &d.items);
		async move { listed }.boxed_local()
	}
}

/// Raw, unparsed story document: one JSON object per entity.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawStory {
	characters: Vec<serde_json::Value>,
	locations: Vec<serde_json::Value>,
	events: Vec<serde_json::Value>,
	#[serde(alias = "items")]
	plot_items: Vec<serde_json::Value>,
}

/// Store backed by a JSON document embedded in the page.
///
/// Each entity object is parsed on its own, so one malformed record is
/// reported as a per-entity error instead of failing the collection.
#[derive(Debug, Default)]
pub struct JsonEntityStore {
	raw: RefCell<RawStory>,
}

impl JsonEntityStore {
	pub fn from_json(json: &str) -> Result<Self, StoreError> {
		Ok(Self {
			raw: RefCell::new(serde_json::from_str(json)?),
		})
	}

	/// Swap in a new document.
	pub fn replace_json(&self, json: &str) -> Result<(), StoreError> {
		*self.raw.borrow_mut() = serde_json::from_str(json)?;
		Ok(())
	}

	fn parse_all<T: DeserializeOwned>(kind: EntityKind, values: &[serde_json::Value]) -> Loaded<T> {
		values
			.iter()
			.enumerate()
			.map(|(i, value)| {
				T::deserialize(value).map_err(|e| StoreError::Entity {
					kind,
					key: value
						.get("id")
						.or_else(|| value.get("name"))
						.and_then(|v| v.as_str())
						.map(str::to_string)
						.unwrap_or_else(|| format!("#{i}")),
					reason: e.to_string(),
				})
			})
			.collect()
	}
}

impl EntityStore for JsonEntityStore {
	fn list_characters(&self) -> LocalBoxFuture<'_, Result<Loaded<Character>, StoreError>> {
		let listed = Self::parse_all(EntityKind::Character, &self.raw.borrow().characters);
		async move { Ok(listed) }.boxed_local()
	}

	fn list_locations(&self) -> LocalBoxFuture<'_, Result<Loaded<Location>, StoreError>> {
		let listed = Self::parse_all(EntityKind::Location, &self.raw.borrow().locations);
		async move { Ok(listed) }.boxed_local()
	}

	fn list_events(&self) -> LocalBoxFuture<'_, Result<Loaded<Event>, StoreError>> {
		let listed = Self::parse_all(EntityKind::Event, &self.raw.borrow().events);
		async move { Ok(listed) }.boxed_local()
	}

	fn list_plot_items(&self) -> LocalBoxFuture<'_, Result<Loaded<PlotItem>, StoreError>> {
		let listed = Self::parse_all(EntityKind::Item, &self.raw.borrow().plot_items);
		async move { Ok(listed) }.boxed_local()
	}
}

/// Pan offset in screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pan {
	pub x: f64,
	pub y: f64,
}

/// Zoom level and pan offset of a graph view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
	pub zoom: f64,
	pub pan: Pan,
}

/// Persisted plugin settings the graph reads and writes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginSettings {
	pub network_graph_zoom: Option<f64>,
	pub network_graph_pan: Option<Pan>,
	pub allow_remote_images: bool,
}

/// Plugin-wide settings storage, shared by every graph view.
pub trait SettingsStore {
	fn load(&self) -> PluginSettings;
	fn save(&self, settings: &PluginSettings) -> Result<(), StoreError>;

	/// Saved viewport, when both zoom and pan were persisted.
	fn viewport(&self) -> Option<Viewport> {
		let settings = self.load();
		match (settings.network_graph_zoom, settings.network_graph_pan) {
			(Some(zoom), Some(pan)) if zoom.is_finite() && zoom > 0.0 => Some(Viewport { zoom, pan }),
			_ => None,
		}
	}

	fn store_viewport(&self, viewport: Viewport) -> Result<(), StoreError> {
		let mut settings = self.load();
		settings.network_graph_zoom = Some(viewport.zoom);
		settings.network_graph_pan = Some(viewport.pan);
		self.save(&settings)
	}

	fn allow_remote_images(&self) -> bool {
		self.load().allow_remote_images
	}
}

/// Settings held in memory for the lifetime of the page.
#[derive(Debug, Default)]
pub struct MemorySettings {
	settings: RefCell<PluginSettings>,
	writes: RefCell<usize>,
}

impl MemorySettings {
	pub fn new(settings: PluginSettings) -> Self {
		Self {
			settings: RefCell::new(settings),
			writes: RefCell::new(0),
		}
	}

	/// Number of successful saves so far.
	pub fn write_count(&self) -> usize {
		*self.writes.borrow()
	}
}

impl SettingsStore for MemorySettings {
	fn load(&self) -> PluginSettings {
		self.settings.borrow().clone()
	}

	fn save(&self, settings: &PluginSettings) -> Result<(), StoreError> {
		*self.settings.borrow_mut() = settings.clone();
		*self.writes.borrow_mut() += 1;
		Ok(())
	}
}

/// Settings persisted as JSON under one `localStorage` key.
#[derive(Clone, Debug)]
pub struct LocalStorageSettings {
	key: String,
}

impl LocalStorageSettings {
	pub fn new(key: impl Into<String>) -> Self {
		Self { key: key.into() }
	}

	fn storage() -> Result<web_sys::Storage, StoreError> {
		web_sys::window()
			.and_then(|w| w.local_storage().ok().flatten())
			.ok_or_else(|| StoreError::Settings("localStorage unavailable".into()))
	}
}

impl SettingsStore for LocalStorageSettings {
	fn load(&self) -> PluginSettings {
		let raw = Self::storage()
			.ok()
			.and_then(|s| s.get_item(&self.key).ok().flatten());
		match raw.map(|json| serde_json::from_str::<PluginSettings>(&json)) {
			Some(Ok(settings)) => settings,
			Some(Err(e)) => {
				warn!("story-graph: ignoring malformed settings: {e}");
				PluginSettings::default()
			}
			None => PluginSettings::default(),
		}
	}

	fn save(&self, settings: &PluginSettings) -> Result<(), StoreError> {
		let json = serde_json::to_string(settings)?;
		Self::storage()?
			.set_item(&self.key, &json)
			.map_err(|e| StoreError::Settings(format!("{e:?}")))
	}
}

/// Turns a stored resource path into a displayable URL.
pub trait ResourceResolver {
	fn resource_url(&self, path: &str) -> Option<String>;
}

/// Resolves vault-relative paths against a base URL.
#[derive(Clone, Debug, Default)]
pub struct BaseUrlResolver {
	pub base_url: String,
}

impl ResourceResolver for BaseUrlResolver {
	fn resource_url(&self, path: &str) -> Option<String> {
		let path = path.trim().trim_start_matches('/');
		if path.is_empty() {
			return None;
		}
		if self.base_url.is_empty() {
			return Some(path.to_string());
		}
		Some(format!("{}/{}", self.base_url.trim_end_matches('/'), path))
	}
}

fn is_remote(reference: &str) -> bool {
	let lower = reference.trim_start().to_ascii_lowercase();
	lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

/// Resolve a thumbnail reference, honoring the remote-image policy.
///
/// Externally hosted references yield `None` unless `allow_remote` is set;
/// everything else goes through `resolver`.
pub fn resolve_image(
	reference: &str,
	allow_remote: bool,
	resolver: &dyn ResourceResolver,
) -> Option<String> {
	let reference = reference.trim();
	if reference.is_empty() {
		return None;
	}
	if reference.starts_with("data:") {
		return Some(reference.to_string());
	}
	if is_remote(reference) {
		return allow_remote.then(|| reference.to_string());
	}
	resolver.resource_url(reference)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entities::EntityCommon;

	fn named(name: &str) -> EntityCommon {
		EntityCommon {
			name: name.into(),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn malformed_entities_are_skipped() {
		let store = JsonEntityStore::from_json(
			r#"{
				"characters": [{"name": "Elara"}, {"name": 42}, {"name": "Bram"}],
				"items": [{"name": "Crown"}]
			}"#,
		)
		.unwrap();

		let listed = store.list_characters().await.unwrap();
		assert_eq!(listed.len(), 3);
		assert!(matches!(listed[1], Err(StoreError::Entity { .. })));

		let data = collect_story(&store).await;
		let names: Vec<_> = data.characters.iter().map(|c| c.common.name.as_str()).collect();
		assert_eq!(names, vec!["Elara", "Bram"]);
		assert_eq!(data.items.len(), 1);
	}

	#[tokio::test]
	async fn failing_collection_does_not_abort_collection() {
		let store = MemoryStore::new(StoryData {
			characters: vec![Character {
				common: named("Elara"),
				..Default::default()
			}],
			locations: vec![Location {
				common: named("Castle"),
				..Default::default()
			}],
			..Default::default()
		});
		store.set_failing(EntityKind::Location, true);

		let data = collect_story(&store).await;
		assert_eq!(data.characters.len(), 1);
		assert!(data.locations.is_empty());
	}

	#[test]
	fn viewport_requires_zoom_and_pan() {
		let settings = MemorySettings::default();
		assert!(settings.viewport().is_none());

		settings
			.store_viewport(Viewport {
				zoom: 1.5,
				pan: Pan { x: 100.0, y: 50.0 },
			})
			.unwrap();
		let restored = settings.viewport().unwrap();
		assert_eq!(restored.zoom, 1.5);
		assert_eq!(restored.pan, Pan { x: 100.0, y: 50.0 });
		assert_eq!(settings.write_count(), 1);
	}

	#[test]
	fn settings_use_camel_case_keys() {
		let settings: PluginSettings = serde_json::from_str(
			r#"{"networkGraphZoom": 2.0, "networkGraphPan": {"x": 1, "y": 2}, "allowRemoteImages": true}"#,
		)
		.unwrap();
		assert_eq!(settings.network_graph_zoom, Some(2.0));
		assert!(settings.allow_remote_images);
	}

	#[test]
	fn remote_images_respect_policy() {
		let resolver = BaseUrlResolver {
			base_url: "app://vault/".into(),
		};
		let remote = "https://example.com/elara.png";

		assert_eq!(resolve_image(remote, false, &resolver), None);
		assert_eq!(resolve_image(remote, true, &resolver).as_deref(), Some(remote));
		assert_eq!(
			resolve_image("Art/elara.png", false, &resolver).as_deref(),
			Some("app://vault/Art/elara.png")
		);
		assert_eq!(resolve_image("  ", true, &resolver), None);
	}
}
