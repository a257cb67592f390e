//! Relationship extraction: entity collections in, one flat edge list out.
//!
//! Explicit relationships (typed `connections` on every entity, plus the legacy
//! `relationships` list on characters) and implicit structural associations
//! (ownership, containment, participation) are folded into a single
//! [`GraphEdge`] model. Targets that resolve to no known entity are dropped.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::entities::{EntityCommon, RelationshipType, StoryData, TypedConnection};

/// How an edge came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeOrigin {
	/// Declared in `connections` or legacy `relationships`.
	Explicit,
	/// Derived from a type-specific association field.
	Implicit,
	/// Synthesized reverse of a symmetric relationship.
	Mirrored,
}

/// A directed relationship between two node ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphEdge {
	pub source: String,
	pub target: String,
	pub relationship: RelationshipType,
	pub label: Option<String>,
	pub origin: EdgeOrigin,
}

impl GraphEdge {
	/// Stable element identity, unique per (source, target, type).
	pub fn element_id(&self) -> String {
		format!("{}->{}:{}", self.source, self.target, self.relationship)
	}

	/// Whether this edge touches `node` at either end.
	pub fn touches(&self, node: &str) -> bool {
		self.source == node || self.target == node
	}
}

/// Identity lookup over all four collections.
///
/// Keys are `id`, falling back to `name`. A key registered twice resolves to
/// the same string either way; duplicates are collapsed later when nodes are
/// keyed by id (last registration wins). The case-insensitive display-name
/// index keeps the first entity registered under each name.
#[derive(Debug, Default)]
pub struct EntityIndex {
	keys: HashSet<String>,
	names: HashMap<String, String>,
}

impl EntityIndex {
	pub fn from_story(data: &StoryData) -> Self {
		let mut index = Self::default();
		let commons = data
			.characters
			.iter()
			.map(|c| &c.common)
			.chain(data.locations.iter().map(|l| &l.common))
			.chain(data.events.iter().map(|e| &e.common))
			.chain(data.items.iter().map(|i| &i.common));
		for common in commons {
			index.register(common);
		}
		index
	}

	pub fn register(&mut self, common: &EntityCommon) {
		let key = common.key().to_string();
		if !common.name.is_empty() {
			self.names
				.entry(common.name.to_lowercase())
				.or_insert_with(|| key.clone());
		}
		self.keys.insert(key);
	}

	/// Resolve a relationship target to a node id: exact key first, then a
	/// case-insensitive display-name match.
	pub fn resolve(&self, target: &str) -> Option<&str> {
		let target = normalize_target(target)?;
		if let Some(key) = self.keys.get(target) {
			return Some(key.as_str());
		}
		self.names.get(&target.to_lowercase()).map(String::as_str)
	}
}

/// Strip whitespace and wiki-link syntax from a stored target reference.
///
/// `[[Bob]]`, `[[Bob|the baker]]` and `[[Bob#Early life]]` all yield `Bob`.
/// Returns `None` for blank references.
pub fn normalize_target(raw: &str) -> Option<&str> {
	let mut target = raw.trim();
	if let Some(inner) = target.strip_prefix("[[").and_then(|t| t.strip_suffix("]]")) {
		target = inner;
		if let Some((page, _alias)) = target.split_once('|') {
			target = page;
		}
		if let Some((page, _heading)) = target.split_once('#') {
			target = page;
		}
		target = target.trim();
	}
	(!target.is_empty()).then_some(target)
}

/// Accumulates edges while suppressing exact duplicates.
struct EdgeSet<'a> {
	index: &'a EntityIndex,
	edges: Vec<GraphEdge>,
	typed: HashSet<(String, String, RelationshipType)>,
	pairs: HashSet<(String, String)>,
	dropped: usize,
}

impl<'a> EdgeSet<'a> {
	fn new(index: &'a EntityIndex) -> Self {
		Self {
			index,
			edges: Vec::new(),
			typed: HashSet::new(),
			pairs: HashSet::new(),
			dropped: 0,
		}
	}

	fn resolve_pair(&mut self, source: &str, target: &str) -> Option<String> {
		let index = self.index;
		match index.resolve(target) {
			Some(resolved) if resolved != source => Some(resolved.to_string()),
			Some(_) => None,
			None => {
				self.dropped += 1;
				None
			}
		}
	}

	fn push_explicit(&mut self, source: &str, connection: &TypedConnection) {
		let Some(target) = self.resolve_pair(source, &connection.target) else {
			return;
		};
		let key = (source.to_string(), target.clone(), connection.kind);
		if !self.typed.insert(key) {
			return;
		}
		self.pairs.insert((source.to_string(), target.clone()));
		self.edges.push(GraphEdge {
			source: source.to_string(),
			target,
			relationship: connection.kind,
			label: connection.label.clone(),
			origin: EdgeOrigin::Explicit,
		});
	}

	fn push_implicit(&mut self, source: &str, target: &str, label: &str) {
		let Some(target) = self.resolve_pair(source, target) else {
			return;
		};
		if !self.pairs.insert((source.to_string(), target.clone())) {
			return;
		}
		self.typed
			.insert((source.to_string(), target.clone(), RelationshipType::Neutral));
		self.edges.push(GraphEdge {
			source: source.to_string(),
			target,
			relationship: RelationshipType::Neutral,
			label: Some(label.to_string()),
			origin: EdgeOrigin::Implicit,
		});
	}
}

/// Derive the full edge list for a story, including bidirectional closure.
pub fn extract_edges(data: &StoryData) -> Vec<GraphEdge> {
	let index = EntityIndex::from_story(data);
	let mut set = EdgeSet::new(&index);

	for character in &data.characters {
		let source = character.common.key();
		for connection in &character.common.connections {
			set.push_explicit(source, connection);
		}
		for relationship in &character.relationships {
			set.push_explicit(source, &relationship.to_connection());
		}
	}
	let others = data
		.locations
		.iter()
		.map(|l| &l.common)
		.chain(data.events.iter().map(|e| &e.common))
		.chain(data.items.iter().map(|i| &i.common));
	for common in others {
		for connection in &common.connections {
			set.push_explicit(common.key(), connection);
		}
	}

	for character in &data.characters {
		let source = character.common.key();
		for location in &character.locations {
			set.push_implicit(source, location, "associated");
		}
		for event in &character.events {
			set.push_implicit(source, event, "involved");
		}
	}
	for event in &data.events {
		let source = event.common.key();
		for character in &event.characters {
			set.push_implicit(source, character, "involved");
		}
		if let Some(location) = &event.location {
			set.push_implicit(source, location, "occurred at");
		}
	}
	for item in &data.items {
		let source = item.common.key();
		if let Some(owner) = &item.current_owner {
			set.push_implicit(source, owner, "owned by");
		}
		if let Some(location) = &item.current_location {
			set.push_implicit(source, location, "located at");
		}
		for event in &item.associated_events {
			set.push_implicit(source, event, "featured in");
		}
	}
	for location in &data.locations {
		if let Some(parent) = &location.parent_location {
			set.push_implicit(location.common.key(), parent, "within");
		}
	}

	if set.dropped > 0 {
		debug!("story-graph: dropped {} unresolved relationship targets", set.dropped);
	}

	let mut edges = set.edges;
	bidirectional_closure(&mut edges);
	edges
}

/// Synthesize the reverse of every symmetric edge that lacks one.
///
/// Single pass over the list as it stands; synthesized edges are never
/// mirrored again. Running it twice adds nothing the second time.
pub fn bidirectional_closure(edges: &mut Vec<GraphEdge>) -> usize {
	let mut present: HashSet<(String, String, RelationshipType)> = edges
		.iter()
		.map(|e| (e.source.clone(), e.target.clone(), e.relationship))
		.collect();

	let mut mirrored = Vec::new();
	for edge in edges.iter().filter(|e| e.relationship.is_symmetric()) {
		let reverse = (edge.target.clone(), edge.source.clone(), edge.relationship);
		if present.insert(reverse) {
			mirrored.push(GraphEdge {
				source: edge.target.clone(),
				target: edge.source.clone(),
				relationship: edge.relationship,
				label: edge.label.clone(),
				origin: EdgeOrigin::Mirrored,
			});
		}
	}

	let added = mirrored.len();
	edges.extend(mirrored);
	added
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entities::{Character, Event, LegacyRelationship, Location, PlotItem};

	fn character(name: &str) -> Character {
		Character {
			common: EntityCommon {
				name: name.into(),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn location(id: Option<&str>, name: &str) -> Location {
		Location {
			common: EntityCommon {
				id: id.map(str::to_string),
				name: name.into(),
				..Default::default()
			},
			..Default::default()
		}
	}

	fn find<'a>(edges: &'a [GraphEdge], source: &str, target: &str) -> Vec<&'a GraphEdge> {
		edges
			.iter()
			.filter(|e| e.source == source && e.target == target)
			.collect()
	}

	#[test]
	fn typed_connection_produces_one_edge_and_its_mirror() {
		let mut alice = character("Alice");
		alice
			.common
			.connections
			.push(TypedConnection::new("Bob", RelationshipType::Ally).with_label("old friends"));
		let data = StoryData {
			characters: vec![alice, character("Bob")],
			..Default::default()
		};

		let edges = extract_edges(&data);
		let forward = find(&edges, "Alice", "Bob");
		assert_eq!(forward.len(), 1);
		assert_eq!(forward[0].relationship, RelationshipType::Ally);
		assert_eq!(forward[0].origin, EdgeOrigin::Explicit);

		let reverse = find(&edges, "Bob", "Alice");
		assert_eq!(reverse.len(), 1);
		assert_eq!(reverse[0].origin, EdgeOrigin::Mirrored);
		assert_eq!(reverse[0].label.as_deref(), Some("old friends"));
	}

	#[test]
	fn asymmetric_types_are_not_mirrored() {
		let mut alice = character("Alice");
		alice
			.common
			.connections
			.push(TypedConnection::new("Bob", RelationshipType::Mentor));
		let data = StoryData {
			characters: vec![alice, character("Bob")],
			..Default::default()
		};

		let edges = extract_edges(&data);
		assert_eq!(edges.len(), 1);
		assert!(find(&edges, "Bob", "Alice").is_empty());
	}

	#[test]
	fn legacy_and_typed_relationships_are_unioned() {
		let mut hero = character("Hero");
		hero.relationships.push(LegacyRelationship::Name("Bob".into()));
		hero.common
			.connections
			.push(TypedConnection::new("Alice", RelationshipType::Ally));
		let data = StoryData {
			characters: vec![hero, character("Alice"), character("Bob")],
			..Default::default()
		};

		let edges = extract_edges(&data);
		let to_bob = find(&edges, "Hero", "Bob");
		assert_eq!(to_bob.len(), 1);
		assert_eq!(to_bob[0].relationship, RelationshipType::Neutral);
		let to_alice = find(&edges, "Hero", "Alice");
		assert_eq!(to_alice.len(), 1);
		assert_eq!(to_alice[0].relationship, RelationshipType::Ally);
	}

	#[test]
	fn exact_id_match_wins_over_name_match() {
		let mut knight = character("Knight");
		knight
			.common
			.connections
			.push(TypedConnection::new("loc-1", RelationshipType::Neutral));
		let data = StoryData {
			characters: vec![knight],
			locations: vec![
				location(Some("loc-1"), "Castle"),
				location(Some("loc-2"), "Castle"),
			],
			..Default::default()
		};

		let edges = extract_edges(&data);
		assert_eq!(edges.len(), 1);
		assert_eq!(edges[0].target, "loc-1");
	}

	#[test]
	fn name_match_is_case_insensitive() {
		let mut knight = character("Knight");
		knight.locations.push("the keep".into());
		let data = StoryData {
			characters: vec![knight],
			locations: vec![location(Some("loc-9"), "The Keep")],
			..Default::default()
		};

		let edges = extract_edges(&data);
		assert_eq!(edges.len(), 1);
		assert_eq!(edges[0].target, "loc-9");
		assert_eq!(edges[0].label.as_deref(), Some("associated"));
		assert_eq!(edges[0].origin, EdgeOrigin::Implicit);
	}

	#[test]
	fn dangling_targets_are_dropped_silently() {
		let mut ghost = character("Ghost");
		ghost.relationships.push(LegacyRelationship::Name("Nobody".into()));
		ghost
			.common
			.connections
			.push(TypedConnection::new("", RelationshipType::Enemy));
		let data = StoryData {
			characters: vec![ghost],
			..Default::default()
		};

		assert!(extract_edges(&data).is_empty());
	}

	#[test]
	fn implicit_edges_cover_every_association_field() {
		let castle = location(None, "Castle");
		let mut keep = location(None, "Keep");
		keep.parent_location = Some("Castle".into());
		let coronation = Event {
			common: EntityCommon {
				name: "Coronation".into(),
				..Default::default()
			},
			location: Some("Castle".into()),
			characters: vec!["Elara".into()],
			..Default::default()
		};
		let crown = PlotItem {
			common: EntityCommon {
				name: "Crown".into(),
				..Default::default()
			},
			current_owner: Some("Elara".into()),
			current_location: Some("Keep".into()),
			associated_events: vec!["Coronation".into()],
		};
		let mut elara = character("Elara");
		elara.locations.push("Castle".into());
		elara.events.push("Coronation".into());

		let data = StoryData {
			characters: vec![elara],
			locations: vec![castle, keep],
			events: vec![coronation],
			items: vec![crown],
		};
		let edges = extract_edges(&data);
		let label = |s: &str, t: &str| find(&edges, s, t)[0].label.clone().unwrap();

		assert_eq!(label("Elara", "Castle"), "associated");
		assert_eq!(label("Elara", "Coronation"), "involved");
		assert_eq!(label("Coronation", "Elara"), "involved");
		assert_eq!(label("Coronation", "Castle"), "occurred at");
		assert_eq!(label("Crown", "Elara"), "owned by");
		assert_eq!(label("Crown", "Keep"), "located at");
		assert_eq!(label("Crown", "Coronation"), "featured in");
		assert_eq!(label("Keep", "Castle"), "within");
		assert_eq!(edges.len(), 8);
	}

	#[test]
	fn implicit_edge_skipped_when_pair_already_linked() {
		let mut elara = character("Elara");
		elara
			.common
			.connections
			.push(TypedConnection::new("Castle", RelationshipType::Custom).with_label("rules"));
		elara.locations.push("Castle".into());
		let data = StoryData {
			characters: vec![elara],
			locations: vec![location(None, "Castle")],
			..Default::default()
		};

		let edges = extract_edges(&data);
		assert_eq!(edges.len(), 1);
		assert_eq!(edges[0].origin, EdgeOrigin::Explicit);
	}

	#[test]
	fn parallel_edges_of_different_types_are_kept() {
		let mut alice = character("Alice");
		alice
			.common
			.connections
			.push(TypedConnection::new("Bob", RelationshipType::Mentor));
		alice
			.common
			.connections
			.push(TypedConnection::new("Bob", RelationshipType::Enemy));
		alice
			.common
			.connections
			.push(TypedConnection::new("Bob", RelationshipType::Enemy));
		let data = StoryData {
			characters: vec![alice, character("Bob")],
			..Default::default()
		};

		assert_eq!(find(&extract_edges(&data), "Alice", "Bob").len(), 2);
	}

	#[test]
	fn wiki_links_and_self_references() {
		assert_eq!(normalize_target(" [[Bob|the baker]] "), Some("Bob"));
		assert_eq!(normalize_target("[[Bob#Early life]]"), Some("Bob"));
		assert_eq!(normalize_target("   "), None);

		let mut narcissus = character("Narcissus");
		narcissus
			.common
			.connections
			.push(TypedConnection::new("[[Narcissus]]", RelationshipType::Romantic));
		let data = StoryData {
			characters: vec![narcissus],
			..Default::default()
		};
		assert!(extract_edges(&data).is_empty());
	}

	#[test]
	fn closure_is_idempotent() {
		let mut edges = vec![
			GraphEdge {
				source: "A".into(),
				target: "B".into(),
				relationship: RelationshipType::Family,
				label: None,
				origin: EdgeOrigin::Explicit,
			},
			GraphEdge {
				source: "C".into(),
				target: "A".into(),
				relationship: RelationshipType::Rival,
				label: None,
				origin: EdgeOrigin::Explicit,
			},
			GraphEdge {
				source: "A".into(),
				target: "C".into(),
				relationship: RelationshipType::Rival,
				label: None,
				origin: EdgeOrigin::Explicit,
			},
		];

		assert_eq!(bidirectional_closure(&mut edges), 1);
		let len = edges.len();
		assert_eq!(bidirectional_closure(&mut edges), 0);
		assert_eq!(edges.len(), len);
	}
}
