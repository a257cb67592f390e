//! Graph data builder: filtered entity collections to a consistent node/edge set.
//!
//! Filters are applied before any node or edge is built, so excluded entities
//! cannot leak back in through relationship edges. Node degree is derived from
//! the final edge list on every build and never stored.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::entities::{Entity, EntityCommon, EntityKind, StoryData};
use crate::extract::{GraphEdge, extract_edges};

/// Active restrictions for one graph build. A `None` field means no
/// restriction on that axis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphFilters {
	pub entity_types: Option<BTreeSet<EntityKind>>,
	pub groups: Option<BTreeSet<String>>,
	pub timeline_start: Option<NaiveDateTime>,
	pub timeline_end: Option<NaiveDateTime>,
}

impl GraphFilters {
	/// Preset: characters and their relationships only.
	pub fn characters_only() -> Self {
		Self {
			entity_types: Some(BTreeSet::from([EntityKind::Character])),
			..Default::default()
		}
	}

	/// Preset: everything except timeline events.
	pub fn without_events() -> Self {
		Self {
			entity_types: Some(
				EntityKind::ALL
					.into_iter()
					.filter(|k| *k != EntityKind::Event)
					.collect(),
			),
			..Default::default()
		}
	}

	/// Whether entities of `kind` survive the type filter.
	pub fn includes(&self, kind: EntityKind) -> bool {
		self.entity_types
			.as_ref()
			.is_none_or(|kinds| kinds.contains(&kind))
	}

	/// Return a copy with `kind` toggled in the type filter.
	pub fn toggled(&self, kind: EntityKind) -> Self {
		let mut kinds: BTreeSet<EntityKind> = self
			.entity_types
			.clone()
			.unwrap_or_else(|| EntityKind::ALL.into_iter().collect());
		if !kinds.remove(&kind) {
			kinds.insert(kind);
		}
		let entity_types = (kinds.len() != EntityKind::ALL.len()).then_some(kinds);
		Self {
			entity_types,
			..self.clone()
		}
	}

	/// Return a copy with `group` toggled in the group filter.
	pub fn toggled_group(&self, group: &str) -> Self {
		let mut groups = self.groups.clone().unwrap_or_default();
		if !groups.remove(group) {
			groups.insert(group.to_string());
		}
		Self {
			groups: (!groups.is_empty()).then_some(groups),
			..self.clone()
		}
	}

	/// Whether any axis is restricted.
	pub fn is_active(&self) -> bool {
		self.entity_types.is_some()
			|| self.groups.as_ref().is_some_and(|g| !g.is_empty())
			|| self.timeline_start.is_some()
			|| self.timeline_end.is_some()
	}

	fn admits_groups(&self, common: &EntityCommon) -> bool {
		match &self.groups {
			Some(groups) if !groups.is_empty() => common.in_any_group(groups),
			_ => true,
		}
	}

	fn admits_date(&self, date_time: Option<&str>) -> bool {
		let Some(when) = date_time.and_then(parse_story_date) else {
			return true;
		};
		self.timeline_start.is_none_or(|start| when >= start)
			&& self.timeline_end.is_none_or(|end| when <= end)
	}

	/// Apply every filter axis, producing the collections that feed node and
	/// edge construction.
	pub fn apply(&self, data: &StoryData) -> StoryData {
		let keep = |kind: EntityKind| self.includes(kind);
		StoryData {
			characters: if keep(EntityKind::Character) {
				data.characters
					.iter()
					.filter(|c| self.admits_groups(&c.common))
					.cloned()
					.collect()
			} else {
				Vec::new()
			},
			locations: if keep(EntityKind::Location) {
				data.locations
					.iter()
					.filter(|l| self.admits_groups(&l.common))
					.cloned()
					.collect()
			} else {
				Vec::new()
			},
			events: if keep(EntityKind::Event) {
				data.events
					.iter()
					.filter(|e| self.admits_groups(&e.common))
					.filter(|e| self.admits_date(e.date_time.as_deref()))
					.cloned()
					.collect()
			} else {
				Vec::new()
			},
			items: if keep(EntityKind::Item) {
				data.items
					.iter()
					.filter(|i| self.admits_groups(&i.common))
					.cloned()
					.collect()
			} else {
				Vec::new()
			},
		}
	}
}

/// Parse a stored event date.
///
/// Accepts RFC 3339, ISO date-times with or without seconds (`T` or space
/// separated) and plain ISO dates (midnight). Anything else is `None`, and the
/// event is treated as undated.
pub fn parse_story_date(raw: &str) -> Option<NaiveDateTime> {
	let raw = raw.trim();
	if raw.is_empty() {
		return None;
	}
	if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
		return Some(dt.naive_utc());
	}
	const FORMATS: [&str; 4] = [
		"%Y-%m-%dT%H:%M:%S",
		"%Y-%m-%dT%H:%M",
		"%Y-%m-%d %H:%M:%S",
		"%Y-%m-%d %H:%M",
	];
	for format in FORMATS {
		if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
			return Some(dt);
		}
	}
	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// One node of a graph build.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
	/// Canonical entity key, unique within a build.
	pub id: String,
	pub label: String,
	pub kind: EntityKind,
	pub entity: Entity,
	/// Stored thumbnail reference, unresolved.
	pub image_ref: Option<String>,
	/// Number of incident edges, undirected.
	pub degree: usize,
}

impl GraphNode {
	fn from_entity(entity: Entity) -> Self {
		let common = entity.common();
		let label = if common.name.is_empty() {
			common.key().to_string()
		} else {
			common.name.clone()
		};
		Self {
			id: common.key().to_string(),
			label,
			kind: entity.kind(),
			image_ref: common.profile_image_path.clone().filter(|p| !p.is_empty()),
			entity,
			degree: 0,
		}
	}
}

/// Mutually consistent nodes and edges: every edge endpoint is a node id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphData {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
}

impl GraphData {
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn node(&self, id: &str) -> Option<&GraphNode> {
		self.nodes.iter().find(|n| n.id == id)
	}
}

/// Node count per entity kind, for legends.
pub fn kind_counts<'a>(
	nodes: impl IntoIterator<Item = &'a GraphNode>,
) -> BTreeMap<EntityKind, usize> {
	let mut counts = BTreeMap::new();
	for node in nodes {
		*counts.entry(node.kind).or_insert(0) += 1;
	}
	counts
}

/// The `limit` highest-degree nodes, ties broken by label. Isolated nodes
/// never rank.
pub fn most_connected<'a>(
	nodes: impl IntoIterator<Item = &'a GraphNode>,
	limit: usize,
) -> Vec<&'a GraphNode> {
	let mut ranked: Vec<&GraphNode> = nodes.into_iter().filter(|n| n.degree > 0).collect();
	ranked.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.label.cmp(&b.label)));
	ranked.truncate(limit);
	ranked
}

/// Every group name carried by any node, sorted.
pub fn groups<'a>(nodes: impl IntoIterator<Item = &'a GraphNode>) -> BTreeSet<String> {
	nodes
		.into_iter()
		.flat_map(|n| n.entity.common().groups.iter().cloned())
		.collect()
}

/// Count edge endpoints per node id.
pub fn compute_degrees(edges: &[GraphEdge]) -> HashMap<&str, usize> {
	let mut degrees: HashMap<&str, usize> = HashMap::new();
	for edge in edges {
		*degrees.entry(edge.source.as_str()).or_insert(0) += 1;
		*degrees.entry(edge.target.as_str()).or_insert(0) += 1;
	}
	degrees
}

/// Build the filtered node/edge set for rendering.
pub fn build_graph_data(data: &StoryData, filters: &GraphFilters) -> GraphData {
	let filtered = filters.apply(data);
	let edges = extract_edges(&filtered);

	let StoryData {
		characters,
		locations,
		events,
		items,
	} = filtered;
	let entities = characters
		.into_iter()
		.map(Entity::from)
		.chain(locations.into_iter().map(Entity::from))
		.chain(events.into_iter().map(Entity::from))
		.chain(items.into_iter().map(Entity::from));

	let mut nodes: Vec<GraphNode> = Vec::new();
	let mut positions: HashMap<String, usize> = HashMap::new();
	for entity in entities {
		let node = GraphNode::from_entity(entity);
		match positions.get(&node.id) {
			Some(&slot) => nodes[slot] = node,
			None => {
				positions.insert(node.id.clone(), nodes.len());
				nodes.push(node);
			}
		}
	}

	let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
	let edges: Vec<GraphEdge> = edges
		.into_iter()
		.filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
		.collect();

	let degrees = compute_degrees(&edges);
	for node in &mut nodes {
		node.degree = degrees.get(node.id.as_str()).copied().unwrap_or(0);
	}

	GraphData { nodes, edges }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::entities::{
		Character, Event, Location, PlotItem, RelationshipType, TypedConnection,
	};

	fn common(name: &str, groups: &[&str]) -> EntityCommon {
		EntityCommon {
			name: name.into(),
			groups: groups.iter().map(|g| g.to_string()).collect(),
			..Default::default()
		}
	}

	fn character(name: &str, targets: &[(&str, RelationshipType)]) -> Character {
		let mut c = Character {
			common: common(name, &[]),
			..Default::default()
		};
		for (target, kind) in targets {
			c.common.connections.push(TypedConnection::new(*target, *kind));
		}
		c
	}

	fn event(name: &str, date: Option<&str>) -> Event {
		Event {
			common: common(name, &[]),
			date_time: date.map(str::to_string),
			..Default::default()
		}
	}

	fn mixed_story() -> StoryData {
		let mut elara = character("Elara", &[("Castle", RelationshipType::Neutral)]);
		elara.events.push("Coronation".into());
		StoryData {
			characters: vec![
				elara,
				character("Bram", &[("Elara", RelationshipType::Enemy)]),
			],
			locations: vec![Location {
				common: common("Castle", &[]),
				..Default::default()
			}],
			events: vec![Event {
				location: Some("Castle".into()),
				..event("Coronation", Some("2024-05-01"))
			}],
			items: vec![PlotItem {
				common: common("Crown", &[]),
				current_owner: Some("Elara".into()),
				..Default::default()
			}],
		}
	}

	#[test]
	fn type_filter_excludes_nodes_and_their_edges() {
		let story = mixed_story();
		let unfiltered = build_graph_data(&story, &GraphFilters::default());
		assert!(unfiltered.edges.iter().any(|e| e.target == "Castle"));

		let graph = build_graph_data(&story, &GraphFilters::characters_only());
		assert!(graph.nodes.iter().all(|n| n.kind == EntityKind::Character));
		assert_eq!(graph.nodes.len(), 2);
		let ids: HashSet<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
		assert!(graph
			.edges
			.iter()
			.all(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str())));
		assert_eq!(graph.edges.len(), 1);
	}

	#[test]
	fn degree_counts_incident_edges() {
		let story = StoryData {
			characters: vec![
				character(
					"A",
					&[
						("B", RelationshipType::Mentor),
						("C", RelationshipType::Enemy),
						("D", RelationshipType::Neutral),
					],
				),
				character("B", &[]),
				character("C", &[]),
				character("D", &[]),
				character("E", &[]),
			],
			..Default::default()
		};

		let graph = build_graph_data(&story, &GraphFilters::default());
		let degree = |id: &str| graph.node(id).unwrap().degree;
		assert_eq!(degree("A"), 3);
		assert_eq!(degree("B"), 1);
		assert_eq!(degree("C"), 1);
		assert_eq!(degree("D"), 1);
		assert_eq!(degree("E"), 0);
	}

	#[test]
	fn group_filter_keeps_intersecting_members() {
		let mut crown = character("Crown Guard", &[]);
		crown.common.groups = vec!["royals".into(), "guards".into()];
		let mut rebel = character("Rebel", &[]);
		rebel.common.groups = vec!["rebels".into()];
		let story = StoryData {
			characters: vec![crown, rebel, character("Loner", &[])],
			locations: vec![Location {
				common: common("Palace", &["royals"]),
				..Default::default()
			}],
			..Default::default()
		};

		let filters = GraphFilters::default().toggled_group("royals");
		let graph = build_graph_data(&story, &filters);
		let mut ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
		ids.sort();
		assert_eq!(ids, vec!["Crown Guard", "Palace"]);
	}

	#[test]
	fn timeline_filter_only_touches_dated_events() {
		let story = StoryData {
			events: vec![
				event("Early", Some("1999-01-01")),
				event("Inside", Some("2024-03-10T12:30")),
				event("Late", Some("2030-01-01")),
				event("Undated", None),
				event("Vague", Some("the third age")),
			],
			characters: vec![character("Witness", &[])],
			..Default::default()
		};
		let filters = GraphFilters {
			timeline_start: parse_story_date("2024-01-01"),
			timeline_end: parse_story_date("2024-12-31"),
			..Default::default()
		};

		let graph = build_graph_data(&story, &filters);
		let mut ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
		ids.sort();
		assert_eq!(ids, vec!["Inside", "Undated", "Vague", "Witness"]);
	}

	#[test]
	fn open_ended_timeline_bounds() {
		let story = StoryData {
			events: vec![event("Old", Some("1200-06-01")), event("New", Some("2200-06-01"))],
			..Default::default()
		};
		let filters = GraphFilters {
			timeline_start: parse_story_date("2000-01-01"),
			..Default::default()
		};
		let graph = build_graph_data(&story, &filters);
		assert_eq!(graph.nodes.len(), 1);
		assert_eq!(graph.nodes[0].id, "New");
	}

	#[test]
	fn empty_story_builds_empty_graph() {
		let graph = build_graph_data(&StoryData::default(), &GraphFilters::default());
		assert!(graph.is_empty());
		assert!(graph.edges.is_empty());
	}

	#[test]
	fn duplicate_keys_keep_last_registration() {
		let mut first = character("Twin", &[]);
		first.common.description = Some("first".into());
		let mut second = character("Twin", &[]);
		second.common.description = Some("second".into());
		let story = StoryData {
			characters: vec![first, second],
			..Default::default()
		};

		let graph = build_graph_data(&story, &GraphFilters::default());
		assert_eq!(graph.nodes.len(), 1);
		assert_eq!(
			graph.nodes[0].entity.common().description.as_deref(),
			Some("second")
		);
	}

	#[test]
	fn toggling_kinds_round_trips_to_no_filter() {
		let filters = GraphFilters::default().toggled(EntityKind::Event);
		assert!(!filters.includes(EntityKind::Event));
		assert!(filters.includes(EntityKind::Item));
		assert_eq!(filters, GraphFilters::without_events());

		let restored = filters.toggled(EntityKind::Event);
		assert!(restored.entity_types.is_none());
		assert!(!restored.is_active());
	}

	#[test]
	fn stats_rank_most_connected() {
		let graph = build_graph_data(&mixed_story(), &GraphFilters::default());
		let top = most_connected(&graph.nodes, 1);
		assert_eq!(top[0].id, "Elara");
		assert_eq!(kind_counts(&graph.nodes)[&EntityKind::Character], 2);
	}

	#[test]
	fn parses_supported_date_shapes() {
		assert!(parse_story_date("2024-03-10").is_some());
		assert!(parse_story_date("2024-03-10 08:15").is_some());
		assert!(parse_story_date("2024-03-10T08:15:30Z").is_some());
		assert!(parse_story_date("Midsummer").is_none());
	}
}
