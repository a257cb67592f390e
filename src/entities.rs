//! Story entity records as stored in note frontmatter.
//!
//! Every record carries an identity (`id`, falling back to `name`), a display
//! name, optional group memberships and relationship data. Field names follow
//! the camelCase keys used in the stored notes; every relationship-bearing
//! field is optional so a sparse note never fails to load.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four entity collections that feed the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
	Character,
	Location,
	Event,
	Item,
}

impl EntityKind {
	/// All kinds in legend order.
	pub const ALL: [EntityKind; 4] = [
		EntityKind::Character,
		EntityKind::Location,
		EntityKind::Event,
		EntityKind::Item,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			EntityKind::Character => "character",
			EntityKind::Location => "location",
			EntityKind::Event => "event",
			EntityKind::Item => "item",
		}
	}

	/// Plural label used by legends and filter controls.
	pub fn plural_label(self) -> &'static str {
		match self {
			EntityKind::Character => "Characters",
			EntityKind::Location => "Locations",
			EntityKind::Event => "Events",
			EntityKind::Item => "Items",
		}
	}
}

impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for EntityKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"character" | "characters" => Ok(EntityKind::Character),
			"location" | "locations" => Ok(EntityKind::Location),
			"event" | "events" => Ok(EntityKind::Event),
			"item" | "items" => Ok(EntityKind::Item),
			other => Err(format!("unknown entity kind `{other}`")),
		}
	}
}

/// Category of an explicit relationship.
///
/// Unknown strings in stored data deserialize as [`RelationshipType::Custom`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationshipType {
	Ally,
	Enemy,
	Family,
	Rival,
	Romantic,
	Mentor,
	Acquaintance,
	#[default]
	Neutral,
	Custom,
}

impl RelationshipType {
	/// All relationship types in legend order.
	pub const ALL: [RelationshipType; 9] = [
		RelationshipType::Ally,
		RelationshipType::Enemy,
		RelationshipType::Family,
		RelationshipType::Rival,
		RelationshipType::Romantic,
		RelationshipType::Mentor,
		RelationshipType::Acquaintance,
		RelationshipType::Neutral,
		RelationshipType::Custom,
	];

	/// Types that hold in both directions. An edge of one of these types gets
	/// its reverse synthesized during bidirectional closure.
	pub fn is_symmetric(self) -> bool {
		matches!(
			self,
			RelationshipType::Family
				| RelationshipType::Ally
				| RelationshipType::Rival
				| RelationshipType::Romantic
		)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			RelationshipType::Ally => "ally",
			RelationshipType::Enemy => "enemy",
			RelationshipType::Family => "family",
			RelationshipType::Rival => "rival",
			RelationshipType::Romantic => "romantic",
			RelationshipType::Mentor => "mentor",
			RelationshipType::Acquaintance => "acquaintance",
			RelationshipType::Neutral => "neutral",
			RelationshipType::Custom => "custom",
		}
	}
}

impl fmt::Display for RelationshipType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<String> for RelationshipType {
	fn from(value: String) -> Self {
		match value.trim().to_ascii_lowercase().as_str() {
			"ally" => RelationshipType::Ally,
			"enemy" => RelationshipType::Enemy,
			"family" => RelationshipType::Family,
			"rival" => RelationshipType::Rival,
			"romantic" => RelationshipType::Romantic,
			"mentor" => RelationshipType::Mentor,
			"acquaintance" => RelationshipType::Acquaintance,
			"neutral" | "" => RelationshipType::Neutral,
			_ => RelationshipType::Custom,
		}
	}
}

impl From<RelationshipType> for String {
	fn from(value: RelationshipType) -> Self {
		value.as_str().to_string()
	}
}

/// A relationship with an explicit category and optional free-text label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedConnection {
	/// Target entity, by id or display name.
	pub target: String,
	#[serde(rename = "type", default)]
	pub kind: RelationshipType,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,
}

impl TypedConnection {
	pub fn new(target: impl Into<String>, kind: RelationshipType) -> Self {
		Self {
			target: target.into(),
			kind,
			label: None,
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}
}

/// Entry of the legacy `relationships` list on characters.
///
/// Older notes store plain target names; newer ones may store objects in the
/// same list, which keep their declared type and label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyRelationship {
	Name(String),
	Typed(TypedConnection),
}

impl LegacyRelationship {
	/// View this entry as a typed connection; bare names are neutral.
	pub fn to_connection(&self) -> TypedConnection {
		match self {
			LegacyRelationship::Name(target) => {
				TypedConnection::new(target.clone(), RelationshipType::Neutral)
			}
			LegacyRelationship::Typed(connection) => connection.clone(),
		}
	}
}

/// Fields shared by every entity record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityCommon {
	pub id: Option<String>,
	pub name: String,
	pub file_path: Option<String>,
	pub profile_image_path: Option<String>,
	pub description: Option<String>,
	pub groups: Vec<String>,
	pub connections: Vec<TypedConnection>,
}

impl EntityCommon {
	/// Canonical lookup key: the explicit `id` when present, otherwise `name`.
	///
	/// The name fallback is best-effort; two records sharing a display name
	/// without ids collide on this key.
	pub fn key(&self) -> &str {
		match self.id.as_deref() {
			Some(id) if !id.trim().is_empty() => id,
			_ => &self.name,
		}
	}

	/// Whether this record belongs to any of the given groups.
	pub fn in_any_group<'a>(&self, groups: impl IntoIterator<Item = &'a String>) -> bool {
		groups.into_iter().any(|g| self.groups.contains(g))
	}
}

/// A story character.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Character {
	#[serde(flatten)]
	pub common: EntityCommon,
	pub relationships: Vec<LegacyRelationship>,
	pub locations: Vec<String>,
	pub events: Vec<String>,
}

/// A place, optionally nested inside a parent location.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
	#[serde(flatten)]
	pub common: EntityCommon,
	pub parent_location: Option<String>,
}

/// A timeline event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
	#[serde(flatten)]
	pub common: EntityCommon,
	pub date_time: Option<String>,
	pub location: Option<String>,
	pub characters: Vec<String>,
}

/// A plot item or artifact.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlotItem {
	#[serde(flatten)]
	pub common: EntityCommon,
	pub current_owner: Option<String>,
	pub current_location: Option<String>,
	pub associated_events: Vec<String>,
}

/// Any entity, as carried by a graph node.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
	Character(Character),
	Location(Location),
	Event(Event),
	Item(PlotItem),
}

impl Entity {
	pub fn kind(&self) -> EntityKind {
		match self {
			Entity::Character(_) => EntityKind::Character,
			Entity::Location(_) => EntityKind::Location,
			Entity::Event(_) => EntityKind::Event,
			Entity::Item(_) => EntityKind::Item,
		}
	}

	pub fn common(&self) -> &EntityCommon {
		match self {
			Entity::Character(c) => &c.common,
			Entity::Location(l) => &l.common,
			Entity::Event(e) => &e.common,
			Entity::Item(i) => &i.common,
		}
	}

	pub fn key(&self) -> &str {
		self.common().key()
	}

	pub fn name(&self) -> &str {
		&self.common().name
	}
}

macro_rules! impl_from_entity {
	($ty:ty, $variant:ident) => {
		impl From<$ty> for Entity {
			fn from(value: $ty) -> Self {
				Entity::$variant(value)
			}
		}
	};
}

impl_from_entity!(Character, Character);
impl_from_entity!(Location, Location);
impl_from_entity!(Event, Event);
impl_from_entity!(PlotItem, Item);

/// The four entity collections of one story.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoryData {
	pub characters: Vec<Character>,
	pub locations: Vec<Location>,
	pub events: Vec<Event>,
	pub items: Vec<PlotItem>,
}

impl StoryData {
	pub fn is_empty(&self) -> bool {
		self.characters.is_empty()
			&& self.locations.is_empty()
			&& self.events.is_empty()
			&& self.items.is_empty()
	}

	pub fn len(&self) -> usize {
		self.characters.len() + self.locations.len() + self.events.len() + self.items.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legacy_relationships_accept_strings_and_objects() {
		let json = r#"{
			"name": "Aria",
			"relationships": ["Bob", {"target": "Cara", "type": "rival", "label": "old feud"}]
		}"#;
		let character: Character = serde_json::from_str(json).unwrap();

		assert_eq!(character.relationships.len(), 2);
		assert_eq!(
			character.relationships[0].to_connection(),
			TypedConnection::new("Bob", RelationshipType::Neutral)
		);
		let typed = character.relationships[1].to_connection();
		assert_eq!(typed.kind, RelationshipType::Rival);
		assert_eq!(typed.label.as_deref(), Some("old feud"));
	}

	#[test]
	fn unknown_relationship_type_becomes_custom() {
		let connection: TypedConnection =
			serde_json::from_str(r#"{"target": "X", "type": "Sworn Brother"}"#).unwrap();
		assert_eq!(connection.kind, RelationshipType::Custom);

		let untyped: TypedConnection = serde_json::from_str(r#"{"target": "X"}"#).unwrap();
		assert_eq!(untyped.kind, RelationshipType::Neutral);
	}

	#[test]
	fn key_prefers_id_and_falls_back_to_name() {
		let mut common = EntityCommon {
			name: "Castle".into(),
			..Default::default()
		};
		assert_eq!(common.key(), "Castle");

		common.id = Some("  ".into());
		assert_eq!(common.key(), "Castle");

		common.id = Some("loc-1".into());
		assert_eq!(common.key(), "loc-1");
	}

	#[test]
	fn sparse_records_load_with_defaults() {
		let event: Event = serde_json::from_str(r#"{"name": "Coronation"}"#).unwrap();
		assert!(event.date_time.is_none());
		assert!(event.characters.is_empty());
		assert!(event.common.connections.is_empty());

		let item: PlotItem =
			serde_json::from_str(r#"{"name": "Crown", "currentOwner": "Queen Elara"}"#).unwrap();
		assert_eq!(item.current_owner.as_deref(), Some("Queen Elara"));
	}

	#[test]
	fn symmetric_types() {
		let symmetric: Vec<_> = RelationshipType::ALL
			.into_iter()
			.filter(|t| t.is_symmetric())
			.collect();
		assert_eq!(
			symmetric,
			vec![
				RelationshipType::Ally,
				RelationshipType::Family,
				RelationshipType::Rival,
				RelationshipType::Romantic
			]
		);
	}
}
