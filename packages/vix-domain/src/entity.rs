use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Project,
	Item,
	Comment,
	Attachment,
	Release,
	Change,
	Node,
	ExternalMapping,
}
impl EntityKind {
	pub const ALL: [EntityKind; 8] = [
		EntityKind::Project,
		EntityKind::Item,
		EntityKind::Comment,
		EntityKind::Attachment,
		EntityKind::Release,
		EntityKind::Change,
		EntityKind::Node,
		EntityKind::ExternalMapping,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Project => "project",
			Self::Item => "item",
			Self::Comment => "comment",
			Self::Attachment => "attachment",
			Self::Release => "release",
			Self::Change => "change",
			Self::Node => "node",
			Self::ExternalMapping => "external_mapping",
		}
	}

	/// Accepts the canonical tag in any case, surrounded by whitespace.
	pub fn parse(raw: &str) -> Option<Self> {
		let tag = raw.trim().to_ascii_lowercase();

		Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
	}
}
impl fmt::Display for EntityKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
	pub entity_type: String,
	pub object_id: String,
}

/// A timestamp as the source store handed it over. Naive values carry no zone and are resolved
/// against the configured source offset during serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceTimestamp {
	Zoned(OffsetDateTime),
	Naive(PrimitiveDateTime),
}
impl From<OffsetDateTime> for SourceTimestamp {
	fn from(value: OffsetDateTime) -> Self {
		Self::Zoned(value)
	}
}
impl From<PrimitiveDateTime> for SourceTimestamp {
	fn from(value: PrimitiveDateTime) -> Self {
		Self::Naive(value)
	}
}

/// Read-only view of one row in the tracker's store.
#[derive(Clone, Debug)]
pub struct SourceEntity {
	pub entity_type: String,
	pub object_id: String,
	pub project_id: Option<String>,
	pub parent: Option<EntityRef>,
	pub attributes: Map<String, Value>,
	pub created_at: Option<SourceTimestamp>,
	pub updated_at: Option<SourceTimestamp>,
}
impl SourceEntity {
	pub fn new(entity_type: impl Into<String>, object_id: impl Into<String>) -> Self {
		Self {
			entity_type: entity_type.into(),
			object_id: object_id.into(),
			project_id: None,
			parent: None,
			attributes: Map::new(),
			created_at: None,
			updated_at: None,
		}
	}

	pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
		self.project_id = Some(project_id.into());

		self
	}

	pub fn with_parent(
		mut self,
		entity_type: impl Into<String>,
		object_id: impl Into<String>,
	) -> Self {
		self.parent =
			Some(EntityRef { entity_type: entity_type.into(), object_id: object_id.into() });

		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.attributes.insert(key.into(), value.into());

		self
	}

	pub fn with_timestamps(
		mut self,
		created_at: impl Into<SourceTimestamp>,
		updated_at: impl Into<SourceTimestamp>,
	) -> Self {
		self.created_at = Some(created_at.into());
		self.updated_at = Some(updated_at.into());

		self
	}

	pub fn kind(&self) -> Option<EntityKind> {
		EntityKind::parse(&self.entity_type)
	}

	/// Attribute rendered as trimmed text. Numbers and booleans are stringified, empty strings
	/// and structured values yield `None`.
	pub fn text(&self, key: &str) -> Option<String> {
		let text = match self.attributes.get(key)? {
			Value::String(text) => text.trim().to_string(),
			Value::Number(number) => number.to_string(),
			Value::Bool(flag) => flag.to_string(),
			_ => return None,
		};

		if text.is_empty() { None } else { Some(text) }
	}

	/// Resolves the value used by exclusion rules: relation pseudo-attributes first, then the
	/// attribute bag.
	pub fn lookup(&self, key: &str) -> Option<String> {
		match key {
			"parent_type" => self.parent.as_ref().map(|parent| parent.entity_type.clone()),
			"parent_id" => self.parent.as_ref().map(|parent| parent.object_id.clone()),
			"project_id" => self.project_id.clone(),
			_ => self.text(key),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_parse_is_case_and_whitespace_insensitive() {
		assert_eq!(EntityKind::parse(" Item "), Some(EntityKind::Item));
		assert_eq!(EntityKind::parse("EXTERNAL_MAPPING"), Some(EntityKind::ExternalMapping));
		assert_eq!(EntityKind::parse("wiki"), None);
	}

	#[test]
	fn kind_tags_match_configured_types() {
		let tags: Vec<&str> = EntityKind::ALL.iter().map(|kind| kind.as_str()).collect();

		assert_eq!(tags, vix_config::ENTITY_TYPES.to_vec());
	}

	#[test]
	fn text_skips_blank_and_structured_values() {
		let entity = SourceEntity::new("item", "1")
			.with_attribute("title", "  ")
			.with_attribute("number", 7)
			.with_attribute("labels", serde_json::json!(["a"]));

		assert_eq!(entity.text("title"), None);
		assert_eq!(entity.text("number").as_deref(), Some("7"));
		assert_eq!(entity.text("labels"), None);
	}
}
