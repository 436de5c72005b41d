//! Per-kind mapping from source rows to index documents.
//!
//! Each serializer only extracts kind-specific content into a [`DocumentDraft`]. The registry
//! owns everything shared: identity, relation flattening, timestamp normalization, truncation
//! and hashing.

use std::collections::BTreeMap;

use time::{OffsetDateTime, UtcOffset};

use crate::{
	EntityKind, IndexDocument, SerializeError, SourceEntity, SourceTimestamp, document, identity,
	time_serde, timestamp,
};

pub type SerializeFn = fn(&SourceEntity, &SerializeContext) -> crate::Result<DocumentDraft>;

#[derive(Clone, Debug)]
pub struct SerializeContext {
	pub naive_offset: UtcOffset,
	pub base_url: Option<String>,
	pub max_primary_chars: usize,
}
impl SerializeContext {
	pub fn from_config(cfg: &vix_config::Documents) -> Self {
		Self {
			naive_offset: timestamp::offset_from_config(&cfg.naive_utc_offset),
			base_url: cfg.base_url.clone(),
			max_primary_chars: cfg.max_primary_chars as usize,
		}
	}
}
impl Default for SerializeContext {
	fn default() -> Self {
		Self::from_config(&vix_config::Documents::default())
	}
}

/// Kind-specific content. `url` is either a path below the configured base URL or an absolute
/// URL that is kept as is.
#[derive(Clone, Debug, Default)]
pub struct DocumentDraft {
	pub title: String,
	pub primary_text: String,
	pub url: Option<String>,
	pub role: Option<String>,
	pub status: Option<String>,
	pub fields: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct SerializerRegistry {
	ctx: SerializeContext,
	serializers: BTreeMap<EntityKind, SerializeFn>,
}
impl SerializerRegistry {
	pub fn empty(ctx: SerializeContext) -> Self {
		Self { ctx, serializers: BTreeMap::new() }
	}

	pub fn builtin(ctx: SerializeContext) -> Self {
		let mut registry = Self::empty(ctx);

		registry.register(EntityKind::Project, serialize_project);
		registry.register(EntityKind::Item, serialize_item);
		registry.register(EntityKind::Comment, serialize_comment);
		registry.register(EntityKind::Attachment, serialize_attachment);
		registry.register(EntityKind::Release, serialize_release);
		registry.register(EntityKind::Change, serialize_change);
		registry.register(EntityKind::Node, serialize_node);
		registry.register(EntityKind::ExternalMapping, serialize_external_mapping);

		registry
	}

	pub fn register(&mut self, kind: EntityKind, serializer: SerializeFn) {
		self.serializers.insert(kind, serializer);
	}

	pub fn remove(&mut self, kind: EntityKind) {
		self.serializers.remove(&kind);
	}

	pub fn context(&self) -> &SerializeContext {
		&self.ctx
	}

	/// Registered kinds in their canonical order.
	pub fn kinds(&self) -> Vec<EntityKind> {
		self.serializers.keys().copied().collect()
	}

	pub fn supports(&self, entity_type: &str) -> bool {
		EntityKind::parse(entity_type).map(|kind| self.serializers.contains_key(&kind)).unwrap_or(false)
	}

	pub fn resolve(&self, entity_type: &str) -> crate::Result<EntityKind> {
		EntityKind::parse(entity_type)
			.filter(|kind| self.serializers.contains_key(kind))
			.ok_or_else(|| SerializeError::UnsupportedType {
				entity_type: entity_type.trim().to_string(),
			})
	}

	pub fn serialize(&self, entity: &SourceEntity) -> crate::Result<IndexDocument> {
		let kind = self.resolve(&entity.entity_type)?;
		let serializer = self.serializers[&kind];
		let object_id = entity.object_id.trim();

		if object_id.is_empty() {
			return Err(SerializeError::InvalidEntity {
				entity_type: kind.to_string(),
				object_id: String::new(),
				message: "object_id must be non-empty.".to_string(),
			});
		}

		let draft = serializer(entity, &self.ctx)?;
		let project_id = match kind {
			EntityKind::Project => Some(object_id.to_string()),
			_ => non_empty(entity.project_id.as_deref()),
		};
		let (parent_type, parent_object_id) = match entity.parent.as_ref() {
			Some(parent) => (
				non_empty(Some(parent.entity_type.as_str())).map(|tag| tag.to_ascii_lowercase()),
				non_empty(Some(parent.object_id.as_str())),
			),
			None => (None, None),
		};
		let title = draft.title.trim().to_string();
		let primary_text = truncate_chars(draft.primary_text.trim(), self.ctx.max_primary_chars);
		let content_hash = document::content_hash(&title, &primary_text, &draft.fields);
		let created_at = self.zoned(kind, object_id, "created_at", entity.created_at)?;
		let updated_at = self.zoned(kind, object_id, "updated_at", entity.updated_at)?;

		Ok(IndexDocument {
			backend_id: identity::backend_id(kind.as_str(), object_id),
			entity_type: kind.as_str().to_string(),
			object_id: object_id.to_string(),
			project_id,
			parent_type,
			parent_object_id,
			title,
			url: draft.url.map(|url| self.absolute_url(url)),
			role: draft.role,
			status: draft.status,
			primary_text,
			fields: draft.fields,
			content_hash,
			created_at,
			updated_at,
		})
	}

	/// Places a source timestamp in its zone and checks that it can be written as UTC.
	fn zoned(
		&self,
		kind: EntityKind,
		object_id: &str,
		field: &str,
		ts: Option<SourceTimestamp>,
	) -> crate::Result<Option<OffsetDateTime>> {
		let Some(ts) = ts else { return Ok(None) };
		let value = timestamp::resolve(ts, self.ctx.naive_offset);

		time_serde::format(&value).map_err(|err| SerializeError::InvalidEntity {
			entity_type: kind.to_string(),
			object_id: object_id.to_string(),
			message: format!("{field}: {err}"),
		})?;

		Ok(Some(value))
	}

	fn absolute_url(&self, url: String) -> String {
		if url.starts_with("http://") || url.starts_with("https://") {
			return url;
		}

		match self.ctx.base_url.as_deref() {
			Some(base) => format!("{base}{url}"),
			None => url,
		}
	}
}

fn serialize_project(
	entity: &SourceEntity,
	ctx: &SerializeContext,
) -> crate::Result<DocumentDraft> {
	let mut draft = DocumentDraft {
		title: first_text(entity, &["name", "title", "key"])
			.unwrap_or_else(|| format!("Project {}", entity.object_id.trim())),
		primary_text: first_text(entity, &["description", "summary"]).unwrap_or_default(),
		url: Some(format!("/projects/{}", entity.object_id.trim())),
		status: entity.text("status"),
		..Default::default()
	};

	copy_fields(entity, &mut draft.fields, &["key", "owner"]);
	timestamp_fields(entity, ctx, &mut draft.fields, &["archived_at"]);

	Ok(draft)
}

fn serialize_item(entity: &SourceEntity, ctx: &SerializeContext) -> crate::Result<DocumentDraft> {
	let mut draft = DocumentDraft {
		title: first_text(entity, &["title", "summary"])
			.unwrap_or_else(|| format!("Item {}", entity.object_id.trim())),
		primary_text: first_text(entity, &["description", "body"]).unwrap_or_default(),
		url: Some(format!("/items/{}", entity.object_id.trim())),
		status: entity.text("status"),
		..Default::default()
	};

	if let Some(item_type) = first_text(entity, &["item_type", "type"]) {
		draft.fields.insert("item_type".to_string(), item_type);
	}

	copy_fields(entity, &mut draft.fields, &["key", "priority", "assignee", "reporter", "labels"]);
	timestamp_fields(entity, ctx, &mut draft.fields, &["due_at", "closed_at"]);

	Ok(draft)
}

fn serialize_comment(
	entity: &SourceEntity,
	_ctx: &SerializeContext,
) -> crate::Result<DocumentDraft> {
	let object_id = entity.object_id.trim();
	let title = match (entity.text("subject"), entity.parent.as_ref()) {
		(Some(subject), _) => subject,
		(None, Some(parent)) => format!("Comment on {} {}", parent.entity_type, parent.object_id),
		(None, None) => format!("Comment {object_id}"),
	};
	let url = match entity.parent.as_ref() {
		Some(parent) if EntityKind::parse(&parent.entity_type) == Some(EntityKind::Item) =>
			format!("/items/{}#comment-{object_id}", parent.object_id),
		_ => format!("/comments/{object_id}"),
	};
	let mut draft = DocumentDraft {
		title,
		primary_text: first_text(entity, &["body", "text"]).unwrap_or_default(),
		url: Some(url),
		..Default::default()
	};

	copy_fields(entity, &mut draft.fields, &["author"]);

	Ok(draft)
}

fn serialize_attachment(
	entity: &SourceEntity,
	_ctx: &SerializeContext,
) -> crate::Result<DocumentDraft> {
	let mut draft = DocumentDraft {
		title: first_text(entity, &["filename", "name", "title"])
			.unwrap_or_else(|| format!("Attachment {}", entity.object_id.trim())),
		primary_text: first_text(entity, &["extracted_text", "content_text", "description"])
			.unwrap_or_default(),
		url: Some(format!("/attachments/{}", entity.object_id.trim())),
		role: entity.text("role").map(|role| role.to_ascii_lowercase()),
		..Default::default()
	};

	copy_fields(
		entity,
		&mut draft.fields,
		&["filename", "content_type", "size_bytes", "target_kind", "uploaded_by"],
	);

	Ok(draft)
}

fn serialize_release(
	entity: &SourceEntity,
	ctx: &SerializeContext,
) -> crate::Result<DocumentDraft> {
	let version = entity.text("version");
	let title = first_text(entity, &["name", "title"])
		.or_else(|| version.as_ref().map(|version| format!("Release {version}")))
		.unwrap_or_else(|| format!("Release {}", entity.object_id.trim()));
	let mut draft = DocumentDraft {
		title,
		primary_text: first_text(entity, &["notes", "description"]).unwrap_or_default(),
		url: Some(format!("/releases/{}", entity.object_id.trim())),
		status: entity.text("status"),
		..Default::default()
	};

	copy_fields(entity, &mut draft.fields, &["version"]);
	timestamp_fields(entity, ctx, &mut draft.fields, &["planned_at", "released_at"]);

	Ok(draft)
}

fn serialize_change(entity: &SourceEntity, ctx: &SerializeContext) -> crate::Result<DocumentDraft> {
	let mut sections = Vec::new();

	if let Some(description) = first_text(entity, &["description", "summary"]) {
		sections.push(description);
	}
	for (key, label) in [("impact", "Impact"), ("rollback_plan", "Rollback plan")] {
		if let Some(value) = entity.text(key) {
			sections.push(format!("{label}: {value}"));
		}
	}

	let mut draft = DocumentDraft {
		title: first_text(entity, &["title", "name"])
			.unwrap_or_else(|| format!("Change {}", entity.object_id.trim())),
		primary_text: sections.join("\n\n"),
		url: Some(format!("/changes/{}", entity.object_id.trim())),
		status: entity.text("status"),
		..Default::default()
	};

	copy_fields(entity, &mut draft.fields, &["change_type", "risk", "requested_by"]);
	timestamp_fields(entity, ctx, &mut draft.fields, &["planned_start", "planned_end"]);

	Ok(draft)
}

fn serialize_node(entity: &SourceEntity, _ctx: &SerializeContext) -> crate::Result<DocumentDraft> {
	let mut draft = DocumentDraft {
		title: first_text(entity, &["title", "name"])
			.unwrap_or_else(|| format!("Node {}", entity.object_id.trim())),
		primary_text: first_text(entity, &["description", "content"]).unwrap_or_default(),
		url: Some(format!("/nodes/{}", entity.object_id.trim())),
		status: entity.text("status"),
		..Default::default()
	};

	copy_fields(entity, &mut draft.fields, &["node_type", "path"]);

	Ok(draft)
}

fn serialize_external_mapping(
	entity: &SourceEntity,
	_ctx: &SerializeContext,
) -> crate::Result<DocumentDraft> {
	let repo = entity.text("repo");
	let number = entity.text("number");
	let title = first_text(entity, &["title"])
		.or_else(|| match (repo.as_deref(), number.as_deref()) {
			(Some(repo), Some(number)) => Some(format!("{repo}#{number}")),
			_ => None,
		})
		.unwrap_or_else(|| format!("External mapping {}", entity.object_id.trim()));
	let mut draft = DocumentDraft {
		title,
		primary_text: first_text(entity, &["body", "description"]).unwrap_or_default(),
		url: entity
			.text("external_url")
			.or_else(|| Some(format!("/external/{}", entity.object_id.trim()))),
		status: entity.text("state"),
		..Default::default()
	};

	draft.fields.insert(
		"provider".to_string(),
		entity.text("provider").unwrap_or_else(|| "github".to_string()),
	);
	copy_fields(entity, &mut draft.fields, &["repo", "number", "external_kind", "external_url"]);

	Ok(draft)
}

fn first_text(entity: &SourceEntity, keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|key| entity.text(key))
}

fn copy_fields(entity: &SourceEntity, fields: &mut BTreeMap<String, String>, keys: &[&str]) {
	for key in keys {
		let value = match entity.attributes.get(*key) {
			Some(serde_json::Value::Array(values)) => {
				let joined = values
					.iter()
					.filter_map(|value| value.as_str().map(str::trim))
					.filter(|value| !value.is_empty())
					.collect::<Vec<_>>()
					.join(", ");

				if joined.is_empty() { None } else { Some(joined) }
			},
			_ => entity.text(key),
		};

		if let Some(value) = value {
			fields.insert((*key).to_string(), value);
		}
	}
}

/// Timestamp attributes are re-emitted as UTC RFC 3339. Values that do not parse are dropped
/// rather than forwarded as ambiguous text.
fn timestamp_fields(
	entity: &SourceEntity,
	ctx: &SerializeContext,
	fields: &mut BTreeMap<String, String>,
	keys: &[&str],
) {
	for key in keys {
		let Some(raw) = entity.text(key) else { continue };
		let Some(value) = timestamp::parse_attribute(&raw, ctx.naive_offset) else { continue };

		if let Ok(formatted) = time_serde::format(&value) {
			fields.insert((*key).to_string(), formatted);
		}
	}
}

fn non_empty(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => text[..idx].to_string(),
		None => text.to_string(),
	}
}
