use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Canonical record stored in the vector backend, one per `(entity_type, object_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
	pub backend_id: Uuid,
	pub entity_type: String,
	pub object_id: String,
	pub project_id: Option<String>,
	pub parent_type: Option<String>,
	pub parent_object_id: Option<String>,
	pub title: String,
	pub url: Option<String>,
	pub role: Option<String>,
	pub status: Option<String>,
	pub primary_text: String,
	#[serde(default)]
	pub fields: BTreeMap<String, String>,
	pub content_hash: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_at: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
}
impl IndexDocument {
	/// Text handed to the embedder and the keyword index.
	pub fn search_text(&self) -> String {
		if self.title.is_empty() {
			return self.primary_text.clone();
		}
		if self.primary_text.is_empty() {
			return self.title.clone();
		}

		format!("{}\n\n{}", self.title, self.primary_text)
	}
}

/// BLAKE3 over the fields that describe content, so a timestamp-only touch does not read as a
/// content change.
pub fn content_hash(title: &str, primary_text: &str, fields: &BTreeMap<String, String>) -> String {
	let mut hasher = blake3::Hasher::new();

	hasher.update(title.as_bytes());
	hasher.update(&[0]);
	hasher.update(primary_text.as_bytes());

	for (key, value) in fields {
		hasher.update(&[0]);
		hasher.update(key.as_bytes());
		hasher.update(&[1]);
		hasher.update(value.as_bytes());
	}

	hasher.finalize().to_hex().to_string()
}
