use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vix_domain::{EntityKind, IndexDocument, SourceEntity, identity};

use crate::{Error, Result, SyncOutcome, VixService};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
	pub entity_type: String,
	pub object_id: String,
	pub backend_id: Uuid,
	pub exists: bool,
	pub excluded: bool,
	pub reason: Option<String>,
	/// Whether the indexed content differs from what the entity serializes to now. `None` when
	/// nothing is indexed or the comparison could not be made.
	pub stale: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DocumentLookup {
	Present { document: IndexDocument },
	Absent,
	Excluded { reason: Option<String> },
}

/// Answer to [`VixService::exists`]. Exclusion is reported on its own, never folded into
/// `Absent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Existence {
	Indexed,
	Absent,
	Excluded { reason: Option<String> },
}
impl Existence {
	pub fn is_indexed(&self) -> bool {
		matches!(self, Self::Indexed)
	}
}

impl VixService {
	pub async fn exists(&self, entity_type: &str, object_id: &str) -> Result<Existence> {
		Ok(match self.get_current_document(entity_type, object_id).await? {
			DocumentLookup::Present { .. } => Existence::Indexed,
			DocumentLookup::Absent => Existence::Absent,
			DocumentLookup::Excluded { reason } => Existence::Excluded { reason },
		})
	}

	pub async fn status(&self, entity_type: &str, object_id: &str) -> Result<IndexStatus> {
		let (kind, entity) = self.load_entity(entity_type, object_id).await?;
		let backend_id = identity::backend_id(kind.as_str(), &entity.object_id);
		let decision = self.exclusion.evaluate(&entity);
		let mut status = IndexStatus {
			entity_type: kind.to_string(),
			object_id: entity.object_id.trim().to_string(),
			backend_id,
			exists: false,
			excluded: decision.excluded,
			reason: decision.reason,
			stale: None,
		};

		if status.excluded {
			return Ok(status);
		}

		if let Some(current) = self.backend.get(backend_id).await? {
			status.exists = true;
			status.stale = self
				.registry
				.serialize(&entity)
				.ok()
				.map(|fresh| fresh.content_hash != current.content_hash);
		}

		Ok(status)
	}

	pub async fn get_current_document(
		&self,
		entity_type: &str,
		object_id: &str,
	) -> Result<DocumentLookup> {
		let (kind, entity) = self.load_entity(entity_type, object_id).await?;
		let decision = self.exclusion.evaluate(&entity);

		if decision.excluded {
			return Ok(DocumentLookup::Excluded { reason: decision.reason });
		}

		let backend_id = identity::backend_id(kind.as_str(), &entity.object_id);

		Ok(match self.backend.get(backend_id).await? {
			Some(document) => DocumentLookup::Present { document },
			None => DocumentLookup::Absent,
		})
	}

	/// Synchronous push of one entity. Unlike the post-commit path, errors are returned to the
	/// caller.
	pub async fn force_push(&self, entity_type: &str, object_id: &str) -> Result<SyncOutcome> {
		let (_, entity) = self.load_entity(entity_type, object_id).await?;

		self.sync_entity(&entity).await
	}

	async fn load_entity(
		&self,
		entity_type: &str,
		object_id: &str,
	) -> Result<(EntityKind, SourceEntity)> {
		let kind = self.registry.resolve(entity_type)?;
		let object_id = object_id.trim();

		if object_id.is_empty() {
			return Err(Error::InvalidRequest { message: "object_id must be non-empty.".to_string() });
		}

		let entity = self.source.fetch(kind.as_str(), object_id).await?.ok_or_else(|| {
			Error::NotFound { message: format!("{kind} {object_id} does not exist in the source.") }
		})?;

		Ok((kind, entity))
	}
}
