use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vix_domain::{SourceEntity, identity};

use crate::{Error, Result, VixService};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
	Created,
	Updated,
	Deleted,
	SkippedExcluded,
	Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
	pub entity_type: String,
	pub object_id: String,
	pub backend_id: Option<Uuid>,
	pub status: SyncStatus,
	pub reason: Option<String>,
}
impl SyncOutcome {
	pub fn new(
		entity_type: &str,
		object_id: &str,
		backend_id: Option<Uuid>,
		status: SyncStatus,
	) -> Self {
		Self {
			entity_type: entity_type.trim().to_ascii_lowercase(),
			object_id: object_id.trim().to_string(),
			backend_id,
			status,
			reason: None,
		}
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}
}

impl VixService {
	/// Mirrors one entity into the index.
	///
	/// Excluded entities are reported as skipped without any backend traffic. Otherwise the
	/// document is replaced in place, and only a confirmed not-found falls through to create.
	/// Every other backend failure is logged and returned; nothing is created after it.
	pub async fn sync_entity(&self, entity: &SourceEntity) -> Result<SyncOutcome> {
		let decision = self.exclusion.evaluate(entity);

		if decision.excluded {
			let reason = decision.reason.unwrap_or_default();

			tracing::info!(
				entity_type = %entity.entity_type,
				object_id = %entity.object_id,
				reason = %reason,
				"Entity excluded from the index."
			);

			let backend_id = identity::backend_id(&entity.entity_type, &entity.object_id);

			return Ok(SyncOutcome::new(
				&entity.entity_type,
				&entity.object_id,
				Some(backend_id),
				SyncStatus::SkippedExcluded,
			)
			.with_reason(reason));
		}

		let doc = self.registry.serialize(entity)?;
		let backend_id = doc.backend_id;
		let prepared = match self.backend.prepare(doc).await {
			Ok(prepared) => prepared,
			Err(err) => {
				log_backend_failure(
					&entity.entity_type,
					&entity.object_id,
					backend_id,
					"prepare",
					&err,
				);

				return Err(err);
			},
		};
		let doc = &prepared.document;

		match self.backend.replace(&prepared).await {
			Ok(()) => {
				tracing::debug!(
					entity_type = %doc.entity_type,
					object_id = %doc.object_id,
					backend_id = %doc.backend_id,
					"Index document replaced."
				);

				Ok(SyncOutcome::new(
					&doc.entity_type,
					&doc.object_id,
					Some(doc.backend_id),
					SyncStatus::Updated,
				))
			},
			Err(Error::NotFound { .. }) => {
				if let Err(err) = self.backend.create(&prepared).await {
					log_backend_failure(
						&doc.entity_type,
						&doc.object_id,
						doc.backend_id,
						"create",
						&err,
					);

					return Err(err);
				}

				tracing::info!(
					entity_type = %doc.entity_type,
					object_id = %doc.object_id,
					backend_id = %doc.backend_id,
					"Index document created."
				);

				Ok(SyncOutcome::new(
					&doc.entity_type,
					&doc.object_id,
					Some(doc.backend_id),
					SyncStatus::Created,
				))
			},
			Err(err) => {
				log_backend_failure(
					&doc.entity_type,
					&doc.object_id,
					doc.backend_id,
					"replace",
					&err,
				);

				Err(err)
			},
		}
	}

	/// Removes the document for a deleted entity. An absent document counts as deleted; any
	/// other failure is logged and reported, never raised.
	pub async fn delete_entity(&self, entity_type: &str, object_id: &str) -> SyncOutcome {
		let kind = match self.registry.resolve(entity_type) {
			Ok(kind) => kind,
			Err(err) => {
				return SyncOutcome::new(entity_type, object_id, None, SyncStatus::Failed)
					.with_reason(err.to_string());
			},
		};
		let backend_id = identity::backend_id(kind.as_str(), object_id);
		let outcome =
			SyncOutcome::new(kind.as_str(), object_id, Some(backend_id), SyncStatus::Deleted);

		match self.backend.delete(backend_id).await {
			Ok(()) => outcome,
			Err(Error::NotFound { .. }) => {
				tracing::debug!(
					entity_type = %outcome.entity_type,
					object_id = %outcome.object_id,
					backend_id = %backend_id,
					"Index document already absent."
				);

				outcome
			},
			Err(err) => {
				log_backend_failure(kind.as_str(), object_id, backend_id, "delete", &err);

				SyncOutcome { status: SyncStatus::Failed, ..outcome }.with_reason(err.to_string())
			},
		}
	}
}

fn log_backend_failure(
	entity_type: &str,
	object_id: &str,
	backend_id: Uuid,
	operation: &str,
	err: &Error,
) {
	if matches!(err, Error::BackendUnavailable { .. }) {
		tracing::warn!(
			entity_type = %entity_type,
			object_id = %object_id,
			backend_id = %backend_id,
			operation = %operation,
			error = %err,
			"Index backend unavailable."
		);
	} else {
		tracing::error!(
			entity_type = %entity_type,
			object_id = %object_id,
			backend_id = %backend_id,
			operation = %operation,
			error = %err,
			"Index backend operation failed."
		);
	}
}
