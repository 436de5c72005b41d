use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use vix_domain::{EntityKind, SourceEntity};

use crate::{Error, Result, SyncStatus, VixService};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
	pub created: u64,
	pub updated: u64,
	pub skipped: u64,
	pub failed: u64,
}
impl TypeCounts {
	fn record(&mut self, status: SyncStatus) {
		match status {
			SyncStatus::Created => self.created += 1,
			SyncStatus::Updated => self.updated += 1,
			SyncStatus::SkippedExcluded => self.skipped += 1,
			SyncStatus::Deleted => {},
			SyncStatus::Failed => self.failed += 1,
		}
	}

	pub fn total(&self) -> u64 {
		self.created + self.updated + self.skipped + self.failed
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
	pub entity_type: String,
	pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResyncReport {
	pub project_id: String,
	pub counts: BTreeMap<String, TypeCounts>,
	pub cancelled: bool,
	pub source_errors: Vec<SourceFailure>,
}
impl ResyncReport {
	pub fn totals(&self) -> TypeCounts {
		self.counts.values().fold(TypeCounts::default(), |acc, counts| TypeCounts {
			created: acc.created + counts.created,
			updated: acc.updated + counts.updated,
			skipped: acc.skipped + counts.skipped,
			failed: acc.failed + counts.failed,
		})
	}
}

impl VixService {
	/// Re-syncs a project and every in-scope entity of every registered kind.
	///
	/// Entities are processed one at a time. `cancel` is checked between entities, and a
	/// cancelled run returns what it accumulated with `cancelled` set. Per-entity failures only
	/// bump counters; an unavailable backend fails the run before anything is touched.
	pub async fn resync(
		&self,
		project_id: &str,
		cancel: &CancellationToken,
	) -> Result<ResyncReport> {
		let project_id = project_id.trim();

		if project_id.is_empty() {
			return Err(Error::InvalidRequest {
				message: "project_id must be non-empty.".to_string(),
			});
		}

		self.backend.ensure_ready().await?;

		let mut report = ResyncReport { project_id: project_id.to_string(), ..Default::default() };

		tracing::info!(project_id = %project_id, "Resync started.");

		'kinds: for kind in self.registry.kinds() {
			if cancel.is_cancelled() {
				report.cancelled = true;

				break;
			}

			let entities = match self.entities_for(project_id, kind).await {
				Ok(entities) => entities,
				Err(err) => {
					tracing::warn!(
						project_id = %project_id,
						entity_type = %kind,
						error = %err,
						"Failed to list entities for resync."
					);
					report.source_errors.push(SourceFailure {
						entity_type: kind.to_string(),
						message: err.to_string(),
					});

					continue;
				},
			};
			let counts = report.counts.entry(kind.to_string()).or_default();

			for entity in entities {
				if cancel.is_cancelled() {
					report.cancelled = true;

					break 'kinds;
				}

				match self.sync_entity(&entity).await {
					Ok(outcome) => counts.record(outcome.status),
					Err(err) => {
						tracing::debug!(
							entity_type = %entity.entity_type,
							object_id = %entity.object_id,
							error = %err,
							"Resync entity failed."
						);

						counts.failed += 1;
					},
				}
			}
		}

		let totals = report.totals();

		tracing::info!(
			project_id = %project_id,
			created = totals.created,
			updated = totals.updated,
			skipped = totals.skipped,
			failed = totals.failed,
			cancelled = report.cancelled,
			"Resync finished."
		);

		Ok(report)
	}

	async fn entities_for(&self, project_id: &str, kind: EntityKind) -> Result<Vec<SourceEntity>> {
		match kind {
			EntityKind::Project => Ok(self
				.source
				.fetch(kind.as_str(), project_id)
				.await?
				.into_iter()
				.collect()),
			_ => self.source.list_in_project(project_id, kind).await,
		}
	}
}
