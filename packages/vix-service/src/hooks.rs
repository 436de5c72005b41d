//! Post-commit dispatch from the host's write path into the index.
//!
//! The host opens a [`PendingChanges`] alongside its own transaction, records each change, and
//! calls [`PendingChanges::commit`] only after its commit succeeded. Rolling back (or dropping)
//! the buffer discards the changes, so listeners never observe uncommitted state.

use std::{collections::HashSet, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt as _;

use vix_domain::{SourceEntity, identity};

use crate::{BoxFuture, Error, SyncOutcome, SyncStatus, VixService};

#[derive(Clone, Debug)]
pub enum EntityChange {
	Saved(SourceEntity),
	Deleted { entity_type: String, object_id: String },
}
impl EntityChange {
	pub fn deleted(entity_type: impl Into<String>, object_id: impl Into<String>) -> Self {
		Self::Deleted { entity_type: entity_type.into(), object_id: object_id.into() }
	}

	fn key(&self) -> (String, String) {
		let (entity_type, object_id) = match self {
			Self::Saved(entity) => (&entity.entity_type, &entity.object_id),
			Self::Deleted { entity_type, object_id } => (entity_type, object_id),
		};

		(entity_type.trim().to_ascii_lowercase(), object_id.trim().to_string())
	}
}

/// Callback run once per committed change.
pub trait CommitListener
where
	Self: Send + Sync,
{
	fn on_commit<'a>(&'a self, change: &'a EntityChange) -> BoxFuture<'a, ()>;
}

#[derive(Clone, Default)]
pub struct CommitHooks {
	listeners: Vec<Arc<dyn CommitListener>>,
}
impl CommitHooks {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, listener: Arc<dyn CommitListener>) {
		self.listeners.push(listener);
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}

	pub fn begin(&self) -> PendingChanges {
		PendingChanges { hooks: self.clone(), changes: Vec::new() }
	}
}

pub struct PendingChanges {
	hooks: CommitHooks,
	changes: Vec<EntityChange>,
}
impl PendingChanges {
	pub fn record(&mut self, change: EntityChange) {
		self.changes.push(change);
	}

	pub fn saved(&mut self, entity: SourceEntity) {
		self.record(EntityChange::Saved(entity));
	}

	pub fn deleted(&mut self, entity_type: impl Into<String>, object_id: impl Into<String>) {
		self.record(EntityChange::deleted(entity_type, object_id));
	}

	pub fn len(&self) -> usize {
		self.changes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}

	/// Runs every listener for every change, in commit order. Repeated changes to one entity
	/// collapse into the last one. Returns the number of changes dispatched.
	pub async fn commit(self) -> usize {
		let changes = coalesce(self.changes);

		for change in &changes {
			for listener in &self.hooks.listeners {
				listener.on_commit(change).await;
			}
		}

		changes.len()
	}

	pub fn rollback(self) {
		if !self.changes.is_empty() {
			tracing::debug!(discarded = self.changes.len(), "Discarded uncommitted index changes.");
		}
	}
}

/// Binds committed changes to the sync coordinator. Failures never reach the host: every error
/// and every panic inside the sync becomes a logged `failed` outcome.
#[derive(Clone)]
pub struct IndexSyncListener {
	service: Arc<VixService>,
}
impl IndexSyncListener {
	pub fn new(service: Arc<VixService>) -> Self {
		Self { service }
	}

	pub async fn apply(&self, change: &EntityChange) -> SyncOutcome {
		match AssertUnwindSafe(self.dispatch(change)).catch_unwind().await {
			Ok(outcome) => outcome,
			Err(panic) => {
				let message = panic_message(panic.as_ref());
				let (entity_type, object_id) = change.key();

				tracing::error!(
					entity_type = %entity_type,
					object_id = %object_id,
					panic = %message,
					"Post-commit sync panicked. The primary write is unaffected."
				);

				let backend_id = identity::backend_id(&entity_type, &object_id);

				SyncOutcome::new(&entity_type, &object_id, Some(backend_id), SyncStatus::Failed)
					.with_reason(format!("Sync panicked: {message}"))
			},
		}
	}

	async fn dispatch(&self, change: &EntityChange) -> SyncOutcome {
		match change {
			EntityChange::Saved(entity) => match self.service.sync_entity(entity).await {
				Ok(outcome) => outcome,
				Err(err) => {
					if matches!(err, Error::BackendUnavailable { .. }) {
						tracing::debug!(
							entity_type = %entity.entity_type,
							object_id = %entity.object_id,
							error = %err,
							"Skipped post-commit sync."
						);
					} else {
						tracing::warn!(
							entity_type = %entity.entity_type,
							object_id = %entity.object_id,
							error = %err,
							"Post-commit sync failed. The primary write is unaffected."
						);
					}

					let backend_id = identity::backend_id(&entity.entity_type, &entity.object_id);

					SyncOutcome::new(
						&entity.entity_type,
						&entity.object_id,
						Some(backend_id),
						SyncStatus::Failed,
					)
					.with_reason(err.to_string())
				},
			},
			EntityChange::Deleted { entity_type, object_id } =>
				self.service.delete_entity(entity_type, object_id).await,
		}
	}
}
impl CommitListener for IndexSyncListener {
	fn on_commit<'a>(&'a self, change: &'a EntityChange) -> BoxFuture<'a, ()> {
		Box::pin(async move {
			let _ = self.apply(change).await;
		})
	}
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		return (*message).to_string();
	}
	if let Some(message) = panic.downcast_ref::<String>() {
		return message.clone();
	}

	"non-string panic payload".to_string()
}

fn coalesce(changes: Vec<EntityChange>) -> Vec<EntityChange> {
	let mut seen = HashSet::new();
	let mut kept = changes
		.into_iter()
		.rev()
		.filter(|change| seen.insert(change.key()))
		.collect::<Vec<_>>();

	kept.reverse();

	kept
}
