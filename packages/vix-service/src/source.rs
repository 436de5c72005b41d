use std::{collections::BTreeMap, sync::RwLock};

use vix_domain::{EntityKind, SourceEntity};
use vix_storage::source::PgEntitySource;

use crate::{BoxFuture, EntitySource, Error, Result};

impl EntitySource for PgEntitySource {
	fn fetch<'a>(
		&'a self,
		entity_type: &'a str,
		object_id: &'a str,
	) -> BoxFuture<'a, Result<Option<SourceEntity>>> {
		Box::pin(async move {
			PgEntitySource::fetch(self, entity_type, object_id).await.map_err(Error::source)
		})
	}

	fn list_in_project<'a>(
		&'a self,
		project_id: &'a str,
		kind: EntityKind,
	) -> BoxFuture<'a, Result<Vec<SourceEntity>>> {
		Box::pin(async move {
			PgEntitySource::list_in_project(self, project_id, kind.as_str())
				.await
				.map_err(Error::source)
		})
	}
}

/// Entity store held in process memory, keyed by normalized `(entity_type, object_id)`.
#[derive(Default)]
pub struct MemoryEntitySource {
	entities: RwLock<BTreeMap<(String, String), SourceEntity>>,
}
impl MemoryEntitySource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, entity: SourceEntity) {
		let key = key(&entity.entity_type, &entity.object_id);

		self.entities.write().unwrap_or_else(|err| err.into_inner()).insert(key, entity);
	}

	pub fn remove(&self, entity_type: &str, object_id: &str) -> Option<SourceEntity> {
		self.entities
			.write()
			.unwrap_or_else(|err| err.into_inner())
			.remove(&key(entity_type, object_id))
	}

	fn get(&self, entity_type: &str, object_id: &str) -> Option<SourceEntity> {
		self.entities
			.read()
			.unwrap_or_else(|err| err.into_inner())
			.get(&key(entity_type, object_id))
			.cloned()
	}

	fn in_project(&self, project_id: &str, kind: EntityKind) -> Vec<SourceEntity> {
		self.entities
			.read()
			.unwrap_or_else(|err| err.into_inner())
			.values()
			.filter(|entity| entity.kind() == Some(kind))
			.filter(|entity| entity.project_id.as_deref().map(str::trim) == Some(project_id.trim()))
			.cloned()
			.collect()
	}
}
impl EntitySource for MemoryEntitySource {
	fn fetch<'a>(
		&'a self,
		entity_type: &'a str,
		object_id: &'a str,
	) -> BoxFuture<'a, Result<Option<SourceEntity>>> {
		Box::pin(async move { Ok(self.get(entity_type, object_id)) })
	}

	fn list_in_project<'a>(
		&'a self,
		project_id: &'a str,
		kind: EntityKind,
	) -> BoxFuture<'a, Result<Vec<SourceEntity>>> {
		Box::pin(async move { Ok(self.in_project(project_id, kind)) })
	}
}

fn key(entity_type: &str, object_id: &str) -> (String, String) {
	(entity_type.trim().to_ascii_lowercase(), object_id.trim().to_string())
}
