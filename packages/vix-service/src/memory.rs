//! In-process [`IndexBackend`] with the same replace/create contract as Qdrant.
//!
//! Scoring is the fraction of distinct query terms found in a document's search text, which is
//! enough to exercise ranking, filtering and weighting without an embedder.

use std::{
	collections::{BTreeMap, BTreeSet},
	sync::RwLock,
};

use uuid::Uuid;

use vix_domain::IndexDocument;

use crate::{
	BackendQuery, BackendState, BoxFuture, Error, IndexBackend, PreparedDocument, Result,
	ScoredDocument,
};

pub struct MemoryBackend {
	docs: RwLock<BTreeMap<Uuid, IndexDocument>>,
	available: bool,
}
impl MemoryBackend {
	pub fn new() -> Self {
		Self { docs: RwLock::new(BTreeMap::new()), available: true }
	}

	/// A backend that behaves like a disabled index.
	pub fn unavailable() -> Self {
		Self { docs: RwLock::new(BTreeMap::new()), available: false }
	}

	pub fn len(&self) -> usize {
		self.docs.read().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn document(&self, backend_id: Uuid) -> Option<IndexDocument> {
		self.docs.read().unwrap_or_else(|err| err.into_inner()).get(&backend_id).cloned()
	}

	/// Stores a document directly, bypassing the replace/create contract.
	pub fn seed(&self, doc: IndexDocument) {
		self.docs.write().unwrap_or_else(|err| err.into_inner()).insert(doc.backend_id, doc);
	}

	fn check_available(&self) -> Result<()> {
		if self.available {
			Ok(())
		} else {
			Err(Error::BackendUnavailable { message: "In-memory index is disabled.".to_string() })
		}
	}

	fn replace_now(&self, doc: &IndexDocument) -> Result<()> {
		self.check_available()?;

		let mut docs = self.docs.write().unwrap_or_else(|err| err.into_inner());
		let Some(slot) = docs.get_mut(&doc.backend_id) else {
			return Err(Error::NotFound { message: format!("point {}", doc.backend_id) });
		};

		*slot = doc.clone();

		Ok(())
	}

	fn create_now(&self, doc: &IndexDocument) -> Result<()> {
		self.check_available()?;
		self.docs.write().unwrap_or_else(|err| err.into_inner()).insert(doc.backend_id, doc.clone());

		Ok(())
	}

	fn delete_now(&self, backend_id: Uuid) -> Result<()> {
		self.check_available()?;
		self.docs.write().unwrap_or_else(|err| err.into_inner()).remove(&backend_id);

		Ok(())
	}

	fn get_now(&self, backend_id: Uuid) -> Result<Option<IndexDocument>> {
		self.check_available()?;

		Ok(self.document(backend_id))
	}

	fn query_now(&self, query: &BackendQuery) -> Result<Vec<ScoredDocument>> {
		self.check_available()?;

		let query_terms = terms(&query.text);

		if query_terms.is_empty() {
			return Ok(Vec::new());
		}

		let docs = self.docs.read().unwrap_or_else(|err| err.into_inner());
		let mut hits = docs
			.values()
			.filter(|doc| {
				query.entity_types.is_empty() || query.entity_types.contains(&doc.entity_type)
			})
			.filter(|doc| match query.project_id.as_ref() {
				Some(project_id) => doc.project_id.as_ref() == Some(project_id),
				None => true,
			})
			.filter_map(|doc| {
				let doc_terms = terms(&doc.search_text());
				let matched = query_terms.intersection(&doc_terms).count();

				if matched == 0 {
					return None;
				}

				Some(ScoredDocument {
					document: doc.clone(),
					score: matched as f32 / query_terms.len() as f32,
				})
			})
			.collect::<Vec<_>>();

		hits.sort_by(|a, b| {
			b.score
				.total_cmp(&a.score)
				.then_with(|| a.document.backend_id.cmp(&b.document.backend_id))
		});
		hits.truncate(query.limit as usize);

		Ok(hits)
	}
}
impl Default for MemoryBackend {
	fn default() -> Self {
		Self::new()
	}
}
impl IndexBackend for MemoryBackend {
	fn state(&self) -> BackendState {
		if self.available { BackendState::Ready } else { BackendState::Disabled }
	}

	fn ensure_ready<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.check_available() })
	}

	fn prepare<'a>(&'a self, doc: IndexDocument) -> BoxFuture<'a, Result<PreparedDocument>> {
		Box::pin(async move {
			self.check_available()?;

			Ok(PreparedDocument::bare(doc))
		})
	}

	fn replace<'a>(&'a self, doc: &'a PreparedDocument) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.replace_now(&doc.document) })
	}

	fn create<'a>(&'a self, doc: &'a PreparedDocument) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.create_now(&doc.document) })
	}

	fn delete<'a>(&'a self, backend_id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.delete_now(backend_id) })
	}

	fn get<'a>(&'a self, backend_id: Uuid) -> BoxFuture<'a, Result<Option<IndexDocument>>> {
		Box::pin(async move { self.get_now(backend_id) })
	}

	fn query<'a>(&'a self, query: &'a BackendQuery) -> BoxFuture<'a, Result<Vec<ScoredDocument>>> {
		Box::pin(async move { self.query_now(query) })
	}
}

fn terms(text: &str) -> BTreeSet<String> {
	text.split(|ch: char| !ch.is_alphanumeric())
		.filter(|term| !term.is_empty())
		.map(str::to_lowercase)
		.collect()
}
