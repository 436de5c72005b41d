use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use uuid::Uuid;

use vix_config::{Config, EmbeddingProviderConfig};
use vix_domain::IndexDocument;
use vix_storage::qdrant::{HybridQuery, IndexPoint, QdrantStore};

use crate::{BackendQuery, BoxFuture, Error, IndexBackend, Providers, Result, ScoredDocument};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
	/// Turned off or misconfigured. Every call fails fast with `BackendUnavailable`.
	Disabled,
	/// Reachable in principle; the collection has not been checked yet.
	Uninitialized,
	Ready,
}

/// A document ready to be written. `dense` is filled by backends that embed.
#[derive(Clone, Debug)]
pub struct PreparedDocument {
	pub document: IndexDocument,
	pub dense: Option<Vec<f32>>,
}
impl PreparedDocument {
	pub fn bare(document: IndexDocument) -> Self {
		Self { document, dense: None }
	}
}

/// Qdrant-backed index. The collection is created lazily on the first call that needs it and
/// the result is remembered for the life of the process.
pub struct QdrantBackend {
	store: std::result::Result<QdrantStore, String>,
	embedding: EmbeddingProviderConfig,
	providers: Providers,
	ready: OnceCell<()>,
}
impl QdrantBackend {
	pub fn new(cfg: &Config, providers: Providers) -> Self {
		let qdrant = &cfg.storage.qdrant;
		let store = if !qdrant.enabled {
			Err("storage.qdrant.enabled is false.".to_string())
		} else if qdrant.url.trim().is_empty() {
			Err("storage.qdrant.url is empty.".to_string())
		} else {
			QdrantStore::new(qdrant).map_err(|err| {
				tracing::error!(error = %err, "Failed to build Qdrant client. Index is disabled.");

				format!("Qdrant client could not be built: {err}")
			})
		};

		Self {
			store,
			embedding: cfg.providers.embedding.clone(),
			providers,
			ready: OnceCell::new(),
		}
	}

	async fn ready_store(&self) -> Result<&QdrantStore> {
		let store = self
			.store
			.as_ref()
			.map_err(|message| Error::BackendUnavailable { message: message.clone() })?;

		self.ready
			.get_or_try_init(|| async {
				store.ensure_collection().await.map_err(|err| Error::backend("ensure_collection", err))
			})
			.await?;

		Ok(store)
	}

	async fn embed_one(&self, text: String) -> Result<Vec<f32>> {
		let texts = [text];
		let mut vectors = self.providers.embedding.embed(&self.embedding, &texts).await?;

		match vectors.pop() {
			Some(vector) if vectors.is_empty() => Ok(vector),
			_ => Err(Error::Provider {
				message: "Embedding provider returned an unexpected number of vectors.".to_string(),
			}),
		}
	}

	async fn prepare_doc(&self, document: IndexDocument) -> Result<PreparedDocument> {
		self.ready_store().await?;

		let dense = self.embed_one(document.search_text()).await?;

		Ok(PreparedDocument { document, dense: Some(dense) })
	}

	async fn to_point(&self, prepared: &PreparedDocument) -> Result<IndexPoint> {
		let doc = &prepared.document;
		let text = doc.search_text();
		let dense = match prepared.dense.as_ref() {
			Some(dense) => dense.clone(),
			None => self.embed_one(text.clone()).await?,
		};
		let payload = match serde_json::to_value(doc) {
			Ok(Value::Object(map)) => map,
			Ok(_) => {
				return Err(Error::InvalidRequest {
					message: "Index document did not serialize to an object.".to_string(),
				});
			},
			Err(err) => return Err(Error::InvalidRequest { message: err.to_string() }),
		};

		Ok(IndexPoint { id: doc.backend_id, payload, text, dense })
	}

	async fn replace_doc(&self, prepared: &PreparedDocument) -> Result<()> {
		let store = self.ready_store().await?;
		let point = self.to_point(prepared).await?;

		store.replace(&point).await.map_err(|err| Error::backend("replace", err))
	}

	async fn create_doc(&self, prepared: &PreparedDocument) -> Result<()> {
		let store = self.ready_store().await?;
		let point = self.to_point(prepared).await?;

		store.create(&point).await.map_err(|err| Error::backend("create", err))
	}

	async fn delete_doc(&self, backend_id: Uuid) -> Result<()> {
		let store = self.ready_store().await?;

		store.delete(backend_id).await.map_err(|err| Error::backend("delete", err))
	}

	async fn get_doc(&self, backend_id: Uuid) -> Result<Option<IndexDocument>> {
		let store = self.ready_store().await?;
		let Some(payload) =
			store.get_payload(backend_id).await.map_err(|err| Error::backend("get", err))?
		else {
			return Ok(None);
		};

		serde_json::from_value(Value::Object(payload)).map(Some).map_err(|err| Error::Backend {
			operation: "get".to_string(),
			message: format!("Stored payload for {backend_id} does not decode: {err}"),
		})
	}

	async fn query_docs(&self, query: &BackendQuery) -> Result<Vec<ScoredDocument>> {
		let store = self.ready_store().await?;
		let dense = self.embed_one(query.text.clone()).await?;
		let mut filters = Vec::new();

		if !query.entity_types.is_empty() {
			filters.push(("entity_type".to_string(), query.entity_types.clone()));
		}
		if let Some(project_id) = query.project_id.as_ref() {
			filters.push(("project_id".to_string(), vec![project_id.clone()]));
		}

		let hits = store
			.hybrid_query(&HybridQuery {
				text: query.text.clone(),
				dense,
				filters,
				limit: u64::from(query.limit),
			})
			.await
			.map_err(|err| Error::backend("query", err))?;
		let mut out = Vec::with_capacity(hits.len());

		for hit in hits {
			match serde_json::from_value::<IndexDocument>(Value::Object(hit.payload)) {
				Ok(document) => out.push(ScoredDocument { document, score: hit.score }),
				Err(err) => {
					tracing::warn!(
						point_id = ?hit.id,
						error = %err,
						"Skipping search hit with undecodable payload."
					);
				},
			}
		}

		Ok(out)
	}
}
impl IndexBackend for QdrantBackend {
	fn state(&self) -> BackendState {
		match (&self.store, self.ready.initialized()) {
			(Err(_), _) => BackendState::Disabled,
			(Ok(_), false) => BackendState::Uninitialized,
			(Ok(_), true) => BackendState::Ready,
		}
	}

	fn ensure_ready<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { self.ready_store().await.map(|_| ()) })
	}

	fn prepare<'a>(&'a self, doc: IndexDocument) -> BoxFuture<'a, Result<PreparedDocument>> {
		Box::pin(self.prepare_doc(doc))
	}

	fn replace<'a>(&'a self, doc: &'a PreparedDocument) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.replace_doc(doc))
	}

	fn create<'a>(&'a self, doc: &'a PreparedDocument) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.create_doc(doc))
	}

	fn delete<'a>(&'a self, backend_id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.delete_doc(backend_id))
	}

	fn get<'a>(&'a self, backend_id: Uuid) -> BoxFuture<'a, Result<Option<IndexDocument>>> {
		Box::pin(self.get_doc(backend_id))
	}

	fn query<'a>(&'a self, query: &'a BackendQuery) -> BoxFuture<'a, Result<Vec<ScoredDocument>>> {
		Box::pin(self.query_docs(query))
	}
}
