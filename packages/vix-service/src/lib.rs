pub mod backend;
pub mod hooks;
pub mod memory;
pub mod resync;
pub mod search;
pub mod source;
pub mod status;
pub mod sync;

mod error;

pub use backend::{BackendState, PreparedDocument, QdrantBackend};
pub use error::{Error, Result};
pub use hooks::{CommitHooks, CommitListener, EntityChange, IndexSyncListener, PendingChanges};
pub use memory::MemoryBackend;
pub use resync::{ResyncReport, SourceFailure, TypeCounts};
pub use search::{
	BackendQuery, NO_CONTEXT_SENTINEL, ScoredDocument, SearchItem, SearchRequest, SearchResponse,
};
pub use source::MemoryEntitySource;
pub use status::{DocumentLookup, Existence, IndexStatus};
pub use sync::{SyncOutcome, SyncStatus};

use std::{future::Future, pin::Pin, sync::Arc};

use uuid::Uuid;

use vix_config::{Config, EmbeddingProviderConfig};
use vix_domain::{
	EntityKind, ExclusionPolicy, IndexDocument, SerializeContext, SerializerRegistry, SourceEntity,
};
use vix_providers::embedding;
use vix_storage::{db::Db, source::PgEntitySource};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, vix_providers::Result<Vec<Vec<f32>>>>;
}

/// Typed operations against the vector index. Every call checks availability before touching
/// the network, and a replace of a missing document fails with [`Error::NotFound`] instead of
/// creating it. Writes take a [`PreparedDocument`] so one preparation serves a replace and the
/// create that may follow it.
pub trait IndexBackend
where
	Self: Send + Sync,
{
	fn state(&self) -> BackendState;

	fn ensure_ready<'a>(&'a self) -> BoxFuture<'a, Result<()>>;

	/// Computes whatever a write needs besides the document itself, such as its embedding.
	fn prepare<'a>(&'a self, doc: IndexDocument) -> BoxFuture<'a, Result<PreparedDocument>>;

	fn replace<'a>(&'a self, doc: &'a PreparedDocument) -> BoxFuture<'a, Result<()>>;

	fn create<'a>(&'a self, doc: &'a PreparedDocument) -> BoxFuture<'a, Result<()>>;

	fn delete<'a>(&'a self, backend_id: Uuid) -> BoxFuture<'a, Result<()>>;

	fn get<'a>(&'a self, backend_id: Uuid) -> BoxFuture<'a, Result<Option<IndexDocument>>>;

	fn query<'a>(&'a self, query: &'a BackendQuery) -> BoxFuture<'a, Result<Vec<ScoredDocument>>>;
}

/// Read-only view of the tracker's entities.
pub trait EntitySource
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		entity_type: &'a str,
		object_id: &'a str,
	) -> BoxFuture<'a, Result<Option<SourceEntity>>>;

	fn list_in_project<'a>(
		&'a self,
		project_id: &'a str,
		kind: EntityKind,
	) -> BoxFuture<'a, Result<Vec<SourceEntity>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		Self { embedding: Arc::new(DefaultProviders) }
	}
}

pub struct VixService {
	pub cfg: Config,
	pub backend: Arc<dyn IndexBackend>,
	pub source: Arc<dyn EntitySource>,
	pub registry: SerializerRegistry,
	pub exclusion: ExclusionPolicy,
}
impl VixService {
	pub fn new(cfg: Config, backend: Arc<dyn IndexBackend>, source: Arc<dyn EntitySource>) -> Self {
		let registry = SerializerRegistry::builtin(SerializeContext::from_config(&cfg.documents));
		let exclusion = ExclusionPolicy::from_config(&cfg.exclusion);

		Self { cfg, backend, source, registry, exclusion }
	}

	/// Production wiring: Postgres source view plus the Qdrant backend.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = Db::connect(&cfg.storage.postgres).await.map_err(Error::source)?;
		let source = PgEntitySource::new(db.pool, &cfg.storage.postgres.source_view)
			.map_err(Error::source)?;
		let backend = QdrantBackend::new(&cfg, Providers::default());

		Ok(Self::new(cfg, Arc::new(backend), Arc::new(source)))
	}

	pub fn with_registry(mut self, registry: SerializerRegistry) -> Self {
		self.registry = registry;

		self
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, vix_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
