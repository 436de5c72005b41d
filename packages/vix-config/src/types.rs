use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Entity type tags the engine knows how to index.
pub const ENTITY_TYPES: [&str; 8] = [
	"project",
	"item",
	"comment",
	"attachment",
	"release",
	"change",
	"node",
	"external_mapping",
];

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub documents: Documents,
	#[serde(default)]
	pub exclusion: Exclusion,
	#[serde(default)]
	pub retrieval: Retrieval,
	pub security: Security,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// Read-only view exposed by the tracker database. Must be a plain SQL identifier.
	#[serde(default = "default_source_view")]
	pub source_view: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	/// Disabling the index short-circuits every backend call before any network traffic.
	#[serde(default = "default_true")]
	pub enabled: bool,
	pub url: String,
	pub api_key: Option<String>,
	pub collection: String,
	pub vector_dim: u32,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Documents {
	/// Prefix for document URLs, e.g. "https://tracker.example.com".
	pub base_url: Option<String>,
	/// Offset assumed for naive source timestamps, formatted as "+HH:MM" or "-HH:MM".
	pub naive_utc_offset: String,
	pub max_primary_chars: u32,
}
impl Default for Documents {
	fn default() -> Self {
		Self { base_url: None, naive_utc_offset: "+00:00".to_string(), max_primary_chars: 8_000 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Exclusion {
	pub rules: Vec<ExclusionRule>,
}
impl Default for Exclusion {
	fn default() -> Self {
		let mut when = BTreeMap::new();

		when.insert("role".to_string(), vec!["transcript".to_string()]);
		when.insert("target_kind".to_string(), vec!["meeting".to_string()]);

		Self {
			rules: vec![ExclusionRule {
				entity_type: "attachment".to_string(),
				reason: "Meeting transcripts are too large to index.".to_string(),
				when,
			}],
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExclusionRule {
	pub entity_type: String,
	pub reason: String,
	/// Attribute name to accepted values. Every entry must match for the rule to apply.
	#[serde(default)]
	pub when: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub default_limit: u32,
	pub max_limit: u32,
	/// Candidates fetched from the backend before weighting and truncation.
	pub candidate_k: u32,
	pub snippet_chars: u32,
	pub rag_top_k: u32,
	pub rag_max_chars: u32,
	pub type_weights: BTreeMap<String, f32>,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			default_limit: 10,
			max_limit: 50,
			candidate_k: 60,
			snippet_chars: 280,
			rag_top_k: 5,
			rag_max_chars: 6_000,
			type_weights: BTreeMap::new(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
}

fn default_source_view() -> String {
	"index_source_entities".to_string()
}

fn default_true() -> bool {
	true
}

fn default_qdrant_timeout_ms() -> u64 {
	5_000
}
