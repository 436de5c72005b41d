use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use vix_domain::IndexDocument;

use crate::VixService;

/// Returned by [`VixService::build_rag_context`] whenever no document qualifies.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendQuery {
	pub text: String,
	/// Accepted `entity_type` values; empty means any.
	pub entity_types: Vec<String>,
	pub project_id: Option<String>,
	pub limit: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
	pub document: IndexDocument,
	pub score: f32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub entity_types: Option<Vec<String>>,
	pub project_id: Option<String>,
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchItem {
	pub backend_id: Uuid,
	pub entity_type: String,
	pub object_id: String,
	pub project_id: Option<String>,
	pub title: String,
	pub url: Option<String>,
	pub snippet: String,
	pub score: f32,
	#[serde(default, with = "vix_domain::time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
	pub items: Vec<SearchItem>,
}

impl VixService {
	/// Scoped search. Unsupported type names are dropped from the scope; if none remain the
	/// result is empty. Backend failures degrade to an empty result.
	pub async fn search(&self, req: SearchRequest) -> SearchResponse {
		let limit = self.clamp_limit(req.limit);
		let entity_types = match req.entity_types.as_deref() {
			Some(requested) if !requested.is_empty() => {
				let supported = self.supported_types(requested);

				if supported.is_empty() {
					return SearchResponse::default();
				}

				supported
			},
			_ => self.all_types(),
		};
		let project_id =
			req.project_id.as_deref().map(str::trim).filter(|id| !id.is_empty()).map(str::to_string);
		let docs = self.ranked(&req.query, entity_types, project_id, limit).await;

		self.to_response(docs)
	}

	/// Unscoped search across every registered kind.
	pub async fn global_search(&self, query: &str, limit: Option<u32>) -> SearchResponse {
		let limit = self.clamp_limit(limit);
		let docs = self.ranked(query, self.all_types(), None, limit).await;

		self.to_response(docs)
	}

	/// Formats the best matches for `question` into one prompt-ready block, or
	/// [`NO_CONTEXT_SENTINEL`] when nothing qualifies. Never fails.
	pub async fn build_rag_context(
		&self,
		question: &str,
		project_id: Option<&str>,
		top_k: Option<u32>,
	) -> String {
		let cfg = &self.cfg.retrieval;
		let top_k = match top_k {
			None | Some(0) => cfg.rag_top_k,
			Some(value) => value,
		}
		.min(cfg.max_limit);
		let project_id = project_id.map(str::trim).filter(|id| !id.is_empty()).map(str::to_string);
		let docs = self.ranked(question, self.all_types(), project_id, top_k).await;

		format_context(&docs, cfg.rag_max_chars as usize)
			.unwrap_or_else(|| NO_CONTEXT_SENTINEL.to_string())
	}

	fn clamp_limit(&self, limit: Option<u32>) -> u32 {
		let cfg = &self.cfg.retrieval;

		match limit {
			None | Some(0) => cfg.default_limit,
			Some(value) => value.min(cfg.max_limit),
		}
	}

	fn all_types(&self) -> Vec<String> {
		self.registry.kinds().into_iter().map(|kind| kind.as_str().to_string()).collect()
	}

	fn supported_types(&self, requested: &[String]) -> Vec<String> {
		let mut out = Vec::new();

		for raw in requested {
			match self.registry.resolve(raw) {
				Ok(kind) =>
					if !out.iter().any(|known: &String| known == kind.as_str()) {
						out.push(kind.as_str().to_string());
					},
				Err(_) => {
					tracing::debug!(
						entity_type = %raw,
						"Dropping unsupported type from search scope."
					);
				},
			}
		}

		out
	}

	async fn ranked(
		&self,
		query: &str,
		entity_types: Vec<String>,
		project_id: Option<String>,
		limit: u32,
	) -> Vec<ScoredDocument> {
		let text = query.trim();

		if text.is_empty() || limit == 0 {
			return Vec::new();
		}

		let backend_query = BackendQuery {
			text: text.to_string(),
			entity_types,
			project_id,
			limit: self.cfg.retrieval.candidate_k.max(limit),
		};

		match self.backend.query(&backend_query).await {
			Ok(candidates) => self.weigh(candidates, limit),
			Err(err) => {
				tracing::warn!(
					query = %backend_query.text,
					project_id = ?backend_query.project_id,
					error = %err,
					"Search failed. Returning no results."
				);

				Vec::new()
			},
		}
	}

	/// Applies per-type weights, re-sorts by weighted score and breaks ties by `backend_id`.
	fn weigh(&self, mut candidates: Vec<ScoredDocument>, limit: u32) -> Vec<ScoredDocument> {
		let weights = &self.cfg.retrieval.type_weights;

		for candidate in &mut candidates {
			let weight = weights.get(&candidate.document.entity_type).copied().unwrap_or(1.0);

			candidate.score *= weight;
		}

		candidates.sort_by(|a, b| {
			b.score
				.total_cmp(&a.score)
				.then_with(|| a.document.backend_id.cmp(&b.document.backend_id))
		});
		candidates.truncate(limit as usize);

		candidates
	}

	fn to_response(&self, docs: Vec<ScoredDocument>) -> SearchResponse {
		let snippet_chars = self.cfg.retrieval.snippet_chars as usize;
		let items = docs
			.into_iter()
			.map(|ScoredDocument { document, score }| SearchItem {
				backend_id: document.backend_id,
				snippet: snippet(&document.primary_text, snippet_chars),
				entity_type: document.entity_type,
				object_id: document.object_id,
				project_id: document.project_id,
				title: document.title,
				url: document.url,
				score,
				updated_at: document.updated_at,
			})
			.collect();

		SearchResponse { items }
	}
}

fn snippet(text: &str, max_chars: usize) -> String {
	let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

	match collapsed.char_indices().nth(max_chars) {
		Some((idx, _)) => format!("{}...", collapsed[..idx].trim_end()),
		None => collapsed,
	}
}

/// Numbered blocks, best match first, stopping before the block that would exceed `max_chars`.
/// The first block is cut to fit rather than dropped.
fn format_context(docs: &[ScoredDocument], max_chars: usize) -> Option<String> {
	let mut out = String::new();

	for (idx, scored) in docs.iter().enumerate() {
		let doc = &scored.document;
		let mut block = String::new();

		if !out.is_empty() {
			block.push_str("\n\n");
		}

		let _ = writeln!(
			block,
			"[{}] {} {}: {}",
			idx + 1,
			doc.entity_type,
			doc.object_id,
			doc.title
		);

		if let Some(url) = doc.url.as_ref() {
			let _ = writeln!(block, "URL: {url}");
		}

		block.push_str(doc.primary_text.trim());

		let used = out.chars().count();
		let size = block.chars().count();

		if used + size > max_chars {
			if out.is_empty() {
				out.extend(block.chars().take(max_chars));
			}

			break;
		}

		out.push_str(&block);
	}

	let out = out.trim_end().to_string();

	if out.is_empty() { None } else { Some(out) }
}
