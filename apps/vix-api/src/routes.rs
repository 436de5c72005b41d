use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use vix_service::{
	BackendState, DocumentLookup, Error, Existence, IndexStatus, ResyncReport, SearchRequest,
	SearchResponse, SyncOutcome,
};

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthBody {
	status: &'static str,
	backend: BackendState,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
	#[serde(default)]
	pub q: String,
	/// Comma-separated entity types.
	#[serde(default, rename = "type")]
	pub entity_type: Option<String>,
	#[serde(default)]
	pub project: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlobalSearchParams {
	#[serde(default)]
	pub q: String,
	#[serde(default)]
	pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ResyncBody {
	pub project_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RagContextBody {
	pub question: String,
	#[serde(default)]
	pub project_id: Option<String>,
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RagContextResponse {
	pub context: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::BackendUnavailable { .. } =>
				ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable", message, None),
			Error::NotFound { .. } => ApiError::new(StatusCode::NOT_FOUND, "not_found", message, None),
			Error::Backend { .. } =>
				ApiError::new(StatusCode::BAD_GATEWAY, "backend_error", message, None),
			Error::Provider { .. } =>
				ApiError::new(StatusCode::BAD_GATEWAY, "provider_error", message, None),
			Error::UnsupportedType { .. } => ApiError::new(
				StatusCode::BAD_REQUEST,
				"unsupported_type",
				message,
				Some(vec!["entity_type".to_string()]),
			),
			Error::InvalidRequest { .. } =>
				ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			Error::Source { .. } =>
				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "source_error", message, None),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/index/status/{entity_type}/{object_id}", get(status))
		.route("/v1/index/exists/{entity_type}/{object_id}", get(exists))
		.route("/v1/index/document/{entity_type}/{object_id}", get(document))
		.route("/v1/index/push/{entity_type}/{object_id}", post(push))
		.route("/v1/search", get(search))
		.route("/v1/search/global", get(global_search))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/resync", post(resync))
		.route("/v1/admin/rag_context", post(rag_context))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
	Json(HealthBody { status: "ok", backend: state.service.backend.state() })
}

async fn status(
	State(state): State<AppState>,
	Path((entity_type, object_id)): Path<(String, String)>,
) -> Result<Json<IndexStatus>, ApiError> {
	let response = state.service.status(&entity_type, &object_id).await?;

	Ok(Json(response))
}

async fn exists(
	State(state): State<AppState>,
	Path((entity_type, object_id)): Path<(String, String)>,
) -> Result<Json<Existence>, ApiError> {
	let response = state.service.exists(&entity_type, &object_id).await?;

	Ok(Json(response))
}

async fn document(
	State(state): State<AppState>,
	Path((entity_type, object_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
	match state.service.get_current_document(&entity_type, &object_id).await? {
		DocumentLookup::Present { document } => Ok(Json(document).into_response()),
		DocumentLookup::Absent => Err(ApiError::new(
			StatusCode::NOT_FOUND,
			"document_not_found",
			format!("No indexed document for {entity_type} {object_id}."),
			None,
		)),
		DocumentLookup::Excluded { reason } => Err(ApiError::new(
			StatusCode::CONFLICT,
			"entity_excluded",
			reason.unwrap_or_else(|| format!("{entity_type} {object_id} is excluded from indexing.")),
			None,
		)),
	}
}

async fn push(
	State(state): State<AppState>,
	Path((entity_type, object_id)): Path<(String, String)>,
) -> Result<Json<SyncOutcome>, ApiError> {
	let response = state.service.force_push(&entity_type, &object_id).await?;

	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
	let entity_types = params.entity_type.map(|raw| {
		raw.split(',')
			.map(str::trim)
			.filter(|part| !part.is_empty())
			.map(str::to_string)
			.collect::<Vec<_>>()
	});
	let request = SearchRequest {
		query: params.q,
		entity_types,
		project_id: params.project,
		limit: params.limit,
	};

	Json(state.service.search(request).await)
}

async fn global_search(
	State(state): State<AppState>,
	Query(params): Query<GlobalSearchParams>,
) -> Json<SearchResponse> {
	Json(state.service.global_search(&params.q, params.limit).await)
}

/// The run happens on its own task. If the caller goes away, dropping this future cancels the
/// run at the next entity boundary.
async fn resync(
	State(state): State<AppState>,
	Json(payload): Json<ResyncBody>,
) -> Result<Json<ResyncReport>, ApiError> {
	let cancel = CancellationToken::new();
	let _cancel_on_drop = cancel.clone().drop_guard();
	let service = state.service.clone();
	let task = tokio::spawn(async move { service.resync(&payload.project_id, &cancel).await });
	let response = match task.await {
		Ok(report) => report?,
		Err(err) => {
			tracing::error!(error = %err, "Resync task did not complete.");

			return Err(ApiError::new(
				StatusCode::INTERNAL_SERVER_ERROR,
				"resync_aborted",
				format!("Resync task did not complete: {err}"),
				None,
			));
		},
	};

	Ok(Json(response))
}

async fn rag_context(
	State(state): State<AppState>,
	Json(payload): Json<RagContextBody>,
) -> Json<RagContextResponse> {
	let context = state
		.service
		.build_rag_context(&payload.question, payload.project_id.as_deref(), payload.top_k)
		.await;

	Json(RagContextResponse { context })
}
