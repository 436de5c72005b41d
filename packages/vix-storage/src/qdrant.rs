pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

/// Payload fields used in query filters; each gets a keyword index.
pub const KEYWORD_FIELDS: [&str; 3] = ["entity_type", "project_id", "object_id"];

use std::{collections::HashMap, time::Duration};

use qdrant_client::{
	Qdrant, QdrantError,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
		DeletePointsBuilder, Distance, Document, FieldType, Filter, Fusion, GetPointsBuilder,
		Modifier, PointId, PointStruct, PointVectors, PointsIdsList, PointsUpdateOperation,
		PrefetchQueryBuilder, Query, QueryPointsBuilder, SparseVectorParamsBuilder,
		SparseVectorsConfigBuilder, UpdateBatchPointsBuilder, UpsertPointsBuilder, Value, Vector,
		VectorParamsBuilder, VectorsConfigBuilder, point_id::PointIdOptions,
		points_update_operation::{self, Operation}, value::Kind,
	},
};
use serde_json::{Map, Number, Value as JsonValue};
use uuid::Uuid;

use crate::{Error, Result};

/// One point as the engine sees it: a JSON payload plus the text and dense vector it is
/// searchable by.
#[derive(Clone, Debug)]
pub struct IndexPoint {
	pub id: Uuid,
	pub payload: Map<String, JsonValue>,
	pub text: String,
	pub dense: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct HybridQuery {
	pub text: String,
	pub dense: Vec<f32>,
	/// Payload key to accepted keyword values. Every entry must match.
	pub filters: Vec<(String, Vec<String>)>,
	pub limit: u64,
}

#[derive(Clone, Debug)]
pub struct ScoredPayload {
	pub id: Option<Uuid>,
	pub score: f32,
	pub payload: Map<String, JsonValue>,
}

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &vix_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.api_key(cfg.api_key.clone())
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection and its payload indexes when missing. Safe to call from several
	/// processes at once.
	pub async fn ensure_collection(&self) -> Result<()> {
		if !self.client.collection_exists(self.collection.clone()).await? {
			let mut vectors_config = VectorsConfigBuilder::default();

			vectors_config.add_named_vector_params(
				DENSE_VECTOR_NAME,
				VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
			);

			let mut sparse_vectors_config = SparseVectorsConfigBuilder::default();

			sparse_vectors_config.add_named_vector_params(
				BM25_VECTOR_NAME,
				SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
			);

			let builder = CreateCollectionBuilder::new(self.collection.clone())
				.vectors_config(vectors_config)
				.sparse_vectors_config(sparse_vectors_config);

			match self.client.create_collection(builder).await {
				Ok(_) => {
					tracing::info!(collection = %self.collection, "Created Qdrant collection.");
				},
				Err(err) if is_already_exists_message(&err.to_string()) => {},
				Err(err) => return Err(err.into()),
			}
		}

		for field in KEYWORD_FIELDS {
			let index = CreateFieldIndexCollectionBuilder::new(
				self.collection.clone(),
				field,
				FieldType::Keyword,
			)
			.wait(true);

			self.client.create_field_index(index).await?;
		}

		Ok(())
	}

	/// Overwrites payload and vectors of an existing point in one batch request, so a failed
	/// call leaves the stored point as it was. A missing point yields [`Error::NotFound`]; the
	/// point is never created here.
	pub async fn replace(&self, point: &IndexPoint) -> Result<()> {
		let batch =
			UpdateBatchPointsBuilder::new(self.collection.clone(), replace_operations(point))
				.wait(true);

		self.client.update_points_batch(batch).await.map_err(|err| classify(err, point.id))?;

		Ok(())
	}

	/// Upserts the point under its deterministic id.
	pub async fn create(&self, point: &IndexPoint) -> Result<()> {
		let record = PointStruct::new(
			point.id.to_string(),
			named_vectors(point),
			to_payload(&point.payload),
		);
		let upsert = UpsertPointsBuilder::new(self.collection.clone(), vec![record]).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn delete(&self, id: Uuid) -> Result<()> {
		let delete = DeletePointsBuilder::new(self.collection.clone())
			.points(PointsIdsList { ids: vec![point_id(id)] })
			.wait(true);

		self.client.delete_points(delete).await.map_err(|err| classify(err, id))?;

		Ok(())
	}

	pub async fn get_payload(&self, id: Uuid) -> Result<Option<Map<String, JsonValue>>> {
		let get = GetPointsBuilder::new(self.collection.clone(), vec![point_id(id)])
			.with_payload(true)
			.with_vectors(false);
		let response = match self.client.get_points(get).await {
			Ok(response) => response,
			Err(err) if is_not_found_error(&err) => return Ok(None),
			Err(err) => return Err(err.into()),
		};

		Ok(response.result.into_iter().next().map(|point| payload_to_json(point.payload)))
	}

	/// Dense and BM25 prefetch fused with reciprocal rank fusion.
	pub async fn hybrid_query(&self, query: &HybridQuery) -> Result<Vec<ScoredPayload>> {
		let filter = build_filter(&query.filters);
		let mut dense_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(query.dense.clone()))
			.using(DENSE_VECTOR_NAME)
			.limit(query.limit);
		let mut bm25_prefetch = PrefetchQueryBuilder::default()
			.query(Query::new_nearest(Document::new(query.text.clone(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.limit(query.limit);

		if let Some(filter) = filter.as_ref() {
			dense_prefetch = dense_prefetch.filter(filter.clone());
			bm25_prefetch = bm25_prefetch.filter(filter.clone());
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.add_prefetch(dense_prefetch)
			.add_prefetch(bm25_prefetch)
			.with_payload(true)
			.query(Fusion::Rrf)
			.limit(query.limit);
		let response = self.client.query(search).await?;

		Ok(response
			.result
			.into_iter()
			.map(|point| ScoredPayload {
				id: point.id.as_ref().and_then(point_id_to_uuid),
				score: point.score,
				payload: payload_to_json(point.payload),
			})
			.collect())
	}
}

pub fn is_not_found_error(err: &QdrantError) -> bool {
	is_not_found_message(&err.to_string())
}

/// Point-level not-found only. A missing collection also reads "not found" but is a broken
/// backend, not an absent document.
pub fn is_not_found_message(message: &str) -> bool {
	let message = message.to_lowercase();
	let point_not_found =
		(message.contains("not found") || message.contains("404")) && message.contains("point");
	let no_point_found = message.contains("no point") && message.contains("found");

	point_not_found || no_point_found
}

fn is_already_exists_message(message: &str) -> bool {
	message.to_lowercase().contains("already exists")
}

fn classify(err: QdrantError, id: Uuid) -> Error {
	if is_not_found_error(&err) {
		Error::NotFound(format!("point {id}"))
	} else {
		err.into()
	}
}

fn point_id(id: Uuid) -> PointId {
	PointId::from(id.to_string())
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

/// Payload overwrite first, then vectors. Qdrant stops the batch at the first failing
/// operation, and the overwrite is the one that fails for a missing point.
fn replace_operations(point: &IndexPoint) -> Vec<PointsUpdateOperation> {
	let overwrite = points_update_operation::OverwritePayload {
		payload: to_payload(&point.payload).into(),
		points_selector: Some(vec![point_id(point.id)].into()),
		shard_key_selector: None,
		key: None,
	};
	let vectors = points_update_operation::UpdateVectors {
		points: vec![PointVectors {
			id: Some(point_id(point.id)),
			vectors: Some(named_vectors(point).into()),
		}],
		shard_key_selector: None,
		update_filter: None,
	};

	vec![
		PointsUpdateOperation { operation: Some(Operation::OverwritePayload(overwrite)) },
		PointsUpdateOperation { operation: Some(Operation::UpdateVectors(vectors)) },
	]
}

fn named_vectors(point: &IndexPoint) -> HashMap<String, Vector> {
	let mut vector_map = HashMap::new();

	vector_map.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(point.dense.clone()));
	vector_map.insert(
		BM25_VECTOR_NAME.to_string(),
		Vector::from(Document::new(point.text.clone(), BM25_MODEL)),
	);

	vector_map
}

fn build_filter(filters: &[(String, Vec<String>)]) -> Option<Filter> {
	let conditions = filters
		.iter()
		.filter(|(_, values)| !values.is_empty())
		.map(|(key, values)| match values.as_slice() {
			[single] => Condition::matches(key.as_str(), single.clone()),
			_ => Condition::matches(key.as_str(), values.clone()),
		})
		.collect::<Vec<_>>();

	if conditions.is_empty() { None } else { Some(Filter::must(conditions)) }
}

fn to_payload(map: &Map<String, JsonValue>) -> Payload {
	let payload_map = map
		.iter()
		.map(|(key, value)| (key.clone(), Value::from(value.clone())))
		.collect::<HashMap<_, _>>();

	Payload::from(payload_map)
}

fn payload_to_json(payload: HashMap<String, Value>) -> Map<String, JsonValue> {
	payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect()
}

fn value_to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) =>
			JsonValue::Array(list.values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(object)) => JsonValue::Object(payload_to_json(object.fields)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn point_level_not_found_is_recognized() {
		assert!(is_not_found_message(
			"Error in the response: status: NotFound, message: \"No point with id 8f1c59f5-4f4d-5f45-9cd3-7d3063cecaf1 found\""
		));
		assert!(is_not_found_message("Not found: Point 42 not found"));
		assert!(is_not_found_message("HTTP 404 for point 42"));
	}

	#[test]
	fn other_failures_are_not_not_found() {
		assert!(!is_not_found_message("Not found: Collection `tracker_index` doesn't exist!"));
		assert!(!is_not_found_message("status: Internal, message: \"Service internal error\""));
		assert!(!is_not_found_message("Timeout expired"));
		assert!(!is_not_found_message("Wrong input: Vector dimension error: expected dim: 4"));
	}

	#[test]
	fn payload_values_survive_conversion() {
		let json = serde_json::json!({
			"title": "Login fails",
			"fields": { "priority": "high" },
			"count": 3,
			"ratio": 0.5,
			"tags": ["a", "b"],
			"url": null,
			"flag": true
		});
		let map = json.as_object().cloned().expect("Object expected.");
		let payload_map = map
			.iter()
			.map(|(key, value)| (key.clone(), Value::from(value.clone())))
			.collect::<HashMap<_, _>>();

		assert_eq!(JsonValue::Object(payload_to_json(payload_map)), json);
	}

	#[test]
	fn replace_is_one_batch_that_overwrites_before_revectoring() {
		let point = IndexPoint {
			id: Uuid::nil(),
			payload: serde_json::json!({ "title": "Login fails" })
				.as_object()
				.cloned()
				.expect("Object expected."),
			text: "Login fails".to_string(),
			dense: vec![0.1, 0.2],
		};
		let operations = replace_operations(&point);

		assert_eq!(operations.len(), 2);

		let Some(Operation::OverwritePayload(overwrite)) = &operations[0].operation else {
			panic!("Payload overwrite expected first.");
		};

		assert!(overwrite.payload.contains_key("title"));
		assert!(overwrite.points_selector.is_some());

		let Some(Operation::UpdateVectors(vectors)) = &operations[1].operation else {
			panic!("Vector update expected second.");
		};

		assert_eq!(vectors.points.len(), 1);
		assert_eq!(vectors.points[0].id, Some(point_id(point.id)));
	}

	#[test]
	fn filter_skips_empty_scopes() {
		assert!(build_filter(&[]).is_none());
		assert!(build_filter(&[("entity_type".to_string(), Vec::new())]).is_none());

		let filter = build_filter(&[
			("entity_type".to_string(), vec!["item".to_string(), "comment".to_string()]),
			("project_id".to_string(), vec!["p1".to_string()]),
		])
		.expect("Filter expected.");

		assert_eq!(filter.must.len(), 2);
	}
}
