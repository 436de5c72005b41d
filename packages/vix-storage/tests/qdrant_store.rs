use serde_json::Map;
use tokio::runtime::Runtime;
use uuid::Uuid;

use vix_config::Qdrant;
use vix_storage::{
	Error,
	qdrant::{HybridQuery, IndexPoint, QdrantStore},
};

const DIM: u32 = 4;

fn point(id: Uuid, title: &str, entity_type: &str) -> IndexPoint {
	let mut payload = Map::new();

	payload.insert("entity_type".to_string(), serde_json::json!(entity_type));
	payload.insert("project_id".to_string(), serde_json::json!("p1"));
	payload.insert("title".to_string(), serde_json::json!(title));

	IndexPoint { id, payload, text: title.to_string(), dense: vec![0.5; DIM as usize] }
}

#[test]
#[ignore = "Requires external Qdrant. Set VIX_QDRANT_URL to run."]
fn replace_distinguishes_missing_points() {
	let Some(url) = vix_testkit::env_qdrant_url() else {
		eprintln!("Skipping replace_distinguishes_missing_points; set VIX_QDRANT_URL to run this test.");

		return;
	};
	let rt = Runtime::new().expect("Failed to build runtime.");

	rt.block_on(async {
		let collection = vix_testkit::scratch_collection("vix_store");
		let store = QdrantStore::new(&Qdrant {
			enabled: true,
			url,
			api_key: None,
			collection: collection.clone(),
			vector_dim: DIM,
			timeout_ms: 5_000,
		})
		.expect("Failed to build Qdrant store.");

		store.ensure_collection().await.expect("Failed to ensure collection.");
		store.ensure_collection().await.expect("Second ensure should be a no-op.");

		let id = Uuid::new_v4();
		let err = store.replace(&point(id, "first", "item")).await.expect_err("Expected not found.");

		assert!(matches!(err, Error::NotFound(_)), "Unexpected error: {err:?}");

		store.create(&point(id, "first", "item")).await.expect("Failed to create point.");
		store.replace(&point(id, "second", "item")).await.expect("Failed to replace point.");

		let payload = store
			.get_payload(id)
			.await
			.expect("Failed to get payload.")
			.expect("Payload should exist.");

		assert_eq!(payload.get("title"), Some(&serde_json::json!("second")));

		let hits = store
			.hybrid_query(&HybridQuery {
				text: "second".to_string(),
				dense: vec![0.5; DIM as usize],
				filters: vec![("entity_type".to_string(), vec!["item".to_string()])],
				limit: 10,
			})
			.await
			.expect("Failed to query.");

		assert_eq!(hits.first().and_then(|hit| hit.id), Some(id));

		store.delete(id).await.expect("Failed to delete point.");
		store.delete(id).await.expect("Deleting an absent point should succeed.");

		assert!(store.get_payload(id).await.expect("Failed to get payload.").is_none());

		vix_testkit::drop_collection(&collection).await.expect("Failed to drop collection.");
	});
}
