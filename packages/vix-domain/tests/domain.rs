use std::collections::BTreeMap;

use time::{
	OffsetDateTime,
	format_description::well_known::Rfc3339,
	macros::{datetime, offset},
};

use vix_config::{Documents, Exclusion, ExclusionRule};
use vix_domain::{
	DocumentDraft, EntityKind, ExclusionPolicy, SerializeContext, SerializeError,
	SerializerRegistry, SourceEntity, identity,
};

fn registry() -> SerializerRegistry {
	SerializerRegistry::builtin(SerializeContext::from_config(&Documents {
		base_url: Some("https://tracker.example.com".to_string()),
		naive_utc_offset: "+02:00".to_string(),
		max_primary_chars: 16,
	}))
}

fn transcript_attachment() -> SourceEntity {
	SourceEntity::new("attachment", "7")
		.with_project("p1")
		.with_parent("item", "42")
		.with_attribute("filename", "standup.vtt")
		.with_attribute("role", "Transcript")
		.with_attribute("target_kind", "meeting")
}

#[test]
fn default_policy_excludes_meeting_transcripts() {
	let policy = ExclusionPolicy::from_config(&Exclusion::default());
	let decision = policy.evaluate(&transcript_attachment());

	assert!(decision.excluded);
	assert_eq!(decision.reason.as_deref(), Some("Meeting transcripts are too large to index."));
}

#[test]
fn default_policy_keeps_other_attachments() {
	let policy = ExclusionPolicy::from_config(&Exclusion::default());
	let datasheet = SourceEntity::new("attachment", "8")
		.with_attribute("role", "datasheet")
		.with_attribute("target_kind", "meeting");
	let no_target = SourceEntity::new("attachment", "9").with_attribute("role", "transcript");

	assert!(!policy.evaluate(&datasheet).excluded);
	assert!(!policy.evaluate(&no_target).excluded);
	assert!(!policy.evaluate(&SourceEntity::new("item", "42")).excluded);
}

#[test]
fn policy_matches_relation_pseudo_attributes() {
	let mut when = BTreeMap::new();

	when.insert("parent_type".to_string(), vec!["release".to_string()]);

	let policy = ExclusionPolicy::from_config(&Exclusion {
		rules: vec![ExclusionRule {
			entity_type: "comment".to_string(),
			reason: "Release chatter".to_string(),
			when,
		}],
	});
	let on_release = SourceEntity::new("comment", "1").with_parent("release", "3");
	let on_item = SourceEntity::new("comment", "2").with_parent("item", "3");

	assert!(policy.evaluate(&on_release).excluded);
	assert!(!policy.evaluate(&on_item).excluded);
}

#[test]
fn evaluation_is_stable_across_calls() {
	let policy = ExclusionPolicy::from_config(&Exclusion::default());
	let entity = transcript_attachment();

	assert_eq!(policy.evaluate(&entity), policy.evaluate(&entity));
}

#[test]
fn item_serializes_into_canonical_document() {
	let entity = SourceEntity::new("Item", " 42")
		.with_project("p1")
		.with_attribute("title", "Login fails")
		.with_attribute("description", "Users cannot log in after the upgrade.")
		.with_attribute("status", "open")
		.with_attribute("priority", "high")
		.with_attribute("labels", serde_json::json!(["auth", " ", "regression"]))
		.with_attribute("due_at", "2024-03-01 09:30:00")
		.with_timestamps(datetime!(2024-02-01 08:00:00), datetime!(2024-02-02 10:00:00 UTC));
	let doc = registry().serialize(&entity).expect("Serialization failed.");

	assert_eq!(doc.backend_id, identity::backend_id("item", "42"));
	assert_eq!(doc.entity_type, "item");
	assert_eq!(doc.object_id, "42");
	assert_eq!(doc.project_id.as_deref(), Some("p1"));
	assert_eq!(doc.title, "Login fails");
	assert_eq!(doc.primary_text, "Users cannot log");
	assert_eq!(doc.url.as_deref(), Some("https://tracker.example.com/items/42"));
	assert_eq!(doc.status.as_deref(), Some("open"));
	assert_eq!(doc.fields.get("labels").map(String::as_str), Some("auth, regression"));
	assert_eq!(doc.fields.get("due_at").map(String::as_str), Some("2024-03-01T07:30:00Z"));
	assert_eq!(doc.created_at, Some(datetime!(2024-02-01 08:00:00 +2)));
	assert_eq!(doc.updated_at, Some(datetime!(2024-02-02 10:00:00 UTC)));
	assert_eq!(doc.created_at.map(|ts| ts.offset()), Some(offset!(+2)));
}

#[test]
fn project_is_its_own_project() {
	let entity = SourceEntity::new("project", "p1").with_attribute("name", "Platform");
	let doc = registry().serialize(&entity).expect("Serialization failed.");

	assert_eq!(doc.project_id.as_deref(), Some("p1"));
	assert_eq!(doc.title, "Platform");
}

#[test]
fn comment_flattens_parent_and_links_to_item() {
	let entity = SourceEntity::new("comment", "5")
		.with_project("p1")
		.with_parent("ITEM", "42")
		.with_attribute("body", "Reproduced on staging.");
	let doc = registry().serialize(&entity).expect("Serialization failed.");

	assert_eq!(doc.parent_type.as_deref(), Some("item"));
	assert_eq!(doc.parent_object_id.as_deref(), Some("42"));
	assert_eq!(doc.title, "Comment on ITEM 42");
	assert_eq!(doc.url.as_deref(), Some("https://tracker.example.com/items/42#comment-5"));
}

#[test]
fn external_mapping_keeps_absolute_urls() {
	let entity = SourceEntity::new("external_mapping", "gh-1")
		.with_attribute("repo", "acme/app")
		.with_attribute("number", 17)
		.with_attribute("external_url", "https://github.com/acme/app/issues/17");
	let doc = registry().serialize(&entity).expect("Serialization failed.");

	assert_eq!(doc.title, "acme/app#17");
	assert_eq!(doc.url.as_deref(), Some("https://github.com/acme/app/issues/17"));
	assert_eq!(doc.fields.get("provider").map(String::as_str), Some("github"));
}

#[test]
fn every_builtin_kind_serializes_a_bare_entity() {
	let registry = registry();

	assert_eq!(registry.kinds(), EntityKind::ALL.to_vec());

	for kind in EntityKind::ALL {
		let doc = registry
			.serialize(&SourceEntity::new(kind.as_str(), "1"))
			.expect("Bare entity should serialize.");

		assert_eq!(doc.entity_type, kind.as_str());
		assert!(!doc.title.is_empty());
	}
}

#[test]
fn unknown_and_unregistered_types_are_rejected() {
	let mut registry = registry();
	let err = registry.serialize(&SourceEntity::new("wiki", "1")).expect_err("Expected error.");

	assert!(matches!(
		err,
		SerializeError::UnsupportedType { ref entity_type } if entity_type == "wiki"
	));

	registry.remove(EntityKind::Node);

	assert!(!registry.supports("node"));
	assert!(matches!(
		registry.serialize(&SourceEntity::new("node", "1")),
		Err(SerializeError::UnsupportedType { .. })
	));
}

#[test]
fn blank_object_id_is_invalid() {
	let err = registry().serialize(&SourceEntity::new("item", "  ")).expect_err("Expected error.");

	assert!(matches!(err, SerializeError::InvalidEntity { .. }));
}

#[test]
fn unrepresentable_attribute_timestamps_are_dropped() {
	let release = SourceEntity::new("release", "9")
		.with_attribute("name", "Long-term support")
		.with_attribute("released_at", "9999-12-31T23:30:00-01:00")
		.with_attribute("planned_at", "2024-03-01T09:30:00Z");
	let doc = registry().serialize(&release).expect("Serialization should not fail.");

	assert!(!doc.fields.contains_key("released_at"));
	assert_eq!(doc.fields.get("planned_at").map(String::as_str), Some("2024-03-01T09:30:00Z"));
}

#[test]
fn unrepresentable_row_timestamps_are_invalid() {
	let edge = OffsetDateTime::parse("9999-12-31T23:00:00-05:00", &Rfc3339)
		.expect("Edge value should parse.");
	let item = SourceEntity::new("item", "42")
		.with_attribute("title", "Far future")
		.with_timestamps(edge, datetime!(2024-03-01 09:30:00 UTC));
	let err = registry().serialize(&item).expect_err("Expected error.");

	assert!(matches!(
		err,
		SerializeError::InvalidEntity { ref message, .. } if message.starts_with("created_at")
	));
}

#[test]
fn custom_serializer_can_be_registered() {
	fn terse(entity: &SourceEntity, _: &SerializeContext) -> vix_domain::Result<DocumentDraft> {
		Ok(DocumentDraft { title: format!("node {}", entity.object_id), ..Default::default() })
	}

	let mut registry = registry();

	registry.register(EntityKind::Node, terse);

	let doc = registry.serialize(&SourceEntity::new("node", "9")).expect("Serialization failed.");

	assert_eq!(doc.title, "node 9");
	assert_eq!(doc.url, None);
}

#[test]
fn content_hash_ignores_timestamps() {
	let registry = registry();
	let base = SourceEntity::new("item", "42").with_attribute("title", "Same");
	let touched = base
		.clone()
		.with_timestamps(datetime!(2025-01-01 00:00:00 UTC), datetime!(2025-01-02 00:00:00 UTC));
	let edited = base.clone().with_attribute("title", "Different");
	let base_doc = registry.serialize(&base).expect("Serialization failed.");

	assert_eq!(
		base_doc.content_hash,
		registry.serialize(&touched).expect("Serialization failed.").content_hash
	);
	assert_ne!(
		base_doc.content_hash,
		registry.serialize(&edited).expect("Serialization failed.").content_hash
	);
}
