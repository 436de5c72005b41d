use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use time::{UtcOffset, macros::offset};
use toml::Value;

use vix_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_value() -> Value {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.")
}

fn table_mut<'a>(value: &'a mut Value, path: &[&str]) -> &'a mut toml::Table {
	let mut current = value.as_table_mut().expect("Template config must be a table.");

	for key in path {
		current = current
			.get_mut(*key)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{key}]."));
	}

	current
}

fn render(value: &Value) -> String {
	toml::to_string(value).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("vix_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_value(value: &Value) -> Result<Config, Error> {
	let path = write_temp_config(render(value));
	let result = vix_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(value: &Value, needle: &str) {
	let err = load_value(value).expect_err("Expected validation error.");
	let message = err.to_string();

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");
	assert!(message.contains(needle), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_value(&sample_value()).expect("Sample config must load.");

	assert_eq!(cfg.documents.base_url.as_deref(), Some("https://tracker.example.com"));
	assert!(cfg.storage.qdrant.api_key.is_none());
	assert_eq!(cfg.exclusion.rules.len(), 1);
	assert_eq!(cfg.retrieval.type_weights.get("comment"), Some(&0.6));
}

#[test]
fn omitted_sections_fall_back_to_defaults() {
	let mut value = sample_value();
	let root = value.as_table_mut().expect("Template config must be a table.");

	root.remove("documents");
	root.remove("exclusion");
	root.remove("retrieval");

	let cfg = load_value(&value).expect("Config without optional sections must load.");

	assert_eq!(cfg.documents.naive_utc_offset, "+00:00");
	assert_eq!(cfg.retrieval.default_limit, 10);
	assert_eq!(cfg.exclusion.rules.len(), 1);
	assert_eq!(cfg.exclusion.rules[0].entity_type, "attachment");
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut value = sample_value();

	table_mut(&mut value, &["providers", "embedding"])
		.insert("dimensions".to_string(), Value::Integer(768));

	expect_validation(&value, "must match storage.qdrant.vector_dim");
}

#[test]
fn source_view_must_be_an_identifier() {
	let mut value = sample_value();

	table_mut(&mut value, &["storage", "postgres"])
		.insert("source_view".to_string(), Value::String("entities; DROP TABLE x".to_string()));

	expect_validation(&value, "storage.postgres.source_view");
}

#[test]
fn naive_offset_must_parse() {
	let mut value = sample_value();

	table_mut(&mut value, &["documents"])
		.insert("naive_utc_offset".to_string(), Value::String("Europe/Berlin".to_string()));

	expect_validation(&value, "documents.naive_utc_offset");
}

#[test]
fn exclusion_rules_must_name_known_types() {
	let mut value = sample_value();
	let rules = table_mut(&mut value, &["exclusion"])
		.get_mut("rules")
		.and_then(Value::as_array_mut)
		.expect("Template config must include [[exclusion.rules]].");
	let rule = rules[0].as_table_mut().expect("Rule must be a table.");

	rule.insert("entity_type".to_string(), Value::String("wiki_page".to_string()));

	expect_validation(&value, "is not a known entity type");
}

#[test]
fn type_weights_must_be_non_negative() {
	let mut value = sample_value();

	table_mut(&mut value, &["retrieval", "type_weights"])
		.insert("release".to_string(), Value::Float(-0.5));

	expect_validation(&value, "retrieval.type_weights.release");
}

#[test]
fn default_limit_must_not_exceed_max_limit() {
	let mut value = sample_value();

	table_mut(&mut value, &["retrieval"]).insert("default_limit".to_string(), Value::Integer(80));

	expect_validation(&value, "retrieval.default_limit must not exceed");
}

#[test]
fn disabled_index_may_omit_url() {
	let mut value = sample_value();
	let qdrant = table_mut(&mut value, &["storage", "qdrant"]);

	qdrant.insert("enabled".to_string(), Value::Boolean(false));
	qdrant.insert("url".to_string(), Value::String(String::new()));

	let cfg = load_value(&value).expect("Disabled index must not require a URL.");

	assert!(!cfg.storage.qdrant.enabled);
}

#[test]
fn utc_offsets_parse() {
	assert_eq!(vix_config::parse_utc_offset("+02:00"), Some(offset!(+2)));
	assert_eq!(vix_config::parse_utc_offset(" -05:30 "), Some(offset!(-5:30)));
	assert_eq!(vix_config::parse_utc_offset("Z"), Some(UtcOffset::UTC));
	assert_eq!(vix_config::parse_utc_offset("+23:59"), Some(offset!(+23:59)));
	assert_eq!(vix_config::parse_utc_offset("0200"), None);
	assert_eq!(vix_config::parse_utc_offset("+2:00"), None);
	assert_eq!(vix_config::parse_utc_offset("+24:00"), None);
	assert_eq!(vix_config::parse_utc_offset("+02:60"), None);
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("vix_config_test_missing.toml");
	let err = vix_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
