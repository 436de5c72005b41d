mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Documents, ENTITY_TYPES, EmbeddingProviderConfig, Exclusion, ExclusionRule, Postgres,
	Providers, Qdrant, Retrieval, Security, Service, Storage,
};

use std::{fs, path::Path};

use time::{UtcOffset, macros::format_description};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.qdrant.collection", &cfg.storage.qdrant.collection),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.qdrant.enabled && cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty when the index is enabled.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if !is_sql_identifier(&cfg.storage.postgres.source_view) {
		return Err(Error::Validation {
			message: "storage.postgres.source_view must be a plain SQL identifier.".to_string(),
		});
	}
	if parse_utc_offset(&cfg.documents.naive_utc_offset).is_none() {
		return Err(Error::Validation {
			message: "documents.naive_utc_offset must look like +HH:MM or -HH:MM.".to_string(),
		});
	}
	if cfg.documents.max_primary_chars == 0 {
		return Err(Error::Validation {
			message: "documents.max_primary_chars must be greater than zero.".to_string(),
		});
	}

	for rule in &cfg.exclusion.rules {
		if !ENTITY_TYPES.contains(&rule.entity_type.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"exclusion.rules.entity_type {:?} is not a known entity type.",
					rule.entity_type
				),
			});
		}
		if rule.reason.trim().is_empty() {
			return Err(Error::Validation {
				message: "exclusion.rules.reason must be non-empty.".to_string(),
			});
		}
		if rule.when.values().any(|values| values.is_empty()) {
			return Err(Error::Validation {
				message: "exclusion.rules.when values must be non-empty lists.".to_string(),
			});
		}
	}

	let retrieval = &cfg.retrieval;

	if retrieval.default_limit == 0 || retrieval.max_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval.default_limit and retrieval.max_limit must be greater than zero."
				.to_string(),
		});
	}
	if retrieval.default_limit > retrieval.max_limit {
		return Err(Error::Validation {
			message: "retrieval.default_limit must not exceed retrieval.max_limit.".to_string(),
		});
	}
	if retrieval.candidate_k < retrieval.max_limit {
		return Err(Error::Validation {
			message: "retrieval.candidate_k must be at least retrieval.max_limit.".to_string(),
		});
	}
	if retrieval.rag_top_k == 0 || retrieval.rag_max_chars == 0 {
		return Err(Error::Validation {
			message: "retrieval.rag_top_k and retrieval.rag_max_chars must be greater than zero."
				.to_string(),
		});
	}

	for (entity_type, weight) in &retrieval.type_weights {
		if !ENTITY_TYPES.contains(&entity_type.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"retrieval.type_weights key {entity_type:?} is not a known entity type."
				),
			});
		}
		if !weight.is_finite() || *weight < 0.0 {
			return Err(Error::Validation {
				message: format!(
					"retrieval.type_weights.{entity_type} must be a finite number zero or greater."
				),
			});
		}
	}

	Ok(())
}

/// Parses "+HH:MM" / "-HH:MM" (or "Z"). Offsets of a full day or more are rejected.
pub fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
	let raw = raw.trim();

	if raw.eq_ignore_ascii_case("z") {
		return Some(UtcOffset::UTC);
	}

	UtcOffset::parse(raw, format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
		.ok()
		.filter(|offset| offset.whole_hours().abs() < 24)
}

fn is_sql_identifier(raw: &str) -> bool {
	let mut chars = raw.chars();
	let Some(first) = chars.next() else { return false };

	(first.is_ascii_lowercase() || first == '_')
		&& chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '.')
}

fn normalize(cfg: &mut Config) {
	if cfg.documents.base_url.as_deref().map(|url| url.trim().is_empty()).unwrap_or(false) {
		cfg.documents.base_url = None;
	}
	if let Some(url) = cfg.documents.base_url.as_mut() {
		let trimmed = url.trim().trim_end_matches('/').to_string();

		*url = trimmed;
	}
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}

	for rule in &mut cfg.exclusion.rules {
		rule.entity_type = rule.entity_type.trim().to_ascii_lowercase();
	}
}
