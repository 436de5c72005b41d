use serde::{Deserialize, Serialize};

use crate::SourceEntity;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionDecision {
	pub excluded: bool,
	pub reason: Option<String>,
}
impl ExclusionDecision {
	pub fn included() -> Self {
		Self { excluded: false, reason: None }
	}

	pub fn excluded(reason: impl Into<String>) -> Self {
		Self { excluded: true, reason: Some(reason.into()) }
	}
}

#[derive(Clone, Debug)]
struct Rule {
	entity_type: String,
	reason: String,
	when: Vec<(String, Vec<String>)>,
}
impl Rule {
	fn matches(&self, entity: &SourceEntity) -> bool {
		if !entity.entity_type.trim().eq_ignore_ascii_case(&self.entity_type) {
			return false;
		}

		self.when.iter().all(|(key, accepted)| {
			entity
				.lookup(key)
				.map(|value| accepted.iter().any(|candidate| candidate.eq_ignore_ascii_case(&value)))
				.unwrap_or(false)
		})
	}
}

/// Decides which entities never reach the backend.
///
/// Evaluation is a pure function of the entity; nothing is cached between calls, so the hook,
/// push and status paths always agree.
#[derive(Clone, Debug, Default)]
pub struct ExclusionPolicy {
	rules: Vec<Rule>,
}
impl ExclusionPolicy {
	pub fn from_config(cfg: &vix_config::Exclusion) -> Self {
		let rules = cfg
			.rules
			.iter()
			.map(|rule| Rule {
				entity_type: rule.entity_type.trim().to_ascii_lowercase(),
				reason: rule.reason.clone(),
				when: rule
					.when
					.iter()
					.map(|(key, values)| {
						(key.clone(), values.iter().map(|value| value.trim().to_string()).collect())
					})
					.collect(),
			})
			.collect();

		Self { rules }
	}

	/// First matching rule wins.
	pub fn evaluate(&self, entity: &SourceEntity) -> ExclusionDecision {
		self.rules
			.iter()
			.find(|rule| rule.matches(entity))
			.map(|rule| ExclusionDecision::excluded(rule.reason.clone()))
			.unwrap_or_else(ExclusionDecision::included)
	}
}
