//! RFC 3339 serde for zone-qualified timestamps. Values are written in UTC.

pub mod option;

use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
	#[error("Timestamp {0} is outside the representable UTC range.")]
	OutOfRange(OffsetDateTime),
	#[error(transparent)]
	Format(#[from] time::error::Format),
}

/// Renders `value` in UTC. Values whose UTC equivalent falls outside the supported calendar
/// range are an error, never a panic.
pub fn format(value: &OffsetDateTime) -> Result<String, FormatError> {
	let utc = value.checked_to_offset(UtcOffset::UTC).ok_or(FormatError::OutOfRange(*value))?;

	Ok(utc.format(&Rfc3339)?)
}

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = format(value).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn format_writes_utc() {
		assert_eq!(
			format(&datetime!(2024-03-01 09:30:00 +2)).expect("Format failed."),
			"2024-03-01T07:30:00Z"
		);
	}

	#[test]
	fn format_rejects_values_beyond_the_utc_range() {
		let edge = OffsetDateTime::parse("9999-12-31T23:00:00-05:00", &Rfc3339)
			.expect("Edge value should parse.");

		assert!(matches!(format(&edge), Err(FormatError::OutOfRange(_))));
	}
}
