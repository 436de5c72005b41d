use time::{
	Date, OffsetDateTime, PrimitiveDateTime, UtcOffset, format_description::well_known::Rfc3339,
	macros::format_description,
};

use crate::SourceTimestamp;

/// Resolves a configured "+HH:MM" offset, falling back to UTC for anything unparsable.
/// Config validation rejects bad offsets, so the fallback only matters for hand-built configs.
pub fn offset_from_config(raw: &str) -> UtcOffset {
	vix_config::parse_utc_offset(raw).unwrap_or(UtcOffset::UTC)
}

pub fn resolve(ts: SourceTimestamp, naive_offset: UtcOffset) -> OffsetDateTime {
	match ts {
		SourceTimestamp::Zoned(value) => value,
		SourceTimestamp::Naive(value) => value.assume_offset(naive_offset),
	}
}

/// Parses a timestamp-valued attribute. Zone-qualified RFC 3339 input keeps its offset; naive
/// date-times and bare dates are placed in `naive_offset`.
pub fn parse_attribute(raw: &str, naive_offset: UtcOffset) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	if raw.is_empty() {
		return None;
	}
	if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Some(value);
	}

	let spaced = format_description!(
		"[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
	);
	let t_separated = format_description!(
		"[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
	);

	for format in [spaced, t_separated] {
		if let Ok(value) = PrimitiveDateTime::parse(raw, format) {
			return Some(value.assume_offset(naive_offset));
		}
	}

	Date::parse(raw, format_description!("[year]-[month]-[day]"))
		.ok()
		.map(|date| date.midnight().assume_offset(naive_offset))
}

#[cfg(test)]
mod tests {
	use time::macros::{datetime, offset};

	use super::*;

	#[test]
	fn naive_values_take_the_configured_offset() {
		let naive = SourceTimestamp::Naive(datetime!(2024-03-01 09:30:00));

		assert_eq!(resolve(naive, offset!(+2)), datetime!(2024-03-01 09:30:00 +2));
	}

	#[test]
	fn zoned_values_are_untouched() {
		let zoned = SourceTimestamp::Zoned(datetime!(2024-03-01 09:30:00 -5));

		assert_eq!(resolve(zoned, offset!(+2)), datetime!(2024-03-01 09:30:00 -5));
	}

	#[test]
	fn attribute_formats_parse() {
		assert_eq!(
			parse_attribute("2024-03-01T09:30:00Z", offset!(+2)),
			Some(datetime!(2024-03-01 09:30:00 UTC))
		);
		assert_eq!(
			parse_attribute("2024-03-01 09:30:00.250", offset!(+2)),
			Some(datetime!(2024-03-01 09:30:00.25 +2))
		);
		assert_eq!(
			parse_attribute("2024-03-01T09:30:00", UtcOffset::UTC),
			Some(datetime!(2024-03-01 09:30:00 UTC))
		);
		assert_eq!(
			parse_attribute("2024-03-01", offset!(-3)),
			Some(datetime!(2024-03-01 00:00:00 -3))
		);
		assert_eq!(parse_attribute("next tuesday", UtcOffset::UTC), None);
	}

	#[test]
	fn config_offsets_resolve() {
		assert_eq!(offset_from_config("+05:30"), offset!(+5:30));
		assert_eq!(offset_from_config("garbage"), UtcOffset::UTC);
	}
}
