use uuid::Uuid;

/// Namespace for every backend id. Changing it orphans every indexed document.
pub const NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_3f2e_9a4c_5e07_8d21_4f0c_7a9e_3b55);

/// Deterministic backend id for `(entity_type, object_id)`.
///
/// The type tag is trimmed and lower-cased and the id trimmed, so `"Item", " 42"` and
/// `"item", "42"` address the same document.
pub fn backend_id(entity_type: &str, object_id: &str) -> Uuid {
	let name = format!("{}:{}", entity_type.trim().to_ascii_lowercase(), object_id.trim());

	Uuid::new_v5(&NAMESPACE, name.as_bytes())
}
