pub type Result<T, E = SerializeError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
	#[error("Unsupported entity type: {entity_type}.")]
	UnsupportedType { entity_type: String },
	#[error("Invalid {entity_type} entity {object_id}: {message}")]
	InvalidEntity { entity_type: String, object_id: String, message: String },
}
