use vix_domain::SerializeError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The index is disabled or misconfigured. Raised before any network call.
	#[error("Vector index unavailable: {message}")]
	BackendUnavailable { message: String },
	/// The addressed document or entity does not exist.
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Backend {operation} failed: {message}")]
	Backend { operation: String, message: String },
	#[error("Unsupported entity type: {entity_type}.")]
	UnsupportedType { entity_type: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Source error: {message}")]
	Source { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl Error {
	/// Maps a storage failure seen during `operation`. A point-level not-found stays
	/// distinguishable; everything else is a backend failure.
	pub fn backend(operation: &str, err: vix_storage::Error) -> Self {
		match err {
			vix_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::Backend { operation: operation.to_string(), message: other.to_string() },
		}
	}

	pub fn source(err: vix_storage::Error) -> Self {
		match err {
			vix_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Source { message: other.to_string() },
		}
	}
}

impl From<SerializeError> for Error {
	fn from(err: SerializeError) -> Self {
		match err {
			SerializeError::UnsupportedType { entity_type } => Self::UnsupportedType { entity_type },
			err @ SerializeError::InvalidEntity { .. } =>
				Self::InvalidRequest { message: err.to_string() },
		}
	}
}

impl From<vix_providers::Error> for Error {
	fn from(err: vix_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
