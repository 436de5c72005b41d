pub mod document;
pub mod entity;
pub mod exclusion;
pub mod identity;
pub mod serialize;
pub mod time_serde;
pub mod timestamp;

mod error;

pub use document::IndexDocument;
pub use entity::{EntityKind, EntityRef, SourceEntity, SourceTimestamp};
pub use error::{Result, SerializeError};
pub use exclusion::{ExclusionDecision, ExclusionPolicy};
pub use serialize::{DocumentDraft, SerializeContext, SerializeFn, SerializerRegistry};
