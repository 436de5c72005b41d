//! Read-only access to the tracker's entities through a host-provided view.
//!
//! The view exposes one row per entity:
//! `entity_type text, object_id text, project_id text, parent_type text, parent_id text,
//! attributes jsonb, created_at, updated_at`. Timestamp columns may be `timestamptz` or naive
//! `timestamp`; naive values are passed on untouched and resolved during serialization.

use serde_json::{Map, Value};
use sqlx::{PgPool, Row, postgres::PgRow};
use time::{OffsetDateTime, PrimitiveDateTime};

use vix_domain::{EntityRef, SourceEntity, SourceTimestamp};

use crate::{Error, Result};

const COLUMNS: &str =
	"entity_type, object_id, project_id, parent_type, parent_id, attributes, created_at, updated_at";

#[derive(Clone)]
pub struct PgEntitySource {
	pool: PgPool,
	view: String,
}
impl PgEntitySource {
	pub fn new(pool: PgPool, view: &str) -> Result<Self> {
		if view.is_empty() || !view.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
		{
			return Err(Error::InvalidArgument(format!("Invalid source view name {view:?}.")));
		}

		Ok(Self { pool, view: view.to_string() })
	}

	pub async fn fetch(&self, entity_type: &str, object_id: &str) -> Result<Option<SourceEntity>> {
		let sql = format!(
			"SELECT {COLUMNS} FROM {} WHERE lower(entity_type) = $1 AND object_id = $2 LIMIT 1",
			self.view
		);
		let row = sqlx::query(&sql)
			.bind(entity_type.trim().to_ascii_lowercase())
			.bind(object_id.trim())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(decode_row).transpose()
	}

	/// Entities of one type belonging to `project_id`, ordered by id so a resync walks them in a
	/// stable order.
	pub async fn list_in_project(
		&self,
		project_id: &str,
		entity_type: &str,
	) -> Result<Vec<SourceEntity>> {
		let sql = format!(
			"SELECT {COLUMNS} FROM {} WHERE project_id = $1 AND lower(entity_type) = $2 ORDER BY object_id",
			self.view
		);
		let rows = sqlx::query(&sql)
			.bind(project_id.trim())
			.bind(entity_type.trim().to_ascii_lowercase())
			.fetch_all(&self.pool)
			.await?;

		rows.iter().map(decode_row).collect()
	}
}

fn decode_row(row: &PgRow) -> Result<SourceEntity> {
	let entity_type: String = row.try_get("entity_type")?;
	let object_id: String = row.try_get("object_id")?;
	let project_id: Option<String> = row.try_get("project_id")?;
	let parent_type: Option<String> = row.try_get("parent_type")?;
	let parent_id: Option<String> = row.try_get("parent_id")?;
	let attributes: Option<Value> = row.try_get("attributes")?;
	let attributes = match attributes {
		Some(Value::Object(map)) => map,
		Some(Value::Null) | None => Map::new(),
		Some(_) => {
			return Err(Error::InvalidArgument(format!(
				"Attributes of {entity_type}:{object_id} must be a JSON object."
			)));
		},
	};
	let parent = match (parent_type, parent_id) {
		(Some(entity_type), Some(object_id)) => Some(EntityRef { entity_type, object_id }),
		_ => None,
	};

	Ok(SourceEntity {
		created_at: decode_timestamp(row, "created_at")?,
		updated_at: decode_timestamp(row, "updated_at")?,
		entity_type,
		object_id,
		project_id,
		parent,
		attributes,
	})
}

fn decode_timestamp(row: &PgRow, column: &str) -> Result<Option<SourceTimestamp>> {
	match row.try_get::<Option<OffsetDateTime>, _>(column) {
		Ok(value) => Ok(value.map(SourceTimestamp::Zoned)),
		Err(sqlx::Error::ColumnDecode { .. }) => {
			let value: Option<PrimitiveDateTime> = row.try_get(column)?;

			Ok(value.map(SourceTimestamp::Naive))
		},
		Err(err) => Err(err.into()),
	}
}
