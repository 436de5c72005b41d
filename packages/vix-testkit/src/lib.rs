//! Live-backend fixtures for tests gated on `VIX_PG_DSN` and `VIX_QDRANT_URL`.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread, time::Duration};

use qdrant_client::Qdrant;
use sqlx::{
	ConnectOptions, Connection, Executor, PgPool,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

/// Table shaped like the tracker's source view. Tests insert rows directly.
const SOURCE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS {name} (
	entity_type text NOT NULL,
	object_id text NOT NULL,
	project_id text,
	parent_type text,
	parent_id text,
	attributes jsonb NOT NULL DEFAULT '{}'::jsonb,
	created_at {ts_type},
	updated_at {ts_type},
	PRIMARY KEY (entity_type, object_id)
)";

/// A throwaway Postgres database, dropped by [`TestDatabase::cleanup`] or on drop.
pub struct TestDatabase {
	name: String,
	dsn: String,
	admin_options: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base_options = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("VIX_PG_DSN does not parse: {err}.")))?;
		let admin_options = base_options.clone().database("postgres");
		let mut admin = PgConnection::connect_with(&admin_options).await?;
		let name = format!("vix_test_{}", Uuid::new_v4().simple());

		admin.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;

		let dsn = base_options.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin_options, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Creates a source table named `name`. `naive` selects `timestamp` columns instead of
	/// `timestamptz`.
	pub async fn create_source_table(&self, pool: &PgPool, name: &str, naive: bool) -> Result<()> {
		let ts_type = if naive { "timestamp" } else { "timestamptz" };
		let sql = SOURCE_TABLE_SQL.replace("{name}", name).replace("{ts_type}", ts_type);

		sqlx::query(&sql).execute(pool).await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.admin_options).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let admin_options = self.admin_options.clone();
		// Drop runs inside the test's runtime, so the async cleanup gets a runtime of its own.
		let worker = thread::spawn(move || {
			let result = Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| Error::Message(err.to_string()))
				.and_then(|runtime| runtime.block_on(drop_database(&name, &admin_options)));

			if let Err(err) = result {
				eprintln!("Failed to drop test database {name}: {err}.");
			}
		});
		let _ = worker.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var("VIX_PG_DSN").ok()
}

pub fn env_qdrant_url() -> Option<String> {
	env::var("VIX_QDRANT_URL").ok()
}

/// Unique collection name for Qdrant tests.
pub fn scratch_collection(prefix: &str) -> String {
	format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Deletes a scratch collection. A missing `VIX_QDRANT_URL` makes this a no-op.
pub async fn drop_collection(collection: &str) -> Result<()> {
	let Some(url) = env_qdrant_url() else {
		return Ok(());
	};
	let client = Qdrant::from_url(&url).build()?;

	match time::timeout(Duration::from_secs(10), client.delete_collection(collection.to_string()))
		.await
	{
		Ok(result) => {
			result?;

			Ok(())
		},
		Err(_) => Err(Error::Message(format!("Timed out deleting collection {collection:?}."))),
	}
}

async fn drop_database(name: &str, admin_options: &PgConnectOptions) -> Result<()> {
	let mut admin = PgConnection::connect_with(admin_options).await?;

	sqlx::query(
		"SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
		 WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut admin)
	.await?;
	sqlx::query(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str()).execute(&mut admin).await?;

	Ok(())
}
