//! libSQL catalog store.
//!
//! The [`Catalog`] struct wraps a local libSQL database holding the mirrored
//! schema: types, fields, arguments, modules, data sources, data objects and
//! an FTS5 search index maintained by triggers.
//!
//! **Access rules:**
//! - rebuild/reload/summarize paths: read-write via [`Catalog::open`]
//! - search and status paths may use [`Catalog::open_readonly`]

mod migrations;
mod merge;
mod search;
mod summary;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

use schemascribe_shared::{Result, SchemaScribeError};

pub use merge::{MergeMode, MergeOutcome, OwnerPredicate};
pub use search::{SearchItem, SearchPage};
pub use summary::FunctionFieldBrief;

/// Primary catalog handle wrapping a libSQL database.
#[derive(Debug)]
pub struct Catalog {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Catalog {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SchemaScribeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;

        let catalog = Self {
            db,
            conn,
            readonly: false,
        };
        catalog.check_version().await?;
        catalog.run_migrations().await?;
        Ok(catalog)
    }

    /// Open a database at `path` in read-only mode. No migrations are applied.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;

        let catalog = Self {
            db,
            conn,
            readonly: true,
        };
        catalog.check_version().await?;
        Ok(catalog)
    }

    /// Refuse databases written by a newer build.
    async fn check_version(&self) -> Result<()> {
        let version = self.schema_version().await;
        if version > migrations::LATEST_VERSION {
            return Err(SchemaScribeError::validation(format!(
                "catalog schema version {version} is newer than supported version {}",
                migrations::LATEST_VERSION
            )));
        }
        Ok(())
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SchemaScribeError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SchemaScribeError::Storage(
                "catalog is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Empty every catalog table. The FTS index follows through its triggers.
    pub async fn clear_all(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute_batch(
                "DELETE FROM arguments;
                 DELETE FROM fields;
                 DELETE FROM types;
                 DELETE FROM modules;
                 DELETE FROM data_sources;
                 DELETE FROM data_object_queries;
                 DELETE FROM data_objects;",
            )
            .await
            .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Per-table row and summarization counts, for status reporting.
    pub async fn counts(&self) -> Result<CatalogCounts> {
        Ok(CatalogCounts {
            types: self.count_table("types").await?,
            types_summarized: self
                .count_where("types", "is_summarized = 1")
                .await?,
            fields: self.count_table("fields").await?,
            arguments: self.count_table("arguments").await?,
            modules: self.count_table("modules").await?,
            modules_summarized: self
                .count_where("modules", "is_summarized = 1")
                .await?,
            data_sources: self.count_table("data_sources").await?,
            data_objects: self.count_table("data_objects").await?,
        })
    }

    async fn count_table(&self, table: &str) -> Result<u64> {
        self.count_where(table, "1 = 1").await
    }

    async fn count_where(&self, table: &str, cond: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {cond}");
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<u64>(0).unwrap_or(0)),
            Ok(None) => Ok(0),
            Err(e) => Err(SchemaScribeError::Storage(e.to_string())),
        }
    }
}

/// Row counts used by status reporting.
#[derive(Debug, Clone, Default)]
pub struct CatalogCounts {
    pub types: u64,
    pub types_summarized: u64,
    pub fields: u64,
    pub arguments: u64,
    pub modules: u64,
    pub modules_summarized: u64,
    pub data_sources: u64,
    pub data_objects: u64,
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| SchemaScribeError::Storage(e.to_string()))
}

pub(crate) fn get_bool(row: &libsql::Row, idx: i32) -> Result<bool> {
    let v: i64 = row
        .get(idx)
        .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;
    Ok(v != 0)
}

pub(crate) fn get_time(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    let s: String = row
        .get(idx)
        .map_err(|e| SchemaScribeError::Storage(e.to_string()))?;
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SchemaScribeError::Storage(format!("invalid timestamp: {e}")))
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Catalog;
    use uuid::Uuid;

    /// Create a temp file catalog for testing.
    pub(crate) async fn test_catalog() -> Catalog {
        let tmp = std::env::temp_dir().join(format!("scribe_test_{}.db", Uuid::now_v7()));
        Catalog::open(&tmp).await.expect("open test db")
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::test_catalog;
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn open_and_migrate() {
        let catalog = test_catalog().await;
        assert_eq!(catalog.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("scribe_test_{}.db", Uuid::now_v7()));
        let c1 = Catalog::open(&tmp).await.expect("first open");
        drop(c1);
        let c2 = Catalog::open(&tmp).await.expect("second open");
        assert_eq!(c2.schema_version().await, 1);
    }

    #[tokio::test]
    async fn refuses_newer_schema_version() {
        let tmp = std::env::temp_dir().join(format!("scribe_test_{}.db", Uuid::now_v7()));
        let c1 = Catalog::open(&tmp).await.expect("open");
        c1.conn
            .execute(
                "INSERT INTO schema_migrations (version) VALUES (99)",
                params![],
            )
            .await
            .expect("bump version");
        drop(c1);

        let err = Catalog::open(&tmp).await.expect_err("must refuse");
        assert!(matches!(err, SchemaScribeError::Validation { .. }));
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("scribe_test_{}.db", Uuid::now_v7()));
        let c1 = Catalog::open(&tmp).await.expect("open");
        drop(c1);

        let ro = Catalog::open_readonly(&tmp).await.expect("open readonly");
        let err = ro.clear_all().await.expect_err("write must fail");
        assert!(matches!(err, SchemaScribeError::Storage(_)));
    }

    #[tokio::test]
    async fn counts_empty_database() {
        let catalog = test_catalog().await;
        let counts = catalog.counts().await.expect("counts");
        assert_eq!(counts.types, 0);
        assert_eq!(counts.modules, 0);
        assert_eq!(counts.data_objects, 0);
    }
}
