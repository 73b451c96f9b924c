// SPDX-License-Identifier: Apache-2.0

use super::{new_snapshot_id, project_row, TableCatalog};
use crate::error::{PlatformError, PlatformErrorCode};
use async_trait::async_trait;
use medallion_model::{ProvisionStatus, TableIdent, TableMetrics, TableSchema, TableSummary};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

const CATALOG_DDL: &str = "
CREATE TABLE IF NOT EXISTS catalog_tables (
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    schema_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    current_snapshot_id INTEGER,
    last_updated TEXT,
    PRIMARY KEY (namespace, name)
);
CREATE TABLE IF NOT EXISTS catalog_snapshots (
    snapshot_id INTEGER PRIMARY KEY,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    added_rows INTEGER NOT NULL,
    committed_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS catalog_rows (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    snapshot_id INTEGER NOT NULL,
    row_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_catalog_rows_table ON catalog_rows(namespace, name);
";

/// Iceberg-like catalog kept in a local SQLite file: tables, one snapshot per
/// append, and rows stored as JSON.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> Result<Self, PlatformError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(PlatformError::storage)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, PlatformError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PlatformError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(CATALOG_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_schema(conn: &Connection, ident: &TableIdent) -> Result<TableSchema, PlatformError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT schema_json FROM catalog_tables WHERE namespace = ?1 AND name = ?2",
                params![ident.namespace, ident.name],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| {
            PlatformError::new(PlatformErrorCode::NotFound, format!("table not found: {ident}"))
        })?;
        serde_json::from_str(&raw).map_err(PlatformError::storage)
    }
}

#[async_trait]
impl TableCatalog for SqliteCatalog {
    async fn list_tables(&self) -> Result<Vec<TableSummary>, PlatformError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT namespace, name FROM catalog_tables ORDER BY namespace, name")?;
        let rows = stmt.query_map([], |row| {
            Ok(format!(
                "{}.{}",
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?
            ))
        })?;
        let mut out = Vec::new();
        for name in rows {
            out.push(TableSummary { name: name? });
        }
        Ok(out)
    }

    async fn create_table(
        &self,
        ident: &TableIdent,
        schema: &TableSchema,
        location: &str,
    ) -> Result<ProvisionStatus, PlatformError> {
        let conn = self.conn.lock().await;
        let schema_json = serde_json::to_string(schema).map_err(PlatformError::storage)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO catalog_tables (namespace, name, location, schema_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ident.namespace,
                ident.name,
                location,
                schema_json,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        if inserted == 0 {
            return Ok(ProvisionStatus::Skipped);
        }
        info!(table = %ident, location, "catalog table created");
        Ok(ProvisionStatus::Created)
    }

    async fn append(&self, ident: &TableIdent, rows: &[Value]) -> Result<u64, PlatformError> {
        let mut conn = self.conn.lock().await;
        let schema = Self::load_schema(&conn, ident)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let snapshot_id = new_snapshot_id();
        let now = chrono::Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO catalog_rows (namespace, name, snapshot_id, row_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for row in rows {
                let json = project_row(&schema, row).to_string();
                insert.execute(params![ident.namespace, ident.name, snapshot_id, json])?;
            }
        }
        tx.execute(
            "INSERT INTO catalog_snapshots (snapshot_id, namespace, name, added_rows, committed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![snapshot_id, ident.namespace, ident.name, rows.len() as i64, now],
        )?;
        tx.execute(
            "UPDATE catalog_tables SET current_snapshot_id = ?1, last_updated = ?2
             WHERE namespace = ?3 AND name = ?4",
            params![snapshot_id, now, ident.namespace, ident.name],
        )?;
        tx.commit()?;
        Ok(rows.len() as u64)
    }

    async fn scan(&self, ident: &TableIdent) -> Result<Vec<Value>, PlatformError> {
        let conn = self.conn.lock().await;
        Self::load_schema(&conn, ident)?;
        let mut stmt = conn.prepare(
            "SELECT row_json FROM catalog_rows WHERE namespace = ?1 AND name = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![ident.namespace, ident.name], |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(serde_json::from_str(&raw?).map_err(PlatformError::storage)?);
        }
        Ok(out)
    }

    async fn metrics(&self, ident: &TableIdent) -> Result<TableMetrics, PlatformError> {
        let conn = self.conn.lock().await;
        let head: Option<(Option<i64>, Option<String>)> = conn
            .query_row(
                "SELECT current_snapshot_id, last_updated FROM catalog_tables
                 WHERE namespace = ?1 AND name = ?2",
                params![ident.namespace, ident.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (current_snapshot_id, last_updated) = head.ok_or_else(|| {
            PlatformError::new(PlatformErrorCode::NotFound, format!("table not found: {ident}"))
        })?;
        let (snapshots, records): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(added_rows), 0) FROM catalog_snapshots
             WHERE namespace = ?1 AND name = ?2",
            params![ident.namespace, ident.name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(TableMetrics {
            name: ident.to_string(),
            record_count: records.max(0) as u64,
            snapshot_count: snapshots.max(0) as u64,
            current_snapshot_id,
            last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medallion_model::cleansed_schema;
    use serde_json::json;

    fn ident() -> TableIdent {
        TableIdent::parse("telemetry.cleansed").expect("ident")
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let catalog = SqliteCatalog::in_memory().expect("catalog");
        let schema = cleansed_schema();
        assert_eq!(
            catalog.create_table(&ident(), &schema, "s3://silver-bucket/x").await.expect("create"),
            ProvisionStatus::Created
        );
        assert_eq!(
            catalog.create_table(&ident(), &schema, "s3://silver-bucket/x").await.expect("create"),
            ProvisionStatus::Skipped
        );
        let names: Vec<_> = catalog
            .list_tables()
            .await
            .expect("list")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["telemetry.cleansed"]);
    }

    #[tokio::test]
    async fn appends_create_snapshots() {
        let catalog = SqliteCatalog::in_memory().expect("catalog");
        catalog
            .create_table(&ident(), &cleansed_schema(), "s3://silver-bucket/x")
            .await
            .expect("create");
        let empty = catalog.metrics(&ident()).await.expect("metrics");
        assert_eq!(empty.snapshot_count, 0);
        assert!(empty.current_snapshot_id.is_none());

        let rows = vec![
            json!({"event_id": "a", "temperature": 70.5, "noise": 1}),
            json!({"event_id": "b", "temperature": 71.0}),
        ];
        assert_eq!(catalog.append(&ident(), &rows).await.expect("append"), 2);
        assert_eq!(catalog.append(&ident(), &rows[..1]).await.expect("append"), 1);

        let metrics = catalog.metrics(&ident()).await.expect("metrics");
        assert_eq!(metrics.record_count, 3);
        assert_eq!(metrics.snapshot_count, 2);
        assert!(metrics.current_snapshot_id.is_some_and(|id| id > 0));

        let scanned = catalog.scan(&ident()).await.expect("scan");
        assert_eq!(scanned.len(), 3);
        assert!(scanned[0].get("noise").is_none());
        assert_eq!(scanned[1]["event_id"], "b");
    }

    #[tokio::test]
    async fn unknown_table_is_not_found() {
        let catalog = SqliteCatalog::in_memory().expect("catalog");
        let err = catalog.scan(&ident()).await.expect_err("missing");
        assert_eq!(err.code, PlatformErrorCode::NotFound);
        let err = catalog.metrics(&ident()).await.expect_err("missing");
        assert_eq!(err.code, PlatformErrorCode::NotFound);
    }

    #[tokio::test]
    async fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("catalog.db");
        let catalog = SqliteCatalog::open(&path).expect("open");
        assert!(catalog.list_tables().await.expect("list").is_empty());
        assert!(path.exists());
    }
}
