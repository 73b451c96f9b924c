// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use medallion_model::{
    BootstrapState, ConnectionProfile, DemoEvent, ProfileUpdate, S3Credentials, ServiceState,
    ServiceStatus, DEFAULT_PROFILE_ID, DEFAULT_PROFILE_NAME,
};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

const STATE_DDL: &str = "
CREATE TABLE IF NOT EXISTS connection_profile (
    id TEXT PRIMARY KEY DEFAULT 'default',
    name TEXT NOT NULL,
    cluster_host TEXT NOT NULL,
    username TEXT,
    password TEXT,
    created_at TEXT,
    updated_at TEXT,
    configured INTEGER NOT NULL DEFAULT 0,
    s3_credentials TEXT,
    polaris_credentials TEXT
);
CREATE TABLE IF NOT EXISTS service_status (
    service_name TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    message TEXT NOT NULL,
    required INTEGER NOT NULL DEFAULT 0,
    fix_guidance TEXT,
    checked_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS bootstrap_state (
    id TEXT PRIMARY KEY,
    topics_created INTEGER NOT NULL,
    tables_created INTEGER NOT NULL,
    bootstrapped_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS demo_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id TEXT NOT NULL,
    category TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_demo_events_profile ON demo_events(profile_id, id);
";

/// Tables `/debug/table/:name` may read.
pub const DEBUG_TABLES: [&str; 4] = [
    "connection_profile",
    "service_status",
    "bootstrap_state",
    "demo_events",
];

const REDACTED_COLUMNS: [&str; 3] = ["password", "s3_credentials", "polaris_credentials"];
const REDACTED: &str = "***";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateError(pub String);

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StateError {}

impl From<rusqlite::Error> for StateError {
    fn from(err: rusqlite::Error) -> Self {
        Self(err.to_string())
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionProfile> {
    Ok(ConnectionProfile {
        id: row.get("id")?,
        name: row.get("name")?,
        cluster_host: row.get("cluster_host")?,
        username: row.get("username")?,
        password: row.get("password")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        configured: row.get::<_, i64>("configured")? != 0,
        s3_credentials: row.get("s3_credentials")?,
        polaris_credentials: row.get("polaris_credentials")?,
    })
}

fn read_profile(conn: &Connection) -> Result<Option<ConnectionProfile>, StateError> {
    Ok(conn
        .query_row(
            "SELECT * FROM connection_profile WHERE id = ?1",
            params![DEFAULT_PROFILE_ID],
            profile_from_row,
        )
        .optional()?)
}

fn json_cell(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => json!(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => json!(format!("<{} bytes>", b.len())),
    }
}

/// Local state of the demo: the connection profile, the last service
/// discovery, the bootstrap marker and the run log.
pub struct StateDb {
    conn: Mutex<Connection>,
    profile_cache: RwLock<Option<ConnectionProfile>>,
}

impl StateDb {
    pub fn open(path: &Path) -> Result<Self, StateError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError(e.to_string()))?;
        }
        let db = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "state database ready");
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, StateError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StateError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(STATE_DDL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            profile_cache: RwLock::new(None),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|_| StateError("state database lock poisoned".to_string()))
    }

    /// Cache fills and invalidations both happen under the connection guard,
    /// so a reader can never cache a row older than the last write.
    fn invalidate_profile(&self, _held: &Connection) {
        if let Ok(mut cache) = self.profile_cache.write() {
            *cache = None;
        }
    }

    /// The stored profile, or `None` when nothing was saved yet.
    pub fn load_profile(&self) -> Result<Option<ConnectionProfile>, StateError> {
        if let Ok(cache) = self.profile_cache.read() {
            if let Some(profile) = cache.as_ref() {
                return Ok(Some(profile.clone()));
            }
        }
        let conn = self.conn()?;
        let profile = read_profile(&conn)?;
        if let (Some(p), Ok(mut cache)) = (profile.as_ref(), self.profile_cache.write()) {
            *cache = Some(p.clone());
        }
        drop(conn);
        Ok(profile)
    }

    /// The stored profile, falling back to the unconfigured default.
    pub fn profile_or_default(&self) -> Result<ConnectionProfile, StateError> {
        Ok(self.load_profile()?.unwrap_or_default())
    }

    /// Saves the profile and marks it configured. Absent password or Polaris
    /// credentials keep the stored values; stored S3 keys and service statuses
    /// are dropped when the host or user changes.
    pub fn upsert_profile(&self, update: ProfileUpdate) -> Result<ConnectionProfile, StateError> {
        let mut conn = self.conn()?;
        let existing = read_profile(&conn)?;
        let now = now_rfc3339();
        let cluster_host = update.cluster_host_trimmed().unwrap_or("").to_string();
        let username = non_empty(update.username);
        let identity_changed = existing
            .as_ref()
            .is_some_and(|e| e.cluster_host != cluster_host || e.username != username);
        let profile = ConnectionProfile {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: non_empty(update.name).unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string()),
            cluster_host,
            password: non_empty(update.password)
                .or_else(|| existing.as_ref().and_then(|e| e.password.clone())),
            polaris_credentials: non_empty(update.polaris_credentials)
                .or_else(|| existing.as_ref().and_then(|e| e.polaris_credentials.clone())),
            s3_credentials: existing
                .as_ref()
                .filter(|_| !identity_changed)
                .and_then(|e| e.s3_credentials.clone()),
            created_at: Some(
                existing
                    .as_ref()
                    .and_then(|e| e.created_at.clone())
                    .unwrap_or_else(|| now.clone()),
            ),
            updated_at: Some(now),
            username,
            configured: true,
        };
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO connection_profile
                (id, name, cluster_host, username, password, created_at, updated_at, configured, s3_credentials, polaris_credentials)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                cluster_host = excluded.cluster_host,
                username = excluded.username,
                password = excluded.password,
                updated_at = excluded.updated_at,
                configured = 1,
                s3_credentials = excluded.s3_credentials,
                polaris_credentials = excluded.polaris_credentials",
            params![
                profile.id,
                profile.name,
                profile.cluster_host,
                profile.username,
                profile.password,
                profile.created_at,
                profile.updated_at,
                profile.s3_credentials,
                profile.polaris_credentials,
            ],
        )?;
        if identity_changed {
            tx.execute("DELETE FROM service_status", [])?;
        }
        tx.commit()?;
        self.invalidate_profile(&conn);
        drop(conn);
        info!(host = %profile.cluster_host, identity_changed, "connection profile saved");
        Ok(profile)
    }

    /// Removes the profile together with everything derived from it.
    pub fn delete_profile(&self) -> Result<(), StateError> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM connection_profile WHERE id = ?1",
                params![DEFAULT_PROFILE_ID],
            )?;
            tx.execute("DELETE FROM service_status", [])?;
            tx.execute("DELETE FROM bootstrap_state", [])?;
            tx.commit()?;
            self.invalidate_profile(&conn);
        }
        info!("connection profile deleted");
        Ok(())
    }

    pub fn store_s3_credentials(&self, creds: &S3Credentials) -> Result<(), StateError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE connection_profile SET s3_credentials = ?1, updated_at = ?2 WHERE id = ?3",
            params![creds.to_json(), now_rfc3339(), DEFAULT_PROFILE_ID],
        )?;
        self.invalidate_profile(&conn);
        drop(conn);
        debug!(expiry_time = creds.expiry_time, "s3 credentials stored");
        Ok(())
    }

    pub fn record_service_statuses(&self, statuses: &[ServiceStatus]) -> Result<(), StateError> {
        let now = now_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for status in statuses {
            tx.execute(
                "INSERT INTO service_status (service_name, status, message, required, fix_guidance, checked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(service_name) DO UPDATE SET
                    status = excluded.status,
                    message = excluded.message,
                    required = excluded.required,
                    fix_guidance = excluded.fix_guidance,
                    checked_at = excluded.checked_at",
                params![
                    status.service_name,
                    status.status.as_str(),
                    status.message,
                    status.required,
                    status.fix_guidance,
                    now,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn service_statuses(&self) -> Result<Vec<ServiceStatus>, StateError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT service_name, status, message, required, fix_guidance
             FROM service_status ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (service_name, status, message, required, fix_guidance) = row?;
            let status: ServiceState = serde_json::from_value(Value::String(status.clone()))
                .map_err(|_| StateError(format!("unknown service status: {status}")))?;
            out.push(ServiceStatus {
                service_name,
                status,
                message,
                required,
                fix_guidance,
            });
        }
        Ok(out)
    }

    pub fn mark_bootstrapped(
        &self,
        topics_created: u32,
        tables_created: u32,
    ) -> Result<BootstrapState, StateError> {
        let now = now_rfc3339();
        self.conn()?.execute(
            "INSERT INTO bootstrap_state (id, topics_created, tables_created, bootstrapped_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                topics_created = excluded.topics_created,
                tables_created = excluded.tables_created,
                bootstrapped_at = excluded.bootstrapped_at",
            params![DEFAULT_PROFILE_ID, topics_created, tables_created, now],
        )?;
        Ok(BootstrapState {
            bootstrapped: true,
            topics_created,
            tables_created,
            bootstrapped_at: Some(now),
        })
    }

    pub fn bootstrap_state(&self) -> Result<BootstrapState, StateError> {
        let state = self
            .conn()?
            .query_row(
                "SELECT topics_created, tables_created, bootstrapped_at
                 FROM bootstrap_state WHERE id = ?1",
                params![DEFAULT_PROFILE_ID],
                |row| {
                    Ok(BootstrapState {
                        bootstrapped: true,
                        topics_created: row.get(0)?,
                        tables_created: row.get(1)?,
                        bootstrapped_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_else(BootstrapState::pending))
    }

    pub fn append_events(
        &self,
        profile_id: &str,
        category: &str,
        messages: &[String],
    ) -> Result<(), StateError> {
        let now = now_rfc3339();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO demo_events (profile_id, category, message, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for message in messages {
                stmt.execute(params![profile_id, category, message, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Newest first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<DemoEvent>, StateError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, profile_id, category, message, created_at
             FROM demo_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(DemoEvent {
                id: row.get(0)?,
                profile_id: row.get(1)?,
                category: row.get(2)?,
                message: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StateError::from)
    }

    /// Allow-listed tables with their row counts.
    pub fn debug_tables(&self) -> Result<Vec<Value>, StateError> {
        let conn = self.conn()?;
        let mut out = Vec::with_capacity(DEBUG_TABLES.len());
        for table in DEBUG_TABLES {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            out.push(json!({"name": table, "row_count": count}));
        }
        Ok(out)
    }

    /// Newest rows of an allow-listed table with secret columns masked;
    /// `None` for any other table name.
    pub fn debug_table_rows(
        &self,
        table: &str,
        limit: usize,
    ) -> Result<Option<Vec<Value>>, StateError> {
        let Some(table) = DEBUG_TABLES.iter().find(|t| **t == table) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {table} ORDER BY rowid DESC LIMIT ?1"
        ))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt.query(params![limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut obj = Map::new();
            for (index, column) in columns.iter().enumerate() {
                let cell = json_cell(row.get_ref(index)?);
                let cell = if REDACTED_COLUMNS.contains(&column.as_str()) && !cell.is_null() {
                    Value::String(REDACTED.to_string())
                } else {
                    cell
                };
                obj.insert(column.clone(), cell);
            }
            out.push(Value::Object(obj));
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(host: &str, password: Option<&str>) -> ProfileUpdate {
        ProfileUpdate {
            name: Some("Lab".into()),
            cluster_host: Some(host.into()),
            username: Some("mapr".into()),
            password: password.map(str::to_string),
            ..ProfileUpdate::default()
        }
    }

    #[test]
    fn profile_round_trips_and_keeps_password() {
        let db = StateDb::in_memory().expect("db");
        assert!(db.load_profile().expect("load").is_none());
        assert!(!db.profile_or_default().expect("default").is_configured());

        let saved = db
            .upsert_profile(update(" df.local ", Some("pw")))
            .expect("save");
        assert_eq!(saved.cluster_host, "df.local");
        assert!(saved.is_configured());

        let again = db.upsert_profile(update("df.local", None)).expect("save");
        assert_eq!(again.password.as_deref(), Some("pw"));
        assert_eq!(again.created_at, saved.created_at);
        assert_eq!(db.load_profile().expect("load"), Some(again));
    }

    #[test]
    fn stored_keys_survive_until_host_changes() {
        let db = StateDb::in_memory().expect("db");
        db.upsert_profile(update("df.local", Some("pw"))).expect("save");
        let creds = S3Credentials {
            access_key: "AK".into(),
            secret_key: "SK".into(),
            expiry_time: 42,
        };
        db.store_s3_credentials(&creds).expect("store");
        let profile = db.load_profile().expect("load").expect("profile");
        assert_eq!(profile.stored_s3_credentials(), Some(creds));

        db.upsert_profile(update("other.local", None)).expect("save");
        let profile = db.load_profile().expect("load").expect("profile");
        assert!(profile.s3_credentials.is_none());
    }

    #[test]
    fn host_change_forgets_previous_cluster_statuses() {
        let db = StateDb::in_memory().expect("db");
        db.upsert_profile(update("old.local", Some("pw"))).expect("save");
        let missing = ServiceStatus {
            service_name: "object_store".into(),
            status: ServiceState::Missing,
            message: "down".into(),
            required: true,
            fix_guidance: None,
        };
        db.record_service_statuses(&[missing]).expect("record");

        db.upsert_profile(update("old.local", None)).expect("same host");
        assert_eq!(db.service_statuses().expect("statuses").len(), 1);

        db.upsert_profile(update("new.local", None)).expect("new host");
        assert!(db.service_statuses().expect("statuses").is_empty());
    }

    #[test]
    fn concurrent_reads_do_not_pin_a_stale_profile() {
        let db = StateDb::in_memory().expect("db");
        db.upsert_profile(update("host-0.local", Some("pw"))).expect("save");
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        db.load_profile().expect("load");
                    }
                });
            }
            scope.spawn(|| {
                for i in 1..=50 {
                    db.upsert_profile(update(&format!("host-{i}.local"), None))
                        .expect("save");
                }
            });
        });
        let profile = db.load_profile().expect("load").expect("profile");
        assert_eq!(profile.cluster_host, "host-50.local");
    }

    #[test]
    fn delete_clears_derived_state() {
        let db = StateDb::in_memory().expect("db");
        db.upsert_profile(update("df.local", Some("pw"))).expect("save");
        db.mark_bootstrapped(1, 2).expect("bootstrap");
        assert!(db.bootstrap_state().expect("state").bootstrapped);
        db.delete_profile().expect("delete");
        assert!(db.load_profile().expect("load").is_none());
        assert_eq!(db.bootstrap_state().expect("state"), BootstrapState::pending());
    }

    #[test]
    fn service_statuses_upsert_by_name() {
        let db = StateDb::in_memory().expect("db");
        let status = |state: ServiceState, message: &str| ServiceStatus {
            service_name: "object_store".into(),
            status: state,
            message: message.into(),
            required: true,
            fix_guidance: None,
        };
        db.record_service_statuses(&[status(ServiceState::Missing, "down")])
            .expect("record");
        db.record_service_statuses(&[status(ServiceState::Available, "Port 9000 - success")])
            .expect("record");
        let stored = db.service_statuses().expect("statuses");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, ServiceState::Available);
    }

    #[test]
    fn events_are_returned_newest_first() {
        let db = StateDb::in_memory().expect("db");
        db.append_events("default", "bootstrap", &["one".into(), "two".into()])
            .expect("append");
        db.append_events("default", "scenario", &["three".into()])
            .expect("append");
        let events = db.recent_events(2).expect("events");
        let messages: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["three", "two"]);
        assert_eq!(events[0].category, "scenario");
    }

    #[test]
    fn debug_rows_are_allow_listed_and_redacted() {
        let db = StateDb::in_memory().expect("db");
        db.upsert_profile(update("df.local", Some("pw"))).expect("save");
        let tables = db.debug_tables().expect("tables");
        assert_eq!(tables.len(), DEBUG_TABLES.len());
        assert_eq!(tables[0]["row_count"], 1);

        let rows = db
            .debug_table_rows("connection_profile", 10)
            .expect("rows")
            .expect("allowed");
        assert_eq!(rows[0]["password"], REDACTED);
        assert_eq!(rows[0]["cluster_host"], "df.local");
        assert!(rows[0]["s3_credentials"].is_null());

        assert!(db
            .debug_table_rows("sqlite_master", 10)
            .expect("query")
            .is_none());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.db");
        let db = StateDb::open(&path).expect("open");
        db.append_events("default", "bootstrap", &["x".into()])
            .expect("append");
        drop(db);
        let reopened = StateDb::open(&path).expect("reopen");
        assert_eq!(reopened.recent_events(5).expect("events").len(), 1);
    }
}
