use adlens_scanner::error::{Result as ScanResult, ScanError};
use adlens_scanner::{AdRecord, AdStore, Identifier, Target, TargetKind};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Bumped whenever the layout of the ads or targets tables changes.
pub const SCHEMA_VERSION: i64 = 1;

const MONITOR_DISABLED_KEY: &str = "disable_monitor";
const START_DATE_KEY: &str = "start_date";

#[derive(Debug)]
pub struct Database {
    conn: Connection,
    active_session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// One capture run over a page snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSession {
    pub id: String,
    pub source: String,
    pub status: SessionStatus,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub ads_found: i64,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database {
            conn,
            active_session: None,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Capture runs
            CREATE TABLE IF NOT EXISTS capture_sessions (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,        -- snapshot path or page URL
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed')),
    ads_found INTEGER NOT NULL DEFAULT 0
);

-- Ads, one row per emitted record
CREATE TABLE IF NOT EXISTS ads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    ad_id TEXT,
    title TEXT,
    message TEXT NOT NULL DEFAULT '',
    paid_for_by TEXT,
    page TEXT,
    advertiser TEXT,
    targets TEXT NOT NULL DEFAULT '[]',   -- JSON array of targets
    captured_at INTEGER NOT NULL,         -- milliseconds since epoch
    FOREIGN KEY(session_id) REFERENCES capture_sessions(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_ads_ad_id ON ads(ad_id);
CREATE INDEX IF NOT EXISTS idx_ads_advertiser ON ads(advertiser);
CREATE INDEX IF NOT EXISTS idx_ads_captured_at ON ads(captured_at);

-- Flattened targeting attributes
CREATE TABLE IF NOT EXISTS targets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    kind TEXT NOT NULL,
    segment TEXT,
    stored_at INTEGER NOT NULL,
    FOREIGN KEY(session_id) REFERENCES capture_sessions(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_targets_kind ON targets(kind);

-- Key/value settings
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
            ",
        )?;

        let version = self.schema_version()?;
        if version < SCHEMA_VERSION {
            debug!("Migrating schema from version {} to {}", version, SCHEMA_VERSION);
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
    }

    // Session management
    pub fn create_session(&self, source: &str) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO capture_sessions (id, source, start_time, status) VALUES (?1, ?2, ?3, ?4)",
            params![&session_id, source, timestamp, SessionStatus::Running.as_str()],
        )?;

        Ok(session_id)
    }

    pub fn complete_session(&self, session_id: &str, ads_found: usize) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE capture_sessions SET status = ?1, end_time = ?2, ads_found = ?3 WHERE id = ?4",
            params![
                SessionStatus::Completed.as_str(),
                timestamp,
                ads_found as i64,
                session_id
            ],
        )?;
        Ok(())
    }

    pub fn fail_session(&self, session_id: &str) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE capture_sessions SET status = ?1, end_time = ?2 WHERE id = ?3",
            params![SessionStatus::Failed.as_str(), timestamp, session_id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<CaptureSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, status, start_time, end_time, ads_found FROM capture_sessions WHERE id = ?1",
        )?;

        stmt.query_row(params![session_id], |row| {
            let status: String = row.get(2)?;
            Ok(CaptureSession {
                id: row.get(0)?,
                source: row.get(1)?,
                status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Failed),
                start_time: row.get(3)?,
                end_time: row.get(4)?,
                ads_found: row.get(5)?,
            })
        })
        .optional()
    }

    /// Rows written through [`AdStore`] are tagged with this session.
    pub fn attach_session(&mut self, session_id: Option<String>) {
        self.active_session = session_id;
    }

    // Ad operations
    pub fn insert_ads(&self, ads: &[AdRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        self.write_ads(&tx, ads)?;
        tx.commit()?;
        Ok(ads.len())
    }

    /// Writes a pass's ads and targets in one transaction, so a failure
    /// leaves neither table changed.
    pub fn insert_batch(&self, ads: &[AdRecord], targets: &[Target]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.write_ads(&tx, ads)?;
        self.write_targets(&tx, targets)?;
        tx.commit()
    }

    fn write_ads(&self, conn: &Connection, ads: &[AdRecord]) -> Result<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO ads (
                session_id, ad_id, title, message, paid_for_by, page,
                advertiser, targets, captured_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for ad in ads {
            stmt.execute(params![
                &self.active_session,
                ad.id.as_ref().map(Identifier::as_str),
                &ad.title,
                &ad.message,
                &ad.paid_for_by,
                &ad.page,
                &ad.advertiser,
                to_json(&ad.targets)?,
                ad.timestamp,
            ])?;
        }
        Ok(())
    }

    /// All stored ads, oldest first.
    pub fn get_ads(&self) -> Result<Vec<AdRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT title, message, paid_for_by, page, captured_at, ad_id, advertiser, targets
             FROM ads ORDER BY id",
        )?;

        let ads = stmt
            .query_map([], |row| {
                Ok(AdRecord {
                    title: row.get(0)?,
                    message: row.get(1)?,
                    paid_for_by: row.get(2)?,
                    page: row.get(3)?,
                    timestamp: row.get(4)?,
                    id: row.get::<_, Option<String>>(5)?.map(Identifier::new),
                    advertiser: row.get(6)?,
                    targets: json_column(row, 7)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(ads)
    }

    pub fn get_ads_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM ads", [], |row| row.get(0))
    }

    pub fn clear_ads(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM ads", [])
    }

    // Target operations
    pub fn insert_targets(&self, targets: &[Target]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        self.write_targets(&tx, targets)?;
        tx.commit()?;
        Ok(targets.len())
    }

    fn write_targets(&self, conn: &Connection, targets: &[Target]) -> Result<()> {
        let timestamp = current_timestamp();
        let mut stmt = conn.prepare(
            "INSERT INTO targets (session_id, kind, segment, stored_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for target in targets {
            stmt.execute(params![
                &self.active_session,
                target.kind.as_str(),
                &target.segment,
                timestamp,
            ])?;
        }
        Ok(())
    }

    pub fn get_targets(&self) -> Result<Vec<Target>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, segment FROM targets ORDER BY id")?;

        let targets = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                let Ok(kind) = kind.parse::<TargetKind>();
                Ok(Target {
                    kind,
                    segment: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(targets)
    }

    pub fn get_targets_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM targets", [], |row| row.get(0))
    }

    /// `(kind, count)` pairs, most frequent first.
    pub fn get_target_counts_by_kind(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, COUNT(*) AS n FROM targets GROUP BY kind ORDER BY n DESC, kind",
        )?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        Ok(counts)
    }

    pub fn clear_targets(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM targets", [])
    }

    // Settings
    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_monitor_enabled(&self, enabled: bool) -> Result<()> {
        self.set_value(MONITOR_DISABLED_KEY, if enabled { "false" } else { "true" })
    }

    /// The monitor is on unless it was explicitly disabled.
    pub fn monitor_enabled(&self) -> Result<bool> {
        Ok(self.get_value(MONITOR_DISABLED_KEY)?.as_deref() != Some("true"))
    }

    /// Records the first-use date if none is stored yet and returns the
    /// stored value.
    pub fn init_start_date(&self) -> Result<i64> {
        match self.get_start_date()? {
            Some(start) => Ok(start),
            None => self.reset_start_date(),
        }
    }

    pub fn reset_start_date(&self) -> Result<i64> {
        let now = current_timestamp();
        self.set_value(START_DATE_KEY, &now.to_string())?;
        Ok(now)
    }

    pub fn get_start_date(&self) -> Result<Option<i64>> {
        Ok(self
            .get_value(START_DATE_KEY)?
            .and_then(|value| value.parse().ok()))
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

fn storage_error(e: rusqlite::Error) -> ScanError {
    ScanError::Storage(e.to_string())
}

impl AdStore for Database {
    fn is_monitor_enabled(&self) -> ScanResult<bool> {
        self.monitor_enabled().map_err(storage_error)
    }

    fn store_ads(&mut self, ads: &[AdRecord]) -> ScanResult<()> {
        self.insert_ads(ads).map(|_| ()).map_err(storage_error)
    }

    fn store_targets(&mut self, targets: &[Target]) -> ScanResult<()> {
        self.insert_targets(targets).map(|_| ()).map_err(storage_error)
    }

    fn store_batch(&mut self, ads: &[AdRecord], targets: &[Target]) -> ScanResult<()> {
        self.insert_batch(ads, targets).map_err(storage_error)
    }
}
