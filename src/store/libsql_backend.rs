//! libSQL backend — sessions and the contact log in one local database.
//!
//! Supports local file and in-memory databases. The contact log's
//! `position` column is the row handle handed back to the processor.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::{DatabaseError, SinkError};
use crate::pipeline::types::{RowFields, RowPosition, SessionRecord};
use crate::store::migrations;
use crate::store::traits::{LogSink, SessionStore};

/// Number of cells in a contact-log row.
pub const CONTACT_LOG_WIDTH: usize = 6;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

/// A contact-log row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactLogRow {
    pub position: RowPosition,
    pub customer: Option<String>,
    pub sector: Option<String>,
    pub contacted_at: Option<String>,
    pub weekday: Option<String>,
    pub replied_at: Option<String>,
    pub elapsed_hours: Option<String>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    /// Most recent contact-log rows, oldest first.
    pub async fn list_contact_rows(&self, limit: usize) -> Result<Vec<ContactLogRow>, SinkError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT position, customer, sector, contacted_at, weekday, replied_at, elapsed_hours
                 FROM (SELECT * FROM contact_log ORDER BY position DESC LIMIT ?1)
                 ORDER BY position ASC",
                params![limit as i64],
            )
            .await
            .map_err(|e| SinkError::Read(format!("list_contact_rows: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| SinkError::Read(format!("list_contact_rows: {e}")))?
        {
            let position: i64 = row
                .get(0)
                .map_err(|e| SinkError::Read(format!("list_contact_rows row parse: {e}")))?;
            out.push(ContactLogRow {
                position: RowPosition(position),
                customer: row.get(1).ok(),
                sector: row.get(2).ok(),
                contacted_at: row.get(3).ok(),
                weekday: row.get(4).ok(),
                replied_at: row.get(5).ok(),
                elapsed_hours: row.get(6).ok(),
            });
        }
        Ok(out)
    }

    /// Number of open sessions.
    pub async fn count_sessions(&self) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT COUNT(*) FROM sessions", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_sessions: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("count_sessions row parse: {e}"))),
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_sessions: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_integer(n: Option<i64>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n),
        None => libsql::Value::Null,
    }
}

/// Cell `index` of a row, padded with NULL past its end.
fn cell(row: &RowFields, index: usize) -> libsql::Value {
    opt_text(row.get(index))
}

fn check_width(row: &RowFields) -> Result<(), SinkError> {
    let len = row.fields().len();
    if len > CONTACT_LOG_WIDTH {
        return Err(SinkError::TooManyFields {
            len,
            max: CONTACT_LOG_WIDTH,
        });
    }
    Ok(())
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl SessionStore for LibSqlBackend {
    async fn get_session(&self, key: &str) -> Result<Option<SessionRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT conversation_key, option, option_selected_at, log_row_position
                 FROM sessions WHERE conversation_key = ?1",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let conversation_key: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_session row parse: {e}")))?;
                let selected_at: Option<String> = row.get(2).ok();
                let position: Option<i64> = row.get(3).ok();
                Ok(Some(SessionRecord {
                    conversation_key,
                    option: row.get(1).ok(),
                    option_selected_at: selected_at.as_deref().and_then(parse_datetime),
                    log_row_position: position.map(RowPosition),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn save_session(&self, session: &SessionRecord) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO sessions (conversation_key, option, option_selected_at, log_row_position, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (conversation_key) DO UPDATE SET
                     option = excluded.option,
                     option_selected_at = excluded.option_selected_at,
                     log_row_position = excluded.log_row_position,
                     updated_at = excluded.updated_at",
                params![
                    session.conversation_key.as_str(),
                    opt_text(session.option.as_deref()),
                    opt_text(session.option_selected_at.map(|t| t.to_rfc3339()).as_deref()),
                    opt_integer(session.log_row_position.map(|p| p.0)),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_session: {e}")))?;

        debug!(key = %session.conversation_key, option = ?session.option, "Session saved");
        Ok(())
    }

    async fn clear_session(&self, key: &str) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE conversation_key = ?1",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("clear_session: {e}")))?;

        debug!(key = %key, removed = count, "Session cleared");
        Ok(())
    }
}

#[async_trait]
impl LogSink for LibSqlBackend {
    async fn append_row(&self, row: &RowFields) -> Result<Option<RowPosition>, SinkError> {
        check_width(row)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO contact_log (customer, sector, contacted_at, weekday, replied_at, elapsed_hours)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                cell(row, 0),
                cell(row, 1),
                cell(row, 2),
                cell(row, 3),
                cell(row, 4),
                cell(row, 5),
            ],
        )
        .await
        .map_err(|e| SinkError::Append(e.to_string()))?;

        let position = conn.last_insert_rowid();
        debug!(position, "Contact row appended");
        Ok((position > 0).then_some(RowPosition(position)))
    }

    async fn update_row(&self, position: RowPosition, row: &RowFields) -> Result<(), SinkError> {
        check_width(row)?;
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE contact_log SET
                     customer = COALESCE(?1, customer),
                     sector = COALESCE(?2, sector),
                     contacted_at = COALESCE(?3, contacted_at),
                     weekday = COALESCE(?4, weekday),
                     replied_at = COALESCE(?5, replied_at),
                     elapsed_hours = COALESCE(?6, elapsed_hours),
                     updated_at = ?7
                 WHERE position = ?8",
                params![
                    cell(row, 0),
                    cell(row, 1),
                    cell(row, 2),
                    cell(row, 3),
                    cell(row, 4),
                    cell(row, 5),
                    now,
                    position.0,
                ],
            )
            .await
            .map_err(|e| SinkError::Update {
                position: position.0,
                reason: e.to_string(),
            })?;

        if count == 0 {
            return Err(SinkError::RowNotFound {
                position: position.0,
            });
        }
        debug!(%position, "Contact row updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    // ── Session tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn missing_session_is_none() {
        let db = test_db().await;
        assert!(db.get_session("nobody@c.us").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bare_session_round_trip() {
        let db = test_db().await;
        db.save_session(&SessionRecord::new("a@c.us")).await.unwrap();

        let session = db.get_session("a@c.us").await.unwrap().unwrap();
        assert_eq!(session, SessionRecord::new("a@c.us"));
        assert!(session.awaiting_selection());
    }

    #[tokio::test]
    async fn save_overwrites_existing_session() {
        let db = test_db().await;
        db.save_session(&SessionRecord::new("a@c.us")).await.unwrap();

        let at = DateTime::parse_from_rfc3339("2026-10-19T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let selected = SessionRecord::new("a@c.us").with_selection("Entrega", at, RowPosition(3));
        db.save_session(&selected).await.unwrap();

        let session = db.get_session("a@c.us").await.unwrap().unwrap();
        assert_eq!(session, selected);
        assert_eq!(db.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_removes_only_that_session() {
        let db = test_db().await;
        db.save_session(&SessionRecord::new("a@c.us")).await.unwrap();
        db.save_session(&SessionRecord::new("b@c.us")).await.unwrap();

        db.clear_session("a@c.us").await.unwrap();

        assert!(db.get_session("a@c.us").await.unwrap().is_none());
        assert!(db.get_session("b@c.us").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clearing_missing_session_is_ok() {
        let db = test_db().await;
        db.clear_session("ghost@c.us").await.unwrap();
    }

    // ── Contact log tests ───────────────────────────────────────────

    #[tokio::test]
    async fn append_returns_increasing_positions() {
        let db = test_db().await;
        let row = RowFields::contact("5511999990000", "Entrega", "19/10/2026, 09:00:00", "SEG");

        let first = db.append_row(&row).await.unwrap().unwrap();
        let second = db.append_row(&row).await.unwrap().unwrap();
        assert!(second.0 > first.0);
    }

    #[tokio::test]
    async fn update_fills_reply_cells_and_keeps_contact_cells() {
        let db = test_db().await;
        let position = db
            .append_row(&RowFields::contact(
                "5511999990000",
                "Comercial",
                "19/10/2026, 09:00:00",
                "SEG",
            ))
            .await
            .unwrap()
            .unwrap();

        db.update_row(position, &RowFields::reply("19/10/2026, 10:30:00", "1.50"))
            .await
            .unwrap();

        let rows = db.list_contact_rows(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.position, position);
        assert_eq!(row.customer.as_deref(), Some("5511999990000"));
        assert_eq!(row.sector.as_deref(), Some("Comercial"));
        assert_eq!(row.weekday.as_deref(), Some("SEG"));
        assert_eq!(row.replied_at.as_deref(), Some("19/10/2026, 10:30:00"));
        assert_eq!(row.elapsed_hours.as_deref(), Some("1.50"));
    }

    #[tokio::test]
    async fn update_unknown_position_fails() {
        let db = test_db().await;
        let err = db
            .update_row(RowPosition(42), &RowFields::reply("x", "0.00"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::RowNotFound { position: 42 }));
    }

    #[tokio::test]
    async fn rows_wider_than_log_are_rejected() {
        let db = test_db().await;
        let row = RowFields::new(vec![Some("x".into()); CONTACT_LOG_WIDTH + 1]);
        let err = db.append_row(&row).await.unwrap_err();
        assert!(matches!(err, SinkError::TooManyFields { len: 7, max: 6 }));
    }

    #[tokio::test]
    async fn list_contact_rows_respects_limit() {
        let db = test_db().await;
        for i in 0..5 {
            db.append_row(&RowFields::contact(&i.to_string(), "Entrega", "t", "SEG"))
                .await
                .unwrap();
        }
        let rows = db.list_contact_rows(2).await.unwrap();
        let customers: Vec<_> = rows.iter().map(|r| r.customer.clone().unwrap()).collect();
        assert_eq!(customers, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn list_contact_rows_reports_read_failure() {
        let db = test_db().await;
        db.conn().execute("DROP TABLE contact_log", ()).await.unwrap();

        let err = db.list_contact_rows(10).await.unwrap_err();
        assert!(matches!(err, SinkError::Read(_)));
    }

    #[tokio::test]
    async fn local_database_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("tracker.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.save_session(&SessionRecord::new("a@c.us")).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.get_session("a@c.us").await.unwrap().is_some());
    }

    #[test]
    fn parse_datetime_accepts_sqlite_format() {
        assert!(parse_datetime("2026-10-19 12:00:00").is_some());
        assert!(parse_datetime("2026-10-19T12:00:00+00:00").is_some());
        assert!(parse_datetime("garbage").is_none());
    }
}
