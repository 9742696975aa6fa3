//! SQLite-backed ledger and audit log.
//!
//! One connection serves both stores, shared behind a mutex. All columns are
//! TEXT except confidence; money is stored as the decimal's string form so no
//! float ever touches an amount.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{AuditStore, BillStore, StorageError, StorageId};
use crate::audit::AuditEntry;
use crate::ledger::LedgerSnapshot;
use crate::models::{Actor, AuditAction, BillRecord, Category, Currency, PaymentStatus};

/// Open a SQLite connection to the given path and run migrations.
pub fn open_database(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory_database() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Split one connection into the two store handles.
pub fn sqlite_stores(conn: Connection) -> (SqliteLedger, SqliteAuditLog) {
    let shared = Arc::new(Mutex::new(conn));
    (
        SqliteLedger {
            conn: Arc::clone(&shared),
        },
        SqliteAuditLog { conn: shared },
    )
}

fn configure_pragmas(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_initial.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| StorageError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Current schema version (0 if no schema exists yet).
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Bill store
// ---------------------------------------------------------------------------

pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl BillStore for SqliteLedger {
    fn append(&mut self, record: &BillRecord, session_id: Uuid) -> Result<StorageId, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

        // A retried session returns the row it already wrote.
        let existing = conn.query_row(
            "SELECT id FROM bills WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get::<_, String>(0),
        );
        match existing {
            Ok(id) => return Ok(StorageId(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(e.into()),
        }

        let line_items =
            serde_json::to_string(&record.line_items).map_err(|e| StorageError::CorruptValue {
                field: "line_items".into(),
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO bills (id, session_id, vendor_name, issue_date, due_date, currency,
             line_items, total_amount, subtotal, tax_amount, category, bill_number,
             payment_status, notes, source_image, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                record.id.to_string(),
                session_id.to_string(),
                record.vendor_name,
                record.issue_date.map(|d| d.to_string()),
                record.due_date.map(|d| d.to_string()),
                record.currency.as_str(),
                line_items,
                record.total_amount.map(|a| a.to_string()),
                record.subtotal.map(|a| a.to_string()),
                record.tax_amount.map(|a| a.to_string()),
                record.category.as_str(),
                record.bill_number,
                record.payment_status.as_str(),
                record.notes,
                record.source_image,
                record.confidence as f64,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(StorageId(record.id.to_string()))
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, vendor_name, issue_date, due_date, currency, line_items,
             total_amount, subtotal, tax_amount, category, bill_number, payment_status,
             notes, source_image, confidence, created_at
             FROM bills ORDER BY rowid ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(BillRow {
                    id: row.get::<_, String>(0)?,
                    vendor_name: row.get::<_, String>(1)?,
                    issue_date: row.get::<_, Option<String>>(2)?,
                    due_date: row.get::<_, Option<String>>(3)?,
                    currency: row.get::<_, String>(4)?,
                    line_items: row.get::<_, String>(5)?,
                    total_amount: row.get::<_, Option<String>>(6)?,
                    subtotal: row.get::<_, Option<String>>(7)?,
                    tax_amount: row.get::<_, Option<String>>(8)?,
                    category: row.get::<_, String>(9)?,
                    bill_number: row.get::<_, Option<String>>(10)?,
                    payment_status: row.get::<_, String>(11)?,
                    notes: row.get::<_, Option<String>>(12)?,
                    source_image: row.get::<_, Option<String>>(13)?,
                    confidence: row.get::<_, f64>(14)?,
                    created_at: row.get::<_, String>(15)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(bill_from_row(row)?);
        }
        Ok(LedgerSnapshot::new(records))
    }

    fn len(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM bills", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

struct BillRow {
    id: String,
    vendor_name: String,
    issue_date: Option<String>,
    due_date: Option<String>,
    currency: String,
    line_items: String,
    total_amount: Option<String>,
    subtotal: Option<String>,
    tax_amount: Option<String>,
    category: String,
    bill_number: Option<String>,
    payment_status: String,
    notes: Option<String>,
    source_image: Option<String>,
    confidence: f64,
    created_at: String,
}

fn bill_from_row(row: BillRow) -> Result<BillRecord, StorageError> {
    Ok(BillRecord {
        id: Uuid::parse_str(&row.id).map_err(|e| StorageError::CorruptValue {
            field: "id".into(),
            reason: e.to_string(),
        })?,
        vendor_name: row.vendor_name,
        issue_date: parse_stored_date(row.issue_date.as_deref()),
        due_date: parse_stored_date(row.due_date.as_deref()),
        currency: Currency::from_str(&row.currency)?,
        line_items: serde_json::from_str(&row.line_items).map_err(|e| {
            StorageError::CorruptValue {
                field: "line_items".into(),
                reason: e.to_string(),
            }
        })?,
        total_amount: parse_stored_amount("total_amount", row.total_amount)?,
        subtotal: parse_stored_amount("subtotal", row.subtotal)?,
        tax_amount: parse_stored_amount("tax_amount", row.tax_amount)?,
        category: Category::from_str(&row.category)?,
        bill_number: row.bill_number,
        payment_status: PaymentStatus::from_str(&row.payment_status)?,
        notes: row.notes,
        source_image: row.source_image,
        confidence: row.confidence as f32,
        created_at: DateTime::parse_from_rfc3339(&row.created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}

fn parse_stored_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// Money never degrades silently; an unparseable stored amount is corruption.
fn parse_stored_amount(
    field: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, StorageError> {
    value
        .map(|raw| {
            Decimal::from_str(&raw).map_err(|e| StorageError::CorruptValue {
                field: field.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// Audit store
// ---------------------------------------------------------------------------

pub struct SqliteAuditLog {
    conn: Arc<Mutex<Connection>>,
}

impl AuditStore for SqliteAuditLog {
    fn append(&mut self, entry: &AuditEntry) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let detail =
            serde_json::to_string(&entry.detail).map_err(|e| StorageError::CorruptValue {
                field: "detail".into(),
                reason: e.to_string(),
            })?;
        conn.execute(
            "INSERT INTO audit_log (seq, timestamp, actor, action, subject, correlation_id,
             before_state, after_state, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                entry.sequence as i64,
                entry.timestamp.to_rfc3339(),
                entry.actor.as_str(),
                entry.action.as_str(),
                entry.subject,
                entry.correlation_id.to_string(),
                entry.before_state,
                entry.after_state,
                detail,
            ],
        )?;
        Ok(())
    }

    fn last_sequence(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(seq) FROM audit_log", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) as u64)
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT seq, timestamp, actor, action, subject, correlation_id,
             before_state, after_state, detail
             FROM audit_log ORDER BY seq ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AuditRow {
                    seq: row.get::<_, i64>(0)?,
                    timestamp: row.get::<_, String>(1)?,
                    actor: row.get::<_, String>(2)?,
                    action: row.get::<_, String>(3)?,
                    subject: row.get::<_, String>(4)?,
                    correlation_id: row.get::<_, String>(5)?,
                    before_state: row.get::<_, Option<String>>(6)?,
                    after_state: row.get::<_, Option<String>>(7)?,
                    detail: row.get::<_, String>(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(entry_from_row(row)?);
        }
        Ok(entries)
    }
}

struct AuditRow {
    seq: i64,
    timestamp: String,
    actor: String,
    action: String,
    subject: String,
    correlation_id: String,
    before_state: Option<String>,
    after_state: Option<String>,
    detail: String,
}

fn entry_from_row(row: AuditRow) -> Result<AuditEntry, StorageError> {
    Ok(AuditEntry {
        sequence: row.seq as u64,
        timestamp: DateTime::parse_from_rfc3339(&row.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_default(),
        actor: Actor::from_str(&row.actor)?,
        action: AuditAction::from_str(&row.action)?,
        subject: row.subject,
        correlation_id: Uuid::parse_str(&row.correlation_id).map_err(|e| {
            StorageError::CorruptValue {
                field: "correlation_id".into(),
                reason: e.to_string(),
            }
        })?,
        before_state: row.before_state,
        after_state: row.after_state,
        detail: serde_json::from_str(&row.detail).map_err(|e| StorageError::CorruptValue {
            field: "detail".into(),
            reason: e.to_string(),
        })?,
    })
}
