//! Obligation store: counterparties, properties, obligations, dues, payments and
//! their documents. Every function takes a plain `&Connection` so callers can pass a
//! `rusqlite::Transaction` and keep multi-step mutations atomic.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::{DuesError, Result};
use crate::models::{DocumentKind, Due, DueStatus, Payment};

impl ToSql for DueStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DueStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        DueStatus::parse(raw).ok_or_else(|| FromSqlError::Other(format!("bad due status: {raw}").into()))
    }
}

// ---------------------------------------------------------------------------
// Counterparties, properties, obligations
// ---------------------------------------------------------------------------

pub fn resolve_or_create_counterparty(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM counterparties WHERE name = ?1", [name], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO counterparties (name) VALUES (?1)", [name])?;
    tracing::debug!(counterparty = name, "created counterparty");
    Ok(conn.last_insert_rowid())
}

pub fn resolve_or_create_property(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM properties WHERE name = ?1", [name], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute("INSERT INTO properties (name) VALUES (?1)", [name])?;
    tracing::debug!(property = name, "created property");
    Ok(conn.last_insert_rowid())
}

/// The oldest property on record, or a new one named `placeholder` when there are none.
pub fn first_property_or_create(conn: &Connection, placeholder: &str) -> Result<i64> {
    let first: Option<i64> = conn
        .query_row("SELECT id FROM properties ORDER BY id LIMIT 1", [], |r| r.get(0))
        .optional()?;
    match first {
        Some(id) => Ok(id),
        None => resolve_or_create_property(conn, placeholder),
    }
}

/// An obligation is keyed by counterparty and property. `currency` only applies when
/// the obligation is created; an existing one keeps its own.
pub fn resolve_or_create_obligation(
    conn: &Connection,
    counterparty_id: i64,
    property_id: i64,
    currency: &str,
) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM obligations WHERE counterparty_id = ?1 AND property_id = ?2",
            [counterparty_id, property_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    conn.execute(
        "INSERT INTO obligations (counterparty_id, property_id, currency) VALUES (?1, ?2, ?3)",
        rusqlite::params![counterparty_id, property_id, currency],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn obligation_currency(conn: &Connection, obligation_id: i64) -> Result<String> {
    Ok(conn.query_row(
        "SELECT currency FROM obligations WHERE id = ?1",
        [obligation_id],
        |r| r.get(0),
    )?)
}

// ---------------------------------------------------------------------------
// Dues
// ---------------------------------------------------------------------------

pub struct NewDue<'a> {
    pub obligation_id: i64,
    pub period: &'a str,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    pub currency: &'a str,
    pub status: DueStatus,
    pub description: Option<&'a str>,
}

/// Fields left as `None` are not touched.
#[derive(Default)]
pub struct DueUpdate {
    pub status: Option<DueStatus>,
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

pub fn create_due(conn: &Connection, due: &NewDue) -> Result<i64> {
    conn.execute(
        "INSERT INTO dues (obligation_id, period, due_date, amount, currency, status, description) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            due.obligation_id,
            due.period,
            due.due_date,
            due.amount,
            due.currency,
            due.status,
            due.description,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_due(conn: &Connection, id: i64) -> Result<Due> {
    conn.query_row(
        "SELECT id, obligation_id, period, due_date, amount, currency, status, description \
         FROM dues WHERE id = ?1",
        [id],
        |row| {
            Ok(Due {
                id: row.get(0)?,
                obligation_id: row.get(1)?,
                period: row.get(2)?,
                due_date: row.get(3)?,
                amount: row.get(4)?,
                currency: row.get(5)?,
                status: row.get(6)?,
                description: row.get(7)?,
            })
        },
    )
    .optional()?
    .ok_or(DuesError::UnknownDue(id))
}

pub fn update_due(conn: &Connection, id: i64, update: &DueUpdate) -> Result<()> {
    let changed = conn.execute(
        "UPDATE dues SET status = COALESCE(?1, status), amount = COALESCE(?2, amount), \
         due_date = COALESCE(?3, due_date) WHERE id = ?4",
        rusqlite::params![update.status, update.amount, update.due_date, id],
    )?;
    if changed == 0 {
        return Err(DuesError::UnknownDue(id));
    }
    Ok(())
}

pub fn delete_due(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM documents WHERE due_id = ?1", [id])?;
    conn.execute("DELETE FROM payments WHERE due_id = ?1", [id])?;
    let removed = conn.execute("DELETE FROM dues WHERE id = ?1", [id])?;
    if removed == 0 {
        return Err(DuesError::UnknownDue(id));
    }
    Ok(())
}

pub struct DueListing {
    pub id: i64,
    pub counterparty: String,
    pub property: String,
    pub period: String,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    pub currency: String,
    pub status: DueStatus,
    pub paid_amount: f64,
}

pub fn list_dues(conn: &Connection, status: Option<DueStatus>) -> Result<Vec<DueListing>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, c.name, p.name, d.period, d.due_date, d.amount, d.currency, d.status, \
                COALESCE((SELECT SUM(amount) FROM payments WHERE due_id = d.id), 0) \
         FROM dues d \
         JOIN obligations o ON d.obligation_id = o.id \
         JOIN counterparties c ON o.counterparty_id = c.id \
         JOIN properties p ON o.property_id = p.id \
         WHERE ?1 IS NULL OR d.status = ?1 \
         ORDER BY d.period, d.id",
    )?;
    let rows = stmt.query_map([status], |row| {
        Ok(DueListing {
            id: row.get(0)?,
            counterparty: row.get(1)?,
            property: row.get(2)?,
            period: row.get(3)?,
            due_date: row.get(4)?,
            amount: row.get(5)?,
            currency: row.get(6)?,
            status: row.get(7)?,
            paid_amount: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

pub fn create_payment(conn: &Connection, due_id: i64, amount: f64, date: Option<NaiveDate>) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments (due_id, amount, date) VALUES (?1, ?2, ?3)",
        rusqlite::params![due_id, amount, date],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn payments_for_due(conn: &Connection, due_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare("SELECT id, due_id, amount, date FROM payments WHERE due_id = ?1 ORDER BY id")?;
    let rows = stmt.query_map([due_id], |row| {
        Ok(Payment {
            id: row.get(0)?,
            due_id: row.get(1)?,
            amount: row.get(2)?,
            date: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Point the due's first payment at `amount`/`date`, inserting one if the due has none.
pub fn upsert_payment(conn: &Connection, due_id: i64, amount: f64, date: NaiveDate) -> Result<i64> {
    let first: Option<i64> = conn
        .query_row(
            "SELECT id FROM payments WHERE due_id = ?1 ORDER BY id LIMIT 1",
            [due_id],
            |r| r.get(0),
        )
        .optional()?;
    match first {
        Some(id) => {
            conn.execute(
                "UPDATE payments SET amount = ?1, date = ?2 WHERE id = ?3",
                rusqlite::params![amount, date, id],
            )?;
            Ok(id)
        }
        None => create_payment(conn, due_id, amount, Some(date)),
    }
}

pub fn clear_payments(conn: &Connection, due_id: i64) -> Result<usize> {
    Ok(conn.execute("UPDATE payments SET amount = 0, date = NULL WHERE due_id = ?1", [due_id])?)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Record a receipt for a due. The file itself stays where it is; only its
/// location and content hash are stored.
pub fn attach_document(conn: &Connection, due_id: i64, kind: DocumentKind, file_path: &Path) -> Result<i64> {
    let checksum = compute_checksum(file_path)?;
    let stored = std::fs::canonicalize(file_path)?;
    conn.execute(
        "INSERT INTO documents (due_id, kind, path, checksum) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![due_id, kind.as_str(), stored.to_string_lossy(), checksum],
    )?;
    Ok(conn.last_insert_rowid())
}
