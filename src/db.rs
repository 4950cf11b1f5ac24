use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS counterparties (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS obligations (
    id INTEGER PRIMARY KEY,
    counterparty_id INTEGER NOT NULL,
    property_id INTEGER NOT NULL,
    description TEXT,
    currency TEXT NOT NULL DEFAULT 'USD',
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (counterparty_id, property_id),
    FOREIGN KEY (counterparty_id) REFERENCES counterparties(id),
    FOREIGN KEY (property_id) REFERENCES properties(id)
);

CREATE TABLE IF NOT EXISTS dues (
    id INTEGER PRIMARY KEY,
    obligation_id INTEGER NOT NULL,
    period TEXT NOT NULL,
    due_date TEXT,
    amount REAL NOT NULL DEFAULT 0,
    currency TEXT NOT NULL DEFAULT 'USD',
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'PAID')),
    description TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (obligation_id) REFERENCES obligations(id)
);

CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY,
    due_id INTEGER NOT NULL,
    amount REAL NOT NULL DEFAULT 0,
    date TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (due_id) REFERENCES dues(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY,
    due_id INTEGER NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('INVOICE', 'PAYMENT_PROOF')),
    path TEXT NOT NULL,
    checksum TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (due_id) REFERENCES dues(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS exchange_rates (
    id INTEGER PRIMARY KEY,
    from_currency TEXT NOT NULL,
    to_currency TEXT NOT NULL,
    date TEXT NOT NULL,
    rate REAL NOT NULL,
    UNIQUE (from_currency, to_currency, date)
);

CREATE INDEX IF NOT EXISTS idx_payments_date ON payments(date);
CREATE INDEX IF NOT EXISTS idx_dues_obligation ON dues(obligation_id);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "counterparties", "properties", "obligations", "dues", "payments", "documents", "exchange_rates",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_due_status_is_constrained() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO counterparties (name) VALUES ('Power Co')", []).unwrap();
        conn.execute("INSERT INTO properties (name) VALUES ('Unit A')", []).unwrap();
        conn.execute(
            "INSERT INTO obligations (counterparty_id, property_id) VALUES (1, 1)", [],
        ).unwrap();
        let bad = conn.execute(
            "INSERT INTO dues (obligation_id, period, status) VALUES (1, '2025-01', 'LATE')", [],
        );
        assert!(bad.is_err());
    }
}
