//! Row-level mutations driven from a reconciliation: confirm a match, undo one, or
//! book an unmatched bank row as a new paid due. Each runs in a single transaction.

use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::Connection;

use crate::error::{DuesError, Result};
use crate::models::{BankTransactionRow, DocumentKind, DueStatus, Payment};
use crate::store::{self, DueUpdate, NewDue};

pub const DEFAULT_COUNTERPARTY: &str = "Bank/Reconciliation";
pub const PLACEHOLDER_PROPERTY: &str = "General";

fn mark_paid(conn: &Connection, due_id: i64, amount: f64, date: NaiveDate) -> Result<i64> {
    store::update_due(conn, due_id, &DueUpdate {
        status: Some(DueStatus::Paid),
        ..Default::default()
    })?;
    store::upsert_payment(conn, due_id, amount, date)
}

/// Mark `due_id` as paid by `row`, reusing the due's first payment if it has one.
pub fn apply_match(conn: &mut Connection, row: &BankTransactionRow, due_id: i64) -> Result<i64> {
    let tx = conn.transaction()?;
    store::get_due(&tx, due_id)?;
    let payment_id = mark_paid(&tx, due_id, row.signed_amount.abs(), row.date)?;
    tx.commit()?;
    tracing::info!(due_id, payment_id, row = row.row_number, "applied bank row to due");
    Ok(payment_id)
}

/// Manual payment outside a reconciliation. `amount` defaults to the amount owed.
pub fn pay_due(conn: &mut Connection, due_id: i64, amount: Option<f64>, date: NaiveDate) -> Result<i64> {
    let tx = conn.transaction()?;
    let due = store::get_due(&tx, due_id)?;
    let payment_id = mark_paid(&tx, due_id, amount.unwrap_or(due.amount), date)?;
    tx.commit()?;
    tracing::info!(due_id, payment_id, "recorded payment");
    Ok(payment_id)
}

/// Put `due_id` back to pending and zero its payments. Safe to repeat.
/// Returns the payments that were live before the revert.
pub fn revert_match(conn: &mut Connection, due_id: i64) -> Result<Vec<Payment>> {
    let tx = conn.transaction()?;
    store::get_due(&tx, due_id)?;
    let cleared: Vec<Payment> = store::payments_for_due(&tx, due_id)?
        .into_iter()
        .filter(|p| p.date.is_some() && p.amount != 0.0)
        .collect();
    store::update_due(&tx, due_id, &DueUpdate {
        status: Some(DueStatus::Pending),
        ..Default::default()
    })?;
    store::clear_payments(&tx, due_id)?;
    tx.commit()?;
    tracing::info!(due_id, cleared = cleared.len(), "reverted due");
    Ok(cleared)
}

pub fn delete_due(conn: &mut Connection, due_id: i64) -> Result<()> {
    let tx = conn.transaction()?;
    store::delete_due(&tx, due_id)?;
    tx.commit()?;
    tracing::info!(due_id, "deleted due");
    Ok(())
}

/// Optional receipt files stored with a quick-created due.
#[derive(Debug, Clone, Default)]
pub struct Receipt {
    pub invoice: Option<PathBuf>,
    pub payment_proof: Option<PathBuf>,
}

/// Where quick-created dues are filed.
#[derive(Debug, Clone)]
pub struct QuickCreateTarget<'a> {
    pub counterparty: &'a str,
    pub currency: &'a str,
}

impl Default for QuickCreateTarget<'_> {
    fn default() -> Self {
        Self {
            counterparty: DEFAULT_COUNTERPARTY,
            currency: "USD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickCreated {
    pub obligation_id: i64,
    pub due_id: i64,
    pub payment_id: i64,
    /// The obligation's currency, which the new due is billed in.
    pub currency: String,
}

fn period_patterns() -> &'static (Regex, Regex) {
    static RE: OnceLock<(Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"^(\d{4})[-/](\d{1,2})$").unwrap(),
            Regex::new(r"^(\d{1,2})[-/](\d{4})$").unwrap(),
        )
    })
}

/// Normalize `YYYY-MM`, `MM-YYYY` (or with `/`) to `YYYY-MM`.
pub fn normalize_period(raw: &str) -> Result<String> {
    let s = raw.trim();
    let (year_first, month_first) = period_patterns();
    let (year, month) = if let Some(c) = year_first.captures(s) {
        (c[1].to_string(), c[2].to_string())
    } else if let Some(c) = month_first.captures(s) {
        (c[2].to_string(), c[1].to_string())
    } else {
        return Err(DuesError::InvalidPeriod(raw.to_string()));
    };
    match month.parse::<u32>() {
        Ok(m @ 1..=12) => Ok(format!("{year}-{m:02}")),
        _ => Err(DuesError::InvalidPeriod(raw.to_string())),
    }
}

/// Book an unmatched bank row as a paid due under the reconciliation counterparty.
pub fn quick_create_from_bank_row(
    conn: &mut Connection,
    row: &BankTransactionRow,
    period: &str,
    receipt: &Receipt,
    target: &QuickCreateTarget,
) -> Result<QuickCreated> {
    let period = normalize_period(period)?;
    let amount = row.signed_amount.abs();

    let tx = conn.transaction()?;
    let counterparty_id = store::resolve_or_create_counterparty(&tx, target.counterparty)?;
    let property_id = store::first_property_or_create(&tx, PLACEHOLDER_PROPERTY)?;
    let obligation_id = store::resolve_or_create_obligation(&tx, counterparty_id, property_id, target.currency)?;
    let currency = store::obligation_currency(&tx, obligation_id)?;
    let due_id = store::create_due(&tx, &NewDue {
        obligation_id,
        period: &period,
        due_date: Some(row.date),
        amount,
        currency: &currency,
        status: DueStatus::Paid,
        description: Some(&row.description),
    })?;
    let payment_id = store::create_payment(&tx, due_id, amount, Some(row.date))?;

    if let Some(path) = &receipt.invoice {
        store::attach_document(&tx, due_id, DocumentKind::Invoice, path)?;
    }
    if let Some(path) = &receipt.payment_proof {
        store::attach_document(&tx, due_id, DocumentKind::PaymentProof, path)?;
    }
    tx.commit()?;

    tracing::info!(due_id, payment_id, %period, row = row.row_number, "quick-created due from bank row");
    Ok(QuickCreated {
        obligation_id,
        due_id,
        payment_id,
        currency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;

    fn bank_row(amount: f64) -> BankTransactionRow {
        BankTransactionRow {
            row_number: 4,
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            description: "ELEC DEBIT".into(),
            signed_amount: amount,
            raw_reference: String::new(),
        }
    }

    fn seed_pending_due(conn: &Connection) -> i64 {
        let cp = store::resolve_or_create_counterparty(conn, "Power Co").unwrap();
        let prop = store::resolve_or_create_property(conn, "Unit A").unwrap();
        let ob = store::resolve_or_create_obligation(conn, cp, prop, "USD").unwrap();
        store::create_due(conn, &NewDue {
            obligation_id: ob,
            period: "2025-01",
            due_date: None,
            amount: 1234.56,
            currency: "USD",
            status: DueStatus::Pending,
            description: None,
        })
        .unwrap()
    }

    fn payment_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM payments", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_apply_then_revert_round_trip() {
        let (_dir, mut conn) = test_db();
        let due = seed_pending_due(&conn);

        let payment = apply_match(&mut conn, &bank_row(-1234.56), due).unwrap();
        assert_eq!(store::get_due(&conn, due).unwrap().status, DueStatus::Paid);
        let payments = store::payments_for_due(&conn, due).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, payment);
        assert_eq!(payments[0].amount, 1234.56);
        assert_eq!(payments[0].date, NaiveDate::from_ymd_opt(2025, 1, 10));

        // applying again reuses the same payment
        assert_eq!(apply_match(&mut conn, &bank_row(-1234.56), due).unwrap(), payment);
        assert_eq!(payment_count(&conn), 1);

        let cleared = revert_match(&mut conn, due).unwrap();
        assert_eq!(cleared.len(), 1);
        assert_eq!(cleared[0].id, payment);
        assert_eq!(cleared[0].amount, 1234.56);
        assert_eq!(store::get_due(&conn, due).unwrap().status, DueStatus::Pending);
        let payments = store::payments_for_due(&conn, due).unwrap();
        assert_eq!(payments[0].amount, 0.0);
        assert_eq!(payments[0].date, None);
    }

    #[test]
    fn test_pay_due_defaults_to_amount_owed() {
        let (_dir, mut conn) = test_db();
        let due = seed_pending_due(&conn);
        let day = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        pay_due(&mut conn, due, None, day).unwrap();
        let payments = store::payments_for_due(&conn, due).unwrap();
        assert_eq!(payments[0].amount, 1234.56);
        assert_eq!(payments[0].date, Some(day));
        assert_eq!(store::get_due(&conn, due).unwrap().status, DueStatus::Paid);

        pay_due(&mut conn, due, Some(1000.0), day).unwrap();
        assert_eq!(store::payments_for_due(&conn, due).unwrap()[0].amount, 1000.0);
    }

    #[test]
    fn test_revert_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let due = seed_pending_due(&conn);
        pay_due(&mut conn, due, None, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()).unwrap();
        assert_eq!(revert_match(&mut conn, due).unwrap().len(), 1);
        assert!(revert_match(&mut conn, due).unwrap().is_empty());
        assert_eq!(store::get_due(&conn, due).unwrap().status, DueStatus::Pending);
    }

    #[test]
    fn test_unknown_due_is_rejected() {
        let (_dir, mut conn) = test_db();
        assert!(matches!(apply_match(&mut conn, &bank_row(-1.0), 99), Err(DuesError::UnknownDue(99))));
        assert!(matches!(revert_match(&mut conn, 99), Err(DuesError::UnknownDue(99))));
        assert!(matches!(delete_due(&mut conn, 99), Err(DuesError::UnknownDue(99))));
        assert_eq!(payment_count(&conn), 0);
    }

    #[test]
    fn test_normalize_period() {
        assert_eq!(normalize_period("2025-01").unwrap(), "2025-01");
        assert_eq!(normalize_period("01-2025").unwrap(), "2025-01");
        assert_eq!(normalize_period("1/2025").unwrap(), "2025-01");
        assert_eq!(normalize_period(" 2025/12 ").unwrap(), "2025-12");
        assert!(matches!(normalize_period("2025-13"), Err(DuesError::InvalidPeriod(_))));
        assert!(matches!(normalize_period("January 2025"), Err(DuesError::InvalidPeriod(_))));
    }

    #[test]
    fn test_quick_create_with_receipts() {
        let (dir, mut conn) = test_db();
        let invoice = dir.path().join("invoice.pdf");
        std::fs::write(&invoice, b"invoice").unwrap();
        let receipt = Receipt {
            invoice: Some(invoice),
            payment_proof: None,
        };
        let created =
            quick_create_from_bank_row(&mut conn, &bank_row(-75.0), "01-2025", &receipt, &QuickCreateTarget::default())
                .unwrap();

        let due = store::get_due(&conn, created.due_id).unwrap();
        assert_eq!(due.status, DueStatus::Paid);
        assert_eq!(due.period, "2025-01");
        assert_eq!(due.amount, 75.0);
        assert_eq!(due.description.as_deref(), Some("ELEC DEBIT"));

        let (cp, prop): (String, String) = conn
            .query_row(
                "SELECT c.name, p.name FROM obligations o \
                 JOIN counterparties c ON o.counterparty_id = c.id \
                 JOIN properties p ON o.property_id = p.id WHERE o.id = ?1",
                [created.obligation_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(cp, DEFAULT_COUNTERPARTY);
        assert_eq!(prop, PLACEHOLDER_PROPERTY);

        let docs: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents WHERE due_id = ?1", [created.due_id], |r| r.get(0))
            .unwrap();
        assert_eq!(docs, 1);
    }

    #[test]
    fn test_quick_create_uses_existing_property() {
        let (_dir, mut conn) = test_db();
        seed_pending_due(&conn);
        let first = quick_create_from_bank_row(&mut conn, &bank_row(-10.0), "2025-02", &Receipt::default(), &QuickCreateTarget::default())
            .unwrap();
        let second = quick_create_from_bank_row(&mut conn, &bank_row(-20.0), "2025-03", &Receipt::default(), &QuickCreateTarget::default())
            .unwrap();
        assert_eq!(first.obligation_id, second.obligation_id);
        let property: String = conn
            .query_row(
                "SELECT p.name FROM obligations o JOIN properties p ON o.property_id = p.id WHERE o.id = ?1",
                [first.obligation_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(property, "Unit A");
    }

    #[test]
    fn test_quick_create_bills_in_existing_obligation_currency() {
        let (_dir, mut conn) = test_db();
        let eur = QuickCreateTarget {
            currency: "EUR",
            ..Default::default()
        };
        let first = quick_create_from_bank_row(&mut conn, &bank_row(-10.0), "2025-02", &Receipt::default(), &eur).unwrap();
        assert_eq!(first.currency, "EUR");

        let second = quick_create_from_bank_row(&mut conn, &bank_row(-20.0), "2025-03", &Receipt::default(), &QuickCreateTarget::default())
            .unwrap();
        assert_eq!(second.obligation_id, first.obligation_id);
        assert_eq!(second.currency, "EUR");
        assert_eq!(store::get_due(&conn, second.due_id).unwrap().currency, "EUR");
    }

    #[test]
    fn test_quick_create_rolls_back_on_missing_receipt() {
        let (dir, mut conn) = test_db();
        let receipt = Receipt {
            invoice: None,
            payment_proof: Some(dir.path().join("missing.png")),
        };
        let result =
            quick_create_from_bank_row(&mut conn, &bank_row(-75.0), "2025-01", &receipt, &QuickCreateTarget::default());
        assert!(matches!(result, Err(DuesError::Io(_))));
        let dues: i64 = conn.query_row("SELECT COUNT(*) FROM dues", [], |r| r.get(0)).unwrap();
        let cps: i64 = conn.query_row("SELECT COUNT(*) FROM counterparties", [], |r| r.get(0)).unwrap();
        assert_eq!(dues, 0);
        assert_eq!(cps, 0);
        assert_eq!(payment_count(&conn), 0);
    }

    #[test]
    fn test_quick_create_rejects_bad_period_before_writing() {
        let (_dir, mut conn) = test_db();
        let result =
            quick_create_from_bank_row(&mut conn, &bank_row(-75.0), "2025", &Receipt::default(), &QuickCreateTarget::default());
        assert!(matches!(result, Err(DuesError::InvalidPeriod(_))));
        let dues: i64 = conn.query_row("SELECT COUNT(*) FROM dues", [], |r| r.get(0)).unwrap();
        assert_eq!(dues, 0);
    }
}
