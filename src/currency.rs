use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("no {from}->{to} rate on or before {as_of}")]
pub struct ConversionUnavailable {
    pub from: String,
    pub to: String,
    pub as_of: NaiveDate,
}

/// Converts amounts between currencies as of a date.
pub trait CurrencyConverter {
    fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> std::result::Result<f64, ConversionUnavailable>;
}

/// Converter backed by the `exchange_rates` table. Uses the latest rate on or
/// before the date, falling back to the inverse of the reverse pair.
pub struct RateTable<'c> {
    conn: &'c Connection,
}

impl<'c> RateTable<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn lookup(&self, from: &str, to: &str, as_of: NaiveDate) -> Option<f64> {
        let rate = self
            .conn
            .query_row(
                "SELECT rate FROM exchange_rates \
                 WHERE from_currency = ?1 AND to_currency = ?2 AND date <= ?3 \
                 ORDER BY date DESC LIMIT 1",
                rusqlite::params![from, to, as_of],
                |r| r.get::<_, f64>(0),
            )
            .optional();
        match rate {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(from, to, error = %e, "exchange rate lookup failed");
                None
            }
        }
    }
}

impl CurrencyConverter for RateTable<'_> {
    fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        as_of: NaiveDate,
    ) -> std::result::Result<f64, ConversionUnavailable> {
        let (from, to) = (from.to_ascii_uppercase(), to.to_ascii_uppercase());
        if from == to {
            return Ok(amount);
        }
        if let Some(rate) = self.lookup(&from, &to, as_of) {
            return Ok(amount * rate);
        }
        match self.lookup(&to, &from, as_of) {
            Some(rate) if rate != 0.0 => Ok(amount / rate),
            _ => Err(ConversionUnavailable { from, to, as_of }),
        }
    }
}

/// Store the rate for one unit of `from` in `to` on `date`, replacing any existing one.
pub fn set_rate(conn: &Connection, from: &str, to: &str, date: NaiveDate, rate: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO exchange_rates (from_currency, to_currency, date, rate) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (from_currency, to_currency, date) DO UPDATE SET rate = excluded.rate",
        rusqlite::params![from.to_ascii_uppercase(), to.to_ascii_uppercase(), date, rate],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Treasury
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyTotals {
    pub currency: String,
    pub pending: f64,
    pub paid: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreasurySummary {
    pub target_currency: String,
    pub as_of: NaiveDate,
    pub by_currency: Vec<CurrencyTotals>,
    pub pending_total: f64,
    pub paid_total: f64,
    /// Currencies left out of the totals because no rate was available.
    pub unconverted: Vec<String>,
}

/// Pending and paid due amounts per currency, plus totals converted into `target`.
pub fn treasury_summary(
    conn: &Connection,
    converter: &impl CurrencyConverter,
    target: &str,
    as_of: NaiveDate,
) -> Result<TreasurySummary> {
    let mut stmt = conn.prepare(
        "SELECT currency, \
                SUM(CASE WHEN status = 'PENDING' THEN amount ELSE 0 END), \
                SUM(CASE WHEN status = 'PAID' THEN amount ELSE 0 END) \
         FROM dues GROUP BY currency ORDER BY currency",
    )?;
    let by_currency = stmt
        .query_map([], |r| {
            Ok(CurrencyTotals {
                currency: r.get(0)?,
                pending: r.get(1)?,
                paid: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut pending_total = 0.0;
    let mut paid_total = 0.0;
    let mut unconverted = Vec::new();
    for totals in &by_currency {
        let pending = converter.convert(totals.pending, &totals.currency, target, as_of);
        let paid = converter.convert(totals.paid, &totals.currency, target, as_of);
        match (pending, paid) {
            (Ok(p), Ok(d)) => {
                pending_total += p;
                paid_total += d;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(currency = %totals.currency, "{e}");
                unconverted.push(totals.currency.clone());
            }
        }
    }

    Ok(TreasurySummary {
        target_currency: target.to_ascii_uppercase(),
        as_of,
        by_currency,
        pending_total,
        paid_total,
        unconverted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;
    use crate::models::DueStatus;
    use crate::store::{self, NewDue};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed_due(conn: &Connection, currency: &str, amount: f64, status: DueStatus) {
        let cp = store::resolve_or_create_counterparty(conn, "Landlord").unwrap();
        let prop = store::resolve_or_create_property(conn, currency).unwrap();
        let ob = store::resolve_or_create_obligation(conn, cp, prop, currency).unwrap();
        store::create_due(conn, &NewDue {
            obligation_id: ob,
            period: "2025-01",
            due_date: None,
            amount,
            currency,
            status,
            description: None,
        })
        .unwrap();
    }

    #[test]
    fn test_rate_table_direct_inverse_and_identity() {
        let (_dir, conn) = test_db();
        set_rate(&conn, "eur", "usd", ymd(2025, 1, 1), 1.10).unwrap();
        set_rate(&conn, "EUR", "USD", ymd(2025, 2, 1), 1.20).unwrap();
        let rates = RateTable::new(&conn);

        assert_eq!(rates.convert(10.0, "USD", "usd", ymd(2020, 1, 1)), Ok(10.0));
        let jan = rates.convert(100.0, "EUR", "USD", ymd(2025, 1, 15)).unwrap();
        assert!((jan - 110.0).abs() < 1e-9);
        let feb = rates.convert(100.0, "EUR", "USD", ymd(2025, 3, 1)).unwrap();
        assert!((feb - 120.0).abs() < 1e-9);
        let inverse = rates.convert(120.0, "USD", "EUR", ymd(2025, 3, 1)).unwrap();
        assert!((inverse - 100.0).abs() < 1e-9);

        let err = rates.convert(1.0, "EUR", "USD", ymd(2024, 12, 31)).unwrap_err();
        assert_eq!(err.to_string(), "no EUR->USD rate on or before 2024-12-31");
    }

    #[test]
    fn test_set_rate_replaces_same_day() {
        let (_dir, conn) = test_db();
        set_rate(&conn, "GBP", "USD", ymd(2025, 1, 1), 1.2).unwrap();
        set_rate(&conn, "GBP", "USD", ymd(2025, 1, 1), 1.3).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM exchange_rates", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
        let v = RateTable::new(&conn).convert(10.0, "GBP", "USD", ymd(2025, 1, 1)).unwrap();
        assert!((v - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_treasury_omits_unconvertible_currencies() {
        let (_dir, conn) = test_db();
        seed_due(&conn, "USD", 100.0, DueStatus::Pending);
        seed_due(&conn, "USD", 40.0, DueStatus::Paid);
        seed_due(&conn, "EUR", 50.0, DueStatus::Pending);
        seed_due(&conn, "ARS", 9000.0, DueStatus::Pending);
        set_rate(&conn, "EUR", "USD", ymd(2025, 1, 1), 2.0).unwrap();

        let summary = treasury_summary(&conn, &RateTable::new(&conn), "usd", ymd(2025, 6, 1)).unwrap();
        assert_eq!(summary.target_currency, "USD");
        assert_eq!(summary.by_currency.len(), 3);
        assert_eq!(summary.unconverted, vec!["ARS".to_string()]);
        assert!((summary.pending_total - 200.0).abs() < 1e-9);
        assert!((summary.paid_total - 40.0).abs() < 1e-9);
    }

    struct Fixed(f64);

    impl CurrencyConverter for Fixed {
        fn convert(&self, amount: f64, _: &str, _: &str, _: NaiveDate) -> std::result::Result<f64, ConversionUnavailable> {
            Ok(amount * self.0)
        }
    }

    #[test]
    fn test_treasury_accepts_any_converter() {
        let (_dir, conn) = test_db();
        seed_due(&conn, "EUR", 10.0, DueStatus::Pending);
        let summary = treasury_summary(&conn, &Fixed(3.0), "USD", ymd(2025, 1, 1)).unwrap();
        assert_eq!(summary.pending_total, 30.0);
        assert!(summary.unconverted.is_empty());
    }
}
