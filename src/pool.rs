use chrono::{Duration, NaiveDate};
use rusqlite::Connection;

use crate::error::Result;
use crate::models::SystemPaymentCandidate;

/// Payments can clear long before or after the statement period.
pub const POOL_WINDOW_DAYS: i64 = 365;

/// Immutable snapshot of payment candidates for one reconciliation run, in
/// insertion order. Consumption is tracked by the matcher, not here.
#[derive(Debug, Clone, Default)]
pub struct SystemPool {
    candidates: Vec<SystemPaymentCandidate>,
}

impl SystemPool {
    pub fn new(candidates: Vec<SystemPaymentCandidate>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[SystemPaymentCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Fetch every dated, non-zero payment within [`POOL_WINDOW_DAYS`] of the
/// statement's `[min_date, max_date]` range.
pub fn build_pool(conn: &Connection, date_range: Option<(NaiveDate, NaiveDate)>) -> Result<SystemPool> {
    let Some((min_date, max_date)) = date_range else {
        return Ok(SystemPool::default());
    };
    let from = min_date - Duration::days(POOL_WINDOW_DAYS);
    let to = max_date + Duration::days(POOL_WINDOW_DAYS);

    let mut stmt = conn.prepare(
        "SELECT p.id, p.due_id, o.id, c.name, p.date, p.amount \
         FROM payments p \
         JOIN dues d ON p.due_id = d.id \
         JOIN obligations o ON d.obligation_id = o.id \
         JOIN counterparties c ON o.counterparty_id = c.id \
         WHERE p.date IS NOT NULL AND p.date BETWEEN ?1 AND ?2 AND p.amount <> 0 \
         ORDER BY p.id",
    )?;
    let candidates = stmt
        .query_map(rusqlite::params![from, to], |row| {
            Ok(SystemPaymentCandidate {
                payment_id: row.get(0)?,
                due_id: row.get(1)?,
                obligation_id: row.get(2)?,
                counterparty: row.get(3)?,
                date: row.get(4)?,
                amount: row.get::<_, f64>(5)?.abs(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    tracing::debug!(%from, %to, candidates = candidates.len(), "built payment pool");
    Ok(SystemPool::new(candidates))
}
