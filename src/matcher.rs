//! Pairs statement rows with system payments.
//!
//! Amount is the primary key: a candidate is eligible only when its absolute amount
//! is within [`AMOUNT_TOLERANCE`] of the row's absolute amount. Among eligible
//! candidates the one closest in date wins, with the earliest pool position breaking
//! ties. Date distance only ranks candidates and never excludes one.

use std::ops::ControlFlow;

use crate::error::{DuesError, Result};
use crate::models::{BankTransactionRow, MatchResult, MatchStatus};
use crate::pool::SystemPool;

pub const AMOUNT_TOLERANCE: f64 = 0.05;
/// Absorbs binary rounding so a gap of exactly [`AMOUNT_TOLERANCE`] is excluded at
/// any magnitude.
const TOLERANCE_EPSILON: f64 = 1e-6;
/// Largest day delta still reported as drift rather than a distant match.
pub const MAX_DRIFT_DAYS: i64 = 5;

/// Strict absolute band: `|a - b| < AMOUNT_TOLERANCE`.
pub fn within_tolerance(a: f64, b: f64) -> bool {
    (a - b).abs() < AMOUNT_TOLERANCE - TOLERANCE_EPSILON
}

pub fn classify(day_delta: i64) -> MatchStatus {
    match day_delta.abs() {
        0 => MatchStatus::Match,
        d if d <= MAX_DRIFT_DAYS => MatchStatus::DateDrift,
        _ => MatchStatus::DistantMatch,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub processed: usize,
    pub total: usize,
}

/// One reconciliation run over a pool snapshot. Each candidate can be consumed once.
pub struct Matcher<'p> {
    pool: &'p SystemPool,
    consumed: Vec<bool>,
}

impl<'p> Matcher<'p> {
    pub fn new(pool: &'p SystemPool) -> Self {
        Self {
            pool,
            consumed: vec![false; pool.len()],
        }
    }

    #[cfg(test)]
    pub fn is_consumed(&self, idx: usize) -> bool {
        self.consumed.get(idx).copied().unwrap_or(false)
    }

    pub fn consumed_count(&self) -> usize {
        self.consumed.iter().filter(|c| **c).count()
    }

    fn best_candidate(&self, row: &BankTransactionRow) -> Option<(usize, i64)> {
        let target = row.signed_amount.abs();
        let mut best: Option<(usize, i64)> = None;
        for (idx, candidate) in self.pool.candidates().iter().enumerate() {
            if self.consumed[idx] || !within_tolerance(candidate.amount, target) {
                continue;
            }
            let delta = (candidate.date - row.date).num_days();
            if best.map_or(true, |(_, d)| delta.abs() < d.abs()) {
                best = Some((idx, delta));
            }
        }
        best
    }

    pub fn match_row(&mut self, row: &BankTransactionRow) -> MatchResult {
        let Some((idx, delta)) = self.best_candidate(row) else {
            return MatchResult {
                bank_row: row.clone(),
                matched: None,
                status: MatchStatus::UnmatchedSystem,
                day_delta: None,
                display_description: row.description.clone(),
            };
        };
        self.consumed[idx] = true;
        let candidate = self.pool.candidates()[idx].clone();
        MatchResult {
            bank_row: row.clone(),
            display_description: candidate.counterparty.clone(),
            matched: Some(candidate),
            status: classify(delta),
            day_delta: Some(delta),
        }
    }

    /// Match every row in statement order.
    #[cfg(test)]
    pub fn run(&mut self, rows: &[BankTransactionRow]) -> Vec<MatchResult> {
        rows.iter().map(|row| self.match_row(row)).collect()
    }

    /// Like [`Matcher::run`], reporting progress after each row. Returning
    /// `ControlFlow::Break` from `progress` stops the run.
    pub fn run_with_progress<F>(&mut self, rows: &[BankTransactionRow], mut progress: F) -> Result<Vec<MatchResult>>
    where
        F: FnMut(RunProgress) -> ControlFlow<()>,
    {
        let total = rows.len();
        let mut results = Vec::with_capacity(total);
        for row in rows {
            results.push(self.match_row(row));
            let processed = results.len();
            if progress(RunProgress { processed, total }).is_break() {
                tracing::info!(processed, total, "reconciliation cancelled");
                return Err(DuesError::Cancelled(processed));
            }
        }
        Ok(results)
    }
}
