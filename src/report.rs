use std::io::Write;
use std::ops::ControlFlow;

use rusqlite::Connection;
use serde::Serialize;

use crate::error::{DuesError, Result};
use crate::matcher::{Matcher, RunProgress};
use crate::models::{MatchResult, MatchStatus};
use crate::pool::build_pool;
use crate::statement::{SkippedRow, Statement};

// ---------------------------------------------------------------------------
// Report data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub matched: usize,
    pub date_drift: usize,
    pub distant_match: usize,
    pub unmatched: usize,
}

impl StatusCounts {
    pub fn tally(results: &[MatchResult]) -> Self {
        let mut counts = Self::default();
        for r in results {
            match r.status {
                MatchStatus::Match => counts.matched += 1,
                MatchStatus::DateDrift => counts.date_drift += 1,
                MatchStatus::DistantMatch => counts.distant_match += 1,
                MatchStatus::UnmatchedSystem => counts.unmatched += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.matched + self.date_drift + self.distant_match + self.unmatched
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub source: String,
    pub rows: Vec<MatchResult>,
    pub skipped: Vec<SkippedRow>,
    pub counts: StatusCounts,
}

impl ReconciliationReport {
    pub fn new(statement: &Statement, rows: Vec<MatchResult>) -> Self {
        Self {
            source: statement.source.display().to_string(),
            counts: StatusCounts::tally(&rows),
            skipped: statement.skipped.clone(),
            rows,
        }
    }

    /// One row of cell text per result, in statement order.
    pub fn project(&self, columns: &[ReportColumn]) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| columns.iter().map(|c| c.value(r)).collect())
            .collect()
    }

    pub fn write_csv<W: Write>(&self, out: W, columns: &[ReportColumn]) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(columns.iter().map(|c| c.header()))?;
        for row in self.project(columns) {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// JSON document with the projected rows keyed by column name, plus the skipped
    /// rows and status counts.
    pub fn to_json(&self, columns: &[ReportColumn]) -> Result<String> {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = self
            .rows
            .iter()
            .map(|r| columns.iter().map(|c| (c.key().to_string(), c.json_value(r))).collect())
            .collect();
        let doc = serde_json::json!({
            "source": self.source,
            "rows": rows,
            "skipped": self.skipped,
            "counts": self.counts,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

/// Build a fresh pool for the statement's date range and match every row.
pub fn run_reconciliation<F>(conn: &Connection, statement: &Statement, progress: F) -> Result<ReconciliationReport>
where
    F: FnMut(RunProgress) -> ControlFlow<()>,
{
    let pool = build_pool(conn, statement.date_range())?;
    if pool.is_empty() && !statement.rows.is_empty() {
        tracing::warn!(
            rows = statement.rows.len(),
            "no recorded payments near the statement dates; every row will be unmatched"
        );
    }
    let mut matcher = Matcher::new(&pool);
    let rows = matcher.run_with_progress(&statement.rows, progress)?;
    let report = ReconciliationReport::new(statement, rows);
    tracing::info!(
        rows = report.rows.len(),
        pool = pool.len(),
        consumed = matcher.consumed_count(),
        unmatched = report.counts.unmatched,
        "reconciliation finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportColumn {
    Row,
    Date,
    Description,
    BankAmount,
    SystemAmount,
    SystemDate,
    DayDelta,
    Status,
    Reference,
    DueId,
}

impl ReportColumn {
    pub const ALL: [ReportColumn; 10] = [
        Self::Row,
        Self::Date,
        Self::Description,
        Self::BankAmount,
        Self::SystemAmount,
        Self::SystemDate,
        Self::DayDelta,
        Self::Status,
        Self::Reference,
        Self::DueId,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Date => "date",
            Self::Description => "description",
            Self::BankAmount => "bank_amount",
            Self::SystemAmount => "system_amount",
            Self::SystemDate => "system_date",
            Self::DayDelta => "day_delta",
            Self::Status => "status",
            Self::Reference => "reference",
            Self::DueId => "due_id",
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            Self::Row => "Row",
            Self::Date => "Date",
            Self::Description => "Description",
            Self::BankAmount => "Bank Amount",
            Self::SystemAmount => "System Amount",
            Self::SystemDate => "System Date",
            Self::DayDelta => "Days",
            Self::Status => "Status",
            Self::Reference => "Reference",
            Self::DueId => "Due",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.key() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|c| c.key()).collect();
                DuesError::Other(format!("Unknown report column '{s}' (expected one of: {})", known.join(", ")))
            })
    }

    /// Parse a comma-separated list; an empty list means every column.
    pub fn parse_list(spec: &str) -> Result<Vec<Self>> {
        let columns = spec
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Self::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(if columns.is_empty() { Self::ALL.to_vec() } else { columns })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Row | Self::BankAmount | Self::SystemAmount | Self::DayDelta | Self::DueId)
    }

    pub fn value(&self, r: &MatchResult) -> String {
        let m = r.matched.as_ref();
        match self {
            Self::Row => r.bank_row.row_number.to_string(),
            Self::Date => r.bank_row.date.format("%Y-%m-%d").to_string(),
            Self::Description => r.display_description.clone(),
            Self::BankAmount => format!("{:.2}", r.bank_row.signed_amount),
            Self::SystemAmount => m.map(|c| format!("{:.2}", c.amount)).unwrap_or_default(),
            Self::SystemDate => m.map(|c| c.date.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            Self::DayDelta => r.day_delta.map(|d| d.to_string()).unwrap_or_default(),
            Self::Status => r.status.as_str().to_string(),
            Self::Reference => r.bank_row.raw_reference.clone(),
            Self::DueId => m.map(|c| c.due_id.to_string()).unwrap_or_default(),
        }
    }

    fn json_value(&self, r: &MatchResult) -> serde_json::Value {
        use serde_json::Value;
        let m = r.matched.as_ref();
        match self {
            Self::Row => Value::from(r.bank_row.row_number),
            Self::BankAmount => Value::from(r.bank_row.signed_amount),
            Self::SystemAmount => m.map_or(Value::Null, |c| Value::from(c.amount)),
            Self::DayDelta => r.day_delta.map_or(Value::Null, Value::from),
            Self::DueId => m.map_or(Value::Null, |c| Value::from(c.due_id)),
            Self::SystemDate if m.is_none() => Value::Null,
            _ => Value::from(self.value(r)),
        }
    }
}
