use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DueStatus {
    Pending,
    Paid,
}

impl DueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(Self::Pending),
            "PAID" => Some(Self::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Due {
    pub id: i64,
    pub obligation_id: i64,
    pub period: String,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    pub currency: String,
    pub status: DueStatus,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: i64,
    pub due_id: i64,
    pub amount: f64,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Invoice,
    PaymentProof,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "INVOICE",
            Self::PaymentProof => "PAYMENT_PROOF",
        }
    }
}

/// One statement line after normalization. Never mutated once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankTransactionRow {
    /// 1-based position in the statement body.
    pub row_number: usize,
    pub date: NaiveDate,
    pub description: String,
    pub signed_amount: f64,
    pub raw_reference: String,
}

/// A persisted payment offered to the matcher for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemPaymentCandidate {
    pub payment_id: i64,
    pub due_id: i64,
    pub obligation_id: i64,
    pub counterparty: String,
    pub date: NaiveDate,
    /// Always the absolute payment amount.
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Match,
    DateDrift,
    DistantMatch,
    UnmatchedSystem,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::DateDrift => "DATE_DRIFT",
            Self::DistantMatch => "DISTANT_MATCH",
            Self::UnmatchedSystem => "UNMATCHED_SYSTEM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub bank_row: BankTransactionRow,
    pub matched: Option<SystemPaymentCandidate>,
    pub status: MatchStatus,
    pub day_delta: Option<i64>,
    pub display_description: String,
}
