use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuesError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not detect structure: {0}")]
    StructureDetection(String),

    #[error("Missing required columns: need {required}, detected [{detected}]")]
    MissingColumns { required: String, detected: String },

    #[error("Unknown due: {0}")]
    UnknownDue(i64),

    #[error("No statement row {0}")]
    UnknownRow(usize),

    #[error("Invalid period '{0}' (expected YYYY-MM or MM-YYYY)")]
    InvalidPeriod(String),

    #[error("Reconciliation cancelled after {0} rows")]
    Cancelled(usize),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, DuesError>;
