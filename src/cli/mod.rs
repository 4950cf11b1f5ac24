pub mod apply;
pub mod dues;
pub mod init;
pub mod reconcile;
pub mod status;
pub mod treasury;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{DuesError, Result};
use crate::normalize::parse_amount_checked;
use crate::settings::db_path;
use crate::structure::{ColumnMap, ColumnRole};

pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(DuesError::Settings(format!(
            "No database found at {}\nRun `dues init` to set up.",
            path.display()
        )));
    }
    get_connection(&path)
}

pub(crate) fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DuesError::Other(format!("Invalid date '{raw}' (expected YYYY-MM-DD)")))
}

pub(crate) fn parse_money(raw: &str) -> Result<f64> {
    parse_amount_checked(raw)
        .value()
        .ok_or_else(|| DuesError::Other(format!("Invalid amount '{}'", raw.trim())))
}

#[derive(Parser)]
#[command(name = "dues", version, about = "Recurring bills tracker with bank statement reconciliation.")]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
    Pdf,
}

/// Manual column assignments (1-based), overriding detection.
#[derive(Args, Debug, Default, Clone)]
pub struct ColumnArgs {
    /// Column number holding the transaction date
    #[arg(long = "date-col")]
    pub date_col: Option<usize>,
    /// Column number holding the description
    #[arg(long = "description-col")]
    pub description_col: Option<usize>,
    /// Column number holding a signed amount
    #[arg(long = "amount-col")]
    pub amount_col: Option<usize>,
    /// Column number holding debits
    #[arg(long = "debit-col")]
    pub debit_col: Option<usize>,
    /// Column number holding credits
    #[arg(long = "credit-col")]
    pub credit_col: Option<usize>,
    /// Column number holding the bank reference
    #[arg(long = "reference-col")]
    pub reference_col: Option<usize>,
}

impl ColumnArgs {
    pub fn to_map(&self) -> Result<ColumnMap> {
        let mut map = ColumnMap::new();
        for (role, col) in [
            (ColumnRole::Date, self.date_col),
            (ColumnRole::Description, self.description_col),
            (ColumnRole::Amount, self.amount_col),
            (ColumnRole::Debit, self.debit_col),
            (ColumnRole::Credit, self.credit_col),
            (ColumnRole::Reference, self.reference_col),
        ] {
            match col {
                Some(0) => {
                    return Err(DuesError::Other(format!("--{role}-col is 1-based; got 0")));
                }
                Some(n) => {
                    map.insert(role, n - 1);
                }
                None => {}
            }
        }
        Ok(map)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for dues data (default: ~/Documents/dues)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Reconcile a bank statement (CSV/XLSX) against recorded payments.
    Reconcile {
        /// Statement file
        file: String,
        /// Comma-separated report columns (default: all)
        #[arg(long)]
        columns: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<String>,
        #[command(flatten)]
        mapping: ColumnArgs,
    },
    /// Mark a due as paid by a statement row.
    Apply {
        /// Statement file
        file: String,
        /// Statement row number (as shown by `dues reconcile`)
        #[arg(long)]
        row: usize,
        /// Due ID
        #[arg(long)]
        due: i64,
        #[command(flatten)]
        mapping: ColumnArgs,
    },
    /// Undo a payment: due back to pending, payments zeroed.
    Revert {
        /// Due ID
        #[arg(long)]
        due: i64,
    },
    /// Record an unmatched statement row as a new paid due.
    QuickCreate {
        /// Statement file
        file: String,
        /// Statement row number
        #[arg(long)]
        row: usize,
        /// Billing period: YYYY-MM or MM-YYYY
        #[arg(long)]
        period: String,
        /// Invoice file to attach
        #[arg(long)]
        invoice: Option<String>,
        /// Payment proof file to attach
        #[arg(long)]
        proof: Option<String>,
        #[command(flatten)]
        mapping: ColumnArgs,
    },
    /// Manage dues.
    Dues {
        #[command(subcommand)]
        command: DuesCommands,
    },
    /// Record an exchange rate: one unit of FROM in TO.
    Rate {
        from: String,
        to: String,
        rate: f64,
        /// Effective date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Pending and paid totals per currency, converted to one currency.
    Treasury {
        /// Target currency (default: base currency from settings)
        #[arg(long)]
        currency: Option<String>,
        /// Rate date: YYYY-MM-DD (default: today)
        #[arg(long = "as-of")]
        as_of: Option<String>,
    },
    /// Show current database and summary statistics.
    Status,
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum DuesCommands {
    /// Register a due for a counterparty.
    Add {
        /// Counterparty name, e.g. 'City Water'
        counterparty: String,
        /// Billing period: YYYY-MM or MM-YYYY
        #[arg(long)]
        period: String,
        /// Amount owed
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// Property the bill belongs to
        #[arg(long, default_value = "General")]
        property: String,
        /// Due date: YYYY-MM-DD
        #[arg(long = "due-date")]
        due_date: Option<String>,
        /// Currency code (default: base currency from settings)
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List dues.
    List {
        /// Filter: pending or paid
        #[arg(long)]
        status: Option<String>,
    },
    /// Record a payment for a due and mark it paid.
    Pay {
        /// Due ID (shown in `dues dues list`)
        id: i64,
        /// Amount paid (default: the due amount)
        #[arg(long)]
        amount: Option<String>,
        /// Payment date: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete a due with its payments and documents.
    Delete {
        /// Due ID
        id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_column_args_are_one_based() {
        let args = ColumnArgs {
            date_col: Some(1),
            amount_col: Some(3),
            ..Default::default()
        };
        let map = args.to_map().unwrap();
        assert_eq!(map.get(&ColumnRole::Date), Some(&0));
        assert_eq!(map.get(&ColumnRole::Amount), Some(&2));
        assert_eq!(map.len(), 2);

        let zero = ColumnArgs { debit_col: Some(0), ..Default::default() };
        assert!(zero.to_map().is_err());
    }

    #[test]
    fn test_parse_reconcile_flags() {
        let cli = Cli::try_parse_from([
            "dues", "reconcile", "stmt.csv", "--format", "json", "--amount-col", "4", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Reconcile { file, format, mapping, .. } => {
                assert_eq!(file, "stmt.csv");
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(mapping.amount_col, Some(4));
            }
            _ => panic!("expected reconcile"),
        }
    }

    #[test]
    fn test_parse_money_and_day() {
        assert_eq!(parse_money("1.234,56").unwrap(), 1234.56);
        assert!(parse_money("lots").is_err());
        assert_eq!(parse_day("2025-01-10").unwrap(), NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        assert!(parse_day("10/01/2025").is_err());
    }
}
