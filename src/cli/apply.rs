use std::path::{Path, PathBuf};

use crate::actions::{self, QuickCreateTarget, Receipt};
use crate::cli::{open_db, ColumnArgs};
use crate::error::Result;
use crate::fmt::money;
use crate::settings::load_settings;
use crate::statement::load_statement;

pub fn apply(file: &str, row: usize, due_id: i64, mapping: &ColumnArgs) -> Result<()> {
    let statement = load_statement(Path::new(file), &mapping.to_map()?)?;
    let bank_row = statement.row(row)?;
    let mut conn = open_db()?;
    let payment_id = actions::apply_match(&mut conn, bank_row, due_id)?;
    println!(
        "Due {due_id} marked PAID: {} on {} (payment {payment_id})",
        money(bank_row.signed_amount.abs(), &load_settings().base_currency),
        bank_row.date
    );
    Ok(())
}

pub fn revert(due_id: i64) -> Result<()> {
    let mut conn = open_db()?;
    let cleared = actions::revert_match(&mut conn, due_id)?;
    println!("Due {due_id} reverted to PENDING");
    let currency = load_settings().base_currency;
    for payment in &cleared {
        if let Some(date) = payment.date {
            println!("  cleared payment {}: {} on {date}", payment.id, money(payment.amount, &currency));
        }
    }
    Ok(())
}

pub fn quick_create(
    file: &str,
    row: usize,
    period: &str,
    invoice: Option<String>,
    proof: Option<String>,
    mapping: &ColumnArgs,
) -> Result<()> {
    let settings = load_settings();
    let statement = load_statement(Path::new(file), &mapping.to_map()?)?;
    let bank_row = statement.row(row)?;
    let receipt = Receipt {
        invoice: invoice.map(PathBuf::from),
        payment_proof: proof.map(PathBuf::from),
    };
    let target = QuickCreateTarget {
        counterparty: &settings.reconciliation_counterparty,
        currency: &settings.base_currency,
    };

    let mut conn = open_db()?;
    let created = actions::quick_create_from_bank_row(&mut conn, bank_row, period, &receipt, &target)?;
    println!(
        "Created due {} ({}) for {} under '{}'",
        created.due_id,
        money(bank_row.signed_amount.abs(), &created.currency),
        bank_row.description,
        settings.reconciliation_counterparty
    );
    Ok(())
}
