use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{open_db, parse_day};
use crate::currency::{set_rate, treasury_summary, RateTable};
use crate::error::{DuesError, Result};
use crate::fmt::money;
use crate::settings::load_settings;

pub fn rate(from: &str, to: &str, rate: f64, date: Option<&str>) -> Result<()> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(DuesError::Other(format!("Rate must be positive, got {rate}")));
    }
    let date = match date {
        Some(d) => parse_day(d)?,
        None => chrono::Local::now().date_naive(),
    };
    let conn = open_db()?;
    set_rate(&conn, from, to, date, rate)?;
    println!("1 {} = {rate} {} as of {date}", from.to_ascii_uppercase(), to.to_ascii_uppercase());
    Ok(())
}

pub fn run(currency: Option<&str>, as_of: Option<&str>) -> Result<()> {
    let target = currency
        .map(str::to_string)
        .unwrap_or_else(|| load_settings().base_currency);
    let as_of = match as_of {
        Some(d) => parse_day(d)?,
        None => chrono::Local::now().date_naive(),
    };
    let conn = open_db()?;
    let summary = treasury_summary(&conn, &RateTable::new(&conn), &target, as_of)?;

    let mut table = Table::new();
    table.set_header(vec!["Currency", "Pending", "Paid"]);
    for t in &summary.by_currency {
        table.add_row(vec![
            Cell::new(&t.currency),
            Cell::new(money(t.pending, &t.currency)),
            Cell::new(money(t.paid, &t.currency)),
        ]);
    }
    table.add_row(vec![
        Cell::new(format!("Total ({})", summary.target_currency).bold()),
        Cell::new(money(summary.pending_total, &summary.target_currency)),
        Cell::new(money(summary.paid_total, &summary.target_currency)),
    ]);
    println!("Treasury as of {}\n{table}", summary.as_of);

    if !summary.unconverted.is_empty() {
        println!(
            "{}",
            format!(
                "Not included in totals (no rate to {}): {}",
                summary.target_currency,
                summary.unconverted.join(", ")
            )
            .yellow()
        );
    }
    Ok(())
}
