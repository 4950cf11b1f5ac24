use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::actions::{self, normalize_period};
use crate::cli::{open_db, parse_day, parse_money};
use crate::error::{DuesError, Result};
use crate::fmt::money;
use crate::models::DueStatus;
use crate::settings::load_settings;
use crate::store::{self, NewDue};

pub struct NewDueArgs {
    pub counterparty: String,
    pub property: String,
    pub period: String,
    pub amount: String,
    pub due_date: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

pub fn add(args: NewDueArgs) -> Result<()> {
    let period = normalize_period(&args.period)?;
    let amount = parse_money(&args.amount)?;
    let due_date = args.due_date.as_deref().map(parse_day).transpose()?;
    let requested = args.currency.as_deref().map(str::to_ascii_uppercase);
    let default_currency = requested
        .clone()
        .unwrap_or_else(|| load_settings().base_currency.to_ascii_uppercase());

    let mut conn = open_db()?;
    let tx = conn.transaction()?;
    let cp = store::resolve_or_create_counterparty(&tx, &args.counterparty)?;
    let prop = store::resolve_or_create_property(&tx, &args.property)?;
    let ob = store::resolve_or_create_obligation(&tx, cp, prop, &default_currency)?;
    let currency = store::obligation_currency(&tx, ob)?;
    if let Some(requested) = requested.filter(|r| *r != currency) {
        return Err(DuesError::Other(format!(
            "{} / {} is billed in {currency}, not {requested}",
            args.counterparty, args.property
        )));
    }
    let id = store::create_due(&tx, &NewDue {
        obligation_id: ob,
        period: &period,
        due_date,
        amount,
        currency: &currency,
        status: DueStatus::Pending,
        description: args.description.as_deref(),
    })?;
    tx.commit()?;

    println!("Added due {id}: {} {period} {}", args.counterparty, money(amount, &currency));
    Ok(())
}

pub fn list(status: Option<&str>) -> Result<()> {
    let status = status
        .map(|s| DueStatus::parse(&s.to_ascii_uppercase()).ok_or_else(|| DuesError::Other(format!("Unknown status '{s}' (pending or paid)"))))
        .transpose()?;
    let conn = open_db()?;
    let dues = store::list_dues(&conn, status)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Counterparty", "Property", "Period", "Due Date", "Amount", "Paid", "Status"]);
    for d in &dues {
        let status = match d.status {
            DueStatus::Paid => d.status.as_str().green(),
            DueStatus::Pending => d.status.as_str().yellow(),
        };
        table.add_row(vec![
            Cell::new(d.id),
            Cell::new(&d.counterparty),
            Cell::new(&d.property),
            Cell::new(&d.period),
            Cell::new(d.due_date.map(|x| x.to_string()).unwrap_or_default()),
            Cell::new(money(d.amount, &d.currency)),
            Cell::new(money(d.paid_amount, &d.currency)),
            Cell::new(status),
        ]);
    }
    println!("Dues\n{table}");
    Ok(())
}

pub fn pay(id: i64, amount: Option<&str>, date: Option<&str>) -> Result<()> {
    let amount = amount.map(parse_money).transpose()?;
    let date = match date {
        Some(d) => parse_day(d)?,
        None => chrono::Local::now().date_naive(),
    };
    let mut conn = open_db()?;
    let payment_id = actions::pay_due(&mut conn, id, amount, date)?;
    println!("Due {id} marked PAID on {date} (payment {payment_id})");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let mut conn = open_db()?;
    actions::delete_due(&mut conn, id)?;
    println!("Deleted due {id}");
    Ok(())
}
