use crate::cli::open_db;
use crate::error::Result;
use crate::settings::{db_path, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Currency:   {}", settings.base_currency);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `dues init` to set up.");
        return Ok(());
    }

    let conn = open_db()?;
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

    println!();
    println!("Counterparties: {}", count("SELECT count(*) FROM counterparties")?);
    println!("Obligations:    {}", count("SELECT count(*) FROM obligations")?);
    println!("Pending dues:   {}", count("SELECT count(*) FROM dues WHERE status = 'PENDING'")?);
    println!("Paid dues:      {}", count("SELECT count(*) FROM dues WHERE status = 'PAID'")?);
    println!("Payments:       {}", count("SELECT count(*) FROM payments WHERE date IS NOT NULL AND amount <> 0")?);
    println!("Documents:      {}", count("SELECT count(*) FROM documents")?);
    println!("Rates:          {}", count("SELECT count(*) FROM exchange_rates")?);
    Ok(())
}
