use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{open_db, ColumnArgs, OutputFormat};
use crate::error::Result;
use crate::models::MatchStatus;
use crate::report::{run_reconciliation, ReconciliationReport, ReportColumn};
#[cfg(feature = "pdf")]
use crate::settings::get_data_dir;
use crate::statement::load_statement;

pub fn run(
    file: &str,
    columns: Option<&str>,
    format: OutputFormat,
    output: Option<String>,
    mapping: &ColumnArgs,
) -> Result<()> {
    let columns = ReportColumn::parse_list(columns.unwrap_or(""))?;
    let statement = load_statement(Path::new(file), &mapping.to_map()?)?;
    tracing::debug!(
        header_row = statement.structure.header_row,
        columns = %statement.structure.describe_columns(),
        "statement layout"
    );
    if statement.fell_back {
        eprintln!("{}", "Warning: structure detection failed; using manual column mapping.".yellow());
    }
    let conn = open_db()?;
    let report = run_reconciliation(&conn, &statement, |p| {
        tracing::trace!(processed = p.processed, total = p.total, "matching");
        ControlFlow::Continue(())
    })?;

    match format {
        OutputFormat::Text => {
            let text = render_text(&report, &columns);
            write_or_print(output.as_deref(), text.as_bytes())
        }
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            report.write_csv(&mut buf, &columns)?;
            write_or_print(output.as_deref(), &buf)
        }
        OutputFormat::Json => {
            let json = report.to_json(&columns)?;
            write_or_print(output.as_deref(), format!("{json}\n").as_bytes())
        }
        OutputFormat::Pdf => export_pdf(&report, &columns, output),
    }
}

fn write_or_print(output: Option<&str>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            let path = PathBuf::from(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, bytes)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", String::from_utf8_lossy(bytes)),
    }
    Ok(())
}

#[cfg(feature = "pdf")]
fn export_pdf(report: &ReconciliationReport, columns: &[ReportColumn], output: Option<String>) -> Result<()> {
    let bytes = crate::pdf::render_reconciliation(report, columns)?;
    let path = output.unwrap_or_else(|| {
        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        get_data_dir()
            .join("exports")
            .join(format!("reconciliation-{date}.pdf"))
            .to_string_lossy()
            .to_string()
    });
    write_or_print(Some(&path), &bytes)
}

#[cfg(not(feature = "pdf"))]
fn export_pdf(_: &ReconciliationReport, _: &[ReportColumn], _: Option<String>) -> Result<()> {
    Err(crate::error::DuesError::Pdf("this build was compiled without the `pdf` feature".to_string()))
}

fn status_cell(status: MatchStatus) -> Cell {
    let label = status.as_str();
    Cell::new(match status {
        MatchStatus::Match => label.green(),
        MatchStatus::DateDrift => label.yellow(),
        MatchStatus::DistantMatch => label.magenta(),
        MatchStatus::UnmatchedSystem => label.red().bold(),
    })
}

pub fn render_text(report: &ReconciliationReport, columns: &[ReportColumn]) -> String {
    let mut table = Table::new();
    table.set_header(columns.iter().map(|c| c.header()).collect::<Vec<_>>());
    for result in &report.rows {
        table.add_row(
            columns
                .iter()
                .map(|c| match c {
                    ReportColumn::Status => status_cell(result.status),
                    c if c.is_numeric() => Cell::new(c.value(result)).set_alignment(CellAlignment::Right),
                    c => Cell::new(c.value(result)),
                })
                .collect::<Vec<_>>(),
        );
    }

    let c = &report.counts;
    let mut out = format!("Reconciliation: {}\n{table}\n", report.source);
    out.push_str(&format!(
        "{} match, {} date drift, {} distant, {} unmatched ({} rows)\n",
        c.matched.to_string().green(),
        c.date_drift.to_string().yellow(),
        c.distant_match.to_string().magenta(),
        c.unmatched.to_string().red(),
        c.total()
    ));
    if !report.skipped.is_empty() {
        out.push_str(&format!("{}\n", format!("Skipped {} row(s):", report.skipped.len()).yellow()));
        for s in &report.skipped {
            out.push_str(&format!("  row {}: {}\n", s.row_number, s.reason));
        }
    }
    out
}
