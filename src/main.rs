mod actions;
mod cli;
mod currency;
mod db;
mod error;
mod fmt;
mod matcher;
mod models;
mod normalize;
#[cfg(feature = "pdf")]
mod pdf;
mod pool;
mod report;
mod settings;
mod statement;
mod store;
mod structure;
mod tabular;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, DuesCommands};

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("dues=debug,info")
    } else {
        EnvFilter::new("dues=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Reconcile {
            file,
            columns,
            format,
            output,
            mapping,
        } => cli::reconcile::run(&file, columns.as_deref(), format, output, &mapping),
        Commands::Apply { file, row, due, mapping } => cli::apply::apply(&file, row, due, &mapping),
        Commands::Revert { due } => cli::apply::revert(due),
        Commands::QuickCreate {
            file,
            row,
            period,
            invoice,
            proof,
            mapping,
        } => cli::apply::quick_create(&file, row, &period, invoice, proof, &mapping),
        Commands::Dues { command } => match command {
            DuesCommands::Add {
                counterparty,
                period,
                amount,
                property,
                due_date,
                currency,
                description,
            } => cli::dues::add(cli::dues::NewDueArgs {
                counterparty,
                property,
                period,
                amount,
                due_date,
                currency,
                description,
            }),
            DuesCommands::List { status } => cli::dues::list(status.as_deref()),
            DuesCommands::Pay { id, amount, date } => cli::dues::pay(id, amount.as_deref(), date.as_deref()),
            DuesCommands::Delete { id } => cli::dues::delete(id),
        },
        Commands::Rate { from, to, rate, date } => cli::treasury::rate(&from, &to, rate, date.as_deref()),
        Commands::Treasury { currency, as_of } => cli::treasury::run(currency.as_deref(), as_of.as_deref()),
        Commands::Status => cli::status::run(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "dues", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
