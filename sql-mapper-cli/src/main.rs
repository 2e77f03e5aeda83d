mod commands;
mod config;

use std::error::Error;

use clap::*;
use commands::{Analyze, Execute, Generate};

#[derive(Parser)]
#[command(name = "sql-mapper", bin_name = "sql-mapper")]
enum Command {
    /// Render accessors for a directory of .sql files
    Generate(Generate),
    /// Print the metadata inferred for queries
    Analyze(Analyze),
    /// Run one query from a directory against DATABASE_URL
    Execute(Execute),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let command = Command::parse();
    match command {
        Command::Generate(args) => args.run(),
        Command::Analyze(args) => args.run(),
        Command::Execute(args) => args.run().await,
    }
}
