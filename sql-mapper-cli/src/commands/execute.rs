use std::{error::Error, path::PathBuf};

use clap::Parser;
use sql_mapper_core::{postgres::PgContext, registry::QueryRegistry, runtime::Value};

use crate::config;

#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Execute {
    /// Directory holding the .sql files
    directory: PathBuf,
    /// Name of the query to run
    query: String,
    /// Arguments in the query's sorted parameter order
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,
    #[arg(long, help = "Show debug information")]
    debug: bool,
}

/// Reads a command line argument as the narrowest matching value.
fn parse_arg(arg: &str) -> Value {
    if arg.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(bool) = arg.parse::<bool>() {
        return Value::Bool(bool);
    }
    if let Ok(int) = arg.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = arg.parse::<f64>() {
        return Value::Float(float);
    }
    Value::Text(arg.to_string())
}

impl Execute {
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        super::init_logging(self.debug)?;
        let registry = QueryRegistry::from_directory(&self.directory)?;
        let ctx = PgContext::connect(&config::db_url()?, 1).await?;
        let args = self.args.iter().map(|arg| parse_arg(arg)).collect();
        let rows = registry.call(&ctx, &self.query, args).await?;
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
        tracing::info!("{} rows returned by {}", rows.len(), self.query);
        Ok(())
    }
}
