use std::error::Error;
use std::path::Path;

use clap::Parser;
use sql_mapper_core::{extract::extract_query, loader::load_file, parser, query::Query};

#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Analyze {
    /// Paths to .sql files or inline SQL statements
    query: Vec<String>,
    #[arg(long, help = "Show debug information")]
    debug: bool,
}

impl Analyze {
    fn get_query(query: &str) -> Result<Query, Box<dyn Error>> {
        Ok(match std::fs::exists(query)? {
            true => load_file(Path::new(query))?,
            false => extract_query("query", &parser::parse_statement(query)?)?,
        })
    }

    pub fn run(self) -> Result<(), Box<dyn Error>> {
        super::init_logging(self.debug)?;
        for query in &self.query {
            println!("{}", describe(&Self::get_query(query)?));
        }
        Ok(())
    }
}

fn describe(query: &Query) -> String {
    format!(
        "{}\n  columns: {}\n  args: {}\n  query: {}",
        query.name,
        query.column_names().collect::<Vec<_>>().join(", "),
        query.arg_names().collect::<Vec<_>>().join(", "),
        query.query_string
    )
}
