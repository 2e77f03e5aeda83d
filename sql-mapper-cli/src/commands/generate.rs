use std::{error::Error, path::PathBuf};

use clap::Parser;
use sql_mapper_core::generate_from_directories;

use crate::config::MapperConfig;

#[derive(Parser, Debug, Clone)]
#[must_use]
pub struct Generate {
    /// Configuration file, defaults to sql-mapper.toml when present
    config: Option<PathBuf>,
    #[arg(long, help = "Show debug information")]
    debug: bool,
}

impl Generate {
    pub fn run(self) -> Result<(), Box<dyn Error>> {
        super::init_logging(self.debug)?;
        let config = MapperConfig::discover(self.config.as_deref())?;
        let code = render(&config)?;
        match config.target {
            Some(target) => {
                std::fs::write(&target, code)?;
                tracing::info!("Written generated code to {}", target.display());
            }
            None => println!("{code}"),
        }
        Ok(())
    }
}

fn render(config: &MapperConfig) -> Result<String, Box<dyn Error>> {
    generate_from_directories(&config.source, config.codegen().as_ref())
}
