use std::{env, error::Error, fmt::Display, path::Path, path::PathBuf};

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use sql_mapper_core::codegen::{
    CodeGen, json::JsonCodeGen, rust::RustCodeGen, sqlalchemy::SqlAlchemyCodeGen,
};

const DATABASE_URL: &str = "DATABASE_URL";
pub const CONFIG_FILE: &str = "sql-mapper.toml";
pub const DEFAULT_QUERIES: &str = "queries";

#[derive(Debug, Clone)]
pub enum ConfigError {
    DbUrlNotFound,
    Read { path: PathBuf, msg: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DbUrlNotFound => write!(
                f,
                "Database URL not found, please set the {DATABASE_URL} environment variable."
            ),
            ConfigError::Read { path, msg } => {
                write!(f, "encountered '{msg}' attempting to read {}", path.display())
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CodeGenerator {
    #[default]
    Rust,
    SqlAlchemy,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CodeGenSource {
    Single(PathBuf),
    List(Vec<PathBuf>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[must_use]
pub struct TomlConfig {
    path: CodeGenSource,
    target: Option<PathBuf>,
    #[serde(default = "Default::default")]
    mode: CodeGenerator,
    /// Module the generated Rust code imports its runtime types from.
    runtime_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    pub source: Vec<PathBuf>,
    pub target: Option<PathBuf>,
    pub mode: CodeGenerator,
    pub runtime_path: Option<String>,
}

impl Default for MapperConfig {
    /// Rust accessors for `./queries`, printed to stdout.
    fn default() -> Self {
        Self {
            source: vec![PathBuf::from(DEFAULT_QUERIES)],
            target: None,
            mode: CodeGenerator::default(),
            runtime_path: None,
        }
    }
}

pub fn db_url() -> Result<String, Box<dyn Error>> {
    // A missing .env file is fine, the variable may be set directly.
    dotenv().ok();
    Ok(env::var(DATABASE_URL).map_err(|_| ConfigError::DbUrlNotFound)?)
}

impl MapperConfig {
    pub fn from_toml_config(config: TomlConfig) -> Self {
        let source = match config.path {
            CodeGenSource::Single(item) => vec![item],
            CodeGenSource::List(items) => items,
        };
        Self {
            source,
            target: config.target,
            mode: config.mode,
            runtime_path: config.runtime_path,
        }
    }

    pub fn read(path: &Path) -> Result<Self, Box<dyn Error>> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            msg: error.to_string(),
        })?;
        let config: TomlConfig = toml::from_str(&content)?;
        Ok(Self::from_toml_config(config))
    }

    /// Reads `path`, or `sql-mapper.toml` if it exists, or falls back to the defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => Self::read(path),
            None if std::fs::exists(CONFIG_FILE)? => Self::read(Path::new(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub fn codegen(&self) -> Box<dyn CodeGen> {
        match self.mode {
            CodeGenerator::Rust => match &self.runtime_path {
                Some(runtime_path) => Box::new(RustCodeGen::new(runtime_path.clone())),
                None => Box::new(RustCodeGen::default()),
            },
            CodeGenerator::SqlAlchemy => Box::new(SqlAlchemyCodeGen),
            CodeGenerator::Json => Box::new(JsonCodeGen),
        }
    }
}
