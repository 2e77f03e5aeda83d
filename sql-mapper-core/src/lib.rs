use std::error::Error;
use std::path::Path;

use crate::codegen::CodeGen;

pub mod codegen;
pub mod extract;
pub mod loader;
pub mod parser;
pub mod postgres;
pub mod query;
pub mod registry;
pub mod runtime;

/// Loads every query in `directory` and renders them with `codegen`.
pub fn generate_from_directory(
    directory: &Path,
    codegen: &dyn CodeGen,
) -> Result<String, Box<dyn Error>> {
    let queries = loader::load_directory(directory)?;
    codegen.render(&queries)
}

/// Like [`generate_from_directory`], over several directories sharing one namespace.
pub fn generate_from_directories<P: AsRef<Path>>(
    directories: &[P],
    codegen: &dyn CodeGen,
) -> Result<String, Box<dyn Error>> {
    let queries = loader::load_directories(directories)?;
    codegen.render(&queries)
}
