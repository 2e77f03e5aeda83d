use std::{env, error::Error, fs, path::Path, path::PathBuf};

use sql_mapper_core::{codegen::rust::RustCodeGen, generate_from_directory};

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=queries");
    let code = generate_from_directory(Path::new("queries"), &RustCodeGen::default())?;
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    fs::write(out_dir.join("queries.rs"), code)?;
    Ok(())
}
