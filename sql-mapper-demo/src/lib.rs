//! Accessors generated at build time from the files in `queries/`.

pub mod queries {
    include!(concat!(env!("OUT_DIR"), "/queries.rs"));
}
