use std::{collections::BTreeMap, error::Error};

use crate::query::Query;

use super::CodeGen;

/// Dumps the query metadata as pretty-printed JSON keyed by query name.
#[derive(Default)]
pub struct JsonCodeGen;

impl CodeGen for JsonCodeGen {
    fn render(&self, queries: &[Query]) -> Result<String, Box<dyn Error>> {
        let queries: BTreeMap<&str, &Query> = queries
            .iter()
            .map(|query| (query.name.as_str(), query))
            .collect();
        Ok(serde_json::to_string_pretty(&queries)?)
    }
}
