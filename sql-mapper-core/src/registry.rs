//! Runtime access to queries straight from their metadata, without generating code.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeMap;

use crate::loader::{LoadError, load_directory};
use crate::query::{Query, unescape_query};
use crate::runtime::{ExecutionContext, Params, RowShapeError, Value};

#[derive(Debug)]
pub enum CallError<E> {
    UnknownQuery { name: String },
    Arity { expected: usize, got: usize },
    Execute(E),
}

impl<E: Display> Display for CallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::UnknownQuery { name } => write!(f, "Unknown query {name}"),
            CallError::Arity { expected, got } => {
                write!(f, "Query takes {expected} arguments, got {got}")
            }
            CallError::Execute(error) => write!(f, "{error}"),
        }
    }
}

impl<E: Error + 'static> Error for CallError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CallError::Execute(error) => Some(error),
            _ => None,
        }
    }
}

/// A result row whose values are addressed by return-column name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl NamedRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for NamedRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Queries by name, callable against any [`ExecutionContext`].
#[derive(Debug, Clone, Default)]
pub struct QueryRegistry {
    queries: BTreeMap<String, Query>,
}

impl QueryRegistry {
    pub fn from_queries(queries: impl IntoIterator<Item = Query>) -> Self {
        Self {
            queries: queries
                .into_iter()
                .map(|query| (query.name.clone(), query))
                .collect(),
        }
    }

    pub fn from_directory(directory: &Path) -> Result<Self, LoadError> {
        Ok(Self::from_queries(load_directory(directory)?))
    }

    pub fn get(&self, name: &str) -> Option<&Query> {
        self.queries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Runs query `name` with `args` given in the query's sorted argument order.
    pub async fn call<C: ExecutionContext>(
        &self,
        ctx: &C,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Vec<NamedRow>, CallError<C::Error>> {
        let query = self.get(name).ok_or_else(|| CallError::UnknownQuery {
            name: name.to_string(),
        })?;
        if args.len() != query.args.len() {
            return Err(CallError::Arity {
                expected: query.args.len(),
                got: args.len(),
            });
        }
        let params = query
            .arg_names()
            .zip(args)
            .fold(Params::new(), |params, (name, value)| {
                params.bind(name, value)
            });
        let rows = ctx
            .execute(&unescape_query(&query.query_string), &params)
            .await
            .map_err(CallError::Execute)?;

        let columns: Arc<[String]> = query.column_names().map(str::to_string).collect();
        let mut output = Vec::with_capacity(rows.len());
        for row in rows {
            if !columns.is_empty() && row.len() != columns.len() {
                let error = RowShapeError {
                    expected: columns.len(),
                    found: row.len(),
                };
                return Err(CallError::Execute(error.into()));
            }
            output.push(NamedRow {
                columns: columns.clone(),
                values: row.into_values(),
            });
        }
        Ok(output)
    }
}
