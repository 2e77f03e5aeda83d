use serde::{Deserialize, Serialize};

use crate::parser::Statement;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReturnColumn {
    pub name: String,
}

impl ReturnColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryArg {
    pub name: String,
}

impl QueryArg {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Metadata for one `.sql` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    /// Statement text safe to embed in a double-quoted, single-line string literal.
    pub query_string: String,
    pub return_columns: Vec<ReturnColumn>,
    /// Sorted by name.
    pub args: Vec<QueryArg>,
}

impl Query {
    pub fn from_parts(
        name: impl Into<String>,
        statement: &Statement,
        return_columns: Vec<ReturnColumn>,
        args: Vec<QueryArg>,
    ) -> Self {
        Self {
            name: name.into(),
            query_string: escape_query(&statement.without_line_comments()),
            return_columns,
            args,
        }
    }

    pub fn arg_names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|arg| arg.name.as_str())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.return_columns.iter().map(|column| column.name.as_str())
    }
}

/// Escapes backslashes and double quotes and collapses line breaks into spaces.
pub fn escape_query(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for char in query.chars() {
        match char {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(char),
        }
    }
    escaped
}

/// Reverses [`escape_query`], apart from the collapsed line breaks.
pub fn unescape_query(query: &str) -> String {
    let mut unescaped = String::with_capacity(query.len());
    let mut chars = query.chars();
    while let Some(char) = chars.next() {
        match char {
            '\\' => unescaped.extend(chars.next()),
            _ => unescaped.push(char),
        }
    }
    unescaped
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_statement;

    use super::*;

    #[test]
    fn query_string_is_single_line() {
        let statement =
            parse_statement("SELECT \"Full Name\"\nFROM users -- all of them\nWHERE id = 1;")
                .unwrap();
        let query = Query::from_parts("q", &statement, vec![], vec![]);
        assert!(!query.query_string.contains('\n'));
        assert!(!query.query_string.contains("all of them"));
        assert!(query.query_string.starts_with("SELECT \\\"Full Name\\\" FROM users"));
        assert!(query.query_string.ends_with("WHERE id = 1"));
    }

    #[test]
    fn escapes_backslashes_before_quotes() {
        assert_eq!(escape_query(r#"E'a\n' AS "x""#), r#"E'a\\n' AS \"x\""#);
    }

    #[test]
    fn unescape_restores_statement() {
        let sql = r#"SELECT E'\t' AS "tab""#;
        assert_eq!(unescape_query(&escape_query(sql)), sql);
    }
}
