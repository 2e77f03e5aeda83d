use std::error::Error;
use std::fmt::Write;

use crate::query::Query;

use super::{CodeGen, ItemNames, UniqueNames, sanitize_identifier};

const HEADER: &str = "import dataclasses
from typing import Any, Iterable
import sqlalchemy
";

const PY_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

fn py_ident(name: &str) -> String {
    let ident = sanitize_identifier(name);
    match PY_KEYWORDS.contains(&ident.as_str()) {
        true => format!("{ident}_"),
        false => ident,
    }
}

/// Generates a Python module with one callable object per query, executed
/// through a SQLAlchemy engine.
#[derive(Default)]
pub struct SqlAlchemyCodeGen;

impl SqlAlchemyCodeGen {
    fn query_to_sql_alchemy(
        &self,
        query: &Query,
        items: &mut ItemNames,
    ) -> Result<String, Box<dyn Error>> {
        let name = py_ident(&query.name);
        items.claim(&format!("_{name}"), &query.name)?;
        items.claim(&name, &query.name)?;
        let mut fields = UniqueNames::default();
        let mut params = UniqueNames::default();
        params.reserve("self");
        params.reserve("db");

        let mut code = String::new();
        writeln!(code, "\n\nclass _{name}:")?;
        writeln!(code, "    @dataclasses.dataclass")?;
        writeln!(code, "    class Row:")?;
        if query.return_columns.is_empty() {
            writeln!(code, "        pass")?;
        }
        for column in query.column_names() {
            writeln!(code, "        {}: Any", fields.claim(py_ident(column)))?;
        }
        writeln!(code)?;
        writeln!(
            code,
            "    _QUERY = sqlalchemy.text(\"{}\")",
            query.query_string
        )?;
        writeln!(code)?;
        writeln!(code, "    def __call__(")?;
        writeln!(code, "        self,")?;
        writeln!(code, "        db: sqlalchemy.engine.Engine,")?;
        let args: Vec<_> = query
            .arg_names()
            .map(|arg| (arg, params.claim(py_ident(arg))))
            .collect();
        for (_, ident) in &args {
            writeln!(code, "        {ident}: Any,")?;
        }
        writeln!(code, "    ) -> Iterable[Row]:")?;
        writeln!(code, "        query_result = db.execute(")?;
        writeln!(code, "            self._QUERY,")?;
        writeln!(code, "            {{")?;
        for (arg, ident) in &args {
            writeln!(code, "                \"{arg}\": {ident},")?;
        }
        writeln!(code, "            }},")?;
        writeln!(code, "        )")?;
        writeln!(code, "        return [self.Row(*row) for row in query_result]")?;
        writeln!(code, "\n\n{name} = _{name}()")?;
        Ok(code)
    }
}

impl CodeGen for SqlAlchemyCodeGen {
    fn render(&self, queries: &[Query]) -> Result<String, Box<dyn Error>> {
        let mut code = HEADER.to_string();
        let mut items = ItemNames::default();
        for query in queries {
            code.push_str(&self.query_to_sql_alchemy(query, &mut items)?);
        }
        Ok(code)
    }
}
