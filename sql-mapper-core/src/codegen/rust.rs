use std::error::Error;
use std::fmt::Write;

use crate::query::Query;

use super::{CodeGen, ItemNames, UniqueNames, sanitize_identifier, to_pascal};

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NON_RAW_KEYWORDS: &[&str] = &["crate", "self", "super", "Self", "_"];

/// Local names used inside every generated accessor.
const RESERVED_LOCALS: &[&str] = &["ctx", "params", "rows", "output", "row"];

fn rust_ident(name: &str) -> String {
    let ident = sanitize_identifier(name);
    if NON_RAW_KEYWORDS.contains(&ident.as_str()) {
        return format!("{ident}_");
    }
    if RUST_KEYWORDS.contains(&ident.as_str()) {
        return format!("r#{ident}");
    }
    ident
}

/// Generates async Rust accessors on top of [`crate::runtime`].
///
/// Each query becomes a `<NAME>` constant, a `<Name>Row` struct with one
/// [`crate::runtime::Value`] field per return column and an async function
/// taking an [`crate::runtime::ExecutionContext`] followed by the arguments
/// in sorted order.
pub struct RustCodeGen {
    runtime_path: String,
}

impl Default for RustCodeGen {
    fn default() -> Self {
        Self::new("sql_mapper_core::runtime")
    }
}

impl RustCodeGen {
    pub fn new(runtime_path: impl Into<String>) -> Self {
        Self {
            runtime_path: runtime_path.into(),
        }
    }

    fn header(&self) -> String {
        format!(
            "// @generated by sql-mapper, do not edit.\n\n\
             #[allow(unused_imports)]\n\
             use {}::{{ExecutionContext, Params, Row, RowShapeError, Value}};\n",
            self.runtime_path
        )
    }

    fn query_to_rust(
        &self,
        query: &Query,
        items: &mut ItemNames,
    ) -> Result<String, Box<dyn Error>> {
        let fn_name = rust_ident(&query.name);
        let const_name = sanitize_identifier(&query.name).to_uppercase();
        let row_name = format!("{}Row", to_pascal(&sanitize_identifier(&query.name)));
        for item in [&const_name, &row_name, &fn_name] {
            items.claim(item, &query.name)?;
        }

        let mut fields = UniqueNames::default();
        let field_names: Vec<_> = query
            .column_names()
            .map(|name| fields.claim(rust_ident(name)))
            .collect();

        let mut locals = UniqueNames::default();
        for local in RESERVED_LOCALS {
            locals.reserve(local);
        }
        let arg_names: Vec<_> = query
            .arg_names()
            .map(|name| (name, locals.claim(rust_ident(name))))
            .collect();

        let mut code = String::new();
        writeln!(code)?;
        writeln!(
            code,
            "pub const {const_name}: &str = \"{}\";",
            query.query_string
        )?;
        writeln!(code)?;
        writeln!(code, "#[derive(Debug, Clone, PartialEq)]")?;
        if field_names.is_empty() {
            writeln!(code, "pub struct {row_name};")?;
            writeln!(code)?;
            writeln!(code, "impl {row_name} {{")?;
            writeln!(
                code,
                "    pub fn from_row(_row: Row) -> Result<Self, RowShapeError> {{"
            )?;
            writeln!(code, "        Ok(Self)")?;
        } else {
            writeln!(code, "pub struct {row_name} {{")?;
            for field in &field_names {
                writeln!(code, "    pub {field}: Value,")?;
            }
            writeln!(code, "}}")?;
            writeln!(code)?;
            writeln!(code, "impl {row_name} {{")?;
            writeln!(
                code,
                "    pub fn from_row(row: Row) -> Result<Self, RowShapeError> {{"
            )?;
            let fields = field_names.join(", ");
            writeln!(
                code,
                "        let [{fields}] = row.into_array::<{}>()?;",
                field_names.len()
            )?;
            writeln!(code, "        Ok(Self {{ {fields} }})")?;
        }
        writeln!(code, "    }}")?;
        writeln!(code, "}}")?;
        writeln!(code)?;

        writeln!(code, "pub async fn {fn_name}<C: ExecutionContext>(")?;
        writeln!(code, "    ctx: &C,")?;
        for (_, ident) in &arg_names {
            writeln!(code, "    {ident}: impl Into<Value>,")?;
        }
        writeln!(code, ") -> Result<Vec<{row_name}>, C::Error> {{")?;
        write!(code, "    let params = Params::new()")?;
        for (name, ident) in &arg_names {
            write!(code, "\n        .bind({name:?}, {ident})")?;
        }
        writeln!(code, ";")?;
        writeln!(
            code,
            "    let rows = ctx.execute({const_name}, &params).await?;"
        )?;
        writeln!(code, "    let mut output = Vec::with_capacity(rows.len());")?;
        writeln!(code, "    for row in rows {{")?;
        writeln!(code, "        output.push({row_name}::from_row(row)?);")?;
        writeln!(code, "    }}")?;
        writeln!(code, "    Ok(output)")?;
        writeln!(code, "}}")?;
        Ok(code)
    }
}

impl CodeGen for RustCodeGen {
    fn render(&self, queries: &[Query]) -> Result<String, Box<dyn Error>> {
        let mut code = self.header();
        let mut items = ItemNames::default();
        for query in queries {
            code.push_str(&self.query_to_rust(query, &mut items)?);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use crate::query::{QueryArg, ReturnColumn};

    use super::*;

    fn query(name: &str, columns: &[&str], args: &[&str]) -> Query {
        Query {
            name: name.into(),
            query_string: "SELECT 1".into(),
            return_columns: columns.iter().copied().map(ReturnColumn::new).collect(),
            args: args.iter().copied().map(QueryArg::new).collect(),
        }
    }

    #[test]
    fn renders_accessor() {
        let mut simple = query("simple_query", &["name"], &["user_id"]);
        simple.query_string = "SELECT name FROM user WHERE user_id = :user_id".into();
        let code = RustCodeGen::default().render(&[simple]).unwrap();

        assert!(code.contains("use sql_mapper_core::runtime::{"));
        assert!(code.contains(
            "pub const SIMPLE_QUERY: &str = \"SELECT name FROM user WHERE user_id = :user_id\";"
        ));
        assert!(code.contains("pub struct SimpleQueryRow {\n    pub name: Value,\n}"));
        assert!(code.contains("let [name] = row.into_array::<1>()?;"));
        assert!(code.contains("pub async fn simple_query<C: ExecutionContext>(\n    ctx: &C,\n    user_id: impl Into<Value>,\n)"));
        assert!(code.contains(".bind(\"user_id\", user_id);"));
    }

    #[test]
    fn args_follow_metadata_order() {
        let code = RustCodeGen::default()
            .render(&[query("q", &["a"], &["alpha", "beta", "gamma"])])
            .unwrap();
        let alpha = code.find("    alpha: impl").unwrap();
        let beta = code.find("    beta: impl").unwrap();
        let gamma = code.find("    gamma: impl").unwrap();
        assert!(alpha < beta && beta < gamma);
    }

    #[test]
    fn zero_columns_render_unit_row() {
        let code = RustCodeGen::default()
            .render(&[query("touch", &[], &[])])
            .unwrap();
        assert!(code.contains("pub struct TouchRow;"));
        assert!(code.contains("let params = Params::new();"));
    }

    #[test]
    fn identifiers_are_made_valid() {
        let code = RustCodeGen::default()
            .render(&[query("type", &["Full Name", "id", "id", "self"], &["ctx", "match"])])
            .unwrap();
        assert!(code.contains("pub async fn r#type<C: ExecutionContext>("));
        assert!(code.contains("pub const TYPE: &str"));
        assert!(code.contains("let [Full_Name, id, id_2, self_] = row.into_array::<4>()?;"));
        assert!(code.contains(".bind(\"ctx\", ctx_2)"));
        assert!(code.contains(".bind(\"match\", r#match)"));
    }

    #[test]
    fn clashing_item_names_are_rejected() {
        let error = RustCodeGen::default()
            .render(&[query("getUser", &["a"], &[]), query("get_user", &["a"], &[])])
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "queries getUser and get_user both generate `GetUserRow`, rename get_user.sql"
        );

        let error = RustCodeGen::default()
            .render(&[query("getUser", &["a"], &[]), query("getuser", &["a"], &[])])
            .unwrap_err();
        assert!(error.to_string().contains("`GETUSER`"));

        let error = RustCodeGen::default()
            .render(&[query("LIST", &["a"], &[])])
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "query LIST generates `LIST` twice, rename LIST.sql"
        );
    }

    #[test]
    fn custom_runtime_path() {
        let code = RustCodeGen::new("crate::runtime").render(&[]).unwrap();
        assert!(code.contains("use crate::runtime::{"));
    }
}
