use std::error::Error;
use std::fmt::Display;

use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use sqlx::{Column, Postgres, Row as _, TypeInfo};

use crate::extract::placeholders;
use crate::parser::{ParseError, parse_statement};
use crate::runtime::{ExecutionContext, Params, Row, RowShapeError, Value};

#[derive(Debug)]
pub enum ExecuteError {
    Database(sqlx::Error),
    Parse(ParseError),
    MissingParameter { name: String },
    UnsupportedType { column: String, type_name: String },
    RowShape(RowShapeError),
}

impl Display for ExecuteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecuteError::Database(error) => write!(f, "{error}"),
            ExecuteError::Parse(error) => write!(f, "{error}"),
            ExecuteError::MissingParameter { name } => {
                write!(f, "No value bound for parameter :{name}")
            }
            ExecuteError::UnsupportedType { column, type_name } => write!(
                f,
                "Column {column} has unsupported type {type_name}, cast it to text in the query"
            ),
            ExecuteError::RowShape(error) => write!(f, "{error}"),
        }
    }
}

impl Error for ExecuteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExecuteError::Database(error) => Some(error),
            ExecuteError::Parse(error) => Some(error),
            ExecuteError::RowShape(error) => Some(error),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ExecuteError {
    fn from(value: sqlx::Error) -> Self {
        ExecuteError::Database(value)
    }
}

impl From<ParseError> for ExecuteError {
    fn from(value: ParseError) -> Self {
        ExecuteError::Parse(value)
    }
}

impl From<RowShapeError> for ExecuteError {
    fn from(value: RowShapeError) -> Self {
        ExecuteError::RowShape(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametrizedQuery {
    pub raw_query: String,
    /// Name of `$1`, `$2`, ... in order.
    pub params: Vec<String>,
}

/// Rewrites `:name` placeholders into PostgreSQL's positional `$n` form.
pub fn parse_into_postgres(query: &str) -> Result<ParametrizedQuery, ParseError> {
    let statement = parse_statement(query)?;
    let text = statement.text();
    let mut params = Vec::new();
    let mut postgres_query = String::new();
    let mut head = 0;
    for placeholder in placeholders(&statement) {
        postgres_query += &text[head..placeholder.range.start];
        let param_index = 1 + params
            .iter()
            .position(|param| param == &placeholder.name)
            .unwrap_or_else(|| {
                params.push(placeholder.name.clone());
                params.len() - 1
            });
        postgres_query += &format!("${param_index}");
        head = placeholder.range.end;
    }
    postgres_query += &text[head..];
    Ok(ParametrizedQuery {
        raw_query: postgres_query,
        params,
    })
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(bool) => query.bind(*bool),
        Value::Int(int) => query.bind(*int),
        Value::Float(float) => query.bind(*float),
        Value::Text(text) => query.bind(text.clone()),
    }
}

fn decode_value(row: &PgRow, index: usize) -> Result<Value, ExecuteError> {
    let column = &row.columns()[index];
    let type_name = column.type_info().name();
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.into(),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.into(),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.into(),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.into(),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(index)?.into(),
        "DATE" => row
            .try_get::<Option<Date>, _>(index)?
            .map(|date| date.to_string())
            .into(),
        "TIME" => row
            .try_get::<Option<Time>, _>(index)?
            .map(|time| time.to_string())
            .into(),
        "TIMESTAMP" => row
            .try_get::<Option<PrimitiveDateTime>, _>(index)?
            .map(|timestamp| timestamp.to_string())
            .into(),
        "TIMESTAMPTZ" => row
            .try_get::<Option<OffsetDateTime>, _>(index)?
            .map(|timestamp| timestamp.to_string())
            .into(),
        _ => {
            return Err(ExecuteError::UnsupportedType {
                column: column.name().to_string(),
                type_name: type_name.to_string(),
            });
        }
    };
    Ok(value)
}

fn decode_row(row: &PgRow) -> Result<Row, ExecuteError> {
    (0..row.len())
        .map(|index| decode_value(row, index))
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}

/// Execution context backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgContext {
    pool: PgPool,
}

impl PgContext {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, ExecuteError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ExecutionContext for PgContext {
    type Error = ExecuteError;

    async fn execute(&self, query: &str, params: &Params) -> Result<Vec<Row>, ExecuteError> {
        let ParametrizedQuery {
            raw_query,
            params: names,
        } = parse_into_postgres(query)?;
        tracing::debug!("Executing {raw_query}");
        let mut statement = sqlx::query(&raw_query);
        for name in &names {
            let value = params
                .get(name)
                .ok_or_else(|| ExecuteError::MissingParameter { name: name.clone() })?;
            statement = bind(statement, value);
        }
        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }
}
