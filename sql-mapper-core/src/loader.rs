use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::extract_query;
use crate::parser::{ParseError, StatementKind, parse_statement};
use crate::query::Query;

pub const SQL_FILE_EXTENSION: &str = "sql";

static QUERY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid query name pattern"));

#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Parse {
        file: PathBuf,
        source: ParseError,
    },
    UnsupportedStatement {
        file: PathBuf,
        keyword: Option<String>,
    },
    InvalidQueryName {
        file: PathBuf,
    },
    DuplicateQuery {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { path, source } => {
                write!(f, "encountered '{source}' attempting to read {}", path.display())
            }
            LoadError::Parse { file, source } => write!(f, "{}: {source}", file.display()),
            LoadError::UnsupportedStatement {
                file,
                keyword: Some(keyword),
            } => write!(
                f,
                "{}: {keyword} statements are not supported, expected SELECT, INSERT, UPDATE or DELETE",
                file.display()
            ),
            LoadError::UnsupportedStatement {
                file,
                keyword: None,
            } => write!(
                f,
                "{}: statement is not supported, expected SELECT, INSERT, UPDATE or DELETE",
                file.display()
            ),
            LoadError::InvalidQueryName { file } => write!(
                f,
                "{}: file name is not a valid query name, use letters, digits and underscores",
                file.display()
            ),
            LoadError::DuplicateQuery {
                name,
                first,
                second,
            } => write!(
                f,
                "{}: query {name} is already defined by {}",
                second.display(),
                first.display()
            ),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> LoadError + '_ {
    move |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn query_name(path: &Path) -> Result<String, LoadError> {
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    if !QUERY_NAME.is_match(&name) {
        return Err(LoadError::InvalidQueryName {
            file: path.to_path_buf(),
        });
    }
    Ok(name)
}

/// Parses one `.sql` file into query metadata named after the file stem.
pub fn load_file(path: &Path) -> Result<Query, LoadError> {
    let name = query_name(path)?;

    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(io_error(path))?;
    let mut reader = BufReader::new(file);
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(io_error(path))?;

    let parse_error = |source| LoadError::Parse {
        file: path.to_path_buf(),
        source,
    };
    let statement = parse_statement(&content).map_err(parse_error)?;
    match statement.kind() {
        StatementKind::Dml { .. } => extract_query(&name, &statement).map_err(parse_error),
        StatementKind::Other { keyword } => Err(LoadError::UnsupportedStatement {
            file: path.to_path_buf(),
            keyword,
        }),
    }
}

fn is_sql_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension == SQL_FILE_EXTENSION)
}

/// `.sql` files directly inside `directory`, sorted by file name.
pub fn sql_files(directory: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = vec![];
    for entry in fs::read_dir(directory).map_err(io_error(directory))? {
        let entry = entry.map_err(io_error(directory))?;
        let path = entry.path();
        let is_file = fs::metadata(&path).map_err(io_error(&path))?.is_file();
        if !is_file || !is_sql_file(&path) {
            tracing::debug!("Skipping {path:?} as it is not a .{SQL_FILE_EXTENSION} file.");
            continue;
        }
        files.push(path);
    }
    files.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(files)
}

/// Loads every query in `directory`, sorted by name. The first failing file aborts the load.
pub fn load_directory(directory: &Path) -> Result<Vec<Query>, LoadError> {
    load_directories(&[directory])
}

/// Loads several directories into one list sorted by query name.
///
/// Query names come from file stems, so within one directory this is also
/// file name order.
pub fn load_directories<P: AsRef<Path>>(directories: &[P]) -> Result<Vec<Query>, LoadError> {
    let mut queries = BTreeMap::<String, (PathBuf, Query)>::new();
    for directory in directories {
        for file in sql_files(directory.as_ref())? {
            let query = load_file(&file)?;
            if let Some((first, _)) = queries.get(&query.name) {
                return Err(LoadError::DuplicateQuery {
                    name: query.name,
                    first: first.clone(),
                    second: file,
                });
            }
            tracing::info!(
                "Loaded {} from {file:?} ({} columns, {} args)",
                query.name,
                query.return_columns.len(),
                query.args.len()
            );
            queries.insert(query.name.clone(), (file, query));
        }
    }
    Ok(queries.into_values().map(|(_, query)| query).collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn aggregates_sql_files_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "q2.sql", "SELECT b FROM t WHERE id = :id;");
        write(&dir, "q1.sql", "SELECT a FROM t");
        write(&dir, "readme.txt", "not sql at all");
        fs::create_dir(dir.path().join("nested.sql")).unwrap();

        let queries = load_directory(dir.path()).unwrap();
        let names: Vec<_> = queries.iter().map(|query| query.name.as_str()).collect();
        assert_eq!(names, ["q1", "q2"]);
        assert_eq!(queries[1].arg_names().collect::<Vec<_>>(), ["id"]);
    }

    #[test]
    fn single_and_multi_directory_loads_agree() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a_b.sql", "SELECT x FROM t");
        write(&dir, "ab.sql", "SELECT y FROM t");
        write(&dir, "a.sql", "SELECT z FROM t");

        let single = load_directory(dir.path()).unwrap();
        let names: Vec<_> = single.iter().map(|query| query.name.as_str()).collect();
        assert_eq!(names, ["a", "a_b", "ab"]);
        assert_eq!(single, load_directories(&[dir.path()]).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_files() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let real = write(&target, "shared.txt", "SELECT a FROM t");
        std::os::unix::fs::symlink(&real, dir.path().join("linked.sql")).unwrap();

        let queries = load_directory(dir.path()).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].name, "linked");
    }

    #[test]
    fn end_to_end_metadata() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "simple_query.sql",
            "SELECT name FROM user WHERE user_id = :user_id",
        );
        let query = load_file(&path).unwrap();
        assert_eq!(query.name, "simple_query");
        assert_eq!(query.column_names().collect::<Vec<_>>(), ["name"]);
        assert_eq!(query.arg_names().collect::<Vec<_>>(), ["user_id"]);
        assert_eq!(
            query.query_string,
            "SELECT name FROM user WHERE user_id = :user_id"
        );
    }

    #[test]
    fn one_bad_file_fails_the_whole_directory() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.sql", "SELECT a FROM t");
        let bad = write(&dir, "two.sql", "SELECT a FROM t; SELECT b FROM t;");

        let error = load_directory(dir.path()).unwrap_err();
        let LoadError::Parse { file, source } = &error else {
            panic!("unexpected error {error}");
        };
        assert_eq!(file, &bad);
        assert_eq!(source, &ParseError::MultipleStatements { count: 2 });
        assert!(error.to_string().contains("two.sql"));
    }

    #[test]
    fn empty_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "empty.sql", "\n");
        assert!(matches!(
            load_file(&path),
            Err(LoadError::Parse {
                source: ParseError::NoStatements,
                ..
            })
        ));
    }

    #[test]
    fn ddl_is_rejected_distinctly() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "schema.sql", "CREATE TABLE t (id int)");
        let error = load_file(&path).unwrap_err();
        assert!(matches!(
            &error,
            LoadError::UnsupportedStatement { keyword: Some(keyword), .. } if keyword == "CREATE"
        ));
        assert!(error.to_string().contains("schema.sql"));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "get-user.sql", "SELECT a FROM t");
        assert!(matches!(
            load_file(&path),
            Err(LoadError::InvalidQueryName { .. })
        ));
    }

    #[test]
    fn duplicate_names_across_directories() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(&first, "q.sql", "SELECT a FROM t");
        write(&second, "q.sql", "SELECT b FROM t");
        write(&second, "other.sql", "SELECT c FROM t");

        let error = load_directories(&[first.path(), second.path()]).unwrap_err();
        assert!(matches!(error, LoadError::DuplicateQuery { ref name, .. } if name == "q"));

        let queries = load_directories(&[second.path()]).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].name, "other");
    }

    #[test]
    fn missing_directory_reports_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let error = load_directory(&missing).unwrap_err();
        assert!(error.to_string().contains("missing"));
    }
}
