use std::error::Error;
use std::fmt::Display;

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Location, Token, Tokenizer, Whitespace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Tokenize { msg: String },
    NoStatements,
    MultipleStatements { count: usize },
    MissingDml,
    NoReturnColumns,
    UnnamedReturnColumn { item: String },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Tokenize { msg } => write!(f, "Could not tokenize statement: {msg}"),
            ParseError::NoStatements => write!(f, "No SQL statements found"),
            ParseError::MultipleStatements { count } => {
                write!(f, "Expected one SQL statement, found {count}")
            }
            ParseError::MissingDml => {
                write!(f, "Statement has no SELECT, INSERT, UPDATE or DELETE keyword")
            }
            ParseError::NoReturnColumns => {
                write!(f, "No return columns found after the DML keyword")
            }
            ParseError::UnnamedReturnColumn { item } => {
                write!(f, "Return column {item} has no name, add an alias")
            }
        }
    }
}

impl Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmlKeyword {
    Select,
    Insert,
    Update,
    Delete,
}

impl DmlKeyword {
    fn from_keyword(keyword: Keyword) -> Option<Self> {
        match keyword {
            Keyword::SELECT => Some(DmlKeyword::Select),
            Keyword::INSERT => Some(DmlKeyword::Insert),
            Keyword::UPDATE => Some(DmlKeyword::Update),
            Keyword::DELETE => Some(DmlKeyword::Delete),
            _ => None,
        }
    }
}

impl Display for DmlKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmlKeyword::Select => write!(f, "SELECT"),
            DmlKeyword::Insert => write!(f, "INSERT"),
            DmlKeyword::Update => write!(f, "UPDATE"),
            DmlKeyword::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// `index` points into [`Statement::tokens`].
    Dml { keyword: DmlKeyword, index: usize },
    /// Anything without a top-level DML keyword, e.g. DDL.
    Other { keyword: Option<String> },
}

/// A token together with its byte range in the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

impl SpannedToken {
    pub fn is_whitespace(&self) -> bool {
        matches!(self.token, Token::Whitespace(_))
    }
}

/// One SQL statement with its trimmed text and token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    tokens: Vec<SpannedToken>,
}

impl Statement {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[SpannedToken] {
        &self.tokens
    }

    pub fn token_text(&self, token: &SpannedToken) -> &str {
        &self.text[token.start..token.end]
    }

    /// Source text between the first byte of token `first` and the last byte of token `last`.
    pub fn slice(&self, first: usize, last: usize) -> &str {
        &self.text[self.tokens[first].start..self.tokens[last].end]
    }

    /// Tokens outside of any parentheses, paired with their index.
    pub fn top_level(&self) -> impl Iterator<Item = (usize, &SpannedToken)> {
        let mut depth = 0usize;
        self.tokens.iter().enumerate().filter(move |(_, token)| {
            match token.token {
                Token::LParen => {
                    depth += 1;
                    return false;
                }
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    return false;
                }
                _ => {}
            }
            depth == 0
        })
    }

    pub fn kind(&self) -> StatementKind {
        let mut first_keyword = None;
        for (index, token) in self.top_level() {
            let Token::Word(word) = &token.token else {
                continue;
            };
            if word.quote_style.is_some() || word.keyword == Keyword::NoKeyword {
                continue;
            }
            if let Some(keyword) = DmlKeyword::from_keyword(word.keyword) {
                return StatementKind::Dml { keyword, index };
            }
            if first_keyword.is_none() {
                first_keyword = Some(word.value.to_uppercase());
            }
        }
        StatementKind::Other {
            keyword: first_keyword,
        }
    }

    /// Statement text with `--` comments blanked out, ready to be collapsed onto one line.
    pub fn without_line_comments(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut head = 0;
        for token in &self.tokens {
            if let Token::Whitespace(Whitespace::SingleLineComment { .. }) = token.token {
                out.push_str(&self.text[head..token.start]);
                out.push(' ');
                head = token.end;
            }
        }
        out.push_str(&self.text[head..]);
        out
    }
}

/// Maps the line/column locations reported by the tokenizer back to byte offsets.
struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .char_indices()
                .filter(|(_, char)| *char == '\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    fn offset(&self, location: Location) -> usize {
        let line = (location.line as usize).max(1);
        let Some(&line_start) = self.line_starts.get(line - 1) else {
            return self.source.len();
        };
        let column = (location.column as usize).max(1);
        self.source[line_start..]
            .char_indices()
            .nth(column - 1)
            .map(|(idx, _)| line_start + idx)
            .unwrap_or(self.source.len())
    }
}

fn tokenize(sql: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|error| ParseError::Tokenize {
            msg: error.to_string(),
        })?;
    let index = LineIndex::new(sql);
    Ok(tokens
        .into_iter()
        .filter(|token| token.token != Token::EOF)
        .map(|token| SpannedToken {
            start: index.offset(token.span.start),
            end: index.offset(token.span.end),
            token: token.token,
        })
        .collect())
}

fn to_statement(sql: &str, tokens: &[SpannedToken]) -> Option<Statement> {
    let first = tokens.iter().position(|token| !token.is_whitespace())?;
    let last = tokens.iter().rposition(|token| !token.is_whitespace())?;
    let offset = tokens[first].start;
    let text = sql[offset..tokens[last].end].to_string();
    let tokens = tokens[first..=last]
        .iter()
        .map(|token| SpannedToken {
            token: token.token.clone(),
            start: token.start - offset,
            end: token.end - offset,
        })
        .collect();
    Some(Statement { text, tokens })
}

/// Splits `sql` at top-level statement separators, dropping empty statements.
pub fn split_statements(sql: &str) -> Result<Vec<Statement>, ParseError> {
    let tokens = tokenize(sql)?;
    let mut statements = vec![];
    let mut depth = 0usize;
    let mut head = 0;
    for (idx, token) in tokens.iter().enumerate() {
        match token.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if depth == 0 => {
                statements.extend(to_statement(sql, &tokens[head..idx]));
                head = idx + 1;
            }
            _ => {}
        }
    }
    statements.extend(to_statement(sql, &tokens[head..]));
    Ok(statements)
}

/// Parses text that must hold exactly one statement.
pub fn parse_statement(sql: &str) -> Result<Statement, ParseError> {
    let mut statements = split_statements(sql)?;
    match statements.len() {
        0 => Err(ParseError::NoStatements),
        1 => Ok(statements.remove(0)),
        count => Err(ParseError::MultipleStatements { count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_statement_with_separator() {
        let statement = parse_statement("SELECT name FROM users;\n").unwrap();
        assert_eq!(statement.text(), "SELECT name FROM users");
    }

    #[test]
    fn statement_count_guard() {
        assert_eq!(parse_statement(""), Err(ParseError::NoStatements));
        assert_eq!(
            parse_statement("  ;\n-- nothing here\n"),
            Err(ParseError::NoStatements)
        );
        assert_eq!(
            parse_statement("SELECT a FROM t; SELECT b FROM t;"),
            Err(ParseError::MultipleStatements { count: 2 })
        );
    }

    #[test]
    fn separator_inside_literal_does_not_split() {
        let statements = split_statements("SELECT 'a;b' AS x FROM t").unwrap();
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn token_spans_follow_multiline_text() {
        let statement = parse_statement("\n  SELECT name\n  FROM \"user\"\n").unwrap();
        let words: Vec<_> = statement
            .tokens()
            .iter()
            .filter(|token| !token.is_whitespace())
            .map(|token| statement.token_text(token))
            .collect();
        assert_eq!(words, ["SELECT", "name", "FROM", "\"user\""]);
    }

    #[test]
    fn classifies_dml() {
        let statement = parse_statement("INSERT INTO foo (x) VALUES (1) RETURNING x").unwrap();
        assert_eq!(
            statement.kind(),
            StatementKind::Dml {
                keyword: DmlKeyword::Insert,
                index: 0
            }
        );
    }

    #[test]
    fn cte_body_is_not_the_dml_keyword() {
        let sql = "WITH sq AS (SELECT * FROM x) SELECT name, age FROM users";
        let statement = parse_statement(sql).unwrap();
        let StatementKind::Dml { keyword, index } = statement.kind() else {
            panic!("expected a DML statement");
        };
        assert_eq!(keyword, DmlKeyword::Select);
        assert_eq!(statement.slice(index, index + 2), "SELECT name");
    }

    #[test]
    fn classifies_ddl_as_other() {
        let statement = parse_statement("CREATE TABLE users (id int)").unwrap();
        assert_eq!(
            statement.kind(),
            StatementKind::Other {
                keyword: Some("CREATE".into())
            }
        );
    }

    #[test]
    fn strips_line_comments() {
        let statement = parse_statement("SELECT a -- first\nFROM t").unwrap();
        let text = statement.without_line_comments();
        assert!(!text.contains("first"));
        assert!(text.starts_with("SELECT a "));
        assert!(text.ends_with("FROM t"));
    }
}
