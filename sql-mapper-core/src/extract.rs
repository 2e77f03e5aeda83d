//! Return-column and placeholder extraction over a statement's token stream.
//!
//! Top-level tokens are grouped into [`Element`]s, roughly the way a human
//! reads a statement: keywords, identifiers (optionally qualified and
//! aliased), identifier lists, table references and opaque clause bodies.
//! Only enough structure is recovered to find the first projection or
//! `RETURNING` list after the DML keyword.

use std::collections::BTreeSet;
use std::ops::Range;

use sqlparser::tokenizer::{Token, Word};

use crate::parser::{DmlKeyword, ParseError, SpannedToken, Statement, StatementKind};
use crate::query::{Query, QueryArg, ReturnColumn};

/// A top-level item that may name an output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// Source text of the item, alias included.
    pub text: String,
    /// Name of the underlying column or function, if the item has one.
    pub name: Option<String>,
    pub alias: Option<String>,
}

impl Identifier {
    /// Name the database reports for this item.
    pub fn output_name(&self) -> Option<&str> {
        self.alias.as_deref().or(self.name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Dml(DmlKeyword),
    Keyword(String),
    /// Body of a clause that never holds output columns, e.g. `WHERE ...`.
    Clause(String),
    Identifier(Identifier),
    IdentifierList(Vec<Identifier>),
    TableRef(Vec<Identifier>),
    /// Any other item without an output name: wildcards, literals, bare expressions.
    Expression(Identifier),
}

/// An [`Element`] and the index of the token it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouped {
    pub start: usize,
    pub element: Element,
}

/// A `:name` placeholder and its byte range in the statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordClass {
    Dml(DmlKeyword),
    Keyword(&'static str),
    /// Starts a clause whose body is skipped up to the next boundary keyword.
    Clause(&'static str),
    Literal,
    Operator,
    Case,
    End,
    Name,
}

const KEYWORDS: &[&str] = &[
    "FROM", "INTO", "AS", "RETURNING", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS",
    "NATURAL", "LATERAL", "UNION", "INTERSECT", "EXCEPT", "ALL", "DISTINCT", "WITH", "RECURSIVE",
    "ONLY", "BY", "FETCH", "FOR", "WINDOW", "TABLE",
];

const CLAUSES: &[&str] = &[
    "WHERE", "SET", "VALUES", "ON", "USING", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET",
];

const OPERATORS: &[&str] = &[
    "AND", "OR", "NOT", "IN", "IS", "LIKE", "ILIKE", "BETWEEN", "EXISTS", "COLLATE", "WHEN", "THEN",
    "ELSE",
];

const LITERALS: &[&str] = &["NULL", "TRUE", "FALSE", "DEFAULT"];

/// Keywords that end an opaque clause body.
const BOUNDARIES: &[&str] = &[
    "FROM", "WHERE", "SET", "VALUES", "RETURNING", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET",
    "UNION", "INTERSECT", "EXCEPT", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL",
    "ON", "USING", "WINDOW", "FETCH", "FOR",
];

/// Keywords after which the next item names a table rather than a column.
const TABLE_POSITION: &[&str] = &["FROM", "INTO", "JOIN", "TABLE", "ONLY"];

fn find_static(set: &[&'static str], value: &str) -> Option<&'static str> {
    set.iter().copied().find(|item| item.eq_ignore_ascii_case(value))
}

fn classify_word(word: &Word) -> WordClass {
    if word.quote_style.is_some() {
        return WordClass::Name;
    }
    let value = word.value.as_str();
    if let Some(dml) = ["SELECT", "INSERT", "UPDATE", "DELETE"]
        .iter()
        .position(|dml| dml.eq_ignore_ascii_case(value))
    {
        return WordClass::Dml(
            [
                DmlKeyword::Select,
                DmlKeyword::Insert,
                DmlKeyword::Update,
                DmlKeyword::Delete,
            ][dml],
        );
    }
    if value.eq_ignore_ascii_case("CASE") {
        return WordClass::Case;
    }
    if value.eq_ignore_ascii_case("END") {
        return WordClass::End;
    }
    if let Some(keyword) = find_static(KEYWORDS, value) {
        return WordClass::Keyword(keyword);
    }
    if let Some(clause) = find_static(CLAUSES, value) {
        return WordClass::Clause(clause);
    }
    if find_static(OPERATORS, value).is_some() {
        return WordClass::Operator;
    }
    if find_static(LITERALS, value).is_some() {
        return WordClass::Literal;
    }
    WordClass::Name
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AtomKind {
    Word(WordClass),
    Paren,
    Comma,
    Period,
    Star,
    Literal,
    Placeholder,
    Operator,
}

/// A top-level token, or a whole parenthesized group, spanning `first..=last`.
#[derive(Debug, Clone, Copy)]
struct Atom {
    kind: AtomKind,
    first: usize,
    last: usize,
}

/// Colon at `idx` separating the bounds of an array slice, as in `tags[1:n]`.
fn is_slice_separator(tokens: &[SpannedToken], idx: usize) -> bool {
    let Some(previous) = idx.checked_sub(1).map(|previous| &tokens[previous]) else {
        return false;
    };
    let follows_operand = matches!(
        previous.token,
        Token::Word(_) | Token::Number(..) | Token::RParen | Token::RBracket
    );
    if !follows_operand || previous.end != tokens[idx].start {
        return false;
    }
    let depth = tokens[..idx]
        .iter()
        .fold(0i32, |depth, token| match token.token {
            Token::LBracket => depth + 1,
            Token::RBracket => depth - 1,
            _ => depth,
        });
    depth > 0
}

/// Placeholder starting at token `idx`, returning its name and the index of its last token.
fn placeholder_at(statement: &Statement, idx: usize) -> Option<(String, usize)> {
    let tokens = statement.tokens();
    let current = &tokens[idx];
    if is_slice_separator(tokens, idx) {
        return None;
    }
    match &current.token {
        Token::Placeholder(value) => {
            let name = value.strip_prefix(':')?;
            Some((name.to_string(), idx))
        }
        Token::Colon => {
            let next = tokens.get(idx + 1)?;
            let Token::Word(word) = &next.token else {
                return None;
            };
            if word.quote_style.is_some() || next.start != current.end {
                return None;
            }
            Some((word.value.clone(), idx + 1))
        }
        _ => None,
    }
}

/// Every `:name` placeholder in the statement, nested parentheses included, in textual order.
pub fn placeholders(statement: &Statement) -> Vec<Placeholder> {
    let tokens = statement.tokens();
    let mut found = vec![];
    let mut idx = 0;
    while idx < tokens.len() {
        match placeholder_at(statement, idx) {
            Some((name, last)) => {
                found.push(Placeholder {
                    name,
                    range: tokens[idx].start..tokens[last].end,
                });
                idx = last + 1;
            }
            None => idx += 1,
        }
    }
    found
}

fn atoms(statement: &Statement) -> Vec<Atom> {
    let tokens = statement.tokens();
    let mut atoms = vec![];
    let mut idx = 0;
    while idx < tokens.len() {
        let first = idx;
        let kind = match &tokens[idx].token {
            Token::Whitespace(_) => {
                idx += 1;
                continue;
            }
            Token::LParen => {
                let mut depth = 0usize;
                while idx < tokens.len() {
                    match tokens[idx].token {
                        Token::LParen => depth += 1,
                        Token::RParen => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    idx += 1;
                }
                idx = idx.min(tokens.len() - 1);
                AtomKind::Paren
            }
            Token::Word(word) => AtomKind::Word(classify_word(word)),
            Token::Comma => AtomKind::Comma,
            Token::Period => AtomKind::Period,
            Token::Mul => AtomKind::Star,
            Token::Number(..)
            | Token::SingleQuotedString(_)
            | Token::DoubleQuotedString(_)
            | Token::NationalStringLiteral(_)
            | Token::EscapedStringLiteral(_)
            | Token::UnicodeStringLiteral(_)
            | Token::HexStringLiteral(_)
            | Token::DollarQuotedString(_) => AtomKind::Literal,
            _ => match placeholder_at(statement, idx) {
                Some((_, last)) => {
                    idx = last;
                    AtomKind::Placeholder
                }
                None => AtomKind::Operator,
            },
        };
        atoms.push(Atom {
            kind,
            first,
            last: idx,
        });
        idx += 1;
    }
    atoms
}

fn word_value(statement: &Statement, atom: &Atom) -> Option<String> {
    match &statement.tokens()[atom.first].token {
        Token::Word(word) => Some(word.value.clone()),
        _ => None,
    }
}

fn is_name(atom: Option<&Atom>) -> bool {
    matches!(atom, Some(Atom {
        kind: AtomKind::Word(WordClass::Name),
        ..
    }))
}

fn is_boundary(atom: &Atom) -> bool {
    match atom.kind {
        AtomKind::Word(WordClass::Dml(_)) => true,
        AtomKind::Word(WordClass::Keyword(keyword) | WordClass::Clause(keyword)) => {
            BOUNDARIES.contains(&keyword)
        }
        _ => false,
    }
}

struct Grouper<'s> {
    statement: &'s Statement,
    atoms: Vec<Atom>,
    pos: usize,
}

impl<'s> Grouper<'s> {
    fn peek(&self) -> Option<&Atom> {
        self.atoms.get(self.pos)
    }

    fn peek_kind(&self) -> Option<AtomKind> {
        self.peek().map(|atom| atom.kind)
    }

    /// Consumes `CASE ... END`, honouring nested `CASE`s.
    fn skip_case(&mut self) {
        let mut depth = 0usize;
        while let Some(atom) = self.atoms.get(self.pos) {
            self.pos += 1;
            match atom.kind {
                AtomKind::Word(WordClass::Case) => depth += 1,
                AtomKind::Word(WordClass::End) => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Consumes a single operand, returning the name it contributes if it is a
    /// plain (possibly qualified) name or function call.
    fn operand(&mut self) -> Option<Option<String>> {
        let atom = *self.peek()?;
        match atom.kind {
            AtomKind::Word(WordClass::Name) => {
                self.pos += 1;
                let mut name = word_value(self.statement, &atom);
                while self.peek_kind() == Some(AtomKind::Period) {
                    self.pos += 1;
                    match self.peek().copied() {
                        Some(next) if next.kind == AtomKind::Word(WordClass::Name) => {
                            self.pos += 1;
                            name = word_value(self.statement, &next);
                        }
                        Some(next) if next.kind == AtomKind::Star => {
                            self.pos += 1;
                            return Some(None);
                        }
                        _ => return Some(None),
                    }
                }
                if self.peek_kind() == Some(AtomKind::Paren) {
                    self.pos += 1;
                }
                Some(name)
            }
            AtomKind::Word(WordClass::Case) => {
                self.skip_case();
                Some(None)
            }
            AtomKind::Paren
            | AtomKind::Literal
            | AtomKind::Placeholder
            | AtomKind::Star
            | AtomKind::Word(WordClass::Literal) => {
                self.pos += 1;
                Some(None)
            }
            AtomKind::Operator | AtomKind::Word(WordClass::Operator) => {
                // Prefix operators such as `-1` or `NOT x`.
                self.pos += 1;
                self.operand().map(|_| None).or(Some(None))
            }
            _ => None,
        }
    }

    /// Consumes one item: an operand, any binary operators chained onto it, and an alias.
    fn item(&mut self) -> Option<Identifier> {
        let first = self.peek()?.first;
        let mut name = self.operand()?;
        let mut last = self.atoms[self.pos - 1].last;
        loop {
            let operator = match self.peek_kind() {
                Some(AtomKind::Operator | AtomKind::Star | AtomKind::Word(WordClass::Operator)) => {
                    true
                }
                _ => false,
            };
            if !operator {
                break;
            }
            let cast = matches!(
                self.statement.tokens()[self.atoms[self.pos].first].token,
                Token::DoubleColon
            );
            self.pos += 1;
            if self.operand().is_none() {
                break;
            }
            // `col::type` keeps the column name, other expressions lose it.
            if !cast {
                name = None;
            }
            last = self.atoms[self.pos - 1].last;
        }
        let mut alias = None;
        if self.peek_kind() == Some(AtomKind::Word(WordClass::Keyword("AS")))
            && is_name(self.atoms.get(self.pos + 1))
        {
            let atom = self.atoms[self.pos + 1];
            alias = word_value(self.statement, &atom);
            last = atom.last;
            self.pos += 2;
        } else if is_name(self.peek()) {
            let atom = self.atoms[self.pos];
            alias = word_value(self.statement, &atom);
            last = atom.last;
            self.pos += 1;
        }
        Some(Identifier {
            text: self.statement.slice(first, last).to_string(),
            name,
            alias,
        })
    }

    fn items(&mut self) -> Option<Vec<Identifier>> {
        let mut items = vec![self.item()?];
        while self.peek_kind() == Some(AtomKind::Comma) {
            self.pos += 1;
            match self.item() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Some(items)
    }

    fn group(mut self) -> Vec<Grouped> {
        let mut grouped = vec![];
        let mut table_position = false;
        while let Some(atom) = self.peek().copied() {
            let start = atom.first;
            let element = match atom.kind {
                AtomKind::Word(WordClass::Dml(keyword)) => {
                    self.pos += 1;
                    table_position = keyword == DmlKeyword::Update;
                    Element::Dml(keyword)
                }
                AtomKind::Word(WordClass::Keyword(keyword)) => {
                    self.pos += 1;
                    table_position = TABLE_POSITION.contains(&keyword);
                    if keyword == "DISTINCT"
                        && self.peek_kind() == Some(AtomKind::Word(WordClass::Clause("ON")))
                    {
                        // `DISTINCT ON (...)` is a modifier, not a join condition.
                        self.pos += 2;
                    }
                    Element::Keyword(keyword.to_string())
                }
                AtomKind::Word(WordClass::Clause(clause)) => {
                    self.pos += 1;
                    table_position = false;
                    while let Some(atom) = self.peek() {
                        if is_boundary(atom) {
                            break;
                        }
                        self.pos += 1;
                    }
                    Element::Clause(clause.to_string())
                }
                _ => match self.items() {
                    Some(items) if table_position => {
                        table_position = false;
                        Element::TableRef(items)
                    }
                    Some(mut items) if items.len() == 1 => {
                        let item = items.remove(0);
                        match item.output_name() {
                            Some(_) => Element::Identifier(item),
                            None => Element::Expression(item),
                        }
                    }
                    Some(items) => Element::IdentifierList(items),
                    None => {
                        self.pos += 1;
                        continue;
                    }
                },
            };
            grouped.push(Grouped { start, element });
        }
        grouped
    }
}

/// Groups the top-level tokens of a statement into elements.
pub fn group(statement: &Statement) -> Vec<Grouped> {
    Grouper {
        statement,
        atoms: atoms(statement),
        pos: 0,
    }
    .group()
}

/// Finds the first identifier or identifier list at or after token `dml_index`.
pub fn return_columns(
    statement: &Statement,
    dml_index: usize,
) -> Result<Vec<ReturnColumn>, ParseError> {
    for grouped in group(statement) {
        if grouped.start < dml_index {
            continue;
        }
        let identifiers = match grouped.element {
            Element::Identifier(identifier) => vec![identifier],
            Element::IdentifierList(identifiers) => identifiers,
            _ => continue,
        };
        return identifiers
            .into_iter()
            .map(|identifier| match identifier.output_name() {
                Some(name) => Ok(ReturnColumn::new(name)),
                None => Err(ParseError::UnnamedReturnColumn {
                    item: identifier.text,
                }),
            })
            .collect();
    }
    Err(ParseError::NoReturnColumns)
}

/// Distinct placeholder names, sorted.
pub fn query_args(statement: &Statement) -> Vec<QueryArg> {
    placeholders(statement)
        .into_iter()
        .map(|placeholder| placeholder.name)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(QueryArg::new)
        .collect()
}

/// Builds the metadata for a DML statement.
pub fn extract_query(name: &str, statement: &Statement) -> Result<Query, ParseError> {
    let StatementKind::Dml { index, .. } = statement.kind() else {
        return Err(ParseError::MissingDml);
    };
    let return_columns = return_columns(statement, index)?;
    let args = query_args(statement);
    Ok(Query::from_parts(name, statement, return_columns, args))
}
