pub mod json;
pub mod rust;
pub mod sqlalchemy;

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::Display;

use crate::query::Query;

pub trait CodeGen {
    /// Renders one module exposing an accessor per query, in the given order.
    fn render(&self, queries: &[Query]) -> Result<String, Box<dyn Error>>;
}

pub fn to_pascal(mixed_case_name: &str) -> String {
    let mut words = vec![];
    let mut curr = String::new();
    for character in mixed_case_name.chars() {
        let is_snake = character == '_';
        if character.is_uppercase() || is_snake {
            words.push(curr.clone());
            curr.clear();
        }
        if is_snake {
            continue;
        }
        if curr.is_empty() {
            curr.push(character.to_ascii_uppercase());
        } else {
            curr.push(character.to_ascii_lowercase());
        }
    }
    words.push(curr);
    words.join("")
}

/// Replaces characters that cannot appear in an identifier with `_`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|char| match char.is_ascii_alphanumeric() {
            true => char,
            false => '_',
        })
        .collect();
    if ident.is_empty() || ident.starts_with(|char: char| char.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// Hands out identifiers, suffixing any that were already taken.
#[derive(Debug, Default)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    pub fn claim(&mut self, name: String) -> String {
        if self.taken.insert(name.clone()) {
            return name;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{name}_{suffix}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// A generated top-level item claimed by two queries, or twice by one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameClash {
    pub item: String,
    pub first: String,
    pub second: String,
}

impl Display for NameClash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let NameClash {
            item,
            first,
            second,
        } = self;
        match first == second {
            true => write!(f, "query {first} generates `{item}` twice, rename {first}.sql"),
            false => write!(
                f,
                "queries {first} and {second} both generate `{item}`, rename {second}.sql"
            ),
        }
    }
}

impl Error for NameClash {}

/// Top-level item names of one generated module, with the query owning each.
#[derive(Debug, Default)]
pub struct ItemNames {
    owners: HashMap<String, String>,
}

impl ItemNames {
    pub fn claim(&mut self, item: &str, query: &str) -> Result<(), NameClash> {
        if let Some(first) = self.owners.get(item) {
            return Err(NameClash {
                item: item.to_string(),
                first: first.clone(),
                second: query.to_string(),
            });
        }
        self.owners.insert(item.to_string(), query.to_string());
        Ok(())
    }
}
