//! SQL synthesis
//!
//! Statement text plus bound values, identifier quoting, and the read/write
//! classification of free-form statements.

pub mod builder;
pub mod ident;

pub use builder::{delete, insert, select, update};
pub use ident::quote_ident;

use crate::db::coerce::BoundValue;

/// Statement text with its positional parameters (`$1`, `$2`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BoundValue>,
}

impl Statement {
    /// A statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<BoundValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Whether a statement returns rows to display or changes data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    /// Classify free-form text: a read iff its first word is `SELECT`
    /// (case-insensitive, leading whitespace ignored). Everything else,
    /// including `WITH ... SELECT`, runs as a write.
    pub fn classify(sql: &str) -> Self {
        let first_word = sql
            .trim_start()
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
            .unwrap_or("");
        if first_word.eq_ignore_ascii_case("select") {
            StatementKind::Read
        } else {
            StatementKind::Write
        }
    }
}
