//! Value coercion
//!
//! Turns free-text field input into values that are bound as statement
//! parameters. Nothing here inspects the target column type: non-empty text
//! is sent to the server in the text wire format and PostgreSQL parses it
//! into whatever type the parameter slot has (`'42'` into an `integer`,
//! `'{"a":1}'` into a `jsonb`, and so on). Type mismatches therefore surface
//! as query errors at execution time, never here.

use bytes::BytesMut;
use std::error::Error;
use tokio_postgres::types::{Format, IsNull, ToSql, Type, to_sql_checked};

/// A single bound parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundValue {
    /// SQL NULL
    Null,
    /// Literal text, parsed by the server into the parameter's type
    Text(String),
}

impl BoundValue {
    /// Coerce one field of user input: empty text becomes NULL, anything
    /// else is kept verbatim (including surrounding whitespace).
    pub fn from_input(input: &str) -> Self {
        if input.is_empty() {
            BoundValue::Null
        } else {
            BoundValue::Text(input.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BoundValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BoundValue::Null => None,
            BoundValue::Text(s) => Some(s),
        }
    }
}

impl From<&str> for BoundValue {
    fn from(input: &str) -> Self {
        BoundValue::from_input(input)
    }
}

impl From<Option<String>> for BoundValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => BoundValue::Text(s),
            None => BoundValue::Null,
        }
    }
}

/// Coerce a whole row of field input, preserving order
pub fn coerce_inputs<S: AsRef<str>>(inputs: &[S]) -> Vec<BoundValue> {
    inputs
        .iter()
        .map(|s| BoundValue::from_input(s.as_ref()))
        .collect()
}

impl ToSql for BoundValue {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            BoundValue::Null => Ok(IsNull::Yes),
            BoundValue::Text(s) => {
                out.extend_from_slice(s.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    // Any parameter type: the server does the parsing
    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}
