//! Identifier quoting and literal rendering (component A).
//!
//! These are pure functions with no context dependency; every other
//! component calls through here rather than interpolating strings by hand.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A SQLite value, bound or inlined as a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

/// Quotes a SQL identifier: `name` -> `"name"`, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders a qualifier + bare identifier as `q."name"`, omitting the
/// qualifier when `None`.
pub fn quote_qualified(qualifier: Option<&str>, name: &str) -> String {
    match qualifier {
        Some(q) => format!("{}.{}", quote_ident(q), quote_ident(name)),
        None => quote_ident(name),
    }
}

/// Renders a database value as an inline SQL literal. Used only in
/// contexts where binding is forbidden (raw-arguments mode).
pub fn render_literal(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => {
            if !r.is_finite() {
                return Err(Error::invalid_input(format!(
                    "cannot render non-finite real value {r} as a SQL literal"
                )));
            }
            if r.fract() == 0.0 {
                format!("{r:.1}")
            } else {
                r.to_string()
            }
        }
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quotes_embedded_double_quotes() {
        assert_eq!(quote_ident(r#"weird"name"#), r#""weird""name""#);
    }

    #[test]
    fn omits_qualifier_when_none() {
        assert_eq!(quote_qualified(None, "id"), r#""id""#);
        assert_eq!(quote_qualified(Some("t"), "id"), r#""t"."id""#);
    }

    #[test]
    fn renders_text_literal_with_doubled_quotes() {
        assert_eq!(
            render_literal(&Value::Text("O'Brien".to_string())).unwrap(),
            "'O''Brien'"
        );
    }

    #[test]
    fn renders_blob_as_hex_literal() {
        assert_eq!(
            render_literal(&Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF])).unwrap(),
            "X'DEADBEEF'"
        );
    }

    #[test]
    fn rejects_non_finite_real() {
        assert!(render_literal(&Value::Real(f64::NAN)).is_err());
    }
}
