//! Single-statement INSERT decoder.
//!
//! Turns one line of the form
//!
//! ```text
//! INSERT INTO <table> (<col>, <col>, ...) VALUES (<lit>, <lit>, ...);
//! ```
//!
//! into a [`Record`]. This is deliberately not a SQL parser: it recognizes a
//! single parenthesized column list and a single row of literals, and splits
//! the literals with a two-state scanner that understands quoted strings with
//! doubled-quote escapes.
//!
//! # Coercion
//!
//! Each literal token is typed in this order:
//!
//! | Token | Value |
//! |-------|-------|
//! | `NULL` (bare, case-sensitive) | [`SqlValue::Null`] |
//! | `'...'` | [`SqlValue::Text`], with `''` collapsed to `'` |
//! | contains `.` and parses as a float | [`SqlValue::Float`] |
//! | parses as an integer | [`SqlValue::Integer`] |
//! | anything else | [`SqlValue::Text`] holding the raw token |
//!
//! A statement whose column count differs from its value count is rejected
//! with [`DecodeError::ArityMismatch`] rather than zip-truncated.

use regex::Regex;
use thiserror::Error;

use crate::models::{Record, SqlValue};

/// Why a line did not produce a record. Callers count these as skipped lines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("line is not an INSERT statement")]
    NotInsert,
    #[error("INSERT targets table '{found}'")]
    WrongTable { found: String },
    #[error("no column list before VALUES")]
    MissingColumns,
    #[error("no value list after VALUES")]
    MissingValues,
    #[error("{columns} columns but {values} values")]
    ArityMismatch { columns: usize, values: usize },
}

/// Decoder bound to one expected table name.
pub struct StatementDecoder {
    table: String,
    target_re: Regex,
    columns_re: Regex,
    values_re: Regex,
}

impl StatementDecoder {
    pub fn new(table: &str) -> anyhow::Result<Self> {
        Ok(Self {
            table: strip_identifier_quotes(table).to_string(),
            target_re: Regex::new(r"^\s*INSERT INTO\s+([^\s(]+)")?,
            columns_re: Regex::new(r"\(([^)]+)\)\s*VALUES")?,
            values_re: Regex::new(r"VALUES\s*\((.+)\);?\s*$")?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Decode a line, discarding the reason on failure.
    pub fn decode(&self, line: &str) -> Option<Record> {
        self.decode_statement(line).ok()
    }

    pub fn decode_statement(&self, line: &str) -> Result<Record, DecodeError> {
        let target = self
            .target_re
            .captures(line)
            .and_then(|c| c.get(1))
            .ok_or(DecodeError::NotInsert)?;
        let found = strip_identifier_quotes(target.as_str());
        if found != self.table {
            return Err(DecodeError::WrongTable {
                found: found.to_string(),
            });
        }

        let columns: Vec<&str> = self
            .columns_re
            .captures(line)
            .and_then(|c| c.get(1))
            .ok_or(DecodeError::MissingColumns)?
            .as_str()
            .split(',')
            .map(|c| strip_identifier_quotes(c.trim()))
            .collect();

        let values_str = self
            .values_re
            .captures(line)
            .and_then(|c| c.get(1))
            .ok_or(DecodeError::MissingValues)?
            .as_str();
        let tokens = split_literals(values_str);

        if tokens.len() != columns.len() {
            return Err(DecodeError::ArityMismatch {
                columns: columns.len(),
                values: tokens.len(),
            });
        }

        Ok(columns
            .into_iter()
            .zip(tokens.iter())
            .map(|(column, token)| (column.to_string(), coerce_literal(token)))
            .collect())
    }
}

/// Split a value list on top-level commas.
///
/// Quotes are kept in the tokens; a doubled quote inside a string is kept as
/// both characters and does not close the string. There is always one more
/// token than there are top-level commas.
pub fn split_literals(values: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = values.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_string => {
                in_string = true;
                current.push(c);
            }
            '\'' => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push_str("''");
                } else {
                    in_string = false;
                    current.push(c);
                }
            }
            ',' if !in_string => {
                tokens.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    tokens.push(current.trim().to_string());

    tokens
}

/// Type one literal token.
pub fn coerce_literal(token: &str) -> SqlValue {
    if token == "NULL" {
        return SqlValue::Null;
    }

    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        return SqlValue::Text(token[1..token.len() - 1].replace("''", "'"));
    }

    if token.contains('.') {
        if let Ok(f) = token.parse::<f64>() {
            if f.is_finite() {
                return SqlValue::Float(f);
            }
        }
    } else if let Ok(i) = token.parse::<i64>() {
        return SqlValue::Integer(i);
    }

    SqlValue::Text(token.to_string())
}

/// Remove backtick, double-quote or bracket quoting around an identifier.
pub fn strip_identifier_quotes(ident: &str) -> &str {
    let ident = ident.trim();
    for (open, close) in [('`', '`'), ('"', '"'), ('[', ']')] {
        if ident.len() >= 2 && ident.starts_with(open) && ident.ends_with(close) {
            return &ident[1..ident.len() - 1];
        }
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(table: &str) -> StatementDecoder {
        StatementDecoder::new(table).unwrap()
    }

    #[test]
    fn decodes_basic_statement() {
        let record = decoder("t")
            .decode("INSERT INTO t (id, status) VALUES (5, 'A');")
            .unwrap();
        assert_eq!(record.get("id"), Some(&SqlValue::Integer(5)));
        assert_eq!(record.get("status"), Some(&SqlValue::Text("A".into())));
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["id", "status"]);
    }

    #[test]
    fn doubled_quote_collapses() {
        assert_eq!(
            coerce_literal("'O''Brien'"),
            SqlValue::Text("O'Brien".into())
        );
        assert_eq!(split_literals("'O''Brien', 3"), vec!["'O''Brien'", "3"]);
    }

    #[test]
    fn comma_and_parens_inside_string_do_not_split() {
        let tokens = split_literals("'a,b', '12 (rear), Main St', 4");
        assert_eq!(tokens, vec!["'a,b'", "'12 (rear), Main St'", "4"]);
        assert_eq!(coerce_literal(&tokens[0]), SqlValue::Text("a,b".into()));
    }

    #[test]
    fn null_is_distinct_from_quoted_null() {
        assert_eq!(coerce_literal("NULL"), SqlValue::Null);
        assert_eq!(coerce_literal("'NULL'"), SqlValue::Text("NULL".into()));
        assert_eq!(coerce_literal("null"), SqlValue::Text("null".into()));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(coerce_literal("42"), SqlValue::Integer(42));
        assert_eq!(coerce_literal("-3"), SqlValue::Integer(-3));
        assert_eq!(coerce_literal("007"), SqlValue::Integer(7));
        assert_eq!(coerce_literal("3.14"), SqlValue::Float(3.14));
        assert_eq!(coerce_literal("1e5"), SqlValue::Text("1e5".into()));
        assert_eq!(
            coerce_literal("CURRENT_TIMESTAMP"),
            SqlValue::Text("CURRENT_TIMESTAMP".into())
        );
        assert_eq!(coerce_literal("1.2.3"), SqlValue::Text("1.2.3".into()));
    }

    #[test]
    fn trailing_empty_token_is_emitted() {
        assert_eq!(split_literals("1,"), vec!["1", ""]);
        assert_eq!(split_literals(""), vec![""]);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = decoder("t")
            .decode_statement("INSERT INTO t (a, b, c) VALUES (1, 2);")
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::ArityMismatch {
                columns: 3,
                values: 2
            }
        );
        assert!(decoder("t")
            .decode("INSERT INTO t (a, b, c) VALUES (1, 2);")
            .is_none());
    }

    #[test]
    fn rejects_other_tables_and_non_inserts() {
        let d = decoder("w_contacts");
        assert_eq!(
            d.decode_statement("INSERT INTO w_register (id) VALUES (1);"),
            Err(DecodeError::WrongTable {
                found: "w_register".into()
            })
        );
        assert_eq!(
            d.decode_statement("-- Contacts data"),
            Err(DecodeError::NotInsert)
        );
        assert_eq!(
            d.decode_statement("insert into w_contacts (id) values (1);"),
            Err(DecodeError::NotInsert)
        );
        assert_eq!(
            d.decode_statement("INSERT INTO w_contacts VALUES (1);"),
            Err(DecodeError::MissingColumns)
        );
    }

    #[test]
    fn quoted_identifiers_are_stripped() {
        let record = decoder("w_register")
            .decode("INSERT INTO `w_register` (`id`, `branch_id`) VALUES (1, 0);")
            .unwrap();
        assert_eq!(record.get("branch_id"), Some(&SqlValue::Integer(0)));

        let record = decoder("`w_register`")
            .decode("INSERT INTO \"w_register\" (\"id\") VALUES (9)")
            .unwrap();
        assert_eq!(record.get("id"), Some(&SqlValue::Integer(9)));
    }

    #[test]
    fn missing_semicolon_and_trailing_whitespace_are_tolerated() {
        let d = decoder("t");
        assert!(d.decode("INSERT INTO t (id) VALUES (1)").is_some());
        assert!(d.decode("INSERT INTO t (id) VALUES (1);  \n").is_some());
    }
}
