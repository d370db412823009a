//! Declared, column-scoped value corrections.
//!
//! Fixups run after a statement is decoded and before the record is queued.
//! They are configured per table as an ordered list:
//!
//! ```toml
//! [[tables.w_register.fixups]]
//! kind = "replace"
//! column = "category_id"
//! from = 0            # no `to`: replace with null
//!
//! [[tables.w_contacts.fixups]]
//! kind = "map"
//! column = "contact_status"
//! values = { A = "Active", I = "Inactive", Active = "Active", Inactive = "Inactive" }
//! default = "Active"
//! ```
//!
//! Every rule must be idempotent, because a retried batch may be fixed up
//! again. [`FixupRule::validate`] rejects a single rule that would correct
//! its own output, and [`validate_rules`] checks that the rules sharing a
//! column stay idempotent when applied in sequence.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::{Record, SqlValue};

/// One correction applied to a single column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixupRule {
    /// Replace an exact sentinel value. A missing `to` means null.
    Replace {
        column: String,
        from: SqlValue,
        #[serde(default)]
        to: Option<SqlValue>,
    },
    /// Remap text values through a lookup table.
    Map {
        column: String,
        values: BTreeMap<String, SqlValue>,
        /// Replacement for text values not found in `values`.
        #[serde(default)]
        default: Option<SqlValue>,
        #[serde(default)]
        ignore_case: bool,
    },
    /// Replace null with a value.
    Default { column: String, value: SqlValue },
    /// Upper-case text values.
    Uppercase { column: String },
}

impl FixupRule {
    pub fn column(&self) -> &str {
        match self {
            FixupRule::Replace { column, .. }
            | FixupRule::Map { column, .. }
            | FixupRule::Default { column, .. }
            | FixupRule::Uppercase { column } => column,
        }
    }

    /// The corrected value, or `None` when the rule does not match.
    pub fn correct(&self, value: &SqlValue) -> Option<SqlValue> {
        match self {
            FixupRule::Replace { from, to, .. } => {
                if value == from {
                    Some(to.clone().unwrap_or(SqlValue::Null))
                } else {
                    None
                }
            }
            FixupRule::Map {
                values,
                default,
                ignore_case,
                ..
            } => {
                let text = value.as_str()?;
                lookup(values, text, *ignore_case).or_else(|| default.clone())
            }
            FixupRule::Default { value: fill, .. } => {
                if value.is_null() {
                    Some(fill.clone())
                } else {
                    None
                }
            }
            FixupRule::Uppercase { .. } => {
                value.as_str().map(|s| SqlValue::Text(s.to_uppercase()))
            }
        }
    }

    pub fn apply(&self, record: &mut Record) {
        if let Some(slot) = record.get_mut(self.column()) {
            if let Some(corrected) = self.correct(slot) {
                *slot = corrected;
            }
        }
    }

    /// Reject rules whose output would be corrected again on a second pass.
    pub fn validate(&self) -> Result<()> {
        if self.column().trim().is_empty() {
            bail!("fixup rule has an empty column name");
        }
        match self {
            FixupRule::Replace { column, from, to } => {
                if to.as_ref().unwrap_or(&SqlValue::Null) == from {
                    bail!("fixup for column '{}' replaces '{}' with itself", column, from);
                }
            }
            FixupRule::Map {
                column,
                values,
                default,
                ..
            } => {
                for output in values.values().chain(default.iter()) {
                    if let Some(again) = self.correct(output) {
                        if &again != output {
                            bail!(
                                "fixup for column '{}' is not idempotent: '{}' becomes '{}'",
                                column,
                                output,
                                again
                            );
                        }
                    }
                }
            }
            FixupRule::Default { .. } | FixupRule::Uppercase { .. } => {}
        }
        Ok(())
    }

    // Values this rule matches or produces.
    fn mentioned_values(&self, out: &mut Vec<SqlValue>) {
        match self {
            FixupRule::Replace { from, to, .. } => {
                out.push(from.clone());
                out.push(to.clone().unwrap_or(SqlValue::Null));
            }
            FixupRule::Map { values, default, .. } => {
                out.extend(values.keys().map(|k| SqlValue::Text(k.clone())));
                out.extend(values.values().cloned());
                out.extend(default.clone());
            }
            FixupRule::Default { value, .. } => out.push(value.clone()),
            FixupRule::Uppercase { .. } => {}
        }
    }
}

/// Validate a table's rules, each on its own and per column as a sequence.
///
/// Every value a column's rules match or produce, plus null, is run through
/// that column's rules twice. The second pass must change nothing.
pub fn validate_rules(rules: &[FixupRule]) -> Result<()> {
    for rule in rules {
        rule.validate()?;
    }

    let mut columns: Vec<&str> = rules.iter().map(FixupRule::column).collect();
    columns.sort_unstable();
    columns.dedup();

    for column in columns {
        let chain: Vec<&FixupRule> = rules.iter().filter(|r| r.column() == column).collect();
        if chain.len() < 2 {
            continue;
        }
        let mut samples = vec![SqlValue::Null];
        for rule in &chain {
            rule.mentioned_values(&mut samples);
        }
        for sample in samples {
            let once = correct_in_sequence(&chain, &sample);
            let twice = correct_in_sequence(&chain, &once);
            if once != twice {
                bail!(
                    "fixups for column '{}' are not idempotent together: '{}' -> '{}' -> '{}'",
                    column,
                    sample,
                    once,
                    twice
                );
            }
        }
    }
    Ok(())
}

fn correct_in_sequence(rules: &[&FixupRule], value: &SqlValue) -> SqlValue {
    rules.iter().fold(value.clone(), |current, rule| rule.correct(&current).unwrap_or(current))
}

fn lookup(values: &BTreeMap<String, SqlValue>, key: &str, ignore_case: bool) -> Option<SqlValue> {
    if ignore_case {
        values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    } else {
        values.get(key).cloned()
    }
}

/// Apply every rule, in declaration order.
pub fn apply_all(rules: &[FixupRule], record: &mut Record) {
    for rule in rules {
        rule.apply(record);
    }
}
