//! Render records back into INSERT statements.
//!
//! Used by `rowlift emit`, which writes the decoded and fixed-up rows as
//! normalized statements for manual execution against the destination.
//! Output decodes back to the same record with [`crate::decode`] as long as
//! no text value contains a line break. The decoder reads one statement per
//! line, and rendered text is written verbatim apart from quote doubling.

use crate::models::{Record, SqlValue};

pub fn render_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Float(f) => render_float(*f),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

// Floats must keep a decimal point or they would decode as integers.
fn render_float(f: f64) -> String {
    let s = format!("{:?}", f);
    if s.contains('.') {
        s
    } else if let Some(pos) = s.find('e') {
        format!("{}.0{}", &s[..pos], &s[pos..])
    } else {
        format!("{}.0", s)
    }
}

/// `INSERT INTO <table> (<cols>) VALUES (<literals>);`
pub fn render_insert(table: &str, record: &Record) -> String {
    let columns: Vec<&str> = record.columns().collect();
    let values: Vec<String> = record.iter().map(|(_, v)| render_literal(v)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        table,
        columns.join(", "),
        values.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::StatementDecoder;

    #[test]
    fn literals() {
        assert_eq!(render_literal(&SqlValue::Null), "NULL");
        assert_eq!(render_literal(&SqlValue::Integer(-4)), "-4");
        assert_eq!(render_literal(&SqlValue::Float(3.0)), "3.0");
        assert_eq!(render_literal(&SqlValue::Float(1e-7)), "1.0e-7");
        assert_eq!(
            render_literal(&SqlValue::Text("O'Brien".into())),
            "'O''Brien'"
        );
    }

    #[test]
    fn rendered_statement_decodes_to_same_record() {
        let record: Record = vec![
            ("id".to_string(), SqlValue::Integer(12)),
            ("name".to_string(), SqlValue::Text("Dela Cruz, Juan".into())),
            ("nick".to_string(), SqlValue::Text("NULL".into())),
            ("note".to_string(), SqlValue::Null),
            ("cash".to_string(), SqlValue::Float(1500.0)),
            ("rate".to_string(), SqlValue::Float(0.125)),
            ("address".to_string(), SqlValue::Text("Unit 4 (rear)".into())),
        ]
        .into_iter()
        .collect();

        let line = render_insert("w_contacts", &record);
        let decoded = StatementDecoder::new("w_contacts")
            .unwrap()
            .decode(&line)
            .unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn line_break_in_text_is_written_verbatim() {
        let record: Record = vec![
            ("id".to_string(), SqlValue::Integer(1)),
            ("note".to_string(), SqlValue::Text("first\nsecond".into())),
        ]
        .into_iter()
        .collect();

        let rendered = render_insert("t", &record);
        assert_eq!(rendered.lines().count(), 2);
        // neither half is a complete statement on its own
        let decoder = StatementDecoder::new("t").unwrap();
        assert!(rendered.lines().all(|line| decoder.decode(line).is_none()));
    }
}
