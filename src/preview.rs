//! Offline views of an export file.
//!
//! `rowlift decode` shows exactly what an import would send, one JSON object
//! per record. `rowlift emit` writes the same records back out as normalized
//! INSERT statements, for running by hand against the destination. Neither
//! touches the network or needs credentials.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::encode::render_insert;
use crate::import::{decode_file, input_path};

pub fn run_decode(
    config: &Config,
    table: &str,
    file: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    let table_config = config.table(table)?;
    let path = input_path(table_config, file);
    let decoded = decode_file(&path, table, table_config, false)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in decoded.records.iter().take(limit.unwrap_or(usize::MAX)) {
        writeln!(out, "{}", serde_json::to_string(record)?)?;
    }

    eprintln!(
        "Decoded {} records from {} lines ({} skipped)",
        decoded.records.len(),
        decoded.lines_read,
        decoded.skipped
    );
    Ok(())
}

pub fn run_emit(
    config: &Config,
    table: &str,
    file: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let table_config = config.table(table)?;
    let path = input_path(table_config, file);
    let decoded = decode_file(&path, table, table_config, false)?;
    let target = table_config.resource(table);

    let mut sql = String::new();
    for record in &decoded.records {
        sql.push_str(&render_insert(target, record));
        sql.push('\n');
    }

    match output {
        Some(out_path) => {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out_path, &sql)
                .with_context(|| format!("Failed to write {}", out_path.display()))?;
            eprintln!(
                "Wrote {} statements to {}",
                decoded.records.len(),
                out_path.display()
            );
        }
        None => {
            print!("{}", sql);
        }
    }

    Ok(())
}
