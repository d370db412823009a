use anyhow::Result;

use crate::config::Config;

pub fn list_tables(config: &Config) -> Result<()> {
    println!(
        "{:<20} {:<20} {:<10} {:<8} INPUT",
        "TABLE", "RESOURCE", "ID", "FIXUPS"
    );

    for (name, table) in &config.tables {
        let input_status = if table.input.exists() {
            table.input.display().to_string()
        } else {
            format!("{} (missing)", table.input.display())
        };
        println!(
            "{:<20} {:<20} {:<10} {:<8} {}",
            name,
            table.resource(name),
            table.id_column,
            table.fixups.len(),
            input_status
        );
    }

    Ok(())
}
