//! # rowlift CLI
//!
//! ## Usage
//!
//! ```bash
//! rowlift --config ./config/rowlift.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rowlift tables` | List configured tables and whether their input exists |
//! | `rowlift decode <table>` | Print decoded records as JSON lines |
//! | `rowlift emit <table>` | Re-render decoded records as INSERT statements |
//! | `rowlift import <table>` | Import new records into the remote datastore |
//! | `rowlift completions <shell>` | Print a shell completion script |
//!
//! Credentials are read from the environment variables named in `[remote]`
//! and are only needed by `import`.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use rowlift::import::ImportOptions;
use rowlift::progress::ProgressMode;
use rowlift::{config, import, preview, tables};

/// rowlift — replay exported SQL INSERT statements into a REST datastore.
#[derive(Parser)]
#[command(
    name = "rowlift",
    about = "Replay exported SQL INSERT statements into a REST-fronted datastore",
    version,
    long_about = "rowlift decodes one-row INSERT statements, applies per-table fixups, skips rows \
    the destination already has, and uploads the rest in chunks. A chunk that fails is retried \
    one record at a time so a single bad row never blocks the others."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rowlift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured tables.
    Tables,

    /// Decode an export file and print one JSON object per record.
    ///
    /// Fixups are applied. Nothing is sent anywhere.
    Decode {
        /// Table name as configured under `[tables.<name>]`.
        table: String,

        /// Read this file instead of the configured input.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Maximum number of records to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write decoded records back out as normalized INSERT statements.
    Emit {
        table: String,

        /// Read this file instead of the configured input.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import new records into the remote datastore.
    ///
    /// Fetches the identifiers already present, drops matching records,
    /// and uploads the rest. Safe to run repeatedly.
    Import {
        table: String,

        /// Read this file instead of the configured input.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Override the configured chunk size.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Only consider the first N decoded records.
        #[arg(long)]
        limit: Option<usize>,

        /// Report counts without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr: auto, human, json, or off.
        #[arg(long, default_value = "auto", value_parser = ProgressMode::parse)]
        progress: ProgressMode,

        /// Warn about every line that does not decode.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Print a shell completion script.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "rowlift",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Tables => {
            tables::list_tables(&cfg)?;
        }
        Commands::Decode { table, file, limit } => {
            preview::run_decode(&cfg, &table, file.as_deref(), limit)?;
        }
        Commands::Emit { table, file, out } => {
            preview::run_emit(&cfg, &table, file.as_deref(), out.as_deref())?;
        }
        Commands::Import {
            table,
            file,
            chunk_size,
            limit,
            dry_run,
            progress,
            verbose,
        } => {
            let options = ImportOptions {
                file,
                chunk_size,
                limit,
                dry_run,
                verbose,
            };
            import::run_import(&cfg, &table, &options, progress).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
