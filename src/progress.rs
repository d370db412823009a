//! Import progress reporting.
//!
//! Reports observable progress during `rowlift import` so users can see the
//! identifier snapshot being fetched, batches going out, and which records
//! were rejected. Progress is emitted on **stderr** so stdout keeps only the
//! final summary and stays parseable for scripts.

use std::io::Write;

/// A single progress event for an import.
#[derive(Clone, Debug)]
pub enum ImportProgressEvent {
    /// Identifier snapshot: `fetched` identifiers read so far.
    FetchingIds { table: String, fetched: u64 },
    /// A batch has resolved (including any per-record fallback).
    Batch {
        table: String,
        batch: u64,
        total_batches: u64,
        fell_back: bool,
        inserted: u64,
    },
    /// A record failed on its own after its batch failed.
    RecordFailed {
        table: String,
        id: String,
        detail: String,
    },
}

/// Reports import progress. Implementations write to stderr (human or JSON).
pub trait ImportProgressReporter: Send + Sync {
    fn report(&self, event: ImportProgressEvent);
}

/// Human-friendly progress on stderr: "import w_register  batch 3 / 12  ok  (300 inserted)".
pub struct StderrProgress;

impl ImportProgressReporter for StderrProgress {
    fn report(&self, event: ImportProgressEvent) {
        let line = match &event {
            ImportProgressEvent::FetchingIds { table, fetched } => {
                format!(
                    "import {}  fetching existing ids  {}\n",
                    table,
                    format_number(*fetched)
                )
            }
            ImportProgressEvent::Batch {
                table,
                batch,
                total_batches,
                fell_back,
                inserted,
            } => {
                format!(
                    "import {}  batch {} / {}  {}  ({} inserted)\n",
                    table,
                    format_number(*batch),
                    format_number(*total_batches),
                    if *fell_back { "retried per record" } else { "ok" },
                    format_number(*inserted)
                )
            }
            ImportProgressEvent::RecordFailed { table, id, detail } => {
                format!("import {}  record {} failed: {}\n", table, id, detail)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ImportProgressReporter for JsonProgress {
    fn report(&self, event: ImportProgressEvent) {
        let obj = match &event {
            ImportProgressEvent::FetchingIds { table, fetched } => serde_json::json!({
                "event": "progress",
                "table": table,
                "phase": "fetching_ids",
                "fetched": fetched
            }),
            ImportProgressEvent::Batch {
                table,
                batch,
                total_batches,
                fell_back,
                inserted,
            } => serde_json::json!({
                "event": "progress",
                "table": table,
                "phase": "uploading",
                "batch": batch,
                "total_batches": total_batches,
                "fell_back": fell_back,
                "inserted": inserted
            }),
            ImportProgressEvent::RecordFailed { table, id, detail } => serde_json::json!({
                "event": "record_failed",
                "table": table,
                "id": id,
                "detail": detail
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ImportProgressReporter for NoProgress {
    fn report(&self, _event: ImportProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse the `--progress` flag. `auto` defers to [`Self::default_for_tty`].
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "off" => Ok(ProgressMode::Off),
            other => Err(format!(
                "invalid progress mode '{}': expected auto, human, json, or off",
                other
            )),
        }
    }

    pub fn reporter(&self) -> Box<dyn ImportProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn parse_modes() {
        assert_eq!(ProgressMode::parse("json"), Ok(ProgressMode::Json));
        assert_eq!(ProgressMode::parse("off"), Ok(ProgressMode::Off));
        assert!(ProgressMode::parse("loud").is_err());
    }
}
