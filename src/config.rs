use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::fixup::{self, FixupRule};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Bearer token variable. Falls back to the API key when unset.
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_api_key_env() -> String {
    "ROWLIFT_API_KEY".to_string()
}
fn default_write_timeout_secs() -> u64 {
    30
}
fn default_read_timeout_secs() -> u64 {
    60
}

/// Credentials sent with every remote request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub bearer_token: String,
}

impl RemoteConfig {
    pub fn credentials(&self) -> Result<Credentials> {
        let api_key = read_env(&self.api_key_env)?;
        let bearer_token = match &self.token_env {
            Some(var) => read_env(var)?,
            None => api_key.clone(),
        };
        Ok(Credentials {
            api_key,
            bearer_token,
        })
    }
}

fn read_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{} environment variable not set", var),
    }
}

/// What to do when a page of the identifier snapshot cannot be read.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaginationFailure {
    /// Keep the identifiers fetched so far and continue with a warning.
    #[default]
    Partial,
    /// Fail the import before anything is written.
    Abort,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_reported_failures")]
    pub max_reported_failures: usize,
    #[serde(default = "default_error_detail_chars")]
    pub error_detail_chars: usize,
    #[serde(default)]
    pub on_pagination_error: PaginationFailure,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            page_size: default_page_size(),
            max_reported_failures: default_max_reported_failures(),
            error_detail_chars: default_error_detail_chars(),
            on_pagination_error: PaginationFailure::default(),
            progress_every: default_progress_every(),
        }
    }
}

fn default_chunk_size() -> usize {
    100
}
fn default_page_size() -> usize {
    1000
}
fn default_max_reported_failures() -> usize {
    20
}
fn default_error_detail_chars() -> usize {
    150
}
fn default_progress_every() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    pub input: PathBuf,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Remote path segment. Defaults to the table name.
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub fixups: Vec<FixupRule>,
}

fn default_id_column() -> String {
    "id".to_string()
}

impl TableConfig {
    pub fn resource<'a>(&'a self, table: &'a str) -> &'a str {
        self.resource.as_deref().unwrap_or(table)
    }
}

impl Config {
    pub fn table(&self, name: &str) -> Result<&TableConfig> {
        match self.tables.get(name) {
            Some(table) => Ok(table),
            None => {
                let known: Vec<&str> = self.tables.keys().map(String::as_str).collect();
                bail!(
                    "Unknown table: '{}'. Configured: {}",
                    name,
                    if known.is_empty() {
                        "(none)".to_string()
                    } else {
                        known.join(", ")
                    }
                )
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate remote
    if config.remote.url.trim().is_empty() {
        bail!("remote.url must not be empty");
    }
    if config.remote.write_timeout_secs == 0 || config.remote.read_timeout_secs == 0 {
        bail!("remote timeouts must be > 0");
    }

    // Validate upload
    if config.upload.chunk_size == 0 {
        bail!("upload.chunk_size must be > 0");
    }
    if config.upload.page_size == 0 {
        bail!("upload.page_size must be > 0");
    }
    if config.upload.progress_every == 0 {
        bail!("upload.progress_every must be > 0");
    }

    // Validate tables
    if config.tables.is_empty() {
        bail!("at least one [tables.<name>] section is required");
    }
    for (name, table) in &config.tables {
        if table.input.as_os_str().is_empty() {
            bail!("tables.{}.input must not be empty", name);
        }
        if table.id_column.trim().is_empty() {
            bail!("tables.{}.id_column must not be empty", name);
        }
        if table.chunk_size == Some(0) {
            bail!("tables.{}.chunk_size must be > 0", name);
        }
        fixup::validate_rules(&table.fixups)
            .with_context(|| format!("invalid fixup in tables.{}", name))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[remote]
url = "http://localhost:3000"

[tables.w_register]
input = "register.sql"
"#;

    #[test]
    fn defaults_apply() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();

        assert_eq!(config.remote.api_key_env, "ROWLIFT_API_KEY");
        assert_eq!(config.remote.write_timeout_secs, 30);
        assert_eq!(config.remote.read_timeout_secs, 60);
        assert_eq!(config.upload.chunk_size, 100);
        assert_eq!(config.upload.page_size, 1000);
        assert_eq!(config.upload.on_pagination_error, PaginationFailure::Partial);

        let table = config.table("w_register").unwrap();
        assert_eq!(table.id_column, "id");
        assert_eq!(table.resource("w_register"), "w_register");
        assert!(table.fixups.is_empty());
    }

    #[test]
    fn unknown_table_lists_configured_ones() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let err = config.table("w_contacts").unwrap_err().to_string();
        assert!(err.contains("w_register"), "{}", err);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let config: Config =
            toml::from_str(&format!("{}\n[upload]\nchunk_size = 0\n", MINIMAL)).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_config_without_tables() {
        let config: Config = toml::from_str("[remote]\nurl = \"http://x\"\n").unwrap();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("tables"), "{}", err);
    }

    #[test]
    fn abort_policy_parses() {
        let config: Config = toml::from_str(&format!(
            "{}\n[upload]\non_pagination_error = \"abort\"\n",
            MINIMAL
        ))
        .unwrap();
        assert_eq!(config.upload.on_pagination_error, PaginationFailure::Abort);
    }

    #[test]
    fn non_idempotent_fixup_fails_validation() {
        let config: Config = toml::from_str(&format!(
            r#"{}
[[tables.w_register.fixups]]
kind = "map"
column = "status"
values = {{ A = "Active" }}
default = "Unknown"
"#,
            MINIMAL
        ))
        .unwrap();
        let err = format!("{:#}", validate(&config).unwrap_err());
        assert!(err.contains("not idempotent"), "{}", err);
    }

    #[test]
    fn replace_with_same_value_fails_validation() {
        let config: Config = toml::from_str(&format!(
            r#"{}
[[tables.w_register.fixups]]
kind = "replace"
column = "branch_id"
from = 1
to = 1
"#,
            MINIMAL
        ))
        .unwrap();
        let err = format!("{:#}", validate(&config).unwrap_err());
        assert!(err.contains("with itself"), "{}", err);
    }

    #[test]
    fn flip_flopping_fixups_fail_validation() {
        let config: Config = toml::from_str(&format!(
            r#"{}
[[tables.w_register.fixups]]
kind = "replace"
column = "branch_id"
from = 0
to = 1

[[tables.w_register.fixups]]
kind = "replace"
column = "branch_id"
from = 2
to = 0
"#,
            MINIMAL
        ))
        .unwrap();
        let err = format!("{:#}", validate(&config).unwrap_err());
        assert!(err.contains("not idempotent together"), "{}", err);
        assert!(err.contains("tables.w_register"), "{}", err);
    }

    #[test]
    fn token_falls_back_to_api_key() {
        std::env::set_var("ROWLIFT_TEST_KEY_FALLBACK", "k123");
        let remote = RemoteConfig {
            url: "http://x".into(),
            api_key_env: "ROWLIFT_TEST_KEY_FALLBACK".into(),
            token_env: None,
            write_timeout_secs: 30,
            read_timeout_secs: 60,
        };
        let creds = remote.credentials().unwrap();
        assert_eq!(creds.api_key, "k123");
        assert_eq!(creds.bearer_token, "k123");

        let missing = RemoteConfig {
            api_key_env: "ROWLIFT_TEST_KEY_DEFINITELY_UNSET".into(),
            ..remote
        };
        assert!(missing.credentials().is_err());
    }
}
