//! TOML-based configuration.
//!
//! Supports a config file (quarry.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [warehouse]
//! dialect = "duckdb"
//! path = "${HOME}/data/warehouse.duckdb"
//!
//! [stage]
//! name = "QUARRY_STAGE"
//! dir = "/tmp/quarry-stage"
//!
//! [ingest]
//! sample_rows = 1000
//! default_database = "ANALYTICS"
//! default_schema = "RAW"
//!
//! [csv]
//! delimiter = ";"
//! encoding = "shift-jis"
//! has_header = true
//!
//! [query]
//! default_limit = 100
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::{FormatOptions, TextEncoding};
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub warehouse: WarehouseSettings,
    pub stage: StageSettings,
    pub ingest: IngestSettings,
    pub csv: CsvSettings,
    pub query: QuerySettings,
}

/// Which warehouse to talk to.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// SQL dialect of the warehouse.
    pub dialect: Dialect,

    /// Database file for the embedded backend (supports `${VAR}`).
    pub path: Option<String>,
}

impl WarehouseSettings {
    /// Database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Temporary stage area.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StageSettings {
    /// Named stage the artifacts are put into.
    pub name: String,

    /// Local directory backing the stage for the embedded backend (supports `${VAR}`).
    pub dir: Option<String>,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            name: "QUARRY_STAGE".to_string(),
            dir: None,
        }
    }
}

impl StageSettings {
    /// Stage directory with environment variables expanded.
    pub fn resolved_dir(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.dir
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

/// Ingestion defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Rows scanned per column when inferring types of text formats.
    pub sample_rows: usize,

    /// Database used when none is given on the command line.
    pub default_database: Option<String>,

    /// Schema used when none is given on the command line.
    pub default_schema: Option<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            sample_rows: 1000,
            default_database: None,
            default_schema: None,
        }
    }
}

/// Defaults for delimited text uploads.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsvSettings {
    /// Field delimiter; a single character, `\t` is accepted for tab.
    pub delimiter: Option<String>,

    /// Text encoding name (`utf-8`, `shift-jis`, `cp932`).
    pub encoding: String,

    /// Whether the first record is a header row.
    pub has_header: bool,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: "utf-8".to_string(),
            has_header: true,
        }
    }
}

impl CsvSettings {
    /// The configured delimiter as a byte, if any.
    pub fn delimiter_byte(&self) -> Result<Option<u8>, SettingsError> {
        match self.delimiter.as_deref() {
            None => Ok(None),
            Some("\\t") | Some("\t") => Ok(Some(b'\t')),
            Some(d) if d.len() == 1 && d.is_ascii() => Ok(Some(d.as_bytes()[0])),
            Some(d) => Err(SettingsError::InvalidConfig(format!(
                "csv.delimiter must be a single ASCII character, got '{d}'"
            ))),
        }
    }
}

/// Query builder defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// LIMIT applied when browsing a table without a query spec.
    pub default_limit: Option<u64>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_limit: Some(100),
        }
    }
}

impl Settings {
    /// Options for delimited uploads, from `[csv]` and `[ingest]`.
    pub fn format_options(&self) -> crate::error::Result<FormatOptions> {
        let encoding: TextEncoding = self.csv.encoding.parse()?;
        let mut options = FormatOptions::default()
            .with_encoding(encoding)
            .with_sample_rows(self.ingest.sample_rows);
        if let Some(delimiter) = self.csv.delimiter_byte()? {
            options = options.with_delimiter(delimiter);
        }
        if !self.csv.has_header {
            options = options.without_header();
        }
        Ok(options)
    }

    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUARRY_CONFIG`
    /// 2. `./quarry.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("QUARRY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }
}

impl std::str::FromStr for Settings {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let settings: Settings = toml::from_str(s)?;
        if settings.ingest.sample_rows == 0 {
            return Err(SettingsError::InvalidConfig(
                "ingest.sample_rows must be at least 1".into(),
            ));
        }
        settings.csv.delimiter_byte()?;
        Ok(settings)
    }
}

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid env var pattern")
});

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. A lone `$` is kept.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut missing = None;
    let expanded = ENV_VAR.replace_all(s, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(SettingsError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("QUARRY_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${QUARRY_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${QUARRY_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("QUARRY_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("QUARRY_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$QUARRY_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$QUARRY_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost: $5").unwrap(), "cost: $5");
        env::remove_var("QUARRY_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(name)) if name == "NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_parse_toml() {
        let settings: Settings = r#"
            [warehouse]
            dialect = "duckdb"
            path = "./dev.duckdb"

            [stage]
            dir = "/tmp/stage"

            [ingest]
            sample_rows = 50
            default_database = "ANALYTICS"

            [csv]
            delimiter = "\\t"
            encoding = "cp932"
            has_header = false
        "#
        .parse()
        .unwrap();

        assert_eq!(settings.warehouse.dialect, Dialect::DuckDb);
        assert_eq!(settings.stage.name, "QUARRY_STAGE");
        assert_eq!(settings.stage.resolved_dir().unwrap(), Some(PathBuf::from("/tmp/stage")));
        assert_eq!(settings.ingest.sample_rows, 50);
        assert_eq!(settings.ingest.default_database.as_deref(), Some("ANALYTICS"));
        assert_eq!(settings.csv.delimiter_byte().unwrap(), Some(b'\t'));
        assert!(!settings.csv.has_header);
        assert_eq!(settings.query.default_limit, Some(100));

        let options = settings.format_options().unwrap();
        assert_eq!(options.delimiter, Some(b'\t'));
        assert_eq!(options.encoding, TextEncoding::Cp932);
        assert_eq!(options.sample_rows, 50);
        assert!(!options.has_header);
    }

    #[test]
    fn test_unknown_encoding_is_rejected() {
        let settings: Settings = "[csv]\nencoding = \"latin-9\"".parse().unwrap();
        assert!(settings.format_options().is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.warehouse.dialect, Dialect::Snowflake);
        assert_eq!(settings.ingest.sample_rows, 1000);
        assert_eq!(settings.csv.encoding, "utf-8");
        assert!(settings.csv.has_header);
        assert_eq!(settings.csv.delimiter_byte().unwrap(), None);
    }

    #[test]
    fn test_invalid_settings() {
        assert!("[ingest]\nsample_rows = 0".parse::<Settings>().is_err());
        assert!("[csv]\ndelimiter = \";;\"".parse::<Settings>().is_err());
        assert!(matches!(
            Settings::from_file("/definitely/not/here.toml"),
            Err(SettingsError::FileNotFound(_))
        ));
    }
}
