//! Configuration module.
//!
//! Handles the optional `quarry.toml` file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CsvSettings, IngestSettings, QuerySettings, Settings, SettingsError,
    StageSettings, WarehouseSettings,
};
