//! Machine file loader.
//!
//! A machine file is the [`MachineConfig`] TOML plus an optional
//! `[settings]` table that seeds the persisted settings store, so a
//! simulated machine can start with the operator values a real one would
//! have in EEPROM:
//!
//! ```toml
//! [tools]
//! count = 2
//!
//! [settings]
//! ditto_enabled = true
//! heater_pause_policy = 0
//! toolhead_offset_x = 2900
//! ```
//!
//! Setting names are those of [`SettingKey::name`]. Values are integers;
//! booleans are stored as 0/1.

use std::path::{Path, PathBuf};

use mb_common::config::{ConfigError, MachineConfig};
use thiserror::Error;
use toml::{Table, Value};
use tracing::debug;

use crate::hw::{MemorySettings, SettingKey, SettingsStore};

const SETTINGS_TABLE: &str = "settings";

// ─── Error Type ─────────────────────────────────────────────────────

/// Machine file loading error.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a valid machine file.
    #[error("{}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Parse or validation failure of in-memory TOML.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Validated machine configuration and its seeded settings store.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub machine: MachineConfig,
    pub settings: MemorySettings,
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate a machine file.
pub fn load_config(path: &Path) -> Result<LoadedConfig, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content).map_err(|e| match e {
        LoadError::Config(source) => LoadError::Invalid {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Load a machine file from TOML text (for testing).
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, LoadError> {
    let mut table: Table =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let settings = match table.remove(SETTINGS_TABLE) {
        Some(Value::Table(entries)) => parse_settings(&entries)?,
        Some(other) => {
            return Err(ConfigError::ParseError(format!(
                "[{SETTINGS_TABLE}] must be a table, got {}",
                other.type_str()
            ))
            .into());
        }
        None => MemorySettings::new(),
    };

    let machine = Value::Table(table)
        .try_into::<MachineConfig>()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;
    machine.validate()?;

    debug!(
        tools = machine.tools.count,
        planner_depth = machine.motion.planner_max_depth,
        "machine config loaded"
    );
    Ok(LoadedConfig { machine, settings })
}

fn parse_settings(entries: &Table) -> Result<MemorySettings, ConfigError> {
    let mut settings = MemorySettings::new();
    for (name, value) in entries {
        let key = SettingKey::from_name(name)
            .ok_or_else(|| ConfigError::ValidationError(format!("unknown setting '{name}'")))?;
        let value = match value {
            Value::Integer(v) => *v,
            Value::Boolean(b) => i64::from(*b),
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "setting '{name}' must be an integer or boolean, got {}",
                    other.type_str()
                )));
            }
        };
        settings.write(key, value);
    }
    Ok(settings)
}
