//! Configuration loading and root folder resolution

use crate::schema::FieldSchema;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FRCS_ROOT_FOLDER";

/// Environment variable naming the TOML config file
pub const CONFIG_FILE_ENV: &str = "FRCS_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "scouting_data.db";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    /// FieldSchema TOML; relative paths resolve against the root folder
    pub schema_file: Option<PathBuf>,
    /// Skip a scanned payload identical to the one scanned just before it
    pub duplicate_scan_suppression: bool,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            schema_file: None,
            duplicate_scan_suppression: true,
        }
    }
}

impl TomlConfig {
    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Locate and load the config file, falling back to defaults
    ///
    /// A missing file is not an error. A file that exists but does not parse
    /// is.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        match locate_config_file(cli_path) {
            Some(path) if !path.exists() => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Some(path) => {
                let config = Self::load(&path)?;
                info!("Loaded config file: {}", path.display());
                Ok(config)
            }
            None => {
                warn!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Config file lookup order:
/// 1. Command-line argument
/// 2. `FRCS_CONFIG` environment variable
/// 3. `~/.config/frcs/config.toml`
/// 4. `/etc/frcs/config.toml`
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("frcs").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/frcs/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        return PathBuf::from(path);
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("frcs"))
        .unwrap_or_else(|| PathBuf::from("./frcs_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Load the field schema for this process
///
/// Uses `schema_file` when configured, otherwise the built-in schema.
pub fn load_schema(config: &TomlConfig, root_folder: &Path) -> Result<FieldSchema> {
    match &config.schema_file {
        Some(path) => {
            let path = if path.is_relative() {
                root_folder.join(path)
            } else {
                path.clone()
            };
            let schema = FieldSchema::load(&path).map_err(|e| {
                Error::Config(format!("Failed to load schema {}: {}", path.display(), e))
            })?;
            info!(
                "Loaded field schema v{} ({} fields) from {}",
                schema.version,
                schema.fields.len(),
                path.display()
            );
            Ok(schema)
        }
        None => {
            let schema = FieldSchema::builtin();
            info!(
                "Using built-in field schema v{} ({} fields)",
                schema.version,
                schema.fields.len()
            );
            Ok(schema)
        }
    }
}
