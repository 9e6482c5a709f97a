//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the OLPS root folder
pub const ROOT_FOLDER_ENV: &str = "OLP_ROOT_FOLDER";

/// Database file name within the root folder
pub const DATABASE_FILE: &str = "olp.db";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. OLP_ROOT_FOLDER environment variable
/// 3. TOML config file `root_folder` key
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Ensure the root folder exists and return the database path within it
pub fn ensure_root_folder(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    Ok(root.join(DATABASE_FILE))
}

/// Find the platform configuration file
fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // ~/.config/olp/config.toml first, then /etc/olp/config.toml
        if let Some(path) = dirs::config_dir().map(|d| d.join("olp").join("config.toml")) {
            if path.exists() {
                return Ok(path);
            }
        }
        let system_config = PathBuf::from("/etc/olp/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let path = dirs::config_dir()
        .map(|d| d.join("olp").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("olp"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/olp"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("olp"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/olp"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("olp"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\olp"))
    } else {
        PathBuf::from("./olp_data")
    }
}

/// Resolve the port a service should bind: CLI override, then the
/// `<module>_port` settings entry, then the service's compiled default
pub async fn resolve_port(
    db: &sqlx::SqlitePool,
    module: &str,
    cli_port: Option<u16>,
    default_port: u16,
) -> Result<u16> {
    if let Some(port) = cli_port {
        return Ok(port);
    }

    let key = format!("{}_port", module);
    if let Some(value) = crate::db::get_setting(db, &key).await? {
        return value
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("Invalid {} setting '{}': {}", key, value, e)));
    }

    Ok(default_port)
}
