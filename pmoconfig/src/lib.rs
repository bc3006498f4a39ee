//! # PMOBrowse Configuration Module
//!
//! This module provides configuration management for the PMOBrowse control point:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for discovery, browsing and chapter settings
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! // Get the global configuration
//! let config = get_config();
//!
//! // Access configuration values
//! let batch = config.get_browse_batch_size()?;
//! let timeout = config.get_http_timeout_secs()?;
//!
//! // Update configuration values
//! config.set_browse_batch_size(25)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmobrowse.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOBrowse configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOBROWSE_CONFIG";
const ENV_PREFIX: &str = "PMOBROWSE_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmobrowse";

// Default values for configuration
const DEFAULT_HTTP_TIMEOUT_SECS: usize = 5;
const DEFAULT_SEARCH_MX: usize = 3;
const DEFAULT_EVENT_TIMEOUT_SECS: usize = 300;
const DEFAULT_BROWSE_BATCH_SIZE: usize = 50;
const DEFAULT_BROWSE_BATCH_INTERVAL_MS: usize = 200;
const DEFAULT_BROWSE_PAGE_SIZE: usize = 100;
const DEFAULT_CHAPTER_FETCH_TIMEOUT_SECS: usize = 10;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Macro to generate getter/setter for usize values with default
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            match self.get_value($path) {
                Ok(Value::Number(n)) => Ok(n.as_u64().map(|v| v as usize).unwrap_or($default)),
                Ok(Value::String(s)) => Ok(s.trim().parse::<usize>().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            let n = Number::from(value);
            self.set_value($path, Value::Number(n))
        }
    };
}

/// Macro to generate getter/setter for string list values
macro_rules! impl_string_list_config {
    ($getter:ident, $setter:ident, $path:expr) => {
        pub fn $getter(&self) -> Result<Vec<String>> {
            match self.get_value($path) {
                Ok(Value::Sequence(seq)) => Ok(seq
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) if !s.trim().is_empty() => Some(s),
                        _ => None,
                    })
                    .collect()),
                _ => Ok(Vec::new()),
            }
        }

        pub fn $setter(&self, values: Vec<String>) -> Result<()> {
            let seq = values.into_iter().map(Value::String).collect();
            self.set_value($path, Value::Sequence(seq))
        }
    };
}

/// Configuration manager for PMOBrowse
///
/// This structure manages the application configuration, including:
/// - Loading configuration from YAML files
/// - Merging with default configuration
/// - Handling environment variable overrides
/// - Providing typed getters/setters for configuration values
///
/// A configuration built with [`Config::from_yaml_str`] has no backing file
/// and is never written to disk.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: Option<String>,
    data: Mutex<Value>,
}

// Implémentation manuelle de Clone
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock_data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        // 1. Try provided directory
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Try environment variable
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var=ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Try current directory
        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        // 4. Try home directory
        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!(
                "Configuration path {} is not a directory",
                path.display()
            ));
        }

        // Test write permission
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        fs::read_dir(path)?;

        Ok(())
    }

    /// Determines and validates the configuration directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOBROWSE_CONFIG` environment variable
    /// 3. `.pmobrowse` in the current directory
    /// 4. `.pmobrowse` in the user's home directory
    ///
    /// The directory is created if it doesn't exist, and validated for read/write permissions.
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir_path = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir_path))?;
        Ok(dir_path)
    }

    /// Loads the configuration from the specified directory
    ///
    /// This method:
    /// 1. Determines the configuration directory
    /// 2. Loads the default embedded configuration
    /// 3. Merges it with the external config.yaml file if present
    /// 4. Applies environment variable overrides
    /// 5. Saves the merged configuration
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        info!(config_dir=%config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file=%path, "Loaded config file");
            data
        } else {
            info!(config_file=%path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        let mut config_value = Self::merged_with_defaults(&external_value)?;

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from a YAML document merged over the
    /// embedded defaults. Environment overrides are not applied.
    ///
    /// ```
    /// use pmoconfig::Config;
    ///
    /// let config = Config::from_yaml_str("browse:\n  batch_size: 10\n").unwrap();
    /// assert_eq!(config.get_browse_batch_size().unwrap(), 10);
    /// assert_eq!(config.get_browse_page_size().unwrap(), 100);
    /// ```
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let external_value: Value = if yaml.trim().is_empty() {
            Value::Mapping(Mapping::new())
        } else {
            serde_yaml::from_str(yaml)?
        };
        let config_value = Self::merged_with_defaults(&external_value)?;

        Ok(Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(config_value),
        })
    }

    fn merged_with_defaults(external: &Value) -> Result<Value> {
        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        merge_yaml(&mut default_value, external);
        Ok(Self::lower_keys_value(default_value))
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.lock_data();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["browse", "batch_size"]`)
    /// * `value` - The YAML value to set
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.lock_data();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key);
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Current node is not a map"))
        }
    }

    /// Gets a configuration value at the specified path
    ///
    /// Returns an error if the path doesn't exist.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data();
        Self::get_value_internal(&data, path)
    }

    fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
        let mut current = data;
        for (i, key) in path.iter().enumerate() {
            if let Value::Mapping(map) = current {
                let key = key.to_lowercase();

                if let Some(next) = map.get(&Value::String(key)) {
                    current = next;
                } else {
                    return Err(anyhow!("Path {} does not exist", path[..=i].join(".")));
                }
            } else {
                return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
            }
        }
        Ok(current.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                let key_path = stripped.split("__").collect::<Vec<_>>();
                let yaml_value = Self::convert_env_value(&value);
                let _ = Self::set_value_internal(config, &key_path, yaml_value);
            }
        }
    }

    fn convert_env_value(value: &str) -> Value {
        if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
            return parsed;
        }
        Value::String(value.to_string())
    }

    fn lower_keys_value(value: Value) -> Value {
        match value {
            Value::Mapping(map) => {
                let mut new_map = Mapping::new();
                for (k, v) in map {
                    if let Value::String(s) = k {
                        new_map.insert(Value::String(s.to_lowercase()), Self::lower_keys_value(v));
                    } else {
                        new_map.insert(k, Self::lower_keys_value(v));
                    }
                }
                Value::Mapping(new_map)
            }
            Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Self::lower_keys_value).collect())
            }
            _ => value,
        }
    }

    /// Directory holding `config.yaml`; empty for in-memory configurations.
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    impl_usize_config!(
        get_http_timeout_secs,
        set_http_timeout_secs,
        &["control_point", "http_timeout_secs"],
        DEFAULT_HTTP_TIMEOUT_SECS
    );

    impl_usize_config!(
        get_search_mx,
        set_search_mx,
        &["control_point", "search_mx"],
        DEFAULT_SEARCH_MX
    );

    impl_usize_config!(
        get_event_timeout_secs,
        set_event_timeout_secs,
        &["control_point", "event_timeout_secs"],
        DEFAULT_EVENT_TIMEOUT_SECS
    );

    impl_string_list_config!(
        get_search_targets,
        set_search_targets,
        &["control_point", "search_targets"]
    );

    impl_string_list_config!(
        get_interfaces,
        set_interfaces,
        &["control_point", "interfaces"]
    );

    impl_usize_config!(
        get_browse_batch_size,
        set_browse_batch_size,
        &["browse", "batch_size"],
        DEFAULT_BROWSE_BATCH_SIZE
    );

    impl_usize_config!(
        get_browse_batch_interval_ms,
        set_browse_batch_interval_ms,
        &["browse", "batch_interval_ms"],
        DEFAULT_BROWSE_BATCH_INTERVAL_MS
    );

    impl_usize_config!(
        get_browse_page_size,
        set_browse_page_size,
        &["browse", "page_size"],
        DEFAULT_BROWSE_PAGE_SIZE
    );

    impl_usize_config!(
        get_chapter_fetch_timeout_secs,
        set_chapter_fetch_timeout_secs,
        &["chapters", "fetch_timeout_secs"],
        DEFAULT_CHAPTER_FETCH_TIMEOUT_SECS
    );

    /// Minimum log level used as the default `EnvFilter` directive.
    pub fn get_log_min_level(&self) -> Result<String> {
        match self.get_value(&["logger", "min_level"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            _ => Ok(DEFAULT_LOG_MIN_LEVEL.to_string()),
        }
    }

    pub fn set_log_min_level(&self, level: String) -> Result<()> {
        self.set_value(&["logger", "min_level"], Value::String(level))
    }
}

/// Returns the global configuration instance
///
/// The instance is lazily loaded on first access.
///
/// ```no_run
/// use pmoconfig::get_config;
///
/// let config = get_config();
/// let page = config.get_browse_page_size();
/// ```
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Merges external YAML configuration into default configuration
///
/// - For mappings (objects), it merges keys from external into default
/// - For scalars and sequences, external values replace default values
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_embedded() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_browse_batch_size().unwrap(), 50);
        assert_eq!(config.get_browse_batch_interval_ms().unwrap(), 200);
        assert_eq!(config.get_http_timeout_secs().unwrap(), 5);
        assert_eq!(config.get_log_min_level().unwrap(), "info");
        assert!(config.get_interfaces().unwrap().is_empty());
        assert_eq!(config.get_search_targets().unwrap().len(), 3);
    }

    #[test]
    fn external_values_override_defaults_with_lowercased_keys() {
        let config = Config::from_yaml_str(
            "Browse:\n  Batch_Size: 12\ncontrol_point:\n  interfaces: [eth0, '']\n",
        )
        .unwrap();
        assert_eq!(config.get_browse_batch_size().unwrap(), 12);
        assert_eq!(config.get_browse_page_size().unwrap(), 100);
        assert_eq!(config.get_interfaces().unwrap(), vec!["eth0".to_string()]);
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let config = Config::from_yaml_str("browse:\n  batch_size: lots\n").unwrap();
        assert_eq!(config.get_browse_batch_size().unwrap(), 50);
    }

    #[test]
    fn setters_update_in_memory_config() {
        let config = Config::from_yaml_str("").unwrap();
        config.set_browse_page_size(7).unwrap();
        config
            .set_search_targets(vec!["ssdp:all".to_string()])
            .unwrap();
        assert_eq!(config.get_browse_page_size().unwrap(), 7);
        assert_eq!(config.get_search_targets().unwrap(), vec!["ssdp:all"]);
    }

    #[test]
    fn load_config_writes_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();
        fs::write(dir.path().join("config.yaml"), "chapters:\n  fetch_timeout_secs: 3\n").unwrap();

        let config = Config::load_config(&dir_str).unwrap();
        assert_eq!(config.get_chapter_fetch_timeout_secs().unwrap(), 3);
        assert_eq!(config.get_search_mx().unwrap(), 3);

        let saved = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert!(saved.contains("batch_interval_ms"));
    }
}
