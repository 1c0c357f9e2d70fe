use crate::manifest::{
    ManifestRules, SuffixPolicy, DEFAULT_PREFERENCES_DIR, DEFAULT_PREFERENCE_SUFFIX,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "eidos.json";
const DEFAULT_DEBOUNCE_SECS: u64 = 2;

fn default_preferences_dir() -> String {
    DEFAULT_PREFERENCES_DIR.to_string()
}

fn default_preference_suffix() -> String {
    DEFAULT_PREFERENCE_SUFFIX.to_string()
}

fn default_debounce_secs() -> u64 {
    DEFAULT_DEBOUNCE_SECS
}

/// Configuration structure for the backup agent.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// The application data directory to back up.
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Name of the top-level preferences subtree.
    #[serde(default = "default_preferences_dir")]
    pub preferences_dir: String,
    /// Suffix stripped from preference file names.
    #[serde(default = "default_preference_suffix")]
    pub preference_suffix: String,
    /// Handling of preference files lacking the suffix.
    #[serde(default)]
    pub missing_suffix: SuffixPolicy,
    /// Names skipped at every depth of the walk.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Quiet period after the last change before a backup is requested.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            preferences_dir: default_preferences_dir(),
            preference_suffix: default_preference_suffix(),
            missing_suffix: SuffixPolicy::default(),
            excluded: Vec::new(),
            debounce_secs: default_debounce_secs(),
        }
    }
}

impl AgentConfig {
    /// Returns the walk rules described by this configuration.
    pub fn rules(&self) -> ManifestRules {
        ManifestRules {
            preferences_dir: self.preferences_dir.clone(),
            preference_suffix: self.preference_suffix.clone(),
            missing_suffix: self.missing_suffix,
            excluded: self.excluded.clone(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    /// Returns the configured data directory if it exists as a directory.
    pub fn data_dir_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_deref()
            .filter(|p| is_valid_dir(p))
            .map(PathBuf::from)
    }
}

/// Resolves the path to the configuration file.
///
/// Attempts to locate `eidos.json` in the same directory as the executable.
/// Defaults to `eidos.json` in the current working directory if the executable path cannot be determined.
pub fn get_config_path() -> PathBuf {
    std::env::current_exe()
        .map(|p| p.parent().unwrap_or(Path::new(".")).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME))
}

/// Loads configuration from a specific file path.
///
/// Returns `AgentConfig::default()` if the file does not exist or cannot be parsed.
pub fn load_config_from_path(path: &Path) -> AgentConfig {
    log::info!("Loading configuration from: {:?}", path);
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    log::info!("Configuration loaded successfully");
                    return config;
                }
                Err(e) => log::error!("Failed to parse configuration: {}", e),
            },
            Err(e) => log::error!("Failed to read configuration file: {}", e),
        }
    } else {
        log::info!("Configuration file not found, using defaults");
    }
    AgentConfig::default()
}

/// Writes the configuration to `path` as pretty-printed JSON.
pub fn save_config_to_path(path: &Path, config: &AgentConfig) -> Result<(), String> {
    let json = serde_json::to_string_pretty(config).map_err(|e| {
        log::error!("Failed to serialize config: {}", e);
        format!("Failed to serialize config: {}", e)
    })?;

    fs::write(path, json).map_err(|e| {
        log::error!("Failed to write config file: {}", e);
        format!("Failed to write config file: {}", e)
    })?;

    log::info!("Configuration saved successfully to {:?}", path);
    Ok(())
}

/// Sets the data directory after checking that it exists as a directory.
pub fn set_data_dir(config: &mut AgentConfig, path: String) -> Result<(), String> {
    log::info!("Attempting to set data directory to: {}", path);

    if !is_valid_dir(&path) {
        log::warn!("Validation failed: Path does not exist or is not a directory");
        return Err("The provided path does not exist or is not a directory.".to_string());
    }

    config.data_dir = Some(path);
    Ok(())
}

/// Validates if the provided string is a valid directory path.
fn is_valid_dir(path: &str) -> bool {
    Path::new(path).is_dir()
}
