use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
pub(crate) static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_COMPLETION_TOKEN: &str = "SCAMWATCH_COMPLETION_TOKEN";
pub const ENV_COMPLETION_URL: &str = "SCAMWATCH_COMPLETION_URL";
pub const ENV_DATA_DIR: &str = "SCAMWATCH_DATA_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Builds the configuration from defaults, the config file, environment
/// variables and CLI flags, later layers winning.
pub fn load_config(cli_model: Option<String>, cli_config_path: Option<PathBuf>) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: config file (~/.scamwatch/config.json)
    let config_file = cli_config_path.or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = merge_config_from_file(config, path)?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment variables
    config = merge_env_variables(config);

    // Layer 3: CLI flags
    if let Some(model) = cli_model {
        tracing::debug!(model = %model, "Applying CLI model override");
        config.completion.model_name = model;
    }

    config.validate().context("Invalid configuration")?;

    let summary = config.get_safe_summary();
    tracing::debug!(
        telegram_configured = summary.telegram_configured,
        completion_token_configured = summary.completion_token_configured,
        completion_url = %summary.completion_url,
        model = %summary.model,
        inactivity_timeout_secs = summary.inactivity_timeout_secs,
        sweep_interval_secs = summary.sweep_interval_secs,
        history_cap = summary.history_cap,
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".scamwatch").join("config.json"))
}

fn merge_config_from_file(config: Config, path: &Path) -> Result<Config> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
        Err(e) => return Err(e).context("Failed to read metadata for config file"),
    };

    // The file holds the bot token and the completion key
    #[cfg(unix)]
    {
        let mode = metadata.permissions().mode() & 0o777;
        if mode != 0o600 {
            tracing::error!(
                "Config file {:?} has permissions {:o}, expected 0600 - skipping for security",
                path,
                mode
            );
            return Ok(config);
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let file_config: Config = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;
    Ok(file_config)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn merge_env_variables(mut config: Config) -> Config {
    if let Some(token) = env_value(ENV_TELEGRAM_TOKEN) {
        config.telegram_token = Some(token);
    }
    if let Some(token) = env_value(ENV_COMPLETION_TOKEN) {
        config.completion.access_token = Some(token);
    }
    if let Some(url) = env_value(ENV_COMPLETION_URL) {
        config.completion.base_url = url;
    }
    if let Some(dir) = env_value(ENV_DATA_DIR) {
        config.data_dir = Some(PathBuf::from(dir));
    }
    config
}

/// Writes the config as pretty JSON with 0600 permissions.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(config)?;

    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create config file: {:?}", path))?;

    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    #[cfg(unix)]
    {
        let mut permissions = file.metadata()?.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to set permissions on config file: {:?}", path))?;
    }

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}

pub fn get_config_path() -> Option<PathBuf> {
    get_default_config_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    fn clear_env() {
        unsafe {
            env::remove_var(ENV_TELEGRAM_TOKEN);
            env::remove_var(ENV_COMPLETION_TOKEN);
            env::remove_var(ENV_COMPLETION_URL);
            env::remove_var(ENV_DATA_DIR);
        }
    }

    fn file_config() -> Config {
        let mut config = Config::default();
        config.telegram_token = Some("file-token".to_string());
        config.completion.access_token = Some("file-key".to_string());
        config.completion.model_name = "file-model".to_string();
        config.session.inactivity_timeout_secs = 120;
        config
    }

    #[test]
    fn test_load_config_defaults() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config = load_config(None, Some(temp_dir.path().join("missing.json"))).unwrap();
        assert!(config.telegram_token.is_none());
        assert!(config.completion.access_token.is_none());
        assert_eq!(config.session.inactivity_timeout_secs, 60);
    }

    #[test]
    fn test_load_config_from_file() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        save_config(&file_config(), &config_path).unwrap();

        let loaded = load_config(None, Some(config_path)).unwrap();
        assert_eq!(loaded, file_config());
    }

    #[test]
    fn test_load_config_invalid_json() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        fs::write(&config_path, "not valid json").unwrap();
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600)).unwrap();

        let err = load_config(None, Some(config_path)).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid JSON"));
    }

    #[test]
    fn test_world_readable_file_is_skipped() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        save_config(&file_config(), &config_path).unwrap();
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o644)).unwrap();

        let config = load_config(None, Some(config_path)).unwrap();
        assert!(config.telegram_token.is_none());
        assert_eq!(config.completion.model_name, crate::config::schema::DEFAULT_MODEL);
    }

    #[test]
    fn test_config_hierarchy_precedence() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        save_config(&file_config(), &config_path).unwrap();

        unsafe {
            env::set_var(ENV_COMPLETION_TOKEN, "env-key");
            env::set_var(ENV_DATA_DIR, "/tmp/scamwatch-env");
        }

        let config = load_config(Some("cli-model".to_string()), Some(config_path)).unwrap();

        assert_eq!(config.telegram_token.as_deref(), Some("file-token")); // file
        assert_eq!(config.completion.access_token.as_deref(), Some("env-key")); // env
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/scamwatch-env"))); // env
        assert_eq!(config.completion.model_name, "cli-model"); // CLI
        assert_eq!(config.session.inactivity_timeout_secs, 120); // file

        clear_env();
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var(ENV_TELEGRAM_TOKEN, "  ");
        }

        let temp_dir = TempDir::new().unwrap();
        let config = load_config(None, Some(temp_dir.path().join("missing.json"))).unwrap();
        assert!(config.telegram_token.is_none());

        clear_env();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _lock = CONFIG_TEST_ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let mut config = Config::default();
        config.history.max_entries_per_user = 0;
        save_config(&config, &config_path).unwrap();

        assert!(load_config(None, Some(config_path)).is_err());
    }

    #[test]
    fn test_save_config_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");
        save_config(&Config::default(), &config_path).unwrap();

        let mode = fs::metadata(&config_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "Config file should have 0600 permissions");
    }

    #[test]
    fn test_get_config_path() {
        let path = get_config_path().unwrap();
        assert!(path.to_string_lossy().contains(".scamwatch"));
        assert!(path.ends_with("config.json"));
    }
}
