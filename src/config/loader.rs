//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered, later ones
//! overriding earlier ones:
//!
//! 1. `<dir>/logwatch.{toml,yaml,json}`
//! 2. `<dir>/logwatch.<environment>.{toml,yaml,json}`
//! 3. `LOGWATCH__*` environment variables (`LOGWATCH__SAMPLING_INTERVAL_MS=2000`)
//!
//! The directory defaults to `config/` and can be moved with `LOGWATCH_CONFIG_DIR`.

use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::MonitorConfig;
use crate::logging;

const CONFIG_FILE_STEM: &str = "logwatch";
const ENV_PREFIX: &str = "LOGWATCH";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: MonitorConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = logging::get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layered(config_dir, environment, None)
    }

    /// Load with an explicit environment-variable map instead of the process
    /// environment. Keys use the same `LOGWATCH__` form.
    pub fn load_with_env_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: config::Map<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layered(config_dir, environment, Some(overrides))
    }

    fn load_layered(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_overrides: Option<config::Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading monitor configuration"
        );

        let base = config_directory.join(CONFIG_FILE_STEM);
        let overlay = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}"));

        let settings = Config::builder()
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env_overrides),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(config_directory.clone(), e))?;

        let config: MonitorConfig = settings
            .try_deserialize()
            .map_err(|e| ConfigurationError::ParseError {
                error: e.to_string(),
            })?;

        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&config)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        info!(
            environment = %environment,
            channels = config.channels.len(),
            sampling_interval_ms = config.sampling_interval_ms,
            liveness_interval_ms = config.effective_liveness_interval_ms(),
            "Monitor configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Effective configuration as JSON, for diagnostics output
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn default_config_directory() -> PathBuf {
        env::var("LOGWATCH_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_config_dir(base: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logwatch.toml"), base).unwrap();
        dir
    }

    #[test]
    fn test_basic_config_loading() {
        let dir = setup_config_dir(
            r#"
channels = "Application; System; Microsoft-Windows-Sysmon/Operational"
sampling_interval_ms = 1000
"#,
        );

        let manager = ConfigManager::load_with_env_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            config::Map::new(),
        )
        .unwrap();

        assert_eq!(manager.environment(), "test");
        assert_eq!(
            manager.config().channels,
            vec![
                "Application",
                "System",
                "Microsoft-Windows-Sysmon/Operational"
            ]
        );
        assert_eq!(manager.config().effective_liveness_interval_ms(), 1000);
    }

    #[test]
    fn test_environment_specific_overrides() {
        let dir = setup_config_dir(
            r#"
channels = ["Application"]
sampling_interval_ms = 1000
"#,
        );
        fs::write(
            dir.path().join("logwatch.production.toml"),
            "sampling_interval_ms = 5000\nliveness_interval_ms = 60000\n",
        )
        .unwrap();

        let manager = ConfigManager::load_with_env_overrides(
            Some(dir.path().to_path_buf()),
            "production",
            config::Map::new(),
        )
        .unwrap();

        assert_eq!(manager.config().sampling_interval_ms, 5000);
        assert_eq!(manager.config().liveness_interval_ms, Some(60_000));
        assert_eq!(manager.config().channels, vec!["Application"]);
    }

    #[test]
    fn test_environment_variable_overrides() {
        let dir = setup_config_dir(
            r#"
channels = ["Application"]
sampling_interval_ms = 1000
"#,
        );

        let mut overrides = config::Map::new();
        overrides.insert(
            "LOGWATCH__SAMPLING_INTERVAL_MS".to_string(),
            "3000".to_string(),
        );
        overrides.insert(
            "LOGWATCH__CHANNELS".to_string(),
            "Security;ForwardedEvents".to_string(),
        );

        let manager =
            ConfigManager::load_with_env_overrides(Some(dir.path().to_path_buf()), "test", overrides)
                .unwrap();

        assert_eq!(manager.config().sampling_interval_ms, 3000);
        assert_eq!(
            manager.config().channels,
            vec!["Security", "ForwardedEvents"]
        );
    }

    #[test]
    fn test_interval_below_minimum_is_fatal() {
        let dir = setup_config_dir(
            r#"
channels = ["Application"]
sampling_interval_ms = 500
"#,
        );

        let err = ConfigManager::load_with_env_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            config::Map::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_interval_is_fatal() {
        let dir = setup_config_dir("channels = [\"Application\"]\n");

        let err = ConfigManager::load_with_env_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            config::Map::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ConfigurationError::ParseError { .. }));
    }

    #[test]
    fn test_debug_config_contains_effective_values() {
        let dir = setup_config_dir(
            r#"
channels = ["Application"]
sampling_interval_ms = 2000
"#,
        );

        let manager = ConfigManager::load_with_env_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            config::Map::new(),
        )
        .unwrap();

        let dump = manager.debug_config();
        assert_eq!(dump["sampling_interval_ms"], 2000);
        assert_eq!(dump["channels"][0], "Application");
    }
}
