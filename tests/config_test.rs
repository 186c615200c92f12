//! The configuration files shipped in `config/` load and validate.

use std::path::PathBuf;

use logwatch::config::ConfigManager;
use logwatch::sanitize_instance_name;

fn shipped_config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config")
}

#[test]
fn test_shipped_development_config() {
    let manager = ConfigManager::load_with_env_overrides(
        Some(shipped_config_dir()),
        "development",
        config::Map::new(),
    )
    .unwrap();

    let config = manager.config();
    assert_eq!(config.sampling_interval_ms, 1000);
    assert_eq!(config.effective_liveness_interval_ms(), 1000);
    assert!(config.channels.contains(&"ForwardedEvents".to_string()));

    let sysmon = config
        .channels
        .iter()
        .find(|c| c.starts_with("Microsoft-Windows-Sysmon"))
        .unwrap();
    assert_eq!(
        sanitize_instance_name(sysmon),
        "Microsoft-Windows-Sysmon-Operational"
    );
}

#[test]
fn test_shipped_production_overlay() {
    let manager = ConfigManager::load_with_env_overrides(
        Some(shipped_config_dir()),
        "production",
        config::Map::new(),
    )
    .unwrap();

    assert_eq!(manager.environment(), "production");
    assert_eq!(manager.config().sampling_interval_ms, 5000);
    assert_eq!(manager.config().effective_liveness_interval_ms(), 60_000);
    assert_eq!(manager.config().channels.len(), 5);
}
