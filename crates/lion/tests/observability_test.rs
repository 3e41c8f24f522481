//! Tests for logging configuration.

use lion::ObservabilityConfig;

#[test]
fn test_config_builders() {
    let config = ObservabilityConfig::new("lion-test")
        .with_log_level("debug")
        .with_json_logs(true);
    assert_eq!(config.service_name, "lion-test");
    assert_eq!(config.log_level, "debug");
    assert!(config.json_logs);
    assert_eq!(config.service_version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_default_uses_package_name() {
    assert_eq!(ObservabilityConfig::default().service_name, "lion");
}
