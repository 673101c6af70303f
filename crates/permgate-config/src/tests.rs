//! Tests for engine configuration.

use super::*;

#[test]
fn test_toml_parsing() {
    let toml = r#"
        [limits]
        max_depth = 8
        max_nodes = 64

        [registry]
        duplicate_policy = "replace"
        retain_history_on_remove = false

        [provider]
        fetch_timeout_ms = 1500
        max_concurrent_fetches = 4
    "#;

    let config = EngineConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.limits.max_depth, 8);
    assert_eq!(config.limits.max_nodes, 64);
    assert_eq!(config.limits.max_identifier_len, DEFAULT_MAX_IDENTIFIER_LEN);
    assert_eq!(config.registry.duplicate_policy, DuplicatePolicy::Replace);
    assert!(!config.registry.retain_history_on_remove);
    assert!(config.registry.evaluate_on_register);
    assert_eq!(config.provider.fetch_timeout(), Duration::from_millis(1500));
    assert_eq!(config.provider.max_concurrent_fetches, 4);
}

#[test]
fn test_yaml_parsing() {
    let yaml = r#"
        limits:
          max_identifier_len: 32
        registry:
          duplicate_policy: reject
          evaluate_on_register: false
    "#;

    let config = EngineConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.limits.max_identifier_len, 32);
    assert_eq!(config.registry.duplicate_policy, DuplicatePolicy::Reject);
    assert!(!config.registry.evaluate_on_register);
    assert_eq!(config.provider, ProviderConfig::default());
}

#[test]
fn test_empty_document_is_default() {
    let config = EngineConfig::from_toml_str("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert!(config.registry.retain_history_on_remove);
    assert_eq!(config.provider.fetch_timeout_ms, 5_000);
}

#[test]
fn test_invalid_values_rejected() {
    let err = EngineConfig::from_toml_str("[limits]\nmax_depth = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = EngineConfig::from_toml_str("[provider]\nmax_concurrent_fetches = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = EngineConfig::from_toml_str("[registry]\nduplicate_policy = \"merge\"").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn test_missing_file() {
    let err = EngineConfig::load("does-not-exist.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert_eq!(
        EngineConfig::load("does-not-exist.yaml").unwrap_or_default(),
        EngineConfig::default()
    );
}

#[test]
fn test_builder() {
    let config = EngineConfig::new()
        .with_duplicate_policy(DuplicatePolicy::Replace)
        .with_fetch_timeout(Duration::from_millis(20))
        .with_retained_history(false)
        .with_limits(LimitsConfig {
            max_depth: 4,
            ..LimitsConfig::default()
        });

    assert_eq!(config.registry.duplicate_policy, DuplicatePolicy::Replace);
    assert_eq!(config.provider.fetch_timeout_ms, 20);
    assert!(!config.registry.retain_history_on_remove);

    let limits: ValidationLimits = config.limits.into();
    assert_eq!(limits.max_depth, 4);
    assert_eq!(limits.max_nodes, 256);
}
