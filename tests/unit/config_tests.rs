// Configuration loading and validation

use hyperpic::config::*;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_empty_document_uses_defaults() {
    let config = Config::from_yaml_with_env("").unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.address, "0.0.0.0");
    assert_eq!(config.image.cache.provider, ProviderKind::Fs);
    assert_eq!(config.image.save_data_quality, 65);
    assert!(config.auth.secret.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_full_document() {
    let yaml = r#"
server:
  address: 127.0.0.1
  port: 9000
  threads: 2
  request_timeout_seconds: 5
  max_body_size: 1024
auth:
  secret: topsecret
image:
  source:
    provider: memory
  cache:
    provider: memory
    memory:
      life_time_seconds: 60
      clean_interval_seconds: 10
      memory_limit_mb: 16
  support:
    extensions: [jpg, png]
  save_data_quality: 40
  max_concurrent_transforms: 2
logging:
  level: debug
  format: pretty
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();

    assert_eq!(config.server.listen_addr(), "127.0.0.1:9000");
    assert_eq!(config.server.request_timeout().as_secs(), 5);
    assert_eq!(config.auth.secret, "topsecret");
    assert_eq!(config.image.source.provider, ProviderKind::Memory);
    assert_eq!(config.image.cache.memory.limit_bytes(), 16 * 1024 * 1024);

    let policy = config.image.cache.eviction_policy();
    assert_eq!(policy.life_time.as_secs(), 60);
    assert_eq!(policy.clean_interval.as_secs(), 10);

    assert_eq!(config.image.support.extensions, vec!["jpg", "png"]);
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_substitution() {
    std::env::set_var("HYPERPIC_TEST_SECRET", "from-env");
    let config = Config::from_yaml_with_env("auth:\n  secret: ${HYPERPIC_TEST_SECRET}\n").unwrap();
    assert_eq!(config.auth.secret, "from-env");
}

#[test]
fn test_missing_env_var_is_an_error() {
    let err = Config::from_yaml_with_env("auth:\n  secret: ${HYPERPIC_SURELY_UNSET_VAR}\n")
        .unwrap_err();
    assert!(err.contains("HYPERPIC_SURELY_UNSET_VAR"));
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut config = Config::default();
    config.server.port = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.image.support.extensions.clear();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.image.save_data_quality = 101;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.image.cache.provider = ProviderKind::Memory;
    config.image.cache.memory.memory_limit_mb = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "server:\n  port: 8181").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.server.port, 8181);
}

#[test]
fn test_from_missing_file() {
    assert!(Config::from_file("/nonexistent/hyperpic.yaml").is_err());
}
