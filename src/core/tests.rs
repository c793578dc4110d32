use super::*;
use std::collections::HashMap;
use std::io::Write;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.logging.level, "info");
    assert!(config.state.retain_on_evict);
    assert!(config.metrics.enabled);
    assert_eq!(config.codec.max_payload_bytes, 64 * 1024);
}

#[test]
fn partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[codec]\nquality = 4\n\n[state]\nretain_on_evict = false").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.codec.quality, 4);
    assert_eq!(config.codec.window, 22);
    assert!(!config.state.retain_on_evict);
    assert_eq!(config.logging, config::LoggingConfig::default());
}

#[test]
fn malformed_file_is_a_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[codec\nquality = ").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(Error::Config(_))));
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"loud\"").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(Error::Config(_))));
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::from_file(dir.path().join("absent.toml")).is_err());
}

#[test]
fn environment_overrides_apply() {
    let mut config = Config::default();
    config
        .apply_env_overrides(env(&[
            ("WARDROBE_LOG_LEVEL", "debug"),
            ("WARDROBE_CODEC_QUALITY", "11"),
            ("WARDROBE_METRICS", "false"),
        ]))
        .unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.codec.quality, 11);
    assert!(!config.metrics.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn unparsable_override_is_rejected() {
    let mut config = Config::default();
    let result = config.apply_env_overrides(env(&[("WARDROBE_RETAIN_ON_EVICT", "maybe")]));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn validation_bounds() {
    let mut config = Config::default();
    config.codec.window = 30;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.codec.max_payload_bytes = 16;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.logging.format = "xml".into();
    assert!(config.validate().is_err());
}
