use fileshare_client::config::{DEFAULT_MAX_UPLOAD_BYTES, MAX_TOKEN_REFRESH_MARGIN_SECS};
use fileshare_client::{ClientConfig, ClientError, UploadPolicy};
use std::time::Duration;

#[test]
fn default_api_base_url() {
    let config = ClientConfig::default();
    assert_eq!(config.api_base_url, "http://localhost:8000");
}

#[test]
fn default_timeouts() {
    let config = ClientConfig::default();
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.token_refresh_margin_secs, 30);
}

#[test]
fn default_upload_limits() {
    let config = ClientConfig::default();
    assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
    assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    assert_eq!(config.completed_task_linger(), Duration::from_millis(3_000));
    assert_eq!(config.upload_chunk_bytes, 64 * 1024);
}

#[test]
fn for_base_url_keeps_other_defaults() {
    let config = ClientConfig::for_base_url("http://127.0.0.1:9999");
    assert_eq!(config.api_base_url, "http://127.0.0.1:9999");
    assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
}

#[test]
fn url_joins_without_double_slash() {
    let config = ClientConfig::for_base_url("http://api.test/");
    assert_eq!(config.url("/api/files/"), "http://api.test/api/files/");

    let config = ClientConfig::for_base_url("http://api.test");
    assert_eq!(config.url("/api/files/"), "http://api.test/api/files/");
}

#[test]
fn default_is_valid() {
    assert!(ClientConfig::default().validate().is_ok());
}

#[test]
fn empty_base_url_is_invalid() {
    let config = ClientConfig::for_base_url("  ");
    assert!(matches!(config.validate(), Err(ClientError::Config(_))));
}

#[test]
fn zero_chunk_size_is_invalid() {
    let config = ClientConfig {
        upload_chunk_bytes: 0,
        ..ClientConfig::default()
    };
    assert!(matches!(config.validate(), Err(ClientError::Config(_))));
}

#[test]
fn zero_timeout_is_invalid() {
    let config = ClientConfig {
        request_timeout_secs: 0,
        ..ClientConfig::default()
    };
    assert!(matches!(config.validate(), Err(ClientError::Config(_))));
}

#[test]
fn upload_policy_from_config() {
    let config = ClientConfig {
        max_upload_bytes: 10,
        completed_task_linger_ms: 250,
        ..ClientConfig::default()
    };
    let policy = UploadPolicy::from(&config);
    assert_eq!(policy.max_upload_bytes, 10);
    assert_eq!(policy.completed_task_linger, Duration::from_millis(250));
}

#[test]
fn serialization_roundtrip() {
    let config = ClientConfig {
        api_base_url: "https://files.example.com".into(),
        token_refresh_margin_secs: 60,
        ..ClientConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed: ClientConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.api_base_url, "https://files.example.com");
    assert_eq!(parsed.token_refresh_margin_secs, 60);
    assert_eq!(parsed.upload_chunk_bytes, config.upload_chunk_bytes);
}

#[test]
fn refresh_margin_bounds() {
    let with_margin = |secs| ClientConfig {
        token_refresh_margin_secs: secs,
        ..ClientConfig::default()
    };
    assert!(with_margin(0).validate().is_ok());
    assert!(with_margin(MAX_TOKEN_REFRESH_MARGIN_SECS).validate().is_ok());
    assert!(matches!(with_margin(-1).validate(), Err(ClientError::Config(_))));
    assert!(matches!(
        with_margin(MAX_TOKEN_REFRESH_MARGIN_SECS + 1).validate(),
        Err(ClientError::Config(_))
    ));
    assert!(matches!(with_margin(i64::MAX).validate(), Err(ClientError::Config(_))));
}
