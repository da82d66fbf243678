use super::*;

const TIMEOUTS: HttpTimeouts = HttpTimeouts { request_secs: 30, connect_secs: 10 };

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__CUPSHUP_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__CUPSHUP_TEST_VALID__", "250") };
    let val: u64 = env_parse("__CUPSHUP_TEST_VALID__", 0);
    assert_eq!(val, 250);
    unsafe { std::env::remove_var("__CUPSHUP_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__CUPSHUP_TEST_INVALID__", "soon") };
    let val: u64 = env_parse("__CUPSHUP_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__CUPSHUP_TEST_INVALID__") };
}

// =============================================================================
// AuthConfig
// =============================================================================

#[test]
fn auth_config_defaults_match_constants() {
    unsafe {
        std::env::remove_var("AUTH_LOOKUP_TIMEOUT_MS");
        std::env::remove_var("AUTH_REFRESH_INTERVAL_SECS");
    }
    let config = AuthConfig::from_env();
    assert_eq!(config.lookup_timeout, Duration::from_secs(10));
    assert_eq!(config.refresh_interval, Duration::from_secs(3600));
    assert_eq!(config, AuthConfig::default());
}

// =============================================================================
// PlatformConfig
// =============================================================================

#[test]
fn platform_config_strips_trailing_slash() {
    let config = PlatformConfig::new("https://abc.example.co/", "anon".into(), TIMEOUTS).unwrap();
    assert_eq!(config.url, "https://abc.example.co");
}

#[test]
fn platform_config_rejects_non_http_url() {
    let err = PlatformConfig::new("abc.example.co", "anon".into(), TIMEOUTS).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_URL", .. }));
}

#[test]
fn platform_config_rejects_other_schemes() {
    let err = PlatformConfig::new("ftp://abc.example.co", "anon".into(), TIMEOUTS).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_URL", .. }));
}

#[test]
fn platform_config_rejects_url_without_host() {
    let err = PlatformConfig::new("https://", "anon".into(), TIMEOUTS).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_URL", .. }));
}

#[test]
fn platform_config_rejects_query_string() {
    let err = PlatformConfig::new("https://abc.example.co/?x=1", "anon".into(), TIMEOUTS).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_URL", .. }));
}

#[test]
fn platform_config_keeps_path_prefix() {
    let config = PlatformConfig::new(" http://localhost:54321/base/ ", "anon".into(), TIMEOUTS).unwrap();
    assert_eq!(config.url, "http://localhost:54321/base");
}

#[test]
fn platform_config_rejects_blank_key() {
    let err = PlatformConfig::new("https://abc.example.co", "  ".into(), TIMEOUTS).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { var: "BACKEND_ANON_KEY", .. }));
}

#[test]
fn platform_config_debug_hides_key() {
    let config = PlatformConfig::new("http://localhost:54321", "super-secret".into(), TIMEOUTS).unwrap();
    let debug = format!("{config:?}");
    assert!(debug.contains("localhost:54321"));
    assert!(!debug.contains("super-secret"));
}
