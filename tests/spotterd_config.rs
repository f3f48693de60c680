use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use stream_spotter::config::SpotterConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SPOTTER_CONFIG",
        "SPOTTER_API_ADDR",
        "SPOTTER_STREAM_URL",
        "SPOTTER_TELEMETRY_URL",
        "SPOTTER_TARGET_LABEL",
        "SPOTTER_CONNECT_TIMEOUT_MS",
        "SPOTTER_READ_TIMEOUT_MS",
        "SPOTTER_TELEMETRY_TIMEOUT_MS",
        "SPOTTER_SESSION_TIMEOUT_MS",
        "SPOTTER_FRAME_DECODE_TIMEOUT_MS",
        "SPOTTER_MAX_BUFFER_BYTES",
        "SPOTTER_MAX_DECODE_FAILURES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": { "addr": "0.0.0.0:9100" },
        "stream": {
            "url": "http://camera-1:81/stream",
            "connect_timeout_ms": 4000,
            "read_timeout_ms": 1500
        },
        "telemetry": { "url": "http://camera-1/gps", "timeout_ms": 2500 },
        "session": {
            "target_label": "car",
            "timeout_ms": 12000,
            "frame_decode_timeout_ms": 900,
            "max_buffer_bytes": 1048576,
            "max_consecutive_decode_failures": 3
        },
        "detector": { "backend": "stub" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SPOTTER_CONFIG", file.path());
    std::env::set_var("SPOTTER_TARGET_LABEL", "person");
    std::env::set_var("SPOTTER_SESSION_TIMEOUT_MS", "20000");

    let cfg = SpotterConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "0.0.0.0:9100");
    assert_eq!(cfg.stream_url, "http://camera-1:81/stream");
    assert_eq!(cfg.telemetry_url, "http://camera-1/gps");
    assert_eq!(cfg.connect_timeout, Duration::from_millis(4000));
    assert_eq!(cfg.read_timeout, Duration::from_millis(1500));
    assert_eq!(cfg.telemetry_timeout, Duration::from_millis(2500));
    assert_eq!(cfg.frame_decode_timeout, Duration::from_millis(900));
    assert_eq!(cfg.max_buffer_bytes, 1_048_576);
    assert_eq!(cfg.max_consecutive_decode_failures, 3);
    assert_eq!(cfg.detector.backend, "stub");

    // Environment wins over the file.
    assert_eq!(cfg.target_label, "person");
    assert_eq!(cfg.session_timeout, Duration::from_millis(20000));

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SpotterConfig::load().expect("load defaults");

    assert_eq!(cfg.api_addr, "127.0.0.1:8790");
    assert_eq!(cfg.target_label, "person");
    assert_eq!(cfg.session_timeout, Duration::from_secs(30));
    assert!(cfg.max_buffer_bytes > 0);

    clear_env();
}

#[test]
fn every_timing_knob_is_overridable_from_the_environment() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SPOTTER_CONNECT_TIMEOUT_MS", "700");
    std::env::set_var("SPOTTER_READ_TIMEOUT_MS", "800");
    std::env::set_var("SPOTTER_TELEMETRY_TIMEOUT_MS", "900");
    std::env::set_var("SPOTTER_FRAME_DECODE_TIMEOUT_MS", "1100");
    std::env::set_var("SPOTTER_MAX_DECODE_FAILURES", "2");

    let cfg = SpotterConfig::load().expect("load config");
    assert_eq!(cfg.connect_timeout, Duration::from_millis(700));
    assert_eq!(cfg.read_timeout, Duration::from_millis(800));
    assert_eq!(cfg.telemetry_timeout, Duration::from_millis(900));
    assert_eq!(cfg.frame_decode_timeout, Duration::from_millis(1100));
    assert_eq!(cfg.max_consecutive_decode_failures, 2);

    clear_env();
}

#[test]
fn rejects_a_malformed_timeout_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SPOTTER_READ_TIMEOUT_MS", "fast");
    let err = SpotterConfig::load().unwrap_err();
    assert!(err.to_string().contains("SPOTTER_READ_TIMEOUT_MS"), "{err}");

    clear_env();
}

#[test]
fn rejects_a_non_http_stream_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SPOTTER_STREAM_URL", "rtsp://camera-1/stream");
    let err = SpotterConfig::load().unwrap_err();
    assert!(err.to_string().contains("http"), "{err}");

    clear_env();
}

#[test]
fn rejects_a_zero_session_timeout() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SPOTTER_SESSION_TIMEOUT_MS", "0");
    assert!(SpotterConfig::load().is_err());

    clear_env();
}
