use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stream_spotter::api::{ApiConfig, ApiHandle, ApiServer};
use stream_spotter::{SessionConfig, StubDetector};

fn spawn_api() -> ApiHandle {
    let session = SessionConfig {
        // Nothing listens here; a session must fail fast with a connect error.
        stream_url: "http://127.0.0.1:1/stream".to_string(),
        telemetry_url: "http://127.0.0.1:1/gps".to_string(),
        connect_timeout: Duration::from_millis(300),
        read_timeout: Duration::from_millis(300),
        session_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    };
    let detector = Arc::new(Mutex::new(StubDetector::empty()));
    ApiServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        },
        session,
        detector,
    )
    .spawn()
    .expect("spawn api")
}

fn request(handle: &ApiHandle, path: &str) -> String {
    let mut stream = TcpStream::connect(handle.addr).expect("connect to api");
    stream
        .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).as_bytes())
        .expect("write request");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    response
}

#[test]
fn healthz_reports_liveness() {
    let handle = spawn_api();
    let response = request(&handle, "/healthz");
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains(r#"{"status":"ok"}"#), "{response}");
    handle.stop().expect("stop api");
}

#[test]
fn predict_returns_a_session_outcome() {
    let handle = spawn_api();
    let response = request(&handle, "/predict");
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains(r#""status":"error""#), "{response}");
    assert!(response.contains("connect:"), "{response}");
    handle.stop().expect("stop api");
}

#[test]
fn unknown_routes_are_not_found() {
    let handle = spawn_api();
    let response = request(&handle, "/frames");
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    handle.stop().expect("stop api");
}
