//! Session request surface.
//!
//! A deliberately small local HTTP server: one operation, "run a detection
//! session", plus a liveness probe. Each request gets its own handler
//! thread and its own session (fresh connection, fresh buffer); the only
//! shared resource is the detector behind a mutex.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::Detector;
use crate::session::{run_http_session, SessionConfig, SessionOutcome};

const MAX_REQUEST_BYTES: usize = 8192;
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8790".to_string(),
        }
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    session: SessionConfig,
    detector: Arc<Mutex<dyn Detector>>,
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, session: SessionConfig, detector: Arc<Mutex<dyn Detector>>) -> Self {
        Self {
            cfg,
            session,
            detector,
        }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let session = self.session.clone();
        let detector = self.detector.clone();
        let join = std::thread::spawn(move || {
            run_api(listener, session, detector, shutdown_thread);
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    session: SessionConfig,
    detector: Arc<Mutex<dyn Detector>>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let session = session.clone();
                let detector = detector.clone();
                std::thread::spawn(move || {
                    if let Err(err) = handle_client(stream, &session, &detector) {
                        log::warn!("request from {} failed: {err:#}", peer);
                    }
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                log::error!("accept failed: {err}");
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn handle_client(
    mut stream: TcpStream,
    session: &SessionConfig,
    detector: &Arc<Mutex<dyn Detector>>,
) -> Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let request_line = read_request_line(&mut stream)?;
    let (method, path) = parse_request_line(&request_line)
        .ok_or_else(|| anyhow!("malformed request line '{}'", request_line))?;

    if method != "GET" {
        return write_response(
            &mut stream,
            "405 Method Not Allowed",
            r#"{"error":"method not allowed"}"#,
        );
    }

    match path {
        "/predict" => {
            let outcome = match detector.lock() {
                Ok(mut guard) => run_http_session(session, &mut *guard),
                Err(_) => SessionOutcome::Error {
                    reason: "detector: lock poisoned".to_string(),
                },
            };
            let body = serde_json::to_string(&outcome)?;
            write_response(&mut stream, "200 OK", &body)
        }
        "/healthz" => write_response(&mut stream, "200 OK", r#"{"status":"ok"}"#),
        _ => write_response(&mut stream, "404 Not Found", r#"{"error":"not found"}"#),
    }
}

fn read_request_line(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..read]);
        if buf.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request exceeds {} bytes", MAX_REQUEST_BYTES));
        }
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&buf);
    Ok(text.lines().next().unwrap_or_default().to_string())
}

fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    Some((method, path))
}

fn write_response(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes())?;
    Ok(())
}
