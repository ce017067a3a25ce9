//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use ab_router::config::load_config;
use ab_router::http::{RequestIdProvider, UuidRequestIds};
use ab_router::{HttpServer, Reloader, Shutdown};

/// Start a mock backend that answers every request with its `name` on the
/// first line, followed by the raw request it received.
pub async fn start_backend(name: &'static str) -> SocketAddr {
    start_slow_backend(name, Duration::ZERO).await
}

/// Like [`start_backend`], but waits `delay` before answering.
pub async fn start_slow_backend(name: &'static str, delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(answer(socket, name, delay));
                }
                Err(_) => break,
            }
        }
    });
    addr
}

async fn answer(mut socket: TcpStream, name: &'static str, delay: Duration) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    tokio::time::sleep(delay).await;

    let body = format!("{name}\n{}", String::from_utf8_lossy(&request));
    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Set-Cookie: backend={name}; Path=/\r\n\
         X-Backend: {name}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len(),
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read one HTTP/1.1 request (head plus `Content-Length` body).
async fn read_request(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(buf)
}

/// A router serving on an ephemeral port.
pub struct TestRouter {
    pub addr: SocketAddr,
    pub config_path: PathBuf,
    pub reloader: Arc<Reloader>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Replace the configuration file contents.
    pub fn rewrite_config(&self, contents: &str) {
        std::fs::write(&self.config_path, contents).unwrap();
    }
}

impl Drop for TestRouter {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.config_path);
    }
}

/// Write `config` (TOML) to a temp file and serve it.
pub async fn start_router(config: &str) -> TestRouter {
    start_router_with_drain(config, Duration::from_secs(5)).await
}

pub async fn start_router_with_drain(config: &str, drain: Duration) -> TestRouter {
    start_router_with(config, drain, Arc::new(UuidRequestIds)).await
}

/// Serve `config` with a custom request-ID source.
pub async fn start_router_with(
    config: &str,
    drain: Duration,
    request_ids: Arc<dyn RequestIdProvider>,
) -> TestRouter {
    let config_path =
        std::env::temp_dir().join(format!("ab-router-it-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&config_path, config).unwrap();

    let loaded = load_config(&config_path).unwrap();
    let reloader = Arc::new(Reloader::new(&config_path, loaded).unwrap());
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::with_request_ids(Arc::clone(&reloader), request_ids);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe(), drain));

    TestRouter {
        addr,
        config_path,
        reloader,
        shutdown,
        handle,
    }
}

/// Which mock backend answered.
pub fn backend_name(body: &str) -> &str {
    body.lines().next().unwrap_or_default()
}

/// Build a directive token the way the cooperating producer does.
pub fn directive_token(key: &str, fields: &[u64]) -> String {
    use ab_router::directive::{cipher, radix};

    let encoded: Vec<String> = fields
        .iter()
        .map(|&n| radix::encode(n, radix::Base::MAX))
        .collect();
    let plaintext = serde_json::to_vec(&encoded).unwrap();
    hex::encode(cipher::transform(key.as_bytes(), &plaintext))
}

pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
