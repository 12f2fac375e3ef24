//! Shared fixtures for integration tests
//!
//! A minimal in-process HTTP server serving canned responses on a loopback
//! port, with per-path hit counting so tests can assert exactly which
//! transfers were issued. Bodies can be dripped in delayed chunks to
//! exercise partial-content parsing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// One canned response
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// Serve the body in pieces of this size when set
    pub chunk_size: Option<usize>,
    /// Pause between pieces
    pub chunk_delay: Duration,
    /// Whether to send Content-Length
    pub declare_length: bool,
}

impl Route {
    pub fn javascript(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "application/javascript".to_string(),
            body: body.as_bytes().to_vec(),
            chunk_size: None,
            chunk_delay: Duration::ZERO,
            declare_length: true,
        }
    }

    pub fn binary(content_type: &str, body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body: body.to_vec(),
            chunk_size: None,
            chunk_delay: Duration::ZERO,
            declare_length: true,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain".to_string(),
            body: b"not found".to_vec(),
            chunk_size: None,
            chunk_delay: Duration::ZERO,
            declare_length: true,
        }
    }

    /// Drip the body in `size`-byte pieces with `delay` between them
    pub fn chunked(mut self, size: usize, delay: Duration) -> Self {
        self.chunk_size = Some(size);
        self.chunk_delay = delay;
        self
    }

    /// Omit Content-Length; the body is delimited by connection close
    pub fn without_length(mut self) -> Self {
        self.declare_length = false;
        self
    }
}

/// In-process HTTP fixture server
pub struct FixtureServer {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FixtureServer {
    /// Bind a loopback port and start serving
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture server");
        let addr = listener.local_addr().expect("fixture server addr");
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::new(Mutex::new(HashMap::new()));
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        let task_routes = routes.clone();
        let task_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = task_routes.clone();
                let hits = task_hits.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, routes, hits).await;
                });
            }
        });

        Self { addr, routes, hits }
    }

    /// Register (or replace) a canned response
    pub fn route(&self, path: &str, route: Route) {
        self.routes
            .lock()
            .expect("route table poisoned")
            .insert(path.to_string(), route);
    }

    /// Absolute URL for a path on this server
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).expect("fixture url")
    }

    /// How many requests hit a path
    pub fn hits(&self, path: &str) -> usize {
        self.hits
            .lock()
            .expect("hit table poisoned")
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Total requests served
    pub fn total_hits(&self) -> usize {
        self.hits.lock().expect("hit table poisoned").values().sum()
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
) -> std::io::Result<()> {
    let path = {
        let mut reader = BufReader::new(&mut stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        // Drain the request headers
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;
            if n == 0 || line == "\r\n" || line == "\n" {
                break;
            }
        }

        request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string()
    };

    *hits
        .lock()
        .expect("hit table poisoned")
        .entry(path.clone())
        .or_insert(0) += 1;

    let route = {
        let routes = routes.lock().expect("route table poisoned");
        routes.get(&path).cloned().unwrap_or_else(Route::not_found)
    };

    let reason = if route.status == 404 { "Not Found" } else { "OK" };
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nConnection: close\r\n",
        route.status, reason, route.content_type
    );
    if route.declare_length {
        head.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;

    match route.chunk_size {
        None => stream.write_all(&route.body).await?,
        Some(size) => {
            for piece in route.body.chunks(size.max(1)) {
                stream.write_all(piece).await?;
                stream.flush().await?;
                tokio::time::sleep(route.chunk_delay).await;
            }
        }
    }
    stream.flush().await?;
    Ok(())
}
