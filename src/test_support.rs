//! Local HTTP server serving canned responses for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

#[derive(Clone)]
pub struct Route {
    path: String,
    status: u16,
    body: Vec<u8>,
    content_length: Option<usize>,
}

impl Route {
    pub fn ok(path: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::status(path, 200, body)
    }

    pub fn status(path: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Route {
            path: path.to_string(),
            status,
            body: body.into(),
            content_length: None,
        }
    }

    /// Declares `content_length` bytes but closes the connection after `body`.
    pub fn truncated(path: &str, body: impl Into<Vec<u8>>, content_length: usize) -> Self {
        Route {
            content_length: Some(content_length),
            ..Self::ok(path, body)
        }
    }
}

pub struct TestServer {
    base: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Request targets (path and query) in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serves `routes`, matched on the request path without its query string.
/// Unknown paths get a 404.
pub async fn serve(routes: Vec<Route>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let server_hits = Arc::clone(&hits);
    let server_requests = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };

            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }

            let request = String::from_utf8_lossy(&buf).to_string();
            let target = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .to_string();
            let path = target.split('?').next().unwrap_or("/").to_string();

            server_hits.fetch_add(1, Ordering::SeqCst);
            server_requests.lock().unwrap().push(target);

            let (status, body, content_length) = routes
                .iter()
                .find(|r| r.path == path)
                .map(|r| (r.status, r.body.clone(), r.content_length))
                .unwrap_or((404, b"Error {\n    code=404;\n}".to_vec(), None));

            let head = format!(
                "HTTP/1.1 {} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_length.unwrap_or(body.len())
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
    });

    TestServer {
        base,
        hits,
        requests,
    }
}

/// Client whose endpoints all point at `server` and whose cache lives in `cache_dir`.
pub fn test_client(server: &TestServer, cache_dir: &std::path::Path) -> crate::NoaaClient {
    let config = crate::Config::default()
        .with_cache_dir(cache_dir)
        .with_erddap_url(&server.url("/erddap/"))
        .with_endpoints(crate::config::Endpoints::all_at(&server.base))
        .with_legacy_token("test-token");
    crate::NoaaClient::new(config).unwrap()
}
