//! End-to-end tests for the pooled adapter against a fake daemon socket

use dockwire_transport::{AdapterConfig, TransportError, UnixHttpAdapter};
use http::{Request, StatusCode};
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Serves canned keep-alive responses on a temporary socket
struct FakeDaemon {
    _tmp: TempDir,
    socket: PathBuf,
    accepted: Arc<AtomicUsize>,
}

impl FakeDaemon {
    fn start() -> Self {
        let tmp = TempDir::new().unwrap();
        let socket = tmp.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                thread::spawn(move || serve(stream));
            }
        });

        Self {
            _tmp: tmp,
            socket,
            accepted,
        }
    }

    fn url(&self) -> String {
        format!("http+unix://{}", self.socket.display())
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

fn serve(stream: UnixStream) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
            return;
        }
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                return;
            }
            if line == "\r\n" {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let mut body = vec![0u8; content_length];
        if reader.read_exact(&mut body).is_err() {
            return;
        }

        let target = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
        let response = match target.as_str() {
            "/_ping" => {
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK".to_string()
            }
            "/chunked" => {
                "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\n[1,\r\n3\r\n2,3\r\n1\r\n]\r\n0\r\n\r\n".to_string()
            }
            "/echo" => format!(
                "HTTP/1.1 201 Created\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                String::from_utf8_lossy(&body)
            ),
            "/bye" => {
                "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 3\r\n\r\nbye".to_string()
            }
            _ => {
                let msg = format!("{{\"message\":\"page not found: {}\"}}", target);
                format!("HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\n\r\n{}", msg.len(), msg)
            }
        };
        if writer.write_all(response.as_bytes()).is_err() {
            return;
        }
        if target == "/bye" {
            return;
        }
    }
}

fn get(path: &str) -> Request<Vec<u8>> {
    Request::get(format!("http+docker://localhost{}", path))
        .body(Vec::new())
        .unwrap()
}

#[test]
fn test_send_reads_content_length_response() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();

    let response = adapter.send(get("/_ping")).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), b"OK");
}

#[test]
fn test_send_reads_chunked_response() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();

    let response = adapter.send(get("/chunked")).unwrap();
    assert_eq!(response.body(), b"[1,2,3]");
}

#[test]
fn test_send_posts_body() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();

    let request = Request::post("http+docker://localhost/echo")
        .header("Content-Type", "application/json")
        .body(br#"{"Image":"alpine"}"#.to_vec())
        .unwrap();
    let response = adapter.send(request).unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.body(), br#"{"Image":"alpine"}"#);
}

#[test]
fn test_error_status_is_returned_not_raised() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();

    let response = adapter.send(get("/nope")).unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_keep_alive_connection_is_reused() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();

    for _ in 0..3 {
        adapter.send(get("/_ping")).unwrap();
    }
    assert_eq!(daemon.accepted(), 1);

    let stats = adapter.get_connection_pool("http+docker://localhost").stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.lent, 0);
}

#[test]
fn test_connection_close_response_is_not_pooled() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();

    let response = adapter.send(get("/bye")).unwrap();
    assert_eq!(response.body(), b"bye");
    assert_eq!(adapter.get_connection_pool("http+docker://localhost").stats().idle, 0);

    adapter.send(get("/_ping")).unwrap();
    assert_eq!(daemon.accepted(), 2);
}

#[test]
fn test_evicted_pool_closes_its_connections() {
    let tmp = TempDir::new().unwrap();
    let socket = tmp.path().join("evict.sock");
    let listener = UnixListener::bind(&socket).unwrap();

    let config = AdapterConfig {
        pool_connections: 1,
        timeout: Some(Duration::from_secs(5)),
        ..AdapterConfig::default()
    };
    let adapter = UnixHttpAdapter::with_socket_path(&socket, config);

    let pool_a = adapter.get_connection_pool("http+docker://a");
    pool_a.acquire().unwrap().release();
    let (mut server_side, _) = listener.accept().unwrap();
    server_side.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(pool_a.stats().idle, 1);

    let _pool_b = adapter.get_connection_pool("http+docker://b");
    assert!(pool_a.is_closed());
    assert_eq!(pool_a.stats().idle, 0);

    let mut buf = [0u8; 1];
    assert_eq!(server_side.read(&mut buf).unwrap(), 0, "peer should see EOF");
}

#[test]
fn test_missing_socket_is_connection_error() {
    let tmp = TempDir::new().unwrap();
    let adapter =
        UnixHttpAdapter::with_socket_path(tmp.path().join("absent.sock"), AdapterConfig::default());

    let err = adapter.send(get("/_ping")).unwrap_err();
    assert!(err.is_connection_error());
    assert!(matches!(err, TransportError::Connect { .. }));
}

#[test]
fn test_close_shuts_down_adapter() {
    let daemon = FakeDaemon::start();
    let adapter = UnixHttpAdapter::new(&daemon.url(), AdapterConfig::default()).unwrap();
    adapter.send(get("/_ping")).unwrap();

    let pool = adapter.get_connection_pool("http+docker://localhost");
    adapter.close();
    assert!(pool.is_closed());
    assert_eq!(adapter.pool_count(), 0);
}
