//! DockerClient against a fake daemon on a temporary socket

use dockwire_client::{ApiVersion, ClientConfig, ClientError, DockerClient, DockerConfigFile};
use http::StatusCode;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

struct FakeDaemon {
    _tmp: TempDir,
    socket: PathBuf,
    seen: Arc<Mutex<Vec<String>>>,
}

impl FakeDaemon {
    fn start() -> Self {
        let tmp = TempDir::new().unwrap();
        let socket = tmp.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let log = Arc::clone(&log);
                thread::spawn(move || serve(stream, log));
            }
        });

        Self { _tmp: tmp, socket, seen }
    }

    fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: format!("unix://{}", self.socket.display()),
            ..ClientConfig::default()
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

fn serve(stream: UnixStream, seen: Arc<Mutex<Vec<String>>>) {
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
            return;
        }
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                break;
            }
        }

        let target = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
        seen.lock().unwrap().push(target.clone());

        let (status, body) = route(&target);
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        if writer.write_all(response.as_bytes()).is_err() {
            return;
        }
    }
}

fn route(target: &str) -> (&'static str, String) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let Some(endpoint) = path.strip_prefix("/v1.45").or_else(|| path.strip_prefix("/v1.24")) else {
        return ("400 Bad Request", r#"{"message":"unversioned request"}"#.to_string());
    };

    match endpoint {
        "/_ping" => ("200 OK", "OK".to_string()),
        "/version" => ("200 OK", r#"{"Version":"27.1.1","ApiVersion":"1.46"}"#.to_string()),
        "/info" => ("200 OK", r#"{"ID":"abc","Name":"fake-daemon","Containers":2}"#.to_string()),
        "/containers/json" if query.contains("all=1") => (
            "200 OK",
            r#"[{"Id":"a1","State":"running"},{"Id":"b2","State":"exited"}]"#.to_string(),
        ),
        "/containers/json" => ("200 OK", r#"[{"Id":"a1","State":"running"}]"#.to_string()),
        "/system/df" => (
            "200 OK",
            r#"{"LayersSize":0,"Images":[],"Containers":[],"Volumes":[]}"#.to_string(),
        ),
        other => (
            "404 Not Found",
            format!(r#"{{"message":"page not found: {}"}}"#, other),
        ),
    }
}

#[test]
fn test_ping() {
    let daemon = FakeDaemon::start();
    let client = DockerClient::new(daemon.config()).unwrap();
    assert!(client.ping().unwrap());
    assert_eq!(daemon.seen(), vec!["/v1.45/_ping".to_string()]);
}

#[test]
fn test_version_and_info() {
    let daemon = FakeDaemon::start();
    let client = DockerClient::new(daemon.config()).unwrap();

    let version = client.version().unwrap();
    assert_eq!(version["Version"], "27.1.1");

    let info = client.info().unwrap();
    assert!(info.get("ID").is_some());
    assert_eq!(info["Name"], "fake-daemon");
}

#[test]
fn test_containers_all_flag() {
    let daemon = FakeDaemon::start();
    let client = DockerClient::new(daemon.config()).unwrap();

    assert_eq!(client.containers(false).unwrap().len(), 1);
    assert_eq!(client.containers(true).unwrap().len(), 2);
}

#[test]
fn test_df_on_supported_version() {
    let daemon = FakeDaemon::start();
    let client = DockerClient::new(daemon.config()).unwrap();

    let df = client.df().unwrap();
    for key in ["LayersSize", "Containers", "Volumes", "Images"] {
        assert!(df.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn test_df_on_old_version_never_reaches_daemon() {
    let daemon = FakeDaemon::start();
    let config = ClientConfig {
        version: ApiVersion::new(1, 24),
        ..daemon.config()
    };
    let client = DockerClient::new(config).unwrap();

    assert!(client.ping().unwrap());
    let err = client.df().unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
    assert_eq!(daemon.seen(), vec!["/v1.24/_ping".to_string()]);
}

#[test]
fn test_unknown_endpoint_is_api_error() {
    let daemon = FakeDaemon::start();
    let client = DockerClient::new(daemon.config()).unwrap();

    let err = client.get_json::<serde_json::Value>("/plugins/missing/json").unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(err.to_string().contains("page not found"));
}

#[test]
fn test_requests_share_one_connection() {
    let daemon = FakeDaemon::start();
    let client = DockerClient::new(daemon.config()).unwrap();

    client.ping().unwrap();
    client.info().unwrap();
    client.version().unwrap();
    assert_eq!(daemon.seen().len(), 3);
}

#[test]
fn test_missing_daemon_is_connection_error() {
    let tmp = TempDir::new().unwrap();
    let config = ClientConfig {
        base_url: format!("unix://{}", tmp.path().join("absent.sock").display()),
        ..ClientConfig::default()
    };
    let client = DockerClient::new(config).unwrap();

    let err = client.ping().unwrap_err();
    assert!(err.is_connection_error(), "unexpected error: {err}");
}

fn install_helper(dir: &Path, name: &str, script: &str) {
    let path = dir.join(format!("docker-credential-{}", name));
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn test_registry_credentials_through_helper() {
    let bin = TempDir::new().unwrap();
    install_helper(
        bin.path(),
        "dockwiretest",
        "#!/bin/sh\nread server\nif [ \"$server\" = \"quay.io\" ]; then\n  printf '{\"ServerURL\":\"quay.io\",\"Username\":\"robot\",\"Secret\":\"tok\"}'\nelse\n  echo 'credentials not found in native keychain'\n  exit 1\nfi\n",
    );

    let mut dirs = vec![bin.path().to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&existing));
    }
    let path = std::env::join_paths(dirs).unwrap().into_string().unwrap();

    let client = DockerClient::new(ClientConfig {
        base_url: "unix:///nonexistent/docker.sock".to_string(),
        ..ClientConfig::default()
    })
    .unwrap()
    .with_credstore_env(HashMap::from([("PATH".to_string(), path)]));
    let docker_config =
        DockerConfigFile::from_json_str(r#"{"credHelpers":{"quay.io":"dockwiretest"}}"#).unwrap();

    let creds = client.registry_credentials("quay.io", &docker_config).unwrap().unwrap();
    assert_eq!(creds.username, "robot");
    assert_eq!(creds.secret, "tok");

    let global = DockerConfigFile::from_json_str(r#"{"credsStore":"dockwiretest"}"#).unwrap();
    assert!(client.registry_credentials("gcr.io", &global).unwrap().is_none());
}
