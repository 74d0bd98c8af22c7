//!
//! lansend HTTP API tests
//! ----------------------
//! Spins up the real router on an ephemeral localhost port and talks to it
//! with a minimal HTTP/1.1 client, so the full request path (routing,
//! extractors, multipart parsing, error mapping) is exercised end to end.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use lansend::config::ShareConfig;
use lansend::server::{router, AppState};
use lansend::upload::UploadLog;

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    // Kept alive for the duration of the test; dropping it removes the share.
    _root: TempDir,
}

async fn spawn_server(configure: impl FnOnce(&mut ShareConfig)) -> TestServer {
    let root = TempDir::new().expect("tempdir");
    let mut config = ShareConfig::new(root.path().to_path_buf());
    configure(&mut config);

    let state = AppState {
        config: Arc::new(config),
        upload_log: Arc::new(UploadLog::new()),
    };
    let app = router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .ok();
    });

    TestServer { addr, state, _root: root }
}

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

async fn send_raw(addr: SocketAddr, request: &[u8]) -> Reply {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request).await.expect("write request");
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let body = raw[split + 4..].to_vec();

    let mut lines = head.lines();
    let status_line = lines.next().expect("status line");
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status code");
    let headers = lines
        .filter_map(|line| {
            line.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    Reply { status, headers, body }
}

async fn get(addr: SocketAddr, target: &str) -> Reply {
    let request = format!(
        "GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
    );
    send_raw(addr, request.as_bytes()).await
}

async fn get_with_range(addr: SocketAddr, target: &str, range: &str) -> Reply {
    let request = format!(
        "GET {target} HTTP/1.1\r\nHost: localhost\r\nRange: {range}\r\nConnection: close\r\n\r\n"
    );
    send_raw(addr, request.as_bytes()).await
}

const BOUNDARY: &str = "lansend-test-boundary";

/// Build a multipart/form-data body. A part with a filename becomes a file
/// part named `file`; the rest are plain text fields.
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn post_upload(addr: SocketAddr, parts: &[(&str, Option<&str>, &[u8])]) -> Reply {
    let body = multipart_body(parts);
    let mut request = format!(
        "POST /upload HTTP/1.1\r\nHost: localhost\r\n\
         Content-Type: multipart/form-data; boundary={BOUNDARY}\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(&body);
    send_raw(addr, &request).await
}

#[tokio::test]
async fn directory_listing_sorts_dirs_first_then_names() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("b.txt"), "b").unwrap();
    std::fs::write(root.join("a.txt"), "a").unwrap();
    std::fs::create_dir(root.join("A")).unwrap();

    let reply = get(server.addr, "/api/directory").await;
    assert_eq!(reply.status, 200);
    let json = reply.json();
    assert_eq!(json["display_name"], "Shared Folder");
    assert_eq!(json["require_password"], false);
    assert_eq!(json["relative_path"], "");
    assert_eq!(json["path_parts"].as_array().unwrap().len(), 0);

    let names: Vec<&str> = json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["A", "a.txt", "b.txt"]);
    assert_eq!(json["items"][0]["is_dir"], true);
}

#[tokio::test]
async fn directory_listing_builds_breadcrumbs_for_subpaths() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::create_dir_all(root.join("docs/reports")).unwrap();

    let reply = get(server.addr, "/api/directory?path=docs/reports").await;
    assert_eq!(reply.status, 200);
    let json = reply.json();
    assert_eq!(json["relative_path"], "docs/reports");
    let parts = json["path_parts"].as_array().unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0]["name"], "docs");
    assert_eq!(parts[0]["path"], "docs");
    assert_eq!(parts[1]["name"], "reports");
    assert_eq!(parts[1]["path"], "docs/reports");
}

#[tokio::test]
async fn traversal_attempts_are_reported_as_not_found() {
    let server = spawn_server(|_| {}).await;

    let reply = get(server.addr, "/api/directory?path=../outside").await;
    assert_eq!(reply.status, 404);
    assert!(reply.json()["error"].is_string());

    let reply = get(server.addr, "/api/download/..%2f..%2fetc%2fpasswd").await;
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn missing_directory_is_not_found() {
    let server = spawn_server(|_| {}).await;
    let reply = get(server.addr, "/api/directory?path=nope").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json()["error"], "Directory not found");
}

#[tokio::test]
async fn tree_endpoint_nests_children() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::create_dir(root.join("sub")).unwrap();
    std::fs::write(root.join("sub/inner.txt"), "x").unwrap();

    let reply = get(server.addr, "/api/tree").await;
    assert_eq!(reply.status, 200);
    let json = reply.json();
    let tree = json["tree"].as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["name"], "sub");
    assert_eq!(tree[0]["is_dir"], true);
    assert_eq!(tree[0]["children"][0]["name"], "inner.txt");
    assert_eq!(tree[0]["children"][0]["path"], "sub/inner.txt");
}

#[tokio::test]
async fn preview_serves_ranges_and_full_bodies() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("data.txt"), "hello world").unwrap();

    let reply = get(server.addr, "/api/preview/data.txt").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("accept-ranges"), Some("bytes"));
    assert_eq!(reply.body, b"hello world");

    let reply = get_with_range(server.addr, "/api/preview/data.txt", "bytes=0-4").await;
    assert_eq!(reply.status, 206);
    assert_eq!(reply.header("content-range"), Some("bytes 0-4/11"));
    assert_eq!(reply.body, b"hello");

    let reply = get_with_range(server.addr, "/api/preview/data.txt", "bytes=-5").await;
    assert_eq!(reply.status, 206);
    assert_eq!(reply.body, b"world");
}

#[tokio::test]
async fn unsatisfiable_range_reports_total_size() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("data.txt"), "hello world").unwrap();

    let reply = get_with_range(server.addr, "/api/preview/data.txt", "bytes=100-200").await;
    assert_eq!(reply.status, 416);
    assert_eq!(reply.header("content-range"), Some("bytes */11"));
}

#[tokio::test]
async fn download_attaches_content_disposition() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("report.pdf"), "pdf bytes").unwrap();

    let reply = get(server.addr, "/api/download/report.pdf").await;
    assert_eq!(reply.status, 200);
    assert_eq!(
        reply.header("content-disposition"),
        Some("attachment; filename=\"report.pdf\"")
    );
    assert_eq!(reply.body, b"pdf bytes");
}

#[tokio::test]
async fn download_disabled_hides_files() {
    let server = spawn_server(|c| c.allow_download = false).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("secret.txt"), "x").unwrap();

    let reply = get(server.addr, "/api/download/secret.txt").await;
    assert_eq!(reply.status, 404);

    // Preview is not gated by the download switch.
    let reply = get(server.addr, "/api/preview/secret.txt").await;
    assert_eq!(reply.status, 200);
}

#[tokio::test]
async fn preview_json_distinguishes_text_image_and_binary() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("note.txt"), "plain text").unwrap();
    std::fs::write(root.join("pic.PNG"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
    std::fs::write(root.join("blob.bin"), [0xffu8, 0xfe, 0x00, 0x01]).unwrap();

    let json = get(server.addr, "/api/file/note.txt").await.json();
    assert_eq!(json["content"], "plain text");
    assert_eq!(json["is_image"], false);

    let json = get(server.addr, "/api/file/pic.PNG").await.json();
    assert_eq!(json["is_image"], true);
    assert!(json.get("content").is_none());

    let json = get(server.addr, "/api/file/blob.bin").await.json();
    assert_eq!(json["is_binary"], true);
    assert_eq!(json["error"], "Binary file cannot be displayed");
}

#[tokio::test]
async fn upload_stores_file_and_reports_name() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();

    let reply = post_upload(
        server.addr,
        &[
            ("path", None, b""),
            ("file", Some("notes.txt"), b"uploaded bytes"),
        ],
    )
    .await;
    assert_eq!(reply.status, 200);
    let json = reply.json();
    assert_eq!(json["message"], "file uploaded");
    assert_eq!(json["filename"], "notes.txt");
    assert_eq!(json["renamed"], false);

    let stored = std::fs::read(root.join("notes.txt")).unwrap();
    assert_eq!(stored, b"uploaded bytes");
    assert_eq!(server.state.upload_log.lines_written(), 1);
}

#[tokio::test]
async fn colliding_upload_gets_numeric_suffix() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();
    std::fs::write(root.join("a.txt"), "first").unwrap();

    let reply = post_upload(server.addr, &[("file", Some("a.txt"), b"second")]).await;
    assert_eq!(reply.status, 200);
    let json = reply.json();
    assert_eq!(json["filename"], "a_1.txt");
    assert_eq!(json["renamed"], true);

    assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"first");
    assert_eq!(std::fs::read(root.join("a_1.txt")).unwrap(), b"second");
}

#[tokio::test]
async fn upload_without_required_password_is_rejected() {
    let server = spawn_server(|c| c.upload_password = Some("sesame".to_string())).await;
    let root = server.state.config.shared_root.clone();

    let reply = post_upload(server.addr, &[("file", Some("x.txt"), b"data")]).await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.json()["error"], "upload password required");
    assert!(!root.join("x.txt").exists());
    assert_eq!(server.state.upload_log.lines_written(), 1);
}

#[tokio::test]
async fn upload_with_wrong_password_is_rejected() {
    let server = spawn_server(|c| c.upload_password = Some("sesame".to_string())).await;
    let root = server.state.config.shared_root.clone();

    let reply = post_upload(
        server.addr,
        &[
            ("password", None, b"nope"),
            ("file", Some("x.txt"), b"data"),
        ],
    )
    .await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.json()["error"], "wrong password");
    assert!(!root.join("x.txt").exists());
}

#[tokio::test]
async fn upload_with_correct_password_succeeds() {
    let server = spawn_server(|c| c.upload_password = Some("sesame".to_string())).await;
    let root = server.state.config.shared_root.clone();

    let reply = post_upload(
        server.addr,
        &[
            ("password", None, b"sesame"),
            ("file", Some("x.txt"), b"data"),
        ],
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json()["message"], "file uploaded");
    assert_eq!(std::fs::read(root.join("x.txt")).unwrap(), b"data");
}

#[tokio::test]
async fn password_probe_never_touches_disk_or_log() {
    let server = spawn_server(|c| c.upload_password = Some("sesame".to_string())).await;

    let reply = post_upload(server.addr, &[("password", None, b"wrong")]).await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.json()["error"], "wrong password");
    assert_eq!(server.state.upload_log.lines_written(), 0);

    let reply = post_upload(server.addr, &[("password", None, b"sesame")]).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json()["message"], "password ok");
    assert_eq!(server.state.upload_log.lines_written(), 0);
}

#[tokio::test]
async fn probe_without_configured_password_is_a_client_error() {
    let server = spawn_server(|_| {}).await;
    let reply = post_upload(server.addr, &[("password", None, b"anything")]).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["error"], "upload password not set");
}

#[tokio::test]
async fn upload_to_missing_directory_is_a_client_error() {
    let server = spawn_server(|_| {}).await;
    let reply = post_upload(
        server.addr,
        &[
            ("path", None, b"nowhere"),
            ("file", Some("x.txt"), b"data"),
        ],
    )
    .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["error"], "target directory not found");
    assert_eq!(server.state.upload_log.lines_written(), 1);
}

#[tokio::test]
async fn upload_without_file_part_is_a_client_error() {
    let server = spawn_server(|_| {}).await;
    let reply = post_upload(server.addr, &[("path", None, b"")]).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["error"], "missing file");
}

#[tokio::test]
async fn upload_disabled_rejects_everything() {
    let server = spawn_server(|c| c.allow_upload = false).await;
    let reply = post_upload(server.addr, &[("file", Some("x.txt"), b"data")]).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["error"], "upload disabled");
}

#[tokio::test]
async fn uploaded_filenames_are_sanitized() {
    let server = spawn_server(|_| {}).await;
    let root = server.state.config.shared_root.clone();

    let reply = post_upload(
        server.addr,
        &[("file", Some("we<ird>:name?.txt"), b"data")],
    )
    .await;
    assert_eq!(reply.status, 200);
    let json = reply.json();
    assert_eq!(json["filename"], "weirdname.txt");
    assert!(root.join("weirdname.txt").exists());
}
