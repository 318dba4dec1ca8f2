//! `HttpFetcher` against a local HTTP server

use pad_lane_demo::{AssetFetcher, AssetSource, HttpFetcher};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const HTML: &str = "text/html; charset=utf-8";
const BINARY: &str = "application/octet-stream";

/// Canned response: status line, content type, body
type Reply = (&'static str, &'static str, &'static [u8]);

/// Local server answering each request with `route(request_target)`
struct TestServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    async fn start<F>(route: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&request);
                let target = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                seen.lock().unwrap().push(target.clone());

                let (status, content_type, body) = route(&target);
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
                     Connection: close\r\n\r\n",
                    status,
                    content_type,
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { base, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn drive_fetcher(&self) -> HttpFetcher {
        HttpFetcher::new(None, false)
            .unwrap()
            .with_drive_endpoint(self.url("/uc"))
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_fetch_writes_body_to_destination() {
    let server = TestServer::start(|_| ("200 OK", BINARY, b"checkpoint bytes".as_slice())).await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("checkpoints/model.pt");

    let fetcher = HttpFetcher::new(None, false).unwrap();
    fetcher
        .fetch(&AssetSource::url(server.url("/model.pt")), &destination)
        .await
        .unwrap();

    assert_eq!(fs::read(&destination).unwrap(), b"checkpoint bytes");
    assert_eq!(entries(&dir.path().join("checkpoints")), vec!["model.pt"]);
}

#[tokio::test]
async fn test_http_error_leaves_no_file() {
    let server =
        TestServer::start(|_| ("404 Not Found", "text/plain", b"missing".as_slice())).await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("model.pt");

    let fetcher = HttpFetcher::new(None, false).unwrap();
    let err = fetcher
        .fetch(&AssetSource::url(server.url("/model.pt")), &destination)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("404"));
    assert!(entries(dir.path()).is_empty());
}

#[tokio::test]
async fn test_html_page_from_plain_url_is_rejected() {
    let server = TestServer::start(|_| ("200 OK", HTML, b"<html>sign in</html>".as_slice())).await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("model.pt");

    let fetcher = HttpFetcher::new(None, false).unwrap();
    let err = fetcher
        .fetch(&AssetSource::url(server.url("/model.pt")), &destination)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("HTML page"));
    assert!(entries(dir.path()).is_empty());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_drive_confirmation_page_is_retried() {
    let server = TestServer::start(|target| {
        if target.contains("confirm=t") {
            ("200 OK", BINARY, b"erfnet weights".as_slice())
        } else {
            ("200 OK", HTML, b"<html>can't scan this file for viruses</html>".as_slice())
        }
    })
    .await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("checkpoints/erfnet.pt");

    server
        .drive_fetcher()
        .fetch(&AssetSource::google_drive("16-Q_jZY"), &destination)
        .await
        .unwrap();

    assert_eq!(fs::read(&destination).unwrap(), b"erfnet weights");
    assert_eq!(
        server.requests(),
        vec![
            "/uc?id=16-Q_jZY&export=download".to_string(),
            "/uc?id=16-Q_jZY&export=download&confirm=t".to_string(),
        ]
    );
    assert_eq!(entries(&dir.path().join("checkpoints")), vec!["erfnet.pt"]);
}

#[tokio::test]
async fn test_drive_file_without_confirmation_page_is_fetched_once() {
    let server = TestServer::start(|_| ("200 OK", BINARY, b"small file".as_slice())).await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("small.pt");

    server
        .drive_fetcher()
        .fetch(&AssetSource::google_drive("small"), &destination)
        .await
        .unwrap();

    assert_eq!(fs::read(&destination).unwrap(), b"small file");
    assert_eq!(server.requests(), vec!["/uc?id=small&export=download".to_string()]);
}

#[tokio::test]
async fn test_drive_sign_in_page_is_never_saved() {
    let server =
        TestServer::start(|_| ("200 OK", HTML, b"<html>sign in to continue</html>".as_slice()))
            .await;
    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("checkpoints/erfnet.pt");

    let err = server
        .drive_fetcher()
        .fetch(&AssetSource::google_drive("private"), &destination)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("not publicly downloadable"));
    assert!(!destination.exists());
    assert!(entries(&dir.path().join("checkpoints")).is_empty());

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].ends_with("&confirm=t"));
}
