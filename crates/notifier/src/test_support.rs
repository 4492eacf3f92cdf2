//! Scripted HTTP endpoint double shared by the sender and broadcast tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One scripted response for a non-auth request. `Hang` keeps the
/// connection open without responding so the client's timeout fires.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ApiStep {
    Ok(&'static str),
    Status(u16),
    Hang,
}

type Steps = Arc<Mutex<VecDeque<ApiStep>>>;

/// reqwest is built with `rustls-tls-webpki-roots-no-provider`, so a
/// CryptoProvider must be installed before any client is constructed.
fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Minimal HTTP server bound to a loopback port.
///
/// `/auth/login` and `/auth/refresh` always succeed with fixed token
/// bodies; every other path consumes the next scripted step. An
/// exhausted script answers 500.
pub(crate) struct ScriptedApi {
    pub base_url: String,
    pub login_hits: Arc<AtomicUsize>,
    pub refresh_hits: Arc<AtomicUsize>,
    pub endpoint_hits: Arc<AtomicUsize>,
}

impl ScriptedApi {
    pub async fn start(steps: Vec<ApiStep>) -> Self {
        install_rustls_provider();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let steps: Steps = Arc::new(Mutex::new(steps.into()));
        let login_hits = Arc::new(AtomicUsize::new(0));
        let refresh_hits = Arc::new(AtomicUsize::new(0));
        let endpoint_hits = Arc::new(AtomicUsize::new(0));

        let api = Self {
            base_url: format!("http://{addr}"),
            login_hits: login_hits.clone(),
            refresh_hits: refresh_hits.clone(),
            endpoint_hits: endpoint_hits.clone(),
        };

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(handle_connection(
                    stream,
                    steps.clone(),
                    login_hits.clone(),
                    refresh_hits.clone(),
                    endpoint_hits.clone(),
                ));
            }
        });

        api
    }
}

/// A loopback URL nothing listens on, for connect-error tests.
pub(crate) async fn unreachable_url() -> String {
    install_rustls_provider();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn handle_connection(
    mut stream: TcpStream,
    steps: Steps,
    login_hits: Arc<AtomicUsize>,
    refresh_hits: Arc<AtomicUsize>,
    endpoint_hits: Arc<AtomicUsize>,
) {
    let Some(path) = read_request(&mut stream).await else {
        return;
    };

    if path == "/auth/login" {
        login_hits.fetch_add(1, Ordering::SeqCst);
        respond(
            &mut stream,
            200,
            r#"{"access_token":"token-a","refresh_token":"refresh-a"}"#,
        )
        .await;
        return;
    }
    if path == "/auth/refresh" {
        refresh_hits.fetch_add(1, Ordering::SeqCst);
        respond(&mut stream, 200, r#"{"access_token":"token-b"}"#).await;
        return;
    }

    endpoint_hits.fetch_add(1, Ordering::SeqCst);
    let step = steps
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(ApiStep::Status(500));
    match step {
        ApiStep::Ok(violation_id) => {
            let body = format!(r#"{{"violation_id":"{violation_id}"}}"#);
            respond(&mut stream, 200, &body).await;
        }
        ApiStep::Status(code) => respond(&mut stream, code, "{}").await,
        ApiStep::Hang => {
            // Park until the client gives up and drops the socket.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

/// Read one request (head plus content-length body), returning its path.
async fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let path = head.split_whitespace().nth(1)?.to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    let mut received = buf.len() - header_end;
    while received < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        received += n;
    }
    Some(path)
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) {
    let response = format!(
        "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;
}
