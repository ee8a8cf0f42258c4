//! Upstream client integration tests
//!
//! Exercises the pooled respond path against a local stub HTTP server:
//! - Successful calls decode the body and record success on the
//!   checked-out connection
//! - Error statuses surface as upstream errors and count against the
//!   connection's health
//! - Transport-level send failures are retried a bounded number of times

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use palaver_core::config::UpstreamConfig;
use palaver_core::upstream::{InputItem, ResponseRequest, UpstreamClient};
use palaver_core::Error;

const OK_BODY: &str = r#"{"id":"resp_1","status":"completed","output_text":"hello","usage":{"input_tokens":1,"output_tokens":2,"total_tokens":3}}"#;

fn stub_config(addr: SocketAddr, retry_attempts: u32) -> UpstreamConfig {
    UpstreamConfig {
        api_key: Some("sk-test".to_string()),
        base_url: format!("http://{addr}"),
        pool_size: 1,
        request_timeout_secs: 5,
        retry_attempts,
        ..Default::default()
    }
}

fn request() -> ResponseRequest {
    ResponseRequest {
        input: vec![InputItem::user("hi")],
        ..Default::default()
    }
}

fn content_length(headers: &str) -> usize {
    headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

/// Read one full HTTP request (headers plus content-length body).
async fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let body_start = end + 4;
            let needed = content_length(&String::from_utf8_lossy(&buf[..end]));
            if buf.len() - body_start >= needed {
                break;
            }
        }
    }
    buf
}

async fn write_response(stream: &mut TcpStream, status_line: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();
}

/// Serve the same canned response to every connection, counting hits.
async fn spawn_stub(
    status_line: &'static str,
    body: &'static str,
) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut stream).await;
            write_response(&mut stream, status_line, body).await;
        }
    });
    (addr, hits)
}

mod respond_tests {
    use super::*;

    #[tokio::test]
    async fn test_success_decodes_body_and_records_health() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut stream).await;
            write_response(&mut stream, "200 OK", OK_BODY).await;
            String::from_utf8_lossy(&raw).into_owned()
        });

        let client = UpstreamClient::new(stub_config(addr, 0)).unwrap();
        let body = client.respond(request()).await.unwrap();
        assert_eq!(body.id, "resp_1");
        assert_eq!(body.output_text.as_deref(), Some("hello"));
        assert_eq!(body.usage.unwrap().total_tokens, 3);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /responses "), "unexpected request line: {raw}");
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        // The configured default model is filled in when the request names none.
        assert!(raw.contains(r#""model":"gpt-4o""#));

        let guard = client.pool().acquire().await.unwrap();
        let stats = guard.stats();
        assert_eq!(stats.request_count, 1);
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn test_error_status_surfaces_and_records_error() {
        let (addr, hits) = spawn_stub("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let client = UpstreamClient::new(stub_config(addr, 0)).unwrap();

        let err = client.respond(request()).await.unwrap_err();
        match err {
            Error::Upstream(msg) => assert!(msg.contains("500"), "message lacks status: {msg}"),
            other => panic!("expected Upstream, got {other}"),
        }
        // An HTTP error status is not a transport failure: no retry.
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let guard = client.pool().acquire().await.unwrap();
        let stats = guard.stats();
        assert_eq!(stats.request_count, 0);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.consecutive_errors, 1);
    }
}

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_failure_attempts_are_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            // Every accepted connection is dropped without a response, so
            // each send fails at the transport level.
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let client = UpstreamClient::new(stub_config(addr, 2)).unwrap();
        let err = client.respond(request()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        // The initial attempt plus the configured retries, then give up.
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let guard = client.pool().acquire().await.unwrap();
        assert_eq!(guard.stats().consecutive_errors, 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // First connection dropped without a response; the retry is served.
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            write_response(&mut stream, "200 OK", OK_BODY).await;
        });

        let client = UpstreamClient::new(stub_config(addr, 2)).unwrap();
        let body = client.respond(request()).await.unwrap();
        assert_eq!(body.id, "resp_1");

        let guard = client.pool().acquire().await.unwrap();
        let stats = guard.stats();
        assert_eq!(stats.request_count, 1);
        assert_eq!(stats.consecutive_errors, 0);
    }
}
