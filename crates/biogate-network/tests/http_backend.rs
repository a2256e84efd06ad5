//! Integration tests for the HTTP backend and the embedding service client.
//!
//! Each test spawns a canned HTTP responder on a local port: one response
//! per accepted connection, with every request captured for inspection.

use biogate_core::{AuthOutcome, ErrorKind, FaceEmbedding, SlotId};
use biogate_hardware::{FaceEmbedder, HardwareError, ImageFrame};
use biogate_network::encoding::encode_vector;
use biogate_network::{
    BackendGateway, GatewayError, HttpBackend, HttpBackendConfig, RetryPolicy, ServiceEmbedder,
    ServiceEmbedderConfig,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// One captured request: request line plus raw body.
#[derive(Debug)]
struct Captured {
    request_line: String,
    body: String,
}

async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    Captured {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string(),
    }
}

/// Serve `responses` in order, one per connection.
async fn responder(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            captured.push(read_request(&mut stream).await);
            let response = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        captured
    });

    (format!("http://{addr}"), handle)
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
    }
}

fn backend(base_url: String, max_attempts: u32) -> HttpBackend {
    HttpBackend::new(HttpBackendConfig {
        base_url,
        timeout: Duration::from_secs(2),
        retry: fast_retry(max_attempts),
    })
    .unwrap()
}

fn embedder(url: String) -> ServiceEmbedder {
    ServiceEmbedder::new(ServiceEmbedderConfig {
        url: format!("{url}/encode"),
        timeout: Duration::from_secs(2),
        capture_name: "capture".to_string(),
        retry: fast_retry(1),
    })
    .unwrap()
}

fn reference() -> Vec<f32> {
    (0..512).map(|i| (i % 7) as f32 * 0.1).collect()
}

#[tokio::test]
async fn test_fetch_embedding() {
    let body = format!(r#"{{"encoding":"{}"}}"#, encode_vector(&reference()));
    let (url, server) = responder(vec![(200, body)]).await;

    let fetched = backend(url, 1)
        .fetch_embedding(SlotId::from_raw(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, FaceEmbedding::new(reference()).unwrap());

    let requests = server.await.unwrap();
    assert_eq!(requests[0].request_line, "GET /api/user-encoding/7 HTTP/1.1");
}

#[tokio::test]
async fn test_fetch_missing_reference() {
    let (url, server) = responder(vec![
        (404, r#"{"error":"not found"}"#.to_string()),
        (200, r#"{"encoding":""}"#.to_string()),
        (200, "{}".to_string()),
    ])
    .await;
    let backend = backend(url, 1);

    for slot in [1, 2, 3] {
        let fetched = backend.fetch_embedding(SlotId::from_raw(slot)).await.unwrap();
        assert!(fetched.is_none(), "slot {slot} should have no reference");
    }
    assert_eq!(server.await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_fetch_wrong_dimension_is_shape_mismatch() {
    let short: Vec<f32> = vec![0.5; 128];
    let body = format!(r#"{{"encoding":"{}"}}"#, encode_vector(&short));
    let (url, _server) = responder(vec![(200, body)]).await;

    let err = backend(url, 1)
        .fetch_embedding(SlotId::from_raw(4))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
}

#[tokio::test]
async fn test_fetch_retries_server_errors() {
    let body = format!(r#"{{"encoding":"{}"}}"#, encode_vector(&reference()));
    let (url, server) = responder(vec![
        (503, "unavailable".to_string()),
        (500, "oops".to_string()),
        (200, body),
    ])
    .await;

    let fetched = backend(url, 3).fetch_embedding(SlotId::from_raw(7)).await.unwrap();
    assert!(fetched.is_some());
    assert_eq!(server.await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_submit_outcome_posts_log() {
    let (url, server) = responder(vec![(201, r#"{"ok":true}"#.to_string())]).await;
    let attempt_id = Uuid::new_v4();
    let outcome = AuthOutcome::new(attempt_id, SlotId::from_raw(7), true, 0.6);

    backend(url, 1).submit_outcome(&outcome).await.unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests[0].request_line, "POST /api/log-auth HTTP/1.1");
    let json: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(json["fingerprint_id"], 7);
    assert_eq!(json["result"], "granted");
    assert_eq!(json["distance"], 0.6);
    assert_eq!(json["attempt_id"], attempt_id.to_string());
}

#[tokio::test]
async fn test_submit_client_error_not_retried() {
    let (url, server) = responder(vec![(400, "bad".to_string())]).await;
    let outcome = AuthOutcome::new(Uuid::new_v4(), SlotId::from_raw(2), false, 1.3);

    let err = backend(url, 3).submit_outcome(&outcome).await.unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 400, .. }));
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert_eq!(server.await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = backend(format!("http://{addr}"), 2)
        .fetch_embedding(SlotId::from_raw(1))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn test_embedder_returns_face() {
    let body = format!(
        r#"{{"success":true,"message":"ok","data":{{"encoding":"{}","embedding_length":512}}}}"#,
        encode_vector(&reference())
    );
    let (url, server) = responder(vec![(200, body)]).await;
    let mut embedder = embedder(url);

    let faces = embedder
        .embeddings(&ImageFrame::new(b"JPEG".to_vec()))
        .await
        .unwrap();
    assert_eq!(faces, vec![reference()]);

    let requests = server.await.unwrap();
    assert_eq!(requests[0].request_line, "POST /encode HTTP/1.1");
    assert!(requests[0].body.contains(r#"name="name""#));
    assert!(requests[0].body.contains(r#"name="image""#));
}

#[tokio::test]
async fn test_embedder_no_face() {
    let (url, _server) = responder(vec![(
        400,
        r#"{"success":false,"message":"No face detected in image"}"#.to_string(),
    )])
    .await;

    let faces = embedder(url)
        .embeddings(&ImageFrame::new(b"JPEG".to_vec()))
        .await
        .unwrap();
    assert!(faces.is_empty());
}

#[tokio::test]
async fn test_embedder_invalid_embedding() {
    let (url, _server) = responder(vec![(
        422,
        r#"{"success":false,"message":"Invalid embedding size: 300"}"#.to_string(),
    )])
    .await;

    let err = embedder(url)
        .embeddings(&ImageFrame::new(b"JPEG".to_vec()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEmbedding);
}

#[tokio::test]
async fn test_embedder_failure_is_unavailable() {
    let (url, _server) = responder(vec![(500, "internal error".to_string())]).await;

    let err = embedder(url)
        .embeddings(&ImageFrame::new(b"JPEG".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, HardwareError::EmbedderUnavailable { .. }));
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}

#[tokio::test]
async fn test_encode_face_for_registration() {
    let encoding = encode_vector(&reference());
    let body = format!(
        r#"{{"success":true,"message":"ok","data":{{"encoding":"{encoding}","embedding_length":512}}}}"#
    );
    let (url, _server) = responder(vec![(200, body)]).await;

    let face = embedder(url).encode("alice", b"JPEG").await.unwrap().unwrap();
    assert_eq!(face.encoding, encoding);
    assert_eq!(face.embedding_length, 512);
}
