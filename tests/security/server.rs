//! Server infrastructure security integration tests.
//!
//! These tests start a real server, send raw TCP traffic, and assert on
//! observable behavior.

use std::net::SocketAddr;
use std::sync::Arc;

use racine::config::{Auth, Config, Database, Server as ServerConfig};
use racine::server;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Start a test server on a random port with `/echo` (POST), `/ping` (GET)
/// and `/slow` (GET) routes using default config (no CORS).
async fn start_test_server() -> server::Server {
    start_test_server_with_config(ServerConfig::default()).await
}

/// Start a test server with a custom `ServerConfig`.
async fn start_test_server_with_config(server_cfg: ServerConfig) -> server::Server {
    let config = Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..server_cfg
        },
        database: Database {
            url: ":memory:".to_string(),
        },
        auth: Auth {
            jwt_secret: "test-secret-that-is-at-least-32b!".to_string(),
            token_expiry_days: 1,
        },
    };

    let mut router = racine::Router::new();

    router.post("/echo", |ctx| async move {
        let input: serde_json::Value = ctx.json()?;
        racine::response::ok(&serde_json::json!({
            "echoed": input
        }))
    });

    router.get("/ping", |_ctx| async move {
        racine::response::ok(&serde_json::json!({ "pong": true }))
    });

    router.get("/slow", |_ctx| async move {
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        racine::response::ok(&serde_json::json!({ "slow": true }))
    });

    server::start(Arc::new(config), None, router.into_handle())
        .await
        .expect("failed to start test server")
}

/// Send a raw HTTP/1.1 request with `Connection: close` and read the full response.
async fn raw_request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream.write_all(payload).await.expect("failed to write");

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        stream.read_to_end(&mut buf),
    )
    .await;
    buf
}

/// Send a partial request and return the open stream (for slowloris-style tests).
async fn raw_partial_request(addr: SocketAddr, payload: &[u8]) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream
        .write_all(payload)
        .await
        .expect("failed to write partial request");
    stream
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Sends headers declaring a 10 MB Content-Length; the server rejects based
/// on the header alone and returns 413 Payload Too Large.
#[tokio::test]
async fn server_rejects_oversized_body() {
    let server = start_test_server().await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10485760\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    assert!(
        response_str.contains("413"),
        "Expected 413 Payload Too Large, got:\n{response_str}"
    );
}

/// Opening 200 connections results in at least one being refused or
/// receiving a 503.
#[tokio::test]
async fn server_rejects_excess_connections() {
    let server = start_test_server().await;
    let addr = server.addr();

    let mut streams = Vec::new();
    let mut refused = 0usize;

    for _ in 0..200 {
        match TcpStream::connect(addr).await {
            Ok(s) => streams.push(s),
            Err(_) => refused += 1,
        }
    }

    // Give the server a moment to accept and categorise all connections
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let mut service_unavailable = 0usize;
    for mut stream in streams {
        let req = b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        if stream.write_all(req).await.is_ok() {
            let mut buf = vec![0u8; 4096];
            match tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(&mut buf))
                .await
            {
                Ok(Ok(n)) if n > 0 => {
                    let resp = String::from_utf8_lossy(&buf[..n]);
                    if resp.contains("503") {
                        service_unavailable += 1;
                    }
                }
                _ => {}
            }
        }
    }

    server.shutdown().await.unwrap();

    assert!(
        refused + service_unavailable > 0,
        "Expected at least one connection refused or 503, but all 200 were accepted and served"
    );
}

/// Connections that stall during header transmission are closed.
#[tokio::test]
async fn server_closes_slow_connections() {
    let server = start_test_server().await;
    let addr = server.addr();

    // Send partial headers (no \r\n\r\n terminator)
    let mut stream = raw_partial_request(addr, b"GET /ping HTTP/1.1\r\nHost: localhost\r\n").await;

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let mut buf = vec![0u8; 4096];
    let result =
        tokio::time::timeout(std::time::Duration::from_secs(2), stream.read(&mut buf)).await;

    server.shutdown().await.unwrap();

    match result {
        Ok(Ok(0)) => {}
        Ok(Err(_)) => {}
        Ok(Ok(n)) => {
            let resp = String::from_utf8_lossy(&buf[..n]);
            assert!(
                resp.contains("408") || resp.contains("timeout"),
                "Expected connection close or 408, got:\n{resp}"
            );
        }
        Err(_) => {
            panic!(
                "Server did not close the slow connection within 5 seconds (slowloris vulnerable)"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Headers and CORS
// ---------------------------------------------------------------------------

/// Every response carries the standard security headers.
#[tokio::test]
async fn server_returns_security_headers() {
    let server = start_test_server().await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"GET /nowhere HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    let response_lower = response_str.to_ascii_lowercase();
    assert!(response_str.contains("404"), "Expected 404:\n{response_str}");
    assert!(
        response_lower.contains("x-content-type-options: nosniff"),
        "Expected X-Content-Type-Options header in response:\n{response_str}"
    );
    assert!(
        response_lower.contains("x-frame-options: deny"),
        "Expected X-Frame-Options header in response:\n{response_str}"
    );
}

/// Origins not in the allowlist do not get CORS headers.
#[tokio::test]
async fn server_rejects_unlisted_origin() {
    let server = start_test_server_with_config(ServerConfig {
        cors_origins: vec!["http://allowed.com".to_string()],
        ..Default::default()
    })
    .await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"GET /ping HTTP/1.1\r\nHost: localhost\r\nOrigin: http://evil.com\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    assert!(
        !response_str
            .to_ascii_lowercase()
            .contains("access-control-allow-origin"),
        "Should NOT have CORS headers for unlisted origin:\n{response_str}"
    );
}

/// A listed origin gets reflected.
#[tokio::test]
async fn server_allows_listed_origin() {
    let server = start_test_server_with_config(ServerConfig {
        cors_origins: vec!["http://allowed.com".to_string()],
        ..Default::default()
    })
    .await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"GET /ping HTTP/1.1\r\nHost: localhost\r\nOrigin: http://allowed.com\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    assert!(
        response_str.contains("http://allowed.com"),
        "Expected reflected origin in CORS header:\n{response_str}"
    );
}

/// OPTIONS preflight returns 204 with CORS headers.
#[tokio::test]
async fn server_handles_options_preflight() {
    let server = start_test_server_with_config(ServerConfig {
        cors_origins: vec!["http://app.com".to_string()],
        ..Default::default()
    })
    .await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"OPTIONS /ping HTTP/1.1\r\nHost: localhost\r\nOrigin: http://app.com\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    assert!(
        response_str.contains("204"),
        "Expected 204 No Content for OPTIONS preflight, got:\n{response_str}"
    );
    assert!(
        response_str
            .to_ascii_lowercase()
            .contains("access-control-allow-methods"),
        "Expected Access-Control-Allow-Methods in preflight response:\n{response_str}"
    );
}

/// Wildcard `["*"]` allows any origin.
#[tokio::test]
async fn server_wildcard_cors() {
    let server = start_test_server_with_config(ServerConfig {
        cors_origins: vec!["*".to_string()],
        ..Default::default()
    })
    .await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"GET /ping HTTP/1.1\r\nHost: localhost\r\nOrigin: http://anything.com\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    assert!(
        response_str.contains("http://anything.com"),
        "Expected wildcard CORS to reflect any origin:\n{response_str}"
    );
}

// ---------------------------------------------------------------------------
// Protocol and lifecycle
// ---------------------------------------------------------------------------

/// Wrong methods on a known path get 405, not 404.
#[tokio::test]
async fn server_distinguishes_method_not_allowed() {
    let server = start_test_server().await;
    let addr = server.addr();

    let response = raw_request(
        addr,
        b"DELETE /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    let response_str = String::from_utf8_lossy(&response);

    server.shutdown().await.unwrap();

    assert!(
        response_str.contains("405"),
        "Expected 405 Method Not Allowed, got:\n{response_str}"
    );
}

/// The server speaks HTTP/2 when a client sends the connection preface.
#[tokio::test]
async fn server_speaks_http2() {
    let server = start_test_server().await;
    let addr = server.addr();

    // HTTP/2 connection preface followed by an empty SETTINGS frame
    let mut preface = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n".to_vec();
    preface.extend_from_slice(&[0, 0, 0, 0x04, 0x00, 0, 0, 0, 0]);

    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream
        .write_all(&preface)
        .await
        .expect("failed to write h2 preface");

    let mut buf = vec![0u8; 256];
    let result =
        tokio::time::timeout(std::time::Duration::from_secs(2), stream.read(&mut buf)).await;

    server.shutdown().await.unwrap();

    match result {
        Ok(Ok(0)) | Ok(Err(_)) | Err(_) => {
            panic!("Server closed connection or timed out: HTTP/2 not supported");
        }
        Ok(Ok(n)) => {
            let data = &buf[..n];
            // A valid HTTP/2 response starts with a SETTINGS frame
            assert!(
                n >= 9 && data[3] == 0x04,
                "Expected HTTP/2 SETTINGS frame, got {} bytes: {:?}",
                n,
                &data[..n.min(32)]
            );
        }
    }
}

/// In-flight requests complete after the shutdown signal.
#[tokio::test]
async fn server_drains_on_shutdown() {
    let server = start_test_server().await;
    let addr = server.addr();

    let mut stream = TcpStream::connect(addr).await.expect("failed to connect");
    stream
        .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .expect("failed to write");

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let shutdown_handle = tokio::spawn(async move { server.shutdown().await });

    let mut buf = Vec::new();
    let _ = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        stream.read_to_end(&mut buf),
    )
    .await;

    let response_str = String::from_utf8_lossy(&buf);
    assert!(
        response_str.contains("200") || response_str.contains("slow"),
        "Expected slow handler to complete during drain, got:\n{response_str}"
    );

    shutdown_handle.await.unwrap().unwrap();
}
