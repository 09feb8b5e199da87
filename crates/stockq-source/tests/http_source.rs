//! HTTP line source integration tests against a local stub server.

use std::time::Duration;

use stockq_source::{LineSource, SourceError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve one canned HTTP response per accepted connection and return the
/// base URL plus a handle for the accept loop.
async fn stub_server(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "{status_line}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{addr}"), handle)
}

#[tokio::test]
async fn test_http_source_streams_lines() {
    let (base, server) = stub_server("HTTP/1.1 200 OK", "header\nAAPL,100,t1\nMSFT,90,t2\n").await;

    let source = LineSource::http_with_timeout(format!("{base}/prices"), Duration::from_secs(5)).unwrap();
    let mut reader = source.open(CancellationToken::new()).await.unwrap();

    let mut lines = Vec::new();
    while let Some(line) = reader.next_line().await.unwrap() {
        lines.push(line);
    }

    assert_eq!(lines, vec!["header", "AAPL,100,t1", "MSFT,90,t2"]);
    server.abort();
}

#[tokio::test]
async fn test_http_source_templates_identifier() {
    let (base, server) = stub_server("HTTP/1.1 200 OK", "header\n").await;

    let source =
        LineSource::http_with_timeout(format!("{base}/api/stocks/{{identifier}}"), Duration::from_secs(5))
            .unwrap();
    let resolved = source.for_identifier("AAPL");
    assert_eq!(resolved.to_string(), format!("{base}/api/stocks/AAPL"));

    let mut reader = resolved.open(CancellationToken::new()).await.unwrap();
    assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("header"));
    server.abort();
}

#[tokio::test]
async fn test_http_error_status_is_source_error() {
    let (base, server) = stub_server("HTTP/1.1 404 Not Found", "missing").await;

    let source = LineSource::http_with_timeout(format!("{base}/prices"), Duration::from_secs(5)).unwrap();
    let err = source.open(CancellationToken::new()).await.unwrap_err();

    match err {
        SourceError::Status { status, .. } => assert_eq!(status, 404),
        other => panic!("expected Status error, got {other:?}"),
    }
    server.abort();
}

#[tokio::test]
async fn test_http_connection_refused_is_source_error() {
    // Bind then drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = LineSource::http_with_timeout(format!("http://{addr}/prices"), Duration::from_secs(5)).unwrap();
    let err = source.open(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SourceError::Http(_)));
}
