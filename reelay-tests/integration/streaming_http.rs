//! HTTP semantics of the media handler, end to end.

use std::net::SocketAddr;

use reqwest::StatusCode;
use reqwest::header;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::support::{media_fixture, spawn_default_server};

/// Sends a raw HTTP/1.1 request, bypassing client-side URL
/// normalization so traversal paths reach the server verbatim.
async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn bounded_range_returns_206_with_exact_body() {
    let (dir, data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4"))
        .header(header::RANGE, "bytes=100-199")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 100-199/1000"
    );
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");

    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 100);
    assert_eq!(body.as_ref(), &data[100..200]);
}

#[tokio::test]
async fn suffix_range_returns_trailing_bytes() {
    let (dir, data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4"))
        .header(header::RANGE, "bytes=-50")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()[header::CONTENT_RANGE],
        "bytes 950-999/1000"
    );

    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 50);
    assert_eq!(body.as_ref(), &data[950..]);
}

#[tokio::test]
async fn open_ended_range_runs_to_end_of_file() {
    let (dir, data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4"))
        .header(header::RANGE, "bytes=900-")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[900..]);
}

#[tokio::test]
async fn no_range_header_returns_200_full_body() {
    let (dir, data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::get(format!("http://{addr}/movie.mp4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(response.bytes().await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
async fn unsatisfiable_range_returns_416_with_no_body() {
    let (dir, _data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4"))
        .header(header::RANGE, "bytes=2000-2100")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_range_served_as_full_file() {
    let (dir, data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4"))
        .header(header::RANGE, "chapters=1-3")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().len(), data.len());
}

#[tokio::test]
async fn nested_paths_and_content_types_resolve() {
    let (dir, _data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::get(format!("http://{addr}/shows/ep1.ts"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp2t");

    let response = reqwest::get(format!("http://{addr}/subs.vtt")).await.unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/vtt; charset=utf-8"
    );
}

#[tokio::test]
async fn missing_file_returns_404() {
    let (dir, _data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::get(format!("http://{addr}/nope.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_get_method_returns_405() {
    let (dir, _data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/movie.mp4"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn traversal_path_returns_403() {
    let (dir, _data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = raw_request(
        addr,
        "GET /../etc/passwd HTTP/1.1\r\nHost: reelay\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 403"), "got: {response}");
}

#[tokio::test]
async fn cross_origin_requests_are_allowed() {
    let (dir, _data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4"))
        .header(header::ORIGIN, "http://player.local")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn telemetry_query_params_do_not_affect_response() {
    let (dir, data) = media_fixture().await;
    let addr = spawn_default_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/movie.mp4?bitrate=4000000&fps=24"))
        .header(header::RANGE, "bytes=0-99")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.bytes().await.unwrap().as_ref(), &data[..100]);
}
