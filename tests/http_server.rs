//! End-to-end HTTP behaviour over real sockets.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use hitch::http::{HandlerError, Request, ResponderChain, Response};
use hitch::routing::{Params, Router};

mod common;

async fn hello(request: Request, _params: Params) -> Result<Response, HandlerError> {
    let params = request.query_params();
    let world = params
        .get("world")
        .and_then(|value| value.as_str())
        .unwrap_or("Earth")
        .to_string();
    Ok(Response::new().with_body(format!("hello from {}!", world)))
}

async fn broken(_request: Request, _params: Params) -> Result<Response, HandlerError> {
    Err("backing store unavailable".into())
}

fn app() -> ResponderChain {
    ResponderChain::new().with(
        Router::new()
            .get("/hello-world", hello)
            .get("/broken", broken),
    )
}

#[tokio::test]
async fn hello_world_over_reqwest() {
    let server = common::start_server(app(), |_| {}).await;

    let response = reqwest::get(server.url("/hello-world?world=Mars"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-length"].to_str().unwrap(),
        "16"
    );
    assert_eq!(response.headers()["connection"].to_str().unwrap(), "close");
    assert_eq!(response.text().await.unwrap(), "hello from Mars!");

    server.stop().await;
}

#[tokio::test]
async fn raw_response_starts_with_status_line() {
    let server = common::start_server(app(), |_| {}).await;

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /hello-world?world=Mars HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut raw))
        .await
        .unwrap()
        .unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "{raw}");
    assert!(raw.contains("content-length: 16\r\n"), "{raw}");
    assert!(raw.ends_with("\r\n\r\nhello from Mars!"), "{raw}");

    server.stop().await;
}

#[tokio::test]
async fn handler_error_becomes_500() {
    let server = common::start_server(app(), |_| {}).await;

    let response = reqwest::get(server.url("/broken")).await.unwrap();
    assert_eq!(response.status(), 500);

    // The failure is confined to that connection.
    let response = reqwest::get(server.url("/hello-world")).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "hello from Earth!");

    server.stop().await;
}

#[tokio::test]
async fn unknown_path_is_404() {
    let server = common::start_server(app(), |_| {}).await;

    let response = reqwest::get(server.url("/nowhere")).await.unwrap();
    assert_eq!(response.status(), 404);

    server.stop().await;
}

#[tokio::test]
async fn post_body_is_readable() {
    let router = Router::new().post("/echo", |request: Request, _params: Params| async move {
        let body = request.read_full_body().await?;
        Ok::<_, HandlerError>(Response::new().with_body(body))
    });
    let chain = ResponderChain::new().with(router);
    let server = common::start_server(chain, |_| {}).await;

    let response = reqwest::Client::new()
        .post(server.url("/echo"))
        .body("ping payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "ping payload");

    server.stop().await;
}

#[tokio::test]
async fn silent_client_is_dropped_after_header_timeout() {
    let server = common::start_server(app(), |config| {
        config.timeouts.header_read_secs = 1;
    })
    .await;

    let mut stream = tokio::net::TcpStream::connect(server.addr).await.unwrap();
    let mut raw = Vec::new();
    // A reset is as good as a close here; only the absence of a response matters.
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .unwrap();
    assert!(raw.is_empty());

    server.stop().await;
}
