//! WebSocket upgrade and echo against a real client.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WireMessage;

use hitch::config::WebSocketConfig;
use hitch::http::{HandlerError, Request, ResponderChain, Response, StatusCode};
use hitch::routing::{Params, Router};
use hitch::websocket;

mod common;

fn echo_app() -> ResponderChain {
    let config = WebSocketConfig::default();
    let router = Router::new().get("/ws", move |request: Request, _params: Params| {
        let config = config.clone();
        async move {
            let Some((response, session)) = websocket::upgrade(&request, &config) else {
                return Ok::<_, HandlerError>(Response::generic(StatusCode::BAD_REQUEST, None));
            };
            session.on_message(|ws, message| async move {
                let _ = ws.send(&message).await;
            });
            Ok(response)
        }
    });
    ResponderChain::new().with(router)
}

async fn next_message<S>(stream: &mut S) -> WireMessage
where
    S: futures_util::Stream<Item = Result<WireMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn upgrade_returns_expected_accept_key() {
    let server = common::start_server(echo_app(), |_| {}).await;

    let request = format!("ws://{}/ws", server.addr).into_client_request().unwrap();
    let key = request.headers()["sec-websocket-key"]
        .to_str()
        .unwrap()
        .to_string();

    let (socket, response) = tokio_tungstenite::connect_async(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 101);
    assert_eq!(
        response.headers()["sec-websocket-accept"].to_str().unwrap(),
        websocket::accept_key(&key)
    );

    drop(socket);
    server.stop().await;
}

#[tokio::test]
async fn echoes_text_and_binary() {
    let server = common::start_server(echo_app(), |_| {}).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();

    socket.send(WireMessage::text("hello from Mars!")).await.unwrap();
    let reply = next_message(&mut socket).await;
    assert_eq!(reply.to_text().unwrap(), "hello from Mars!");

    let payload: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
    socket.send(WireMessage::binary(payload.clone())).await.unwrap();
    let reply = next_message(&mut socket).await;
    assert!(reply.is_binary());
    assert_eq!(&reply.into_data()[..], &payload[..]);

    socket.send(WireMessage::Ping(b"tick".to_vec().into())).await.unwrap();
    let reply = next_message(&mut socket).await;
    assert!(matches!(&reply, WireMessage::Pong(data) if &data[..] == b"tick"), "{reply:?}");

    socket.close(None).await.unwrap();
    let reply = next_message(&mut socket).await;
    assert!(reply.is_close());

    server.stop().await;
}

#[tokio::test]
async fn plain_get_is_rejected() {
    let server = common::start_server(echo_app(), |_| {}).await;

    let response = reqwest::get(server.url("/ws")).await.unwrap();
    assert_eq!(response.status(), 400);

    server.stop().await;
}
