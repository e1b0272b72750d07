//! Opening handshake.
//!
//! Turns a valid upgrade request into a `101 Switching Protocols`
//! response whose hijack callback starts the session's read loop.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::config::WebSocketConfig;
use crate::http::{Request, Response, StatusCode};
use crate::websocket::session::WebSocket;

/// Appended to the client key before hashing.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// `sec-websocket-accept` value for a client key.
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Accept an upgrade request, picking the first offered subprotocol if any.
///
/// Returns `None` when the request is not a valid WebSocket upgrade, so the
/// caller can fall through to normal handling.
pub fn upgrade(request: &Request, config: &WebSocketConfig) -> Option<(Response, WebSocket)> {
    upgrade_with_protocol(request, config, |_| None)
}

/// Like [`upgrade`], letting `choose` pick among the offered subprotocols.
/// When it declines, the first offer is used.
pub fn upgrade_with_protocol<F>(
    request: &Request,
    config: &WebSocketConfig,
    choose: F,
) -> Option<(Response, WebSocket)>
where
    F: FnOnce(&[String]) -> Option<String>,
{
    let key = request.header("sec-websocket-key")?;
    if request.header("upgrade") != Some("websocket") {
        return None;
    }
    let connection = request.header("connection").unwrap_or_default();
    if !connection
        .split([' ', ','])
        .any(|token| token.trim() == "Upgrade")
    {
        return None;
    }
    request.header("sec-websocket-version")?;

    match STANDARD.decode(key) {
        Ok(raw) if raw.len() == 16 => {}
        _ => {
            tracing::debug!(connection_id = %request.connection_id(), "Rejecting upgrade with malformed key");
            return None;
        }
    }

    let offered: Option<Vec<String>> = request.header("sec-websocket-protocol").map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    });
    let protocol = offered
        .as_deref()
        .and_then(|offers| choose(offers).or_else(|| offers.first().cloned()));

    let socket = WebSocket::new(config.clone(), protocol.clone());

    let mut response = Response::new().with_status(StatusCode::SWITCHING_PROTOCOLS);
    response.add_standard_headers();
    response.set_header("connection", "Upgrade");
    response.set_header("upgrade", "websocket");
    if let Some(protocol) = protocol {
        response.set_header("sec-websocket-protocol", protocol);
    }
    response.set_header("sec-websocket-accept", accept_key(key));

    let session = socket.clone();
    response.set_hijack(move |connection| session.attach(connection));

    tracing::debug!(connection_id = %request.connection_id(), path = %request.path(), "WebSocket upgrade accepted");
    Some((response, socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestHead;

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn upgrade_request(edit: impl FnOnce(&mut RequestHead)) -> Request {
        let mut head = RequestHead::new("GET", "/ws");
        head.headers.add("host", "localhost");
        head.headers.add("upgrade", "websocket");
        head.headers.add("connection", "keep-alive, Upgrade");
        head.headers.add("sec-websocket-key", SAMPLE_KEY);
        head.headers.add("sec-websocket-version", "13");
        edit(&mut head);
        Request::detached(head)
    }

    #[test]
    fn accept_key_matches_known_value() {
        assert_eq!(accept_key(SAMPLE_KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn valid_upgrade_builds_101() {
        let (response, socket) = upgrade(&upgrade_request(|_| {}), &WebSocketConfig::default()).unwrap();

        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
        assert_eq!(response.reason(), "Switching Protocols");
        assert!(response.is_hijack());
        assert!(response.body().is_empty());

        let headers = response.headers();
        assert_eq!(headers.get("connection"), Some("Upgrade"));
        assert_eq!(headers.get("upgrade"), Some("websocket"));
        assert_eq!(headers.get("sec-websocket-accept"), Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert!(headers.contains("date"));
        assert!(!headers.contains("sec-websocket-protocol"));
        assert_eq!(socket.protocol(), None);
    }

    #[test]
    fn not_an_upgrade() {
        let config = WebSocketConfig::default();
        let cases: Vec<Box<dyn FnOnce(&mut RequestHead)>> = vec![
            Box::new(|h: &mut RequestHead| {
                h.headers.remove("sec-websocket-key");
            }),
            Box::new(|h: &mut RequestHead| h.headers.set("upgrade", "WebSocket")),
            Box::new(|h: &mut RequestHead| h.headers.set("connection", "keep-alive")),
            Box::new(|h: &mut RequestHead| {
                h.headers.remove("sec-websocket-version");
            }),
            Box::new(|h: &mut RequestHead| h.headers.set("sec-websocket-key", "dG9vIHNob3J0")),
            Box::new(|h: &mut RequestHead| h.headers.set("sec-websocket-key", "not base64!!")),
        ];

        for (i, edit) in cases.into_iter().enumerate() {
            assert!(upgrade(&upgrade_request(edit), &config).is_none(), "case {i}");
        }
    }

    #[test]
    fn subprotocol_negotiation() {
        let config = WebSocketConfig::default();
        let offer = |h: &mut RequestHead| h.headers.add("sec-websocket-protocol", "chat, superchat");

        let (response, socket) = upgrade(&upgrade_request(offer), &config).unwrap();
        assert_eq!(response.headers().get("sec-websocket-protocol"), Some("chat"));
        assert_eq!(socket.protocol(), Some("chat"));

        let (response, _) = upgrade_with_protocol(&upgrade_request(offer), &config, |offers| {
            offers.iter().find(|p| p.as_str() == "superchat").cloned()
        })
        .unwrap();
        assert_eq!(response.headers().get("sec-websocket-protocol"), Some("superchat"));

        let (response, _) = upgrade_with_protocol(&upgrade_request(offer), &config, |_| None).unwrap();
        assert_eq!(response.headers().get("sec-websocket-protocol"), Some("chat"));
    }
}
