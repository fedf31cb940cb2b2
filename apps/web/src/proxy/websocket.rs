//! WebSocket pass-through to the backend.
//!
//! The upstream socket is dialled before the client upgrade is accepted, so
//! a dead backend is reported as `502` instead of a socket that opens and
//! immediately closes. Payloads are relayed without inspection.

use axum::{
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    http::{header, HeaderMap, Uri},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, client::IntoClientRequest, protocol::frame::coding::CloseCode},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::proxy::{forward::upstream_headers, ProxyRule};

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the backend socket and, on success, upgrades the client connection
/// and bridges the two.
pub async fn bridge(
    ws: WebSocketUpgrade,
    rule: &ProxyRule,
    uri: &Uri,
    inbound: &HeaderMap,
) -> Result<Response, AppError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = rule.websocket_url(path_and_query);

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| AppError::BadGateway(format!("{url}: {e}")))?;
    for (name, value) in upstream_headers(inbound, rule).iter() {
        // The handshake headers belong to the upstream client, except the
        // subprotocol offer which the backend has to choose from.
        if name.as_str().starts_with("sec-websocket-") && *name != header::SEC_WEBSOCKET_PROTOCOL
        {
            continue;
        }
        request.headers_mut().insert(name.clone(), value.clone());
    }

    let (upstream, response) = connect_async(request)
        .await
        .map_err(|e| AppError::BadGateway(format!("{url}: {e}")))?;

    let protocol = selected_protocol(response.headers());
    let connection_id = Uuid::new_v4();
    info!(%connection_id, prefix = rule.path_prefix, %url, ?protocol, "WebSocket bridged");

    // Echo the backend's choice so the client sees the same subprotocol.
    let ws = match protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };
    Ok(ws.on_upgrade(move |socket| relay(socket, upstream, connection_id)))
}

/// Subprotocol the backend accepted in its handshake reply, if any.
fn selected_protocol(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pumps frames both ways until either side closes.
async fn relay(client: WebSocket, upstream: Upstream, connection_id: Uuid) {
    let (mut client_tx, mut client_rx) = client.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let client_to_upstream = async {
        while let Some(Ok(msg)) = client_rx.next().await {
            let Some(msg) = to_upstream(msg) else {
                continue;
            };
            if upstream_tx.send(msg).await.is_err() {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    };

    let upstream_to_client = async {
        while let Some(Ok(msg)) = upstream_rx.next().await {
            let Some(msg) = to_client(msg) else {
                continue;
            };
            if client_tx.send(msg).await.is_err() {
                break;
            }
        }
        let _ = client_tx.close().await;
    };

    tokio::select! {
        _ = client_to_upstream => {},
        _ = upstream_to_client => {},
    }
    debug!(%connection_id, "WebSocket bridge closed");
}

/// Client frame as sent upstream. Ping and pong are answered per hop and not relayed.
fn to_upstream(msg: ws::Message) -> Option<tungstenite::Message> {
    match msg {
        ws::Message::Text(text) => Some(tungstenite::Message::Text(text)),
        ws::Message::Binary(data) => Some(tungstenite::Message::Binary(data)),
        ws::Message::Close(frame) => Some(tungstenite::Message::Close(frame.map(|f| {
            tungstenite::protocol::CloseFrame {
                code: CloseCode::from(f.code),
                reason: f.reason,
            }
        }))),
        ws::Message::Ping(_) | ws::Message::Pong(_) => None,
    }
}

/// Upstream frame as sent to the client. Ping and pong are answered per hop and not relayed.
fn to_client(msg: tungstenite::Message) -> Option<ws::Message> {
    match msg {
        tungstenite::Message::Text(text) => Some(ws::Message::Text(text)),
        tungstenite::Message::Binary(data) => Some(ws::Message::Binary(data)),
        tungstenite::Message::Close(frame) => Some(ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: f.code.into(),
            reason: f.reason,
        }))),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => None,
    }
}
