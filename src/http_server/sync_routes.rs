//! Sync WebSocket Endpoint
//!
//! Upgrades HTTP requests to WebSocket connections and runs one read/write
//! loop per connection. Inbound text frames go to the dispatcher in arrival
//! order; frames queued by the dispatcher are written back on the same task.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use crate::observability::Event;
use crate::realtime::{Dispatcher, RealtimeError};

/// Create the sync route serving the upgrade endpoint at `path`
pub fn sync_routes(path: &str, dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(path, get(websocket_handler))
        .with_state(dispatcher)
}

/// Handle WebSocket upgrade request
async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(dispatcher): State<Arc<Dispatcher>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, peer, dispatcher))
}

/// Serve one connection until it closes, then evict it
async fn handle_websocket(socket: WebSocket, peer: SocketAddr, dispatcher: Arc<Dispatcher>) {
    let (subscriber, mut outbound) = match dispatcher.connect() {
        Ok(connection) => connection,
        Err(e) => {
            error!(event = %Event::TransportError, peer = %peer, error = %e, "cannot register connection");
            return;
        }
    };

    info!(
        event = %Event::ConnectionOpen,
        subscriber = %subscriber,
        peer = %peer,
        connections = dispatcher.connection_count(),
        "connection open"
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.handle_text(subscriber, &text);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        dispatcher.record_drop(subscriber, &RealtimeError::UnsupportedFrame("binary"));
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    // ping/pong are answered by axum
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(
                            event = %Event::TransportError,
                            subscriber = %subscriber,
                            error = %e,
                            "receive failed"
                        );
                        break;
                    }
                }
            }

            Some(frame) = outbound.recv() => {
                if let Err(e) = sender.send(Message::Text(frame.to_string())).await {
                    warn!(
                        event = %Event::TransportError,
                        subscriber = %subscriber,
                        error = %e,
                        "send failed"
                    );
                    break;
                }
            }
        }
    }

    match dispatcher.disconnect(subscriber) {
        Ok(evicted) => info!(
            event = %Event::ConnectionClose,
            subscriber = %subscriber,
            peer = %peer,
            evicted,
            "connection closed"
        ),
        Err(e) => error!(
            event = %Event::ConnectionClose,
            subscriber = %subscriber,
            error = %e,
            "eviction failed"
        ),
    }
}
