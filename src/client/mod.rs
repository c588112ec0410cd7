//! # Sync Client
//!
//! Async client for the broker's WebSocket protocol.
//!
//! Requests that the broker answers (`list`, `schema-get`, `inst`) are
//! matched to their response by correlation id. Everything else the broker
//! pushes, mutation broadcasts in particular, is surfaced through
//! [`SyncClient::next_event`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::instance::Instance;
use crate::protocol::{
    AuthRequest, Envelope, InstRequest, InstResponse, ListResponse, MessageType, MutRequest,
    SchemaGetRequest, SchemaGetResponse, SchemaSetRequest, SubRequest,
};
use crate::schema::Schema;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket handshake failed
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Connection closed before the operation completed
    #[error("Connection closed")]
    Closed,

    /// Broker answered with an error envelope
    #[error("Server error: {0}")]
    Server(String),

    /// Payload could not be encoded or decoded
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Envelope>>>>;

/// Connected broker client
pub struct SyncClient {
    outbound: mpsc::UnboundedSender<Message>,
    events: mpsc::UnboundedReceiver<Envelope>,
    pending: Pending,
    sent: AtomicU64,
    io_task: JoinHandle<()>,
}

impl SyncClient {
    /// Connect to a broker, e.g. `ws://localhost:10209/`
    pub async fn connect(url: &str) -> ClientResult<Self> {
        let (stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (events_tx, events) = mpsc::unbounded_channel::<Envelope>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let routes = Arc::clone(&pending);

        let io_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outbound_rx.recv() => {
                        let Some(message) = outgoing else { break };
                        if let Err(e) = sink.send(message).await {
                            warn!(error = %e, "client send failed");
                            break;
                        }
                    }

                    incoming = source.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let envelope = match Envelope::decode(&text) {
                                    Ok(envelope) => envelope,
                                    Err(e) => {
                                        warn!(error = %e, "undecodable frame from broker");
                                        continue;
                                    }
                                };
                                let waiter = routes.lock().await.remove(&envelope.id);
                                match waiter {
                                    Some(waiter) => {
                                        let _ = waiter.send(envelope);
                                    }
                                    None => {
                                        let _ = events_tx.send(envelope);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                debug!(error = %e, "client receive failed");
                                break;
                            }
                        }
                    }
                }
            }
            // dropping the senders wakes every waiter with Closed
            routes.lock().await.clear();
        });

        Ok(Self {
            outbound,
            events,
            pending,
            sent: AtomicU64::new(0),
            io_task,
        })
    }

    // ==================
    // Fire-and-forget requests
    // ==================

    /// Send an `auth` message (accepted but not enforced by the broker)
    pub async fn auth(&self, id: &str) -> ClientResult<()> {
        self.send(MessageType::Auth, &AuthRequest { id: id.to_string() })
            .await
            .map(|_| ())
    }

    /// Subscribe to a topic (`is_topic`) or an instance id
    pub async fn subscribe(&self, id: &str, is_topic: bool) -> ClientResult<()> {
        self.send(MessageType::Sub, &SubRequest::new(id, is_topic))
            .await
            .map(|_| ())
    }

    /// Remove a subscription
    pub async fn unsubscribe(&self, id: &str, is_topic: bool) -> ClientResult<()> {
        self.send(MessageType::Unsub, &SubRequest::new(id, is_topic))
            .await
            .map(|_| ())
    }

    /// Register or overwrite a schema
    pub async fn set_schema(&self, schema_id: &str, schema: Schema) -> ClientResult<()> {
        let msg = SchemaSetRequest {
            schema_id: schema_id.to_string(),
            schema,
        };
        self.send(MessageType::SchemaSet, &msg).await.map(|_| ())
    }

    /// Mutate instance fields; returns the request's correlation id, which the
    /// resulting broadcast echoes
    pub async fn mutate(&self, instance_id: &str, change: Map<String, Value>) -> ClientResult<String> {
        let msg = MutRequest {
            id: instance_id.to_string(),
            change,
        };
        self.send(MessageType::Mut, &msg).await
    }

    // ==================
    // Request/response
    // ==================

    /// All registered schema ids
    pub async fn list(&self) -> ClientResult<Vec<String>> {
        let res: ListResponse = self.request(MessageType::List, &Value::Null).await?;
        Ok(res.topics)
    }

    /// Fetch a schema; unknown ids come back empty
    pub async fn get_schema(&self, schema_id: &str) -> ClientResult<Schema> {
        let msg = SchemaGetRequest {
            id: schema_id.to_string(),
        };
        let res: SchemaGetResponse = self.request(MessageType::SchemaGet, &msg).await?;
        Ok(res.schema)
    }

    /// Create an instance of a schema
    pub async fn instantiate(&self, schema_id: &str) -> ClientResult<(String, Instance)> {
        let msg = InstRequest {
            schema_id: schema_id.to_string(),
        };
        let res: InstResponse = self.request(MessageType::Inst, &msg).await?;
        Ok((res.instance_id, res.instance))
    }

    /// Next envelope pushed by the broker that was not a response
    ///
    /// Returns `None` once the connection has closed.
    pub async fn next_event(&mut self) -> Option<Envelope> {
        self.events.recv().await
    }

    /// Close the connection
    pub async fn close(self) {
        let _ = self.outbound.send(Message::Close(None));
        drop(self.outbound);
        let _ = self.io_task.await;
    }

    // ==================
    // Internals
    // ==================

    fn next_id(&self, kind: MessageType) -> String {
        let n = self.sent.fetch_add(1, Ordering::Relaxed);
        format!("{}:{}:{}", kind, n, rand::random::<u32>())
    }

    async fn send<T: Serialize>(&self, kind: MessageType, msg: &T) -> ClientResult<String> {
        let id = self.next_id(kind);
        let envelope = Envelope::request(id.as_str(), kind, serde_json::to_value(msg)?);
        self.outbound
            .send(Message::Text(envelope.encode()?))
            .map_err(|_| ClientError::Closed)?;
        Ok(id)
    }

    async fn request<T, R>(&self, kind: MessageType, msg: &T) -> ClientResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id(kind);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let envelope = Envelope::request(id.as_str(), kind, serde_json::to_value(msg)?);
        if self.outbound.send(Message::Text(envelope.encode()?)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Closed);
        }

        let response = rx.await.map_err(|_| ClientError::Closed)?;
        if let Some(error) = response.error {
            return Err(ClientError::Server(error));
        }
        Ok(response.payload()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = SyncClient::connect(&format!("ws://{}/", addr)).await;
        assert!(matches!(result, Err(ClientError::Connect(_))));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ClientError::Server("boom".into()).to_string(), "Server error: boom");
        assert_eq!(ClientError::Closed.to_string(), "Connection closed");
    }
}
