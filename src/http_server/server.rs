//! # Broker Server
//!
//! Binds the listener and serves the WebSocket upgrade endpoint. There is no
//! other HTTP surface.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use super::config::BrokerConfig;
use super::sync_routes::sync_routes;
use crate::observability::Event;
use crate::realtime::{Dispatcher, RealtimeError, RealtimeResult};

/// A bound broker, ready to serve
pub struct BrokerServer {
    config: BrokerConfig,
    dispatcher: Arc<Dispatcher>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BrokerServer {
    /// Bind the configured address with a fresh dispatcher
    pub async fn bind(config: BrokerConfig) -> RealtimeResult<Self> {
        let dispatcher = Dispatcher::with_outbound_capacity(config.outbound_capacity);
        Self::bind_with(config, Arc::new(dispatcher)).await
    }

    /// Bind the configured address, serving an existing dispatcher
    pub async fn bind_with(config: BrokerConfig, dispatcher: Arc<Dispatcher>) -> RealtimeResult<Self> {
        let addr = config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RealtimeError::ConfigError(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| RealtimeError::ConnectionError(e.to_string()))?;

        Ok(Self {
            config,
            dispatcher,
            listener,
            local_addr,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// WebSocket URL clients should connect to
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.config.ws_path)
    }

    /// Shared dispatcher
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Build the router for a config and dispatcher
    pub fn router(config: &BrokerConfig, dispatcher: Arc<Dispatcher>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        sync_routes(&config.ws_path, dispatcher).layer(cors)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> RealtimeResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = Self::router(&self.config, Arc::clone(&self.dispatcher));

        info!(
            event = %Event::BrokerListening,
            addr = %self.local_addr,
            endpoint = %self.ws_url(),
            "listening"
        );

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RealtimeError::ConnectionError(e.to_string()))?;

        let metrics = self.dispatcher.metrics();
        info!(
            event = %Event::ShutdownComplete,
            connections_opened = metrics.connections_opened,
            connections_still_open = metrics.active_connections(),
            messages_received = metrics.messages_received,
            messages_dropped = metrics.messages_dropped,
            instances_created = metrics.instances_created,
            mutations_applied = metrics.mutations_applied,
            fields_rejected = metrics.fields_rejected,
            broadcasts_delivered = metrics.broadcasts_delivered,
            broadcasts_failed = metrics.broadcasts_failed,
            "broker stopped"
        );
        Ok(())
    }
}
