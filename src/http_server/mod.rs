//! # pubmarine HTTP Server Module
//!
//! Hosts the single WebSocket upgrade endpoint that hands connections to the
//! dispatcher.

pub mod config;
pub mod server;
pub mod sync_routes;

pub use config::BrokerConfig;
pub use server::BrokerServer;
