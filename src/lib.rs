//! A RouterOS-backed webhook provider for external-dns.
//!
//! Bridges external-dns's HTTP webhook contract to a RouterOS device's
//! binary-framed management protocol: [`webhook`] exposes the fixed JSON
//! surface the controller speaks, [`provider`] reconciles change batches
//! against device records, [`client`] wraps typed device operations, and
//! [`connection`] owns the multiplexed TCP socket underneath it all.
//!
//! # Usage
//!
//! ```no_run
//! use routeros_edns_webhook::client::Client;
//! use routeros_edns_webhook::connection::ConnectionConfig;
//! use routeros_edns_webhook::endpoint::DomainFilter;
//! use routeros_edns_webhook::provider::Provider;
//! use routeros_edns_webhook::webhook;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = ConnectionConfig::new("192.168.88.1", "admin", "");
//!     let client = Client::new(config);
//!     let provider = Arc::new(Provider::new(client, DomainFilter::default()));
//!
//!     axum::Server::bind(&"0.0.0.0:8888".parse().unwrap())
//!         .serve(webhook::router(provider).into_make_service())
//!         .await
//!         .unwrap();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod errors;
pub mod protocol;
pub mod provider;
pub mod record;
pub mod translate;
pub mod webhook;

pub use crate::errors::{Error, Result};
