//! # mc-remote
//!
//! Async clients for administering Minecraft servers over their two TCP protocols:
//!
//! - **RCON** runs console commands (whitelist management, operators, chat).
//! - **Server List Ping** fetches the status document and measures latency.
//!
//! Both run on one generic [`PacketTransport`](transport::PacketTransport) with a
//! protocol-specific codec. Servers are registered per chat guild and looked up
//! through a [`ServerConfigStore`](service::ServerConfigStore);
//! [`RconClientPool`](service::RconClientPool) keeps one authenticated connection per
//! server and replaces it after a failure.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mc_remote::config::ClientConfig;
//! use mc_remote::service::{GuildId, InMemoryServerStore, RconClientPool, ServerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> mc_remote::error::Result<()> {
//! let store = Arc::new(InMemoryServerStore::new());
//! store.insert(
//!     GuildId(1),
//!     "survival",
//!     ServerConfig {
//!         host: "mc.example.com".into(),
//!         rcon_port: 25575,
//!         rcon_password: "secret".into(),
//!         ping_port: 25565,
//!     },
//! )?;
//!
//! let pool = RconClientPool::new(store, ClientConfig::default());
//! let cancel = CancellationToken::new();
//! let client = pool.get_client(GuildId(1), "survival", &cancel).await?;
//! let players = client.list_whitelist(&cancel).await?;
//! println!("{players:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{ClientConfig, Config};
pub use crate::error::{Error, Result};
pub use crate::service::{
    GuildId, InMemoryServerStore, RconClient, RconClientPool, ServerConfig, ServerConfigStore,
    ServerListPingClient, ServerListPingClientFactory,
};
