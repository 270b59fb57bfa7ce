//! # Clients
//!
//! RCON and Server List Ping clients plus the pieces that hand them out per
//! guild and server name.
//!
//! - [`RconClientPool`] caches one authenticated [`RconClient`] per server and
//!   drops it after a transport failure.
//! - [`ServerListPingClientFactory`] connects a fresh [`ServerListPingClient`]
//!   per request.
//! - [`ServerConfigStore`] is the lookup both of them resolve servers through.

pub mod rcon_client;
pub mod rcon_pool;
pub mod slp_client;
pub mod slp_factory;
pub mod store;

pub use rcon_client::{parse_whitelist, RconClient, RconOptions};
pub use rcon_pool::RconClientPool;
pub use slp_client::ServerListPingClient;
pub use slp_factory::ServerListPingClientFactory;
pub use store::{GuildId, InMemoryServerStore, ServerConfig, ServerConfigStore, ServerKey};
