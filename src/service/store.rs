//! Lookup of per-server connection details.
//!
//! The bot keeps these in its own database; this crate only needs
//! [`ServerConfigStore::resolve`]. [`InMemoryServerStore`] covers tests and
//! embedders that keep their server list in memory.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Chat guild identifier (a platform snowflake)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuildId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for GuildId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A server registration is unique per guild and name. Names compare exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    pub guild_id: GuildId,
    pub name: String,
}

impl ServerKey {
    pub fn new(guild_id: GuildId, name: impl Into<String>) -> Self {
        Self {
            guild_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.name)
    }
}

/// Connection details of one registered server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub rcon_port: u16,
    pub rcon_password: String,
    pub ping_port: u16,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("rcon_port", &self.rcon_port)
            .field("rcon_password", &"<redacted>")
            .field("ping_port", &self.ping_port)
            .finish()
    }
}

/// Source of server connection details, keyed by guild and server name
#[async_trait]
pub trait ServerConfigStore: Send + Sync {
    /// `Ok(None)` when no server with this name is registered in the guild
    async fn resolve(&self, guild_id: GuildId, name: &str) -> Result<Option<ServerConfig>>;
}

pub(crate) fn not_found(name: &str) -> Error {
    Error::NotFound(format!(
        "No Minecraft server named `{name}` is registered in this guild."
    ))
}

/// Thread-safe in-memory server registry
#[derive(Default)]
pub struct InMemoryServerStore {
    servers: RwLock<HashMap<ServerKey, ServerConfig>>,
}

impl InMemoryServerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a server, returning the previous registration
    pub fn insert(
        &self,
        guild_id: GuildId,
        name: impl Into<String>,
        config: ServerConfig,
    ) -> Result<Option<ServerConfig>> {
        let mut servers = self.servers.write().map_err(|_| poisoned())?;
        Ok(servers.insert(ServerKey::new(guild_id, name), config))
    }

    pub fn remove(&self, guild_id: GuildId, name: &str) -> Result<Option<ServerConfig>> {
        let mut servers = self.servers.write().map_err(|_| poisoned())?;
        Ok(servers.remove(&ServerKey::new(guild_id, name)))
    }

    /// Names registered in a guild, sorted
    pub fn names(&self, guild_id: GuildId) -> Result<Vec<String>> {
        let servers = self.servers.read().map_err(|_| poisoned())?;
        let mut names: Vec<String> = servers
            .keys()
            .filter(|key| key.guild_id == guild_id)
            .map(|key| key.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ServerConfigStore for InMemoryServerStore {
    async fn resolve(&self, guild_id: GuildId, name: &str) -> Result<Option<ServerConfig>> {
        let servers = self.servers.read().map_err(|_| poisoned())?;
        Ok(servers.get(&ServerKey::new(guild_id, name)).cloned())
    }
}

fn poisoned() -> Error {
    Error::ConfigError("Server store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> ServerConfig {
        ServerConfig {
            host: host.into(),
            rcon_port: 25575,
            rcon_password: "hunter2".into(),
            ping_port: 25565,
        }
    }

    #[tokio::test]
    async fn resolves_by_guild_and_name() {
        let store = InMemoryServerStore::new();
        store.insert(GuildId(1), "survival", config("a.example")).unwrap();
        store.insert(GuildId(2), "survival", config("b.example")).unwrap();

        let found = store.resolve(GuildId(2), "survival").await.unwrap().unwrap();
        assert_eq!(found.host, "b.example");
        assert!(store.resolve(GuildId(1), "creative").await.unwrap().is_none());
        assert!(store.resolve(GuildId(3), "survival").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn names_are_case_sensitive() {
        let store = InMemoryServerStore::new();
        store.insert(GuildId(1), "Survival", config("a.example")).unwrap();
        assert!(store.resolve(GuildId(1), "survival").await.unwrap().is_none());
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", config("a.example"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn names_lists_one_guild() {
        let store = InMemoryServerStore::new();
        store.insert(GuildId(1), "b", config("b")).unwrap();
        store.insert(GuildId(1), "a", config("a")).unwrap();
        store.insert(GuildId(2), "c", config("c")).unwrap();
        assert_eq!(store.names(GuildId(1)).unwrap(), vec!["a", "b"]);
    }
}
