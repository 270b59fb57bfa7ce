use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::service::slp_client::ServerListPingClient;
use crate::service::store::{not_found, GuildId, ServerConfigStore};

/// Builds connected [`ServerListPingClient`]s for registered servers.
///
/// Unlike RCON, nothing is cached: every call opens a new connection.
pub struct ServerListPingClientFactory {
    store: Arc<dyn ServerConfigStore>,
    config: ClientConfig,
}

impl ServerListPingClientFactory {
    pub fn new(store: Arc<dyn ServerConfigStore>, config: ClientConfig) -> Self {
        Self { store, config }
    }

    /// Connected client for `name` in `guild_id`, or [`Error::NotFound`](crate::error::Error::NotFound)
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn get_client(
        &self,
        guild_id: GuildId,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<ServerListPingClient> {
        let server = self
            .store
            .resolve(guild_id, name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let mut client = ServerListPingClient::new(server.host, server.ping_port, &self.config);
        client.connect(cancel).await?;
        Ok(client)
    }
}
