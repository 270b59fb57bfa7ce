use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::service::rcon_client::{RconClient, RconOptions};
use crate::service::store::{not_found, GuildId, ServerConfigStore, ServerKey};
use crate::utils::metrics;

/// Sent by a failed client; names the exact pool entry to drop
#[derive(Debug)]
struct Eviction {
    key: ServerKey,
    instance: u64,
}

struct Entry {
    instance: u64,
    client: Arc<RconClient>,
}

struct PoolState {
    clients: HashMap<ServerKey, Entry>,
    evictions: mpsc::UnboundedReceiver<Eviction>,
}

impl PoolState {
    /// Apply pending evictions. An entry is only removed while it still holds
    /// the instance that reported the failure.
    fn drain_evictions(&mut self) {
        while let Ok(eviction) = self.evictions.try_recv() {
            let current = self
                .clients
                .get(&eviction.key)
                .is_some_and(|entry| entry.instance == eviction.instance);
            if !current {
                continue;
            }
            if let Some(entry) = self.clients.remove(&eviction.key) {
                entry.client.dispose();
                metrics::global().client_evicted();
                debug!(server = %eviction.key, "Evicted RCON client");
            }
        }
    }
}

/// Authenticated RCON clients cached per guild and server name.
///
/// One lock guards the whole map, so lookups, inserts and evictions for every
/// server serialize. Commands run on the returned client outside that lock.
///
/// Clients do not hold a reference to the pool. A client whose transport fails
/// posts an eviction message; the next lookup applies it and connects afresh.
/// A caller still holding the evicted client sees [`Error::Disposed`].
pub struct RconClientPool {
    store: Arc<dyn ServerConfigStore>,
    config: ClientConfig,
    state: Mutex<PoolState>,
    evictions: mpsc::UnboundedSender<Eviction>,
    next_instance: AtomicU64,
}

impl RconClientPool {
    pub fn new(store: Arc<dyn ServerConfigStore>, config: ClientConfig) -> Self {
        let (evictions, receiver) = mpsc::unbounded_channel();
        Self {
            store,
            config,
            state: Mutex::new(PoolState {
                clients: HashMap::new(),
                evictions: receiver,
            }),
            evictions,
            next_instance: AtomicU64::new(1),
        }
    }

    /// Cached client for `name` in `guild_id`, connecting a new one on a miss.
    ///
    /// Returns [`Error::NotFound`] when the store has no such server, and the
    /// connect error (e.g. [`Error::InvalidCredentials`]) when login fails; a
    /// failed client is never cached.
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn get_client(
        &self,
        guild_id: GuildId,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<RconClient>> {
        let mut state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            state = self.state.lock() => state,
        };
        state.drain_evictions();

        let key = ServerKey::new(guild_id, name);
        if let Some(entry) = state.clients.get(&key) {
            return Ok(Arc::clone(&entry.client));
        }

        let server = self
            .store
            .resolve(guild_id, name)
            .await?
            .ok_or_else(|| not_found(name))?;

        let instance = self.next_instance.fetch_add(1, Ordering::Relaxed);
        let options = RconOptions {
            host: server.host,
            port: server.rcon_port,
            password: server.rcon_password,
        };
        let notify = {
            let evictions = self.evictions.clone();
            let key = key.clone();
            move || {
                // the pool is gone when the receiver is closed, nothing to evict from
                let _ = evictions.send(Eviction {
                    key: key.clone(),
                    instance,
                });
            }
        };
        let client = Arc::new(RconClient::new(options, &self.config).with_invalidate(notify));

        if let Err(e) = client.connect(cancel).await {
            client.dispose();
            return Err(e);
        }

        debug!(server = %key, instance, "Cached new RCON client");
        state.clients.insert(
            key,
            Entry {
                instance,
                client: Arc::clone(&client),
            },
        );
        Ok(client)
    }

    /// Number of cached clients, after applying pending evictions
    pub async fn len(&self) -> usize {
        let mut state = self.state.lock().await;
        state.drain_evictions();
        state.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Drop for RconClientPool {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (_, entry) in state.clients.drain() {
            entry.client.dispose();
        }
    }
}
