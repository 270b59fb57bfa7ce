use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::{ClientConfig, SLP_STATUS_PROTOCOL_VERSION};
use crate::core::codec::SlpCodec;
use crate::core::slp_packet::{Clientbound, Handshake, Ping, ServerStatus, StatusRequest};
use crate::error::{constants, Error, Result};
use crate::transport::PacketTransport;
use crate::utils::metrics;

/// Server List Ping connection to one Minecraft server.
///
/// [`connect`](Self::connect) performs the handshake; the connection then
/// serves one [`get_status`](Self::get_status) or [`ping`](Self::ping). Clients
/// are cheap and not pooled, create a new one per request.
pub struct ServerListPingClient {
    host: String,
    port: u16,
    transport: PacketTransport<SlpCodec>,
}

impl ServerListPingClient {
    pub fn new(host: impl Into<String>, port: u16, config: &ClientConfig) -> Self {
        let transport = PacketTransport::new(SlpCodec::new(config.max_slp_frame))
            .with_connect_timeout(config.connect_timeout);
        Self {
            host: host.into(),
            port,
            transport,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Open the connection and switch it to the status state.
    ///
    /// The handshake carries a negative protocol version so servers answer with
    /// their generic status rather than one tailored to a client version.
    #[instrument(skip(self, cancel), fields(host = %self.host, port = self.port))]
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.transport.connect(&self.host, self.port, cancel).await?;
        let handshake = Handshake::status(SLP_STATUS_PROTOCOL_VERSION, self.host.as_str(), self.port);
        if let Err(e) = self.transport.send(handshake, cancel).await {
            self.transport.disconnect();
            error!(error = %e, "Server List Ping handshake failed");
            return Err(e);
        }
        info!("Connected for Server List Ping");
        Ok(())
    }

    /// Request the server's status document
    #[instrument(skip(self, cancel), fields(host = %self.host, port = self.port))]
    pub async fn get_status(&mut self, cancel: &CancellationToken) -> Result<ServerStatus> {
        self.ensure_connected()?;
        let _timer = metrics::Timer::start("slp_status");
        let result = self.request_status(cancel).await;
        match &result {
            Ok(status) => {
                metrics::global().status_query();
                debug!(online = status.players.online, max = status.players.max, "Status received");
            }
            Err(e) => error!(error = %e, "Status query failed"),
        }
        result
    }

    /// Measure the round trip of a ping packet.
    ///
    /// The echoed payload is not compared with the one sent.
    #[instrument(skip(self, cancel), fields(host = %self.host, port = self.port))]
    pub async fn ping(&mut self, cancel: &CancellationToken) -> Result<Duration> {
        self.ensure_connected()?;
        let result = self.round_trip(cancel).await;
        match &result {
            Ok(elapsed) => {
                metrics::global().ping();
                debug!(latency_ms = elapsed.as_millis() as u64, "Pong received");
            }
            Err(e) => error!(error = %e, "Ping failed"),
        }
        result
    }

    async fn request_status(&mut self, cancel: &CancellationToken) -> Result<ServerStatus> {
        self.transport.send(StatusRequest, cancel).await?;
        match self.transport.receive(cancel).await? {
            Clientbound::Status(status) => Ok(status),
            other => Err(unexpected(&other)),
        }
    }

    async fn round_trip(&mut self, cancel: &CancellationToken) -> Result<Duration> {
        let payload: i64 = rand::random();
        self.transport.send(Ping { payload }, cancel).await?;
        let started = Instant::now();
        match self.transport.receive(cancel).await? {
            Clientbound::Pong(_) => Ok(started.elapsed()),
            other => Err(unexpected(&other)),
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

fn unexpected(packet: &Clientbound) -> Error {
    let name = match packet {
        Clientbound::Status(_) => "status response",
        Clientbound::Pong(_) => "pong",
    };
    Error::ProtocolViolation(format!("{}: {}", constants::ERR_UNEXPECTED_PACKET, name))
}
