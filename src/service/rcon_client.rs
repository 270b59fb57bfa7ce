use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{ClientConfig, RCON_MAX_SERVERBOUND_PAYLOAD};
use crate::core::codec::RconCodec;
use crate::core::rcon_packet::{RconPacket, RconPacketType};
use crate::error::{constants, Error, Result};
use crate::transport::PacketTransport;
use crate::utils::metrics;

/// Separators of the vanilla `whitelist list` reply, e.g.
/// `There are 3 whitelisted players: alice, bob and carol`
const WHITELIST_SEPARATORS: [&str; 3] = [", ", " and ", ":"];

/// Where and how to authenticate
#[derive(Clone)]
pub struct RconOptions {
    pub host: String,
    pub port: u16,
    pub password: String,
}

impl fmt::Debug for RconOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Called when a command fails in a way that leaves the connection unusable
pub type InvalidateFn = Box<dyn Fn() + Send + Sync>;

struct Session {
    transport: PacketTransport<RconCodec>,
    next_id: i32,
}

impl Session {
    /// Packet IDs start at 1 and are never reused. Overflow after `i32::MAX`
    /// commands on one client is not handled.
    fn allocate_id(&mut self) -> i32 {
        debug_assert!(self.next_id < i32::MAX, "RCON packet ID space exhausted");
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Authenticated RCON connection to one Minecraft server.
///
/// All operations are serialized by an internal lock: RCON cannot tell apart
/// replies to concurrent commands, so exactly one request/response cycle is in
/// flight at a time. The client is shared as `Arc<RconClient>`.
///
/// A transport failure while running a command (reset, EOF, malformed reply,
/// cancellation) disconnects the client and calls its invalidation callback.
/// The client does not reconnect on its own; obtain a fresh one instead.
pub struct RconClient {
    options: RconOptions,
    session: Mutex<Session>,
    connected: AtomicBool,
    invalidate: Option<InvalidateFn>,
    shutdown: CancellationToken,
}

impl RconClient {
    pub fn new(options: RconOptions, config: &ClientConfig) -> Self {
        let codec = RconCodec::new(config.max_rcon_payload, RCON_MAX_SERVERBOUND_PAYLOAD);
        let transport = PacketTransport::new(codec).with_connect_timeout(config.connect_timeout);
        Self {
            options,
            session: Mutex::new(Session {
                transport,
                next_id: 1,
            }),
            connected: AtomicBool::new(false),
            invalidate: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Register the callback fired on transport failure
    pub fn with_invalidate<F>(mut self, invalidate: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.invalidate = Some(Box::new(invalidate));
        self
    }

    pub fn options(&self) -> &RconOptions {
        &self.options
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Open the connection and log in with the configured password.
    ///
    /// A login reply whose ID differs from the request ID means the password was
    /// rejected: [`Error::InvalidCredentials`], and the client stays disconnected.
    #[instrument(skip(self, cancel), fields(host = %self.options.host, port = self.options.port))]
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        let mut session = self.lock_session(cancel).await?;
        self.connected.store(false, Ordering::Release);

        let result = self
            .guarded(Self::login(&mut session, &self.options, cancel))
            .await;
        match &result {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                info!("RCON session authenticated");
            }
            Err(Error::InvalidCredentials) => {
                session.transport.disconnect();
                metrics::global().login_failed();
                warn!("RCON login rejected");
            }
            Err(e) => {
                session.transport.disconnect();
                warn!(error = %e, "RCON connect failed");
            }
        }
        result
    }

    /// Run a console command and return its complete output.
    ///
    /// The server may split a reply over several packets. An empty command with
    /// its own ID follows the real one; its reply marks the end of the output.
    #[instrument(skip(self, cancel), fields(host = %self.options.host))]
    pub async fn send_command(&self, command: &str, cancel: &CancellationToken) -> Result<String> {
        let length = command.chars().count();
        if length > RCON_MAX_SERVERBOUND_PAYLOAD {
            return Err(Error::ProtocolViolation(format!(
                "{}: {} > {}",
                constants::ERR_PAYLOAD_TOO_LONG,
                length,
                RCON_MAX_SERVERBOUND_PAYLOAD
            )));
        }

        let mut session = self.lock_session(cancel).await?;
        if !self.is_connected() || !session.transport.is_connected() {
            return Err(Error::NotConnected);
        }

        let _timer = metrics::Timer::start("rcon_command");
        let result = self
            .guarded(Self::exchange(&mut session, command, cancel))
            .await;
        match &result {
            Ok(_) => metrics::global().command_sent(),
            Err(e) if e.is_transport_failure() => {
                self.connected.store(false, Ordering::Release);
                session.transport.disconnect();
                drop(session);
                warn!(error = %e, "RCON command failed, invalidating client");
                if let Some(invalidate) = &self.invalidate {
                    invalidate();
                }
            }
            Err(Error::Disposed) => session.transport.disconnect(),
            Err(_) => {}
        }
        result
    }

    /// `true` when the player was added
    pub async fn add_to_whitelist(&self, username: &str, cancel: &CancellationToken) -> Result<bool> {
        let reply = self.send_command(&format!("whitelist add {username}"), cancel).await?;
        Ok(starts_with_ignore_case(&reply, "added"))
    }

    /// `true` when the player was removed
    pub async fn remove_from_whitelist(&self, username: &str, cancel: &CancellationToken) -> Result<bool> {
        let reply = self
            .send_command(&format!("whitelist remove {username}"), cancel)
            .await?;
        Ok(starts_with_ignore_case(&reply, "removed"))
    }

    pub async fn list_whitelist(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let reply = self.send_command("whitelist list", cancel).await?;
        Ok(parse_whitelist(&reply))
    }

    /// `true` when the player is now an operator
    pub async fn op(&self, username: &str, cancel: &CancellationToken) -> Result<bool> {
        let reply = self.send_command(&format!("op {username}"), cancel).await?;
        Ok(starts_with_ignore_case(&reply, "made") || starts_with_ignore_case(&reply, "opped"))
    }

    /// `true` when the player is no longer an operator
    pub async fn deop(&self, username: &str, cancel: &CancellationToken) -> Result<bool> {
        let reply = self.send_command(&format!("deop {username}"), cancel).await?;
        Ok(starts_with_ignore_case(&reply, "made") || starts_with_ignore_case(&reply, "de-opped"))
    }

    /// Broadcast a chat message to every player
    pub async fn say(&self, message: &str, cancel: &CancellationToken) -> Result<()> {
        self.send_command(&format!("say {message}"), cancel).await?;
        Ok(())
    }

    /// Shut the client down.
    ///
    /// In-flight operations are interrupted and return [`Error::Disposed`], as
    /// does every later call. Idempotent.
    pub fn dispose(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.connected.store(false, Ordering::Release);
        // an operation holding the lock drops its connection when interrupted
        if let Ok(mut session) = self.session.try_lock() {
            session.transport.disconnect();
        }
        debug!(host = %self.options.host, port = self.options.port, "RCON client disposed");
    }

    async fn login(session: &mut Session, options: &RconOptions, cancel: &CancellationToken) -> Result<()> {
        session.transport.connect(&options.host, options.port, cancel).await?;

        let id = session.allocate_id();
        let login = RconPacket::new(id, RconPacketType::Login, options.password.as_str());
        session.transport.send(login, cancel).await?;

        let reply = session.transport.receive(cancel).await?;
        if reply.id != id {
            return Err(Error::InvalidCredentials);
        }
        Ok(())
    }

    async fn exchange(session: &mut Session, command: &str, cancel: &CancellationToken) -> Result<String> {
        let command_id = session.allocate_id();
        let end_id = session.allocate_id();

        session
            .transport
            .send(RconPacket::new(command_id, RconPacketType::Command, command), cancel)
            .await?;
        session
            .transport
            .send(RconPacket::new(end_id, RconPacketType::Command, ""), cancel)
            .await?;

        let mut output = String::new();
        loop {
            let packet = session.transport.receive(cancel).await?;
            match packet.id {
                id if id == command_id => output.push_str(&packet.payload),
                id if id == end_id => return Ok(output),
                id if id < 0 => return Err(Error::violation(constants::ERR_UNAUTHENTICATED_REPLY)),
                id => {
                    return Err(Error::ProtocolViolation(format!(
                        "{}: {} (expected {} or {})",
                        constants::ERR_UNEXPECTED_RESPONSE_ID,
                        id,
                        command_id,
                        end_id
                    )))
                }
            }
        }
    }

    async fn lock_session(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, Session>> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Disposed),
            _ = cancel.cancelled() => Err(Error::Cancelled),
            session = self.session.lock() => Ok(session),
        }
    }

    /// Run `operation` unless the client is disposed first
    async fn guarded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(Error::Disposed),
            result = operation => result,
        }
    }
}

impl fmt::Debug for RconClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RconClient")
            .field("options", &self.options)
            .field("connected", &self.is_connected())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Usernames listed in a `whitelist list` reply.
///
/// Everything up to the first `:` is the player count clause; a reply without
/// names yields an empty list.
pub fn parse_whitelist(reply: &str) -> Vec<String> {
    let Some((_, names)) = reply.split_once(':') else {
        return Vec::new();
    };

    let mut parts = vec![names];
    for separator in WHITELIST_SEPARATORS {
        parts = parts.into_iter().flat_map(|part| part.split(separator)).collect();
    }
    parts
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
