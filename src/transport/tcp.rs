use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::error::{constants, Error, Result};
use crate::utils::metrics;
use crate::utils::timeout::{with_timeout, DEFAULT_CONNECT_TIMEOUT};

/// A TCP connection that frames packets with a pluggable codec.
///
/// `C` decides the wire format: [`RconCodec`](crate::core::codec::RconCodec) for RCON,
/// [`SlpCodec`](crate::core::codec::SlpCodec) for Server List Ping. Reads are buffered,
/// so one packet may span several socket reads and several packets may arrive in one.
///
/// Every operation takes `&mut self`, which allows at most one receive or send in
/// flight. Callers sharing a transport serialize access themselves.
///
/// A connection reset or abort reported by the OS surfaces as
/// [`Error::ConnectionReset`]. Any failure, including cancellation of a send, tears
/// the connection down; a fresh [`connect`](Self::connect) is needed afterwards.
pub struct PacketTransport<C> {
    codec: C,
    connect_timeout: Duration,
    framed: Option<Framed<TcpStream, C>>,
    peer: Option<String>,
}

impl<C> PacketTransport<C>
where
    C: Decoder<Error = Error> + Clone,
{
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            framed: None,
            peer: None,
        }
    }

    /// Set a custom bound on establishing the TCP connection
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.framed.is_some()
    }

    /// `host:port` of the current connection
    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    /// Open the TCP connection, replacing any existing one.
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn connect(&mut self, host: &str, port: u16, cancel: &CancellationToken) -> Result<()> {
        self.disconnect();

        let connecting = with_timeout(
            async { Ok(TcpStream::connect((host, port)).await?) },
            self.connect_timeout,
        );
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = connecting => result,
        };

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                metrics::global().connection_error();
                warn!(error = %e, "Connect failed");
                return Err(e);
            }
        };
        // small request/response packets, don't wait to coalesce them
        stream.set_nodelay(true)?;

        self.framed = Some(Framed::new(stream, self.codec.clone()));
        self.peer = Some(format!("{host}:{port}"));
        metrics::global().connection_established();
        debug!("Connected");
        Ok(())
    }

    /// Wait for the next complete packet.
    ///
    /// Cancellation leaves the connection intact; bytes already read stay buffered
    /// for the next call.
    ///
    /// # Panics
    /// If the transport is not connected.
    pub async fn receive(&mut self, cancel: &CancellationToken) -> Result<C::Item> {
        let framed = self.framed_mut();
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            next = framed.next() => next,
        };

        match next {
            Some(Ok(packet)) => {
                trace!(peer = ?self.peer, "Packet received");
                Ok(packet)
            }
            Some(Err(e)) => Err(self.fail(e)),
            None => Err(self.fail(Error::UnexpectedEof)),
        }
    }

    /// Encode `packet` and flush it to the socket.
    ///
    /// Cancelling part way through a write would leave a partial frame on the
    /// wire, so it disconnects the transport.
    ///
    /// # Panics
    /// If the transport is not connected.
    pub async fn send<T>(&mut self, packet: T, cancel: &CancellationToken) -> Result<()>
    where
        C: Encoder<T, Error = Error>,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let framed = self.framed_mut();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = framed.send(packet) => result,
        };

        match result {
            Ok(()) => {
                trace!(peer = ?self.peer, "Packet sent");
                Ok(())
            }
            // rejected before any byte was written, the framing is intact
            Err(e @ Error::ProtocolViolation(_)) => Err(e),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Fail fast when used before a successful [`connect`](Self::connect).
    ///
    /// # Panics
    /// If the transport is not connected.
    pub fn assert_connected(&self) {
        if self.framed.is_none() {
            panic!("{}", constants::ERR_NOT_CONNECTED);
        }
    }

    /// Drop the connection, closing the socket.
    pub fn disconnect(&mut self) {
        if self.framed.take().is_some() {
            debug!(peer = ?self.peer, "Disconnected");
        }
        self.peer = None;
    }

    fn framed_mut(&mut self) -> &mut Framed<TcpStream, C> {
        match self.framed.as_mut() {
            Some(framed) => framed,
            None => panic!("{}", constants::ERR_NOT_CONNECTED),
        }
    }

    /// Tear the connection down after a failure and translate peer resets.
    fn fail(&mut self, error: Error) -> Error {
        let error = match error {
            Error::Io(e) if is_reset(&e) => Error::ConnectionReset,
            other => other,
        };
        metrics::global().connection_error();
        warn!(peer = ?self.peer, error = %error, "Transport failed, disconnecting");
        self.disconnect();
        error
    }
}

fn is_reset(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}
