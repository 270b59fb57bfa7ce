//! Scripted localhost servers speaking RCON and Server List Ping.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use mc_remote::config::ClientConfig;
use mc_remote::core::codec::{RawFrameCodec, RconCodec};
use mc_remote::core::rcon_packet::{RconPacket, RconPacketType};
use mc_remote::core::slp_packet::{
    Handshake, Outbound, Ping, ServerStatus, StatusRequest, StatusResponse,
};
use mc_remote::service::{GuildId, InMemoryServerStore, ServerConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

pub const PASSWORD: &str = "hunter2";

/// How the fake RCON server answers one command
#[derive(Debug, Clone)]
pub enum Reply {
    /// One response packet per chunk, all with the command's ID
    Chunks(Vec<String>),
    /// A single response packet carrying this ID instead of the command's
    WrongId(i32),
    /// Close the connection without answering
    Hangup,
    /// Read the command and its end marker, never answer
    Silent,
}

pub type Handler = Arc<dyn Fn(&str) -> Reply + Send + Sync>;

pub struct FakeRcon {
    pub port: u16,
    pub logins: Arc<AtomicUsize>,
    pub connections: Arc<AtomicUsize>,
    /// Connections the server has seen end
    pub closed: Arc<AtomicUsize>,
    pub commands: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeRcon {
    /// Server that echoes `ok: <command>` for every command
    pub async fn start() -> Self {
        Self::with_handler(Arc::new(|command: &str| {
            Reply::Chunks(vec![format!("ok: {command}")])
        }))
        .await
    }

    pub async fn with_handler(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let logins = Arc::new(AtomicUsize::new(0));
        let connections = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let logins = logins.clone();
            let connections = connections.clone();
            let closed = closed.clone();
            let commands = commands.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let served = serve_rcon(stream, handler.clone(), logins.clone(), commands.clone());
                    let closed = closed.clone();
                    tokio::spawn(async move {
                        served.await;
                        closed.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            port,
            logins,
            connections,
            closed,
            commands,
            task,
        }
    }

    pub fn server_config(&self, password: &str) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            rcon_port: self.port,
            rcon_password: password.into(),
            ping_port: 0,
        }
    }
}

impl Drop for FakeRcon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_rcon(
    stream: TcpStream,
    handler: Handler,
    logins: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<String>>>,
) {
    let mut framed = Framed::new(stream, RconCodec::server());
    let mut silent = false;

    while let Some(Ok(packet)) = framed.next().await {
        match packet.kind {
            RconPacketType::Login => {
                let id = if packet.payload == PASSWORD {
                    logins.fetch_add(1, Ordering::SeqCst);
                    packet.id
                } else {
                    -1
                };
                let reply = RconPacket::new(id, RconPacketType::Command, "");
                if framed.send(reply).await.is_err() {
                    return;
                }
            }
            RconPacketType::Command if packet.payload.is_empty() => {
                if std::mem::take(&mut silent) {
                    continue;
                }
                let end = RconPacket::new(packet.id, RconPacketType::Response, "");
                if framed.send(end).await.is_err() {
                    return;
                }
            }
            RconPacketType::Command => {
                commands.lock().unwrap().push(packet.payload.clone());
                match handler(&packet.payload) {
                    Reply::Chunks(chunks) => {
                        for chunk in chunks {
                            let reply = RconPacket::new(packet.id, RconPacketType::Response, chunk);
                            if framed.feed(reply).await.is_err() {
                                return;
                            }
                        }
                    }
                    Reply::WrongId(id) => {
                        let reply = RconPacket::new(id, RconPacketType::Response, "");
                        if framed.feed(reply).await.is_err() {
                            return;
                        }
                    }
                    Reply::Hangup => return,
                    Reply::Silent => silent = true,
                }
            }
            RconPacketType::Response => return,
        }
    }
}

pub struct FakeSlp {
    pub port: u16,
    pub handshakes: Arc<Mutex<Vec<Handshake>>>,
    task: JoinHandle<()>,
}

impl FakeSlp {
    pub async fn start(status: ServerStatus) -> Self {
        Self::start_with(status, false).await
    }

    /// Server that answers a status request with a pong
    pub async fn pong_for_status(status: ServerStatus) -> Self {
        Self::start_with(status, true).await
    }

    async fn start_with(status: ServerStatus, pong_for_status: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handshakes = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let handshakes = handshakes.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    tokio::spawn(serve_slp(
                        stream,
                        status.clone(),
                        pong_for_status,
                        handshakes.clone(),
                    ));
                }
            })
        };

        Self {
            port,
            handshakes,
            task,
        }
    }
}

impl Drop for FakeSlp {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_slp(
    stream: TcpStream,
    status: ServerStatus,
    pong_for_status: bool,
    handshakes: Arc<Mutex<Vec<Handshake>>>,
) {
    let mut framed = Framed::new(stream, RawFrameCodec::default());

    let Some(Ok(first)) = framed.next().await else {
        return;
    };
    let Ok(handshake) = Handshake::parse(&first.data) else {
        return;
    };
    handshakes.lock().unwrap().push(handshake);

    while let Some(Ok(frame)) = framed.next().await {
        let sent = match frame.id {
            id if id == StatusRequest::ID && pong_for_status => framed.send(Ping { payload: 0 }).await,
            id if id == StatusRequest::ID => {
                let response = StatusResponse::new(status.clone()).unwrap();
                framed.send(response).await
            }
            id if id == Ping::ID => {
                let payload = i64::from_be_bytes(frame.data.as_slice().try_into().unwrap());
                framed.send(Ping { payload }).await
            }
            _ => return,
        };
        if sent.is_err() {
            return;
        }
    }
}

/// Store with one guild holding a single server
pub fn store_with(guild_id: GuildId, name: &str, config: ServerConfig) -> Arc<InMemoryServerStore> {
    let store = Arc::new(InMemoryServerStore::new());
    store.insert(guild_id, name, config).unwrap();
    store
}

pub fn client_config() -> ClientConfig {
    ClientConfig::default()
}
