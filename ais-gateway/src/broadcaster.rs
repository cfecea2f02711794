use std::{
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
};

use ais_core::VesselRecord;
use futures::SinkExt;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, UdpSocket, tcp::OwnedWriteHalf},
    sync::Mutex,
};
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::settings::ForwarderSettings;

struct TcpClient {
    addr: SocketAddr,
    writer: OwnedWriteHalf,
}

struct WsClient {
    addr: SocketAddr,
    stream: WebSocketStream<TcpStream>,
}

struct UdpForwarder {
    socket: UdpSocket,
    host: String,
    port: u16,
}

/// Owns every client collection. Connection handlers only append; the update
/// cycle does all the writing. A failed write drops that client and never
/// affects the others.
pub struct Broadcaster {
    tcp: Mutex<Vec<TcpClient>>,
    ws: Mutex<Vec<WsClient>>,
    udp: Option<UdpForwarder>,
    newly_connected: AtomicBool,
}

impl Broadcaster {
    pub async fn new(forwarder: Option<&ForwarderSettings>) -> Self {
        let udp = match forwarder {
            Some(f) => match UdpSocket::bind("0.0.0.0:0").await {
                Ok(socket) => Some(UdpForwarder {
                    socket,
                    host: f.host.clone(),
                    port: f.port,
                }),
                Err(e) => {
                    warn!("failed to bind udp forwarder socket: {e}");
                    None
                }
            },
            None => None,
        };
        Self {
            tcp: Mutex::new(Vec::new()),
            ws: Mutex::new(Vec::new()),
            udp,
            newly_connected: AtomicBool::new(false),
        }
    }

    pub async fn register_tcp(&self, stream: TcpStream, addr: SocketAddr) {
        info!("tcp client connected: {addr}");
        let (_, writer) = stream.into_split();
        self.tcp.lock().await.push(TcpClient { addr, writer });
        self.newly_connected.store(true, Ordering::Relaxed);
    }

    pub async fn register_ws(&self, stream: TcpStream, addr: SocketAddr) {
        match accept_async(stream).await {
            Ok(stream) => {
                info!("websocket client connected: {addr}");
                self.ws.lock().await.push(WsClient { addr, stream });
                self.newly_connected.store(true, Ordering::Relaxed);
            }
            Err(e) => warn!("websocket handshake with {addr} failed: {e}"),
        }
    }

    /// True when a client attached since the last call; cleared on read so a
    /// fresh client triggers exactly one full resend cycle.
    pub fn take_newly_connected(&self) -> bool {
        self.newly_connected.swap(false, Ordering::Relaxed)
    }

    /// Writes one sentence to every TCP client (`\r\n`-terminated) and every
    /// WebSocket client (as a text frame).
    pub async fn broadcast_sentence(&self, sentence: &str) {
        let line = format!("{sentence}\r\n");
        let mut clients = self.tcp.lock().await;
        let mut i = 0;
        while i < clients.len() {
            match clients[i].writer.write_all(line.as_bytes()).await {
                Ok(()) => i += 1,
                Err(e) => {
                    let client = clients.remove(i);
                    warn!("dropping tcp client {}: {e}", client.addr);
                }
            }
        }
        drop(clients);

        self.send_ws(Message::Text(sentence.to_string())).await;
    }

    /// Sends the merged record as JSON to WebSocket clients; the second
    /// message kind sharing their channel with the raw sentences.
    pub async fn broadcast_record(&self, vessel: &VesselRecord) {
        match serde_json::to_string(vessel) {
            Ok(json) => self.send_ws(Message::Text(json)).await,
            Err(e) => warn!("failed to serialize vessel {}: {e}", vessel.mmsi),
        }
    }

    async fn send_ws(&self, message: Message) {
        let mut clients = self.ws.lock().await;
        let mut i = 0;
        while i < clients.len() {
            match clients[i].stream.send(message.clone()).await {
                Ok(()) => i += 1,
                Err(e) => {
                    let client = clients.remove(i);
                    warn!("dropping websocket client {}: {e}", client.addr);
                }
            }
        }
    }

    /// Fire-and-forget relay of one sentence to the UDP collaborator.
    pub async fn forward_udp(&self, sentence: &str) {
        if let Some(udp) = self.udp.as_ref()
            && let Err(e) = udp
                .socket
                .send_to(sentence.as_bytes(), (udp.host.as_str(), udp.port))
                .await
        {
            warn!("udp forward to {}:{} failed: {e}", udp.host, udp.port);
        }
    }

    pub fn forwarding_enabled(&self) -> bool {
        self.udp.is_some()
    }

    pub async fn client_count(&self) -> usize {
        self.tcp.lock().await.len() + self.ws.lock().await.len()
    }

    /// Drops every client; their sockets close as the halves are dropped.
    pub async fn shutdown(&self) {
        let tcp = std::mem::take(&mut *self.tcp.lock().await);
        let mut ws = std::mem::take(&mut *self.ws.lock().await);
        for client in &mut ws {
            if let Err(e) = client.stream.close(None).await {
                debug!("websocket close for {} failed: {e}", client.addr);
            }
        }
        info!(
            "closed {} tcp and {} websocket clients",
            tcp.len(),
            ws.len()
        );
    }
}
