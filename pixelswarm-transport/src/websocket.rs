//! Broadcasts messages to every connected browser viewer.

use crate::{Sender, TransportError};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Messages buffered per client before slow viewers start skipping frames.
const CHANNEL_CAPACITY: usize = 16;

type Clients = Arc<Mutex<HashSet<SocketAddr>>>;

/// WebSocket server that fans every sent message out to its clients.
///
/// The server runs on its own Tokio runtime so the frame loop stays
/// synchronous. The scene message is cached and replayed to clients that
/// connect after it was sent.
pub struct WebSocketSender {
    addr: SocketAddr,
    tx: Option<broadcast::Sender<String>>,
    scene: Arc<Mutex<Option<String>>>,
    clients: Clients,
    runtime: Option<Runtime>,
}

impl WebSocketSender {
    pub fn new(host: &str, port: u16) -> Result<Self, TransportError> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| TransportError::Configuration(format!("Invalid address: {}", e)))?;
        Ok(Self {
            addr,
            tx: None,
            scene: Arc::new(Mutex::new(None)),
            clients: Arc::new(Mutex::new(HashSet::new())),
            runtime: None,
        })
    }

    /// Binds the listener and starts accepting clients in the background.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let listener = runtime
            .block_on(TcpListener::bind(self.addr))
            .map_err(|e| TransportError::WebSocket(format!("Failed to bind {}: {}", self.addr, e)))?;
        self.addr = listener.local_addr()?;
        info!("WebSocket server listening on ws://{}", self.addr);

        let (tx, _) = broadcast::channel::<String>(CHANNEL_CAPACITY);
        self.tx = Some(tx.clone());

        let clients = self.clients.clone();
        let scene = self.scene.clone();
        runtime.spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                let is_new = clients.lock().map(|mut set| set.insert(peer)).unwrap_or(false);
                if !is_new {
                    continue;
                }
                info!("Client connected: {}. Total clients: {}", peer, count(&clients));

                // Snapshot and subscribe under the scene lock so the scene is
                // delivered exactly once.
                let (greeting, rx) = match scene.lock() {
                    Ok(cached) => (cached.clone(), tx.subscribe()),
                    Err(_) => (None, tx.subscribe()),
                };
                tokio::spawn(handle_connection(stream, rx, greeting, peer, clients.clone()));
            }
        });

        self.runtime = Some(runtime);
        Ok(())
    }

    /// Address the server listens on. After [`start`](Self::start) this is
    /// the bound address, so a configured port of 0 resolves to the real one.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Sender for WebSocketSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransportError::WebSocket("WebSocket server not started".to_string()))?;
        let text = std::str::from_utf8(data)
            .map_err(|e| TransportError::WebSocket(format!("Invalid UTF-8: {}", e)))?
            .to_string();

        // The first message is always the scene.
        let mut cached = self
            .scene
            .lock()
            .map_err(|_| TransportError::WebSocket("Scene cache poisoned".to_string()))?;
        if cached.is_none() {
            *cached = Some(text.clone());
        }

        // Err only means nobody is listening right now.
        if tx.send(text).is_err() {
            debug!("No WebSocket clients connected; frame dropped");
        }
        Ok(())
    }

    fn client_count(&self) -> Option<usize> {
        Some(count(&self.clients))
    }
}

fn count(clients: &Clients) -> usize {
    clients.lock().map(|set| set.len()).unwrap_or(0)
}

async fn handle_connection(
    raw_stream: TcpStream,
    mut rx: broadcast::Receiver<String>,
    greeting: Option<String>,
    peer: SocketAddr,
    clients: Clients,
) {
    let ws_stream = match accept_async(raw_stream).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Error during WebSocket handshake with {}: {}", peer, e);
            remove_client(peer, &clients);
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    if let Some(scene) = greeting {
        if ws_sender.send(Message::Text(scene)).await.is_err() {
            remove_client(peer, &clients);
            return;
        }
    }

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(data) => {
                    if let Err(e) = ws_sender.send(Message::Text(data)).await {
                        if !is_disconnect_error(&e) {
                            warn!("WebSocket send error: {} - {}", peer, e);
                        }
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Client {} lagged, skipped {} messages", peer, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = ws_receiver.next() => match incoming {
                // Viewers don't talk back; anything but a close is ignored.
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if !is_disconnect_error(&e) {
                        warn!("WebSocket receive error: {} - {}", peer, e);
                    }
                    break;
                }
            },
        }
    }

    remove_client(peer, &clients);
}

fn is_disconnect_error(e: &WsError) -> bool {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Io(io_err) => matches!(
            io_err.kind(),
            std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}

fn remove_client(peer: SocketAddr, clients: &Clients) {
    let was_active = clients.lock().map(|mut set| set.remove(&peer)).unwrap_or(false);
    if was_active {
        info!("Client disconnected: {}. Total clients: {}", peer, count(clients));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rejects_bad_address() {
        assert!(matches!(
            WebSocketSender::new("not a host", 80),
            Err(TransportError::Configuration(_))
        ));
    }

    #[test]
    fn send_before_start_fails() {
        let mut sender = WebSocketSender::new("127.0.0.1", 0).unwrap();
        assert!(matches!(sender.send(b"{}"), Err(TransportError::WebSocket(_))));
        assert_eq!(sender.client_count(), Some(0));
    }

    #[test]
    fn start_resolves_the_bound_port() {
        let mut sender = WebSocketSender::new("127.0.0.1", 0).unwrap();
        sender.start().unwrap();
        assert_ne!(sender.local_addr().port(), 0);
    }

    #[test]
    fn late_client_gets_the_scene_once_then_live_frames() {
        let mut sender = WebSocketSender::new("127.0.0.1", 0).unwrap();
        sender.start().unwrap();
        let url = format!("ws://{}", sender.local_addr());
        sender.send(br#"{"kind":"scene"}"#).unwrap();
        sender.send(br#"{"kind":"frame","frame":0}"#).unwrap();

        let client = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        client.block_on(async {
            let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
            let wait = Duration::from_secs(5);

            let first = tokio::time::timeout(wait, ws.next()).await.unwrap().unwrap().unwrap();
            assert_eq!(first, Message::Text(r#"{"kind":"scene"}"#.to_string()));

            sender.send(br#"{"kind":"frame","frame":1}"#).unwrap();
            let second = tokio::time::timeout(wait, ws.next()).await.unwrap().unwrap().unwrap();
            assert_eq!(second, Message::Text(r#"{"kind":"frame","frame":1}"#.to_string()));
            assert_eq!(sender.client_count(), Some(1));
        });
    }

    #[test]
    fn start_and_broadcast_without_clients() {
        let mut sender = WebSocketSender::new("127.0.0.1", 0).unwrap();
        sender.start().unwrap();
        sender.send(br#"{"kind":"scene"}"#).unwrap();
        sender.send(br#"{"kind":"frame"}"#).unwrap();
        assert_eq!(sender.client_count(), Some(0));
    }
}
