use std::io;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::protocol::{ClientInput, SceneSnapshot, ServerMessage};

/// Channel for sending serialized frames to the connected client.
type FrameTx = mpsc::UnboundedSender<Vec<u8>>;

/// WebSocket feed for a single client.
///
/// Pushes msgpack `ServerMessage` frames and decodes msgpack `ClientInput`
/// frames from the client.
pub struct SnapshotServer {
    /// The host loop serializes into this; the write task drains it.
    client_tx: Option<FrameTx>,

    /// Decoded client inputs, pushed by the read task.
    pub input_rx: mpsc::UnboundedReceiver<ClientInput>,
}

impl SnapshotServer {
    /// Binds `addr` and waits for exactly one WebSocket client. Once it has
    /// connected a write task and a read task are spawned.
    pub async fn start(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Combat host listening on ws://{}", addr);
        info!("Waiting for a client connection...");

        let (stream, peer) = listener.accept().await?;
        info!("Client connected from {}", peer);

        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::ConnectionAborted, e))?;
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let (client_tx, mut client_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (input_tx, input_rx) = mpsc::unbounded_channel::<ClientInput>();

        // ── Write task ──────────────────────────────────────────────
        tokio::spawn(async move {
            while let Some(bytes) = client_rx.recv().await {
                if let Err(e) = ws_write.send(Message::Binary(bytes)).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
            info!("Write task shutting down");
        });

        // ── Read task ───────────────────────────────────────────────
        tokio::spawn(async move {
            while let Some(result) = ws_read.next().await {
                let msg = match result {
                    Ok(msg) => msg,
                    Err(e) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                };
                if !msg.is_binary() {
                    continue;
                }
                match rmp_serde::from_slice::<ClientInput>(&msg.into_data()) {
                    Ok(input) => {
                        if input_tx.send(input).is_err() {
                            warn!("Input channel closed");
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to decode ClientInput: {}", e),
                }
            }
            info!("Read task shutting down");
        });

        Ok(Self {
            client_tx: Some(client_tx),
            input_rx,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.client_tx.is_some()
    }

    pub fn send_snapshot(&mut self, snapshot: &SceneSnapshot) {
        self.send_message(&ServerMessage::Scene(snapshot.clone()));
    }

    /// Serializes `msg` and queues it for the client. No-op once the client
    /// has gone away.
    pub fn send_message(&mut self, msg: &ServerMessage) {
        let Some(tx) = &self.client_tx else {
            return;
        };
        match encode(msg) {
            Ok(bytes) => {
                if tx.send(bytes).is_err() {
                    warn!("Client disconnected, stopping sends");
                    self.client_tx = None;
                }
            }
            Err(e) => error!("Failed to serialize ServerMessage: {}", e),
        }
    }
}

pub fn encode(msg: &ServerMessage) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(msg)
}
