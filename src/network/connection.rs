//! Connection - one local client socket.
//!
//! ```text
//!   socket ──▶ FramedRead(TolerantLineCodec) ──▶ Registry ──▶ handlers
//!                                                      │
//!   broadcast ─────────────┐                           ▼
//!                          ▼                    outbound queue
//!   socket ◀── FramedWrite ◀── writer task ◀────────────┘
//! ```
//!
//! The reader loop and the writer task are independent, so a handler
//! queuing replies never waits on its own reader.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tmi_proto::{Frame, LineCodec, TolerantLineCodec};
use tokio::net::TcpStream;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, warn};

use super::connections::{ConnectionHandle, ConnectionId};
use crate::config::ListenConfig;
use crate::error::ConnectionError;
use crate::handlers::{Context, Registry};
use crate::relay::Relay;

/// A client connection handler.
pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
    relay: Arc<Relay>,
    registry: Arc<Registry>,
    config: ListenConfig,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        stream: TcpStream,
        addr: SocketAddr,
        relay: Arc<Relay>,
        registry: Arc<Registry>,
        config: ListenConfig,
    ) -> Self {
        Self {
            id,
            addr,
            stream,
            relay,
            registry,
            config,
        }
    }

    /// Serve the client until it disconnects, fails, or shutdown fires.
    ///
    /// The connection is registered with the relay's connection set for the
    /// whole run and removed on every exit path.
    #[instrument(skip_all, fields(id = self.id, addr = %self.addr), name = "connection")]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ConnectionError> {
        info!("Client connected");

        let (read_half, write_half) = self.stream.into_split();
        let mut reader = FramedRead::new(
            read_half,
            TolerantLineCodec::with_max_len(self.config.max_line_len),
        );
        let mut writer = FramedWrite::new(write_half, LineCodec::with_max_len(self.config.max_line_len));

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<String>(self.config.send_queue);
        let kill = Arc::new(Notify::new());

        self.relay.connections().insert(
            self.id,
            ConnectionHandle {
                sender: outgoing_tx.clone(),
                kill: Arc::clone(&kill),
            },
        );

        let writer_kill = Arc::clone(&kill);
        let writer_task = tokio::spawn(async move {
            while let Some(line) = outgoing_rx.recv().await {
                if let Err(e) = writer.send(line).await {
                    warn!(error = %e, "Write error");
                    writer_kill.notify_one();
                    break;
                }
            }
        });

        let result = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Closing for shutdown");
                    break Ok(());
                }
                _ = kill.notified() => {
                    break Err(ConnectionError::ConnectionClosed);
                }
                frame = reader.next() => match frame {
                    Some(Ok(Frame::Line(line))) => {
                        debug!(raw = %line, "Received line");
                        let mut ctx = Context {
                            relay: &self.relay,
                            sender: &outgoing_tx,
                            id: self.id,
                            addr: self.addr,
                        };
                        match self.registry.dispatch(&mut ctx, &line).await {
                            Ok(()) => {}
                            Err(e) if e.is_fatal() => break Err(ConnectionError::ConnectionClosed),
                            Err(e) => debug!(error = %e, code = e.error_code(), "Line ignored"),
                        }
                    }
                    Some(Ok(Frame::Skipped(e))) => {
                        debug!(error = %e, "Unreadable line ignored");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read error");
                        break Err(e.into());
                    }
                    None => break Ok(()),
                },
            }
        };

        self.relay.connections().remove(self.id);
        writer_task.abort();
        info!("Client disconnected");

        result
    }
}
