//! Gateway - TCP listener that accepts local client connections.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::config::ListenConfig;
use crate::handlers::Registry;
use crate::network::Connection;
use crate::relay::Relay;

/// Accepts connections and spawns a [`Connection`] task for each.
pub struct Gateway {
    listener: TcpListener,
    relay: Arc<Relay>,
    registry: Arc<Registry>,
    config: ListenConfig,
}

impl Gateway {
    pub async fn bind(config: ListenConfig, relay: Arc<Relay>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %listener.local_addr()?, "Client listener bound");

        Ok(Self {
            listener,
            relay,
            registry: Arc::new(Registry::new()),
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown. Each connection gets its own
    /// subscription to `shutdown`.
    #[instrument(skip_all, name = "gateway")]
    pub async fn run(self, shutdown: broadcast::Sender<()>) -> anyhow::Result<()> {
        let mut stop = shutdown.subscribe();

        loop {
            tokio::select! {
                _ = stop.recv() => {
                    info!("Gateway stopping");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%addr, error = %e, "Failed to set TCP_NODELAY");
                    }

                    let id = self.relay.connections().next_id();
                    let connection = Connection::new(
                        id,
                        stream,
                        addr,
                        Arc::clone(&self.relay),
                        Arc::clone(&self.registry),
                        self.config.clone(),
                    );
                    let conn_shutdown = shutdown.subscribe();
                    tokio::spawn(async move {
                        if let Err(e) = connection.run(conn_shutdown).await {
                            debug!(id, %addr, error = %e, "Connection ended with error");
                        }
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::db::Database;
    use crate::notify::BroadcastNotifier;
    use crate::relay::RelayOptions;
    use crate::upstream::testing::{RecordingUpstream, UpstreamCall};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::time::{sleep, timeout};

    struct Running {
        addr: SocketAddr,
        relay: Arc<Relay>,
        upstream: Arc<RecordingUpstream>,
        shutdown: broadcast::Sender<()>,
    }

    async fn start() -> Running {
        let upstream = Arc::new(RecordingUpstream::default());
        let (shutdown, _) = broadcast::channel(1);
        let relay = Relay::new(
            RelayOptions {
                own_login: "relaybot".into(),
                scheduler: SchedulerConfig::default(),
                marker: '\u{E0000}',
            },
            Database::new(":memory:").await.unwrap(),
            upstream.clone(),
            Arc::new(BroadcastNotifier::new(8)),
            shutdown.clone(),
        );
        let config = ListenConfig {
            address: "127.0.0.1:0".parse().unwrap(),
            ..ListenConfig::default()
        };
        let gateway = Gateway::bind(config, Arc::clone(&relay)).await.unwrap();
        let addr = gateway.local_addr().unwrap();
        tokio::spawn(gateway.run(shutdown.clone()));
        Running {
            addr,
            relay,
            upstream,
            shutdown,
        }
    }

    async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        line
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..250 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn join_send_part_over_tcp() {
        let running = start().await;
        let (read_half, mut write_half) = TcpStream::connect(running.addr).await.unwrap().into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"JOIN #somechannel\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut reader).await,
            ":relaybot!relaybot@relaybot.tmi.twitch.tv JOIN #somechannel\r\n"
        );
        assert_eq!(
            running.relay.scheduler().level("somechannel"),
            Some(crate::scheduler::PrivilegeLevel::Write)
        );

        write_half
            .write_all(b"PRIVMSG #somechannel :hello\r\n")
            .await
            .unwrap();
        let upstream = Arc::clone(&running.upstream);
        wait_for(|| {
            upstream
                .calls()
                .contains(&UpstreamCall::Say("somechannel".into(), "hello".into()))
        })
        .await;

        write_half.write_all(b"PART #somechannel\r\n").await.unwrap();
        assert_eq!(
            read_line(&mut reader).await,
            ":relaybot!relaybot@relaybot.tmi.twitch.tv PART #somechannel\r\n"
        );

        let receipt = running
            .relay
            .scheduler()
            .enqueue(crate::scheduler::OutboundMessage::say("somechannel", "late"));
        assert!(receipt.catch_all);
        let says = running
            .upstream
            .calls()
            .into_iter()
            .filter(|c| matches!(c, UpstreamCall::Say(..)))
            .count();
        assert_eq!(says, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_connected_clients() {
        let running = start().await;
        let mut readers = Vec::new();
        for _ in 0..2 {
            let (read_half, write_half) = TcpStream::connect(running.addr).await.unwrap().into_split();
            readers.push((BufReader::new(read_half), write_half));
        }
        let relay = Arc::clone(&running.relay);
        wait_for(|| relay.connections().len() == 2).await;

        let raw = ":viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #forsen :hi";
        assert_eq!(running.relay.broadcast(raw), 2);
        for (reader, _) in &mut readers {
            assert_eq!(read_line(reader).await, format!("{raw}\r\n"));
        }
    }

    #[tokio::test]
    async fn unreadable_lines_do_not_close_the_connection() {
        let running = start().await;
        let (read_half, mut write_half) = TcpStream::connect(running.addr).await.unwrap().into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(b"PRIVMSG #forsen :caf\xe9\r\nPING :still-here\r\n")
            .await
            .unwrap();
        assert_eq!(
            read_line(&mut reader).await,
            ":tmi.twitch.tv PONG tmi.twitch.tv :still-here\r\n"
        );

        let mut overlong = vec![b'a'; tmi_proto::line::DEFAULT_MAX_LEN + 100];
        overlong.extend_from_slice(b"\r\nPING :after-long\r\n");
        write_half.write_all(&overlong).await.unwrap();
        assert_eq!(
            read_line(&mut reader).await,
            ":tmi.twitch.tv PONG tmi.twitch.tv :after-long\r\n"
        );
        assert_eq!(running.relay.connections().len(), 1);
    }

    #[tokio::test]
    async fn disconnect_removes_connection() {
        let running = start().await;
        let stream = TcpStream::connect(running.addr).await.unwrap();
        let relay = Arc::clone(&running.relay);
        wait_for(|| relay.connections().len() == 1).await;

        drop(stream);
        wait_for(|| relay.connections().is_empty()).await;
    }

    #[tokio::test]
    async fn shutdown_closes_clients() {
        let running = start().await;
        let (read_half, _write_half) = TcpStream::connect(running.addr).await.unwrap().into_split();
        let mut reader = BufReader::new(read_half);
        let relay = Arc::clone(&running.relay);
        wait_for(|| relay.connections().len() == 1).await;

        running.shutdown.send(()).unwrap();
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);
        wait_for(|| relay.connections().is_empty()).await;
    }
}
