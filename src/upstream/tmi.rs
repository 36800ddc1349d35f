//! Twitch chat (TMI) client.
//!
//! One TCP or TLS connection, a writer fed by an mpsc queue and a reader
//! that answers PINGs itself and turns everything else into
//! [`UpstreamEvent`]s. After the first successful login the client keeps
//! reconnecting with backoff and rejoins the channels it was in.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use tmi_proto::{IrcCodec, LineCodec, Message, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_util::codec::Framed;
use tracing::{debug, info, instrument, warn};

use super::{UpstreamEvent, UpstreamSession};
use crate::config::TwitchConfig;
use crate::error::UpstreamError;
use crate::metrics;

const CAPABILITIES: &str = "twitch.tv/tags twitch.tv/commands twitch.tv/membership";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);
const OUTGOING_QUEUE: usize = 1024;

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

type Transport = Framed<Box<dyn AsyncStream>, LineCodec>;

/// Why a session ended.
enum SessionEnd {
    Shutdown,
    Lost,
}

/// Connected Twitch chat session.
pub struct TmiClient {
    config: TwitchConfig,
    outgoing: mpsc::Sender<String>,
    joined: Mutex<HashSet<String>>,
    join_limiter: DefaultDirectRateLimiter,
}

impl TmiClient {
    /// Connect and log in. Failing here is fatal to the relay; later
    /// disconnects are retried in the background.
    pub async fn connect(
        config: TwitchConfig,
        events: mpsc::Sender<UpstreamEvent>,
        shutdown: broadcast::Sender<()>,
    ) -> Result<Arc<Self>, UpstreamError> {
        let transport = establish(&config).await?;
        info!(address = %config.address, login = %config.username, "Upstream session established");

        let (outgoing, outgoing_rx) = mpsc::channel(OUTGOING_QUEUE);
        let client = Arc::new(Self {
            join_limiter: RateLimiter::direct(join_quota(config.verified)),
            config,
            outgoing,
            joined: Mutex::new(HashSet::new()),
        });

        let _ = events.send(UpstreamEvent::Connected).await;
        tokio::spawn(supervise(
            Arc::clone(&client),
            transport,
            outgoing_rx,
            events,
            shutdown.subscribe(),
        ));
        Ok(client)
    }

    /// Channels the session should be in.
    pub fn joined_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.joined.lock().iter().cloned().collect();
        channels.sort();
        channels
    }

    async fn send_line(&self, line: String) -> Result<(), UpstreamError> {
        self.outgoing.send(line).await?;
        Ok(())
    }

    async fn rejoin_all(&self) {
        for channel in self.joined_channels() {
            self.join_limiter.until_ready().await;
            if let Err(e) = self.send_line(format!("JOIN #{channel}")).await {
                warn!(channel = %channel, error = %e, "Rejoin failed");
                return;
            }
        }
    }
}

#[async_trait]
impl UpstreamSession for TmiClient {
    async fn join(&self, channel: &str) -> Result<(), UpstreamError> {
        self.joined.lock().insert(channel.to_owned());
        self.join_limiter.until_ready().await;
        self.send_line(format!("JOIN #{channel}")).await
    }

    async fn depart(&self, channel: &str) -> Result<(), UpstreamError> {
        self.joined.lock().remove(channel);
        self.send_line(format!("PART #{channel}")).await
    }

    async fn say(&self, channel: &str, text: &str) -> Result<(), UpstreamError> {
        let line = IrcCodec::sanitize(Message::privmsg(channel, text).to_string());
        self.send_line(line).await
    }

    async fn reply(
        &self,
        channel: &str,
        parent_id: &str,
        text: &str,
    ) -> Result<(), UpstreamError> {
        let msg = Message::privmsg(channel, text).with_tag("reply-parent-msg-id", parent_id);
        self.send_line(IrcCodec::sanitize(msg.to_string())).await
    }
}

/// 20 joins per 10 seconds, or 2000 for verified bots.
fn join_quota(verified: bool) -> Quota {
    if verified {
        Quota::per_second(nonzero!(200u32)).allow_burst(nonzero!(2000u32))
    } else {
        Quota::per_second(nonzero!(2u32)).allow_burst(nonzero!(20u32))
    }
}

fn tls_connector() -> TlsConnector {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!(error = %e, "Failed to add root cert");
        }
    }
    for e in &certs.errors {
        warn!(error = %e, "Error loading native certs");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

async fn open_stream(config: &TwitchConfig) -> Result<Box<dyn AsyncStream>, UpstreamError> {
    let tcp = TcpStream::connect(&config.address)
        .await
        .map_err(|e| UpstreamError::Unavailable(format!("{}: {e}", config.address)))?;
    tcp.set_nodelay(true)?;

    if !config.tls {
        return Ok(Box::new(tcp));
    }

    let server_name = ServerName::try_from(config.host().to_string())
        .map_err(|e| UpstreamError::Tls(e.to_string()))?;
    let tls = tls_connector()
        .connect(server_name, tcp)
        .await
        .map_err(|e| UpstreamError::Tls(e.to_string()))?;
    Ok(Box::new(tls))
}

/// Open the socket and log in.
#[instrument(skip(config), fields(address = %config.address), name = "upstream_handshake")]
async fn establish(config: &TwitchConfig) -> Result<Transport, UpstreamError> {
    let stream = open_stream(config).await?;
    let mut transport = Framed::new(stream, LineCodec::new());

    transport.send(format!("CAP REQ :{CAPABILITIES}")).await?;
    transport
        .send(format!("PASS oauth:{}", config.token()))
        .await?;
    transport.send(format!("NICK {}", config.username)).await?;

    timeout(HANDSHAKE_TIMEOUT, await_welcome(&mut transport))
        .await
        .map_err(|_| UpstreamError::HandshakeTimeout)??;
    Ok(transport)
}

async fn await_welcome(transport: &mut Transport) -> Result<(), UpstreamError> {
    while let Some(line) = transport.next().await {
        let line = line?;
        let Ok(msg) = line.parse::<Message>() else {
            continue;
        };
        match msg.command.as_str() {
            "001" => return Ok(()),
            "PING" => transport.send(pong(&msg)).await?,
            "NOTICE" => {
                let text = msg.trailing().unwrap_or_default();
                if text.contains("authentication failed") || text.contains("Improperly formatted auth") {
                    return Err(UpstreamError::LoginRejected(text.to_owned()));
                }
            }
            _ => {}
        }
    }
    Err(UpstreamError::Closed)
}

fn pong(ping: &Message) -> String {
    match ping.trailing() {
        Some(token) => format!("PONG :{token}"),
        None => "PONG".to_string(),
    }
}

/// Run sessions until shutdown, reconnecting whenever one is lost.
async fn supervise(
    client: Arc<TmiClient>,
    mut transport: Transport,
    mut outgoing: mpsc::Receiver<String>,
    events: mpsc::Sender<UpstreamEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let end = run_session(
            transport,
            &mut outgoing,
            &events,
            &mut shutdown,
            &client.config.username,
        )
        .await;
        if matches!(end, SessionEnd::Shutdown) {
            break;
        }

        warn!("Upstream session lost, reconnecting");
        let mut backoff = BACKOFF_START;
        transport = loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = sleep(backoff) => {}
            }
            match establish(&client.config).await {
                Ok(t) => break t,
                Err(e) => {
                    warn!(error = %e, code = e.error_code(), retry_in = ?backoff, "Upstream reconnect failed");
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
            }
        };

        metrics::inc_upstream_reconnects();
        info!("Upstream session re-established");
        if events.send(UpstreamEvent::Connected).await.is_err() {
            break;
        }
        let rejoin = Arc::clone(&client);
        tokio::spawn(async move { rejoin.rejoin_all().await });
    }
    debug!("Upstream supervisor exited");
}

async fn run_session(
    transport: Transport,
    outgoing: &mut mpsc::Receiver<String>,
    events: &mpsc::Sender<UpstreamEvent>,
    shutdown: &mut broadcast::Receiver<()>,
    own_login: &str,
) -> SessionEnd {
    let (mut sink, mut stream): (SplitSink<Transport, String>, SplitStream<Transport>) =
        transport.split();

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = sink.close().await;
                return SessionEnd::Shutdown;
            }
            line = outgoing.recv() => {
                let Some(line) = line else {
                    return SessionEnd::Shutdown;
                };
                if let Err(e) = sink.send(line).await {
                    warn!(error = %e, "Upstream write failed");
                    return SessionEnd::Lost;
                }
            }
            line = stream.next() => {
                let line = match line {
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        warn!(error = %e, "Upstream read failed");
                        return SessionEnd::Lost;
                    }
                    None => return SessionEnd::Lost,
                };
                let msg = match line.parse::<Message>() {
                    Ok(msg) => msg,
                    Err(ProtocolError::InvalidMessage { cause, .. }) => {
                        debug!(line = %line, error = %cause, "Ignoring unparsable upstream line");
                        continue;
                    }
                    Err(_) => continue,
                };

                if msg.command == "PING" {
                    if sink.send(pong(&msg)).await.is_err() {
                        return SessionEnd::Lost;
                    }
                    continue;
                }

                match UpstreamEvent::classify(&line, msg, own_login) {
                    Some(UpstreamEvent::Reconnect) => {
                        info!("Server requested reconnect");
                        return SessionEnd::Lost;
                    }
                    Some(event) => {
                        metrics::inc_upstream_event(event.kind());
                        if events.send(event).await.is_err() {
                            return SessionEnd::Shutdown;
                        }
                    }
                    None => {}
                }
            }
        }
    }
}
