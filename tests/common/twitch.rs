//! Fake upstream chat server.
//!
//! Accepts one relay session, answers the login with 001, records every
//! line the relay sends and lets the test push lines back.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};

pub struct FakeTwitch {
    address: String,
    received: Arc<Mutex<Vec<String>>>,
    push: mpsc::UnboundedSender<String>,
}

impl FakeTwitch {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();
        let received = Arc::new(Mutex::new(Vec::new()));
        let (push, mut push_rx) = mpsc::unbounded_channel::<String>();

        let log = Arc::clone(&received);
        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            loop {
                tokio::select! {
                    line = lines.next_line() => {
                        let Ok(Some(line)) = line else { break };
                        if line.starts_with("NICK ") {
                            let welcome = ":tmi.twitch.tv 001 relaybot :Welcome, GLHF!\r\n";
                            if write.write_all(welcome.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                        log.lock().push(line);
                    }
                    Some(line) = push_rx.recv() => {
                        if write.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            address,
            received,
            push,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a raw line to the relay as if from the chat server.
    pub fn push(&self, line: &str) {
        let _ = self.push.send(line.to_string());
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }

    /// Wait until the relay has sent `line`.
    pub async fn expect_line(&self, line: &str, within: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.received.lock().iter().any(|l| l == line) {
                return Ok(());
            }
            sleep(Duration::from_millis(20)).await;
        }
        anyhow::bail!("upstream never received {line:?}, got {:?}", self.received())
    }
}
