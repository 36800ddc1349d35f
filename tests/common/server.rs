//! Test relay management.
//!
//! Spawns the relay binary against a [`FakeTwitch`](super::FakeTwitch) with
//! a throwaway config and database.

use std::process::{Child, Command};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::sleep;

/// A running relay process. Killed on drop.
pub struct TestRelay {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestRelay {
    pub async fn spawn(upstream: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let port = free_port()?;

        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[twitch]
username = "relaybot"
oauth = "secret"
address = "{upstream}"
tls = false

[listen]
address = "127.0.0.1:{port}"

[status]
address = "127.0.0.1:0"

[database]
path = "{db}"
"#,
            db = data_dir.path().join("relay.db").display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_tmi-relay"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let relay = Self {
            child,
            port,
            _data_dir: data_dir,
        };
        relay.wait_until_ready().await?;
        Ok(relay)
    }

    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(self.address()).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("relay failed to start within 5 seconds")
    }

    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub async fn connect(&self) -> anyhow::Result<super::TestClient> {
        super::TestClient::connect(&self.address()).await
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
