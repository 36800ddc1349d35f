//! tmi-relay - a local IRC proxy in front of one Twitch chat session.
//!
//! Local clients join, part and send through the relay; every outbound
//! message goes through a per-channel scheduler that spaces sends by the
//! cooldown the account's privilege level allows.

mod config;
mod db;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod notify;
mod relay;
mod scheduler;
mod status;
mod upstream;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::Database;
use crate::network::Gateway;
use crate::notify::{BroadcastNotifier, PrivilegeNotifier, RedisNotifier};
use crate::relay::{Relay, RelayOptions};
use crate::upstream::TmiClient;

/// Upstream events buffered between the session reader and the relay.
const EVENT_QUEUE: usize = 1024;

/// How long tasks get to wind down after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        login = %config.twitch.username,
        upstream = %config.twitch.address,
        listen = %config.listen.address,
        "Starting tmi-relay"
    );

    metrics::init();

    let db = Database::new(&config.database.path).await?;
    info!(path = %config.database.path, "Database ready");

    let notifier: Arc<dyn PrivilegeNotifier> = match &config.notify.redis_url {
        Some(url) => {
            let topic = config.notify.topic();
            let notifier = RedisNotifier::connect(url, topic.clone()).await?;
            info!(topic = %topic, "Publishing privilege changes to Redis");
            Arc::new(notifier)
        }
        None => {
            info!("No redis_url configured, privilege changes stay in-process");
            Arc::new(BroadcastNotifier::new(64))
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);

    let upstream = TmiClient::connect(config.twitch.clone(), events_tx, shutdown_tx.clone())
        .await
        .map_err(|e| {
            error!(error = %e, code = e.error_code(), "Failed to establish upstream session");
            e
        })?;

    let relay = Relay::new(
        RelayOptions {
            own_login: config.twitch.username.clone(),
            scheduler: config.scheduler.clone(),
            marker: config.evasion.marker_char(),
        },
        db,
        upstream,
        notifier,
        shutdown_tx.clone(),
    );

    // Joins are rate limited, so restoring a long channel list takes a while.
    {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            if let Err(e) = relay.restore_channels().await {
                error!(error = %e, "Failed to restore persisted channels");
            }
        });
    }

    tokio::spawn(Arc::clone(&relay).run_events(events_rx, shutdown_tx.subscribe()));

    if config.status.enabled() {
        tokio::spawn(http::run_http_server(
            config.status.address,
            Arc::clone(&relay),
            shutdown_tx.subscribe(),
        ));
    } else {
        info!("Status server disabled");
    }

    let gateway = Gateway::bind(config.listen.clone(), Arc::clone(&relay)).await?;
    let gateway_task = tokio::spawn(gateway.run(shutdown_tx.clone()));

    wait_for_signal().await;
    info!(
        queued = relay.scheduler().queued_total(),
        "Shutting down, queued messages are discarded"
    );
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, gateway_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "Gateway error"),
        Ok(Err(e)) => error!(error = %e, "Gateway task failed"),
        Err(_) => warn!("Shutdown grace period elapsed, exiting anyway"),
    }

    info!("Stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = terminate.recv() => info!("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Ctrl-C received");
}
