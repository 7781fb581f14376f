use anyhow::{Context, Result};
use live_conditions::bus::{ClientEvent, ErrorEvent};
use live_conditions::config::{load_config, LiveConfig};
use live_conditions::LiveClient;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "live_conditions=info".into()),
        )
        .init();

    info!("Live conditions client starting...");

    // Config path: first CLI argument, then LIVE_CONFIG, else built-in defaults
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LIVE_CONFIG").ok())
        .map(PathBuf::from);

    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => LiveConfig::default(),
    };

    info!(
        config = ?config_path,
        live_url = %config.live.url,
        api_url = %config.api.base_url,
        "Configuration loaded"
    );

    let client = LiveClient::new(config).context("Failed to build live client")?;

    if client.config().snapshot.enabled {
        if let Err(e) = client.restore_snapshot() {
            warn!(error = %e, "Ignoring unusable snapshot");
        }
    }

    // Log everything the client reports
    let mut events = client.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // A failed first attempt is retried in the background
    if let Err(e) = client.connect().await {
        warn!(error = %e, "Initial connect failed");
    }

    let resynced = client
        .resync_all(None)
        .await
        .into_iter()
        .filter(|(_, result)| result.is_ok())
        .count();
    info!(domains = resynced, "Initial resync finished");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    client.disconnect().await;

    if client.config().snapshot.enabled {
        client.save_snapshot()?;
    }

    logger.abort();
    info!("Live conditions client stopped");

    Ok(())
}

fn log_event(event: &ClientEvent) {
    match event {
        ClientEvent::LiveUpdate(change) => info!(
            domain = %change.domain,
            id = %change.record.id,
            action = ?change.applied,
            total = change.records.len(),
            "Live update"
        ),
        ClientEvent::Resync(summary) => info!(
            domain = %summary.domain,
            records = summary.count,
            "Resync"
        ),
        ClientEvent::Connected => info!("Connected"),
        ClientEvent::Disconnected(d) => info!(
            code = d.code,
            reason = %d.reason,
            retry_in_ms = d.retry_in.map(|r| r.as_millis() as u64),
            "Disconnected"
        ),
        ClientEvent::Error(ErrorEvent::ReconnectExhausted { attempts }) => {
            error!(attempts = attempts, "Gave up reconnecting")
        }
        ClientEvent::Error(e) => warn!(error = ?e, "Client error"),
    }
}
