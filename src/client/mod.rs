use crate::api::BulkFetcher;
use crate::bus::{ClientEvent, EventBus, EventKind, ListenerId};
use crate::config::LiveConfig;
use crate::connection::{
    ConnectionManager, ConnectionState, Connector, ReconnectPolicy, TungsteniteConnector,
};
use crate::dispatch::Dispatcher;
use crate::event::{BoundingBox, Domain};
use crate::session::{Session, User};
use crate::snapshot::StoreSnapshot;
use crate::store::{LiveStore, ResyncSummary};
use crate::ClientError;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// One live-conditions client: connection, stores, bulk fetch and session.
///
/// Build one per process and share it by reference or `Arc`; every piece
/// lives here rather than in globals.
pub struct LiveClient {
    config: LiveConfig,
    bus: Arc<EventBus>,
    store: Arc<LiveStore>,
    connection: ConnectionManager,
    fetcher: BulkFetcher,
    session: Session,
}

impl LiveClient {
    /// Client speaking WebSocket via tokio-tungstenite
    pub fn new(config: LiveConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    pub fn with_connector(config: LiveConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(LiveStore::new(Arc::clone(&bus)));
        let connection = ConnectionManager::new(
            config.live.clone(),
            ReconnectPolicy::from(&config.reconnect),
            connector,
            Dispatcher::new(Arc::clone(&store)),
            Arc::clone(&bus),
        );
        let fetcher = BulkFetcher::new(&config.api)?;

        Ok(Self {
            config,
            bus,
            store,
            connection,
            fetcher,
            session: Session::new(),
        })
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<LiveStore> {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Register a synchronous listener for one event kind
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, id: Option<ListenerId>) -> usize {
        self.bus.off(kind, id)
    }

    /// Async stream of every event
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.bus.subscribe()
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await
    }

    pub fn send<T: Serialize>(&self, frame: &T) -> Result<(), ClientError> {
        self.connection.send(frame)
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Replace one domain with a fresh bulk fetch
    pub async fn resync(
        &self,
        domain: Domain,
        bounds: Option<&BoundingBox>,
    ) -> Result<ResyncSummary> {
        let records = self.fetcher.fetch(domain, bounds).await?;
        Ok(self.store.set_all(domain, records))
    }

    /// Resync every domain in turn; a failed domain keeps its current records.
    pub async fn resync_all(
        &self,
        bounds: Option<&BoundingBox>,
    ) -> Vec<(Domain, Result<ResyncSummary>)> {
        let mut results = Vec::with_capacity(Domain::ALL.len());
        for domain in Domain::ALL {
            let result = self.resync(domain, bounds).await;
            if let Err(e) = &result {
                warn!(domain = %domain, error = %e, "Resync failed");
            }
            results.push((domain, result));
        }
        results
    }

    /// Write the store and signed-in user to the configured snapshot path
    pub fn save_snapshot(&self) -> Result<()> {
        let path = &self.config.snapshot.path;
        StoreSnapshot::from_store(&self.store, self.session.user())
            .save_to_file(path)
            .with_context(|| format!("Failed to save snapshot to {}", path.display()))
    }

    /// Restore from the configured snapshot path.
    ///
    /// Returns `Ok(false)` when there is no snapshot file yet.
    pub fn restore_snapshot(&self) -> Result<bool> {
        let path = &self.config.snapshot.path;
        if !path.exists() {
            info!(path = %path.display(), "No snapshot found, starting empty");
            return Ok(false);
        }

        let snapshot = StoreSnapshot::load_from_file(path)
            .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
        if let Some(user) = snapshot.user.clone() {
            self.session.set_user(user);
        }
        snapshot.apply(&self.store);
        Ok(true)
    }

    pub fn set_user(&self, user: User) {
        self.session.set_user(user);
    }

    /// Sign out and drop every cached record
    pub fn logout(&self) {
        self.session.logout(&self.store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeltaAction, DomainRecord};
    use mockito::Server;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(api_url: String, snapshot_dir: &TempDir) -> LiveConfig {
        let mut config = LiveConfig::default();
        config.api.base_url = api_url;
        config.snapshot.path = snapshot_dir.path().join("snapshot.json.gz");
        config
    }

    #[tokio::test]
    async fn test_resync_replaces_domain() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/weather")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "data": [{"id": "w9"}, {"id": "w8"}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let client = LiveClient::new(config(server.url(), &dir)).unwrap();
        client.store().apply_delta(
            Domain::Weather,
            DeltaAction::Create,
            DomainRecord::new("stale"),
            None,
        );

        let summary = client.resync(Domain::Weather, None).await.unwrap();

        assert_eq!(summary.count, 2);
        assert!(client.store().get(Domain::Weather, "stale").is_none());
        assert_eq!(client.store().records(Domain::Weather)[0].id, "w9");
    }

    #[tokio::test]
    async fn test_resync_all_reports_each_domain() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for domain in Domain::ALL {
            let (status, body) = if domain == Domain::Flood {
                (500, "down".to_string())
            } else {
                (200, json!({ "success": true, "data": [{ "id": domain.as_str() }] }).to_string())
            };
            mocks.push(
                server
                    .mock("GET", format!("/v1/{}", domain.resource_path()).as_str())
                    .with_status(status)
                    .with_body(body)
                    .create_async()
                    .await,
            );
        }

        let dir = TempDir::new().unwrap();
        let client = LiveClient::new(config(server.url(), &dir)).unwrap();
        client.store().apply_delta(
            Domain::Flood,
            DeltaAction::Create,
            DomainRecord::new("kept"),
            None,
        );

        let results = client.resync_all(None).await;

        assert_eq!(results.len(), Domain::ALL.len());
        for (domain, result) in &results {
            assert_eq!(result.is_ok(), *domain != Domain::Flood);
        }
        assert_eq!(client.store().len(Domain::Fire), 1);
        assert!(client.store().get(Domain::Flood, "kept").is_some());
    }

    #[tokio::test]
    async fn test_snapshot_restores_store_and_user() {
        let dir = TempDir::new().unwrap();
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "email": "sam@example.com",
            "name": "Sam",
            "createdAt": "2024-01-02T03:04:05Z"
        }))
        .unwrap();

        let first = LiveClient::new(config("http://127.0.0.1:9".to_string(), &dir)).unwrap();
        assert!(!first.restore_snapshot().unwrap());
        first.set_user(user.clone());
        first.store().apply_delta(
            Domain::Traffic,
            DeltaAction::Create,
            DomainRecord::new("t1"),
            None,
        );
        first.save_snapshot().unwrap();

        let second = LiveClient::new(config("http://127.0.0.1:9".to_string(), &dir)).unwrap();
        assert!(second.restore_snapshot().unwrap());
        assert_eq!(second.session().user(), Some(user));
        assert!(second.store().get(Domain::Traffic, "t1").is_some());
    }

    #[tokio::test]
    async fn test_logout_resets_store() {
        let dir = TempDir::new().unwrap();
        let client = LiveClient::new(config("http://127.0.0.1:9".to_string(), &dir)).unwrap();
        client.store().apply_delta(
            Domain::UserReport,
            DeltaAction::Create,
            DomainRecord::new("r1"),
            None,
        );

        client.logout();

        assert!(client.store().records(Domain::UserReport).is_empty());
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let dir = TempDir::new().unwrap();
        let client = LiveClient::new(config("http://127.0.0.1:9".to_string(), &dir)).unwrap();

        assert_eq!(client.state(), ConnectionState::Idle);
        assert!(matches!(
            client.send(&json!({ "type": "subscribe" })),
            Err(ClientError::NotConnected)
        ));
    }
}
