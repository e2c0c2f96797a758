//! Headless live session for library consumers
//!
//! `LiveSession` wires the HTTP collaborator, the resource cache, the
//! subscription binder and the terminal multiplexer into one value that can
//! be used without any TUI dependencies. This is the primary entry point for
//! using k8slab as a library.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::{ApiClient, ApiError, ClusterApi, Endpoints, ExecOutput};
use crate::config::Config;
use crate::models::{AuthToken, CachedResource, CollectionKey};
use crate::terminal::{SessionError, SessionRouter, TerminalMode, TerminalMultiplexer, TerminalSession};
use crate::transport::{
    ConnectionConfig, ConnectionStatus, Connector, FrameCodec, WsConnector,
};
use crate::watcher::{CacheEvent, CacheSink, ResourceCache};

use super::{Interest, SubscriptionBinder, SubscriptionHandle};

/// A headless session against one k8slab server.
///
/// # Example
///
/// ```rust,no_run
/// use k8slab::config::Config;
/// use k8slab::models::{AuthToken, CollectionKey};
/// use k8slab::services::LiveSession;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::default();
/// let session = LiveSession::connect(&config, AuthToken::new("token"))?;
///
/// session.seed(CollectionKey::Clusters).await?;
/// let _subscription = session.watch(CollectionKey::Clusters);
///
/// for cluster in session.snapshot(CollectionKey::Clusters) {
///     println!("{}: {}", cluster.name(), cluster.status_label());
/// }
/// # Ok(())
/// # }
/// ```
pub struct LiveSession {
    config: Config,
    api: Arc<dyn ClusterApi>,
    cache: ResourceCache,
    binder: SubscriptionBinder,
    terminals: TerminalMultiplexer,
}

impl LiveSession {
    /// Build a session speaking HTTP and WebSocket to `config.api_url`
    pub fn connect(config: &Config, token: Option<AuthToken>) -> Result<Self> {
        let endpoints = Self::endpoints(config)?;
        let api = ApiClient::new(endpoints, config.request_timeout(), token.clone())
            .context("Failed to create API client")?;
        Self::with_parts(config, token, Arc::new(api), Arc::new(WsConnector::new()))
    }

    /// Build a session from explicit collaborators
    pub fn with_parts(
        config: &Config,
        token: Option<AuthToken>,
        api: Arc<dyn ClusterApi>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let endpoints = Self::endpoints(config)?;
        let live_url = endpoints
            .live()
            .context("Failed to resolve the live channel URL")?;

        let cache = ResourceCache::new();
        let router = SessionRouter::new();

        let sink_cache = cache.clone();
        let sink_router = router.clone();
        let binder = SubscriptionBinder::new(
            connector.clone(),
            ConnectionConfig {
                endpoint: live_url,
                policy: config.reconnect.policy(),
                codec: FrameCodec::Envelope,
            },
            token,
            move |connection| {
                connection.on_frame(CacheSink::new(sink_cache.clone()));
                connection.on_frame(sink_router.clone());
            },
        );

        let terminals = TerminalMultiplexer::new(binder.clone(), router, connector, endpoints);

        Ok(Self {
            config: config.clone(),
            api,
            cache,
            binder,
            terminals,
        })
    }

    fn endpoints(config: &Config) -> Result<Endpoints> {
        Endpoints::new(&config.api_url, &config.live_path, &config.terminal_path)
            .with_context(|| format!("Invalid apiUrl '{}'", config.api_url))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the resource cache.
    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn binder(&self) -> &SubscriptionBinder {
        &self.binder
    }

    /// Fetch a collection and replace its cached copy.
    ///
    /// Returns the number of records cached.
    pub async fn seed(&self, collection: CollectionKey) -> Result<usize, ApiError> {
        let records = self.api.list(collection).await?;
        let count = records.len();
        self.cache.apply(CacheEvent::Seeded {
            collection,
            records,
        });
        Ok(count)
    }

    /// Observe live updates for a collection while the handle is held.
    pub fn watch(&self, collection: CollectionKey) -> SubscriptionHandle {
        self.binder.subscribe(Interest::Collection(collection))
    }

    /// Returns a snapshot of a cached collection in server order.
    pub fn snapshot(&self, collection: CollectionKey) -> Vec<CachedResource> {
        self.cache.snapshot(collection)
    }

    /// Resolve a cluster by id or by name against the cached list
    pub fn resolve_cluster(&self, id_or_name: &str) -> Option<CachedResource> {
        self.cache.find(CollectionKey::Clusters, id_or_name)
    }

    pub fn start_terminal(
        &self,
        cluster_id: &str,
        mode: TerminalMode,
    ) -> Result<TerminalSession, SessionError> {
        self.terminals.start_session(cluster_id, mode)
    }

    /// Run one command through the stateless exec endpoint
    pub async fn exec(&self, cluster_id: &str, command: &str) -> Result<ExecOutput, ApiError> {
        self.api.exec(cluster_id, command).await
    }

    pub fn connection_status(&self) -> Option<ConnectionStatus> {
        self.binder.connection_status()
    }

    /// Connection state as inline status text
    pub fn status_line(&self) -> String {
        match self.binder.connection_status() {
            Some(status) => status.describe(),
            None if self.binder.is_rejected() => {
                "cannot subscribe: credentials rejected".to_string()
            }
            None if self.binder.token().is_none() => "cannot subscribe: no auth token".to_string(),
            None => "idle".to_string(),
        }
    }

    /// Close the live channel, forget the token and clear the cache
    pub fn logout(&self) {
        self.binder.logout();
        self.api.clear_credentials();
        self.cache.apply(CacheEvent::Reset);
        tracing::info!("Logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockClusterApi;
    use crate::models::ResourceStatus;
    use crate::transport::MemoryConnector;

    fn session(api: MockClusterApi, token: Option<&str>) -> LiveSession {
        let (connector, _remotes) = MemoryConnector::new();
        LiveSession::with_parts(
            &Config::default(),
            token.and_then(AuthToken::new),
            Arc::new(api),
            Arc::new(connector),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_seed_fills_cache_in_server_order() {
        let mut api = MockClusterApi::new();
        api.expect_list()
            .withf(|c| *c == CollectionKey::Clusters)
            .times(1)
            .returning(|_| {
                Ok(vec![
                    CachedResource::new("c2", Some(ResourceStatus::Running)),
                    CachedResource::new("c1", Some(ResourceStatus::Provisioning)),
                ])
            });

        let session = session(api, Some("t"));
        assert_eq!(session.seed(CollectionKey::Clusters).await.unwrap(), 2);

        let ids: Vec<_> = session
            .snapshot(CollectionKey::Clusters)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn test_seed_error_leaves_cache_untouched() {
        let mut api = MockClusterApi::new();
        api.expect_list().returning(|_| {
            Err(ApiError::Status {
                status: 500,
                detail: "boom".to_string(),
            })
        });

        let session = session(api, Some("t"));
        let err = session.seed(CollectionKey::Teams).await.unwrap_err();
        assert_eq!(err.to_string(), "API returned status 500: boom");
        assert!(!session.cache().is_seeded(CollectionKey::Teams));
    }

    #[tokio::test]
    async fn test_exec_delegates_to_api() {
        let mut api = MockClusterApi::new();
        api.expect_exec()
            .withf(|id, cmd| id == "c1" && cmd == "kubectl get pods")
            .returning(|_, _| {
                Ok(ExecOutput {
                    output: Some("No resources found".to_string()),
                    error: None,
                })
            });

        let session = session(api, Some("t"));
        let out = session.exec("c1", "kubectl get pods").await.unwrap();
        assert_eq!(out.render(), "No resources found");
    }

    #[tokio::test]
    async fn test_watch_without_token_reports_status() {
        let session = session(MockClusterApi::new(), None);
        let handle = session.watch(CollectionKey::Clusters);
        assert!(!handle.is_active());
        assert!(!session.binder().has_connection());
        assert_eq!(session.status_line(), "cannot subscribe: no auth token");
    }

    #[tokio::test]
    async fn test_resolve_cluster_by_name() {
        let mut api = MockClusterApi::new();
        api.expect_list().returning(|_| {
            Ok(vec![
                CachedResource::new("7f3a", Some(ResourceStatus::Running)).with_field("name", "demo"),
            ])
        });
        let session = session(api, Some("t"));
        session.seed(CollectionKey::Clusters).await.unwrap();

        assert_eq!(session.resolve_cluster("demo").map(|c| c.id), Some("7f3a".to_string()));
        assert_eq!(session.resolve_cluster("7f3a").map(|c| c.name().to_string()), Some("demo".to_string()));
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let mut api = MockClusterApi::new();
        api.expect_list()
            .returning(|_| Ok(vec![CachedResource::new("c1", None)]));
        api.expect_clear_credentials().times(1).return_const(());

        let session = session(api, Some("t"));
        session.seed(CollectionKey::Clusters).await.unwrap();
        let handle = session.watch(CollectionKey::Clusters);
        assert!(handle.is_active());

        session.logout();
        assert!(!handle.is_active());
        assert!(!session.binder().has_connection());
        assert!(session.snapshot(CollectionKey::Clusters).is_empty());
        assert_eq!(session.status_line(), "cannot subscribe: no auth token");
    }
}
