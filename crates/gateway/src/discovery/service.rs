use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tb_domain::config::DiscoveryConfig;
use tb_domain::{EndpointUrl, NodeId, Tag, Variant};
use tb_opcua_client::{
    close_in_background, discover_roots, walk, ClientError, Connection, RootFilter,
    SessionManager, WalkOptions,
};

use super::{normalize, DiscoveryError};

/// Result of an explicit value read. `value` is `None` when the read failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueReading {
    pub value: Option<Variant>,
    pub timestamp: DateTime<Utc>,
}

/// A session held for one call.
///
/// An unpooled session belongs to the call and is closed when the lease
/// ends, including when the endpoint timeout drops the call mid-flight.
struct Lease {
    url: EndpointUrl,
    conn: Arc<dyn Connection>,
    owned: bool,
    closed: bool,
}

impl Lease {
    fn conn(&self) -> &dyn Connection {
        self.conn.as_ref()
    }

    /// Close an owned session and wait for it. Pooled sessions stay open.
    async fn release(mut self) {
        if !self.owned {
            return;
        }
        self.closed = true;
        if let Err(e) = self.conn.disconnect().await {
            tracing::warn!(server_url = %self.url, error = %e, "failed to close session");
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.owned && !self.closed {
            close_in_background(self.url.clone(), self.conn.clone());
        }
    }
}

/// Single-endpoint discovery on top of the shared [`SessionManager`].
///
/// Sessions are taken from the manager's pool, or opened and closed per call
/// when pooling is off. Every call is bounded by the endpoint timeout.
pub struct DiscoveryService {
    sessions: Arc<SessionManager>,
    system_names: HashSet<String>,
    endpoint_timeout: Duration,
    max_concurrent_endpoints: usize,
    pool_sessions: bool,
    default_skip_system_tags: bool,
}

impl DiscoveryService {
    pub fn new(sessions: Arc<SessionManager>, config: &DiscoveryConfig) -> Self {
        Self {
            sessions,
            system_names: config.system_node_names.iter().cloned().collect(),
            endpoint_timeout: Duration::from_millis(config.endpoint_timeout_ms),
            max_concurrent_endpoints: config.max_concurrent_endpoints.max(1),
            pool_sessions: config.pool_sessions,
            default_skip_system_tags: config.skip_system_tags,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn max_concurrent_endpoints(&self) -> usize {
        self.max_concurrent_endpoints
    }

    /// Used when a caller does not say whether to skip system tags.
    pub fn default_skip_system_tags(&self) -> bool {
        self.default_skip_system_tags
    }

    /// Discover the tags served at `server_url`.
    ///
    /// With `skip_system_tags`, only tags under a discovered domain root are
    /// returned.
    pub async fn tags(
        &self,
        server_url: &str,
        skip_system_tags: bool,
    ) -> Result<Vec<Tag>, DiscoveryError> {
        let url = EndpointUrl::parse(server_url).map_err(DiscoveryError::InvalidEndpoint)?;
        self.bounded(&url, self.discover(&url, skip_system_tags)).await
    }

    /// Read the current value of `node_id` at `server_url`.
    ///
    /// Only an unusable address or an unreachable endpoint is an error; a
    /// failed read is reported as a reading without a value.
    pub async fn read_value(
        &self,
        server_url: &str,
        node_id: &str,
    ) -> Result<ValueReading, DiscoveryError> {
        let url = EndpointUrl::parse(server_url).map_err(DiscoveryError::InvalidEndpoint)?;
        let node = NodeId::from(node_id);
        self.bounded(&url, async {
            let lease = self.open(&url).await?;
            let value = match lease.conn().read_value(&node).await {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(server_url = %url, node_id = %node, error = %e, "value read failed");
                    if e.is_connection_loss() {
                        self.sessions.report_failure(&url, &ClientError::Transport(e));
                    }
                    None
                }
            };
            lease.release().await;
            Ok(ValueReading {
                value,
                timestamp: Utc::now(),
            })
        })
        .await
    }

    async fn bounded<T, F>(&self, url: &EndpointUrl, op: F) -> Result<T, DiscoveryError>
    where
        F: std::future::Future<Output = Result<T, DiscoveryError>>,
    {
        match tokio::time::timeout(self.endpoint_timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.endpoint_timeout.as_millis() as u64;
                tracing::warn!(server_url = %url, timeout_ms, "endpoint operation timed out");
                // A pooled session that hung must not serve the next caller.
                if self.pool_sessions {
                    self.sessions.evict(url, "endpoint operation timed out");
                }
                Err(DiscoveryError::Timeout {
                    url: url.clone(),
                    timeout_ms,
                })
            }
        }
    }

    async fn open(&self, url: &EndpointUrl) -> Result<Lease, DiscoveryError> {
        let opened = if self.pool_sessions {
            self.sessions.connect(url).await
        } else {
            self.sessions.open_unpooled(url).await
        };
        match opened {
            Ok(conn) => Ok(Lease {
                url: url.clone(),
                conn,
                owned: !self.pool_sessions,
                closed: false,
            }),
            Err(source) => Err(DiscoveryError::Connect {
                url: url.clone(),
                source,
            }),
        }
    }

    async fn discover(
        &self,
        url: &EndpointUrl,
        skip_system_tags: bool,
    ) -> Result<Vec<Tag>, DiscoveryError> {
        let lease = self.open(url).await?;
        let result = self.collect(lease.conn(), url, skip_system_tags).await;
        if let Err(DiscoveryError::Browse { source, .. }) = &result {
            self.sessions.report_failure(url, source);
        }
        lease.release().await;
        result
    }

    async fn collect(
        &self,
        conn: &dyn Connection,
        url: &EndpointUrl,
        skip_system_tags: bool,
    ) -> Result<Vec<Tag>, DiscoveryError> {
        let browse_error = |source: ClientError| DiscoveryError::Browse {
            url: url.clone(),
            source,
        };

        let filter = if skip_system_tags {
            let roots = discover_roots(conn, &self.system_names)
                .await
                .map_err(browse_error)?;
            Some(RootFilter::new(roots))
        } else {
            None
        };

        let walk = walk(conn, &NodeId::root_folder(), WalkOptions::default()).await;
        if walk.is_partial() {
            // A lost session is not a per-node failure: the rest of the
            // tree was never seen.
            if let Some(lost) = walk.skipped.iter().find(|s| s.error.is_connection_loss()) {
                return Err(browse_error(ClientError::Transport(lost.error.clone())));
            }
            tracing::warn!(
                server_url = %url,
                skipped = walk.skipped.len(),
                reached = walk.nodes.len(),
                "address-space walk was partial"
            );
        }

        let tags = walk
            .nodes
            .into_iter()
            .filter(|node| {
                filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(&node.browse_path))
            })
            .map(|node| normalize(node, url))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(server_url = %url, count = tags.len(), skip_system_tags, "tags discovered");
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tb_domain::NodeClass;
    use tb_opcua_client::{
        AddressSpace, Connector, MemoryConnector, NodeAttributes, SessionState, TransportError,
    };

    use super::*;

    const URL: &str = "opc.tcp://localhost:4840";

    fn pump_plant() -> Arc<AddressSpace> {
        let space = AddressSpace::new();
        let plant = space.add_object(&space.objects(), "OilAndGasPlant").unwrap();
        let line = space.add_object(&plant, "Line1").unwrap();
        let pump = space.add_object(&line, "Pump").unwrap();
        space.add_variable(&pump, "MotorTemp", 71.5).unwrap();
        space
    }

    fn service(space: Arc<AddressSpace>, config: DiscoveryConfig) -> DiscoveryService {
        let connector = Arc::new(MemoryConnector::new());
        connector.bind(&EndpointUrl::parse(URL).unwrap(), space);
        let sessions = Arc::new(SessionManager::new(connector, Duration::from_secs(1)));
        DiscoveryService::new(sessions, &config)
    }

    #[tokio::test]
    async fn skipping_keeps_only_domain_tags() {
        let svc = service(pump_plant(), DiscoveryConfig::default());
        let tags = svc.tags(URL, true).await.unwrap();
        let paths: Vec<_> = tags.iter().map(|t| t.browse_path.as_str()).collect();
        assert_eq!(paths, vec!["Objects/OilAndGasPlant/Line1/Pump/MotorTemp"]);
        assert_eq!(tags[0].data_type, "Double");
        assert_eq!(tags[0].server_url.as_str(), URL);
    }

    #[tokio::test]
    async fn not_skipping_includes_server_variables() {
        let svc = service(pump_plant(), DiscoveryConfig::default());
        let tags = svc.tags(URL, false).await.unwrap();
        assert!(tags.iter().any(|t| t.browse_path == "Objects/Server/ServiceLevel"));
        assert!(tags
            .iter()
            .any(|t| t.browse_path == "Objects/OilAndGasPlant/Line1/Pump/MotorTemp"));
    }

    #[tokio::test]
    async fn http_scheme_is_accepted() {
        let svc = service(pump_plant(), DiscoveryConfig::default());
        let tags = svc.tags("http://localhost:4840", true).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].server_url.as_str(), URL);
    }

    #[tokio::test]
    async fn pooled_sessions_are_reused() {
        let svc = service(pump_plant(), DiscoveryConfig::default());
        svc.tags(URL, true).await.unwrap();
        let url = EndpointUrl::parse(URL).unwrap();
        assert_eq!(svc.sessions().state(&url), SessionState::Connected);
        assert_eq!(svc.sessions().list_connected(), vec![url]);
    }

    #[tokio::test]
    async fn unpooled_calls_leave_no_session_behind() {
        let config = DiscoveryConfig {
            pool_sessions: false,
            ..DiscoveryConfig::default()
        };
        let svc = service(pump_plant(), config);
        assert_eq!(svc.tags(URL, true).await.unwrap().len(), 1);
        assert!(svc.sessions().list_connected().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connect_error() {
        let svc = service(pump_plant(), DiscoveryConfig::default());
        let err = svc.tags("opc.tcp://localhost:4999", true).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Connect { .. }));
    }

    #[tokio::test]
    async fn bad_address_is_rejected_before_connecting() {
        let svc = service(pump_plant(), DiscoveryConfig::default());
        let err = svc.tags("ftp://localhost:4840", true).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn offline_endpoint_evicts_the_pooled_session() {
        let space = pump_plant();
        let svc = service(space.clone(), DiscoveryConfig::default());
        svc.tags(URL, true).await.unwrap();

        space.set_online(false);
        assert!(svc.tags(URL, true).await.is_err());
        let url = EndpointUrl::parse(URL).unwrap();
        assert!(svc.sessions().list_connected().is_empty());

        space.set_online(true);
        assert_eq!(svc.tags(URL, true).await.unwrap().len(), 1);
        assert_eq!(svc.sessions().list_connected(), vec![url]);
    }

    #[tokio::test]
    async fn value_reads_report_missing_values_explicitly() {
        let space = pump_plant();
        let motor = space
            .find("Objects/OilAndGasPlant/Line1/Pump/MotorTemp")
            .unwrap();
        let svc = service(space, DiscoveryConfig::default());

        let reading = svc.read_value(URL, motor.as_str()).await.unwrap();
        assert_eq!(reading.value, Some(Variant::Double(71.5)));

        let missing = svc.read_value(URL, "ns=2;i=9999").await.unwrap();
        assert_eq!(missing.value, None);
    }

    /// Opens sessions that never answer a request, counting opens and closes.
    #[derive(Default)]
    struct Stalled {
        opens: AtomicUsize,
        closes: Arc<AtomicUsize>,
    }

    struct StalledConnection {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for Stalled {
        async fn connect(&self, _url: &EndpointUrl) -> Result<Arc<dyn Connection>, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StalledConnection {
                closes: self.closes.clone(),
            }))
        }
    }

    #[async_trait]
    impl Connection for StalledConnection {
        async fn browse(&self, _node: &NodeId) -> Result<Vec<NodeId>, TransportError> {
            std::future::pending().await
        }

        async fn read_attributes(&self, _node: &NodeId) -> Result<NodeAttributes, TransportError> {
            std::future::pending::<()>().await;
            Ok(NodeAttributes {
                display_name: String::new(),
                node_class: NodeClass::Other,
            })
        }

        async fn read_data_type(&self, _node: &NodeId) -> Result<String, TransportError> {
            std::future::pending().await
        }

        async fn read_value(&self, _node: &NodeId) -> Result<Variant, TransportError> {
            std::future::pending().await
        }

        fn is_alive(&self) -> bool {
            true
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn stalled_service(pool_sessions: bool) -> (DiscoveryService, Arc<Stalled>) {
        let connector = Arc::new(Stalled::default());
        let sessions = Arc::new(SessionManager::new(connector.clone(), Duration::from_secs(1)));
        let config = DiscoveryConfig {
            pool_sessions,
            endpoint_timeout_ms: 100,
            ..DiscoveryConfig::default()
        };
        (DiscoveryService::new(sessions, &config), connector)
    }

    async fn settle(closes: &AtomicUsize, expected: usize) {
        for _ in 0..20 {
            if closes.load(Ordering::SeqCst) >= expected {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_calls_close_their_unpooled_sessions() {
        let (svc, connector) = stalled_service(false);

        for _ in 0..3 {
            let err = svc.tags(URL, true).await.unwrap_err();
            assert!(matches!(err, DiscoveryError::Timeout { timeout_ms: 100, .. }));
        }
        let err = svc.read_value(URL, "ns=2;i=1").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Timeout { .. }));

        settle(&connector.closes, 4).await;
        assert_eq!(connector.opens.load(Ordering::SeqCst), 4);
        assert_eq!(connector.closes.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_call_evicts_the_pooled_session() {
        let (svc, connector) = stalled_service(true);

        assert!(svc.tags(URL, true).await.is_err());
        assert!(svc.sessions().list_connected().is_empty());

        settle(&connector.closes, 1).await;
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);

        // The next call opens a fresh session instead of reusing the hung one.
        assert!(svc.tags(URL, true).await.is_err());
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
    }
}
