//! Session registry.
//!
//! `SessionManager` is the only owner of endpoint sessions. Connects are
//! serialized per address, so concurrent callers asking for the same endpoint
//! share one session instead of racing to open several.
//!
//! Failures are remembered only for tracked addresses (the known servers).
//! Any other address is forgotten as soon as it has no live session, so the
//! registry never grows with the addresses callers send.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;

use tb_domain::EndpointUrl;

use crate::transport::{Connection, Connector, TransportError};
use crate::ClientError;

/// Lifecycle state of one endpoint's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
        })
    }
}

/// Summary returned by [`SessionManager::sessions`].
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub url: EndpointUrl,
    pub state: SessionState,
    pub last_error: Option<String>,
}

struct SessionEntry {
    state: SessionState,
    connection: Option<Arc<dyn Connection>>,
    last_error: Option<String>,
}

impl SessionEntry {
    fn live(&self) -> Option<Arc<dyn Connection>> {
        match (&self.state, &self.connection) {
            (SessionState::Connected, Some(conn)) if conn.is_alive() => Some(conn.clone()),
            _ => None,
        }
    }

    /// A `Connected` entry whose connection died reports `Failed`.
    fn effective_state(&self) -> SessionState {
        if self.state == SessionState::Connected && self.live().is_none() {
            SessionState::Failed
        } else {
            self.state
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SessionManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionManager {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    sessions: RwLock<HashMap<EndpointUrl, SessionEntry>>,
    tracked: RwLock<HashSet<EndpointUrl>>,
    connect_locks: Mutex<HashMap<EndpointUrl, Arc<AsyncMutex<()>>>>,
}

/// A claim on one address's connect lock.
///
/// Dropping the last claim removes the lock from the map, including when the
/// connect future is cancelled while waiting.
struct ConnectSlot<'a> {
    locks: &'a Mutex<HashMap<EndpointUrl, Arc<AsyncMutex<()>>>>,
    url: EndpointUrl,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for ConnectSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // One reference in the map, one here: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.url);
        }
    }
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            sessions: RwLock::new(HashMap::new()),
            tracked: RwLock::new(HashSet::new()),
            connect_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Remember failures for `urls` so [`SessionManager::sessions`] keeps
    /// reporting them while they are down.
    pub fn track(&self, urls: &[EndpointUrl]) {
        self.tracked.write().extend(urls.iter().cloned());
    }

    fn is_tracked(&self, url: &EndpointUrl) -> bool {
        self.tracked.read().contains(url)
    }

    fn connect_slot(&self, url: &EndpointUrl) -> ConnectSlot<'_> {
        let lock = self
            .connect_locks
            .lock()
            .entry(url.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        ConnectSlot {
            locks: &self.connect_locks,
            url: url.clone(),
            lock,
        }
    }

    fn record_failure(&self, url: &EndpointUrl, message: String) {
        let mut sessions = self.sessions.write();
        if self.is_tracked(url) {
            sessions.insert(
                url.clone(),
                SessionEntry {
                    state: SessionState::Failed,
                    connection: None,
                    last_error: Some(message),
                },
            );
        } else {
            sessions.remove(url);
        }
    }

    /// Return the live session for `url`, opening one if needed.
    ///
    /// A failed attempt on a tracked address leaves it in
    /// [`SessionState::Failed`] with the error recorded; an untracked address
    /// is dropped from the registry. Either way the next call tries again.
    pub async fn connect(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, ClientError> {
        if let Some(conn) = self.session(url) {
            return Ok(conn);
        }

        let slot = self.connect_slot(url);
        let _guard = slot.lock.lock().await;

        // Another caller may have connected while we waited.
        if let Some(conn) = self.session(url) {
            return Ok(conn);
        }

        tracing::info!(server_url = %url, "connecting");
        match self.open(url).await {
            Ok(conn) => {
                tracing::info!(server_url = %url, "connected");
                self.sessions.write().insert(
                    url.clone(),
                    SessionEntry {
                        state: SessionState::Connected,
                        connection: Some(conn.clone()),
                        last_error: None,
                    },
                );
                Ok(conn)
            }
            Err(e) => {
                tracing::error!(server_url = %url, error = %e, "failed to connect");
                self.record_failure(url, e.to_string());
                Err(ClientError::Transport(e))
            }
        }
    }

    /// Open a session that is not registered or shared. The caller owns it
    /// and must disconnect it.
    pub async fn open_unpooled(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, ClientError> {
        tracing::debug!(server_url = %url, "opening unpooled session");
        self.open(url).await.map_err(|e| {
            tracing::error!(server_url = %url, error = %e, "failed to connect");
            ClientError::Transport(e)
        })
    }

    async fn open(&self, url: &EndpointUrl) -> Result<Arc<dyn Connection>, TransportError> {
        match tokio::time::timeout(self.connect_timeout, self.connector.connect(url)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.connect_timeout.as_millis() as u64)),
        }
    }

    /// Track and connect to every address concurrently. Failures are logged
    /// and the address is simply absent from the returned connected set.
    pub async fn connect_all(&self, urls: &[EndpointUrl]) -> Vec<EndpointUrl> {
        self.track(urls);
        let attempts = urls.iter().map(|url| async move {
            self.connect(url).await.ok().map(|_| url.clone())
        });
        futures_util::future::join_all(attempts)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// The live session for `url`, without connecting.
    pub fn session(&self, url: &EndpointUrl) -> Option<Arc<dyn Connection>> {
        self.sessions.read().get(url).and_then(SessionEntry::live)
    }

    /// Drop the session for `url` if `error` means it can no longer be used.
    ///
    /// Returns whether the session was evicted.
    pub fn report_failure(&self, url: &EndpointUrl, error: &ClientError) -> bool {
        if !error.is_connection_loss() {
            return false;
        }
        let connected = matches!(
            self.sessions.read().get(url),
            Some(entry) if entry.state == SessionState::Connected
        );
        if !connected {
            return false;
        }
        tracing::warn!(server_url = %url, error = %error, "evicting session");
        self.record_failure(url, error.to_string());
        true
    }

    /// Drop the pooled session for `url` without waiting for it to close.
    ///
    /// Used when a call on the session hung; the close runs in the
    /// background. Returns whether a session was evicted.
    pub fn evict(&self, url: &EndpointUrl, reason: &str) -> bool {
        let conn = self
            .sessions
            .write()
            .get_mut(url)
            .and_then(|entry| entry.connection.take());
        let Some(conn) = conn else {
            return false;
        };
        tracing::warn!(server_url = %url, reason, "evicting session");
        self.record_failure(url, reason.to_owned());
        close_in_background(url.clone(), conn);
        true
    }

    /// Close the session for `url`. Close failures are logged, never raised.
    pub async fn disconnect(&self, url: &EndpointUrl) {
        let entry = self.sessions.write().remove(url);
        let Some(conn) = entry.and_then(|e| e.connection) else {
            return;
        };
        match conn.disconnect().await {
            Ok(()) => tracing::info!(server_url = %url, "disconnected"),
            Err(e) => tracing::warn!(server_url = %url, error = %e, "failed to disconnect"),
        }
    }

    /// Close every open session concurrently.
    pub async fn disconnect_all(&self) {
        let urls: Vec<EndpointUrl> = self.sessions.read().keys().cloned().collect();
        let closes = urls.iter().map(|url| self.disconnect(url));
        futures_util::future::join_all(closes).await;
    }

    /// Addresses with a live session, sorted.
    pub fn list_connected(&self) -> Vec<EndpointUrl> {
        let mut urls: Vec<EndpointUrl> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, entry)| entry.live().is_some())
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    pub fn state(&self, url: &EndpointUrl) -> SessionState {
        self.sessions
            .read()
            .get(url)
            .map(SessionEntry::effective_state)
            .unwrap_or(SessionState::Disconnected)
    }

    /// Every tracked endpoint, sorted by address.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .read()
            .iter()
            .map(|(url, entry)| SessionInfo {
                url: url.clone(),
                state: entry.effective_state(),
                last_error: entry.last_error.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.url.cmp(&b.url));
        infos
    }
}

/// Close `conn` on the runtime without blocking the caller.
///
/// Outside a runtime the connection is only dropped.
pub fn close_in_background(url: EndpointUrl, conn: Arc<dyn Connection>) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(server_url = %url, "no runtime to close session on");
        return;
    };
    handle.spawn(async move {
        match conn.disconnect().await {
            Ok(()) => tracing::debug!(server_url = %url, "closed session"),
            Err(e) => tracing::warn!(server_url = %url, error = %e, "failed to close session"),
        }
    });
}
