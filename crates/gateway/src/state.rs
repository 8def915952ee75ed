use std::sync::Arc;

use tb_domain::config::Config;
use tb_opcua_client::SessionManager;

use crate::discovery::DiscoveryService;
use crate::mcp::{Dispatcher, ToolRegistry};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core**: resolved configuration
/// - **Discovery**: the session registry and the discovery service on top
/// - **MCP**: the tool catalog and the envelope dispatcher
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Discovery ─────────────────────────────────────────────────────
    /// Sole owner of endpoint sessions.
    pub sessions: Arc<SessionManager>,
    pub discovery: Arc<DiscoveryService>,

    // ── MCP ───────────────────────────────────────────────────────────
    pub registry: Arc<ToolRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}
