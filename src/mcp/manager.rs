//! Session manager: owns every transport session plus the merged tool
//! registry, and is the sole mutation point for their lifecycle.
//!
//! Lifecycle operations serialize on one internal async lock, so a
//! reconnect can never hand a caller a session set that is mid-teardown.
//! Tool calls themselves run against `Arc`-shared sessions outside the lock.

use super::error::McpError;
use super::session::McpSession;
use super::tools::{load_tools, ToolHandle, ToolInvoker};
use crate::core::config::{Config, McpEndpointConfig};
use crate::core::correlation;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Snapshot of all currently loaded tool handles and their backing sessions.
///
/// Every tool is backed by exactly one listed session; `sessions` never
/// exceeds the number of configured endpoints because failed connections are
/// skipped at initialize time.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    pub tools: Vec<Arc<ToolHandle>>,
    pub sessions: Vec<Arc<McpSession>>,
}

impl Resource {
    pub fn find_tool(&self, name: &str) -> Option<&Arc<ToolHandle>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Uninitialized,
    Initialized,
    Cleaning,
    Closed,
}

struct ManagerInner {
    state: ManagerState,
    resource: Option<Resource>,
}

/// Reconnect seam consumed by the tool-call dispatcher, so it can be
/// exercised against a test double.
#[async_trait]
pub trait SessionLifecycle: Send + Sync {
    /// Tear down and re-establish every session. Never propagates an error;
    /// returns whether the manager ended up initialized.
    async fn reconnect(&self) -> bool;
}

pub struct McpSessionManager {
    endpoints: Vec<McpEndpointConfig>,
    call_timeout: Duration,
    inner: Mutex<ManagerInner>,
}

impl McpSessionManager {
    pub fn new(endpoints: Vec<McpEndpointConfig>, call_timeout: Duration) -> Self {
        Self {
            endpoints,
            call_timeout,
            inner: Mutex::new(ManagerInner {
                state: ManagerState::Uninitialized,
                resource: None,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.mcp_endpoints.clone(), config.call_timeout())
    }

    /// Connect every enabled endpoint and aggregate its tools.
    ///
    /// Idempotent: an already-initialized manager returns its cached
    /// [`Resource`] without reconnecting. An endpoint that fails to connect
    /// is logged and skipped; partial success is still success.
    pub async fn initialize(&self) -> Result<Resource, McpError> {
        let mut inner = self.inner.lock().await;
        self.initialize_locked(&mut inner).await
    }

    async fn initialize_locked(&self, inner: &mut ManagerInner) -> Result<Resource, McpError> {
        match inner.state {
            ManagerState::Initialized => {
                if let Some(resource) = &inner.resource {
                    return Ok(resource.clone());
                }
            }
            ManagerState::Closed => return Err(McpError::NotInitialized),
            ManagerState::Uninitialized | ManagerState::Cleaning => {}
        }

        let mut resource = Resource::default();
        for endpoint in &self.endpoints {
            if !endpoint.is_enabled() {
                continue;
            }
            let correlation_id = correlation::generate_id();
            info!(
                correlation_id = %correlation_id,
                endpoint = %endpoint.host,
                "mcp_server_connection_attempt"
            );

            let session =
                match McpSession::connect(endpoint, self.call_timeout, &correlation_id).await {
                    Ok(session) => Arc::new(session),
                    Err(err) => {
                        warn!(
                            correlation_id = %correlation_id,
                            endpoint = %endpoint.host,
                            error = %err,
                            "failed_to_connect_to_mcp_server"
                        );
                        continue;
                    }
                };

            match load_tools(&session).await {
                Ok(mut tools) => {
                    info!(
                        correlation_id = %correlation_id,
                        endpoint = %endpoint.host,
                        tool_count = tools.len(),
                        "connected_to_mcp_server"
                    );
                    resource.tools.append(&mut tools);
                    resource.sessions.push(session);
                }
                Err(err) => {
                    warn!(
                        correlation_id = %correlation_id,
                        endpoint = %endpoint.host,
                        error = %err,
                        "failed_to_connect_to_mcp_server"
                    );
                    session.close().await;
                }
            }
        }

        inner.state = ManagerState::Initialized;
        inner.resource = Some(resource.clone());
        Ok(resource)
    }

    /// Tear down every session and re-run initialize, under one lock so no
    /// caller can observe the half-torn-down state.
    ///
    /// Never propagates: any failure is logged and reported as `false`.
    pub async fn reconnect(&self) -> bool {
        let correlation_id = correlation::generate_id();
        let mut inner = self.inner.lock().await;
        if inner.state == ManagerState::Closed {
            error!(
                correlation_id = %correlation_id,
                error = "manager is shut down",
                "mcp_reconnection_failed"
            );
            return false;
        }
        Self::cleanup_locked(&mut inner).await;
        match self.initialize_locked(&mut inner).await {
            Ok(_) => true,
            Err(err) => {
                error!(
                    correlation_id = %correlation_id,
                    error = %err,
                    "mcp_reconnection_failed"
                );
                false
            }
        }
    }

    /// Close every held session, ignoring individual close failures, and
    /// reset to Uninitialized regardless of outcome.
    pub async fn cleanup(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == ManagerState::Closed {
            return;
        }
        Self::cleanup_locked(&mut inner).await;
    }

    async fn cleanup_locked(inner: &mut ManagerInner) {
        inner.state = ManagerState::Cleaning;
        if let Some(resource) = inner.resource.take() {
            for session in &resource.sessions {
                session.close().await;
            }
        }
        inner.state = ManagerState::Uninitialized;
    }

    /// Teardown hook for process exit: cleanup, then refuse further use.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        Self::cleanup_locked(&mut inner).await;
        inner.state = ManagerState::Closed;
    }

    /// The current resource snapshot.
    ///
    /// The only lifecycle method allowed to fail loudly: requesting the
    /// resource before a successful initialize is a caller bug, not an
    /// environmental fault.
    pub async fn get_resource(&self) -> Result<Resource, McpError> {
        let inner = self.inner.lock().await;
        match (&inner.state, &inner.resource) {
            (ManagerState::Initialized, Some(resource)) => Ok(resource.clone()),
            _ => Err(McpError::NotInitialized),
        }
    }
}

#[async_trait]
impl SessionLifecycle for McpSessionManager {
    async fn reconnect(&self) -> bool {
        McpSessionManager::reconnect(self).await
    }
}
