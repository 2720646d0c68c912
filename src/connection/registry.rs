//! Session registry for tracking connected robots
//!
//! Replaces process-wide "last connected robot" state with an explicit
//! object shared by the clients that should reuse each other's sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use wonder_shared::DeviceId;

use super::session::Session;

/// What `connect()` does when the transport reports it is already connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Reuse the most recently connected session
    #[default]
    ReuseLastConnected,
    /// Treat "already connected" as an error
    Fail,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<DeviceId, Session>,
    last_connected: Option<DeviceId>,
}

/// Tracks every live session and which one connected last
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SessionRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and mark it as the most recent connection
    pub async fn register(&self, session: Session) {
        let device_id = session.device_id().clone();
        let mut inner = self.inner.write().await;
        inner.sessions.insert(device_id.clone(), session);
        inner.last_connected = Some(device_id);
    }

    /// Forget a session (the robot disconnected)
    pub async fn unregister(&self, device_id: &DeviceId) {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(device_id);
        if inner.last_connected.as_ref() == Some(device_id) {
            inner.last_connected = None;
        }
    }

    /// Get the session for a specific robot
    pub async fn get(&self, device_id: &DeviceId) -> Option<Session> {
        self.inner.read().await.sessions.get(device_id).cloned()
    }

    /// The most recently connected session still registered
    pub async fn last_connected(&self) -> Option<Session> {
        let inner = self.inner.read().await;
        inner
            .last_connected
            .as_ref()
            .and_then(|id| inner.sessions.get(id))
            .cloned()
    }

    /// Get list of all connected device IDs
    pub async fn connected_devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.inner.read().await.sessions.keys().cloned().collect();
        devices.sort();
        devices
    }
}
