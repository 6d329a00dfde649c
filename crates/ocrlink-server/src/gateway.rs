//! Connection gateway
//!
//! Tracks every open WebSocket connection in an arena keyed by
//! [`ConnectionId`] and keeps a receiver table mapping each device identifier
//! to the one desktop connection that routed events go to.
//!
//! Connections move `Connecting -> Authenticated(device, role) -> Closed` and
//! never go back. A desktop that authenticates for a device that already has a
//! receiver takes over the slot; the previous connection stays open but is no
//! longer routable. Removing a receiver entry always checks that it still
//! points at the connection being cleaned up, so a late close or sweep of a
//! replaced connection cannot evict its successor.
//!
//! Sockets are never touched here. Each connection owns an unbounded
//! [`Outbound`] channel drained by its writer task, which keeps every
//! operation non-blocking while the registry lock is held.

use ocrlink_auth::{DeviceId, Role, TokenAuthority};
use ocrlink_core::{DeviceEvent, Error, Result, ServerMessage};
use ocrlink_ocr::EventSink;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Identifier assigned to a connection when it is accepted
pub type ConnectionId = u64;

/// Frames queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// JSON text frame
    Text(String),
    /// Transport-level liveness probe
    Ping,
    /// Close the connection
    Close,
}

struct ConnectionRecord {
    tx: mpsc::UnboundedSender<Outbound>,
    /// Cleared by each sweep, set again by a pong
    alive: bool,
    identity: Option<(DeviceId, Role)>,
}

impl ConnectionRecord {
    fn queue(&self, frame: Outbound) {
        // A closed channel means the writer already exited; release() follows.
        let _ = self.tx.send(frame);
    }

    fn queue_json<T: Serialize>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(json) => self.queue(Outbound::Text(json)),
            Err(e) => warn!("Failed to serialize message: {}", e),
        }
    }
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionRecord>,
    receivers: HashMap<DeviceId, ConnectionId>,
}

impl Registry {
    /// Remove a connection, and its receiver entry if it is still current
    fn detach(&mut self, id: ConnectionId) -> Option<ConnectionRecord> {
        let record = self.connections.remove(&id)?;
        if let Some((device_id, Role::Desktop)) = &record.identity {
            if self.receivers.get(device_id) == Some(&id) {
                self.receivers.remove(device_id);
                info!("Desktop disconnected: {}", device_id);
            }
        }
        Some(record)
    }

    fn receiver_tx(&self, device_id: &DeviceId) -> Option<mpsc::UnboundedSender<Outbound>> {
        self.receivers
            .get(device_id)
            .and_then(|id| self.connections.get(id))
            .map(|record| record.tx.clone())
    }
}

/// Authenticates connections and routes events to each device's receiver
pub struct Gateway {
    authority: Arc<TokenAuthority>,
    require_explicit_role: bool,
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

impl Gateway {
    /// Create a gateway verifying handshakes with `authority`
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self {
            authority,
            require_explicit_role: false,
            next_id: AtomicU64::new(1),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Builder pattern: reject handshakes that do not declare a role
    pub fn with_require_explicit_role(mut self, require: bool) -> Self {
        self.require_explicit_role = require;
        self
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly opened connection
    ///
    /// Returns its id and the channel its writer task must drain.
    pub fn accept(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry().connections.insert(
            id,
            ConnectionRecord {
                tx,
                alive: true,
                identity: None,
            },
        );
        debug!("Connection {} accepted", id);
        (id, rx)
    }

    /// Handle an `authenticate` message from connection `id`
    ///
    /// On failure an `auth_error` and a close are queued and the connection is
    /// dropped from the gateway. On success the `authenticated` ack is queued
    /// before the lock is released, so no routed event can overtake it. A
    /// connection that is already authenticated keeps its identity and gets
    /// no second ack.
    pub fn authenticate(
        &self,
        id: ConnectionId,
        token: &str,
        declared_role: Option<&str>,
    ) -> Result<(DeviceId, Role)> {
        let verified = self.authority.verify(token);

        let mut guard = self.registry();
        let registry = &mut *guard;

        let record = registry
            .connections
            .get_mut(&id)
            .ok_or_else(|| Error::TransportFailure(format!("connection {}", id)))?;

        if let Some(identity) = &record.identity {
            debug!("Connection {} is already authenticated, ignoring", id);
            return Ok(identity.clone());
        }

        let rejection = match (&verified, declared_role) {
            (Err(_), _) => Some("Invalid token"),
            (Ok(_), None) if self.require_explicit_role => Some("Role is required"),
            _ => None,
        };

        let device_id = match verified {
            Ok(device_id) if rejection.is_none() => device_id,
            _ => {
                let message = rejection.unwrap_or("Invalid token").to_string();
                warn!("Connection {} failed authentication: {}", id, message);
                record.queue_json(&ServerMessage::AuthError { message });
                record.queue(Outbound::Close);
                registry.connections.remove(&id);
                return Err(Error::InvalidCredential);
            }
        };

        let role = Role::from_declared(declared_role);
        record.identity = Some((device_id.clone(), role));
        record.queue_json(&ServerMessage::Authenticated {
            device_id: device_id.to_string(),
        });

        if role.is_receiver() {
            match registry.receivers.insert(device_id.clone(), id) {
                Some(previous) if previous != id => info!(
                    "Desktop authenticated: {} (connection {} replaces {})",
                    device_id, id, previous
                ),
                _ => info!("Desktop authenticated: {}", device_id),
            }
        } else {
            info!("Mobile authenticated: {}", device_id);
        }

        Ok((device_id, role))
    }

    /// Record a liveness response from connection `id`
    pub fn mark_alive(&self, id: ConnectionId) {
        if let Some(record) = self.registry().connections.get_mut(&id) {
            record.alive = true;
        }
    }

    /// Forget a connection that has closed
    pub fn release(&self, id: ConnectionId) {
        if self.registry().detach(id).is_some() {
            debug!("Connection {} released", id);
        }
    }

    /// Probe every connection and reap the ones that missed the last probe
    ///
    /// Returns the number of connections closed.
    pub fn sweep(&self) -> usize {
        let mut guard = self.registry();
        let registry = &mut *guard;

        let stale: Vec<ConnectionId> = registry
            .connections
            .iter()
            .filter(|(_, record)| !record.alive)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            if let Some(record) = registry.detach(*id) {
                debug!("Connection {} missed liveness probe, closing", id);
                record.queue(Outbound::Close);
            }
        }

        for record in registry.connections.values_mut() {
            record.alive = false;
            record.queue(Outbound::Ping);
        }

        stale.len()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until the task is aborted
    pub fn spawn_liveness_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reaped = gateway.sweep();
                if reaped > 0 {
                    info!("Liveness sweep closed {} connection(s)", reaped);
                }
            }
        })
    }

    /// Send `payload` to the current receiver of `device_id`
    ///
    /// Fails with [`Error::UnknownDevice`] when no receiver is registered and
    /// [`Error::TransportFailure`] when its writer is gone. Nothing is queued
    /// for later delivery.
    pub fn try_route<T: Serialize>(&self, device_id: &DeviceId, payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)?;

        let tx = self
            .registry()
            .receiver_tx(device_id)
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))?;

        tx.send(Outbound::Text(json))
            .map_err(|_| Error::TransportFailure(device_id.to_string()))
    }

    /// Best-effort delivery; returns whether the payload was handed to a receiver
    pub fn route<T: Serialize>(&self, device_id: &DeviceId, payload: &T) -> bool {
        match self.try_route(device_id, payload) {
            Ok(()) => {
                debug!("Routed message to desktop {}", device_id);
                true
            }
            Err(e) if e.is_undelivered() => {
                warn!("{} (connected desktops: {})", e, self.receiver_count());
                false
            }
            Err(e) => {
                error!("Failed to route message to {}: {}", device_id, e);
                false
            }
        }
    }

    /// Send `farewell` to the receiver of `device_id`, then close it
    ///
    /// Both frames are queued under one lock, so a desktop that takes over the
    /// slot concurrently either gets the farewell or is left alone. Returns
    /// whether a receiver was closed.
    pub fn disconnect_device<T: Serialize>(&self, device_id: &DeviceId, farewell: &T) -> bool {
        let json = match serde_json::to_string(farewell) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Failed to serialize message: {}", e);
                None
            }
        };

        let mut registry = self.registry();
        let Some(id) = registry.receivers.get(device_id).copied() else {
            return false;
        };
        match registry.detach(id) {
            Some(record) => {
                if let Some(json) = json {
                    record.queue(Outbound::Text(json));
                }
                record.queue(Outbound::Close);
                true
            }
            None => false,
        }
    }

    /// Whether `device_id` currently has a receiver
    pub fn has_receiver(&self, device_id: &DeviceId) -> bool {
        self.registry().receivers.contains_key(device_id)
    }

    /// Number of devices with a registered receiver
    pub fn receiver_count(&self) -> usize {
        self.registry().receivers.len()
    }

    /// Number of open connections, authenticated or not
    pub fn connection_count(&self) -> usize {
        self.registry().connections.len()
    }
}

impl EventSink for Gateway {
    fn emit(&self, device_id: &DeviceId, event: &DeviceEvent) -> bool {
        let delivered = self.route(device_id, event);
        if delivered {
            info!("Sent {} to desktop {}", event.kind(), device_id);
        }
        delivered
    }
}
