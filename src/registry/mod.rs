//! Device registry - tracks known devices and their session lifecycle
//!
//! The registry is plain data a host constructs and clones; nothing here
//! is a process-wide global. Arrival and removal can be driven by a
//! provider's own change callbacks or synthesized by the polling watcher
//! in [`watch`].

mod watch;


use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::provider::{DeviceDescriptor, DeviceId, DeviceProvider};
use crate::session::DeviceSession;
use crate::sink::EventSink;

/// Tracks the set of known devices and mediates their open/close
/// lifecycle. At most one session exists per device id.
#[derive(Clone)]
pub struct DeviceRegistry {
    pub(crate) inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    pub(crate) provider: Arc<dyn DeviceProvider>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) devices: DashMap<DeviceId, DeviceEntry>,
}

pub(crate) struct DeviceEntry {
    pub(crate) descriptor: DeviceDescriptor,
    pub(crate) session: Option<Arc<DeviceSession>>,
}

impl DeviceRegistry {
    pub fn new(provider: Arc<dyn DeviceProvider>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                provider,
                sink,
                devices: DashMap::new(),
            }),
        }
    }

    /// A device appeared. Announces the connection (when the name is
    /// known), then opens the device and creates its session. Arrival of
    /// an already-known id is suppressed, including ids whose earlier open
    /// failed; those retry only after a removal and re-arrival.
    ///
    /// An open failure is logged, reported through
    /// [`EventSink::device_failed`] and otherwise ignored; other devices
    /// are unaffected.
    pub async fn device_arrived(&self, descriptor: DeviceDescriptor) {
        let id = descriptor.id.clone();
        match self.inner.devices.entry(id.clone()) {
            Entry::Occupied(_) => {
                debug!("device '{}' already known, arrival suppressed", id);
                return;
            }
            Entry::Vacant(slot) => {
                slot.insert(DeviceEntry {
                    descriptor: descriptor.clone(),
                    session: None,
                });
            }
        }

        // Connected is announced before the open attempt; a failed open
        // is surfaced separately below.
        if let Some(name) = &descriptor.name {
            self.inner.sink.connectivity(name, true);
        }

        info!("opening device '{}'", descriptor.display_name());
        let opened = DeviceSession::open(
            self.inner.provider.clone(),
            descriptor.clone(),
            self.inner.sink.clone(),
        )
        .await;

        match opened {
            Ok(session) => match self.inner.devices.get_mut(&id) {
                Some(mut entry) => {
                    entry.session = Some(session);
                    debug!("device '{}' session ready", id);
                }
                None => {
                    // Removed while the open was in flight
                    warn!("device '{}' disappeared during open", id);
                    session.close();
                }
            },
            Err(err) => {
                warn!(
                    "failed to open device '{}': {}",
                    descriptor.display_name(),
                    err
                );
                self.inner.sink.device_failed(descriptor.display_name(), &err);
            }
        }
    }

    /// A device went away. Announces the disconnection (when the name is
    /// known), then closes the session and forgets the device. Removal of
    /// an unknown id is ignored.
    pub async fn device_removed(&self, id: &DeviceId) {
        let entry = match self.inner.devices.remove(id) {
            Some((_, entry)) => entry,
            None => {
                debug!("removal of unknown device '{}' ignored", id);
                return;
            }
        };

        if let Some(name) = &entry.descriptor.name {
            self.inner.sink.connectivity(name, false);
        }
        if let Some(session) = entry.session {
            session.close();
        }
        info!("device '{}' removed", entry.descriptor.display_name());
    }

    /// Enumerate the currently attached devices and run the arrival logic
    /// for each, for devices plugged in before watching began. Returns how
    /// many devices the provider reported.
    pub async fn scan_existing(&self) -> Result<usize> {
        let descriptors = match self.inner.provider.enumerate().await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                warn!("device scan failed: {}", err);
                return Err(err);
            }
        };

        let count = descriptors.len();
        for descriptor in descriptors {
            self.device_arrived(descriptor).await;
        }
        Ok(count)
    }

    /// Whether `id` currently has an open session.
    pub fn is_open(&self, id: &DeviceId) -> bool {
        self.inner
            .devices
            .get(id)
            .map(|entry| matches!(&entry.session, Some(session) if session.is_open()))
            .unwrap_or(false)
    }

    /// Number of devices with an open session.
    pub fn open_session_count(&self) -> usize {
        self.inner
            .devices
            .iter()
            .filter(|entry| matches!(&entry.session, Some(session) if session.is_open()))
            .count()
    }

    /// Close every session and forget all devices. No disconnect
    /// notifications are emitted; the host is shutting down with us.
    pub async fn shutdown(&self) {
        let ids: Vec<DeviceId> = self
            .inner
            .devices
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut closed = 0usize;
        for id in ids {
            if let Some((_, entry)) = self.inner.devices.remove(&id) {
                if let Some(session) = entry.session {
                    session.close();
                    closed += 1;
                }
            }
        }
        info!("registry shut down, {} session(s) closed", closed);
    }
}
