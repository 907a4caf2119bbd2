//! Hotplug watching by enumeration polling
//!
//! The system MIDI layer exposes no change callbacks, so arrivals and
//! removals are synthesized by diffing the provider's enumeration against
//! the device table on an interval. Providers that do have native change
//! callbacks can skip this and call `device_arrived`/`device_removed`
//! directly.

use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

impl super::DeviceRegistry {
    /// Spawn the polling watcher task. Aborting the returned handle stops
    /// the watching; open sessions are unaffected.
    pub fn watch(&self, poll_interval: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                registry.poll_devices().await;
            }
        })
    }

    /// One enumerate-and-diff pass. An enumeration failure skips the pass;
    /// the device table is left untouched and polling continues.
    pub(crate) async fn poll_devices(&self) {
        let present = match self.inner.provider.enumerate().await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                warn!("device poll failed: {}", err);
                return;
            }
        };

        let mut seen = HashSet::with_capacity(present.len());
        for descriptor in present {
            seen.insert(descriptor.id.clone());
            if !self.inner.devices.contains_key(&descriptor.id) {
                self.device_arrived(descriptor).await;
            }
        }

        let gone: Vec<_> = self
            .inner
            .devices
            .iter()
            .filter(|entry| !seen.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        for id in gone {
            self.device_removed(&id).await;
        }
    }
}
