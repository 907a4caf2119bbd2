//! Scripted device provider
//!
//! Drives the provider seam programmatically: devices are attached and
//! detached by method calls instead of hotplug, and chunks are pushed by
//! hand. The lifecycle tests run on it, and embedders can use it to feed
//! the bridge from non-MIDI sources.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use super::{ChunkHandler, DeviceConnection, DeviceDescriptor, DeviceId, DeviceProvider, RawChunk};
use crate::error::{Error, Result};

pub struct ManualProvider {
    inner: Arc<ManualInner>,
}

struct ManualInner {
    devices: DashMap<DeviceId, ManualDevice>,
    fail_next_open: Mutex<bool>,
    fail_next_enumerate: Mutex<bool>,
    started: Instant,
}

struct ManualDevice {
    descriptor: DeviceDescriptor,
    handler: Option<ChunkHandler>,
}

impl ManualProvider {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ManualInner {
                devices: DashMap::new(),
                fail_next_open: Mutex::new(false),
                fail_next_enumerate: Mutex::new(false),
                started: Instant::now(),
            }),
        }
    }

    /// Attach a device; it shows up in the next enumeration. Re-attaching
    /// a known id is a no-op.
    pub fn add_device(&self, descriptor: DeviceDescriptor) {
        self.inner
            .devices
            .entry(descriptor.id.clone())
            .or_insert(ManualDevice {
                descriptor,
                handler: None,
            });
    }

    /// Detach a device. Its subscriber stops receiving chunks immediately;
    /// closing the corresponding session is still the registry's job.
    pub fn remove_device(&self, id: &DeviceId) {
        self.inner.devices.remove(id);
    }

    /// Deliver raw bytes to the device's subscriber, stamped with the
    /// provider's monotonic clock. Returns false when the device is
    /// missing or nothing is subscribed.
    pub fn push_chunk(&self, id: &DeviceId, data: &[u8]) -> bool {
        // Clone the handler out of the map so it runs without the shard
        // lock held.
        let handler = self
            .inner
            .devices
            .get(id)
            .and_then(|device| device.handler.clone());

        match handler {
            Some(handler) => {
                let timestamp = self.inner.started.elapsed().as_micros() as u64;
                handler(RawChunk::from_slice(data, timestamp));
                true
            }
            None => false,
        }
    }

    /// Make the next `open` call fail.
    pub fn fail_next_open(&self) {
        *self.inner.fail_next_open.lock() = true;
    }

    /// Make the next `enumerate` call fail.
    pub fn fail_next_enumerate(&self) {
        *self.inner.fail_next_enumerate.lock() = true;
    }
}

impl Default for ManualProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProvider for ManualProvider {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        if std::mem::take(&mut *self.inner.fail_next_enumerate.lock()) {
            return Err(Error::Enumeration("scripted enumeration failure".to_string()));
        }

        Ok(self
            .inner
            .devices
            .iter()
            .map(|entry| entry.value().descriptor.clone())
            .collect())
    }

    async fn open(
        &self,
        descriptor: &DeviceDescriptor,
        on_chunk: ChunkHandler,
    ) -> Result<Box<dyn DeviceConnection>> {
        if std::mem::take(&mut *self.inner.fail_next_open.lock()) {
            return Err(Error::DeviceOpen {
                device: descriptor.display_name().to_string(),
                reason: "scripted open failure".to_string(),
            });
        }

        let mut device =
            self.inner
                .devices
                .get_mut(&descriptor.id)
                .ok_or_else(|| Error::DeviceOpen {
                    device: descriptor.display_name().to_string(),
                    reason: "device not attached".to_string(),
                })?;
        device.handler = Some(on_chunk);

        Ok(Box::new(ManualConnection {
            inner: self.inner.clone(),
            id: descriptor.id.clone(),
        }))
    }
}

/// Unsubscribes its device's handler when dropped, mirroring how closing a
/// real port ends byte delivery.
struct ManualConnection {
    inner: Arc<ManualInner>,
    id: DeviceId,
}

impl Drop for ManualConnection {
    fn drop(&mut self) {
        if let Some(mut device) = self.inner.devices.get_mut(&self.id) {
            device.handler = None;
        }
    }
}

impl DeviceConnection for ManualConnection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enumerate_reports_attached_devices() {
        let provider = ManualProvider::new();
        provider.add_device(DeviceDescriptor::named("A"));
        provider.add_device(DeviceDescriptor::named("B"));

        let mut names: Vec<_> = provider
            .enumerate()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn test_push_reaches_subscriber_until_connection_drops() {
        let provider = ManualProvider::new();
        let descriptor = DeviceDescriptor::named("A");
        provider.add_device(descriptor.clone());

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let connection = provider
            .open(
                &descriptor,
                Arc::new(move |chunk: RawChunk| {
                    sink.lock().push(chunk.bytes().to_vec());
                }),
            )
            .await
            .unwrap();

        assert!(provider.push_chunk(&descriptor.id, &[0x90, 60, 100]));
        assert_eq!(received.lock().len(), 1);

        drop(connection);
        assert!(!provider.push_chunk(&descriptor.id, &[0x90, 60, 100]));
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_fire_once() {
        let provider = ManualProvider::new();
        let descriptor = DeviceDescriptor::named("A");
        provider.add_device(descriptor.clone());

        provider.fail_next_open();
        assert!(provider
            .open(&descriptor, Arc::new(|_| {}))
            .await
            .is_err());
        assert!(provider
            .open(&descriptor, Arc::new(|_| {}))
            .await
            .is_ok());

        provider.fail_next_enumerate();
        assert!(provider.enumerate().await.is_err());
        assert!(provider.enumerate().await.is_ok());
    }
}
