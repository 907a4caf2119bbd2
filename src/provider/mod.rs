//! Device provider seam
//!
//! The operating-system MIDI layer sits behind the [`DeviceProvider`]
//! trait: enumerating attached input devices and opening one for raw byte
//! delivery. Two implementations ship with the crate: [`system::SystemProvider`]
//! for real hardware and [`manual::ManualProvider`] for tests and embedding.

pub mod manual;
pub mod system;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Opaque device identity issued by a provider, stable for as long as the
/// device stays attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// An attached input device as reported by a provider. The name may be
/// unavailable; connectivity notifications are only sent for named devices,
/// but nameless ones are still opened and decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<DeviceId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }

    /// Descriptor whose id doubles as its display name, the common case
    /// for name-keyed providers.
    pub fn named(name: &str) -> Self {
        Self {
            id: DeviceId::new(name),
            name: Some(name.to_string()),
        }
    }

    /// Name if known, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// One raw byte delivery from a device, stamped with the provider's
/// monotonic clock in microseconds.
#[derive(Debug, Clone)]
pub struct RawChunk {
    data: Bytes,
    timestamp_micros: u64,
}

impl RawChunk {
    pub fn new(data: Bytes, timestamp_micros: u64) -> Self {
        Self {
            data,
            timestamp_micros,
        }
    }

    /// Copy a borrowed slice into an owned chunk; providers hand out short
    /// windows into buffers they reuse.
    pub fn from_slice(data: &[u8], timestamp_micros: u64) -> Self {
        Self::new(Bytes::copy_from_slice(data), timestamp_micros)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn timestamp_micros(&self) -> u64 {
        self.timestamp_micros
    }
}

/// Callback invoked by a provider for each raw chunk, on the provider's
/// own delivery thread. Implementations must not block.
pub type ChunkHandler = Arc<dyn Fn(RawChunk) + Send + Sync>;

/// RAII handle for an open device. Dropping it closes the underlying port
/// and ends byte delivery.
pub trait DeviceConnection: Send {}

/// Source of MIDI input devices.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Snapshot of the currently attached input devices.
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Open a device and subscribe `on_chunk` to its raw byte stream.
    async fn open(
        &self,
        descriptor: &DeviceDescriptor,
        on_chunk: ChunkHandler,
    ) -> Result<Box<dyn DeviceConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_id() {
        let named = DeviceDescriptor::named("Digital Piano");
        assert_eq!(named.display_name(), "Digital Piano");

        let nameless = DeviceDescriptor::new("hw:1,0,0", None);
        assert_eq!(nameless.display_name(), "hw:1,0,0");
    }

    #[test]
    fn test_chunk_copies_its_bytes() {
        let mut buffer = vec![0x90, 60, 100];
        let chunk = RawChunk::from_slice(&buffer, 42);
        buffer[1] = 0;

        assert_eq!(chunk.bytes(), &[0x90, 60, 100]);
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk.timestamp_micros(), 42);
    }
}
