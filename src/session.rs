//! Device session lifecycle
//!
//! One session per open device. A session owns the device's decoder state
//! and the provider's connection handle, and forwards decoded events to
//! the sink tagged with the device identity.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::Result;
use crate::midi::DecoderState;
use crate::provider::{ChunkHandler, DeviceConnection, DeviceDescriptor, DeviceProvider, RawChunk};
use crate::sink::EventSink;

/// Session lifecycle states. There is no transition out of `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Open,
    Closed,
}

/// The receive side of one open device.
pub struct DeviceSession {
    descriptor: DeviceDescriptor,
    sink: Arc<dyn EventSink>,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: SessionState,
    decoder: DecoderState,
    connection: Option<Box<dyn DeviceConnection>>,
}

impl DeviceSession {
    /// Open `descriptor` through the provider and start delivering its
    /// decoded events to `sink`. On failure no session exists and the
    /// device stays unopened.
    pub async fn open(
        provider: Arc<dyn DeviceProvider>,
        descriptor: DeviceDescriptor,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<Self>> {
        let session = Arc::new(Self {
            descriptor,
            sink,
            inner: Mutex::new(SessionInner {
                state: SessionState::Opening,
                decoder: DecoderState::new(),
                connection: None,
            }),
        });

        // The provider's delivery thread holds only a weak handle, so a
        // session dropped elsewhere stops receiving instead of leaking.
        let on_chunk: ChunkHandler = {
            let weak = Arc::downgrade(&session);
            Arc::new(move |chunk| {
                if let Some(session) = weak.upgrade() {
                    session.on_chunk(chunk);
                }
            })
        };

        match provider.open(&session.descriptor, on_chunk).await {
            Ok(connection) => {
                let mut inner = session.inner.lock();
                inner.connection = Some(connection);
                inner.state = SessionState::Open;
                drop(inner);

                debug!("session open for device '{}'", session.descriptor.id);
                Ok(session)
            }
            Err(err) => {
                session.inner.lock().state = SessionState::Closed;
                Err(err)
            }
        }
    }

    /// Decode one chunk and emit its events.
    ///
    /// Decoding and emission run under the session lock. `close` takes the
    /// same lock, so once the Closed transition is visible no further
    /// event can reach the sink.
    fn on_chunk(&self, chunk: RawChunk) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Open {
            trace!(
                "dropping {} byte(s) for device '{}' in state {:?}",
                chunk.len(),
                self.descriptor.id,
                inner.state
            );
            return;
        }

        for event in inner.decoder.feed(chunk.bytes()) {
            trace!("device '{}': {}", self.descriptor.id, event);
            self.sink.note_event(&self.descriptor.id, &event);
        }
    }

    /// Transition to Closed and release the connection. Idempotent.
    pub fn close(&self) {
        let connection = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Closed;
            inner.connection.take()
        };

        // The handle must drop outside the lock: closing a port can join
        // the provider's delivery thread, and that thread may itself be
        // waiting on this lock.
        drop(connection);
        debug!("session closed for device '{}'", self.descriptor.id);
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::manual::ManualProvider;
    use crate::sink::RecordingSink;

    fn make_test_parts(name: &str) -> (Arc<ManualProvider>, Arc<RecordingSink>, DeviceDescriptor) {
        let provider = Arc::new(ManualProvider::new());
        let sink = Arc::new(RecordingSink::new());
        let descriptor = DeviceDescriptor::named(name);
        provider.add_device(descriptor.clone());
        (provider, sink, descriptor)
    }

    #[tokio::test]
    async fn test_open_then_close() {
        let (provider, sink, descriptor) = make_test_parts("Test Piano");

        let session = DeviceSession::open(provider.clone(), descriptor, sink)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.is_open());

        session.close();
        assert_eq!(session.state(), SessionState::Closed);

        // Closing again stays Closed
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_chunks_become_sink_events() {
        let (provider, sink, descriptor) = make_test_parts("Test Piano");

        let _session = DeviceSession::open(provider.clone(), descriptor.clone(), sink.clone())
            .await
            .unwrap();

        assert!(provider.push_chunk(&descriptor.id, &[0x90, 60, 100]));
        assert!(provider.push_chunk(&descriptor.id, &[0x80, 60, 0]));
        assert_eq!(sink.note_count(), 2);
    }

    #[tokio::test]
    async fn test_decoder_state_carries_across_chunks() {
        let (provider, sink, descriptor) = make_test_parts("Test Piano");

        let _session = DeviceSession::open(provider.clone(), descriptor.clone(), sink.clone())
            .await
            .unwrap();

        provider.push_chunk(&descriptor.id, &[0x90, 60]);
        assert_eq!(sink.note_count(), 0);

        provider.push_chunk(&descriptor.id, &[100]);
        assert_eq!(sink.note_count(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_emits_nothing() {
        let (provider, sink, descriptor) = make_test_parts("Test Piano");

        let session = DeviceSession::open(provider.clone(), descriptor.clone(), sink.clone())
            .await
            .unwrap();
        session.close();

        // Bytes delivered after the close are dropped, even straight into
        // the handler
        session.on_chunk(RawChunk::from_slice(&[0x90, 60, 100], 0));
        assert_eq!(sink.note_count(), 0);

        // And the provider side is unsubscribed too
        assert!(!provider.push_chunk(&descriptor.id, &[0x90, 60, 100]));
    }

    #[tokio::test]
    async fn test_failed_open_leaves_no_session() {
        let (provider, sink, descriptor) = make_test_parts("Test Piano");
        provider.fail_next_open();

        let result = DeviceSession::open(provider.clone(), descriptor, sink.clone()).await;
        assert!(result.is_err());
        assert_eq!(sink.note_count(), 0);
    }
}
