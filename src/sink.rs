//! Application sink seam
//!
//! Decoded output leaves the bridge through [`EventSink`]. [`ChannelSink`]
//! carries events from provider delivery threads into a tokio channel for
//! a select-loop host; [`RecordingSink`] captures everything for
//! inspection.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Error;
use crate::midi::NoteEvent;
use crate::provider::DeviceId;

/// Receives bridge output. Methods are called from provider delivery
/// threads and must not block.
pub trait EventSink: Send + Sync {
    /// Device connectivity changed. Only devices with a known name are
    /// announced.
    fn connectivity(&self, device: &str, connected: bool);

    /// A note event decoded from an open device.
    fn note_event(&self, device: &DeviceId, event: &NoteEvent);

    /// A device failed to open. Default is a no-op so sinks that only
    /// care about the two standard notifications need not implement it.
    fn device_failed(&self, _device: &str, _error: &Error) {}
}

/// Bridge output as one channel payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeEvent {
    Connectivity {
        device: String,
        connected: bool,
    },
    Note {
        device: String,
        #[serde(flatten)]
        event: NoteEvent,
    },
    Failed {
        device: String,
        reason: String,
    },
}

/// Sink that pushes events into a bounded tokio channel with `try_send`.
/// A full or closed channel drops the event with a warning instead of
/// blocking the provider's delivery thread.
pub struct ChannelSink {
    tx: mpsc::Sender<BridgeEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BridgeEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn forward(&self, event: BridgeEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("dropping bridge event: {}", e);
        }
    }
}

impl EventSink for ChannelSink {
    fn connectivity(&self, device: &str, connected: bool) {
        self.forward(BridgeEvent::Connectivity {
            device: device.to_string(),
            connected,
        });
    }

    fn note_event(&self, device: &DeviceId, event: &NoteEvent) {
        self.forward(BridgeEvent::Note {
            device: device.to_string(),
            event: event.clone(),
        });
    }

    fn device_failed(&self, device: &str, error: &Error) {
        self.forward(BridgeEvent::Failed {
            device: device.to_string(),
            reason: error.to_string(),
        });
    }
}

/// Sink that records everything it receives, in arrival order
///
/// This is useful for:
/// - Exercising the device lifecycle without a real host
/// - Asserting on notification ordering in tests
/// - Dumping bridge traffic while debugging
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BridgeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    pub fn events(&self) -> Vec<BridgeEvent> {
        self.events.lock().clone()
    }

    /// Connectivity transitions only, as (device, connected) pairs.
    pub fn connectivity_log(&self) -> Vec<(String, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BridgeEvent::Connectivity { device, connected } => {
                    Some((device.clone(), *connected))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of note events received.
    pub fn note_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, BridgeEvent::Note { .. }))
            .count()
    }

    /// Devices reported as failed to open.
    pub fn failed_devices(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                BridgeEvent::Failed { device, .. } => Some(device.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: BridgeEvent) {
        self.events.lock().push(event);
    }
}

impl EventSink for RecordingSink {
    fn connectivity(&self, device: &str, connected: bool) {
        self.push(BridgeEvent::Connectivity {
            device: device.to_string(),
            connected,
        });
    }

    fn note_event(&self, device: &DeviceId, event: &NoteEvent) {
        self.push(BridgeEvent::Note {
            device: device.to_string(),
            event: event.clone(),
        });
    }

    fn device_failed(&self, device: &str, error: &Error) {
        self.push(BridgeEvent::Failed {
            device: device.to_string(),
            reason: error.to_string(),
        });
    }
}
