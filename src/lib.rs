//! keybridge - bridge MIDI input devices to a host application
//!
//! Watches the machine's MIDI input devices, decodes their note traffic
//! and hands the host structured connectivity and note events. Three
//! layers, leaves first: [`midi`] decodes channel-voice bytes, [`session`]
//! owns one open device's receive state, and [`registry`] tracks the
//! device set and its lifecycle. The OS MIDI layer sits behind
//! [`provider::DeviceProvider`]; the host sits behind [`sink::EventSink`].

pub mod config;
pub mod error;
pub mod midi;
pub mod provider;
pub mod registry;
pub mod session;
pub mod sink;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use midi::{DecoderState, NoteEvent};
pub use provider::manual::ManualProvider;
pub use provider::system::SystemProvider;
pub use provider::{DeviceDescriptor, DeviceId, DeviceProvider, RawChunk};
pub use registry::DeviceRegistry;
pub use session::{DeviceSession, SessionState};
pub use sink::{BridgeEvent, ChannelSink, EventSink, RecordingSink};
