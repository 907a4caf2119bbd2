//! Bridge error taxonomy
//!
//! Every variant here is local to a single device or provider call.
//! Failures are logged and surfaced through the sink, never escalated to
//! tear down other devices. Unsupported and incomplete MIDI messages are
//! not errors at all; the decoder drops them without comment.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A device was present but could not be opened for input.
    #[error("failed to open device '{device}': {reason}")]
    DeviceOpen { device: String, reason: String },

    /// The provider could not list the attached devices.
    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    /// The port backing a device disappeared between enumeration and open.
    #[error("MIDI input port '{0}' not found")]
    PortNotFound(String),

    /// The system MIDI client could not be created.
    #[error("MIDI subsystem unavailable: {0}")]
    Init(#[from] midir::InitError),
}

pub type Result<T> = std::result::Result<T, Error>;
