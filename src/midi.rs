//! MIDI note decoding
//!
//! Turns raw channel-voice bytes into note events. Only Note On and Note
//! Off messages produce events; every other message type is recognized
//! just far enough to be skipped safely.

use serde::Serialize;
use std::fmt;
use tracing::trace;

/// A decoded note press or release.
///
/// `is_note_on` already folds the MIDI convention that a Note On with
/// velocity 0 means Note Off, so consumers never need to re-check the
/// velocity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteEvent {
    pub is_note_on: bool,
    /// Key number (0-127), 60 = Middle C
    pub key: u8,
    /// Velocity (0-127)
    pub velocity: u8,
    /// Channel (0-15)
    pub channel: u8,
}

impl NoteEvent {
    /// Decode a single channel-voice message.
    ///
    /// Returns `None` for anything that is not a complete Note On/Off:
    /// empty input, truncated messages, unsupported status bytes. Data
    /// bytes are masked to 7 bits, so malformed input can never produce
    /// an out-of-range key or velocity.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let status = data[0];
        let message_type = status & 0xF0;
        let channel = status & 0x0F;

        match message_type {
            0x80 | 0x90 => {
                if data.len() < 3 {
                    return None;
                }
                let key = data[1] & 0x7F;
                let velocity = data[2] & 0x7F;

                // Note On with velocity 0 = Note Off
                let is_note_on = message_type == 0x90 && velocity > 0;

                Some(NoteEvent {
                    is_note_on,
                    key,
                    velocity,
                    channel,
                })
            }
            _ => None,
        }
    }

    /// Render the event in the host wire format: `t,<key>,<velocity>` for
    /// presses, `f,<key>,<velocity>` for releases.
    pub fn wire_format(&self) -> String {
        format!(
            "{},{},{}",
            if self.is_note_on { "t" } else { "f" },
            self.key,
            self.velocity
        )
    }
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_note_on { "NoteOn" } else { "NoteOff" };
        write!(
            f,
            "{} ch:{} k:{} v:{}",
            kind,
            self.channel + 1,
            self.key,
            self.velocity
        )
    }
}

/// Expected byte count of a message starting with `status`, or `None` for
/// sysex, which runs until its 0xF7 terminator.
fn message_len(status: u8) -> Option<usize> {
    match (status, status & 0xF0) {
        (0xF0, _) => None,
        (0xF2, _) | (_, 0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0) => Some(3),
        (0xF1 | 0xF3, _) | (_, 0xC0 | 0xD0) => Some(2),
        _ => Some(1),
    }
}

/// Per-connection decoder state.
///
/// Frames a raw byte stream into messages, carrying an unfinished message
/// across chunk boundaries, and hands complete ones to [`NoteEvent::decode`].
/// Running status is not supported: a data byte with no message in progress
/// is discarded until the next status byte resynchronizes the stream.
#[derive(Debug, Default)]
pub struct DecoderState {
    /// Unfinished message carried over from earlier bytes; never grows past
    /// one complete channel-voice message.
    partial: Vec<u8>,
    pending_len: usize,
    /// Inside a sysex body, waiting for the 0xF7 terminator.
    in_sysex: bool,
}

impl DecoderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of raw bytes; returns the note events it completed,
    /// in stream order. An empty chunk completes nothing.
    pub fn feed(&mut self, data: &[u8]) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        for &byte in data {
            if let Some(event) = self.push(byte) {
                events.push(event);
            }
        }
        events
    }

    fn push(&mut self, byte: u8) -> Option<NoteEvent> {
        // Real-time bytes (0xF8-0xFF) may appear anywhere, even between
        // the bytes of another message; they carry no note data.
        if byte >= 0xF8 {
            return None;
        }

        if self.in_sysex {
            if byte == 0xF7 {
                self.in_sysex = false;
            }
            return None;
        }

        if byte & 0x80 != 0 {
            // A status byte always starts over; an unfinished message is
            // dropped rather than guessed at.
            if !self.partial.is_empty() {
                trace!("discarding incomplete message {}", format_hex(&self.partial));
                self.partial.clear();
            }
            if byte == 0xF0 {
                self.in_sysex = true;
            } else if let Some(len) = message_len(byte) {
                if len > 1 {
                    self.partial.push(byte);
                    self.pending_len = len;
                }
            }
            return None;
        }

        if self.partial.is_empty() {
            // Running status is not supported: without a status byte in
            // scope the stream cannot be framed, so skip until it resyncs.
            trace!("discarding orphan data byte 0x{:02X}", byte);
            return None;
        }

        self.partial.push(byte);
        if self.partial.len() < self.pending_len {
            return None;
        }

        let event = NoteEvent::decode(&self.partial);
        self.partial.clear();
        event
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
