//! midir-backed device provider
//!
//! Enumerates the operating system's MIDI input ports and opens them for
//! raw byte delivery. Ports are identified by name, so two ports with
//! identical names are indistinguishable to this provider.

use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection};
use tracing::debug;

use super::{ChunkHandler, DeviceConnection, DeviceDescriptor, DeviceProvider, RawChunk};
use crate::error::{Error, Result};

/// A discovered MIDI input port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub is_virtual: bool,
}

/// Provider over the operating system's MIDI input ports.
pub struct SystemProvider {
    client_name: String,
    name_filter: Option<String>,
}

impl SystemProvider {
    /// `client_name` is the MIDI client registered with the OS, visible in
    /// other applications' port lists.
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            name_filter: None,
        }
    }

    /// Restrict enumeration to ports whose name contains `filter`
    /// (case-insensitive), the usual way to pick one keyboard out of a
    /// crowded port list.
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.name_filter = filter;
        self
    }

    fn matches_filter(&self, name: &str) -> bool {
        match &self.name_filter {
            Some(filter) => name.to_lowercase().contains(&filter.to_lowercase()),
            None => true,
        }
    }

    /// List every input port, unfiltered.
    pub fn input_ports(&self) -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new(&format!("{}-scan", self.client_name))
            .map_err(|e| Error::Enumeration(e.to_string()))?;

        let mut port_infos = Vec::new();
        for (index, port) in midi_in.ports().iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                let is_virtual = name.contains("Virtual")
                    || name.contains("loopMIDI")
                    || name.contains("IAC");

                port_infos.push(PortInfo {
                    index,
                    name,
                    is_virtual,
                });
            }
        }

        Ok(port_infos)
    }
}

#[async_trait]
impl DeviceProvider for SystemProvider {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let descriptors = self
            .input_ports()?
            .into_iter()
            .filter(|port| self.matches_filter(&port.name))
            .map(|port| DeviceDescriptor::named(&port.name))
            .collect();

        Ok(descriptors)
    }

    async fn open(
        &self,
        descriptor: &DeviceDescriptor,
        on_chunk: ChunkHandler,
    ) -> Result<Box<dyn DeviceConnection>> {
        let midi_in = MidiInput::new(&format!("{}-in", self.client_name))?;

        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name == descriptor.id.as_str())
                    .unwrap_or(false)
            })
            .ok_or_else(|| Error::PortNotFound(descriptor.id.to_string()))?;

        debug!("connecting to input port '{}'", descriptor.id);

        let connection = midi_in
            .connect(
                &port,
                &self.client_name,
                move |timestamp, data, _| {
                    on_chunk(RawChunk::from_slice(data, timestamp));
                },
                (),
            )
            .map_err(|e| Error::DeviceOpen {
                device: descriptor.display_name().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(SystemConnection { _conn: connection }))
    }
}

/// Keeps the midir connection alive; dropping it closes the port.
struct SystemConnection {
    _conn: MidiInputConnection<()>,
}

// Explicitly implement Send. This is safe because the platform handle is
// owned exclusively by this holder and only ever moves between threads
// together with its session; it is never aliased.
unsafe impl Send for SystemConnection {}

impl DeviceConnection for SystemConnection {}

/// Print discovered input ports for debugging
pub fn list_ports_formatted() {
    use colored::*;

    println!("\n{}", "=== MIDI Input Ports ===".bold().cyan());
    match SystemProvider::new("keybridge-scan").input_ports() {
        Ok(ports) if ports.is_empty() => println!("  (none)"),
        Ok(ports) => {
            for port in ports {
                let virtual_tag = if port.is_virtual { " [VIRTUAL]" } else { "" };
                println!("  {}: {}{}", port.index, port.name, virtual_tag);
            }
        }
        Err(e) => println!("  enumeration failed: {}", e),
    }
    println!();
}
