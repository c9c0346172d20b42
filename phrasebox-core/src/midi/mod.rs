//! MIDI input. Note-ons trigger playback; everything else is parsed and
//! ignored by the controller.

use crossbeam_channel::{Receiver, Sender};
use midir::{MidiInput, MidiInputConnection};

const CLIENT_NAME: &str = "phrasebox";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Driver timestamp in microseconds.
    pub timestamp_us: u64,
    pub kind: MidiEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiEvent {
    pub fn new(timestamp_us: u64, kind: MidiEventKind) -> Self {
        Self { timestamp_us, kind }
    }

    /// True for a note-on with nonzero velocity.
    pub fn is_trigger(&self) -> bool {
        matches!(self.kind, MidiEventKind::NoteOn { velocity, .. } if velocity > 0)
    }
}

#[derive(Debug, Clone)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// List MIDI input ports on the system.
pub fn list_ports() -> Vec<MidiPortInfo> {
    let midi_in = match MidiInput::new(CLIENT_NAME) {
        Ok(m) => m,
        Err(e) => {
            log::warn!(target: "midi", "MIDI input unavailable: {}", e);
            return Vec::new();
        }
    };
    midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// A connection to one MIDI input port. Parsed events arrive on a channel so
/// any thread can consume them.
pub struct MidiInputManager {
    connection: Option<MidiInputConnection<()>>,
    port_name: Option<String>,
    sender: Sender<MidiEvent>,
    receiver: Receiver<MidiEvent>,
}

impl MidiInputManager {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            connection: None,
            port_name: None,
            sender,
            receiver,
        }
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Connect to the input port at `port_index`, replacing any existing
    /// connection.
    pub fn connect(&mut self, port_index: usize) -> Result<(), String> {
        self.disconnect();

        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .ok_or_else(|| format!("Invalid MIDI port index: {}", port_index))?;
        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let tx = self.sender.clone();
        let connection = midi_in
            .connect(
                port,
                "phrasebox-input",
                move |timestamp, message, _| {
                    if let Some(kind) = parse_midi_message(message) {
                        let _ = tx.send(MidiEvent::new(timestamp, kind));
                    }
                },
                (),
            )
            .map_err(|e| e.to_string())?;

        log::info!(target: "midi", "connected to MIDI port {}", name);
        self.connection = Some(connection);
        self.port_name = Some(name);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            log::info!(target: "midi", "MIDI port disconnected");
        }
        self.port_name = None;
    }

    /// A receiver for parsed events. Events keep flowing across reconnects.
    pub fn events(&self) -> Receiver<MidiEvent> {
        self.receiver.clone()
    }
}

impl Default for MidiInputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MidiInputManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Parse a raw channel message. Note-on with velocity 0 is a note-off.
pub fn parse_midi_message(data: &[u8]) -> Option<MidiEventKind> {
    let (&status, rest) = data.split_first()?;
    let channel = status & 0x0F;
    match (status & 0xF0, rest) {
        (0x80, [note, _, ..]) => Some(MidiEventKind::NoteOff {
            channel,
            note: *note,
        }),
        (0x90, [note, 0, ..]) => Some(MidiEventKind::NoteOff {
            channel,
            note: *note,
        }),
        (0x90, [note, velocity, ..]) => Some(MidiEventKind::NoteOn {
            channel,
            note: *note,
            velocity: *velocity,
        }),
        (0xB0, [controller, value, ..]) => Some(MidiEventKind::ControlChange {
            channel,
            controller: *controller,
            value: *value,
        }),
        _ => None,
    }
}
