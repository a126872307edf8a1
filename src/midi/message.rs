use midly::{MetaMessage, MidiMessage, TrackEvent, TrackEventKind};

/// The parts of a MIDI message the extractor cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Note On with non-zero velocity
    NoteOn { note: u8, velocity: u8 },
    /// Note Off, or Note On with zero velocity
    NoteOff { note: u8 },
    /// Tempo change in microseconds per beat
    SetTempo(u32),
    /// Marker meta event, used as a synchronization barrier
    Marker,
    /// Anything else (channels, controllers, pitch bend...)
    Other,
}

/// A delta-time tagged message from one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackMessage {
    pub delta: u32,
    pub kind: MessageKind,
}

impl TrackMessage {
    pub fn new(delta: u32, kind: MessageKind) -> Self {
        Self { delta, kind }
    }

    pub fn note_on(delta: u32, note: u8, velocity: u8) -> Self {
        Self::new(delta, MessageKind::NoteOn { note, velocity })
    }

    pub fn note_off(delta: u32, note: u8) -> Self {
        Self::new(delta, MessageKind::NoteOff { note })
    }

    pub fn set_tempo(delta: u32, tempo_us: u32) -> Self {
        Self::new(delta, MessageKind::SetTempo(tempo_us))
    }

    pub fn marker(delta: u32) -> Self {
        Self::new(delta, MessageKind::Marker)
    }
}

impl From<&TrackEvent<'_>> for TrackMessage {
    fn from(event: &TrackEvent<'_>) -> Self {
        let kind = match event.kind {
            TrackEventKind::Midi { message, .. } => match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => MessageKind::NoteOn {
                    note: key.as_int(),
                    velocity: vel.as_int(),
                },
                // Note On with velocity 0 is Note Off
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                    MessageKind::NoteOff { note: key.as_int() }
                }
                _ => MessageKind::Other,
            },
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                MessageKind::SetTempo(tempo.as_int())
            }
            TrackEventKind::Meta(MetaMessage::Marker(_)) => MessageKind::Marker,
            _ => MessageKind::Other,
        };
        TrackMessage::new(event.delta.as_int(), kind)
    }
}
