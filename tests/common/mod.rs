//! Shared fixtures: Standard MIDI Files built in memory.

#![allow(dead_code)]

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

pub const TICKS_PER_BEAT: u16 = 480;

pub fn note_on(delta: u32, key: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Midi {
            channel: 0u8.into(),
            message: MidiMessage::NoteOn {
                key: key.into(),
                vel: 100u8.into(),
            },
        },
    }
}

pub fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Midi {
            channel: 0u8.into(),
            message: MidiMessage::NoteOff {
                key: key.into(),
                vel: 0u8.into(),
            },
        },
    }
}

pub fn tempo(delta: u32, us_per_beat: u32) -> TrackEvent<'static> {
    TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat.into())),
    }
}

pub fn marker(delta: u32) -> TrackEvent<'static> {
    TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::Marker(b"sync")),
    }
}

pub fn end_of_track() -> TrackEvent<'static> {
    TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    }
}

/// Serializes `tracks` as a format 1 file at 480 ticks per beat.
pub fn smf_bytes(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
    let tracks = tracks
        .into_iter()
        .map(|mut events| {
            events.push(end_of_track());
            events
        })
        .collect();
    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(TICKS_PER_BEAT.into())),
        tracks,
    };
    let mut buffer = Vec::new();
    smf.write(&mut buffer).expect("fixture should serialize");
    buffer
}

/// One track playing `key` for `ticks` from time zero.
pub fn single_note(key: u8, ticks: u32) -> Vec<TrackEvent<'static>> {
    vec![note_on(0, key), note_off(ticks, key)]
}
