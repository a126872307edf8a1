//! MIDI functionality for NodeSync
//!
//! This module turns a Standard MIDI File into per-voice event tracks:
//! - Message model decoupled from the file parser
//! - Monophonic note/rest extraction with tempo-aware timing
//! - Two-phase synchronization barrier merging
//! - File loading on top of `midly`
//!
//! The main components are:
//! - [`EventExtractor`] for converting one track's messages into events
//! - [`MarkerAccumulator`] and [`merge_markers`] for cross-track barriers
//! - [`load`] and [`load_bytes`] running the whole pipeline
//!
mod extractor;
mod file;
mod marker;
mod message;

pub use extractor::{ticks_to_ms, EventExtractor, ExtractedTrack, ParseWarning};
pub use file::{load, load_bytes, LoadError, LoadedFile, SMPTE_FALLBACK_TICKS_PER_BEAT};
pub use marker::{merge_markers, MarkerAccumulator};
pub use message::{MessageKind, TrackMessage};

/// Tempo assumed until the first `set_tempo` message, in microseconds per beat.
pub const DEFAULT_TEMPO_US: u32 = 500_000;
/// Rests shorter than this many milliseconds are not emitted.
pub const DEFAULT_MIN_REST_MS: u64 = 5;

/// Knobs for one extraction run
#[derive(Debug, Clone, PartialEq)]
pub struct MidiSettings {
    pub default_tempo_us: u32,
    pub min_rest_ms: u64,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            default_tempo_us: DEFAULT_TEMPO_US,
            min_rest_ms: DEFAULT_MIN_REST_MS,
        }
    }
}
