//! Event and track types shared by extraction, merging and encoding.

/// Symbol played as silence for the event's duration.
pub const REST_SYMBOL: u8 = 0xFF;
/// Terminator symbol closing every frame.
pub const TERMINATOR_SYMBOL: u8 = 0xFE;
/// Zero-duration synchronization barrier.
pub const MARKER_SYMBOL: u8 = 0xFD;

/// Largest duration a 16-bit event record can carry, in milliseconds.
pub const DURATION_MAX: u16 = u16::MAX;

/// One (start, symbol, duration) triple of a monophonic voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    /// Absolute start position in ticks.
    pub start: u64,
    pub symbol: u8,
    pub duration_ms: u16,
}

impl Event {
    pub fn note(start: u64, note: u8, duration_ms: u16) -> Self {
        Self {
            start,
            symbol: note,
            duration_ms,
        }
    }

    pub fn rest(start: u64, duration_ms: u16) -> Self {
        Self {
            start,
            symbol: REST_SYMBOL,
            duration_ms,
        }
    }

    pub fn marker(start: u64) -> Self {
        Self {
            start,
            symbol: MARKER_SYMBOL,
            duration_ms: 0,
        }
    }

    pub fn is_marker(&self) -> bool {
        self.symbol == MARKER_SYMBOL
    }

    pub fn is_rest(&self) -> bool {
        self.symbol == REST_SYMBOL
    }

    /// The three bytes of the wire record: symbol, duration high, duration low.
    pub fn record(&self) -> [u8; 3] {
        let [hi, lo] = self.duration_ms.to_be_bytes();
        [self.symbol, hi, lo]
    }
}

/// Ordered events for one voice, tagged with its position in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Index of the MIDI track this voice was extracted from.
    pub source_index: usize,
    pub events: Vec<Event>,
}

impl Track {
    pub fn new(source_index: usize, events: Vec<Event>) -> Self {
        Self {
            source_index,
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !e.is_marker() && !e.is_rest())
            .count()
    }

    pub fn marker_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_marker()).count()
    }

    /// Sum of all event durations in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.duration_ms)).sum()
    }
}
