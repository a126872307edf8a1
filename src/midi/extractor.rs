use super::{MessageKind, MidiSettings, TrackMessage};
use crate::event::{Event, DURATION_MAX, REST_SYMBOL};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;

/// Non-fatal problem found while extracting events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// A note or rest was longer than a record can hold and was clamped
    DurationClamped {
        track: usize,
        symbol: u8,
        start: u64,
        computed_ms: u64,
    },
    /// The file uses SMPTE timecode; a metrical resolution was assumed
    TimecodeTiming { assumed_ticks_per_beat: u16 },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::DurationClamped {
                track,
                symbol,
                start,
                computed_ms,
            } => write!(
                f,
                "track {}: duration of symbol {} at tick {} is {} ms, clamped to {} ms",
                track, symbol, start, computed_ms, DURATION_MAX
            ),
            ParseWarning::TimecodeTiming {
                assumed_ticks_per_beat,
            } => write!(
                f,
                "SMPTE timecode timing is not supported, assuming {} ticks per beat",
                assumed_ticks_per_beat
            ),
        }
    }
}

/// Events and barrier candidates produced by one track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTrack {
    pub events: Vec<Event>,
    /// Absolute tick positions at which markers were anchored
    pub barriers: Vec<u64>,
}

/// Converts ticks to whole milliseconds at the given tempo.
pub fn ticks_to_ms(ticks: u64, tempo_us: u32, ticks_per_beat: u16) -> u64 {
    let divisor = u128::from(ticks_per_beat.max(1)) * 1000;
    let ms = u128::from(ticks) * u128::from(tempo_us) / divisor;
    u64::try_from(ms).unwrap_or(u64::MAX)
}

/// Turns the message streams of a file's tracks into monophonic events.
///
/// Tempo is carried from one track to the next, so a tempo map in the first
/// track of a multi-track file applies to the tracks that follow it.
pub struct EventExtractor {
    ticks_per_beat: u16,
    tempo_us: u32,
    min_rest_ms: u64,
    warnings: Vec<ParseWarning>,
}

impl EventExtractor {
    pub fn new(ticks_per_beat: u16, settings: &MidiSettings) -> Self {
        Self {
            ticks_per_beat,
            tempo_us: settings.default_tempo_us,
            min_rest_ms: settings.min_rest_ms,
            warnings: Vec::new(),
        }
    }

    pub fn tempo_us(&self) -> u32 {
        self.tempo_us
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ParseWarning> {
        self.warnings
    }

    /// Extracts one track. `track` is only used to label warnings.
    pub fn extract(&mut self, track: usize, messages: &[TrackMessage]) -> ExtractedTrack {
        let mut out = ExtractedTrack::default();
        let mut abs_time: u64 = 0;
        let mut last_release: u64 = 0;
        // Keyed by pitch: a repeated strike replaces the earlier start time
        let mut active: HashMap<u8, u64> = HashMap::new();
        let mut pending_marker = false;

        for msg in messages {
            abs_time += u64::from(msg.delta);

            if pending_marker && msg.delta > 0 {
                debug!("track {}: barrier anchored at tick {}", track, abs_time);
                out.barriers.push(abs_time);
                pending_marker = false;
            }

            match msg.kind {
                MessageKind::SetTempo(tempo) => {
                    debug!("track {}: tempo {} us/beat at tick {}", track, tempo, abs_time);
                    self.tempo_us = tempo;
                }
                MessageKind::NoteOn { note, .. } => {
                    let rest_ms = self.to_ms(abs_time.saturating_sub(last_release));
                    if rest_ms >= self.min_rest_ms {
                        let duration = self.clamp(track, REST_SYMBOL, last_release, rest_ms);
                        out.events.push(Event::rest(last_release, duration));
                    }
                    active.insert(note, abs_time);
                }
                MessageKind::NoteOff { note } => {
                    if let Some(start) = active.remove(&note) {
                        let duration_ms = self.to_ms(abs_time - start);
                        let duration = self.clamp(track, note, start, duration_ms);
                        out.events.push(Event::note(start, note, duration));
                        last_release = abs_time;
                    }
                }
                MessageKind::Marker => pending_marker = true,
                MessageKind::Other => {}
            }
        }

        if pending_marker {
            debug!(
                "track {}: marker at tick {} never followed by a later event, dropped",
                track, abs_time
            );
        }

        out
    }

    fn to_ms(&self, ticks: u64) -> u64 {
        ticks_to_ms(ticks, self.tempo_us, self.ticks_per_beat)
    }

    fn clamp(&mut self, track: usize, symbol: u8, start: u64, computed_ms: u64) -> u16 {
        match u16::try_from(computed_ms) {
            Ok(duration) => duration,
            Err(_) => {
                let warning = ParseWarning::DurationClamped {
                    track,
                    symbol,
                    start,
                    computed_ms,
                };
                warn!("{}", warning);
                self.warnings.push(warning);
                DURATION_MAX
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EventExtractor {
        EventExtractor::new(480, &MidiSettings::default())
    }

    #[test]
    fn test_ticks_to_ms_truncates() {
        // 480 ticks at 500000 us/beat is exactly 500 ms
        assert_eq!(ticks_to_ms(480, 500_000, 480), 500);
        // 1 tick is 1.0416 ms
        assert_eq!(ticks_to_ms(1, 500_000, 480), 1);
        assert_eq!(ticks_to_ms(0, 500_000, 480), 0);
    }

    #[test]
    fn test_single_note_without_leading_rest() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[TrackMessage::note_on(0, 60, 100), TrackMessage::note_off(480, 60)],
        );
        assert_eq!(out.events, vec![Event::note(0, 60, 500)]);
        assert!(out.barriers.is_empty());
    }

    #[test]
    fn test_rest_emitted_at_last_release() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(480, 60),
                TrackMessage::note_on(240, 62, 100),
                TrackMessage::note_off(480, 62),
            ],
        );
        assert_eq!(
            out.events,
            vec![
                Event::note(0, 60, 500),
                Event::rest(480, 250),
                Event::note(720, 62, 500),
            ]
        );
    }

    #[test]
    fn test_short_rest_is_skipped() {
        let mut ex = extractor();
        // 4 ticks is 4 ms, under the 5 ms threshold
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(480, 60),
                TrackMessage::note_on(4, 62, 100),
                TrackMessage::note_off(480, 62),
            ],
        );
        assert!(out.events.iter().all(|e| e.symbol != REST_SYMBOL));
        assert_eq!(out.events.len(), 2);
    }

    #[test]
    fn test_unmatched_note_off_is_ignored() {
        let mut ex = extractor();
        let out = ex.extract(0, &[TrackMessage::note_off(100, 60)]);
        assert!(out.events.is_empty());
        assert!(ex.warnings().is_empty());
    }

    #[test]
    fn test_restrike_replaces_start_time() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_on(480, 60, 100),
                TrackMessage::note_off(480, 60),
                // The second release has nothing left to close
                TrackMessage::note_off(480, 60),
            ],
        );
        // No release happened before the restrike, so the gap counts as a rest
        assert_eq!(
            out.events,
            vec![Event::rest(0, 500), Event::note(480, 60, 500)]
        );
    }

    #[test]
    fn test_tempo_change_applies_from_its_position() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[
                TrackMessage::set_tempo(0, 1_000_000),
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(480, 60),
            ],
        );
        assert_eq!(out.events, vec![Event::note(0, 60, 1000)]);
        assert_eq!(ex.tempo_us(), 1_000_000);
    }

    #[test]
    fn test_tempo_carries_into_next_track() {
        let mut ex = extractor();
        ex.extract(0, &[TrackMessage::set_tempo(0, 250_000)]);
        let out = ex.extract(
            1,
            &[TrackMessage::note_on(0, 60, 100), TrackMessage::note_off(480, 60)],
        );
        assert_eq!(out.events, vec![Event::note(0, 60, 250)]);
    }

    #[test]
    fn test_long_duration_is_clamped_with_warning() {
        let mut ex = extractor();
        // 480 * 200 ticks = 100 seconds
        let out = ex.extract(
            3,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(480 * 200, 60),
            ],
        );
        assert_eq!(out.events, vec![Event::note(0, 60, DURATION_MAX)]);
        assert_eq!(
            ex.warnings(),
            &[ParseWarning::DurationClamped {
                track: 3,
                symbol: 60,
                start: 0,
                computed_ms: 100_000,
            }]
        );
    }

    #[test]
    fn test_long_rest_is_clamped_with_warning() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(480, 60),
                // 100 seconds of silence
                TrackMessage::note_on(480 * 200, 62, 100),
                TrackMessage::note_off(480, 62),
            ],
        );
        assert_eq!(
            out.events,
            vec![
                Event::note(0, 60, 500),
                Event::rest(480, DURATION_MAX),
                Event::note(480 * 201, 62, 500),
            ]
        );
        assert_eq!(
            ex.warnings(),
            &[ParseWarning::DurationClamped {
                track: 0,
                symbol: REST_SYMBOL,
                start: 480,
                computed_ms: 100_000,
            }]
        );
    }

    #[test]
    fn test_exact_maximum_is_not_a_warning() {
        let settings = MidiSettings {
            default_tempo_us: 1_000_000,
            min_rest_ms: 5,
        };
        let mut ex = EventExtractor::new(1000, &settings);
        // 1 tick == 1 ms at this resolution
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(65_535, 60),
            ],
        );
        assert_eq!(out.events[0].duration_ms, 65_535);
        assert!(ex.warnings().is_empty());
    }

    #[test]
    fn test_marker_anchors_to_next_advancing_message() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::marker(100),
                TrackMessage::new(0, MessageKind::Other),
                TrackMessage::note_off(380, 60),
            ],
        );
        assert_eq!(out.barriers, vec![480]);
    }

    #[test]
    fn test_trailing_marker_is_dropped() {
        let mut ex = extractor();
        let out = ex.extract(
            0,
            &[
                TrackMessage::note_on(0, 60, 100),
                TrackMessage::note_off(480, 60),
                TrackMessage::marker(0),
                TrackMessage::new(0, MessageKind::Other),
            ],
        );
        assert!(out.barriers.is_empty());
    }
}
