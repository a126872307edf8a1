mod common;

use common::*;
use midly::{Format, Fps, Header, Smf, Timing};
use nodesyncrs::assignment::{Assignment, NodeAssignments, NodeId};
use nodesyncrs::event::{Event, DURATION_MAX};
use nodesyncrs::frame::{encode, encode_all};
use nodesyncrs::midi::{load_bytes, LoadError, MidiSettings, ParseWarning};
use nodesyncrs::session::{Session, SessionError};

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MidiSettings {
        MidiSettings::default()
    }

    #[test]
    fn test_single_note_file_to_frame() {
        let data = smf_bytes(vec![single_note(60, 480)]);
        let file = load_bytes(&data, &settings()).unwrap();

        assert_eq!(file.track_count(), 1);
        assert_eq!(file.synced[0].events, vec![Event::note(0, 60, 500)]);

        let frame = encode(&file.synced[0]).unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x10, 0x00, 0x06, 0x3C, 0x01, 0xF4, 0xFE, 0x00, 0x00, 0x3C ^ 0x01 ^ 0xF4 ^ 0xFE]
        );
    }

    #[test]
    fn test_empty_track_never_reaches_encoding() {
        let data = smf_bytes(vec![single_note(60, 480), vec![], single_note(64, 480)]);
        let file = load_bytes(&data, &settings()).unwrap();

        assert_eq!(file.source_tracks, 3);
        assert_eq!(file.track_count(), 2);
        let sources: Vec<usize> = file.synced.iter().map(|t| t.source_index).collect();
        assert_eq!(sources, vec![0, 2]);
        assert_eq!(encode_all(&file.synced).unwrap().len(), 2);
    }

    #[test]
    fn test_conductor_marker_reaches_every_voice() {
        let conductor = vec![tempo(0, 500_000), marker(0), tempo(960, 500_000)];
        let voice_a = vec![
            note_on(0, 60),
            note_off(960, 60),
            note_on(0, 62),
            note_off(960, 62),
        ];
        let voice_b = single_note(67, 480);
        let data = smf_bytes(vec![conductor, voice_a, voice_b]);
        let file = load_bytes(&data, &settings()).unwrap();

        assert_eq!(file.barrier_count, 1);
        assert_eq!(file.track_count(), 2);
        assert_eq!(
            file.synced[0].events,
            vec![
                Event::note(0, 60, 1000),
                Event::marker(960),
                Event::note(960, 62, 1000),
            ]
        );
        assert_eq!(
            file.synced[1].events,
            vec![Event::note(0, 67, 500), Event::marker(960)]
        );

        // The unsynchronized view carries no markers at all
        assert!(file
            .unsynced
            .iter()
            .all(|t| t.events.iter().all(|e| !e.is_marker())));
    }

    #[test]
    fn test_marker_sorted_before_simultaneous_events() {
        let conductor = vec![marker(0), tempo(480, 500_000)];
        let voice = vec![note_on(0, 60), note_off(480, 60), note_on(0, 64), note_off(480, 64)];
        let file = load_bytes(&smf_bytes(vec![conductor, voice]), &settings()).unwrap();

        let events = &file.synced[0].events;
        let marker_pos = events.iter().position(Event::is_marker).unwrap();
        assert!(events[marker_pos + 1..].iter().all(|e| e.start >= 480));
        assert!(events[..marker_pos].iter().all(|e| e.start < 480));
    }

    #[test]
    fn test_rest_between_notes() {
        let voice = vec![note_on(0, 60), note_off(480, 60), note_on(480, 62), note_off(480, 62)];
        let file = load_bytes(&smf_bytes(vec![voice]), &settings()).unwrap();
        assert_eq!(
            file.unsynced[0].events,
            vec![
                Event::note(0, 60, 500),
                Event::rest(480, 500),
                Event::note(960, 62, 500),
            ]
        );
    }

    #[test]
    fn test_tempo_change_applies_to_later_notes() {
        let voice = vec![tempo(0, 1_000_000), note_on(0, 60), note_off(480, 60)];
        let file = load_bytes(&smf_bytes(vec![voice]), &settings()).unwrap();
        assert_eq!(file.unsynced[0].events, vec![Event::note(0, 60, 1000)]);
    }

    #[test]
    fn test_long_note_is_clamped_with_warning() {
        let file = load_bytes(&smf_bytes(vec![single_note(60, 70_000)]), &settings()).unwrap();
        assert_eq!(file.unsynced[0].events[0].duration_ms, DURATION_MAX);
        assert!(matches!(
            file.warnings.as_slice(),
            [ParseWarning::DurationClamped { track: 0, symbol: 60, .. }]
        ));
    }

    #[test]
    fn test_timecode_file_falls_back() {
        let smf = Smf {
            header: Header::new(Format::Parallel, Timing::Timecode(Fps::Fps25, 40)),
            tracks: vec![{
                let mut track = single_note(60, 480);
                track.push(end_of_track());
                track
            }],
        };
        let mut data = Vec::new();
        smf.write(&mut data).unwrap();

        let file = load_bytes(&data, &settings()).unwrap();
        assert_eq!(file.ticks_per_beat, 480);
        assert!(matches!(
            file.warnings.as_slice(),
            [ParseWarning::TimecodeTiming { .. }]
        ));
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let result = load_bytes(b"not a midi file", &settings());
        assert!(matches!(result, Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_session_reload_resets_assignments() {
        let data = smf_bytes(vec![single_note(60, 480), single_note(62, 480)]);
        let mut session = Session::new();
        session.load_bytes(&data, &settings()).unwrap();

        let node9 = Assignment::Node(NodeId::new(9).unwrap());
        session.assign(1, node9).unwrap();
        assert_eq!(session.assignments().get(1), Some(node9));

        session.load_bytes(&data, &settings()).unwrap();
        assert_eq!(session.assignments(), &NodeAssignments::with_defaults(2));
        assert_eq!(session.frames(true).len(), 2);
        assert_eq!(session.frames(false).len(), 2);
    }

    #[test]
    fn test_session_failed_load_clears_state() {
        let mut session = Session::new();
        session
            .load_bytes(&smf_bytes(vec![single_note(60, 480)]), &settings())
            .unwrap();
        assert!(session.load_bytes(b"junk", &settings()).is_err());

        assert!(!session.is_loaded());
        assert!(session.frames(true).is_empty());
        assert!(matches!(
            session.assign(0, Assignment::Unassigned),
            Err(SessionError::NotLoaded)
        ));
    }

    #[test]
    fn test_session_rejects_unknown_track() {
        let mut session = Session::new();
        session
            .load_bytes(&smf_bytes(vec![single_note(60, 480)]), &settings())
            .unwrap();
        assert!(matches!(
            session.assign(4, Assignment::Unassigned),
            Err(SessionError::NoSuchTrack { track: 4, count: 1 })
        ));
        assert!(session.frame(0, true).is_ok());
        assert!(session.frame(1, true).is_err());
    }
}
