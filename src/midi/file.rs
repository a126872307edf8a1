use super::{
    merge_markers, EventExtractor, MarkerAccumulator, MidiSettings, ParseWarning, TrackMessage,
};
use crate::event::Track;
use log::{debug, info, warn};
use midly::{Smf, Timing};
use std::path::Path;
use thiserror::Error;

/// Resolution assumed for files using SMPTE timecode.
pub const SMPTE_FALLBACK_TICKS_PER_BEAT: u16 = 480;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read MIDI file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse MIDI file: {0}")]
    Parse(#[from] midly::Error),
}

/// Everything extracted from one MIDI file.
///
/// Both the synchronized (markers merged) and unsynchronized track lists are
/// kept, so the sync setting can be changed without reloading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub ticks_per_beat: u16,
    /// Number of tracks in the file, including the dropped empty ones
    pub source_tracks: usize,
    pub synced: Vec<Track>,
    pub unsynced: Vec<Track>,
    pub barrier_count: usize,
    pub warnings: Vec<ParseWarning>,
}

impl LoadedFile {
    pub fn tracks(&self, sync: bool) -> &[Track] {
        if sync {
            &self.synced
        } else {
            &self.unsynced
        }
    }

    pub fn track_count(&self) -> usize {
        self.synced.len()
    }
}

pub fn load<P: AsRef<Path>>(path: P, settings: &MidiSettings) -> Result<LoadedFile, LoadError> {
    let path = path.as_ref();
    info!("Loading MIDI file {}", path.display());
    let data = std::fs::read(path)?;
    load_bytes(&data, settings)
}

pub fn load_bytes(data: &[u8], settings: &MidiSettings) -> Result<LoadedFile, LoadError> {
    let smf = Smf::parse(data)?;

    let mut warnings = Vec::new();
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(fps, sub) => {
            let warning = ParseWarning::TimecodeTiming {
                assumed_ticks_per_beat: SMPTE_FALLBACK_TICKS_PER_BEAT,
            };
            warn!("{} ({:?} fps, {} subframes)", warning, fps, sub);
            warnings.push(warning);
            SMPTE_FALLBACK_TICKS_PER_BEAT
        }
    };
    debug!(
        "MIDI header: {:?}, {} tracks, {} ticks per beat",
        smf.header.format,
        smf.tracks.len(),
        ticks_per_beat
    );

    let mut extractor = EventExtractor::new(ticks_per_beat, settings);
    let mut markers = MarkerAccumulator::new(true);
    let mut unsynced = Vec::new();

    // Phase one: extract every track and collect barrier candidates
    for (index, track) in smf.tracks.iter().enumerate() {
        let messages: Vec<TrackMessage> = track.iter().map(TrackMessage::from).collect();
        let extracted = extractor.extract(index, &messages);
        // Barriers from a marker-only conductor track still apply to the others
        markers.commit_all(extracted.barriers);
        if extracted.events.is_empty() {
            debug!("Track {} produced no events, dropped", index);
            continue;
        }
        unsynced.push(Track::new(index, extracted.events));
    }
    warnings.extend(extractor.into_warnings());

    // Phase two: broadcast the frozen barrier set
    let mut synced = unsynced.clone();
    merge_markers(&mut synced, &markers);
    merge_markers(&mut unsynced, &MarkerAccumulator::new(false));

    info!(
        "Extracted {} voices from {} tracks ({} barriers, {} warnings)",
        synced.len(),
        smf.tracks.len(),
        markers.len(),
        warnings.len()
    );

    Ok(LoadedFile {
        ticks_per_beat,
        source_tracks: smf.tracks.len(),
        synced,
        unsynced,
        barrier_count: markers.len(),
        warnings,
    })
}
