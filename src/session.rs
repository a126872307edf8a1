//! Per-file state kept between operator actions.

use crate::assignment::{validate_assignment, Assignment, ConflictMap, NodeAssignments};
use crate::event::Track;
use crate::frame::{encode_all, Frame, FrameError};
use crate::midi::{self, LoadError, LoadedFile, MidiSettings};
use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no MIDI file loaded")]
    NotLoaded,
    #[error("track {track} does not exist ({count} tracks loaded)")]
    NoSuchTrack { track: usize, count: usize },
}

struct Loaded {
    path: Option<PathBuf>,
    file: LoadedFile,
    synced: Vec<Frame>,
    unsynced: Vec<Frame>,
}

/// The loaded file, its encoded frames and the operator's node assignments.
///
/// Everything is rebuilt on load; assignments survive any number of
/// transmissions until the next load.
pub struct Session {
    loaded: Option<Loaded>,
    assignments: NodeAssignments,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            loaded: None,
            assignments: NodeAssignments::with_defaults(0),
        }
    }

    pub fn load<P: AsRef<Path>>(
        &mut self,
        path: P,
        settings: &MidiSettings,
    ) -> Result<(), SessionError> {
        let path = path.as_ref();
        let file = midi::load(path, settings);
        self.install(Some(path.to_path_buf()), file)
    }

    pub fn load_bytes(&mut self, data: &[u8], settings: &MidiSettings) -> Result<(), SessionError> {
        let file = midi::load_bytes(data, settings);
        self.install(None, file)
    }

    fn install(
        &mut self,
        path: Option<PathBuf>,
        file: Result<LoadedFile, LoadError>,
    ) -> Result<(), SessionError> {
        // A failed load leaves nothing behind
        self.loaded = None;
        self.assignments = NodeAssignments::with_defaults(0);

        let file = file?;
        let synced = encode_all(&file.synced)?;
        let unsynced = encode_all(&file.unsynced)?;
        self.assignments = NodeAssignments::with_defaults(file.track_count());
        info!("Session loaded with {} tracks", file.track_count());
        self.loaded = Some(Loaded {
            path,
            file,
            synced,
            unsynced,
        });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.loaded.as_ref().and_then(|l| l.path.as_deref())
    }

    pub fn file(&self) -> Option<&LoadedFile> {
        self.loaded.as_ref().map(|l| &l.file)
    }

    pub fn track_count(&self) -> usize {
        self.file().map_or(0, LoadedFile::track_count)
    }

    pub fn tracks(&self, sync: bool) -> &[Track] {
        match self.file() {
            Some(file) => file.tracks(sync),
            None => &[],
        }
    }

    pub fn frames(&self, sync: bool) -> &[Frame] {
        match &self.loaded {
            Some(l) if sync => &l.synced,
            Some(l) => &l.unsynced,
            None => &[],
        }
    }

    pub fn frame(&self, track: usize, sync: bool) -> Result<&Frame, SessionError> {
        if !self.is_loaded() {
            return Err(SessionError::NotLoaded);
        }
        self.frames(sync).get(track).ok_or(SessionError::NoSuchTrack {
            track,
            count: self.track_count(),
        })
    }

    pub fn assignments(&self) -> &NodeAssignments {
        &self.assignments
    }

    pub fn assign(&mut self, track: usize, assignment: Assignment) -> Result<(), SessionError> {
        if !self.is_loaded() {
            return Err(SessionError::NotLoaded);
        }
        if self.assignments.assign(track, assignment) {
            Ok(())
        } else {
            Err(SessionError::NoSuchTrack {
                track,
                count: self.track_count(),
            })
        }
    }

    pub fn conflicts(&self) -> ConflictMap {
        validate_assignment(&self.assignments)
    }
}
