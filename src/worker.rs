//! Background workers that own the bus while they run.
//!
//! A worker takes the bus by value and hands it back from `join`, so a second
//! long-running operation cannot start on the same channel until the first
//! one has finished.

use crate::assignment::{NodeAssignments, NodeId};
use crate::bus::{self, Bus};
use crate::frame::Frame;
use crate::orchestrator::{
    transmit, TrackOutcome, TransmissionReport, TransmitError, TransmitObserver, TransmitOptions,
};
use crate::playback::{play, MonitorOptions, PlaybackEnd, PlaybackObserver};
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker thread panicked")]
    Panicked,
}

/// Progress reported by a transmission worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitEvent {
    TrackStarted { track: usize, node: NodeId },
    TrackDone { track: usize, outcome: TrackOutcome },
}

/// Signals reported by a playback worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    SyncReleased,
    Ended,
}

struct ChannelObserver<E> {
    tx: Sender<E>,
}

// A dropped receiver only means nobody is watching; the worker carries on.
impl TransmitObserver for ChannelObserver<TransmitEvent> {
    fn on_track_start(&mut self, track: usize, node: NodeId) {
        let _ = self.tx.send(TransmitEvent::TrackStarted { track, node });
    }

    fn on_track_done(&mut self, track: usize, outcome: &TrackOutcome) {
        let _ = self.tx.send(TransmitEvent::TrackDone {
            track,
            outcome: *outcome,
        });
    }
}

impl PlaybackObserver for ChannelObserver<PlaybackEvent> {
    fn on_sync_pause(&mut self) {
        let _ = self.tx.send(PlaybackEvent::SyncReleased);
    }

    fn on_end(&mut self) {
        let _ = self.tx.send(PlaybackEvent::Ended);
    }
}

/// A running transmission; the bus comes back with the report.
pub struct TransmissionHandle<B> {
    events: Receiver<TransmitEvent>,
    handle: JoinHandle<(B, Result<TransmissionReport, TransmitError>)>,
}

impl<B> TransmissionHandle<B> {
    pub fn events(&self) -> &Receiver<TransmitEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<(B, Result<TransmissionReport, TransmitError>), WorkerError> {
        self.handle.join().map_err(|_| WorkerError::Panicked)
    }
}

pub fn spawn_transmission<B>(
    mut bus: B,
    frames: Vec<Frame>,
    assignments: NodeAssignments,
    options: TransmitOptions,
) -> Result<TransmissionHandle<B>, WorkerError>
where
    B: Bus + 'static,
{
    let (tx, events) = unbounded();
    let handle = thread::Builder::new()
        .name("transmit".to_string())
        .spawn(move || {
            debug!("Transmission worker started");
            let mut observer = ChannelObserver { tx };
            let result = transmit(&mut bus, &frames, &assignments, &options, &mut observer);
            if let Err(e) = &result {
                error!("Transmission worker failed: {}", e);
            }
            (bus, result)
        })?;
    Ok(TransmissionHandle { events, handle })
}

/// A running playback session; cancel it or wait for the nodes to finish.
pub struct PlaybackHandle<B> {
    running: Arc<AtomicBool>,
    events: Receiver<PlaybackEvent>,
    handle: JoinHandle<(B, bus::Result<PlaybackEnd>)>,
}

impl<B> PlaybackHandle<B> {
    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events
    }

    /// Asks the monitor to stop; it notices within one poll timeout.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<(B, bus::Result<PlaybackEnd>), WorkerError> {
        self.handle.join().map_err(|_| WorkerError::Panicked)
    }
}

/// Sends the play command and monitors playback on a worker thread.
pub fn spawn_playback<B>(
    mut bus: B,
    options: MonitorOptions,
) -> Result<PlaybackHandle<B>, WorkerError>
where
    B: Bus + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let (tx, events) = unbounded();
    let flag = Arc::clone(&running);
    let handle = thread::Builder::new()
        .name("playback".to_string())
        .spawn(move || {
            let mut observer = ChannelObserver { tx };
            let result = play(&mut bus, &options, &flag, &mut observer);
            flag.store(false, Ordering::SeqCst);
            debug!("Playback worker exiting: {:?}", result);
            (bus, result)
        })?;
    Ok(PlaybackHandle {
        running,
        events,
        handle,
    })
}
