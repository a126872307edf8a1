//! Drives a full transmission run across the assignment map.

use crate::assignment::{
    describe_conflicts, validate_assignment, Assignment, ConflictMap, NodeAssignments, NodeId,
};
use crate::bus::Bus;
use crate::frame::Frame;
use crate::protocol::{Ack, Rejection};
use crate::transport::{send_frame, SendError, DEFAULT_ACK_TIMEOUT};
use log::{debug, error, info, warn};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransmitError {
    /// Nothing was sent
    #[error("node assignment conflicts:\n{}", describe_conflicts(.0))]
    Conflicts(ConflictMap),
    #[error("{frames} frames but {assignments} track assignments")]
    TrackCountMismatch { frames: usize, assignments: usize },
    #[error("track {track}: {source}")]
    Send { track: usize, source: SendError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitOptions {
    pub ack_timeout: Duration,
    /// Extra attempts after a rejected exchange. Zero sends each track once.
    pub retries: u32,
}

impl Default for TransmitOptions {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            retries: 0,
        }
    }
}

/// What happened to one track in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Skipped,
    Delivered { node: NodeId, attempts: u32 },
    Failed { node: NodeId, reason: Rejection, attempts: u32 },
}

impl TrackOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TrackOutcome::Delivered { .. })
    }
}

/// Aggregate result of a transmission run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmissionReport {
    pub total: usize,
    pub unassigned: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// One entry per track, in track order
    pub outcomes: Vec<TrackOutcome>,
}

impl TransmissionReport {
    /// Tracks that should have been delivered.
    pub fn expected(&self) -> usize {
        self.total - self.unassigned
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded == self.expected()
    }

    pub fn failed_tracks(&self) -> impl Iterator<Item = (usize, &TrackOutcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| matches!(o, TrackOutcome::Failed { .. }))
    }
}

impl fmt::Display for TransmissionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} expected, {} failed",
            self.succeeded,
            self.expected(),
            self.failed
        )?;
        if self.unassigned > 0 {
            write!(f, " ({} unassigned skipped)", self.unassigned)?;
        }
        Ok(())
    }
}

/// Progress callbacks for a transmission run
pub trait TransmitObserver {
    fn on_track_start(&mut self, _track: usize, _node: NodeId) {}
    fn on_track_done(&mut self, _track: usize, _outcome: &TrackOutcome) {}
}

impl TransmitObserver for () {}

/// Sends every assigned frame to its node, one exchange at a time.
///
/// Refuses to start when two tracks share a node. A rejected exchange is
/// recorded against its track and the run continues; a bus failure ends it.
pub fn transmit<B, O>(
    bus: &mut B,
    frames: &[Frame],
    assignments: &NodeAssignments,
    options: &TransmitOptions,
    observer: &mut O,
) -> Result<TransmissionReport, TransmitError>
where
    B: Bus + ?Sized,
    O: TransmitObserver + ?Sized,
{
    if frames.len() != assignments.len() {
        return Err(TransmitError::TrackCountMismatch {
            frames: frames.len(),
            assignments: assignments.len(),
        });
    }

    let conflicts = validate_assignment(assignments);
    if !conflicts.is_empty() {
        error!("Transmission blocked:\n{}", describe_conflicts(&conflicts));
        return Err(TransmitError::Conflicts(conflicts));
    }

    let mut report = TransmissionReport {
        total: frames.len(),
        unassigned: assignments.unassigned_count(),
        ..TransmissionReport::default()
    };

    for (track, assignment) in assignments.iter() {
        let frame = &frames[track];
        let node = match assignment {
            Assignment::Node(node) => node,
            Assignment::Unassigned => {
                debug!("Skip track {} (unassigned)", track);
                report.outcomes.push(TrackOutcome::Skipped);
                continue;
            }
        };

        info!("Start transmitting track {} to node {}...", track, node);
        observer.on_track_start(track, node);
        report.attempted += 1;

        let outcome = send_with_retries(bus, node, frame, options)
            .map_err(|source| TransmitError::Send { track, source })?;

        if outcome.is_delivered() {
            report.succeeded += 1;
            debug!("Track {} transmitted successfully", track);
        } else {
            report.failed += 1;
            error!("Track {} transmission failed", track);
        }
        observer.on_track_done(track, &outcome);
        report.outcomes.push(outcome);
    }

    if report.is_complete() {
        info!("Transmission complete: {}", report);
    } else {
        warn!("Transmission incomplete: {}", report);
    }
    Ok(report)
}

fn send_with_retries<B: Bus + ?Sized>(
    bus: &mut B,
    node: NodeId,
    frame: &Frame,
    options: &TransmitOptions,
) -> Result<TrackOutcome, SendError> {
    let max_attempts = options.retries.saturating_add(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match send_frame(bus, node, frame, options.ack_timeout)? {
            Ack::Accepted => return Ok(TrackOutcome::Delivered { node, attempts }),
            Ack::Rejected(reason) if attempts >= max_attempts => {
                return Ok(TrackOutcome::Failed {
                    node,
                    reason,
                    attempts,
                })
            }
            Ack::Rejected(reason) => {
                warn!(
                    "Node {} rejected attempt {}/{} ({}), retrying",
                    node, attempts, max_attempts, reason
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;
    use crate::event::{Event, Track};
    use crate::frame::encode;

    fn frames(count: usize) -> Vec<Frame> {
        (0..count)
            .map(|i| encode(&Track::new(i, vec![Event::note(0, 60 + i as u8, 100)])).unwrap())
            .collect()
    }

    #[test]
    fn test_retry_until_accepted() {
        let mut bus = MockBus::with_responses([Some(0xF0), None, Some(0xE0)]);
        let options = TransmitOptions {
            retries: 2,
            ..TransmitOptions::default()
        };
        let report = transmit(
            &mut bus,
            &frames(1),
            &NodeAssignments::with_defaults(1),
            &options,
            &mut (),
        )
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(
            report.outcomes[0],
            TrackOutcome::Delivered {
                node: NodeId::new(0).unwrap(),
                attempts: 3
            }
        );
        assert_eq!(bus.writes().len(), 3);
    }

    #[test]
    fn test_retries_exhausted() {
        let mut bus = MockBus::with_responses([Some(0xF0), Some(0xF1)]);
        let options = TransmitOptions {
            retries: 1,
            ..TransmitOptions::default()
        };
        let report = transmit(
            &mut bus,
            &frames(1),
            &NodeAssignments::with_defaults(1),
            &options,
            &mut (),
        )
        .unwrap();

        assert_eq!(report.failed, 1);
        assert!(matches!(
            report.outcomes[0],
            TrackOutcome::Failed {
                reason: Rejection::SizeMismatch,
                attempts: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_count_mismatch() {
        let mut bus = MockBus::new();
        let result = transmit(
            &mut bus,
            &frames(2),
            &NodeAssignments::with_defaults(3),
            &TransmitOptions::default(),
            &mut (),
        );
        assert!(matches!(
            result,
            Err(TransmitError::TrackCountMismatch {
                frames: 2,
                assignments: 3
            })
        ));
        assert!(bus.writes().is_empty());
    }
}
