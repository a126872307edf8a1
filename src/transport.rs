//! One framed request/acknowledge exchange with one node.

use crate::assignment::NodeId;
use crate::bus::{self, Bus, BusError};
use crate::frame::{Frame, NODE_MAX_RECORDS};
use crate::protocol::{Ack, Command, Rejection};
use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;

/// Default wait for a node's acknowledge byte.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum SendError {
    /// Caller defect: there is nothing to send
    #[error("refusing to send an empty frame to node {node}")]
    EmptyFrame { node: NodeId },
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("node {node} rejected the preview track: {ack:?}")]
    PreviewRejected { node: NodeId, ack: Ack },
}

/// Sends `frame` to `node` and waits for its acknowledge byte.
///
/// Stale input is discarded first so that a late byte from an earlier
/// exchange cannot be taken for this node's answer. No retry is attempted.
pub fn send_frame<B: Bus + ?Sized>(
    bus: &mut B,
    node: NodeId,
    frame: &Frame,
    ack_timeout: Duration,
) -> Result<Ack, SendError> {
    if frame.is_empty() {
        return Err(SendError::EmptyFrame { node });
    }
    if frame.record_count() > NODE_MAX_RECORDS {
        warn!(
            "Frame for node {} holds {} records, node capacity is {}",
            node,
            frame.record_count(),
            NODE_MAX_RECORDS
        );
    }

    bus.clear_input()?;
    let packet = frame.with_node(node);
    debug!("Sending {} bytes to node {}", packet.len(), node);

    let response = bus::with_timeout(bus, ack_timeout, |bus| {
        bus.write_all(packet.as_bytes())?;
        bus.flush()?;
        bus.read_byte()
    })?;

    let ack = Ack::from_response(response);
    match ack {
        Ack::Accepted => debug!("Node {} acknowledged", node),
        Ack::Rejected(reason) => warn!("{}", rejection_message(node, reason)),
    }
    Ok(ack)
}

fn rejection_message(node: NodeId, reason: Rejection) -> String {
    match reason {
        Rejection::NoResponse => format!("No/garbled response from node {}", node),
        Rejection::Garbled(byte) => {
            format!("No/garbled response from node {} (0x{:02X})", node, byte)
        }
        Rejection::Explicit | Rejection::SizeMismatch => format!("Node {}: {}", node, reason),
    }
}

/// Loads `frame` into `node` and, once accepted, starts playing it there alone.
pub fn preview_track<B: Bus + ?Sized>(
    bus: &mut B,
    node: NodeId,
    frame: &Frame,
    ack_timeout: Duration,
) -> Result<(), SendError> {
    let ack = send_frame(bus, node, frame, ack_timeout)?;
    if !ack.is_accepted() {
        return Err(SendError::PreviewRejected { node, ack });
    }
    info!("Track loaded on node {}, starting preview", node);
    crate::playback::send_command(bus, Command::Preview(node))?;
    Ok(())
}
