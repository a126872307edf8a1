//! Binary frame encoding.
//!
//! Layout: `[0x10|node, len_hi, len_lo] [symbol, dur_hi, dur_lo]* [0xFE, 0, 0] [checksum]`
//! where the length counts the event and terminator records in bytes and the
//! checksum is the XOR of every record byte.

use crate::assignment::NodeId;
use crate::event::{Track, TERMINATOR_SYMBOL};
use std::fmt::Write as _;
use thiserror::Error;

/// High nibble of the header byte; the low nibble carries the node address.
pub const HEADER_TAG: u8 = 0x10;
pub const HEADER_LEN: usize = 3;
pub const RECORD_LEN: usize = 3;
/// Event records a node can store, terminator included.
pub const NODE_MAX_RECORDS: usize = 600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("{events} events do not fit the 16-bit frame length field")]
    TooManyEvents { events: usize },
}

/// Encoded bytes for one track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Wraps raw bytes without validation.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Frame(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn length_field(&self) -> Option<u16> {
        match self.0.as_slice() {
            [_, hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Records announced by the header, terminator included.
    pub fn record_count(&self) -> usize {
        self.length_field()
            .map_or(0, |len| usize::from(len) / RECORD_LEN)
    }

    pub fn checksum(&self) -> Option<u8> {
        self.0.last().copied()
    }

    /// Copy with the header addressed to `node`; every other byte is kept.
    pub fn with_node(&self, node: NodeId) -> Frame {
        let mut bytes = self.0.clone();
        if let Some(header) = bytes.first_mut() {
            *header = HEADER_TAG | (node.get() & 0x0F);
        }
        Frame(bytes)
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 3);
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{:02X}", byte);
        }
        out
    }
}

/// Serializes one track. The header's node nibble is left at zero.
pub fn encode(track: &Track) -> Result<Frame, FrameError> {
    let length = (track.events.len() + 1) * RECORD_LEN;
    let length = u16::try_from(length).map_err(|_| FrameError::TooManyEvents {
        events: track.events.len(),
    })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + usize::from(length) + 1);
    let [len_hi, len_lo] = length.to_be_bytes();
    bytes.extend_from_slice(&[HEADER_TAG, len_hi, len_lo]);

    let mut checksum = 0u8;
    for event in &track.events {
        let record = event.record();
        checksum ^= record.iter().fold(0, |acc, b| acc ^ b);
        bytes.extend_from_slice(&record);
    }

    checksum ^= TERMINATOR_SYMBOL;
    bytes.extend_from_slice(&[TERMINATOR_SYMBOL, 0x00, 0x00, checksum]);

    Ok(Frame(bytes))
}

/// Encodes every track, stopping at the first one that does not fit.
pub fn encode_all(tracks: &[Track]) -> Result<Vec<Frame>, FrameError> {
    tracks.iter().map(encode).collect()
}
