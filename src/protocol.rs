//! Single-byte control protocol spoken between host and nodes.
//!
//! High nibble selects the operation, low nibble carries a node id or preset.

use crate::assignment::NodeId;
use std::fmt;
use thiserror::Error;

pub const ACK_SUCCESS: u8 = 0xE0;
pub const ACK_FAILURE: u8 = 0xF0;
pub const ACK_SIZE_MISMATCH: u8 = 0xF1;

pub const END_OF_PLAYBACK: u8 = 0x20;
pub const PLAY: u8 = 0x30;
pub const STOP_ALL: u8 = 0x40;
pub const PREVIEW: u8 = 0x50;
pub const STOP_NODE: u8 = 0x60;
pub const SYNC_PAUSE: u8 = 0x70;
pub const SYNC_RELEASE: u8 = 0x80;
pub const PRESET: u8 = 0x90;

pub const PRESET_COUNT: u8 = 3;

/// One of the tunes built into the node firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset(u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("preset {0} does not exist (0-{max})", max = PRESET_COUNT - 1)]
pub struct InvalidPreset(pub u8);

impl Preset {
    pub fn new(index: u8) -> Result<Self, InvalidPreset> {
        if index < PRESET_COUNT {
            Ok(Preset(index))
        } else {
            Err(InvalidPreset(index))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Host-to-node control commands, sent outside any frame transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    StopAll,
    /// Play one node's buffered track on its own
    Preview(NodeId),
    StopNode(NodeId),
    /// Lets the nodes continue past a synchronization barrier
    SyncRelease,
    Preset(Preset),
}

impl Command {
    pub fn byte(self) -> u8 {
        match self {
            Command::Play => PLAY,
            Command::StopAll => STOP_ALL,
            Command::Preview(node) => PREVIEW | node.get(),
            Command::StopNode(node) => STOP_NODE | node.get(),
            Command::SyncRelease => SYNC_RELEASE,
            Command::Preset(preset) => PRESET | preset.get(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Play => write!(f, "play"),
            Command::StopAll => write!(f, "stop all"),
            Command::Preview(node) => write!(f, "preview node {}", node),
            Command::StopNode(node) => write!(f, "stop node {}", node),
            Command::SyncRelease => write!(f, "sync release"),
            Command::Preset(preset) => write!(f, "preset {}", preset.get()),
        }
    }
}

/// Why a node did not accept a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Node answered 0xF0 (checksum mismatch)
    Explicit,
    /// Node answered 0xF1 (frame larger than its buffer)
    SizeMismatch,
    /// Any other byte
    Garbled(u8),
    /// Nothing arrived before the timeout
    NoResponse,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Explicit => write!(f, "node reported failure"),
            Rejection::SizeMismatch => write!(f, "node reported size error"),
            Rejection::Garbled(byte) => write!(f, "garbled response 0x{:02X}", byte),
            Rejection::NoResponse => write!(f, "no response"),
        }
    }
}

/// Outcome of one request/acknowledge exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Accepted,
    Rejected(Rejection),
}

impl Ack {
    pub fn from_response(response: Option<u8>) -> Self {
        match response {
            Some(ACK_SUCCESS) => Ack::Accepted,
            Some(ACK_FAILURE) => Ack::Rejected(Rejection::Explicit),
            Some(ACK_SIZE_MISMATCH) => Ack::Rejected(Rejection::SizeMismatch),
            Some(other) => Ack::Rejected(Rejection::Garbled(other)),
            None => Ack::Rejected(Rejection::NoResponse),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Ack::Accepted)
    }
}

/// Bytes a node may send on its own during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSignal {
    /// A node reached a barrier and waits for [`Command::SyncRelease`]
    SyncPause,
    EndOfPlayback,
}

impl NodeSignal {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SYNC_PAUSE => Some(NodeSignal::SyncPause),
            END_OF_PLAYBACK => Some(NodeSignal::EndOfPlayback),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        let node = NodeId::new(0x0C).unwrap();
        assert_eq!(Command::Play.byte(), 0x30);
        assert_eq!(Command::StopAll.byte(), 0x40);
        assert_eq!(Command::Preview(node).byte(), 0x5C);
        assert_eq!(Command::StopNode(node).byte(), 0x6C);
        assert_eq!(Command::SyncRelease.byte(), 0x80);
        assert_eq!(Command::Preset(Preset::new(2).unwrap()).byte(), 0x92);
    }

    #[test]
    fn test_preset_range() {
        assert!(Preset::new(0).is_ok());
        assert_eq!(Preset::new(3), Err(InvalidPreset(3)));
        assert_eq!(
            InvalidPreset(7).to_string(),
            "preset 7 does not exist (0-2)"
        );
    }

    #[test]
    fn test_ack_interpretation() {
        assert_eq!(Ack::from_response(Some(0xE0)), Ack::Accepted);
        assert_eq!(
            Ack::from_response(Some(0xF0)),
            Ack::Rejected(Rejection::Explicit)
        );
        assert_eq!(
            Ack::from_response(Some(0xF1)),
            Ack::Rejected(Rejection::SizeMismatch)
        );
        assert_eq!(
            Ack::from_response(Some(0x42)),
            Ack::Rejected(Rejection::Garbled(0x42))
        );
        assert_eq!(
            Ack::from_response(None),
            Ack::Rejected(Rejection::NoResponse)
        );
    }

    #[test]
    fn test_node_signals() {
        assert_eq!(NodeSignal::from_byte(0x70), Some(NodeSignal::SyncPause));
        assert_eq!(NodeSignal::from_byte(0x20), Some(NodeSignal::EndOfPlayback));
        assert_eq!(NodeSignal::from_byte(0xE0), None);
    }
}
