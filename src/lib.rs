//! Host side of a MIDI-to-node sequencing rig.
//!
//! A Standard MIDI File is split into monophonic per-voice event tracks,
//! each track is packed into a checksummed frame, and the frames are sent
//! over a shared serial bus to up to sixteen playback nodes, which are then
//! started, kept in step at synchronization markers, and stopped.

pub mod assignment;
pub mod bus;
pub mod cli;
pub mod config;
pub mod event;
pub mod frame;
pub mod logging;
pub mod midi;
pub mod orchestrator;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod ui;
pub mod worker;

pub use assignment::{validate_assignment, Assignment, NodeAssignments, NodeId};
pub use bus::{Bus, BusError, MockBus, SerialBus};
pub use event::{Event, Track};
pub use frame::{encode, Frame};
pub use midi::{load, LoadedFile, MidiSettings};
pub use orchestrator::{transmit, TransmissionReport, TransmitOptions};
pub use playback::{monitor_playback, send_command, MonitorOptions};
pub use protocol::{Ack, Command};
pub use transport::send_frame;
