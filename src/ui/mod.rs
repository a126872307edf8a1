//! User interface components
//!
//! Terminal feedback for the long-running bus operations:
//! - Per-track transmission progress
//! - Playback status spinner
//!
//! Built on indicatif, drawn to stderr so stdout stays clean for reports.

mod progress;

pub use progress::{create_playback_spinner, create_transmit_progress, TransmitProgress};
