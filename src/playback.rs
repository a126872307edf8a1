//! Control commands and the playback monitor loop.

use crate::bus::{Bus, Result};
use crate::protocol::{Command, NodeSignal};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Read timeout while polling a playing bus.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Pause before releasing a synchronization barrier.
pub const DEFAULT_SYNC_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    pub poll_timeout: Duration,
    pub sync_wait: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            sync_wait: DEFAULT_SYNC_WAIT,
        }
    }
}

/// How a monitoring session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// The nodes reported end of playback
    Finished,
    /// The liveness flag was cleared
    Cancelled,
}

/// Receives what happens on the bus while the monitor runs
pub trait PlaybackObserver {
    /// Called after the barrier was released.
    fn on_sync_pause(&mut self) {}
    fn on_end(&mut self) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl PlaybackObserver for NoopObserver {}

/// Adapts a pair of closures to [`PlaybackObserver`]
pub struct Callbacks<S, E> {
    pub on_sync_pause: S,
    pub on_end: E,
}

impl<S: FnMut(), E: FnMut()> PlaybackObserver for Callbacks<S, E> {
    fn on_sync_pause(&mut self) {
        (self.on_sync_pause)()
    }

    fn on_end(&mut self) {
        (self.on_end)()
    }
}

/// Writes one control byte and flushes it.
pub fn send_command<B: Bus + ?Sized>(bus: &mut B, command: Command) -> Result<()> {
    let byte = command.byte();
    bus.write_all(&[byte])?;
    bus.flush()?;
    info!("Command 0x{:02X} ({}) sent", byte, command);
    Ok(())
}

/// Watches the bus until the nodes report the end of playback or `running` is cleared.
///
/// A sync pause request is answered with a release after `sync_wait`.
/// Cancellation is noticed within one poll timeout. The bus timeout in force
/// before the call is restored on return.
pub fn monitor_playback<B, O>(
    bus: &mut B,
    options: &MonitorOptions,
    running: &AtomicBool,
    observer: &mut O,
) -> Result<PlaybackEnd>
where
    B: Bus + ?Sized,
    O: PlaybackObserver + ?Sized,
{
    crate::bus::with_timeout(bus, options.poll_timeout, |bus| {
        debug!("Playback monitor started");
        loop {
            if !running.load(Ordering::SeqCst) {
                info!("Playback monitor cancelled");
                return Ok(PlaybackEnd::Cancelled);
            }

            let Some(byte) = bus.read_byte()? else {
                continue;
            };

            match NodeSignal::from_byte(byte) {
                Some(NodeSignal::SyncPause) => {
                    debug!("Sync pause requested, releasing in {:?}", options.sync_wait);
                    thread::sleep(options.sync_wait);
                    send_command(bus, Command::SyncRelease)?;
                    observer.on_sync_pause();
                }
                Some(NodeSignal::EndOfPlayback) => {
                    info!("Nodes reported end of playback");
                    observer.on_end();
                    return Ok(PlaybackEnd::Finished);
                }
                None => trace!("Ignoring byte 0x{:02X} during playback", byte),
            }
        }
    })
}

/// Starts playback on every node and monitors it.
pub fn play<B, O>(
    bus: &mut B,
    options: &MonitorOptions,
    running: &AtomicBool,
    observer: &mut O,
) -> Result<PlaybackEnd>
where
    B: Bus + ?Sized,
    O: PlaybackObserver + ?Sized,
{
    send_command(bus, Command::Play)?;
    monitor_playback(bus, options, running, observer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockBus;

    fn fast() -> MonitorOptions {
        MonitorOptions {
            poll_timeout: Duration::from_millis(5),
            sync_wait: Duration::ZERO,
        }
    }

    #[test]
    fn test_send_command_writes_one_byte() {
        let mut bus = MockBus::new();
        send_command(&mut bus, Command::StopAll).unwrap();
        assert_eq!(bus.writes(), &[vec![0x40u8]]);
        assert_eq!(bus.flushes(), 1);
    }

    #[test]
    fn test_cleared_flag_cancels_before_reading() {
        let mut bus = MockBus::with_responses([Some(0x20)]);
        let running = AtomicBool::new(false);
        let end = monitor_playback(&mut bus, &fast(), &running, &mut NoopObserver).unwrap();
        assert_eq!(end, PlaybackEnd::Cancelled);
        assert_eq!(bus.remaining_responses(), 1);
    }

    #[test]
    fn test_timeout_is_restored() {
        let mut bus = MockBus::with_responses([Some(0x20)]);
        let before = bus.timeout();
        let running = AtomicBool::new(true);
        monitor_playback(&mut bus, &fast(), &running, &mut NoopObserver).unwrap();
        assert_eq!(bus.timeout(), before);
        assert_eq!(bus.timeouts_set(), &[Duration::from_millis(5), before]);
    }
}
