use crate::assignment::NodeId;
use crate::orchestrator::{TrackOutcome, TransmitObserver};
use crate::worker::TransmitEvent;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

pub fn create_transmit_progress(expected: usize) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(Some(expected as u64), ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.bold} [{bar:40.cyan}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("⣀⣤⣦⣶⣷⣿ "),
    );
    pb.set_prefix("Transmit");
    pb
}

pub fn create_playback_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("Playback");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Advances a progress bar as tracks are delivered
pub struct TransmitProgress {
    bar: ProgressBar,
}

impl TransmitProgress {
    pub fn new(expected: usize) -> Self {
        Self {
            bar: create_transmit_progress(expected),
        }
    }

    /// Applies one event reported by a transmission worker.
    pub fn handle(&mut self, event: &TransmitEvent) {
        match event {
            TransmitEvent::TrackStarted { track, node } => self.on_track_start(*track, *node),
            TransmitEvent::TrackDone { track, outcome } => self.on_track_done(*track, outcome),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self, summary: &str) {
        self.bar.finish_with_message(summary.to_string());
    }
}

impl TransmitObserver for TransmitProgress {
    fn on_track_start(&mut self, track: usize, node: NodeId) {
        self.bar
            .set_message(format!("track {} -> node {}", track, node));
    }

    fn on_track_done(&mut self, track: usize, outcome: &TrackOutcome) {
        if let TrackOutcome::Failed { node, reason, .. } = outcome {
            self.bar
                .println(format!("track {} failed on node {}: {}", track, node, reason));
        }
        self.bar.inc(1);
    }
}
