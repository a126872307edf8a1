use crate::event::{Event, Track};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Barrier positions collected from every track of one file.
///
/// Filled during extraction, then frozen and handed to [`merge_markers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerAccumulator {
    times: BTreeSet<u64>,
    enabled: bool,
}

impl MarkerAccumulator {
    /// A disabled accumulator ignores every barrier it is offered.
    pub fn new(enabled: bool) -> Self {
        Self {
            times: BTreeSet::new(),
            enabled,
        }
    }

    pub fn commit(&mut self, time: u64) {
        if self.enabled {
            self.times.insert(time);
        }
    }

    pub fn commit_all<I: IntoIterator<Item = u64>>(&mut self, times: I) {
        for time in times {
            self.commit(time);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = u64> + '_ {
        self.times.iter().copied()
    }
}

// Markers come first among events sharing a start time.
fn event_order(a: &Event, b: &Event) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| b.is_marker().cmp(&a.is_marker()))
}

/// Injects every barrier into every track and restores event order.
///
/// A marker already present at a barrier time is not duplicated, and the sort
/// is stable, so merging an already merged track leaves it unchanged.
pub fn merge_markers(tracks: &mut [Track], markers: &MarkerAccumulator) {
    for track in tracks.iter_mut() {
        let existing: BTreeSet<u64> = track
            .events
            .iter()
            .filter(|e| e.is_marker())
            .map(|e| e.start)
            .collect();

        track.events.extend(
            markers
                .times()
                .filter(|t| !existing.contains(t))
                .map(Event::marker),
        );
        track.events.sort_by(event_order);
    }
}
