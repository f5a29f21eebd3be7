// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalized time and synchronization tracks.

use crate::string_id::StringId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

/// Process-wide default track: a single unnamed event covering the whole duration
pub static DEFAULT_SYNC_TRACK: LazyLock<Arc<SyncTrack>> = LazyLock::new(|| Arc::new(SyncTrack::default()));

/// Normalized time through an animation, nominally in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Percentage(pub f32);

impl Percentage {
    /// Start of the animation
    pub const ZERO: Self = Self(0.0);
    /// End of the animation
    pub const ONE: Self = Self(1.0);

    /// Create a new percentage
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Raw value
    pub fn as_f32(self) -> f32 {
        self.0
    }

    /// Clamp into `[0, 1]`
    pub fn clamped(self) -> Self {
        Self(self.0.clamp(0.0, 1.0))
    }

    /// Split into a `[0, 1)` percentage and the number of whole loops it contained
    pub fn wrapped(self) -> (Self, i32) {
        let loops = self.0.floor();
        (Self(self.0 - loops), loops as i32)
    }
}

/// A named marker region on a sync track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Event ID
    pub id: StringId,
    /// Where the event starts
    pub start_time: Percentage,
    /// How much of the track the event covers
    pub duration: f32,
}

/// Position on a sync track: which event, and how far through it
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncTrackTime {
    /// Index of the event
    pub event_index: i32,
    /// Progress through the event
    pub percentage_through: Percentage,
}

impl SyncTrackTime {
    /// Create a new sync track time
    pub fn new(event_index: i32, percentage_through: f32) -> Self {
        Self {
            event_index,
            percentage_through: Percentage(percentage_through),
        }
    }
}

/// Range of sync track time covered by one update
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncTrackTimeRange {
    /// Start of the update
    pub start_time: SyncTrackTime,
    /// End of the update
    pub end_time: SyncTrackTime,
}

impl SyncTrackTimeRange {
    /// Create a new range
    pub fn new(start_time: SyncTrackTime, end_time: SyncTrackTime) -> Self {
        Self { start_time, end_time }
    }
}

/// Ordered sequence of sync events covering the whole of `[0, 1)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTrack {
    events: Vec<SyncEvent>,
}

impl SyncTrack {
    /// Build a track from event markers (ID and start time)
    ///
    /// Markers are sorted by start time; each event lasts until the next one,
    /// the last event wraps around to the first.
    pub fn new(markers: impl IntoIterator<Item = (StringId, Percentage)>) -> Self {
        let mut markers: Vec<(StringId, Percentage)> = markers
            .into_iter()
            .map(|(id, start)| (id, start.clamped()))
            .collect();

        if markers.is_empty() {
            return Self::default();
        }

        markers.sort_by(|a, b| a.1.as_f32().total_cmp(&b.1.as_f32()));
        markers.dedup_by(|a, b| a.1 == b.1);

        let count = markers.len();
        let mut events = Vec::with_capacity(count);
        for i in 0..count {
            let start = markers[i].1.as_f32();
            let end = if i + 1 < count {
                markers[i + 1].1.as_f32()
            } else {
                markers[0].1.as_f32() + 1.0
            };

            events.push(SyncEvent {
                id: markers[i].0.clone(),
                start_time: markers[i].1,
                duration: end - start,
            });
        }

        Self { events }
    }

    /// Events on this track
    pub fn events(&self) -> &[SyncEvent] {
        &self.events
    }

    /// Number of events
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    /// Convert a track percentage into an event position
    pub fn get_time(&self, percentage: Percentage) -> SyncTrackTime {
        let (percentage, _) = percentage.wrapped();
        let value = percentage.as_f32();

        // Time before the first event belongs to the last (wrapping) event
        let index = self
            .events
            .iter()
            .rposition(|e| e.start_time.as_f32() <= value)
            .unwrap_or(self.events.len() - 1);

        let event = &self.events[index];
        let mut offset = value - event.start_time.as_f32();
        if offset < 0.0 {
            offset += 1.0;
        }

        let through = if event.duration > 0.0 {
            (offset / event.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };

        SyncTrackTime::new(index as i32, through)
    }

    /// Convert an event position back into a track percentage in `[0, 1)`
    pub fn get_percentage_through(&self, time: SyncTrackTime) -> Percentage {
        let count = self.events.len() as i32;
        let index = time.event_index.rem_euclid(count) as usize;
        let event = &self.events[index];
        let value = event.start_time.as_f32() + event.duration * time.percentage_through.as_f32().clamp(0.0, 1.0);
        Percentage(value).wrapped().0
    }

    /// Find the first event with the given ID
    pub fn event_index(&self, id: &StringId) -> Option<usize> {
        self.events.iter().position(|e| &e.id == id)
    }
}

impl Default for SyncTrack {
    fn default() -> Self {
        Self {
            events: vec![SyncEvent {
                id: StringId::invalid(),
                start_time: Percentage::ZERO,
                duration: 1.0,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_track() -> SyncTrack {
        SyncTrack::new([
            (StringId::new("LeftFoot"), Percentage(0.0)),
            (StringId::new("RightFoot"), Percentage(0.5)),
        ])
    }

    #[test]
    fn test_default_track_has_single_event() {
        assert_eq!(DEFAULT_SYNC_TRACK.num_events(), 1);
        let time = DEFAULT_SYNC_TRACK.get_time(Percentage(0.25));
        assert_eq!(time.event_index, 0);
        assert!((time.percentage_through.as_f32() - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_get_time_finds_event() {
        let track = walk_track();
        let time = track.get_time(Percentage(0.75));
        assert_eq!(time.event_index, 1);
        assert!((time.percentage_through.as_f32() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_time_before_first_event_wraps() {
        let track = SyncTrack::new([
            (StringId::new("A"), Percentage(0.2)),
            (StringId::new("B"), Percentage(0.6)),
        ]);
        let time = track.get_time(Percentage(0.1));
        assert_eq!(time.event_index, 1);
        // B covers 0.6 -> 1.2, so 0.1 sits 0.5 into its 0.6 span
        assert!((time.percentage_through.as_f32() - 0.5 / 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_percentage_round_trip_through_sync_time() {
        let track = walk_track();
        let time = track.get_time(Percentage(0.6));
        let back = track.get_percentage_through(time);
        assert!((back.as_f32() - 0.6).abs() < 1e-5);
    }
}
