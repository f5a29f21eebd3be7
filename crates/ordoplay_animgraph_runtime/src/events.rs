// SPDX-License-Identifier: MIT OR Apache-2.0
//! Events sampled while evaluating a graph.

use crate::settings::NodeIndex;
use crate::string_id::StringId;
use serde::{Deserialize, Serialize};

/// Which part of a state's lifetime produced a state event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateEventType {
    /// State is transitioning in
    Entry,
    /// State is fully active
    Execute,
    /// State is transitioning out
    Exit,
    /// Remaining time in the state dropped below the event threshold
    TimedRemaining,
    /// Elapsed time in the state passed the event threshold
    TimedElapsed,
}

/// Kind of sampled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampledEventKind {
    /// Event authored on an animation clip
    Animation {
        /// Event ID
        id: StringId,
    },
    /// Event authored on a state machine state
    State {
        /// Event ID
        id: StringId,
        /// Lifetime phase that produced it
        event_type: StateEventType,
    },
}

/// A tagged event produced during pose sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledEvent {
    /// Node that produced the event
    pub source_node: NodeIndex,
    /// Event payload
    pub kind: SampledEventKind,
    /// Blend weight of the producing branch
    pub weight: f32,
    /// Where in the source the event was sampled
    pub percentage_through: f32,
}

impl SampledEvent {
    /// Get the event ID
    pub fn id(&self) -> &StringId {
        match &self.kind {
            SampledEventKind::Animation { id } | SampledEventKind::State { id, .. } => id,
        }
    }
}

/// Half-open range `[start, end)` into a [`SampledEventsBuffer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledEventRange {
    /// First event
    pub start: usize,
    /// One past the last event
    pub end: usize,
}

impl SampledEventRange {
    /// Create a new range
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Empty range anchored at a buffer position
    pub fn empty_at(position: usize) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Number of events covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether no events are covered
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest range covering both
    ///
    /// Only meaningful for ranges produced in sequence within one frame.
    pub fn combine(&self, other: &SampledEventRange) -> SampledEventRange {
        SampledEventRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Append-only, frame-scoped event buffer
#[derive(Debug, Clone, Default)]
pub struct SampledEventsBuffer {
    events: Vec<SampledEvent>,
}

impl SampledEventsBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear for a new frame
    pub fn reset(&mut self) {
        self.events.clear();
    }

    /// Number of events sampled so far
    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing was sampled
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Empty range anchored at the current end of the buffer
    pub fn empty_range(&self) -> SampledEventRange {
        SampledEventRange::empty_at(self.events.len())
    }

    /// Add a single event, returning its index
    pub fn emplace(&mut self, event: SampledEvent) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    /// Append every event of another buffer, preserving its order
    pub fn append(&mut self, other: &SampledEventsBuffer) -> SampledEventRange {
        let start = self.events.len();
        self.events.extend(other.events.iter().cloned());
        SampledEventRange::new(start, self.events.len())
    }

    /// All events
    pub fn events(&self) -> &[SampledEvent] {
        &self.events
    }

    /// Events covered by a range
    pub fn events_in_range(&self, range: SampledEventRange) -> &[SampledEvent] {
        &self.events[range.start..range.end]
    }

    /// Scale the weight of every event in a range
    pub fn scale_weights(&mut self, range: SampledEventRange, weight: f32) {
        for event in &mut self.events[range.start..range.end] {
            event.weight *= weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> SampledEvent {
        SampledEvent {
            source_node: 0,
            kind: SampledEventKind::Animation { id: StringId::new(id) },
            weight: 1.0,
            percentage_through: 0.0,
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut local = SampledEventsBuffer::new();
        local.emplace(event("a"));

        let mut external = SampledEventsBuffer::new();
        external.emplace(event("b"));
        external.emplace(event("c"));

        let range = local.append(&external);
        assert_eq!(range, SampledEventRange::new(1, 3));
        let ids: Vec<&str> = local.events_in_range(range).iter().map(|e| e.id().as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn test_empty_range() {
        let range = SampledEventRange::empty_at(4);
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert_eq!(range.combine(&SampledEventRange::new(4, 6)), SampledEventRange::new(4, 6));
    }
}
