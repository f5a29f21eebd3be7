// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tracks and the timed items they hold.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a track item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackItemId(pub Uuid);

impl TrackItemId {
    /// Create a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackItemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed time interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    /// Start of the range
    pub begin: f32,
    /// End of the range
    pub end: f32,
}

impl FloatRange {
    /// Create a range
    pub fn new(begin: f32, end: f32) -> Self {
        Self { begin, end }
    }

    /// Zero-length range at `time`
    pub fn instant(time: f32) -> Self {
        Self::new(time, time)
    }

    /// Both bounds are finite and ordered
    pub fn is_valid(&self) -> bool {
        self.begin.is_finite() && self.end.is_finite() && self.begin <= self.end
    }

    /// Length of the range
    pub fn length(&self) -> f32 {
        self.end - self.begin
    }

    /// Whether this is a point in time rather than a span
    pub fn is_instant(&self) -> bool {
        self.begin == self.end
    }
}

/// An event placed on a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackItem {
    /// Unique item ID
    pub id: TrackItemId,
    /// Time covered by the item
    pub time_range: FloatRange,
    /// Event identifier emitted when the item is sampled
    #[serde(default)]
    pub event_id: String,
}

impl TrackItem {
    /// Create an item covering `time_range`
    pub fn new(time_range: FloatRange) -> Self {
        Self {
            id: TrackItemId::new(),
            time_range,
            event_id: String::new(),
        }
    }

    /// Set the event identifier
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }
}

/// A named row of items.
///
/// Items are written separately from the track record in timeline documents,
/// so they are skipped by serde here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    #[serde(skip)]
    pub(crate) items: Vec<TrackItem>,
    #[serde(skip)]
    dirty: bool,
}

impl Track {
    /// Create an empty track
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            items: Vec::new(),
            dirty: false,
        }
    }

    /// Items in insertion order
    pub fn items(&self) -> &[TrackItem] {
        &self.items
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Get an item by ID
    pub fn item(&self, item_id: TrackItemId) -> Option<&TrackItem> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub(crate) fn item_mut(&mut self, item_id: TrackItemId) -> Option<&mut TrackItem> {
        self.items.iter_mut().find(|item| item.id == item_id)
    }

    /// Whether the track holds the item
    pub fn contains(&self, item_id: TrackItemId) -> bool {
        self.item(item_id).is_some()
    }

    pub(crate) fn create_item(&mut self, start_time: f32) -> TrackItemId {
        let item = TrackItem::new(FloatRange::instant(start_time));
        let id = item.id;
        self.items.push(item);
        self.dirty = true;
        id
    }

    pub(crate) fn push_item(&mut self, item: TrackItem) {
        self.items.push(item);
    }

    pub(crate) fn delete_item(&mut self, item_id: TrackItemId) -> bool {
        let Some(position) = self.items.iter().position(|item| item.id == item_id) else {
            return false;
        };
        self.items.remove(position);
        self.dirty = true;
        true
    }

    /// Whether the track changed since the last save or load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the track as modified
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the modified flag
    pub fn clear_dirty_flags(&mut self) {
        self.dirty = false;
    }
}
