// SPDX-License-Identifier: MIT OR Apache-2.0
//! Track container with modification tracking and document persistence.

use crate::track::{FloatRange, Track, TrackId, TrackItem, TrackItemId};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

const TRACK_KEY: &str = "Track";
const ITEMS_KEY: &str = "Items";
const ITEM_KEY: &str = "Item";

/// Edge of a modification bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationEvent {
    /// The outermost `begin_modification` was entered
    Begin,
    /// The outermost `end_modification` was left
    End,
}

/// Callback type for modification notifications
pub type ModificationCallback = Box<dyn Fn(&ModificationEvent) + Send + Sync>;

/// Errors raised by track container operations
#[derive(Debug, Error)]
pub enum TimelineError {
    /// No track with this ID
    #[error("track {0:?} not found")]
    TrackNotFound(TrackId),
    /// No track holds this item
    #[error("track item {0:?} not found")]
    ItemNotFound(TrackItemId),
    /// Time range is unordered or not finite
    #[error("invalid time range [{}, {}]", .0.begin, .0.end)]
    InvalidTimeRange(FloatRange),
    /// Document root is not an array
    #[error("timeline document must be an array of tracks")]
    NotAnArray,
    /// A track record lacks its `Track` payload
    #[error("track record {index} has no \"Track\" entry")]
    MissingTrack {
        /// Record position in the document
        index: usize,
    },
    /// A track record lacks its `Items` array
    #[error("track record {index} has no \"Items\" array")]
    MissingItems {
        /// Record position in the document
        index: usize,
    },
    /// An item record lacks its `Item` payload
    #[error("item record {item} of track {track} has no \"Item\" entry")]
    MissingItem {
        /// Track record position
        track: usize,
        /// Item record position
        item: usize,
    },
    /// A payload failed to deserialize
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Ordered set of tracks edited as one document.
///
/// Every mutation is wrapped in a modification bracket. Brackets nest, and
/// listeners only hear about the outermost one.
pub struct TrackContainer {
    tracks: IndexMap<TrackId, Track>,
    modification_depth: u32,
    dirty: bool,
    listeners: Vec<ModificationCallback>,
}

impl fmt::Debug for TrackContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackContainer")
            .field("tracks", &self.tracks)
            .field("modification_depth", &self.modification_depth)
            .field("dirty", &self.dirty)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for TrackContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self {
            tracks: IndexMap::new(),
            modification_depth: 0,
            dirty: false,
            listeners: Vec::new(),
        }
    }

    /// Register a modification listener
    pub fn on_modification(&mut self, callback: ModificationCallback) {
        self.listeners.push(callback);
    }

    fn notify(&self, event: ModificationEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    // Tracks
    //-------------------------------------------------------------------------

    /// Tracks in creation order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Get a track by ID
    pub fn track(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    /// Whether the container holds the track
    pub fn contains_track(&self, track_id: TrackId) -> bool {
        self.tracks.contains_key(&track_id)
    }

    /// Add a new empty track
    pub fn create_track(&mut self, name: impl Into<String>) -> TrackId {
        self.begin_modification();
        let track = Track::new(name);
        let id = track.id;
        self.tracks.insert(id, track);
        self.end_modification();
        id
    }

    /// Remove a track and its items
    pub fn delete_track(&mut self, track_id: TrackId) -> Result<Track, TimelineError> {
        if !self.contains_track(track_id) {
            return Err(TimelineError::TrackNotFound(track_id));
        }

        self.begin_modification();
        let track = self.tracks.shift_remove(&track_id);
        self.end_modification();
        track.ok_or(TimelineError::TrackNotFound(track_id))
    }

    // Items
    //-------------------------------------------------------------------------

    /// Track holding the item
    pub fn track_for_item(&self, item_id: TrackItemId) -> Option<&Track> {
        self.tracks.values().find(|track| track.contains(item_id))
    }

    /// Whether any track holds the item
    pub fn contains_item(&self, item_id: TrackItemId) -> bool {
        self.track_for_item(item_id).is_some()
    }

    /// Get an item by ID
    pub fn item(&self, item_id: TrackItemId) -> Option<&TrackItem> {
        self.tracks.values().find_map(|track| track.item(item_id))
    }

    /// Add an instant item at `start_time`
    pub fn create_item(
        &mut self,
        track_id: TrackId,
        start_time: f32,
    ) -> Result<TrackItemId, TimelineError> {
        if !self.contains_track(track_id) {
            return Err(TimelineError::TrackNotFound(track_id));
        }

        self.begin_modification();
        let id = self
            .tracks
            .get_mut(&track_id)
            .map(|track| track.create_item(start_time));
        self.end_modification();
        id.ok_or(TimelineError::TrackNotFound(track_id))
    }

    /// Move or resize an item
    pub fn update_item_time_range(
        &mut self,
        item_id: TrackItemId,
        time_range: FloatRange,
    ) -> Result<(), TimelineError> {
        if !time_range.is_valid() {
            return Err(TimelineError::InvalidTimeRange(time_range));
        }
        if !self.contains_item(item_id) {
            return Err(TimelineError::ItemNotFound(item_id));
        }

        self.begin_modification();
        for track in self.tracks.values_mut() {
            if let Some(item) = track.item_mut(item_id) {
                item.time_range = time_range;
                track.mark_dirty();
                break;
            }
        }
        self.end_modification();
        Ok(())
    }

    /// Set the event emitted by an item
    pub fn set_item_event_id(
        &mut self,
        item_id: TrackItemId,
        event_id: impl Into<String>,
    ) -> Result<(), TimelineError> {
        if !self.contains_item(item_id) {
            return Err(TimelineError::ItemNotFound(item_id));
        }

        let event_id = event_id.into();
        self.begin_modification();
        for track in self.tracks.values_mut() {
            if let Some(item) = track.item_mut(item_id) {
                item.event_id = event_id;
                track.mark_dirty();
                break;
            }
        }
        self.end_modification();
        Ok(())
    }

    /// Remove an item from whichever track holds it
    pub fn delete_item(&mut self, item_id: TrackItemId) -> Result<(), TimelineError> {
        if !self.contains_item(item_id) {
            return Err(TimelineError::ItemNotFound(item_id));
        }

        self.begin_modification();
        for track in self.tracks.values_mut() {
            if track.delete_item(item_id) {
                break;
            }
        }
        self.end_modification();
        Ok(())
    }

    // Modification tracking
    //-------------------------------------------------------------------------

    /// Open a modification bracket
    pub fn begin_modification(&mut self) {
        if self.modification_depth == 0 {
            self.notify(ModificationEvent::Begin);
        }
        self.modification_depth += 1;
    }

    /// Close a modification bracket.
    ///
    /// # Panics
    ///
    /// Panics if no bracket is open.
    pub fn end_modification(&mut self) {
        assert!(
            self.modification_depth > 0,
            "end_modification without matching begin_modification"
        );
        self.modification_depth -= 1;

        if self.modification_depth == 0 {
            self.notify(ModificationEvent::End);
        }

        self.dirty = true;
    }

    /// Whether a modification bracket is open
    pub fn is_modifying(&self) -> bool {
        self.modification_depth > 0
    }

    /// Whether the container or any of its tracks changed
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.tracks.values().any(Track::is_dirty)
    }

    /// Clear the container and track dirty flags
    pub fn clear_dirty_flags(&mut self) {
        self.dirty = false;
        for track in self.tracks.values_mut() {
            track.clear_dirty_flags();
        }
    }

    /// Drop all tracks and clear the dirty flag
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.dirty = false;
    }

    // Persistence
    //-------------------------------------------------------------------------

    /// Write all tracks to a document and clear the dirty flags
    pub fn write_document(&mut self) -> Result<Value, TimelineError> {
        let mut records = Vec::with_capacity(self.tracks.len());
        for track in self.tracks.values() {
            let items = track
                .items()
                .iter()
                .map(|item| {
                    let mut record = Map::new();
                    record.insert(ITEM_KEY.to_string(), serde_json::to_value(item)?);
                    Ok(Value::Object(record))
                })
                .collect::<Result<Vec<_>, serde_json::Error>>()?;

            let mut record = Map::new();
            record.insert(TRACK_KEY.to_string(), serde_json::to_value(track)?);
            record.insert(ITEMS_KEY.to_string(), Value::Array(items));
            records.push(Value::Object(record));
        }

        self.clear_dirty_flags();
        Ok(Value::Array(records))
    }

    /// Replace all tracks with the contents of a document.
    ///
    /// On failure the container is left empty and clean.
    pub fn read_document(&mut self, document: &Value) -> Result<(), TimelineError> {
        self.tracks.clear();

        match parse_document(document) {
            Ok(tracks) => {
                self.tracks = tracks;
                self.clear_dirty_flags();
                tracing::debug!("Loaded timeline with {} tracks", self.tracks.len());
                Ok(())
            }
            Err(err) => {
                self.dirty = false;
                tracing::warn!("Failed to read timeline document: {}", err);
                Err(err)
            }
        }
    }
}

fn parse_document(document: &Value) -> Result<IndexMap<TrackId, Track>, TimelineError> {
    let records = document.as_array().ok_or(TimelineError::NotAnArray)?;

    let mut tracks = IndexMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let track_value = record
            .get(TRACK_KEY)
            .ok_or(TimelineError::MissingTrack { index })?;
        let mut track: Track = serde_json::from_value(track_value.clone())?;

        let items = record
            .get(ITEMS_KEY)
            .and_then(Value::as_array)
            .ok_or(TimelineError::MissingItems { index })?;

        for (item_index, item_record) in items.iter().enumerate() {
            let item_value = item_record.get(ITEM_KEY).ok_or(TimelineError::MissingItem {
                track: index,
                item: item_index,
            })?;
            let item: TrackItem = serde_json::from_value(item_value.clone())?;
            track.push_item(item);
        }

        tracks.insert(track.id, track);
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn populated() -> TrackContainer {
        let mut container = TrackContainer::new();
        for t in 0..2 {
            let track = container.create_track(format!("Track {t}"));
            for i in 0..3 {
                let item = container.create_item(track, i as f32).unwrap();
                container
                    .update_item_time_range(item, FloatRange::new(i as f32, i as f32 + 0.5))
                    .unwrap();
                container.set_item_event_id(item, format!("event_{t}_{i}")).unwrap();
            }
        }
        container
    }

    #[test]
    fn test_round_trip() {
        let mut source = populated();
        assert!(source.is_dirty());
        let document = source.write_document().unwrap();
        assert!(!source.is_dirty());

        let mut loaded = TrackContainer::new();
        loaded.create_track("Stale");
        loaded.read_document(&document).unwrap();

        assert!(!loaded.is_dirty());
        assert_eq!(loaded.track_count(), 2);
        for (original, copy) in source.tracks().zip(loaded.tracks()) {
            assert_eq!(original.id, copy.id);
            assert_eq!(original.name, copy.name);
            assert_eq!(copy.item_count(), 3);
            assert_eq!(original.items(), copy.items());
        }
        let ranges: Vec<_> = loaded
            .tracks()
            .next()
            .unwrap()
            .items()
            .iter()
            .map(|item| item.time_range)
            .collect();
        assert_eq!(
            ranges,
            vec![
                FloatRange::new(0.0, 0.5),
                FloatRange::new(1.0, 1.5),
                FloatRange::new(2.0, 2.5)
            ]
        );
    }

    #[test]
    fn test_document_layout() {
        let mut container = populated();
        let document = container.write_document().unwrap();
        let records = document.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0]["Track"].is_object());
        assert_eq!(records[0]["Items"].as_array().unwrap().len(), 3);
        assert!(records[0]["Items"][0]["Item"]["time_range"].is_object());
    }

    #[test]
    fn test_read_failures_discard_state() {
        let mut valid = populated();
        let document = valid.write_document().unwrap();

        let mut missing_items = document.clone();
        missing_items[1].as_object_mut().unwrap().remove("Items");

        let mut missing_item = document.clone();
        missing_item[0]["Items"][2] = json!({ "Other": {} });

        let cases = [
            (json!({ "Track": {} }), "not an array"),
            (json!([{ "Items": [] }]), "missing track"),
            (missing_items, "missing items"),
            (missing_item, "missing item"),
            (json!([{ "Track": { "name": 3 }, "Items": [] }]), "malformed"),
        ];

        for (document, label) in cases {
            let mut container = populated();
            assert!(container.read_document(&document).is_err(), "{label}");
            assert_eq!(container.track_count(), 0, "{label}");
            assert!(!container.is_dirty(), "{label}");
        }
    }

    #[test]
    fn test_read_error_kinds() {
        let mut container = TrackContainer::new();
        assert!(matches!(
            container.read_document(&json!({})),
            Err(TimelineError::NotAnArray)
        ));
        assert!(matches!(
            container.read_document(&json!([{ "Items": [] }])),
            Err(TimelineError::MissingTrack { index: 0 })
        ));
    }

    #[test]
    fn test_nested_modification_notifies_once() {
        let begins = Arc::new(AtomicUsize::new(0));
        let ends = Arc::new(AtomicUsize::new(0));

        let mut container = TrackContainer::new();
        let (b, e) = (begins.clone(), ends.clone());
        container.on_modification(Box::new(move |event| match event {
            ModificationEvent::Begin => {
                b.fetch_add(1, Ordering::SeqCst);
            }
            ModificationEvent::End => {
                e.fetch_add(1, Ordering::SeqCst);
            }
        }));

        container.begin_modification();
        let track = container.create_track("Events");
        container.create_item(track, 1.0).unwrap();
        assert!(container.is_modifying());
        container.end_modification();

        assert!(!container.is_modifying());
        assert_eq!(begins.load(Ordering::SeqCst), 1);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert!(container.is_dirty());
    }

    #[test]
    #[should_panic(expected = "end_modification without matching begin_modification")]
    fn test_unbalanced_end_modification() {
        TrackContainer::new().end_modification();
    }

    #[test]
    fn test_item_operations() {
        let mut container = TrackContainer::new();
        let track = container.create_track("Events");
        let item = container.create_item(track, 0.25).unwrap();

        assert!(container.contains_item(item));
        assert_eq!(container.track_for_item(item).map(|t| t.id), Some(track));

        let err = container
            .update_item_time_range(item, FloatRange::new(2.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, TimelineError::InvalidTimeRange(_)));
        assert_eq!(
            container.item(item).map(|i| i.time_range),
            Some(FloatRange::instant(0.25))
        );

        container.delete_item(item).unwrap();
        assert!(!container.contains_item(item));
        assert!(matches!(
            container.delete_item(item),
            Err(TimelineError::ItemNotFound(_))
        ));
        assert!(matches!(
            container.create_item(TrackId::new(), 0.0),
            Err(TimelineError::TrackNotFound(_))
        ));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut container = populated();
        container.clear_dirty_flags();
        assert!(!container.is_dirty());

        let track = container.tracks().next().map(|t| t.id).unwrap();
        container.delete_track(track).unwrap();
        assert!(container.is_dirty());
        assert_eq!(container.track_count(), 1);
        assert!(!container.contains_track(track));

        container.reset();
        assert!(!container.is_dirty());
        assert_eq!(container.track_count(), 0);
    }
}
