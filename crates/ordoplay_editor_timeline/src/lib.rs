// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline track containers for OrdoPlay Editor.
//!
//! A [`TrackContainer`] owns an ordered list of tracks, each holding timed
//! items such as animation events. Edits go through nested modification
//! brackets so listeners can snapshot state for undo, and the container
//! persists to a JSON document of `Track`/`Items`/`Item` records.

pub mod container;
pub mod track;

pub use container::{ModificationCallback, ModificationEvent, TimelineError, TrackContainer};
pub use track::{FloatRange, Track, TrackId, TrackItem, TrackItemId};
