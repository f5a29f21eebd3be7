// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime animation graph for `OrdoPlay`.
//!
//! Authoring graphs are compiled by the tools crate into a [`GraphDefinition`]:
//! a flat table of node settings addressed by [`NodeIndex`]. A definition is
//! immutable once built and can be shared by any number of [`GraphInstance`]s.
//!
//! ## Evaluation
//!
//! Each frame an instance runs a single depth-first pass from its root node:
//! - pose nodes register work with the [`TaskSystem`] for the later blending pass
//! - sampled events are appended to a frame-scoped [`SampledEventsBuffer`]
//! - every pose result carries the half-open [`SampledEventRange`] it contributed
//!
//! External graph nodes let another, independently owned instance be spliced
//! into the evaluation at runtime.

pub mod context;
pub mod events;
pub mod instance;
pub mod nodes;
pub mod settings;
pub mod string_id;
pub mod task_system;
pub mod time;
pub mod transform;
pub mod value;

pub use context::{GraphContext, PhysicsSceneHandle, RootMotionDebugger, RootMotionRecord};
pub use events::{SampledEvent, SampledEventKind, SampledEventRange, SampledEventsBuffer, StateEventType};
pub use instance::{GraphInstance, InstanceError, InstanceOptions, SharedGraphInstance};
pub use nodes::{ExternalGraphNode, GraphPoseNodeResult, PoseNodeState};
pub use settings::{CompiledSettings, GraphDefinition, NodeIndex, NodeSettings, StateIndex, INVALID_INDEX};
pub use string_id::StringId;
pub use task_system::{BlendTask, DefaultPoseTask, PoseType, SampleTask, Task, TaskIndex, TaskSystem};
pub use time::{Percentage, SyncEvent, SyncTrack, SyncTrackTime, SyncTrackTimeRange, DEFAULT_SYNC_TRACK};
pub use transform::Transform;
pub use value::GraphValueType;
