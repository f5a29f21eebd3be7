// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-instance evaluation context.

use crate::events::SampledEventsBuffer;
use crate::settings::NodeIndex;
use crate::task_system::TaskSystem;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};

/// Opaque handle to the physics scene the graph is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicsSceneHandle(pub u64);

/// Root motion produced by one graph source during an update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMotionRecord {
    /// Node that produced the motion
    pub node_index: NodeIndex,
    /// Update the motion was produced in
    pub update_id: u32,
    /// Root motion delta
    pub delta: Transform,
}

/// Records where root motion came from, for debugging
#[derive(Debug, Clone, Default)]
pub struct RootMotionDebugger {
    update_id: u32,
    records: Vec<RootMotionRecord>,
}

impl RootMotionDebugger {
    /// Create an empty debugger
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording a new update, dropping the previous one
    pub fn start_update(&mut self, update_id: u32) {
        self.update_id = update_id;
        self.records.clear();
    }

    /// Record root motion produced by a node
    pub fn record_graph_source(&mut self, node_index: NodeIndex, delta: Transform) {
        self.records.push(RootMotionRecord {
            node_index,
            update_id: self.update_id,
            delta,
        });
    }

    /// Records of the current update
    pub fn records(&self) -> &[RootMotionRecord] {
        &self.records
    }
}

/// State shared by every node during one graph update
#[derive(Debug, Default)]
pub struct GraphContext {
    /// Seconds since the previous update
    pub delta_time: f32,
    /// World placement of the graph owner
    pub world_transform: Transform,
    /// Physics scene, if any
    pub physics_scene: Option<PhysicsSceneHandle>,
    /// Incremented once per update
    pub update_id: u32,
    /// Events sampled this update
    pub sampled_events_buffer: SampledEventsBuffer,
    /// Tasks registered this update
    pub task_system: TaskSystem,
    /// Root motion recorder, present when diagnostics are enabled
    pub root_motion_debugger: Option<RootMotionDebugger>,
}

impl GraphContext {
    /// Create a context, optionally recording root motion
    pub fn new(record_root_motion: bool) -> Self {
        Self {
            root_motion_debugger: record_root_motion.then(RootMotionDebugger::new),
            ..Default::default()
        }
    }

    /// Prepare for a new update
    pub fn begin_update(&mut self, delta_time: f32, world_transform: Transform, physics_scene: Option<PhysicsSceneHandle>) {
        self.delta_time = delta_time;
        self.world_transform = world_transform;
        self.physics_scene = physics_scene;
        self.update_id = self.update_id.wrapping_add(1);
        self.sampled_events_buffer.reset();
        self.task_system.reset();
        if let Some(debugger) = &mut self.root_motion_debugger {
            debugger.start_update(self.update_id);
        }
    }

    /// Discard values cached during the last update
    ///
    /// Value nodes cache per update id, so moving to a fresh id forces the next
    /// read to re-evaluate against the current control parameters.
    pub fn invalidate_cached_values(&mut self) {
        self.update_id = self.update_id.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_system::{DefaultPoseTask, PoseType};

    #[test]
    fn test_begin_update_clears_frame_state() {
        let mut context = GraphContext::new(true);
        context.task_system.register_task(0, &[], DefaultPoseTask { pose_type: PoseType::ReferencePose });
        if let Some(debugger) = &mut context.root_motion_debugger {
            debugger.record_graph_source(0, Transform::IDENTITY);
        }

        context.begin_update(0.1, Transform::IDENTITY, None);
        assert_eq!(context.update_id, 1);
        assert!(context.task_system.is_empty());
        assert!(context.root_motion_debugger.as_ref().is_some_and(|d| d.records().is_empty()));
    }

    #[test]
    fn test_invalidate_moves_to_fresh_update_id() {
        let mut context = GraphContext::new(false);
        context.begin_update(0.1, Transform::IDENTITY, None);
        context.invalidate_cached_values();
        assert_eq!(context.update_id, 2);
    }

    #[test]
    fn test_debugger_disabled_by_default() {
        assert!(GraphContext::new(false).root_motion_debugger.is_none());
    }
}
