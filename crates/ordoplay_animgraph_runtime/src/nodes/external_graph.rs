// SPDX-License-Identifier: MIT OR Apache-2.0
//! Splice an externally owned graph instance into the evaluation.

use super::{GraphPoseNodeResult, PoseNodeState};
use crate::context::GraphContext;
use crate::instance::{GraphInstance, SharedGraphInstance};
use crate::settings::NodeIndex;
use crate::string_id::StringId;
use crate::task_system::{DefaultPoseTask, PoseType};
use crate::time::{SyncTrack, SyncTrackTime, SyncTrackTimeRange, DEFAULT_SYNC_TRACK};
use crate::transform::Transform;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Runtime node that evaluates an attached graph instance in place
///
/// The node never owns the attached instance. Whoever attaches an instance
/// must detach it again before either side is destroyed.
#[derive(Debug)]
pub struct ExternalGraphNode {
    node_index: NodeIndex,
    slot_id: StringId,
    time: PoseNodeState,
    graph_instance: Option<Weak<RefCell<GraphInstance>>>,
}

impl ExternalGraphNode {
    pub(crate) fn new(node_index: NodeIndex, slot_id: StringId) -> Self {
        Self {
            node_index,
            slot_id,
            time: PoseNodeState::default(),
            graph_instance: None,
        }
    }

    /// Index of this node in its graph
    pub fn node_index(&self) -> NodeIndex {
        self.node_index
    }

    /// Slot this node is exposed as
    pub fn slot_id(&self) -> &StringId {
        &self.slot_id
    }

    /// Whether an instance is attached
    pub fn is_attached(&self) -> bool {
        self.graph_instance.is_some()
    }

    /// Time bookkeeping copied from the attached instance's root
    pub fn time(&self) -> PoseNodeState {
        self.time
    }

    /// Attach an instance, the node must currently be detached
    pub fn attach_graph_instance(&mut self, graph_instance: &SharedGraphInstance) {
        assert!(self.graph_instance.is_none(), "external graph slot '{}' is already attached", self.slot_id);
        self.graph_instance = Some(Rc::downgrade(graph_instance));
        tracing::debug!("Attached external graph to slot '{}' (node {})", self.slot_id, self.node_index);
    }

    /// Detach the current instance, the node must currently be attached
    pub fn detach_external_graph_instance(&mut self) {
        assert!(self.graph_instance.is_some(), "external graph slot '{}' is not attached", self.slot_id);
        self.graph_instance = None;
        tracing::debug!("Detached external graph from slot '{}' (node {})", self.slot_id, self.node_index);
    }

    fn attached_instance(&self) -> Option<SharedGraphInstance> {
        self.graph_instance.as_ref().map(|weak| match weak.upgrade() {
            Some(instance) => instance,
            None => panic!("external graph instance in slot '{}' was dropped while attached", self.slot_id),
        })
    }

    /// Reset the attached instance and adopt its root time
    pub fn initialize(&mut self, _initial_time: SyncTrackTime) {
        self.time = match self.attached_instance() {
            Some(shared) => {
                let mut instance = shared.borrow_mut();
                instance.reset_graph_state();
                PoseNodeState {
                    previous_time: instance.root_previous_time(),
                    current_time: instance.root_current_time(),
                    duration: instance.root_duration(),
                    loop_count: 0,
                }
            }
            None => PoseNodeState::default(),
        };
    }

    /// Sync track of the attached instance's root, or the default track
    pub fn sync_track(&self) -> Arc<SyncTrack> {
        match self.attached_instance() {
            Some(shared) => shared.borrow().root_sync_track(),
            None => Arc::clone(&DEFAULT_SYNC_TRACK),
        }
    }

    /// Evaluate the attached instance with its own time step
    pub fn update(&mut self, context: &mut GraphContext) -> GraphPoseNodeResult {
        self.update_internal(context, None)
    }

    /// Evaluate the attached instance synchronized to a sync track range
    pub fn update_synchronized(&mut self, context: &mut GraphContext, range: &SyncTrackTimeRange) -> GraphPoseNodeResult {
        self.update_internal(context, Some(range))
    }

    fn update_internal(&mut self, context: &mut GraphContext, range: Option<&SyncTrackTimeRange>) -> GraphPoseNodeResult {
        let Some(shared) = self.attached_instance() else {
            let task_index = context.task_system.register_task(
                self.node_index,
                &[],
                DefaultPoseTask {
                    pose_type: PoseType::ReferencePose,
                },
            );
            return GraphPoseNodeResult {
                task_index: Some(task_index),
                root_motion_delta: Transform::IDENTITY,
                sampled_event_range: context.sampled_events_buffer.empty_range(),
            };
        };

        let mut instance = shared.borrow_mut();
        let result = instance.evaluate(context.delta_time, context.world_transform, context.physics_scene, range);

        let sampled_event_range = context.sampled_events_buffer.append(instance.sampled_events());
        let task_offset = context.task_system.transfer_tasks(instance.task_system_mut());

        self.time.previous_time = instance.root_previous_time();
        self.time.current_time = instance.root_current_time();
        self.time.duration = instance.root_duration();

        if let Some(debugger) = &mut context.root_motion_debugger {
            debugger.record_graph_source(self.node_index, result.root_motion_delta);
        }

        GraphPoseNodeResult {
            task_index: result.task_index.map(|index| index + task_offset),
            root_motion_delta: result.root_motion_delta,
            sampled_event_range,
        }
    }
}

impl Drop for ExternalGraphNode {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert!(
                self.graph_instance.is_none(),
                "external graph node dropped while slot '{}' is still attached",
                self.slot_id
            );
        }
    }
}
