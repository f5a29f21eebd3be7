// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime node instances and the per-update evaluator.
//!
//! Node instances hold only mutable runtime state; everything authored lives
//! in the shared settings table. Pose nodes are reference counted: a node is
//! active while at least one parent has initialized it.

mod clip;
mod conditions;
mod external_graph;
mod state;
mod state_machine;
mod transition;
mod values;

pub use external_graph::ExternalGraphNode;

pub(crate) use clip::ClipNode;
pub(crate) use state::{StateNode, StateTransitionPhase};
pub(crate) use state_machine::StateMachineNode;
pub(crate) use transition::TransitionNode;
pub(crate) use values::{ParameterValue, ValueCache};

use crate::context::GraphContext;
use crate::events::SampledEventRange;
use crate::settings::{GraphDefinition, NodeIndex, NodeSettings, INVALID_INDEX};
use crate::task_system::TaskIndex;
use crate::time::{Percentage, SyncTrack, SyncTrackTime, SyncTrackTimeRange, DEFAULT_SYNC_TRACK};
use crate::transform::Transform;
use std::sync::Arc;

/// Output of a pose node update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphPoseNodeResult {
    /// Task producing the node's pose, if any
    pub task_index: Option<TaskIndex>,
    /// Root motion produced this update
    pub root_motion_delta: Transform,
    /// Events sampled by the node and its children
    pub sampled_event_range: SampledEventRange,
}

impl GraphPoseNodeResult {
    /// Result that produced nothing, anchored at a buffer position
    pub fn empty_at(position: usize) -> Self {
        Self {
            task_index: None,
            root_motion_delta: Transform::IDENTITY,
            sampled_event_range: SampledEventRange::empty_at(position),
        }
    }
}

/// Time bookkeeping shared by every pose node
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseNodeState {
    /// Time at the start of the last update
    pub previous_time: Percentage,
    /// Time at the end of the last update
    pub current_time: Percentage,
    /// Length in seconds
    pub duration: f32,
    /// Completed loops since initialization
    pub loop_count: i32,
}

/// Kind-specific runtime state
#[derive(Debug)]
pub(crate) enum NodeRuntime {
    ControlParameter(ParameterValue),
    Value(ValueCache),
    Clip(ClipNode),
    ExternalGraph(ExternalGraphNode),
    State(StateNode),
    StateMachine(StateMachineNode),
    Transition(TransitionNode),
}

/// Runtime instance of one compiled node
#[derive(Debug)]
pub(crate) struct NodeInstance {
    pub initialization_count: u32,
    pub runtime: NodeRuntime,
}

impl NodeInstance {
    pub fn new(settings: &NodeSettings) -> Self {
        let runtime = match settings {
            NodeSettings::ControlParameterBool(s) => NodeRuntime::ControlParameter(ParameterValue::Bool(s.default_value)),
            NodeSettings::ControlParameterFloat(s) => NodeRuntime::ControlParameter(ParameterValue::Float(s.default_value)),
            NodeSettings::AnimationClip(s) => NodeRuntime::Clip(ClipNode::new(s)),
            NodeSettings::ExternalGraph(s) => {
                NodeRuntime::ExternalGraph(ExternalGraphNode::new(s.node_index, s.slot_id.clone()))
            }
            NodeSettings::State(_) => NodeRuntime::State(StateNode::default()),
            NodeSettings::StateMachine(_) => NodeRuntime::StateMachine(StateMachineNode::default()),
            NodeSettings::Transition(_) => NodeRuntime::Transition(TransitionNode::default()),
            _ => NodeRuntime::Value(ValueCache::default()),
        };

        Self {
            initialization_count: 0,
            runtime,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialization_count > 0
    }
}

/// Build runtime instances for every node of a definition
pub(crate) fn create_node_instances(definition: &GraphDefinition) -> Vec<NodeInstance> {
    definition.node_settings.iter().map(NodeInstance::new).collect()
}

/// Time bookkeeping of a pose node
pub(crate) fn pose_state(nodes: &[NodeInstance], node_index: NodeIndex) -> PoseNodeState {
    if node_index == INVALID_INDEX {
        return PoseNodeState::default();
    }

    match &nodes[node_index as usize].runtime {
        NodeRuntime::Clip(node) => node.time,
        NodeRuntime::ExternalGraph(node) => node.time(),
        NodeRuntime::State(node) => node.time,
        NodeRuntime::StateMachine(node) => node.time,
        NodeRuntime::Transition(node) => node.time,
        _ => PoseNodeState::default(),
    }
}

/// Sync track a pose node currently follows
pub(crate) fn sync_track(definition: &GraphDefinition, nodes: &[NodeInstance], node_index: NodeIndex) -> Arc<SyncTrack> {
    if node_index == INVALID_INDEX {
        return Arc::clone(&DEFAULT_SYNC_TRACK);
    }

    match (&nodes[node_index as usize].runtime, definition.settings(node_index)) {
        (NodeRuntime::Clip(node), _) => Arc::clone(&node.sync_track),
        (NodeRuntime::ExternalGraph(node), _) => node.sync_track(),
        (NodeRuntime::State(_), Some(NodeSettings::State(settings))) if !settings.is_off_state => {
            sync_track(definition, nodes, settings.child_node_index)
        }
        (NodeRuntime::StateMachine(node), _) => sync_track(definition, nodes, node.active_node_index),
        (NodeRuntime::Transition(_), Some(NodeSettings::Transition(settings))) => {
            sync_track(definition, nodes, settings.target_state_node_index)
        }
        _ => Arc::clone(&DEFAULT_SYNC_TRACK),
    }
}

/// Walks the node tree for one update
pub(crate) struct NodeEvaluator<'a> {
    pub definition: &'a GraphDefinition,
    pub nodes: &'a mut [NodeInstance],
    pub context: &'a mut GraphContext,
}

impl<'a> NodeEvaluator<'a> {
    pub fn new(definition: &'a GraphDefinition, nodes: &'a mut [NodeInstance], context: &'a mut GraphContext) -> Self {
        Self {
            definition,
            nodes,
            context,
        }
    }

    pub(crate) fn settings(&self, node_index: NodeIndex) -> &'a NodeSettings {
        let definition: &'a GraphDefinition = self.definition;
        match definition.settings(node_index) {
            Some(settings) => settings,
            None => panic!("node index {node_index} is out of range"),
        }
    }

    pub(crate) fn node(&self, node_index: NodeIndex) -> &NodeInstance {
        &self.nodes[node_index as usize]
    }

    pub(crate) fn node_mut(&mut self, node_index: NodeIndex) -> &mut NodeInstance {
        &mut self.nodes[node_index as usize]
    }

    /// Whether a node has been initialized by at least one parent
    pub fn is_active(&self, node_index: NodeIndex) -> bool {
        node_index != INVALID_INDEX && self.node(node_index).is_initialized()
    }

    /// Initialize a pose node, only the first call does any work
    pub fn initialize(&mut self, node_index: NodeIndex, initial_time: SyncTrackTime) {
        let node = self.node_mut(node_index);
        node.initialization_count += 1;
        if node.initialization_count > 1 {
            return;
        }

        match self.settings(node_index) {
            NodeSettings::AnimationClip(settings) => self.initialize_clip(settings, initial_time),
            NodeSettings::ExternalGraph(_) => {
                if let NodeRuntime::ExternalGraph(node) = &mut self.node_mut(node_index).runtime {
                    node.initialize(initial_time);
                }
            }
            NodeSettings::State(settings) => self.initialize_state(settings, initial_time),
            NodeSettings::StateMachine(settings) => self.initialize_state_machine(settings, initial_time),
            NodeSettings::Transition(_) => {
                // Transitions are started explicitly by their state machine
            }
            _ => {}
        }
    }

    /// Release one initialization, the last call shuts the node down
    pub fn shutdown(&mut self, node_index: NodeIndex) {
        let node = self.node_mut(node_index);
        assert!(node.initialization_count > 0, "shutting down a node that is not initialized");
        node.initialization_count -= 1;
        if node.initialization_count > 0 {
            return;
        }

        match self.settings(node_index) {
            NodeSettings::State(settings) => self.shutdown_state(settings),
            NodeSettings::StateMachine(_) => self.shutdown_state_machine(node_index),
            NodeSettings::Transition(settings) => self.shutdown_transition(settings),
            _ => {}
        }
    }

    /// Update a pose node, optionally synchronized to a sync track range
    pub fn update_pose(&mut self, node_index: NodeIndex, range: Option<&SyncTrackTimeRange>) -> GraphPoseNodeResult {
        debug_assert!(self.is_active(node_index), "updating an inactive node");

        match self.settings(node_index) {
            NodeSettings::AnimationClip(settings) => self.update_clip(settings, range),
            NodeSettings::ExternalGraph(_) => {
                let nodes = &mut *self.nodes;
                let context = &mut *self.context;
                match &mut nodes[node_index as usize].runtime {
                    NodeRuntime::ExternalGraph(node) => match range {
                        Some(range) => node.update_synchronized(context, range),
                        None => node.update(context),
                    },
                    _ => unreachable!("external graph settings without an external graph node"),
                }
            }
            NodeSettings::State(settings) => self.update_state(settings, range),
            NodeSettings::StateMachine(settings) => self.update_state_machine(settings, range),
            NodeSettings::Transition(settings) => self.update_transition(settings, range),
            other => panic!("{} is not a pose node", other.kind_name()),
        }
    }

    /// Time bookkeeping of a pose node
    pub fn pose_state(&self, node_index: NodeIndex) -> PoseNodeState {
        pose_state(&*self.nodes, node_index)
    }

    /// Sync track a pose node currently follows
    pub fn sync_track(&self, node_index: NodeIndex) -> Arc<SyncTrack> {
        sync_track(self.definition, &*self.nodes, node_index)
    }

    /// Sync track range covered by a node's last update
    pub fn sync_range(&self, node_index: NodeIndex) -> SyncTrackTimeRange {
        let time = self.pose_state(node_index);
        let track = self.sync_track(node_index);
        SyncTrackTimeRange::new(track.get_time(time.previous_time), track.get_time(time.current_time))
    }
}
