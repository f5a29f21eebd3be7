// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime graph instance.

use crate::context::{GraphContext, PhysicsSceneHandle, RootMotionDebugger};
use crate::events::SampledEventsBuffer;
use crate::nodes::{
    self, create_node_instances, ExternalGraphNode, GraphPoseNodeResult, NodeEvaluator, NodeInstance, NodeRuntime,
    ParameterValue, PoseNodeState,
};
use crate::settings::{GraphDefinition, NodeIndex, StateIndex, INVALID_INDEX};
use crate::string_id::StringId;
use crate::task_system::TaskSystem;
use crate::time::{Percentage, SyncTrack, SyncTrackTime, SyncTrackTimeRange};
use crate::transform::Transform;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Graph instance that can be attached to external graph slots
pub type SharedGraphInstance = Rc<RefCell<GraphInstance>>;

/// Errors from the instance API
#[derive(Debug, Error, PartialEq)]
pub enum InstanceError {
    /// No control parameter with this name
    #[error("Unknown control parameter: {0}")]
    UnknownControlParameter(StringId),
    /// Control parameter holds a different value type
    #[error("Control parameter {parameter} is not a {expected}")]
    ControlParameterTypeMismatch {
        /// Parameter name
        parameter: StringId,
        /// Type the caller tried to set
        expected: &'static str,
    },
    /// No external graph slot with this name
    #[error("Unknown external graph slot: {0}")]
    UnknownExternalGraphSlot(StringId),
}

/// Options for a graph instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceOptions {
    /// Record which nodes produced root motion each update
    pub record_root_motion: bool,
}

/// Runtime instance of a compiled graph
#[derive(Debug)]
pub struct GraphInstance {
    definition: Arc<GraphDefinition>,
    nodes: Vec<NodeInstance>,
    context: GraphContext,
    options: InstanceOptions,
}

impl GraphInstance {
    /// Create an instance with default options
    pub fn new(definition: Arc<GraphDefinition>) -> Self {
        Self::with_options(definition, InstanceOptions::default())
    }

    /// Create an instance
    pub fn with_options(definition: Arc<GraphDefinition>, options: InstanceOptions) -> Self {
        let nodes = create_node_instances(&definition);
        Self {
            definition,
            nodes,
            context: GraphContext::new(options.record_root_motion),
            options,
        }
    }

    /// Wrap for attachment to external graph slots
    pub fn into_shared(self) -> SharedGraphInstance {
        Rc::new(RefCell::new(self))
    }

    /// Compiled definition
    pub fn definition(&self) -> &Arc<GraphDefinition> {
        &self.definition
    }

    /// Options
    pub fn options(&self) -> InstanceOptions {
        self.options
    }

    fn evaluator(&mut self) -> NodeEvaluator<'_> {
        NodeEvaluator::new(&self.definition, &mut self.nodes, &mut self.context)
    }

    fn control_parameter_node(&self, parameter_id: &StringId) -> Result<NodeIndex, InstanceError> {
        self.definition
            .control_parameters
            .iter()
            .find(|binding| &binding.parameter_id == parameter_id)
            .map(|binding| binding.node_index)
            .ok_or_else(|| InstanceError::UnknownControlParameter(parameter_id.clone()))
    }

    fn set_control_parameter(&mut self, parameter_id: &StringId, value: ParameterValue) -> Result<(), InstanceError> {
        let node_index = self.control_parameter_node(parameter_id)?;
        match &mut self.nodes[node_index as usize].runtime {
            NodeRuntime::ControlParameter(current) if std::mem::discriminant(current) == std::mem::discriminant(&value) => {
                *current = value;
                Ok(())
            }
            _ => Err(InstanceError::ControlParameterTypeMismatch {
                parameter: parameter_id.clone(),
                expected: match value {
                    ParameterValue::Bool(_) => "bool",
                    ParameterValue::Float(_) => "float",
                },
            }),
        }
    }

    /// Set a bool control parameter
    pub fn set_control_parameter_bool(&mut self, parameter_id: impl Into<StringId>, value: bool) -> Result<(), InstanceError> {
        self.set_control_parameter(&parameter_id.into(), ParameterValue::Bool(value))
    }

    /// Set a float control parameter
    pub fn set_control_parameter_float(&mut self, parameter_id: impl Into<StringId>, value: f32) -> Result<(), InstanceError> {
        self.set_control_parameter(&parameter_id.into(), ParameterValue::Float(value))
    }

    /// Shut down and re-initialize the root node
    pub fn reset_graph_state(&mut self) {
        let root = self.definition.root_node_index;
        if root == INVALID_INDEX {
            return;
        }

        self.context.invalidate_cached_values();
        let mut evaluator = self.evaluator();
        if evaluator.is_active(root) {
            evaluator.shutdown(root);
        }
        evaluator.initialize(root, SyncTrackTime::default());
    }

    pub(crate) fn evaluate(
        &mut self,
        delta_time: f32,
        world_transform: Transform,
        physics_scene: Option<PhysicsSceneHandle>,
        range: Option<&SyncTrackTimeRange>,
    ) -> GraphPoseNodeResult {
        self.context.begin_update(delta_time, world_transform, physics_scene);

        let root = self.definition.root_node_index;
        if root == INVALID_INDEX {
            return GraphPoseNodeResult::empty_at(0);
        }

        let mut evaluator = self.evaluator();
        if !evaluator.is_active(root) {
            evaluator.initialize(root, SyncTrackTime::default());
        }
        let result = evaluator.update_pose(root, range);

        if let Some(debugger) = &mut self.context.root_motion_debugger {
            debugger.record_graph_source(root, result.root_motion_delta);
        }
        result
    }

    /// Run one update of the graph
    pub fn evaluate_graph(
        &mut self,
        delta_time: f32,
        world_transform: Transform,
        physics_scene: Option<PhysicsSceneHandle>,
    ) -> GraphPoseNodeResult {
        self.evaluate(delta_time, world_transform, physics_scene, None)
    }

    /// Run one update of the graph synchronized to a sync track range
    pub fn evaluate_graph_synchronized(
        &mut self,
        delta_time: f32,
        world_transform: Transform,
        physics_scene: Option<PhysicsSceneHandle>,
        range: &SyncTrackTimeRange,
    ) -> GraphPoseNodeResult {
        self.evaluate(delta_time, world_transform, physics_scene, Some(range))
    }

    fn root_state(&self) -> PoseNodeState {
        nodes::pose_state(&self.nodes, self.definition.root_node_index)
    }

    /// Root time at the start of the last update
    pub fn root_previous_time(&self) -> Percentage {
        self.root_state().previous_time
    }

    /// Root time at the end of the last update
    pub fn root_current_time(&self) -> Percentage {
        self.root_state().current_time
    }

    /// Root duration in seconds
    pub fn root_duration(&self) -> f32 {
        self.root_state().duration
    }

    /// Sync track of the root node
    pub fn root_sync_track(&self) -> Arc<SyncTrack> {
        nodes::sync_track(&self.definition, &self.nodes, self.definition.root_node_index)
    }

    /// Events sampled during the last update
    pub fn sampled_events(&self) -> &SampledEventsBuffer {
        &self.context.sampled_events_buffer
    }

    /// Tasks registered during the last update
    pub fn task_system(&self) -> &TaskSystem {
        &self.context.task_system
    }

    /// Tasks registered during the last update, for transfer to another system
    pub fn task_system_mut(&mut self) -> &mut TaskSystem {
        &mut self.context.task_system
    }

    /// Root motion recorder, when enabled
    pub fn root_motion_debugger(&self) -> Option<&RootMotionDebugger> {
        self.context.root_motion_debugger.as_ref()
    }

    /// Whether a node is currently initialized
    pub fn is_node_active(&self, node_index: NodeIndex) -> bool {
        usize::try_from(node_index)
            .ok()
            .and_then(|i| self.nodes.get(i))
            .is_some_and(NodeInstance::is_initialized)
    }

    /// Active state of a state machine node
    pub fn active_state_index(&self, node_index: NodeIndex) -> Option<StateIndex> {
        let node = usize::try_from(node_index).ok().and_then(|i| self.nodes.get(i))?;
        match &node.runtime {
            NodeRuntime::StateMachine(state_machine) if node.is_initialized() => Some(state_machine.active_state_index),
            _ => None,
        }
    }

    /// Layer weight and bone mask weight of an active state
    pub fn state_layer_weights(&self, node_index: NodeIndex) -> Option<(f32, f32)> {
        let node = usize::try_from(node_index).ok().and_then(|i| self.nodes.get(i))?;
        match &node.runtime {
            NodeRuntime::State(state) if node.is_initialized() => Some((state.layer_weight, state.layer_mask_weight)),
            _ => None,
        }
    }

    fn external_graph_node_mut(&mut self, slot_id: &StringId) -> Result<&mut ExternalGraphNode, InstanceError> {
        let node_index = self
            .definition
            .external_graph_slot(slot_id)
            .ok_or_else(|| InstanceError::UnknownExternalGraphSlot(slot_id.clone()))?;

        match &mut self.nodes[node_index as usize].runtime {
            NodeRuntime::ExternalGraph(node) => Ok(node),
            _ => Err(InstanceError::UnknownExternalGraphSlot(slot_id.clone())),
        }
    }

    /// External graph node behind a slot
    pub fn external_graph_node(&self, slot_id: &StringId) -> Option<&ExternalGraphNode> {
        let node_index = self.definition.external_graph_slot(slot_id)?;
        match &self.nodes.get(node_index as usize)?.runtime {
            NodeRuntime::ExternalGraph(node) => Some(node),
            _ => None,
        }
    }

    /// Attach an instance to an external graph slot
    pub fn attach_external_graph_instance(
        &mut self,
        slot_id: impl Into<StringId>,
        graph_instance: &SharedGraphInstance,
    ) -> Result<(), InstanceError> {
        self.external_graph_node_mut(&slot_id.into())?
            .attach_graph_instance(graph_instance);
        Ok(())
    }

    /// Detach the instance attached to an external graph slot
    pub fn detach_external_graph_instance(&mut self, slot_id: impl Into<StringId>) -> Result<(), InstanceError> {
        self.external_graph_node_mut(&slot_id.into())?
            .detach_external_graph_instance();
        Ok(())
    }
}
