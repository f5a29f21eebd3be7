// SPDX-License-Identifier: MIT OR Apache-2.0
//! State machine states.

use super::{GraphPoseNodeResult, NodeEvaluator, NodeRuntime, PoseNodeState};
use crate::events::{SampledEvent, SampledEventKind, SampledEventRange, StateEventType};
use crate::settings::{NodeIndex, StateSettings, INVALID_INDEX};
use crate::string_id::StringId;
use crate::time::{SyncTrackTime, SyncTrackTimeRange};

/// Where a state is in its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum StateTransitionPhase {
    #[default]
    Active,
    TransitioningIn,
    TransitioningOut,
}

/// Runtime state of a state node
#[derive(Debug, Clone)]
pub(crate) struct StateNode {
    pub time: PoseNodeState,
    pub elapsed_time: f32,
    pub phase: StateTransitionPhase,
    pub layer_weight: f32,
    pub layer_mask_weight: f32,
}

impl Default for StateNode {
    fn default() -> Self {
        Self {
            time: PoseNodeState::default(),
            elapsed_time: 0.0,
            phase: StateTransitionPhase::Active,
            layer_weight: 1.0,
            layer_mask_weight: 1.0,
        }
    }
}

impl NodeEvaluator<'_> {
    fn state_node_mut(&mut self, node_index: NodeIndex) -> &mut StateNode {
        match &mut self.node_mut(node_index).runtime {
            NodeRuntime::State(node) => node,
            _ => panic!("node {node_index} is not a state"),
        }
    }

    fn has_pose_child(settings: &StateSettings) -> bool {
        !settings.is_off_state && settings.child_node_index != INVALID_INDEX
    }

    /// Set the lifetime phase of a state, ignored for other node kinds
    pub(crate) fn set_state_phase(&mut self, node_index: NodeIndex, phase: StateTransitionPhase) {
        if let NodeRuntime::State(node) = &mut self.node_mut(node_index).runtime {
            node.phase = phase;
        }
    }

    /// Seconds since a state was entered
    pub(crate) fn state_elapsed_time(&self, node_index: NodeIndex) -> f32 {
        match &self.node(node_index).runtime {
            NodeRuntime::State(node) => node.elapsed_time,
            _ => 0.0,
        }
    }

    /// Layer weight and mask weight evaluated during the last update
    #[cfg(test)]
    pub(crate) fn state_layer_weights(&self, node_index: NodeIndex) -> (f32, f32) {
        match &self.node(node_index).runtime {
            NodeRuntime::State(node) => (node.layer_weight, node.layer_mask_weight),
            _ => (1.0, 1.0),
        }
    }

    pub(super) fn initialize_state(&mut self, settings: &StateSettings, initial_time: SyncTrackTime) {
        let time = if Self::has_pose_child(settings) {
            self.initialize(settings.child_node_index, initial_time);
            self.pose_state(settings.child_node_index)
        } else {
            PoseNodeState::default()
        };

        *self.state_node_mut(settings.node_index) = StateNode {
            time,
            ..Default::default()
        };
    }

    pub(super) fn shutdown_state(&mut self, settings: &StateSettings) {
        if Self::has_pose_child(settings) {
            self.shutdown(settings.child_node_index);
        }
    }

    pub(super) fn update_state(&mut self, settings: &StateSettings, range: Option<&SyncTrackTimeRange>) -> GraphPoseNodeResult {
        let mut result = if Self::has_pose_child(settings) {
            self.update_pose(settings.child_node_index, range)
        } else {
            GraphPoseNodeResult::empty_at(self.context.sampled_events_buffer.num_events())
        };
        let child_time = Self::has_pose_child(settings).then(|| self.pose_state(settings.child_node_index));

        let delta_time = self.context.delta_time;
        let node = self.state_node_mut(settings.node_index);
        node.elapsed_time += delta_time;
        if let Some(time) = child_time {
            node.time = time;
        }
        let phase = node.phase;
        let elapsed_time = node.elapsed_time;
        let time = node.time;

        // State events
        let events_start = self.context.sampled_events_buffer.num_events();
        let (phase_events, event_type) = match phase {
            StateTransitionPhase::TransitioningIn => (&settings.entry_events, StateEventType::Entry),
            StateTransitionPhase::Active => (&settings.execute_events, StateEventType::Execute),
            StateTransitionPhase::TransitioningOut => (&settings.exit_events, StateEventType::Exit),
        };
        for id in phase_events {
            self.emplace_state_event(settings.node_index, id, event_type, time.current_time.as_f32());
        }

        for event in &settings.timed_elapsed_events {
            if elapsed_time >= event.time_value {
                self.emplace_state_event(settings.node_index, &event.id, StateEventType::TimedElapsed, time.current_time.as_f32());
            }
        }

        if time.duration > 0.0 {
            let remaining = (1.0 - time.current_time.as_f32()) * time.duration;
            for event in &settings.timed_remaining_events {
                if remaining <= event.time_value {
                    self.emplace_state_event(
                        settings.node_index,
                        &event.id,
                        StateEventType::TimedRemaining,
                        time.current_time.as_f32(),
                    );
                }
            }
        }
        let events_end = self.context.sampled_events_buffer.num_events();

        // Layer data
        let layer_weight = if settings.layer_weight_node_index != INVALID_INDEX {
            self.float_value(settings.layer_weight_node_index)
        } else {
            1.0
        };
        let layer_mask_weight = if settings.layer_bone_mask_node_index != INVALID_INDEX {
            self.bone_mask_value(settings.layer_bone_mask_node_index)
        } else {
            1.0
        };
        let node = self.state_node_mut(settings.node_index);
        node.layer_weight = layer_weight;
        node.layer_mask_weight = layer_mask_weight;

        result.sampled_event_range = result
            .sampled_event_range
            .combine(&SampledEventRange::new(events_start, events_end));
        result
    }

    fn emplace_state_event(&mut self, node_index: NodeIndex, id: &StringId, event_type: StateEventType, percentage_through: f32) {
        self.context.sampled_events_buffer.emplace(SampledEvent {
            source_node: node_index,
            kind: SampledEventKind::State {
                id: id.clone(),
                event_type,
            },
            weight: 1.0,
            percentage_through,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::nodes::create_node_instances;
    use crate::settings::{AnimationClipSettings, ConstFloatSettings, GraphDefinition, TimedEvent};

    fn definition(is_off_state: bool) -> GraphDefinition {
        GraphDefinition {
            node_settings: vec![
                AnimationClipSettings {
                    node_index: 0,
                    clip_id: StringId::new("idle"),
                    duration: 1.0,
                    ..Default::default()
                }
                .into(),
                ConstFloatSettings { node_index: 1, value: 0.5 }.into(),
                StateSettings {
                    node_index: 2,
                    child_node_index: if is_off_state { INVALID_INDEX } else { 0 },
                    layer_weight_node_index: 1,
                    entry_events: vec![StringId::new("enter")],
                    execute_events: vec![StringId::new("tick")],
                    timed_elapsed_events: vec![TimedEvent {
                        id: StringId::new("late"),
                        time_value: 0.15,
                    }],
                    is_off_state,
                    ..Default::default()
                }
                .into(),
            ],
            node_ids: Vec::new(),
            root_node_index: 2,
            control_parameters: Vec::new(),
            external_graph_slots: Vec::new(),
        }
    }

    fn event_ids(context: &GraphContext, range: SampledEventRange) -> Vec<String> {
        context
            .sampled_events_buffer
            .events_in_range(range)
            .iter()
            .map(|e| e.id().as_str().to_string())
            .collect()
    }

    #[test]
    fn test_state_events_follow_phase() {
        let definition = definition(false);
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 0.1;

        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        evaluator.initialize(2, SyncTrackTime::default());
        evaluator.set_state_phase(2, StateTransitionPhase::TransitioningIn);
        let first = evaluator.update_pose(2, None);
        assert!(first.task_index.is_some());
        assert_eq!(evaluator.state_layer_weights(2), (0.5, 1.0));

        evaluator.set_state_phase(2, StateTransitionPhase::Active);
        let second = evaluator.update_pose(2, None);

        assert_eq!(event_ids(&context, first.sampled_event_range), ["enter"]);
        assert_eq!(event_ids(&context, second.sampled_event_range), ["tick", "late"]);
    }

    #[test]
    fn test_off_state_produces_no_pose() {
        let definition = definition(true);
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 0.1;

        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        evaluator.initialize(2, SyncTrackTime::default());
        let result = evaluator.update_pose(2, None);

        assert!(result.task_index.is_none());
        assert!(!evaluator.is_active(0));
        assert!(evaluator.context.task_system.is_empty());
        assert_eq!(event_ids(&context, result.sampled_event_range), ["tick"]);
    }
}
