// SPDX-License-Identifier: MIT OR Apache-2.0
//! State machine selection and transition handling.

use super::{GraphPoseNodeResult, NodeEvaluator, NodeRuntime, PoseNodeState, StateTransitionPhase};
use crate::settings::{NodeIndex, NodeSettings, StateIndex, StateMachineSettings, TransitionOptions, TransitionSettings, INVALID_INDEX};
use crate::time::{SyncTrackTime, SyncTrackTimeRange};

/// Runtime state of a state machine node
#[derive(Debug, Clone)]
pub(crate) struct StateMachineNode {
    pub time: PoseNodeState,
    pub active_state_index: StateIndex,
    /// Active state node, or the transition currently leaving it
    pub active_node_index: NodeIndex,
}

impl Default for StateMachineNode {
    fn default() -> Self {
        Self {
            time: PoseNodeState::default(),
            active_state_index: INVALID_INDEX,
            active_node_index: INVALID_INDEX,
        }
    }
}

impl<'a> NodeEvaluator<'a> {
    fn state_machine_node_mut(&mut self, node_index: NodeIndex) -> &mut StateMachineNode {
        match &mut self.node_mut(node_index).runtime {
            NodeRuntime::StateMachine(node) => node,
            _ => panic!("node {node_index} is not a state machine"),
        }
    }

    fn state_machine_node(&self, node_index: NodeIndex) -> &StateMachineNode {
        match &self.node(node_index).runtime {
            NodeRuntime::StateMachine(node) => node,
            _ => panic!("node {node_index} is not a state machine"),
        }
    }

    fn transition_settings(&self, node_index: NodeIndex) -> &'a TransitionSettings {
        match self.settings(node_index) {
            NodeSettings::Transition(settings) => settings,
            other => panic!("node {node_index} is a {}, expected a transition", other.kind_name()),
        }
    }

    /// Index of the active state of a state machine
    #[cfg(test)]
    pub(crate) fn active_state_index(&self, node_index: NodeIndex) -> StateIndex {
        self.state_machine_node(node_index).active_state_index
    }

    /// Whether a state machine is blending between states
    pub(crate) fn is_transitioning(&self, node_index: NodeIndex) -> bool {
        let active_node_index = self.state_machine_node(node_index).active_node_index;
        active_node_index != INVALID_INDEX && matches!(self.settings(active_node_index), NodeSettings::Transition(_))
    }

    fn select_entry_state(&mut self, settings: &StateMachineSettings) -> StateIndex {
        for (index, state) in settings.state_settings.iter().enumerate() {
            if state.entry_condition_node_index != INVALID_INDEX && self.bool_value(state.entry_condition_node_index) {
                return index as StateIndex;
            }
        }
        settings.default_state_index
    }

    pub(super) fn initialize_state_machine(&mut self, settings: &StateMachineSettings, initial_time: SyncTrackTime) {
        let active_state_index = self.select_entry_state(settings);
        let state_node_index = settings.state_settings[active_state_index as usize].state_node_index;

        self.initialize(state_node_index, initial_time);
        self.set_state_phase(state_node_index, StateTransitionPhase::Active);

        let time = self.pose_state(state_node_index);
        *self.state_machine_node_mut(settings.node_index) = StateMachineNode {
            time,
            active_state_index,
            active_node_index: state_node_index,
        };
    }

    pub(super) fn shutdown_state_machine(&mut self, node_index: NodeIndex) {
        let active_node_index = self.state_machine_node(node_index).active_node_index;
        if active_node_index != INVALID_INDEX {
            self.shutdown(active_node_index);
        }
        *self.state_machine_node_mut(node_index) = StateMachineNode::default();
    }

    fn evaluate_transitions(&mut self, settings: &StateMachineSettings) {
        let is_transitioning = self.is_transitioning(settings.node_index);
        let node = self.state_machine_node(settings.node_index);
        let active_state_index = node.active_state_index;
        let active_node_index = node.active_node_index;

        let state = &settings.state_settings[active_state_index as usize];
        for transition in &state.transition_settings {
            if transition.condition_node_index == INVALID_INDEX || transition.target_state_index == active_state_index {
                continue;
            }

            let transition_settings = self.transition_settings(transition.transition_node_index);
            if is_transitioning && !transition_settings.options.contains(TransitionOptions::FORCED_TRANSITION_ALLOWED) {
                continue;
            }

            // A target still blending out of an in-flight transition is already updated once per frame
            if self.is_active(transition.transition_node_index)
                || self.is_active(transition_settings.target_state_node_index)
                || !self.bool_value(transition.condition_node_index)
            {
                continue;
            }

            self.start_transition(transition_settings, active_node_index);
            tracing::trace!(
                "State machine {} started transition {} from state {} to state {}",
                settings.node_index,
                transition.transition_node_index,
                active_state_index,
                transition.target_state_index
            );

            let node = self.state_machine_node_mut(settings.node_index);
            node.active_state_index = transition.target_state_index;
            node.active_node_index = transition.transition_node_index;
            break;
        }
    }

    pub(super) fn update_state_machine(
        &mut self,
        settings: &StateMachineSettings,
        range: Option<&SyncTrackTimeRange>,
    ) -> GraphPoseNodeResult {
        self.evaluate_transitions(settings);

        let active_node_index = self.state_machine_node(settings.node_index).active_node_index;
        let result = self.update_pose(active_node_index, range);

        if self.is_transition_complete(active_node_index) {
            let transition_settings = self.transition_settings(active_node_index);
            let target_node_index = self.finish_transition(transition_settings);
            self.state_machine_node_mut(settings.node_index).active_node_index = target_node_index;
            tracing::trace!(
                "State machine {} completed transition {} into state node {}",
                settings.node_index,
                active_node_index,
                target_node_index
            );
        }

        let active_node_index = self.state_machine_node(settings.node_index).active_node_index;
        let time = self.pose_state(active_node_index);
        self.state_machine_node_mut(settings.node_index).time = time;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::nodes::{create_node_instances, ParameterValue};
    use crate::settings::{
        AnimationClipSettings, ControlParameterBoolSettings, GraphDefinition, StateMachineStateSettings,
        StateMachineTransitionSettings, StateSettings,
    };
    use crate::string_id::StringId;

    fn definition() -> GraphDefinition {
        let clip = |node_index: NodeIndex, name: &str| -> NodeSettings {
            AnimationClipSettings {
                node_index,
                clip_id: StringId::new(name),
                duration: 1.0,
                ..Default::default()
            }
            .into()
        };
        let state = |node_index: NodeIndex, child_node_index: NodeIndex| -> NodeSettings {
            StateSettings {
                node_index,
                child_node_index,
                ..Default::default()
            }
            .into()
        };

        GraphDefinition {
            node_settings: vec![
                ControlParameterBoolSettings {
                    node_index: 0,
                    parameter_id: StringId::new("Run"),
                    default_value: false,
                }
                .into(),
                clip(1, "idle"),
                state(2, 1),
                clip(3, "run"),
                state(4, 3),
                TransitionSettings {
                    node_index: 5,
                    target_state_node_index: 4,
                    duration: 0.2,
                    ..Default::default()
                }
                .into(),
                StateMachineSettings {
                    node_index: 6,
                    state_settings: vec![
                        StateMachineStateSettings {
                            state_node_index: 2,
                            entry_condition_node_index: INVALID_INDEX,
                            transition_settings: vec![StateMachineTransitionSettings {
                                target_state_index: 1,
                                transition_node_index: 5,
                                condition_node_index: 0,
                            }],
                        },
                        StateMachineStateSettings {
                            state_node_index: 4,
                            ..Default::default()
                        },
                    ],
                    default_state_index: 0,
                }
                .into(),
            ],
            node_ids: Vec::new(),
            root_node_index: 6,
            control_parameters: Vec::new(),
            external_graph_slots: Vec::new(),
        }
    }

    #[test]
    fn test_transition_starts_and_completes() {
        let definition = definition();
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 0.1;

        {
            let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
            evaluator.initialize(6, SyncTrackTime::default());
            evaluator.update_pose(6, None);
            assert_eq!(evaluator.active_state_index(6), 0);
            assert!(!evaluator.is_transitioning(6));
        }

        nodes[0].runtime = NodeRuntime::ControlParameter(ParameterValue::Bool(true));
        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        evaluator.context.update_id = 1;
        evaluator.update_pose(6, None);
        assert_eq!(evaluator.active_state_index(6), 1);
        assert!(evaluator.is_transitioning(6));

        evaluator.context.update_id = 2;
        evaluator.update_pose(6, None);
        assert!(!evaluator.is_transitioning(6));
        assert!(evaluator.is_active(4));
        assert!(!evaluator.is_active(2));
    }

    fn back_and_forth_definition() -> GraphDefinition {
        let parameter = |node_index: NodeIndex, name: &str| -> NodeSettings {
            ControlParameterBoolSettings {
                node_index,
                parameter_id: StringId::new(name),
                default_value: false,
            }
            .into()
        };
        let clip = |node_index: NodeIndex, name: &str| -> NodeSettings {
            AnimationClipSettings {
                node_index,
                clip_id: StringId::new(name),
                duration: 10.0,
                looping: true,
                ..Default::default()
            }
            .into()
        };
        let state = |node_index: NodeIndex, child_node_index: NodeIndex| -> NodeSettings {
            StateSettings {
                node_index,
                child_node_index,
                ..Default::default()
            }
            .into()
        };
        let transition = |node_index: NodeIndex, target_state_node_index: NodeIndex| -> NodeSettings {
            TransitionSettings {
                node_index,
                target_state_node_index,
                duration: 10.0,
                options: TransitionOptions::FORCED_TRANSITION_ALLOWED,
                ..Default::default()
            }
            .into()
        };

        GraphDefinition {
            node_settings: vec![
                parameter(0, "Forward"),
                parameter(1, "Back"),
                clip(2, "a"),
                state(3, 2),
                clip(4, "b"),
                state(5, 4),
                transition(6, 5),
                transition(7, 3),
                StateMachineSettings {
                    node_index: 8,
                    state_settings: vec![
                        StateMachineStateSettings {
                            state_node_index: 3,
                            entry_condition_node_index: INVALID_INDEX,
                            transition_settings: vec![StateMachineTransitionSettings {
                                target_state_index: 1,
                                transition_node_index: 6,
                                condition_node_index: 0,
                            }],
                        },
                        StateMachineStateSettings {
                            state_node_index: 5,
                            entry_condition_node_index: INVALID_INDEX,
                            transition_settings: vec![StateMachineTransitionSettings {
                                target_state_index: 0,
                                transition_node_index: 7,
                                condition_node_index: 1,
                            }],
                        },
                    ],
                    default_state_index: 0,
                }
                .into(),
            ],
            node_ids: Vec::new(),
            root_node_index: 8,
            control_parameters: Vec::new(),
            external_graph_slots: Vec::new(),
        }
    }

    #[test]
    fn test_back_transition_waits_while_source_blends_out() {
        let definition = back_and_forth_definition();
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 1.0;

        {
            let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
            evaluator.initialize(8, SyncTrackTime::default());
            evaluator.update_pose(8, None);
        }

        nodes[0].runtime = NodeRuntime::ControlParameter(ParameterValue::Bool(true));
        {
            let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
            evaluator.context.update_id = 1;
            evaluator.update_pose(8, None);
            assert!(evaluator.is_transitioning(8));
        }

        nodes[1].runtime = NodeRuntime::ControlParameter(ParameterValue::Bool(true));
        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        evaluator.context.update_id = 2;
        let before = evaluator.pose_state(2).current_time;
        let tasks_before = evaluator.context.task_system.num_tasks();
        evaluator.update_pose(8, None);

        let advanced = evaluator.pose_state(2).current_time.as_f32() - before.as_f32();
        assert!((advanced - 0.1).abs() < 1e-5);
        assert_eq!(evaluator.active_state_index(8), 1);
        assert!(!evaluator.is_active(7));
        // One sample per clip plus the blend
        assert_eq!(evaluator.context.task_system.num_tasks() - tasks_before, 3);
    }
}
