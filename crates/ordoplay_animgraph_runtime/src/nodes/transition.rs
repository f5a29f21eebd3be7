// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blending from a source node into a target state.

use super::{GraphPoseNodeResult, NodeEvaluator, NodeRuntime, PoseNodeState, StateTransitionPhase};
use crate::settings::{NodeIndex, NodeSettings, RootMotionBlendMode, TransitionOptions, TransitionSettings, INVALID_INDEX};
use crate::task_system::BlendTask;
use crate::time::{SyncTrackTime, SyncTrackTimeRange};

/// Runtime state of a transition node
#[derive(Debug, Clone)]
pub(crate) struct TransitionNode {
    pub time: PoseNodeState,
    pub source_node_index: NodeIndex,
    pub duration: f32,
    pub progress: f32,
    pub blend_weight: f32,
}

impl Default for TransitionNode {
    fn default() -> Self {
        Self {
            time: PoseNodeState::default(),
            source_node_index: INVALID_INDEX,
            duration: 0.0,
            progress: 0.0,
            blend_weight: 0.0,
        }
    }
}

impl NodeEvaluator<'_> {
    fn transition_node_mut(&mut self, node_index: NodeIndex) -> &mut TransitionNode {
        match &mut self.node_mut(node_index).runtime {
            NodeRuntime::Transition(node) => node,
            _ => panic!("node {node_index} is not a transition"),
        }
    }

    /// Whether a transition has fully blended into its target
    pub(crate) fn is_transition_complete(&self, node_index: NodeIndex) -> bool {
        match &self.node(node_index).runtime {
            NodeRuntime::Transition(node) => node.progress >= 1.0,
            _ => false,
        }
    }

    /// Current blend weight of a transition
    #[cfg(test)]
    pub(crate) fn transition_blend_weight(&self, node_index: NodeIndex) -> f32 {
        match &self.node(node_index).runtime {
            NodeRuntime::Transition(node) => node.blend_weight,
            _ => 0.0,
        }
    }

    fn transition_duration(&mut self, settings: &TransitionSettings, source_node_index: NodeIndex) -> f32 {
        let mut duration = if settings.duration_override_node_index != INVALID_INDEX {
            self.float_value(settings.duration_override_node_index)
        } else {
            settings.duration
        };

        if settings.options.contains(TransitionOptions::CLAMP_DURATION) {
            let source = self.pose_state(source_node_index);
            if source.duration > 0.0 {
                let remaining = (1.0 - source.current_time.as_f32()) * source.duration;
                duration = duration.min(remaining);
            }
        }

        duration.max(0.0)
    }

    fn target_start_time(&mut self, settings: &TransitionSettings, source_node_index: NodeIndex) -> SyncTrackTime {
        let options = settings.options;
        let source_time = self.pose_state(source_node_index).current_time;
        let source_sync_time = self.sync_track(source_node_index).get_time(source_time);

        let mut start = SyncTrackTime::default();
        if options.contains(TransitionOptions::SYNCHRONIZED) || options.contains(TransitionOptions::KEEP_SYNC_EVENT_INDEX) {
            start.event_index = source_sync_time.event_index;
        }
        if options.contains(TransitionOptions::SYNCHRONIZED)
            || options.contains(TransitionOptions::KEEP_SYNC_EVENT_PERCENTAGE)
        {
            start.percentage_through = source_sync_time.percentage_through;
        }

        let offset = if settings.sync_event_offset_override_node_index != INVALID_INDEX {
            self.float_value(settings.sync_event_offset_override_node_index)
        } else {
            settings.sync_event_offset
        };

        if offset != 0.0 {
            let whole = offset.floor();
            let mut event_index = start.event_index + whole as i32;
            let mut percentage = start.percentage_through.as_f32() + (offset - whole);
            if percentage >= 1.0 {
                percentage -= 1.0;
                event_index += 1;
            }
            start = SyncTrackTime::new(event_index, percentage);
        }

        start
    }

    fn mark_transitioning_out(&mut self, source_node_index: NodeIndex) {
        match self.settings(source_node_index) {
            NodeSettings::State(_) => self.set_state_phase(source_node_index, StateTransitionPhase::TransitioningOut),
            NodeSettings::Transition(settings) => {
                self.set_state_phase(settings.target_state_node_index, StateTransitionPhase::TransitioningOut);
            }
            _ => {}
        }
    }

    /// Begin blending from an active source node into the transition's target
    pub(crate) fn start_transition(&mut self, settings: &TransitionSettings, source_node_index: NodeIndex) {
        debug_assert!(self.is_active(source_node_index), "transition source must be active");

        let duration = self.transition_duration(settings, source_node_index);
        let start_time = self.target_start_time(settings, source_node_index);

        self.initialize(settings.node_index, start_time);
        self.initialize(settings.target_state_node_index, start_time);
        self.mark_transitioning_out(source_node_index);
        self.set_state_phase(settings.target_state_node_index, StateTransitionPhase::TransitioningIn);

        let time = self.pose_state(settings.target_state_node_index);
        *self.transition_node_mut(settings.node_index) = TransitionNode {
            time,
            source_node_index,
            duration,
            progress: 0.0,
            blend_weight: 0.0,
        };
    }

    /// Release a completed transition, keeping its target alive
    ///
    /// Returns the target state node, which becomes the active node.
    pub(crate) fn finish_transition(&mut self, settings: &TransitionSettings) -> NodeIndex {
        let source_node_index = self.transition_node_mut(settings.node_index).source_node_index;
        self.shutdown(source_node_index);

        let node = self.node_mut(settings.node_index);
        assert_eq!(node.initialization_count, 1, "completed transition is shared");
        node.initialization_count = 0;
        self.transition_node_mut(settings.node_index).source_node_index = INVALID_INDEX;

        self.set_state_phase(settings.target_state_node_index, StateTransitionPhase::Active);
        settings.target_state_node_index
    }

    pub(super) fn shutdown_transition(&mut self, settings: &TransitionSettings) {
        let source_node_index = self.transition_node_mut(settings.node_index).source_node_index;
        if source_node_index != INVALID_INDEX {
            self.shutdown(source_node_index);
        }
        self.shutdown(settings.target_state_node_index);
        self.transition_node_mut(settings.node_index).source_node_index = INVALID_INDEX;
    }

    pub(super) fn update_transition(
        &mut self,
        settings: &TransitionSettings,
        range: Option<&SyncTrackTimeRange>,
    ) -> GraphPoseNodeResult {
        let source_node_index = self.transition_node_mut(settings.node_index).source_node_index;
        let target_node_index = settings.target_state_node_index;

        let (source, target) = match range {
            Some(range) => (
                self.update_pose(source_node_index, Some(range)),
                self.update_pose(target_node_index, Some(range)),
            ),
            None if settings.options.contains(TransitionOptions::SYNCHRONIZED) => {
                let source = self.update_pose(source_node_index, None);
                let source_range = self.sync_range(source_node_index);
                (source, self.update_pose(target_node_index, Some(&source_range)))
            }
            None => (
                self.update_pose(source_node_index, None),
                self.update_pose(target_node_index, None),
            ),
        };

        let delta_time = self.context.delta_time;
        let target_time = self.pose_state(target_node_index);
        let node = self.transition_node_mut(settings.node_index);
        node.progress = if node.duration > 0.0 {
            (node.progress + delta_time / node.duration).min(1.0)
        } else {
            1.0
        };
        node.blend_weight = settings.blend_weight_easing.apply(node.progress);
        node.time = target_time;
        let blend_weight = node.blend_weight;

        let task_index = match (source.task_index, target.task_index) {
            (Some(source_task), Some(target_task)) => Some(self.context.task_system.register_task(
                settings.node_index,
                &[source_task, target_task],
                BlendTask { blend_weight },
            )),
            (source_task, target_task) => target_task.or(source_task),
        };

        let root_motion_delta = match settings.root_motion_blend {
            RootMotionBlendMode::Blend => source.root_motion_delta.lerp(&target.root_motion_delta, blend_weight),
            RootMotionBlendMode::IgnoreSource => target.root_motion_delta,
            RootMotionBlendMode::IgnoreTarget => source.root_motion_delta,
        };

        let events = &mut self.context.sampled_events_buffer;
        events.scale_weights(source.sampled_event_range, 1.0 - blend_weight);
        events.scale_weights(target.sampled_event_range, blend_weight);

        GraphPoseNodeResult {
            task_index,
            root_motion_delta,
            sampled_event_range: source.sampled_event_range.combine(&target.sampled_event_range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::nodes::create_node_instances;
    use crate::settings::{AnimationClipSettings, EasingType, GraphDefinition, StateSettings};
    use crate::string_id::StringId;
    use crate::transform::Transform;

    fn definition(options: TransitionOptions, root_motion_blend: RootMotionBlendMode) -> GraphDefinition {
        GraphDefinition {
            node_settings: vec![
                AnimationClipSettings {
                    node_index: 0,
                    clip_id: StringId::new("idle"),
                    duration: 1.0,
                    ..Default::default()
                }
                .into(),
                StateSettings {
                    node_index: 1,
                    child_node_index: 0,
                    ..Default::default()
                }
                .into(),
                AnimationClipSettings {
                    node_index: 2,
                    clip_id: StringId::new("run"),
                    duration: 1.0,
                    root_motion_velocity: [0.0, 0.0, 4.0],
                    ..Default::default()
                }
                .into(),
                StateSettings {
                    node_index: 3,
                    child_node_index: 2,
                    ..Default::default()
                }
                .into(),
                TransitionSettings {
                    node_index: 4,
                    target_state_node_index: 3,
                    blend_weight_easing: EasingType::Linear,
                    root_motion_blend,
                    duration: 0.2,
                    options,
                    ..Default::default()
                }
                .into(),
            ],
            node_ids: Vec::new(),
            root_node_index: 1,
            control_parameters: Vec::new(),
            external_graph_slots: Vec::new(),
        }
    }

    fn transition_settings(definition: &GraphDefinition) -> &TransitionSettings {
        match definition.typed_settings::<TransitionSettings>(4) {
            Some(settings) => settings,
            None => panic!("missing transition"),
        }
    }

    #[test]
    fn test_transition_blends_and_completes() {
        let definition = definition(TransitionOptions::empty(), RootMotionBlendMode::Blend);
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 0.1;

        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        evaluator.initialize(1, SyncTrackTime::default());
        evaluator.start_transition(transition_settings(&definition), 1);
        assert!(evaluator.is_active(3));

        let result = evaluator.update_pose(4, None);
        assert!((evaluator.transition_blend_weight(4) - 0.5).abs() < 1e-5);
        assert!(!evaluator.is_transition_complete(4));
        let blend = result.task_index.and_then(|i| evaluator.context.task_system.task::<BlendTask>(i));
        assert!(blend.is_some_and(|t| (t.blend_weight - 0.5).abs() < 1e-5));
        assert!((result.root_motion_delta.translation[2] - 0.2).abs() < 1e-5);

        evaluator.update_pose(4, None);
        assert!(evaluator.is_transition_complete(4));

        let active = evaluator.finish_transition(transition_settings(&definition));
        assert_eq!(active, 3);
        assert!(!evaluator.is_active(1));
        assert!(!evaluator.is_active(4));
        assert!(evaluator.is_active(3));
    }

    #[test]
    fn test_ignore_source_root_motion() {
        let definition = definition(TransitionOptions::CLAMP_DURATION, RootMotionBlendMode::IgnoreSource);
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 0.1;

        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        evaluator.initialize(1, SyncTrackTime::default());
        evaluator.start_transition(transition_settings(&definition), 1);
        let result = evaluator.update_pose(4, None);

        let expected = Transform::from_translation([0.0, 0.0, 0.4]);
        assert!((result.root_motion_delta.translation[2] - expected.translation[2]).abs() < 1e-5);
    }
}
