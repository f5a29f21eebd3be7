// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transition conditions that inspect their source state.

use super::NodeEvaluator;
use crate::settings::{StateCompletedConditionSettings, TimeComparisonType, TimeConditionSettings, INVALID_INDEX};

impl NodeEvaluator<'_> {
    /// True once the source state is close enough to its end for the guarded
    /// transition to finish exactly as the state does
    pub(super) fn evaluate_state_completed(&mut self, settings: &StateCompletedConditionSettings) -> bool {
        if !self.is_active(settings.source_state_node_index) {
            return false;
        }

        let transition_duration = if settings.duration_override_node_index != INVALID_INDEX {
            self.float_value(settings.duration_override_node_index)
        } else {
            settings.transition_duration
        };

        let source = self.pose_state(settings.source_state_node_index);
        if source.duration <= 0.0 {
            return true;
        }

        source.current_time.as_f32() >= 1.0 - transition_duration / source.duration
    }

    pub(super) fn evaluate_time_condition(&mut self, settings: &TimeConditionSettings) -> bool {
        if !self.is_active(settings.source_state_node_index) {
            return false;
        }

        let source = self.pose_state(settings.source_state_node_index);
        let value = match settings.comparison_type {
            TimeComparisonType::PercentageThroughState => source.current_time.as_f32(),
            TimeComparisonType::PercentageThroughSyncEvent => self
                .sync_track(settings.source_state_node_index)
                .get_time(source.current_time)
                .percentage_through
                .as_f32(),
            TimeComparisonType::LoopCount => source.loop_count as f32,
            TimeComparisonType::ElapsedTime => self.state_elapsed_time(settings.source_state_node_index),
        };

        let comparand = if settings.input_value_node_index != INVALID_INDEX {
            self.float_value(settings.input_value_node_index)
        } else {
            settings.comparand
        };

        settings.operator.compare(value, comparand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::nodes::create_node_instances;
    use crate::settings::{AnimationClipSettings, ComparisonOperator, GraphDefinition, StateSettings};
    use crate::string_id::StringId;
    use crate::time::SyncTrackTime;

    fn definition() -> GraphDefinition {
        GraphDefinition {
            node_settings: vec![
                AnimationClipSettings {
                    node_index: 0,
                    clip_id: StringId::new("jump"),
                    duration: 1.0,
                    looping: false,
                    ..Default::default()
                }
                .into(),
                StateSettings {
                    node_index: 1,
                    child_node_index: 0,
                    ..Default::default()
                }
                .into(),
                StateCompletedConditionSettings {
                    node_index: 2,
                    source_state_node_index: 1,
                    duration_override_node_index: INVALID_INDEX,
                    transition_duration: 0.25,
                }
                .into(),
                TimeConditionSettings {
                    node_index: 3,
                    source_state_node_index: 1,
                    input_value_node_index: INVALID_INDEX,
                    comparand: 0.5,
                    comparison_type: TimeComparisonType::ElapsedTime,
                    operator: ComparisonOperator::GreaterThanEqual,
                }
                .into(),
            ],
            node_ids: Vec::new(),
            root_node_index: 1,
            control_parameters: Vec::new(),
            external_graph_slots: Vec::new(),
        }
    }

    #[test]
    fn test_state_completed_threshold() {
        let definition = definition();
        let mut nodes = create_node_instances(&definition);
        let mut context = GraphContext::new(false);
        context.delta_time = 0.5;

        let mut evaluator = NodeEvaluator::new(&definition, &mut nodes, &mut context);
        assert!(!evaluator.bool_value(2), "inactive source never completes");

        evaluator.initialize(1, SyncTrackTime::default());
        evaluator.context.update_id = 1;
        evaluator.update_pose(1, None);
        assert!(!evaluator.bool_value(2));
        assert!(evaluator.bool_value(3));

        evaluator.context.update_id = 2;
        evaluator.update_pose(1, None);
        assert!(evaluator.bool_value(2));
    }
}
