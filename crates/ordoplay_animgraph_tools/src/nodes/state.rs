// SPDX-License-Identifier: MIT OR Apache-2.0
//! State body compiler.

use super::{compile_input, compile_node_of_type, compile_with};
use crate::compilation::{single_result_node, CompilationError, GraphCompilationContext, LogSeverity};
use crate::graph::{SearchMode, SearchTypeMatch};
use crate::node::{Node, NodeTypeTag, StateDescriptor, StateType};
use ordoplay_animgraph_runtime::settings::StateSettings;
use ordoplay_animgraph_runtime::{GraphValueType, NodeIndex};

pub(super) fn compile_state(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    state: &StateDescriptor,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<StateSettings>(ctx, node, |ctx, mut settings| {
        settings.entry_events = state.entry_events.clone();
        settings.execute_events = state.execute_events.clone();
        settings.exit_events = state.exit_events.clone();

        if state.state_type == StateType::Off {
            settings.is_off_state = true;
            return Ok(settings);
        }

        // Blend tree
        let blend_tree = node.child_graph().ok_or(CompilationError::MissingChildGraph(node.id))?;
        let result = single_result_node(blend_tree)?;
        match blend_tree.connected_input_node(result.id, 0) {
            Some(child) => {
                settings.child_node_index = compile_node_of_type(ctx, blend_tree, child, GraphValueType::Pose)?;
            }
            None => ctx.log_message(
                LogSeverity::Warning,
                Some(node.id),
                format!("State '{}' has an empty blend tree", node.name),
            ),
        }

        // Layer data
        let value_tree = node
            .secondary_graph()
            .ok_or(CompilationError::MissingChildGraph(node.id))?;
        let layer_data = value_tree
            .find_all_nodes_of_type(NodeTypeTag::LayerData, SearchMode::Localized, SearchTypeMatch::Exact)
            .first()
            .copied()
            .ok_or(CompilationError::MissingLayerDataNode(node.id))?;
        settings.layer_weight_node_index = compile_input(ctx, value_tree, layer_data, 0, GraphValueType::Float)?;
        settings.layer_bone_mask_node_index =
            compile_input(ctx, value_tree, layer_data, 1, GraphValueType::BoneMask)?;

        settings.timed_remaining_events = state.time_remaining_events.clone();
        settings.timed_elapsed_events = state.time_elapsed_events.clone();
        Ok(settings)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ClipDescriptor, ToolsNodeKind};
    use ordoplay_animgraph_runtime::settings::TimedEvent;
    use ordoplay_animgraph_runtime::{StringId, INVALID_INDEX};

    fn state_node(state: StateDescriptor) -> Node {
        Node::new(ToolsNodeKind::State(state)).with_name("State")
    }

    #[test]
    fn test_off_state_skips_blend_tree() {
        let mut descriptor = StateDescriptor::of_type(StateType::Off);
        descriptor.exit_events.push("Leaving".into());
        descriptor.time_elapsed_events.push(TimedEvent {
            id: "Late".into(),
            time_value: 1.0,
        });
        let node = state_node(descriptor.clone());

        let mut ctx = GraphCompilationContext::new();
        let index = compile_state(&mut ctx, &node, &descriptor).unwrap();
        let settings = ctx.settings::<StateSettings>(index).unwrap();
        assert!(settings.is_off_state);
        assert_eq!(settings.child_node_index, INVALID_INDEX);
        assert_eq!(settings.exit_events, vec![StringId::from("Leaving")]);
        assert!(settings.timed_elapsed_events.is_empty());
        assert_eq!(ctx.num_compiled_nodes(), 1);
    }

    #[test]
    fn test_blend_tree_and_layer_data() {
        let descriptor = StateDescriptor::default();
        let mut node = state_node(descriptor.clone());

        let blend_tree = node.child_graph_mut().unwrap();
        let result = blend_tree.nodes().next().map(|n| n.id).unwrap();
        blend_tree
            .create_input_node(ToolsNodeKind::AnimationClip(ClipDescriptor::new("run", 1.0)), result, 0)
            .unwrap();

        let value_tree = node.secondary_graph_mut().unwrap();
        let layer_data = value_tree.nodes().next().map(|n| n.id).unwrap();
        value_tree
            .create_input_node(ToolsNodeKind::ConstFloat { value: 0.5 }, layer_data, 0)
            .unwrap();

        let mut ctx = GraphCompilationContext::new();
        let index = compile_state(&mut ctx, &node, &descriptor).unwrap();
        let settings = ctx.settings::<StateSettings>(index).unwrap();
        assert!(!settings.is_off_state);
        assert_eq!(settings.child_node_index, 1);
        assert_eq!(settings.layer_weight_node_index, 2);
        assert_eq!(settings.layer_bone_mask_node_index, INVALID_INDEX);
    }

    #[test]
    fn test_empty_blend_tree_is_a_warning() {
        let descriptor = StateDescriptor::default();
        let node = state_node(descriptor.clone());

        let mut ctx = GraphCompilationContext::new();
        let index = compile_state(&mut ctx, &node, &descriptor).unwrap();
        assert_eq!(ctx.settings::<StateSettings>(index).unwrap().child_node_index, INVALID_INDEX);
        assert!(ctx.log().iter().any(|entry| entry.severity == LogSeverity::Warning));
    }
}
