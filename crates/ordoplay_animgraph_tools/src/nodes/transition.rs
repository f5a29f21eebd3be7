// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transition compiler.

use super::{compile_input, compile_node, compile_with, expect_value_type};
use crate::compilation::{CompilationError, GraphCompilationContext, LogSeverity};
use crate::graph::Graph;
use crate::node::{Node, ToolsNodeKind, TransitionDescriptor};
use ordoplay_animgraph_runtime::settings::{StateMachineTransitionSettings, TransitionSettings};
use ordoplay_animgraph_runtime::{GraphValueType, NodeIndex, StateIndex};

/// State a transition leads to
#[derive(Debug, Clone, Copy)]
pub(super) struct TransitionTarget {
    pub state_index: StateIndex,
    pub state_node_index: NodeIndex,
}

fn descriptor(node: &Node) -> Result<&TransitionDescriptor, CompilationError> {
    match &node.kind {
        ToolsNodeKind::Transition(transition) | ToolsNodeKind::GlobalTransition { transition, .. } => Ok(transition),
        _ => Err(CompilationError::UnsupportedNode {
            node: node.id,
            tag: node.tag(),
        }),
    }
}

/// Compile a transition node; the same node always yields the same index
pub(super) fn compile_transition(
    ctx: &mut GraphCompilationContext,
    tree: &Graph,
    node: &Node,
    target_state_node_index: NodeIndex,
) -> Result<NodeIndex, CompilationError> {
    let transition = descriptor(node)?;
    compile_with::<TransitionSettings>(ctx, node, |ctx, mut settings| {
        settings.duration_override_node_index = compile_input(ctx, tree, node, 1, GraphValueType::Float)?;
        settings.sync_event_offset_override_node_index = compile_input(ctx, tree, node, 2, GraphValueType::Float)?;
        settings.target_state_node_index = target_state_node_index;
        settings.blend_weight_easing = transition.blend_weight_easing;
        settings.root_motion_blend = transition.root_motion_blend;
        settings.duration = transition.duration;
        settings.sync_event_offset = transition.sync_event_offset;
        settings.options = transition.options();
        Ok(settings)
    })
}

/// Compile a transition and its condition tree
///
/// Transitions without a connected condition can never fire and are skipped.
pub(super) fn try_compile_transition(
    ctx: &mut GraphCompilationContext,
    tree: &Graph,
    node: &Node,
    target: TransitionTarget,
) -> Result<Option<StateMachineTransitionSettings>, CompilationError> {
    let Some(condition) = tree.connected_input_node(node.id, 0) else {
        ctx.log_message(
            LogSeverity::Warning,
            Some(node.id),
            format!("Transition '{}' has no condition and is ignored", node.name),
        );
        return Ok(None);
    };
    expect_value_type(condition, GraphValueType::Bool)?;

    let transition_node_index = compile_transition(ctx, tree, node, target.state_node_index)?;
    let (duration, duration_override_node_index) = ctx
        .settings::<TransitionSettings>(transition_node_index)
        .map(|s| (s.duration, s.duration_override_node_index))
        .ok_or(CompilationError::SettingsTypeMismatch {
            node: node.id,
            expected: "Transition",
        })?;

    let condition_node_index = ctx.with_transition_conditions(duration, duration_override_node_index, |ctx| {
        compile_node(ctx, tree, condition)
    })?;

    Ok(Some(StateMachineTransitionSettings {
        target_state_index: target.state_index,
        transition_node_index,
        condition_node_index,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PinRef;
    use crate::graph::GraphType;
    use ordoplay_animgraph_runtime::settings::{EasingType, TransitionOptions};
    use ordoplay_animgraph_runtime::INVALID_INDEX;

    const TARGET: TransitionTarget = TransitionTarget {
        state_index: 1,
        state_node_index: 4,
    };

    fn tree_with_transition(transition: TransitionDescriptor) -> (Graph, Node) {
        let mut tree = Graph::new("Transitions", GraphType::TransitionTree);
        let id = tree.create_node(ToolsNodeKind::Transition(transition)).unwrap();
        let node = tree.node(id).unwrap().clone();
        (tree, node)
    }

    #[test]
    fn test_unconnected_condition_emits_nothing() {
        let (tree, node) = tree_with_transition(TransitionDescriptor::default());
        let mut ctx = GraphCompilationContext::new();
        assert_eq!(try_compile_transition(&mut ctx, &tree, &node, TARGET), Ok(None));
        assert_eq!(ctx.num_compiled_nodes(), 0);
    }

    #[test]
    fn test_transition_parameters() {
        let (mut tree, node) = tree_with_transition(TransitionDescriptor {
            blend_weight_easing: EasingType::InOutCubic,
            duration: 0.4,
            clamp_duration_to_source: true,
            ..Default::default()
        });
        tree.create_input_node(ToolsNodeKind::ConstBool { value: true }, node.id, 0)
            .unwrap();
        tree.create_input_node(ToolsNodeKind::ConstFloat { value: 0.1 }, node.id, 1)
            .unwrap();

        let mut ctx = GraphCompilationContext::new();
        let compiled = try_compile_transition(&mut ctx, &tree, &node, TARGET).unwrap().unwrap();
        assert_eq!(compiled.target_state_index, 1);

        let settings = ctx.settings::<TransitionSettings>(compiled.transition_node_index).unwrap();
        assert_eq!(settings.target_state_node_index, 4);
        assert_eq!(settings.duration, 0.4);
        assert_eq!(settings.blend_weight_easing, EasingType::InOutCubic);
        assert_eq!(settings.options, TransitionOptions::CLAMP_DURATION);
        assert_ne!(settings.duration_override_node_index, INVALID_INDEX);
        assert_eq!(settings.sync_event_offset_override_node_index, INVALID_INDEX);

        // Memoized
        let again = compile_transition(&mut ctx, &tree, &node, 9).unwrap();
        assert_eq!(again, compiled.transition_node_index);
    }

    #[test]
    fn test_condition_must_be_bool() {
        let (mut tree, node) = tree_with_transition(TransitionDescriptor::default());
        let condition = tree.create_node(ToolsNodeKind::ConstFloat { value: 1.0 }).unwrap();
        let condition_pin = tree.node(condition).unwrap().outputs[0].id;
        tree.link(PinRef::new(condition, condition_pin), PinRef::new(node.id, node.inputs[0].id));

        let mut ctx = GraphCompilationContext::new();
        assert!(matches!(
            try_compile_transition(&mut ctx, &tree, &node, TARGET),
            Err(CompilationError::ValueTypeMismatch { .. })
        ));
    }
}
