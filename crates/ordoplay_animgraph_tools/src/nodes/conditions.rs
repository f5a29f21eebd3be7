// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transition condition compilers.
//!
//! These nodes read the state they guard from the enclosing conduit.

use super::{compile_input, compile_with};
use crate::compilation::{CompilationError, GraphCompilationContext};
use crate::graph::Graph;
use crate::node::Node;
use ordoplay_animgraph_runtime::settings::{
    ComparisonOperator, StateCompletedConditionSettings, TimeComparisonType, TimeConditionSettings,
};
use ordoplay_animgraph_runtime::{GraphValueType, NodeIndex};

pub(super) fn compile_state_completed(
    ctx: &mut GraphCompilationContext,
    node: &Node,
) -> Result<NodeIndex, CompilationError> {
    let source_state_node_index = ctx
        .conduit_source_state_node_index()
        .ok_or(CompilationError::NotInConduit(node.id))?;
    let (transition_duration, duration_override_node_index) = ctx
        .transition_conditions()
        .ok_or(CompilationError::NotInTransitionConditions(node.id))?;

    compile_with::<StateCompletedConditionSettings>(ctx, node, |_, mut settings| {
        settings.source_state_node_index = source_state_node_index;
        settings.duration_override_node_index = duration_override_node_index;
        settings.transition_duration = transition_duration;
        Ok(settings)
    })
}

pub(super) fn compile_time_condition(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
    comparand: f32,
    comparison_type: TimeComparisonType,
    operator: ComparisonOperator,
) -> Result<NodeIndex, CompilationError> {
    let source_state_node_index = ctx
        .conduit_source_state_node_index()
        .ok_or(CompilationError::NotInConduit(node.id))?;

    compile_with::<TimeConditionSettings>(ctx, node, |ctx, mut settings| {
        settings.source_state_node_index = source_state_node_index;
        settings.input_value_node_index = compile_input(ctx, graph, node, 0, GraphValueType::Float)?;
        settings.comparand = comparand;
        settings.comparison_type = comparison_type;
        settings.operator = operator;
        Ok(settings)
    })
}
