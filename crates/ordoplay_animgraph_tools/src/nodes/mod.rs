// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node compilers.
//!
//! Each compiler takes the graph a node lives in (to resolve its inputs) and
//! returns the node's index in the settings table.

mod conditions;
mod pose;
mod state;
mod state_machine;
mod transition;
mod values;

pub use state_machine::remaining_global_transitions;

use crate::compilation::{CompilationError, GraphCompilationContext, NodeCompilationState};
use crate::graph::Graph;
use crate::node::{Node, ToolsNodeKind};
use ordoplay_animgraph_runtime::{CompiledSettings, GraphValueType, NodeIndex, INVALID_INDEX};
use tracing::debug;

/// Compile any value or pose node
pub fn compile_node(ctx: &mut GraphCompilationContext, graph: &Graph, node: &Node) -> Result<NodeIndex, CompilationError> {
    match &node.kind {
        ToolsNodeKind::ControlParameterBool { name, default_value } => {
            values::compile_control_parameter_bool(ctx, node, name, *default_value)
        }
        ToolsNodeKind::ControlParameterFloat { name, default_value } => {
            values::compile_control_parameter_float(ctx, node, name, *default_value)
        }
        ToolsNodeKind::ConstBool { value } => values::compile_const_bool(ctx, node, *value),
        ToolsNodeKind::ConstFloat { value } => values::compile_const_float(ctx, node, *value),
        ToolsNodeKind::FloatComparison { operator, comparand } => {
            values::compile_float_comparison(ctx, graph, node, *operator, *comparand)
        }
        ToolsNodeKind::And => values::compile_and(ctx, graph, node),
        ToolsNodeKind::Or => values::compile_or(ctx, graph, node),
        ToolsNodeKind::Not => values::compile_not(ctx, graph, node),
        ToolsNodeKind::BoneMask { weight } => values::compile_bone_mask(ctx, node, *weight),
        ToolsNodeKind::AnimationClip(clip) => pose::compile_animation_clip(ctx, node, clip),
        ToolsNodeKind::ExternalGraph { slot_id } => pose::compile_external_graph(ctx, node, slot_id),
        ToolsNodeKind::StateMachine => state_machine::compile_state_machine(ctx, node),
        ToolsNodeKind::StateCompletedCondition => conditions::compile_state_completed(ctx, node),
        ToolsNodeKind::TimeCondition {
            comparand,
            comparison_type,
            operator,
        } => conditions::compile_time_condition(ctx, graph, node, *comparand, *comparison_type, *operator),
        _ => Err(CompilationError::UnsupportedNode {
            node: node.id,
            tag: node.tag(),
        }),
    }
}

/// Compile a node that must produce a given type of value
pub fn compile_node_of_type(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
    expected: GraphValueType,
) -> Result<NodeIndex, CompilationError> {
    expect_value_type(node, expected)?;
    compile_node(ctx, graph, node)
}

pub(crate) fn expect_value_type(node: &Node, expected: GraphValueType) -> Result<(), CompilationError> {
    let found = node.value_type();
    if found != expected {
        return Err(CompilationError::ValueTypeMismatch {
            node: node.id,
            expected,
            found,
        });
    }
    Ok(())
}

/// Compile whatever feeds an optional input, [`INVALID_INDEX`] when unconnected
pub(crate) fn compile_input(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
    input_index: usize,
    expected: GraphValueType,
) -> Result<NodeIndex, CompilationError> {
    match graph.connected_input_node(node.id, input_index) {
        Some(source) => compile_node_of_type(ctx, graph, source, expected),
        None => Ok(INVALID_INDEX),
    }
}

/// Compile whatever feeds a required input
pub(crate) fn compile_required_input(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
    input_index: usize,
    expected: GraphValueType,
) -> Result<NodeIndex, CompilationError> {
    let source = graph
        .connected_input_node(node.id, input_index)
        .ok_or(CompilationError::MissingInput {
            node: node.id,
            input_index,
        })?;
    compile_node_of_type(ctx, graph, source, expected)
}

/// Allocate a settings slot for `node` and fill it with `populate`
///
/// A node that was compiled before returns its existing index without
/// calling `populate`.
pub(crate) fn compile_with<T: CompiledSettings>(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    populate: impl FnOnce(&mut GraphCompilationContext, T) -> Result<T, CompilationError>,
) -> Result<NodeIndex, CompilationError> {
    let index = match ctx.get_settings::<T>(node) {
        NodeCompilationState::NeedCompilation(index) => index,
        NodeCompilationState::AlreadyCompiled(index) => return Ok(index),
        NodeCompilationState::Error => return Err(ctx.settings_error::<T>(node)),
    };

    let settings = populate(ctx, T::with_node_index(index))?;
    ctx.set_settings(settings);
    debug!(node = ?node.id, name = %node.name, kind = T::KIND, index, "Compiled node");
    Ok(index)
}
