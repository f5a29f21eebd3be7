// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parameter, constant and logic node compilers.

use super::{compile_input, compile_node_of_type, compile_required_input, compile_with};
use crate::compilation::{CompilationError, GraphCompilationContext};
use crate::graph::Graph;
use crate::node::Node;
use ordoplay_animgraph_runtime::settings::{
    AndSettings, BoneMaskSettings, ComparisonOperator, ConstBoolSettings, ConstFloatSettings,
    ControlParameterBoolSettings, ControlParameterFloatSettings, FloatComparisonSettings, NotSettings, OrSettings,
};
use ordoplay_animgraph_runtime::{GraphValueType, NodeIndex, StringId};

/// Parameters are shared by name: every node with the same name compiles to one slot
fn existing_control_parameter(
    ctx: &GraphCompilationContext,
    name: &StringId,
    value_type: GraphValueType,
) -> Result<Option<NodeIndex>, CompilationError> {
    match ctx.control_parameter(name) {
        Some((index, existing)) if existing == value_type => Ok(Some(index)),
        Some((_, existing)) => Err(CompilationError::ControlParameterTypeMismatch {
            parameter: name.clone(),
            existing,
            requested: value_type,
        }),
        None => Ok(None),
    }
}

pub(super) fn compile_control_parameter_bool(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    name: &StringId,
    default_value: bool,
) -> Result<NodeIndex, CompilationError> {
    if let Some(index) = existing_control_parameter(ctx, name, GraphValueType::Bool)? {
        return Ok(index);
    }

    let index = compile_with::<ControlParameterBoolSettings>(ctx, node, |_, mut settings| {
        settings.parameter_id = name.clone();
        settings.default_value = default_value;
        Ok(settings)
    })?;
    ctx.register_control_parameter(name.clone(), index, GraphValueType::Bool);
    Ok(index)
}

pub(super) fn compile_control_parameter_float(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    name: &StringId,
    default_value: f32,
) -> Result<NodeIndex, CompilationError> {
    if let Some(index) = existing_control_parameter(ctx, name, GraphValueType::Float)? {
        return Ok(index);
    }

    let index = compile_with::<ControlParameterFloatSettings>(ctx, node, |_, mut settings| {
        settings.parameter_id = name.clone();
        settings.default_value = default_value;
        Ok(settings)
    })?;
    ctx.register_control_parameter(name.clone(), index, GraphValueType::Float);
    Ok(index)
}

pub(super) fn compile_const_bool(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    value: bool,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<ConstBoolSettings>(ctx, node, |_, mut settings| {
        settings.value = value;
        Ok(settings)
    })
}

pub(super) fn compile_const_float(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    value: f32,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<ConstFloatSettings>(ctx, node, |_, mut settings| {
        settings.value = value;
        Ok(settings)
    })
}

pub(super) fn compile_float_comparison(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
    operator: ComparisonOperator,
    comparand: f32,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<FloatComparisonSettings>(ctx, node, |ctx, mut settings| {
        settings.input_node_index = compile_required_input(ctx, graph, node, 0, GraphValueType::Float)?;
        settings.comparand_node_index = compile_input(ctx, graph, node, 1, GraphValueType::Float)?;
        settings.comparand = comparand;
        settings.operator = operator;
        Ok(settings)
    })
}

/// Every connected bool input, at least one is required
fn compile_conditions(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
) -> Result<Vec<NodeIndex>, CompilationError> {
    let mut indices = Vec::with_capacity(node.inputs.len());
    for input_index in 0..node.inputs.len() {
        if let Some(source) = graph.connected_input_node(node.id, input_index) {
            indices.push(compile_node_of_type(ctx, graph, source, GraphValueType::Bool)?);
        }
    }

    if indices.is_empty() {
        return Err(CompilationError::MissingInput {
            node: node.id,
            input_index: 0,
        });
    }
    Ok(indices)
}

pub(super) fn compile_and(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<AndSettings>(ctx, node, |ctx, mut settings| {
        settings.condition_node_indices = compile_conditions(ctx, graph, node)?;
        Ok(settings)
    })
}

pub(super) fn compile_or(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<OrSettings>(ctx, node, |ctx, mut settings| {
        settings.condition_node_indices = compile_conditions(ctx, graph, node)?;
        Ok(settings)
    })
}

pub(super) fn compile_not(
    ctx: &mut GraphCompilationContext,
    graph: &Graph,
    node: &Node,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<NotSettings>(ctx, node, |ctx, mut settings| {
        settings.input_node_index = compile_required_input(ctx, graph, node, 0, GraphValueType::Bool)?;
        Ok(settings)
    })
}

pub(super) fn compile_bone_mask(
    ctx: &mut GraphCompilationContext,
    node: &Node,
    weight: f32,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<BoneMaskSettings>(ctx, node, |_, mut settings| {
        settings.weight = weight;
        Ok(settings)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphType;
    use crate::node::ToolsNodeKind;
    use crate::nodes::compile_node;
    use ordoplay_animgraph_runtime::INVALID_INDEX;

    fn speed_parameter() -> ToolsNodeKind {
        ToolsNodeKind::ControlParameterFloat {
            name: "Speed".into(),
            default_value: 0.0,
        }
    }

    #[test]
    fn test_comparison_inputs() {
        let mut graph = Graph::new("Conditions", GraphType::ValueTree);
        let compare = graph
            .create_node(ToolsNodeKind::FloatComparison {
                operator: ComparisonOperator::GreaterThan,
                comparand: 0.5,
            })
            .unwrap();
        graph.create_input_node(speed_parameter(), compare, 0).unwrap();

        let mut ctx = GraphCompilationContext::new();
        let index = compile_node(&mut ctx, &graph, graph.node(compare).unwrap()).unwrap();

        let settings = ctx.settings::<FloatComparisonSettings>(index).unwrap();
        assert_eq!(settings.input_node_index, 1);
        assert_eq!(settings.comparand_node_index, INVALID_INDEX);
        assert_eq!(settings.comparand, 0.5);
    }

    #[test]
    fn test_parameters_shared_by_name() {
        let mut graph = Graph::new("Conditions", GraphType::ValueTree);
        let a = graph.create_node(speed_parameter()).unwrap();
        let b = graph.create_node(speed_parameter()).unwrap();
        let c = graph
            .create_node(ToolsNodeKind::ControlParameterBool {
                name: "Speed".into(),
                default_value: false,
            })
            .unwrap();

        let mut ctx = GraphCompilationContext::new();
        let first = compile_node(&mut ctx, &graph, graph.node(a).unwrap()).unwrap();
        let second = compile_node(&mut ctx, &graph, graph.node(b).unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.num_compiled_nodes(), 1);

        assert!(matches!(
            compile_node(&mut ctx, &graph, graph.node(c).unwrap()),
            Err(CompilationError::ControlParameterTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_logic_requires_inputs() {
        let mut graph = Graph::new("Conditions", GraphType::ValueTree);
        let not = graph.create_node(ToolsNodeKind::Not).unwrap();
        let and = graph.create_node(ToolsNodeKind::And).unwrap();

        let mut ctx = GraphCompilationContext::new();
        assert_eq!(
            compile_node(&mut ctx, &graph, graph.node(not).unwrap()),
            Err(CompilationError::MissingInput { node: not, input_index: 0 })
        );

        graph.create_input_node(ToolsNodeKind::ConstBool { value: true }, and, 1).unwrap();
        let mut ctx = GraphCompilationContext::new();
        let index = compile_node(&mut ctx, &graph, graph.node(and).unwrap()).unwrap();
        assert_eq!(ctx.settings::<AndSettings>(index).unwrap().condition_node_indices, vec![1]);
    }
}
