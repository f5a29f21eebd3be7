// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nested graphs owned by authoring nodes.

pub mod state_machine;

use crate::connection::PinRef;
use crate::graph::{Graph, GraphType};
use crate::node::{Node, StateType, ToolsNodeKind};
use ordoplay_animgraph_runtime::GraphValueType;

/// Create the child and secondary graphs a freshly built node owns
pub(crate) fn build_nested_graphs(node: &mut Node) {
    match &node.kind {
        ToolsNodeKind::State(state) => {
            let mut blend_tree = Graph::new("Blend Tree", GraphType::BlendTree);
            let result = blend_tree.insert_node(Node::new(ToolsNodeKind::Result {
                value_type: GraphValueType::Pose,
            }));

            if state.state_type == StateType::StateMachine {
                let state_machine = Node::new(ToolsNodeKind::StateMachine);
                let pose_pin = state_machine.outputs[0].id;
                let state_machine = blend_tree.insert_node(state_machine);
                if let Some(result_pin) = blend_tree.node(result).map(|n| n.inputs[0].id) {
                    blend_tree.link(PinRef::new(state_machine, pose_pin), PinRef::new(result, result_pin));
                }
            }

            let mut value_tree = Graph::new("Layer Data", GraphType::ValueTree);
            value_tree.insert_node(Node::new(ToolsNodeKind::LayerData));

            node.child_graph = Some(Box::new(blend_tree));
            node.secondary_graph = Some(Box::new(value_tree));
        }
        ToolsNodeKind::StateMachine => {
            node.child_graph = Some(Box::new(state_machine::new_state_machine_graph()));
        }
        ToolsNodeKind::EntryStateOverrideConduit => {
            let mut value_tree = Graph::new("Entry Conditions", GraphType::ValueTree);
            value_tree.insert_node(Node::new(ToolsNodeKind::EntryStateOverrideConditions { state_ids: Vec::new() }));
            node.secondary_graph = Some(Box::new(value_tree));
        }
        ToolsNodeKind::GlobalTransitionConduit | ToolsNodeKind::TransitionConduit { .. } => {
            node.secondary_graph = Some(Box::new(Graph::new("Transitions", GraphType::TransitionTree)));
        }
        _ => {}
    }
}
