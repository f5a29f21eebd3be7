// SPDX-License-Identifier: MIT OR Apache-2.0
//! State machine editing: states, conduits and the fixed entry and global conduits.

use crate::graph::{Graph, GraphError, GraphType, SearchMode, SearchTypeMatch};
use crate::node::{Node, NodeId, NodeTypeTag, StateDescriptor, StateType, ToolsNodeKind, TransitionDescriptor};
use crate::pin::{Pin, PinId};
use ordoplay_animgraph_runtime::GraphValueType;

/// A state machine graph with its fixed conduits and one default state
pub(crate) fn new_state_machine_graph() -> Graph {
    let mut graph = Graph::new("State Machine", GraphType::StateMachine);
    graph.insert_node(Node::new(ToolsNodeKind::EntryStateOverrideConduit));
    graph.insert_node(Node::new(ToolsNodeKind::GlobalTransitionConduit));
    let state = graph.insert_node(Node::new(ToolsNodeKind::State(StateDescriptor::default())));
    graph.default_entry_state = Some(state);
    graph.update_conduits();
    graph
}

impl Graph {
    /// Add a state, the first state added becomes the default entry state
    pub fn add_state(&mut self, name: impl Into<String>, state_type: StateType) -> Result<NodeId, GraphError> {
        let node = Node::new(ToolsNodeKind::State(StateDescriptor::of_type(state_type))).with_name(name);
        let id = self.add_node(node)?;
        if self.default_entry_state.is_none() {
            self.default_entry_state = Some(id);
        }
        self.update_conduits();
        Ok(id)
    }

    /// Remove a state together with every conduit touching it
    pub fn destroy_state(&mut self, state_id: NodeId) -> Option<Node> {
        let conduits: Vec<NodeId> = self
            .nodes()
            .filter(|n| match n.kind {
                ToolsNodeKind::TransitionConduit { start_state, end_state } => {
                    start_state == state_id || end_state == state_id
                }
                _ => false,
            })
            .map(|n| n.id)
            .collect();
        for conduit in conduits {
            self.destroy_node(conduit);
        }

        let removed = self.destroy_node(state_id)?;
        if self.default_entry_state.is_none() {
            self.default_entry_state = self.states().first().map(|n| n.id);
        }
        self.update_conduits();
        Some(removed)
    }

    /// States in declaration order
    pub fn states(&self) -> Vec<&Node> {
        self.find_all_nodes_of_type(NodeTypeTag::State, SearchMode::Localized, SearchTypeMatch::Derived)
    }

    /// Add a conduit between two states, holding one default transition
    pub fn add_conduit(&mut self, start_state: NodeId, end_state: NodeId) -> Result<NodeId, GraphError> {
        let mut names = Vec::with_capacity(2);
        for id in [start_state, end_state] {
            let node = self.node(id).ok_or(GraphError::NodeNotFound(id))?;
            if node.tag() != NodeTypeTag::State {
                return Err(GraphError::NotAState(id));
            }
            names.push(node.name.clone());
        }

        if start_state == end_state {
            return Err(GraphError::SelfLoop);
        }
        if self.conduit(start_state, end_state).is_some() {
            return Err(GraphError::ConduitExists {
                start: start_state,
                end: end_state,
            });
        }

        let mut conduit = Node::new(ToolsNodeKind::TransitionConduit { start_state, end_state })
            .with_name(format!("{} -> {}", names[0], names[1]));
        if let Some(transitions) = conduit.secondary_graph_mut() {
            transitions.insert_node(Node::new(ToolsNodeKind::Transition(TransitionDescriptor::default())));
        }
        self.add_node(conduit)
    }

    /// Conduit linking two states
    pub fn conduit(&self, start_state: NodeId, end_state: NodeId) -> Option<&Node> {
        self.nodes().find(|n| {
            matches!(n.kind, ToolsNodeKind::TransitionConduit { start_state: s, end_state: e } if s == start_state && e == end_state)
        })
    }

    /// Transition tree of a conduit
    pub fn transition_tree_mut(&mut self, conduit_id: NodeId) -> Option<&mut Graph> {
        self.node_mut(conduit_id)
            .filter(|n| n.tag().is_a(NodeTypeTag::Conduit))
            .and_then(Node::secondary_graph_mut)
    }

    /// First transition node inside a conduit
    pub fn conduit_transition(&self, conduit_id: NodeId) -> Option<NodeId> {
        let tree = self.node(conduit_id)?.secondary_graph()?;
        tree.nodes().find(|n| n.tag() == NodeTypeTag::Transition).map(|n| n.id)
    }

    /// Value tree of the entry state override conduit
    pub fn entry_conditions_graph_mut(&mut self) -> Option<&mut Graph> {
        self.nodes_mut()
            .find(|n| n.tag() == NodeTypeTag::EntryStateOverrideConduit)
            .and_then(Node::secondary_graph_mut)
    }

    /// Transition tree of the global transition conduit
    pub fn global_transitions_graph_mut(&mut self) -> Option<&mut Graph> {
        self.nodes_mut()
            .find(|n| n.tag() == NodeTypeTag::GlobalTransitionConduit)
            .and_then(Node::secondary_graph_mut)
    }

    /// Global transition node targeting a state
    pub fn global_transition(&self, state_id: NodeId) -> Option<NodeId> {
        let conduit = self.nodes().find(|n| n.tag() == NodeTypeTag::GlobalTransitionConduit)?;
        conduit
            .secondary_graph()?
            .nodes()
            .find(|n| matches!(n.kind, ToolsNodeKind::GlobalTransition { end_state, .. } if end_state == state_id))
            .map(|n| n.id)
    }

    /// Create a bool node driving the entry condition of a state
    pub fn set_entry_condition(&mut self, state_id: NodeId, kind: ToolsNodeKind) -> Result<NodeId, GraphError> {
        let conditions = self
            .entry_conditions_graph_mut()
            .ok_or(GraphError::MissingConduit(NodeTypeTag::EntryStateOverrideConduit))?;

        let (node_id, pin_index) = conditions
            .nodes()
            .find_map(|n| match &n.kind {
                ToolsNodeKind::EntryStateOverrideConditions { state_ids } => {
                    Some((n.id, state_ids.iter().position(|id| *id == state_id)))
                }
                _ => None,
            })
            .ok_or(GraphError::MissingConduit(NodeTypeTag::EntryStateOverrideConditions))?;
        let pin_index = pin_index.ok_or(GraphError::NotAState(state_id))?;

        conditions.create_input_node(kind, node_id, pin_index)
    }

    /// Bring the entry and global conduits in line with the current states
    pub fn update_conduits(&mut self) {
        let states: Vec<(NodeId, String)> = self.states().iter().map(|n| (n.id, n.name.clone())).collect();

        if let Some(conditions) = self.entry_conditions_graph_mut() {
            update_entry_conditions(conditions, &states);
        }

        if let Some(globals) = self.global_transitions_graph_mut() {
            let stale: Vec<NodeId> = globals
                .nodes()
                .filter(|n| match n.kind {
                    ToolsNodeKind::GlobalTransition { end_state, .. } => !states.iter().any(|(id, _)| *id == end_state),
                    _ => false,
                })
                .map(|n| n.id)
                .collect();
            for id in stale {
                globals.destroy_node(id);
            }

            for (state_id, name) in &states {
                let existing = globals.nodes_mut().find(
                    |n| matches!(n.kind, ToolsNodeKind::GlobalTransition { end_state, .. } if end_state == *state_id),
                );
                match existing {
                    Some(node) => node.name.clone_from(name),
                    None => {
                        globals.insert_node(
                            Node::new(ToolsNodeKind::GlobalTransition {
                                end_state: *state_id,
                                transition: TransitionDescriptor::default(),
                            })
                            .with_name(name.clone()),
                        );
                    }
                }
            }
        }
    }
}

/// One bool pin per state; pins of surviving states keep their ID and connection
fn update_entry_conditions(conditions: &mut Graph, states: &[(NodeId, String)]) {
    let Some(node_id) = conditions
        .nodes()
        .find(|n| n.tag() == NodeTypeTag::EntryStateOverrideConditions)
        .map(|n| n.id)
    else {
        return;
    };

    let previous: Vec<(NodeId, Pin)> = match conditions.node(node_id) {
        Some(Node {
            kind: ToolsNodeKind::EntryStateOverrideConditions { state_ids },
            inputs,
            ..
        }) => state_ids.iter().copied().zip(inputs.iter().cloned()).collect(),
        _ => Vec::new(),
    };

    let stale: Vec<PinId> = previous
        .iter()
        .filter(|(state_id, _)| !states.iter().any(|(id, _)| id == state_id))
        .map(|(_, pin)| pin.id)
        .collect();
    for pin in stale {
        conditions.disconnect_pin(pin);
    }

    if let Some(node) = conditions.node_mut(node_id) {
        node.inputs = states
            .iter()
            .map(|(state_id, name)| {
                let mut pin = previous
                    .iter()
                    .find(|(id, _)| id == state_id)
                    .map_or_else(|| Pin::input(name.clone(), GraphValueType::Bool), |(_, pin)| pin.clone());
                pin.name.clone_from(name);
                pin
            })
            .collect();
        node.kind = ToolsNodeKind::EntryStateOverrideConditions {
            state_ids: states.iter().map(|(id, _)| *id).collect(),
        };
    }
}
