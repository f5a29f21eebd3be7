// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authoring graphs: nodes, the pin links between them, and structural queries.

use crate::connection::{Connection, ConnectionId, PinRef};
use crate::node::{Node, NodeId, NodeTypeTag, ToolsNodeKind};
use crate::pin::PinId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What a graph evaluates to, which restricts the nodes it may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphType {
    /// Produces a pose
    BlendTree,
    /// Produces values
    ValueTree,
    /// Holds transitions and their conditions
    TransitionTree,
    /// Holds states and conduits
    StateMachine,
}

/// How far a structural search descends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Only this graph
    Localized,
    /// This graph and every nested graph
    Recursive,
}

/// How node types are matched during a structural search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTypeMatch {
    /// Only the exact type
    Exact,
    /// The type and every type deriving from it
    Derived,
}

/// An authoring graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Graph type
    graph_type: GraphType,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Pin links, keyed by connection ID
    connections: IndexMap<ConnectionId, Connection>,
    /// Default entry state, state machine graphs only
    pub(crate) default_entry_state: Option<NodeId>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, graph_type: GraphType) -> Self {
        Self {
            name: name.into(),
            graph_type,
            nodes: IndexMap::new(),
            connections: IndexMap::new(),
            default_entry_state: None,
        }
    }

    /// Graph type
    pub fn graph_type(&self) -> GraphType {
        self.graph_type
    }

    /// Create a node of the given kind
    pub fn create_node(&mut self, kind: ToolsNodeKind) -> Result<NodeId, GraphError> {
        self.add_node(Node::new(kind))
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let tag = node.tag();
        if !tag.allowed_in(self.graph_type) {
            return Err(GraphError::InvalidPlacement {
                tag,
                graph_type: self.graph_type,
            });
        }

        let id = node.id;
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Add a node whose placement is known to be valid
    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        debug_assert!(node.tag().allowed_in(self.graph_type));
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its connections
    pub fn destroy_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.connections.retain(|_, c| !c.touches_node(node_id));
        if self.default_entry_state == Some(node_id) {
            self.default_entry_state = None;
        }
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes, in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all nodes mutably, in creation order
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Connect an output pin to an input pin, both addressed by index
    pub fn connect(
        &mut self,
        from_node: NodeId,
        output_index: usize,
        to_node: NodeId,
        input_index: usize,
    ) -> Result<ConnectionId, GraphError> {
        let source_node = self.nodes.get(&from_node).ok_or(GraphError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node).ok_or(GraphError::NodeNotFound(to_node))?;

        let source_pin = source_node.output(output_index).ok_or(GraphError::PinNotFound {
            node: from_node,
            index: output_index,
        })?;
        let target_pin = target_node.input(input_index).ok_or(GraphError::PinNotFound {
            node: to_node,
            index: input_index,
        })?;

        if !source_pin.can_connect(target_pin) {
            return Err(GraphError::IncompatiblePins);
        }

        if !target_pin.multi_connect && self.connections.values().any(|c| c.feeds(target_pin.id)) {
            return Err(GraphError::PinAlreadyConnected(target_pin.id));
        }

        if from_node == to_node {
            return Err(GraphError::SelfLoop);
        }

        let connection = Connection::new(PinRef::new(from_node, source_pin.id), PinRef::new(to_node, target_pin.id));
        let id = connection.id;
        self.connections.insert(id, connection);

        if self.topological_order().is_err() {
            self.connections.shift_remove(&id);
            return Err(GraphError::Cycle);
        }

        Ok(id)
    }

    /// Connect two pins known to be compatible, replacing whatever fed the input
    pub(crate) fn link(&mut self, source: PinRef, target: PinRef) -> ConnectionId {
        self.connections.retain(|_, c| !c.feeds(target.pin));
        let connection = Connection::new(source, target);
        let id = connection.id;
        self.connections.insert(id, connection);
        id
    }

    /// Create a node and feed its first output into an input of another node
    pub fn create_input_node(
        &mut self,
        kind: ToolsNodeKind,
        to_node: NodeId,
        input_index: usize,
    ) -> Result<NodeId, GraphError> {
        let id = self.create_node(kind)?;
        if let Err(err) = self.connect(id, 0, to_node, input_index) {
            self.destroy_node(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Remove a connection
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        self.connections.shift_remove(&connection_id)
    }

    /// Remove every connection to or from a pin
    pub fn disconnect_pin(&mut self, pin_id: PinId) {
        self.connections.retain(|_, c| !c.touches_pin(pin_id));
    }

    /// Get a connection by ID
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get connections to a specific pin
    pub fn connections_to(&self, pin_id: PinId) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(move |c| c.feeds(pin_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Upstream node feeding an input pin
    pub fn connected_input_node(&self, node_id: NodeId, input_index: usize) -> Option<&Node> {
        let pin = self.nodes.get(&node_id)?.input(input_index)?;
        let connection = self.connections_to(pin.id).next()?;
        self.nodes.get(&connection.source.node)
    }

    /// Find every node of a type, in graph order
    pub fn find_all_nodes_of_type(&self, tag: NodeTypeTag, mode: SearchMode, type_match: SearchTypeMatch) -> Vec<&Node> {
        let mut found = Vec::new();
        self.collect_nodes_of_type(tag, mode, type_match, &mut found);
        found
    }

    fn collect_nodes_of_type<'a>(
        &'a self,
        tag: NodeTypeTag,
        mode: SearchMode,
        type_match: SearchTypeMatch,
        found: &mut Vec<&'a Node>,
    ) {
        for node in self.nodes.values() {
            let matches = match type_match {
                SearchTypeMatch::Exact => node.tag() == tag,
                SearchTypeMatch::Derived => node.tag().is_a(tag),
            };
            if matches {
                found.push(node);
            }

            if mode == SearchMode::Recursive {
                for nested in [node.child_graph(), node.secondary_graph()].into_iter().flatten() {
                    nested.collect_nodes_of_type(tag, mode, type_match, found);
                }
            }
        }
    }

    /// Default entry state of a state machine graph
    pub fn default_entry_state(&self) -> Option<NodeId> {
        self.default_entry_state
    }

    /// Set the default entry state of a state machine graph
    pub fn set_default_entry_state(&mut self, state_id: NodeId) -> Result<(), GraphError> {
        let node = self.nodes.get(&state_id).ok_or(GraphError::NodeNotFound(state_id))?;
        if node.tag() != NodeTypeTag::State {
            return Err(GraphError::NotAState(state_id));
        }

        self.default_entry_state = Some(state_id);
        Ok(())
    }

    /// Get nodes in dependency order
    pub fn topological_order(&self) -> Result<Vec<NodeId>, GraphError> {
        let mut pending_inputs: IndexMap<NodeId, usize> =
            self.nodes.keys().map(|id| (*id, 0)).collect();
        for connection in self.connections.values() {
            if let Some(count) = pending_inputs.get_mut(&connection.target.node) {
                *count += 1;
            }
        }

        let mut ready: VecDeque<NodeId> = pending_inputs
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node_id) = ready.pop_front() {
            order.push(node_id);
            for connection in self.connections.values().filter(|c| c.source.node == node_id) {
                if let Some(count) = pending_inputs.get_mut(&connection.target.node) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(connection.target.node);
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            return Err(GraphError::Cycle);
        }
        Ok(order)
    }
}

/// Error when editing a graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("No node {0:?} in this graph")]
    NodeNotFound(NodeId),

    /// Pin not found
    #[error("Pin {index} not found on node {node:?}")]
    PinNotFound {
        /// Node
        node: NodeId,
        /// Pin index
        index: usize,
    },

    /// Incompatible pin types
    #[error("Incompatible pin types")]
    IncompatiblePins,

    /// Pin is already connected
    #[error("Pin already connected: {0:?}")]
    PinAlreadyConnected(PinId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Connection would create a cycle
    #[error("Graph contains a cycle")]
    Cycle,

    /// Node type not allowed in this graph
    #[error("{tag:?} nodes cannot be placed in a {graph_type:?} graph")]
    InvalidPlacement {
        /// Node type
        tag: NodeTypeTag,
        /// Graph type
        graph_type: GraphType,
    },

    /// Node is not a state
    #[error("Node is not a state: {0:?}")]
    NotAState(NodeId),

    /// A state machine is missing one of its fixed conduits
    #[error("State machine has no {0:?} node")]
    MissingConduit(NodeTypeTag),

    /// A conduit already links the two states
    #[error("A conduit from {start:?} to {end:?} already exists")]
    ConduitExists {
        /// Source state
        start: NodeId,
        /// Target state
        end: NodeId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_animgraph_runtime::settings::ComparisonOperator;
    use ordoplay_animgraph_runtime::GraphValueType;

    fn comparison() -> ToolsNodeKind {
        ToolsNodeKind::FloatComparison {
            operator: ComparisonOperator::GreaterThan,
            comparand: 0.5,
        }
    }

    #[test]
    fn test_connect_by_index() {
        let mut graph = Graph::new("Conditions", GraphType::ValueTree);
        let speed = graph
            .create_node(ToolsNodeKind::ControlParameterFloat {
                name: "Speed".into(),
                default_value: 0.0,
            })
            .unwrap();
        let compare = graph.create_node(comparison()).unwrap();

        graph.connect(speed, 0, compare, 0).unwrap();
        let upstream = graph.connected_input_node(compare, 0).unwrap();
        assert_eq!(upstream.id, speed);
        assert!(graph.connected_input_node(compare, 1).is_none());

        let value_pin = graph.node(compare).unwrap().inputs[0].id;
        assert_eq!(graph.connect(speed, 0, compare, 0), Err(GraphError::PinAlreadyConnected(value_pin)));
    }

    #[test]
    fn test_rejects_type_mismatch_and_cycles() {
        let mut graph = Graph::new("Conditions", GraphType::ValueTree);
        let a = graph.create_node(ToolsNodeKind::Not).unwrap();
        let b = graph.create_node(ToolsNodeKind::Not).unwrap();
        let compare = graph.create_node(comparison()).unwrap();

        assert_eq!(graph.connect(a, 0, compare, 0), Err(GraphError::IncompatiblePins));
        assert_eq!(graph.connect(a, 0, a, 0), Err(GraphError::SelfLoop));

        graph.connect(a, 0, b, 0).unwrap();
        assert_eq!(graph.connect(b, 0, a, 0), Err(GraphError::Cycle));
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_placement_rules() {
        let mut blend_tree = Graph::new("Blend Tree", GraphType::BlendTree);
        assert!(blend_tree.create_node(ToolsNodeKind::Result { value_type: GraphValueType::Pose }).is_ok());
        assert!(matches!(
            blend_tree.create_node(ToolsNodeKind::StateCompletedCondition),
            Err(GraphError::InvalidPlacement { .. })
        ));

        let mut state_machine = Graph::new("State Machine", GraphType::StateMachine);
        assert!(state_machine.create_node(ToolsNodeKind::Not).is_err());
    }

    #[test]
    fn test_recursive_search() {
        let mut graph = Graph::new("Root", GraphType::BlendTree);
        graph.create_node(ToolsNodeKind::StateMachine).unwrap();

        let local = graph.find_all_nodes_of_type(NodeTypeTag::State, SearchMode::Localized, SearchTypeMatch::Exact);
        assert!(local.is_empty());

        let nested = graph.find_all_nodes_of_type(NodeTypeTag::State, SearchMode::Recursive, SearchTypeMatch::Exact);
        assert_eq!(nested.len(), 1);

        let conduits = graph.find_all_nodes_of_type(NodeTypeTag::Conduit, SearchMode::Recursive, SearchTypeMatch::Derived);
        assert_eq!(conduits.len(), 2);
        let exact = graph.find_all_nodes_of_type(NodeTypeTag::Conduit, SearchMode::Recursive, SearchTypeMatch::Exact);
        assert!(exact.is_empty());
    }

    #[test]
    fn test_destroy_node_clears_connections() {
        let mut graph = Graph::new("Conditions", GraphType::ValueTree);
        let a = graph.create_node(ToolsNodeKind::ConstBool { value: true }).unwrap();
        let b = graph.create_node(ToolsNodeKind::Not).unwrap();
        graph.connect(a, 0, b, 0).unwrap();

        assert!(graph.destroy_node(a).is_some());
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.connected_input_node(b, 0).is_none());
    }
}
