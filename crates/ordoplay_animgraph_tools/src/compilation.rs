// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph compilation context.
//!
//! Compiling walks the authoring graph depth-first from the root result node.
//! Every authoring node is assigned one slot in a flat settings table; nodes
//! reached twice reuse their slot. Conditions inside transitions read the
//! state and transition they guard from the scopes opened by the state
//! machine compiler.

use crate::graph::{Graph, GraphType, SearchMode, SearchTypeMatch};
use crate::node::{Node, NodeId, NodeTypeTag, ToolsNodeKind};
use indexmap::IndexMap;
use ordoplay_animgraph_runtime::settings::{ControlParameterBinding, ExternalGraphSlot};
use ordoplay_animgraph_runtime::{
    CompiledSettings, GraphDefinition, GraphValueType, NodeIndex, NodeSettings, StringId,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Result of requesting a settings slot for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCompilationState {
    /// A default record was allocated, the caller fills it in
    NeedCompilation(NodeIndex),
    /// The node was compiled before, reuse its slot
    AlreadyCompiled(NodeIndex),
    /// The node was compiled as another type or the table is full
    Error,
}

/// Severity of a compilation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSeverity {
    /// Informational
    Info,
    /// Suspicious but compiled
    Warning,
    /// Compilation failed
    Error,
}

/// Message recorded while compiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationLogEntry {
    /// Severity
    pub severity: LogSeverity,
    /// Node the message is about
    pub node_id: Option<NodeId>,
    /// Message text
    pub message: String,
}

/// Successful compilation
#[derive(Debug, Clone)]
pub struct CompilationOutput {
    /// Compiled graph
    pub definition: GraphDefinition,
    /// Messages recorded while compiling
    pub log: Vec<CompilationLogEntry>,
}

#[derive(Debug, Clone, Copy)]
struct TransitionConditionsScope {
    duration: f32,
    duration_override_node_index: NodeIndex,
}

/// Mutable state shared by every node compiler
#[derive(Debug, Default)]
pub struct GraphCompilationContext {
    node_settings: Vec<NodeSettings>,
    compiled_node_ids: Vec<NodeId>,
    node_indices: IndexMap<NodeId, NodeIndex>,
    conduit_scopes: Vec<NodeIndex>,
    transition_scopes: Vec<TransitionConditionsScope>,
    control_parameters: IndexMap<StringId, (NodeIndex, GraphValueType)>,
    external_graph_slots: IndexMap<StringId, NodeIndex>,
    log: Vec<CompilationLogEntry>,
}

impl GraphCompilationContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the settings slot of a node, allocating it on first request
    pub fn get_settings<T: CompiledSettings>(&mut self, node: &Node) -> NodeCompilationState {
        if let Some(&index) = self.node_indices.get(&node.id) {
            return match self.settings::<T>(index) {
                Some(_) => NodeCompilationState::AlreadyCompiled(index),
                None => NodeCompilationState::Error,
            };
        }

        let Ok(index) = NodeIndex::try_from(self.node_settings.len()) else {
            return NodeCompilationState::Error;
        };

        self.node_settings.push(T::with_node_index(index).into());
        self.compiled_node_ids.push(node.id);
        self.node_indices.insert(node.id, index);
        NodeCompilationState::NeedCompilation(index)
    }

    /// Reason a `get_settings` call for this node returned [`NodeCompilationState::Error`]
    pub fn settings_error<T: CompiledSettings>(&self, node: &Node) -> CompilationError {
        match self.node_indices.get(&node.id) {
            Some(_) => CompilationError::SettingsTypeMismatch {
                node: node.id,
                expected: T::KIND,
            },
            None => CompilationError::IndexSpaceExhausted(node.id),
        }
    }

    /// Settings in a slot, if they have the requested type
    pub fn settings<T: CompiledSettings>(&self, index: NodeIndex) -> Option<&T> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.node_settings.get(i))
            .and_then(T::from_node_settings)
    }

    /// Store populated settings into their slot
    pub fn set_settings<T: CompiledSettings>(&mut self, settings: T) {
        let index = settings.node_index();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.node_settings.get_mut(i));
        match slot {
            Some(slot) => {
                assert!(
                    T::from_node_settings(slot).is_some(),
                    "settings slot {index} holds a {}, not a {}",
                    slot.kind_name(),
                    T::KIND
                );
                *slot = settings.into();
            }
            None => panic!("settings slot {index} was never allocated"),
        }
    }

    /// Number of allocated slots
    pub fn num_compiled_nodes(&self) -> usize {
        self.node_settings.len()
    }

    /// Slot of an authoring node, if compiled
    pub fn compiled_node_index(&self, node_id: NodeId) -> Option<NodeIndex> {
        self.node_indices.get(&node_id).copied()
    }

    /// Enter the transitions of a conduit leaving a state
    pub fn begin_conduit_compilation(&mut self, source_state_node_index: NodeIndex) {
        self.conduit_scopes.push(source_state_node_index);
    }

    /// Leave the innermost conduit
    pub fn end_conduit_compilation(&mut self) {
        assert!(self.conduit_scopes.pop().is_some(), "no conduit is being compiled");
    }

    /// Run `f` inside a conduit scope
    pub fn with_conduit<R>(&mut self, source_state_node_index: NodeIndex, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_conduit_compilation(source_state_node_index);
        let result = f(self);
        self.end_conduit_compilation();
        result
    }

    /// Source state of the innermost conduit
    pub fn conduit_source_state_node_index(&self) -> Option<NodeIndex> {
        self.conduit_scopes.last().copied()
    }

    /// Enter the condition tree of a transition
    pub fn begin_transition_conditions_compilation(&mut self, duration: f32, duration_override_node_index: NodeIndex) {
        self.transition_scopes.push(TransitionConditionsScope {
            duration,
            duration_override_node_index,
        });
    }

    /// Leave the innermost transition condition tree
    pub fn end_transition_conditions_compilation(&mut self) {
        assert!(self.transition_scopes.pop().is_some(), "no transition conditions are being compiled");
    }

    /// Run `f` inside a transition conditions scope
    pub fn with_transition_conditions<R>(
        &mut self,
        duration: f32,
        duration_override_node_index: NodeIndex,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.begin_transition_conditions_compilation(duration, duration_override_node_index);
        let result = f(self);
        self.end_transition_conditions_compilation();
        result
    }

    /// Duration and duration override of the innermost transition
    pub fn transition_conditions(&self) -> Option<(f32, NodeIndex)> {
        self.transition_scopes
            .last()
            .map(|scope| (scope.duration, scope.duration_override_node_index))
    }

    /// Slot and type of a control parameter compiled earlier
    pub fn control_parameter(&self, name: &StringId) -> Option<(NodeIndex, GraphValueType)> {
        self.control_parameters.get(name).copied()
    }

    /// Record a control parameter
    pub fn register_control_parameter(&mut self, name: StringId, index: NodeIndex, value_type: GraphValueType) {
        self.log_message(LogSeverity::Info, None, format!("Control parameter '{name}' bound to node {index}"));
        self.control_parameters.insert(name, (index, value_type));
    }

    /// Record an external graph slot, names must be unique
    pub fn register_external_graph_slot(&mut self, slot_id: StringId, index: NodeIndex) -> Result<(), CompilationError> {
        if self.external_graph_slots.contains_key(&slot_id) {
            return Err(CompilationError::DuplicateExternalGraphSlot(slot_id));
        }
        self.external_graph_slots.insert(slot_id, index);
        Ok(())
    }

    /// Record a message
    pub fn log_message(&mut self, severity: LogSeverity, node_id: Option<NodeId>, message: impl Into<String>) {
        self.log.push(CompilationLogEntry {
            severity,
            node_id,
            message: message.into(),
        });
    }

    /// Messages recorded so far
    pub fn log(&self) -> &[CompilationLogEntry] {
        &self.log
    }

    /// Compile a root blend tree
    pub fn compile(mut self, graph: &Graph) -> Result<CompilationOutput, CompilationError> {
        match self.compile_root(graph) {
            Ok(root_node_index) => {
                let definition = self.finalize(root_node_index);
                info!(
                    graph = %graph.name,
                    nodes = definition.num_nodes(),
                    control_parameters = definition.control_parameters.len(),
                    external_graph_slots = definition.external_graph_slots.len(),
                    "Compiled animation graph"
                );
                Ok(CompilationOutput {
                    definition,
                    log: self.log,
                })
            }
            Err(err) => {
                error!(graph = %graph.name, node = ?err.node_id(), "Graph compilation failed: {err}");
                Err(err)
            }
        }
    }

    fn compile_root(&mut self, graph: &Graph) -> Result<NodeIndex, CompilationError> {
        if graph.graph_type() != GraphType::BlendTree {
            return Err(CompilationError::InvalidRootGraph(graph.graph_type()));
        }

        let result = single_result_node(graph)?;
        if !matches!(result.kind, ToolsNodeKind::Result { value_type: GraphValueType::Pose }) {
            return Err(CompilationError::ValueTypeMismatch {
                node: result.id,
                expected: GraphValueType::Pose,
                found: result.inputs.first().map_or(GraphValueType::Unknown, |pin| pin.value_type),
            });
        }

        let root = graph
            .connected_input_node(result.id, 0)
            .ok_or(CompilationError::NoRootNode)?;
        crate::nodes::compile_node_of_type(self, graph, root, GraphValueType::Pose)
    }

    /// Build the definition; every scope must have been closed
    pub fn finalize(&mut self, root_node_index: NodeIndex) -> GraphDefinition {
        assert!(self.conduit_scopes.is_empty(), "unbalanced conduit compilation scopes");
        assert!(self.transition_scopes.is_empty(), "unbalanced transition conditions scopes");

        GraphDefinition {
            node_settings: std::mem::take(&mut self.node_settings),
            node_ids: self.compiled_node_ids.drain(..).map(|id| id.0).collect(),
            root_node_index,
            control_parameters: self
                .control_parameters
                .drain(..)
                .map(|(parameter_id, (node_index, _))| ControlParameterBinding {
                    parameter_id,
                    node_index,
                })
                .collect(),
            external_graph_slots: self
                .external_graph_slots
                .drain(..)
                .map(|(slot_id, node_index)| ExternalGraphSlot { slot_id, node_index })
                .collect(),
        }
    }
}

/// The lone result node of a blend or value tree
pub(crate) fn single_result_node(graph: &Graph) -> Result<&Node, CompilationError> {
    match graph
        .find_all_nodes_of_type(NodeTypeTag::Result, SearchMode::Localized, SearchTypeMatch::Exact)
        .as_slice()
    {
        [result] => Ok(*result),
        [] => Err(CompilationError::MissingResultNode(graph.name.clone())),
        _ => Err(CompilationError::MultipleResultNodes(graph.name.clone())),
    }
}

/// Compile a root blend tree into a definition
pub fn compile_graph(graph: &Graph) -> Result<GraphDefinition, CompilationError> {
    GraphCompilationContext::new()
        .compile(graph)
        .map(|output| output.definition)
}

/// Error raised while compiling
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompilationError {
    /// Only blend trees can be compiled as a root
    #[error("Root graph must be a blend tree, found {0:?}")]
    InvalidRootGraph(GraphType),

    /// Graph has no result node
    #[error("Graph '{0}' has no result node")]
    MissingResultNode(String),

    /// Graph has more than one result node
    #[error("Graph '{0}' has more than one result node")]
    MultipleResultNodes(String),

    /// Root result node is unconnected
    #[error("Root result node has no input")]
    NoRootNode,

    /// State machine without states
    #[error("State machine {0:?} has no states")]
    NoStates(NodeId),

    /// Default entry state unset or unknown
    #[error("State machine {0:?} has no valid default entry state")]
    MissingDefaultEntryState(NodeId),

    /// Fixed conduit missing
    #[error("State machine {state_machine:?} has no {conduit:?} node")]
    MissingConduit {
        /// State machine node
        state_machine: NodeId,
        /// Missing node type
        conduit: NodeTypeTag,
    },

    /// Fixed conduit present more than once
    #[error("State machine {state_machine:?} has more than one {conduit:?} node")]
    DuplicateConduit {
        /// State machine node
        state_machine: NodeId,
        /// Duplicated node type
        conduit: NodeTypeTag,
    },

    /// Conduit references a state that is not in the state machine
    #[error("Conduit {conduit:?} references unknown state {state:?}")]
    UnknownConduitState {
        /// Conduit or global transition node
        conduit: NodeId,
        /// Missing state
        state: NodeId,
    },

    /// Input produces the wrong type of value
    #[error("Node {node:?} produces {found}, expected {expected}")]
    ValueTypeMismatch {
        /// Offending node
        node: NodeId,
        /// Required type
        expected: GraphValueType,
        /// Produced type
        found: GraphValueType,
    },

    /// State has no layer data node
    #[error("State {0:?} has no layer data node")]
    MissingLayerDataNode(NodeId),

    /// Node lacks a nested graph it requires
    #[error("Node {0:?} is missing its nested graph")]
    MissingChildGraph(NodeId),

    /// Required input is unconnected
    #[error("Input {input_index} of node {node:?} must be connected")]
    MissingInput {
        /// Node
        node: NodeId,
        /// Input pin index
        input_index: usize,
    },

    /// Condition used outside of a conduit
    #[error("Node {0:?} can only be used in a transition conduit")]
    NotInConduit(NodeId),

    /// Condition used outside of a transition condition tree
    #[error("Node {0:?} can only be used as a transition condition")]
    NotInTransitionConditions(NodeId),

    /// Node already compiled as another settings type
    #[error("Node {node:?} was already compiled as something other than {expected}")]
    SettingsTypeMismatch {
        /// Node
        node: NodeId,
        /// Requested settings type
        expected: &'static str,
    },

    /// The settings table is full
    #[error("Ran out of node indices while compiling {0:?}")]
    IndexSpaceExhausted(NodeId),

    /// Node cannot be compiled here
    #[error("{tag:?} node {node:?} cannot be compiled as a value or pose")]
    UnsupportedNode {
        /// Node
        node: NodeId,
        /// Node type
        tag: NodeTypeTag,
    },

    /// Two control parameters share a name but not a type
    #[error("Control parameter '{parameter}' is used as both {existing} and {requested}")]
    ControlParameterTypeMismatch {
        /// Parameter name
        parameter: StringId,
        /// Type compiled first
        existing: GraphValueType,
        /// Conflicting type
        requested: GraphValueType,
    },

    /// Two external graph nodes share a slot name
    #[error("External graph slot '{0}' is used more than once")]
    DuplicateExternalGraphSlot(StringId),
}

impl CompilationError {
    /// Node the error is about, if any
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::NoStates(node)
            | Self::MissingDefaultEntryState(node)
            | Self::MissingLayerDataNode(node)
            | Self::MissingChildGraph(node)
            | Self::NotInConduit(node)
            | Self::NotInTransitionConditions(node)
            | Self::IndexSpaceExhausted(node) => Some(*node),
            Self::MissingConduit { state_machine, .. } | Self::DuplicateConduit { state_machine, .. } => {
                Some(*state_machine)
            }
            Self::UnknownConduitState { conduit, .. } => Some(*conduit),
            Self::ValueTypeMismatch { node, .. }
            | Self::MissingInput { node, .. }
            | Self::SettingsTypeMismatch { node, .. }
            | Self::UnsupportedNode { node, .. } => Some(*node),
            Self::InvalidRootGraph(_)
            | Self::MissingResultNode(_)
            | Self::MultipleResultNodes(_)
            | Self::NoRootNode
            | Self::ControlParameterTypeMismatch { .. }
            | Self::DuplicateExternalGraphSlot(_) => None,
        }
    }
}
