// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation graph authoring model and compiler for `OrdoPlay`.
//!
//! Authoring graphs are trees of typed nodes: blend trees produce poses,
//! value trees produce parameters, state machines hold states linked by
//! conduits, and transition trees hold transitions with their conditions.
//! [`compile_graph`] flattens a root blend tree into the
//! [`GraphDefinition`](ordoplay_animgraph_runtime::GraphDefinition) consumed
//! by the runtime.

pub mod compilation;
pub mod config;
pub mod connection;
pub mod graph;
pub mod graphs;
pub mod node;
pub mod nodes;
pub mod pin;

pub use compilation::{
    compile_graph, CompilationError, CompilationLogEntry, CompilationOutput, GraphCompilationContext, LogSeverity,
    NodeCompilationState,
};
pub use config::{load_graph, save_graph, CompilerConfig, ConfigError, OutputFormat};
pub use connection::{Connection, ConnectionId, PinRef};
pub use graph::{Graph, GraphError, GraphType, SearchMode, SearchTypeMatch};
pub use node::{
    ClipDescriptor, Node, NodeId, NodeTypeTag, StateDescriptor, StateType, ToolsNodeKind, TransitionDescriptor,
};
pub use nodes::{compile_node, compile_node_of_type, remaining_global_transitions};
pub use pin::{Pin, PinDirection, PinId};
