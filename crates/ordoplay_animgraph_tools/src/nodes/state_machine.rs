// SPDX-License-Identifier: MIT OR Apache-2.0
//! State machine compiler.

use super::state::compile_state;
use super::transition::{try_compile_transition, TransitionTarget};
use super::{compile_input, compile_with};
use crate::compilation::{CompilationError, GraphCompilationContext};
use crate::graph::{Graph, SearchMode, SearchTypeMatch};
use crate::node::{Node, NodeId, NodeTypeTag, ToolsNodeKind};
use indexmap::IndexMap;
use ordoplay_animgraph_runtime::settings::{StateMachineSettings, StateMachineStateSettings};
use ordoplay_animgraph_runtime::{GraphValueType, NodeIndex, StateIndex, INVALID_INDEX};

/// Global transitions usable from `source_state`
///
/// A state never transitions globally into itself, and an explicit conduit to
/// a target replaces the global transition to that target.
pub fn remaining_global_transitions<'a>(
    all: &[(NodeId, &'a Node)],
    source_state: NodeId,
    claimed_targets: &[NodeId],
) -> Vec<(NodeId, &'a Node)> {
    let mut remaining = all.to_vec();
    remaining.retain(|(end_state, _)| *end_state != source_state && !claimed_targets.contains(end_state));
    remaining
}

/// The single node of a fixed conduit type
fn fixed_conduit<'a>(graph: &'a Graph, state_machine: NodeId, conduit: NodeTypeTag) -> Result<&'a Node, CompilationError> {
    match graph
        .find_all_nodes_of_type(conduit, SearchMode::Localized, SearchTypeMatch::Exact)
        .as_slice()
    {
        [node] => Ok(*node),
        [] => Err(CompilationError::MissingConduit { state_machine, conduit }),
        _ => Err(CompilationError::DuplicateConduit { state_machine, conduit }),
    }
}

#[derive(Debug, Clone, Copy)]
struct CompiledState {
    state_index: StateIndex,
    state_node_index: NodeIndex,
}

pub(super) fn compile_state_machine(
    ctx: &mut GraphCompilationContext,
    node: &Node,
) -> Result<NodeIndex, CompilationError> {
    compile_with::<StateMachineSettings>(ctx, node, |ctx, mut settings| {
        let graph = node.child_graph().ok_or(CompilationError::MissingChildGraph(node.id))?;

        let states = graph.find_all_nodes_of_type(NodeTypeTag::State, SearchMode::Localized, SearchTypeMatch::Derived);
        if states.is_empty() {
            return Err(CompilationError::NoStates(node.id));
        }
        let conduits =
            graph.find_all_nodes_of_type(NodeTypeTag::TransitionConduit, SearchMode::Localized, SearchTypeMatch::Exact);

        let entry_conduit = fixed_conduit(graph, node.id, NodeTypeTag::EntryStateOverrideConduit)?;
        let entry_graph = entry_conduit
            .secondary_graph()
            .ok_or(CompilationError::MissingChildGraph(entry_conduit.id))?;
        let entry_conditions = fixed_conduit(entry_graph, node.id, NodeTypeTag::EntryStateOverrideConditions)?;
        let entry_state_ids: &[NodeId] = match &entry_conditions.kind {
            ToolsNodeKind::EntryStateOverrideConditions { state_ids } => state_ids,
            _ => &[],
        };

        let global_conduit = fixed_conduit(graph, node.id, NodeTypeTag::GlobalTransitionConduit)?;
        let global_graph = global_conduit
            .secondary_graph()
            .ok_or(CompilationError::MissingChildGraph(global_conduit.id))?;

        // States
        let mut compiled_states: IndexMap<NodeId, CompiledState> = IndexMap::with_capacity(states.len());
        for (i, state) in states.iter().enumerate() {
            let Some(descriptor) = state.state() else {
                return Err(CompilationError::UnsupportedNode {
                    node: state.id,
                    tag: state.tag(),
                });
            };
            let state_node_index = compile_state(ctx, state, descriptor)?;

            let entry_condition_node_index = match entry_state_ids.iter().position(|id| *id == state.id) {
                Some(pin_index) => compile_input(ctx, entry_graph, entry_conditions, pin_index, GraphValueType::Bool)?,
                None => INVALID_INDEX,
            };

            settings.state_settings.push(StateMachineStateSettings {
                state_node_index,
                entry_condition_node_index,
                transition_settings: Vec::new(),
            });
            let state_index = StateIndex::try_from(i).map_err(|_| CompilationError::IndexSpaceExhausted(state.id))?;
            compiled_states.insert(
                state.id,
                CompiledState {
                    state_index,
                    state_node_index,
                },
            );
        }

        let lookup = |owner: NodeId, state: NodeId| {
            compiled_states
                .get(&state)
                .copied()
                .ok_or(CompilationError::UnknownConduitState { conduit: owner, state })
        };

        // Explicit conduits, in declaration order
        let mut explicit: Vec<(&Node, NodeId, NodeId)> = Vec::with_capacity(conduits.len());
        for conduit in &conduits {
            if let ToolsNodeKind::TransitionConduit { start_state, end_state } = conduit.kind {
                lookup(conduit.id, start_state)?;
                lookup(conduit.id, end_state)?;
                explicit.push((*conduit, start_state, end_state));
            }
        }

        // Global transitions, in declaration order
        let mut globals: Vec<(NodeId, &Node)> = Vec::new();
        for global in global_graph.find_all_nodes_of_type(
            NodeTypeTag::GlobalTransition,
            SearchMode::Localized,
            SearchTypeMatch::Exact,
        ) {
            if let ToolsNodeKind::GlobalTransition { end_state, .. } = global.kind {
                lookup(global.id, end_state)?;
                globals.push((end_state, global));
            }
        }

        // Transitions
        for (i, state) in states.iter().enumerate() {
            let source = lookup(node.id, state.id)?;
            let outgoing: Vec<&(&Node, NodeId, NodeId)> =
                explicit.iter().filter(|(_, start, _)| *start == state.id).collect();
            let claimed_targets: Vec<NodeId> = outgoing.iter().map(|(_, _, end)| *end).collect();

            let mut transition_settings = Vec::new();
            for (conduit, _, end_state) in outgoing {
                let target = lookup(conduit.id, *end_state)?;
                let tree = conduit
                    .secondary_graph()
                    .ok_or(CompilationError::MissingChildGraph(conduit.id))?;

                ctx.with_conduit(source.state_node_index, |ctx| {
                    for transition in
                        tree.find_all_nodes_of_type(NodeTypeTag::Transition, SearchMode::Localized, SearchTypeMatch::Exact)
                    {
                        let compiled = try_compile_transition(
                            ctx,
                            tree,
                            transition,
                            TransitionTarget {
                                state_index: target.state_index,
                                state_node_index: target.state_node_index,
                            },
                        )?;
                        transition_settings.extend(compiled);
                    }
                    Ok::<_, CompilationError>(())
                })?;
            }

            // Global transitions and their conditions are memoized by node id, so the first source
            // state compiled here is the one baked into state-completed and time conditions. Later
            // source states share those compiled indices.
            for (end_state, global) in remaining_global_transitions(&globals, state.id, &claimed_targets) {
                let target = lookup(global.id, end_state)?;
                let compiled = ctx.with_conduit(source.state_node_index, |ctx| {
                    try_compile_transition(
                        ctx,
                        global_graph,
                        global,
                        TransitionTarget {
                            state_index: target.state_index,
                            state_node_index: target.state_node_index,
                        },
                    )
                })?;
                transition_settings.extend(compiled);
            }

            settings.state_settings[i].transition_settings = transition_settings;
        }

        let default_entry_state = graph
            .default_entry_state()
            .and_then(|id| compiled_states.get(&id))
            .ok_or(CompilationError::MissingDefaultEntryState(node.id))?;
        settings.default_state_index = default_entry_state.state_index;

        Ok(settings)
    })
}
