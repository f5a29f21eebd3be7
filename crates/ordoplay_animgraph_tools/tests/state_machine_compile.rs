// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compile authoring graphs and run them through the runtime.

use ordoplay_animgraph_runtime::settings::{StateMachineSettings, StateSettings};
use ordoplay_animgraph_runtime::{
    BlendTask, DefaultPoseTask, GraphDefinition, GraphInstance, SampleTask, Transform, INVALID_INDEX,
};
use ordoplay_animgraph_tools::{
    compile_graph, ClipDescriptor, CompilationError, Graph, GraphType, NodeId, StateType, ToolsNodeKind,
};
use std::sync::Arc;

struct Locomotion {
    graph: Graph,
    state_machine: NodeId,
    idle: NodeId,
    run: NodeId,
    jump: NodeId,
}

fn bool_parameter(name: &str) -> ToolsNodeKind {
    ToolsNodeKind::ControlParameterBool {
        name: name.into(),
        default_value: false,
    }
}

fn set_clip(state_machine: &mut Graph, state: NodeId, clip: &str) {
    let blend_tree = state_machine.node_mut(state).unwrap().child_graph_mut().unwrap();
    let result = blend_tree.nodes().next().map(|n| n.id).unwrap();
    blend_tree
        .create_input_node(ToolsNodeKind::AnimationClip(ClipDescriptor::new(clip, 1.0)), result, 0)
        .unwrap();
}

fn set_conduit_condition(state_machine: &mut Graph, conduit: NodeId, condition: ToolsNodeKind) {
    let transition = state_machine.conduit_transition(conduit).unwrap();
    state_machine
        .transition_tree_mut(conduit)
        .unwrap()
        .create_input_node(condition, transition, 0)
        .unwrap();
}

fn root_with_state_machine() -> (Graph, NodeId) {
    let mut graph = Graph::new("Character", GraphType::BlendTree);
    let result = graph
        .create_node(ToolsNodeKind::Result {
            value_type: ordoplay_animgraph_runtime::GraphValueType::Pose,
        })
        .unwrap();
    let state_machine = graph.create_input_node(ToolsNodeKind::StateMachine, result, 0).unwrap();
    (graph, state_machine)
}

/// Idle -> Run (conduit), Run -> Jump (conduit), any -> Jump (global)
fn locomotion() -> Locomotion {
    let (mut graph, state_machine) = root_with_state_machine();
    let sm = graph.node_mut(state_machine).unwrap().child_graph_mut().unwrap();

    let idle = sm.states()[0].id;
    sm.node_mut(idle).unwrap().name = "Idle".to_string();
    let run = sm.add_state("Run", StateType::BlendTree).unwrap();
    let jump = sm.add_state("Jump", StateType::BlendTree).unwrap();

    set_clip(sm, idle, "idle");
    set_clip(sm, run, "run");
    set_clip(sm, jump, "jump");

    let idle_to_run = sm.add_conduit(idle, run).unwrap();
    set_conduit_condition(sm, idle_to_run, bool_parameter("Run"));
    let run_to_jump = sm.add_conduit(run, jump).unwrap();
    set_conduit_condition(sm, run_to_jump, bool_parameter("Jump"));

    let global_jump = sm.global_transition(jump).unwrap();
    sm.global_transitions_graph_mut()
        .unwrap()
        .create_input_node(bool_parameter("Jump"), global_jump, 0)
        .unwrap();

    Locomotion {
        graph,
        state_machine,
        idle,
        run,
        jump,
    }
}

fn state_machine_settings(definition: &GraphDefinition) -> &StateMachineSettings {
    definition
        .typed_settings::<StateMachineSettings>(definition.root_node_index)
        .unwrap()
}

#[test]
fn test_idle_run_jump_transitions() {
    let locomotion = locomotion();
    let definition = compile_graph(&locomotion.graph).unwrap();
    let settings = state_machine_settings(&definition);

    assert_eq!(settings.state_settings.len(), 3);
    assert_eq!(settings.default_state_index, 0);

    let targets: Vec<Vec<i16>> = settings
        .state_settings
        .iter()
        .map(|state| state.transition_settings.iter().map(|t| t.target_state_index).collect())
        .collect();
    assert_eq!(targets, vec![vec![1, 2], vec![2], vec![]]);

    for (state, id) in settings.state_settings.iter().zip([locomotion.idle, locomotion.run, locomotion.jump]) {
        assert_eq!(definition.runtime_node_index(id.0), state.state_node_index);
    }

    let parameters: Vec<&str> = definition.control_parameters.iter().map(|p| p.parameter_id.as_str()).collect();
    assert_eq!(parameters, vec!["Run", "Jump"]);

    // Both "Jump" parameter nodes resolve to the same slot
    let idle_to_jump = &settings.state_settings[0].transition_settings[1];
    let run_to_jump = &settings.state_settings[1].transition_settings[0];
    assert_eq!(idle_to_jump.condition_node_index, run_to_jump.condition_node_index);
    assert_ne!(idle_to_jump.transition_node_index, run_to_jump.transition_node_index);
}

#[test]
fn test_compilation_is_deterministic() {
    let locomotion = locomotion();
    let first = bincode::serialize(&compile_graph(&locomotion.graph).unwrap()).unwrap();
    let second = bincode::serialize(&compile_graph(&locomotion.graph).unwrap()).unwrap();
    assert_eq!(first, second);

    let restored: GraphDefinition = bincode::deserialize(&first).unwrap();
    assert_eq!(restored, compile_graph(&locomotion.graph).unwrap());
}

#[test]
fn test_authoring_graph_survives_ron() {
    let locomotion = locomotion();
    let text = ron::ser::to_string_pretty(&locomotion.graph, ron::ser::PrettyConfig::default()).unwrap();
    let restored: Graph = ron::from_str(&text).unwrap();

    assert_eq!(compile_graph(&restored).unwrap(), compile_graph(&locomotion.graph).unwrap());
}

#[test]
fn test_global_transition_compiled_once() {
    let mut locomotion = locomotion();
    let sm = locomotion
        .graph
        .node_mut(locomotion.state_machine)
        .unwrap()
        .child_graph_mut()
        .unwrap();

    // Without the explicit conduit, Run reaches Jump through the global transition
    let run_to_jump = sm.conduit(locomotion.run, locomotion.jump).map(|n| n.id).unwrap();
    sm.destroy_node(run_to_jump);
    let global_jump = sm.global_transition(locomotion.jump).unwrap();

    let definition = compile_graph(&locomotion.graph).unwrap();
    let settings = state_machine_settings(&definition);
    let from_idle = &settings.state_settings[0].transition_settings[1];
    let from_run = &settings.state_settings[1].transition_settings[0];

    assert_eq!(from_run.target_state_index, 2);
    assert_eq!(from_idle.transition_node_index, from_run.transition_node_index);
    assert_eq!(definition.runtime_node_index(global_jump.0), from_idle.transition_node_index);
    assert!(settings.state_settings[2].transition_settings.is_empty());
}

#[test]
fn test_conduit_to_unknown_state_fails() {
    let mut locomotion = locomotion();
    let sm = locomotion
        .graph
        .node_mut(locomotion.state_machine)
        .unwrap()
        .child_graph_mut()
        .unwrap();
    let conduit = sm.conduit(locomotion.idle, locomotion.run).map(|n| n.id).unwrap();
    let stray = NodeId::new();
    if let ToolsNodeKind::TransitionConduit { end_state, .. } = &mut sm.node_mut(conduit).unwrap().kind {
        *end_state = stray;
    }

    assert_eq!(
        compile_graph(&locomotion.graph),
        Err(CompilationError::UnknownConduitState { conduit, state: stray })
    );
}

#[test]
fn test_runtime_follows_parameters() {
    let locomotion = locomotion();
    let definition = Arc::new(compile_graph(&locomotion.graph).unwrap());
    let state_machine = definition.root_node_index;
    let mut instance = GraphInstance::new(Arc::clone(&definition));

    let result = instance.evaluate_graph(0.1, Transform::IDENTITY, None);
    assert!(result.task_index.is_some());
    assert_eq!(instance.active_state_index(state_machine), Some(0));
    assert_eq!(instance.task_system().count_tasks_of_type::<SampleTask>(), 1);

    instance.set_control_parameter_bool("Run", true).unwrap();
    instance.evaluate_graph(0.1, Transform::IDENTITY, None);
    assert_eq!(instance.active_state_index(state_machine), Some(1));
    assert_eq!(instance.task_system().count_tasks_of_type::<SampleTask>(), 2);
    assert_eq!(instance.task_system().count_tasks_of_type::<BlendTask>(), 1);

    for _ in 0..5 {
        instance.evaluate_graph(0.1, Transform::IDENTITY, None);
    }
    assert_eq!(instance.task_system().count_tasks_of_type::<BlendTask>(), 0);

    instance.set_control_parameter_bool("Jump", true).unwrap();
    instance.evaluate_graph(0.1, Transform::IDENTITY, None);
    assert_eq!(instance.active_state_index(state_machine), Some(2));
}

#[test]
fn test_off_state_compiles_and_produces_no_pose() {
    let (mut graph, state_machine) = root_with_state_machine();
    let sm = graph.node_mut(state_machine).unwrap().child_graph_mut().unwrap();
    let idle = sm.states()[0].id;
    set_clip(sm, idle, "idle");
    let off = sm.add_state("Off", StateType::Off).unwrap();
    sm.set_entry_condition(
        off,
        ToolsNodeKind::ControlParameterBool {
            name: "Disabled".into(),
            default_value: true,
        },
    )
    .unwrap();

    let definition = Arc::new(compile_graph(&graph).unwrap());
    let settings = state_machine_settings(&definition);
    let off_state = definition
        .typed_settings::<StateSettings>(settings.state_settings[1].state_node_index)
        .unwrap();
    assert!(off_state.is_off_state);
    assert_eq!(off_state.child_node_index, INVALID_INDEX);

    let mut instance = GraphInstance::new(Arc::clone(&definition));
    let result = instance.evaluate_graph(0.1, Transform::IDENTITY, None);
    assert_eq!(instance.active_state_index(definition.root_node_index), Some(1));
    assert!(result.task_index.is_none());
    assert!(instance.task_system().is_empty());
}

#[test]
fn test_external_graph_slot() {
    let mut graph = Graph::new("Character", GraphType::BlendTree);
    let result = graph
        .create_node(ToolsNodeKind::Result {
            value_type: ordoplay_animgraph_runtime::GraphValueType::Pose,
        })
        .unwrap();
    graph
        .create_input_node(ToolsNodeKind::ExternalGraph { slot_id: "Weapon".into() }, result, 0)
        .unwrap();
    let host_definition = Arc::new(compile_graph(&graph).unwrap());
    assert_eq!(host_definition.external_graph_slots.len(), 1);

    let mut weapon_graph = Graph::new("Weapon", GraphType::BlendTree);
    let weapon_result = weapon_graph
        .create_node(ToolsNodeKind::Result {
            value_type: ordoplay_animgraph_runtime::GraphValueType::Pose,
        })
        .unwrap();
    weapon_graph
        .create_input_node(ToolsNodeKind::AnimationClip(ClipDescriptor::new("reload", 2.0)), weapon_result, 0)
        .unwrap();
    let weapon = GraphInstance::new(Arc::new(compile_graph(&weapon_graph).unwrap())).into_shared();

    let mut host = GraphInstance::new(host_definition);
    host.evaluate_graph(0.1, Transform::IDENTITY, None);
    assert_eq!(host.task_system().count_tasks_of_type::<DefaultPoseTask>(), 1);

    host.attach_external_graph_instance("Weapon", &weapon).unwrap();
    host.evaluate_graph(0.1, Transform::IDENTITY, None);
    assert_eq!(host.task_system().count_tasks_of_type::<SampleTask>(), 1);
    assert_eq!(host.task_system().count_tasks_of_type::<DefaultPoseTask>(), 0);

    host.detach_external_graph_instance("Weapon").unwrap();
}
