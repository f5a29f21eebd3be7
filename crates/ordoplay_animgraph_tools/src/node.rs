// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authoring node definitions.

use crate::graph::{Graph, GraphType};
use crate::pin::{Pin, PinId};
use ordoplay_animgraph_runtime::settings::{
    ClipEvent, ComparisonOperator, EasingType, RootMotionBlendMode, SyncEventMarker, TimeComparisonType, TimedEvent,
    TransitionOptions,
};
use ordoplay_animgraph_runtime::{GraphValueType, StringId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a state produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    /// Produces no pose
    Off,
    /// Pose comes from a blend tree
    #[default]
    BlendTree,
    /// Blend tree holding a nested state machine
    StateMachine,
}

/// Authored animation clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDescriptor {
    /// Clip resource ID
    pub clip_id: StringId,
    /// Length in seconds
    pub duration: f32,
    /// Whether playback wraps around
    pub looping: bool,
    /// Sync markers
    pub sync_events: Vec<SyncEventMarker>,
    /// Events sampled during playback
    pub events: Vec<ClipEvent>,
    /// Root motion per second of playback
    pub root_motion_velocity: [f32; 3],
}

impl ClipDescriptor {
    /// Create a looping clip without events
    pub fn new(clip_id: impl Into<StringId>, duration: f32) -> Self {
        Self {
            clip_id: clip_id.into(),
            duration,
            looping: true,
            sync_events: Vec::new(),
            events: Vec::new(),
            root_motion_velocity: [0.0; 3],
        }
    }
}

/// Authored state data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDescriptor {
    /// State type
    pub state_type: StateType,
    /// Events sampled while transitioning in
    pub entry_events: Vec<StringId>,
    /// Events sampled while fully active
    pub execute_events: Vec<StringId>,
    /// Events sampled while transitioning out
    pub exit_events: Vec<StringId>,
    /// Events sampled once little time remains
    pub time_remaining_events: Vec<TimedEvent>,
    /// Events sampled once enough time has elapsed
    pub time_elapsed_events: Vec<TimedEvent>,
}

impl StateDescriptor {
    /// Descriptor for a state of the given type
    pub fn of_type(state_type: StateType) -> Self {
        Self {
            state_type,
            ..Default::default()
        }
    }
}

/// Authored transition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDescriptor {
    /// Blend curve
    pub blend_weight_easing: EasingType,
    /// Root motion combination
    pub root_motion_blend: RootMotionBlendMode,
    /// Duration in seconds
    pub duration: f32,
    /// Offset in sync events applied to the target
    pub sync_event_offset: f32,
    /// Update the target in sync with the source
    pub is_synchronized: bool,
    /// Never outlast the source
    pub clamp_duration_to_source: bool,
    /// Start the target at the source's sync event
    pub keep_source_sync_event_index: bool,
    /// Start the target at the source's progress through its sync event
    pub keep_source_sync_event_percentage: bool,
    /// Allow interrupting another transition
    pub can_be_forced: bool,
}

impl Default for TransitionDescriptor {
    fn default() -> Self {
        Self {
            blend_weight_easing: EasingType::Linear,
            root_motion_blend: RootMotionBlendMode::Blend,
            duration: 0.3,
            sync_event_offset: 0.0,
            is_synchronized: false,
            clamp_duration_to_source: false,
            keep_source_sync_event_index: false,
            keep_source_sync_event_percentage: false,
            can_be_forced: false,
        }
    }
}

impl TransitionDescriptor {
    /// Option flags of the compiled transition
    pub fn options(&self) -> TransitionOptions {
        let mut options = TransitionOptions::empty();
        options.set(TransitionOptions::SYNCHRONIZED, self.is_synchronized);
        options.set(TransitionOptions::CLAMP_DURATION, self.clamp_duration_to_source);
        options.set(TransitionOptions::KEEP_SYNC_EVENT_INDEX, self.keep_source_sync_event_index);
        options.set(TransitionOptions::KEEP_SYNC_EVENT_PERCENTAGE, self.keep_source_sync_event_percentage);
        options.set(TransitionOptions::FORCED_TRANSITION_ALLOWED, self.can_be_forced);
        options
    }
}

/// Kind of authoring node with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolsNodeKind {
    /// Output of a blend or value tree
    Result {
        /// Type of value the tree produces
        value_type: GraphValueType,
    },
    /// Bool set by the gameplay layer
    ControlParameterBool {
        /// Parameter name
        name: StringId,
        /// Initial value
        default_value: bool,
    },
    /// Float set by the gameplay layer
    ControlParameterFloat {
        /// Parameter name
        name: StringId,
        /// Initial value
        default_value: f32,
    },
    /// Constant bool
    ConstBool {
        /// Value
        value: bool,
    },
    /// Constant float
    ConstFloat {
        /// Value
        value: f32,
    },
    /// Compare a float against a comparand
    FloatComparison {
        /// Operator
        operator: ComparisonOperator,
        /// Comparand used when the comparand pin is unconnected
        comparand: f32,
    },
    /// Logical and
    And,
    /// Logical or
    Or,
    /// Logical not
    Not,
    /// Uniform bone mask
    BoneMask {
        /// Weight
        weight: f32,
    },
    /// Animation clip player
    AnimationClip(ClipDescriptor),
    /// Slot for an externally owned graph instance
    ExternalGraph {
        /// Slot name
        slot_id: StringId,
    },
    /// State machine, states live in its child graph
    StateMachine,
    /// Layer weight and mask inputs of a state
    LayerData,
    /// State machine state
    State(StateDescriptor),
    /// Holds the entry condition of every state
    EntryStateOverrideConduit,
    /// One bool input per state, in state order
    EntryStateOverrideConditions {
        /// State of each input pin
        state_ids: Vec<NodeId>,
    },
    /// Holds the global transition of every state
    GlobalTransitionConduit,
    /// Transitions from one state to another
    TransitionConduit {
        /// Source state
        start_state: NodeId,
        /// Target state
        end_state: NodeId,
    },
    /// Transition inside a conduit
    Transition(TransitionDescriptor),
    /// Transition into a state from any other state
    GlobalTransition {
        /// Target state
        end_state: NodeId,
        /// Transition parameters
        transition: TransitionDescriptor,
    },
    /// True once the conduit's source state is about to complete
    StateCompletedCondition,
    /// Compare a time measure of the conduit's source state
    TimeCondition {
        /// Comparand used when the comparand pin is unconnected
        comparand: f32,
        /// Measure
        comparison_type: TimeComparisonType,
        /// Operator
        operator: ComparisonOperator,
    },
}

/// Type tag used for structural searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeTypeTag {
    /// Result
    Result,
    /// Bool control parameter
    ControlParameterBool,
    /// Float control parameter
    ControlParameterFloat,
    /// Constant bool
    ConstBool,
    /// Constant float
    ConstFloat,
    /// Float comparison
    FloatComparison,
    /// Logical and
    And,
    /// Logical or
    Or,
    /// Logical not
    Not,
    /// Bone mask
    BoneMask,
    /// Animation clip
    AnimationClip,
    /// External graph
    ExternalGraph,
    /// State machine
    StateMachine,
    /// State layer data
    LayerData,
    /// Any state
    State,
    /// Base of every conduit kind
    Conduit,
    /// Entry state override conduit
    EntryStateOverrideConduit,
    /// Entry state override conditions
    EntryStateOverrideConditions,
    /// Global transition conduit
    GlobalTransitionConduit,
    /// Transition conduit
    TransitionConduit,
    /// Transition
    Transition,
    /// Global transition
    GlobalTransition,
    /// State completed condition
    StateCompletedCondition,
    /// Time condition
    TimeCondition,
}

impl NodeTypeTag {
    /// Parent type, for derived matching
    pub fn base(&self) -> Option<NodeTypeTag> {
        match self {
            Self::EntryStateOverrideConduit | Self::GlobalTransitionConduit | Self::TransitionConduit => Some(Self::Conduit),
            Self::GlobalTransition => Some(Self::Transition),
            _ => None,
        }
    }

    /// Whether this type is `other` or derives from it
    pub fn is_a(&self, other: NodeTypeTag) -> bool {
        let mut current = Some(*self);
        while let Some(tag) = current {
            if tag == other {
                return true;
            }
            current = tag.base();
        }
        false
    }

    /// Whether nodes of this type may be placed in a graph
    pub fn allowed_in(&self, graph_type: GraphType) -> bool {
        match self {
            Self::State
            | Self::Conduit
            | Self::EntryStateOverrideConduit
            | Self::GlobalTransitionConduit
            | Self::TransitionConduit => graph_type == GraphType::StateMachine,
            Self::Transition | Self::GlobalTransition | Self::StateCompletedCondition | Self::TimeCondition => {
                graph_type == GraphType::TransitionTree
            }
            Self::LayerData | Self::EntryStateOverrideConditions => graph_type == GraphType::ValueTree,
            Self::AnimationClip | Self::ExternalGraph | Self::StateMachine => graph_type == GraphType::BlendTree,
            Self::Result => matches!(graph_type, GraphType::BlendTree | GraphType::ValueTree),
            Self::ControlParameterBool
            | Self::ControlParameterFloat
            | Self::ConstBool
            | Self::ConstFloat
            | Self::FloatComparison
            | Self::And
            | Self::Or
            | Self::Not
            | Self::BoneMask => graph_type != GraphType::StateMachine,
        }
    }
}

impl ToolsNodeKind {
    /// Type tag of this kind
    pub fn tag(&self) -> NodeTypeTag {
        match self {
            Self::Result { .. } => NodeTypeTag::Result,
            Self::ControlParameterBool { .. } => NodeTypeTag::ControlParameterBool,
            Self::ControlParameterFloat { .. } => NodeTypeTag::ControlParameterFloat,
            Self::ConstBool { .. } => NodeTypeTag::ConstBool,
            Self::ConstFloat { .. } => NodeTypeTag::ConstFloat,
            Self::FloatComparison { .. } => NodeTypeTag::FloatComparison,
            Self::And => NodeTypeTag::And,
            Self::Or => NodeTypeTag::Or,
            Self::Not => NodeTypeTag::Not,
            Self::BoneMask { .. } => NodeTypeTag::BoneMask,
            Self::AnimationClip(_) => NodeTypeTag::AnimationClip,
            Self::ExternalGraph { .. } => NodeTypeTag::ExternalGraph,
            Self::StateMachine => NodeTypeTag::StateMachine,
            Self::LayerData => NodeTypeTag::LayerData,
            Self::State(_) => NodeTypeTag::State,
            Self::EntryStateOverrideConduit => NodeTypeTag::EntryStateOverrideConduit,
            Self::EntryStateOverrideConditions { .. } => NodeTypeTag::EntryStateOverrideConditions,
            Self::GlobalTransitionConduit => NodeTypeTag::GlobalTransitionConduit,
            Self::TransitionConduit { .. } => NodeTypeTag::TransitionConduit,
            Self::Transition(_) => NodeTypeTag::Transition,
            Self::GlobalTransition { .. } => NodeTypeTag::GlobalTransition,
            Self::StateCompletedCondition => NodeTypeTag::StateCompletedCondition,
            Self::TimeCondition { .. } => NodeTypeTag::TimeCondition,
        }
    }

    /// Default display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Result { .. } => "Result",
            Self::ControlParameterBool { .. } => "Bool Parameter",
            Self::ControlParameterFloat { .. } => "Float Parameter",
            Self::ConstBool { .. } => "Bool",
            Self::ConstFloat { .. } => "Float",
            Self::FloatComparison { .. } => "Float Comparison",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::BoneMask { .. } => "Bone Mask",
            Self::AnimationClip(_) => "Animation Clip",
            Self::ExternalGraph { .. } => "External Graph",
            Self::StateMachine => "State Machine",
            Self::LayerData => "Layer Data",
            Self::State(_) => "State",
            Self::EntryStateOverrideConduit => "Entry State Overrides",
            Self::EntryStateOverrideConditions { .. } => "Entry Conditions",
            Self::GlobalTransitionConduit => "Global Transitions",
            Self::TransitionConduit { .. } => "Conduit",
            Self::Transition(_) => "Transition",
            Self::GlobalTransition { .. } => "Global Transition",
            Self::StateCompletedCondition => "State Completed",
            Self::TimeCondition { .. } => "Time Condition",
        }
    }

    fn pins(&self) -> (Vec<Pin>, Vec<Pin>) {
        use GraphValueType as V;

        match self {
            Self::Result { value_type } => (vec![Pin::input("Out", *value_type)], vec![]),
            Self::ControlParameterBool { .. } | Self::ConstBool { .. } | Self::StateCompletedCondition => {
                (vec![], vec![Pin::output("Result", V::Bool)])
            }
            Self::ControlParameterFloat { .. } | Self::ConstFloat { .. } => (vec![], vec![Pin::output("Result", V::Float)]),
            Self::FloatComparison { .. } => (
                vec![Pin::input("Value", V::Float), Pin::input("Comparand", V::Float)],
                vec![Pin::output("Result", V::Bool)],
            ),
            Self::And | Self::Or => (
                vec![Pin::input("A", V::Bool), Pin::input("B", V::Bool)],
                vec![Pin::output("Result", V::Bool)],
            ),
            Self::Not => (vec![Pin::input("Value", V::Bool)], vec![Pin::output("Result", V::Bool)]),
            Self::BoneMask { .. } => (vec![], vec![Pin::output("Bone Mask", V::BoneMask)]),
            Self::AnimationClip(_) | Self::ExternalGraph { .. } | Self::StateMachine => {
                (vec![], vec![Pin::output("Pose", V::Pose)])
            }
            Self::LayerData => (
                vec![Pin::input("Layer Weight", V::Float), Pin::input("Layer Mask", V::BoneMask)],
                vec![],
            ),
            Self::Transition(_) | Self::GlobalTransition { .. } => (
                vec![
                    Pin::input("Condition", V::Bool),
                    Pin::input("Duration Override", V::Float),
                    Pin::input("Sync Event Offset Override", V::Float),
                ],
                vec![],
            ),
            Self::TimeCondition { .. } => (vec![Pin::input("Comparand", V::Float)], vec![Pin::output("Result", V::Bool)]),
            Self::State(_)
            | Self::EntryStateOverrideConduit
            | Self::EntryStateOverrideConditions { .. }
            | Self::GlobalTransitionConduit
            | Self::TransitionConduit { .. } => (vec![], vec![]),
        }
    }
}

/// A node instance in an authoring graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Kind and payload
    pub kind: ToolsNodeKind,
    /// Input pins
    pub inputs: Vec<Pin>,
    /// Output pins
    pub outputs: Vec<Pin>,
    /// Primary nested graph (blend tree, state machine, ...)
    pub child_graph: Option<Box<Graph>>,
    /// Secondary nested graph (layer data, conduit transitions, ...)
    pub secondary_graph: Option<Box<Graph>>,
}

impl Node {
    /// Create a node with its default pins and nested graphs
    pub fn new(kind: ToolsNodeKind) -> Self {
        let (inputs, outputs) = kind.pins();
        let mut node = Self {
            id: NodeId::new(),
            name: kind.display_name().to_string(),
            position: [0.0, 0.0],
            kind,
            inputs,
            outputs,
            child_graph: None,
            secondary_graph: None,
        };
        crate::graphs::build_nested_graphs(&mut node);
        node
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Type tag
    pub fn tag(&self) -> NodeTypeTag {
        self.kind.tag()
    }

    /// Type of value produced on the first output
    pub fn value_type(&self) -> GraphValueType {
        self.outputs.first().map_or(GraphValueType::Unknown, |pin| pin.value_type)
    }

    /// Get an input pin by index
    pub fn input(&self, index: usize) -> Option<&Pin> {
        self.inputs.get(index)
    }

    /// Get an output pin by index
    pub fn output(&self, index: usize) -> Option<&Pin> {
        self.outputs.get(index)
    }

    /// Get a pin by ID
    pub fn pin(&self, pin_id: &PinId) -> Option<&Pin> {
        self.inputs
            .iter()
            .find(|p| p.id == *pin_id)
            .or_else(|| self.outputs.iter().find(|p| p.id == *pin_id))
    }

    /// Get all pins
    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Primary nested graph
    pub fn child_graph(&self) -> Option<&Graph> {
        self.child_graph.as_deref()
    }

    /// Primary nested graph, mutable
    pub fn child_graph_mut(&mut self) -> Option<&mut Graph> {
        self.child_graph.as_deref_mut()
    }

    /// Secondary nested graph
    pub fn secondary_graph(&self) -> Option<&Graph> {
        self.secondary_graph.as_deref()
    }

    /// Secondary nested graph, mutable
    pub fn secondary_graph_mut(&mut self) -> Option<&mut Graph> {
        self.secondary_graph.as_deref_mut()
    }

    /// State payload, if this is a state
    pub fn state(&self) -> Option<&StateDescriptor> {
        match &self.kind {
            ToolsNodeKind::State(state) => Some(state),
            _ => None,
        }
    }
}
