// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled node settings.
//!
//! Every authoring node compiles to exactly one settings record. Records live
//! in a flat table and reference each other by [`NodeIndex`]; optional links
//! hold [`INVALID_INDEX`].

use crate::string_id::StringId;
use crate::time::Percentage;
use crate::value::GraphValueType;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index of a node in the compiled settings table
pub type NodeIndex = i16;

/// Index of a state within its state machine
pub type StateIndex = i16;

/// Marks an absent node link or a failed compile
pub const INVALID_INDEX: i16 = -1;

bitflags! {
    /// Independent options of a transition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TransitionOptions: u8 {
        /// Target is updated in sync with the source
        const SYNCHRONIZED = 1 << 0;
        /// Duration may not exceed the source's remaining time
        const CLAMP_DURATION = 1 << 1;
        /// Target starts at the source's current sync event index
        const KEEP_SYNC_EVENT_INDEX = 1 << 2;
        /// Target starts at the source's percentage through its sync event
        const KEEP_SYNC_EVENT_PERCENTAGE = 1 << 3;
        /// Transition may interrupt an in-progress transition
        const FORCED_TRANSITION_ALLOWED = 1 << 4;
    }
}

/// Blend weight curve of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EasingType {
    /// Linear
    #[default]
    Linear,
    /// Quadratic ease in
    InQuad,
    /// Quadratic ease out
    OutQuad,
    /// Quadratic ease in and out
    InOutQuad,
    /// Cubic ease in and out
    InOutCubic,
}

impl EasingType {
    /// Map linear progress to eased progress
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => t * (2.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let f = 2.0 * t - 2.0;
                    0.5 * f * f * f + 1.0
                }
            }
        }
    }
}

/// How root motion is combined during a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RootMotionBlendMode {
    /// Interpolate source and target
    #[default]
    Blend,
    /// Use only the target's root motion
    IgnoreSource,
    /// Use only the source's root motion
    IgnoreTarget,
}

/// Comparison used by value and condition nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// `a < b`
    LessThan,
    /// `a <= b`
    LessThanEqual,
    /// `a > b`
    #[default]
    GreaterThan,
    /// `a >= b`
    GreaterThanEqual,
    /// `|a - b| <= epsilon`
    NearEqual,
}

impl ComparisonOperator {
    /// Compare two values
    pub fn compare(&self, a: f32, b: f32) -> bool {
        match self {
            Self::LessThan => a < b,
            Self::LessThanEqual => a <= b,
            Self::GreaterThan => a > b,
            Self::GreaterThanEqual => a >= b,
            Self::NearEqual => (a - b).abs() <= 1.0e-4,
        }
    }
}

/// What a time condition measures on its source state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeComparisonType {
    /// Normalized time through the state
    #[default]
    PercentageThroughState,
    /// Progress through the current sync event
    PercentageThroughSyncEvent,
    /// Completed loops
    LoopCount,
    /// Seconds since the state was entered
    ElapsedTime,
}

/// A state event that fires at a time threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Event ID
    pub id: StringId,
    /// Threshold in seconds
    pub time_value: f32,
}

/// Sync marker authored on a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEventMarker {
    /// Event ID
    pub id: StringId,
    /// Where the event starts
    pub start_time: Percentage,
}

/// Event authored on a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipEvent {
    /// Event ID
    pub id: StringId,
    /// Time in seconds from the clip start
    pub time: f32,
}

/// Runtime parameter backed by a bool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlParameterBoolSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Name the gameplay layer sets the value by
    pub parameter_id: StringId,
    /// Initial value
    pub default_value: bool,
}

/// Runtime parameter backed by a float
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlParameterFloatSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Name the gameplay layer sets the value by
    pub parameter_id: StringId,
    /// Initial value
    pub default_value: f32,
}

/// Constant bool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstBoolSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Value
    pub value: bool,
}

/// Constant float
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstFloatSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Value
    pub value: f32,
}

/// Compare a float input against a comparand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatComparisonSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Value being compared
    pub input_node_index: NodeIndex,
    /// Optional comparand input, overrides `comparand`
    pub comparand_node_index: NodeIndex,
    /// Constant comparand
    pub comparand: f32,
    /// Operator
    pub operator: ComparisonOperator,
}

/// True when every condition is true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Conditions
    pub condition_node_indices: Vec<NodeIndex>,
}

/// True when any condition is true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Conditions
    pub condition_node_indices: Vec<NodeIndex>,
}

/// Negate a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Condition
    pub input_node_index: NodeIndex,
}

/// Uniform bone mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneMaskSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Weight applied to every bone
    pub weight: f32,
}

/// Play an animation clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClipSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Clip resource ID
    pub clip_id: StringId,
    /// Clip length in seconds
    pub duration: f32,
    /// Whether playback wraps around
    pub looping: bool,
    /// Sync markers
    pub sync_events: Vec<SyncEventMarker>,
    /// Authored events
    pub events: Vec<ClipEvent>,
    /// Root motion per second of playback
    pub root_motion_velocity: [f32; 3],
}

/// Slot for an externally owned graph instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalGraphSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Slot name used to attach instances
    pub slot_id: StringId,
}

/// One outgoing transition of a state machine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachineTransitionSettings {
    /// State entered when the transition completes
    pub target_state_index: StateIndex,
    /// Compiled transition node
    pub transition_node_index: NodeIndex,
    /// Bool node that triggers the transition
    pub condition_node_index: NodeIndex,
}

/// One state of a state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachineStateSettings {
    /// Compiled state node
    pub state_node_index: NodeIndex,
    /// Optional bool node that selects this state on entry
    pub entry_condition_node_index: NodeIndex,
    /// Outgoing transitions in evaluation order
    pub transition_settings: Vec<StateMachineTransitionSettings>,
}

impl Default for StateMachineStateSettings {
    fn default() -> Self {
        Self {
            state_node_index: INVALID_INDEX,
            entry_condition_node_index: INVALID_INDEX,
            transition_settings: Vec::new(),
        }
    }
}

/// State table of a state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachineSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// States in declaration order
    pub state_settings: Vec<StateMachineStateSettings>,
    /// State used when no entry condition passes
    pub default_state_index: StateIndex,
}

/// A state machine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Pose-producing child, absent for off states and empty blend trees
    pub child_node_index: NodeIndex,
    /// Optional layer weight (float)
    pub layer_weight_node_index: NodeIndex,
    /// Optional layer mask (bone mask)
    pub layer_bone_mask_node_index: NodeIndex,
    /// Events sampled while transitioning in
    pub entry_events: Vec<StringId>,
    /// Events sampled while fully active
    pub execute_events: Vec<StringId>,
    /// Events sampled while transitioning out
    pub exit_events: Vec<StringId>,
    /// Events sampled once the remaining time drops below a threshold
    pub timed_remaining_events: Vec<TimedEvent>,
    /// Events sampled once the elapsed time passes a threshold
    pub timed_elapsed_events: Vec<TimedEvent>,
    /// Produces no pose
    pub is_off_state: bool,
}

/// A transition between two states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// Compiled state node being transitioned to
    pub target_state_node_index: NodeIndex,
    /// Optional float node overriding `duration`
    pub duration_override_node_index: NodeIndex,
    /// Optional float node overriding `sync_event_offset`
    pub sync_event_offset_override_node_index: NodeIndex,
    /// Blend curve
    pub blend_weight_easing: EasingType,
    /// Root motion combination
    pub root_motion_blend: RootMotionBlendMode,
    /// Duration in seconds
    pub duration: f32,
    /// Offset in sync events applied to the target's start time
    pub sync_event_offset: f32,
    /// Option flags
    pub options: TransitionOptions,
}

/// True once the source state is about to complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCompletedConditionSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// State being checked
    pub source_state_node_index: NodeIndex,
    /// Optional float node overriding `transition_duration`
    pub duration_override_node_index: NodeIndex,
    /// Duration of the transition this condition guards
    pub transition_duration: f32,
}

/// Compare a time measure of the source state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConditionSettings {
    /// Own index
    pub node_index: NodeIndex,
    /// State being checked
    pub source_state_node_index: NodeIndex,
    /// Optional float comparand input
    pub input_value_node_index: NodeIndex,
    /// Constant comparand
    pub comparand: f32,
    /// Measure
    pub comparison_type: TimeComparisonType,
    /// Operator
    pub operator: ComparisonOperator,
}

macro_rules! impl_invalid_defaults {
    ($($ty:ident { $($field:ident : $value:expr),* $(,)? }),* $(,)?) => {
        $(
            impl Default for $ty {
                fn default() -> Self {
                    Self {
                        node_index: INVALID_INDEX,
                        $($field: $value,)*
                    }
                }
            }
        )*
    };
}

impl_invalid_defaults! {
    ControlParameterBoolSettings { parameter_id: StringId::invalid(), default_value: false },
    ControlParameterFloatSettings { parameter_id: StringId::invalid(), default_value: 0.0 },
    ConstBoolSettings { value: false },
    ConstFloatSettings { value: 0.0 },
    FloatComparisonSettings {
        input_node_index: INVALID_INDEX,
        comparand_node_index: INVALID_INDEX,
        comparand: 0.0,
        operator: ComparisonOperator::default(),
    },
    AndSettings { condition_node_indices: Vec::new() },
    OrSettings { condition_node_indices: Vec::new() },
    NotSettings { input_node_index: INVALID_INDEX },
    BoneMaskSettings { weight: 1.0 },
    AnimationClipSettings {
        clip_id: StringId::invalid(),
        duration: 0.0,
        looping: true,
        sync_events: Vec::new(),
        events: Vec::new(),
        root_motion_velocity: [0.0; 3],
    },
    ExternalGraphSettings { slot_id: StringId::invalid() },
    StateMachineSettings { state_settings: Vec::new(), default_state_index: INVALID_INDEX },
    StateSettings {
        child_node_index: INVALID_INDEX,
        layer_weight_node_index: INVALID_INDEX,
        layer_bone_mask_node_index: INVALID_INDEX,
        entry_events: Vec::new(),
        execute_events: Vec::new(),
        exit_events: Vec::new(),
        timed_remaining_events: Vec::new(),
        timed_elapsed_events: Vec::new(),
        is_off_state: false,
    },
    TransitionSettings {
        target_state_node_index: INVALID_INDEX,
        duration_override_node_index: INVALID_INDEX,
        sync_event_offset_override_node_index: INVALID_INDEX,
        blend_weight_easing: EasingType::default(),
        root_motion_blend: RootMotionBlendMode::default(),
        duration: 0.0,
        sync_event_offset: 0.0,
        options: TransitionOptions::empty(),
    },
    StateCompletedConditionSettings {
        source_state_node_index: INVALID_INDEX,
        duration_override_node_index: INVALID_INDEX,
        transition_duration: 0.0,
    },
    TimeConditionSettings {
        source_state_node_index: INVALID_INDEX,
        input_value_node_index: INVALID_INDEX,
        comparand: 0.0,
        comparison_type: TimeComparisonType::default(),
        operator: ComparisonOperator::default(),
    },
}

/// Settings record of any node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeSettings {
    /// Bool control parameter
    ControlParameterBool(ControlParameterBoolSettings),
    /// Float control parameter
    ControlParameterFloat(ControlParameterFloatSettings),
    /// Constant bool
    ConstBool(ConstBoolSettings),
    /// Constant float
    ConstFloat(ConstFloatSettings),
    /// Float comparison
    FloatComparison(FloatComparisonSettings),
    /// Logical and
    And(AndSettings),
    /// Logical or
    Or(OrSettings),
    /// Logical not
    Not(NotSettings),
    /// Bone mask
    BoneMask(BoneMaskSettings),
    /// Animation clip
    AnimationClip(AnimationClipSettings),
    /// External graph slot
    ExternalGraph(ExternalGraphSettings),
    /// State machine
    StateMachine(StateMachineSettings),
    /// State machine state
    State(StateSettings),
    /// State machine transition
    Transition(TransitionSettings),
    /// State completed condition
    StateCompletedCondition(StateCompletedConditionSettings),
    /// Time condition
    TimeCondition(TimeConditionSettings),
}

/// A concrete settings type stored in [`NodeSettings`]
pub trait CompiledSettings: Default + Into<NodeSettings> {
    /// Display name of the node kind
    const KIND: &'static str;

    /// Borrow this type out of a settings record
    fn from_node_settings(settings: &NodeSettings) -> Option<&Self>;

    /// Own index in the settings table
    fn node_index(&self) -> NodeIndex;

    /// Create a default record for a table slot
    fn with_node_index(node_index: NodeIndex) -> Self;
}

macro_rules! impl_compiled_settings {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for NodeSettings {
                fn from(settings: $ty) -> Self {
                    NodeSettings::$variant(settings)
                }
            }

            impl CompiledSettings for $ty {
                const KIND: &'static str = stringify!($variant);

                fn from_node_settings(settings: &NodeSettings) -> Option<&Self> {
                    match settings {
                        NodeSettings::$variant(s) => Some(s),
                        _ => None,
                    }
                }

                fn node_index(&self) -> NodeIndex {
                    self.node_index
                }

                fn with_node_index(node_index: NodeIndex) -> Self {
                    Self {
                        node_index,
                        ..Default::default()
                    }
                }
            }
        )*

        impl NodeSettings {
            /// Own index in the settings table
            pub fn node_index(&self) -> NodeIndex {
                match self {
                    $(NodeSettings::$variant(s) => s.node_index,)*
                }
            }

            /// Display name of the node kind
            pub fn kind_name(&self) -> &'static str {
                match self {
                    $(NodeSettings::$variant(_) => <$ty as CompiledSettings>::KIND,)*
                }
            }
        }
    };
}

impl_compiled_settings! {
    ControlParameterBoolSettings => ControlParameterBool,
    ControlParameterFloatSettings => ControlParameterFloat,
    ConstBoolSettings => ConstBool,
    ConstFloatSettings => ConstFloat,
    FloatComparisonSettings => FloatComparison,
    AndSettings => And,
    OrSettings => Or,
    NotSettings => Not,
    BoneMaskSettings => BoneMask,
    AnimationClipSettings => AnimationClip,
    ExternalGraphSettings => ExternalGraph,
    StateMachineSettings => StateMachine,
    StateSettings => State,
    TransitionSettings => Transition,
    StateCompletedConditionSettings => StateCompletedCondition,
    TimeConditionSettings => TimeCondition,
}

impl NodeSettings {
    /// Type of value the node produces
    pub fn value_type(&self) -> GraphValueType {
        match self {
            Self::ControlParameterBool(_)
            | Self::ConstBool(_)
            | Self::FloatComparison(_)
            | Self::And(_)
            | Self::Or(_)
            | Self::Not(_)
            | Self::StateCompletedCondition(_)
            | Self::TimeCondition(_) => GraphValueType::Bool,
            Self::ControlParameterFloat(_) | Self::ConstFloat(_) => GraphValueType::Float,
            Self::BoneMask(_) => GraphValueType::BoneMask,
            Self::AnimationClip(_)
            | Self::ExternalGraph(_)
            | Self::StateMachine(_)
            | Self::State(_)
            | Self::Transition(_) => GraphValueType::Pose,
        }
    }
}

/// Control parameter exposed to the gameplay layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlParameterBinding {
    /// Parameter name
    pub parameter_id: StringId,
    /// Node holding the value
    pub node_index: NodeIndex,
}

/// External graph slot exposed to the gameplay layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalGraphSlot {
    /// Slot name
    pub slot_id: StringId,
    /// External graph node
    pub node_index: NodeIndex,
}

/// Output of a successful compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Flat settings table
    pub node_settings: Vec<NodeSettings>,
    /// Authoring node each settings record was compiled from
    pub node_ids: Vec<Uuid>,
    /// Root pose node
    pub root_node_index: NodeIndex,
    /// Control parameters in compile order
    pub control_parameters: Vec<ControlParameterBinding>,
    /// External graph slots in compile order
    pub external_graph_slots: Vec<ExternalGraphSlot>,
}

impl GraphDefinition {
    /// Number of compiled nodes
    pub fn num_nodes(&self) -> usize {
        self.node_settings.len()
    }

    /// Settings of a node
    pub fn settings(&self, node_index: NodeIndex) -> Option<&NodeSettings> {
        usize::try_from(node_index).ok().and_then(|i| self.node_settings.get(i))
    }

    /// Settings of a node as a concrete type
    pub fn typed_settings<T: CompiledSettings>(&self, node_index: NodeIndex) -> Option<&T> {
        self.settings(node_index).and_then(T::from_node_settings)
    }

    /// Runtime index of an authoring node, or [`INVALID_INDEX`]
    pub fn runtime_node_index(&self, node_id: Uuid) -> NodeIndex {
        self.node_ids
            .iter()
            .position(|id| *id == node_id)
            .map_or(INVALID_INDEX, |i| i as NodeIndex)
    }

    /// Slot node for an external graph slot
    pub fn external_graph_slot(&self, slot_id: &StringId) -> Option<NodeIndex> {
        self.external_graph_slots
            .iter()
            .find(|s| &s.slot_id == slot_id)
            .map(|s| s.node_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_use_invalid_index() {
        let state = StateSettings::with_node_index(4);
        assert_eq!(state.node_index, 4);
        assert_eq!(state.child_node_index, INVALID_INDEX);
        assert_eq!(state.layer_weight_node_index, INVALID_INDEX);
        assert!(!state.is_off_state);
    }

    #[test]
    fn test_typed_lookup() {
        let settings: NodeSettings = ConstBoolSettings { node_index: 0, value: true }.into();
        assert!(ConstBoolSettings::from_node_settings(&settings).is_some());
        assert!(ConstFloatSettings::from_node_settings(&settings).is_none());
        assert_eq!(settings.kind_name(), "ConstBool");
        assert_eq!(settings.value_type(), GraphValueType::Bool);
    }

    #[test]
    fn test_easing_endpoints() {
        for easing in [
            EasingType::Linear,
            EasingType::InQuad,
            EasingType::OutQuad,
            EasingType::InOutQuad,
            EasingType::InOutCubic,
        ] {
            assert!(easing.apply(0.0).abs() < 1e-6);
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6);
        }
    }
}
