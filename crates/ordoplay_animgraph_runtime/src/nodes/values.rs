// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value node evaluation.

use super::{NodeEvaluator, NodeRuntime};
use crate::settings::{NodeIndex, NodeSettings, INVALID_INDEX};

/// Current value of a control parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ParameterValue {
    Bool(bool),
    Float(f32),
}

/// Value computed during the current update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct ValueCache {
    update_id: u32,
    value: Option<CachedValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CachedValue {
    Bool(bool),
    Float(f32),
}

impl NodeEvaluator<'_> {
    fn cached_value(&self, node_index: NodeIndex) -> Option<CachedValue> {
        match &self.node(node_index).runtime {
            NodeRuntime::Value(cache) if cache.update_id == self.context.update_id => cache.value,
            _ => None,
        }
    }

    fn store_value(&mut self, node_index: NodeIndex, value: CachedValue) {
        let update_id = self.context.update_id;
        if let NodeRuntime::Value(cache) = &mut self.node_mut(node_index).runtime {
            cache.update_id = update_id;
            cache.value = Some(value);
        }
    }

    /// Evaluate a bool node
    pub fn bool_value(&mut self, node_index: NodeIndex) -> bool {
        if let Some(CachedValue::Bool(value)) = self.cached_value(node_index) {
            return value;
        }

        let value = match self.settings(node_index) {
            NodeSettings::ControlParameterBool(_) => match self.node(node_index).runtime {
                NodeRuntime::ControlParameter(ParameterValue::Bool(value)) => value,
                _ => false,
            },
            NodeSettings::ConstBool(settings) => settings.value,
            NodeSettings::FloatComparison(settings) => {
                let value = self.float_value(settings.input_node_index);
                let comparand = if settings.comparand_node_index != INVALID_INDEX {
                    self.float_value(settings.comparand_node_index)
                } else {
                    settings.comparand
                };
                settings.operator.compare(value, comparand)
            }
            NodeSettings::And(settings) => settings.condition_node_indices.iter().all(|i| self.bool_value(*i)),
            NodeSettings::Or(settings) => settings.condition_node_indices.iter().any(|i| self.bool_value(*i)),
            NodeSettings::Not(settings) => !self.bool_value(settings.input_node_index),
            NodeSettings::StateCompletedCondition(settings) => self.evaluate_state_completed(settings),
            NodeSettings::TimeCondition(settings) => self.evaluate_time_condition(settings),
            other => panic!("{} does not produce a bool", other.kind_name()),
        };

        self.store_value(node_index, CachedValue::Bool(value));
        value
    }

    /// Evaluate a float node
    pub fn float_value(&mut self, node_index: NodeIndex) -> f32 {
        if let Some(CachedValue::Float(value)) = self.cached_value(node_index) {
            return value;
        }

        let value = match self.settings(node_index) {
            NodeSettings::ControlParameterFloat(_) => match self.node(node_index).runtime {
                NodeRuntime::ControlParameter(ParameterValue::Float(value)) => value,
                _ => 0.0,
            },
            NodeSettings::ConstFloat(settings) => settings.value,
            other => panic!("{} does not produce a float", other.kind_name()),
        };

        self.store_value(node_index, CachedValue::Float(value));
        value
    }

    /// Evaluate a bone mask node as a uniform weight
    pub fn bone_mask_value(&mut self, node_index: NodeIndex) -> f32 {
        match self.settings(node_index) {
            NodeSettings::BoneMask(settings) => settings.weight,
            other => panic!("{} does not produce a bone mask", other.kind_name()),
        }
    }
}
