// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions for node inputs/outputs.

use ordoplay_animgraph_runtime::GraphValueType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinId(pub Uuid);

impl PinId {
    /// Create a new random pin ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PinId {
    fn default() -> Self {
        Self::new()
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinDirection {
    /// Input pin
    Input,
    /// Output pin
    Output,
}

/// A pin on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    /// Unique pin ID
    pub id: PinId,
    /// Pin name
    pub name: String,
    /// Pin direction
    pub direction: PinDirection,
    /// Value type flowing through the pin
    pub value_type: GraphValueType,
    /// Whether several links may share this pin
    pub multi_connect: bool,
}

impl Pin {
    /// Create a new input pin
    pub fn input(name: impl Into<String>, value_type: GraphValueType) -> Self {
        Self {
            id: PinId::new(),
            name: name.into(),
            direction: PinDirection::Input,
            value_type,
            multi_connect: false,
        }
    }

    /// Create a new output pin
    pub fn output(name: impl Into<String>, value_type: GraphValueType) -> Self {
        Self {
            id: PinId::new(),
            name: name.into(),
            direction: PinDirection::Output,
            value_type,
            multi_connect: true, // Outputs can feed several inputs
        }
    }

    /// Check if a connection to another pin is valid
    pub fn can_connect(&self, other: &Pin) -> bool {
        // Output feeds input only
        if self.direction == other.direction {
            return false;
        }

        self.value_type.can_connect_to(&other.value_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_compatibility() {
        let output = Pin::output("Result", GraphValueType::Bool);
        assert!(output.can_connect(&Pin::input("Condition", GraphValueType::Bool)));
        assert!(!output.can_connect(&Pin::input("Duration", GraphValueType::Float)));
        assert!(!output.can_connect(&Pin::output("Other", GraphValueType::Bool)));
    }
}
