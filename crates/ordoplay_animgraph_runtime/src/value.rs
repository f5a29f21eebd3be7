// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value types flowing between graph nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of value produced by a graph node or carried by a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphValueType {
    /// Not yet resolved
    #[default]
    Unknown,
    /// Boolean value
    Bool,
    /// String ID value
    Id,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 3D vector
    Vector,
    /// Look-at / IK target
    Target,
    /// Per-bone weight mask
    BoneMask,
    /// Skeletal pose
    Pose,
    /// Special pins (state machine plumbing)
    Special,
}

impl GraphValueType {
    /// Label used in compilation messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Bool => "Bool",
            Self::Id => "ID",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Vector => "Vector",
            Self::Target => "Target",
            Self::BoneMask => "BoneMask",
            Self::Pose => "Pose",
            Self::Special => "Special",
        }
    }

    /// Check if an output of this type can feed an input of `other`
    pub fn can_connect_to(&self, other: &GraphValueType) -> bool {
        if matches!(self, Self::Unknown) || matches!(other, Self::Unknown) {
            return false;
        }

        self == other
    }
}

impl fmt::Display for GraphValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
