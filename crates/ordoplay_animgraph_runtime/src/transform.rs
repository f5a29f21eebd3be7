// SPDX-License-Identifier: MIT OR Apache-2.0
//! Minimal rigid transform used for world placement and root motion.

use serde::{Deserialize, Serialize};

/// Translation, rotation (quaternion `x, y, z, w`) and uniform scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation
    pub translation: [f32; 3],
    /// Rotation quaternion
    pub rotation: [f32; 4],
    /// Uniform scale
    pub scale: f32,
}

impl Transform {
    /// The identity transform
    pub const IDENTITY: Self = Self {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: 1.0,
    };

    /// Create a pure translation
    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Interpolate between two transforms
    ///
    /// Rotation uses a normalized lerp along the shortest arc.
    pub fn lerp(&self, other: &Transform, t: f32) -> Transform {
        let t = t.clamp(0.0, 1.0);

        let mut translation = [0.0; 3];
        for (i, value) in translation.iter_mut().enumerate() {
            *value = self.translation[i] + (other.translation[i] - self.translation[i]) * t;
        }

        let dot: f32 = self.rotation.iter().zip(other.rotation.iter()).map(|(a, b)| a * b).sum();
        let sign = if dot < 0.0 { -1.0 } else { 1.0 };
        let mut rotation = [0.0; 4];
        for (i, value) in rotation.iter_mut().enumerate() {
            *value = self.rotation[i] + (other.rotation[i] * sign - self.rotation[i]) * t;
        }
        let length = rotation.iter().map(|v| v * v).sum::<f32>().sqrt();
        if length > f32::EPSILON {
            for value in &mut rotation {
                *value /= length;
            }
        } else {
            rotation = Self::IDENTITY.rotation;
        }

        Transform {
            translation,
            rotation,
            scale: self.scale + (other.scale - self.scale) * t,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
