//! Time-driven animation rules attached to scene nodes.
//!
//! A rule is a pure function of the wall-clock reading in milliseconds. It
//! yields a [`TransformDelta`] which the animation loop applies to the node's
//! local transform right before rendering.

use serde::{Deserialize, Serialize};

use crate::data_structures::instance::Instance;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnimationRule {
    /// Vertical bobbing: `y = sin(t / period_ms) * amplitude + offset`.
    Bob {
        period_ms: f64,
        amplitude: f32,
        offset: f32,
    },
    /// Wave rocking: a small rotation about the local X axis driven by a sine,
    /// followed by one about the local Z axis driven by a cosine of the same
    /// frequency, which keeps the two axes a quarter period apart.
    Rock { period_ms: f64, amplitude: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformDelta {
    SetPositionY(f32),
    RotateLocal { x: f32, z: f32 },
}

impl AnimationRule {
    pub fn evaluate(&self, now_ms: f64) -> TransformDelta {
        match *self {
            AnimationRule::Bob {
                period_ms,
                amplitude,
                offset,
            } => TransformDelta::SetPositionY(
                (now_ms / period_ms).sin() as f32 * amplitude + offset,
            ),
            AnimationRule::Rock {
                period_ms,
                amplitude,
            } => {
                let phase = now_ms / period_ms;
                TransformDelta::RotateLocal {
                    x: phase.sin() as f32 * amplitude,
                    z: phase.cos() as f32 * amplitude,
                }
            }
        }
    }

    /// Length of one full cycle in milliseconds.
    pub fn period(&self) -> f64 {
        match *self {
            AnimationRule::Bob { period_ms, .. } | AnimationRule::Rock { period_ms, .. } => {
                period_ms * std::f64::consts::TAU
            }
        }
    }
}

impl TransformDelta {
    pub fn apply(&self, instance: &mut Instance) {
        match *self {
            TransformDelta::SetPositionY(y) => instance.position.y = y,
            TransformDelta::RotateLocal { x, z } => {
                instance.rotate_local(cgmath::Vector3::unit_x(), x);
                instance.rotate_local(cgmath::Vector3::unit_z(), z);
            }
        }
    }
}
