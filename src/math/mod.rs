//! Math utilities module
//!
//! Rigid transforms, the frame arena the solvers mutate, and the rotation
//! helpers shared by constraints and solvers.

mod frame;
mod rotation;
mod transform;

pub use frame::{FrameArena, FrameId};
pub use rotation::{
    angle_of, any_orthogonal, clamp_to_angle, rotation_between, scale_rotation,
    signed_angle_difference, swing_twist_y, twist_angle_y, wrap_tau,
};
pub use transform::Transform;

// Re-export commonly used glam types
pub use glam::{Quat, Vec3};
