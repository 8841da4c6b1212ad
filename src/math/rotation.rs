use glam::{Quat, Vec3};
use std::f32::consts::{PI, TAU};

const DEGENERATE: f32 = 1e-9;

/// Shortest rotation carrying direction `from` onto direction `to`.
///
/// Zero-length or non-finite input yields the identity.
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    let a = from.length_squared();
    let b = to.length_squared();
    if !(a > DEGENERATE && b > DEGENERATE) || !a.is_finite() || !b.is_finite() {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(from / a.sqrt(), to / b.sqrt())
}

/// Rotation angle in `[0, PI]`.
pub fn angle_of(rotation: Quat) -> f32 {
    let w = rotation.w.abs().min(1.0);
    2.0 * w.acos()
}

/// Limits a rotation to at most `max_angle` radians, keeping its axis.
pub fn clamp_to_angle(rotation: Quat, max_angle: f32) -> Quat {
    let rotation = if rotation.w < 0.0 { -rotation } else { rotation };
    let angle = angle_of(rotation);
    if angle <= max_angle {
        return rotation;
    }
    let axis = Vec3::new(rotation.x, rotation.y, rotation.z);
    if axis.length_squared() < DEGENERATE {
        return Quat::IDENTITY;
    }
    Quat::from_axis_angle(axis.normalize(), max_angle.max(0.0))
}

/// Scales a rotation's angle by `factor`.
pub fn scale_rotation(rotation: Quat, factor: f32) -> Quat {
    let rotation = if rotation.w < 0.0 { -rotation } else { rotation };
    let (axis, angle) = rotation.to_axis_angle();
    if !axis.is_finite() || angle.abs() < 1e-7 {
        return Quat::IDENTITY;
    }
    Quat::from_axis_angle(axis, angle * factor)
}

/// Splits `rotation` into `(swing, twist)` so that `rotation = swing * twist`
/// and `twist` is a rotation about +Y.
pub fn swing_twist_y(rotation: Quat) -> (Quat, Quat) {
    let projected = Quat::from_xyzw(0.0, rotation.y, 0.0, rotation.w);
    let len = projected.length();
    let twist = if len < 1e-7 {
        Quat::IDENTITY
    } else {
        projected / len
    };
    let swing = (rotation * twist.conjugate()).normalize();
    (swing, twist)
}

/// Signed twist angle about +Y, wrapped into `[0, TAU)`.
pub fn twist_angle_y(rotation: Quat) -> f32 {
    let (_, twist) = swing_twist_y(rotation);
    wrap_tau(2.0 * twist.y.atan2(twist.w))
}

/// Wraps an angle into `[0, TAU)`.
pub fn wrap_tau(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Signed difference `a - b` wrapped into `(-PI, PI]`.
pub fn signed_angle_difference(a: f32, b: f32) -> f32 {
    let d = wrap_tau(a - b);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Any unit vector perpendicular to `v`.
pub fn any_orthogonal(v: Vec3) -> Vec3 {
    let o = v.any_orthonormal_vector();
    if o.is_finite() {
        o
    } else {
        Vec3::X
    }
}
