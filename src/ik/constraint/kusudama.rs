use glam::Vec3;
use std::f32::consts::TAU;

use super::limit_cone::{LimitCone, PairHit};
use crate::error::{IkError, Result};
use crate::math::{
    rotation_between, scale_rotation, signed_angle_difference, twist_angle_y, wrap_tau, FrameArena,
    FrameId,
};

/// Slack used when testing twist bounds so a freshly clamped bone reads as
/// in range.
const TWIST_EPSILON: f32 = 1e-4;

/// Result of projecting a heading into the allowed swing region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub heading: Vec3,
    pub in_bounds: bool,
    /// Softness of the cone (or cone pair) whose boundary was nearest.
    pub softness: f32,
}

/// Swing/twist joint constraint.
///
/// Swing is limited to the union of an ordered list of [`LimitCone`]s plus
/// the tangent bands joining each cone to the next one. Twist about the
/// constraint frame's Y axis is limited to `[min, min + range)` modulo a
/// full turn. All directions are expressed in the constraint's own frame,
/// which lives in the frame arena as a sibling of the constrained bone.
#[derive(Debug, Clone)]
pub struct Kusudama {
    frame: FrameId,
    cones: Vec<LimitCone>,
    min_axial_angle: f32,
    axial_range: f32,
    orientation_constrained: bool,
    axially_constrained: bool,
    strength: f32,
}

impl Kusudama {
    pub(crate) fn new(frame: FrameId) -> Self {
        Self {
            frame,
            cones: Vec::new(),
            min_axial_angle: 0.0,
            axial_range: TAU,
            orientation_constrained: true,
            axially_constrained: true,
            strength: 1.0,
        }
    }

    /// Frame the cones and twist limits are expressed in.
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn cones(&self) -> &[LimitCone] {
        &self.cones
    }

    pub fn min_axial_angle(&self) -> f32 {
        self.min_axial_angle
    }

    pub fn axial_range(&self) -> f32 {
        self.axial_range
    }

    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: f32) {
        self.strength = strength.clamp(0.0, 1.0);
    }

    pub fn is_orientation_constrained(&self) -> bool {
        self.orientation_constrained
    }

    pub fn is_axially_constrained(&self) -> bool {
        self.axially_constrained
    }

    pub fn enable_orientational_limits(&mut self) {
        self.orientation_constrained = true;
    }

    pub fn disable_orientational_limits(&mut self) {
        self.orientation_constrained = false;
    }

    pub fn enable_axial_limits(&mut self) {
        self.axially_constrained = true;
    }

    pub fn disable_axial_limits(&mut self) {
        self.axially_constrained = false;
    }

    /// Twist range is clamped to `[0, TAU]`; the minimum is wrapped.
    pub fn set_axial_limits(&mut self, min_angle: f32, range: f32) {
        self.min_axial_angle = if min_angle.is_finite() {
            wrap_tau(min_angle)
        } else {
            0.0
        };
        self.axial_range = if range.is_finite() {
            range.clamp(0.0, TAU)
        } else {
            TAU
        };
    }

    pub fn add_limit_cone(&mut self, direction: Vec3, radius: f32) {
        self.cones.push(LimitCone::new(direction, radius));
        self.update_tangent_handles();
    }

    pub fn insert_limit_cone(&mut self, index: usize, direction: Vec3, radius: f32) -> Result<()> {
        if index > self.cones.len() {
            return Err(self.cone_index_error(index));
        }
        self.cones.insert(index, LimitCone::new(direction, radius));
        self.update_tangent_handles();
        Ok(())
    }

    pub fn remove_limit_cone(&mut self, index: usize) -> Result<LimitCone> {
        if index >= self.cones.len() {
            return Err(self.cone_index_error(index));
        }
        let removed = self.cones.remove(index);
        self.update_tangent_handles();
        Ok(removed)
    }

    pub fn set_cone_control_point(&mut self, index: usize, direction: Vec3) -> Result<()> {
        self.cone_mut(index)?.set_control_point(direction);
        self.update_tangent_handles();
        Ok(())
    }

    pub fn set_cone_radius(&mut self, index: usize, radius: f32) -> Result<()> {
        self.cone_mut(index)?.set_radius(radius);
        self.update_tangent_handles();
        Ok(())
    }

    pub fn set_cone_softness(&mut self, index: usize, softness: f32) -> Result<()> {
        self.cone_mut(index)?.set_softness(softness);
        Ok(())
    }

    fn cone_mut(&mut self, index: usize) -> Result<&mut LimitCone> {
        let count = self.cones.len();
        self.cones
            .get_mut(index)
            .ok_or(IkError::ConeIndex { index, count })
    }

    fn cone_index_error(&self, index: usize) -> IkError {
        IkError::ConeIndex {
            index,
            count: self.cones.len(),
        }
    }

    /// Refreshes every cone's tangent cache against its successor.
    pub fn update_tangent_handles(&mut self) {
        for i in 0..self.cones.len() {
            let next = self.cones.get(i + 1).cloned();
            self.cones[i].update_tangent_handles(next.as_ref());
        }
    }

    /// Projects a heading (in constraint space) into the allowed region.
    pub fn point_in_limits(&self, heading: Vec3) -> Projection {
        let point = heading.normalize_or_zero();
        let unchanged = Projection {
            heading: point,
            in_bounds: true,
            softness: 0.0,
        };
        if !self.orientation_constrained || self.cones.is_empty() || point == Vec3::ZERO {
            return unchanged;
        }

        if let [cone] = self.cones.as_slice() {
            return match cone.closest_to_cone(point) {
                None => unchanged,
                Some(rim) => Projection {
                    heading: rim,
                    in_bounds: false,
                    softness: cone.softness(),
                },
            };
        }

        let mut best: Option<Projection> = None;
        let mut best_cos = f32::NEG_INFINITY;
        for pair in self.cones.windows(2) {
            match pair[0].bounds_to_next(&pair[1], point) {
                PairHit::Inside => return unchanged,
                PairHit::Boundary(candidate) => {
                    let cos = candidate.dot(point);
                    if cos > best_cos {
                        best_cos = cos;
                        best = Some(Projection {
                            heading: candidate,
                            in_bounds: false,
                            softness: pair[0].softness().max(pair[1].softness()),
                        });
                    }
                }
            }
        }
        best.unwrap_or(unchanged)
    }

    /// Swings `bone_frame` back inside the cone region. Returns whether a
    /// correction was applied.
    pub fn snap_to_orientation_limits(&self, frames: &mut FrameArena, bone_frame: FrameId) -> bool {
        if !self.orientation_constrained || self.cones.is_empty() {
            return false;
        }
        let limits = frames.global(self.frame);
        let heading = limits.inverse_transform_direction(frames.basis_y(bone_frame));
        let projection = self.point_in_limits(heading);
        if projection.in_bounds {
            return false;
        }
        let local_fix = rotation_between(heading, projection.heading);
        let local_fix = scale_rotation(local_fix, self.strength * (1.0 - projection.softness));
        let global_fix = limits.rotation * local_fix * limits.rotation.conjugate();
        frames.rotate_by(bone_frame, global_fix.normalize());
        true
    }

    /// Signed spin about the bone's own Y that would bring its twist back
    /// into range, or zero when it already is.
    pub fn twist_correction(&self, frames: &FrameArena, bone_frame: FrameId) -> f32 {
        if !self.axially_constrained || self.axial_range >= TAU {
            return 0.0;
        }
        let limits = frames.global(self.frame);
        let relative = limits.rotation.conjugate() * frames.global(bone_frame).rotation;
        let twist = twist_angle_y(relative);
        let offset = wrap_tau(twist - self.min_axial_angle);
        if offset <= self.axial_range + TWIST_EPSILON || offset >= TAU - TWIST_EPSILON {
            return 0.0;
        }
        let to_min = signed_angle_difference(self.min_axial_angle, twist);
        let to_max = signed_angle_difference(self.min_axial_angle + self.axial_range, twist);
        if to_min.abs() < to_max.abs() {
            to_min
        } else {
            to_max
        }
    }

    /// Spins `bone_frame` about its own Y to the nearer twist bound. Returns
    /// the magnitude of the applied spin.
    pub fn snap_to_twist_limits(&self, frames: &mut FrameArena, bone_frame: FrameId) -> f32 {
        let correction = self.twist_correction(frames, bone_frame) * self.strength;
        if correction == 0.0 {
            return 0.0;
        }
        frames.rotate_about_local_y(bone_frame, correction);
        correction.abs()
    }

    /// Swing projection followed by twist projection.
    pub fn snap_to_limits(&self, frames: &mut FrameArena, bone_frame: FrameId) {
        self.snap_to_orientation_limits(frames, bone_frame);
        self.snap_to_twist_limits(frames, bone_frame);
    }

    /// Re-centres the constraint frame's Y on the weighted mean cone
    /// direction. Cone placement in world space is preserved.
    pub fn optimize_limiting_axes(&mut self, frames: &mut FrameArena) {
        if self.cones.is_empty() {
            return;
        }
        let mean: Vec3 = self
            .cones
            .iter()
            .map(|c| c.control_point() * c.radius())
            .sum();
        let mean = mean.normalize_or_zero();
        if mean == Vec3::ZERO {
            return;
        }

        let before = frames.global(self.frame);
        let new_y = before.transform_direction(mean);
        let delta = rotation_between(before.up(), new_y);
        frames.rotate_by(self.frame, delta);
        let after = frames.global(self.frame);

        for cone in &mut self.cones {
            let world = before.transform_direction(cone.control_point());
            cone.set_control_point(after.inverse_transform_direction(world));
        }
        self.update_tangent_handles();
        log::debug!(
            "re-centred constraint frame {:?} by {:.4} rad",
            self.frame,
            crate::math::angle_of(delta)
        );
    }

    /// Coarse share of the full rotation space this joint permits.
    pub fn rotational_freedom(&self) -> f32 {
        let axial = if self.axially_constrained {
            self.axial_range / TAU
        } else {
            1.0
        };
        let swing = if self.orientation_constrained && !self.cones.is_empty() {
            let total: f32 = self.cones.iter().map(|c| c.radius() * 2.0).sum();
            (total / TAU).min(1.0)
        } else {
            1.0
        };
        axial * swing
    }

    /// Twist of `bone_frame` relative to this constraint, in `[0, TAU)`.
    pub fn current_twist(&self, frames: &FrameArena, bone_frame: FrameId) -> f32 {
        let limits = frames.global(self.frame);
        twist_angle_y(limits.rotation.conjugate() * frames.global(bone_frame).rotation)
    }

    /// Builds a constraint from a list of `(direction, radius)` pairs.
    #[cfg(test)]
    pub(crate) fn with_cones(frame: FrameId, cones: &[(Vec3, f32)]) -> Self {
        let mut kusudama = Self::new(frame);
        kusudama.cones = cones.iter().map(|&(d, r)| LimitCone::new(d, r)).collect();
        kusudama.update_tangent_handles();
        kusudama
    }
}
