use glam::{Quat, Vec3};
use std::f32::consts::PI;

use crate::math::any_orthogonal;

pub(crate) const MIN_CONE_RADIUS: f32 = 1e-4;

/// Rim points must read as inside after a projection lands on them.
const RIM_SLACK: f32 = 1e-5;

/// Where a heading falls relative to the region spanned by two adjacent cones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PairHit {
    /// Allowed as is.
    Inside,
    /// Disallowed; the nearest allowed heading is attached.
    Boundary(Vec3),
}

/// One allowed swing region of a [`Kusudama`](super::Kusudama).
///
/// Control points are unit vectors in the owning constraint's frame. Each
/// cone caches the two candidate centres of the tangent circle joining it to
/// the next cone in the list; the cache is refreshed by the owning
/// constraint whenever any cone changes.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitCone {
    control_point: Vec3,
    radius: f32,
    radius_cos: f32,
    softness: f32,
    tangent_center_1: Vec3,
    tangent_center_2: Vec3,
    tangent_radius: f32,
    tangent_radius_cos: f32,
}

impl LimitCone {
    pub fn new(direction: Vec3, radius: f32) -> Self {
        let control_point = normalize_or_y(direction);
        let radius = clamp_radius(radius);
        let tangent_center_1 = any_orthogonal(control_point);
        Self {
            control_point,
            radius,
            radius_cos: radius.cos(),
            softness: 0.0,
            tangent_center_1,
            tangent_center_2: -tangent_center_1,
            tangent_radius: 0.0,
            tangent_radius_cos: 1.0,
        }
    }

    pub fn with_softness(mut self, softness: f32) -> Self {
        self.set_softness(softness);
        self
    }

    pub fn control_point(&self) -> Vec3 {
        self.control_point
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn radius_cos(&self) -> f32 {
        self.radius_cos
    }

    pub fn softness(&self) -> f32 {
        self.softness
    }

    pub fn tangent_centers(&self) -> (Vec3, Vec3) {
        (self.tangent_center_1, self.tangent_center_2)
    }

    pub fn tangent_radius(&self) -> f32 {
        self.tangent_radius
    }

    pub(crate) fn set_control_point(&mut self, direction: Vec3) {
        self.control_point = normalize_or_y(direction);
    }

    pub(crate) fn set_radius(&mut self, radius: f32) {
        self.radius = clamp_radius(radius);
        self.radius_cos = self.radius.cos();
    }

    pub(crate) fn set_softness(&mut self, softness: f32) {
        self.softness = softness.clamp(0.0, 1.0);
    }

    /// Recomputes the tangent circle joining this cone to `next`.
    ///
    /// The tangent circle touches both cone boundaries from outside; its
    /// radius is `(PI - (ra + rb)) / 2`, so two cones that together could
    /// span the sphere get a vanishing circle and two points get a
    /// hemisphere. Its centre lies at angular distance `ra + t` from `a` and
    /// `rb + t` from `b`: the intersection of two planes with the unit
    /// sphere, which yields the two candidates on either side of the arc.
    pub(crate) fn update_tangent_handles(&mut self, next: Option<&LimitCone>) {
        let Some(next) = next else {
            self.tangent_center_1 = any_orthogonal(self.control_point);
            self.tangent_center_2 = -self.tangent_center_1;
            self.tangent_radius = 0.0;
            self.tangent_radius_cos = 1.0;
            return;
        };

        let a = self.control_point;
        let b = next.control_point;
        let t_radius = ((PI - (self.radius + next.radius)) / 2.0).max(0.0);
        let cos_a = (self.radius + t_radius).cos();
        let cos_b = (next.radius + t_radius).cos();

        let c = a.dot(b);
        let normal = a.cross(b);
        let denom = 1.0 - c * c;

        let (center_1, center_2) = if denom < 1e-8 {
            let o = any_orthogonal(a);
            (o, -o)
        } else {
            let alpha = (cos_a - c * cos_b) / denom;
            let beta = (cos_b - c * cos_a) / denom;
            let base = a * alpha + b * beta;
            let remaining = 1.0 - base.length_squared();
            if remaining < 0.0 {
                // one cone swallows the other's centre: no external tangent
                let mid = normalize_or_y(base);
                (mid, mid)
            } else {
                let gamma = (remaining / denom).sqrt();
                (
                    normalize_or_y(base - normal * gamma),
                    normalize_or_y(base + normal * gamma),
                )
            }
        };

        self.tangent_center_1 = center_1;
        self.tangent_center_2 = center_2;
        self.tangent_radius = t_radius;
        self.tangent_radius_cos = t_radius.cos();
    }

    /// `None` if `input` lies inside this cone, else the nearest point on its
    /// boundary.
    pub(crate) fn closest_to_cone(&self, input: Vec3) -> Option<Vec3> {
        if input.dot(self.control_point) > self.radius_cos - RIM_SLACK {
            return None;
        }
        let mut axis = self.control_point.cross(input);
        if axis.length_squared() < 1e-12 {
            axis = any_orthogonal(self.control_point);
        }
        Some(Quat::from_axis_angle(axis.normalize(), self.radius) * self.control_point)
    }

    /// Classifies `input` against the tangent triangle between this cone and
    /// `next`. `None` means the heading is outside both triangles and must be
    /// settled against the cones themselves.
    fn on_great_tangent_triangle(&self, next: &LimitCone, input: Vec3) -> Option<PairHit> {
        let c1 = self.control_point;
        let c2 = next.control_point;
        let side = input.dot(c1.cross(c2));
        let (center, in_triangle) = if side < 0.0 {
            let t1 = self.tangent_center_1;
            (t1, input.dot(c1.cross(t1)) > 0.0 && input.dot(t1.cross(c2)) > 0.0)
        } else {
            let t2 = self.tangent_center_2;
            (t2, input.dot(t2.cross(c1)) > 0.0 && input.dot(c2.cross(t2)) > 0.0)
        };
        if !in_triangle {
            return None;
        }
        if input.dot(center) > self.tangent_radius_cos + RIM_SLACK {
            let mut axis = center.cross(input);
            if axis.length_squared() < 1e-12 {
                axis = any_orthogonal(center);
            }
            Some(PairHit::Boundary(
                Quat::from_axis_angle(axis.normalize(), self.tangent_radius) * center,
            ))
        } else {
            Some(PairHit::Inside)
        }
    }

    /// Tests `input` against the region formed by this cone, `next`, and the
    /// tangent band between them.
    /// Anything inside either cone is allowed even where a tangent circle
    /// overlaps it.
    pub(crate) fn bounds_to_next(&self, next: &LimitCone, input: Vec3) -> PairHit {
        let Some(first) = self.closest_to_cone(input) else {
            return PairHit::Inside;
        };
        let Some(second) = next.closest_to_cone(input) else {
            return PairHit::Inside;
        };
        if let Some(hit) = self.on_great_tangent_triangle(next, input) {
            return hit;
        }
        if input.dot(first) > input.dot(second) {
            PairHit::Boundary(first)
        } else {
            PairHit::Boundary(second)
        }
    }
}

fn clamp_radius(radius: f32) -> f32 {
    if radius.is_finite() {
        radius.clamp(MIN_CONE_RADIUS, PI)
    } else {
        MIN_CONE_RADIUS
    }
}

fn normalize_or_y(v: Vec3) -> Vec3 {
    let n = v.normalize_or_zero();
    if n == Vec3::ZERO {
        Vec3::Y
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn radius_is_clamped() {
        assert_eq!(LimitCone::new(Vec3::Y, -1.0).radius(), MIN_CONE_RADIUS);
        assert_eq!(LimitCone::new(Vec3::Y, 10.0).radius(), PI);
        assert_eq!(LimitCone::new(Vec3::ZERO, 0.5).control_point(), Vec3::Y);
    }

    #[test]
    fn tangent_centers_for_equal_orthogonal_cones() {
        let mut a = LimitCone::new(Vec3::X, 0.3);
        let b = LimitCone::new(Vec3::Y, 0.3);
        a.update_tangent_handles(Some(&b));
        let (t1, t2) = a.tangent_centers();
        assert!(t1.abs_diff_eq(-Vec3::Z, 1e-5));
        assert!(t2.abs_diff_eq(Vec3::Z, 1e-5));
        assert_abs_diff_eq!(a.tangent_radius(), FRAC_PI_2 - 0.3, epsilon = 1e-6);
    }

    #[test]
    fn tangent_circle_touches_both_cones() {
        let mut a = LimitCone::new(Vec3::new(1.0, 1.0, 0.0), 0.2);
        let b = LimitCone::new(Vec3::new(-0.3, 1.0, 0.4), 0.5);
        a.update_tangent_handles(Some(&b));
        let t = a.tangent_radius();
        for center in [a.tangent_centers().0, a.tangent_centers().1] {
            assert_abs_diff_eq!(center.length(), 1.0, epsilon = 1e-5);
            let to_a = center.angle_between(a.control_point());
            let to_b = center.angle_between(b.control_point());
            assert_abs_diff_eq!(to_a, a.radius() + t, epsilon = 1e-3);
            assert_abs_diff_eq!(to_b, b.radius() + t, epsilon = 1e-3);
        }
    }

    #[test]
    fn arc_between_cones_is_allowed() {
        let mut a = LimitCone::new(Vec3::X, 0.3);
        let b = LimitCone::new(Vec3::Y, 0.3);
        a.update_tangent_handles(Some(&b));
        let mid = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert_eq!(a.bounds_to_next(&b, mid), PairHit::Inside);
    }

    #[test]
    fn point_below_band_is_pushed_to_band_edge() {
        let mut a = LimitCone::new(Vec3::X, 0.3);
        let b = LimitCone::new(Vec3::Y, 0.3);
        a.update_tangent_handles(Some(&b));
        let input = Vec3::new(0.5, 0.5, -0.7).normalize();
        let PairHit::Boundary(p) = a.bounds_to_next(&b, input) else {
            panic!("expected a boundary hit");
        };
        // the band edge sits one cone radius off the great arc
        let off_arc = p.dot(Vec3::Z).asin().abs();
        assert_abs_diff_eq!(off_arc, 0.3, epsilon = 1e-3);
    }

    #[test]
    fn band_edge_reads_as_inside() {
        let mut a = LimitCone::new(Vec3::X, 0.3);
        let b = LimitCone::new(Vec3::Y, 0.3);
        a.update_tangent_handles(Some(&b));
        let input = Vec3::new(0.5, 0.5, -0.7).normalize();
        let PairHit::Boundary(edge) = a.bounds_to_next(&b, input) else {
            panic!("expected a boundary hit");
        };
        assert_eq!(a.bounds_to_next(&b, edge), PairHit::Inside);
    }

    #[test]
    fn overlapping_cones_accept_their_interiors() {
        let mut a = LimitCone::new(Vec3::Y, 0.6);
        let b = LimitCone::new(Vec3::new(0.3, 1.0, 0.0), 0.6);
        a.update_tangent_handles(Some(&b));
        for heading in [Vec3::Y, Vec3::new(0.3, 1.0, 0.0), Vec3::new(-0.2, 1.0, 0.3)] {
            assert_eq!(a.bounds_to_next(&b, heading.normalize()), PairHit::Inside);
        }
    }

    #[test]
    fn outside_single_cone_lands_on_rim() {
        let cone = LimitCone::new(Vec3::Y, 0.4);
        assert!(cone.closest_to_cone(Vec3::new(0.1, 1.0, 0.0).normalize()).is_none());
        let p = cone.closest_to_cone(Vec3::X).unwrap();
        assert_abs_diff_eq!(p.angle_between(Vec3::Y), 0.4, epsilon = 1e-4);
        let opposite = cone.closest_to_cone(-Vec3::Y).unwrap();
        assert_abs_diff_eq!(opposite.angle_between(Vec3::Y), 0.4, epsilon = 1e-4);
    }
}
