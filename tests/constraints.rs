//! Integration tests: Kusudama projection and twist clamping on live skeletons.

use std::f32::consts::PI;

use glam::{Quat, Vec3};
use kusudama_ik::ik::{BoneId, Kusudama, Skeleton};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

fn random_unit(rng: &mut Pcg32) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len = v.length();
        if len > 0.05 && len <= 1.0 {
            return v / len;
        }
    }
}

fn random_rotation(rng: &mut Pcg32) -> Quat {
    Quat::from_axis_angle(random_unit(rng), rng.gen_range(-PI..PI))
}

fn two_bones() -> Skeleton {
    Skeleton::builder()
        .bone("upper", None, 1.0)
        .bone("lower", Some("upper"), 1.0)
        .build()
        .unwrap()
}

#[test]
fn single_cone_projection_stays_inside_radius() {
    let mut rng = Pcg32::seed_from_u64(0x5eed);
    let mut sk = two_bones();
    let axis = Vec3::new(0.3, 1.0, -0.2).normalize();
    let radius = 0.6;
    sk.set_constraint(BoneId(1)).unwrap().add_limit_cone(axis, radius);
    let constraint = sk.bone(BoneId(1)).unwrap().constraint().unwrap();

    for _ in 0..1000 {
        let heading = random_unit(&mut rng);
        let projection = constraint.point_in_limits(heading);
        let angle = projection.heading.angle_between(axis);
        assert!(angle <= radius + 1e-3, "{heading:?} projected {angle} outside {radius}");
        if heading.angle_between(axis) <= radius - 1e-3 {
            assert!(projection.in_bounds);
            assert!(projection.heading.abs_diff_eq(heading, 1e-6));
        }
    }
}

#[test]
fn snapped_bone_heading_respects_cone() {
    let mut rng = Pcg32::seed_from_u64(42);
    let mut sk = two_bones();
    let lower = BoneId(1);
    sk.set_constraint(lower).unwrap().add_limit_cone(Vec3::Y, 0.4);
    let limits = sk.bone(lower).unwrap().constraint().unwrap().frame();
    let frame = sk.bone(lower).unwrap().frame();

    for _ in 0..200 {
        sk.frames_mut().set_local_rotation(frame, random_rotation(&mut rng));
        sk.snap_to_constraint(lower);
        let heading = sk.frames().basis_y(frame);
        let axis = sk.frames().basis_y(limits);
        assert!(heading.angle_between(axis) <= 0.4 + 1e-3);
    }
}

#[test]
fn twist_snap_is_idempotent() {
    let mut rng = Pcg32::seed_from_u64(7);
    let mut sk = two_bones();
    let lower = BoneId(1);
    sk.set_constraint(lower).unwrap().set_axial_limits(0.3, 1.2);
    let constraint: Kusudama = sk.bone(lower).unwrap().constraint().unwrap().clone();
    let frame = sk.bone(lower).unwrap().frame();

    for _ in 0..200 {
        sk.frames_mut().set_local_rotation(frame, random_rotation(&mut rng));
        constraint.snap_to_twist_limits(sk.frames_mut(), frame);
        let second = constraint.snap_to_twist_limits(sk.frames_mut(), frame);
        assert_eq!(second, 0.0);
    }
}

#[test]
fn two_cone_band_admits_midpoint() {
    let mut sk = two_bones();
    let constraint = sk.set_constraint(BoneId(1)).unwrap();
    constraint.add_limit_cone(Vec3::Y, 0.2);
    constraint.add_limit_cone(Vec3::X, 0.2);
    let between = (Vec3::X + Vec3::Y).normalize();
    assert!(constraint.point_in_limits(between).in_bounds);
    let opposite = -between;
    assert!(!constraint.point_in_limits(opposite).in_bounds);
}

fn cone_sets() -> Vec<Vec<(Vec3, f32)>> {
    vec![
        vec![(Vec3::Y, 0.3), (Vec3::X, 0.3)],
        vec![(Vec3::Y, 0.3), (Vec3::X, 0.3), (Vec3::new(0.0, 0.5, 1.0).normalize(), 0.4)],
        vec![(Vec3::Y, 0.6), (Vec3::new(0.4, 1.0, 0.0).normalize(), 0.5)],
    ]
}

fn constrained(cones: &[(Vec3, f32)]) -> (Skeleton, Kusudama) {
    let mut sk = two_bones();
    let constraint = sk.set_constraint(BoneId(1)).unwrap();
    for &(direction, radius) in cones {
        constraint.add_limit_cone(direction, radius);
    }
    let constraint = constraint.clone();
    (sk, constraint)
}

#[test]
fn projected_headings_read_as_allowed() {
    let mut rng = Pcg32::seed_from_u64(5000);
    for cones in cone_sets() {
        let (_, constraint) = constrained(&cones);
        for _ in 0..5000 {
            let heading = random_unit(&mut rng);
            let projected = constraint.point_in_limits(heading).heading;
            let again = constraint.point_in_limits(projected);
            assert!(again.in_bounds, "{cones:?}: {heading:?} -> {projected:?} still outside");
        }
    }
}

#[test]
fn second_swing_snap_is_a_no_op() {
    let mut rng = Pcg32::seed_from_u64(2000);
    for cones in cone_sets() {
        let (mut sk, constraint) = constrained(&cones);
        let frame = sk.bone(BoneId(1)).unwrap().frame();
        for _ in 0..2000 {
            sk.frames_mut().set_local_rotation(frame, random_rotation(&mut rng));
            constraint.snap_to_orientation_limits(sk.frames_mut(), frame);
            assert!(
                !constraint.snap_to_orientation_limits(sk.frames_mut(), frame),
                "{cones:?}: second snap still corrected"
            );
        }
    }
}
