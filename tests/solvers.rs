//! Integration tests: solving whole armatures through the public API.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use glam::{Quat, Vec3};
use kusudama_ik::ik::{Armature, BoneId, Pin, Skeleton, SolverConfig, SolverType, SubtargetMode};
use kusudama_ik::math::Transform;

const ALL_SOLVERS: [SolverType; 5] = [
    SolverType::Ambitious,
    SolverType::Tranquil,
    SolverType::Mixed,
    SolverType::OrientationAware,
    SolverType::Qcp,
];

/// Torso pinned where it stands, two constrained arms reaching out.
fn branching_rig() -> (Skeleton, [BoneId; 2]) {
    let mut sk = Skeleton::builder()
        .bone("hips", None, 0.5)
        .chain("spine", Some("hips"), 2, 0.5)
        .bone_with_transform(
            "arm_l",
            Some("spine1"),
            Transform::from_position_rotation(
                Vec3::new(0.0, 0.5, 0.0),
                Quat::from_rotation_z(FRAC_PI_2),
            ),
            0.8,
        )
        .bone("fore_l", Some("arm_l"), 0.7)
        .bone_with_transform(
            "arm_r",
            Some("spine1"),
            Transform::from_position_rotation(
                Vec3::new(0.0, 0.5, 0.0),
                Quat::from_rotation_z(-FRAC_PI_2),
            ),
            0.8,
        )
        .bone("fore_r", Some("arm_r"), 0.7)
        .build()
        .unwrap();

    let hips = sk.bone_by_name("hips").unwrap();
    sk.pin_bone_in_place(hips).unwrap();
    for name in ["fore_l", "fore_r"] {
        let elbow = sk.bone_by_name(name).unwrap();
        let constraint = sk.set_constraint(elbow).unwrap();
        constraint.add_limit_cone(Vec3::Y, FRAC_PI_4);
        constraint.add_limit_cone(Vec3::X, 0.3);
        constraint.set_axial_limits(5.8, 1.0);
    }

    let left = sk.bone_by_name("fore_l").unwrap();
    let right = sk.bone_by_name("fore_r").unwrap();
    let l_target = sk.add_target(Transform::from_position(Vec3::new(-0.6, 2.1, 0.5)));
    let r_target = sk.add_target(Transform::from_position(Vec3::new(0.9, 0.6, -0.4)));
    sk.pin_bone(left, Pin::new(l_target).with_mode(SubtargetMode::Y)).unwrap();
    sk.pin_bone(right, Pin::new(r_target).with_weight(0.5)).unwrap();
    (sk, [left, right])
}

fn assert_finite_pose(sk: &Skeleton) {
    for id in sk.bone_ids() {
        let origin = sk.origin(id).unwrap();
        let tip = sk.tip(id).unwrap();
        assert!(origin.is_finite() && tip.is_finite(), "{id:?} went non-finite");
    }
}

#[test]
fn repeated_single_iterations_never_increase_error() {
    let mut sk = Skeleton::builder().chain("b", None, 4, 1.0).build().unwrap();
    sk.pin_bone_in_place(BoneId(0)).unwrap();
    // 90% of the reach of the three free bones, measured from their shared base
    let base = sk.origin(BoneId(1)).unwrap();
    let goal = base + Vec3::new(2.7, 0.0, 0.0);
    let target = sk.add_target(Transform::from_position(goal));
    sk.pin_bone(BoneId(3), Pin::new(target)).unwrap();

    let config = SolverConfig::new(SolverType::Ambitious).with_iterations(1);
    let mut armature = Armature::with_config(sk, config);
    let mut last = armature.skeleton().pin_error(BoneId(3)).unwrap();
    for _ in 0..300 {
        let result = armature.solve(BoneId(3)).unwrap();
        assert!(result.max_tip_error <= last + 1e-5, "{} > {last}", result.max_tip_error);
        last = result.max_tip_error;
    }
    assert!(last < 0.1, "error {last}");
    assert!(armature.skeleton().origin(BoneId(0)).unwrap().abs_diff_eq(Vec3::ZERO, 1e-5));
}

#[test]
fn free_root_is_dragged_by_the_residual() {
    let mut sk = Skeleton::builder().chain("b", None, 3, 1.0).build().unwrap();
    let target = sk.add_target(Transform::from_position(Vec3::new(5.0, 5.0, 0.0)));
    sk.pin_bone(BoneId(2), Pin::new(target)).unwrap();
    let residual = Vec3::new(5.0, 5.0, 0.0) - sk.tip(BoneId(2)).unwrap();
    let before = sk.origin(BoneId(0)).unwrap();

    let config = SolverConfig::new(SolverType::Ambitious).with_iterations(1);
    let mut armature = Armature::with_config(sk, config);
    armature.solve(BoneId(2)).unwrap();

    let moved = armature.skeleton().origin(BoneId(0)).unwrap() - before;
    assert!(moved.abs_diff_eq(residual, 1e-5), "moved {moved:?}, expected {residual:?}");
    assert!(armature.skeleton().pin_error(BoneId(2)).unwrap() < 1e-4);
}

#[test]
fn no_solver_produces_non_finite_poses() {
    for solver_type in ALL_SOLVERS {
        let (sk, hands) = branching_rig();
        let config = SolverConfig::new(solver_type)
            .with_iterations(25)
            .with_stabilization_passes(2)
            .with_inverse_weighted(true)
            .with_ability_biasing(true);
        let mut armature = Armature::with_config(sk, config);
        let result = armature.solve_all().unwrap();
        assert!(result.max_tip_error.is_finite(), "{solver_type:?}");
        assert_finite_pose(armature.skeleton());
        for hand in hands {
            assert!(armature.skeleton().pin_error(hand).unwrap().is_finite());
        }
    }
}

#[test]
fn constrained_elbows_stay_inside_their_limits() {
    for solver_type in ALL_SOLVERS {
        let (sk, hands) = branching_rig();
        let config = SolverConfig::new(solver_type).with_iterations(15);
        let mut armature = Armature::with_config(sk, config);
        armature.solve_all().unwrap();
        let sk = armature.skeleton();
        for hand in hands {
            let constraint = sk.bone(hand).unwrap().constraint().unwrap();
            let heading = sk.frames().basis_y(sk.bone(hand).unwrap().frame());
            let local = sk.frames().global(constraint.frame()).inverse_transform_direction(heading);
            let projection = constraint.point_in_limits(local.normalize());
            assert!(
                projection.heading.angle_between(local.normalize()) < 1e-2,
                "{solver_type:?} left {hand:?} outside its cones"
            );
        }
    }
}

#[test]
fn stability_is_a_fraction_and_resets() {
    for solver_type in [SolverType::Tranquil, SolverType::Mixed, SolverType::OrientationAware] {
        let (sk, _) = branching_rig();
        let config = SolverConfig::new(solver_type).with_iterations(10);
        let mut armature = Armature::with_config(sk, config);
        for _ in 0..4 {
            armature.solve_all().unwrap();
            let stability = armature.stability();
            assert!((0.0..=1.0).contains(&stability), "{solver_type:?}: {stability}");
        }
        armature.reset_stability_measures();
        assert_eq!(armature.stability(), 0.0);
    }
}

#[test]
fn pinning_after_construction_is_picked_up_on_rebuild() {
    let sk = Skeleton::builder().chain("b", None, 3, 1.0).build().unwrap();
    let mut armature = Armature::new(sk);
    assert!(armature.solve_all().unwrap().updated.is_empty());

    let target = armature
        .skeleton_mut()
        .add_target(Transform::from_position(Vec3::new(1.0, 2.0, 0.0)));
    armature.skeleton_mut().pin_bone(BoneId(2), Pin::new(target)).unwrap();
    armature.rebuild_segmentation();

    let result = armature.solve_all().unwrap();
    assert_eq!(result.updated, vec![BoneId(0), BoneId(1), BoneId(2)]);
}
