use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use glam::{Quat, Vec3};
use kusudama_ik::ik::{Armature, BoneId, Pin, Skeleton, SolverConfig, SolverType, SubtargetMode};
use kusudama_ik::math::Transform;

/// Torso with two constrained arms, the hips pinned where they stand and
/// both hands reaching for targets.
fn build_rig() -> kusudama_ik::Result<(Skeleton, [BoneId; 2])> {
    let mut skeleton = Skeleton::builder()
        .bone("hips", None, 0.4)
        .chain("spine", Some("hips"), 3, 0.35)
        .bone_with_transform(
            "upper_arm_l",
            Some("spine2"),
            Transform::from_position_rotation(
                Vec3::new(0.0, 0.35, 0.0),
                Quat::from_rotation_z(FRAC_PI_2),
            ),
            0.6,
        )
        .bone("forearm_l", Some("upper_arm_l"), 0.5)
        .bone("hand_l", Some("forearm_l"), 0.2)
        .bone_with_transform(
            "upper_arm_r",
            Some("spine2"),
            Transform::from_position_rotation(
                Vec3::new(0.0, 0.35, 0.0),
                Quat::from_rotation_z(-FRAC_PI_2),
            ),
            0.6,
        )
        .bone("forearm_r", Some("upper_arm_r"), 0.5)
        .bone("hand_r", Some("forearm_r"), 0.2)
        .build()?;

    let hips = skeleton
        .bone_by_name("hips")
        .ok_or_else(|| kusudama_ik::IkError::UnknownBoneName("hips".into()))?;
    skeleton.pin_bone_in_place(hips)?;

    for side in ["l", "r"] {
        let elbow = skeleton
            .bone_by_name(&format!("forearm_{side}"))
            .ok_or_else(|| kusudama_ik::IkError::UnknownBoneName(format!("forearm_{side}")))?;
        let constraint = skeleton.set_constraint(elbow)?;
        constraint.add_limit_cone(Vec3::Y, FRAC_PI_4);
        constraint.add_limit_cone(Vec3::new(1.0, 1.0, 0.0).normalize(), 0.3);
        constraint.set_axial_limits(TAU - 0.5, 1.0);
    }

    let mut hands = [BoneId(0); 2];
    for (slot, (name, goal)) in [
        ("hand_l", Vec3::new(-0.7, 1.6, 0.4)),
        ("hand_r", Vec3::new(0.8, 1.1, 0.3)),
    ]
    .into_iter()
    .enumerate()
    {
        let hand = skeleton
            .bone_by_name(name)
            .ok_or_else(|| kusudama_ik::IkError::UnknownBoneName(name.into()))?;
        let target = skeleton.add_target(Transform::from_position(goal));
        skeleton.pin_bone(hand, Pin::new(target).with_weight(1.0).with_mode(SubtargetMode::Y))?;
        hands[slot] = hand;
    }
    Ok((skeleton, hands))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    for solver_type in [
        SolverType::Ambitious,
        SolverType::Tranquil,
        SolverType::Mixed,
        SolverType::OrientationAware,
        SolverType::Qcp,
    ] {
        let (skeleton, hands) = match build_rig() {
            Ok(rig) => rig,
            Err(e) => {
                log::error!("Rig setup failed: {}", e);
                return;
            }
        };
        let config = SolverConfig::new(solver_type).with_iterations(30);
        let mut armature = Armature::with_config(skeleton, config);

        match armature.solve_all() {
            Ok(result) => {
                println!(
                    "{:<17} bones moved: {:>2}  max tip error: {:.4}  stability: {:.2}",
                    format!("{solver_type:?}"),
                    result.updated.len(),
                    result.max_tip_error,
                    armature.stability()
                );
                for hand in hands {
                    if let Some(error) = armature.skeleton().pin_error(hand) {
                        log::info!("{:?} error {:.4}", hand, error);
                    }
                }
            }
            Err(e) => log::error!("Solve failed: {}", e),
        }
    }
}
