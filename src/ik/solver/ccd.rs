use glam::{Quat, Vec3};

use super::SolverConfig;
use crate::ik::averaging::{freedom_weight, RotationAverage};
use crate::ik::bone::BoneId;
use crate::ik::chain::{ChainSegmentation, SegmentId};
use crate::ik::skeleton::Skeleton;
use crate::math::{clamp_to_angle, rotation_between, scale_rotation};

/// One effector pulling on a pivot: where it is, where it should be, and how
/// much its vote counts.
#[derive(Debug, Clone, Copy)]
pub(super) struct Pull {
    pub current: Vec3,
    pub target: Vec3,
    pub weight: f32,
}

/// Rotational freedom summed over `effector` and its ancestors up to and
/// including `bone`.
pub(super) fn path_freedom(skeleton: &Skeleton, bone: BoneId, effector: BoneId) -> f32 {
    let mut sum = 0.0;
    let mut cursor = Some(effector);
    while let Some(current) = cursor {
        let b = &skeleton.bones[current.0];
        sum += b.rotational_freedom();
        if current == bone {
            break;
        }
        cursor = b.parent;
    }
    sum
}

pub(super) fn effector_weight(
    skeleton: &Skeleton,
    bone: BoneId,
    effector: BoneId,
    config: &SolverConfig,
) -> f32 {
    if config.ability_biasing {
        freedom_weight(path_freedom(skeleton, bone, effector))
    } else {
        1.0
    }
}

/// Averaged rotation about the pivot's origin that swings every pull's
/// current point toward its target.
pub(super) fn pull_rotation(skeleton: &Skeleton, bone: BoneId, pulls: &[Pull]) -> Quat {
    let origin = skeleton.frames.origin(skeleton.frame_of(bone));
    let mut average = RotationAverage::new();
    for pull in pulls {
        average.add(rotation_between(pull.current - origin, pull.target - origin), pull.weight);
    }
    average.result()
}

/// Scales `rotation` by `factor`, caps it at `max_angle` and applies it to
/// the bone in world space.
pub(super) fn apply_rotation(
    skeleton: &mut Skeleton,
    bone: BoneId,
    rotation: Quat,
    factor: f32,
    max_angle: f32,
) -> Quat {
    let applied = clamp_to_angle(scale_rotation(rotation, factor), max_angle);
    let frame = skeleton.frame_of(bone);
    skeleton.frames.rotate_by(frame, applied);
    applied
}

/// Mean of `target - tip` over the given pinned bones.
pub(super) fn mean_residual(
    skeleton: &Skeleton,
    effectors: impl Iterator<Item = BoneId>,
) -> Option<Vec3> {
    let mut sum = Vec3::ZERO;
    let mut count = 0;
    for effector in effectors {
        if let Some(target) = skeleton.pin_position(effector) {
            sum += target - skeleton.tip_unchecked(effector);
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f32)
}

/// Moves `root` (and everything under it) by the mean residual of the
/// effectors.
pub(super) fn drag_toward_targets(
    skeleton: &mut Skeleton,
    root: BoneId,
    effectors: impl Iterator<Item = BoneId>,
) -> Vec3 {
    let Some(heading) = mean_residual(skeleton, effectors) else {
        return Vec3::ZERO;
    };
    if heading.length_squared() < 1e-12 {
        return Vec3::ZERO;
    }
    let frame = skeleton.frame_of(root);
    skeleton.frames.translate_by_global(frame, heading);
    heading
}

/// Runs `pivot` over every bone of every pinned-root chain below `root`,
/// deepest chains first and each chain tip to root. A chain with a free base
/// and no parent is first dragged toward its targets.
pub(super) fn sweep_chains(
    skeleton: &mut Skeleton,
    chains: &ChainSegmentation,
    root: SegmentId,
    mut pivot: impl FnMut(&mut Skeleton, BoneId, SegmentId),
) {
    for chain in chains.pinned_root_chains_below(root) {
        let segment = chains.segment(chain);
        if !segment.is_base_pinned() && segment.parent().is_none() {
            drag_toward_targets(skeleton, segment.root(), chains.effectors_of(chain));
        }
        for id in chains.subproblem(chain) {
            for &bone in chains.segment(id).bones().iter().rev() {
                pivot(skeleton, bone, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ik::constraint::Kusudama;

    fn line() -> Skeleton {
        Skeleton::builder().chain("b", None, 3, 1.0).build().unwrap()
    }

    #[test]
    fn path_freedom_sums_inclusive_range() {
        let mut sk = line();
        sk.bone_mut(BoneId(1)).unwrap().set_stiffness(0.5);
        assert!((path_freedom(&sk, BoneId(0), BoneId(2)) - 2.5).abs() < 1e-6);
        assert!((path_freedom(&sk, BoneId(2), BoneId(2)) - 1.0).abs() < 1e-6);
        let config = SolverConfig::default().with_ability_biasing(true);
        assert!((effector_weight(&sk, BoneId(1), BoneId(2), &config) - 1.0 / 1.5).abs() < 1e-5);
    }

    #[test]
    fn constrained_bone_reduces_path_freedom() {
        let mut sk = line();
        let free = path_freedom(&sk, BoneId(0), BoneId(2));
        let constraint: &mut Kusudama = sk.set_constraint(BoneId(1)).unwrap();
        constraint.add_limit_cone(glam::Vec3::Y, 0.3);
        assert!(path_freedom(&sk, BoneId(0), BoneId(2)) < free);
    }

    #[test]
    fn pull_rotation_aims_tip_at_target() {
        let sk = line();
        let pull = Pull {
            current: sk.tip(BoneId(2)).unwrap(),
            target: Vec3::new(3.0, 0.0, 0.0),
            weight: 1.0,
        };
        let rotation = pull_rotation(&sk, BoneId(0), &[pull]);
        assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn apply_rotation_respects_cap() {
        let mut sk = line();
        let applied = apply_rotation(&mut sk, BoneId(0), Quat::from_rotation_z(1.0), 1.0, 0.1);
        assert!((crate::math::angle_of(applied) - 0.1).abs() < 1e-5);
        let halved = apply_rotation(&mut sk, BoneId(0), Quat::from_rotation_z(0.08), 0.5, 0.1);
        assert!((crate::math::angle_of(halved) - 0.04).abs() < 1e-5);
    }

    #[test]
    fn drag_moves_root_by_mean_residual() {
        let mut sk = line();
        let target = sk.add_target(crate::math::Transform::from_position(Vec3::new(1.0, 3.0, 0.0)));
        sk.pin_bone(BoneId(2), crate::ik::Pin::new(target)).unwrap();
        let moved = drag_toward_targets(&mut sk, BoneId(0), [BoneId(2)].into_iter());
        assert!(moved.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
        assert!(sk.origin(BoneId(0)).unwrap().abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
        assert!(sk.pin_error(BoneId(2)).unwrap() < 1e-6);
    }
}
