use super::ccd::{apply_rotation, effector_weight, pull_rotation, sweep_chains, Pull};
use super::SolverConfig;
use crate::ik::bone::BoneId;
use crate::ik::chain::{ChainSegmentation, SegmentId};
use crate::ik::skeleton::Skeleton;

/// Cyclic coordinate descent over chain segments.
///
/// Each bone turns toward the average of the rotations requested by every
/// pin below it in its subproblem, and is re-projected through its
/// constraint before the sweep moves on to its parent.
pub struct AmbitiousSolver;

impl AmbitiousSolver {
    pub fn iterate(
        skeleton: &mut Skeleton,
        chains: &ChainSegmentation,
        root: SegmentId,
        config: &SolverConfig,
    ) {
        sweep_chains(skeleton, chains, root, |sk, bone, segment| {
            Self::rotate_bone(sk, chains, bone, segment, config);
        });
    }

    fn rotate_bone(
        skeleton: &mut Skeleton,
        chains: &ChainSegmentation,
        bone: BoneId,
        segment: SegmentId,
        config: &SolverConfig,
    ) {
        let mobility = skeleton.bones[bone.0].mobility();
        if mobility <= 0.0 {
            return;
        }
        let pulls: Vec<Pull> = chains
            .effectors_of(segment)
            .filter_map(|effector| {
                Some(Pull {
                    current: skeleton.tip_unchecked(effector),
                    target: skeleton.pin_position(effector)?,
                    weight: effector_weight(skeleton, bone, effector, config),
                })
            })
            .collect();
        if pulls.is_empty() {
            return;
        }
        let rotation = pull_rotation(skeleton, bone, &pulls);
        apply_rotation(skeleton, bone, rotation, mobility, config.dampening());
        skeleton.snap_to_constraint(bone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ik::Pin;
    use crate::math::Transform;
    use glam::Vec3;

    fn pinned_line(target: Vec3) -> (Skeleton, ChainSegmentation) {
        let mut sk = Skeleton::builder().chain("b", None, 3, 1.0).build().unwrap();
        sk.pin_bone_in_place(BoneId(0)).unwrap();
        let t = sk.add_target(Transform::from_position(target));
        sk.pin_bone(BoneId(2), Pin::new(t)).unwrap();
        let chains = ChainSegmentation::build(&sk);
        (sk, chains)
    }

    #[test]
    fn iterations_reduce_tip_error() {
        let (mut sk, chains) = pinned_line(Vec3::new(1.0, 2.5, 0.0));
        let config = SolverConfig::default();
        let tip_chain = chains.chain_for(BoneId(2)).unwrap();
        let mut last = sk.pin_error(BoneId(2)).unwrap();
        for _ in 0..30 {
            AmbitiousSolver::iterate(&mut sk, &chains, tip_chain, &config);
            let error = sk.pin_error(BoneId(2)).unwrap();
            assert!(error <= last + 1e-5, "{error} > {last}");
            last = error;
        }
        assert!(last < 0.5);
        // pinned root never moves
        assert!(sk.origin(BoneId(0)).unwrap().abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn locked_bone_does_not_turn() {
        let (mut sk, chains) = pinned_line(Vec3::new(2.0, 1.0, 0.0));
        sk.bone_mut(BoneId(1)).unwrap().orientation_locked = true;
        let before = sk.frames().local(sk.frame_of(BoneId(1)));
        let initial = sk.pin_error(BoneId(2)).unwrap();
        let tip_chain = chains.chain_for(BoneId(2)).unwrap();
        AmbitiousSolver::iterate(&mut sk, &chains, tip_chain, &SolverConfig::default());
        let after = sk.frames().local(sk.frame_of(BoneId(1)));
        assert!(after.rotation.abs_diff_eq(before.rotation, 1e-6));
        assert!(sk.pin_error(BoneId(2)).unwrap() < initial);
    }

    #[test]
    fn dampening_caps_each_step() {
        let (mut sk, chains) = pinned_line(Vec3::new(0.0, -1.0, 0.0));
        let config = SolverConfig::default().with_dampening(0.05);
        let tip_chain = chains.chain_for(BoneId(2)).unwrap();
        let before = sk.frames().global(sk.frame_of(BoneId(2))).rotation;
        AmbitiousSolver::iterate(&mut sk, &chains, tip_chain, &config);
        let after = sk.frames().global(sk.frame_of(BoneId(2))).rotation;
        // the tip bone turns by its own step plus its parent's
        assert!(crate::math::angle_of(after * before.inverse()) <= 0.1 + 1e-4);
    }
}
