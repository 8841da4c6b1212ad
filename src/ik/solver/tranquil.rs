use std::collections::HashMap;

use super::ccd::{apply_rotation, effector_weight, pull_rotation, Pull};
use super::SolverConfig;
use crate::ik::averaging::RotationAverage;
use crate::ik::bone::BoneId;
use crate::ik::skeleton::Skeleton;
use crate::ik::strand::{CollectionId, Strand, StrandCollection, StrandSegmentation};
use crate::math::{angle_of, Transform};

/// Strand CCD that tries each strand separately and commits the averaged
/// result, so no strand gets an advantage from being solved first.
pub struct TranquilSolver;

impl TranquilSolver {
    /// One round over `root` and every collection nested below it. Returns
    /// the largest rotation committed to any bone.
    pub fn iterate(
        skeleton: &mut Skeleton,
        strands: &StrandSegmentation,
        root: CollectionId,
        config: &SolverConfig,
    ) -> f32 {
        let mut largest = 0.0f32;
        for id in strands.subtree(root) {
            let collection = strands.collection(id);
            let trial = trial_collection(skeleton, collection, config, |sk, strand| {
                Self::ccd_pass(sk, strand, config);
            });
            largest = largest.max(trial.commit(skeleton, collection));
            for &bone in collection.bones().iter().rev() {
                skeleton.snap_to_constraint(bone);
            }
        }
        largest
    }

    fn ccd_pass(skeleton: &mut Skeleton, strand: &Strand, config: &SolverConfig) {
        let Some(target) = skeleton.pin_position(strand.tip()) else {
            return;
        };
        for &bone in strand.bones() {
            let mobility = skeleton.bones[bone.0].mobility();
            if mobility <= 0.0 {
                continue;
            }
            let pull = Pull {
                current: skeleton.tip_unchecked(strand.tip()),
                target,
                weight: 1.0,
            };
            let rotation = pull_rotation(skeleton, bone, &[pull]);
            apply_rotation(skeleton, bone, rotation, mobility, config.dampening());
            skeleton.snap_to_constraint(bone);
        }
    }
}

/// Per-bone rotation votes gathered from independent strand simulations.
pub(super) struct CollectionTrial {
    before: Vec<Transform>,
    votes: Vec<RotationAverage>,
}

/// Runs `simulate` once per strand from the collection's starting pose,
/// recording each bone's resulting local rotation change and then
/// restoring the pose.
pub(super) fn trial_collection(
    skeleton: &mut Skeleton,
    collection: &StrandCollection,
    config: &SolverConfig,
    mut simulate: impl FnMut(&mut Skeleton, &Strand),
) -> CollectionTrial {
    let bones = collection.bones();
    let before = skeleton.local_transforms(bones);
    let index: HashMap<BoneId, usize> = bones.iter().enumerate().map(|(i, &b)| (b, i)).collect();
    let mut votes = vec![RotationAverage::new(); bones.len()];

    for strand in collection.strands() {
        simulate(skeleton, strand);
        for &bone in strand.bones() {
            let Some(&i) = index.get(&bone) else {
                continue;
            };
            let after = skeleton.frames.local(skeleton.frame_of(bone)).rotation;
            let delta = after * before[i].rotation.inverse();
            votes[i].add(delta, effector_weight(skeleton, bone, strand.tip(), config));
        }
        skeleton.restore_local_transforms(bones, &before);
    }
    CollectionTrial { before, votes }
}

impl CollectionTrial {
    /// Applies each bone's averaged delta on top of its starting rotation.
    /// Returns the largest committed angle.
    pub(super) fn commit(&self, skeleton: &mut Skeleton, collection: &StrandCollection) -> f32 {
        let mut largest = 0.0f32;
        for (i, &bone) in collection.bones().iter().enumerate() {
            if self.votes[i].is_empty() {
                continue;
            }
            let delta = self.votes[i].result();
            largest = largest.max(angle_of(delta));
            let frame = skeleton.frame_of(bone);
            skeleton
                .frames
                .set_local_rotation(frame, delta * self.before[i].rotation);
        }
        largest
    }
}
