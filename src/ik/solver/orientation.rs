use glam::Vec3;

use super::ccd::{apply_rotation, drag_toward_targets};
use super::tranquil::trial_collection;
use super::SolverConfig;
use crate::ik::bone::BoneId;
use crate::ik::skeleton::Skeleton;
use crate::ik::strand::{CollectionId, Strand, StrandSegmentation};
use crate::math::{rotation_between, scale_rotation};

/// Strand solver that matches target orientation as well as position.
///
/// Each strand is simulated in up to three steps: a CCD pass that brings the
/// tip bone's tip onto the target, then (when orientation is requested) a
/// direct turn of the tip bone onto the target orientation and a second CCD
/// pass over the remaining bones that brings the tip bone's origin to where
/// that orientation needs it. Twist limits are then resolved by passing any
/// excess twist up the strand before clamping.
pub struct OrientationSolver;

impl OrientationSolver {
    /// One round over `root` and its nested collections. Returns the largest
    /// rotation committed to any bone.
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
                Self::simulate(sk, strand, config);
            });
            largest = largest.max(trial.commit(skeleton, collection));
            if config.resnap_on_commit {
                for &bone in collection.bones().iter().rev() {
                    skeleton.snap_to_constraint(bone);
                }
            }
            if collection.parent().is_none() {
                let tips = collection.strands().iter().map(Strand::tip);
                drag_toward_targets(skeleton, collection.root(), tips);
            }
        }
        largest
    }

    fn simulate(skeleton: &mut Skeleton, strand: &Strand, config: &SolverConfig) {
        let tip = strand.tip();
        let goal = skeleton.frames.global(strand.target());

        for (i, &bone) in strand.bones().iter().enumerate() {
            let effector = skeleton.tip_unchecked(tip);
            Self::sane_ccd(skeleton, strand, bone, i + 1, effector, goal.position, config);
        }

        if config.satisfy_orientation {
            let mobility = skeleton.bones[tip.0].mobility();
            if mobility > 0.0 {
                let frame = skeleton.frame_of(tip);
                let current = skeleton.frames.global(frame).rotation;
                let turn = scale_rotation(goal.rotation * current.inverse(), mobility);
                skeleton.frames.rotate_by(frame, turn);
                Self::constrain(skeleton, tip, config);
            }

            // where the tip bone's origin must sit for its tip to land on
            // the target with the target's orientation
            let height = skeleton.bones[tip.0].height;
            let anchor = goal.position - goal.rotation * Vec3::Y * height;
            for (i, &bone) in strand.bones().iter().enumerate().skip(1) {
                let effector = skeleton.frames.origin(skeleton.frame_of(tip));
                Self::sane_ccd(skeleton, strand, bone, i + 1, effector, anchor, config);
            }
        }

        if config.satisfy_twist {
            Self::fabri_twist(skeleton, strand);
        }
    }

    /// Turns `bone` to swing `effector` toward `target`, scaled by the bone's
    /// mobility and, when inverse weighting is on, by how far up the strand
    /// the bone sits.
    fn sane_ccd(
        skeleton: &mut Skeleton,
        strand: &Strand,
        bone: BoneId,
        distance_from_tip: usize,
        effector: Vec3,
        target: Vec3,
        config: &SolverConfig,
    ) {
        let mut factor = skeleton.bones[bone.0].mobility();
        if factor <= 0.0 {
            return;
        }
        if config.inverse_weighted {
            factor *= distance_from_tip as f32 / strand.len() as f32;
        }
        let origin = skeleton.frames.origin(skeleton.frame_of(bone));
        let rotation = rotation_between(effector - origin, target - origin);
        apply_rotation(skeleton, bone, rotation, factor, config.dampening());
        Self::constrain(skeleton, bone, config);
    }

    /// With twist satisfaction on, twist is left to [`fabri_twist`](Self::fabri_twist).
    fn constrain(skeleton: &mut Skeleton, bone: BoneId, config: &SolverConfig) {
        if config.satisfy_twist {
            skeleton.snap_swing(bone);
        } else {
            skeleton.snap_to_constraint(bone);
        }
    }

    /// Tip to root, spins each bone back into its twist range and hands the
    /// opposite spin to its parent; then root to tip, clamps whatever is
    /// still out of range.
    fn fabri_twist(skeleton: &mut Skeleton, strand: &Strand) {
        let bones = strand.bones();
        for (i, &bone) in bones.iter().enumerate() {
            let correction = skeleton.twist_correction(bone);
            if correction == 0.0 {
                continue;
            }
            let frame = skeleton.frame_of(bone);
            skeleton.frames.rotate_about_local_y(frame, correction);
            if let Some(&parent) = bones.get(i + 1) {
                let mobility = skeleton.bones[parent.0].mobility();
                if mobility > 0.0 {
                    let parent_frame = skeleton.frame_of(parent);
                    skeleton
                        .frames
                        .rotate_about_local_y(parent_frame, -correction * mobility);
                }
            }
        }
        for &bone in bones.iter().rev() {
            skeleton.snap_twist(bone);
        }
    }
}
