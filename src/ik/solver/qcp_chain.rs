use glam::{Quat, Vec3};

use super::ccd::{apply_rotation, sweep_chains};
use super::SolverConfig;
use crate::ik::averaging::RotationAverage;
use crate::ik::bone::{BoneId, SubtargetMode};
use crate::ik::chain::{ChainSegmentation, SegmentId};
use crate::ik::qcp::Qcp;
use crate::ik::skeleton::Skeleton;
use crate::math::{rotation_between, scale_rotation};

/// Paired effector/target headings, relative to a pivot's origin.
#[derive(Debug, Default)]
struct Headings {
    moved: Vec<Vec3>,
    target: Vec<Vec3>,
    weights: Vec<f32>,
}

impl Headings {
    fn clear(&mut self) {
        self.moved.clear();
        self.target.clear();
        self.weights.clear();
    }

    fn push(&mut self, moved: Vec3, target: Vec3, weight: f32) {
        self.moved.push(moved);
        self.target.push(target);
        self.weights.push(weight);
    }

    fn mean_squared_deviation(&self) -> f32 {
        let total: f32 = self.weights.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let sum: f32 = self
            .moved
            .iter()
            .zip(&self.target)
            .zip(&self.weights)
            .map(|((m, t), w)| w * m.distance_squared(*t))
            .sum();
        sum / total
    }

    /// Weighted average of the per-row alignments, for fits QCP leaves
    /// underdetermined.
    fn row_average(&self) -> Quat {
        let mut average = RotationAverage::new();
        for ((m, t), w) in self.moved.iter().zip(&self.target).zip(&self.weights) {
            average.add(rotation_between(*m, *t), *w);
        }
        average.result()
    }
}

/// Chain solver that fits each bone's rotation to all of its effectors at
/// once, position and (per the pin's subtarget mode) orientation.
pub struct QcpChainSolver;

impl QcpChainSolver {
    pub fn iterate(
        skeleton: &mut Skeleton,
        chains: &ChainSegmentation,
        root: SegmentId,
        config: &SolverConfig,
        qcp: &mut Qcp,
    ) {
        let mut headings = Headings::default();
        sweep_chains(skeleton, chains, root, |sk, bone, segment| {
            Self::orient_bone(sk, chains, bone, segment, config, qcp, &mut headings);
        });
    }

    fn orient_bone(
        skeleton: &mut Skeleton,
        chains: &ChainSegmentation,
        bone: BoneId,
        segment: SegmentId,
        config: &SolverConfig,
        qcp: &mut Qcp,
        headings: &mut Headings,
    ) {
        let mobility = skeleton.bones[bone.0].mobility();
        if mobility <= 0.0 {
            return;
        }
        let max_angle = config.dampening() * mobility;

        Self::collect_headings(skeleton, chains, bone, segment, headings);
        if headings.moved.is_empty() {
            return;
        }
        let baseline = headings.mean_squared_deviation();
        let mut rotation = qcp
            .try_superpose(
                &headings.moved,
                &headings.target,
                Some(headings.weights.as_slice()),
                false,
            )
            .unwrap_or_else(|| headings.row_average());

        if config.stabilization_passes == 0 {
            apply_rotation(skeleton, bone, rotation, 1.0, max_angle);
            skeleton.snap_to_constraint(bone);
            return;
        }

        let frame = skeleton.frame_of(bone);
        let saved = skeleton.frames.local(frame);
        for pass in 0..config.stabilization_passes {
            apply_rotation(skeleton, bone, rotation, 1.0, max_angle);
            skeleton.snap_to_constraint(bone);
            Self::collect_headings(skeleton, chains, bone, segment, headings);
            let deviation = headings.mean_squared_deviation();
            if deviation <= baseline {
                return;
            }
            log::trace!(
                "qcp pass {pass} on {bone:?} worsened fit ({deviation} > {baseline}), retrying"
            );
            skeleton.frames.set_local(frame, saved);
            rotation = scale_rotation(rotation, 0.5);
        }
    }

    fn collect_headings(
        skeleton: &Skeleton,
        chains: &ChainSegmentation,
        bone: BoneId,
        segment: SegmentId,
        headings: &mut Headings,
    ) {
        headings.clear();
        let origin = skeleton.frames.origin(skeleton.frame_of(bone));
        for effector in chains.effectors_of(segment) {
            let Some(pin) = skeleton.bones[effector.0].pin.as_ref().filter(|p| p.enabled) else {
                continue;
            };
            let goal = skeleton.frames.global(pin.target);
            let tip = skeleton.tip_unchecked(effector);
            let tip_rotation = skeleton.frames.global(skeleton.frame_of(effector)).rotation;
            headings.push(tip - origin, goal.position - origin, pin.weight());

            let priorities = pin.priorities();
            for (mode, axis, priority) in [
                (SubtargetMode::X, Vec3::X, priorities.x),
                (SubtargetMode::Y, Vec3::Y, priorities.y),
                (SubtargetMode::Z, Vec3::Z, priorities.z),
            ] {
                if !pin.mode.contains(mode) {
                    continue;
                }
                let weight = pin.weight() * priority;
                let have = tip_rotation * axis;
                let want = goal.rotation * axis;
                headings.push(tip + have - origin, goal.position + want - origin, weight);
                headings.push(tip - have - origin, goal.position - want - origin, weight);
            }
        }
    }
}
