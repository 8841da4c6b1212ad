//! Integration tests: chain and strand decompositions of random pinned trees.

use std::collections::HashSet;

use glam::Vec3;
use kusudama_ik::ik::{Armature, BoneId, ChainSegmentation, Pin, Skeleton, StrandSegmentation};
use kusudama_ik::math::Transform;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Random forest of `count` bones with between one and five pins.
fn random_rig(rng: &mut Pcg32, count: usize) -> Skeleton {
    let mut skeleton = Skeleton::new();
    for i in 0..count {
        let parent = if i == 0 || rng.gen_bool(0.05) {
            None
        } else {
            Some(BoneId(rng.gen_range(0..i)))
        };
        let local = Transform::from_position(Vec3::new(0.0, 1.0, 0.0));
        skeleton
            .add_bone(format!("bone{i}"), parent, local, 1.0)
            .unwrap();
    }
    let pins = rng.gen_range(1..=5);
    for _ in 0..pins {
        let bone = BoneId(rng.gen_range(0..count));
        let goal = Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(0.0..5.0), 0.0);
        let target = skeleton.add_target(Transform::from_position(goal));
        skeleton.pin_bone(bone, Pin::new(target)).unwrap();
    }
    skeleton
}

fn assert_partition(skeleton: &Skeleton, chains: &ChainSegmentation) {
    let mut seen = HashSet::new();
    for (index, segment) in chains.segments().iter().enumerate() {
        assert!(!segment.bones().is_empty());
        assert_eq!(segment.bones()[0], segment.root());
        assert_eq!(*segment.bones().last().unwrap(), segment.tip());
        for &bone in segment.bones() {
            assert!(seen.insert(bone), "{bone:?} appears in two segments");
            assert_eq!(chains.chain_for(bone).map(|s| s.0), Some(index));
        }
        for window in segment.bones().windows(2) {
            assert_eq!(skeleton.bone(window[1]).unwrap().parent(), Some(window[0]));
        }
    }
    assert_eq!(seen.len(), skeleton.len());
}

#[test]
fn every_bone_lands_in_exactly_one_segment() {
    let mut rng = Pcg32::seed_from_u64(2024);
    for _ in 0..50 {
        let count = rng.gen_range(1..40);
        let skeleton = random_rig(&mut rng, count);
        let chains = ChainSegmentation::build(&skeleton);
        assert_partition(&skeleton, &chains);
    }
}

#[test]
fn armature_segmentation_is_a_partition() {
    let mut rng = Pcg32::seed_from_u64(77);
    for _ in 0..20 {
        let count = rng.gen_range(2..30);
        let armature = Armature::new(random_rig(&mut rng, count));
        assert_partition(armature.skeleton(), armature.chains());
    }
}

#[test]
fn segment_parents_and_children_agree() {
    let mut rng = Pcg32::seed_from_u64(9);
    for _ in 0..30 {
        let count = rng.gen_range(2..35);
        let skeleton = random_rig(&mut rng, count);
        let chains = ChainSegmentation::build(&skeleton);
        for (index, segment) in chains.segments().iter().enumerate() {
            for child in segment.children() {
                assert_eq!(chains.segment(*child).parent().map(|p| p.0), Some(index));
            }
            match segment.parent() {
                Some(parent) => {
                    assert!(chains.segment(parent).children().iter().any(|c| c.0 == index))
                }
                None => assert!(chains.roots().iter().any(|r| r.0 == index)),
            }
        }
    }
}

#[test]
fn strands_end_at_pinned_bones() {
    let mut rng = Pcg32::seed_from_u64(31337);
    for _ in 0..30 {
        let count = rng.gen_range(2..30);
        let skeleton = random_rig(&mut rng, count);
        let strands = StrandSegmentation::build(&skeleton);
        for collection in strands.collections() {
            for strand in collection.strands() {
                assert!(skeleton.is_pinned(strand.tip()));
                assert_eq!(strand.bones()[0], strand.tip());
                assert_eq!(*strand.bones().last().unwrap(), strand.root());
                for &bone in strand.bones() {
                    assert!(collection.bones().contains(&bone));
                }
            }
        }
    }
}
