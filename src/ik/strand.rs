//! Root-to-effector decomposition used by the strand-based solvers.
//!
//! A [`StrandCollection`] groups every path from one unpinned root bone down to
//! the nearest pinned bones below it. Bones shared by several strands receive
//! one candidate rotation per strand; the solvers average those afterwards.
//! Pinned bones with further pins below them start child collections.

use std::collections::HashMap;

use super::bone::BoneId;
use super::skeleton::Skeleton;
use crate::error::{IkError, Result};
use crate::math::FrameId;

/// Path from a pinned bone up to its collection root, ordered tip to root.
#[derive(Debug, Clone)]
pub struct Strand {
    tip: BoneId,
    root: BoneId,
    target: FrameId,
    bones: Vec<BoneId>,
}

impl Strand {
    /// Walks parent links from the pinned `tip` up to `root`.
    pub fn new(skeleton: &Skeleton, tip: BoneId, root: BoneId) -> Result<Self> {
        skeleton.bone(root)?;
        let target = skeleton
            .bone(tip)?
            .pin()
            .map(|p| p.target)
            .ok_or(IkError::DisconnectedStrand { tip, root })?;

        let mut bones = vec![tip];
        let mut current = tip;
        while current != root {
            match skeleton.bones[current.0].parent {
                Some(parent) => {
                    bones.push(parent);
                    current = parent;
                }
                None => return Err(IkError::DisconnectedStrand { tip, root }),
            }
        }
        Ok(Self {
            tip,
            root,
            target,
            bones,
        })
    }

    pub fn tip(&self) -> BoneId {
        self.tip
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn target(&self) -> FrameId {
        self.target
    }

    /// Tip first.
    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// 1 for the tip bone, `len()` for the root.
    pub fn distance_from_tip(&self, bone: BoneId) -> Option<usize> {
        self.bones.iter().position(|&b| b == bone).map(|i| i + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub usize);

#[derive(Debug, Clone)]
pub struct StrandCollection {
    root: BoneId,
    parent: Option<CollectionId>,
    children: Vec<CollectionId>,
    strands: Vec<Strand>,
    bones: Vec<BoneId>,
    bone_strands: HashMap<BoneId, Vec<usize>>,
}

impl StrandCollection {
    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn parent(&self) -> Option<CollectionId> {
        self.parent
    }

    pub fn children(&self) -> &[CollectionId] {
        &self.children
    }

    pub fn strands(&self) -> &[Strand] {
        &self.strands
    }

    /// Union of all strand bones, descendants before ancestors.
    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    /// Indices into [`strands`](Self::strands) of the strands passing
    /// through `bone`.
    pub fn strands_through(&self, bone: BoneId) -> &[usize] {
        self.bone_strands.get(&bone).map_or(&[], Vec::as_slice)
    }
}

/// All strand collections of a skeleton, parents before children.
#[derive(Debug, Clone, Default)]
pub struct StrandSegmentation {
    collections: Vec<StrandCollection>,
    roots: Vec<CollectionId>,
}

impl StrandSegmentation {
    pub fn build(skeleton: &Skeleton) -> Self {
        let mut seg = Self::default();
        let mut pending: Vec<(BoneId, Option<CollectionId>)> = skeleton
            .roots()
            .filter(|&r| skeleton.subtree_has_pin(r))
            .map(|r| (r, None))
            .collect();
        pending.reverse();

        while let Some((root, parent)) = pending.pop() {
            let id = CollectionId(seg.collections.len());
            let collection = Self::collect(skeleton, root, parent);
            for strand in &collection.strands {
                let below = skeleton.children_with_pinned_descendants(strand.tip);
                pending.extend(below.into_iter().rev().map(|c| (c, Some(id))));
            }
            match parent {
                Some(p) => seg.collections[p.0].children.push(id),
                None => seg.roots.push(id),
            }
            seg.collections.push(collection);
        }

        log::debug!(
            "strand segmentation: {} collections, {} strands",
            seg.collections.len(),
            seg.collections.iter().map(|c| c.strands.len()).sum::<usize>()
        );
        seg
    }

    fn collect(
        skeleton: &Skeleton,
        root: BoneId,
        parent: Option<CollectionId>,
    ) -> StrandCollection {
        let mut strands = Vec::new();
        let mut stack = vec![root];
        while let Some(bone) = stack.pop() {
            if skeleton.is_pinned(bone) {
                match Strand::new(skeleton, bone, root) {
                    Ok(strand) => strands.push(strand),
                    Err(err) => log::warn!("skipping strand: {err}"),
                }
                continue;
            }
            stack.extend(skeleton.bones[bone.0].children.iter().rev().copied());
        }

        let mut bone_strands: HashMap<BoneId, Vec<usize>> = HashMap::new();
        for (i, strand) in strands.iter().enumerate() {
            for &bone in &strand.bones {
                bone_strands.entry(bone).or_default().push(i);
            }
        }
        let mut bones: Vec<BoneId> = bone_strands.keys().copied().collect();
        bones.sort_by_key(|&b| (std::cmp::Reverse(skeleton.depth(b)), b));

        StrandCollection {
            root,
            parent,
            children: Vec::new(),
            strands,
            bones,
            bone_strands,
        }
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn collections(&self) -> &[StrandCollection] {
        &self.collections
    }

    pub fn collection(&self, id: CollectionId) -> &StrandCollection {
        &self.collections[id.0]
    }

    pub fn roots(&self) -> &[CollectionId] {
        &self.roots
    }

    /// Collection whose strands move `bone`.
    pub fn collection_for(&self, bone: BoneId) -> Option<CollectionId> {
        self.collections
            .iter()
            .position(|c| c.bone_strands.contains_key(&bone))
            .map(CollectionId)
    }

    pub fn collection_rooted_at(&self, bone: BoneId) -> Option<CollectionId> {
        self.collections
            .iter()
            .position(|c| c.root == bone)
            .map(CollectionId)
    }

    /// `id` followed by every collection nested below it, parents first.
    pub fn subtree(&self, id: CollectionId) -> Vec<CollectionId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.collections[current.0].children.iter().rev().copied());
        }
        out
    }
}
