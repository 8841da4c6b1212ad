//! Position-space decomposition of a skeleton into chain segments.
//!
//! A segment is a maximal run of bones that can be solved as one unit: it
//! starts at some bone and follows the unique child leading to pins until it
//! reaches a pinned bone, a branch point between several pinned subtrees, or
//! the end of the pinned path. Subtrees that lead to no pin at all become
//! "free" segments so that every bone belongs to exactly one segment.

use super::bone::BoneId;
use super::skeleton::Skeleton;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub usize);

#[derive(Debug, Clone)]
pub struct ChainSegment {
    root: BoneId,
    tip: BoneId,
    bones: Vec<BoneId>,
    parent: Option<SegmentId>,
    children: Vec<SegmentId>,
    pinned_descendants: Vec<SegmentId>,
    chain_length: usize,
    tip_pinned: bool,
    base_pinned: bool,
    depth: usize,
}

impl ChainSegment {
    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn tip(&self) -> BoneId {
        self.tip
    }

    /// Bones ordered root to tip.
    pub fn bones(&self) -> &[BoneId] {
        &self.bones
    }

    pub fn parent(&self) -> Option<SegmentId> {
        self.parent
    }

    pub fn children(&self) -> &[SegmentId] {
        &self.children
    }

    /// Segments with pinned tips this segment answers to, stopping at the
    /// first pin on each path. A tip-pinned segment lists only itself.
    pub fn pinned_descendants(&self) -> &[SegmentId] {
        &self.pinned_descendants
    }

    /// Number of links walked from root to tip.
    pub fn chain_length(&self) -> usize {
        self.chain_length
    }

    pub fn is_tip_pinned(&self) -> bool {
        self.tip_pinned
    }

    /// The root bone's parent exists and is pinned.
    pub fn is_base_pinned(&self) -> bool {
        self.base_pinned
    }

    pub fn has_pins(&self) -> bool {
        !self.pinned_descendants.is_empty()
    }

    /// Segments between this one and its tree's root segment.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Exact partition of a skeleton's bones into [`ChainSegment`]s.
#[derive(Debug, Clone, Default)]
pub struct ChainSegmentation {
    segments: Vec<ChainSegment>,
    roots: Vec<SegmentId>,
    bone_segment: Vec<Option<SegmentId>>,
}

impl ChainSegmentation {
    pub fn build(skeleton: &Skeleton) -> Self {
        let mut seg = Self {
            segments: Vec::new(),
            roots: Vec::new(),
            bone_segment: vec![None; skeleton.len()],
        };

        let mut pending: Vec<(BoneId, Option<SegmentId>)> =
            skeleton.roots().map(|r| (r, None)).collect();
        pending.reverse();
        while let Some((start, parent)) = pending.pop() {
            let (id, spawned) = seg.grow_segment(skeleton, start, parent);
            match parent {
                Some(p) => seg.segments[p.0].children.push(id),
                None => seg.roots.push(id),
            }
            pending.extend(spawned.into_iter().rev().map(|b| (b, Some(id))));
        }

        seg.collect_pinned_descendants();
        log::debug!(
            "chain segmentation: {} segments, {} pinned-root chains",
            seg.segments.len(),
            seg.segments
                .iter()
                .filter(|s| s.has_pins() && (s.base_pinned || s.parent.is_none()))
                .count()
        );
        seg
    }

    /// Walks one segment down from `start`; returns it and the bones that
    /// start its child segments.
    fn grow_segment(
        &mut self,
        skeleton: &Skeleton,
        start: BoneId,
        parent: Option<SegmentId>,
    ) -> (SegmentId, Vec<BoneId>) {
        let id = SegmentId(self.segments.len());
        let base_pinned = skeleton.bones[start.0]
            .parent
            .is_some_and(|p| skeleton.is_pinned(p));
        let depth = parent.map_or(0, |p| self.segments[p.0].depth + 1);

        let mut bones = vec![start];
        let mut spawned = Vec::new();
        let mut current = start;
        let mut tip_pinned = false;
        loop {
            self.bone_segment[current.0] = Some(id);
            let children = skeleton.bones[current.0].children();
            if skeleton.is_pinned(current) {
                tip_pinned = true;
                spawned.extend_from_slice(children);
                break;
            }

            let pinned_children = skeleton.children_with_pinned_descendants(current);
            let next = match pinned_children.as_slice() {
                [only] => Some(*only),
                [] if children.len() == 1 => Some(children[0]),
                _ => None,
            };
            match next {
                Some(next) => {
                    spawned.extend(children.iter().copied().filter(|&c| c != next));
                    bones.push(next);
                    current = next;
                }
                None => {
                    spawned.extend_from_slice(children);
                    break;
                }
            }
        }

        self.segments.push(ChainSegment {
            root: start,
            tip: current,
            chain_length: bones.len() - 1,
            bones,
            parent,
            children: Vec::new(),
            pinned_descendants: Vec::new(),
            tip_pinned,
            base_pinned,
            depth,
        });
        (id, spawned)
    }

    fn collect_pinned_descendants(&mut self) {
        // children always have larger ids than their parents
        for i in (0..self.segments.len()).rev() {
            let pinned = if self.segments[i].tip_pinned {
                vec![SegmentId(i)]
            } else {
                self.segments[i]
                    .children
                    .iter()
                    .flat_map(|c| self.segments[c.0].pinned_descendants.iter().copied())
                    .collect()
            };
            self.segments[i].pinned_descendants = pinned;
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[ChainSegment] {
        &self.segments
    }

    pub fn segment(&self, id: SegmentId) -> &ChainSegment {
        &self.segments[id.0]
    }

    pub fn roots(&self) -> &[SegmentId] {
        &self.roots
    }

    /// Segment containing `bone`, or `None` for a bone this segmentation
    /// was not built from.
    pub fn chain_for(&self, bone: BoneId) -> Option<SegmentId> {
        self.bone_segment.get(bone.0).copied().flatten()
    }

    /// Climbs parent segments until one whose base is pinned, or the top.
    pub fn pinned_root_chain(&self, from: SegmentId) -> SegmentId {
        let mut current = from;
        loop {
            let seg = &self.segments[current.0];
            match seg.parent {
                Some(parent) if !seg.base_pinned => current = parent,
                _ => return current,
            }
        }
    }

    /// Segments solved together with the pinned-root chain `root`: those
    /// reachable without crossing a pinned tip, restricted to segments that
    /// lead to a pin. Ordered so children come before parents.
    pub fn subproblem(&self, root: SegmentId) -> Vec<SegmentId> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            let seg = &self.segments[id.0];
            if !seg.has_pins() {
                continue;
            }
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &child in &seg.children {
                if !self.segments[child.0].base_pinned {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Bones of [`subproblem`](Self::subproblem) ordered tip to root, each
    /// bone after all of its descendants.
    pub fn subproblem_bones(&self, root: SegmentId) -> Vec<BoneId> {
        self.subproblem(root)
            .into_iter()
            .flat_map(|s| self.segments[s.0].bones.iter().rev().copied())
            .collect()
    }

    /// Every pinned-root chain at or below `root` that leads to a pin,
    /// deepest first.
    pub fn pinned_root_chains_below(&self, root: SegmentId) -> Vec<SegmentId> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let seg = &self.segments[id.0];
            if seg.has_pins() && (id == root || seg.base_pinned) {
                found.push(id);
            }
            stack.extend(seg.children.iter().copied());
        }
        found.sort_by(|a, b| {
            self.segments[b.0]
                .depth
                .cmp(&self.segments[a.0].depth)
                .then(a.cmp(b))
        });
        found
    }

    /// Pinned bones a bone in segment `id` pulls toward.
    pub fn effectors_of(&self, id: SegmentId) -> impl Iterator<Item = BoneId> + '_ {
        self.segments[id.0]
            .pinned_descendants
            .iter()
            .map(|s| self.segments[s.0].tip)
    }
}
