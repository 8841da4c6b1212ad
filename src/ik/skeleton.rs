use glam::Vec3;

use super::bone::{Bone, BoneId, Pin};
use super::constraint::Kusudama;
use crate::error::{IkError, Result};
use crate::math::{FrameArena, FrameId, Transform};

/// Bone arena plus the frames every bone, constraint, and pin target lives in.
///
/// Bone frames are parented to their parent bone's frame (roots to the
/// skeleton's base frame). Constraint frames are siblings of their bone, and
/// pin targets are free-standing world frames.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub(crate) frames: FrameArena,
    pub(crate) bones: Vec<Bone>,
    base: FrameId,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new()
    }
}

impl Skeleton {
    pub fn new() -> Self {
        Self::with_base(Transform::IDENTITY)
    }

    pub fn with_base(base: Transform) -> Self {
        let mut frames = FrameArena::new();
        let base = frames.insert_root(base);
        Self {
            frames,
            bones: Vec::new(),
            base,
        }
    }

    pub fn builder() -> SkeletonBuilder {
        SkeletonBuilder::new()
    }

    pub fn base_frame(&self) -> FrameId {
        self.base
    }

    pub fn frames(&self) -> &FrameArena {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameArena {
        &mut self.frames
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn contains(&self, id: BoneId) -> bool {
        id.0 < self.bones.len()
    }

    pub fn bone_ids(&self) -> impl Iterator<Item = BoneId> + '_ {
        (0..self.bones.len()).map(BoneId)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> Result<&Bone> {
        self.bones.get(id.0).ok_or(IkError::UnknownBone(id))
    }

    pub fn bone_mut(&mut self, id: BoneId) -> Result<&mut Bone> {
        self.bones.get_mut(id.0).ok_or(IkError::UnknownBone(id))
    }

    pub fn bone_by_name(&self, name: &str) -> Option<BoneId> {
        self.bones.iter().position(|b| b.name == name).map(BoneId)
    }

    pub fn roots(&self) -> impl Iterator<Item = BoneId> + '_ {
        self.bone_ids().filter(|&id| self.bones[id.0].parent.is_none())
    }

    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneId>,
        local: Transform,
        height: f32,
    ) -> Result<BoneId> {
        let id = BoneId(self.bones.len());
        let parent_frame = match parent {
            Some(p) => {
                if !self.contains(p) {
                    return Err(IkError::InvalidParent { bone: id, parent: p });
                }
                self.bones[p.0].frame
            }
            None => self.base,
        };
        let frame = self.frames.insert(Some(parent_frame), local)?;
        self.bones.push(Bone::new(name, parent, frame, height));
        if let Some(p) = parent {
            self.bones[p.0].children.push(id);
        }
        Ok(id)
    }

    /// Adds a free-standing world frame, typically a pin target.
    pub fn add_target(&mut self, global: Transform) -> FrameId {
        self.frames.insert_root(global)
    }

    pub fn pin_bone(&mut self, id: BoneId, pin: Pin) -> Result<()> {
        if !self.frames.contains(pin.target) {
            return Err(IkError::UnknownFrame(pin.target));
        }
        self.bone_mut(id)?.pin = Some(pin);
        Ok(())
    }

    /// Pins a bone where its tip currently is, matching its current
    /// orientation. An existing pin keeps its settings and target frame,
    /// which is moved and re-enabled. Returns the target frame.
    pub fn pin_bone_in_place(&mut self, id: BoneId) -> Result<FrameId> {
        let tip = self.tip(id)?;
        let rotation = self.frames.global(self.bones[id.0].frame).rotation;
        let pose = Transform::from_position_rotation(tip, rotation);
        if let Some(pin) = self.bones[id.0].pin.as_mut() {
            pin.enabled = true;
            let target = pin.target;
            self.frames.set_global(target, pose);
            return Ok(target);
        }
        let target = self.add_target(pose);
        self.pin_bone(id, Pin::new(target))?;
        Ok(target)
    }

    pub fn unpin_bone(&mut self, id: BoneId) -> Result<Option<Pin>> {
        Ok(self.bone_mut(id)?.pin.take())
    }

    /// Attaches a fresh, unrestricted constraint whose frame matches the
    /// bone's current pose. A constraint already on the bone is replaced and
    /// its frame reused.
    pub fn set_constraint(&mut self, id: BoneId) -> Result<&mut Kusudama> {
        let bone = self.bone(id)?;
        let parent_frame = bone.parent.map_or(self.base, |p| self.bones[p.0].frame);
        let local = self.frames.local(bone.frame);
        let existing = bone.constraint.as_ref().map(Kusudama::frame);
        let frame = match existing {
            Some(frame) => {
                self.frames.set_local(frame, local);
                frame
            }
            None => self.frames.insert(Some(parent_frame), local)?,
        };
        let bone = &mut self.bones[id.0];
        Ok(bone.constraint.insert(Kusudama::new(frame)))
    }

    /// Removes the bone's constraint and detaches its frame from the bone
    /// tree.
    pub fn clear_constraint(&mut self, id: BoneId) -> Result<Option<Kusudama>> {
        let removed = self.bone_mut(id)?.constraint.take();
        if let Some(constraint) = &removed {
            self.frames.set_parent(constraint.frame(), None)?;
        }
        Ok(removed)
    }

    pub fn origin(&self, id: BoneId) -> Result<Vec3> {
        Ok(self.frames.origin(self.bone(id)?.frame))
    }

    /// World position of the bone's far end.
    pub fn tip(&self, id: BoneId) -> Result<Vec3> {
        let bone = self.bone(id)?;
        Ok(self.frames.global_of(bone.frame, Vec3::new(0.0, bone.height, 0.0)))
    }

    pub(crate) fn tip_unchecked(&self, id: BoneId) -> Vec3 {
        let bone = &self.bones[id.0];
        self.frames.global_of(bone.frame, Vec3::new(0.0, bone.height, 0.0))
    }

    pub(crate) fn frame_of(&self, id: BoneId) -> FrameId {
        self.bones[id.0].frame
    }

    /// Target frame of an enabled pin.
    pub(crate) fn pin_target(&self, id: BoneId) -> Option<FrameId> {
        self.bones[id.0]
            .pin
            .as_ref()
            .filter(|p| p.enabled)
            .map(|p| p.target)
    }

    pub fn is_pinned(&self, id: BoneId) -> bool {
        self.bones.get(id.0).is_some_and(|b| b.is_pinned())
    }

    /// True if `id` or anything below it carries an enabled pin.
    pub fn subtree_has_pin(&self, id: BoneId) -> bool {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let bone = &self.bones[current.0];
            if bone.is_pinned() {
                return true;
            }
            stack.extend(bone.children.iter().copied());
        }
        false
    }

    pub fn children_with_pinned_descendants(&self, id: BoneId) -> Vec<BoneId> {
        self.bones[id.0]
            .children
            .iter()
            .copied()
            .filter(|&c| self.subtree_has_pin(c))
            .collect()
    }

    /// `id` and everything below it, parents before children.
    pub fn descendants(&self, id: BoneId) -> Vec<BoneId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.bones[current.0].children.iter().rev().copied());
        }
        out
    }

    /// Number of ancestors above `id`.
    pub fn depth(&self, id: BoneId) -> usize {
        let mut depth = 0;
        let mut cursor = self.bones[id.0].parent;
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.bones[p.0].parent;
        }
        depth
    }

    /// Re-projects a bone through its constraint, if any.
    pub fn snap_to_constraint(&mut self, id: BoneId) {
        let bone = &self.bones[id.0];
        if let Some(constraint) = &bone.constraint {
            constraint.snap_to_limits(&mut self.frames, bone.frame);
        }
    }

    /// Spins `id` into its twist range; returns the spin magnitude.
    pub(crate) fn snap_twist(&mut self, id: BoneId) -> f32 {
        let bone = &self.bones[id.0];
        match &bone.constraint {
            Some(constraint) => constraint.snap_to_twist_limits(&mut self.frames, bone.frame),
            None => 0.0,
        }
    }

    /// Swing-only projection through the bone's constraint.
    pub(crate) fn snap_swing(&mut self, id: BoneId) {
        let bone = &self.bones[id.0];
        if let Some(constraint) = &bone.constraint {
            constraint.snap_to_orientation_limits(&mut self.frames, bone.frame);
        }
    }

    pub(crate) fn twist_correction(&self, id: BoneId) -> f32 {
        let bone = &self.bones[id.0];
        bone.constraint
            .as_ref()
            .map_or(0.0, |c| c.twist_correction(&self.frames, bone.frame))
    }

    /// World position of an enabled pin's target.
    pub(crate) fn pin_position(&self, id: BoneId) -> Option<Vec3> {
        self.pin_target(id).map(|t| self.frames.origin(t))
    }

    /// Distance from a pinned bone's tip to its target.
    pub fn pin_error(&self, id: BoneId) -> Option<f32> {
        if !self.contains(id) {
            return None;
        }
        self.pin_position(id)
            .map(|target| target.distance(self.tip_unchecked(id)))
    }

    pub(crate) fn local_transforms(&self, ids: &[BoneId]) -> Vec<Transform> {
        ids.iter()
            .map(|&id| self.frames.local(self.bones[id.0].frame))
            .collect()
    }

    /// Writes back transforms captured by [`local_transforms`](Self::local_transforms).
    pub(crate) fn restore_local_transforms(&mut self, ids: &[BoneId], locals: &[Transform]) {
        for (&id, &local) in ids.iter().zip(locals) {
            let frame = self.bones[id.0].frame;
            self.frames.set_local(frame, local);
        }
    }

    /// Re-centres a bone's constraint frame on its cones.
    pub fn optimize_limiting_axes(&mut self, id: BoneId) -> Result<()> {
        let bone = self.bones.get_mut(id.0).ok_or(IkError::UnknownBone(id))?;
        let constraint = bone
            .constraint
            .as_mut()
            .ok_or(IkError::NotAConstraintBone(id))?;
        constraint.optimize_limiting_axes(&mut self.frames);
        Ok(())
    }
}

struct PendingBone {
    name: String,
    parent: Option<String>,
    local: Option<Transform>,
    height: f32,
}

/// Name-based skeleton builder.
///
/// Bones added without an explicit transform sit at their parent's tip with
/// the parent's orientation; root bones sit at the base origin.
pub struct SkeletonBuilder {
    base: Transform,
    bones: Vec<PendingBone>,
}

impl SkeletonBuilder {
    pub fn new() -> Self {
        Self {
            base: Transform::IDENTITY,
            bones: Vec::new(),
        }
    }

    pub fn base(mut self, base: Transform) -> Self {
        self.base = base;
        self
    }

    pub fn bone(mut self, name: &str, parent: Option<&str>, height: f32) -> Self {
        self.bones.push(PendingBone {
            name: name.to_owned(),
            parent: parent.map(str::to_owned),
            local: None,
            height,
        });
        self
    }

    pub fn bone_with_transform(
        mut self,
        name: &str,
        parent: Option<&str>,
        local: Transform,
        height: f32,
    ) -> Self {
        self.bones.push(PendingBone {
            name: name.to_owned(),
            parent: parent.map(str::to_owned),
            local: Some(local),
            height,
        });
        self
    }

    /// Appends `count` bones named `{prefix}{i}` in a straight line,
    /// hanging off `parent`.
    pub fn chain(mut self, prefix: &str, parent: Option<&str>, count: usize, length: f32) -> Self {
        let mut parent = parent.map(str::to_owned);
        for i in 0..count {
            let name = format!("{prefix}{i}");
            self.bones.push(PendingBone {
                name: name.clone(),
                parent: parent.take(),
                local: None,
                height: length,
            });
            parent = Some(name);
        }
        self
    }

    pub fn build(self) -> Result<Skeleton> {
        let mut skeleton = Skeleton::with_base(self.base);
        for pending in self.bones {
            let parent = match &pending.parent {
                Some(name) => Some(
                    skeleton
                        .bone_by_name(name)
                        .ok_or_else(|| IkError::UnknownBoneName(name.clone()))?,
                ),
                None => None,
            };
            let local = pending.local.unwrap_or_else(|| match parent {
                Some(p) => {
                    Transform::from_position(Vec3::new(0.0, skeleton.bones[p.0].height, 0.0))
                }
                None => Transform::IDENTITY,
            });
            skeleton.add_bone(pending.name, parent, local, pending.height)?;
        }
        log::debug!("built skeleton with {} bones", skeleton.len());
        Ok(skeleton)
    }
}

impl Default for SkeletonBuilder {
    fn default() -> Self {
        Self::new()
    }
}
