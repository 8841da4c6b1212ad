//! Index-addressed coordinate frames.
//!
//! Frames form a forest: each frame stores its parent index, its transform
//! relative to that parent, and a cached global transform. Every mutation
//! re-derives the globals of the mutated frame and all of its descendants by
//! walking the child-index lists, so reads never observe a stale pose.

use glam::{Quat, Vec3};

use super::transform::Transform;
use crate::error::{IkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

#[derive(Debug, Clone)]
struct FrameNode {
    parent: Option<FrameId>,
    children: Vec<FrameId>,
    local: Transform,
    global: Transform,
}

#[derive(Debug, Clone, Default)]
pub struct FrameArena {
    nodes: Vec<FrameNode>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: FrameId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Adds a parentless frame.
    pub fn insert_root(&mut self, global: Transform) -> FrameId {
        let id = FrameId(self.nodes.len());
        self.nodes.push(FrameNode {
            parent: None,
            children: Vec::new(),
            local: global,
            global,
        });
        id
    }

    /// Adds a frame whose `local` transform is relative to `parent`.
    pub fn insert(&mut self, parent: Option<FrameId>, local: Transform) -> Result<FrameId> {
        if let Some(p) = parent {
            self.check(p)?;
        }
        let id = FrameId(self.nodes.len());
        let global = match parent {
            Some(p) => self.nodes[p.0].global.mul_transform(&local),
            None => local,
        };
        self.nodes.push(FrameNode {
            parent,
            children: Vec::new(),
            local,
            global,
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        Ok(id)
    }

    fn check(&self, id: FrameId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(IkError::UnknownFrame(id))
        }
    }

    pub fn parent(&self, id: FrameId) -> Option<FrameId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: FrameId) -> &[FrameId] {
        &self.nodes[id.0].children
    }

    pub fn local(&self, id: FrameId) -> Transform {
        self.nodes[id.0].local
    }

    pub fn global(&self, id: FrameId) -> Transform {
        self.nodes[id.0].global
    }

    pub fn origin(&self, id: FrameId) -> Vec3 {
        self.nodes[id.0].global.position
    }

    pub fn basis_x(&self, id: FrameId) -> Vec3 {
        self.nodes[id.0].global.right()
    }

    pub fn basis_y(&self, id: FrameId) -> Vec3 {
        self.nodes[id.0].global.up()
    }

    pub fn basis_z(&self, id: FrameId) -> Vec3 {
        self.nodes[id.0].global.back()
    }

    /// Transform from world space into this frame's parent space.
    fn parent_global(&self, id: FrameId) -> Transform {
        match self.nodes[id.0].parent {
            Some(p) => self.nodes[p.0].global,
            None => Transform::IDENTITY,
        }
    }

    /// World position of a point given in this frame's coordinates.
    pub fn global_of(&self, id: FrameId, point: Vec3) -> Vec3 {
        self.nodes[id.0].global.transform_point(point)
    }

    /// Coordinates in this frame of a world-space point.
    pub fn local_of(&self, id: FrameId, point: Vec3) -> Vec3 {
        self.nodes[id.0].global.inverse_transform_point(point)
    }

    /// Reparents `id`, keeping its world pose.
    pub fn set_parent(&mut self, id: FrameId, parent: Option<FrameId>) -> Result<()> {
        self.check(id)?;
        if let Some(p) = parent {
            self.check(p)?;
            if p == id || self.is_ancestor(id, p) {
                return Err(IkError::CyclicFrame(id));
            }
        }
        if let Some(old) = self.nodes[id.0].parent {
            self.nodes[old.0].children.retain(|&c| c != id);
        }
        let global = self.nodes[id.0].global;
        self.nodes[id.0].parent = parent;
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        self.set_global(id, global);
        Ok(())
    }

    /// True if `ancestor` is on the parent path of `id`.
    pub fn is_ancestor(&self, ancestor: FrameId, id: FrameId) -> bool {
        let mut cursor = self.nodes[id.0].parent;
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.nodes[c.0].parent;
        }
        false
    }

    pub fn set_local(&mut self, id: FrameId, local: Transform) {
        self.nodes[id.0].local = local;
        self.update_global(id);
    }

    pub fn set_local_rotation(&mut self, id: FrameId, rotation: Quat) {
        self.nodes[id.0].local.rotation = rotation.normalize();
        self.update_global(id);
    }

    pub fn set_global(&mut self, id: FrameId, global: Transform) {
        let local = self.parent_global(id).inverse().mul_transform(&global);
        self.set_local(id, local);
    }

    /// Applies a world-space rotation about the frame's own origin.
    pub fn rotate_by(&mut self, id: FrameId, rotation: Quat) {
        let mut global = self.nodes[id.0].global;
        global.rotation = (rotation * global.rotation).normalize();
        self.set_global(id, global);
    }

    /// Spins the frame about its own Y axis.
    pub fn rotate_about_local_y(&mut self, id: FrameId, angle: f32) {
        let local = self.nodes[id.0].local;
        let rotation = (local.rotation * Quat::from_rotation_y(angle)).normalize();
        self.set_local_rotation(id, rotation);
    }

    pub fn translate_to(&mut self, id: FrameId, position: Vec3) {
        let mut global = self.nodes[id.0].global;
        global.position = position;
        self.set_global(id, global);
    }

    pub fn translate_by_global(&mut self, id: FrameId, offset: Vec3) {
        let position = self.nodes[id.0].global.position + offset;
        self.translate_to(id, position);
    }

    /// Moves `id` so its world pose equals that of `other`.
    pub fn align_globals_to(&mut self, id: FrameId, other: FrameId) {
        let target = self.nodes[other.0].global;
        self.set_global(id, target);
    }

    /// Recomputes the cached globals of `id` and everything below it.
    pub fn update_global(&mut self, id: FrameId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let parent = self.parent_global(current);
            let node = &mut self.nodes[current.0];
            node.global = parent.mul_transform(&node.local);
            stack.extend(node.children.iter().copied());
        }
    }
}
