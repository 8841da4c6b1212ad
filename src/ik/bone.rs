use glam::Vec3;

use super::constraint::Kusudama;
use crate::math::FrameId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(pub usize);

/// Which target axes contribute orientation rows to the QCP fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubtargetMode(u8);

impl SubtargetMode {
    pub const NONE: Self = Self(0);
    pub const X: Self = Self(1);
    pub const Y: Self = Self(2);
    pub const Z: Self = Self(4);
    pub const ALL: Self = Self(7);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn axis_count(self) -> usize {
        self.0.count_ones() as usize
    }
}

/// Effector target attached to a single bone.
#[derive(Debug, Clone)]
pub struct Pin {
    /// World-space target frame; its origin is where the bone's tip should go.
    pub target: FrameId,
    weight: f32,
    priorities: Vec3,
    pub mode: SubtargetMode,
    pub enabled: bool,
}

impl Pin {
    pub fn new(target: FrameId) -> Self {
        Self {
            target,
            weight: 1.0,
            priorities: Vec3::splat(0.5),
            mode: SubtargetMode::NONE,
            enabled: true,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.set_weight(weight);
        self
    }

    pub fn with_mode(mut self, mode: SubtargetMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_priorities(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_priorities(x, y, z);
        self
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.max(0.0);
    }

    pub fn priorities(&self) -> Vec3 {
        self.priorities
    }

    pub fn set_priorities(&mut self, x: f32, y: f32, z: f32) {
        self.priorities = Vec3::new(x, y, z).clamp(Vec3::ZERO, Vec3::ONE);
    }
}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub(crate) parent: Option<BoneId>,
    pub(crate) children: Vec<BoneId>,
    pub(crate) frame: FrameId,
    pub(crate) height: f32,
    pub(crate) stiffness: f32,
    pub orientation_locked: bool,
    pub(crate) constraint: Option<Kusudama>,
    pub(crate) pin: Option<Pin>,
}

impl Bone {
    pub(crate) fn new(
        name: impl Into<String>,
        parent: Option<BoneId>,
        frame: FrameId,
        height: f32,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            children: Vec::new(),
            frame,
            height: height.max(0.0),
            stiffness: 0.0,
            orientation_locked: false,
            constraint: None,
            pin: None,
        }
    }

    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    pub fn children(&self) -> &[BoneId] {
        &self.children
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn set_stiffness(&mut self, stiffness: f32) {
        self.stiffness = stiffness.clamp(0.0, 1.0);
    }

    pub fn constraint(&self) -> Option<&Kusudama> {
        self.constraint.as_ref()
    }

    pub fn constraint_mut(&mut self) -> Option<&mut Kusudama> {
        self.constraint.as_mut()
    }

    pub fn pin(&self) -> Option<&Pin> {
        self.pin.as_ref()
    }

    pub fn pin_mut(&mut self) -> Option<&mut Pin> {
        self.pin.as_mut()
    }

    /// A disabled pin does not make a bone pinned.
    pub fn is_pinned(&self) -> bool {
        self.pin.as_ref().is_some_and(|p| p.enabled)
    }

    /// Fraction of a requested rotation this bone will accept.
    pub fn mobility(&self) -> f32 {
        if self.orientation_locked {
            0.0
        } else {
            1.0 - self.stiffness
        }
    }

    /// Coarse freedom weight used when several effectors vote on this bone.
    pub fn rotational_freedom(&self) -> f32 {
        let constrained = self
            .constraint
            .as_ref()
            .map_or(1.0, |k| k.rotational_freedom());
        constrained * self.mobility()
    }
}
