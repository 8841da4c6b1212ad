use thiserror::Error;

use crate::ik::BoneId;
use crate::math::FrameId;

/// Structural misuse of a skeleton or armature.
///
/// Geometric trouble (degenerate headings, near-singular fits) never surfaces
/// here; solvers fall back to a best-effort pose instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IkError {
    #[error("bone {0:?} does not belong to this skeleton")]
    UnknownBone(BoneId),

    #[error("no bone named {0:?}")]
    UnknownBoneName(String),

    #[error("frame {0:?} does not belong to this arena")]
    UnknownFrame(FrameId),

    #[error("reparenting frame {0:?} would create a cycle")]
    CyclicFrame(FrameId),

    #[error("bone {bone:?} cannot take {parent:?} as its parent")]
    InvalidParent { bone: BoneId, parent: BoneId },

    #[error("strand tip {tip:?} is not reachable from root {root:?}")]
    DisconnectedStrand { tip: BoneId, root: BoneId },

    #[error("bone {0:?} has no constraint")]
    NotAConstraintBone(BoneId),

    #[error("limit cone index {index} out of range (cone count {count})")]
    ConeIndex { index: usize, count: usize },
}

pub type Result<T> = std::result::Result<T, IkError>;
