//! Inverse Kinematics module
//!
//! Skeleton model, Kusudama constraints, the two pinned-bone decompositions
//! (chain segments and strands), and the solvers that drive them.

pub mod armature;
pub mod averaging;
pub mod bone;
pub mod chain;
pub mod constraint;
pub mod qcp;
pub mod skeleton;
pub mod solver;
pub mod strand;

pub use armature::{Armature, UpdateHook};
pub use bone::{Bone, BoneId, Pin, SubtargetMode};
pub use chain::{ChainSegment, ChainSegmentation, SegmentId};
pub use constraint::{Kusudama, LimitCone, Projection};
pub use qcp::Qcp;
pub use skeleton::{Skeleton, SkeletonBuilder};
pub use solver::{SolveResult, SolverConfig, SolverType};
pub use strand::{CollectionId, Strand, StrandCollection, StrandSegmentation};
