//! # kusudama-ik
//!
//! Inverse kinematics for branching armatures with any number of pinned
//! bones.
//!
//! ## Features
//! - Chain-segment and strand decompositions of the pinned skeleton
//! - CCD solvers (ambitious, tranquil, mixed), an orientation-aware strand
//!   solver, and a QCP least-squares chain solver
//! - Kusudama joint constraints: swing limited by tangent-joined cones, twist
//!   limited to an axial range
//!
//! ## Example
//! ```rust
//! use kusudama_ik::ik::{Armature, Pin, Skeleton, SolverConfig, SolverType};
//! use kusudama_ik::math::Transform;
//! use glam::Vec3;
//!
//! let mut skeleton = Skeleton::builder()
//!     .chain("spine", None, 4, 1.0)
//!     .build()
//!     .unwrap();
//! let root = skeleton.bone_by_name("spine0").unwrap();
//! let tip = skeleton.bone_by_name("spine3").unwrap();
//! skeleton.pin_bone_in_place(root).unwrap();
//! let target = skeleton.add_target(Transform::from_position(Vec3::new(1.5, 2.5, 0.0)));
//! skeleton.pin_bone(tip, Pin::new(target)).unwrap();
//!
//! let mut armature = Armature::with_config(skeleton, SolverConfig::new(SolverType::Ambitious));
//! let result = armature.solve(tip).unwrap();
//! println!("max tip error {} after {} iterations", result.max_tip_error, result.iterations);
//! ```

pub mod error;
pub mod ik;
pub mod math;

pub use error::{IkError, Result};
pub use ik::{Armature, Kusudama, LimitCone, Pin, Skeleton, SolveResult, SolverConfig, SolverType};
pub use math::{FrameArena, FrameId, Transform};
